#![forbid(unsafe_code)]

//! Cooperative single-threaded event loop with a virtual clock.
//!
//! Every timer in the engine (layout, deferred repaint, hover, autoscroll,
//! keep-alive, script timers) is scheduled here. Time only moves when the
//! host calls [`EventLoop::advance_by`] or [`EventLoop::run_pending`], which
//! makes every test deterministic.
//!
//! # Design
//!
//! Timers live in a `BTreeMap` keyed by `(fire_time, sequence)` so that
//! timers due at the same instant fire in the order they were started.
//! Callbacks are `Rc<dyn Fn()>` cloned out of the map before they run: no
//! borrow of loop state is held while user code executes, so callbacks may
//! freely start, stop, or restart any timer, including their own.
//!
//! # Invariants
//!
//! 1. `now()` never decreases.
//! 2. A one-shot timer is removed from the schedule before its callback runs,
//!    so `is_scheduled` is false inside its own callback.
//! 3. A repeating timer is rescheduled before its callback runs, so stopping
//!    it from inside the callback prevents the next tick.
//! 4. Objects handed to [`EventLoop::keep_alive`] are dropped at the start of
//!    the next turn, never during the turn that registered them.
//!
//! # Failure Modes
//!
//! - **Zero-delay storms**: a zero-delay timer that restarts itself would never
//!   let time advance. Each turn is capped at [`MAX_FIRINGS_PER_TURN`]
//!   firings; hitting the cap logs a warning and ends the turn.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::rc::{Rc, Weak};
use std::time::Duration;

use tracing::{debug_span, trace, warn};

/// Upper bound on callbacks run by one `advance_by`/`run_pending` call.
pub const MAX_FIRINGS_PER_TURN: usize = 10_000;

/// Identifies a scheduled timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

/// Identifies a keep-alive registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeepAliveId(u64);

type TimerCallback = Rc<dyn Fn()>;
type Task = Box<dyn FnOnce()>;

struct TimerEntry {
    key: (Duration, u64),
    repeat: Option<Duration>,
    callback: TimerCallback,
    label: &'static str,
}

/// The loop. Always handled through `Rc`.
pub struct EventLoop {
    now: Cell<Duration>,
    next_id: Cell<u64>,
    next_seq: Cell<u64>,
    queue: RefCell<BTreeMap<(Duration, u64), TimerId>>,
    timers: RefCell<HashMap<TimerId, TimerEntry>>,
    tasks: RefCell<VecDeque<Task>>,
    keep_alive: RefCell<Vec<(KeepAliveId, Rc<dyn Any>)>>,
    timer_nesting_level: Cell<u32>,
    turn: Cell<u64>,
}

impl std::fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLoop")
            .field("now", &self.now.get())
            .field("timers", &self.timers.borrow().len())
            .field("tasks", &self.tasks.borrow().len())
            .field("keep_alive", &self.keep_alive.borrow().len())
            .finish()
    }
}

impl EventLoop {
    #[must_use]
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            now: Cell::new(Duration::ZERO),
            next_id: Cell::new(1),
            next_seq: Cell::new(0),
            queue: RefCell::new(BTreeMap::new()),
            timers: RefCell::new(HashMap::new()),
            tasks: RefCell::new(VecDeque::new()),
            keep_alive: RefCell::new(Vec::new()),
            timer_nesting_level: Cell::new(0),
            turn: Cell::new(0),
        })
    }

    /// Current virtual time.
    #[inline]
    #[must_use]
    pub fn now(&self) -> Duration {
        self.now.get()
    }

    /// Number of turns completed so far.
    #[must_use]
    pub fn turn(&self) -> u64 {
        self.turn.get()
    }

    // -----------------------------------------------------------------------
    // Timers
    // -----------------------------------------------------------------------

    /// Schedule `callback` after `delay`, optionally repeating every `repeat`.
    pub fn schedule(
        &self,
        label: &'static str,
        delay: Duration,
        repeat: Option<Duration>,
        callback: Rc<dyn Fn()>,
    ) -> TimerId {
        let id = TimerId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        let key = self.next_key(self.now.get() + delay);
        self.queue.borrow_mut().insert(key, id);
        self.timers.borrow_mut().insert(
            id,
            TimerEntry {
                key,
                repeat,
                callback,
                label,
            },
        );
        trace!(timer = label, ?delay, ?repeat, "timer scheduled");
        id
    }

    /// Cancel a timer. Returns `false` if it was not scheduled.
    pub fn cancel(&self, id: TimerId) -> bool {
        let entry = self.timers.borrow_mut().remove(&id);
        match entry {
            Some(entry) => {
                self.queue.borrow_mut().remove(&entry.key);
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn is_scheduled(&self, id: TimerId) -> bool {
        self.timers.borrow().contains_key(&id)
    }

    /// Time until `id` fires, if scheduled.
    #[must_use]
    pub fn time_until(&self, id: TimerId) -> Option<Duration> {
        let now = self.now.get();
        self.timers
            .borrow()
            .get(&id)
            .map(|entry| entry.key.0.saturating_sub(now))
    }

    /// Fire time of the earliest scheduled timer.
    #[must_use]
    pub fn next_fire_time(&self) -> Option<Duration> {
        self.queue.borrow().keys().next().map(|key| key.0)
    }

    #[must_use]
    pub fn scheduled_count(&self) -> usize {
        self.timers.borrow().len()
    }

    fn next_key(&self, at: Duration) -> (Duration, u64) {
        let seq = self.next_seq.get();
        self.next_seq.set(seq + 1);
        (at, seq)
    }

    // -----------------------------------------------------------------------
    // Tasks
    // -----------------------------------------------------------------------

    /// Queue a task for the next turn, ahead of any timer due in that turn.
    pub fn post_task(&self, task: impl FnOnce() + 'static) {
        self.tasks.borrow_mut().push_back(Box::new(task));
    }

    #[must_use]
    pub fn pending_task_count(&self) -> usize {
        self.tasks.borrow().len()
    }

    // -----------------------------------------------------------------------
    // Keep-alive
    // -----------------------------------------------------------------------

    /// Hold a strong reference to `object` until the start of the next turn.
    pub fn keep_alive(&self, object: Rc<dyn Any>) -> KeepAliveId {
        let id = KeepAliveId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.keep_alive.borrow_mut().push((id, object));
        id
    }

    #[must_use]
    pub fn is_kept_alive(&self, id: KeepAliveId) -> bool {
        self.keep_alive.borrow().iter().any(|(k, _)| *k == id)
    }

    #[must_use]
    pub fn keep_alive_count(&self) -> usize {
        self.keep_alive.borrow().len()
    }

    /// Drop every keep-alive reference now.
    pub fn cancel_all_keep_alive(&self) {
        let released = std::mem::take(&mut *self.keep_alive.borrow_mut());
        drop(released);
    }

    // -----------------------------------------------------------------------
    // Script timer nesting
    // -----------------------------------------------------------------------

    /// Nesting depth of the script timer currently running, 0 outside timers.
    #[must_use]
    pub fn timer_nesting_level(&self) -> u32 {
        self.timer_nesting_level.get()
    }

    pub fn set_timer_nesting_level(&self, level: u32) {
        self.timer_nesting_level.set(level);
    }

    // -----------------------------------------------------------------------
    // Running
    // -----------------------------------------------------------------------

    /// Run everything due at the current time. Returns callbacks run.
    pub fn run_pending(&self) -> usize {
        self.advance_by(Duration::ZERO)
    }

    /// Advance the clock by `delta`, firing every timer due on the way in
    /// fire-time order. Returns callbacks run.
    pub fn advance_by(&self, delta: Duration) -> usize {
        let deadline = self.now.get() + delta;
        let _span = debug_span!("event_loop.run", ?deadline).entered();

        self.turn.set(self.turn.get() + 1);
        self.cancel_all_keep_alive();

        let mut fired = 0usize;
        loop {
            if fired >= MAX_FIRINGS_PER_TURN {
                warn!(fired, "event loop turn hit firing cap; yielding");
                break;
            }
            let task = self.tasks.borrow_mut().pop_front();
            if let Some(task) = task {
                task();
                fired += 1;
                continue;
            }
            if self.fire_next_due(deadline) {
                fired += 1;
                continue;
            }
            break;
        }

        if self.now.get() < deadline {
            self.now.set(deadline);
        }
        fired
    }

    /// Advance straight to the next scheduled timer and run it plus anything
    /// it makes due. Returns `false` if nothing is scheduled.
    pub fn run_next(&self) -> bool {
        match self.next_fire_time() {
            Some(at) => {
                let delta = at.saturating_sub(self.now.get());
                self.advance_by(delta);
                true
            }
            None => {
                self.run_pending();
                false
            }
        }
    }

    fn fire_next_due(&self, deadline: Duration) -> bool {
        let (key, id) = {
            let queue = self.queue.borrow();
            match queue.iter().next() {
                Some((&key, &id)) if key.0 <= deadline => (key, id),
                _ => return false,
            }
        };
        self.queue.borrow_mut().remove(&key);

        if key.0 > self.now.get() {
            self.now.set(key.0);
        }

        let (callback, label) = {
            let mut timers = self.timers.borrow_mut();
            let Some(entry) = timers.get_mut(&id) else {
                return true;
            };
            let callback = Rc::clone(&entry.callback);
            let label = entry.label;
            match entry.repeat {
                Some(interval) => {
                    let next = self.next_key(key.0 + interval.max(Duration::from_nanos(1)));
                    entry.key = next;
                    self.queue.borrow_mut().insert(next, id);
                }
                None => {
                    timers.remove(&id);
                }
            }
            (callback, label)
        };

        trace!(timer = label, at = ?key.0, "timer fired");
        callback();
        true
    }
}

// ---------------------------------------------------------------------------
// Timer handle
// ---------------------------------------------------------------------------

/// An owned, restartable timer bound to one callback.
///
/// Dropping the handle stops the timer. The callback usually captures a
/// `Weak` to its owner and does nothing once the owner is gone.
pub struct Timer {
    event_loop: Weak<EventLoop>,
    label: &'static str,
    callback: TimerCallback,
    id: Cell<Option<TimerId>>,
}

impl std::fmt::Debug for Timer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Timer")
            .field("label", &self.label)
            .field("active", &self.is_active())
            .finish()
    }
}

impl Timer {
    #[must_use]
    pub fn new(event_loop: &Rc<EventLoop>, label: &'static str, callback: impl Fn() + 'static) -> Self {
        Self {
            event_loop: Rc::downgrade(event_loop),
            label,
            callback: Rc::new(callback),
            id: Cell::new(None),
        }
    }

    /// (Re)start as a one-shot firing after `delay`.
    pub fn start_one_shot(&self, delay: Duration) {
        self.start(delay, None);
    }

    /// (Re)start firing every `interval`, first after one `interval`.
    pub fn start_repeating(&self, interval: Duration) {
        self.start(interval, Some(interval));
    }

    fn start(&self, delay: Duration, repeat: Option<Duration>) {
        self.stop();
        let Some(event_loop) = self.event_loop.upgrade() else {
            warn!(timer = self.label, "timer started after its event loop was dropped");
            return;
        };
        let id = event_loop.schedule(self.label, delay, repeat, Rc::clone(&self.callback));
        self.id.set(Some(id));
    }

    pub fn stop(&self) {
        if let Some(id) = self.id.take()
            && let Some(event_loop) = self.event_loop.upgrade()
        {
            event_loop.cancel(id);
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        match (self.id.get(), self.event_loop.upgrade()) {
            (Some(id), Some(event_loop)) => event_loop.is_scheduled(id),
            _ => false,
        }
    }

    /// Time until the next firing; zero when inactive.
    #[must_use]
    pub fn next_fire_interval(&self) -> Duration {
        match (self.id.get(), self.event_loop.upgrade()) {
            (Some(id), Some(event_loop)) => event_loop.time_until(id).unwrap_or_default(),
            _ => Duration::ZERO,
        }
    }

    #[must_use]
    pub fn label(&self) -> &'static str {
        self.label
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.stop();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn counter() -> (Rc<Cell<u32>>, impl Fn() + 'static) {
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        (count, move || c.set(c.get() + 1))
    }

    #[test]
    fn one_shot_fires_once_at_deadline() {
        let el = EventLoop::new();
        let (count, cb) = counter();
        let timer = Timer::new(&el, "t", cb);
        timer.start_one_shot(ms(10));
        el.advance_by(ms(9));
        assert_eq!(count.get(), 0);
        assert!(timer.is_active());
        el.advance_by(ms(1));
        assert_eq!(count.get(), 1);
        assert!(!timer.is_active());
        el.advance_by(ms(100));
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn repeating_fires_each_interval() {
        let el = EventLoop::new();
        let (count, cb) = counter();
        let timer = Timer::new(&el, "t", cb);
        timer.start_repeating(ms(5));
        el.advance_by(ms(26));
        assert_eq!(count.get(), 5);
        timer.stop();
        el.advance_by(ms(100));
        assert_eq!(count.get(), 5);
    }

    #[test]
    fn restart_replaces_schedule() {
        let el = EventLoop::new();
        let (count, cb) = counter();
        let timer = Timer::new(&el, "t", cb);
        timer.start_one_shot(ms(10));
        el.advance_by(ms(5));
        timer.start_one_shot(ms(10));
        el.advance_by(ms(6));
        assert_eq!(count.get(), 0);
        assert_eq!(timer.next_fire_interval(), ms(4));
        el.advance_by(ms(4));
        assert_eq!(count.get(), 1);
        assert_eq!(el.scheduled_count(), 0);
    }

    #[test]
    fn drop_stops_timer() {
        let el = EventLoop::new();
        let (count, cb) = counter();
        {
            let timer = Timer::new(&el, "t", cb);
            timer.start_one_shot(ms(1));
        }
        el.advance_by(ms(5));
        assert_eq!(count.get(), 0);
        assert_eq!(el.scheduled_count(), 0);
    }

    #[test]
    fn same_deadline_fires_in_start_order() {
        let el = EventLoop::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let l1 = Rc::clone(&log);
        let l2 = Rc::clone(&log);
        el.schedule("a", ms(3), None, Rc::new(move || l1.borrow_mut().push("a")));
        el.schedule("b", ms(3), None, Rc::new(move || l2.borrow_mut().push("b")));
        el.advance_by(ms(3));
        assert_eq!(*log.borrow(), vec!["a", "b"]);
    }

    #[test]
    fn callback_can_stop_its_own_repeating_timer() {
        let el = EventLoop::new();
        let count = Rc::new(Cell::new(0u32));
        let slot: Rc<RefCell<Option<Rc<Timer>>>> = Rc::new(RefCell::new(None));
        let c = Rc::clone(&count);
        let s = Rc::clone(&slot);
        let timer = Rc::new(Timer::new(&el, "self-stop", move || {
            c.set(c.get() + 1);
            if c.get() == 3
                && let Some(t) = s.borrow().as_ref()
            {
                t.stop();
            }
        }));
        *slot.borrow_mut() = Some(Rc::clone(&timer));
        timer.start_repeating(ms(1));
        el.advance_by(ms(10));
        assert_eq!(count.get(), 3);
        slot.borrow_mut().take();
    }

    #[test]
    fn zero_delay_chain_runs_in_one_turn() {
        let el = EventLoop::new();
        let count = Rc::new(Cell::new(0u32));
        let weak = Rc::downgrade(&el);
        let c = Rc::clone(&count);
        fn chain(el: Weak<EventLoop>, c: Rc<Cell<u32>>) {
            let Some(strong) = el.upgrade() else { return };
            c.set(c.get() + 1);
            if c.get() < 4 {
                let el2 = el.clone();
                let c2 = Rc::clone(&c);
                strong.schedule("chain", Duration::ZERO, None, Rc::new(move || chain(el2.clone(), Rc::clone(&c2))));
            }
        }
        el.schedule("chain", Duration::ZERO, None, Rc::new(move || chain(weak.clone(), Rc::clone(&c))));
        el.run_pending();
        assert_eq!(count.get(), 4);
    }

    #[test]
    fn zero_delay_storm_is_capped() {
        let el = EventLoop::new();
        let count = Rc::new(Cell::new(0usize));
        let slot: Rc<RefCell<Option<Rc<Timer>>>> = Rc::new(RefCell::new(None));
        let c = Rc::clone(&count);
        let s = Rc::clone(&slot);
        let timer = Rc::new(Timer::new(&el, "storm", move || {
            c.set(c.get() + 1);
            if let Some(t) = s.borrow().as_ref() {
                t.start_one_shot(Duration::ZERO);
            }
        }));
        *slot.borrow_mut() = Some(Rc::clone(&timer));
        timer.start_one_shot(Duration::ZERO);
        el.run_pending();
        assert_eq!(count.get(), MAX_FIRINGS_PER_TURN);
        assert!(timer.is_active());
        timer.stop();
        slot.borrow_mut().take();
    }

    #[test]
    fn tasks_run_before_due_timers() {
        let el = EventLoop::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let l1 = Rc::clone(&log);
        let l2 = Rc::clone(&log);
        el.schedule("timer", Duration::ZERO, None, Rc::new(move || l1.borrow_mut().push("timer")));
        el.post_task(move || l2.borrow_mut().push("task"));
        assert_eq!(el.pending_task_count(), 1);
        el.run_pending();
        assert_eq!(*log.borrow(), vec!["task", "timer"]);
    }

    #[test]
    fn keep_alive_released_next_turn() {
        let el = EventLoop::new();
        let object: Rc<dyn Any> = Rc::new(42u32);
        let weak = Rc::downgrade(&object);
        let id = el.keep_alive(object);
        assert!(el.is_kept_alive(id));
        assert!(weak.upgrade().is_some());
        el.run_pending();
        assert!(!el.is_kept_alive(id));
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn cancel_all_keep_alive_releases_immediately() {
        let el = EventLoop::new();
        let object: Rc<dyn Any> = Rc::new(String::from("frame"));
        let weak = Rc::downgrade(&object);
        el.keep_alive(object);
        el.cancel_all_keep_alive();
        assert_eq!(el.keep_alive_count(), 0);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn run_next_jumps_clock() {
        let el = EventLoop::new();
        let (count, cb) = counter();
        let timer = Timer::new(&el, "t", cb);
        timer.start_one_shot(ms(250));
        assert!(el.run_next());
        assert_eq!(el.now(), ms(250));
        assert_eq!(count.get(), 1);
        assert!(!el.run_next());
    }

    #[test]
    fn clock_never_moves_backwards() {
        let el = EventLoop::new();
        el.advance_by(ms(10));
        el.run_pending();
        assert_eq!(el.now(), ms(10));
    }

    #[test]
    fn timer_outliving_loop_is_inert() {
        let el = EventLoop::new();
        let (count, cb) = counter();
        let timer = Timer::new(&el, "orphan", cb);
        drop(el);
        timer.start_one_shot(ms(1));
        assert!(!timer.is_active());
        assert_eq!(count.get(), 0);
    }
}
