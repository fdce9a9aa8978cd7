#![forbid(unsafe_code)]

//! `setTimeout` / `setInterval` timers of one frame.
//!
//! Each timer remembers the nesting level it was installed at: one more than
//! the level of the script timer currently firing, or 1 from top-level
//! script. The level is kept on the [`EventLoop`] so every frame sees the
//! same value while a callback runs.
//!
//! # Invariants
//!
//! 1. No interval is shorter than the policy floor.
//! 2. A timer installed at or beyond the maximum nesting level never runs
//!    more often than the nested minimum.
//! 3. A repeating timer whose interval is below the nested minimum keeps
//!    nesting deeper on every firing until it reaches the maximum level,
//!    then its interval is raised to the nested minimum.
//! 4. A one-shot timer is unregistered before its action runs, so the
//!    action may install a timer that reuses nothing of the old one.
//! 5. The event loop's nesting level is zero again after every firing.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use std::time::Duration;

use tracing::{trace, warn};
use webframe_core::config::TimerPolicy;
use webframe_core::event_loop::{EventLoop, Timer};

/// Handle returned to script. Never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScriptTimerId(i32);

impl ScriptTimerId {
    #[must_use]
    pub const fn get(self) -> i32 {
        self.0
    }
}

impl std::fmt::Display for ScriptTimerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "timer#{}", self.0)
    }
}

struct ScriptTimer {
    repeating: bool,
    nesting_level: Cell<u32>,
    interval: Cell<Duration>,
    action: Rc<dyn Fn()>,
    timer: Timer,
}

/// Registry of a frame's live script timers.
pub struct ScriptTimers {
    weak_self: Weak<ScriptTimers>,
    event_loop: Weak<EventLoop>,
    policy: TimerPolicy,
    next_id: Cell<i32>,
    timers: RefCell<HashMap<ScriptTimerId, Rc<ScriptTimer>>>,
}

impl std::fmt::Debug for ScriptTimers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptTimers")
            .field("live", &self.timers.borrow().len())
            .finish_non_exhaustive()
    }
}

impl ScriptTimers {
    #[must_use]
    pub fn new(event_loop: &Rc<EventLoop>, policy: TimerPolicy) -> Rc<Self> {
        Rc::new_cyclic(|weak| Self {
            weak_self: weak.clone(),
            event_loop: Rc::downgrade(event_loop),
            policy,
            next_id: Cell::new(0),
            timers: RefCell::new(HashMap::new()),
        })
    }

    fn allocate_id(&self) -> ScriptTimerId {
        loop {
            let next = self.next_id.get().checked_add(1).unwrap_or(1);
            self.next_id.set(next);
            let id = ScriptTimerId(next);
            if !self.timers.borrow().contains_key(&id) {
                return id;
            }
        }
    }

    /// Install a timer running `action` after `timeout`, once or repeatedly.
    pub fn install(&self, action: Rc<dyn Fn()>, timeout: Duration, single_shot: bool) -> Option<ScriptTimerId> {
        let Some(event_loop) = self.event_loop.upgrade() else {
            warn!("script timer installed after the event loop was dropped");
            return None;
        };
        let id = self.allocate_id();
        let nesting_level = event_loop.timer_nesting_level() + 1;
        let interval = self.policy.clamp_interval(timeout, nesting_level);

        let weak = self.weak_self.clone();
        let timer = Timer::new(&event_loop, "script_timer", move || {
            if let Some(timers) = weak.upgrade() {
                timers.fired(id);
            }
        });
        if single_shot {
            timer.start_one_shot(interval);
        } else {
            timer.start_repeating(interval);
        }
        self.timers.borrow_mut().insert(
            id,
            Rc::new(ScriptTimer {
                repeating: !single_shot,
                nesting_level: Cell::new(nesting_level),
                interval: Cell::new(interval),
                action,
                timer,
            }),
        );
        trace!(%id, ?interval, nesting_level, single_shot, "script timer installed");
        Some(id)
    }

    /// Cancel a timer. Returns `false` for unknown or already-fired ids.
    pub fn remove(&self, id: ScriptTimerId) -> bool {
        let removed = self.timers.borrow_mut().remove(&id);
        match removed {
            Some(timer) => {
                timer.timer.stop();
                true
            }
            None => false,
        }
    }

    /// Cancel every timer, as when the frame's page goes away.
    pub fn clear(&self) {
        let timers: Vec<Rc<ScriptTimer>> = self.timers.borrow_mut().drain().map(|(_, t)| t).collect();
        for timer in timers {
            timer.timer.stop();
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.timers.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.timers.borrow().is_empty()
    }

    #[must_use]
    pub fn contains(&self, id: ScriptTimerId) -> bool {
        self.timers.borrow().contains_key(&id)
    }

    /// Current interval of a live timer.
    #[must_use]
    pub fn interval(&self, id: ScriptTimerId) -> Option<Duration> {
        self.timers.borrow().get(&id).map(|t| t.interval.get())
    }

    #[must_use]
    pub fn nesting_level(&self, id: ScriptTimerId) -> Option<u32> {
        self.timers.borrow().get(&id).map(|t| t.nesting_level.get())
    }

    fn fired(&self, id: ScriptTimerId) {
        let Some(event_loop) = self.event_loop.upgrade() else {
            return;
        };
        let entry = self.timers.borrow().get(&id).cloned();
        let Some(entry) = entry else {
            warn!(%id, "script timer fired after removal");
            return;
        };
        event_loop.set_timer_nesting_level(entry.nesting_level.get());

        if entry.repeating {
            let nested_min = Duration::from_millis(self.policy.min_nested_interval_ms);
            if entry.interval.get() < nested_min {
                let level = entry.nesting_level.get() + 1;
                entry.nesting_level.set(level);
                if level >= self.policy.max_nesting_level {
                    entry.interval.set(nested_min);
                    entry.timer.start_repeating(nested_min);
                    trace!(%id, level, "repeating script timer clamped");
                }
            }
        } else {
            self.timers.borrow_mut().remove(&id);
        }

        let action = Rc::clone(&entry.action);
        drop(entry);
        action();
        event_loop.set_timer_nesting_level(0);
    }
}
