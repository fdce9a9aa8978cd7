//! Property-based invariant tests for the virtual-clock event loop.
//!
//! 1. Timers fire in non-decreasing fire-time order
//! 2. A cancelled timer never fires
//! 3. Each one-shot timer fires at most once
//! 4. The clock never moves backwards
//! 5. After advancing past every deadline, nothing remains scheduled

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use proptest::prelude::*;
use webframe_core::event_loop::{EventLoop, TimerId};

#[derive(Debug, Clone)]
enum Op {
    Schedule(u64),
    Cancel(usize),
    Advance(u64),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0u64..200).prop_map(Op::Schedule),
        1 => (0usize..64).prop_map(Op::Cancel),
        2 => (0u64..100).prop_map(Op::Advance),
    ]
}

proptest! {
    #[test]
    fn timers_fire_in_order_and_cancelled_never_fire(ops in prop::collection::vec(op_strategy(), 1..80)) {
        let el = EventLoop::new();
        let fired: Rc<RefCell<Vec<(usize, Duration)>>> = Rc::new(RefCell::new(Vec::new()));
        let mut ids: Vec<(TimerId, Duration)> = Vec::new();
        let mut cancelled = Vec::new();
        let mut last_now = Duration::ZERO;

        for op in &ops {
            match op {
                Op::Schedule(delay) => {
                    let index = ids.len();
                    let log = Rc::clone(&fired);
                    let weak = Rc::downgrade(&el);
                    let deadline = el.now() + Duration::from_millis(*delay);
                    let id = el.schedule("prop", Duration::from_millis(*delay), None, Rc::new(move || {
                        if let Some(el) = weak.upgrade() {
                            log.borrow_mut().push((index, el.now()));
                        }
                    }));
                    ids.push((id, deadline));
                }
                Op::Cancel(i) => {
                    if let Some((id, _)) = ids.get(*i)
                        && el.cancel(*id)
                    {
                        cancelled.push(*i);
                    }
                }
                Op::Advance(ms) => {
                    el.advance_by(Duration::from_millis(*ms));
                }
            }
            prop_assert!(el.now() >= last_now);
            last_now = el.now();
        }
        el.advance_by(Duration::from_secs(1));
        prop_assert_eq!(el.scheduled_count(), 0);

        let fired = fired.borrow();
        for pair in fired.windows(2) {
            prop_assert!(pair[0].1 <= pair[1].1, "fired out of order: {:?}", pair);
        }
        let mut seen = std::collections::HashSet::new();
        for (index, at) in fired.iter() {
            prop_assert!(seen.insert(*index), "timer {} fired twice", index);
            prop_assert!(!cancelled.contains(index), "cancelled timer {} fired", index);
            prop_assert_eq!(*at, ids[*index].1);
        }
        prop_assert_eq!(seen.len() + cancelled.len(), ids.len());
    }
}
