//! Benchmark: timer churn on the virtual-clock event loop.
//!
//! Run with: `cargo bench -p webframe-core --bench event_loop_bench`
//!
//! Models the layout and repaint timers being restarted on every DOM
//! mutation during page load.

use std::hint::black_box;
use std::rc::Rc;
use std::time::Duration;

use criterion::{Criterion, criterion_group, criterion_main};
use webframe_core::event_loop::{EventLoop, Timer};

fn restart_churn(c: &mut Criterion) {
    c.bench_function("timer_restart_1000", |b| {
        let el = EventLoop::new();
        let timer = Timer::new(&el, "layout", || {});
        b.iter(|| {
            for i in 0..1000u64 {
                timer.start_one_shot(Duration::from_micros(black_box(i % 7)));
            }
            el.run_pending();
        });
    });
}

fn many_due(c: &mut Criterion) {
    c.bench_function("fire_512_timers", |b| {
        let el = EventLoop::new();
        b.iter(|| {
            for i in 0..512u64 {
                el.schedule("bench", Duration::from_micros(i), None, Rc::new(|| {}));
            }
            black_box(el.advance_by(Duration::from_millis(1)));
        });
    });
}

criterion_group!(benches, restart_churn, many_due);
criterion_main!(benches);
