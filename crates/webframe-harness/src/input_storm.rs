#![forbid(unsafe_code)]

//! Deterministic input storms for stress testing dispatch.
//!
//! A storm is a seeded sequence of [`InputAction`]s replayed through an
//! [`InputDriver`]. Replays advance the event loop by a fixed step between
//! actions, so timers (hover, autoscroll, deferred repaints) interleave with
//! input the same way on every run.
//!
//! # Burst Patterns
//!
//! | Pattern | Description |
//! |---------|-------------|
//! | [`BurstPattern::ClickStorm`] | Left clicks at random points |
//! | [`BurstPattern::MouseFlood`] | Random-walk mouse moves |
//! | [`BurstPattern::KeyboardStorm`] | Lowercase letters typed back to back |
//! | [`BurstPattern::MixedBurst`] | Interleaved presses, moves, keys, wheel |
//! | [`BurstPattern::WheelFlood`] | Line wheel events in random directions |
//!
//! # JSONL Schema
//!
//! ```json
//! {"event":"storm_start","pattern":"click_storm","seed":7,"event_count":100}
//! {"event":"storm_inject","idx":0,"action":"press","swallowed":false,"now_ms":0}
//! {"event":"storm_complete","total_events":100,"events_processed":100,"swallowed":12}
//! ```

use std::time::Duration;

use serde_json::json;
use tracing::debug;
use webframe_core::event::MouseButton;
use webframe_core::geometry::IntPoint;

use crate::driver::InputDriver;

/// Virtual time between two replayed actions.
pub const STEP: Duration = Duration::from_millis(3);

// ============================================================================
// Configuration
// ============================================================================

/// Pattern type for storm generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BurstPattern {
    ClickStorm { count: usize, width: i32, height: i32 },
    MouseFlood { count: usize, width: i32, height: i32 },
    KeyboardStorm { count: usize },
    MixedBurst { count: usize, width: i32, height: i32 },
    WheelFlood { count: usize, width: i32, height: i32 },
}

impl BurstPattern {
    /// Pattern name for logging.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::ClickStorm { .. } => "click_storm",
            Self::MouseFlood { .. } => "mouse_flood",
            Self::KeyboardStorm { .. } => "keyboard_storm",
            Self::MixedBurst { .. } => "mixed_burst",
            Self::WheelFlood { .. } => "wheel_flood",
        }
    }
}

#[derive(Debug, Clone)]
pub struct InputStormConfig {
    pub pattern: BurstPattern,
    pub seed: u64,
}

impl InputStormConfig {
    #[must_use]
    pub fn new(pattern: BurstPattern, seed: u64) -> Self {
        Self { pattern, seed }
    }
}

/// One scripted input.
#[derive(Debug, Clone, PartialEq)]
pub enum InputAction {
    Press(MouseButton, IntPoint),
    Release(MouseButton, IntPoint),
    Move(IntPoint),
    Key(char),
    Wheel(IntPoint, f32, f32),
}

impl InputAction {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Press(..) => "press",
            Self::Release(..) => "release",
            Self::Move(_) => "move",
            Self::Key(_) => "key",
            Self::Wheel(..) => "wheel",
        }
    }
}

// ============================================================================
// Generation
// ============================================================================

/// xorshift64, reproducible across platforms.
struct Rng {
    state: u64,
}

impl Rng {
    fn new(seed: u64) -> Self {
        Self {
            state: if seed == 0 { 1 } else { seed },
        }
    }

    fn next(&mut self) -> u64 {
        self.state ^= self.state << 13;
        self.state ^= self.state >> 7;
        self.state ^= self.state << 17;
        self.state
    }

    fn below(&mut self, max: i32) -> i32 {
        if max <= 0 {
            return 0;
        }
        (self.next() % max as u64) as i32
    }

    fn next_char(&mut self) -> char {
        let idx = (self.next() % 26) as u8;
        (b'a' + idx) as char
    }

    fn point(&mut self, width: i32, height: i32) -> IntPoint {
        IntPoint::new(self.below(width), self.below(height))
    }

    fn walk(&mut self, from: IntPoint, width: i32, height: i32) -> IntPoint {
        let dx = self.below(9) - 4;
        let dy = self.below(9) - 4;
        IntPoint::new(
            (from.x + dx).clamp(0, (width - 1).max(0)),
            (from.y + dy).clamp(0, (height - 1).max(0)),
        )
    }

    fn delta(&mut self) -> f32 {
        (self.below(7) - 3) as f32
    }
}

/// Generated storm with its provenance.
#[derive(Debug, Clone)]
pub struct InputStorm {
    pub actions: Vec<InputAction>,
    pub pattern_name: &'static str,
    pub seed: u64,
}

#[must_use]
pub fn generate_storm(config: &InputStormConfig) -> InputStorm {
    let mut rng = Rng::new(config.seed);
    let actions = match config.pattern {
        BurstPattern::ClickStorm { count, width, height } => (0..count)
            .flat_map(|_| {
                let at = rng.point(width, height);
                [InputAction::Press(MouseButton::Left, at), InputAction::Release(MouseButton::Left, at)]
            })
            .collect(),
        BurstPattern::MouseFlood { count, width, height } => {
            let mut at = IntPoint::new(width / 2, height / 2);
            (0..count)
                .map(|_| {
                    at = rng.walk(at, width, height);
                    InputAction::Move(at)
                })
                .collect()
        }
        BurstPattern::KeyboardStorm { count } => (0..count).map(|_| InputAction::Key(rng.next_char())).collect(),
        BurstPattern::MixedBurst { count, width, height } => generate_mixed_burst(count, width, height, &mut rng),
        BurstPattern::WheelFlood { count, width, height } => (0..count)
            .map(|_| {
                let at = rng.point(width, height);
                InputAction::Wheel(at, rng.delta(), rng.delta())
            })
            .collect(),
    };
    InputStorm {
        actions,
        pattern_name: config.pattern.name(),
        seed: config.seed,
    }
}

fn generate_mixed_burst(count: usize, width: i32, height: i32, rng: &mut Rng) -> Vec<InputAction> {
    let mut actions = Vec::with_capacity(count);
    let mut at = IntPoint::new(width / 2, height / 2);
    let mut held = false;
    for _ in 0..count {
        let action = match rng.next() % 10 {
            0..=3 => {
                at = rng.walk(at, width, height);
                InputAction::Move(at)
            }
            4..=5 => {
                held = !held;
                if held {
                    InputAction::Press(MouseButton::Left, at)
                } else {
                    InputAction::Release(MouseButton::Left, at)
                }
            }
            6..=8 => InputAction::Key(rng.next_char()),
            _ => InputAction::Wheel(at, 0.0, rng.delta()),
        };
        actions.push(action);
    }
    if held {
        actions.push(InputAction::Release(MouseButton::Left, at));
    }
    actions
}

// ============================================================================
// Replay
// ============================================================================

/// Feed one action to the driver. Returns whether it was swallowed.
pub fn apply_action(driver: &mut InputDriver, action: &InputAction) -> bool {
    match action {
        InputAction::Press(button, at) => driver.press(*button, *at),
        InputAction::Release(button, at) => driver.release(*button, *at),
        InputAction::Move(at) => driver.move_to(*at),
        InputAction::Key(ch) => driver.type_text(&ch.to_string()) > 0,
        InputAction::Wheel(at, dx, dy) => driver.wheel(*at, *dx, *dy),
    }
}

/// Replay `storm` and collect JSONL evidence: a start line, one line per
/// hundredth action plus the last, and a completion line.
///
/// Returns `(swallowed, jsonl_log)`.
pub fn run_storm_with_logging(driver: &mut InputDriver, storm: &InputStorm) -> (usize, Vec<String>) {
    let mut log_lines = vec![
        json!({
            "event": "storm_start",
            "pattern": storm.pattern_name,
            "seed": storm.seed,
            "event_count": storm.actions.len(),
        })
        .to_string(),
    ];

    let mut swallowed = 0;
    let last = storm.actions.len().saturating_sub(1);
    for (idx, action) in storm.actions.iter().enumerate() {
        let taken = apply_action(driver, action);
        if taken {
            swallowed += 1;
        }
        driver.advance(STEP);
        if idx % 100 == 0 || idx == last {
            let now_ms = u64::try_from(driver.now().as_millis()).unwrap_or(u64::MAX);
            log_lines.push(
                json!({
                    "event": "storm_inject",
                    "idx": idx,
                    "action": action.name(),
                    "swallowed": taken,
                    "now_ms": now_ms,
                })
                .to_string(),
            );
        }
    }

    debug!(pattern = storm.pattern_name, seed = storm.seed, swallowed, "storm replayed");
    log_lines.push(
        json!({
            "event": "storm_complete",
            "total_events": storm.actions.len(),
            "events_processed": storm.actions.len(),
            "swallowed": swallowed,
        })
        .to_string(),
    );
    (swallowed, log_lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn click_storm_pairs_presses_with_releases() {
        let storm = generate_storm(&InputStormConfig::new(
            BurstPattern::ClickStorm {
                count: 50,
                width: 800,
                height: 600,
            },
            42,
        ));
        assert_eq!(storm.actions.len(), 100);
        for pair in storm.actions.chunks(2) {
            match (&pair[0], &pair[1]) {
                (InputAction::Press(_, a), InputAction::Release(_, b)) => assert_eq!(a, b),
                other => panic!("unexpected pair {other:?}"),
            }
        }
    }

    #[test]
    fn same_seed_same_storm() {
        let config = InputStormConfig::new(
            BurstPattern::MixedBurst {
                count: 300,
                width: 640,
                height: 480,
            },
            7,
        );
        assert_eq!(generate_storm(&config).actions, generate_storm(&config).actions);
    }

    #[test]
    fn different_seeds_differ() {
        let pattern = BurstPattern::KeyboardStorm { count: 64 };
        let a = generate_storm(&InputStormConfig::new(pattern.clone(), 1));
        let b = generate_storm(&InputStormConfig::new(pattern, 2));
        assert_ne!(a.actions, b.actions);
    }

    #[test]
    fn mouse_flood_stays_in_bounds() {
        let storm = generate_storm(&InputStormConfig::new(
            BurstPattern::MouseFlood {
                count: 2000,
                width: 100,
                height: 50,
            },
            99,
        ));
        for action in &storm.actions {
            let InputAction::Move(at) = action else {
                panic!("flood produced {action:?}");
            };
            assert!((0..100).contains(&at.x) && (0..50).contains(&at.y), "{at:?}");
        }
    }

    #[test]
    fn mixed_burst_never_leaves_button_held() {
        let storm = generate_storm(&InputStormConfig::new(
            BurstPattern::MixedBurst {
                count: 501,
                width: 320,
                height: 240,
            },
            3,
        ));
        let presses = storm
            .actions
            .iter()
            .filter(|a| matches!(a, InputAction::Press(..)))
            .count();
        let releases = storm
            .actions
            .iter()
            .filter(|a| matches!(a, InputAction::Release(..)))
            .count();
        assert_eq!(presses, releases);
    }

    #[test]
    fn zero_seed_is_usable() {
        let storm = generate_storm(&InputStormConfig::new(BurstPattern::KeyboardStorm { count: 10 }, 0));
        assert_eq!(storm.actions.len(), 10);
        assert!(storm
            .actions
            .iter()
            .all(|a| matches!(a, InputAction::Key(c) if c.is_ascii_lowercase())));
    }
}
