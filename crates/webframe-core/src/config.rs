#![forbid(unsafe_code)]

//! Engine configuration as data.
//!
//! Captures every tunable constant of the dispatch and layout core in one
//! [`EngineConfig`] that can be loaded from TOML or JSON at startup.
//!
//! # Loading
//!
//! ```toml
//! # webframe.toml
//! [repaint]
//! union_threshold = 25
//!
//! [keyboard]
//! needs_keypress_compat_mode = true
//! ```
//!
//! ```rust,ignore
//! let config = EngineConfig::from_toml_file("webframe.toml")?;
//! ```
//!
//! # Defaults
//!
//! `EngineConfig::default()` reproduces the historical engine constants.
//! Durations are stored in milliseconds so that files stay readable.

#[cfg(feature = "config")]
use std::path::Path;
use std::time::Duration;

#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};

use crate::event::Modifiers;

// ---------------------------------------------------------------------------
// Top-level EngineConfig
// ---------------------------------------------------------------------------

/// Top-level configuration for a page and everything inside it.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct EngineConfig {
    pub click: ClickPolicy,
    pub drag: DragPolicy,
    pub layout: LayoutPolicy,
    pub repaint: RepaintPolicy,
    pub autoscroll: AutoscrollPolicy,
    pub keyboard: KeyboardPolicy,
    pub scroll: ScrollPolicy,
    pub timers: TimerPolicy,
}

impl EngineConfig {
    /// Load from a TOML string.
    #[cfg(feature = "config")]
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s).map_err(ConfigError::Toml)?;
        config.validated()
    }

    /// Load from a TOML file on disk.
    #[cfg(feature = "config")]
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::Io)?;
        Self::from_toml_str(&content)
    }

    /// Load from a JSON string.
    #[cfg(feature = "config")]
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(s).map_err(ConfigError::Json)?;
        config.validated()
    }

    /// Load from a JSON file on disk.
    #[cfg(feature = "config")]
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::Io)?;
        Self::from_json_str(&content)
    }

    /// Check every parameter is within its accepted range.
    ///
    /// Returns all problems found; an empty list means the config is valid.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.click.multi_click_interval_ms == 0 {
            errors.push("click.multi_click_interval_ms must be > 0".into());
        }
        if self.repaint.union_threshold == 0 {
            errors.push("repaint.union_threshold must be > 0".into());
        }
        if self.repaint.max_delay_during_loading_ms < self.repaint.initial_delay_during_loading_ms {
            errors.push(
                "repaint.max_delay_during_loading_ms must be >= initial_delay_during_loading_ms"
                    .into(),
            );
        }
        if !(self.autoscroll.interval_ms.is_finite() && self.autoscroll.interval_ms > 0.0) {
            errors.push(format!(
                "autoscroll.interval_ms must be positive, got {}",
                self.autoscroll.interval_ms
            ));
        }
        if !(self.autoscroll.pan_acceleration.is_finite() && self.autoscroll.pan_acceleration >= 1.0)
        {
            errors.push(format!(
                "autoscroll.pan_acceleration must be >= 1.0, got {}",
                self.autoscroll.pan_acceleration
            ));
        }
        if self.scroll.pixels_per_line <= 0 {
            errors.push("scroll.pixels_per_line must be > 0".into());
        }
        if !(0.0..1.0).contains(&self.scroll.page_overlap_fraction) {
            errors.push(format!(
                "scroll.page_overlap_fraction must be in [0, 1), got {}",
                self.scroll.page_overlap_fraction
            ));
        }
        if self.timers.floor_ms == 0 {
            errors.push("timers.floor_ms must be > 0".into());
        }
        if self.timers.min_nested_interval_ms < self.timers.floor_ms {
            errors.push("timers.min_nested_interval_ms must be >= timers.floor_ms".into());
        }

        errors
    }

    #[cfg(feature = "config")]
    fn validated(self) -> Result<Self, ConfigError> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(self)
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Multi-click detection.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct ClickPolicy {
    /// Window in which a press continues the previous click sequence.
    pub multi_click_interval_ms: u64,
    /// Maximum manhattan distance between presses of one sequence.
    pub multi_click_tolerance: u32,
    /// Select the word under the pointer when a context menu opens outside
    /// the current selection.
    pub select_word_on_context_click: bool,
}

impl Default for ClickPolicy {
    fn default() -> Self {
        Self {
            multi_click_interval_ms: 500,
            multi_click_tolerance: 4,
            select_word_on_context_click: true,
        }
    }
}

impl ClickPolicy {
    #[must_use]
    pub fn multi_click_interval(&self) -> Duration {
        Duration::from_millis(self.multi_click_interval_ms)
    }
}

/// Distance the mouse must travel after a press before a drag begins,
/// per kind of drag source.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct DragPolicy {
    pub link_hysteresis: u32,
    pub image_hysteresis: u32,
    pub text_hysteresis: u32,
    pub general_hysteresis: u32,
    /// A drag that starts inside the selection must wait this long after the
    /// press, otherwise the gesture extends the selection instead.
    pub text_drag_delay_ms: u64,
}

impl Default for DragPolicy {
    fn default() -> Self {
        Self {
            link_hysteresis: 40,
            image_hysteresis: 5,
            text_hysteresis: 3,
            general_hysteresis: 3,
            text_drag_delay_ms: 150,
        }
    }
}

impl DragPolicy {
    #[must_use]
    pub fn text_drag_delay(&self) -> Duration {
        Duration::from_millis(self.text_drag_delay_ms)
    }
}

/// Layout scheduling.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct LayoutPolicy {
    /// Lower bound applied on top of each document's own minimum delay.
    pub minimum_layout_delay_ms: u64,
    /// Delay of the follow-up layout scheduled by post-layout tasks.
    pub post_layout_delay_ms: u64,
}

/// Deferred repaint coalescing.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct RepaintPolicy {
    /// Rect count at which accumulated repaints collapse into one union.
    pub union_threshold: usize,
    /// Delay used once the document finished loading.
    pub deferred_delay_ms: u64,
    pub initial_delay_during_loading_ms: u64,
    pub max_delay_during_loading_ms: u64,
    pub delay_increment_during_loading_ms: u64,
}

impl Default for RepaintPolicy {
    fn default() -> Self {
        Self {
            union_threshold: 25,
            deferred_delay_ms: 25,
            initial_delay_during_loading_ms: 0,
            max_delay_during_loading_ms: 2500,
            delay_increment_during_loading_ms: 500,
        }
    }
}

/// Autoscroll and middle-button pan scroll.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct AutoscrollPolicy {
    /// Timer period; fractional milliseconds allowed.
    pub interval_ms: f64,
    /// Geometric growth of the pan step per tick.
    pub pan_acceleration: f64,
    /// Pan step on the first tick, before acceleration.
    pub pan_base_step: f64,
    /// Distance from the pan origin inside which no scrolling happens.
    pub pan_dead_zone: i32,
}

impl Default for AutoscrollPolicy {
    fn default() -> Self {
        Self {
            interval_ms: 1000.0 / 60.0,
            pan_acceleration: 1.02,
            pan_base_step: 1.0,
            pan_dead_zone: 15,
        }
    }
}

impl AutoscrollPolicy {
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(self.interval_ms.max(0.0) / 1000.0)
    }
}

/// Keyboard event sequencing.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct KeyboardPolicy {
    /// Always send `keypress` even when `keydown` was handled.
    pub needs_keypress_compat_mode: bool,
    /// Modifier set that, with the key, triggers an access key.
    #[cfg_attr(feature = "config", serde(with = "modifiers_serde"))]
    pub access_key_modifiers: Modifiers,
    /// Virtual key code reported while an input method composes text.
    pub composition_key_code: i32,
}

impl Default for KeyboardPolicy {
    fn default() -> Self {
        Self {
            needs_keypress_compat_mode: false,
            access_key_modifiers: Modifiers::ALT,
            composition_key_code: 229,
        }
    }
}

/// Native scrolling used when the DOM does not consume a wheel or key.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct ScrollPolicy {
    pub pixels_per_line: i32,
    /// Fraction of the visible extent kept on screen by a page scroll.
    pub page_overlap_fraction: f64,
}

impl Default for ScrollPolicy {
    fn default() -> Self {
        Self {
            pixels_per_line: 40,
            page_overlap_fraction: 0.125,
        }
    }
}

/// Script timer clamping.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct TimerPolicy {
    /// Nesting depth beyond which intervals are clamped.
    pub max_nesting_level: u32,
    pub min_nested_interval_ms: u64,
    pub floor_ms: u64,
}

impl Default for TimerPolicy {
    fn default() -> Self {
        Self {
            max_nesting_level: 5,
            min_nested_interval_ms: 10,
            floor_ms: 1,
        }
    }
}

impl TimerPolicy {
    /// Clamp a requested script timer interval given the nesting level the
    /// timer will run at.
    #[must_use]
    pub fn clamp_interval(&self, requested: Duration, nesting_level: u32) -> Duration {
        let floor = Duration::from_millis(self.floor_ms);
        let nested_min = Duration::from_millis(self.min_nested_interval_ms);
        let mut interval = requested.max(floor);
        if nesting_level >= self.max_nesting_level {
            interval = interval.max(nested_min);
        }
        interval
    }
}

#[cfg(feature = "config")]
mod modifiers_serde {
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::event::Modifiers;

    pub fn serialize<S: Serializer>(value: &Modifiers, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(value.bits())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Modifiers, D::Error> {
        let bits = u8::deserialize(deserializer)?;
        Ok(Modifiers::from_bits_truncate(bits))
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur when loading a configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// I/O error reading a file.
    Io(std::io::Error),
    /// TOML parse error.
    #[cfg(feature = "config")]
    Toml(toml::de::Error),
    /// JSON parse error.
    #[cfg(feature = "config")]
    Json(serde_json::Error),
    /// Parsed fine but out of range.
    Validation(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            #[cfg(feature = "config")]
            Self::Toml(e) => write!(f, "TOML parse error: {e}"),
            #[cfg(feature = "config")]
            Self::Json(e) => write!(f, "JSON parse error: {e}"),
            Self::Validation(errors) => write!(f, "validation errors: {}", errors.join("; ")),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            #[cfg(feature = "config")]
            Self::Toml(e) => Some(e),
            #[cfg(feature = "config")]
            Self::Json(e) => Some(e),
            Self::Validation(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_validates_clean() {
        let errors = EngineConfig::default().validate();
        assert!(errors.is_empty(), "{errors:?}");
    }

    #[test]
    fn defaults_match_historical_constants() {
        let config = EngineConfig::default();
        assert_eq!(config.repaint.union_threshold, 25);
        assert_eq!(config.repaint.deferred_delay_ms, 25);
        assert_eq!(config.repaint.max_delay_during_loading_ms, 2500);
        assert_eq!(config.repaint.delay_increment_during_loading_ms, 500);
        assert_eq!(config.drag.link_hysteresis, 40);
        assert_eq!(config.drag.image_hysteresis, 5);
        assert_eq!(config.drag.text_hysteresis, 3);
        assert_eq!(config.keyboard.composition_key_code, 229);
        assert_eq!(config.keyboard.access_key_modifiers, Modifiers::ALT);
        assert_eq!(config.timers.max_nesting_level, 5);
        assert!((config.autoscroll.pan_acceleration - 1.02).abs() < f64::EPSILON);
    }

    #[test]
    fn autoscroll_interval_is_sixty_hertz() {
        let interval = AutoscrollPolicy::default().interval();
        assert!(interval > Duration::from_millis(16));
        assert!(interval < Duration::from_millis(17));
    }

    #[test]
    fn multiple_validation_errors_collected() {
        let mut config = EngineConfig::default();
        config.repaint.union_threshold = 0;
        config.autoscroll.pan_acceleration = 0.5;
        config.scroll.pixels_per_line = 0;
        config.timers.floor_ms = 0;
        let errors = config.validate();
        assert!(errors.len() >= 4, "should catch multiple errors: {errors:?}");
    }

    #[test]
    fn nan_interval_rejected() {
        let mut config = EngineConfig::default();
        config.autoscroll.interval_ms = f64::NAN;
        assert_eq!(config.validate().len(), 1);
    }

    #[test]
    fn timer_clamp_below_nesting_limit_uses_floor() {
        let policy = TimerPolicy::default();
        assert_eq!(
            policy.clamp_interval(Duration::ZERO, 0),
            Duration::from_millis(1)
        );
        assert_eq!(
            policy.clamp_interval(Duration::from_millis(4), 4),
            Duration::from_millis(4)
        );
    }

    #[test]
    fn timer_clamp_at_nesting_limit_uses_minimum() {
        let policy = TimerPolicy::default();
        assert_eq!(
            policy.clamp_interval(Duration::from_millis(4), 5),
            Duration::from_millis(10)
        );
        assert_eq!(
            policy.clamp_interval(Duration::from_millis(40), 9),
            Duration::from_millis(40)
        );
    }

    #[test]
    fn validation_error_display_joins() {
        let err = ConfigError::Validation(vec!["a".into(), "b".into()]);
        assert_eq!(err.to_string(), "validation errors: a; b");
    }

    #[cfg(feature = "config")]
    #[test]
    fn partial_toml_preserves_defaults() {
        let config = EngineConfig::from_toml_str(
            "[keyboard]\nneeds_keypress_compat_mode = true\n\n[repaint]\nunion_threshold = 8\n",
        )
        .unwrap();
        assert!(config.keyboard.needs_keypress_compat_mode);
        assert_eq!(config.repaint.union_threshold, 8);
        assert_eq!(config.repaint.deferred_delay_ms, 25);
        assert_eq!(config.drag, DragPolicy::default());
    }

    #[cfg(feature = "config")]
    #[test]
    fn json_out_of_range_is_validation_error() {
        let err = EngineConfig::from_json_str(r#"{"scroll":{"pixels_per_line":0}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)), "{err}");
    }

    #[cfg(feature = "config")]
    #[test]
    fn toml_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("webframe.toml");
        std::fs::write(&path, "[drag]\nlink_hysteresis = 12\n").unwrap();
        let config = EngineConfig::from_toml_file(&path).unwrap();
        assert_eq!(config.drag.link_hysteresis, 12);
    }

    #[cfg(feature = "config")]
    #[test]
    fn missing_file_is_io_error() {
        let err = EngineConfig::from_toml_file("/nonexistent/webframe.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
