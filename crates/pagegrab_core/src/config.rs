//! Configuration loading from environment variables.

use crate::constants::*;
use serde::Deserialize;
use std::env;
use std::time::Duration;
use tracing::warn;

/// How the activation combo turns the overlay on and off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivationMode {
    /// The overlay is active while the combo is held; releasing it deactivates.
    #[default]
    Hold,
    /// Holding the combo toggles the overlay; releasing it leaves it active.
    Toggle,
}

impl ActivationMode {
    /// Parses `hold` / `toggle` (case-insensitive).
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "hold" => Some(Self::Hold),
            "toggle" => Some(Self::Toggle),
            _ => None,
        }
    }
}

/// Runtime configuration for the overlay engine.
///
/// Millisecond fields are kept as plain integers so the struct can be loaded
/// from env vars or replay scripts; use the `*_duration` accessors in code.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub activation_mode: ActivationMode,
    pub activation_key: char,
    pub keep_active_after_copy: bool,
    pub key_hold_ms: u64,
    pub text_input_hold_extension_ms: u64,
    pub drag_threshold_px: f32,
    pub drag_preview_debounce_ms: u64,
    pub hit_test_throttle_ms: u64,
    pub hit_test_stale_ms: u64,
    pub copied_feedback_ms: u64,
    pub label_fade_delay_ms: u64,
    pub label_fade_duration_ms: u64,
    pub grabbed_box_ttl_ms: u64,
    pub keydown_spam_silence_ms: u64,
    pub hidden_tab_grace_ms: u64,
    pub history_limit: usize,
    pub history_flash_ms: u64,
    pub snap_projection_ms: f32,
    pub toolbar_margin_px: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            activation_mode: ActivationMode::Hold,
            activation_key: DEFAULT_ACTIVATION_KEY,
            keep_active_after_copy: false,
            key_hold_ms: DEFAULT_KEY_HOLD_MS,
            text_input_hold_extension_ms: TEXT_INPUT_HOLD_EXTENSION_MS,
            drag_threshold_px: DRAG_THRESHOLD_PX,
            drag_preview_debounce_ms: DRAG_PREVIEW_DEBOUNCE_MS,
            hit_test_throttle_ms: HIT_TEST_THROTTLE_MS,
            hit_test_stale_ms: HIT_TEST_STALE_MS,
            copied_feedback_ms: COPIED_FEEDBACK_MS,
            label_fade_delay_ms: LABEL_FADE_DELAY_MS,
            label_fade_duration_ms: LABEL_FADE_DURATION_MS,
            grabbed_box_ttl_ms: GRABBED_BOX_TTL_MS,
            keydown_spam_silence_ms: KEYDOWN_SPAM_SILENCE_MS,
            hidden_tab_grace_ms: HIDDEN_TAB_GRACE_MS,
            history_limit: DEFAULT_HISTORY_LIMIT,
            history_flash_ms: HISTORY_FLASH_MS,
            snap_projection_ms: SNAP_PROJECTION_MS,
            toolbar_margin_px: TOOLBAR_EDGE_MARGIN_PX,
        }
    }
}

/// Parse a boolean-like environment flag value.
///
/// # Supported Values
/// - Truthy: `1`, `true`, `yes`, `on`
/// - Falsy: `0`, `false`, `no`, `off`, empty string
///
/// Matching is case-insensitive and ignores surrounding whitespace.
///
/// # Returns
/// `Some(bool)` when the value is recognized, otherwise `None`.
pub fn parse_env_flag(value: &str) -> Option<bool> {
    let normalized = value.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "" | "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Read a boolean flag from the environment.
///
/// Missing or unrecognized values are treated as `false`.
pub fn env_flag_enabled(name: &str) -> bool {
    env::var(name)
        .ok()
        .and_then(|value| parse_env_flag(&value))
        .unwrap_or(false)
}

fn parsed<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    let value = raw.trim().parse().ok();
    if value.is_none() {
        warn!(key, value = %raw, "ignoring unparsable config value");
    }
    value
}

/// Millisecond timings above [`MAX_TIMING_MS`] are rejected in favour of the
/// default.
fn parsed_ms(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<u64> {
    parsed(lookup, key).filter(|ms: &u64| {
        let in_range = *ms <= MAX_TIMING_MS;
        if !in_range {
            warn!(key, ms, max = MAX_TIMING_MS, "ignoring out-of-range timing");
        }
        in_range
    })
}

fn millis(ms: u64) -> Duration {
    Duration::from_millis(ms.min(MAX_TIMING_MS))
}

impl Config {
    /// Load configuration from `PAGEGRAB_*` environment variables.
    ///
    /// # Returns
    /// A populated [`Config`] with defaults applied when env vars are missing
    /// or unparsable.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    ///
    /// Kept separate from [`Config::from_env`] so tests can feed values without
    /// mutating the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            activation_mode: lookup("PAGEGRAB_ACTIVATION_MODE")
                .and_then(|raw| ActivationMode::parse(&raw))
                .unwrap_or(defaults.activation_mode),
            activation_key: lookup("PAGEGRAB_ACTIVATION_KEY")
                .and_then(|raw| {
                    let mut chars = raw.trim().chars();
                    match (chars.next(), chars.next()) {
                        (Some(ch), None) => Some(ch.to_ascii_lowercase()),
                        _ => None,
                    }
                })
                .unwrap_or(defaults.activation_key),
            keep_active_after_copy: lookup("PAGEGRAB_KEEP_ACTIVE_AFTER_COPY")
                .and_then(|raw| parse_env_flag(&raw))
                .unwrap_or(defaults.keep_active_after_copy),
            key_hold_ms: parsed_ms(&lookup, "PAGEGRAB_KEY_HOLD_MS").unwrap_or(defaults.key_hold_ms),
            text_input_hold_extension_ms: parsed_ms(&lookup, "PAGEGRAB_TEXT_INPUT_HOLD_EXTENSION_MS")
                .unwrap_or(defaults.text_input_hold_extension_ms),
            drag_threshold_px: parsed(&lookup, "PAGEGRAB_DRAG_THRESHOLD_PX")
                .filter(|value: &f32| value.is_finite() && *value >= 0.0)
                .unwrap_or(defaults.drag_threshold_px),
            drag_preview_debounce_ms: parsed_ms(&lookup, "PAGEGRAB_DRAG_PREVIEW_DEBOUNCE_MS")
                .unwrap_or(defaults.drag_preview_debounce_ms),
            hit_test_throttle_ms: parsed_ms(&lookup, "PAGEGRAB_HIT_TEST_THROTTLE_MS")
                .unwrap_or(defaults.hit_test_throttle_ms),
            hit_test_stale_ms: parsed_ms(&lookup, "PAGEGRAB_HIT_TEST_STALE_MS")
                .unwrap_or(defaults.hit_test_stale_ms),
            copied_feedback_ms: parsed_ms(&lookup, "PAGEGRAB_COPIED_FEEDBACK_MS")
                .unwrap_or(defaults.copied_feedback_ms),
            label_fade_delay_ms: parsed_ms(&lookup, "PAGEGRAB_LABEL_FADE_DELAY_MS")
                .unwrap_or(defaults.label_fade_delay_ms),
            label_fade_duration_ms: parsed_ms(&lookup, "PAGEGRAB_LABEL_FADE_DURATION_MS")
                .unwrap_or(defaults.label_fade_duration_ms),
            grabbed_box_ttl_ms: parsed_ms(&lookup, "PAGEGRAB_GRABBED_BOX_TTL_MS")
                .unwrap_or(defaults.grabbed_box_ttl_ms),
            keydown_spam_silence_ms: parsed_ms(&lookup, "PAGEGRAB_KEYDOWN_SPAM_SILENCE_MS")
                .unwrap_or(defaults.keydown_spam_silence_ms),
            hidden_tab_grace_ms: parsed_ms(&lookup, "PAGEGRAB_HIDDEN_TAB_GRACE_MS")
                .unwrap_or(defaults.hidden_tab_grace_ms),
            history_limit: parsed(&lookup, "PAGEGRAB_HISTORY_LIMIT")
                .filter(|limit: &usize| *limit > 0)
                .unwrap_or(defaults.history_limit),
            history_flash_ms: parsed_ms(&lookup, "PAGEGRAB_HISTORY_FLASH_MS")
                .unwrap_or(defaults.history_flash_ms),
            snap_projection_ms: parsed(&lookup, "PAGEGRAB_SNAP_PROJECTION_MS")
                .filter(|value: &f32| value.is_finite() && *value >= 0.0)
                .unwrap_or(defaults.snap_projection_ms),
            toolbar_margin_px: parsed(&lookup, "PAGEGRAB_TOOLBAR_MARGIN_PX")
                .filter(|value: &f32| value.is_finite() && *value >= 0.0)
                .unwrap_or(defaults.toolbar_margin_px),
        }
    }

    /// Hold duration for a press that started outside text inputs.
    pub fn hold_duration(&self) -> Duration {
        millis(self.key_hold_ms)
    }

    /// Hold duration for a press that started inside a text field or with a
    /// live text selection.
    pub fn extended_hold_duration(&self) -> Duration {
        millis(self.key_hold_ms.saturating_add(self.text_input_hold_extension_ms))
    }

    pub fn drag_preview_debounce(&self) -> Duration {
        millis(self.drag_preview_debounce_ms)
    }

    pub fn hit_test_throttle(&self) -> Duration {
        millis(self.hit_test_throttle_ms)
    }

    pub fn hit_test_stale(&self) -> Duration {
        millis(self.hit_test_stale_ms)
    }

    pub fn copied_feedback(&self) -> Duration {
        millis(self.copied_feedback_ms)
    }

    pub fn label_fade_delay(&self) -> Duration {
        millis(self.label_fade_delay_ms)
    }

    pub fn label_fade_duration(&self) -> Duration {
        millis(self.label_fade_duration_ms)
    }

    pub fn grabbed_box_ttl(&self) -> Duration {
        millis(self.grabbed_box_ttl_ms)
    }

    pub fn keydown_spam_silence(&self) -> Duration {
        millis(self.keydown_spam_silence_ms)
    }

    pub fn hidden_tab_grace(&self) -> Duration {
        millis(self.hidden_tab_grace_ms)
    }

    pub fn history_flash(&self) -> Duration {
        millis(self.history_flash_ms)
    }
}
