//! Shared constants used across pagegrab crates.

/// Default time the activation combo must be held before the overlay activates.
pub const DEFAULT_KEY_HOLD_MS: u64 = 150;

/// Extra hold time applied when the press starts inside a text field or while
/// the user has a live text selection.
pub const TEXT_INPUT_HOLD_EXTENSION_MS: u64 = 450;

/// Pointer travel (in CSS pixels) that turns a press into a drag.
pub const DRAG_THRESHOLD_PX: f32 = 4.0;

/// Debounce window for the live drag-selection preview.
pub const DRAG_PREVIEW_DEBOUNCE_MS: u64 = 32;

/// Minimum spacing between two pointer hit-tests.
pub const HIT_TEST_THROTTLE_MS: u64 = 16;

/// Hit-test replies older than this (relative to their request) are ignored.
pub const HIT_TEST_STALE_MS: u64 = 250;

/// How long the `JustCopied` state is shown before the engine settles.
pub const COPIED_FEEDBACK_MS: u64 = 1_500;

/// Delay before a settled label starts fading.
pub const LABEL_FADE_DELAY_MS: u64 = 1_500;

/// Duration of the label fade before the label is removed.
pub const LABEL_FADE_DURATION_MS: u64 = 300;

/// Time-to-live of a grabbed-element marker box.
pub const GRABBED_BOX_TTL_MS: u64 = 1_500;

/// Silence after the last repeated keydown that force-deactivates a hold activation.
pub const KEYDOWN_SPAM_SILENCE_MS: u64 = 250;

/// Grace period for a hidden tab before the overlay deactivates.
pub const HIDDEN_TAB_GRACE_MS: u64 = 1_000;

/// Maximum number of history items kept.
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Duration of the one-shot "new history item" flash cue.
pub const HISTORY_FLASH_MS: u64 = 600;

/// Look-ahead window used to project toolbar release velocity.
pub const SNAP_PROJECTION_MS: f32 = 150.0;

/// Gap between the snapped toolbar and the viewport edge.
pub const TOOLBAR_EDGE_MARGIN_PX: f32 = 16.0;

/// Gap between the toolbar and an anchored floating panel.
pub const PANEL_GAP_PX: f32 = 8.0;

/// Fraction of an element's area that must fall inside a drag rectangle for
/// the strict region pass to accept it.
pub const DRAG_STRICT_COVERAGE: f32 = 0.75;

/// Default activation key (pressed together with Cmd/Ctrl).
pub const DEFAULT_ACTIVATION_KEY: char = 'c';

/// Upper bound for every millisecond timing loaded from config. Larger values
/// are clamped so deadlines never overflow `Instant` arithmetic.
pub const MAX_TIMING_MS: u64 = 600_000;
