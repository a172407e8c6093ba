//! Host input events fed into [`crate::EngineRuntime::handle_input`].
//!
//! Pointer positions are viewport coordinates, matching what a host receives
//! from its event system. The engine converts to page space itself.

use pagegrab_core::Point;
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Key {
    Char(char),
    Escape,
    Enter,
    Tab,
    Backspace,
    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,
    Meta,
    Control,
    Shift,
    Alt,
    Other,
}

impl Key {
    /// Platform command modifier keys (Cmd on macOS, Ctrl elsewhere).
    pub fn is_command_modifier(self) -> bool {
        matches!(self, Key::Meta | Key::Control)
    }

    pub fn matches_char(self, expected: char) -> bool {
        matches!(self, Key::Char(c) if c.eq_ignore_ascii_case(&expected))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct Modifiers {
    pub meta: bool,
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        meta: false,
        ctrl: false,
        shift: false,
        alt: false,
    };

    pub const COMMAND: Modifiers = Modifiers {
        meta: true,
        ctrl: false,
        shift: false,
        alt: false,
    };

    pub fn command(&self) -> bool {
        self.meta || self.ctrl
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct KeyEvent {
    pub key: Key,
    #[serde(default)]
    pub modifiers: Modifiers,
    /// Auto-repeat keydown generated while the key stays pressed.
    #[serde(default)]
    pub repeat: bool,
    /// Focus was inside an editable field when the key went down.
    #[serde(default)]
    pub in_text_input: bool,
    /// The host had a non-empty text selection when the key went down.
    #[serde(default)]
    pub has_text_selection: bool,
}

impl KeyEvent {
    pub fn new(key: Key, modifiers: Modifiers) -> Self {
        Self {
            key,
            modifiers,
            repeat: false,
            in_text_input: false,
            has_text_selection: false,
        }
    }

    pub fn repeated(mut self) -> Self {
        self.repeat = true;
        self
    }

    pub fn in_text_input(mut self) -> Self {
        self.in_text_input = true;
        self
    }

    pub fn with_text_selection(mut self) -> Self {
        self.has_text_selection = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointerButton {
    #[default]
    Primary,
    Secondary,
    Middle,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct PointerEvent {
    pub position: Point,
    #[serde(default)]
    pub button: PointerButton,
    #[serde(default)]
    pub modifiers: Modifiers,
}

impl PointerEvent {
    pub fn at(x: f32, y: f32) -> Self {
        Self {
            position: Point::new(x, y),
            button: PointerButton::Primary,
            modifiers: Modifiers::NONE,
        }
    }
}

/// One host event.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputEvent {
    KeyDown(KeyEvent),
    KeyUp(KeyEvent),
    PointerMove(PointerEvent),
    PointerDown(PointerEvent),
    PointerUp(PointerEvent),
    Click(PointerEvent),
    ContextMenu(PointerEvent),
    /// The host's own copy event fired (the combo doubles as the copy
    /// shortcut).
    HostCopy,
    WindowBlur,
    VisibilityChange {
        hidden: bool,
    },
    Scroll {
        scroll_x: f32,
        scroll_y: f32,
    },
    Resize {
        width: f32,
        height: f32,
    },
}
