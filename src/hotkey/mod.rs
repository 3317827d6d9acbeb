//! Global toggle hotkey, backed by `rdev`.
//!
//! # Design
//!
//! `rdev::listen()` is a blocking OS-level call that never returns while the
//! process is alive.  It must run on a **dedicated OS thread** — it cannot be
//! used inside a tokio task.
//!
//! [`HotkeyListener::start`] spawns that dedicated thread and returns a
//! handle.  The thread tracks modifier state from raw key events and emits a
//! single [`HotkeyEvent::Toggle`] whenever the configured chord (e.g.
//! `Ctrl+Shift+Space`) is pressed.  The event goes onto a `tokio::sync::mpsc`
//! channel consumed by the controller's decision loop — the listener never
//! calls into pipeline logic itself.
//!
//! # Usage
//!
//! ```no_run
//! use tokio::sync::mpsc;
//! use voicekey::hotkey::{parse_chord, HotkeyListener};
//!
//! let (tx, mut rx) = mpsc::channel(16);
//! let chord = parse_chord("ctrl+shift+space").expect("unknown hotkey");
//! let _listener = HotkeyListener::start(chord, tx);
//! // In your async loop: while let Some(ev) = rx.recv().await { ... }
//! ```

pub mod listener;

pub use listener::HotkeyListener;

// ---------------------------------------------------------------------------
// HotkeyEvent
// ---------------------------------------------------------------------------

/// Events emitted by the hotkey listener thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotkeyEvent {
    /// The toggle chord was pressed.  Legal at any time, including while the
    /// pipeline is busy — the controller decides what it means.
    Toggle,
}

// ---------------------------------------------------------------------------
// Chord
// ---------------------------------------------------------------------------

/// Modifier keys that may participate in a chord.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
    pub win: bool,
}

/// A parsed hotkey: required modifiers plus one terminal key.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Chord {
    pub modifiers: Modifiers,
    pub key: rdev::Key,
}

// ---------------------------------------------------------------------------
// parse_chord
// ---------------------------------------------------------------------------

/// Parse a hotkey description like `"ctrl+shift+space"` into a [`Chord`].
///
/// Tokens are case-insensitive and separated by `+`.  All tokens but the last
/// must be modifiers (`ctrl`, `shift`, `alt`, `win`); the last token is the
/// terminal key.  Returns `None` for unrecognised tokens so callers can fall
/// back to a default or surface an error.
///
/// # Examples
///
/// ```
/// use voicekey::hotkey::parse_chord;
///
/// let chord = parse_chord("ctrl+shift+space").unwrap();
/// assert!(chord.modifiers.ctrl && chord.modifiers.shift);
/// assert_eq!(chord.key, rdev::Key::Space);
///
/// assert!(parse_chord("ctrl+banana").is_none());
/// ```
pub fn parse_chord(binding: &str) -> Option<Chord> {
    let tokens: Vec<String> = binding
        .split('+')
        .map(|t| t.trim().to_ascii_lowercase())
        .collect();
    let (key_token, modifier_tokens) = tokens.split_last()?;

    let mut modifiers = Modifiers::default();
    for token in modifier_tokens {
        match token.as_str() {
            "ctrl" | "control" => modifiers.ctrl = true,
            "shift" => modifiers.shift = true,
            "alt" => modifiers.alt = true,
            "win" | "meta" | "super" => modifiers.win = true,
            _ => return None,
        }
    }

    let key = parse_key(key_token)?;
    Some(Chord { modifiers, key })
}

/// Map a lowercase key token to an [`rdev::Key`].
fn parse_key(token: &str) -> Option<rdev::Key> {
    use rdev::Key;

    let key = match token {
        "f1" => Key::F1,
        "f2" => Key::F2,
        "f3" => Key::F3,
        "f4" => Key::F4,
        "f5" => Key::F5,
        "f6" => Key::F6,
        "f7" => Key::F7,
        "f8" => Key::F8,
        "f9" => Key::F9,
        "f10" => Key::F10,
        "f11" => Key::F11,
        "f12" => Key::F12,

        "space" => Key::Space,
        "escape" | "esc" => Key::Escape,
        "return" | "enter" => Key::Return,
        "tab" => Key::Tab,
        "backspace" => Key::Backspace,
        "insert" => Key::Insert,
        "delete" | "del" => Key::Delete,
        "home" => Key::Home,
        "end" => Key::End,
        "pageup" => Key::PageUp,
        "pagedown" => Key::PageDown,

        "a" => Key::KeyA,
        "b" => Key::KeyB,
        "c" => Key::KeyC,
        "d" => Key::KeyD,
        "e" => Key::KeyE,
        "f" => Key::KeyF,
        "g" => Key::KeyG,
        "h" => Key::KeyH,
        "i" => Key::KeyI,
        "j" => Key::KeyJ,
        "k" => Key::KeyK,
        "l" => Key::KeyL,
        "m" => Key::KeyM,
        "n" => Key::KeyN,
        "o" => Key::KeyO,
        "p" => Key::KeyP,
        "q" => Key::KeyQ,
        "r" => Key::KeyR,
        "s" => Key::KeyS,
        "t" => Key::KeyT,
        "u" => Key::KeyU,
        "v" => Key::KeyV,
        "w" => Key::KeyW,
        "x" => Key::KeyX,
        "y" => Key::KeyY,
        "z" => Key::KeyZ,

        _ => return None,
    };
    Some(key)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
