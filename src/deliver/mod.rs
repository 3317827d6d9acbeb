//! Text delivery — clipboard write plus paste-keystroke injection.
//!
//! # Sequence
//!
//! 1. Write the text through an ordered [`ClipboardWriter`] chain; the first
//!    success short-circuits.  If every writer fails the write is abandoned,
//!    but the paste is **still attempted** — it will paste whatever the
//!    clipboard already held.  This mirrors long-standing behaviour users
//!    rely on and is deliberate, not an oversight.
//! 2. Read the clipboard back and compare byte-for-byte; a mismatch is
//!    logged, never fatal.
//! 3. Wait a short fixed delay so the clipboard propagates.
//! 4. Inject Ctrl+V through an ordered [`PasteStrategy`] chain; the first
//!    strategy whose OS call confirms delivery ends the sequence.
//!
//! Every failure in this module is logged and non-fatal: worst case the text
//! sits on the clipboard and the user pastes manually.

pub mod clipboard;
pub mod paste;

pub use clipboard::{ArboardWriter, ClipboardWriter};
pub use paste::{EnigoPaste, PasteStrategy};

#[cfg(target_os = "windows")]
pub use clipboard::Win32Writer;
#[cfg(target_os = "windows")]
pub use paste::{KeybdEventPaste, SendInputPaste};

use std::time::Duration;

use thiserror::Error;

// ---------------------------------------------------------------------------
// DeliveryError
// ---------------------------------------------------------------------------

/// All errors that can surface during text delivery.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Could not open or read the system clipboard.
    #[error("cannot access clipboard: {0}")]
    ClipboardAccess(String),

    /// Could not write text to the system clipboard.
    #[error("cannot set clipboard text: {0}")]
    ClipboardSet(String),

    /// Could not simulate a key press/release event.
    #[error("cannot simulate key press: {0}")]
    KeySimulation(String),

    /// The OS accepted the call but reported incomplete delivery.
    #[error("keystroke injection incomplete: {0}")]
    Injection(String),
}

// ---------------------------------------------------------------------------
// TextDelivery
// ---------------------------------------------------------------------------

/// Milliseconds to wait between the clipboard write and the paste keystroke.
const SETTLE_DELAY: Duration = Duration::from_millis(100);

/// Ordered-strategy text delivery.
///
/// Construct with [`TextDelivery::new`] for the platform defaults, or
/// [`TextDelivery::with_parts`] to supply custom chains (used by tests and
/// embedding layers).  All methods are blocking; the controller calls them
/// under `spawn_blocking`.
pub struct TextDelivery {
    writers: Vec<Box<dyn ClipboardWriter>>,
    strategies: Vec<Box<dyn PasteStrategy>>,
    settle_delay: Duration,
}

impl TextDelivery {
    /// Platform default chains.
    ///
    /// Windows: arboard → raw Win32 clipboard; keybd_event → SendInput →
    /// enigo.  Elsewhere: arboard; enigo.
    pub fn new() -> Self {
        #[cfg(target_os = "windows")]
        {
            Self::with_parts(
                vec![Box::new(ArboardWriter), Box::new(Win32Writer)],
                vec![
                    Box::new(KeybdEventPaste),
                    Box::new(SendInputPaste),
                    Box::new(EnigoPaste),
                ],
                SETTLE_DELAY,
            )
        }
        #[cfg(not(target_os = "windows"))]
        {
            Self::with_parts(
                vec![Box::new(ArboardWriter)],
                vec![Box::new(EnigoPaste)],
                SETTLE_DELAY,
            )
        }
    }

    /// Build a delivery with explicit chains and settle delay.
    pub fn with_parts(
        writers: Vec<Box<dyn ClipboardWriter>>,
        strategies: Vec<Box<dyn PasteStrategy>>,
        settle_delay: Duration,
    ) -> Self {
        Self {
            writers,
            strategies,
            settle_delay,
        }
    }

    /// Write `text` to the clipboard and inject the paste shortcut.
    ///
    /// No-op on empty text.  Never returns an error — every failure mode is
    /// logged and the sequence degrades as documented in the module header.
    pub fn write_and_paste(&self, text: &str) {
        if text.is_empty() {
            log::debug!("delivery: empty text, nothing to paste");
            return;
        }

        log::info!("delivery: writing {} bytes to clipboard", text.len());
        let wrote = self.write_clipboard(text);
        if wrote {
            self.verify_clipboard(text);
        }
        // Paste regardless of the write outcome (documented quirk: a failed
        // write pastes the stale clipboard contents).

        std::thread::sleep(self.settle_delay);
        self.send_paste();
    }

    /// Clipboard-write chain only, used for manual "copy" actions.
    pub fn write_only(&self, text: &str) {
        if text.is_empty() {
            log::debug!("delivery: empty text, nothing to copy");
            return;
        }
        self.write_clipboard(text);
    }

    /// Try each writer in order; `true` when one succeeded.
    fn write_clipboard(&self, text: &str) -> bool {
        for writer in &self.writers {
            match writer.write(text) {
                Ok(()) => {
                    log::debug!("delivery: clipboard written via {}", writer.name());
                    return true;
                }
                Err(e) => {
                    log::warn!("delivery: clipboard write via {} failed: {e}", writer.name());
                }
            }
        }
        log::error!("delivery: every clipboard write method failed");
        false
    }

    /// Read the clipboard back through the first capable writer and compare.
    fn verify_clipboard(&self, expected: &str) {
        for writer in &self.writers {
            if let Some(actual) = writer.read_back() {
                if actual != expected {
                    log::warn!(
                        "delivery: clipboard verification mismatch via {} \
                         (expected {} bytes, found {})",
                        writer.name(),
                        expected.len(),
                        actual.len()
                    );
                }
                return;
            }
        }
        log::debug!("delivery: no writer could read the clipboard back");
    }

    /// Try each paste strategy in order until one confirms delivery.
    fn send_paste(&self) {
        for strategy in &self.strategies {
            match strategy.send_paste() {
                Ok(()) => {
                    log::debug!("delivery: paste sent via {}", strategy.name());
                    return;
                }
                Err(e) => {
                    log::warn!("delivery: paste via {} failed: {e}", strategy.name());
                }
            }
        }
        log::error!("delivery: every paste strategy failed; text remains on the clipboard");
    }
}

impl Default for TextDelivery {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
