//! Dedicated OS-thread hotkey listener using `rdev::listen`.
//!
//! `rdev::listen` is a blocking call that must live on its own OS thread.
//! [`HotkeyListener`] owns that thread and a stop flag; dropping it sets the
//! flag so the callback silently ignores further events.
//!
//! # Shutdown caveat
//!
//! `rdev::listen` has **no graceful shutdown API**.  Setting the stop flag
//! prevents events from being forwarded, but the OS thread itself will remain
//! blocked in the rdev event loop until the process exits.  This is safe and
//! expected — rdev holds no resources that need explicit cleanup.  Restarting
//! the hotkey (settings change) therefore means dropping the old handle and
//! starting a new one.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use tokio::sync::mpsc;

use super::{Chord, HotkeyEvent, Modifiers};

// ---------------------------------------------------------------------------
// ModifierState
// ---------------------------------------------------------------------------

/// Live modifier key state tracked from raw press/release events.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct ModifierState {
    ctrl: bool,
    shift: bool,
    alt: bool,
    win: bool,
}

impl ModifierState {
    /// Update the state for a press (`down = true`) or release of `key`.
    /// Non-modifier keys are ignored.
    fn update(&mut self, key: rdev::Key, down: bool) {
        use rdev::Key;
        match key {
            Key::ControlLeft | Key::ControlRight => self.ctrl = down,
            Key::ShiftLeft | Key::ShiftRight => self.shift = down,
            Key::Alt | Key::AltGr => self.alt = down,
            Key::MetaLeft | Key::MetaRight => self.win = down,
            _ => {}
        }
    }

    /// `true` when every modifier the chord requires is currently held.
    /// Extra held modifiers do not disqualify the chord.
    fn satisfies(&self, required: &Modifiers) -> bool {
        (!required.ctrl || self.ctrl)
            && (!required.shift || self.shift)
            && (!required.alt || self.alt)
            && (!required.win || self.win)
    }
}

// ---------------------------------------------------------------------------
// HotkeyListener
// ---------------------------------------------------------------------------

/// Handle to a running hotkey listener thread.
///
/// Construct one with [`HotkeyListener::start`].  Drop it to stop forwarding
/// events.
pub struct HotkeyListener {
    /// Shared stop flag — set `true` on [`Drop`].
    stop: Arc<AtomicBool>,
    /// Kept so the thread is not detached prematurely; never joined because
    /// `rdev::listen` never returns.
    _thread: std::thread::JoinHandle<()>,
}

impl HotkeyListener {
    /// Spawn a dedicated OS thread that listens for global key events and
    /// sends [`HotkeyEvent::Toggle`] on `tx` whenever `chord` is pressed.
    ///
    /// The background thread uses `blocking_send` so it works correctly from
    /// a non-async context.
    ///
    /// # Panics
    ///
    /// Panics if the OS refuses to create the thread (extremely unlikely).
    pub fn start(chord: Chord, tx: mpsc::Sender<HotkeyEvent>) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_clone = Arc::clone(&stop);

        let thread = std::thread::Builder::new()
            .name("hotkey-listener".into())
            .spawn(move || {
                let mut modifiers = ModifierState::default();

                let result = rdev::listen(move |event| {
                    if stop_clone.load(Ordering::Relaxed) {
                        return;
                    }

                    match event.event_type {
                        rdev::EventType::KeyPress(k) => {
                            modifiers.update(k, true);
                            if k == chord.key && modifiers.satisfies(&chord.modifiers) {
                                let _ = tx.blocking_send(HotkeyEvent::Toggle);
                            }
                        }
                        rdev::EventType::KeyRelease(k) => {
                            modifiers.update(k, false);
                        }
                        _ => {}
                    }
                });

                if let Err(e) = result {
                    log::error!("hotkey-listener: rdev::listen exited with error: {:?}", e);
                }
            })
            .expect("failed to spawn hotkey-listener thread");

        Self {
            stop,
            _thread: thread,
        }
    }
}

impl Drop for HotkeyListener {
    /// Set the stop flag so the rdev callback stops forwarding events.
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
