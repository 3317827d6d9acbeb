//! Paste keystroke strategies, ordered from most to least compatible.
//!
//! Delivering Ctrl+V to an arbitrary focused window is unreliable enough that
//! three methods are tried in order:
//!
//! 1. [`KeybdEventPaste`] — the legacy `keybd_event` press/release pair,
//!    which older applications accept most readily.
//! 2. [`SendInputPaste`] — one `SendInput` batch of all four key transitions,
//!    verified by comparing the injected count against the requested count.
//! 3. [`EnigoPaste`] — releases every modifier (a stuck physical Ctrl/Shift
//!    from the hotkey chord corrupts the injected chord) and then sends
//!    Ctrl+V through the `enigo` helper.
//!
//! No strategy result is trusted blindly: each reports success only when the
//! OS call's return value confirms delivery.

use enigo::{Direction, Enigo, Key, Keyboard, Settings};

use super::DeliveryError;

// ---------------------------------------------------------------------------
// PasteStrategy trait
// ---------------------------------------------------------------------------

/// One method of injecting the paste shortcut into the focused window.
pub trait PasteStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn send_paste(&self) -> Result<(), DeliveryError>;
}

// ---------------------------------------------------------------------------
// EnigoPaste
// ---------------------------------------------------------------------------

/// Last-resort strategy: release all modifiers, then Ctrl+V via `enigo`.
///
/// A new [`Enigo`] instance is created per call because `Enigo` is not `Send`
/// and the handle is cheap to construct.
pub struct EnigoPaste;

impl PasteStrategy for EnigoPaste {
    fn name(&self) -> &'static str {
        "enigo"
    }

    fn send_paste(&self) -> Result<(), DeliveryError> {
        let mut enigo = Enigo::new(&Settings::default())
            .map_err(|e| DeliveryError::KeySimulation(e.to_string()))?;

        // The user may still be holding the hotkey chord; a held Shift or Alt
        // would turn Ctrl+V into a different shortcut in the target app.
        for key in [Key::Control, Key::Shift, Key::Alt, Key::Meta] {
            let _ = enigo.key(key, Direction::Release);
        }

        enigo
            .key(Key::Control, Direction::Press)
            .map_err(|e| DeliveryError::KeySimulation(e.to_string()))?;
        enigo
            .key(Key::Unicode('v'), Direction::Click)
            .map_err(|e| DeliveryError::KeySimulation(e.to_string()))?;
        enigo
            .key(Key::Control, Direction::Release)
            .map_err(|e| DeliveryError::KeySimulation(e.to_string()))?;

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Windows-native strategies
// ---------------------------------------------------------------------------

/// Legacy `keybd_event` press/release pair (Ctrl down, V down, V up, Ctrl up).
#[cfg(target_os = "windows")]
pub struct KeybdEventPaste;

/// One `SendInput` batch carrying all four key transitions.
#[cfg(target_os = "windows")]
pub struct SendInputPaste;

#[cfg(target_os = "windows")]
mod win32 {
    use super::{DeliveryError, KeybdEventPaste, PasteStrategy, SendInputPaste};

    use windows_sys::Win32::Foundation::{GetLastError, SetLastError};
    use windows_sys::Win32::UI::Input::KeyboardAndMouse::{
        keybd_event, SendInput, INPUT, INPUT_0, INPUT_KEYBOARD, KEYBDINPUT, KEYEVENTF_KEYUP,
        VK_CONTROL, VK_V,
    };

    fn key_input(vk: u16, flags: u32) -> INPUT {
        INPUT {
            r#type: INPUT_KEYBOARD,
            Anonymous: INPUT_0 {
                ki: KEYBDINPUT {
                    wVk: vk,
                    wScan: 0,
                    dwFlags: flags,
                    time: 0,
                    dwExtraInfo: 0,
                },
            },
        }
    }

    impl PasteStrategy for KeybdEventPaste {
        fn name(&self) -> &'static str {
            "keybd_event"
        }

        fn send_paste(&self) -> Result<(), DeliveryError> {
            unsafe {
                // keybd_event has no return value; a clean last-error after
                // the sequence is the only confirmation available.
                SetLastError(0);
                keybd_event(VK_CONTROL as u8, 0, 0, 0);
                keybd_event(VK_V as u8, 0, 0, 0);
                keybd_event(VK_V as u8, 0, KEYEVENTF_KEYUP, 0);
                keybd_event(VK_CONTROL as u8, 0, KEYEVENTF_KEYUP, 0);

                let error = GetLastError();
                if error != 0 {
                    return Err(DeliveryError::Injection(format!(
                        "keybd_event reported error {error}"
                    )));
                }
            }
            Ok(())
        }
    }

    impl PasteStrategy for SendInputPaste {
        fn name(&self) -> &'static str {
            "SendInput"
        }

        fn send_paste(&self) -> Result<(), DeliveryError> {
            let inputs = [
                key_input(VK_CONTROL, 0),
                key_input(VK_V, 0),
                key_input(VK_V, KEYEVENTF_KEYUP),
                key_input(VK_CONTROL, KEYEVENTF_KEYUP),
            ];

            let sent = unsafe {
                SendInput(
                    inputs.len() as u32,
                    inputs.as_ptr(),
                    std::mem::size_of::<INPUT>() as i32,
                )
            };

            if sent as usize != inputs.len() {
                return Err(DeliveryError::Injection(format!(
                    "SendInput injected {sent}/{} events (error {})",
                    inputs.len(),
                    unsafe { GetLastError() }
                )));
            }
            Ok(())
        }
    }
}
