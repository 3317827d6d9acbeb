//! Clipboard writers, ordered from friendly to raw.
//!
//! [`ArboardWriter`] is the primary method.  On Windows a second,
//! lower-level writer talks to the clipboard API directly — allocating
//! movable global memory, copying NUL-terminated UTF-16 into it and handing
//! it over with `SetClipboardData` — for the occasions where arboard loses a
//! race against another clipboard viewer.  Both implement [`ClipboardWriter`]
//! so the delivery layer can try them in order.

use arboard::Clipboard;

use super::DeliveryError;

// ---------------------------------------------------------------------------
// ClipboardWriter trait
// ---------------------------------------------------------------------------

/// One method of writing text to the system clipboard.
///
/// `read_back` re-reads the clipboard for post-write verification; `None`
/// means this writer cannot read (or the clipboard holds no text).
pub trait ClipboardWriter: Send + Sync {
    fn name(&self) -> &'static str;

    fn write(&self, text: &str) -> Result<(), DeliveryError>;

    fn read_back(&self) -> Option<String>;
}

// ---------------------------------------------------------------------------
// ArboardWriter
// ---------------------------------------------------------------------------

/// Primary clipboard writer backed by the `arboard` crate.
///
/// A short-lived [`arboard::Clipboard`] handle is created per call because
/// the handle is not `Send` on all platforms and is cheap to construct.
pub struct ArboardWriter;

impl ClipboardWriter for ArboardWriter {
    fn name(&self) -> &'static str {
        "arboard"
    }

    fn write(&self, text: &str) -> Result<(), DeliveryError> {
        let mut clipboard =
            Clipboard::new().map_err(|e| DeliveryError::ClipboardAccess(e.to_string()))?;
        clipboard
            .set_text(text)
            .map_err(|e| DeliveryError::ClipboardSet(e.to_string()))
    }

    fn read_back(&self) -> Option<String> {
        Clipboard::new().ok()?.get_text().ok()
    }
}

// ---------------------------------------------------------------------------
// Win32Writer
// ---------------------------------------------------------------------------

/// Raw Win32 clipboard writer: `OpenClipboard` (with a short retry loop,
/// since another process may hold the clipboard), `GlobalAlloc` of movable
/// memory, UTF-16 copy, `SetClipboardData`.
#[cfg(target_os = "windows")]
pub struct Win32Writer;

#[cfg(target_os = "windows")]
mod win32 {
    use super::{ClipboardWriter, DeliveryError, Win32Writer};
    use std::time::Duration;

    use windows_sys::Win32::Foundation::GetLastError;
    use windows_sys::Win32::System::DataExchange::{
        CloseClipboard, EmptyClipboard, GetClipboardData, OpenClipboard, SetClipboardData,
    };
    use windows_sys::Win32::System::Memory::{GlobalAlloc, GlobalLock, GlobalUnlock};

    const CF_UNICODETEXT: u32 = 13;
    const GMEM_MOVEABLE: u32 = 0x0002;
    const OPEN_RETRIES: usize = 5;

    /// Closes the clipboard when the scope ends, success or failure.
    struct ClipboardGuard;

    impl Drop for ClipboardGuard {
        fn drop(&mut self) {
            unsafe {
                CloseClipboard();
            }
        }
    }

    fn open_clipboard_with_retry() -> bool {
        for _ in 0..OPEN_RETRIES {
            if unsafe { OpenClipboard(0) } != 0 {
                return true;
            }
            std::thread::sleep(Duration::from_millis(50));
        }
        false
    }

    impl ClipboardWriter for Win32Writer {
        fn name(&self) -> &'static str {
            "win32"
        }

        fn write(&self, text: &str) -> Result<(), DeliveryError> {
            let utf16: Vec<u16> = text.encode_utf16().chain(std::iter::once(0)).collect();
            let size = utf16.len() * std::mem::size_of::<u16>();

            if !open_clipboard_with_retry() {
                return Err(DeliveryError::ClipboardAccess(format!(
                    "OpenClipboard failed: {}",
                    unsafe { GetLastError() }
                )));
            }
            let _guard = ClipboardGuard;

            unsafe {
                if EmptyClipboard() == 0 {
                    return Err(DeliveryError::ClipboardSet(format!(
                        "EmptyClipboard failed: {}",
                        GetLastError()
                    )));
                }

                let hglobal = GlobalAlloc(GMEM_MOVEABLE, size);
                if hglobal.is_null() {
                    return Err(DeliveryError::ClipboardSet(format!(
                        "GlobalAlloc failed: {}",
                        GetLastError()
                    )));
                }

                let locked = GlobalLock(hglobal);
                if locked.is_null() {
                    return Err(DeliveryError::ClipboardSet(format!(
                        "GlobalLock failed: {}",
                        GetLastError()
                    )));
                }
                std::ptr::copy_nonoverlapping(utf16.as_ptr(), locked as *mut u16, utf16.len());
                GlobalUnlock(hglobal);

                // Ownership of hglobal passes to the system on success.
                if SetClipboardData(CF_UNICODETEXT, hglobal as isize) == 0 {
                    return Err(DeliveryError::ClipboardSet(format!(
                        "SetClipboardData failed: {}",
                        GetLastError()
                    )));
                }
            }

            Ok(())
        }

        fn read_back(&self) -> Option<String> {
            if !open_clipboard_with_retry() {
                return None;
            }
            let _guard = ClipboardGuard;

            unsafe {
                let handle = GetClipboardData(CF_UNICODETEXT);
                if handle == 0 {
                    return None;
                }
                let locked = GlobalLock(handle as *mut core::ffi::c_void);
                if locked.is_null() {
                    return None;
                }

                let ptr = locked as *const u16;
                let mut len = 0usize;
                while *ptr.add(len) != 0 {
                    len += 1;
                }
                let text = String::from_utf16_lossy(std::slice::from_raw_parts(ptr, len));
                GlobalUnlock(handle as *mut core::ffi::c_void);
                Some(text)
            }
        }
    }
}
