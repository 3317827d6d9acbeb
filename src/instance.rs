//! Single-instance guard.
//!
//! On Windows a named mutex marks the running instance; a second launch sees
//! `ERROR_ALREADY_EXISTS` and exits instead of registering a duplicate hotkey
//! and fighting over the microphone.  On other platforms the guard is a
//! no-op (development convenience only — the product targets Windows).

/// Process-wide single-instance guard.  Hold it for the process lifetime;
/// dropping it releases the mutex.
pub struct SingleInstance {
    already_running: bool,
    #[cfg(target_os = "windows")]
    handle: isize,
}

impl SingleInstance {
    /// `true` when another instance owned the name first.
    pub fn already_running(&self) -> bool {
        self.already_running
    }

    #[cfg(target_os = "windows")]
    pub fn acquire(name: &str) -> Self {
        use windows_sys::Win32::Foundation::{GetLastError, ERROR_ALREADY_EXISTS};
        use windows_sys::Win32::System::Threading::CreateMutexW;

        let wide: Vec<u16> = name.encode_utf16().chain(std::iter::once(0)).collect();
        let handle = unsafe { CreateMutexW(std::ptr::null(), 0, wide.as_ptr()) };
        let already_running = unsafe { GetLastError() } == ERROR_ALREADY_EXISTS;

        if already_running {
            log::info!("single-instance mutex already held, another instance is running");
        } else {
            log::info!("single-instance mutex acquired");
        }

        Self {
            already_running,
            handle,
        }
    }

    #[cfg(not(target_os = "windows"))]
    pub fn acquire(_name: &str) -> Self {
        Self {
            already_running: false,
        }
    }
}

#[cfg(target_os = "windows")]
impl Drop for SingleInstance {
    fn drop(&mut self) {
        use windows_sys::Win32::Foundation::CloseHandle;
        use windows_sys::Win32::System::Threading::ReleaseMutex;

        if self.handle != 0 && !self.already_running {
            unsafe {
                ReleaseMutex(self.handle);
            }
        }
        if self.handle != 0 {
            unsafe {
                CloseHandle(self.handle);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(not(target_os = "windows"))]
    #[test]
    fn non_windows_guard_never_reports_running() {
        let guard = SingleInstance::acquire("voicekey-test");
        assert!(!guard.already_running());
    }
}
