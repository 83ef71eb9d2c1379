use kickoff_core::Result;
use tracing::debug;

/// Switch the invoking console's output code page (65001 renders UTF-8).
///
/// Only Windows consoles have code pages; elsewhere this is a no-op.
pub fn set_output_code_page(code_page: u32) -> Result<()> {
    #[cfg(windows)]
    {
        use windows_sys::Win32::System::Console::SetConsoleOutputCP;

        // SAFETY: plain FFI call with no pointers
        if unsafe { SetConsoleOutputCP(code_page) } == 0 {
            return Err(std::io::Error::last_os_error().into());
        }
        debug!(code_page, "Console output code page set");
    }

    #[cfg(not(windows))]
    debug!(code_page, "No console code pages on this platform, leaving locale as is");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(not(windows))]
    #[test]
    fn test_code_page_is_noop_off_windows() {
        assert!(set_output_code_page(kickoff_core::UTF8_CODE_PAGE).is_ok());
    }
}
