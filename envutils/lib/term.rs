//! Module containing terminal utilities

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Determines if stdout is an interactive terminal that understands ANSI escape codes.
///
/// A `TERM` of `dumb` or a set `NO_COLOR` disables styling.
pub fn is_ansi_interactive_terminal() -> bool {
    let stdout_is_tty = unsafe { libc::isatty(libc::STDOUT_FILENO) == 1 };
    if !stdout_is_tty || std::env::var_os("NO_COLOR").is_some() {
        return false;
    }

    !matches!(std::env::var("TERM").as_deref(), Ok("dumb"))
}
