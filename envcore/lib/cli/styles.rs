use clap::builder::styling::{AnsiColor, Effects, Style, Styles};
use std::{fmt::Write, sync::LazyLock};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Whether stdout is an ANSI-capable interactive terminal.
static IS_ANSI_TERMINAL: LazyLock<bool> =
    LazyLock::new(envutils::term::is_ansi_interactive_terminal);

//--------------------------------------------------------------------------------------------------
// Traits
//--------------------------------------------------------------------------------------------------

/// Applies the styles defined in [`styles`] to text printed by the binary.
pub trait AnsiStyles {
    /// Apply header style to text
    fn header(&self) -> String;

    /// Apply literal style to text
    fn literal(&self) -> String;

    /// Apply placeholder style to text
    fn placeholder(&self) -> String;

    /// Apply error style to text
    fn error(&self) -> String;

    /// Apply valid style to text
    fn valid(&self) -> String;
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Returns the styles used by the CLI help output.
pub fn styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default())
        .error(AnsiColor::Red.on_default() | Effects::BOLD)
        .valid(AnsiColor::Green.on_default() | Effects::BOLD)
        .invalid(AnsiColor::Red.on_default() | Effects::BOLD)
}

//--------------------------------------------------------------------------------------------------
// Functions: Helpers
//--------------------------------------------------------------------------------------------------

fn apply_style(text: &str, style: &Style, enabled: bool) -> String {
    if !enabled {
        return text.to_string();
    }

    let mut styled = String::with_capacity(text.len() + 16);
    let _ = write!(styled, "{}{}{}", style, text, style.render_reset());
    styled
}

fn styled(text: &str, pick: fn(&Styles) -> &Style) -> String {
    apply_style(text, pick(&styles()), *IS_ANSI_TERMINAL)
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl<T> AnsiStyles for T
where
    T: AsRef<str> + ?Sized,
{
    fn header(&self) -> String {
        styled(self.as_ref(), Styles::get_header)
    }

    fn literal(&self) -> String {
        styled(self.as_ref(), Styles::get_literal)
    }

    fn placeholder(&self) -> String {
        styled(self.as_ref(), Styles::get_placeholder)
    }

    fn error(&self) -> String {
        styled(self.as_ref(), Styles::get_error)
    }

    fn valid(&self) -> String {
        styled(self.as_ref(), Styles::get_valid)
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
