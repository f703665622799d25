use std::sync::LazyLock;

use pixelchain::Layout;

#[doc(hidden)]
pub static RED_BOLD: LazyLock<console::Style> =
    LazyLock::new(|| console::Style::new().red().bold());
#[doc(hidden)]
pub static BLUE_BOLD: LazyLock<console::Style> =
    LazyLock::new(|| console::Style::new().blue().bold());
#[doc(hidden)]
pub static GREEN_BOLD: LazyLock<console::Style> =
    LazyLock::new(|| console::Style::new().green().bold());

#[doc(hidden)]
pub fn after_help() -> String {
    let mut s = String::new();

    s.push_str(color_print::cstr!("<green, bold>Layouts:</>\n"));
    for name in Layout::NAMES {
        s.push_str(&color_print::cformat!("  <cyan, bold>{}</>", name));
        if *name == Layout::default().name() {
            s.push_str(" (default)");
        }
        s.push('\n');
    }

    s.push_str(color_print::cstr!("<green, bold>Environment Variables:\n"));
    s.push_str(color_print::cstr!("  <cyan, bold>RUST_LOG:"));
    s.push_str("    https://docs.rs/tracing-subscriber/latest/tracing_subscriber/fmt/index.html#filtering-events-with-environment-variables");
    s
}

/// `"{label:>16} {line}"`, the status line format shared by every binary
#[doc(hidden)]
pub fn status(style: &console::Style, label: &str, line: impl std::fmt::Display) -> String {
    format!("{:>16} {}", style.apply_to(label), line)
}
