//! Console output for humans.
//!
//! Diagnostics go through `tracing`; this module only prints the results an
//! operator reads: headers, status lines, boxes and prompts.

use std::io::{self, BufRead, IsTerminal, Write};
use std::sync::atomic::{AtomicBool, Ordering};

static COLOR: AtomicBool = AtomicBool::new(true);
static QUIET: AtomicBool = AtomicBool::new(false);

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const BLUE: &str = "\x1b[34m";
const CYAN: &str = "\x1b[36m";

/// Configure output once, before anything is printed.
pub fn init(no_color: bool, quiet: bool) {
    COLOR.store(!no_color && io::stdout().is_terminal(), Ordering::Relaxed);
    QUIET.store(quiet, Ordering::Relaxed);
}

pub fn color_enabled() -> bool {
    COLOR.load(Ordering::Relaxed)
}

fn quiet() -> bool {
    QUIET.load(Ordering::Relaxed)
}

fn paint(code: &str, text: &str) -> String {
    if color_enabled() {
        format!("{}{}{}", code, text, RESET)
    } else {
        text.to_string()
    }
}

pub fn success(msg: impl AsRef<str>) {
    if !quiet() {
        println!("{} {}", paint(GREEN, "✓"), msg.as_ref());
    }
}

/// Printed even in quiet mode.
pub fn error(msg: impl AsRef<str>) {
    eprintln!("{} {}", paint(RED, "✗"), msg.as_ref());
}

pub fn warning(msg: impl AsRef<str>) {
    if !quiet() {
        println!("{} {}", paint(YELLOW, "⚠"), msg.as_ref());
    }
}

pub fn info(msg: impl AsRef<str>) {
    if !quiet() {
        println!("{} {}", paint(BLUE, "ℹ"), msg.as_ref());
    }
}

pub fn action(msg: impl AsRef<str>) {
    if !quiet() {
        println!("{} {}", paint(CYAN, "→"), msg.as_ref());
    }
}

/// An indented `label: value` line.
pub fn detail(label: &str, value: impl AsRef<str>) {
    if !quiet() {
        println!("  {:<16} {}", format!("{}:", label), value.as_ref());
    }
}

pub fn header(title: &str) {
    if !quiet() {
        println!();
        println!("{}", paint(BOLD, title));
        println!("{}", "─".repeat(title.chars().count()));
    }
}

/// Plain output that quiet mode does not suppress.
pub fn plain(text: impl AsRef<str>) {
    println!("{}", text.as_ref());
}

/// Draw `lines` inside a box with `title` on top.
pub fn print_box(title: &str, lines: &[String]) {
    if quiet() {
        return;
    }
    let width = lines
        .iter()
        .map(|l| l.chars().count())
        .chain(std::iter::once(title.chars().count()))
        .max()
        .unwrap_or(0)
        + 2;

    println!("┌{}┐", "─".repeat(width));
    println!("│ {}│", paint_padded(BOLD, title, width - 1));
    println!("├{}┤", "─".repeat(width));
    for line in lines {
        println!("│ {:<w$}│", line, w = width - 1);
    }
    println!("└{}┘", "─".repeat(width));
}

/// `text` painted and padded to `width` visible columns.
fn paint_padded(code: &str, text: &str, width: usize) -> String {
    let pad = width.saturating_sub(text.chars().count());
    format!("{}{}", paint(code, text), " ".repeat(pad))
}

/// Ask a yes/no question on stdin. Anything but `y`/`yes` means no.
pub fn confirm(question: &str) -> io::Result<bool> {
    print!("{} [y/N]: ", question);
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(is_yes(&answer))
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_yes() {
        assert!(is_yes("y\n"));
        assert!(is_yes(" YES "));
        assert!(!is_yes("\n"));
        assert!(!is_yes("nope"));
    }

    #[test]
    fn test_paint_padded_counts_visible_width() {
        COLOR.store(false, Ordering::Relaxed);
        assert_eq!(paint_padded(BOLD, "ab", 5), "ab   ");
    }
}
