// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Terminal color helpers shared by the table renderer and clap's own help output.

use clap::builder::styling::{Ansi256Color, Color, Style, Styles};
use std::io::IsTerminal;

pub mod codes {
    /// Section headers.
    pub const HEADER: u8 = 74;
    /// Commands and literals.
    pub const LITERAL: u8 = 250;
    /// Muted / secondary text.
    pub const MUTED: u8 = 240;
}

const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const RED: &str = "\x1b[31m";
const RESET: &str = "\x1b[0m";

/// Priority: `NO_COLOR=1` disables, `COLOR=1` forces, otherwise a TTY check.
pub fn should_colorize() -> bool {
    if crate::env::no_color() {
        return false;
    }
    if crate::env::force_color() {
        return true;
    }
    std::io::stdout().is_terminal()
}

pub fn styles() -> Styles {
    if !should_colorize() {
        return Styles::plain();
    }
    Styles::styled()
        .usage(Style::new().fg_color(Some(Color::Ansi256(Ansi256Color(codes::HEADER)))))
        .header(Style::new().fg_color(Some(Color::Ansi256(Ansi256Color(codes::HEADER)))))
        .literal(Style::new().fg_color(Some(Color::Ansi256(Ansi256Color(codes::LITERAL)))))
}

fn fg256(code: u8) -> String {
    format!("\x1b[38;5;{code}m")
}

pub fn apply_muted(text: &str) -> String {
    if !should_colorize() {
        return text.to_string();
    }
    format!("{}{}{}", fg256(codes::MUTED), text, RESET)
}

pub fn apply_header(text: &str) -> String {
    if !should_colorize() {
        return text.to_string();
    }
    format!("{}{}{}", fg256(codes::HEADER), text, RESET)
}

/// Colors a status word green/yellow/red by recognized substring (matched
/// case-insensitively so compound values like `"failed: timeout"` still
/// color), passing anything unrecognized through unstyled.
pub fn apply_status(text: &str) -> String {
    if !should_colorize() {
        return text.to_string();
    }
    let lower = text.to_lowercase();
    let code = if lower.contains("succeeded") || lower.contains("idle") {
        GREEN
    } else if lower.contains("failed") || lower.contains("cancelled") {
        RED
    } else if lower.contains("running") || lower.contains("queued") || lower.contains("pending") {
        YELLOW
    } else {
        return text.to_string();
    };
    format!("{code}{text}{RESET}")
}

#[cfg(test)]
#[path = "color_tests.rs"]
mod tests;
