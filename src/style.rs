//! Minimal ANSI color helpers for diagnostic rendering.
//!
//! The teacher's `error.rs` calls through a `Style` facade
//! (`Style::bold_red`, `Style::blue`, ...) rather than writing escape codes
//! inline; this reconstructs that facade at the same call shape.

pub struct Style;

impl Style {
    pub fn bold_red(s: &str) -> String {
        format!("\x1b[1;31m{s}\x1b[0m")
    }

    pub fn red(s: &str) -> String {
        format!("\x1b[31m{s}\x1b[0m")
    }

    pub fn blue(s: &str) -> String {
        format!("\x1b[34m{s}\x1b[0m")
    }

    pub fn cyan(s: &str) -> String {
        format!("\x1b[36m{s}\x1b[0m")
    }

    pub fn green(s: &str) -> String {
        format!("\x1b[32m{s}\x1b[0m")
    }

    pub fn yellow(s: &str) -> String {
        format!("\x1b[33m{s}\x1b[0m")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_text_in_escape_codes_and_resets() {
        let s = Style::bold_red("boom");
        assert!(s.starts_with("\x1b["));
        assert!(s.ends_with("\x1b[0m"));
        assert!(s.contains("boom"));
    }
}
