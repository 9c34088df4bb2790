//! Pragma marker syntax.
//!
//! A marker occupies a whole line of the form
//! `<open> <name> [<label>] <close>`, for example
//! `/* mat Before create [start] */`. Names are free-form; labels are
//! matched case-insensitively.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::Result;

/// Configurable pieces of the marker line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PragmaSyntax {
    pub open: String,
    pub close: String,
    pub start_label: String,
    pub end_label: String,
}

impl Default for PragmaSyntax {
    fn default() -> Self {
        Self {
            open: "/* mat".to_string(),
            close: "*/".to_string(),
            start_label: "start".to_string(),
            end_label: "end".to_string(),
        }
    }
}

/// Whether a marker opens or closes a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    Start,
    End,
}

/// A marker recognized on a single line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker<'a> {
    pub name: &'a str,
    pub kind: MarkerKind,
}

impl Marker<'_> {
    pub fn is_start_of(&self, name: &str) -> bool {
        self.kind == MarkerKind::Start && self.name == name
    }

    pub fn is_end_of(&self, name: &str) -> bool {
        self.kind == MarkerKind::End && self.name == name
    }
}

static DEFAULT_PRAGMA: LazyLock<Pragma> = LazyLock::new(|| {
    Pragma::new(PragmaSyntax::default()).expect("Invalid default pragma syntax")
});

/// Compiled marker syntax.
#[derive(Debug, Clone)]
pub struct Pragma {
    syntax: PragmaSyntax,
    line_regex: Regex,
}

impl Default for Pragma {
    fn default() -> Self {
        DEFAULT_PRAGMA.clone()
    }
}

impl Pragma {
    pub fn new(syntax: PragmaSyntax) -> Result<Self> {
        let pattern = format!(
            r"^\s*{}\s+(.+?)\s*\[([^\]\s]+)\]\s*{}\s*$",
            regex::escape(&syntax.open),
            regex::escape(&syntax.close)
        );
        let line_regex = Regex::new(&pattern)?;
        Ok(Self { syntax, line_regex })
    }

    pub fn syntax(&self) -> &PragmaSyntax {
        &self.syntax
    }

    /// Recognize a marker on one line (a trailing line terminator is allowed).
    pub fn parse_line<'a>(&self, line: &'a str) -> Option<Marker<'a>> {
        let caps = self.line_regex.captures(line)?;
        let name = caps.get(1)?.as_str();
        let label = caps.get(2)?.as_str();

        let kind = if label.eq_ignore_ascii_case(&self.syntax.start_label) {
            MarkerKind::Start
        } else if label.eq_ignore_ascii_case(&self.syntax.end_label) {
            MarkerKind::End
        } else {
            return None;
        };
        Some(Marker { name, kind })
    }

    /// Like [`Pragma::parse_line`] for raw bytes; non-UTF-8 lines are never markers.
    pub fn parse_bytes<'a>(&self, line: &'a [u8]) -> Option<Marker<'a>> {
        std::str::from_utf8(line)
            .ok()
            .and_then(|line| self.parse_line(line))
    }

    /// Render the start marker for `name`.
    pub fn start(&self, name: &str) -> String {
        self.render(name, &self.syntax.start_label)
    }

    /// Render the end marker for `name`.
    pub fn end(&self, name: &str) -> String {
        self.render(name, &self.syntax.end_label)
    }

    /// Render a complete region with `body` between its markers.
    pub fn wrap(&self, name: &str, body: &str) -> String {
        let mut out = self.start(name);
        out.push('\n');
        out.push_str(body);
        if !body.is_empty() && !body.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(&self.end(name));
        out
    }

    fn render(&self, name: &str, label: &str) -> String {
        format!(
            "{} {} [{}] {}",
            self.syntax.open,
            name,
            label.to_lowercase(),
            self.syntax.close
        )
    }
}
