//! `LABEL: VALUE` score line parsing.
//!
//! The device emits one score per line, e.g. `gyakuZuki: 0.87`. A line is a
//! label (word characters), a colon, whitespace, then an unsigned decimal
//! number. Anything else on the wire — boot noise, debug prints, partial
//! lines — is silently ignored.

use std::sync::LazyLock;

use regex::Regex;

/// One parsed score line.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreLine {
    /// Score channel name (e.g. "Idle")
    pub label: String,
    /// Reported score
    pub value: f64,
}

/// Matched from the start of the line; trailing content is ignored.
static SCORE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\w+):\s+([\d.]+)").expect("score line regex is valid"));

/// Parse a score line into its label and value.
///
/// Returns `None` for any line that does not match the expected shape, and
/// for numeric captures that are not valid floats (`[\d.]+` admits strings
/// like `1.2.3`). Non-matching lines are not errors.
#[must_use]
pub fn parse_score_line(line: &str) -> Option<ScoreLine> {
    let caps = SCORE_LINE.captures(line)?;
    let label = caps.get(1)?.as_str().to_string();
    let value: f64 = caps.get(2)?.as_str().parse().ok()?;
    Some(ScoreLine { label, value })
}
