//! Per-cycle score aggregation and winner selection.
//!
//! A cycle collects the most recent score for each label until every
//! expected label has reported, at which point the max-score label wins and
//! the cycle resets. Unrecognized labels are recorded and may win, but they
//! never count toward completion.

use std::collections::HashMap;

use crate::parse::ScoreLine;

/// Aggregation state for one reporting cycle.
#[derive(Debug)]
pub struct ScoreCycle {
    /// Labels that must all report before the cycle completes, in tie-break
    /// order.
    expected: Vec<String>,
    /// Most recent score per label within the current cycle.
    scores: HashMap<String, f64>,
}

impl ScoreCycle {
    /// Create an empty cycle for the given expected label set.
    #[must_use]
    pub fn new(expected: Vec<String>) -> Self {
        Self {
            expected,
            scores: HashMap::new(),
        }
    }

    /// Record a score, overwriting any earlier value for that label in the
    /// current cycle.
    pub fn record(&mut self, line: ScoreLine) {
        self.scores.insert(line.label, line.value);
    }

    /// True when every expected label has reported in the current cycle.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.expected
            .iter()
            .all(|label| self.scores.contains_key(label))
    }

    /// Number of scores recorded in the current cycle.
    #[must_use]
    pub fn len(&self) -> usize {
        self.scores.len()
    }

    /// True when no scores have been recorded in the current cycle.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// If the cycle is complete, return the max-score label and reset the
    /// cycle. Returns `None` while incomplete.
    ///
    /// All recorded entries participate in the max, including unrecognized
    /// labels. Ties are broken deterministically: candidates are visited in
    /// declared-label order, then unrecognized labels lexicographically, and
    /// only a strictly greater score displaces the current winner.
    pub fn take_winner(&mut self) -> Option<String> {
        if !self.is_complete() {
            return None;
        }

        let mut winner: Option<(&str, f64)> = None;
        for (label, value) in self.candidates() {
            match winner {
                Some((_, best)) if value <= best => {}
                _ => winner = Some((label, value)),
            }
        }

        let winner = winner.map(|(label, _)| label.to_string());
        self.scores.clear();
        winner
    }

    /// Discard all recorded scores (used when a connection drops so no
    /// partial state survives a reconnect).
    pub fn clear(&mut self) {
        self.scores.clear();
    }

    /// Recorded entries in tie-break order: declared labels first, then
    /// unrecognized labels sorted by name.
    fn candidates(&self) -> impl Iterator<Item = (&str, f64)> {
        let declared = self
            .expected
            .iter()
            .filter_map(|label| self.scores.get(label).map(|v| (label.as_str(), *v)));

        let mut extras: Vec<(&str, f64)> = self
            .scores
            .iter()
            .filter(|(label, _)| !self.expected.contains(label))
            .map(|(label, value)| (label.as_str(), *value))
            .collect();
        extras.sort_by(|a, b| a.0.cmp(b.0));

        declared.chain(extras)
    }
}
