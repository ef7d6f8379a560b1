//! Submitted-input history with recall navigation.
//!
//! Append-only log of submitted blocks plus a cursor (`spot`) used by the
//! Up/Down recall keys. The overloading of those keys (history recall for
//! single-line buffers, cursor movement otherwise) is decided by the
//! front-end; this type only knows about entries and the cursor.

/// Outcome of a recall request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recall {
    /// Replace the buffer with this history entry.
    Entry(String),
    /// Navigated past the newest entry: clear the buffer.
    ClearBuffer,
    /// Nothing to do (empty history, or already at the newest position).
    None,
}

/// Append-only input history.
///
/// `spot` is the recall cursor: `entries.len()` means "not navigating";
/// any lower value is the index currently shown in the buffer. Recall
/// never panics on an empty history.
#[derive(Debug, Default)]
pub struct History {
    entries: Vec<String>,
    spot: usize,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a submitted block.
    ///
    /// Consecutive identical submissions are collapsed; the same text
    /// resubmitted after a different block is appended again. Recording
    /// always resets the recall cursor past the newest entry.
    pub fn record(&mut self, text: &str) {
        if !text.is_empty() && self.entries.last().map(String::as_str) != Some(text) {
            self.entries.push(text.to_string());
        }
        self.spot = self.entries.len();
    }

    /// Steps back toward older entries.
    pub fn previous(&mut self) -> Recall {
        if self.entries.is_empty() {
            return Recall::None;
        }
        if self.spot > 0 {
            self.spot -= 1;
        }
        Recall::Entry(self.entries[self.spot].clone())
    }

    /// Steps forward toward newer entries.
    ///
    /// Stepping past the newest entry clears the buffer and leaves the
    /// cursor at the "not navigating" position.
    pub fn next(&mut self) -> Recall {
        if self.entries.is_empty() || self.spot >= self.entries.len() {
            return Recall::None;
        }
        self.spot += 1;
        if self.spot == self.entries.len() {
            Recall::ClearBuffer
        } else {
            Recall::Entry(self.entries[self.spot].clone())
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consecutive_duplicates_collapse() {
        let mut h = History::new();
        h.record("a");
        h.record("a");
        assert_eq!(h.len(), 1);
        h.record("b");
        h.record("a");
        assert_eq!(h.entries(), ["a", "b", "a"]);
    }

    #[test]
    fn empty_submissions_are_not_recorded() {
        let mut h = History::new();
        h.record("");
        assert!(h.is_empty());
    }

    #[test]
    fn recall_round_trip() {
        let mut h = History::new();
        for text in ["a", "b", "c"] {
            h.record(text);
        }
        assert_eq!(h.previous(), Recall::Entry("c".into()));
        assert_eq!(h.previous(), Recall::Entry("b".into()));
        assert_eq!(h.previous(), Recall::Entry("a".into()));
        assert_eq!(h.next(), Recall::Entry("b".into()));
    }

    #[test]
    fn previous_pins_at_oldest_entry() {
        let mut h = History::new();
        h.record("only");
        assert_eq!(h.previous(), Recall::Entry("only".into()));
        assert_eq!(h.previous(), Recall::Entry("only".into()));
    }

    #[test]
    fn next_past_newest_clears_buffer() {
        let mut h = History::new();
        h.record("a");
        h.record("b");
        assert_eq!(h.previous(), Recall::Entry("b".into()));
        assert_eq!(h.next(), Recall::ClearBuffer);
        assert_eq!(h.next(), Recall::None);
    }

    #[test]
    fn recall_on_empty_history_is_a_noop() {
        let mut h = History::new();
        assert_eq!(h.previous(), Recall::None);
        assert_eq!(h.next(), Recall::None);
    }

    #[test]
    fn record_resets_navigation() {
        let mut h = History::new();
        h.record("a");
        h.record("b");
        let _ = h.previous();
        h.record("c");
        assert_eq!(h.previous(), Recall::Entry("c".into()));
    }
}
