//! Continuation heuristic for pending input.
//!
//! Decides whether the Return key should insert a newline or submit the
//! buffer for evaluation. This is deliberately shallow: it never inspects
//! bracket or quote balance, and a single-line buffer ending in `:` keeps
//! editing even when the text is syntactically nonsense. The runtime, not
//! this function, is the source of truth for correctness.

/// Returns true when the buffer should keep accepting input.
///
/// Keep editing when any of the following holds:
/// 1. the buffer ends with `:` (block-opening syntax, even on line one);
/// 2. the buffer ends with a `\` line-continuation escape;
/// 3. the buffer spans multiple lines and its last line is not blank
///    (the user has not yet signalled completion with an empty line).
pub fn should_continue(buffer: &str) -> bool {
    if buffer.ends_with(':') || buffer.ends_with('\\') {
        return true;
    }
    let mut lines = buffer.split('\n');
    let last = lines.next_back().unwrap_or("");
    let multi_line = lines.next().is_some();
    multi_line && !last.trim_start().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_line_statement_submits() {
        assert!(!should_continue("print(1+1)"));
        assert!(!should_continue("1+1"));
        assert!(!should_continue(""));
    }

    #[test]
    fn trailing_colon_continues_regardless_of_line_count() {
        assert!(should_continue("def f():"));
        assert!(should_continue("if x:\n    y()\nelse:"));
        // Syntactically invalid, still continues: the heuristic is not a parser.
        assert!(should_continue("1+1:"));
    }

    #[test]
    fn trailing_backslash_continues() {
        assert!(should_continue("total = 1 + \\"));
        assert!(should_continue("a\nb \\"));
    }

    #[test]
    fn open_block_continues_until_blank_line() {
        assert!(should_continue("def f():\n    return 1"));
        assert!(!should_continue("def f():\n    return 1\n"));
    }

    #[test]
    fn whitespace_only_last_line_submits() {
        assert!(!should_continue("def f():\n   "));
    }
}
