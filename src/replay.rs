//! Replay file format: one hex frame per line.
//!
//! `#` starts a comment, blank lines are skipped and a line holding only `---`
//! closes the current capture session.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line<'a> {
    Frame(&'a str),
    SessionBreak,
    Skip,
}

pub const SESSION_BREAK: &str = "---";

pub fn classify(line: &str) -> Line<'_> {
    let content = match line.split_once('#') {
        Some((before, _)) => before,
        None => line,
    }
    .trim();

    if content.is_empty() {
        Line::Skip
    } else if content == SESSION_BREAK {
        Line::SessionBreak
    } else {
        Line::Frame(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_lines() {
        assert_eq!(classify("FE028100"), Line::Frame("FE028100"));
        assert_eq!(classify("  fe 02 81 00  # GoodCRC"), Line::Frame("fe 02 81 00"));
        assert_eq!(classify("# capture of 2024-05-01"), Line::Skip);
        assert_eq!(classify("   "), Line::Skip);
        assert_eq!(classify("---"), Line::SessionBreak);
        assert_eq!(classify(" --- # new cable"), Line::SessionBreak);
    }
}
