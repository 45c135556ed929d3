//! Classification of server response lines by their leading marker byte.

/// Error line marker
pub const MSG_ERROR: char = '!';
/// Informational (warning) line marker
pub const MSG_INFO: char = '#';
/// Redirect line marker; the payload is a URI
pub const MSG_REDIRECT: char = '^';
/// Ready-for-input marker
pub const MSG_PROMPT: char = '\u{1}';
/// The exact line that ends a multi-line reply block
pub const MSG_TERMINATOR: &str = ".";

/// One classified response line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseLine {
    Error(String),
    Info(String),
    Redirect(String),
    Prompt,
    Terminator,
    /// Any other line, kept whole; the consuming loop decides whether it is legal
    Unclassified(String),
}

impl ResponseLine {
    pub fn is_terminator(&self) -> bool {
        matches!(self, ResponseLine::Terminator)
    }

    /// Short tag name for logging
    pub fn kind(&self) -> &'static str {
        match self {
            ResponseLine::Error(_) => "error",
            ResponseLine::Info(_) => "info",
            ResponseLine::Redirect(_) => "redirect",
            ResponseLine::Prompt => "prompt",
            ResponseLine::Terminator => "terminator",
            ResponseLine::Unclassified(_) => "unclassified",
        }
    }
}

/// Classify a raw line (terminator already stripped).
///
/// The terminator check is exact and happens before marker inspection.
pub fn classify(line: &str) -> ResponseLine {
    if line == MSG_TERMINATOR {
        return ResponseLine::Terminator;
    }

    let mut chars = line.chars();
    match chars.next() {
        Some(MSG_ERROR) => ResponseLine::Error(chars.as_str().to_string()),
        Some(MSG_INFO) => ResponseLine::Info(chars.as_str().to_string()),
        Some(MSG_REDIRECT) => ResponseLine::Redirect(chars.as_str().to_string()),
        Some(MSG_PROMPT) => ResponseLine::Prompt,
        _ => ResponseLine::Unclassified(line.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markers() {
        assert_eq!(
            classify("!42000!syntax error"),
            ResponseLine::Error("42000!syntax error".into())
        );
        assert_eq!(
            classify("#warning: weak password"),
            ResponseLine::Info("warning: weak password".into())
        );
        assert_eq!(
            classify("^mapi:monetdb://replica:50001/db"),
            ResponseLine::Redirect("mapi:monetdb://replica:50001/db".into())
        );
        assert_eq!(classify("\u{1}\u{1}"), ResponseLine::Prompt);
        assert_eq!(classify("."), ResponseLine::Terminator);
    }

    #[test]
    fn test_terminator_is_exact() {
        assert_eq!(classify(".."), ResponseLine::Unclassified("..".into()));
        assert_eq!(classify(". "), ResponseLine::Unclassified(". ".into()));
    }

    #[test]
    fn test_unclassified_and_empty() {
        assert_eq!(
            classify("[ 1\t]"),
            ResponseLine::Unclassified("[ 1\t]".into())
        );
        assert_eq!(classify(""), ResponseLine::Unclassified(String::new()));
    }

    #[test]
    fn test_marker_only_lines_have_empty_payload() {
        assert_eq!(classify("!"), ResponseLine::Error(String::new()));
        assert_eq!(classify("#"), ResponseLine::Info(String::new()));
    }
}
