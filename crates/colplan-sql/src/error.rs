//! Mapping of parser failures onto `Error::SqlSyntax`.

use colplan_core::error::Error;
use regex::Regex;
use sqlparser::parser::ParserError;

pub(crate) fn syntax_error(err: ParserError) -> Error {
    let message = match err {
        ParserError::TokenizerError(m) | ParserError::ParserError(m) => m,
        ParserError::RecursionLimitExceeded => "recursion limit exceeded".to_string(),
    };
    let (line, column) = position(&message);
    Error::SqlSyntax {
        message,
        line,
        column,
    }
}

/// `Line: N, Column: M` as reported by the parser.
fn position(message: &str) -> (Option<u64>, Option<u64>) {
    let Ok(re) = Regex::new(r"Line: (\d+), Column:? (\d+)") else {
        return (None, None);
    };
    match re.captures(message) {
        Some(caps) => (
            caps.get(1).and_then(|m| m.as_str().parse().ok()),
            caps.get(2).and_then(|m| m.as_str().parse().ok()),
        ),
        None => (None, None),
    }
}
