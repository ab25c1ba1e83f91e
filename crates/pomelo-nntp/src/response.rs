//! Status-line parsing and success classification.
//!
//! NNTP responses open with a three-digit code. Which codes count as success
//! depends on the command that was sent, so each command carries its own
//! [`ResponseClassifier`]. Protocol-level failures (430, 480, ...) are data,
//! not errors; only a malformed status line fails the exchange.

use crate::error::NntpError;

/// A single classified status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub code: u16,
    pub message: String,
    pub success: bool,
}

impl Response {
    /// First whitespace-separated token of the message, as most verbs put
    /// the interesting value there (article number, server date).
    pub fn first_token(&self) -> Option<&str> {
        self.message.split_whitespace().next()
    }
}

/// A status line plus the data block that followed it.
///
/// `lines` is empty when the status was not a success; a failed multi-line
/// command carries no block on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiLineResponse {
    pub response: Response,
    pub lines: Vec<Vec<u8>>,
}

/// Fixed success-code set for one command.
#[derive(Debug, Clone)]
pub struct ResponseClassifier {
    success_codes: &'static [u16],
}

impl ResponseClassifier {
    pub const fn new(success_codes: &'static [u16]) -> Self {
        Self { success_codes }
    }

    pub fn is_success(&self, code: u16) -> bool {
        self.success_codes.contains(&code)
    }

    pub fn classify(&self, code: u16, message: String) -> Response {
        Response {
            code,
            message,
            success: self.is_success(code),
        }
    }
}

/// Split a raw status line into code and message.
///
/// The code must be three digits in 100..=599; anything else means the peer
/// is not speaking NNTP and the exchange cannot be trusted.
pub fn parse_status_line(line: &str) -> Result<(u16, String), NntpError> {
    let code_part = line.split(' ').next().unwrap_or("");
    if code_part.len() != 3 || !code_part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(NntpError::FramingViolation(format!(
            "malformed status line: {line:?}"
        )));
    }
    let code: u16 = code_part
        .parse()
        .map_err(|_| NntpError::FramingViolation(format!("malformed status line: {line:?}")))?;
    if !(100..=599).contains(&code) {
        return Err(NntpError::FramingViolation(format!(
            "status code {code} out of range"
        )));
    }
    let message = line.get(4..).unwrap_or("").to_string();
    Ok((code, message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_code_and_message() {
        let (code, message) = parse_status_line("211 1234 3000234 3002322 misc.test").unwrap();
        assert_eq!(code, 211);
        assert_eq!(message, "1234 3000234 3002322 misc.test");
    }

    #[test]
    fn parses_bare_code() {
        let (code, message) = parse_status_line("205").unwrap();
        assert_eq!(code, 205);
        assert_eq!(message, "");
    }

    #[test]
    fn rejects_non_numeric_code() {
        assert!(matches!(
            parse_status_line("hello world"),
            Err(NntpError::FramingViolation(_))
        ));
    }

    #[test]
    fn rejects_short_code() {
        assert!(matches!(
            parse_status_line("20 oops"),
            Err(NntpError::FramingViolation(_))
        ));
    }

    #[test]
    fn rejects_out_of_range_code() {
        assert!(matches!(
            parse_status_line("600 nope"),
            Err(NntpError::FramingViolation(_))
        ));
        assert!(matches!(
            parse_status_line("099 nope"),
            Err(NntpError::FramingViolation(_))
        ));
    }

    #[test]
    fn classifier_marks_membership() {
        let classifier = ResponseClassifier::new(&[220, 222]);
        assert!(classifier.is_success(220));
        assert!(!classifier.is_success(430));

        let ok = classifier.classify(222, "0 <id@example>".into());
        assert!(ok.success);
        let not_found = classifier.classify(430, "no such article".into());
        assert!(!not_found.success);
        assert_eq!(not_found.code, 430);
    }

    #[test]
    fn first_token_splits_message() {
        let r = Response {
            code: 223,
            message: "3000234 <45223423@example.com>".into(),
            success: true,
        };
        assert_eq!(r.first_token(), Some("3000234"));
    }
}
