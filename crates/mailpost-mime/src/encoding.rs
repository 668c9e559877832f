//! MIME encoding utilities.
//!
//! Supports Base64, Quoted-Printable, and RFC 2047 header encoding.

use crate::error::Result;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::fmt::Write as _;

/// Maximum encoded line length (RFC 2045).
const MAX_LINE_LENGTH: usize = 76;

/// Encodes data as Base64.
#[must_use]
pub fn encode_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Encodes data as Base64 split into CRLF-terminated lines of 76 characters.
#[must_use]
pub fn encode_base64_lines(data: &[u8]) -> String {
    let encoded = STANDARD.encode(data);
    let mut out = String::with_capacity(encoded.len() + encoded.len() / MAX_LINE_LENGTH * 2 + 2);
    // Base64 output is ASCII, so byte chunks are valid UTF-8
    for chunk in encoded.as_bytes().chunks(MAX_LINE_LENGTH) {
        out.push_str(std::str::from_utf8(chunk).unwrap_or_default());
        out.push_str("\r\n");
    }
    out
}

/// Decodes Base64 data, ignoring embedded whitespace and line breaks.
///
/// # Errors
///
/// Returns an error if the input is not valid Base64.
pub fn decode_base64(data: &str) -> Result<Vec<u8>> {
    let cleaned: String = data.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD.decode(cleaned).map_err(Into::into)
}

/// Encodes text using Quoted-Printable encoding (RFC 2045).
///
/// Hard line breaks (`\n` or `\r\n`) become CRLF; long lines get soft
/// breaks so no output line exceeds 76 characters. Trailing whitespace on a
/// line is always encoded.
#[must_use]
pub fn encode_quoted_printable(text: &str) -> String {
    let mut result = String::with_capacity(text.len() + text.len() / 8);

    for (index, line) in text.split('\n').enumerate() {
        if index > 0 {
            result.push_str("\r\n");
        }
        let line = line.strip_suffix('\r').unwrap_or(line);
        encode_qp_line(line.as_bytes(), &mut result);
    }

    result
}

fn encode_qp_line(line: &[u8], out: &mut String) {
    let mut line_length = 0;

    for (i, &byte) in line.iter().enumerate() {
        let is_last = i + 1 == line.len();
        let literal = match byte {
            b'!'..=b'<' | b'>'..=b'~' => true,
            b' ' | b'\t' => !is_last,
            _ => false,
        };
        let width = if literal { 1 } else { 3 };

        // Leave room for the soft break "="
        if line_length + width > MAX_LINE_LENGTH - 1 {
            out.push_str("=\r\n");
            line_length = 0;
        }

        if literal {
            out.push(byte as char);
        } else {
            let _ = write!(out, "={byte:02X}");
        }
        line_length += width;
    }
}

/// Returns true if a header value must be RFC 2047 encoded.
#[must_use]
pub fn needs_encoding(text: &str) -> bool {
    text.contains("=?") || text.chars().any(|c| !c.is_ascii() || c.is_ascii_control())
}

/// Encodes a header value using RFC 2047 encoding when needed.
///
/// Format: `=?charset?B?encoded-text?=`. Long values are split into several
/// encoded words on character boundaries, separated by folding whitespace.
#[must_use]
pub fn encode_rfc2047(text: &str, charset: &str) -> String {
    if !needs_encoding(text) {
        return text.to_string();
    }

    // 45 input bytes -> 60 base64 chars, keeps each word under 76 columns
    const CHUNK: usize = 45;
    let mut words = Vec::new();
    let mut start = 0;
    while start < text.len() {
        let mut end = (start + CHUNK).min(text.len());
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        let encoded = encode_base64(&text.as_bytes()[start..end]);
        words.push(format!("=?{charset}?B?{encoded}?="));
        start = end;
    }

    words.join("\r\n ")
}

/// Folds unstructured header text at spaces (RFC 5322 section 2.2.3).
///
/// `offset` is the column the value starts at, after `Name: `. A CRLF is
/// inserted before a space wherever the line would pass 78 columns;
/// unfolding restores the original text. Runs without spaces are never
/// split.
#[must_use]
pub fn fold_text(text: &str, offset: usize) -> String {
    const FOLD_AT: usize = 78;

    let mut folded = String::with_capacity(text.len());
    let mut column = offset;
    let mut line_has_text = false;
    for (index, word) in text.split(' ').enumerate() {
        if index > 0 {
            if line_has_text && !word.is_empty() && column + 1 + word.len() > FOLD_AT {
                folded.push_str("\r\n");
                column = 0;
                line_has_text = false;
            }
            folded.push(' ');
            column += 1;
        }
        folded.push_str(word);
        column += word.len();
        line_has_text |= !word.is_empty();
    }
    folded
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_base64_encode_decode() {
        let encoded = encode_base64(b"Hello, World!");
        assert_eq!(encoded, "SGVsbG8sIFdvcmxkIQ==");
        assert_eq!(decode_base64("SGVsbG8s\r\nIFdvcmxkIQ==").unwrap(), b"Hello, World!");
    }

    #[test]
    fn test_fold_text() {
        assert_eq!(fold_text("short subject", 9), "short subject");

        let text = "word ".repeat(40);
        let folded = fold_text(text.trim_end(), 9);
        assert!(folded.split("\r\n").all(|line| line.len() <= 78));
        assert!(folded.split("\r\n").skip(1).all(|line| line.starts_with(' ')));
        assert_eq!(folded.replace("\r\n", ""), text.trim_end());
    }

    #[test]
    fn test_base64_decode_invalid() {
        assert!(decode_base64("not base64!").is_err());
    }

    #[test]
    fn test_base64_lines() {
        let data = vec![0u8; 120];
        let encoded = encode_base64_lines(&data);
        let lines: Vec<&str> = encoded.split("\r\n").collect();
        assert_eq!(lines[0].len(), 76);
        assert_eq!(lines[1].len(), 76);
        assert_eq!(lines[2].len(), 8);
        assert_eq!(lines[3], "");
        assert_eq!(decode_base64(&encoded).unwrap(), data);
    }

    #[test]
    fn test_quoted_printable_ascii_unchanged() {
        assert_eq!(encode_quoted_printable("Hello, World!"), "Hello, World!");
    }

    #[test]
    fn test_quoted_printable_non_ascii_and_equals() {
        assert_eq!(encode_quoted_printable("Héllo a=b"), "H=C3=A9llo a=3Db");
    }

    #[test]
    fn test_quoted_printable_line_breaks() {
        assert_eq!(encode_quoted_printable("one\ntwo\r\nthree"), "one\r\ntwo\r\nthree");
    }

    #[test]
    fn test_quoted_printable_trailing_space() {
        assert_eq!(encode_quoted_printable("end \nnext"), "end=20\r\nnext");
    }

    #[test]
    fn test_quoted_printable_soft_break() {
        let encoded = encode_quoted_printable(&"a".repeat(100));
        let first = encoded.split("\r\n").next().unwrap();
        assert_eq!(first.len(), 76);
        assert!(first.ends_with('='));
    }

    #[test]
    fn test_rfc2047_ascii_passthrough() {
        assert_eq!(encode_rfc2047("Hello", "utf-8"), "Hello");
    }

    #[test]
    fn test_rfc2047_encodes_non_ascii() {
        assert_eq!(encode_rfc2047("Héllo", "utf-8"), "=?utf-8?B?SMOpbGxv?=");
    }

    #[test]
    fn test_rfc2047_splits_long_values() {
        let encoded = encode_rfc2047(&"é".repeat(40), "utf-8");
        assert_eq!(encoded.matches("=?utf-8?B?").count(), 2);
        for word in encoded.split("\r\n ") {
            assert!(word.len() <= 75, "{word}");
        }
    }

    proptest! {
        #[test]
        fn qp_lines_stay_short(text in "\\PC{0,300}") {
            let encoded = encode_quoted_printable(&text);
            for line in encoded.split("\r\n") {
                prop_assert!(line.len() <= MAX_LINE_LENGTH);
            }
        }

        #[test]
        fn qp_output_is_ascii(text in "\\PC{0,200}") {
            prop_assert!(encode_quoted_printable(&text).is_ascii());
        }
    }
}
