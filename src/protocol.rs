//! Line framing for the uppercase echo.
//!
//! ```text
//! Request:  hello\nworld\n
//! Response: HELLO\n
//! ```
//!
//! Everything before the first `\n` is the line; anything after it is
//! ignored. Input without a newline is treated as one whole line, and empty
//! input as an empty line. Uppercasing uses the fixed ASCII table, so bytes
//! outside `a..=z` (including UTF-8 multi-byte sequences) pass through as is.

use bytes::{BufMut, BytesMut};

/// Line delimiter for requests and responses.
pub const DELIMITER: u8 = b'\n';

/// The bytes before the first delimiter, or all of `input` if there is none.
pub fn first_line(input: &[u8]) -> &[u8] {
    match input.iter().position(|&b| b == DELIMITER) {
        Some(end) => &input[..end],
        None => input,
    }
}

/// Build the response for a request buffer.
pub fn respond(input: &[u8]) -> BytesMut {
    let line = first_line(input);

    let mut response = BytesMut::with_capacity(line.len() + 1);
    response.extend(line.iter().map(u8::to_ascii_uppercase));
    response.put_u8(DELIMITER);
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_line_only() {
        assert_eq!(&respond(b"hello\nworld\n")[..], b"HELLO\n");
    }

    #[test]
    fn test_empty_line() {
        assert_eq!(&respond(b"\n")[..], b"\n");
    }

    #[test]
    fn test_missing_delimiter() {
        assert_eq!(&respond(b"abc")[..], b"ABC\n");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(&respond(b"")[..], b"\n");
    }

    #[test]
    fn test_not_reversed() {
        assert_eq!(&respond(b"abc\n")[..], b"ABC\n");
    }

    #[test]
    fn test_ascii_table_only() {
        assert_eq!(&respond("mixed Case 123 é\n".as_bytes())[..], "MIXED CASE 123 é\n".as_bytes());
    }

    #[test]
    fn test_carriage_return_is_kept() {
        assert_eq!(&respond(b"hi\r\n")[..], b"HI\r\n");
    }

    #[test]
    fn test_first_line() {
        assert_eq!(first_line(b"a\nb"), b"a");
        assert_eq!(first_line(b"\nb"), b"");
        assert_eq!(first_line(b"ab"), b"ab");
    }
}
