//! Brace-depth block scanner.
//!
//! Braces inside string literals, character literals and comments are
//! counted like any other brace.

use crate::domain::StructureError;

/// Return the index just past the brace that closes the first `{` found at
/// or after `from`.
pub fn find_block_end(text: &str, from: usize) -> Result<usize, StructureError> {
    let open = text
        .get(from..)
        .and_then(|tail| tail.find('{'))
        .map(|offset| from + offset)
        .ok_or(StructureError::NoOpeningDelimiter { from })?;

    let mut depth: i64 = 0;
    for (offset, byte) in text.as_bytes()[open..].iter().enumerate() {
        match byte {
            b'{' => depth += 1,
            b'}' => depth -= 1,
            _ => continue,
        }
        if depth == 0 {
            return Ok(open + offset + 1);
        }
    }

    Err(StructureError::UnbalancedDelimiters { opened_at: open })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_block() {
        let text = "int f() { return 1; }";
        assert_eq!(find_block_end(text, 0), Ok(text.len()));
    }

    #[test]
    fn test_nested_blocks_close_on_outer_brace() {
        let text = "void f() { if (x) { y(); } else { z(); } } int tail;";
        let end = find_block_end(text, 0).unwrap();
        assert_eq!(&text[..end], "void f() { if (x) { y(); } else { z(); } }");
    }

    #[test]
    fn test_starts_at_first_brace_after_index() {
        let text = "{ a } { b { c } }";
        let end = find_block_end(text, 1).unwrap();
        assert_eq!(&text[6..end], "{ b { c } }");
    }

    #[test]
    fn test_no_opening_delimiter() {
        assert_eq!(
            find_block_end("int x;", 0),
            Err(StructureError::NoOpeningDelimiter { from: 0 })
        );
        assert_eq!(
            find_block_end("{ } tail", 3),
            Err(StructureError::NoOpeningDelimiter { from: 3 })
        );
    }

    #[test]
    fn test_from_past_end_has_no_opening_delimiter() {
        assert_eq!(
            find_block_end("{}", 10),
            Err(StructureError::NoOpeningDelimiter { from: 10 })
        );
    }

    #[test]
    fn test_unbalanced_delimiters() {
        assert_eq!(
            find_block_end("int f() { if (x) { return; }", 0),
            Err(StructureError::UnbalancedDelimiters { opened_at: 8 })
        );
    }

    #[test]
    fn test_braces_in_string_literals_are_counted() {
        // "}" inside the literal closes the block early.
        let text = "void f() { puts(\"}\"); }";
        let end = find_block_end(text, 0).unwrap();
        assert_eq!(&text[..end], "void f() { puts(\"}");
    }

    #[test]
    fn test_multibyte_text_is_safe() {
        let text = "/* é */ void f() { /* ü */ }";
        let end = find_block_end(text, 0).unwrap();
        assert_eq!(end, text.len());
    }
}
