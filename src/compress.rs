//! Best-effort textual compaction of concatenated CSS and JavaScript.
//!
//! This is a fixed sequence of substitutions, not a parser. It strips `/* ... */` block
//! comments, deletes line breaks, tabs and runs of two spaces, and tightens a few brace and
//! semicolon sequences. Output is only meaningful for well-formed input.
//!
//! Known limitation: comment delimiters are matched without any notion of string literals, so
//! a `/*` inside a quoted string (`content: "/*"`) starts a "comment" that runs to the next
//! `*/` and is removed. Likewise, removing newlines can change the meaning of JavaScript that
//! relies on automatic semicolon insertion or `//` line comments.

use std::sync::OnceLock;

use regex::bytes::Regex;

/// Whitespace sequences removed outright, applied in this order.
const STRIPPED_SEQUENCES: [&[u8]; 6] = [b"\r\n", b"\r", b"\n", b"\t", b"  ", b"    "];

/// Pairs tightened after whitespace removal.
const TIGHTENED_PAIRS: [(&[u8], &[u8]); 3] = [(b"{ ", b"{"), (b" }", b"}"), (b"; ", b";")];

fn block_comment_pattern() -> &'static Regex {
  static PATTERN: OnceLock<Regex> = OnceLock::new();
  PATTERN.get_or_init(|| {
    Regex::new(r"/\*[^*]*\*+(?:[^/*][^*]*\*+)*/").expect("invalid block comment regex")
  })
}

/// Compact `content`. Deterministic: equal input always yields equal output.
pub fn compress(content: &[u8]) -> Vec<u8> {
  let mut output = block_comment_pattern()
    .replace_all(content, &b""[..])
    .into_owned();

  for sequence in STRIPPED_SEQUENCES {
    output = replace_all(&output, sequence, b"");
  }
  for (from, to) in TIGHTENED_PAIRS {
    output = replace_all(&output, from, to);
  }
  output
}

fn replace_all(haystack: &[u8], needle: &[u8], replacement: &[u8]) -> Vec<u8> {
  let mut result = Vec::with_capacity(haystack.len());
  let mut rest = haystack;
  while let Some(index) = find(rest, needle) {
    result.extend_from_slice(&rest[..index]);
    result.extend_from_slice(replacement);
    rest = &rest[index + needle.len()..];
  }
  result.extend_from_slice(rest);
  result
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
  haystack
    .windows(needle.len())
    .position(|window| window == needle)
}
