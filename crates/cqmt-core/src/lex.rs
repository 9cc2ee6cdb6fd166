//! Lexical masking for SPARQL and Turtle text.
//!
//! Structural scans (keywords, braces, statement terminators) must ignore
//! whatever sits inside string literals, IRI references and comments. Rather
//! than tokenising, [`mask`] blanks those regions out with spaces while
//! keeping every byte offset unchanged, so a position found in the masked
//! text can be used to slice the original.

use std::ops::Range;

/// Return a copy of `text` in which the interiors of string literals and IRI
/// references, and whole comments, are replaced by spaces. Quote and angle
/// bracket delimiters are kept. The result has the same byte length as the
/// input.
pub fn mask(text: &str) -> String { scan(text).0 }

/// Byte ranges of the `#` comments in `text`, in order. A range runs up to,
/// not including, the line break.
pub fn comment_ranges(text: &str) -> Vec<Range<usize>> { scan(text).1 }

fn scan(text: &str) -> (String, Vec<Range<usize>>) {
  let chars: Vec<(usize, char)> = text.char_indices().collect();
  let mut out = String::with_capacity(text.len());
  let mut comments = Vec::new();
  let mut i = 0;

  while i < chars.len() {
    let (_, c) = chars[i];
    match c {
      '#' => {
        let start = chars[i].0;
        while i < chars.len() && chars[i].1 != '\n' {
          blank(&mut out, chars[i].1);
          i += 1;
        }
        comments.push(start..chars.get(i).map_or(text.len(), |&(at, _)| at));
      }
      '"' | '\'' => {
        let long = i + 2 < chars.len() && chars[i + 1].1 == c && chars[i + 2].1 == c;
        if long {
          out.extend([c, c, c]);
          i += 3;
          while i < chars.len() {
            if chars[i].1 == '\\' {
              blank(&mut out, '\\');
              i += 1;
              if i < chars.len() {
                blank(&mut out, chars[i].1);
                i += 1;
              }
              continue;
            }
            if i + 2 < chars.len()
              && chars[i].1 == c
              && chars[i + 1].1 == c
              && chars[i + 2].1 == c
            {
              out.extend([c, c, c]);
              i += 3;
              break;
            }
            blank(&mut out, chars[i].1);
            i += 1;
          }
        } else {
          out.push(c);
          i += 1;
          while i < chars.len() {
            let ch = chars[i].1;
            if ch == '\\' {
              blank(&mut out, ch);
              i += 1;
              if i < chars.len() {
                blank(&mut out, chars[i].1);
                i += 1;
              }
              continue;
            }
            if ch == c || ch == '\n' {
              out.push(ch);
              i += 1;
              break;
            }
            blank(&mut out, ch);
            i += 1;
          }
        }
      }
      '<' => match iri_end(&chars, i) {
        Some(end) => {
          out.push('<');
          for &(_, ch) in &chars[i + 1..end] {
            blank(&mut out, ch);
          }
          out.push('>');
          i = end + 1;
        }
        None => {
          out.push('<');
          i += 1;
        }
      },
      other => {
        out.push(other);
        i += 1;
      }
    }
  }

  (out, comments)
}

/// Index of the `>` closing an IRI reference opened at `start`, if the text
/// between the two is a plausible IRI. A `<` followed by whitespace is a
/// comparison operator.
fn iri_end(chars: &[(usize, char)], start: usize) -> Option<usize> {
  for (offset, &(_, ch)) in chars[start + 1..].iter().enumerate() {
    match ch {
      '>' => return Some(start + 1 + offset),
      c if c.is_whitespace() => return None,
      '<' | '"' | '{' | '}' | '|' | '^' | '`' => return None,
      _ => {}
    }
  }
  None
}

fn blank(out: &mut String, c: char) {
  for _ in 0..c.len_utf8() {
    out.push(' ');
  }
}

/// Byte index of the brace closing the one at `open`, scanning masked text.
pub fn matching_brace(masked: &str, open: usize) -> Option<usize> {
  let mut depth = 0usize;
  for (idx, b) in masked.bytes().enumerate().skip(open) {
    match b {
      b'{' => depth += 1,
      b'}' => {
        depth = depth.checked_sub(1)?;
        if depth == 0 {
          return Some(idx);
        }
      }
      _ => {}
    }
  }
  None
}
