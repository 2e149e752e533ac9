//! Literal text matching with case folding and whole-word boundaries.
//!
//! Spans are expressed in *characters*, not bytes, and always index into the
//! original subject even when matching case-insensitively. Case folding is
//! applied one character at a time so a folded subject never changes length.

use crate::error::ReplaceError;
use crate::request::MatchOptions;
use serde::Serialize;

/// A half-open `[start, end)` character range inside a subject string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct MatchSpan {
    pub start: usize,
    pub end: usize,
}

impl MatchSpan {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Word characters for whole-word matching: ASCII letters, ASCII digits and
/// underscore. Fixed, independent of locale.
pub fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn fold(c: char, case_sensitive: bool) -> char {
    if case_sensitive {
        return c;
    }
    // Multi-char lowercase expansions (e.g. 'İ') compare as themselves.
    let mut lower = c.to_lowercase();
    match (lower.next(), lower.next()) {
        (Some(l), None) => l,
        _ => c,
    }
}

fn at_word_boundary(chars: &[char], start: usize, end: usize) -> bool {
    let before_ok = start == 0 || !is_word_char(chars[start - 1]);
    let after_ok = end == chars.len() || !is_word_char(chars[end]);
    before_ok && after_ok
}

/// Find all non-overlapping occurrences of `pattern` in `subject`.
///
/// Scanning is left to right; after an accepted match the scan resumes at its
/// end. Candidates rejected by the whole-word rule advance the scan by one
/// character only, so a later boundary-respecting occurrence is still found.
///
/// # Errors
///
/// Returns [`ReplaceError::InvalidPattern`] if `pattern` is empty.
pub fn find_matches(
    subject: &str,
    pattern: &str,
    options: &MatchOptions,
) -> Result<Vec<MatchSpan>, ReplaceError> {
    if pattern.is_empty() {
        return Err(ReplaceError::InvalidPattern);
    }

    let chars: Vec<char> = subject.chars().collect();
    let needle: Vec<char> = pattern
        .chars()
        .map(|c| fold(c, options.case_sensitive))
        .collect();

    let mut spans = Vec::new();
    let mut pos = 0;
    while pos + needle.len() <= chars.len() {
        let end = pos + needle.len();
        let hit = chars[pos..end]
            .iter()
            .zip(&needle)
            .all(|(&c, &n)| fold(c, options.case_sensitive) == n);

        if hit && (!options.whole_word || at_word_boundary(&chars, pos, end)) {
            spans.push(MatchSpan { start: pos, end });
            pos = end;
        } else {
            pos += 1;
        }
    }

    Ok(spans)
}

/// Count the matches [`find_matches`] would return.
pub fn count_matches(
    subject: &str,
    pattern: &str,
    options: &MatchOptions,
) -> Result<usize, ReplaceError> {
    Ok(find_matches(subject, pattern, options)?.len())
}

/// Replace every match of `pattern` in `subject` with `replacement`.
///
/// The output is rebuilt from the unmatched runs and the replacement text, so
/// replacement text is never rescanned.
pub fn replace_all(
    subject: &str,
    pattern: &str,
    replacement: &str,
    options: &MatchOptions,
) -> Result<String, ReplaceError> {
    let spans = find_matches(subject, pattern, options)?;
    Ok(splice(subject, &spans, replacement))
}

/// Substitute each span (sorted, non-overlapping) with `replacement`.
pub fn splice(subject: &str, spans: &[MatchSpan], replacement: &str) -> String {
    if spans.is_empty() {
        return subject.to_string();
    }

    // Byte offset of every char boundary, including the end of the string.
    let boundaries: Vec<usize> = subject
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(subject.len()))
        .collect();

    let mut out = String::with_capacity(subject.len() + spans.len() * replacement.len());
    let mut cursor = 0;
    for span in spans {
        out.push_str(&subject[boundaries[cursor]..boundaries[span.start]]);
        out.push_str(replacement);
        cursor = span.end;
    }
    out.push_str(&subject[boundaries[cursor]..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(case_sensitive: bool, whole_word: bool) -> MatchOptions {
        MatchOptions {
            case_sensitive,
            whole_word,
            ..MatchOptions::default()
        }
    }

    #[test]
    fn test_empty_pattern_rejected() {
        let result = find_matches("anything", "", &opts(true, false));
        assert!(matches!(result, Err(ReplaceError::InvalidPattern)));
        let result = replace_all("anything", "", "x", &opts(false, true));
        assert!(matches!(result, Err(ReplaceError::InvalidPattern)));
    }

    #[test]
    fn test_whole_word_toggle() {
        let spans = find_matches("concatenate", "cat", &opts(true, true)).unwrap();
        assert!(spans.is_empty());

        let spans = find_matches("concatenate", "cat", &opts(true, false)).unwrap();
        assert_eq!(spans, vec![MatchSpan { start: 3, end: 6 }]);
    }

    #[test]
    fn test_case_sensitivity() {
        let insensitive = find_matches("foo foo Foo", "Foo", &opts(false, false)).unwrap();
        assert_eq!(insensitive.len(), 3);

        let sensitive = find_matches("foo foo Foo", "Foo", &opts(true, false)).unwrap();
        assert_eq!(sensitive, vec![MatchSpan { start: 8, end: 11 }]);
    }

    #[test]
    fn test_no_overlapping_matches() {
        let spans = find_matches("aaaa", "aa", &opts(true, false)).unwrap();
        assert_eq!(
            spans,
            vec![MatchSpan { start: 0, end: 2 }, MatchSpan { start: 2, end: 4 }]
        );
    }

    #[test]
    fn test_whole_word_rejection_advances_by_one() {
        // First candidate "foo" at 0 is glued to "foox"; the standalone one must still be found.
        let spans = find_matches("foox foo", "foo", &opts(true, true)).unwrap();
        assert_eq!(spans, vec![MatchSpan { start: 5, end: 8 }]);
    }

    #[test]
    fn test_whole_word_underscore_and_digits_are_word_chars() {
        assert!(find_matches("my_cat", "cat", &opts(true, true))
            .unwrap()
            .is_empty());
        assert!(find_matches("cat9", "cat", &opts(true, true))
            .unwrap()
            .is_empty());
        assert_eq!(
            find_matches("cat-dog.cat", "cat", &opts(true, true))
                .unwrap()
                .len(),
            2
        );
    }

    #[test]
    fn test_spans_are_character_offsets() {
        let spans = find_matches("héllo wörld", "wÖrld", &opts(false, false)).unwrap();
        assert_eq!(spans, vec![MatchSpan { start: 6, end: 11 }]);
    }

    #[test]
    fn test_replace_all_does_not_rematch_replacement() {
        let out = replace_all("a a", "a", "aa", &opts(true, false)).unwrap();
        assert_eq!(out, "aa aa");
    }

    #[test]
    fn test_replace_all_case_insensitive_keeps_unmatched_text() {
        let out = replace_all("Foo.txt and FOO", "foo", "bar", &opts(false, false)).unwrap();
        assert_eq!(out, "bar.txt and bar");
    }

    #[test]
    fn test_replace_all_with_multibyte_neighbours() {
        let out = replace_all("ünïcode foo ✓", "foo", "bär", &opts(true, true)).unwrap();
        assert_eq!(out, "ünïcode bär ✓");
    }

    #[test]
    fn test_replace_with_empty_string() {
        let out = replace_all("prefix_name", "prefix_", "", &opts(true, false)).unwrap();
        assert_eq!(out, "name");
    }

    #[test]
    fn test_case_insensitive_scan_can_shift_spans() {
        // "aA" matches at 0 insensitively and consumes the start of the exact "Aa".
        let sensitive = find_matches("aAa", "Aa", &opts(true, false)).unwrap();
        let insensitive = find_matches("aAa", "Aa", &opts(false, false)).unwrap();
        assert_eq!(sensitive, vec![MatchSpan { start: 1, end: 3 }]);
        assert_eq!(insensitive, vec![MatchSpan { start: 0, end: 2 }]);
    }

    #[test]
    fn test_count_matches() {
        assert_eq!(count_matches("Foo foo FOO", "foo", &opts(false, false)).unwrap(), 3);
        assert_eq!(count_matches("Foo foo FOO", "foo", &opts(true, false)).unwrap(), 1);
        assert_eq!(count_matches("foo_bar foo", "foo", &opts(false, true)).unwrap(), 1);
    }

    #[test]
    fn test_pattern_longer_than_subject() {
        assert!(find_matches("ab", "abc", &opts(true, false))
            .unwrap()
            .is_empty());
    }
}
