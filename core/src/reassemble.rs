//! Word-boundary recovery for token-level generation output.
//!
//! The generator emits sub-word tokens without reliable whitespace between
//! them. [`append_fragment`] looks only at the two characters that meet at
//! the join and decides whether a single space belongs there.
//!
//! The sentence-punctuation rule is a heuristic: `3.` followed by `14`
//! becomes `3. 14`, the same way `end.` followed by `Next` becomes
//! `end. Next`.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CharClass {
    Letter,
    Digit,
    Whitespace,
    Punctuation,
    Other,
}

const PUNCTUATION: &[char] = &[
    '.', ',', '!', '?', ';', ':', '(', ')', '[', ']', '{', '}', '"', '\'', '`', '-',
];

const SENTENCE_PUNCTUATION: &[char] = &['.', ',', '!', '?', ';', ':'];

fn classify(c: char) -> CharClass {
    if c.is_whitespace() {
        CharClass::Whitespace
    } else if c.is_alphabetic() {
        CharClass::Letter
    } else if c.is_numeric() {
        CharClass::Digit
    } else if PUNCTUATION.contains(&c) {
        CharClass::Punctuation
    } else {
        CharClass::Other
    }
}

fn needs_space(last: char, first: char) -> bool {
    use CharClass::*;

    match (classify(last), classify(first)) {
        (Whitespace, _) | (_, Whitespace) => false,
        (Letter, Letter) | (Letter, Digit) | (Digit, Letter) => true,
        (Punctuation, Letter | Digit) => SENTENCE_PUNCTUATION.contains(&last),
        _ => false,
    }
}

/// Returns `existing` followed by `fragment`, with one space inserted when
/// the characters meeting at the join indicate a lost word boundary.
pub fn append_fragment(existing: &str, fragment: &str) -> String {
    let mut out = String::with_capacity(existing.len() + fragment.len() + 1);
    out.push_str(existing);
    push_fragment(&mut out, fragment);
    out
}

/// In-place form of [`append_fragment`].
pub(crate) fn push_fragment(text: &mut String, fragment: &str) {
    if let (Some(last), Some(first)) = (text.chars().next_back(), fragment.chars().next()) {
        if needs_space(last, first) {
            text.push(' ');
        }
    }
    text.push_str(fragment);
}
