//! Shell-style glob patterns.
//!
//! Syntax:
//!
//! ```text
//! *        any run of characters other than '/'
//! ?        any single character other than '/'
//! [class]  one character from the class; `[^class]` negates,
//!          `a-z` is an inclusive range
//! \c       the literal character c
//! ```
//!
//! A pattern must match the whole name. The separator rule means `*` never
//! spans a path segment, so `foo*` matches `foo1` but not `foo/1`.

use crate::error::{StorageError, StorageResult};

const SEPARATOR: char = '/';

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Literal(char),
    Any,
    One,
    Class { negated: bool, ranges: Vec<(char, char)> },
}

impl Token {
    fn matches_char(&self, c: char) -> bool {
        match self {
            Token::Literal(l) => *l == c,
            Token::One => c != SEPARATOR,
            Token::Class { negated, ranges } => {
                if c == SEPARATOR {
                    return false;
                }
                let hit = ranges.iter().any(|(lo, hi)| *lo <= c && c <= *hi);
                hit != *negated
            }
            Token::Any => false,
        }
    }
}

/// A compiled glob pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    source: String,
    tokens: Vec<Token>,
}

impl Pattern {
    /// Compiles a pattern.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::BadPattern`] for an unterminated class, an
    /// empty class, a reversed range, or a trailing escape.
    pub fn new(pattern: &str) -> StorageResult<Self> {
        let bad = |reason| StorageError::BadPattern {
            pattern: pattern.to_string(),
            reason,
        };

        let mut tokens = Vec::new();
        let mut chars = pattern.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '*' => {
                    if tokens.last() != Some(&Token::Any) {
                        tokens.push(Token::Any);
                    }
                }
                '?' => tokens.push(Token::One),
                '\\' => {
                    let escaped = chars.next().ok_or_else(|| bad("trailing escape"))?;
                    tokens.push(Token::Literal(escaped));
                }
                '[' => {
                    let negated = chars.next_if_eq(&'^').is_some();
                    let mut ranges = Vec::new();
                    loop {
                        let lo = match chars.next() {
                            None => return Err(bad("unterminated character class")),
                            Some(']') if !ranges.is_empty() => break,
                            Some(']') => return Err(bad("empty character class")),
                            Some('\\') => chars.next().ok_or_else(|| bad("trailing escape"))?,
                            Some(other) => other,
                        };
                        let hi = if chars.next_if_eq(&'-').is_some() {
                            match chars.next() {
                                None => return Err(bad("unterminated character class")),
                                Some('\\') => {
                                    chars.next().ok_or_else(|| bad("trailing escape"))?
                                }
                                Some(other) => other,
                            }
                        } else {
                            lo
                        };
                        if hi < lo {
                            return Err(bad("character range out of order"));
                        }
                        ranges.push((lo, hi));
                    }
                    tokens.push(Token::Class { negated, ranges });
                }
                other => tokens.push(Token::Literal(other)),
            }
        }

        Ok(Self {
            source: pattern.to_string(),
            tokens,
        })
    }

    /// Returns the pattern text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Reports whether `name` matches the whole pattern.
    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        let chars: Vec<char> = name.chars().collect();
        match_tokens(&self.tokens, &chars)
    }
}

fn match_tokens(tokens: &[Token], text: &[char]) -> bool {
    let (mut p, mut t) = (0, 0);
    // Token index after the last `*` and the text index it resumes from.
    let mut star: Option<(usize, usize)> = None;

    loop {
        match tokens.get(p) {
            Some(Token::Any) => {
                star = Some((p + 1, t));
                p += 1;
                continue;
            }
            Some(token) => {
                if t < text.len() && token.matches_char(text[t]) {
                    p += 1;
                    t += 1;
                    continue;
                }
            }
            None if t == text.len() => return true,
            None => {}
        }

        // Mismatch: let the last `*` absorb one more character. It cannot
        // absorb a separator, and an earlier `*` can never do better.
        match star {
            Some((resume, from)) if from < text.len() && text[from] != SEPARATOR => {
                star = Some((resume, from + 1));
                p = resume;
                t = from + 1;
            }
            _ => return false,
        }
    }
}

/// Compiles `pattern` and matches it against `name` in one step.
///
/// # Errors
///
/// Returns [`StorageError::BadPattern`] if the pattern is malformed.
pub fn glob_match(pattern: &str, name: &str) -> StorageResult<bool> {
    Ok(Pattern::new(pattern)?.matches(name))
}
