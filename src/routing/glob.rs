//! # Glob patterns with capture spans.
//!
//! Implements the store's pattern-subscription matching rules:
//!
//! | Token      | Matches                                        |
//! |------------|------------------------------------------------|
//! | `*`        | any sequence of characters (including empty)   |
//! | `?`        | exactly one character                          |
//! | `[abc]`    | one character from the set                     |
//! | `[^abc]`   | one character not in the set                   |
//! | `[a-z]`    | one character in the range (bounds may be swapped) |
//! | `\x`       | the literal character `x`                      |
//!
//! Besides a yes/no answer, [`Glob::captures`] returns the text each wildcard
//! token consumed, in pattern order. Stars take the shortest match that lets the
//! remainder succeed, the same way the store resolves them. Matching time is
//! linear in the subject, even for patterns full of stars.
//!
//! ## Example
//! ```rust
//! use keyspace_router::Glob;
//!
//! let glob = Glob::new("__keyevent@0__:user.*");
//! assert!(glob.matches("__keyevent@0__:user.42"));
//! assert_eq!(glob.captures("__keyevent@0__:user.42"), Some(vec!["42"]));
//! ```

use regex::Regex;

/// One member of a `[...]` class.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ClassItem {
    Single(char),
    Range(char, char),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Literal(char),
    Any,
    Star,
    Class { negated: bool, items: Vec<ClassItem> },
}

/// Compiled glob pattern.
///
/// Matching runs on a regular expression built from the pattern, one capture
/// group per wildcard token, so it is linear in the subject length whatever
/// the number of stars.
#[derive(Debug, Clone)]
pub struct Glob {
    source: String,
    literal: bool,
    /// `None` when the pattern can never match (an empty `[]` class).
    regex: Option<Regex>,
}

impl PartialEq for Glob {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for Glob {}

impl Glob {
    /// Compiles a pattern. Every input is a valid pattern; an unterminated class
    /// runs to the end of the pattern.
    pub fn new(pattern: &str) -> Self {
        let tokens = parse(pattern);
        Self {
            source: pattern.to_string(),
            literal: tokens.iter().all(|t| matches!(t, Token::Literal(_))),
            regex: to_regex(&tokens),
        }
    }

    /// The pattern text this glob was compiled from.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Returns `true` if the pattern has no wildcard tokens.
    pub fn is_literal(&self) -> bool {
        self.literal
    }

    /// Returns `true` if `subject` matches the whole pattern.
    pub fn matches(&self, subject: &str) -> bool {
        self.regex.as_ref().is_some_and(|re| re.is_match(subject))
    }

    /// Matches `subject` and returns the text consumed by each wildcard token.
    ///
    /// Returns `None` when the subject does not match. A literal pattern that
    /// matches yields an empty vector.
    pub fn captures<'s>(&self, subject: &'s str) -> Option<Vec<&'s str>> {
        let caps = self.regex.as_ref()?.captures(subject)?;
        Some(
            caps.iter()
                .skip(1)
                .map(|m| m.map_or("", |m| m.as_str()))
                .collect(),
        )
    }
}

/// Returns `true` if `pattern` contains any wildcard token.
pub fn has_wildcards(pattern: &str) -> bool {
    !parse(pattern)
        .iter()
        .all(|t| matches!(t, Token::Literal(_)))
}

/// Anchored expression with one group per wildcard. Stars are lazy so each
/// takes the shortest span that lets the remainder match.
fn to_regex(tokens: &[Token]) -> Option<Regex> {
    let mut re = String::from("(?s)^");
    for token in tokens {
        match token {
            Token::Literal(c) => re.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
            Token::Any => re.push_str("(.)"),
            Token::Star => re.push_str("(.*?)"),
            Token::Class { negated, items } => {
                if items.is_empty() {
                    if *negated {
                        re.push_str("(.)");
                        continue;
                    }
                    return None;
                }
                re.push_str(if *negated { "([^" } else { "([" });
                for item in items {
                    match *item {
                        ClassItem::Single(c) => re.push_str(&class_escape(c)),
                        ClassItem::Range(lo, hi) => {
                            re.push_str(&class_escape(lo));
                            re.push('-');
                            re.push_str(&class_escape(hi));
                        }
                    }
                }
                re.push_str("])");
            }
        }
    }
    re.push('$');
    Regex::new(&re).ok()
}

fn class_escape(c: char) -> String {
    regex::escape(c.encode_utf8(&mut [0; 4]))
}

fn parse(pattern: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = pattern.chars().peekable();

    while let Some(c) = chars.next() {
        let token = match c {
            '*' => {
                // consecutive stars collapse into one
                if matches!(tokens.last(), Some(Token::Star)) {
                    continue;
                }
                Token::Star
            }
            '?' => Token::Any,
            '\\' => Token::Literal(chars.next().unwrap_or('\\')),
            '[' => {
                let negated = chars.next_if_eq(&'^').is_some();
                let mut items = Vec::new();
                loop {
                    match chars.next() {
                        None | Some(']') => break,
                        Some('\\') => {
                            if let Some(esc) = chars.next() {
                                items.push(ClassItem::Single(esc));
                            }
                        }
                        Some(lo) => {
                            let mut ahead = chars.clone();
                            match (ahead.next(), ahead.next()) {
                                (Some('-'), Some(hi)) if hi != ']' => {
                                    chars.next();
                                    chars.next();
                                    let (lo, hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };
                                    items.push(ClassItem::Range(lo, hi));
                                }
                                _ => items.push(ClassItem::Single(lo)),
                            }
                        }
                    }
                }
                Token::Class { negated, items }
            }
            other => Token::Literal(other),
        };
        tokens.push(token);
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_patterns() {
        let g = Glob::new("__keyspace@0__:session");
        assert!(g.is_literal());
        assert!(g.matches("__keyspace@0__:session"));
        assert!(!g.matches("__keyspace@0__:sessions"));
        assert_eq!(g.captures("__keyspace@0__:session"), Some(vec![]));
    }

    #[test]
    fn star_captures_shortest_viable_span() {
        let g = Glob::new("user.*.profile");
        assert_eq!(g.captures("user.42.profile"), Some(vec!["42"]));
        assert_eq!(g.captures("user.a.profile.profile"), Some(vec!["a.profile"]));
        assert!(!g.matches("user.42.settings"));

        let g = Glob::new("*:*");
        assert_eq!(g.captures("a:b:c"), Some(vec!["a", "b:c"]));
    }

    #[test]
    fn consecutive_stars_collapse() {
        let g = Glob::new("a**b");
        assert_eq!(g.captures("axyzb"), Some(vec!["xyz"]));
        assert_eq!(g.captures("ab"), Some(vec![""]));
    }

    #[test]
    fn question_mark_and_classes() {
        let g = Glob::new("h?llo");
        assert!(g.matches("hello"));
        assert!(g.matches("hallo"));
        assert!(!g.matches("hllo"));
        assert_eq!(g.captures("hxllo"), Some(vec!["x"]));

        let g = Glob::new("h[ae]llo");
        assert!(g.matches("hello"));
        assert!(!g.matches("hillo"));

        let g = Glob::new("h[^e]llo");
        assert!(g.matches("hallo"));
        assert!(!g.matches("hello"));

        let g = Glob::new("key[0-9]");
        assert!(g.matches("key7"));
        assert!(!g.matches("keyx"));

        let g = Glob::new("key[9-0]");
        assert!(g.matches("key3"));
    }

    #[test]
    fn escapes_are_literal() {
        let g = Glob::new(r"a\*b");
        assert!(g.is_literal());
        assert!(g.matches("a*b"));
        assert!(!g.matches("axb"));

        let g = Glob::new(r"[\]]x");
        assert!(g.matches("]x"));
    }

    #[test]
    fn unterminated_class_runs_to_end() {
        let g = Glob::new("a[bc");
        assert!(g.matches("ab"));
        assert!(g.matches("ac"));
        assert!(!g.matches("ad"));
    }

    #[test]
    fn multibyte_subjects() {
        let g = Glob::new("room:?:*");
        assert_eq!(g.captures("room:é:café"), Some(vec!["é", "café"]));
    }

    #[test]
    fn many_stars_do_not_backtrack() {
        let g = Glob::new("*a*a*a*a*a*a*a*a*b");
        let subject = "a".repeat(5_000);

        let started = std::time::Instant::now();
        assert!(!g.matches(&subject));
        assert!(g.captures(&subject).is_none());
        assert!(started.elapsed() < std::time::Duration::from_secs(5));

        let hit = format!("{subject}b");
        assert!(g.matches(&hit));
    }

    #[test]
    fn empty_class_never_matches() {
        assert!(!Glob::new("a[]").matches("a"));
        assert!(!Glob::new("a[]").matches("ab"));
        assert!(Glob::new("a[^]").matches("ab"));
    }

    #[test]
    fn regex_metacharacters_are_literal() {
        let g = Glob::new("a.b(c)+$");
        assert!(g.matches("a.b(c)+$"));
        assert!(!g.matches("axb(c)+$"));

        let g = Glob::new("k[.-]");
        assert!(g.matches("k."));
        assert!(g.matches("k-"));
        assert!(!g.matches("kx"));
    }

    #[test]
    fn wildcard_detection() {
        assert!(has_wildcards("user.*"));
        assert!(has_wildcards("user.[ab]"));
        assert!(!has_wildcards("user.42"));
        assert!(!has_wildcards(r"user.\*"));
    }
}
