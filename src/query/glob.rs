//! Glob compilation for path queries.
//!
//! `*` matches any run of characters, separators included, and `?` matches
//! exactly one character. Everything else is literal; there are no
//! character classes and no escapes.
//!
//! A pattern is anchored at the end of the path. At the start it is anchored
//! to the whole path when it begins with a separator or `*`, otherwise it may
//! also begin right after any separator, so `file?.log` finds `/x/file1.log`.

use memchr::memmem::Finder;

/// One step of a compiled glob
#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    /// Run of literal text
    Literal(String),
    /// `?`
    AnyChar,
    /// `*`
    AnyRun,
}

/// A glob compiled once and applied to many paths
#[derive(Debug, Clone)]
pub struct GlobPattern {
    kind: Kind,
}

#[derive(Debug, Clone)]
enum Kind {
    /// Matches every path
    Everything,
    /// `*text*`: plain substring search
    Substring(Finder<'static>),
    /// No wildcards at all: whole string equality
    Exact(String),
    /// General case
    Tokens { tokens: Vec<Token>, anchored: bool },
}

impl GlobPattern {
    /// Compile `pattern`.
    ///
    /// With `literal_substring` set, a pattern without wildcards matches
    /// any path containing it, the way `locate` treats plain words.
    pub fn new(pattern: &str, literal_substring: bool) -> Self {
        let mut tokens = tokenize(pattern);

        if tokens.iter().all(|t| matches!(t, Token::Literal(_))) {
            if literal_substring {
                tokens.insert(0, Token::AnyRun);
                tokens.push(Token::AnyRun);
            } else {
                return Self {
                    kind: Kind::Exact(pattern.to_string()),
                };
            }
        }

        let kind = match tokens.as_slice() {
            [] => Kind::Exact(String::new()),
            [Token::AnyRun] | [Token::AnyRun, Token::AnyRun] => Kind::Everything,
            [Token::AnyRun, Token::Literal(text), Token::AnyRun] => {
                Kind::Substring(Finder::new(text.as_bytes()).into_owned())
            }
            _ => {
                let anchored = pattern.starts_with(std::path::is_separator)
                    || pattern.starts_with('*');
                Kind::Tokens { tokens, anchored }
            }
        };

        Self { kind }
    }

    pub fn is_match(&self, text: &str) -> bool {
        match &self.kind {
            Kind::Everything => true,
            Kind::Substring(finder) => finder.find(text.as_bytes()).is_some(),
            Kind::Exact(expected) => text == expected,
            Kind::Tokens { tokens, anchored } => {
                if match_tokens(tokens, text) {
                    return true;
                }
                if *anchored {
                    return false;
                }
                memchr::memchr_iter(b'/', text.as_bytes())
                    .any(|sep| match_tokens(tokens, &text[sep + 1..]))
            }
        }
    }
}

/// Split a pattern into literal runs and wildcards; consecutive `*` collapse
fn tokenize(pattern: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut literal = String::new();

    for c in pattern.chars() {
        match c {
            '*' | '?' => {
                if !literal.is_empty() {
                    tokens.push(Token::Literal(std::mem::take(&mut literal)));
                }
                if c == '?' {
                    tokens.push(Token::AnyChar);
                } else if tokens.last() != Some(&Token::AnyRun) {
                    tokens.push(Token::AnyRun);
                }
            }
            _ => literal.push(c),
        }
    }
    if !literal.is_empty() {
        tokens.push(Token::Literal(literal));
    }
    tokens
}

/// Width in bytes of the char starting at `at`
fn char_width(text: &str, at: usize) -> usize {
    text[at..].chars().next().map_or(1, char::len_utf8)
}

/// Match the whole of `text` against `tokens`.
///
/// Greedy scan that remembers only the most recent `*`; on a mismatch the
/// star absorbs one more character and matching resumes after it.
fn match_tokens(tokens: &[Token], text: &str) -> bool {
    let bytes = text.as_bytes();
    let mut t = 0;
    let mut p = 0;
    // (token after the star, text position the star currently stops at)
    let mut star: Option<(usize, usize)> = None;

    loop {
        if let Some(token) = tokens.get(p) {
            let advanced = match token {
                Token::AnyRun => {
                    star = Some((p + 1, t));
                    p += 1;
                    continue;
                }
                Token::AnyChar if t < bytes.len() => {
                    t += char_width(text, t);
                    true
                }
                Token::Literal(lit) if bytes[t..].starts_with(lit.as_bytes()) => {
                    t += lit.len();
                    true
                }
                _ => false,
            };
            if advanced {
                p += 1;
                continue;
            }
        } else if t == bytes.len() {
            return true;
        }

        match star {
            Some((resume, stop)) if stop < bytes.len() => {
                let stop = stop + char_width(text, stop);
                star = Some((resume, stop));
                p = resume;
                t = stop;
            }
            _ => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn glob(pattern: &str) -> GlobPattern {
        GlobPattern::new(pattern, true)
    }

    #[test]
    fn test_extension_glob() {
        let g = glob("*.txt");
        assert!(g.is_match("/a/b.txt"));
        assert!(!g.is_match("/a/b.md"));
        assert!(!g.is_match("/a/b.txt.bak"));
    }

    #[test]
    fn test_question_mark_is_one_char() {
        let g = glob("file?.log");
        assert!(g.is_match("/x/file1.log"));
        assert!(!g.is_match("/x/file10.log"));
        assert!(!g.is_match("/x/file.log"));
        assert!(!g.is_match("/x/myfile1.log"));
    }

    #[test]
    fn test_question_mark_spans_utf8_char() {
        let g = glob("caf?.txt");
        assert!(g.is_match("/docs/café.txt"));
        assert!(!g.is_match("/docs/cafe.txt.orig"));
    }

    #[test]
    fn test_star_crosses_separators() {
        let g = glob("/home/*.rs");
        assert!(g.is_match("/home/user/src/main.rs"));
        assert!(!g.is_match("/opt/home/main.rs"));
    }

    #[test]
    fn test_relative_pattern_starts_at_component() {
        let g = glob("src/*.rs");
        assert!(g.is_match("/project/src/lib.rs"));
        assert!(g.is_match("/project/src/query/glob.rs"));
        assert!(!g.is_match("/project/mysrc/lib.rs"));
    }

    #[test]
    fn test_multiple_stars_backtrack() {
        let g = glob("*a*b*c");
        assert!(g.is_match("/xaybzc"));
        assert!(g.is_match("/abcabc"));
        assert!(!g.is_match("/cba"));
    }

    #[test]
    fn test_plain_word_is_substring() {
        let g = glob("notes");
        assert!(g.is_match("/home/u/notes.md"));
        assert!(g.is_match("/srv/notes"));
        assert!(!g.is_match("/home/u/note.md"));
    }

    #[test]
    fn test_plain_word_exact_without_substring() {
        let g = GlobPattern::new("/srv/notes", false);
        assert!(g.is_match("/srv/notes"));
        assert!(!g.is_match("/srv/notes.md"));
    }

    #[test]
    fn test_star_matches_everything() {
        let g = glob("*");
        assert!(g.is_match(""));
        assert!(g.is_match("/any/path"));
        assert!(glob("**").is_match("/x"));
    }

    #[test]
    fn test_tokenize_collapses_stars() {
        assert_eq!(
            tokenize("a**?b"),
            vec![
                Token::Literal("a".into()),
                Token::AnyRun,
                Token::AnyChar,
                Token::Literal("b".into()),
            ]
        );
    }
}
