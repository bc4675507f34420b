use crate::error::{Error, Result};
use crate::query::glob::GlobPattern;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// How a pattern is compared against stored paths
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchOptions {
    /// Lowercase both the pattern and each path before comparing
    pub ignore_case: bool,
    /// Compare against the final path component only
    pub basename: bool,
    /// Treat the pattern as a regular expression instead of a glob
    pub regex: bool,
    /// A glob without wildcards matches as a substring
    pub literal_substring: bool,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            ignore_case: false,
            basename: false,
            regex: false,
            literal_substring: true,
        }
    }
}

#[derive(Debug, Clone)]
enum Compiled {
    Glob(GlobPattern),
    Regex(Regex),
}

/// A pattern compiled once and applied to every candidate path
#[derive(Debug, Clone)]
pub struct PathMatcher {
    compiled: Compiled,
    ignore_case: bool,
    basename: bool,
}

impl PathMatcher {
    pub fn new(pattern: &str, options: &MatchOptions) -> Result<Self> {
        let compiled = if options.regex {
            let regex = RegexBuilder::new(pattern)
                .case_insensitive(options.ignore_case)
                .build()
                .map_err(|e| Error::Pattern {
                    pattern: pattern.to_string(),
                    reason: e.to_string(),
                })?;
            Compiled::Regex(regex)
        } else if options.ignore_case {
            Compiled::Glob(GlobPattern::new(&pattern.to_lowercase(), options.literal_substring))
        } else {
            Compiled::Glob(GlobPattern::new(pattern, options.literal_substring))
        };

        Ok(Self {
            compiled,
            ignore_case: options.ignore_case,
            basename: options.basename,
        })
    }

    pub fn is_match(&self, path: &str) -> bool {
        let subject = if self.basename { basename(path) } else { path };

        match &self.compiled {
            Compiled::Regex(regex) => regex.is_match(subject),
            Compiled::Glob(glob) => {
                let subject = if self.ignore_case {
                    fold_case(subject)
                } else {
                    Cow::Borrowed(subject)
                };
                glob.is_match(&subject)
            }
        }
    }
}

/// Final component of a stored path; the root itself stays `/`
fn basename(path: &str) -> &str {
    match memchr::memrchr(b'/', path.as_bytes()) {
        Some(pos) if pos + 1 < path.len() => &path[pos + 1..],
        _ => path,
    }
}

fn fold_case(text: &str) -> Cow<'_, str> {
    if text.chars().any(char::is_uppercase) {
        Cow::Owned(text.to_lowercase())
    } else {
        Cow::Borrowed(text)
    }
}
