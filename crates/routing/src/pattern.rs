//! Tag pattern matching
//!
//! Patterns are glob-style: `*` matches any run of characters, including
//! the `.` delimiter, and every other character matches itself exactly
//! (case-sensitive). A pattern must cover the whole tag; there is no
//! implicit prefix match.
//!
//! ```
//! use tributary_routing::Pattern;
//!
//! let pattern = Pattern::new("kube.*").unwrap();
//! assert!(pattern.matches("kube.var.log.containers.web.log"));
//! assert!(!pattern.matches("kubelet.log"));
//! ```

use std::fmt;

use crate::error::{Result, RoutingError};

/// Compiled match pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    source: String,
    kind: Kind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Kind {
    /// `*` alone
    Any,
    /// No wildcard at all
    Exact,
    /// Literal prefix followed by a single trailing `*`
    Prefix(usize),
    /// General case
    Glob,
}

impl Pattern {
    /// Compile a pattern
    ///
    /// # Errors
    ///
    /// Returns `RoutingError::EmptyPattern` for an empty string.
    pub fn new(pattern: impl Into<String>) -> Result<Self> {
        let source = pattern.into();
        if source.is_empty() {
            return Err(RoutingError::EmptyPattern);
        }

        let stars = source.bytes().filter(|&b| b == b'*').count();
        let kind = if source.bytes().all(|b| b == b'*') {
            Kind::Any
        } else if stars == 0 {
            Kind::Exact
        } else if stars == 1 && source.ends_with('*') {
            Kind::Prefix(source.len() - 1)
        } else {
            Kind::Glob
        };

        Ok(Self { source, kind })
    }

    /// The pattern as written in configuration
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Check whether `tag` matches this pattern in full
    pub fn matches(&self, tag: &str) -> bool {
        match self.kind {
            Kind::Any => true,
            Kind::Exact => self.source == tag,
            Kind::Prefix(len) => tag.as_bytes().starts_with(&self.source.as_bytes()[..len]),
            Kind::Glob => glob_match(self.source.as_bytes(), tag.as_bytes()),
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// One-off match without keeping the compiled pattern
///
/// # Errors
///
/// Returns `RoutingError::EmptyPattern` for an empty pattern.
pub fn matches(pattern: &str, tag: &str) -> Result<bool> {
    Ok(Pattern::new(pattern)?.matches(tag))
}

/// Iterative wildcard match with single-star backtracking
///
/// Runs in O(pattern * tag) worst case without recursion. Works on bytes:
/// `*` is ASCII, so literal byte comparison is exact for UTF-8 input.
fn glob_match(pattern: &[u8], text: &[u8]) -> bool {
    let (mut p, mut t) = (0, 0);
    let mut star: Option<usize> = None;
    let mut resume = 0;

    while t < text.len() {
        match pattern.get(p) {
            Some(b'*') => {
                star = Some(p);
                resume = t;
                p += 1;
            }
            Some(&c) if c == text[t] => {
                p += 1;
                t += 1;
            }
            _ => match star {
                Some(s) => {
                    p = s + 1;
                    resume += 1;
                    t = resume;
                }
                None => return false,
            },
        }
    }

    pattern[p..].iter().all(|&c| c == b'*')
}
