//! Ignore patterns for call-site source locations
//!
//! Patterns are shell globs with fnmatch semantics: `*` matches any run of
//! characters (including `/`), `?` one character, `[seq]` / `[!seq]` a
//! character class. The whole source string must match. All patterns are
//! compiled into a single `RegexSet`.

use anyhow::{Context, Result};
use regex::RegexSet;

/// Predicate deciding which call-sites are left uninstrumented
#[derive(Debug, Clone)]
pub struct IgnoreFilter {
    patterns: Vec<String>,
    set: RegexSet,
}

impl IgnoreFilter {
    /// A filter that ignores nothing
    pub fn none() -> Self {
        Self {
            patterns: Vec::new(),
            set: RegexSet::empty(),
        }
    }

    /// Compile a list of glob patterns
    ///
    /// # Example
    /// ```
    /// use vatio::filter::IgnoreFilter;
    ///
    /// let filter = IgnoreFilter::from_patterns(["tests/*", "*/vendor/*"]).unwrap();
    /// assert!(filter.should_ignore("tests/helpers.rs"));
    /// assert!(!filter.should_ignore("src/main.rs"));
    /// ```
    pub fn from_patterns<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns: Vec<String> = patterns
            .into_iter()
            .map(|p| p.as_ref().trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();
        let regexes: Vec<String> = patterns.iter().map(|p| glob_to_regex(p)).collect();
        let set = RegexSet::new(&regexes)
            .with_context(|| format!("Invalid ignore pattern in {:?}", patterns))?;
        Ok(Self { patterns, set })
    }

    /// Check if a call-site with this source location should be skipped
    pub fn should_ignore(&self, source: &str) -> bool {
        self.set.is_match(source)
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

impl Default for IgnoreFilter {
    fn default() -> Self {
        Self::none()
    }
}

/// Translate one glob into an anchored regex
fn glob_to_regex(glob: &str) -> String {
    let chars: Vec<char> = glob.chars().collect();
    let mut out = String::from("^(?s:");
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '*' => {
                out.push_str(".*");
                // Collapse runs of '*'
                while i + 1 < chars.len() && chars[i + 1] == '*' {
                    i += 1;
                }
            }
            '?' => out.push('.'),
            '[' => match class_end(&chars, i) {
                Some(end) => {
                    out.push_str(&translate_class(&chars[i + 1..end]));
                    i = end;
                }
                None => out.push_str(r"\["),
            },
            c => out.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
        }
        i += 1;
    }

    out.push_str(")$");
    out
}

/// Index of the `]` closing the class opened at `open`
///
/// A `]` directly after `[` or `[!` is a literal member.
fn class_end(chars: &[char], open: usize) -> Option<usize> {
    let mut j = open + 1;
    if chars.get(j) == Some(&'!') {
        j += 1;
    }
    if chars.get(j) == Some(&']') {
        j += 1;
    }
    (j..chars.len()).find(|&k| chars[k] == ']')
}

fn translate_class(body: &[char]) -> String {
    let (negated, members) = match body.first() {
        Some('!') => (true, &body[1..]),
        _ => (false, body),
    };
    let mut out = String::from(if negated { "[^" } else { "[" });
    for &c in members {
        // Class metacharacters, including the `&&` and `~~` set operators
        if matches!(c, '\\' | '[' | ']' | '^' | '&' | '~') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push(']');
    out
}
