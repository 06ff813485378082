//! Path pattern compilation.
//!
//! A pattern is either a literal string (possibly carrying `:name` tokens
//! with the modifiers `?`, `+`, and `*`) or a verbatim regular expression.
//! Compilation yields an anchored regex plus the ordered key list its capture
//! groups bind to.
//!
//! Anchoring is asymmetric on purpose: terminal routes must consume the whole
//! path, while routes that mount a nested dispatcher only need to consume a
//! prefix ending on a segment boundary.

use std::collections::HashMap;
use std::fmt;

use regex::Regex;

use junction_core::{DispatchError, DispatchResult};

/// A registerable path pattern.
#[derive(Debug, Clone)]
pub enum PathPattern {
    /// A literal path, optionally with `:name` parameter tokens.
    Literal(String),
    /// A verbatim regular expression.
    Regex(Regex),
}

impl From<&str> for PathPattern {
    fn from(raw: &str) -> Self {
        Self::Literal(raw.to_string())
    }
}

impl From<String> for PathPattern {
    fn from(raw: String) -> Self {
        Self::Literal(raw)
    }
}

impl From<Regex> for PathPattern {
    fn from(regex: Regex) -> Self {
        Self::Regex(regex)
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(raw) => f.write_str(raw),
            Self::Regex(regex) => f.write_str(regex.as_str()),
        }
    }
}

/// One or more patterns registered under the same handler.
pub struct PatternSet(Vec<PathPattern>);

impl PatternSet {
    /// The patterns in registration order.
    pub fn into_patterns(self) -> Vec<PathPattern> {
        self.0
    }
}

impl From<&str> for PatternSet {
    fn from(pattern: &str) -> Self {
        Self(vec![pattern.into()])
    }
}

impl From<String> for PatternSet {
    fn from(pattern: String) -> Self {
        Self(vec![pattern.into()])
    }
}

impl From<Regex> for PatternSet {
    fn from(pattern: Regex) -> Self {
        Self(vec![pattern.into()])
    }
}

impl From<PathPattern> for PatternSet {
    fn from(pattern: PathPattern) -> Self {
        Self(vec![pattern])
    }
}

impl From<Vec<PathPattern>> for PatternSet {
    fn from(patterns: Vec<PathPattern>) -> Self {
        Self(patterns)
    }
}

impl From<&[&str]> for PatternSet {
    fn from(patterns: &[&str]) -> Self {
        Self(patterns.iter().map(|p| PathPattern::from(*p)).collect())
    }
}

impl<const N: usize> From<[&str; N]> for PatternSet {
    fn from(patterns: [&str; N]) -> Self {
        Self(patterns.iter().map(|p| PathPattern::from(*p)).collect())
    }
}

/// A successful match against one route's pattern.
#[derive(Debug)]
pub struct PathMatch {
    /// Captured parameters, keyed by name. Unmatched optional keys are
    /// absent.
    pub params: HashMap<String, String>,
    /// Byte length of the matched prefix; nested dispatch strips this much
    /// before descending.
    pub matched_len: usize,
}

/// A compiled pattern: the anchored regex and the keys its groups bind.
#[derive(Debug, Clone)]
pub struct CompiledMatcher {
    regex: Regex,
    keys: Vec<(String, usize)>,
}

impl CompiledMatcher {
    /// Compiles a pattern. `terminal` selects end-anchoring: terminal routes
    /// match the whole path, non-terminal routes match a prefix.
    pub fn compile(pattern: &PathPattern, terminal: bool) -> DispatchResult<Self> {
        match pattern {
            PathPattern::Literal(raw) => Self::compile_literal(raw, terminal),
            PathPattern::Regex(regex) => Self::compile_regex(regex, terminal),
        }
    }

    /// Runs the matcher against a path, returning captures on a hit.
    pub fn matches(&self, path: &str) -> Option<PathMatch> {
        let caps = self.regex.captures(path)?;
        let matched_len = caps.get(0).map(|m| m.end()).unwrap_or(0);
        let mut params = HashMap::new();
        for (name, group) in &self.keys {
            if let Some(capture) = caps.get(*group) {
                params.insert(name.clone(), capture.as_str().to_string());
            }
        }
        Some(PathMatch {
            params,
            matched_len,
        })
    }

    /// The parameter names this pattern captures, in group order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(|(name, _)| name.as_str())
    }

    fn compile_literal(raw: &str, terminal: bool) -> DispatchResult<Self> {
        let segments: Vec<&str> = raw.split('/').filter(|s| !s.is_empty()).collect();

        let mut source = String::with_capacity(raw.len() + 8);
        source.push('^');

        if segments.is_empty() {
            // the bare root: terminal matches exactly "/", a mount at "/"
            // passes every path through
            source.push('/');
            if terminal {
                source.push('$');
            }
            let regex = Self::build(raw, &source)?;
            return Ok(Self {
                regex,
                keys: Vec::new(),
            });
        }

        let mut keys = Vec::new();
        let mut group = 0usize;
        for segment in segments {
            if let Some(token) = segment.strip_prefix(':') {
                let (name, modifier) = split_modifier(token);
                if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
                {
                    return Err(DispatchError::invalid(format!(
                        "bad parameter token {segment:?} in pattern {raw:?}"
                    )));
                }
                group += 1;
                match modifier {
                    None => source.push_str("/([^/]+)"),
                    Some('?') => source.push_str("(?:/([^/]+))?"),
                    Some('+') => source.push_str("/(.+)"),
                    Some('*') => source.push_str("(?:/(.+))?"),
                    Some(other) => {
                        return Err(DispatchError::invalid(format!(
                            "unknown modifier {other:?} in pattern {raw:?}"
                        )));
                    }
                }
                keys.push((name.to_string(), group));
            } else {
                source.push('/');
                source.push_str(&regex::escape(segment));
            }
        }

        if terminal {
            source.push('$');
        } else {
            source.push_str("(?:/|$)");
        }

        let regex = Self::build(raw, &source)?;
        Ok(Self { regex, keys })
    }

    fn compile_regex(regex: &Regex, terminal: bool) -> DispatchResult<Self> {
        let raw = regex.as_str();
        let mut source = String::with_capacity(raw.len() + 2);
        if !raw.starts_with('^') {
            source.push('^');
        }
        source.push_str(raw);
        if terminal && !raw.ends_with('$') {
            source.push('$');
        }

        let regex = if source == raw {
            regex.clone()
        } else {
            Self::build(raw, &source)?
        };
        let keys = regex
            .capture_names()
            .enumerate()
            .filter_map(|(group, name)| name.map(|n| (n.to_string(), group)))
            .collect();
        Ok(Self { regex, keys })
    }

    fn build(raw: &str, source: &str) -> DispatchResult<Regex> {
        Regex::new(source)
            .map_err(|err| DispatchError::invalid(format!("pattern {raw:?}: {err}")))
    }
}

fn split_modifier(token: &str) -> (&str, Option<char>) {
    match token.chars().last() {
        Some(m @ ('?' | '+' | '*')) => (&token[..token.len() - 1], Some(m)),
        _ => (token, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(raw: &str, terminal: bool) -> CompiledMatcher {
        CompiledMatcher::compile(&PathPattern::from(raw), terminal).unwrap()
    }

    #[test]
    fn literal_terminal_matches_whole_path_only() {
        let m = compile("/status", true);
        assert!(m.matches("/status").is_some());
        assert!(m.matches("/status/deep").is_none());
        assert!(m.matches("/statuses").is_none());
    }

    #[test]
    fn literal_prefix_stops_at_segment_boundaries() {
        let m = compile("/svc", false);
        let hit = m.matches("/svc/time").unwrap();
        assert_eq!(hit.matched_len, 5);
        assert!(m.matches("/svc").is_some());
        assert!(m.matches("/svcfoo").is_none());
    }

    #[test]
    fn params_capture_by_position() {
        let m = compile("/echo/:a/:b", true);
        let hit = m.matches("/echo/x/y").unwrap();
        assert_eq!(hit.params["a"], "x");
        assert_eq!(hit.params["b"], "y");
        assert_eq!(m.keys().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn optional_param_is_absent_when_unmatched() {
        let m = compile("/logs/:level?", true);
        let hit = m.matches("/logs").unwrap();
        assert!(!hit.params.contains_key("level"));
        let hit = m.matches("/logs/debug").unwrap();
        assert_eq!(hit.params["level"], "debug");
    }

    #[test]
    fn plus_requires_at_least_one_segment() {
        let m = compile("/files/:path+", true);
        assert!(m.matches("/files").is_none());
        let hit = m.matches("/files/a/b/c").unwrap();
        assert_eq!(hit.params["path"], "a/b/c");
    }

    #[test]
    fn star_allows_zero_segments() {
        let m = compile("/files/:path*", true);
        let hit = m.matches("/files").unwrap();
        assert!(!hit.params.contains_key("path"));
        let hit = m.matches("/files/a/b").unwrap();
        assert_eq!(hit.params["path"], "a/b");
    }

    #[test]
    fn root_pattern_is_exact_when_terminal_and_passthrough_when_mounted() {
        let terminal = compile("/", true);
        assert!(terminal.matches("/").is_some());
        assert!(terminal.matches("/x").is_none());

        let mounted = compile("/", false);
        let hit = mounted.matches("/anything/here").unwrap();
        assert_eq!(hit.matched_len, 1);
    }

    #[test]
    fn regex_patterns_bind_named_groups() {
        let re = Regex::new(r"/plugin/(?P<version>\d+\.\d+\.\d+)/(?P<op>[^/]+)").unwrap();
        let m = CompiledMatcher::compile(&PathPattern::from(re), true).unwrap();
        let hit = m.matches("/plugin/1.0.0/time").unwrap();
        assert_eq!(hit.params["version"], "1.0.0");
        assert_eq!(hit.params["op"], "time");
    }

    #[test]
    fn regex_terminal_gets_end_anchored() {
        let re = Regex::new(r"/status").unwrap();
        let m = CompiledMatcher::compile(&PathPattern::from(re), true).unwrap();
        assert!(m.matches("/status").is_some());
        assert!(m.matches("/status/extra").is_none());
    }

    #[test]
    fn bad_parameter_token_is_a_registration_error() {
        let err = CompiledMatcher::compile(&PathPattern::from("/x/:"), true).unwrap_err();
        assert_eq!(err.code(), "INVALID_ARGUMENT");
        let err = CompiledMatcher::compile(&PathPattern::from("/x/:na me"), true).unwrap_err();
        assert_eq!(err.code(), "INVALID_ARGUMENT");
    }

    #[test]
    fn literal_segments_are_regex_escaped() {
        let m = compile("/v1.0/status", true);
        assert!(m.matches("/v1.0/status").is_some());
        assert!(m.matches("/v1x0/status").is_none());
    }
}
