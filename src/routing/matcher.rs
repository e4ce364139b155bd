//! Path matching logic.
//!
//! # Responsibilities
//! - Match a request path against a compiled route template
//! - Capture placeholder values into [`Params`]
//!
//! # Design Decisions
//! - Path matching is case-sensitive and exact (no trailing-slash folding)
//! - Templates using `<name>` / `<name..>` go through [`PathPattern`]
//! - Templates without `<` use [`SegmentMatcher`], the baseline that only
//!   understands literal segments and `:name` placeholders
//! - No regex to guarantee O(n) matching

use crate::routing::pattern::{PathPattern, RouteConfigError};
use crate::routing::Params;

/// Trait for matching request paths against a route template.
pub trait Matcher: Send + Sync + std::fmt::Debug {
    /// Returns the captured parameters if `path` matches.
    fn match_path(&self, path: &str) -> Option<Params>;
}

impl Matcher for PathPattern {
    fn match_path(&self, path: &str) -> Option<Params> {
        PathPattern::match_path(self, path)
    }
}

/// Plain segment-by-segment matcher.
///
/// Segment counts must be equal; `:name` segments capture whatever sits at
/// that position, every other segment must be equal.
#[derive(Debug, Clone)]
pub struct SegmentMatcher {
    parts: Vec<String>,
}

impl SegmentMatcher {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            parts: template.into().split('/').map(str::to_string).collect(),
        }
    }
}

impl Matcher for SegmentMatcher {
    fn match_path(&self, path: &str) -> Option<Params> {
        let path_parts: Vec<&str> = path.split('/').collect();
        if path_parts.len() != self.parts.len() {
            return None;
        }

        let mut params = Params::new();
        for (route_part, path_part) in self.parts.iter().zip(path_parts) {
            if let Some(name) = route_part.strip_prefix(':') {
                params.insert(name.to_string(), path_part.to_string());
            } else if route_part != path_part {
                return None;
            }
        }
        Some(params)
    }
}

/// Compile a template into the matcher appropriate for its syntax.
pub fn compile_matcher(template: &str) -> Result<Box<dyn Matcher>, RouteConfigError> {
    if template.contains('<') || template.contains('>') {
        Ok(Box::new(PathPattern::compile(template)?))
    } else {
        Ok(Box::new(SegmentMatcher::new(template)))
    }
}
