//! Route template compilation.
//!
//! Templates are `/`-delimited. A segment is either a literal, `<name>`
//! (exactly one non-empty path segment) or `<name..>` (one or more trailing
//! segments, captured joined by `/`). A catch-all must be the final segment.
//!
//! Templates are compiled once, when the route is registered. Every malformed
//! template is rejected there so nothing can mismatch at request time.

use thiserror::Error;

use crate::routing::Params;

/// Registration-time error for a route template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteConfigError {
    #[error("route template '{template}' must start with '/'")]
    MissingLeadingSlash { template: String },

    #[error("catch-all <{name}..> must be the last segment of '{template}'")]
    CatchAllNotLast { template: String, name: String },

    #[error("segment '{segment}' of '{template}' is not a valid placeholder")]
    MalformedPlaceholder { template: String, segment: String },

    #[error("placeholder '{name}' appears more than once in '{template}'")]
    DuplicatePlaceholder { template: String, name: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
    CatchAll(String),
}

/// A compiled route template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    template: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    /// Compile a template.
    ///
    /// # Errors
    ///
    /// Returns a [`RouteConfigError`] when the template does not start with `/`,
    /// contains an unbalanced or invalid `<...>` segment, repeats a placeholder
    /// name, or has a catch-all anywhere but last.
    pub fn compile(template: &str) -> Result<Self, RouteConfigError> {
        let Some(rest) = template.strip_prefix('/') else {
            return Err(RouteConfigError::MissingLeadingSlash {
                template: template.to_string(),
            });
        };

        let raw: Vec<&str> = rest.split('/').collect();
        let mut segments = Vec::with_capacity(raw.len());
        let mut names: Vec<String> = Vec::new();

        for (i, part) in raw.iter().enumerate() {
            let segment = parse_segment(template, part)?;

            if let Segment::Param(name) | Segment::CatchAll(name) = &segment {
                if names.contains(name) {
                    return Err(RouteConfigError::DuplicatePlaceholder {
                        template: template.to_string(),
                        name: name.clone(),
                    });
                }
                names.push(name.clone());
            }

            if let Segment::CatchAll(name) = &segment {
                if i + 1 != raw.len() {
                    return Err(RouteConfigError::CatchAllNotLast {
                        template: template.to_string(),
                        name: name.clone(),
                    });
                }
            }

            segments.push(segment);
        }

        Ok(Self {
            template: template.to_string(),
            segments,
        })
    }

    /// The template this pattern was compiled from.
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Match a request path, returning captured placeholders on success.
    pub fn match_path(&self, path: &str) -> Option<Params> {
        let rest = path.strip_prefix('/')?;
        let parts: Vec<&str> = rest.split('/').collect();
        let mut params = Params::new();

        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Literal(lit) => {
                    if *parts.get(i)? != lit.as_str() {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    let value = parts.get(i)?;
                    if value.is_empty() {
                        return None;
                    }
                    params.insert(name.clone(), (*value).to_string());
                }
                Segment::CatchAll(name) => {
                    let remainder = parts.get(i..)?.join("/");
                    if remainder.is_empty() {
                        return None;
                    }
                    params.insert(name.clone(), remainder);
                    return Some(params);
                }
            }
        }

        (parts.len() == self.segments.len()).then_some(params)
    }
}

fn parse_segment(template: &str, part: &str) -> Result<Segment, RouteConfigError> {
    let malformed = || RouteConfigError::MalformedPlaceholder {
        template: template.to_string(),
        segment: part.to_string(),
    };

    if !part.contains('<') && !part.contains('>') {
        return Ok(Segment::Literal(part.to_string()));
    }

    let inner = part
        .strip_prefix('<')
        .and_then(|p| p.strip_suffix('>'))
        .ok_or_else(malformed)?;

    let (name, catch_all) = match inner.strip_suffix("..") {
        Some(name) => (name, true),
        None => (inner, false),
    };

    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(malformed());
    }

    Ok(if catch_all {
        Segment::CatchAll(name.to_string())
    } else {
        Segment::Param(name.to_string())
    })
}
