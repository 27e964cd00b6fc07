//! Path pattern parsing and matching.
//!
//! # Responsibilities
//! - Parse `/users/:id` style patterns into typed segments
//! - Reject malformed patterns at registration time
//! - Score each segment for specificity ordering
//! - Match incoming paths and capture named parameters
//!
//! # Design Decisions
//! - One named parameter per segment, optionally wrapped by a literal
//!   prefix/suffix (`/files/:name.json`)
//! - No regex: regex-looking characters are rejected outright
//! - Literal segments compare against the raw (still percent-encoded) path;
//!   captured parameter values are percent-decoded

use percent_encoding::percent_decode_str;

use crate::routing::RouteError;

/// Characters that suggest a regex or glob segment.
const REGEX_CHARS: &[char] = &['(', ')', '[', ']', '{', '}', '*', '+', '?', '|', '^', '$', '\\'];

/// Specificity score of a literal segment.
pub const LITERAL_SCORE: u8 = 3;
/// Specificity score of a parameter with a literal prefix or suffix.
pub const AFFIXED_PARAM_SCORE: u8 = 2;
/// Specificity score of a bare parameter segment.
pub const PARAM_SCORE: u8 = 1;

/// A single `/`-delimited piece of a pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Param {
        name: String,
        prefix: String,
        suffix: String,
    },
}

impl Segment {
    /// Literal beats affixed parameter beats bare parameter.
    pub fn specificity(&self) -> u8 {
        match self {
            Segment::Literal(_) => LITERAL_SCORE,
            Segment::Param { prefix, suffix, .. } if !prefix.is_empty() || !suffix.is_empty() => {
                AFFIXED_PARAM_SCORE
            }
            Segment::Param { .. } => PARAM_SCORE,
        }
    }

    fn capture(&self, raw: &str) -> Option<Option<(String, String)>> {
        match self {
            Segment::Literal(literal) => (literal == raw).then_some(None),
            Segment::Param { name, prefix, suffix } => {
                if raw.len() <= prefix.len() + suffix.len()
                    || !raw.starts_with(prefix.as_str())
                    || !raw.ends_with(suffix.as_str())
                {
                    return None;
                }
                let value = &raw[prefix.len()..raw.len() - suffix.len()];
                let decoded = percent_decode_str(value).decode_utf8_lossy().into_owned();
                Some(Some((name.clone(), decoded)))
            }
        }
    }
}

/// A compiled route path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    /// Parse and validate a pattern. Errors here are startup-fatal.
    pub fn parse(path: &str) -> Result<Self, RouteError> {
        let Some(rest) = path.strip_prefix('/') else {
            return Err(RouteError::MissingLeadingSlash(path.to_string()));
        };

        let mut segments = Vec::new();
        if !rest.is_empty() {
            for raw in rest.split('/') {
                segments.push(parse_segment(path, raw)?);
            }
        }

        let mut seen: Vec<&str> = Vec::new();
        for segment in &segments {
            if let Segment::Param { name, .. } = segment {
                if seen.contains(&name.as_str()) {
                    return Err(RouteError::DuplicateParam {
                        path: path.to_string(),
                        name: name.clone(),
                    });
                }
                seen.push(name);
            }
        }

        Ok(Self {
            raw: path.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Per-segment specificity scores, in path order.
    pub fn specificity(&self) -> Vec<u8> {
        self.segments.iter().map(Segment::specificity).collect()
    }

    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Param { name, .. } => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Match a request path, returning captured `(name, value)` pairs in
    /// path order.
    pub fn matches(&self, path: &str) -> Option<Vec<(String, String)>> {
        let rest = path.strip_prefix('/')?;
        let parts: Vec<&str> = if rest.is_empty() {
            Vec::new()
        } else {
            rest.split('/').collect()
        };
        if parts.len() != self.segments.len() {
            return None;
        }

        let mut params = Vec::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            if let Some(captured) = segment.capture(part)? {
                params.push(captured);
            }
        }
        Some(params)
    }
}

fn parse_segment(path: &str, raw: &str) -> Result<Segment, RouteError> {
    if raw.contains(REGEX_CHARS) {
        return Err(RouteError::RegexSegment {
            path: path.to_string(),
            segment: raw.to_string(),
        });
    }

    match raw.matches(':').count() {
        0 => Ok(Segment::Literal(raw.to_string())),
        1 => {
            let (prefix, rest) = raw.split_once(':').unwrap_or((raw, ""));
            let name_len = rest
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(rest.len());
            let (name, suffix) = rest.split_at(name_len);
            if name.is_empty() {
                return Err(RouteError::EmptyParamName {
                    path: path.to_string(),
                    segment: raw.to_string(),
                });
            }
            Ok(Segment::Param {
                name: name.to_string(),
                prefix: prefix.to_string(),
                suffix: suffix.to_string(),
            })
        }
        _ => Err(RouteError::MultipleParams {
            path: path.to_string(),
            segment: raw.to_string(),
        }),
    }
}
