//! Route pattern segments.
//!
//! # Responsibilities
//! - Represent one token of a route pattern
//! - Contribute a fragment to the route's recognition pattern
//! - Extract recognized values from captures
//! - Render a value back into a path during generation
//!
//! # Design Decisions
//! - Closed enum of segment kinds; dynamic kinds share `DynamicSegment`
//! - Patterns are composed right-to-left so a trailing optional chain nests
//!   inside the group of the segment before it
//! - Segments are frozen once the owning route is built

use std::fmt;

use regex::Captures;

use crate::routing::params::{escape_segment, unescape, ParamValue, Params};
use crate::routing::regexp::{is_single_token, optionalize, unoptionalize};

/// A single path token: anything up to the next separator.
pub const SEGMENT_VALUE_PATTERN: &str = "[^/.?]+";

/// Default capture for a dynamic segment.
const DYNAMIC_CHUNK: &str = "([^/.?]+)";

/// Glob capture.
const PATH_CHUNK: &str = "(.*)";

/// Trailing format: a bare slash or a dotted extension.
const FORMAT_CHUNK: &str = r"(?:/|(\.[^/?.]+)?)";

/// Separators that may be left off a recognized path.
const OPTIONAL_SEPARATORS: &[&str] = &["/"];

/// Keys whose optionality follows from framework convention.
const IMPLIED_OPTIONAL_KEYS: &[&str] = &["action", "id"];

/// Controller names the `:controller` segment may match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControllerSet {
    names: Vec<String>,
}

impl ControllerSet {
    /// Names are lower-cased and ordered longest first so alternation prefers
    /// `admin/users` over `admin`.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut names: Vec<String> = names
            .into_iter()
            .map(|n| n.as_ref().trim_matches('/').to_lowercase())
            .filter(|n| !n.is_empty())
            .collect();
        names.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        names.dedup();
        Self { names }
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// True when some name spans more than one path token.
    pub fn has_compound_names(&self) -> bool {
        self.names.iter().any(|n| n.contains('/') || n.contains('.'))
    }

    fn pattern(&self) -> String {
        if self.names.is_empty() {
            "[a-z0-9_]+".to_string()
        } else {
            self.names
                .iter()
                .map(|n| regex::escape(n))
                .collect::<Vec<_>>()
                .join("|")
        }
    }
}

/// Shared state of the dynamic segment kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DynamicSegment {
    pub key: String,
    pub default: Option<String>,
    /// User requirement, unanchored.
    pub regexp: Option<String>,
    pub optional: bool,
}

impl DynamicSegment {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            default: None,
            regexp: None,
            optional: false,
        }
    }
}

/// One token of a route pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Literal text. `raw` text is emitted without escaping.
    Static {
        value: String,
        raw: bool,
        optional: bool,
    },
    /// `/`, `.` or `?`.
    Divider { value: String, optional: bool },
    /// `:name`
    Dynamic(DynamicSegment),
    /// `:controller`
    Controller(DynamicSegment),
    /// `*name`
    Path(DynamicSegment),
    /// `(.:format)`
    OptionalFormat(DynamicSegment),
}

impl Segment {
    pub fn static_text(value: impl Into<String>) -> Self {
        Segment::Static {
            value: value.into(),
            raw: false,
            optional: false,
        }
    }

    pub fn optional_static(value: impl Into<String>) -> Self {
        Segment::Static {
            value: value.into(),
            raw: false,
            optional: true,
        }
    }

    pub fn divider(value: impl Into<String>) -> Self {
        let value = value.into();
        let optional = OPTIONAL_SEPARATORS.contains(&value.as_str());
        Segment::Divider { value, optional }
    }

    pub fn dynamic(key: impl Into<String>) -> Self {
        Segment::Dynamic(DynamicSegment::new(key))
    }

    pub fn controller() -> Self {
        Segment::Controller(DynamicSegment::new("controller"))
    }

    pub fn path(key: impl Into<String>) -> Self {
        Segment::Path(DynamicSegment {
            default: Some(String::new()),
            optional: true,
            ..DynamicSegment::new(key)
        })
    }

    pub fn optional_format() -> Self {
        Segment::OptionalFormat(DynamicSegment {
            optional: true,
            ..DynamicSegment::new("format")
        })
    }

    /// Dynamic part shared by the keyed kinds.
    pub fn dynamic_part(&self) -> Option<&DynamicSegment> {
        match self {
            Segment::Dynamic(d)
            | Segment::Controller(d)
            | Segment::Path(d)
            | Segment::OptionalFormat(d) => Some(d),
            Segment::Static { .. } | Segment::Divider { .. } => None,
        }
    }

    pub fn dynamic_part_mut(&mut self) -> Option<&mut DynamicSegment> {
        match self {
            Segment::Dynamic(d)
            | Segment::Controller(d)
            | Segment::Path(d)
            | Segment::OptionalFormat(d) => Some(d),
            Segment::Static { .. } | Segment::Divider { .. } => None,
        }
    }

    pub fn key(&self) -> Option<&str> {
        self.dynamic_part().map(|d| d.key.as_str())
    }

    pub fn default_value(&self) -> Option<&str> {
        self.dynamic_part().and_then(|d| d.default.as_deref())
    }

    pub fn regexp(&self) -> Option<&str> {
        self.dynamic_part().and_then(|d| d.regexp.as_deref())
    }

    pub fn is_optional(&self) -> bool {
        match self {
            Segment::Static { optional, .. } | Segment::Divider { optional, .. } => *optional,
            Segment::Dynamic(d)
            | Segment::Controller(d)
            | Segment::Path(d)
            | Segment::OptionalFormat(d) => d.optional,
        }
    }

    pub fn set_optional(&mut self, value: bool) {
        match self {
            Segment::Static { optional, .. } | Segment::Divider { optional, .. } => {
                *optional = value
            }
            Segment::Dynamic(d)
            | Segment::Controller(d)
            | Segment::Path(d)
            | Segment::OptionalFormat(d) => d.optional = value,
        }
    }

    /// Promoting these to required is expected and not worth a warning.
    pub fn optionality_implied(&self) -> bool {
        match self {
            Segment::Divider { .. } | Segment::Path(_) => true,
            Segment::Dynamic(d) => IMPLIED_OPTIONAL_KEYS.contains(&d.key.as_str()),
            _ => false,
        }
    }

    /// This segment's own pattern fragment.
    pub fn regexp_chunk(&self, controllers: &ControllerSet) -> String {
        match self {
            Segment::Static { value, optional, .. } | Segment::Divider { value, optional } => {
                let chunk = regex::escape(value);
                if *optional {
                    optionalize(&chunk)
                } else {
                    chunk
                }
            }
            Segment::Dynamic(d) => match &d.regexp {
                Some(re) => format!("({re})"),
                None => DYNAMIC_CHUNK.to_string(),
            },
            Segment::Controller(d) => {
                let source = d.regexp.clone().unwrap_or_else(|| controllers.pattern());
                format!("(?i:({source}))")
            }
            Segment::Path(d) => match &d.regexp {
                Some(re) => format!("({re})"),
                None => PATH_CHUNK.to_string(),
            },
            Segment::OptionalFormat(_) => FORMAT_CHUNK.to_string(),
        }
    }

    /// Prepends this segment to the pattern built from the segments after it.
    pub fn build_pattern(&self, rest: &str, controllers: &ControllerSet) -> String {
        match self {
            Segment::Static { value, optional, .. } | Segment::Divider { value, optional } => {
                let escaped = regex::escape(value);
                if *optional && !rest.is_empty() {
                    format!(
                        r"(?:{}\z|{}{})",
                        optionalize(&escaped),
                        escaped,
                        unoptionalize(rest)
                    )
                } else if *optional {
                    optionalize(&escaped)
                } else {
                    format!("{escaped}{rest}")
                }
            }
            _ => {
                let pattern = format!("{}{}", self.regexp_chunk(controllers), rest);
                if self.is_optional() {
                    optionalize(&pattern)
                } else {
                    pattern
                }
            }
        }
    }

    /// Text this segment contributes to the route's recognition-tree path.
    pub fn tree_source(&self, controllers: &ControllerSet) -> String {
        match self {
            Segment::Static { optional: true, .. } => "*".to_string(),
            Segment::Static { value, .. } | Segment::Divider { value, .. } => value.clone(),
            Segment::Dynamic(d) => match &d.regexp {
                Some(re) if re != SEGMENT_VALUE_PATTERN && !is_single_token(re) => {
                    format!("*{}", d.key)
                }
                _ => format!(":{}", d.key),
            },
            Segment::Controller(d) => {
                let spans = match &d.regexp {
                    Some(re) => !is_single_token(re),
                    None => controllers.has_compound_names(),
                };
                if spans {
                    "*".to_string()
                } else {
                    ":controller".to_string()
                }
            }
            Segment::Path(d) => format!("*{}", d.key),
            Segment::OptionalFormat(_) => String::new(),
        }
    }

    /// Stores this segment's recognized value, reading captures from `index`.
    pub fn extract(&self, caps: &Captures<'_>, index: usize, params: &mut Params) {
        let captured = caps.get(index).map(|m| m.as_str());
        match self {
            Segment::Static { .. } | Segment::Divider { .. } => {}
            Segment::Dynamic(d) => {
                let value = captured.map(unescape).or_else(|| d.default.clone());
                if let Some(value) = value {
                    params.insert(d.key.clone(), ParamValue::Single(value));
                }
            }
            Segment::Controller(d) => {
                let value = captured
                    .map(str::to_lowercase)
                    .or_else(|| d.default.clone());
                if let Some(value) = value {
                    params.insert(d.key.clone(), ParamValue::Single(value));
                }
            }
            Segment::Path(d) => {
                let raw = captured.or(d.default.as_deref());
                if let Some(raw) = raw {
                    params.insert(d.key.clone(), ParamValue::List(split_path(raw)));
                }
            }
            Segment::OptionalFormat(d) => {
                if let Some(ext) = captured.and_then(|c| c.strip_prefix('.')) {
                    params.insert(d.key.clone(), ParamValue::Single(unescape(ext)));
                }
            }
        }
    }

    /// Rendered path text for this segment given its extracted value.
    pub fn interpolation_chunk(&self, value: Option<&str>) -> String {
        let value = value.unwrap_or_default();
        match self {
            Segment::Static { value, raw, .. } => {
                if *raw {
                    value.clone()
                } else {
                    escape_segment(value)
                }
            }
            Segment::Divider { value, .. } => value.clone(),
            // the default chunk stops at `.`, so a dot must not reach the path raw
            Segment::Dynamic(d) => match d.regexp.as_deref() {
                None | Some(SEGMENT_VALUE_PATTERN) => escape_segment(value).replace('.', "%2E"),
                Some(_) => escape_segment(value),
            },
            // controller and glob values are already in path form
            Segment::Controller(_) | Segment::Path(_) => value.to_string(),
            Segment::OptionalFormat(_) => format!(".{}", escape_segment(value)),
        }
    }
}

/// Unescaped components of a glob capture; trailing empty components are dropped.
fn split_path(raw: &str) -> Vec<String> {
    let mut parts: Vec<String> = raw.split('/').map(unescape).collect();
    while parts.last().is_some_and(|p| p.is_empty()) {
        parts.pop();
    }
    parts
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Static {
                value,
                optional: true,
                ..
            } => write!(f, "?{value}?"),
            Segment::Static { value, .. } | Segment::Divider { value, .. } => f.write_str(value),
            Segment::Dynamic(d) | Segment::Controller(d) => write!(f, ":{}", d.key),
            Segment::Path(d) => write!(f, "*{}", d.key),
            Segment::OptionalFormat(_) => f.write_str("(.:format)"),
        }
    }
}
