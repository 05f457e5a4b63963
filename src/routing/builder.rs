//! Route compilation.
//!
//! # Responsibilities
//! - Tokenize a route path into segments
//! - Sort declaration options into defaults, requirements and conditions
//! - Bind requirements and defaults onto segments
//! - Freeze the result into an immutable `Route`
//!
//! # Design Decisions
//! - Malformed path text is accepted verbatim as static segments
//! - Every requirement pattern is vetted here, so a bad declaration fails the
//!   whole draw instead of a single request
//! - Optional segments followed by a required one are promoted (with a warning)

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::routing::error::BuildError;
use crate::routing::options::{Conditions, HttpMethod, RouteOptions, RouteValue};
use crate::routing::regexp::{has_anchor, has_multiline_flag};
use crate::routing::route::Route;
use crate::routing::segment::{ControllerSet, Segment};

static FORMAT_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\A(?:\(\.:format\)|\.(?::format)?)/").expect("format token pattern is valid")
});

static DYNAMIC_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\A:([A-Za-z0-9_]+)").expect("dynamic token pattern is valid"));

static GLOB_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\A\*([A-Za-z0-9_]+)").expect("glob token pattern is valid"));

static OPTIONAL_STATIC_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\A\?(.*?)\?").expect("optional static pattern is valid"));

static STATIC_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\A[^/.?(]+").expect("static token pattern is valid"));

static SEPARATOR_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\A[/.?]").expect("separator pattern is valid"));

/// Defaults by key. `None` marks a segment optional without a value.
pub type Defaults = BTreeMap<String, Option<String>>;

/// Requirements by key.
pub type Requirements = BTreeMap<String, RouteValue>;

/// Compiles route declarations.
#[derive(Debug, Clone, Default)]
pub struct RouteBuilder {
    controllers: ControllerSet,
}

impl RouteBuilder {
    pub fn new(controllers: ControllerSet) -> Self {
        Self { controllers }
    }

    pub fn controllers(&self) -> &ControllerSet {
        &self.controllers
    }

    pub fn set_controllers(&mut self, controllers: ControllerSet) {
        self.controllers = controllers;
    }

    /// Split a (slash-wrapped) route path into segments.
    pub fn segments_for_route_path(&self, path: &str) -> Vec<Segment> {
        let mut segments = Vec::new();
        let mut rest = path;
        while !rest.is_empty() {
            let (segment, consumed) = segment_for(rest);
            segments.push(segment);
            rest = &rest[consumed..];
        }
        segments
    }

    /// Sort top-level options into defaults and requirements, and vet conditions.
    pub fn divide_route_options(
        &self,
        segments: &[Segment],
        options: &RouteOptions,
    ) -> Result<(Defaults, Requirements, Conditions), BuildError> {
        let mut params = options.params.clone();
        if let (Some(namespace), Some(controller)) =
            (options.namespace.as_deref(), options.controller_name())
        {
            let controller = format!("{}/{}", namespace.trim_end_matches('/'), controller);
            params.insert("controller".to_string(), RouteValue::Literal(controller));
        }

        let conditions = options.conditions.clone();
        validate_route_conditions(&conditions)?;

        let mut defaults = options.defaults.clone();
        let mut requirements = options.requirements.clone();
        let path_keys: Vec<&str> = segments.iter().filter_map(Segment::key).collect();
        for (key, value) in params {
            match value {
                RouteValue::Literal(literal) if path_keys.contains(&key.as_str()) => {
                    defaults.insert(key, Some(literal));
                }
                value => {
                    requirements.insert(key, value);
                }
            }
        }
        Ok((defaults, requirements, conditions))
    }

    /// Bind requirements and defaults to segments. Returns the requirements that
    /// do not belong to any segment.
    pub fn assign_route_options(
        &self,
        segments: &mut [Segment],
        defaults: Defaults,
        requirements: Requirements,
    ) -> Result<Requirements, BuildError> {
        let mut route_requirements = Requirements::new();

        for (key, requirement) in requirements {
            let Some(segment) = segment_named(segments, &key) else {
                route_requirements.insert(key, requirement);
                continue;
            };
            let RouteValue::Pattern { pattern } = requirement else {
                return Err(BuildError::NonPatternRequirement { key });
            };
            if has_anchor(&pattern) {
                return Err(BuildError::AnchoredRequirement { key, pattern });
            }
            if has_multiline_flag(&pattern) {
                return Err(BuildError::MultilineRequirement { key, pattern });
            }
            if let Err(source) = Regex::new(&pattern) {
                return Err(BuildError::InvalidRequirement { key, source });
            }
            if let Some(dynamic) = segment.dynamic_part_mut() {
                dynamic.regexp = Some(pattern);
            }
        }

        for (key, default) in defaults {
            let Some(segment) = segment_named(segments, &key) else {
                return Err(BuildError::DefaultWithoutSegment { key });
            };
            segment.set_optional(true);
            if let (Some(value), Some(dynamic)) = (default, segment.dynamic_part_mut()) {
                if !value.is_empty() {
                    dynamic.default = Some(value);
                }
            }
        }

        assign_default_route_options(segments);
        ensure_required_segments(segments);
        Ok(route_requirements)
    }

    /// Compile `path` with `options` into a route.
    pub fn build(&self, path: &str, options: &RouteOptions) -> Result<Route, BuildError> {
        let mut path = path.to_string();
        if !path.starts_with('/') {
            path.insert(0, '/');
        }
        if !path.ends_with('/') {
            path.push('/');
        }
        let prefix = options
            .path_prefix
            .as_deref()
            .map(|p| p.trim_matches('/'))
            .unwrap_or_default();
        if !prefix.is_empty() {
            path = format!("/{prefix}{path}");
        }

        let mut segments = self.segments_for_route_path(&path);
        let (defaults, requirements, conditions) =
            self.divide_route_options(&segments, options)?;
        let requirements = self.assign_route_options(&mut segments, defaults, requirements)?;

        let route = Route::new(segments, requirements, conditions, &self.controllers)?;
        if !route.significant_keys().iter().any(|k| k == "controller") {
            return Err(BuildError::MissingController { path });
        }
        Ok(route)
    }
}

/// Recognize the token at the start of `rest`; returns the segment and the bytes consumed.
fn segment_for(rest: &str) -> (Segment, usize) {
    if let Some(m) = FORMAT_TOKEN.find(rest) {
        return (Segment::optional_format(), m.end());
    }
    if let Some(caps) = DYNAMIC_TOKEN.captures(rest) {
        let key = &caps[1];
        let segment = if key == "controller" {
            Segment::controller()
        } else {
            Segment::dynamic(key)
        };
        return (segment, caps[0].len());
    }
    if let Some(caps) = GLOB_TOKEN.captures(rest) {
        return (Segment::path(&caps[1]), caps[0].len());
    }
    if let Some(caps) = OPTIONAL_STATIC_TOKEN.captures(rest) {
        return (Segment::optional_static(&caps[1]), caps[0].len());
    }
    if let Some(m) = STATIC_TOKEN.find(rest) {
        return (Segment::static_text(m.as_str()), m.end());
    }
    if let Some(m) = SEPARATOR_TOKEN.find(rest) {
        return (Segment::divider(m.as_str()), m.end());
    }
    let len = rest.chars().next().map_or(rest.len(), char::len_utf8);
    (Segment::static_text(&rest[..len]), len)
}

fn segment_named<'a>(segments: &'a mut [Segment], key: &str) -> Option<&'a mut Segment> {
    segments.iter_mut().find(|s| s.key() == Some(key))
}

fn validate_route_conditions(conditions: &Conditions) -> Result<(), BuildError> {
    if conditions.methods.contains(&HttpMethod::Head) {
        return Err(BuildError::HeadCondition);
    }
    Ok(())
}

/// Conventions for `action` and `id`.
pub fn assign_default_route_options(segments: &mut [Segment]) {
    for segment in segments.iter_mut() {
        let Some(dynamic) = segment.dynamic_part_mut() else {
            continue;
        };
        match dynamic.key.as_str() {
            "action" => {
                let accepts_index = match &dynamic.regexp {
                    None => true,
                    Some(re) => Regex::new(re)
                        .ok()
                        .and_then(|re| re.find("index").map(|m| m.as_str() == "index"))
                        .unwrap_or(false),
                };
                if accepts_index {
                    dynamic.default.get_or_insert_with(|| "index".to_string());
                    dynamic.optional = true;
                }
            }
            "id" => {
                let unconstrained = dynamic.default.is_none() && dynamic.regexp.is_none();
                let accepts_empty = dynamic
                    .regexp
                    .as_deref()
                    .and_then(|re| Regex::new(re).ok())
                    .is_some_and(|re| re.is_match(""));
                if unconstrained || accepts_empty {
                    dynamic.optional = true;
                }
            }
            _ => {}
        }
    }
}

/// Promote optional segments that precede a required one.
pub fn ensure_required_segments(segments: &mut [Segment]) {
    let mut allow_optional = true;
    for segment in segments.iter_mut().rev() {
        allow_optional = allow_optional && segment.is_optional();
        if !allow_optional && segment.is_optional() {
            if !segment.optionality_implied() {
                tracing::warn!(
                    segment = %segment,
                    "Route segment cannot be optional because it precedes a required segment; it will be required"
                );
            }
            segment.set_optional(false);
        } else if allow_optional && segment.default_value().is_some() {
            segment.set_optional(true);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> RouteBuilder {
        RouteBuilder::default()
    }

    fn describe(segments: &[Segment]) -> Vec<String> {
        segments.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_tokenize_precedence() {
        let segments = builder().segments_for_route_path("/posts/:id(.:format)/");
        assert_eq!(describe(&segments), vec!["/", "posts", "/", ":id", "(.:format)"]);

        let segments = builder().segments_for_route_path("/:controller/*path/");
        assert!(matches!(segments[1], Segment::Controller(_)));
        assert!(matches!(segments[3], Segment::Path(_)));
        assert_eq!(segments.len(), 5);
    }

    #[test]
    fn test_tokenize_dot_format_and_optional_static() {
        let segments = builder().segments_for_route_path("/feed.:format/");
        assert_eq!(describe(&segments), vec!["/", "feed", "(.:format)"]);

        let segments = builder().segments_for_route_path("/?draft?/");
        assert_eq!(describe(&segments), vec!["/", "?draft?", "/"]);
        assert!(segments[1].is_optional());
    }

    #[test]
    fn test_tokenize_malformed_text_is_static() {
        let segments = builder().segments_for_route_path("/a(b/");
        assert_eq!(describe(&segments), vec!["/", "a", "(", "b", "/"]);
        assert!(matches!(segments[2], Segment::Static { .. }));
    }

    #[test]
    fn test_divide_route_options() {
        let segments = builder().segments_for_route_path("/posts/:id/");
        let options = RouteOptions::new()
            .controller("posts")
            .action("show")
            .param("id", "1")
            .param("locale", RouteValue::pattern("en|fr"))
            .namespace("admin/");
        let (defaults, requirements, _) =
            builder().divide_route_options(&segments, &options).unwrap();

        assert_eq!(defaults["id"], Some("1".to_string()));
        assert_eq!(requirements["controller"], RouteValue::literal("admin/posts"));
        assert_eq!(requirements["action"], RouteValue::literal("show"));
        assert!(requirements["locale"].is_pattern());
    }

    #[test]
    fn test_head_condition_rejected() {
        let options = RouteOptions::new()
            .controller("posts")
            .method(HttpMethod::Head);
        assert!(matches!(
            builder().build("posts", &options),
            Err(BuildError::HeadCondition)
        ));
    }

    #[test]
    fn test_literal_requirement_on_segment_rejected() {
        let options = RouteOptions::new()
            .controller("posts")
            .requirement("id", "5");
        assert!(matches!(
            builder().build("posts/:id", &options),
            Err(BuildError::NonPatternRequirement { key }) if key == "id"
        ));
    }

    #[test]
    fn test_anchored_requirement_rejected() {
        let options = RouteOptions::new()
            .controller("posts")
            .requirement("id", RouteValue::pattern(r"\A\d+\Z"));
        assert!(matches!(
            builder().build("posts/:id", &options),
            Err(BuildError::AnchoredRequirement { key, .. }) if key == "id"
        ));
    }

    #[test]
    fn test_multiline_requirement_rejected() {
        let options = RouteOptions::new()
            .controller("posts")
            .requirement("id", RouteValue::pattern(r"(?m)\d+"));
        assert!(matches!(
            builder().build("posts/:id", &options),
            Err(BuildError::MultilineRequirement { .. })
        ));
    }

    #[test]
    fn test_invalid_requirement_rejected() {
        let options = RouteOptions::new()
            .controller("posts")
            .requirement("id", RouteValue::pattern("(unclosed"));
        assert!(matches!(
            builder().build("posts/:id", &options),
            Err(BuildError::InvalidRequirement { .. })
        ));
    }

    #[test]
    fn test_default_without_segment_rejected() {
        let options = RouteOptions::new()
            .controller("posts")
            .default_value("page", "1");
        assert!(matches!(
            builder().build("posts", &options),
            Err(BuildError::DefaultWithoutSegment { key }) if key == "page"
        ));
    }

    #[test]
    fn test_missing_controller_rejected() {
        assert!(matches!(
            builder().build("posts/:id", &RouteOptions::new()),
            Err(BuildError::MissingController { .. })
        ));
    }

    #[test]
    fn test_action_and_id_conventions() {
        let mut segments = builder().segments_for_route_path("/:controller/:action/:id/");
        assign_default_route_options(&mut segments);

        assert_eq!(segments[3].default_value(), Some("index"));
        assert!(segments[3].is_optional());
        assert!(segments[5].is_optional());
    }

    #[test]
    fn test_constrained_action_stays_required() {
        let options = RouteOptions::new()
            .controller("posts")
            .requirement("action", RouteValue::pattern("show|edit"));
        let route = builder().build(":action", &options).unwrap();
        let action = route.segments().iter().find(|s| s.key() == Some("action")).unwrap();
        assert!(!action.is_optional());
        assert_eq!(action.default_value(), None);
    }

    #[test]
    fn test_optional_segment_before_required_is_promoted() {
        let options = RouteOptions::new().controller("comments").optional("id");
        let route = builder().build("posts/:id/comments", &options).unwrap();
        let id = route.segments().iter().find(|s| s.key() == Some("id")).unwrap();
        assert!(!id.is_optional());
    }

    #[test]
    fn test_trailing_default_becomes_optional() {
        let options = RouteOptions::new()
            .controller("posts")
            .default_value("page", "1");
        let route = builder().build("posts/:page", &options).unwrap();
        let page = route.segments().iter().find(|s| s.key() == Some("page")).unwrap();
        assert!(page.is_optional());
        assert_eq!(page.default_value(), Some("1"));
    }

    #[test]
    fn test_path_prefix_applied() {
        let options = RouteOptions::new().controller("posts").path_prefix("/admin/");
        let route = builder().build("posts", &options).unwrap();
        assert_eq!(route.path(), "/admin/posts/");
    }
}
