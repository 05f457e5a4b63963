//! Compiled routes.
//!
//! # Responsibilities
//! - Hold the frozen segment list, requirements and conditions
//! - Recognize a path into parameters
//! - Generate a path back from parameters
//!
//! # Design Decisions
//! - The recognition regex, capture offsets and validators are derived once in
//!   `Route::new`; nothing is compiled per request
//! - Generation walks the segments right-to-left and drops a trailing run of
//!   segments that hold their default value
//! - Generation failure is `None`; callers decide how to report it

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use regex::Regex;

use crate::routing::builder::Requirements;
use crate::routing::conditions::{AllConditions, Condition, RequestEnv};
use crate::routing::error::BuildError;
use crate::routing::options::{Conditions, RouteValue};
use crate::routing::params::{build_query_string, escape_segment, ParamValue, Params};
use crate::routing::recognition::{tree_tokens, TreeToken};
use crate::routing::regexp::{anchored, capture_count};
use crate::routing::segment::{ControllerSet, Segment};

/// Keys whose value changed from the recalled request. Once generation passes
/// one of them, later segments stop reading recalled values.
pub type Expiry = BTreeMap<String, bool>;

/// Requirement keys a route must have, and only have, to be interpolated
/// without a full generation pass.
const OPTIMISABLE_REQUIREMENTS: [&str; 2] = ["action", "controller"];

/// A requirement ready to test a value.
#[derive(Debug, Clone)]
enum ValueMatcher {
    Literal(String),
    Pattern(Regex),
}

impl ValueMatcher {
    fn compile(key: &str, value: &RouteValue) -> Result<Self, BuildError> {
        match value {
            RouteValue::Literal(literal) => Ok(ValueMatcher::Literal(literal.clone())),
            RouteValue::Pattern { pattern } => Regex::new(&anchored(pattern))
                .map(ValueMatcher::Pattern)
                .map_err(|source| BuildError::InvalidRequirement {
                    key: key.to_string(),
                    source,
                }),
        }
    }

    fn matches(&self, value: &str) -> bool {
        match self {
            ValueMatcher::Literal(literal) => literal == value,
            ValueMatcher::Pattern(re) => re.is_match(value),
        }
    }
}

/// An immutable compiled route.
#[derive(Debug, Clone)]
pub struct Route {
    segments: Vec<Segment>,
    requirements: Requirements,
    conditions: Conditions,
    matcher: AllConditions,
    pattern: Regex,
    /// First capture group of each segment.
    capture_offsets: Vec<usize>,
    /// Anchored value check per segment, for segments with a regexp.
    validators: Vec<Option<Regex>>,
    requirement_matchers: Vec<(String, ValueMatcher)>,
    controller_requirement: Option<ValueMatcher>,
    action_requirement: Option<ValueMatcher>,
    significant_keys: Vec<String>,
    parameter_shell: Params,
    tree_tokens: Vec<TreeToken>,
    optimise: bool,
}

impl Route {
    /// Freeze segments into a route. A route without an `action` in its path
    /// gets an `index` requirement.
    pub fn new(
        segments: Vec<Segment>,
        mut requirements: Requirements,
        conditions: Conditions,
        controllers: &ControllerSet,
    ) -> Result<Self, BuildError> {
        let has_action = segments.iter().any(|s| s.key() == Some("action"));
        if !has_action && !requirements.contains_key("action") {
            requirements.insert("action".to_string(), RouteValue::literal("index"));
        }

        let mut significant_keys: Vec<String> = Vec::new();
        for key in segments
            .iter()
            .filter_map(Segment::key)
            .chain(requirements.keys().map(String::as_str))
        {
            if !significant_keys.iter().any(|k| k == key) {
                significant_keys.push(key.to_string());
            }
        }

        let has_segment_requirements = segments.iter().any(|s| s.regexp().is_some());
        let optimise = !has_segment_requirements
            && requirements.keys().map(String::as_str).eq(OPTIMISABLE_REQUIREMENTS);

        let path: String = segments.iter().map(ToString::to_string).collect();
        let mut source = String::new();
        for segment in segments.iter().rev() {
            source = segment.build_pattern(&source, controllers);
        }
        let pattern = Regex::new(&format!(r"\A{source}\z")).map_err(|source| {
            BuildError::InvalidPattern {
                path: path.clone(),
                source,
            }
        })?;

        let mut capture_offsets = Vec::with_capacity(segments.len());
        let mut next = 1;
        for segment in &segments {
            capture_offsets.push(next);
            next += capture_count(&segment.regexp_chunk(controllers)).map_err(|source| {
                BuildError::InvalidPattern {
                    path: path.clone(),
                    source,
                }
            })?;
        }

        let mut validators = Vec::with_capacity(segments.len());
        for segment in &segments {
            let validator = match (segment.key(), segment.regexp()) {
                (Some(key), Some(re)) => Some(Regex::new(&anchored(re)).map_err(|source| {
                    BuildError::InvalidRequirement {
                        key: key.to_string(),
                        source,
                    }
                })?),
                _ => None,
            };
            validators.push(validator);
        }

        let requirement_matchers = requirements
            .iter()
            .map(|(key, value)| Ok((key.clone(), ValueMatcher::compile(key, value)?)))
            .collect::<Result<Vec<_>, BuildError>>()?;

        let requirement_for = |key: &str| -> Result<Option<ValueMatcher>, BuildError> {
            if let Some(value) = requirements.get(key) {
                return ValueMatcher::compile(key, value).map(Some);
            }
            match segments.iter().find(|s| s.key() == Some(key)).and_then(Segment::regexp) {
                Some(re) => ValueMatcher::compile(key, &RouteValue::pattern(re)).map(Some),
                None => Ok(None),
            }
        };
        let controller_requirement = requirement_for("controller")?;
        let action_requirement = requirement_for("action")?;

        let parameter_shell = requirements
            .iter()
            .filter_map(|(key, value)| {
                value
                    .as_literal()
                    .map(|literal| (key.clone(), ParamValue::from(literal)))
            })
            .collect();

        let tree_source: String = segments
            .iter()
            .map(|s| s.tree_source(controllers))
            .collect();

        Ok(Self {
            matcher: AllConditions::compile(&conditions),
            tree_tokens: tree_tokens(&tree_source),
            segments,
            requirements,
            conditions,
            pattern,
            capture_offsets,
            validators,
            requirement_matchers,
            controller_requirement,
            action_requirement,
            significant_keys,
            parameter_shell,
            optimise,
        })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Requirements not bound to a path segment.
    pub fn requirements(&self) -> &Requirements {
        &self.requirements
    }

    pub fn conditions(&self) -> &Conditions {
        &self.conditions
    }

    /// The route path as declared, after prefixing and wrapping.
    pub fn path(&self) -> String {
        self.segments.iter().map(ToString::to_string).collect()
    }

    /// The compiled recognition pattern.
    pub fn recognition_pattern(&self) -> &str {
        self.pattern.as_str()
    }

    /// Segment keys then requirement keys, without duplicates.
    pub fn significant_keys(&self) -> &[String] {
        &self.significant_keys
    }

    /// Dynamic segment keys in path order; positional helper arguments bind to these.
    pub fn segment_keys(&self) -> Vec<&str> {
        self.segments.iter().filter_map(Segment::key).collect()
    }

    /// Segment defaults plus literal requirements.
    pub fn defaults(&self) -> BTreeMap<String, String> {
        let mut defaults: BTreeMap<String, String> = self
            .segments
            .iter()
            .filter_map(|s| Some((s.key()?.to_string(), s.default_value()?.to_string())))
            .collect();
        for (key, value) in &self.requirements {
            if let Some(literal) = value.as_literal() {
                defaults.insert(key.clone(), literal.to_string());
            }
        }
        defaults
    }

    /// Fixed values merged into every recognition result.
    pub fn parameter_shell(&self) -> &Params {
        &self.parameter_shell
    }

    /// Whether the route qualifies for interpolation without a full generation pass.
    pub fn optimise(&self) -> bool {
        self.optimise
    }

    pub(crate) fn tree_tokens(&self) -> &[TreeToken] {
        &self.tree_tokens
    }

    /// Keys or literal text that must appear in any generated path.
    pub fn required_parts(&self) -> Vec<String> {
        self.segments
            .iter()
            .filter(|s| !s.is_optional() && !matches!(s, Segment::Divider { .. }))
            .map(|s| match s {
                Segment::Static { value, .. } => value.clone(),
                other => other.key().unwrap_or_default().to_string(),
            })
            .collect()
    }

    /// True when this route can generate for the controller and action.
    pub fn matches_controller_and_action(&self, controller: &str, action: &str) -> bool {
        self.controller_requirement
            .as_ref()
            .map_or(true, |m| m.matches(controller))
            && self
                .action_requirement
                .as_ref()
                .map_or(true, |m| m.matches(action))
    }

    /// Match the request against this route.
    pub fn recognize(&self, path: &str, env: &RequestEnv) -> Option<Params> {
        if !self.matcher.matches(env) {
            return None;
        }
        let captures = self.pattern.captures(path)?;
        let mut params = self.parameter_shell.clone();
        for (segment, &offset) in self.segments.iter().zip(&self.capture_offsets) {
            segment.extract(&captures, offset, &mut params);
        }
        Some(params)
    }

    /// Option keys the route does not consume, sorted.
    pub fn extra_keys(&self, options: &Params) -> Vec<String> {
        let significant: BTreeSet<&str> =
            self.significant_keys.iter().map(String::as_str).collect();
        options
            .keys()
            .filter(|k| !significant.contains(k.as_str()))
            .cloned()
            .collect()
    }

    /// Path with a query string made of the extra option keys.
    pub fn generate(&self, options: &Params, merged: &Params, expire_on: &Expiry) -> Option<String> {
        let path = self.generate_raw(options, merged, expire_on)?;
        let extras = self.extra_keys(options);
        Some(format!("{path}{}", build_query_string(options, &extras)))
    }

    /// Path plus the extra option keys, without a query string.
    pub fn generate_extras(
        &self,
        options: &Params,
        merged: &Params,
        expire_on: &Expiry,
    ) -> Option<(String, Vec<String>)> {
        let path = self.generate_raw(options, merged, expire_on)?;
        Some((path, self.extra_keys(options)))
    }

    /// Path only.
    pub fn generate_raw(&self, options: &Params, merged: &Params, expire_on: &Expiry) -> Option<String> {
        if !self.requirements_satisfied(options, merged) {
            return None;
        }
        let values = self.extract_values(options, merged, expire_on)?;
        self.build_path(&values)
    }

    fn requirements_satisfied(&self, options: &Params, merged: &Params) -> bool {
        self.requirement_matchers.iter().all(|(key, matcher)| match matcher {
            ValueMatcher::Literal(_) => merged
                .get(key)
                .is_some_and(|v| matcher.matches(&v.to_param())),
            ValueMatcher::Pattern(_) => {
                merged.contains_key(key)
                    && options
                        .get(key)
                        .is_some_and(|v| matcher.matches(&v.to_param()))
            }
        })
    }

    /// One value per segment, `None` for static text and absent optionals.
    fn extract_values(
        &self,
        options: &Params,
        merged: &Params,
        expire_on: &Expiry,
    ) -> Option<Vec<Option<String>>> {
        let mut source = merged;
        let mut expired = false;
        let mut values = Vec::with_capacity(self.segments.len());

        for (segment, validator) in self.segments.iter().zip(&self.validators) {
            let Some(dynamic) = segment.dynamic_part() else {
                values.push(None);
                continue;
            };
            let key = dynamic.key.as_str();
            let value = match segment {
                Segment::Path(_) => source
                    .get(key)
                    .map(|v| {
                        v.components()
                            .iter()
                            .map(|c| escape_segment(c))
                            .collect::<Vec<_>>()
                            .join("/")
                    })
                    .or_else(|| dynamic.default.clone()),
                Segment::Controller(_) => source
                    .get(key)
                    .map(ParamValue::to_param)
                    .or_else(|| dynamic.default.clone())
                    .map(|v| v.to_lowercase()),
                Segment::OptionalFormat(_) => options.get(key).map(|v| v.to_param().to_lowercase()),
                _ => source
                    .get(key)
                    .map(ParamValue::to_param)
                    .or_else(|| dynamic.default.clone()),
            };

            let valid = match (&value, validator) {
                (Some(v), Some(re)) => re.is_match(v),
                (Some(_), None) => true,
                (None, _) => dynamic.optional,
            };
            if !valid {
                return None;
            }
            values.push(value);

            if !expired && expire_on.get(key).copied().unwrap_or(false) {
                expired = true;
                source = options;
            }
        }
        Some(values)
    }

    /// Right-to-left: skip trailing segments that hold their default, then
    /// interpolate everything up to the first one that does not.
    fn build_path(&self, values: &[Option<String>]) -> Option<String> {
        let Some(mut idx) = self.segments.len().checked_sub(1) else {
            return Some(String::new());
        };
        while idx > 0 && self.omittable(idx, values) {
            idx -= 1;
        }

        let optional_missing = self.segments[..idx]
            .iter()
            .zip(values)
            .any(|(s, v)| s.dynamic_part().is_some() && s.is_optional() && v.is_none());
        if optional_missing {
            return None;
        }

        Some(
            self.segments[..=idx]
                .iter()
                .zip(values)
                .map(|(s, v)| s.interpolation_chunk(v.as_deref()))
                .collect(),
        )
    }

    fn omittable(&self, idx: usize, values: &[Option<String>]) -> bool {
        let segment = &self.segments[idx];
        if !segment.is_optional() {
            return false;
        }
        match segment.dynamic_part() {
            None => true,
            Some(dynamic) => match values[idx].as_deref() {
                None => true,
                value => value == dynamic.default.as_deref(),
            },
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = if self.conditions.methods.is_empty() {
            "ANY".to_string()
        } else {
            self.conditions
                .methods
                .iter()
                .map(|m| m.as_upper())
                .collect::<Vec<_>>()
                .join(",")
        };
        let requirements = self
            .requirements
            .iter()
            .map(|(k, v)| format!("{k}: {v}"))
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "{:<6} {:<40} {{{}}}", verb, self.path(), requirements)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::builder::RouteBuilder;
    use crate::routing::options::{HttpMethod, RouteOptions};
    use crate::routing::params::param_map;

    fn build(path: &str, options: RouteOptions) -> Route {
        RouteBuilder::default().build(path, &options).unwrap()
    }

    fn get() -> RequestEnv {
        RequestEnv::new(HttpMethod::Get)
    }

    #[test]
    fn test_recognize_default_route() {
        let route = build(":controller/:action/:id", RouteOptions::new());
        let params = route.recognize("/users/show/42", &get()).unwrap();
        assert_eq!(
            params,
            param_map([("controller", "users"), ("action", "show"), ("id", "42")])
        );

        let params = route.recognize("/users", &get()).unwrap();
        assert_eq!(params, param_map([("controller", "users"), ("action", "index")]));
    }

    #[test]
    fn test_recognize_format() {
        let route = build("posts/:id(.:format)", RouteOptions::new().controller("posts").action("show"));
        let params = route.recognize("/posts/5.json", &get()).unwrap();
        assert_eq!(params["id"], ParamValue::from("5"));
        assert_eq!(params["format"], ParamValue::from("json"));

        let params = route.recognize("/posts/5", &get()).unwrap();
        assert!(!params.contains_key("format"));
    }

    #[test]
    fn test_recognize_respects_conditions() {
        let route = build("posts", RouteOptions::new().controller("posts").method(HttpMethod::Post));
        assert!(route.recognize("/posts", &get()).is_none());
        assert!(route.recognize("/posts", &RequestEnv::new(HttpMethod::Post)).is_some());
    }

    #[test]
    fn test_recognize_unescapes_values() {
        let route = build("people/:name", RouteOptions::new().controller("people").action("show"));
        let params = route.recognize("/people/Jos%C3%A9%20M", &get()).unwrap();
        assert_eq!(params["name"], ParamValue::from("Jos\u{e9} M"));
    }

    #[test]
    fn test_requirement_constrains_recognition() {
        let route = build(
            "posts/:id",
            RouteOptions::new()
                .controller("posts")
                .action("show")
                .requirement("id", RouteValue::pattern(r"\d+")),
        );
        assert!(route.recognize("/posts/12", &get()).is_some());
        assert!(route.recognize("/posts/abc", &get()).is_none());
    }

    #[test]
    fn test_glob_recognition() {
        let route = build("files/*path", RouteOptions::new().controller("files").action("show"));
        let params = route.recognize("/files/docs/intro.txt", &get()).unwrap();
        assert_eq!(params["path"], ParamValue::from(vec!["docs", "intro.txt"]));

        let params = route.recognize("/files", &get()).unwrap();
        assert_eq!(params["path"], ParamValue::List(vec![]));
    }

    #[test]
    fn test_generate_with_and_without_format() {
        let route = build("posts/:id(.:format)", RouteOptions::new().controller("posts").action("show"));
        let options = param_map([("controller", "posts"), ("action", "show"), ("id", "5")]);
        assert_eq!(
            route.generate(&options, &options, &Expiry::new()).as_deref(),
            Some("/posts/5")
        );

        let options = param_map([
            ("controller", "posts"),
            ("action", "show"),
            ("id", "5"),
            ("format", "json"),
        ]);
        assert_eq!(
            route.generate(&options, &options, &Expiry::new()).as_deref(),
            Some("/posts/5.json")
        );
    }

    #[test]
    fn test_generate_omits_trailing_defaults() {
        let route = build(":controller/:action/:id", RouteOptions::new());
        let options = param_map([("controller", "posts"), ("action", "index")]);
        assert_eq!(
            route.generate(&options, &options, &Expiry::new()).as_deref(),
            Some("/posts")
        );

        let options = param_map([("controller", "posts"), ("action", "show"), ("id", "7")]);
        assert_eq!(
            route.generate(&options, &options, &Expiry::new()).as_deref(),
            Some("/posts/show/7")
        );

        let options = param_map([("controller", "posts"), ("action", "index"), ("id", "7")]);
        assert_eq!(
            route.generate(&options, &options, &Expiry::new()).as_deref(),
            Some("/posts/index/7")
        );
    }

    #[test]
    fn test_generate_appends_extra_keys_as_query() {
        let route = build("posts", RouteOptions::new().controller("posts"));
        let options = param_map([("controller", "posts"), ("action", "index"), ("page", "2")]);
        assert_eq!(
            route.generate(&options, &options, &Expiry::new()).as_deref(),
            Some("/posts?page=2")
        );
        assert_eq!(
            route.generate_extras(&options, &options, &Expiry::new()),
            Some(("/posts".to_string(), vec!["page".to_string()]))
        );
    }

    #[test]
    fn test_generate_fails_on_requirement_mismatch() {
        let route = build("posts", RouteOptions::new().controller("posts"));
        let options = param_map([("controller", "users"), ("action", "index")]);
        assert!(route.generate(&options, &options, &Expiry::new()).is_none());
    }

    #[test]
    fn test_generate_validates_segment_values() {
        let route = build(
            "posts/:id",
            RouteOptions::new()
                .controller("posts")
                .action("show")
                .requirement("id", RouteValue::pattern(r"\d+")),
        );
        let bad = param_map([("controller", "posts"), ("action", "show"), ("id", "x1")]);
        assert!(route.generate(&bad, &bad, &Expiry::new()).is_none());
        let missing = param_map([("controller", "posts"), ("action", "show")]);
        assert!(route.generate(&missing, &missing, &Expiry::new()).is_none());
    }

    #[test]
    fn test_expiry_stops_reading_recall() {
        let route = build(":controller/:action/:id", RouteOptions::new());
        let recall = param_map([("controller", "posts"), ("action", "show"), ("id", "7")]);
        let options = param_map([("action", "edit")]);
        let mut merged = recall.clone();
        merged.extend(options.clone());
        let expire_on = Expiry::from([
            ("controller".to_string(), false),
            ("action".to_string(), true),
            ("id".to_string(), false),
        ]);
        assert_eq!(
            route.generate(&options, &merged, &expire_on).as_deref(),
            Some("/posts/edit")
        );
    }

    #[test]
    fn test_glob_generation_escapes_components() {
        let route = build("files/*path", RouteOptions::new().controller("files").action("show"));
        let options = param_map([
            ("controller", ParamValue::from("files")),
            ("action", ParamValue::from("show")),
            ("path", ParamValue::from(vec!["a b", "c"])),
        ]);
        assert_eq!(
            route.generate(&options, &options, &Expiry::new()).as_deref(),
            Some("/files/a%20b/c")
        );
    }

    #[test]
    fn test_significant_keys_and_defaults() {
        let route = build("posts/:id", RouteOptions::new().controller("posts"));
        assert_eq!(route.significant_keys(), &["id", "action", "controller"]);
        assert_eq!(route.segment_keys(), vec!["id"]);
        assert_eq!(route.defaults()["action"], "index");
        assert_eq!(route.parameter_shell()["controller"], ParamValue::from("posts"));
    }

    #[test]
    fn test_optimise_flag() {
        assert!(build("posts", RouteOptions::new().controller("posts")).optimise());
        let constrained = build(
            "posts/:id",
            RouteOptions::new()
                .controller("posts")
                .requirement("id", RouteValue::pattern(r"\d+")),
        );
        assert!(!constrained.optimise());
    }

    #[test]
    fn test_matches_controller_and_action() {
        let route = build("posts/:action", RouteOptions::new().controller("posts"));
        assert!(route.matches_controller_and_action("posts", "edit"));
        assert!(!route.matches_controller_and_action("users", "edit"));
    }

    #[test]
    fn test_display() {
        let route = build("posts", RouteOptions::new().controller("posts").method(HttpMethod::Get));
        let line = route.to_string();
        assert!(line.starts_with("GET    /posts/"));
        assert!(line.ends_with(r#"{action: "index", controller: "posts"}"#));
    }
}
