//! The route table.
//!
//! # Responsibilities
//! - Own the ordered route list and the named route index
//! - Recognize request paths, reporting 404/405/501 distinctly
//! - Generate paths and URLs from parameters
//! - Track load state and reload from route files
//!
//! # Design Decisions
//! - Declaration order is priority order; first match wins
//! - Caches (segment tree, per-controller candidates) are built lazily behind
//!   `&self` and dropped on every mutation
//! - A failed draw leaves the set empty rather than half populated

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use dashmap::DashMap;
use once_cell::sync::OnceCell;
use serde::Serialize;

use crate::config::draw::draw_routes;
use crate::config::loader::{load_config, ConfigError};
use crate::routing::builder::RouteBuilder;
use crate::routing::conditions::RequestEnv;
use crate::routing::error::{BuildError, RoutingError};
use crate::routing::mapper::Mapper;
use crate::routing::named_routes::{positional_options, NamedRouteCollection};
use crate::routing::options::{HttpMethod, RouteOptions};
use crate::routing::params::{inspect, ParamValue, Params};
use crate::routing::recognition::SegmentTree;
use crate::routing::route::{Expiry, Route};
use crate::routing::segment::ControllerSet;
use crate::routing::url::{rewrite_url, UrlOptions};

/// Whether the set currently holds a drawn route table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Unloaded,
    Loaded,
}

/// Outcome of a successful recognition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recognized {
    pub controller: String,
    pub action: String,
    pub params: Params,
    /// Position of the matching route in declaration order.
    pub route_index: usize,
    pub route_name: Option<String>,
}

type CandidateKey = (String, String, Vec<String>);

/// Derived lookup structures, rebuilt on demand.
#[derive(Debug, Default)]
struct RouteCache {
    segment_tree: OnceCell<SegmentTree>,
    routes_by_controller: DashMap<CandidateKey, Arc<Vec<usize>>>,
}

/// Options, merged map and expiry for one generation call.
struct Prepared {
    options: Params,
    merged: Params,
    expire_on: Expiry,
}

/// Ordered routes plus named routes and caches.
#[derive(Debug)]
pub struct RouteSet {
    routes: Vec<Route>,
    named_routes: NamedRouteCollection,
    builder: RouteBuilder,
    state: LoadState,
    configuration_files: Vec<PathBuf>,
    file_stamps: BTreeMap<PathBuf, SystemTime>,
    cache: RouteCache,
}

impl Default for RouteSet {
    fn default() -> Self {
        Self::new()
    }
}

impl RouteSet {
    pub fn new() -> Self {
        Self {
            routes: Vec::new(),
            named_routes: NamedRouteCollection::new(),
            builder: RouteBuilder::default(),
            state: LoadState::Unloaded,
            configuration_files: Vec::new(),
            file_stamps: BTreeMap::new(),
            cache: RouteCache::default(),
        }
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    pub fn is_loaded(&self) -> bool {
        self.state == LoadState::Loaded
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn named_routes(&self) -> &NamedRouteCollection {
        &self.named_routes
    }

    pub fn named_route(&self, name: &str) -> Option<&Route> {
        self.named_routes.get(name).and_then(|i| self.routes.get(i))
    }

    pub fn controllers(&self) -> &ControllerSet {
        self.builder.controllers()
    }

    /// Controller names the `:controller` segment matches in the next draw.
    pub fn use_controllers<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.builder.set_controllers(ControllerSet::new(names));
    }

    /// Drop every route and cache.
    pub fn clear(&mut self) {
        self.routes.clear();
        self.named_routes.clear();
        self.state = LoadState::Unloaded;
        self.invalidate();
    }

    fn invalidate(&mut self) {
        self.cache = RouteCache::default();
    }

    /// Compile and append a route. Returns its index.
    pub fn add_route(&mut self, path: &str, options: &RouteOptions) -> Result<usize, BuildError> {
        let route = self.builder.build(path, options)?;
        tracing::debug!(route = %route, "Route added");
        self.routes.push(route);
        self.invalidate();
        Ok(self.routes.len() - 1)
    }

    pub fn add_named_route(
        &mut self,
        name: &str,
        path: &str,
        options: &RouteOptions,
    ) -> Result<usize, BuildError> {
        let index = self.add_route(path, options)?;
        self.named_routes.insert(name, index);
        Ok(index)
    }

    /// Replace the table with the routes `f` declares.
    pub fn draw<F>(&mut self, f: F) -> Result<(), BuildError>
    where
        F: FnOnce(&mut Mapper<'_>) -> Result<(), BuildError>,
    {
        self.clear();
        let result = {
            let mut mapper = Mapper::new(self);
            f(&mut mapper)
        };
        match result {
            Ok(()) => {
                self.state = LoadState::Loaded;
                tracing::info!(
                    routes = self.routes.len(),
                    named = self.named_routes.len(),
                    "Routes drawn"
                );
                Ok(())
            }
            Err(e) => {
                self.clear();
                tracing::error!(error = %e, "Route draw failed");
                Err(e)
            }
        }
    }

    /// Route files `load` reads, in order.
    pub fn add_configuration_file(&mut self, path: impl Into<PathBuf>) {
        self.configuration_files.push(path.into());
    }

    pub fn configuration_files(&self) -> &[PathBuf] {
        &self.configuration_files
    }

    /// Read every route file and draw the routes they declare.
    pub fn load(&mut self) -> Result<(), ConfigError> {
        let mut stamps = BTreeMap::new();
        let mut configs = Vec::with_capacity(self.configuration_files.len());
        for path in &self.configuration_files {
            stamps.insert(path.clone(), modified_at(path)?);
            configs.push(load_config(path)?);
        }

        let controllers: Vec<String> = configs
            .iter()
            .flat_map(|c| c.routing.controllers.iter().cloned())
            .collect();
        if !controllers.is_empty() {
            self.use_controllers(controllers);
        }

        self.draw(|map| {
            for config in &configs {
                draw_routes(map, &config.routes)?;
            }
            Ok(())
        })
        .map_err(ConfigError::Routes)?;
        self.file_stamps = stamps;
        Ok(())
    }

    /// Load again if the set is unloaded or a route file changed since the last load.
    pub fn reload(&mut self) -> Result<bool, ConfigError> {
        if self.state == LoadState::Unloaded || self.files_changed()? {
            self.load()?;
            return Ok(true);
        }
        Ok(false)
    }

    fn files_changed(&self) -> Result<bool, ConfigError> {
        for path in &self.configuration_files {
            let modified = modified_at(path)?;
            if self.file_stamps.get(path) != Some(&modified) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// The recognition tree for the current routes.
    pub fn segment_tree(&self) -> &SegmentTree {
        self.cache
            .segment_tree
            .get_or_init(|| SegmentTree::build(&self.routes))
    }

    /// Parameters for `path`, or why nothing matched.
    pub fn recognize_path(&self, path: &str, env: &RequestEnv) -> Result<Params, RoutingError> {
        self.recognize_indexed(path, env).map(|(_, params)| params)
    }

    /// Like [`recognize_path`](Self::recognize_path), plus the target and the matching route.
    pub fn recognize(&self, path: &str, env: &RequestEnv) -> Result<Recognized, RoutingError> {
        let (route_index, params) = self.recognize_indexed(path, env)?;
        let controller = params
            .get("controller")
            .map(ParamValue::to_param)
            .unwrap_or_default();
        let action = params
            .get("action")
            .map(ParamValue::to_param)
            .unwrap_or_else(|| "index".to_string());
        Ok(Recognized {
            controller,
            action,
            params,
            route_index,
            route_name: self.named_routes.name_for(route_index).map(str::to_string),
        })
    }

    fn recognize_indexed(
        &self,
        path: &str,
        env: &RequestEnv,
    ) -> Result<(usize, Params), RoutingError> {
        let start = self.segment_tree().lookup(path);

        if let Some(start) = start {
            for (offset, route) in self.routes[start..].iter().enumerate() {
                if let Some(params) = route.recognize(path, env) {
                    tracing::debug!(path, route = start + offset, "Route recognized");
                    return Ok((start + offset, params));
                }
            }
        }

        let allowed: Vec<HttpMethod> = match start {
            Some(start) => HttpMethod::ALL
                .into_iter()
                .filter(|method| {
                    let probe = env.for_method(*method);
                    self.routes[start..]
                        .iter()
                        .any(|route| route.recognize(path, &probe).is_some())
                })
                .collect(),
            None => Vec::new(),
        };

        match env.method.as_deref() {
            Some(method) if env.known_method().is_none() => Err(RoutingError::NotImplemented {
                method: method.to_uppercase(),
                allowed,
            }),
            _ if !allowed.is_empty() => Err(RoutingError::MethodNotAllowed {
                path: path.to_string(),
                allowed,
            }),
            _ => Err(RoutingError::NoRoute {
                path: path.to_string(),
                method: env.method.clone(),
            }),
        }
    }

    /// Routes able to generate for the controller and action, fewest unknown keys first.
    pub fn routes_for_controller_and_action_and_keys(
        &self,
        controller: &str,
        action: &str,
        keys: &[String],
    ) -> Arc<Vec<usize>> {
        let cache_key = (controller.to_string(), action.to_string(), keys.to_vec());
        if let Some(hit) = self.cache.routes_by_controller.get(&cache_key) {
            return Arc::clone(hit.value());
        }

        let mut selected: Vec<usize> = self
            .routes
            .iter()
            .enumerate()
            .filter(|(_, route)| route.matches_controller_and_action(controller, action))
            .map(|(index, _)| index)
            .collect();
        selected.sort_by_key(|&index| {
            let known = self.routes[index].significant_keys();
            keys.iter().filter(|k| !known.contains(k)).count()
        });

        let selected = Arc::new(selected);
        self.cache
            .routes_by_controller
            .insert(cache_key, Arc::clone(&selected));
        selected
    }

    /// Resolve the controller relative to the recalled one and merge with the recall.
    fn prepare(&self, options: &Params, recall: &Params, named: Option<&Route>) -> Prepared {
        let mut options = match named {
            Some(route) => {
                let mut shell = route.parameter_shell().clone();
                shell.extend(options.clone());
                shell
            }
            None => options.clone(),
        };
        let expire_on = build_expiry(&options, recall);

        if named.is_none() && expire_on.get("controller").copied().unwrap_or(false) {
            let relative = match (options.get("controller"), recall.get("controller")) {
                (Some(ParamValue::Single(new)), Some(old)) if !new.starts_with('/') => {
                    Some(relative_controller(&old.to_param(), new))
                }
                _ => None,
            };
            if let Some(controller) = relative {
                options.insert("controller".to_string(), ParamValue::Single(controller));
            }
        }
        if let Some(ParamValue::Single(controller)) = options.get_mut("controller") {
            if let Some(absolute) = controller.strip_prefix('/') {
                *controller = absolute.to_string();
            }
        }

        let mut merged = recall.clone();
        merged.extend(options.clone());
        Prepared {
            options,
            merged,
            expire_on,
        }
    }

    fn generate_with<T, F>(&self, options: &Params, recall: &Params, attempt: F) -> Result<T, RoutingError>
    where
        F: Fn(&Route, &Params, &Params, &Expiry) -> Option<T>,
    {
        let Prepared {
            mut options,
            mut merged,
            expire_on,
        } = self.prepare(options, recall, None);
        merged
            .entry("action".to_string())
            .or_insert_with(|| ParamValue::from("index"));
        options
            .entry("action".to_string())
            .or_insert_with(|| ParamValue::from("index"));

        let controller = merged
            .get("controller")
            .map(ParamValue::to_param)
            .ok_or(RoutingError::NeedControllerAndAction)?;
        let action = merged
            .get("action")
            .map(ParamValue::to_param)
            .ok_or(RoutingError::NeedControllerAndAction)?;

        let keys: Vec<String> = options.keys().cloned().collect();
        let candidates = self.routes_for_controller_and_action_and_keys(&controller, &action, &keys);
        for &index in candidates.iter() {
            if let Some(result) = attempt(&self.routes[index], &options, &merged, &expire_on) {
                return Ok(result);
            }
        }
        Err(RoutingError::NoRouteForOptions {
            options: inspect(&options),
        })
    }

    /// Path (with query string) for `options`, filling gaps from `recall`.
    pub fn generate(&self, options: &Params, recall: &Params) -> Result<String, RoutingError> {
        self.generate_with(options, recall, Route::generate)
    }

    /// Path without query string, plus the option keys the path did not use.
    pub fn generate_extras(
        &self,
        options: &Params,
        recall: &Params,
    ) -> Result<(String, Vec<String>), RoutingError> {
        self.generate_with(options, recall, Route::generate_extras)
    }

    pub fn extra_keys(&self, options: &Params, recall: &Params) -> Result<Vec<String>, RoutingError> {
        self.generate_extras(options, recall).map(|(_, keys)| keys)
    }

    /// Every path any route generates for `options`, in route order.
    pub fn generate_all(&self, options: &Params, recall: &Params) -> Result<Vec<String>, RoutingError> {
        let Prepared {
            mut options,
            mut merged,
            expire_on,
        } = self.prepare(options, recall, None);
        merged
            .entry("action".to_string())
            .or_insert_with(|| ParamValue::from("index"));
        options
            .entry("action".to_string())
            .or_insert_with(|| ParamValue::from("index"));
        if !merged.contains_key("controller") {
            return Err(RoutingError::NeedControllerAndAction);
        }
        Ok(self
            .routes
            .iter()
            .filter_map(|route| route.generate(&options, &merged, &expire_on))
            .collect())
    }

    /// Path for the named route.
    pub fn generate_named(
        &self,
        name: &str,
        options: &Params,
        recall: &Params,
    ) -> Result<String, RoutingError> {
        let route = self
            .named_route(name)
            .ok_or_else(|| RoutingError::UnknownNamedRoute(name.to_string()))?;
        let Prepared {
            options,
            merged,
            expire_on,
        } = self.prepare(options, recall, Some(route));
        route
            .generate(&options, &merged, &expire_on)
            .ok_or_else(|| named_route_error(name, route, &options))
    }

    /// `<name>_path(options)`
    pub fn named_path(&self, name: &str, options: &Params) -> Result<String, RoutingError> {
        self.generate_named(name, options, &Params::new())
    }

    /// `<name>_path(arg, arg, options)`: positional values bind to the route's
    /// segment keys in order.
    pub fn named_path_with_args(
        &self,
        name: &str,
        args: &[ParamValue],
        options: &Params,
    ) -> Result<String, RoutingError> {
        let route = self
            .named_route(name)
            .ok_or_else(|| RoutingError::UnknownNamedRoute(name.to_string()))?;
        let options = positional_options(route, args, options);
        self.named_path(name, &options)
    }

    /// `<name>_url(options)`
    pub fn named_url(
        &self,
        name: &str,
        options: &Params,
        url: &UrlOptions,
    ) -> Result<String, RoutingError> {
        let path = self.named_path(name, options)?;
        rewrite_url(&path, url)
    }

    /// Full URL for `options`.
    pub fn url_for(
        &self,
        options: &Params,
        recall: &Params,
        url: &UrlOptions,
    ) -> Result<String, RoutingError> {
        let path = self.generate(options, recall)?;
        rewrite_url(&path, url)
    }

    /// One line per route: name, verb, path and requirements.
    pub fn describe(&self) -> Vec<String> {
        let width = self
            .named_routes
            .names()
            .map(str::len)
            .max()
            .unwrap_or_default();
        self.routes
            .iter()
            .enumerate()
            .map(|(index, route)| {
                let name = self.named_routes.name_for(index).unwrap_or_default();
                format!("{name:>width$} {route}")
            })
            .collect()
    }
}

/// Keys whose value differs from the recalled request.
fn build_expiry(options: &Params, recall: &Params) -> Expiry {
    recall
        .iter()
        .map(|(key, recalled)| {
            let changed = options
                .get(key)
                .is_some_and(|value| value.to_param() != recalled.to_param());
            (key.clone(), changed)
        })
        .collect()
}

/// `posts` relative to `admin/users` is `admin/posts`.
fn relative_controller(old: &str, new: &str) -> String {
    let old_parts: Vec<&str> = old.split('/').collect();
    let new_parts: Vec<&str> = new.split('/').collect();
    let keep = old_parts.len().saturating_sub(new_parts.len());
    old_parts[..keep]
        .iter()
        .chain(new_parts.iter())
        .copied()
        .collect::<Vec<_>>()
        .join("/")
}

fn named_route_error(name: &str, route: &Route, options: &Params) -> RoutingError {
    let render = |entries: Vec<String>| format!("{{{}}}", entries.join(", "));
    let requirements = route.requirements();
    let diff: Vec<String> = requirements
        .iter()
        .filter(|(key, value)| match value.as_literal() {
            Some(literal) => {
                options.get(key.as_str()).map(ParamValue::to_param).as_deref() != Some(literal)
            }
            None => !options.contains_key(key.as_str()),
        })
        .map(|(key, value)| format!("{key}: {value}"))
        .collect();

    if diff.is_empty() {
        RoutingError::NamedRouteMissingParams {
            name: name.to_string(),
            options: inspect(options),
            required: route.required_parts(),
        }
    } else {
        RoutingError::NamedRouteMismatch {
            name: name.to_string(),
            options: inspect(options),
            expected: render(
                requirements
                    .iter()
                    .map(|(key, value)| format!("{key}: {value}"))
                    .collect(),
            ),
            diff: render(diff),
        }
    }
}

fn modified_at(path: &Path) -> Result<SystemTime, ConfigError> {
    fs::metadata(path)
        .and_then(|meta| meta.modified())
        .map_err(ConfigError::Io)
}
