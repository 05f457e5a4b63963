//! Named route registry.

use std::collections::{BTreeMap, HashMap};

use crate::routing::params::{ParamValue, Params};
use crate::routing::route::Route;

/// Route names mapped to positions in the owning route list, and back.
#[derive(Debug, Clone, Default)]
pub struct NamedRouteCollection {
    routes: BTreeMap<String, usize>,
    names: HashMap<usize, String>,
}

impl NamedRouteCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `name`. A later declaration under the same name replaces the earlier one.
    pub fn insert(&mut self, name: impl Into<String>, index: usize) {
        let name = name.into();
        if let Some(previous) = self.routes.insert(name.clone(), index) {
            if self.names.get(&previous) == Some(&name) {
                self.names.remove(&previous);
            }
        }
        self.names.insert(index, name);
    }

    pub fn get(&self, name: &str) -> Option<usize> {
        self.routes.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.routes.contains_key(name)
    }

    pub fn clear(&mut self) {
        self.routes.clear();
        self.names.clear();
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.routes.keys().map(String::as_str)
    }

    /// Name for the route at `index`, if it has one.
    pub fn name_for(&self, index: usize) -> Option<&str> {
        self.names.get(&index).map(String::as_str)
    }

    /// URL helper names generated for every registered route.
    pub fn helpers(&self) -> Vec<String> {
        self.names().flat_map(helper_names).collect()
    }
}

/// Helper names for one route name: `post_url`, `post_path`, `hash_for_post_url`,
/// `hash_for_post_path`.
pub fn helper_names(name: &str) -> Vec<String> {
    ["url", "path"]
        .iter()
        .flat_map(|kind| [format!("{name}_{kind}"), format!("hash_for_{name}_{kind}")])
        .collect()
}

/// Bind positional arguments to the route's segment keys in path order.
/// Positional values take precedence over `options`.
pub fn positional_options(route: &Route, args: &[ParamValue], options: &Params) -> Params {
    let mut merged = options.clone();
    for (value, key) in args.iter().zip(route.segment_keys()) {
        merged.insert(key.to_string(), value.clone());
    }
    merged
}
