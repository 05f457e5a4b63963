//! Route declaration DSL.
//!
//! # Responsibilities
//! - Offer `connect`, `named_route`, `namespace`, `with_options`, `root`
//!   and `resources` on top of a `RouteSet`
//! - Carry scope options (prefixes, namespace, shared params) into nested blocks
//!
//! # Design Decisions
//! - Scopes merge: a call's own options override the enclosing block's
//! - Every call returns `Result` so a bad declaration aborts the whole draw

use crate::routing::error::BuildError;
use crate::routing::options::{HttpMethod, RouteOptions, RouteValue};
use crate::routing::route_set::RouteSet;
use crate::routing::segment::SEGMENT_VALUE_PATTERN;

/// The seven RESTful actions, in declaration order.
pub const RESOURCE_ACTIONS: [&str; 7] = ["index", "create", "new", "edit", "show", "update", "destroy"];

/// Options for [`Mapper::resources`].
#[derive(Debug, Clone, Default)]
pub struct ResourceOptions {
    /// Restrict the default actions to these.
    pub only: Option<Vec<String>>,

    /// Drop these default actions.
    pub except: Vec<String>,

    /// Singular name used for member route names; derived from the plural by default.
    pub singular: Option<String>,

    /// Controller, defaults to the resource name.
    pub controller: Option<String>,

    /// Extra member actions (`/posts/:id/<action>`).
    pub member: Vec<(String, HttpMethod)>,

    /// Extra collection actions (`/posts/<action>`).
    pub collection: Vec<(String, HttpMethod)>,
}

impl ResourceOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn only<I, S>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.only = Some(actions.into_iter().map(Into::into).collect());
        self
    }

    pub fn except<I, S>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.except = actions.into_iter().map(Into::into).collect();
        self
    }

    pub fn singular(mut self, singular: impl Into<String>) -> Self {
        self.singular = Some(singular.into());
        self
    }

    pub fn controller(mut self, controller: impl Into<String>) -> Self {
        self.controller = Some(controller.into());
        self
    }

    pub fn member(mut self, action: impl Into<String>, method: HttpMethod) -> Self {
        self.member.push((action.into(), method));
        self
    }

    pub fn collection(mut self, action: impl Into<String>, method: HttpMethod) -> Self {
        self.collection.push((action.into(), method));
        self
    }

    fn includes(&self, action: &str) -> bool {
        let listed = self
            .only
            .as_ref()
            .map_or(true, |only| only.iter().any(|a| a == action));
        listed && !self.except.iter().any(|a| a == action)
    }
}

/// Naive English singular: `categories` → `category`, `posts` → `post`.
pub fn singularize(plural: &str) -> String {
    if let Some(stem) = plural.strip_suffix("ies") {
        format!("{stem}y")
    } else if let Some(stem) = plural.strip_suffix('s') {
        stem.to_string()
    } else {
        plural.to_string()
    }
}

/// Declares routes into a `RouteSet` under a scope.
pub struct Mapper<'a> {
    set: &'a mut RouteSet,
    scope: RouteOptions,
}

impl<'a> Mapper<'a> {
    pub(crate) fn new(set: &'a mut RouteSet) -> Self {
        Self {
            set,
            scope: RouteOptions::default(),
        }
    }

    /// Options every declaration in this block inherits.
    pub fn scope(&self) -> &RouteOptions {
        &self.scope
    }

    pub fn connect(&mut self, path: &str, options: RouteOptions) -> Result<(), BuildError> {
        let options = self.scope.merged_with(&options);
        self.set.add_route(path, &options)?;
        Ok(())
    }

    /// Adds a route under `name`, prefixed by the scope's name prefix.
    pub fn named_route(
        &mut self,
        name: &str,
        path: &str,
        options: RouteOptions,
    ) -> Result<(), BuildError> {
        let options = self.scope.merged_with(&options);
        let name = format!("{}{}", options.name_prefix.as_deref().unwrap_or_default(), name);
        self.set.add_named_route(&name, path, &options)?;
        Ok(())
    }

    /// Runs `f` with `options` merged into the scope.
    pub fn with_options<F>(&mut self, options: RouteOptions, f: F) -> Result<(), BuildError>
    where
        F: FnOnce(&mut Mapper<'_>) -> Result<(), BuildError>,
    {
        let scope = self.scope.merged_with(&options);
        let mut inner = Mapper {
            set: &mut *self.set,
            scope,
        };
        f(&mut inner)
    }

    /// Scopes paths, route names and controllers under `name`. Nested namespaces
    /// extend the enclosing prefixes.
    pub fn namespace<F>(&mut self, name: &str, options: RouteOptions, f: F) -> Result<(), BuildError>
    where
        F: FnOnce(&mut Mapper<'_>) -> Result<(), BuildError>,
    {
        let scoped = match self.scope.namespace.as_deref() {
            Some(outer) => RouteOptions::new()
                .path_prefix(format!(
                    "{}/{}",
                    self.scope.path_prefix.as_deref().unwrap_or_default(),
                    name
                ))
                .name_prefix(format!(
                    "{}{}_",
                    self.scope.name_prefix.as_deref().unwrap_or_default(),
                    name
                ))
                .namespace(format!("{outer}{name}/")),
            None => RouteOptions::new()
                .path_prefix(name)
                .name_prefix(format!("{name}_"))
                .namespace(format!("{name}/")),
        };
        self.with_options(scoped.merged_with(&options), f)
    }

    /// The `root` named route at the empty path.
    pub fn root(&mut self, options: RouteOptions) -> Result<(), BuildError> {
        self.named_route("root", "", options)
    }

    /// The `root` route, targeting whatever the named route `source` targets.
    pub fn root_as(&mut self, source: &str) -> Result<(), BuildError> {
        let route = self
            .set
            .named_route(source)
            .ok_or_else(|| BuildError::UnknownNamedRoute(source.to_string()))?;
        let mut options = RouteOptions::new();
        for (key, value) in route.defaults() {
            options = options.param(key, RouteValue::Literal(value));
        }
        options.conditions = route.conditions().clone();
        self.root(options)
    }

    /// RESTful routes for `name`.
    pub fn resources(&mut self, name: &str, resource: ResourceOptions) -> Result<(), BuildError> {
        let plural = name.trim_matches('/');
        let singular = resource
            .singular
            .clone()
            .unwrap_or_else(|| singularize(plural));
        let controller = resource
            .controller
            .clone()
            .unwrap_or_else(|| plural.to_string());
        let base = RouteOptions::new().controller(controller);

        let collection_path = format!("{plural}(.:format)");
        let new_path = format!("{plural}/new(.:format)");
        let member_path = format!("{plural}/:id(.:format)");

        for (action, method) in &resource.collection {
            let options = base.clone().action(action).method(*method);
            self.named_route(
                &format!("{action}_{plural}"),
                &format!("{plural}/{action}(.:format)"),
                options,
            )?;
        }
        if resource.includes("index") {
            let options = base.clone().action("index").method(HttpMethod::Get);
            self.named_route(plural, &collection_path, options)?;
        }
        if resource.includes("create") {
            let options = base.clone().action("create").method(HttpMethod::Post);
            self.connect(&collection_path, options)?;
        }
        if resource.includes("new") {
            let options = base.clone().action("new").method(HttpMethod::Get);
            self.named_route(&format!("new_{singular}"), &new_path, options)?;
        }
        for (action, method) in &resource.member {
            let options = member(&base).action(action).method(*method);
            self.named_route(
                &format!("{action}_{singular}"),
                &format!("{plural}/:id/{action}(.:format)"),
                options,
            )?;
        }
        if resource.includes("edit") {
            let options = member(&base).action("edit").method(HttpMethod::Get);
            self.named_route(
                &format!("edit_{singular}"),
                &format!("{plural}/:id/edit(.:format)"),
                options,
            )?;
        }
        if resource.includes("show") {
            let options = member(&base).action("show").method(HttpMethod::Get);
            self.named_route(&singular, &member_path, options)?;
        }
        if resource.includes("update") {
            let options = member(&base).action("update").method(HttpMethod::Put);
            self.connect(&member_path, options)?;
        }
        if resource.includes("destroy") {
            let options = member(&base).action("destroy").method(HttpMethod::Delete);
            self.connect(&member_path, options)?;
        }
        Ok(())
    }
}

/// Member routes require a non-empty id.
fn member(base: &RouteOptions) -> RouteOptions {
    base.clone()
        .requirement("id", RouteValue::pattern(SEGMENT_VALUE_PATTERN))
}
