//! Route file entries → route table.

use crate::config::schema::{AppConfig, RouteEntry};
use crate::routing::error::BuildError;
use crate::routing::mapper::{Mapper, ResourceOptions};
use crate::routing::options::{HttpMethod, RouteOptions};
use crate::routing::route_set::RouteSet;

/// Build a fresh, loaded route set from a validated configuration.
pub fn build_route_set(config: &AppConfig) -> Result<RouteSet, BuildError> {
    let mut set = RouteSet::new();
    if !config.routing.controllers.is_empty() {
        set.use_controllers(&config.routing.controllers);
    }
    set.draw(|map| draw_routes(map, &config.routes))?;
    Ok(set)
}

/// Declare every entry, in file order.
pub fn draw_routes(map: &mut Mapper<'_>, entries: &[RouteEntry]) -> Result<(), BuildError> {
    for entry in entries {
        match entry.namespace.as_deref() {
            Some(namespace) => {
                map.namespace(namespace, RouteOptions::new(), |scoped| declare(scoped, entry))?
            }
            None => declare(map, entry)?,
        }
    }
    Ok(())
}

fn declare(map: &mut Mapper<'_>, entry: &RouteEntry) -> Result<(), BuildError> {
    if let Some(resources) = entry.resources.as_deref() {
        let resource = ResourceOptions {
            only: entry.only.clone(),
            except: entry.except.clone(),
            singular: entry.singular.clone(),
            controller: entry.controller.clone(),
            ..ResourceOptions::default()
        };
        let scope = scope_options(entry)?;
        return map.with_options(scope, |scoped| scoped.resources(resources, resource));
    }

    let mut options = scope_options(entry)?;
    if let Some(controller) = &entry.controller {
        options = options.controller(controller);
    }
    if let Some(action) = &entry.action {
        options = options.action(action);
    }
    for method in &entry.methods {
        options = options.method(method.parse::<HttpMethod>()?);
    }

    if entry.root {
        return map.root(options);
    }
    let path = entry.path.as_deref().unwrap_or_default();
    match entry.name.as_deref() {
        Some(name) => map.named_route(name, path, options),
        None => map.connect(path, options),
    }
}

/// Options shared by every kind of entry.
fn scope_options(entry: &RouteEntry) -> Result<RouteOptions, BuildError> {
    let mut options = RouteOptions::new();
    for (key, value) in &entry.params {
        options = options.param(key, value.clone());
    }
    for (key, value) in &entry.requirements {
        options = options.requirement(key, value.clone());
    }
    for (key, value) in &entry.defaults {
        options = if value.is_empty() {
            options.optional(key)
        } else {
            options.default_value(key, value)
        };
    }
    if let Some(host) = &entry.host {
        options = options.host(host);
    }
    if let Some(prefix) = &entry.path_prefix {
        options = options.path_prefix(prefix);
    }
    if let Some(prefix) = &entry.name_prefix {
        options = options.name_prefix(prefix);
    }
    Ok(options)
}
