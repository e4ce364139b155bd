//! Route table and lookup.
//!
//! # Responsibilities
//! - Compile route templates at registration
//! - Store compiled routes in registration order
//! - Look up the first route matching method and path
//!
//! # Design Decisions
//! - Built by [`RouteTableBuilder`], immutable afterwards (thread-safe without locks)
//! - O(n) scan in registration order (acceptable for small fixed tables)
//! - Explicit `None` rather than a silent default route

use std::fmt;
use std::sync::Arc;

use axum::http::Method;

use crate::auth::permissions::RequiredPermission;
use crate::http::request::Handler;
use crate::routing::matcher::{compile_matcher, Matcher};
use crate::routing::pattern::RouteConfigError;
use crate::routing::Params;

/// Methods a route can be registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl RouteMethod {
    /// Maps an HTTP method, `None` for methods no route can serve.
    pub fn from_http(method: &Method) -> Option<Self> {
        if *method == Method::GET {
            Some(RouteMethod::Get)
        } else if *method == Method::POST {
            Some(RouteMethod::Post)
        } else if *method == Method::PUT {
            Some(RouteMethod::Put)
        } else if *method == Method::DELETE {
            Some(RouteMethod::Delete)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RouteMethod::Get => "GET",
            RouteMethod::Post => "POST",
            RouteMethod::Put => "PUT",
            RouteMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for RouteMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A compiled route.
pub struct Route {
    method: RouteMethod,
    path: String,
    matcher: Box<dyn Matcher>,
    permission: Option<RequiredPermission>,
    handler: Arc<dyn Handler>,
}

impl Route {
    /// Compile a route. Public unless [`Route::require`] is called.
    pub fn new<H: Handler>(
        method: RouteMethod,
        path: &str,
        handler: H,
    ) -> Result<Self, RouteConfigError> {
        Ok(Self {
            method,
            path: path.to_string(),
            matcher: compile_matcher(path)?,
            permission: None,
            handler: Arc::new(handler),
        })
    }

    /// Require a permission (or any of several) to reach this route.
    pub fn require(mut self, permission: impl Into<RequiredPermission>) -> Self {
        self.permission = Some(permission.into());
        self
    }

    pub fn method(&self) -> RouteMethod {
        self.method
    }

    /// The template as registered.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn permission(&self) -> Option<&RequiredPermission> {
        self.permission.as_ref()
    }

    pub fn handler(&self) -> Arc<dyn Handler> {
        Arc::clone(&self.handler)
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("permission", &self.permission)
            .finish_non_exhaustive()
    }
}

/// Result of a successful lookup.
#[derive(Debug)]
pub struct RouteMatch<'a> {
    pub route: &'a Route,
    pub params: Params,
}

/// Ordered, immutable set of routes. First match wins.
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn builder() -> RouteTableBuilder {
        RouteTableBuilder::default()
    }

    /// Find the first route registered for `method` whose template matches `path`.
    pub fn match_route(&self, method: &Method, path: &str) -> Option<RouteMatch<'_>> {
        let method = RouteMethod::from_http(method)?;
        self.routes
            .iter()
            .filter(|route| route.method == method)
            .find_map(|route| {
                route
                    .matcher
                    .match_path(path)
                    .map(|params| RouteMatch { route, params })
            })
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Append-only builder for a [`RouteTable`].
///
/// Each registration compiles its template immediately, so a malformed
/// template stops startup instead of failing requests.
#[derive(Debug, Default)]
pub struct RouteTableBuilder {
    routes: Vec<Route>,
}

impl RouteTableBuilder {
    pub fn route(mut self, route: Route) -> Self {
        self.routes.push(route);
        self
    }

    pub fn get<H: Handler>(
        self,
        path: &str,
        handler: H,
        permission: Option<RequiredPermission>,
    ) -> Result<Self, RouteConfigError> {
        self.add(RouteMethod::Get, path, handler, permission)
    }

    pub fn post<H: Handler>(
        self,
        path: &str,
        handler: H,
        permission: Option<RequiredPermission>,
    ) -> Result<Self, RouteConfigError> {
        self.add(RouteMethod::Post, path, handler, permission)
    }

    pub fn put<H: Handler>(
        self,
        path: &str,
        handler: H,
        permission: Option<RequiredPermission>,
    ) -> Result<Self, RouteConfigError> {
        self.add(RouteMethod::Put, path, handler, permission)
    }

    pub fn delete<H: Handler>(
        self,
        path: &str,
        handler: H,
        permission: Option<RequiredPermission>,
    ) -> Result<Self, RouteConfigError> {
        self.add(RouteMethod::Delete, path, handler, permission)
    }

    fn add<H: Handler>(
        self,
        method: RouteMethod,
        path: &str,
        handler: H,
        permission: Option<RequiredPermission>,
    ) -> Result<Self, RouteConfigError> {
        let mut route = Route::new(method, path, handler)?;
        route.permission = permission;
        Ok(self.route(route))
    }

    pub fn build(self) -> RouteTable {
        RouteTable {
            routes: self.routes,
        }
    }
}
