//! Route lookup for the reverse proxy.
//!
//! # Responsibilities
//! - Compile `RouteConfig` entries into matchers and filters
//! - Look up the first route matching a request
//! - Rewrite the upstream URI according to the route's filters
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) scan in declaration order; first match wins
//! - Explicit `None` rather than a silent default route

use std::collections::BTreeMap;

use axum::body::Body;
use axum::http::header::{HeaderName, HeaderValue};
use axum::http::{Request, Uri};
use thiserror::Error;

use crate::config::schema::RouteConfig;
use crate::routing::matcher::{AndMatcher, HostMatcher, Matcher, PathMatcher};

#[derive(Debug, Error)]
pub enum RouteError {
    #[error("route '{route}': invalid upstream uri '{uri}'")]
    InvalidUpstream { route: String, uri: String },

    #[error("route '{route}': invalid header '{name}'")]
    InvalidHeader { route: String, name: String },
}

/// A compiled proxy rule.
#[derive(Debug)]
pub struct ProxyRoute {
    name: String,
    matcher: AndMatcher,
    set_path: Option<String>,
    response_headers: Vec<(HeaderName, HeaderValue)>,
    upstream: Uri,
}

impl ProxyRoute {
    pub fn compile(config: &RouteConfig) -> Result<Self, RouteError> {
        let mut matchers: Vec<Box<dyn Matcher>> = Vec::new();
        if let Some(host) = &config.host {
            matchers.push(Box::new(HostMatcher::new(host.as_str())));
        }
        if let Some(path) = &config.path {
            matchers.push(Box::new(PathMatcher::new(path.as_str())));
        }

        let upstream: Uri = config
            .uri
            .parse()
            .map_err(|_| RouteError::InvalidUpstream {
                route: config.name.clone(),
                uri: config.uri.clone(),
            })?;
        if upstream.scheme().is_none() || upstream.authority().is_none() {
            return Err(RouteError::InvalidUpstream {
                route: config.name.clone(),
                uri: config.uri.clone(),
            });
        }

        Ok(Self {
            name: config.name.clone(),
            matcher: AndMatcher::new(matchers),
            set_path: config.set_path.clone(),
            response_headers: compile_headers(&config.name, &config.add_response_headers)?,
            upstream,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn matches(&self, req: &Request<Body>) -> bool {
        self.matcher.matches(req)
    }

    /// Headers added to every response relayed through this route.
    pub fn response_headers(&self) -> &[(HeaderName, HeaderValue)] {
        &self.response_headers
    }

    /// Upstream URI for `original`: the route's scheme and authority, the
    /// rewritten (or original) path, and the original query.
    pub fn upstream_uri(&self, original: &Uri) -> Result<Uri, axum::http::Error> {
        let path = self.set_path.as_deref().unwrap_or_else(|| original.path());
        let path_and_query = match original.query() {
            Some(query) => format!("{path}?{query}"),
            None => path.to_string(),
        };

        let mut builder = Uri::builder().path_and_query(path_and_query);
        if let Some(scheme) = self.upstream.scheme() {
            builder = builder.scheme(scheme.clone());
        }
        if let Some(authority) = self.upstream.authority() {
            builder = builder.authority(authority.clone());
        }
        builder.build()
    }
}

fn compile_headers(
    route: &str,
    headers: &BTreeMap<String, String>,
) -> Result<Vec<(HeaderName, HeaderValue)>, RouteError> {
    headers
        .iter()
        .map(|(name, value)| {
            let invalid = || RouteError::InvalidHeader {
                route: route.to_string(),
                name: name.clone(),
            };
            let name = HeaderName::try_from(name.as_str()).map_err(|_| invalid())?;
            let value = HeaderValue::try_from(value.as_str()).map_err(|_| invalid())?;
            Ok((name, value))
        })
        .collect()
}

/// Immutable set of proxy routes.
#[derive(Debug, Default)]
pub struct ProxyRouter {
    routes: Vec<ProxyRoute>,
}

impl ProxyRouter {
    pub fn new(configs: &[RouteConfig]) -> Result<Self, RouteError> {
        let routes = configs
            .iter()
            .map(ProxyRoute::compile)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { routes })
    }

    pub fn find(&self, req: &Request<Body>) -> Option<&ProxyRoute> {
        self.routes.iter().find(|route| route.matches(req))
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
