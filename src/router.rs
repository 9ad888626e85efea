use crate::prelude::*;

#[derive(Debug)]
pub enum RoutingError {
    NotFound,
    MethodNotAllowed(Vec<String>),
}

/// Same component-boundary rule as `ServerConfig::find_route` (spec.md §4.G):
/// a forward-match pattern only applies at `/`, not mid-segment.
fn path_matches_prefix(url_path: &str, pattern: &str) -> bool {
    if !url_path.starts_with(pattern) {
        return false;
    }
    if pattern.ends_with('/') {
        return true;
    }
    url_path.len() == pattern.len() || url_path.as_bytes()[pattern.len()] == b'/'
}

/// Host -> (location path -> route config). A standalone complement to
/// `ServerConfig::find_route` for callers that resolve routes without an
/// already-selected `ServerConfig` (e.g. tests, or a future multi-config front end).
#[derive(Debug, Default)]
pub struct Router {
    pub routes: HashMap<String, HashMap<String, Arc<RouteConfig>>>,
}

impl Router {
    pub fn new() -> Self {
        Self {
            routes: HashMap::new(),
        }
    }

    pub fn add_route_config(&mut self, host: &str, path: &str, route: Arc<RouteConfig>) {
        self.routes
            .entry(host.to_string())
            .or_default()
            .insert(path.to_string(), route);
    }

    pub fn resolve(
        &self,
        method: &Method,
        host: &str,
        path: &str,
    ) -> std::result::Result<Arc<RouteConfig>, RoutingError> {
        let locations = self.routes.get(host).ok_or(RoutingError::NotFound)?;

        let mut best: Option<(&String, &Arc<RouteConfig>)> = None;
        for (route_path, route) in locations {
            if path_matches_prefix(path, route_path.as_str()) {
                let better = match best {
                    Some((b_path, _)) => route_path.len() > b_path.len(),
                    None => true,
                };
                if better {
                    best = Some((route_path, route));
                }
            }
        }

        match best {
            None => Err(RoutingError::NotFound),
            Some((_, route)) => {
                if route.allows(method.as_str()) {
                    Ok(Arc::clone(route))
                } else {
                    Err(RoutingError::MethodNotAllowed(route.methods.clone()))
                }
            }
        }
    }
}
