use derive_yaml::FromYaml;
use std::collections::HashMap;

use crate::config::parser::FromYaml as _;

// --- Constants ---
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_SERVER_NAME: &str = "_";
pub const DEFAULT_MAX_BODY_SIZE: usize = 1_048_576; // 1MB
pub const DEFAULT_ROUTE_PATH: &str = "/";
pub const DEFAULT_ROOT: &str = "./www";
pub const DEFAULT_FILE: &str = "index.html";

#[derive(Debug, Clone, FromYaml)]
pub struct RouteConfig {
    pub path: String,
    pub methods: Vec<String>,
    pub redirection: Option<String>,
    pub redirect_code: Option<u16>,
    pub root: String,
    /// Candidate index filenames for a directory request, tried in order
    /// (spec.md §4.H: "iterate index_pages and serve the first file that
    /// exists").
    pub index_pages: Vec<String>,
    pub cgi_ext: Option<String>,
    pub cgi_path: Option<String>,
    pub upload_dir: String,
    pub autoindex: bool,
    pub client_max_body_size: Option<usize>,
    pub error_pages: HashMap<u16, String>,
    /// Whether an upload may overwrite an existing file at the destination
    /// path (spec.md §4.H: `O_TRUNC` if true, `O_EXCL` if false).
    pub overwrite: bool,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            path: DEFAULT_ROUTE_PATH.to_string(),
            methods: vec!["GET".to_string(), "HEAD".to_string()],
            redirection: None,
            redirect_code: None,
            root: DEFAULT_ROOT.to_string(),
            index_pages: vec![DEFAULT_FILE.to_string()],
            cgi_ext: None,
            cgi_path: None,
            upload_dir: String::new(),
            autoindex: false,
            client_max_body_size: None,
            error_pages: HashMap::new(),
            overwrite: false,
        }
    }
}

impl RouteConfig {
    /// Suffix ("backward") locations are written as a bare extension, e.g. `.php`.
    /// Anything else is matched by longest forward prefix.
    pub fn is_suffix_pattern(&self) -> bool {
        self.path.starts_with('.')
    }

    pub fn allows(&self, method: &str) -> bool {
        self.methods.iter().any(|m| m == method)
    }

    pub fn has_upload_dir(&self) -> bool {
        !self.upload_dir.is_empty()
    }
}

#[derive(Debug, Clone, FromYaml)]
pub struct ServerConfig {
    pub host: String,
    pub ports: Vec<u16>,
    pub server_name: String,
    pub default_server: bool,
    pub error_pages: HashMap<u16, String>,
    pub client_max_body_size: usize,
    pub root: String,
    pub routes: Vec<RouteConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            ports: vec![DEFAULT_PORT],
            server_name: DEFAULT_SERVER_NAME.to_string(),
            default_server: false,
            error_pages: HashMap::new(),
            client_max_body_size: DEFAULT_MAX_BODY_SIZE,
            root: DEFAULT_ROOT.to_string(),
            routes: Vec::new(),
        }
    }
}

/// A forward-match location applies only on a component boundary: the
/// pattern must be the whole path or be followed by `/` (spec.md §4.G),
/// so `/api` never matches `/apikey`.
fn path_matches_prefix(url_path: &str, pattern: &str) -> bool {
    if !url_path.starts_with(pattern) {
        return false;
    }
    if pattern.ends_with('/') {
        return true;
    }
    url_path.len() == pattern.len() || url_path.as_bytes()[pattern.len()] == b'/'
}

impl ServerConfig {
    /// Longest-forward-prefix-then-suffix location match (§4.G).
    pub fn find_route(
        &self,
        path: &str,
        method: &crate::http::Method,
    ) -> Result<&RouteConfig, crate::router::RoutingError> {
        let url_path = path.split('?').next().unwrap_or(path);
        let mut best: Option<&RouteConfig> = None;

        for route in &self.routes {
            if route.is_suffix_pattern() {
                continue;
            }
            if path_matches_prefix(url_path, route.path.as_str()) {
                let better = match best {
                    Some(b) => route.path.len() > b.path.len(),
                    None => true,
                };
                if better {
                    best = Some(route);
                }
            }
        }

        if best.is_none() {
            for route in &self.routes {
                if route.is_suffix_pattern() && url_path.ends_with(route.path.as_str()) {
                    best = Some(route);
                    break;
                }
            }
        }

        match best {
            None => Err(crate::router::RoutingError::NotFound),
            Some(route) => {
                if route.allows(method.as_str()) {
                    Ok(route)
                } else {
                    Err(crate::router::RoutingError::MethodNotAllowed(
                        route.methods.clone(),
                    ))
                }
            }
        }
    }
}

#[derive(Debug, Clone, FromYaml)]
pub struct AppConfig {
    pub servers: Vec<ServerConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self { servers: Vec::new() }
    }
}
