use crate::prelude::*;

#[derive(Debug)]
pub struct HttpResponse {
    pub version: String,
    pub status_code: u16,
    pub status_text: String,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status_code: u16, status_text: &str) -> Self {
        Self {
            version: "HTTP/1.1".to_string(),
            status_code,
            status_text: status_text.to_string(),
            headers: HashMap::from([("Content-Length".to_string(), "0".to_string())]),
            body: Vec::new(),
        }
    }

    pub fn set_header(&mut self, key: &str, value: &str) -> &mut Self {
        self.headers.insert(key.to_lowercase(), value.to_string());
        self
    }

    pub fn set_body(&mut self, body: Vec<u8>, content_type: &str) -> &mut Self {
        self.headers
            .insert("Content-Length".to_string(), body.len().to_string());
        self.headers
            .insert("Content-Type".to_string(), content_type.to_string());
        self.body = body;
        self
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut res = format!(
            "{} {} {}\r\n",
            self.version, self.status_code, self.status_text
        )
        .into_bytes();

        for (key, val) in &self.headers {
            let formatted_key = Self::to_pascal_case(key);
            res.extend_from_slice(format!("{}: {}\r\n", formatted_key, val).as_bytes());
        }
        res.extend_from_slice(b"\r\n");
        res.extend_from_slice(&self.body);
        res
    }

    pub fn status_text(code: u16) -> String {
        match code {
            200 => "OK",
            201 => "Created",
            204 => "No Content",
            301 => "Moved Permanently",
            302 => "Found",
            303 => "See Other",
            304 => "Not Modified",
            307 => "Temporary Redirect",
            308 => "Permanent Redirect",
            HTTP_BAD_REQUEST => "Bad Request",
            401 => "Unauthorized",
            HTTP_FORBIDDEN => "Forbidden",
            HTTP_NOT_FOUND => "Not Found",
            HTTP_METHOD_NOT_ALLOWED => "Method Not Allowed",
            408 => "Request Timeout",
            409 => "Conflict",
            HTTP_PAYLOAD_TOO_LARGE => "Payload Too Large",
            HTTP_URI_TOO_LONG => "URI Too Long",
            415 => "Unsupported Media Type",
            431 => "Request Header Fields Too Large",
            HTTP_INTERNAL_SERVER_ERROR => "Internal Server Error",
            HTTP_NOT_IMPLEMENTED => "Not Implemented",
            502 => "Bad Gateway",
            503 => "Service Unavailable",
            GATEWAY_TIMEOUT => "Gateway Timeout",
            _ => "Unknown",
        }
        .to_string()
    }

    pub fn set_status_code(&mut self, code: u16) -> &mut Self {
        self.status_code = code;
        self.status_text = HttpResponse::status_text(code);
        self
    }

    pub fn to_bytes_headers_only(&self) -> Vec<u8> {
        let mut res = format!("HTTP/1.1 {} {}\r\n", self.status_code, self.status_text);

        for (k, v) in &self.headers {
            let formatted_key = Self::to_pascal_case(k);
            res.push_str(&format!("{}: {}\r\n", formatted_key, v));
        }

        res.push_str("\r\n");
        res.into_bytes()
    }

    fn to_pascal_case(s: &str) -> String {
        s.split('-')
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    None => String::new(),
                    Some(f) => f.to_uppercase().collect::<String>() + chars.as_str(),
                }
            })
            .collect::<Vec<String>>()
            .join("-")
    }

    pub fn redirect(code: u16, target_url: &str) -> Self {
        let mut res = HttpResponse::new(code, &HttpResponse::status_text(code));
        res.set_header("Location", target_url)
            .set_header("Content-Length", "0");

        res
    }
}

pub fn get_mime_type(extension: Option<&str>) -> &'static str {
    match extension {
        Some("html") | Some("htm") => "text/html",
        Some("css") => "text/css",
        Some("js") => "application/javascript",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("json") => "application/json",
        Some("txt") => "text/plain",
        _ => "application/octet-stream",
    }
}

pub fn get_ext_from_content_type(content_type: &str) -> &str {
    match content_type {
        "application/json" => ".json",
        "application/pdf" => ".pdf",
        "application/xml" => ".xml",
        "application/zip" => ".zip",
        "audio/mpeg" => ".mp3",
        "image/gif" => ".gif",
        "image/jpeg" => ".jpg",
        "image/png" => ".png",
        "image/svg+xml" => ".svg",
        "image/webp" => ".webp",
        "text/css" => ".css",
        "text/html" => ".html",
        "text/javascript" => ".js",
        "text/plain" => ".txt",
        "video/mp4" => ".mp4",
        _ => ".bin",
    }
}

pub fn generate_autoindex(path: &Path, original_url: &str) -> HttpResponse {
    let mut html = format!("<html><body><h1>Index of {}</h1><ul>", original_url);
    if let Ok(entries) = path.read_dir() {
        for entry in entries.flatten() {
            if let Ok(name) = entry.file_name().into_string() {
                html.push_str(&format!(
                    "<li><a href=\"{}/{}\">{}</a></li>",
                    original_url.trim_end_matches('/'),
                    name,
                    name
                ));
            }
        }
    }

    html.push_str("</ul></body></html>");
    let mut res = HttpResponse::new(200, "OK") ;
    res.set_body(html.into_bytes(), "text/html");
    res
}

/// Stamps the ambient headers every outgoing response carries (spec.md §6):
/// `Date`, `Server`, and a `Connection` header that echoes the sticky
/// close-decision. Called once a response is fully built, right before it is
/// serialized onto the wire.
pub fn finalize_response_headers(res: &mut HttpResponse, close: bool) {
    res.headers
        .entry("date".to_string())
        .or_insert_with(http_date_now);
    res.headers
        .entry("server".to_string())
        .or_insert_with(|| "webserv".to_string());
    res.headers.insert(
        "connection".to_string(),
        if close { "close" } else { "keep-alive" }.to_string(),
    );
}

/// RFC 1123 date, e.g. `Tue, 28 Jul 2026 00:00:00 GMT`, computed from
/// `SystemTime` without pulling in a date/time crate.
pub fn http_date_now() -> String {
    let secs = SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    const DAYS: [&str; 7] = ["Thu", "Fri", "Sat", "Sun", "Mon", "Tue", "Wed"]; // 1970-01-01 was a Thursday
    const MONTHS: [&str; 12] = [
        "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
    ];

    let days_since_epoch = secs / 86_400;
    let day_of_week = DAYS[(days_since_epoch % 7) as usize];
    let rem = secs % 86_400;
    let hour = rem / 3600;
    let minute = (rem % 3600) / 60;
    let second = rem % 60;

    let (year, month, day) = civil_from_days(days_since_epoch as i64);

    format!(
        "{}, {:02} {} {} {:02}:{:02}:{:02} GMT",
        day_of_week,
        day,
        MONTHS[(month - 1) as usize],
        year,
        hour,
        minute,
        second
    )
}

/// Howard Hinnant's civil_from_days algorithm: days-since-epoch -> (y, m, d).
fn civil_from_days(z: i64) -> (i64, u32, u32) {
    let z = z + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = (z - era * 146_097) as u64;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let m = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    (if m <= 2 { y + 1 } else { y }, m, d)
}

pub fn handle_error(code: u16, s_cfg: Option<&Arc<ServerConfig>>) -> HttpResponse {
    handle_error_for_route(code, s_cfg, None)
}

/// Most-specific error page wins (spec.md §4.H): the matched location's own
/// `error_pages` map, then the virtual server's, then the built-in template.
pub fn handle_error_for_route(
    code: u16,
    s_cfg: Option<&Arc<ServerConfig>>,
    r_cfg: Option<&RouteConfig>,
) -> HttpResponse {
    let status_text = HttpResponse::status_text(code);
    let mut res = HttpResponse::new(code, &status_text);

    if let Some(cfg) = s_cfg {
        let root = r_cfg.map(|r| r.root.as_str()).unwrap_or(&cfg.root);
        let path_str = r_cfg
            .and_then(|r| r.error_pages.get(&code))
            .or_else(|| cfg.error_pages.get(&code));

        if let Some(path_str) = path_str {
            let s_root = std::path::Path::new(root);
            let err_path = s_root.join(path_str.trim_start_matches('/'));
            if let Ok(content) = fs::read(err_path) {
                res.set_body(content, "text/html");
                return res;
            }
        }
    }

    let body = format!("{} {}", code, status_text).into_bytes();
    res.set_body(body, "text/plain");
    res
}
