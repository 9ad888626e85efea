pub use crate::prelude::*;

pub fn handle_get(
    request: &HttpRequest,
    r_cfg: &RouteConfig,
    s_cfg: &Arc<ServerConfig>,
) -> (HttpResponse, ActiveAction) {
    let root = &r_cfg.root;
    let relative_path = request
        .url
        .split('?')
        .next()
        .unwrap_or(&request.url)
        .strip_prefix(&r_cfg.path)
        .unwrap_or(&request.url);
    let mut path = PathBuf::from(root);
    path.push(relative_path.trim_start_matches('/'));

    if path.is_dir() {
        // spec.md §4.H: iterate index_pages and serve the first file that exists.
        let index_candidate = r_cfg
            .index_pages
            .iter()
            .map(|name| path.join(name))
            .find(|candidate| candidate.is_file());

        match index_candidate {
            Some(candidate) => path = candidate,
            None if r_cfg.autoindex => {
                return (generate_autoindex(&path, &request.url), ActiveAction::None);
            }
            None => {
                let mut res = HttpResponse::new(HTTP_FORBIDDEN, "Forbidden");
                res.set_body(
                    b"403 Forbidden: Directory listing denied".to_vec(),
                    "text/plain",
                );
                return (res, ActiveAction::None);
            }
        }
    }

    match File::open(&path) {
        Ok(file) => {
            let Ok(metadata) = file.metadata() else {
                return (
                    handle_error_for_route(HTTP_INTERNAL_SERVER_ERROR, Some(s_cfg), Some(r_cfg)),
                    ActiveAction::None,
                );
            };
            let file_size = metadata.size() as usize;
            let mime_type = get_mime_type(path.extension().and_then(|s| s.to_str()));

            let mut res = HttpResponse::new(HTTP_OK, &HttpResponse::status_text(HTTP_OK));
            res.headers
                .insert("Content-Length".to_string(), file_size.to_string());
            res.headers
                .insert("Content-Type".to_string(), mime_type.to_string());

            (res, ActiveAction::FileDownload(file, file_size))
        }
        Err(e) => {
            let res = match e.kind() {
                std::io::ErrorKind::NotFound => {
                    handle_error_for_route(HTTP_NOT_FOUND, Some(s_cfg), Some(r_cfg))
                }
                std::io::ErrorKind::PermissionDenied => {
                    handle_error_for_route(HTTP_FORBIDDEN, Some(s_cfg), Some(r_cfg))
                }
                _ => handle_error_for_route(HTTP_INTERNAL_SERVER_ERROR, Some(s_cfg), Some(r_cfg)),
            };
            (res, ActiveAction::None)
        }
    }
}
