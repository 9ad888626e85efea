#[cfg(test)]
mod integration_tests {
    use mio::Poll;
    use server_proxy::config::{AppConfig, RouteConfig, ServerConfig};
    use server_proxy::http::Method;
    use server_proxy::server::Server;
    use std::io::{Read, Write};
    use std::net::TcpStream;
    use std::time::Duration;
    use std::{fs, thread};

    fn start_server(port: u16, test_root: &str, routes: Vec<RouteConfig>) {
        let mut config = AppConfig::default();
        let server_cfg = ServerConfig {
            server_name: "localhost".to_string(),
            ports: vec![port],
            root: test_root.to_string(),
            routes,
            default_server: true,
            client_max_body_size: 1024 * 1024,
            ..Default::default()
        };
        config.servers.push(server_cfg);

        thread::spawn(move || {
            let poll = Poll::new().unwrap();
            let mut server = Server::new(config, &poll).unwrap();
            server.run(poll).unwrap();
        });

        thread::sleep(Duration::from_millis(300));
    }

    fn connect(port: u16) -> TcpStream {
        let stream = TcpStream::connect(("127.0.0.1", port)).expect("connect failed");
        stream
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        stream
    }

    #[test]
    fn test_simple_get_request() {
        let test_root = "./tmp_http_get_test";
        let _ = fs::remove_dir_all(test_root);
        fs::create_dir_all(test_root).unwrap();
        fs::write(format!("{}/index.html", test_root), "Hello Rust").unwrap();

        let mut route = RouteConfig::default();
        route.path = "/".to_string();
        route.root = test_root.to_string();
        route.methods = vec![Method::GET.to_string()];

        start_server(8090, test_root, vec![route]);

        let mut stream = connect(8090);
        stream
            .write_all(b"GET /index.html HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .unwrap();

        let mut buffer = [0u8; 4096];
        let n = stream.read(&mut buffer).unwrap();
        let response = String::from_utf8_lossy(&buffer[..n]);

        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response.contains("Content-Type: text/html"));
        assert!(response.ends_with("Hello Rust"));

        let _ = fs::remove_dir_all(test_root);
    }

    #[test]
    fn test_not_found() {
        let test_root = "./tmp_http_404_test";
        let _ = fs::remove_dir_all(test_root);
        fs::create_dir_all(test_root).unwrap();

        let mut route = RouteConfig::default();
        route.path = "/".to_string();
        route.root = test_root.to_string();
        route.methods = vec![Method::GET.to_string()];

        start_server(8091, test_root, vec![route]);

        let mut stream = connect(8091);
        stream
            .write_all(b"GET /missing.html HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .unwrap();

        let mut buffer = [0u8; 4096];
        let n = stream.read(&mut buffer).unwrap();
        let response = String::from_utf8_lossy(&buffer[..n]);

        assert!(response.starts_with("HTTP/1.1 404"));

        let _ = fs::remove_dir_all(test_root);
    }

    #[test]
    fn test_method_not_allowed() {
        let test_root = "./tmp_http_405_test";
        let _ = fs::remove_dir_all(test_root);
        fs::create_dir_all(test_root).unwrap();
        fs::write(format!("{}/index.html", test_root), "hi").unwrap();

        let mut route = RouteConfig::default();
        route.path = "/".to_string();
        route.root = test_root.to_string();
        route.methods = vec![Method::GET.to_string()];

        start_server(8092, test_root, vec![route]);

        let mut stream = connect(8092);
        stream
            .write_all(b"DELETE /index.html HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .unwrap();

        let mut buffer = [0u8; 4096];
        let n = stream.read(&mut buffer).unwrap();
        let response = String::from_utf8_lossy(&buffer[..n]);

        assert!(response.starts_with("HTTP/1.1 405"));

        let _ = fs::remove_dir_all(test_root);
    }

    #[test]
    fn test_fragmented_request_line_and_headers() {
        let test_root = "./tmp_http_frag_test";
        let _ = fs::remove_dir_all(test_root);
        fs::create_dir_all(test_root).unwrap();
        fs::write(format!("{}/index.html", test_root), "fragmented ok").unwrap();

        let mut route = RouteConfig::default();
        route.path = "/".to_string();
        route.root = test_root.to_string();
        route.methods = vec![Method::GET.to_string()];

        start_server(8093, test_root, vec![route]);

        let mut stream = connect(8093);

        // Split the request across several writes, with delays, to exercise
        // the incremental parser instead of handing it one complete buffer.
        stream.write_all(b"GET /index").unwrap();
        thread::sleep(Duration::from_millis(50));
        stream.write_all(b".html HTTP/1.1\r\n").unwrap();
        thread::sleep(Duration::from_millis(50));
        stream.write_all(b"Host: loc").unwrap();
        thread::sleep(Duration::from_millis(50));
        stream.write_all(b"alhost\r\n\r\n").unwrap();

        let mut buffer = [0u8; 4096];
        let n = stream.read(&mut buffer).unwrap();
        let response = String::from_utf8_lossy(&buffer[..n]);

        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response.ends_with("fragmented ok"));

        let _ = fs::remove_dir_all(test_root);
    }

    #[test]
    fn test_post_request_with_fixed_length_body() {
        let test_root = "./tmp_http_post_test";
        let upload_dir = "./tmp_http_post_test/uploads";
        let _ = fs::remove_dir_all(test_root);
        fs::create_dir_all(upload_dir).unwrap();

        let mut route = RouteConfig::default();
        route.path = "/upload".to_string();
        route.root = test_root.to_string();
        route.upload_dir = "uploads".to_string();
        route.methods = vec![Method::POST.to_string()];

        start_server(8094, test_root, vec![route]);

        let mut stream = connect(8094);
        let body = "Hello, World!";
        let request = format!(
            "POST /upload/test.txt HTTP/1.1\r\nHost: localhost\r\nContent-Length: {}\r\n\r\n{}",
            body.len(),
            body
        );
        stream.write_all(request.as_bytes()).unwrap();

        let mut buffer = [0u8; 4096];
        let n = stream.read(&mut buffer).unwrap();
        let response = String::from_utf8_lossy(&buffer[..n]);

        assert!(response.contains("201 Created") || response.contains("200 OK"));

        let mut found = false;
        for entry in fs::read_dir(upload_dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_file() && fs::read_to_string(&path).unwrap() == body {
                found = true;
            }
        }
        assert!(found, "uploaded body was not written to disk");

        let _ = fs::remove_dir_all(test_root);
    }

    #[test]
    fn test_keep_alive_then_connection_close() {
        let test_root = "./tmp_http_close_test";
        let _ = fs::remove_dir_all(test_root);
        fs::create_dir_all(test_root).unwrap();
        fs::write(format!("{}/index.html", test_root), "ok").unwrap();

        let mut route = RouteConfig::default();
        route.path = "/".to_string();
        route.root = test_root.to_string();
        route.methods = vec![Method::GET.to_string()];

        start_server(8095, test_root, vec![route]);

        let mut stream = connect(8095);
        stream
            .write_all(b"GET /index.html HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .unwrap();

        let mut buffer = [0u8; 4096];
        let n = stream.read(&mut buffer).unwrap();
        let response = String::from_utf8_lossy(&buffer[..n]);
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response.to_lowercase().contains("connection: keep-alive"));
        assert!(response.contains("Date:"));

        // Second request on the same connection asks for close explicitly.
        stream
            .write_all(b"GET /index.html HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .unwrap();
        let n = stream.read(&mut buffer).unwrap();
        let response = String::from_utf8_lossy(&buffer[..n]);
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response.to_lowercase().contains("connection: close"));

        // The server must now actually close the socket: a further read hits EOF.
        let n = stream.read(&mut buffer).unwrap_or(0);
        assert_eq!(n, 0, "connection should be closed after Connection: close");

        let _ = fs::remove_dir_all(test_root);
    }

    #[test]
    fn test_missing_host_header_is_bad_request() {
        let test_root = "./tmp_http_missing_host_test";
        let _ = fs::remove_dir_all(test_root);
        fs::create_dir_all(test_root).unwrap();

        let mut route = RouteConfig::default();
        route.path = "/".to_string();
        route.root = test_root.to_string();
        route.methods = vec![Method::GET.to_string()];

        start_server(8096, test_root, vec![route]);

        let mut stream = connect(8096);
        stream.write_all(b"GET / HTTP/1.1\r\n\r\n").unwrap();

        let mut buffer = [0u8; 4096];
        let n = stream.read(&mut buffer).unwrap();
        let response = String::from_utf8_lossy(&buffer[..n]);
        assert!(response.starts_with("HTTP/1.1 400"));

        let _ = fs::remove_dir_all(test_root);
    }

    #[test]
    fn test_unknown_method_is_not_implemented() {
        let test_root = "./tmp_http_unknown_method_test";
        let _ = fs::remove_dir_all(test_root);
        fs::create_dir_all(test_root).unwrap();

        let mut route = RouteConfig::default();
        route.path = "/".to_string();
        route.root = test_root.to_string();
        route.methods = vec![Method::GET.to_string()];

        start_server(8097, test_root, vec![route]);

        let mut stream = connect(8097);
        stream
            .write_all(b"FROBNICATE / HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .unwrap();

        let mut buffer = [0u8; 4096];
        let n = stream.read(&mut buffer).unwrap();
        let response = String::from_utf8_lossy(&buffer[..n]);
        assert!(response.starts_with("HTTP/1.1 501"));

        let _ = fs::remove_dir_all(test_root);
    }

    #[test]
    fn test_method_not_allowed_carries_allow_header() {
        let test_root = "./tmp_http_allow_header_test";
        let _ = fs::remove_dir_all(test_root);
        fs::create_dir_all(test_root).unwrap();
        fs::write(format!("{}/index.html", test_root), "hi").unwrap();

        let mut route = RouteConfig::default();
        route.path = "/".to_string();
        route.root = test_root.to_string();
        route.methods = vec![Method::GET.to_string()];

        start_server(8098, test_root, vec![route]);

        let mut stream = connect(8098);
        stream
            .write_all(b"DELETE /index.html HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .unwrap();

        let mut buffer = [0u8; 4096];
        let n = stream.read(&mut buffer).unwrap();
        let response = String::from_utf8_lossy(&buffer[..n]);
        assert!(response.starts_with("HTTP/1.1 405"));
        assert!(response.contains("Allow:"));
        assert!(response.contains("GET"));

        let _ = fs::remove_dir_all(test_root);
    }

    #[test]
    fn test_oversized_target_is_uri_too_long() {
        let test_root = "./tmp_http_uri_too_long_test";
        let _ = fs::remove_dir_all(test_root);
        fs::create_dir_all(test_root).unwrap();

        let mut route = RouteConfig::default();
        route.path = "/".to_string();
        route.root = test_root.to_string();
        route.methods = vec![Method::GET.to_string()];

        start_server(8099, test_root, vec![route]);

        let mut stream = connect(8099);
        let long_target = "/".to_string() + &"a".repeat(9 * 1024);
        let request = format!("GET {} HTTP/1.1\r\nHost: localhost\r\n\r\n", long_target);
        stream.write_all(request.as_bytes()).unwrap();

        let mut buffer = [0u8; 4096];
        let n = stream.read(&mut buffer).unwrap();
        let response = String::from_utf8_lossy(&buffer[..n]);
        assert!(response.starts_with("HTTP/1.1 414"));

        let _ = fs::remove_dir_all(test_root);
    }

    #[test]
    fn test_unsupported_version_rejected() {
        let test_root = "./tmp_http_bad_version_test";
        let _ = fs::remove_dir_all(test_root);
        fs::create_dir_all(test_root).unwrap();

        let mut route = RouteConfig::default();
        route.path = "/".to_string();
        route.root = test_root.to_string();
        route.methods = vec![Method::GET.to_string()];

        start_server(8100, test_root, vec![route]);

        let mut stream = connect(8100);
        stream
            .write_all(b"GET / HTTP/2.0\r\nHost: localhost\r\n\r\n")
            .unwrap();

        let mut buffer = [0u8; 4096];
        let n = stream.read(&mut buffer).unwrap();
        let response = String::from_utf8_lossy(&buffer[..n]);
        assert!(response.starts_with("HTTP/1.1 505"));

        let _ = fs::remove_dir_all(test_root);
    }

    #[test]
    fn test_conflicting_content_length_and_chunked_is_bad_request() {
        let test_root = "./tmp_http_conflict_framing_test";
        let _ = fs::remove_dir_all(test_root);
        fs::create_dir_all(test_root).unwrap();

        let mut route = RouteConfig::default();
        route.path = "/".to_string();
        route.root = test_root.to_string();
        route.methods = vec![Method::POST.to_string()];

        start_server(8101, test_root, vec![route]);

        let mut stream = connect(8101);
        stream
            .write_all(
                b"POST / HTTP/1.1\r\nHost: localhost\r\nContent-Length: 5\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhello\r\n0\r\n\r\n",
            )
            .unwrap();

        let mut buffer = [0u8; 4096];
        let n = stream.read(&mut buffer).unwrap();
        let response = String::from_utf8_lossy(&buffer[..n]);
        assert!(response.starts_with("HTTP/1.1 400"));

        let _ = fs::remove_dir_all(test_root);
    }
}
