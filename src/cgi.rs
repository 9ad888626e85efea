use crate::prelude::*;

#[derive(Debug, PartialEq)]
pub enum CgiParsingState {
    ReadHeaders,
    StreamBody,
    StreamBodyChuncked,
}

const CGI_HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "transfer-encoding",
    "upgrade",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailers",
];

pub fn parse_cgi_headers(bytes: &[u8]) -> (u16, Vec<(String, String)>) {
    let mut status = None;
    let mut headers = Vec::new();
    let content = String::from_utf8_lossy(bytes);

    for line in content.lines() {
        if let Some((key, val)) = line.split_once(':') {
            let key = key.trim().to_lowercase();
            let val = val.trim().to_string();

            if key == "status" {
                status = val.split_whitespace().next().and_then(|s| s.parse().ok());
            } else if !CGI_HOP_BY_HOP_HEADERS.contains(&key.as_str()) {
                headers.push((key, val));
            }
        }
    }

    // A bare Location header with no explicit Status is a local redirect: CGI/1.1 says
    // the server turns this into a 302 on the script's behalf.
    let status = status.unwrap_or_else(|| {
        if headers.iter().any(|(k, _)| k == "location") {
            HTTP_FOUND
        } else {
            HTTP_OK
        }
    });

    (status, headers)
}

pub fn handle_cgi_event(
    poll: &Poll,
    event: &Event,
    cgi_token: Token,
    client_token: Token,
    conn: &mut HttpConnection,
    cgi_to_client: &mut HashMap<Token, Token>,
) -> Result<()> {
    if let ActiveAction::Cgi {
        out_stream,
        in_stream,
        child,
        parse_state,
        header_buf,
        ..
    } = &mut conn.action
    {
        // SCRIPT -> SERVER (Stdout)
        if event.is_readable() && Some(cgi_token) == conn.cgi_out_token {
            let mut buf = [0u8; 4096];
            match out_stream.read(&mut buf) {
                Ok(0) => {
                    if *parse_state == CgiParsingState::StreamBodyChuncked {
                        trace!("cgi stdout eof, closing chunked body");
                        conn.write_buffer.extend_from_slice(b"0\r\n\r\n");
                        poll.registry().reregister(
                            &mut conn.stream,
                            client_token,
                            Interest::READABLE | Interest::WRITABLE,
                        )?;
                    }
                    conn.cgi_out_token = None;
                    conn.cgi_in_token = None;
                    // conn.action = ActiveAction::None;
                    // conn.closed = true;
                }
                Ok(n) => {
                    trace!("read {} bytes from cgi stdout", n);

                    process_cgi_stdout(
                        parse_state,
                        header_buf,
                        &mut conn.write_buffer,
                        &buf[..n],
                        conn.close_after_response,
                    )?;

                    poll.registry().reregister(
                        &mut conn.stream,
                        client_token,
                        Interest::READABLE | Interest::WRITABLE,
                    )?;
                }
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => {}
                Err(_) => conn.closed = true,
            }
        }

        // SERVER -> SCRIPT (Stdin)
        if event.is_writable() && Some(cgi_token) == conn.cgi_in_token {
            if !conn.cgi_buffer.is_empty() {
                if let Some(pipe) = in_stream {
                    match pipe.write(&conn.cgi_buffer) {
                        Ok(n) => {
                            trace!("wrote {} bytes to cgi stdin", n);
                            conn.cgi_buffer.drain(..n);

                            if conn.cgi_buffer.len() < 65536 {
                                poll.registry().reregister(
                                    &mut conn.stream,
                                    client_token,
                                    Interest::READABLE | Interest::WRITABLE,
                                )?;
                            }

                            if conn.body_remaining == 0 && conn.cgi_buffer.is_empty() {
                                conn.cgi_in_token = None;
                                trace!("CGI stdin pipe closed (EOF sent)");
                            }
                        }
                        Err(e) if e.kind() != ErrorKind::WouldBlock => {}
                        Err(_) => conn.closed = true,
                    }
                }
            }
        }

        // Child process status check
        match child.try_wait() {
            Ok(Some(_status)) => {
                if let ActiveAction::Cgi { in_stream, .. } = &mut conn.action {
                    if conn.body_remaining == 0 && conn.cgi_buffer.is_empty() {
                        if let Some(pipe) = in_stream.take() {
                            trace!("cgi child reaped, closing stdin pipe");
                            drop(pipe);
                            conn.cgi_in_token = None;
                        }
                    }
                }

                cleanup_cgi(cgi_to_client, conn);
                conn.action = ActiveAction::None;
            }
            Ok(None) => {}
            Err(_) => conn.closed = true,
        }
    }
    Ok(())
}

pub fn build_cgi_env(conn: &mut HttpConnection) -> HashMap<String, String> {
    let req = &conn.request;
    let mut envs = HashMap::new();

    let (path_info, query_string) = match req.url.split_once('?') {
        Some((p, q)) => (p.to_string(), q.to_string()),
        None => (req.url.clone(), String::new()),
    };

    envs.insert("GATEWAY_INTERFACE".to_string(), "CGI/1.1".to_string());
    envs.insert("SERVER_PROTOCOL".to_string(), "HTTP/1.1".to_string());
    envs.insert("REQUEST_METHOD".to_string(), req.method.to_string());
    envs.insert("QUERY_STRING".to_string(), query_string);
    envs.insert("PATH_INFO".to_string(), path_info.clone());
    envs.insert("SCRIPT_NAME".to_string(), path_info);

    let server_name = conn
        .s_cfg
        .as_ref()
        .map(|cfg| cfg.server_name.clone())
        .unwrap_or_else(|| "_".to_string());
    envs.insert("SERVER_NAME".to_string(), server_name);
    if let Ok(addr) = conn.stream.peer_addr() {
        envs.insert("REMOTE_ADDR".to_string(), addr.ip().to_string());
        envs.insert("REMOTE_PORT".to_string(), addr.port().to_string());
    }

    if let Some(ct) = req.headers.get("content-type") {
        envs.insert("CONTENT_TYPE".to_string(), ct.clone());
    }
    if let Some(cl) = req.headers.get("content-length") {
        envs.insert("CONTENT_LENGTH".to_string(), cl.clone());
    }

    for (k, v) in req.headers.iter().chain(&req.trailers) {
        if k == "content-type" || k == "content-length" {
            continue;
        }
        let env_key = format!("HTTP_{}", k.to_uppercase().replace('-', "_"));
        envs.insert(env_key, v.clone());
    }

    envs
}

pub fn process_cgi_stdout(
    parse_state: &mut CgiParsingState,
    header_buf: &mut Vec<u8>,
    write_buffer: &mut Vec<u8>,
    new_data: &[u8],
    close_after_response: bool,
) -> Result<()> {
    match parse_state {
        CgiParsingState::ReadHeaders => {
            header_buf.extend_from_slice(new_data);

            if let Some(pos) = find_subsequence(header_buf, b"\r\n\r\n", 0)
                .or_else(|| find_subsequence(header_buf, b"\n\n", 0))
            {
                let is_crlf = header_buf.contains(&b'\r');
                let delimiter_len = if is_crlf { 4 } else { 2 };

                let header_bytes = header_buf[..pos].to_vec();
                let body_start = header_buf[pos + delimiter_len..].to_vec();

                let (status, cgi_headers) = parse_cgi_headers(&header_bytes);
                let mut res = HttpResponse::new(status, &HttpResponse::status_text(status));

                res.headers.remove("Content-Length");

                for (k, v) in cgi_headers {
                    res.set_header(&k, &v);
                }

                let is_chunked = !res.headers.contains_key("content-length");
                if is_chunked {
                    res.set_header("transfer-encoding", "chunked");
                    *parse_state = CgiParsingState::StreamBodyChuncked;
                } else {
                    *parse_state = CgiParsingState::StreamBody;
                }

                finalize_response_headers(&mut res, close_after_response);
                write_buffer.extend_from_slice(&res.to_bytes_headers_only());

                if !body_start.is_empty() {
                    push_cgi_data(write_buffer, &body_start, is_chunked);
                }
            }
        }
        CgiParsingState::StreamBody => {
            write_buffer.extend_from_slice(new_data);
        }
        CgiParsingState::StreamBodyChuncked => {
            push_cgi_data(write_buffer, new_data, true);
        }
    }
    Ok(())
}

fn push_cgi_data(write_buffer: &mut Vec<u8>, data: &[u8], chunked: bool) {
    if chunked {
        let header = format!("{:X}\r\n", data.len());
        write_buffer.extend_from_slice(header.as_bytes());
        write_buffer.extend_from_slice(data);
        write_buffer.extend_from_slice(b"\r\n");
    } else {
        write_buffer.extend_from_slice(data);
    }
}

pub fn cleanup_cgi(cgi_to_client: &mut HashMap<Token, Token>, conn: &mut HttpConnection) {
    if let Some(t) = conn.cgi_out_token.take() {
        cgi_to_client.remove(&t);
    }
    if let Some(t) = conn.cgi_in_token.take() {
        cgi_to_client.remove(&t);
    }
}

/// Staged CGI deadline: past TIMEOUT_CGI we ask the script to exit (SIGTERM);
/// past TIMEOUT_CGI + CGI_KILL_GRACE with no reap we finish it off (SIGKILL).
pub fn check_time_out_cgi(
    connections: &mut HashMap<Token, HttpConnection>,
    poll: &Poll,
    cgi_to_client: &mut HashMap<Token, Token>,
) {
    for (token, conn) in connections.iter_mut() {
        let elapsed = match &conn.action {
            ActiveAction::Cgi { start_time, .. } => start_time.elapsed().as_secs(),
            _ => continue,
        };

        if elapsed > TIMEOUT_CGI + CGI_KILL_GRACE {
            errors!("cgi process ignored SIGTERM, sending SIGKILL");
            force_cgi_timeout(conn, cgi_to_client);
            poll.registry()
                .reregister(&mut conn.stream, *token, Interest::WRITABLE)
                .ok();
        } else if elapsed > TIMEOUT_CGI {
            send_cgi_sigterm(conn);
        }
    }
}

fn send_cgi_sigterm(conn: &HttpConnection) {
    if let ActiveAction::Cgi { child, .. } = &conn.action {
        let pid = nix::unistd::Pid::from_raw(child.id() as i32);
        let _ = nix::sys::signal::kill(pid, nix::sys::signal::Signal::SIGTERM);
    }
}

pub fn force_cgi_timeout(conn: &mut HttpConnection, cgi_to_client: &mut HashMap<Token, Token>) {
    if let ActiveAction::Cgi { ref mut child, .. } = conn.action {
        // SIGTERM was already sent by send_cgi_sigterm; this is the final SIGKILL stage.
        let _ = child.kill();
        let _ = child.try_wait();

        if let ActiveAction::Cgi { parse_state, .. } = &conn.action {
            if *parse_state == CgiParsingState::StreamBodyChuncked {
                let end_marker = "0\r\n\r\n";
                conn.write_buffer.extend_from_slice(end_marker.as_bytes());
            } else {
                let mut error_res = handle_error(GATEWAY_TIMEOUT, conn.s_cfg.as_ref());
                finalize_response_headers(&mut error_res, true);
                conn.write_buffer.clear();
                conn.write_buffer.extend_from_slice(&error_res.to_bytes());
            }
        }

        conn.cgi_in_token = None;
        conn.cgi_out_token = None;
        conn.cgi_buffer.clear();
        conn.closed = true; // Flag for removal after write

        cleanup_cgi(cgi_to_client, conn);
        conn.action = ActiveAction::None;
    }
}
