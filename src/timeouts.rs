use crate::prelude::*;

pub fn process(server: &mut Server, poll: &Poll) {
    let now = Instant::now();

    let Server {
        connections,
        cgi_to_client,
        ..
    } = server;

    connections.retain(|token, conn| {
        if now.duration_since(conn.last_activity) > CLIENT_TIMEOUT {
            cleanup_connection(conn, poll);
            force_cgi_timeout(conn, cgi_to_client);
            return false;
        }
        true
    });

    check_time_out_cgi(connections, poll, cgi_to_client);

    if server.session_store.last_cleanup.elapsed() > Duration::from_secs(CLEAN_UP) {
        server.session_store.cleanup();
    }
}

fn cleanup_connection(conn: &mut HttpConnection, poll: &Poll) {
    let _ = poll.registry().deregister(&mut conn.stream);
    let _ = conn.stream.shutdown(Shutdown::Both);
}
