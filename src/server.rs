use crate::config::validate_configs;
use crate::prelude::*;
use std::process::Child;

const POLL_TIMEOUT: Duration = Duration::from_millis(250);
const SESSION_TTL: u64 = 3600;

/// Owns every listening socket, every live client connection, and the CGI
/// plumbing tying subprocess pipes back to the connection that spawned them.
pub struct Server {
    pub listeners: HashMap<Token, TcpListener>,
    pub listener_configs: HashMap<Token, Vec<Arc<ServerConfig>>>,
    pub connections: HashMap<Token, HttpConnection>,
    pub cgi_to_client: HashMap<Token, Token>,
    pub zombie_purgatory: Vec<Child>,
    pub session_store: SessionStore,
    next_token: usize,
}

impl Server {
    pub fn new(config: AppConfig, poll: &Poll) -> Result<Server> {
        let servers = validate_configs(config.servers);

        // Virtual hosts sharing a host:port bind to a single listener; the
        // connection picks between them later via the Host header.
        let mut grouped: HashMap<(String, u16), Vec<Arc<ServerConfig>>> = HashMap::new();
        for server in servers {
            let server = Arc::new(server);
            for port in server.ports.clone() {
                grouped
                    .entry((server.host.clone(), port))
                    .or_default()
                    .push(Arc::clone(&server));
            }
        }

        let mut listeners = HashMap::new();
        let mut listener_configs = HashMap::new();
        let mut next_token = 0usize;

        for ((host, port), configs) in grouped {
            let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
            let mut listener = TcpListener::bind(addr)?;

            let token = Token(next_token);
            next_token += 1;

            poll.registry()
                .register(&mut listener, token, Interest::READABLE)?;

            info!(
                "listening on {} ({} virtual server(s))",
                addr,
                configs.len()
            );

            listeners.insert(token, listener);
            listener_configs.insert(token, configs);
        }

        Ok(Server {
            listeners,
            listener_configs,
            connections: HashMap::new(),
            cgi_to_client: HashMap::new(),
            zombie_purgatory: Vec::new(),
            session_store: SessionStore::new(SESSION_TTL),
            next_token,
        })
    }

    pub fn run(&mut self, mut poll: Poll) -> Result<()> {
        let mut events = Events::with_capacity(1024);

        loop {
            if crate::signals::shutdown_requested() {
                info!("shutdown signal received, draining and exiting");
                break;
            }

            match poll.poll(&mut events, Some(POLL_TIMEOUT)) {
                Ok(()) => {}
                Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }

            for event in events.iter() {
                let token = event.token();

                if self.listeners.contains_key(&token) {
                    self.accept_connections(token, &poll)?;
                    continue;
                }

                if let Some(&client_token) = self.cgi_to_client.get(&token) {
                    self.dispatch_cgi_event(&poll, event, token, client_token)?;
                    continue;
                }

                self.dispatch_client_event(&poll, event, token)?;
            }

            if crate::signals::take_child_exited() {
                trace!("sigchld observed, sweeping zombie purgatory");
            }

            timeouts::process(self, &poll);
            self.reap_zombies();
        }

        Ok(())
    }

    fn accept_connections(&mut self, listener_token: Token, poll: &Poll) -> Result<()> {
        let Some(configs) = self.listener_configs.get(&listener_token).cloned() else {
            return Ok(());
        };

        loop {
            let Some(listener) = self.listeners.get_mut(&listener_token) else {
                break;
            };

            match listener.accept() {
                Ok((mut stream, addr)) => {
                    trace!("accepted connection from {}", addr);

                    let token = Token(self.next_token);
                    self.next_token += 1;

                    poll.registry()
                        .register(&mut stream, token, Interest::READABLE)?;

                    self.connections
                        .insert(token, HttpConnection::new(stream, configs.clone()));
                }
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(_) => break,
            }
        }

        Ok(())
    }

    fn dispatch_client_event(&mut self, poll: &Poll, event: &Event, token: Token) -> Result<()> {
        let should_close = {
            let Server {
                connections,
                cgi_to_client,
                session_store,
                next_token,
                ..
            } = self;

            match connections.get_mut(&token) {
                Some(conn) => {
                    conn.touch();

                    if event.is_readable() {
                        HttpConnection::handle_read_phase(
                            conn,
                            poll,
                            token,
                            next_token,
                            cgi_to_client,
                            session_store,
                        )?;
                    }

                    if !conn.closed && event.is_writable() {
                        HttpConnection::handle_write_phase(
                            conn,
                            poll,
                            token,
                            next_token,
                            cgi_to_client,
                            session_store,
                        )?;
                    }

                    conn.should_close()
                }
                None => false,
            }
        };

        if should_close {
            HttpConnection::terminate_connection(self, token);
        }

        Ok(())
    }

    fn dispatch_cgi_event(
        &mut self,
        poll: &Poll,
        event: &Event,
        cgi_token: Token,
        client_token: Token,
    ) -> Result<()> {
        let should_close = {
            let Server {
                connections,
                cgi_to_client,
                ..
            } = self;

            match connections.get_mut(&client_token) {
                Some(conn) => {
                    crate::cgi::handle_cgi_event(
                        poll,
                        event,
                        cgi_token,
                        client_token,
                        conn,
                        cgi_to_client,
                    )?;
                    conn.should_close()
                }
                None => false,
            }
        };

        if should_close {
            HttpConnection::terminate_connection(self, client_token);
        }

        Ok(())
    }

    fn reap_zombies(&mut self) {
        self.zombie_purgatory
            .retain_mut(|child| matches!(child.try_wait(), Ok(None)));
    }
}
