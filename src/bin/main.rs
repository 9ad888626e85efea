use mio::Poll;
use proxy_log::errors;
use server_proxy::config::FromYaml;
use server_proxy::{
    config::AppConfig, config::display_config, error::Result, server::Server, signals,
};

fn main() -> Result<()> {
    if let Err(e) = signals::install() {
        errors!("failed to install signal dispositions: {}", e);
    }

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.yaml".to_string());
    let content = std::fs::read_to_string(&config_path)?;
    let config = AppConfig::from_str(&content)?;

    display_config(&config.servers);

    let poll = Poll::new()?;
    let mut server = Server::new(config, &poll)?;

    server.run(poll)
}
