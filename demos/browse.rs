//! Lists a remote directory over SFTP.
//!
//! ```text
//! SFTP_HOST=localhost SFTP_USER=root SFTP_PASSWORD=pass \
//!     RUST_LOG=debug cargo run --example browse -- /srv
//! ```

use sftp_gateway::{Credentials, GatewayConfig, RemoteSession, SshConnector};
use std::env;

fn var(name: &str) -> anyhow::Result<String> {
    env::var(name).map_err(|_| anyhow::anyhow!("{name} must be set"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = GatewayConfig::from_env()?;
    let port = match env::var("SFTP_PORT") {
        Ok(port) => port.parse()?,
        Err(_) => config.default_port,
    };
    let credentials = Credentials::new(
        var("SFTP_HOST")?,
        port,
        var("SFTP_USER")?,
        var("SFTP_PASSWORD")?,
    );
    let path = env::args().nth(1).unwrap_or_else(|| "/".to_owned());

    let session = RemoteSession::connect(&SshConnector, credentials, &config.session).await?;

    for entry in session.list(&path).await? {
        let info = session.stat(&entry.path).await?;
        let modified = info
            .modified()
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        println!(
            "{}{:>10} {modified:>16} {}",
            if entry.is_dir { "d" } else { "-" },
            entry.size,
            entry.name
        );
    }

    session.disconnect().await;
    Ok(())
}
