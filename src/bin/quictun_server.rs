//! quictun server binary.
//!
//! Usage: quictun_server [-l <quic_listen_addr>] [-cert <file>] [-key <file>]
//!                       [-auth <user:pass>]
//!
//! Listens for QUIC connections, answers the HTTP/2 upgrade request on the
//! configured secret path and serves upgraded sessions with the quictun
//! protocol. A production deployment would embed the upgrade route into an
//! existing web server instead.

use std::env;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use quictun::h2::upgrade::UpgradeRegistry;
use quictun::server::gateway::{Gateway, GatewayResponse};
use quictun::server::{Server, ServerConfig};
use quictun::PROTOCOL_IDENTIFIER;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing — respects RUST_LOG env var (e.g. RUST_LOG=debug)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args: Vec<String> = env::args().collect();
    let mut config = ServerConfig::new("localhost:6121");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_usage(&args[0]);
                return Ok(());
            }
            "-l" => {
                i += 1;
                match args.get(i) {
                    Some(addr) => config.listen_addr = addr.clone(),
                    None => {
                        eprintln!("Error: -l requires a listen address");
                        process::exit(2);
                    }
                }
            }
            "-cert" => {
                i += 1;
                match args.get(i) {
                    Some(path) => config.cert_path = PathBuf::from(path),
                    None => {
                        eprintln!("Error: -cert requires a file path");
                        process::exit(2);
                    }
                }
            }
            "-key" => {
                i += 1;
                match args.get(i) {
                    Some(path) => config.key_path = PathBuf::from(path),
                    None => {
                        eprintln!("Error: -key requires a file path");
                        process::exit(2);
                    }
                }
            }
            "-auth" => {
                i += 1;
                match args.get(i).and_then(|v| v.split_once(':')) {
                    Some((user, pass)) => {
                        config.credentials = Some((user.to_string(), pass.to_string()));
                    }
                    None => {
                        eprintln!("Error: -auth requires user:pass");
                        process::exit(2);
                    }
                }
            }
            arg => {
                eprintln!("Unknown option: {arg}");
                print_usage(&args[0]);
                process::exit(2);
            }
        }
        i += 1;
    }

    config.validate()?;

    let server = Arc::new(Server::new(config.dial_timeout, config.cache_size));

    // Register the upgrade handler for the quictun protocol
    let mut registry = UpgradeRegistry::new();
    let quictun_server = Arc::clone(&server);
    registry.register(PROTOCOL_IDENTIFIER, move |connection| {
        let server = Arc::clone(&quictun_server);
        tokio::spawn(server.upgrade(connection));
    });

    let expected_auth = config
        .credentials
        .as_ref()
        .map(|(user, pass)| format!("Basic {}", BASE64.encode(format!("{user}:{pass}"))));
    let secret_path = config.secret_path.clone();

    let gateway = Gateway::new(registry, move |request| {
        if request.get(":path") != Some(secret_path.as_str()) {
            return GatewayResponse::new(404);
        }
        if let Some(expected) = &expected_auth {
            if request.get("authorization") != Some(expected.as_str()) {
                return GatewayResponse::new(401);
            }
        }

        // replay protection
        let qtp = request.get("qtp").unwrap_or_default();
        if !server.check_sequence_number(qtp) {
            return GatewayResponse::new(400).with_header("Connection", "close");
        }

        // switch to the quictun protocol
        GatewayResponse::new(101)
            .with_header("Connection", "Upgrade")
            .with_header("Upgrade", PROTOCOL_IDENTIFIER)
    });

    let quic_config = quictun::tls::server_config(&config.cert_path, &config.key_path)?;
    let addr = tokio::net::lookup_host(&config.listen_addr)
        .await?
        .next()
        .ok_or_else(|| anyhow::anyhow!("could not resolve {}", config.listen_addr))?;
    let endpoint = quinn::Endpoint::server(quic_config, addr)?;

    gateway.run(endpoint).await?;
    Ok(())
}

fn print_usage(program: &str) {
    println!(
        r#"quictun server - covert SOCKS5-over-QUIC tunnel

USAGE:
    {program} [OPTIONS]

OPTIONS:
    -l <addr>            QUIC listen address (default: localhost:6121)
    -cert <file>         TLS certificate chain, PEM (default: certs/cert.pem)
    -key <file>          TLS private key, PEM (default: certs/key.pem)
    -auth <user:pass>    Require HTTP Basic credentials on the upgrade request
    -h, --help           Print help information

EXAMPLE:
    {program} -l 0.0.0.0:6121 -cert certs/cert.pem -key certs/key.pem -auth user:pass
"#
    );
}
