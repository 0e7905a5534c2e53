//! Switchyard server.
//!
//! Loads a routing table from YAML, binds its routes to the built-in
//! handlers and serves it over HTTP/1.1.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

use switchyard::{ConfigError, MuxConfig, ServeMux};
use switchyard_telemetry::{init_logging, LogFormat, TelemetryConfig};

mod handlers;

#[derive(Parser, Debug)]
#[command(name = "switchyard", about = "Serve a switchyard routing table", version)]
struct Cli {
    /// Routing table (YAML).
    #[arg(short, long)]
    config: PathBuf,

    /// Listen address.
    #[arg(long, default_value = "0.0.0.0:8080")]
    listen: SocketAddr,

    /// Log level filter (RUST_LOG takes precedence).
    #[arg(long, env = "SWITCHYARD_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Log format (json or pretty).
    #[arg(long, default_value = "json", value_parser = parse_log_format)]
    log_format: LogFormat,
}

fn parse_log_format(s: &str) -> Result<LogFormat, String> {
    LogFormat::parse(s).ok_or_else(|| format!("unknown log format {s:?} (expected json or pretty)"))
}

fn load_mux(path: &Path) -> Result<ServeMux<Incoming>, ConfigError> {
    let config = MuxConfig::load(path)?;
    ServeMux::from_config(&config, &handlers::builtin())
}

async fn run_serve(mux: ServeMux<Incoming>, addr: SocketAddr) -> ExitCode {
    let listener = match TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(listen = %addr, error = %e, "failed to bind");
            return ExitCode::from(1);
        }
    };

    tracing::info!(listen = %addr, mux = ?mux, "listening");
    let mux = Arc::new(mux);

    loop {
        let accepted = tokio::select! {
            accepted = listener.accept() => accepted,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutting down");
                return ExitCode::SUCCESS;
            }
        };
        let (stream, peer) = match accepted {
            Ok(conn) => conn,
            Err(e) => {
                tracing::warn!(error = %e, "accept failed");
                continue;
            }
        };

        let mux = Arc::clone(&mux);
        let io = TokioIo::new(stream);

        tokio::spawn(async move {
            let service = service_fn(move |req| {
                let response = mux.serve(req);
                async move { Ok::<_, Infallible>(response) }
            });

            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                tracing::debug!(peer = %peer, error = %e, "connection error");
            }
        });
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let telemetry = TelemetryConfig::new()
        .with_log_level(cli.log_level)
        .with_log_format(cli.log_format);
    if let Err(e) = init_logging(&telemetry) {
        eprintln!("error: {e}");
        return ExitCode::from(1);
    }

    let mux = match load_mux(&cli.config) {
        Ok(mux) => mux,
        Err(e) => {
            tracing::error!(config = %cli.config.display(), error = %e, "invalid routing table");
            return ExitCode::from(1);
        }
    };

    run_serve(mux, cli.listen).await
}
