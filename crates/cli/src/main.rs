//! Process entry point (spec §6 "CLI"): parses flags, loads the config
//! file, wires every crate together via `bootstrap::build`, and serves
//! the HTTP/WebSocket surface until shutdown.

mod bootstrap;
mod cli_args;
mod config;
mod cron_handler;
mod scripts;
mod server;
mod state;

use anyhow::{Context, Result};
use cli_args::CliArgs;
use clap::Parser;
use config::AppConfig;

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    conversant_utils::logging::init(args.log_level.as_deref());

    let config_path = conversant_utils::resolve_config_path(args.config_path.as_deref())
        .context("no config file found; pass -c <path>")?;
    let mut config: AppConfig =
        conversant_utils::load_config(&config_path).with_context(|| format!("loading config from {}", config_path.display()))?;
    config.apply_env_overrides();

    let web_addr = args.web_bind_addr();
    let runtime = bootstrap::build(config, config_path, args.trigger, web_addr.as_deref())
        .await
        .context("building runtime")?;

    if args.open_config {
        open_browser(&format!("http://{}/config", web_addr.as_deref().unwrap_or("127.0.0.1:4000")));
    }
    if args.open_webui {
        open_browser(&format!("http://{}/", web_addr.as_deref().unwrap_or("127.0.0.1:4000")));
    }

    let Some(addr) = web_addr else {
        tracing::info!("web UI disabled (-w -); running headless");
        std::future::pending::<()>().await;
        return Ok(());
    };

    let app = server::router(runtime.state.clone());
    let listener = tokio::net::TcpListener::bind(&addr).await.with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, "serving HTTP/WebSocket surface");
    axum::serve(listener, app).await.context("HTTP server failed")?;
    Ok(())
}

fn open_browser(url: &str) {
    let opener = if cfg!(target_os = "macos") {
        "open"
    } else if cfg!(target_os = "windows") {
        "start"
    } else {
        "xdg-open"
    };
    if let Err(e) = std::process::Command::new(opener).arg(url).spawn() {
        tracing::warn!(error = %e, url, "failed to open browser");
    }
}
