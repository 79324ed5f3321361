mod calc;
mod config;
mod db;
mod export;
mod ipc;
mod logging;
mod sample;
mod schedule;

use anyhow::Context;
use clap::Parser;
use std::io::{self, BufRead, Write};

fn main() -> anyhow::Result<()> {
    let config = config::Config::parse();
    logging::init(&config);

    let db = db::open_store().context("failed to open session store")?;
    if config.seed_sample {
        let summary = sample::seed_sample(&db)?;
        tracing::info!(?summary, "sample data loaded");
    }
    let mut state = ipc::AppState { db };
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "schoold ready");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(e) => {
                tracing::error!("stdin read failed: {}", e);
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let resp = match serde_json::from_str::<ipc::Request>(&line) {
            Ok(req) => ipc::handle_request(&mut state, req),
            Err(e) => {
                // No id to answer to.
                tracing::warn!("unparseable request line: {}", e);
                ipc::bad_json(e.to_string())
            }
        };

        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }

    tracing::info!("stdin closed, shutting down");
    Ok(())
}
