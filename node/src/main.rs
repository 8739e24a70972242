// Copyright (c) 2026 zkgrade contributors. MIT License.
// See LICENSE for details.

//! # zkgrade Issuance Node
//!
//! Entry point for the `zkgrade-node` binary. Parses CLI arguments,
//! initializes logging and metrics, wires the issuance pipeline and serves
//! the HTTP API.
//!
//! Subcommands:
//!
//! - `run`      start the node
//! - `criteria` print the grade criteria table
//! - `version`  print build version information

mod api;
mod cli;
mod logging;
mod metrics;

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::signal;

use zkgrade_protocol::config::PROTOCOL_VERSION;
use zkgrade_protocol::crypto::sha256_hex;
use zkgrade_protocol::zkp::Groth16Backend;
use zkgrade_protocol::{
    CreditBureau, InMemoryScoreSource, IssuanceOrchestrator, ProofCommitter, SystemClock,
    TokenRegistry,
};

use cli::{Commands, ProofBackendKind, ZkgradeNodeCli};
use metrics::NodeMetrics;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = ZkgradeNodeCli::parse();

    match cli.command {
        Commands::Run(args) => run_node(args).await,
        Commands::Criteria => {
            print_criteria();
            Ok(())
        }
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Starts the issuance node: API server and metrics endpoint.
async fn run_node(args: cli::RunArgs) -> Result<()> {
    logging::init_logging(logging::DEFAULT_DIRECTIVE, args.log_format());

    let config = args.issuance_config()?;
    tracing::info!(
        api_port = args.api_port,
        metrics_port = args.metrics_port,
        issuer = %config.issuer_id,
        validity = %config.validity_label(),
        "starting zkgrade-node"
    );

    // --- Credit bureau ---
    let source = match &args.credit_data {
        Some(path) => {
            let source = InMemoryScoreSource::from_json_file(path)
                .with_context(|| format!("failed to load credit data from {}", path.display()))?;
            tracing::info!(path = %path.display(), customers = source.len(), "credit data loaded");
            source
        }
        None => {
            tracing::info!("no credit data file given, serving demo customers");
            InMemoryScoreSource::demo()
        }
    };
    let bureau = CreditBureau::new(Arc::new(source), config.bureau_timeout);

    // --- Proof backend ---
    let committer = build_committer(args.proof_backend).await?;

    // --- Orchestrator ---
    let registry = Arc::new(TokenRegistry::new(Arc::new(SystemClock)));
    let orchestrator = IssuanceOrchestrator::new(bureau, committer, registry, config);

    // --- Metrics ---
    let node_metrics =
        Arc::new(NodeMetrics::new().context("failed to register prometheus metrics")?);

    let app_state = api::AppState {
        version: format!("{} (protocol {})", env!("CARGO_PKG_VERSION"), PROTOCOL_VERSION),
        orchestrator,
        metrics: Arc::clone(&node_metrics),
    };

    // --- API server ---
    let api_router = api::create_router(app_state);
    let api_addr = format!("0.0.0.0:{}", args.api_port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind API listener on {}", api_addr))?;
    tracing::info!("API server listening on {}", api_addr);

    // --- Metrics server ---
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&node_metrics));
    let metrics_addr = format!("0.0.0.0:{}", args.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", metrics_addr))?;
    tracing::info!("Metrics server listening on {}", metrics_addr);

    // --- Serve ---
    tokio::select! {
        res = axum::serve(api_listener, api_router) => {
            if let Err(e) = res {
                tracing::error!("API server error: {}", e);
            }
        }
        res = axum::serve(metrics_listener, metrics_router) => {
            if let Err(e) = res {
                tracing::error!("Metrics server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received, draining connections");
        }
    }

    tracing::info!("zkgrade-node stopped");
    Ok(())
}

/// Build the committer for the selected backend. Groth16 runs its circuit
/// setup here, once per process, off the async workers.
async fn build_committer(kind: ProofBackendKind) -> Result<ProofCommitter> {
    match kind {
        ProofBackendKind::Structural => Ok(ProofCommitter::structural()),
        ProofBackendKind::Groth16 => {
            let backend = tokio::task::spawn_blocking(|| {
                Groth16Backend::setup(&mut rand::rngs::OsRng)
            })
            .await
            .context("groth16 setup task failed")??;

            let vk = backend
                .verifying_key_bytes()
                .context("failed to serialize verifying key")?;
            tracing::info!(
                vk_fingerprint = %sha256_hex(&vk),
                vk_bytes = vk.len(),
                "groth16 setup complete"
            );
            Ok(ProofCommitter::new(Arc::new(backend)))
        }
    }
}

/// Prints the grade criteria table to stdout.
fn print_criteria() {
    println!("{:<6} {:<10} {:<12} {:>16}", "grade", "score", "description", "max loan");
    for row in CreditBureau::criteria() {
        println!(
            "{:<6} {:<10} {:<12} {:>16}",
            row.grade.as_str(),
            format!("{}-{}", row.min_score, row.max_score),
            row.description,
            row.max_loan_amount
        );
    }
}

/// Prints version information to stdout.
fn print_version() {
    println!("zkgrade-node {}", env!("CARGO_PKG_VERSION"));
    println!("protocol     {}", PROTOCOL_VERSION);
    println!("rustc        {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// If a handler cannot be installed, that branch never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
