// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Rescue Node

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use rescue_credential_api::api;
use rescue_credential_api::clock::SystemClock;
use rescue_credential_api::config::Config;
use rescue_credential_api::credentials::CredentialManager;
use rescue_credential_api::external::{
    NodeListSource, RescueProxyNodeSource, RescueProxyWithdrawalSource, RocketscanNodeSource,
};
use rescue_credential_api::metrics::{metrics_router, ServiceMetrics};
use rescue_credential_api::registry::Registry;
use rescue_credential_api::service::{Service, ServiceConfig};
use rescue_credential_api::state::AppState;
use rescue_credential_api::store::Store;
use rescue_credential_api::tasks::{UpdateNodesTask, UpdateWithdrawalAddressesTask};

fn init_logging(debug: bool) {
    let default_filter = if debug {
        "rescue_credential_api=debug,info"
    } else {
        "info"
    };
    let filter = EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.to_string()),
    );
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Resolve on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending().await,
        }
    };
    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[tokio::main]
async fn main() {
    let config = match Config::parse() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error parsing command-line arguments: {e}");
            std::process::exit(1);
        }
    };

    init_logging(config.debug);

    let store = match Store::open(&config.db_path).await {
        Ok(store) => store,
        Err(e) => {
            error!(error = %e, "unable to open the database");
            std::process::exit(1);
        }
    };

    let clock = Arc::new(SystemClock);
    let metrics = Arc::new(ServiceMetrics::default());
    let shutdown = CancellationToken::new();

    // Background tasks keep the registries close to the chain's view.
    let nodes = Arc::new(Registry::new());
    let withdrawal_addresses = Arc::new(Registry::new());

    let mut node_sources: Vec<Box<dyn NodeListSource>> = vec![Box::new(
        RescueProxyNodeSource::new(config.rescue_proxy_api_addr.clone(), config.secure_grpc),
    )];
    if let Some(url) = &config.rocketscan_api_url {
        node_sources.push(Box::new(RocketscanNodeSource::new(url.clone())));
    }
    let update_nodes = tokio::spawn(
        UpdateNodesTask::new(node_sources, Arc::clone(&nodes), clock.clone())
            .run(shutdown.clone()),
    );
    let update_withdrawal_addresses = tokio::spawn(
        UpdateWithdrawalAddressesTask::new(
            Box::new(RescueProxyWithdrawalSource::new(
                config.rescue_proxy_api_addr.clone(),
                config.secure_grpc,
            )),
            Arc::clone(&withdrawal_addresses),
            clock.clone(),
        )
        .run(shutdown.clone()),
    );

    let service = Arc::new(Service::new(ServiceConfig {
        store: store.clone(),
        credential_manager: CredentialManager::new(config.credential_secret.clone()),
        nodes,
        withdrawal_addresses,
        clock,
        metrics: Arc::clone(&metrics),
        enable_solo_validators: config.enable_solo_validators,
    }));

    let app = api::router(
        AppState::new(service),
        &config.api_path,
        &config.allowed_origins,
    );

    // Metrics listener on its own port.
    let metrics_app = metrics_router(metrics);
    let metrics_listener = match tokio::net::TcpListener::bind(config.metrics_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(addr = %config.metrics_addr, error = %e, "unable to bind metrics listener");
            std::process::exit(1);
        }
    };
    let metrics_shutdown = shutdown.clone();
    let metrics_server = tokio::spawn(async move {
        let serve = axum::serve(metrics_listener, metrics_app.into_make_service())
            .with_graceful_shutdown(metrics_shutdown.cancelled_owned());
        if let Err(e) = serve.await {
            error!(error = %e, "metrics server stopped");
        }
    });

    let listener = match tokio::net::TcpListener::bind(config.listen_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(addr = %config.listen_addr, error = %e, "unable to bind listener");
            std::process::exit(1);
        }
    };
    info!(addr = %config.listen_addr, path = %config.api_path, "starting HTTP server");

    let serve = axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal());
    if let Err(e) = serve.await {
        error!(error = %e, "HTTP server stopped");
    }

    // Shut down gracefully: handlers have drained, now stop the background
    // tasks and close the store.
    info!("received termination signal, shutting down");
    shutdown.cancel();
    let _ = update_nodes.await;
    let _ = update_withdrawal_addresses.await;
    let _ = metrics_server.await;
    store.close().await;

    info!("shutdown complete");
}
