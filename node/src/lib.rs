//! HTTP API and background tasks for a Keystone node.

use std::{path::PathBuf, sync::Arc, time::Duration};
use anyhow::{bail, Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::put,
    Router,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use keystone_consensus::ClusterState;
use keystone_license::{License, TrustedKeys, CURRENT_FORMAT_VERSION};
use keystone_service::{
    collect, DeleteLicenseResponse, LicenseService, NodeStatsCollector, PutLicenseResponse,
};
use tokio::sync::watch;
use tracing::{debug, info, warn};

async fn put_license_handler(
    State(service): State<Arc<LicenseService>>,
    body: String,
) -> Json<PutLicenseResponse> {
    Json(service.register_license_bytes(&body).await)
}

async fn delete_license_handler(
    State(service): State<Arc<LicenseService>>,
) -> Json<DeleteLicenseResponse> {
    Json(service.remove().await)
}

async fn get_license_handler(
    State(service): State<Arc<LicenseService>>,
) -> Result<Json<License>, StatusCode> {
    service.get_license().map(Json).ok_or(StatusCode::NOT_FOUND)
}

/// Build the HTTP API router around a license service.
pub fn build_router(service: Arc<LicenseService>) -> Router {
    Router::new()
        .route(
            "/_license",
            put(put_license_handler)
                .delete(delete_license_handler)
                .get(get_license_handler),
        )
        .with_state(service)
}

/// Parses a base64url Ed25519 public key into a trusted key table for the
/// current license format version.
pub fn parse_public_key(encoded: &str) -> Result<TrustedKeys> {
    let bytes = URL_SAFE_NO_PAD
        .decode(encoded.trim())
        .context("public key is not valid base64url")?;
    let Ok(key) = <[u8; 32]>::try_from(bytes.as_slice()) else {
        bail!("public key must be 32 bytes, got {}", bytes.len());
    };
    TrustedKeys::new()
        .with_key(CURRENT_FORMAT_VERSION, &key)
        .context("public key is not a valid Ed25519 point")
}

/// Writes every committed cluster state to `path` until the cluster stops.
pub async fn persist_committed(mut committed: watch::Receiver<Arc<ClusterState>>, path: PathBuf) {
    while committed.changed().await.is_ok() {
        let state = committed.borrow_and_update().clone();
        match state.write_to(&path).await {
            Ok(()) => debug!("Persisted cluster state version {} to {:?}", state.version, path),
            Err(e) => warn!("Failed to persist cluster state to {:?}: {}", path, e),
        }
    }
    info!("Cluster stopped, no longer persisting to {:?}", path);
}

/// Runs the node stats collector every `interval`, logging each document.
pub async fn run_collector(collector: NodeStatsCollector, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        match collect(&collector) {
            Ok(docs) => {
                for doc in docs {
                    match serde_json::to_string(&doc) {
                        Ok(json) => info!("node stats: {}", json),
                        Err(e) => warn!("Failed to encode node stats: {}", e),
                    }
                }
            }
            Err(e) => warn!("Node stats collection failed: {}", e),
        }
    }
}
