//! HTTP client construction for OAI-PMH endpoints.
//!
//! Every harvest request goes through a client built here so timeouts,
//! User-Agent and compression stay uniform across sources.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Duration;

use reqwest::{Client, ClientBuilder, Proxy};
use serde::Deserialize;
use tracing::warn;

use crate::user_agent;

use super::OaiError;

/// Default TCP connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default overall request timeout (connect + response + body).
pub const DEFAULT_READ_TIMEOUT_SECS: u64 = 30;

/// Timeouts applied to every harvest request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HttpTimeouts {
    /// Seconds allowed to establish a connection.
    pub connect_timeout_secs: u64,
    /// Seconds allowed for the whole request.
    pub read_timeout_secs: u64,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self {
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            read_timeout_secs: DEFAULT_READ_TIMEOUT_SECS,
        }
    }
}

/// Builds the harvester HTTP client.
///
/// # Errors
///
/// Returns [`OaiError::Client`] when reqwest cannot build a client, even
/// after retrying without the system proxy lookup.
pub fn build_harvest_client(timeouts: HttpTimeouts) -> Result<Client, OaiError> {
    match try_build_client(timeouts, false) {
        Ok(client) => Ok(client),
        Err(BuildClientFailure::Panic) => {
            // Some sandboxed environments panic while reading system proxy
            // settings; environment proxies still apply on the fallback path.
            warn!("harvest client hit system proxy panic; using env-proxy fallback builder");
            match try_build_client(timeouts, true) {
                Ok(client) => Ok(client),
                Err(BuildClientFailure::Panic) => Err(OaiError::Client(
                    "HTTP client construction panicked".to_string(),
                )),
                Err(BuildClientFailure::Build(error)) => Err(OaiError::Client(format!(
                    "HTTP client construction failed: {error}"
                ))),
            }
        }
        Err(BuildClientFailure::Build(error)) => Err(OaiError::Client(format!(
            "HTTP client construction failed: {error}"
        ))),
    }
}

enum BuildClientFailure {
    Panic,
    Build(reqwest::Error),
}

fn try_build_client(
    timeouts: HttpTimeouts,
    disable_system_proxy_lookup: bool,
) -> Result<Client, BuildClientFailure> {
    catch_unwind(AssertUnwindSafe(move || {
        let mut builder = base_builder(timeouts);
        if disable_system_proxy_lookup {
            builder = apply_env_proxies(builder.no_proxy());
        }
        builder.build().map_err(BuildClientFailure::Build)
    }))
    .map_err(|_| BuildClientFailure::Panic)?
}

fn base_builder(timeouts: HttpTimeouts) -> ClientBuilder {
    Client::builder()
        .connect_timeout(Duration::from_secs(timeouts.connect_timeout_secs))
        .timeout(Duration::from_secs(timeouts.read_timeout_secs))
        .user_agent(user_agent::harvester_user_agent())
        .gzip(true)
}

fn apply_env_proxies(mut builder: ClientBuilder) -> ClientBuilder {
    let https = first_env(&["HTTPS_PROXY", "https_proxy", "ALL_PROXY", "all_proxy"]);
    if let Some(proxy) = https.and_then(|value| Proxy::https(&value).ok()) {
        builder = builder.proxy(proxy);
    }
    let http = first_env(&["HTTP_PROXY", "http_proxy", "ALL_PROXY", "all_proxy"]);
    if let Some(proxy) = http.and_then(|value| Proxy::http(&value).ok()) {
        builder = builder.proxy(proxy);
    }
    builder
}

fn first_env(names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| {
        std::env::var(name)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}
