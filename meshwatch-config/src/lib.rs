//! Environment-driven configuration for the meshwatch aggregator.
//!
//! Mirrors the upstream watcher's direct `os.Getenv` reads rather than a
//! layered file+env loader: there is no interactive config wizard here, just
//! a handful of knobs read once at startup.

mod error;
mod util;

pub use error::ConfigError;

use std::net::SocketAddr;
use std::path::PathBuf;

use util::{parse_bool_var, parse_csv_var};

/// All runtime knobs for the aggregator, read once at startup.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Restrict all cluster queries to a single namespace instead of
    /// watching cluster-wide.
    pub single_namespace: Option<String>,
    /// Global field selector, ANDed onto every query that doesn't supply
    /// its own.
    pub field_selector: String,
    /// Global label selector, applied to every query.
    pub label_selector: String,
    /// Whether to additionally watch the Knative ingress kinds.
    pub knative_enabled: bool,
    /// Directory to watch for certificate material. Empty disables the
    /// filesystem cert watcher entirely.
    pub cert_secret_dir: Option<PathBuf>,
    /// Namespace to attach to secrets synthesized from `cert_secret_dir`.
    pub cert_secret_namespace: String,
    /// When set, every emitted snapshot is additionally written to
    /// `/tmp/<timestamp>-snap.json` for offline inspection.
    pub snapshot_log: bool,
    /// URLs invoked by the default [`meshwatch_contracts::ReconfigNotifier`]
    /// after each new snapshot is published.
    pub webhook_urls: Vec<String>,
    /// Bind address for the debug/health HTTP surface.
    pub debug_bind_addr: SocketAddr,
}

impl WatcherConfig {
    /// Load configuration from the process environment. `.env` is loaded
    /// first (if present) so local development doesn't require exporting
    /// every variable by hand; real environment variables still win.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let single_namespace = std::env::var("AMBASSADOR_SINGLE_NAMESPACE")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(|_| {
                std::env::var("AMBASSADOR_NAMESPACE").unwrap_or_else(|_| "default".to_string())
            });

        let field_selector = std::env::var("AMBASSADOR_FIELD_SELECTOR").unwrap_or_default();
        let label_selector = std::env::var("AMBASSADOR_LABEL_SELECTOR").unwrap_or_default();
        let knative_enabled = parse_bool_var("AMBASSADOR_KNATIVE_SUPPORT").unwrap_or(false);

        let cert_secret_dir = std::env::var("CERT_SECRET_DIR")
            .or_else(|_| std::env::var("AMBASSADOR_ISTIO_SECRET_DIR"))
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        let cert_secret_namespace =
            std::env::var("AMBASSADOR_NAMESPACE").unwrap_or_else(|_| "default".to_string());

        let snapshot_log = std::env::var("SNAPSHOT_LOG")
            .ok()
            .and_then(|v| util::parse_bool(&v))
            .or_else(|| parse_bool_var("AMBASSADOR_WATCHER_SNAPLOG"))
            .unwrap_or(false);

        let webhook_urls = parse_csv_var("WATCHER_WEBHOOK_URLS").unwrap_or_default();

        let debug_bind_addr: SocketAddr = std::env::var("WATCHER_DEBUG_ADDR")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(|raw| raw.parse())
            .transpose()
            .map_err(|err| ConfigError::InvalidValue {
                var: "WATCHER_DEBUG_ADDR",
                reason: format!("{err}"),
            })?
            .unwrap_or_else(|| "127.0.0.1:8877".parse().expect("static default parses"));

        tracing::info!(
            namespace = single_namespace.as_deref().unwrap_or("<cluster-wide>"),
            knative_enabled,
            cert_watching = cert_secret_dir.is_some(),
            webhook_count = webhook_urls.len(),
            %debug_bind_addr,
            "configuration loaded"
        );

        Ok(Self {
            single_namespace,
            field_selector,
            label_selector,
            knative_enabled,
            cert_secret_dir,
            cert_secret_namespace,
            snapshot_log,
            webhook_urls,
            debug_bind_addr,
        })
    }
}
