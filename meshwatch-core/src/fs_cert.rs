//! The filesystem cert watcher (C4): turns a directory of PEM files into a
//! stream of synthetic secret events.
//!
//! Grounded on `ferrex-core`'s `notify`-based watch loop
//! (`examples/Lowband21-ferrex/ferrex-core/src/scan/fs_watch/mod.rs`): a
//! `RecommendedWatcher` forwards raw filesystem events into a channel that a
//! tokio task turns into domain events. Mirrors the upstream Istio cert
//! watcher: any change under the directory re-reads `tls.crt`/`tls.key` as a
//! pair rather than trying to interpret which specific file changed.

use std::path::{Path, PathBuf};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use meshwatch_model::SecretValue;
use notify::{Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use sha2::{Digest, Sha256};
use tokio::sync::mpsc;

use crate::error::AggregatorError;
use crate::Result;

/// Short content-addressed idempotency key, grounded on `ferrex-core`'s
/// `encode_hash`: OS-level `notify` watchers routinely fire more than once
/// for a single logical change (a volume remount touching both files, an
/// editor's write-then-rename), and re-emitting an identical secret every
/// time would make the aggregation loop do real work for no-op churn.
fn content_hash(cert: &[u8], key: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(cert);
    hasher.update(key);
    URL_SAFE_NO_PAD.encode(&hasher.finalize()[..16])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertOp {
    Update,
    Delete,
}

#[derive(Debug, Clone)]
pub struct CertEvent {
    pub op: CertOp,
    pub name: String,
    pub namespace: String,
    pub secret: Option<SecretValue>,
}

/// Holds the live `notify` watcher alive for as long as the aggregator runs;
/// dropping it stops the underlying OS watch.
pub struct FsCertWatcher {
    _watcher: RecommendedWatcher,
}

impl FsCertWatcher {
    /// Spawns the watcher for `dir`, emitting [`CertEvent`]s on the returned
    /// channel. When `dir` is `None` (the filesystem cert source wasn't
    /// configured) returns `(None, rx)` with a receiver that never
    /// produces anything; the aggregation loop always has a channel to
    /// select on, configured or not.
    pub fn spawn(dir: Option<PathBuf>, secret_name: String, namespace: String) -> Result<(Option<Self>, mpsc::Receiver<CertEvent>)> {
        let (tx, rx) = mpsc::channel(64);

        let Some(dir) = dir else {
            return Ok((None, rx));
        };

        let (raw_tx, mut raw_rx) = mpsc::channel::<std::result::Result<Event, notify::Error>>(256);
        let mut watcher = RecommendedWatcher::new(
            move |res| {
                let _ = raw_tx.blocking_send(res);
            },
            NotifyConfig::default(),
        )
        .map_err(|err| AggregatorError::Internal(format!("failed to create cert watcher: {err}")))?;

        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(|err| AggregatorError::Internal(format!("failed to watch {}: {err}", dir.display())))?;

        tokio::spawn(async move {
            let mut last_hash: Option<String> = None;
            while let Some(result) = raw_rx.recv().await {
                match result {
                    Ok(event) => {
                        let deleted = matches!(event.kind, EventKind::Remove(_));
                        let Some(cert_event) = build_cert_event(&dir, deleted, &secret_name, &namespace) else {
                            continue;
                        };

                        if let Some(secret) = &cert_event.secret {
                            let hash = content_hash(&secret.cert, &secret.key);
                            if last_hash.as_deref() == Some(hash.as_str()) {
                                continue;
                            }
                            last_hash = Some(hash);
                        } else {
                            last_hash = None;
                        }

                        if tx.send(cert_event).await.is_err() {
                            return;
                        }
                    }
                    Err(err) => tracing::warn!(%err, "filesystem cert watch error"),
                }
            }
        });

        Ok((Some(Self { _watcher: watcher }), rx))
    }
}

fn build_cert_event(dir: &Path, deleted: bool, name: &str, namespace: &str) -> Option<CertEvent> {
    if deleted {
        return Some(CertEvent { op: CertOp::Delete, name: name.to_string(), namespace: namespace.to_string(), secret: None });
    }

    let cert = std::fs::read(dir.join("tls.crt")).ok()?;
    let key = std::fs::read(dir.join("tls.key")).ok()?;
    Some(CertEvent {
        op: CertOp::Update,
        name: name.to_string(),
        namespace: namespace.to_string(),
        secret: Some(SecretValue { cert, key }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn disabled_without_a_directory() {
        let (watcher, _rx) = FsCertWatcher::spawn(None, "istio-cert".into(), "default".into()).unwrap();
        assert!(watcher.is_none());
    }

    #[tokio::test]
    async fn writing_cert_and_key_emits_an_update() {
        let dir = tempfile::tempdir().unwrap();
        let (_watcher, mut rx) = FsCertWatcher::spawn(
            Some(dir.path().to_path_buf()),
            "istio-cert".into(),
            "default".into(),
        )
        .unwrap();

        std::fs::write(dir.path().join("tls.crt"), b"cert-bytes").unwrap();
        std::fs::write(dir.path().join("tls.key"), b"key-bytes").unwrap();

        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await.unwrap().unwrap();
        assert_eq!(event.op, CertOp::Update);
        let secret = event.secret.unwrap();
        assert_eq!(secret.cert, b"cert-bytes");
        assert_eq!(secret.key, b"key-bytes");
    }
}
