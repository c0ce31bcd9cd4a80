//! The discovery watcher (C3): manages a dynamic interest set of service
//! names, starting and stopping per-service subscriptions against a
//! [`DiscoveryTransport`] as the interest set changes.
//!
//! Grounded on `ferrex-server`'s `movie_batch_notifier` polling-task pattern
//! (`examples/Lowband21-ferrex/ferrex-server/src/infra/scan/movie_batch_notifier.rs`):
//! each interest gets its own background task forwarding updates into a
//! shared pending map, coalesced behind the same `Notify` pattern used by
//! [`crate::cluster::ClusterAccumulator`].

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use meshwatch_contracts::DiscoveryTransport;
use meshwatch_model::{DiscoveryEndpoint, DiscoverySnapshot};
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;

struct Subscription {
    task: JoinHandle<()>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub struct DiscoveryWatcher {
    transport: Arc<dyn DiscoveryTransport>,
    interests: Mutex<HashMap<String, Subscription>>,
    pending: Arc<Mutex<HashMap<String, Vec<DiscoveryEndpoint>>>>,
    /// Services that have produced at least one resolution since being
    /// added to the interest set, used by [`Self::is_bootstrapped`].
    resolved: Arc<Mutex<HashSet<String>>>,
    changed: Arc<Notify>,
}

impl DiscoveryWatcher {
    pub fn new(transport: Arc<dyn DiscoveryTransport>) -> Self {
        Self {
            transport,
            interests: Mutex::new(HashMap::new()),
            pending: Arc::new(Mutex::new(HashMap::new())),
            resolved: Arc::new(Mutex::new(HashSet::new())),
            changed: Arc::new(Notify::new()),
        }
    }

    pub fn changed(&self) -> Arc<Notify> {
        self.changed.clone()
    }

    /// Reconciles the live subscriptions against `wanted`: starts watching
    /// newly-interesting services, stops watching ones no longer referenced.
    /// Safe to call every iteration with the same set, since additions and
    /// removals are computed as a diff against the current interest set.
    pub async fn set_interests(&self, wanted: BTreeSet<String>) {
        let mut interests = self.interests.lock().await;
        let current: BTreeSet<String> = interests.keys().cloned().collect();

        for removed in current.difference(&wanted) {
            interests.remove(removed);
            self.transport.unsubscribe(removed);
            self.pending.lock().await.remove(removed);
            self.resolved.lock().await.remove(removed);
        }

        for added in wanted.difference(&current) {
            let mut rx = self.transport.subscribe(added);
            let pending = self.pending.clone();
            let resolved = self.resolved.clone();
            let changed = self.changed.clone();
            let service = added.clone();
            let task = tokio::spawn(async move {
                while let Some(update) = rx.recv().await {
                    pending.lock().await.insert(update.service.clone(), update.endpoints);
                    resolved.lock().await.insert(service.clone());
                    changed.notify_one();
                }
            });
            interests.insert(added.clone(), Subscription { task });
        }
    }

    /// Drains pending resolutions into `target`.
    pub async fn update(&self, target: &mut DiscoverySnapshot) {
        let drained: HashMap<String, Vec<DiscoveryEndpoint>> = {
            let mut guard = self.pending.lock().await;
            std::mem::take(&mut *guard)
        };
        for (service, endpoints) in drained {
            target.set_endpoints(service, endpoints);
        }
    }

    /// True once every currently-interesting service has resolved at least
    /// once. The aggregation loop withholds publication while this is false
    /// so consumers never see a snapshot with only partial discovery state.
    pub async fn is_bootstrapped(&self) -> bool {
        let interests = self.interests.lock().await;
        if interests.is_empty() {
            return true;
        }
        let resolved = self.resolved.lock().await;
        interests.keys().all(|service| resolved.contains(service))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    struct FakeTransport {
        channels: Mutex<HashMap<String, mpsc::Sender<meshwatch_contracts::DiscoveryUpdate>>>,
    }

    impl DiscoveryTransport for FakeTransport {
        fn subscribe(&self, service: &str) -> mpsc::Receiver<meshwatch_contracts::DiscoveryUpdate> {
            let (tx, rx) = mpsc::channel(8);
            self.channels.try_lock().unwrap().insert(service.to_string(), tx);
            rx
        }

        fn unsubscribe(&self, service: &str) {
            self.channels.try_lock().unwrap().remove(service);
        }
    }

    #[tokio::test]
    async fn bootstraps_once_every_interest_resolves() {
        let transport = Arc::new(FakeTransport { channels: Mutex::new(HashMap::new()) });
        let watcher = DiscoveryWatcher::new(transport.clone());

        watcher.set_interests(BTreeSet::from(["svc-a".to_string(), "svc-b".to_string()])).await;
        assert!(!watcher.is_bootstrapped().await);

        let senders = transport.channels.lock().await;
        senders["svc-a"]
            .send(meshwatch_contracts::DiscoveryUpdate { service: "svc-a".into(), endpoints: vec![] })
            .await
            .unwrap();
        drop(senders);
        watcher.changed().notified().await;
        assert!(!watcher.is_bootstrapped().await);

        let senders = transport.channels.lock().await;
        senders["svc-b"]
            .send(meshwatch_contracts::DiscoveryUpdate { service: "svc-b".into(), endpoints: vec![] })
            .await
            .unwrap();
        drop(senders);
        watcher.changed().notified().await;
        assert!(watcher.is_bootstrapped().await);
    }

    #[tokio::test]
    async fn removing_an_interest_stops_its_subscription() {
        let transport = Arc::new(FakeTransport { channels: Mutex::new(HashMap::new()) });
        let watcher = DiscoveryWatcher::new(transport.clone());

        watcher.set_interests(BTreeSet::from(["svc-a".to_string()])).await;
        assert!(transport.channels.lock().await.contains_key("svc-a"));

        watcher.set_interests(BTreeSet::new()).await;
        assert!(watcher.is_bootstrapped().await);
        assert!(!transport.channels.lock().await.contains_key("svc-a"), "removal must call transport.unsubscribe");
    }
}
