use async_trait::async_trait;

/// The consumer notification contract: told "a new snapshot was published,"
/// nothing more. Implementations are expected to re-read the published
/// snapshot from the shared atomic slot rather than being handed it
/// directly, mirroring the original's `notifyReconfigWebhooks` firing
/// after `encoded.Store(snapshotJSON)`.
///
/// Failures here are the consumer's problem: a notifier that errors does
/// not roll back or retry the emission, and never causes the aggregation
/// loop to fail.
#[async_trait]
pub trait ReconfigNotifier: Send + Sync {
    async fn notify(&self);
}
