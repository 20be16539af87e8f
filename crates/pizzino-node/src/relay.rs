//! Outbox drain worker.
//!
//! The [`RelayWorker`] is a background task owned by the node. Every period
//! it reads the whole [`OutboxQueue`] once and offers each datagram to the
//! configured [`RelayTransport`]. Datagrams the transport accepts are removed
//! from the queue; the rest stay queued and are offered again on the next
//! tick, so downstream delivery is at-least-once.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use pizzino_shared::Datagram;
use pizzino_store::OutboxQueue;

use crate::error::RelayError;

/// Hand-off of one datagram to the next node on its way.
#[async_trait]
pub trait RelayTransport: Send + Sync {
    async fn deliver(&self, datagram: &Datagram) -> Result<(), RelayError>;
}

/// Transport for nodes without downstream peers: every datagram stays queued.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnroutedTransport;

#[async_trait]
impl RelayTransport for UnroutedTransport {
    async fn deliver(&self, datagram: &Datagram) -> Result<(), RelayError> {
        Err(RelayError::Unrouted(datagram.receiver))
    }
}

/// Outcome of one pass over the outbox.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Offer every queued datagram to `transport` once.
pub async fn drain_once(
    outbox: &OutboxQueue,
    transport: &dyn RelayTransport,
) -> pizzino_store::Result<DrainReport> {
    let mut report = DrainReport::default();

    for datagram in outbox.pending().await? {
        match transport.deliver(&datagram).await {
            Ok(()) => {
                outbox.remove(&datagram.id).await?;
                report.delivered += 1;
            }
            Err(RelayError::Unrouted(receiver)) => {
                debug!(id = %datagram.id, receiver = %receiver.short(), "no route, keeping queued");
                report.failed += 1;
            }
            Err(e) => {
                warn!(id = %datagram.id, error = %e, "relay delivery failed");
                report.failed += 1;
            }
        }
    }

    Ok(report)
}

/// Handle to the running drain task.
pub struct RelayWorker {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl RelayWorker {
    /// Spawn the worker. The first drain happens one `period` after start.
    pub fn start(
        outbox: Arc<OutboxQueue>,
        transport: Arc<dyn RelayTransport>,
        period: Duration,
    ) -> Self {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            info!(period_secs = period.as_secs_f64(), "relay worker started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match drain_once(&outbox, transport.as_ref()).await {
                            Ok(report) if report.delivered + report.failed > 0 => {
                                debug!(
                                    delivered = report.delivered,
                                    pending = report.failed,
                                    "outbox drained"
                                );
                            }
                            Ok(_) => {}
                            Err(e) => warn!(error = %e, "outbox drain failed"),
                        }
                    }
                    _ = shutdown_rx.changed() => break,
                }
            }

            info!("relay worker stopped");
        });

        Self {
            shutdown_tx,
            handle,
        }
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Stop the worker and wait for an in-flight drain to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.handle.await {
            warn!(error = %e, "relay worker terminated abnormally");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use tokio::sync::Mutex;

    use super::*;
    use pizzino_shared::{DatagramId, Protocol, UserId};
    use pizzino_store::{Collection, Database, RecordLayout, Table};

    /// Accepts datagrams for the listed receivers only.
    struct RecordingTransport {
        reachable: HashSet<UserId>,
        delivered: Mutex<Vec<DatagramId>>,
    }

    impl RecordingTransport {
        fn reaching(receivers: &[UserId]) -> Self {
            Self {
                reachable: receivers.iter().copied().collect(),
                delivered: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl RelayTransport for RecordingTransport {
        async fn deliver(&self, datagram: &Datagram) -> Result<(), RelayError> {
            if !self.reachable.contains(&datagram.receiver) {
                return Err(RelayError::Refused("unreachable".into()));
            }
            self.delivered.lock().await.push(datagram.id);
            Ok(())
        }
    }

    fn outbox() -> Arc<OutboxQueue> {
        let db = Database::open_in_memory().unwrap().into_shared();
        Arc::new(OutboxQueue::new(Collection::new(
            db,
            Table::Outbox,
            RecordLayout::Tupled,
        )))
    }

    fn relay_to(receiver: UserId) -> Datagram {
        Datagram::new(Protocol::Relay, UserId([1; 32]), receiver, vec![7])
    }

    #[tokio::test]
    async fn test_drain_removes_only_delivered() {
        let outbox = outbox();
        let ok = relay_to(UserId([2; 32]));
        let stuck = relay_to(UserId([3; 32]));
        outbox.enqueue(&ok).await.unwrap();
        outbox.enqueue(&stuck).await.unwrap();

        let transport = RecordingTransport::reaching(&[UserId([2; 32])]);
        let report = drain_once(&outbox, &transport).await.unwrap();

        assert_eq!(report, DrainReport { delivered: 1, failed: 1 });
        assert_eq!(*transport.delivered.lock().await, vec![ok.id]);
        assert_eq!(outbox.pending().await.unwrap(), vec![stuck]);
    }

    #[tokio::test]
    async fn test_unrouted_transport_keeps_everything() {
        let outbox = outbox();
        outbox.enqueue(&relay_to(UserId([2; 32]))).await.unwrap();

        let report = drain_once(&outbox, &UnroutedTransport).await.unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(outbox.len().await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_worker_drains_periodically_until_shutdown() {
        let outbox = outbox();
        let receiver = UserId([2; 32]);
        let transport = Arc::new(RecordingTransport::reaching(&[receiver]));

        let worker = RelayWorker::start(outbox.clone(), transport.clone(), Duration::from_secs(5));
        outbox.enqueue(&relay_to(receiver)).await.unwrap();

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(outbox.len().await.unwrap(), 1, "no drain before the first period");

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(outbox.len().await.unwrap(), 0);

        outbox.enqueue(&relay_to(receiver)).await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(transport.delivered.lock().await.len(), 2);

        assert!(worker.is_running());
        worker.shutdown().await;

        outbox.enqueue(&relay_to(receiver)).await.unwrap();
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(outbox.len().await.unwrap(), 1);
    }
}
