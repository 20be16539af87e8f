//! The routing engine of a node.
//!
//! [`Node`] owns the four collections, the collaborators it was built with,
//! and the relay worker. Every public operation corresponds to one request
//! of the HTTP surface; ciphertext goes in and out through the injected
//! [`SessionProvider`] and [`DatagramCodec`].

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, info};

use pizzino_shared::{Datagram, DatagramCodec, DatagramId, SessionProvider, UserId};
use pizzino_store::{
    Collection, DatagramStore, InboxIndex, KeyBundlePool, KeyLocks, OutboxQueue, RecordLayout,
    SharedDatabase, Table,
};

use crate::config::StoreLayout;
use crate::error::NodeError;
use crate::ingest::{classify, IngestPlan};
use crate::relay::{RelayTransport, RelayWorker};

/// Record counts reported by `/info`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeStatus {
    pub stored_datagrams: usize,
    pub inboxes: usize,
    pub bundles: usize,
    pub outbox: usize,
}

pub struct Node {
    datagrams: DatagramStore,
    inbox: InboxIndex,
    bundles: KeyBundlePool,
    outbox: Arc<OutboxQueue>,
    session: Arc<dyn SessionProvider>,
    codec: Arc<dyn DatagramCodec>,
    relay: Mutex<Option<RelayWorker>>,
    id_locks: KeyLocks<DatagramId>,
}

impl Node {
    pub fn new(
        db: SharedDatabase,
        layout: StoreLayout,
        session: Arc<dyn SessionProvider>,
        codec: Arc<dyn DatagramCodec>,
    ) -> Self {
        info!(?layout, "opening node collections");
        Self {
            datagrams: DatagramStore::new(Collection::new(
                db.clone(),
                Table::Datagrams,
                layout.datagrams(),
            )),
            inbox: InboxIndex::new(Collection::new(
                db.clone(),
                Table::Inbox,
                RecordLayout::Tupled,
            )),
            bundles: KeyBundlePool::new(Collection::new(
                db.clone(),
                Table::Bundles,
                RecordLayout::Tupled,
            )),
            outbox: Arc::new(OutboxQueue::new(Collection::new(
                db,
                Table::Outbox,
                layout.outbox(),
            ))),
            session,
            codec,
            relay: Mutex::new(None),
            id_locks: KeyLocks::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Identity
    // -----------------------------------------------------------------------

    /// Resolve the caller of a request from its `Authorization` header.
    pub async fn authenticate(&self, auth_header: Option<&str>) -> Result<UserId, NodeError> {
        let header = auth_header.ok_or_else(|| {
            NodeError::UpstreamAuthFailure("missing authorization header".to_string())
        })?;
        Ok(self.session.digest_token(header).await?)
    }

    // -----------------------------------------------------------------------
    // Datagrams
    // -----------------------------------------------------------------------

    /// Persist a decoded batch uploaded by `uploader`.
    ///
    /// Nothing is written unless the whole batch is valid. Returns the number
    /// of datagrams accepted.
    pub async fn ingest(&self, uploader: &UserId, batch: Vec<Datagram>) -> Result<usize, NodeError> {
        let plan = classify(uploader, batch)?;
        if plan.is_empty() {
            return Ok(0);
        }
        let accepted = plan.len();

        // Sorted so two batches sharing ids always lock them in the same order.
        let mut ids: Vec<DatagramId> = plan
            .stored
            .iter()
            .chain(&plan.relayed)
            .map(|d| d.id)
            .collect();
        ids.sort();
        let mut guards = Vec::with_capacity(ids.len());
        for id in &ids {
            guards.push(self.id_locks.lock(id).await);
        }

        let plan = self.settle(plan).await?;

        for datagram in &plan.stored {
            self.datagrams.insert_unseen(datagram.clone()).await?;
        }
        for (receiver, ids) in &plan.inbox {
            self.inbox.append(receiver, ids).await?;
        }
        for datagram in &plan.relayed {
            self.outbox.enqueue(datagram).await?;
        }
        drop(guards);

        info!(
            uploader = %uploader.short(),
            stored = plan.stored.len(),
            relayed = plan.relayed.len(),
            retried = accepted - plan.len(),
            "batch ingested"
        );
        Ok(accepted)
    }

    /// Check every datagram of `plan` against what is already persisted and
    /// drop the exact repeats of earlier uploads.
    ///
    /// A datagram id lives in the datagram store or the outbox, never both,
    /// and a stored id is never rebound to different content. Repeats are
    /// left untouched, including their seen flag. Must run under the id locks.
    async fn settle(&self, mut plan: IngestPlan) -> Result<IngestPlan, NodeError> {
        let mut repeats = HashSet::new();

        for datagram in &plan.stored {
            if self.outbox.contains(&datagram.id).await? {
                return Err(violation(datagram, "id already queued for relay"));
            }
            match self.datagrams.get(&datagram.id).await? {
                Some(existing) if existing.datagram == *datagram => {
                    repeats.insert(datagram.id);
                }
                Some(_) => return Err(violation(datagram, "id already in use")),
                None => {}
            }
        }
        for datagram in &plan.relayed {
            if self.datagrams.contains(&datagram.id).await? {
                return Err(violation(datagram, "id already stored for delivery"));
            }
            match self.outbox.get(&datagram.id).await? {
                Some(existing) if existing == *datagram => {
                    repeats.insert(datagram.id);
                }
                Some(_) => return Err(violation(datagram, "id already in use")),
                None => {}
            }
        }

        if !repeats.is_empty() {
            plan.stored.retain(|d| !repeats.contains(&d.id));
            plan.relayed.retain(|d| !repeats.contains(&d.id));
            plan.inbox.retain(|_, ids| {
                ids.retain(|id| !repeats.contains(id));
                !ids.is_empty()
            });
        }
        Ok(plan)
    }

    /// Decrypt, decode and ingest an uploaded body.
    pub async fn receive(&self, user: &UserId, ciphertext: &[u8]) -> Result<usize, NodeError> {
        let plaintext = self.session.decrypt_data(ciphertext, user).await?;
        let batch = self.codec.unpack_datagrams(&plaintext)?;
        self.ingest(user, batch).await
    }

    /// Every datagram not yet handed to `user`; they are marked seen.
    pub async fn collect(&self, user: &UserId) -> Result<Vec<Datagram>, NodeError> {
        Ok(self.inbox.take_unseen(user, &self.datagrams).await?)
    }

    /// [`collect`](Self::collect), encoded and encrypted for `user`.
    pub async fn deliver(&self, user: &UserId) -> Result<Vec<u8>, NodeError> {
        let datagrams = self.collect(user).await?;
        let plaintext = self.codec.pack_datagrams(&datagrams)?;
        Ok(self.session.encrypt_data(&plaintext, user).await?)
    }

    /// Delete the datagrams whose ids `user` lists in an encrypted id list.
    pub async fn acknowledge(&self, user: &UserId, ciphertext: &[u8]) -> Result<usize, NodeError> {
        let plaintext = self.session.decrypt_data(ciphertext, user).await?;
        let ids = self.codec.unpack_id_list(&plaintext)?;
        let removed = self.inbox.acknowledge(user, &ids, &self.datagrams).await?;
        debug!(user = %user.short(), requested = ids.len(), removed, "datagrams acknowledged");
        Ok(removed)
    }

    // -----------------------------------------------------------------------
    // Handshake
    // -----------------------------------------------------------------------

    /// The node's own key-exchange material.
    pub async fn node_key_exchange(&self) -> Result<Vec<u8>, NodeError> {
        Ok(self.session.generate_key_exchange().await?)
    }

    /// Digest a client's key-exchange message, opening its session.
    pub async fn open_session(&self, message: &[u8]) -> Result<UserId, NodeError> {
        let outcome = self.session.digest_key_exchange(message).await?;
        info!(user = %outcome.user_id.short(), "session opened");
        Ok(outcome.user_id)
    }

    /// One prekey of `target`'s bundle, encoded for the requester.
    pub async fn fetch_key_exchange(&self, target: &UserId) -> Result<Vec<u8>, NodeError> {
        let data = self.bundles.consume_one(target).await?;
        Ok(self.codec.pack_key_exchange(&data)?)
    }

    /// Publish (or replace) the caller's bundle.
    pub async fn publish_bundle(&self, user: &UserId, ciphertext: &[u8]) -> Result<(), NodeError> {
        let plaintext = self.session.decrypt_data(ciphertext, user).await?;
        let bundle = self.codec.unpack_bundle(&plaintext)?;
        if bundle.owner() != *user {
            return Err(NodeError::UpstreamAuthFailure(
                "bundle public key does not belong to caller".to_string(),
            ));
        }
        self.bundles.register(&bundle).await?;
        Ok(())
    }

    pub async fn revoke_bundle(&self, user: &UserId) -> Result<(), NodeError> {
        if self.bundles.revoke(user).await? {
            Ok(())
        } else {
            Err(NodeError::NotFound)
        }
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Start draining the outbox through `transport`. A running worker is
    /// replaced.
    pub async fn start_relay(&self, transport: Arc<dyn RelayTransport>, period: Duration) {
        let worker = RelayWorker::start(self.outbox.clone(), transport, period);
        if let Some(previous) = self.relay.lock().await.replace(worker) {
            previous.shutdown().await;
        }
    }

    pub async fn relay_running(&self) -> bool {
        self.relay
            .lock()
            .await
            .as_ref()
            .is_some_and(RelayWorker::is_running)
    }

    /// Stop background work. Safe to call more than once.
    pub async fn shutdown(&self) {
        if let Some(worker) = self.relay.lock().await.take() {
            worker.shutdown().await;
        }
    }

    pub async fn status(&self) -> Result<NodeStatus, NodeError> {
        Ok(NodeStatus {
            stored_datagrams: self.datagrams.len().await?,
            inboxes: self.inbox.len().await?,
            bundles: self.bundles.len().await?,
            outbox: self.outbox.len().await?,
        })
    }
}

fn violation(datagram: &Datagram, reason: &str) -> NodeError {
    NodeError::ProtocolViolation {
        id: datagram.id,
        reason: reason.to_string(),
    }
}
