//! Classification of freshly received datagram batches.
//!
//! [`classify`] validates a whole batch and sorts it into an
//! [`IngestPlan`] without touching storage, so a batch containing a single
//! bad datagram is rejected before anything from it is persisted.

use std::collections::{BTreeMap, HashSet};

use pizzino_shared::{Datagram, DatagramId, Protocol, UserId};

use crate::error::NodeError;

/// Where each datagram of a validated batch goes.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct IngestPlan {
    /// MESSAGE datagrams, stored for their receivers.
    pub stored: Vec<Datagram>,
    /// RELAY datagrams, queued for a downstream node.
    pub relayed: Vec<Datagram>,
    /// One inbox append per distinct receiver, ids in batch order.
    pub inbox: BTreeMap<UserId, Vec<DatagramId>>,
}

impl IngestPlan {
    pub fn len(&self) -> usize {
        self.stored.len() + self.relayed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Sort a batch uploaded by `uploader` by protocol tag.
///
/// Fails on the first datagram that carries an unrecognised tag, claims a
/// different sender, or repeats an id already seen in the batch.
pub fn classify(uploader: &UserId, batch: Vec<Datagram>) -> Result<IngestPlan, NodeError> {
    let mut plan = IngestPlan::default();
    let mut ids = HashSet::with_capacity(batch.len());

    for datagram in batch {
        if datagram.sender != *uploader {
            return Err(violation(&datagram, "sender does not match uploader"));
        }
        if !ids.insert(datagram.id) {
            return Err(violation(&datagram, "duplicate id in batch"));
        }

        let protocol = datagram.protocol;
        match protocol {
            Protocol::Message => {
                plan.inbox
                    .entry(datagram.receiver)
                    .or_default()
                    .push(datagram.id);
                plan.stored.push(datagram);
            }
            Protocol::Relay => plan.relayed.push(datagram),
            other => {
                return Err(violation(&datagram, &format!("unexpected protocol {other}")));
            }
        }
    }

    Ok(plan)
}

fn violation(datagram: &Datagram, reason: &str) -> NodeError {
    NodeError::ProtocolViolation {
        id: datagram.id,
        reason: reason.to_string(),
    }
}
