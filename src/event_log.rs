//! Append-only audit trail of trade lifecycle changes.
//!
//! Events are stored under `event:{trade_id}:{sequence}` with the sequence
//! big-endian encoded, so a prefix scan yields a trade's history oldest first.
//! Each event carries the digest of its predecessor, which lets
//! [`EventLog::verify_chain`] detect a rewritten or missing entry.
use crate::collaborators::Clock;
use crate::error::{LifecycleError, Result};
use crate::locks::TradeLocks;
use crate::model::TimeStamp;
use crate::store::{Store, decode, encode};
use chrono::Utc;
use sled::Batch;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Category tags written by the lifecycle operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    TradeInitiated,
    StatusChange,
    InspectorAssigned,
    InspectionAccepted,
    InspectionRejected,
    InspectionCompleted,
    LogisticsUpdate,
    ForceClosed,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::TradeInitiated => "TRADE_INITIATED",
            EventKind::StatusChange => "STATUS_CHANGE",
            EventKind::InspectorAssigned => "INSPECTOR_ASSIGNED",
            EventKind::InspectionAccepted => "INSPECTION_ACCEPTED",
            EventKind::InspectionRejected => "INSPECTION_REJECTED",
            EventKind::InspectionCompleted => "INSPECTION_COMPLETED",
            EventKind::LogisticsUpdate => "LOGISTICS_UPDATE",
            EventKind::ForceClosed => "FORCE_CLOSED",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, PartialEq, Eq, minicbor::Encode, minicbor::Decode, Clone)]
pub struct TradeEvent {
    #[n(0)]
    pub trade_id: String,
    #[n(1)]
    pub sequence: u64, // 0 for the first event of a trade
    #[n(2)]
    pub event_type: String,
    #[n(3)]
    pub description: String,
    #[n(4)]
    pub timestamp: TimeStamp<Utc>,
    #[n(5)]
    pub prev_hash: String, // digest of the previous event, empty for the first
}

impl TradeEvent {
    /// CBOR encoding of the event and its sha256 digest.
    pub fn build(&self) -> Result<(String, Vec<u8>)> {
        let cbor = encode(self)?;
        let hash = sha256::digest(&cbor);

        Ok((hash, cbor))
    }
}

fn prefix(trade_id: &str) -> String {
    format!("event:{trade_id}:")
}

fn key(trade_id: &str, sequence: u64) -> Vec<u8> {
    let mut key = prefix(trade_id).into_bytes();
    key.extend_from_slice(&sequence.to_be_bytes());
    key
}

#[derive(Clone)]
pub struct EventLog {
    store: Store,
    clock: Arc<dyn Clock>,
    locks: Arc<TradeLocks>,
}

impl EventLog {
    pub fn new(store: Store, clock: Arc<dyn Clock>, locks: Arc<TradeLocks>) -> Self {
        Self {
            store,
            clock,
            locks,
        }
    }

    /// The latest event of a trade, if any.
    pub fn head(&self, trade_id: &str) -> Result<Option<TradeEvent>> {
        match self
            .store
            .db()
            .scan_prefix(prefix(trade_id).as_bytes())
            .next_back()
        {
            Some(entry) => {
                let (_, bytes) = entry?;
                Ok(Some(decode(&bytes)?))
            }
            None => Ok(None),
        }
    }

    /// Stages the next event of a trade into `batch`.
    ///
    /// The caller must hold the trade's lock until the batch is committed,
    /// otherwise two stagers could claim the same sequence.
    pub fn stage(
        &self,
        batch: &mut Batch,
        trade_id: &str,
        event_type: impl Into<String>,
        description: impl Into<String>,
    ) -> Result<TradeEvent> {
        let (sequence, prev_hash) = match self.head(trade_id)? {
            Some(head) => (head.sequence + 1, head.build()?.0),
            None => (0, String::new()),
        };

        let event = TradeEvent {
            trade_id: trade_id.to_string(),
            sequence,
            event_type: event_type.into(),
            description: description.into(),
            timestamp: self.clock.now(),
            prev_hash,
        };
        let (_, cbor) = event.build()?;
        batch.insert(key(trade_id, sequence), cbor);

        debug!(trade_id, sequence, event_type = %event.event_type, "staged event");
        Ok(event)
    }

    /// Appends one event to an existing trade and commits it on its own.
    pub fn append(
        &self,
        trade_id: &str,
        event_type: impl Into<String>,
        description: impl Into<String>,
    ) -> Result<TradeEvent> {
        self.locks.with_lock(trade_id, || -> Result<TradeEvent> {
            self.store.require_trade(trade_id)?;

            let mut batch = Batch::default();
            let event = self.stage(&mut batch, trade_id, event_type, description)?;
            self.store.commit(batch)?;

            info!(trade_id, sequence = event.sequence, event_type = %event.event_type, "appended event");
            Ok(event)
        })
    }

    /// Every event of a trade, oldest first.
    pub fn list_for_trade(&self, trade_id: &str) -> Result<Vec<TradeEvent>> {
        self.store
            .db()
            .scan_prefix(prefix(trade_id).as_bytes())
            .map(|entry| {
                let (_, bytes) = entry?;
                decode(&bytes)
            })
            .collect()
    }

    /// Checks that sequences are contiguous from zero and that every event
    /// points at the digest of the one before it.
    pub fn verify_chain(&self, trade_id: &str) -> Result<()> {
        let mut expected_prev = String::new();

        for (position, event) in self.list_for_trade(trade_id)?.into_iter().enumerate() {
            if event.sequence != position as u64 || event.prev_hash != expected_prev {
                return Err(LifecycleError::BrokenChain {
                    trade_id: trade_id.to_string(),
                    sequence: position as u64,
                });
            }
            expected_prev = event.build()?.0;
        }

        Ok(())
    }
}

impl fmt::Debug for EventLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLog").field("store", &self.store).finish()
    }
}
