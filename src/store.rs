//! sled-backed persistence for trades and their satellite records.
//!
//! All records live in the default tree under namespaced keys:
//!
//! - `trade:{trade_id}` -> [`Trade`]
//! - `inspection:{inspection_id}` -> [`Inspection`]
//! - `trade_inspections:{trade_id}` -> ordered inspection ids of that trade
//! - `logistics:{trade_id}` -> [`Logistics`]
//!
//! Writes are staged into a [`Batch`] and applied in one go by [`Store::commit`].
use crate::error::{LifecycleError, Result};
use crate::model::{AssignmentStatus, Inspection, Logistics, Trade};
use sled::{Batch, Db};
use std::sync::Arc;
use tracing::debug;

const TRADE: &str = "trade:";
const INSPECTION: &str = "inspection:";
const TRADE_INSPECTIONS: &str = "trade_inspections:";
const LOGISTICS: &str = "logistics:";

pub(crate) fn encode<T: minicbor::Encode<()>>(value: &T) -> Result<Vec<u8>> {
    Ok(minicbor::to_vec(value)?)
}

pub(crate) fn decode<T: for<'b> minicbor::Decode<'b, ()>>(bytes: &[u8]) -> Result<T> {
    Ok(minicbor::decode(bytes)?)
}

/// The inspection that currently governs a trade: the most recently created
/// one whose assignment was not rejected.
pub fn select_active(history: &[Inspection]) -> Option<&Inspection> {
    history
        .iter()
        .rev()
        .find(|inspection| inspection.assignment_status != AssignmentStatus::Rejected)
}

#[derive(Debug, Clone)]
pub struct Store {
    instance: Arc<Db>,
    flush_on_commit: bool,
}

impl Store {
    pub fn new(instance: Arc<Db>, flush_on_commit: bool) -> Self {
        Self {
            instance,
            flush_on_commit,
        }
    }

    pub fn db(&self) -> &Arc<Db> {
        &self.instance
    }

    fn get<T: for<'b> minicbor::Decode<'b, ()>>(&self, key: String) -> Result<Option<T>> {
        match self.instance.get(key.as_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn scan<T: for<'b> minicbor::Decode<'b, ()>>(&self, prefix: &str) -> Result<Vec<T>> {
        self.instance
            .scan_prefix(prefix.as_bytes())
            .map(|entry| {
                let (_, bytes) = entry?;
                decode(&bytes)
            })
            .collect()
    }

    /// Applies every staged write atomically.
    pub fn commit(&self, batch: Batch) -> Result<()> {
        self.instance.apply_batch(batch)?;
        if self.flush_on_commit {
            self.instance.flush()?;
        }
        Ok(())
    }

    pub fn load_trade(&self, trade_id: &str) -> Result<Option<Trade>> {
        self.get(format!("{TRADE}{trade_id}"))
    }

    pub fn require_trade(&self, trade_id: &str) -> Result<Trade> {
        self.load_trade(trade_id)?
            .ok_or_else(|| LifecycleError::not_found("Trade", trade_id))
    }

    /// Every trade, oldest first.
    pub fn trades(&self) -> Result<Vec<Trade>> {
        let mut trades: Vec<Trade> = self.scan(TRADE)?;
        trades.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(trades)
    }

    pub fn stage_trade(&self, batch: &mut Batch, trade: &Trade) -> Result<()> {
        debug!(trade_id = %trade.id, status = %trade.status, "staging trade");
        batch.insert(format!("{TRADE}{}", trade.id).as_bytes(), encode(trade)?);
        Ok(())
    }

    pub fn load_inspection(&self, inspection_id: &str) -> Result<Option<Inspection>> {
        self.get(format!("{INSPECTION}{inspection_id}"))
    }

    pub fn inspection_ids(&self, trade_id: &str) -> Result<Vec<String>> {
        let ids: Option<Vec<String>> = self.get(format!("{TRADE_INSPECTIONS}{trade_id}"))?;
        Ok(ids.unwrap_or_default())
    }

    /// All inspections of a trade in creation order, rejected ones included.
    pub fn inspection_history(&self, trade_id: &str) -> Result<Vec<Inspection>> {
        self.inspection_ids(trade_id)?
            .iter()
            .map(|id| {
                self.load_inspection(id)?
                    .ok_or_else(|| LifecycleError::not_found("Inspection", id.as_str()))
            })
            .collect()
    }

    pub fn active_inspection(&self, trade_id: &str) -> Result<Option<Inspection>> {
        let history = self.inspection_history(trade_id)?;
        Ok(select_active(&history).cloned())
    }

    pub fn inspections(&self) -> Result<Vec<Inspection>> {
        self.scan(INSPECTION)
    }

    pub fn stage_inspection(&self, batch: &mut Batch, inspection: &Inspection) -> Result<()> {
        debug!(
            inspection_id = %inspection.id,
            trade_id = %inspection.trade_id,
            assignment = %inspection.assignment_status,
            "staging inspection"
        );
        batch.insert(
            format!("{INSPECTION}{}", inspection.id).as_bytes(),
            encode(inspection)?,
        );
        Ok(())
    }

    /// Stages a new inspection together with the grown history index.
    pub fn stage_new_inspection(&self, batch: &mut Batch, inspection: &Inspection) -> Result<()> {
        let mut ids = self.inspection_ids(&inspection.trade_id)?;
        ids.push(inspection.id.clone());
        batch.insert(
            format!("{TRADE_INSPECTIONS}{}", inspection.trade_id).as_bytes(),
            encode(&ids)?,
        );
        self.stage_inspection(batch, inspection)
    }

    pub fn load_logistics(&self, trade_id: &str) -> Result<Option<Logistics>> {
        self.get(format!("{LOGISTICS}{trade_id}"))
    }

    pub fn stage_logistics(&self, batch: &mut Batch, logistics: &Logistics) -> Result<()> {
        debug!(trade_id = %logistics.trade_id, status = %logistics.status, "staging logistics");
        batch.insert(
            format!("{LOGISTICS}{}", logistics.trade_id).as_bytes(),
            encode(logistics)?,
        );
        Ok(())
    }
}
