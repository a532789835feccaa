//! Trade lifecycle engine.
//!
//! Owns trade creation and every status change. Each mutating call runs
//! load, guard, mutate and event staging under the trade's lock and commits
//! the record change and its audit event in one sled batch.
use crate::collaborators::{Clock, CropStore, SystemClock, UserDirectory};
use crate::config::EngineConfig;
use crate::error::{LifecycleError, Result};
use crate::event_log::{EventKind, EventLog, TradeEvent};
use crate::locks::TradeLocks;
use crate::model::{ActingUser, Crop, CropStatus, Role, Trade, TradeStatus, UserRecord};
use crate::store::Store;
use crate::transition::{self, Trigger};
use crate::utils;
use sled::{Batch, Db};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One applied move of a trade's status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub from: TradeStatus,
    pub to: TradeStatus,
}

pub struct TradeEngine {
    pub(crate) store: Store,
    pub(crate) events: EventLog,
    pub(crate) crops: Arc<dyn CropStore>,
    pub(crate) users: Arc<dyn UserDirectory>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) locks: Arc<TradeLocks>,
}

impl TradeEngine {
    pub fn new(
        instance: Arc<Db>,
        crops: Arc<dyn CropStore>,
        users: Arc<dyn UserDirectory>,
    ) -> Self {
        Self::assemble(Store::new(instance, false), crops, users, Arc::new(SystemClock))
    }

    pub fn from_config(
        config: &EngineConfig,
        crops: Arc<dyn CropStore>,
        users: Arc<dyn UserDirectory>,
    ) -> Result<Self> {
        let store = Store::new(Arc::new(config.open()?), config.flush_on_commit);
        Ok(Self::assemble(store, crops, users, Arc::new(SystemClock)))
    }

    /// Replaces the clock used for trade and event timestamps.
    pub fn with_clock(self, clock: Arc<dyn Clock>) -> Self {
        Self::assemble(self.store, self.crops, self.users, clock)
    }

    fn assemble(
        store: Store,
        crops: Arc<dyn CropStore>,
        users: Arc<dyn UserDirectory>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let locks = Arc::new(TradeLocks::new());
        let events = EventLog::new(store.clone(), clock.clone(), locks.clone());
        Self {
            store,
            events,
            crops,
            users,
            clock,
            locks,
        }
    }

    pub fn event_log(&self) -> &EventLog {
        &self.events
    }

    pub(crate) fn require_crop(&self, crop_id: &str) -> Result<Crop> {
        self.crops
            .get(crop_id)?
            .ok_or_else(|| LifecycleError::not_found("Crop", crop_id))
    }

    pub(crate) fn require_user(&self, user_id: &str) -> Result<UserRecord> {
        self.users
            .get(user_id)?
            .ok_or_else(|| LifecycleError::not_found("User", user_id))
    }

    /// Moves `trade` along the transition table and stages the new record.
    /// Nothing reaches the database until the batch is committed.
    pub(crate) fn advance(&self, batch: &mut Batch, trade: &mut Trade, trigger: Trigger) -> Result<Step> {
        let from = trade.status;
        let to = transition::next_status(&trade.id, from, trigger)?;
        trade.status = to;
        self.store.stage_trade(batch, trade)?;
        Ok(Step { from, to })
    }

    /// Finalizes the crop side of a step: reaching AGREED or COMPLETED sells a
    /// crop that is still AVAILABLE. Repeating it changes nothing.
    ///
    /// Runs only after the step's batch has committed. The crop lives outside
    /// sled, so a failure here leaves the committed step in place and is
    /// returned to the caller, who may repeat the call.
    pub(crate) fn settle_crop(&self, crop_id: &str, step: Step) -> Result<()> {
        if !transition::settles_crop(step.to) {
            return Ok(());
        }
        match self.crops.get(crop_id)? {
            Some(crop) if crop.status == CropStatus::Available => {
                self.crops.set_status(crop_id, CropStatus::Sold)?;
                info!(crop_id, trade_status = %step.to, "crop marked SOLD");
            }
            Some(_) => debug!(crop_id, "crop already settled"),
            None => warn!(crop_id, "crop missing while settling trade"),
        }
        Ok(())
    }

    /// Opens a trade request from `buyer` on a crop.
    pub fn initiate(
        &self,
        buyer: &ActingUser,
        crop_id: &str,
        offer_price: Option<u64>,
    ) -> Result<Trade> {
        // serialise duplicate requests from one buyer on one crop
        let key = format!("initiate:{crop_id}:{}", buyer.id);
        self.locks
            .with_lock(&key, || -> Result<Trade> {
                if buyer.role == Role::Farmer {
                    return Err(LifecycleError::PermissionDenied(
                        "Farmers cannot initiate purchase".into(),
                    ));
                }
                if !buyer.kyc_verified {
                    return Err(LifecycleError::precondition(
                        format!("User {}", buyer.id),
                        "KYC-verified",
                        "unverified",
                    ));
                }

                let crop = self.require_crop(crop_id)?;

                let already_pending = self.store.trades()?.iter().any(|trade| {
                    trade.buyer_id == buyer.id
                        && trade.crop_id == crop.id
                        && trade.status.is_open_request()
                });
                if already_pending {
                    return Err(LifecycleError::Conflict(format!(
                        "user {} already has a pending request for crop {}",
                        buyer.id, crop.id
                    )));
                }
                if crop.status != CropStatus::Available {
                    return Err(LifecycleError::precondition(
                        format!("Crop {}", crop.id),
                        CropStatus::Available,
                        crop.status,
                    ));
                }
                if crop.farmer_id == buyer.id {
                    return Err(LifecycleError::PermissionDenied(
                        "You cannot buy your own crop".into(),
                    ));
                }

                let trade = Trade {
                    id: utils::new_uuid_to_bech32("trade")?,
                    crop_id: crop.id.clone(),
                    buyer_id: buyer.id.clone(),
                    farmer_id: crop.farmer_id.clone(),
                    status: TradeStatus::Requested,
                    final_price: offer_price.unwrap_or(crop.price_per_unit),
                    created_at: self.clock.now(),
                };

                let mut batch = Batch::default();
                self.store.stage_trade(&mut batch, &trade)?;
                self.events.stage(
                    &mut batch,
                    &trade.id,
                    EventKind::TradeInitiated.as_str(),
                    format!("Trade request created by {}", buyer.id),
                )?;
                self.store.commit(batch)?;

                info!(trade_id = %trade.id, crop_id, buyer_id = %buyer.id, price = trade.final_price, "trade initiated");
                Ok(trade)
            })
            .inspect_err(|err| warn!(crop_id, buyer_id = %buyer.id, %err, "trade request rejected"))
    }

    /// Sets a trade's status directly. Requesting the current status is a
    /// no-op that writes no event.
    pub fn update_status(
        &self,
        trade_id: &str,
        requested: TradeStatus,
        acting_user: &ActingUser,
    ) -> Result<Trade> {
        self.locks
            .with_lock(trade_id, || -> Result<Trade> {
                let mut trade = self.store.require_trade(trade_id)?;

                if acting_user.role != Role::Admin && !trade.is_party(&acting_user.id) {
                    return Err(LifecycleError::PermissionDenied(format!(
                        "user {} is not a party to trade {trade_id}",
                        acting_user.id
                    )));
                }
                if trade.status == requested {
                    debug!(trade_id, status = %requested, "status unchanged");
                    // completes a settle left undone by an earlier call
                    self.settle_crop(&trade.crop_id, Step { from: requested, to: requested })?;
                    return Ok(trade);
                }

                let mut batch = Batch::default();
                let step = self.advance(&mut batch, &mut trade, Trigger::Manual(requested))?;
                self.events.stage(
                    &mut batch,
                    trade_id,
                    EventKind::StatusChange.as_str(),
                    format!("Status changed from {} to {}", step.from, step.to),
                )?;
                self.store.commit(batch)?;
                info!(trade_id, from = %step.from, to = %step.to, actor = %acting_user.id, "status changed");

                self.settle_crop(&trade.crop_id, step)?;
                Ok(trade)
            })
            .inspect_err(|err| warn!(trade_id, %err, "status change rejected"))
    }

    /// Resolves a DISPUTED trade: COMPLETED in the buyer's favour, otherwise
    /// CANCELLED. Admin authorization is the caller's job.
    pub fn force_close(&self, trade_id: &str, resolve_to_buyer: bool) -> Result<Trade> {
        self.locks
            .with_lock(trade_id, || -> Result<Trade> {
                let mut trade = self.store.require_trade(trade_id)?;

                let mut batch = Batch::default();
                let step = self.advance(
                    &mut batch,
                    &mut trade,
                    Trigger::ForceClose { resolve_to_buyer },
                )?;
                self.events.stage(
                    &mut batch,
                    trade_id,
                    EventKind::ForceClosed.as_str(),
                    format!("Status changed from {} to {}", step.from, step.to),
                )?;
                self.store.commit(batch)?;
                info!(trade_id, to = %step.to, resolve_to_buyer, "dispute force-closed");

                self.settle_crop(&trade.crop_id, step)?;
                Ok(trade)
            })
            .inspect_err(|err| warn!(trade_id, %err, "force-close rejected"))
    }

    pub fn get_trade(&self, trade_id: &str) -> Result<Trade> {
        self.store.require_trade(trade_id)
    }

    /// Trades the user sells as a farmer, otherwise the trades they buy.
    /// Oldest first.
    pub fn list_my_trades(&self, user: &ActingUser) -> Result<Vec<Trade>> {
        let trades = self.store.trades()?;
        Ok(trades
            .into_iter()
            .filter(|trade| match user.role {
                Role::Farmer => trade.farmer_id == user.id,
                _ => trade.buyer_id == user.id,
            })
            .collect())
    }

    /// All trades currently in `status`, oldest first. With AGREED this is the
    /// pool of trades waiting for an inspector.
    pub fn list_trades_by_status(&self, status: TradeStatus) -> Result<Vec<Trade>> {
        let trades = self.store.trades()?;
        Ok(trades
            .into_iter()
            .filter(|trade| trade.status == status)
            .collect())
    }

    /// The complete audit trail of a trade, oldest first.
    pub fn list_events(&self, trade_id: &str) -> Result<Vec<TradeEvent>> {
        self.store.require_trade(trade_id)?;
        self.events.list_for_trade(trade_id)
    }
}

impl std::fmt::Debug for TradeEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TradeEngine")
            .field("store", &self.store)
            .field("locks", &self.locks)
            .finish_non_exhaustive()
    }
}
