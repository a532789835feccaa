//! Shipment tracking for trades that passed inspection.
//!
//! Status strings are not validated against a closed set: any value is stored
//! as given. Only `DELIVERED` (in any case) has an effect, completing the trade.
use crate::engine::TradeEngine;
use crate::error::{LifecycleError, Result};
use crate::event_log::EventKind;
use crate::model::Logistics;
use crate::transition::Trigger;
use sled::Batch;
use tracing::{info, warn};

impl TradeEngine {
    pub fn update_logistics(
        &self,
        trade_id: &str,
        status: &str,
        current_location: &str,
    ) -> Result<Logistics> {
        self.locks
            .with_lock(trade_id, || -> Result<Logistics> {
                let mut logistics = self
                    .store
                    .load_logistics(trade_id)?
                    .ok_or_else(|| LifecycleError::not_found("Logistics for trade", trade_id))?;
                let mut trade = self.store.require_trade(trade_id)?;

                logistics.status = status.to_string();
                logistics.current_location = current_location.to_string();

                let mut batch = Batch::default();
                let step = if logistics.is_delivered() {
                    Some(self.advance(&mut batch, &mut trade, Trigger::Delivered)?)
                } else {
                    None
                };
                self.store.stage_logistics(&mut batch, &logistics)?;

                let mut description = format!(
                    "Shipment {} is {} at {}",
                    logistics.tracking_id, logistics.status, logistics.current_location
                );
                if let Some(step) = step.filter(|step| step.from != step.to) {
                    description.push_str(&format!(
                        "; status changed from {} to {}",
                        step.from, step.to
                    ));
                }
                self.events.stage(
                    &mut batch,
                    trade_id,
                    EventKind::LogisticsUpdate.as_str(),
                    description,
                )?;
                self.store.commit(batch)?;
                info!(
                    trade_id,
                    tracking_id = %logistics.tracking_id,
                    status = %logistics.status,
                    location = %logistics.current_location,
                    "logistics updated"
                );

                if let Some(step) = step {
                    self.settle_crop(&trade.crop_id, step)?;
                }
                Ok(logistics)
            })
            .inspect_err(|err| warn!(trade_id, status, %err, "logistics update rejected"))
    }

    pub fn get_logistics(&self, trade_id: &str) -> Result<Option<Logistics>> {
        self.store.load_logistics(trade_id)
    }
}
