//! Inspection workflow: inspector assignment, the inspector's response and the
//! recorded result.
//!
//! A trade keeps every inspection it ever had. Rejected assignments stay in the
//! history; the active inspection is the latest one not rejected.
use crate::engine::TradeEngine;
use crate::error::{LifecycleError, Result};
use crate::event_log::EventKind;
use crate::model::{
    ActingUser, AssignmentStatus, Inspection, InspectionResult, Logistics, Role,
};
use crate::transition::{self, Trigger};
use crate::utils;
use sled::Batch;
use tracing::{debug, info, warn};

impl TradeEngine {
    /// Puts an AGREED trade in front of an inspector.
    pub fn assign_inspector(&self, trade_id: &str, inspector_id: &str) -> Result<Inspection> {
        self.locks
            .with_lock(trade_id, || -> Result<Inspection> {
                let mut trade = self.store.require_trade(trade_id)?;
                // phase guard runs before the inspector lookup
                transition::next_status(trade_id, trade.status, Trigger::AssignInspector)?;

                let inspector = self.require_user(inspector_id)?;
                if inspector.role != Role::Inspector {
                    return Err(LifecycleError::PermissionDenied(format!(
                        "user {inspector_id} is not an inspector"
                    )));
                }

                let inspection = Inspection {
                    id: utils::new_uuid_to_bech32("insp")?,
                    trade_id: trade_id.to_string(),
                    inspector_id: Some(inspector.id.clone()),
                    sequence: self.store.inspection_ids(trade_id)?.len() as u32,
                    assignment_status: AssignmentStatus::Requested,
                    inspection_result: InspectionResult::Pending,
                    grade: None,
                    certificate_url: None,
                    requested_at: self.clock.now(),
                };

                let mut batch = Batch::default();
                let step = self.advance(&mut batch, &mut trade, Trigger::AssignInspector)?;
                self.store.stage_new_inspection(&mut batch, &inspection)?;
                self.events.stage(
                    &mut batch,
                    trade_id,
                    EventKind::InspectorAssigned.as_str(),
                    format!(
                        "Inspector {} assigned; status changed from {} to {}",
                        inspector.id, step.from, step.to
                    ),
                )?;
                self.store.commit(batch)?;

                info!(trade_id, inspection_id = %inspection.id, inspector_id, "inspector assigned");
                Ok(inspection)
            })
            .inspect_err(|err| warn!(trade_id, inspector_id, %err, "inspector assignment rejected"))
    }

    /// The inspector accepts or declines an assignment. Declining sends the
    /// trade back to AGREED and keeps the declined row as history.
    pub fn respond_to_assignment(&self, inspection_id: &str, accepted: bool) -> Result<Inspection> {
        let trade_id = self
            .store
            .load_inspection(inspection_id)?
            .ok_or_else(|| LifecycleError::not_found("Inspection", inspection_id))?
            .trade_id;

        self.locks
            .with_lock(&trade_id, || -> Result<Inspection> {
                // re-read under the lock; the first read only located the trade
                let mut inspection = self
                    .store
                    .load_inspection(inspection_id)?
                    .ok_or_else(|| LifecycleError::not_found("Inspection", inspection_id))?;
                if inspection.assignment_status != AssignmentStatus::Requested {
                    return Err(LifecycleError::precondition(
                        format!("Inspection {inspection_id}"),
                        AssignmentStatus::Requested,
                        inspection.assignment_status,
                    ));
                }

                let mut trade = self.store.require_trade(&trade_id)?;
                let (trigger, assignment_status, kind) = if accepted {
                    (
                        Trigger::AcceptAssignment,
                        AssignmentStatus::Accepted,
                        EventKind::InspectionAccepted,
                    )
                } else {
                    (
                        Trigger::RejectAssignment,
                        AssignmentStatus::Rejected,
                        EventKind::InspectionRejected,
                    )
                };

                let mut batch = Batch::default();
                let step = self.advance(&mut batch, &mut trade, trigger)?;
                inspection.assignment_status = assignment_status;
                self.store.stage_inspection(&mut batch, &inspection)?;
                self.events.stage(
                    &mut batch,
                    &trade_id,
                    kind.as_str(),
                    format!(
                        "Inspection {inspection_id} {assignment_status}; status changed from {} to {}",
                        step.from, step.to
                    ),
                )?;
                self.store.commit(batch)?;
                info!(trade_id = %trade_id, inspection_id, %assignment_status, "assignment answered");

                self.settle_crop(&trade.crop_id, step)?;
                Ok(inspection)
            })
            .inspect_err(|err| warn!(inspection_id, %err, "assignment response rejected"))
    }

    /// Records the inspector's verdict. A pass ships the trade and opens its
    /// logistics record; anything else puts the trade in dispute.
    pub fn complete_inspection(
        &self,
        trade_id: &str,
        result: &str,
        grade: &str,
        certificate_url: &str,
    ) -> Result<Inspection> {
        self.locks
            .with_lock(trade_id, || -> Result<Inspection> {
                let mut trade = self.store.require_trade(trade_id)?;
                let mut inspection = self
                    .store
                    .active_inspection(trade_id)?
                    .ok_or_else(|| LifecycleError::not_found("Inspection for trade", trade_id))?;

                let verdict = InspectionResult::from_verdict(result);
                let trigger = match verdict {
                    InspectionResult::Passed => Trigger::InspectionPassed,
                    _ => Trigger::InspectionFailed,
                };

                let mut batch = Batch::default();
                let step = self.advance(&mut batch, &mut trade, trigger)?;

                inspection.inspection_result = verdict;
                inspection.grade = Some(grade.to_string());
                inspection.certificate_url = Some(certificate_url.to_string());
                self.store.stage_inspection(&mut batch, &inspection)?;

                if verdict == InspectionResult::Passed {
                    // an existing shipment keeps its tracking id
                    match self.store.load_logistics(trade_id)? {
                        Some(existing) => {
                            debug!(trade_id, tracking_id = %existing.tracking_id, "logistics already open")
                        }
                        None => {
                            let crop = self.require_crop(&trade.crop_id)?;
                            let logistics = Logistics {
                                trade_id: trade_id.to_string(),
                                tracking_id: utils::new_tracking_token(),
                                status: Logistics::PICKED_UP.to_string(),
                                current_location: format!("Origin: {}", crop.location_state),
                            };
                            self.store.stage_logistics(&mut batch, &logistics)?;
                        }
                    }
                }

                self.events.stage(
                    &mut batch,
                    trade_id,
                    EventKind::InspectionCompleted.as_str(),
                    format!(
                        "Inspection {verdict} with grade {grade}; status changed from {} to {}",
                        step.from, step.to
                    ),
                )?;
                self.store.commit(batch)?;

                info!(trade_id, %verdict, to = %step.to, "inspection completed");
                Ok(inspection)
            })
            .inspect_err(|err| warn!(trade_id, %err, "inspection completion rejected"))
    }

    /// The inspection currently governing the trade, if any.
    pub fn get_inspection(&self, trade_id: &str) -> Result<Option<Inspection>> {
        self.store.active_inspection(trade_id)
    }

    /// Every inspection the trade has had, oldest first.
    pub fn inspection_history(&self, trade_id: &str) -> Result<Vec<Inspection>> {
        self.store.inspection_history(trade_id)
    }

    /// All assignments ever made to this inspector, declined ones included.
    pub fn list_my_inspections(&self, inspector: &ActingUser) -> Result<Vec<Inspection>> {
        if inspector.role != Role::Inspector {
            return Err(LifecycleError::PermissionDenied(
                "Only inspectors can view assigned inspections".into(),
            ));
        }

        let mut assigned: Vec<Inspection> = self
            .store
            .inspections()?
            .into_iter()
            .filter(|inspection| inspection.inspector_id.as_deref() == Some(inspector.id.as_str()))
            .collect();
        assigned.sort_by(|a, b| a.requested_at.cmp(&b.requested_at));
        Ok(assigned)
    }
}
