//! The single table of legal trade status transitions.
//!
//! Every operation that moves a trade asks [`next_status`] for its destination
//! instead of checking statuses ad hoc, so the full set of legal moves lives
//! here and can be tested as one artifact.
use crate::error::{LifecycleError, Result};
use crate::model::TradeStatus;

/// What caused a status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// A party or admin sets the status directly.
    Manual(TradeStatus),
    AssignInspector,
    AcceptAssignment,
    RejectAssignment,
    InspectionPassed,
    InspectionFailed,
    Delivered,
    ForceClose { resolve_to_buyer: bool },
}

impl Trigger {
    /// States the trigger may fire from, as shown in rejection messages.
    pub fn expected(&self) -> &'static str {
        match self {
            Trigger::Manual(_)
            | Trigger::AcceptAssignment
            | Trigger::RejectAssignment
            | Trigger::Delivered => "any status",
            Trigger::AssignInspector => "AGREED",
            Trigger::InspectionPassed | Trigger::InspectionFailed => "INSPECTION_PENDING",
            Trigger::ForceClose { .. } => "DISPUTED",
        }
    }
}

/// Looks up `from × trigger`. `None` means the move is not legal.
pub fn lookup(from: TradeStatus, trigger: Trigger) -> Option<TradeStatus> {
    use crate::model::TradeStatus::*;

    match (from, trigger) {
        (_, Trigger::Manual(to)) => Some(to),
        (Agreed, Trigger::AssignInspector) => Some(InspectionRequested),
        // an answer is gated on the assignment being REQUESTED, not on the trade
        (_, Trigger::AcceptAssignment) => Some(InspectionPending),
        (_, Trigger::RejectAssignment) => Some(Agreed),
        // INSPECTION_PASSED is skipped; a passing inspection ships straight away
        (InspectionPending, Trigger::InspectionPassed) => Some(Shipped),
        (InspectionPending, Trigger::InspectionFailed) => Some(Disputed),
        (_, Trigger::Delivered) => Some(Completed),
        (Disputed, Trigger::ForceClose { resolve_to_buyer }) => {
            Some(if resolve_to_buyer { Completed } else { Cancelled })
        }
        _ => None,
    }
}

/// Like [`lookup`] but turns an illegal move into `PreconditionFailed`.
pub fn next_status(trade_id: &str, from: TradeStatus, trigger: Trigger) -> Result<TradeStatus> {
    lookup(from, trigger).ok_or_else(|| LifecycleError::wrong_phase(trade_id, trigger.expected(), from))
}

/// Reaching these statuses settles the crop: an AVAILABLE crop becomes SOLD.
pub fn settles_crop(to: TradeStatus) -> bool {
    matches!(to, TradeStatus::Agreed | TradeStatus::Completed)
}
