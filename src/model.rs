//! Trade lifecycle records and their CBOR encodings
use chrono::{DateTime, TimeZone, Utc};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct TimeStamp<T: TimeZone>(DateTime<T>);

impl TimeStamp<Utc> {
    pub fn new() -> Self {
        Self(Utc::now())
    }
    pub fn new_with(year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> Self {
        Utc.with_ymd_and_hms(year, month, day, hour, min, sec)
            .single()
            .unwrap_or_default()
            .into()
    }
    pub fn to_datetime_utc(&self) -> DateTime<Utc> {
        self.0
    }
}

// chrono::Utc is not Ord, so a derive would never apply
impl Ord for TimeStamp<Utc> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

impl PartialOrd for TimeStamp<Utc> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Default for TimeStamp<Utc> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TimeZone> From<DateTime<T>> for TimeStamp<T> {
    fn from(value: DateTime<T>) -> Self {
        TimeStamp(value)
    }
}

impl<C> minicbor::Encode<C> for TimeStamp<Utc> {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        if let Some(nsec) = self.0.timestamp_nanos_opt() {
            return e.i64(nsec)?.ok();
        }

        Err(minicbor::encode::Error::message(
            "failed to encode timestamp. timestamp_nanos_opt returned None",
        ))
    }
}

impl<'b, C> minicbor::Decode<'b, C> for TimeStamp<Utc> {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let nsecs = d.i64()?;

        Ok(TimeStamp(DateTime::from_timestamp_nanos(nsecs)))
    }
}

/// Where a trade sits in its lifecycle.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TradeStatus {
    #[n(0)]
    Requested,
    #[n(1)]
    Negotiating,
    #[n(2)]
    Agreed,
    #[n(3)]
    InspectionRequested,
    #[n(4)]
    InspectionPending,
    #[n(5)]
    InspectionPassed,
    #[n(6)]
    Shipped,
    #[n(7)]
    Disputed,
    #[n(8)]
    Completed,
    #[n(9)]
    Cancelled,
}

impl TradeStatus {
    pub const ALL: [TradeStatus; 10] = [
        TradeStatus::Requested,
        TradeStatus::Negotiating,
        TradeStatus::Agreed,
        TradeStatus::InspectionRequested,
        TradeStatus::InspectionPending,
        TradeStatus::InspectionPassed,
        TradeStatus::Shipped,
        TradeStatus::Disputed,
        TradeStatus::Completed,
        TradeStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TradeStatus::Requested => "REQUESTED",
            TradeStatus::Negotiating => "NEGOTIATING",
            TradeStatus::Agreed => "AGREED",
            TradeStatus::InspectionRequested => "INSPECTION_REQUESTED",
            TradeStatus::InspectionPending => "INSPECTION_PENDING",
            TradeStatus::InspectionPassed => "INSPECTION_PASSED",
            TradeStatus::Shipped => "SHIPPED",
            TradeStatus::Disputed => "DISPUTED",
            TradeStatus::Completed => "COMPLETED",
            TradeStatus::Cancelled => "CANCELLED",
        }
    }

    /// Open requests block a buyer from asking for the same crop again.
    pub fn is_open_request(&self) -> bool {
        matches!(self, TradeStatus::Requested | TradeStatus::Negotiating)
    }
}

impl fmt::Display for TradeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TradeStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TradeStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown trade status '{s}'"))
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CropStatus {
    #[n(0)]
    Available,
    #[n(1)]
    Sold,
}

impl fmt::Display for CropStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CropStatus::Available => f.write_str("AVAILABLE"),
            CropStatus::Sold => f.write_str("SOLD"),
        }
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    #[n(0)]
    Buyer,
    /// The selling party; owns crop listings.
    #[n(1)]
    Farmer,
    #[n(2)]
    Inspector,
    #[n(3)]
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Buyer => "BUYER",
            Role::Farmer => "FARMER",
            Role::Inspector => "INSPECTOR",
            Role::Admin => "ADMIN",
        };
        f.write_str(name)
    }
}

/// The caller on whose behalf an operation runs, resolved by the request layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActingUser {
    pub id: String,
    pub role: Role,
    pub kyc_verified: bool,
}

impl ActingUser {
    pub fn new(id: impl Into<String>, role: Role, kyc_verified: bool) -> Self {
        Self {
            id: id.into(),
            role,
            kyc_verified,
        }
    }
}

/// A crop lot as listed by its farmer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Crop {
    pub id: String,
    pub farmer_id: String,
    pub name: String,
    pub price_per_unit: u64, // minor currency units
    pub location_state: String,
    pub status: CropStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: String,
    pub name: String,
    pub role: Role,
    pub kyc_verified: bool,
}

impl From<&UserRecord> for ActingUser {
    fn from(user: &UserRecord) -> Self {
        ActingUser::new(user.id.clone(), user.role, user.kyc_verified)
    }
}

// key is "trade:{id}"
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Trade {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub crop_id: String,
    #[n(2)]
    pub buyer_id: String,
    #[n(3)]
    pub farmer_id: String, // copied from the crop owner, never changes
    #[n(4)]
    pub status: TradeStatus,
    #[n(5)]
    pub final_price: u64, // minor currency units, informational only
    #[n(6)]
    pub created_at: TimeStamp<Utc>,
}

impl Trade {
    pub fn is_party(&self, user_id: &str) -> bool {
        self.buyer_id == user_id || self.farmer_id == user_id
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentStatus {
    #[n(0)]
    Requested,
    #[n(1)]
    Accepted,
    #[n(2)]
    Rejected,
}

impl fmt::Display for AssignmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssignmentStatus::Requested => f.write_str("REQUESTED"),
            AssignmentStatus::Accepted => f.write_str("ACCEPTED"),
            AssignmentStatus::Rejected => f.write_str("REJECTED"),
        }
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum InspectionResult {
    #[n(0)]
    Pending,
    #[n(1)]
    Passed,
    #[n(2)]
    Failed,
}

impl InspectionResult {
    /// Anything other than "PASSED" (in any case) counts as a failure.
    pub fn from_verdict(verdict: &str) -> Self {
        if verdict.eq_ignore_ascii_case("PASSED") {
            InspectionResult::Passed
        } else {
            InspectionResult::Failed
        }
    }
}

impl fmt::Display for InspectionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InspectionResult::Pending => f.write_str("PENDING"),
            InspectionResult::Passed => f.write_str("PASSED"),
            InspectionResult::Failed => f.write_str("FAILED"),
        }
    }
}

// key is "inspection:{id}"; the trade keeps the ordered list of its ids
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Inspection {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub trade_id: String,
    #[n(2)]
    pub inspector_id: Option<String>,
    #[n(3)]
    pub sequence: u32, // position in the trade's inspection history
    #[n(4)]
    pub assignment_status: AssignmentStatus,
    #[n(5)]
    pub inspection_result: InspectionResult,
    #[n(6)]
    pub grade: Option<String>,
    #[n(7)]
    pub certificate_url: Option<String>,
    #[n(8)]
    pub requested_at: TimeStamp<Utc>,
}

// key is "logistics:{trade_id}"
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Logistics {
    #[n(0)]
    pub trade_id: String,
    #[n(1)]
    pub tracking_id: String,
    #[n(2)]
    pub status: String, // free-form, stored verbatim
    #[n(3)]
    pub current_location: String,
}

impl Logistics {
    pub const PICKED_UP: &'static str = "PICKED_UP";
    pub const DELIVERED: &'static str = "DELIVERED";

    pub fn is_delivered(&self) -> bool {
        self.status.eq_ignore_ascii_case(Self::DELIVERED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_encoding() {
        let original = TimeStamp::new();

        let encoding = minicbor::to_vec(original.clone()).unwrap();
        let decode: TimeStamp<Utc> = minicbor::decode(&encoding).unwrap();

        assert_eq!(original, decode);
    }

    #[test]
    fn status_names_parse_back() {
        for status in TradeStatus::ALL {
            assert_eq!(status.to_string().parse::<TradeStatus>(), Ok(status));
        }
        assert_eq!(
            "inspection_pending".parse::<TradeStatus>(),
            Ok(TradeStatus::InspectionPending)
        );
        assert!("SOLD".parse::<TradeStatus>().is_err());
    }

    #[test]
    fn verdicts_are_case_insensitive() {
        assert_eq!(InspectionResult::from_verdict("passed"), InspectionResult::Passed);
        assert_eq!(InspectionResult::from_verdict("PASSED"), InspectionResult::Passed);
        assert_eq!(InspectionResult::from_verdict("FAILED"), InspectionResult::Failed);
        assert_eq!(InspectionResult::from_verdict("grade C"), InspectionResult::Failed);
        // no trimming: padded verdicts are not a pass
        assert_eq!(InspectionResult::from_verdict(" PASSED"), InspectionResult::Failed);
    }

    #[test]
    fn delivered_matches_exact_word() {
        let mut logistics = Logistics {
            trade_id: "trade1x".into(),
            tracking_id: "0A1B2C3D".into(),
            status: "delivered".into(),
            current_location: "Warehouse".into(),
        };
        assert!(logistics.is_delivered());

        logistics.status = " DELIVERED".into();
        assert!(!logistics.is_delivered());
    }

    #[test]
    fn timestamps_order_chronologically() {
        let earlier = TimeStamp::new_with(2025, 3, 1, 9, 30, 0);
        let later = TimeStamp::new_with(2025, 3, 1, 9, 30, 1);

        assert!(earlier < later);
        assert_eq!(earlier.cmp(&earlier.clone()), std::cmp::Ordering::Equal);

        let mut stamps = vec![later.clone(), earlier.clone()];
        stamps.sort();
        assert_eq!(stamps, vec![earlier, later]);
    }

    #[test]
    fn trade_cbor_roundtrip() {
        let trade = Trade {
            id: "trade1abc".into(),
            crop_id: "crop1abc".into(),
            buyer_id: "user1b".into(),
            farmer_id: "user1f".into(),
            status: TradeStatus::Shipped,
            final_price: 2_150,
            created_at: TimeStamp::new(),
        };

        let encoded = minicbor::to_vec(&trade).unwrap();
        let decoded: Trade = minicbor::decode(&encoded).unwrap();

        assert_eq!(trade, decoded);
    }
}
