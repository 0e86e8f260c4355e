use serde::{Deserialize, Serialize};
use std::fmt;

/// Sentinel shown on a record before any NGO has been contacted.
pub const NOT_YET_ASSIGNED: &str = "Not yet Assigned";

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Ngo {
    pub id: i64,
    pub name: String,
    pub location: String,
    pub email: String,
    pub contact: String,
}

/// Public projection of a registered restaurant. The credential hash lives
/// only in the `restaurants` table and never crosses this boundary.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Restaurant {
    pub id: i64,
    pub name: String,
    pub location: String,
    pub email: String,
    pub contact: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DonationStatus {
    #[serde(rename = "Pending")]
    Pending,
    #[serde(rename = "Waiting for Response")]
    WaitingForResponse,
    #[serde(rename = "Accepted")]
    Accepted,
    #[serde(rename = "Declined - No NGOs left")]
    DeclinedNoNgosLeft,
    #[serde(rename = "No NGO Available")]
    NoNgoAvailable,
}

impl DonationStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::WaitingForResponse => "Waiting for Response",
            Self::Accepted => "Accepted",
            Self::DeclinedNoNgosLeft => "Declined - No NGOs left",
            Self::NoNgoAvailable => "No NGO Available",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Pending" => Some(Self::Pending),
            "Waiting for Response" => Some(Self::WaitingForResponse),
            "Accepted" => Some(Self::Accepted),
            "Declined - No NGOs left" => Some(Self::DeclinedNoNgosLeft),
            "No NGO Available" => Some(Self::NoNgoAvailable),
            _ => None,
        }
    }

}

impl fmt::Display for DonationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a record's append-only audit log.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct HistoryEvent {
    pub time: String,
    pub event: String,
}

/// Payload of a donation submission. Restaurant fields are copied onto the
/// record verbatim so the record stays meaningful even if the restaurant's
/// profile changes later.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct DonationInput {
    pub restaurant: String,
    pub contact: String,
    pub location: String,
    pub food_type: String,
    pub quantity: i64,
    pub expiry: String,
    pub email: String,
    #[serde(default)]
    pub notes: String,
}

/// A persisted donation request and its full lifecycle.
///
/// `contacted` is the structured set of NGO names that have been assigned at
/// least once; re-routing excludes it. `history` is the human-readable audit
/// trail: append-only, never reordered or truncated, never parsed back.
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct DonationRecord {
    pub id: i64,
    pub restaurant: String,
    pub contact: String,
    pub location: String,
    pub food_type: String,
    pub quantity: i64,
    pub expiry: String,
    pub email: String,
    pub notes: String,
    pub status: DonationStatus,
    pub ngo_assigned: String,
    pub contacted: Vec<String>,
    pub history: Vec<HistoryEvent>,
    pub created_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_display() {
        for status in [
            DonationStatus::Pending,
            DonationStatus::WaitingForResponse,
            DonationStatus::Accepted,
            DonationStatus::DeclinedNoNgosLeft,
            DonationStatus::NoNgoAvailable,
        ] {
            assert_eq!(DonationStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(DonationStatus::parse("Rejected"), None);
    }
}
