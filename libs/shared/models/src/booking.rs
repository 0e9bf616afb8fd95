// libs/shared/models/src/booking.rs
//
// Booking vocabulary shared by the schedule, appointment and payment
// cells. The slot-occupancy predicate lives here so every read path and
// every write path apply the identical expiry rule.

use chrono::{DateTime, NaiveTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

// ==============================================================================
// STATUS ENUMS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Rejected,
    Cancelled,
    Completed,
    RescheduleRequested,
}

impl AppointmentStatus {
    /// Terminal states admit no further status transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Rejected
                | AppointmentStatus::Cancelled
                | AppointmentStatus::Completed
        )
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Pending => write!(f, "pending"),
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::Rejected => write!(f, "rejected"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::RescheduleRequested => write!(f, "reschedule_requested"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Refunded,
    Failed,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "pending"),
            PaymentStatus::Paid => write!(f, "paid"),
            PaymentStatus::Refunded => write!(f, "refunded"),
            PaymentStatus::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentType {
    Video,
    Chat,
}

impl fmt::Display for AppointmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentType::Video => write!(f, "video"),
            AppointmentType::Chat => write!(f, "chat"),
        }
    }
}

// ==============================================================================
// SLOT TIME RANGE
// ==============================================================================

/// A booked time range on a date, serialized as `"HH:MM-HH:MM"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotTime {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl SlotTime {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    pub fn overlaps(&self, other: &SlotTime) -> bool {
        self.start < other.end && other.start < self.end
    }
}

impl fmt::Display for SlotTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}",
            self.start.format("%H:%M"),
            self.end.format("%H:%M")
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid slot time range: {0}")]
pub struct ParseSlotTimeError(String);

impl FromStr for SlotTime {
    type Err = ParseSlotTimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (start, end) = s
            .split_once('-')
            .ok_or_else(|| ParseSlotTimeError(s.to_string()))?;
        let start = NaiveTime::parse_from_str(start.trim(), "%H:%M")
            .map_err(|_| ParseSlotTimeError(s.to_string()))?;
        let end = NaiveTime::parse_from_str(end.trim(), "%H:%M")
            .map_err(|_| ParseSlotTimeError(s.to_string()))?;
        if start >= end {
            return Err(ParseSlotTimeError(s.to_string()));
        }
        Ok(SlotTime { start, end })
    }
}

impl Serialize for SlotTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for SlotTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

// ==============================================================================
// SLOT OCCUPANCY
// ==============================================================================

/// The occupancy-relevant projection of an appointment record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotClaim {
    pub appointment_time: SlotTime,
    pub status: AppointmentStatus,
    pub payment_status: PaymentStatus,
    pub checkout_lock_until: Option<DateTime<Utc>>,
}

impl SlotClaim {
    /// Whether this appointment currently excludes other bookings from its
    /// slot: paid, confirmed, or holding an unexpired checkout lock.
    ///
    /// A cancelled or rejected appointment never blocks, even when a stale
    /// lock timestamp is still in the future.
    pub fn blocks_slot(&self, now: DateTime<Utc>) -> bool {
        if matches!(
            self.status,
            AppointmentStatus::Cancelled | AppointmentStatus::Rejected
        ) {
            return false;
        }
        if self.payment_status == PaymentStatus::Paid {
            return true;
        }
        if self.status == AppointmentStatus::Confirmed {
            return true;
        }
        self.checkout_lock_until.map_or(false, |until| until > now)
    }
}

/// Serde helper for `NaiveTime` fields carried as `"HH:MM"` strings.
pub mod time_hm {
    use chrono::NaiveTime;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let s = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(&s, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(&s, "%H:%M:%S"))
            .map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn slot_time_round_trips_through_display() {
        let slot = SlotTime::new(t(9, 0), t(9, 30));
        assert_eq!(slot.to_string(), "09:00-09:30");
        assert_eq!("09:00-09:30".parse::<SlotTime>().unwrap(), slot);
    }

    #[test]
    fn slot_time_rejects_inverted_range() {
        assert!("10:00-09:00".parse::<SlotTime>().is_err());
        assert!("garbage".parse::<SlotTime>().is_err());
    }

    #[test]
    fn paid_or_confirmed_claims_block() {
        let now = Utc::now();
        let claim = SlotClaim {
            appointment_time: SlotTime::new(t(9, 0), t(9, 30)),
            status: AppointmentStatus::Confirmed,
            payment_status: PaymentStatus::Pending,
            checkout_lock_until: None,
        };
        assert!(claim.blocks_slot(now));

        let paid = SlotClaim {
            status: AppointmentStatus::Pending,
            payment_status: PaymentStatus::Paid,
            ..claim.clone()
        };
        assert!(paid.blocks_slot(now));
    }

    #[test]
    fn lock_expiry_is_passive() {
        let now = Utc::now();
        let mut claim = SlotClaim {
            appointment_time: SlotTime::new(t(9, 0), t(9, 30)),
            status: AppointmentStatus::Pending,
            payment_status: PaymentStatus::Pending,
            checkout_lock_until: Some(now + Duration::minutes(10)),
        };
        assert!(claim.blocks_slot(now));

        claim.checkout_lock_until = Some(now - Duration::seconds(1));
        assert!(!claim.blocks_slot(now));
    }

    #[test]
    fn cancelled_claim_with_stale_future_lock_does_not_block() {
        // Regression: a dead appointment must not hold its slot hostage.
        let now = Utc::now();
        for status in [AppointmentStatus::Cancelled, AppointmentStatus::Rejected] {
            let claim = SlotClaim {
                appointment_time: SlotTime::new(t(9, 0), t(9, 30)),
                status,
                payment_status: PaymentStatus::Pending,
                checkout_lock_until: Some(now + Duration::minutes(10)),
            };
            assert!(!claim.blocks_slot(now));
        }
    }
}
