// libs/shared/config/src/policy.rs
//
// Every tunable number in the booking engine lives here: slot geometry,
// checkout lock window, commission percentages and the refund table.

use serde::{Deserialize, Serialize};

/// Who triggered a cancellation. The refund table is keyed on this.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CancellationInitiator {
    Patient,
    Doctor,
    Admin,
    NoShow,
}

/// Percentage split applied to a paid fee when an appointment is cancelled.
/// Parts must sum to 100.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefundSplit {
    pub patient_percent: i64,
    pub admin_percent: i64,
    pub doctor_percent: i64,
}

#[derive(Debug, Clone)]
pub struct BookingPolicy {
    /// Minutes a checkout lock stays valid before it passively expires.
    pub checkout_lock_minutes: i64,
    /// Slot width used when a schedule does not override it.
    pub default_slot_duration_minutes: i32,
    /// Gap inserted between consecutive generated slots.
    pub default_buffer_minutes: i32,
    /// Concurrent patients a slot admits unless the template overrides it.
    pub default_max_patients_per_slot: i32,
    /// Doctor's share of a paid consultation fee, in percent.
    pub doctor_commission_percent: i64,
    /// Platform's share of a paid consultation fee, in percent.
    pub admin_commission_percent: i64,
    /// Major-unit → minor-unit factor handed to the payment gateway.
    pub minor_unit_multiplier: i64,
}

impl Default for BookingPolicy {
    fn default() -> Self {
        Self {
            checkout_lock_minutes: 15,
            default_slot_duration_minutes: 30,
            default_buffer_minutes: 5,
            default_max_patients_per_slot: 1,
            doctor_commission_percent: 80,
            admin_commission_percent: 20,
            minor_unit_multiplier: 100,
        }
    }
}

impl BookingPolicy {
    /// Refund split for a cancellation, by initiator.
    ///
    /// Doctor- and admin-initiated cancellations refund the patient in
    /// full. A patient cancelling keeps 70% and compensates the doctor
    /// (20%) and the platform (10%). A no-show forfeits the fee entirely.
    pub fn refund_split(&self, initiator: CancellationInitiator) -> RefundSplit {
        match initiator {
            CancellationInitiator::Doctor | CancellationInitiator::Admin => RefundSplit {
                patient_percent: 100,
                admin_percent: 0,
                doctor_percent: 0,
            },
            CancellationInitiator::Patient => RefundSplit {
                patient_percent: 70,
                admin_percent: 10,
                doctor_percent: 20,
            },
            // No refund: the forfeited fee settles like a completed
            // consultation.
            CancellationInitiator::NoShow => RefundSplit {
                patient_percent: 0,
                admin_percent: self.admin_commission_percent,
                doctor_percent: self.doctor_commission_percent,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commission_percentages_sum_to_whole() {
        let policy = BookingPolicy::default();
        assert_eq!(
            policy.doctor_commission_percent + policy.admin_commission_percent,
            100
        );
    }

    #[test]
    fn refund_splits_sum_to_whole() {
        let policy = BookingPolicy::default();
        for initiator in [
            CancellationInitiator::Patient,
            CancellationInitiator::Doctor,
            CancellationInitiator::Admin,
            CancellationInitiator::NoShow,
        ] {
            let split = policy.refund_split(initiator);
            assert_eq!(
                split.patient_percent + split.admin_percent + split.doctor_percent,
                100,
                "split for {:?} leaks money",
                initiator
            );
        }
    }
}
