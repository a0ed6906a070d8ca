use crate::domain::models::booking::BookingStatus;
use crate::domain::models::user::Role;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-event tally of bookings by status and bookee role. Rebuilt from the
/// store for every capacity decision; never cached across operations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventBookingCounts {
    counts: BTreeMap<BookingStatus, BTreeMap<Role, u64>>,
}

impl EventBookingCounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, status: BookingStatus, role: Role) {
        *self
            .counts
            .entry(status)
            .or_default()
            .entry(role)
            .or_insert(0) += 1;
    }

    pub fn set(&mut self, status: BookingStatus, role: Role, count: u64) {
        self.counts.entry(status).or_default().insert(role, count);
    }

    pub fn get(&self, status: BookingStatus, role: Role) -> u64 {
        self.counts
            .get(&status)
            .and_then(|by_role| by_role.get(&role))
            .copied()
            .unwrap_or(0)
    }

    pub fn total_for_status(&self, status: BookingStatus) -> u64 {
        self.counts
            .get(&status)
            .map(|by_role| by_role.values().sum())
            .unwrap_or(0)
    }

    /// Confirmed + waiting-list rows for one role, the sum the fullness test
    /// compares against the number of places.
    pub fn occupancy_for_role(&self, role: Role) -> u64 {
        self.get(BookingStatus::Confirmed, role) + self.get(BookingStatus::WaitingList, role)
    }

    pub fn confirmed_for_role(&self, role: Role) -> u64 {
        self.get(BookingStatus::Confirmed, role)
    }
}
