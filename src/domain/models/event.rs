use crate::domain::models::user::Role;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventStatus {
    Open,
    Closed,
    WaitingListOnly,
    Cancelled,
}

/// Read-only view of an event, owned by the content subsystem. The booking
/// core never writes events; it only evaluates bookings against them.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub id: String,
    pub title: String,
    pub tags: BTreeSet<String>,
    pub number_of_places: Option<u32>,
    pub group_reservation_limit: Option<u32>,
    pub date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub booking_deadline: Option<DateTime<Utc>>,
    pub status: EventStatus,
    pub allows_group_bookings: bool,
    pub group_token: Option<String>,
}

impl Event {
    pub fn is_cancelled(&self) -> bool {
        self.status == EventStatus::Cancelled
    }

    pub fn deadline_has_passed(&self, now: DateTime<Utc>) -> bool {
        self.booking_deadline.is_some_and(|deadline| deadline < now)
    }

    pub fn has_started(&self, now: DateTime<Utc>) -> bool {
        self.date.is_some_and(|start| start < now)
    }
}

/// Mapping from event tags to the roles whose capacity pool they constrain.
/// Which tags count as audience tags is deployment configuration, not code:
/// an event tagged "student" caps the STUDENT pool, while descriptive tags
/// ("physics") constrain nobody.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudienceTags {
    rules: Vec<(String, Role)>,
}

impl AudienceTags {
    pub fn new(rules: Vec<(String, Role)>) -> Self {
        Self { rules }
    }

    pub fn role_for_tag(&self, tag: &str) -> Option<Role> {
        self.rules
            .iter()
            .find(|(name, _)| name == tag)
            .map(|(_, role)| *role)
    }

    pub fn is_role_constrained(&self, event: &Event, role: Role) -> bool {
        event
            .tags
            .iter()
            .any(|tag| self.role_for_tag(tag) == Some(role))
    }
}

impl Default for AudienceTags {
    fn default() -> Self {
        Self::new(vec![
            ("student".to_string(), Role::Student),
            ("teacher".to_string(), Role::Teacher),
        ])
    }
}
