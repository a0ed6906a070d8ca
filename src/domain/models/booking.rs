use crate::domain::models::user::Role;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Free-form answers captured at booking time (dietary needs, emergency
/// contact). Preserved across status transitions unless explicitly replaced.
pub type AdditionalInformation = BTreeMap<String, String>;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Confirmed,
    WaitingList,
    Reserved,
    Cancelled,
    Attended,
    Absent,
}

impl BookingStatus {
    /// Active bookings block a second booking for the same (event, user).
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            BookingStatus::Confirmed | BookingStatus::WaitingList | BookingStatus::Reserved
        )
    }

    /// Legal in-place transitions. A missing row ("no booking yet") is not a
    /// state of this enum; creation paths check for row absence separately.
    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        match next {
            Confirmed => matches!(self, WaitingList | Reserved | Cancelled),
            WaitingList => matches!(self, Cancelled),
            Reserved => matches!(self, Cancelled),
            Cancelled => matches!(self, Confirmed | WaitingList | Reserved),
            Attended => matches!(self, Confirmed | Absent),
            Absent => matches!(self, Confirmed | Attended),
        }
    }

}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::WaitingList => "WAITING_LIST",
            BookingStatus::Reserved => "RESERVED",
            BookingStatus::Cancelled => "CANCELLED",
            BookingStatus::Attended => "ATTENDED",
            BookingStatus::Absent => "ABSENT",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct Booking {
    pub id: String,
    pub event_id: String,
    pub user_id: String,
    // Snapshot of the bookee's role at booking time, so capacity pools can be
    // tallied from booking rows alone.
    pub user_role: Role,
    pub status: BookingStatus,
    pub reserved_by: Option<String>,
    pub additional_information: Json<AdditionalInformation>,
    pub booking_date: DateTime<Utc>,
    pub updated_date: DateTime<Utc>,
}

pub struct NewBookingParams {
    pub event_id: String,
    pub user_id: String,
    pub user_role: Role,
    pub status: BookingStatus,
    pub reserved_by: Option<String>,
    pub additional_information: AdditionalInformation,
}

impl Booking {
    pub fn new(params: NewBookingParams) -> Self {
        let now = Utc::now();

        Self {
            id: Uuid::new_v4().to_string(),
            event_id: params.event_id,
            user_id: params.user_id,
            user_role: params.user_role,
            status: params.status,
            reserved_by: params.reserved_by,
            additional_information: Json(params.additional_information),
            booking_date: now,
            updated_date: now,
        }
    }
}
