use crate::domain::models::{
    booking::{AdditionalInformation, Booking, BookingStatus, NewBookingParams},
    counts::EventBookingCounts,
    user::UserSummary,
};
use crate::error::BookingError;
use crate::locks::EventLockGuard;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Durable home of booking rows plus the per-event lock. The lock lives here
/// because lock scope must match storage scope: a distributed deployment
/// swaps both together.
#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn booking_status_counts(&self, event_id: &str) -> Result<EventBookingCounts, BookingError>;
    async fn bookings_by_event(&self, event_id: &str) -> Result<Vec<Booking>, BookingError>;
    async fn booking_by_event_and_user(&self, event_id: &str, user_id: &str) -> Result<Option<Booking>, BookingError>;
    async fn is_user_booked(&self, event_id: &str, user_id: &str) -> Result<bool, BookingError>;
    async fn create_booking(&self, params: NewBookingParams) -> Result<Booking, BookingError>;
    /// Overwrites status in place. `reserved_by` is stored as given (cleared
    /// with `None`); `additional_information: None` preserves the stored map.
    async fn update_booking_status(
        &self,
        event_id: &str,
        user_id: &str,
        status: BookingStatus,
        reserved_by: Option<&str>,
        additional_information: Option<&AdditionalInformation>,
    ) -> Result<Booking, BookingError>;
    async fn delete_booking(&self, event_id: &str, user_id: &str) -> Result<(), BookingError>;
    async fn lock_event(&self, event_id: &str) -> Result<EventLockGuard, BookingError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailTemplate {
    pub name: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EmailCategory {
    Booking,
    WaitingList,
    Reservation,
    Cancellation,
}

/// Outbound mail, at-least-once. Callers tolerate duplicate sends; the
/// booking decision is already committed by the time anything is sent.
#[async_trait]
pub trait NotificationService: Send + Sync {
    async fn email_template(&self, name: &str) -> Result<EmailTemplate, BookingError>;
    async fn send_templated_email(
        &self,
        user: &UserSummary,
        template: &EmailTemplate,
        substitutions: &BTreeMap<String, String>,
        category: EmailCategory,
    ) -> Result<(), BookingError>;
}

/// Links an event to the group that owns it, for the event-leader manage
/// check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssociationToken {
    pub token: String,
    pub group_id: String,
}

#[async_trait]
pub trait PermissionOracle: Send + Sync {
    async fn is_owner_or_additional_manager(&self, group_id: &str, user_id: &str) -> Result<bool, BookingError>;
    async fn lookup_association_token(&self, user: &UserSummary, token: &str) -> Result<Option<AssociationToken>, BookingError>;
    async fn has_permission(&self, requester: &UserSummary, target_user_id: &str) -> Result<bool, BookingError>;
}
