use crate::domain::models::booking::{
    AdditionalInformation, Booking, BookingStatus, NewBookingParams,
};
use crate::domain::models::counts::EventBookingCounts;
use crate::domain::ports::BookingStore;
use crate::error::BookingError;
use crate::locks::{EventLockGuard, EventLockRegistry};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::types::Json;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;

/// In-memory booking store, keyed by (event id, user id). Process-local only;
/// carries the same per-event lock registry as the durable store so the
/// manager behaves identically against either.
pub struct MemoryBookingStore {
    bookings: Mutex<HashMap<(String, String), Booking>>,
    locks: EventLockRegistry,
}

impl MemoryBookingStore {
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            bookings: Mutex::new(HashMap::new()),
            locks: EventLockRegistry::new(lock_timeout),
        }
    }

    pub fn lock_registry(&self) -> &EventLockRegistry {
        &self.locks
    }
}

impl Default for MemoryBookingStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

#[async_trait]
impl BookingStore for MemoryBookingStore {
    async fn booking_status_counts(
        &self,
        event_id: &str,
    ) -> Result<EventBookingCounts, BookingError> {
        let bookings = self.bookings.lock().await;
        let mut counts = EventBookingCounts::new();
        for ((booked_event, _), booking) in bookings.iter() {
            if booked_event == event_id {
                counts.record(booking.status, booking.user_role);
            }
        }
        Ok(counts)
    }

    async fn bookings_by_event(&self, event_id: &str) -> Result<Vec<Booking>, BookingError> {
        let bookings = self.bookings.lock().await;
        let mut result: Vec<Booking> = bookings
            .iter()
            .filter(|((booked_event, _), _)| booked_event == event_id)
            .map(|(_, booking)| booking.clone())
            .collect();
        result.sort_by(|a, b| a.booking_date.cmp(&b.booking_date));
        Ok(result)
    }

    async fn booking_by_event_and_user(
        &self,
        event_id: &str,
        user_id: &str,
    ) -> Result<Option<Booking>, BookingError> {
        let bookings = self.bookings.lock().await;
        Ok(bookings
            .get(&(event_id.to_string(), user_id.to_string()))
            .cloned())
    }

    async fn is_user_booked(&self, event_id: &str, user_id: &str) -> Result<bool, BookingError> {
        let bookings = self.bookings.lock().await;
        Ok(bookings
            .get(&(event_id.to_string(), user_id.to_string()))
            .is_some_and(|booking| booking.status.is_active()))
    }

    async fn create_booking(&self, params: NewBookingParams) -> Result<Booking, BookingError> {
        let mut bookings = self.bookings.lock().await;
        let key = (params.event_id.clone(), params.user_id.clone());
        if bookings.contains_key(&key) {
            return Err(BookingError::DuplicateBooking {
                event_id: params.event_id,
                user_id: params.user_id,
            });
        }
        let booking = Booking::new(params);
        bookings.insert(key, booking.clone());
        Ok(booking)
    }

    async fn update_booking_status(
        &self,
        event_id: &str,
        user_id: &str,
        status: BookingStatus,
        reserved_by: Option<&str>,
        additional_information: Option<&AdditionalInformation>,
    ) -> Result<Booking, BookingError> {
        let mut bookings = self.bookings.lock().await;
        let booking = bookings
            .get_mut(&(event_id.to_string(), user_id.to_string()))
            .ok_or_else(|| {
                BookingError::NotFound(format!(
                    "No booking for user {user_id} on event {event_id}"
                ))
            })?;

        booking.status = status;
        booking.reserved_by = reserved_by.map(String::from);
        if let Some(info) = additional_information {
            booking.additional_information = Json(info.clone());
        }
        booking.updated_date = Utc::now();

        Ok(booking.clone())
    }

    async fn delete_booking(&self, event_id: &str, user_id: &str) -> Result<(), BookingError> {
        let mut bookings = self.bookings.lock().await;
        if bookings
            .remove(&(event_id.to_string(), user_id.to_string()))
            .is_none()
        {
            return Err(BookingError::NotFound(format!(
                "No booking for user {user_id} on event {event_id}"
            )));
        }
        Ok(())
    }

    async fn lock_event(&self, event_id: &str) -> Result<EventLockGuard, BookingError> {
        self.locks.lock(event_id).await
    }
}
