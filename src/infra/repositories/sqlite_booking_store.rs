use crate::domain::models::booking::{
    AdditionalInformation, Booking, BookingStatus, NewBookingParams,
};
use crate::domain::models::counts::EventBookingCounts;
use crate::domain::models::user::Role;
use crate::domain::ports::BookingStore;
use crate::error::BookingError;
use crate::locks::{EventLockGuard, EventLockRegistry};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::types::Json;
use sqlx::{Row, SqlitePool};
use std::time::Duration;

pub struct SqliteBookingStore {
    pool: SqlitePool,
    locks: EventLockRegistry,
}

impl SqliteBookingStore {
    pub fn new(pool: SqlitePool, lock_timeout: Duration) -> Self {
        Self {
            pool,
            locks: EventLockRegistry::new(lock_timeout),
        }
    }

    pub fn lock_registry(&self) -> &EventLockRegistry {
        &self.locks
    }
}

#[async_trait]
impl BookingStore for SqliteBookingStore {
    async fn booking_status_counts(
        &self,
        event_id: &str,
    ) -> Result<EventBookingCounts, BookingError> {
        let rows = sqlx::query_as::<_, (BookingStatus, Role, i64)>(
            "SELECT status, user_role, COUNT(*) FROM event_bookings WHERE event_id = ? GROUP BY status, user_role"
        )
            .bind(event_id)
            .fetch_all(&self.pool)
            .await
            .map_err(BookingError::Database)?;

        let mut counts = EventBookingCounts::new();
        for (status, role, count) in rows {
            counts.set(status, role, count as u64);
        }
        Ok(counts)
    }

    async fn bookings_by_event(&self, event_id: &str) -> Result<Vec<Booking>, BookingError> {
        sqlx::query_as::<_, Booking>(
            "SELECT * FROM event_bookings WHERE event_id = ? ORDER BY booking_date ASC",
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await
        .map_err(BookingError::Database)
    }

    async fn booking_by_event_and_user(
        &self,
        event_id: &str,
        user_id: &str,
    ) -> Result<Option<Booking>, BookingError> {
        sqlx::query_as::<_, Booking>(
            "SELECT * FROM event_bookings WHERE event_id = ? AND user_id = ?",
        )
        .bind(event_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(BookingError::Database)
    }

    async fn is_user_booked(&self, event_id: &str, user_id: &str) -> Result<bool, BookingError> {
        let row = sqlx::query(
            "SELECT COUNT(*) as count FROM event_bookings WHERE event_id = ? AND user_id = ? AND status IN ('CONFIRMED', 'WAITING_LIST', 'RESERVED')"
        )
            .bind(event_id)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(BookingError::Database)?;
        Ok(row.get::<i64, _>("count") > 0)
    }

    async fn create_booking(&self, params: NewBookingParams) -> Result<Booking, BookingError> {
        let booking = Booking::new(params);

        let created = sqlx::query_as::<_, Booking>(
            "INSERT INTO event_bookings (id, event_id, user_id, user_role, status, reserved_by, additional_information, booking_date, updated_date)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING *"
        )
            .bind(&booking.id).bind(&booking.event_id).bind(&booking.user_id)
            .bind(booking.user_role).bind(booking.status).bind(&booking.reserved_by)
            .bind(&booking.additional_information).bind(booking.booking_date).bind(booking.updated_date)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                // 2067 = SQLite unique constraint, one booking per (event, user)
                if let Some(db_err) = e.as_database_error() {
                    if db_err.code().unwrap_or_default() == "2067" {
                        return BookingError::DuplicateBooking {
                            event_id: booking.event_id.clone(),
                            user_id: booking.user_id.clone(),
                        };
                    }
                }
                BookingError::Database(e)
            })?;

        Ok(created)
    }

    async fn update_booking_status(
        &self,
        event_id: &str,
        user_id: &str,
        status: BookingStatus,
        reserved_by: Option<&str>,
        additional_information: Option<&AdditionalInformation>,
    ) -> Result<Booking, BookingError> {
        let updated = if let Some(info) = additional_information {
            sqlx::query_as::<_, Booking>(
                "UPDATE event_bookings SET status = ?, reserved_by = ?, additional_information = ?, updated_date = ?
                 WHERE event_id = ? AND user_id = ?
                 RETURNING *"
            )
                .bind(status).bind(reserved_by).bind(Json(info)).bind(Utc::now())
                .bind(event_id).bind(user_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(BookingError::Database)?
        } else {
            sqlx::query_as::<_, Booking>(
                "UPDATE event_bookings SET status = ?, reserved_by = ?, updated_date = ?
                 WHERE event_id = ? AND user_id = ?
                 RETURNING *"
            )
                .bind(status).bind(reserved_by).bind(Utc::now())
                .bind(event_id).bind(user_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(BookingError::Database)?
        };

        updated.ok_or_else(|| {
            BookingError::NotFound(format!("No booking for user {user_id} on event {event_id}"))
        })
    }

    async fn delete_booking(&self, event_id: &str, user_id: &str) -> Result<(), BookingError> {
        let result = sqlx::query("DELETE FROM event_bookings WHERE event_id = ? AND user_id = ?")
            .bind(event_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(BookingError::Database)?;
        if result.rows_affected() == 0 {
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
