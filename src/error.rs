use thiserror::Error;

#[derive(Error, Debug)]
pub enum BookingError {
    #[error("Event {0} is full")]
    EventFull(String),
    #[error("Event {0} still has places available")]
    EventNotFull(String),
    #[error("Event {0} is cancelled")]
    EventCancelled(String),
    #[error("Event {0} is closed for bookings")]
    EventClosed(String),
    #[error("Booking deadline for event {0} has passed")]
    EventDeadline(String),
    #[error("Event {0} has already started")]
    EventHasStarted(String),
    #[error("Reservation batch exceeds the group reservation limit of {limit} for event {event_id}")]
    GroupReservationLimit { event_id: String, limit: u32 },
    #[error("User {user_id} already has a booking for event {event_id}")]
    DuplicateBooking { event_id: String, user_id: String },
    #[error("User {0} must verify their email address before booking")]
    EmailMustBeVerified(String),
    #[error("Booking update not allowed: {0}")]
    EventBookingUpdate(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Resource not found: {0}")]
    NotFound(String),
    #[error("Timed out waiting for the booking lock on event {0}")]
    LockTimeout(String),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl BookingError {
    /// Lock contention and storage faults are transient; every business
    /// rejection is final until the caller changes something.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BookingError::LockTimeout(_) | BookingError::Database(_))
    }
}
