use crate::domain::models::booking::{
    AdditionalInformation, Booking, BookingStatus, NewBookingParams,
};
use crate::domain::models::event::{AudienceTags, Event, EventStatus};
use crate::domain::models::user::{Role, UserSummary};
use crate::domain::ports::{BookingStore, EmailCategory, NotificationService, PermissionOracle};
use crate::domain::services::capacity;
use crate::domain::services::permissions::is_user_able_to_manage_event;
use crate::error::BookingError;
use chrono::Utc;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{info, warn};

const TEMPLATE_BOOKING_CONFIRMED: &str = "event-booking-confirmed";
const TEMPLATE_WAITING_LIST_JOINED: &str = "event-waiting-list-joined";
const TEMPLATE_RESERVATION_REQUESTED: &str = "event-reservation-requested";
const TEMPLATE_RESERVATION_RECAP: &str = "event-reservation-recap";
const TEMPLATE_BOOKING_CANCELLED: &str = "event-booking-cancelled";

/// Orchestrates every booking decision for an event. All mutating operations
/// serialize on the store's per-event lock; notifications go out only after
/// the lock is dropped and never fail the operation.
pub struct BookingManager {
    store: Arc<dyn BookingStore>,
    oracle: Arc<dyn PermissionOracle>,
    notifier: Arc<dyn NotificationService>,
    audience: AudienceTags,
}

impl BookingManager {
    pub fn new(
        store: Arc<dyn BookingStore>,
        oracle: Arc<dyn PermissionOracle>,
        notifier: Arc<dyn NotificationService>,
        audience: AudienceTags,
    ) -> Self {
        Self {
            store,
            oracle,
            notifier,
            audience,
        }
    }

    /// Self-service confirmed booking. An existing reservation for this user
    /// is promoted in place; an earlier cancellation may be re-booked.
    pub async fn request_booking(
        &self,
        event: &Event,
        user: &UserSummary,
        info: AdditionalInformation,
    ) -> Result<Booking, BookingError> {
        info!("request_booking: user {} on event {}", user.id, event.id);

        self.ensure_event_open_for_booking(event)?;
        self.ensure_deadline_not_passed(event)?;
        self.ensure_email_verified(user)?;

        let booking = {
            let _guard = self.store.lock_event(&event.id).await?;

            let existing = self
                .store
                .booking_by_event_and_user(&event.id, &user.id)
                .await?;

            match existing {
                Some(prior) => match prior.status {
                    BookingStatus::Confirmed | BookingStatus::WaitingList => {
                        return Err(BookingError::DuplicateBooking {
                            event_id: event.id.clone(),
                            user_id: user.id.clone(),
                        });
                    }
                    BookingStatus::Attended | BookingStatus::Absent => {
                        return Err(BookingError::EventBookingUpdate(format!(
                            "Attendance for user {} is already recorded on event {}",
                            user.id, event.id
                        )));
                    }
                    BookingStatus::Reserved => {
                        // Confirming a held reservation runs the promotion
                        // test, so a long waiting list cannot starve it.
                        let counts = self.store.booking_status_counts(&event.id).await?;
                        if !capacity::has_space_to_promote(
                            event,
                            &counts,
                            prior.user_role,
                            &self.audience,
                        ) {
                            return Err(BookingError::EventFull(event.id.clone()));
                        }
                        self.store
                            .update_booking_status(
                                &event.id,
                                &user.id,
                                BookingStatus::Confirmed,
                                None,
                                Some(&info),
                            )
                            .await?
                    }
                    BookingStatus::Cancelled => {
                        let counts = self.store.booking_status_counts(&event.id).await?;
                        if !capacity::has_space_for(event, &counts, user.role, &self.audience) {
                            return Err(BookingError::EventFull(event.id.clone()));
                        }
                        self.store
                            .update_booking_status(
                                &event.id,
                                &user.id,
                                BookingStatus::Confirmed,
                                None,
                                Some(&info),
                            )
                            .await?
                    }
                },
                None => {
                    let counts = self.store.booking_status_counts(&event.id).await?;
                    if !capacity::has_space_for(event, &counts, user.role, &self.audience) {
                        return Err(BookingError::EventFull(event.id.clone()));
                    }
                    self.store
                        .create_booking(NewBookingParams {
                            event_id: event.id.clone(),
                            user_id: user.id.clone(),
                            user_role: user.role,
                            status: BookingStatus::Confirmed,
                            reserved_by: None,
                            additional_information: info,
                        })
                        .await?
                }
            }
        };

        info!("Booking confirmed: user {} on event {}", user.id, event.id);
        self.notify(user, event, TEMPLATE_BOOKING_CONFIRMED, EmailCategory::Booking)
            .await;

        Ok(booking)
    }

    /// Joins the waiting list. Only valid once the event has no space left
    /// (or runs in waiting-list-only mode); a waiting entry itself never
    /// overflows capacity.
    pub async fn request_waiting_list_booking(
        &self,
        event: &Event,
        user: &UserSummary,
        info: AdditionalInformation,
    ) -> Result<Booking, BookingError> {
        info!(
            "request_waiting_list_booking: user {} on event {}",
            user.id, event.id
        );

        if event.is_cancelled() {
            return Err(BookingError::EventCancelled(event.id.clone()));
        }
        if event.status == EventStatus::Closed {
            return Err(BookingError::EventClosed(event.id.clone()));
        }
        self.ensure_deadline_not_passed(event)?;
        self.ensure_email_verified(user)?;

        let booking = {
            let _guard = self.store.lock_event(&event.id).await?;

            let existing = self
                .store
                .booking_by_event_and_user(&event.id, &user.id)
                .await?;

            if let Some(prior) = &existing {
                match prior.status {
                    BookingStatus::Cancelled => {}
                    BookingStatus::Attended | BookingStatus::Absent => {
                        return Err(BookingError::EventBookingUpdate(format!(
                            "Attendance for user {} is already recorded on event {}",
                            user.id, event.id
                        )));
                    }
                    _ => {
                        return Err(BookingError::DuplicateBooking {
                            event_id: event.id.clone(),
                            user_id: user.id.clone(),
                        });
                    }
                }
            }

            // While a confirmed place is still available the caller belongs
            // on the confirmed path, not here.
            if event.status != EventStatus::WaitingListOnly {
                let counts = self.store.booking_status_counts(&event.id).await?;
                if capacity::has_space_for(event, &counts, user.role, &self.audience) {
                    return Err(BookingError::EventNotFull(event.id.clone()));
                }
            }

            match existing {
                Some(_) => {
                    self.store
                        .update_booking_status(
                            &event.id,
                            &user.id,
                            BookingStatus::WaitingList,
                            None,
                            Some(&info),
                        )
                        .await?
                }
                None => {
                    self.store
                        .create_booking(NewBookingParams {
                            event_id: event.id.clone(),
                            user_id: user.id.clone(),
                            user_role: user.role,
                            status: BookingStatus::WaitingList,
                            reserved_by: None,
                            additional_information: info,
                        })
                        .await?
                }
            }
        };

        info!(
            "Waiting list joined: user {} on event {}",
            user.id, event.id
        );
        self.notify(
            user,
            event,
            TEMPLATE_WAITING_LIST_JOINED,
            EmailCategory::WaitingList,
        )
        .await;

        Ok(booking)
    }

    /// Bulk reservation on behalf of other users, all-or-nothing. Each
    /// reserved user later confirms through `request_booking`.
    pub async fn request_reservations(
        &self,
        event: &Event,
        users: &[UserSummary],
        reserving_user: &UserSummary,
    ) -> Result<Vec<Booking>, BookingError> {
        info!(
            "request_reservations: {} users by {} on event {}",
            users.len(),
            reserving_user.id,
            event.id
        );

        if users.is_empty() {
            return Ok(Vec::new());
        }

        self.ensure_event_open_for_booking(event)?;
        if !event.allows_group_bookings {
            return Err(BookingError::Forbidden(format!(
                "Event {} does not allow group bookings",
                event.id
            )));
        }
        if !reserving_user.role.can_reserve_for_others() {
            return Err(BookingError::Forbidden(format!(
                "Role {} may not reserve for others",
                reserving_user.role
            )));
        }
        for target in users {
            if !self.oracle.has_permission(reserving_user, &target.id).await? {
                return Err(BookingError::Forbidden(format!(
                    "User {} may not book on behalf of {}",
                    reserving_user.id, target.id
                )));
            }
        }
        if let Some(limit) = event.group_reservation_limit {
            if users.len() as u64 > limit as u64 {
                return Err(BookingError::GroupReservationLimit {
                    event_id: event.id.clone(),
                    limit,
                });
            }
        }
        self.ensure_deadline_not_passed(event)?;

        let bookings = {
            let _guard = self.store.lock_event(&event.id).await?;

            let mut rebookable = Vec::new();
            let mut seen_targets = HashSet::new();
            for target in users {
                // A target may appear once per batch; catching a repeat here
                // keeps the failure ahead of any write.
                if !seen_targets.insert(target.id.as_str()) {
                    return Err(BookingError::DuplicateBooking {
                        event_id: event.id.clone(),
                        user_id: target.id.clone(),
                    });
                }
                let existing = self
                    .store
                    .booking_by_event_and_user(&event.id, &target.id)
                    .await?;
                match existing {
                    None => {}
                    Some(prior) if prior.status == BookingStatus::Cancelled => {
                        rebookable.push(target.id.clone());
                    }
                    Some(_) => {
                        return Err(BookingError::DuplicateBooking {
                            event_id: event.id.clone(),
                            user_id: target.id.clone(),
                        });
                    }
                }
            }

            // The whole batch must fit in every constrained role pool it
            // touches, or nothing is written.
            let counts = self.store.booking_status_counts(&event.id).await?;
            let mut batch_by_role: BTreeMap<Role, u64> = BTreeMap::new();
            for target in users {
                *batch_by_role.entry(target.role).or_insert(0) += 1;
            }
            for (role, batch_size) in &batch_by_role {
                if !capacity::has_space_for_batch(
                    event,
                    &counts,
                    *role,
                    &self.audience,
                    *batch_size,
                ) {
                    return Err(BookingError::EventFull(event.id.clone()));
                }
            }

            let mut written = Vec::with_capacity(users.len());
            for target in users {
                let booking = if rebookable.contains(&target.id) {
                    self.store
                        .update_booking_status(
                            &event.id,
                            &target.id,
                            BookingStatus::Reserved,
                            Some(&reserving_user.id),
                            None,
                        )
                        .await?
                } else {
                    self.store
                        .create_booking(NewBookingParams {
                            event_id: event.id.clone(),
                            user_id: target.id.clone(),
                            user_role: target.role,
                            status: BookingStatus::Reserved,
                            reserved_by: Some(reserving_user.id.clone()),
                            additional_information: AdditionalInformation::new(),
                        })
                        .await?
                };
                written.push(booking);
            }
            written
        };

        info!(
            "Reserved {} places on event {} for {}",
            bookings.len(),
            event.id,
            reserving_user.id
        );
        for target in users {
            self.notify(
                target,
                event,
                TEMPLATE_RESERVATION_REQUESTED,
                EmailCategory::Reservation,
            )
            .await;
        }
        self.notify(
            reserving_user,
            event,
            TEMPLATE_RESERVATION_RECAP,
            EmailCategory::Reservation,
        )
        .await;

        Ok(bookings)
    }

    /// Privileged direct creation with a chosen status. Skips the
    /// conversational checks but never the lock or the duplicate guard.
    pub async fn create_booking(
        &self,
        event: &Event,
        user: &UserSummary,
        info: AdditionalInformation,
        status: BookingStatus,
    ) -> Result<Booking, BookingError> {
        info!(
            "create_booking: user {} on event {} as {}",
            user.id, event.id, status
        );

        let booking = {
            let _guard = self.store.lock_event(&event.id).await?;

            let existing = self
                .store
                .booking_by_event_and_user(&event.id, &user.id)
                .await?;

            if let Some(prior) = existing {
                if prior.status.is_active() {
                    return Err(BookingError::DuplicateBooking {
                        event_id: event.id.clone(),
                        user_id: user.id.clone(),
                    });
                }
                // A terminal row is replaced outright; the fresh row
                // re-captures the user's current role.
                self.store.delete_booking(&event.id, &user.id).await?;
            }

            self.store
                .create_booking(NewBookingParams {
                    event_id: event.id.clone(),
                    user_id: user.id.clone(),
                    user_role: user.role,
                    status,
                    reserved_by: None,
                    additional_information: info,
                })
                .await?
        };

        if status == BookingStatus::Confirmed {
            self.notify(user, event, TEMPLATE_BOOKING_CONFIRMED, EmailCategory::Booking)
                .await;
        }

        Ok(booking)
    }

    /// Staff promotion of a waiting-list, reserved or cancelled booking into
    /// a confirmed place, typically after a cancellation freed one.
    pub async fn promote_to_confirmed(
        &self,
        event: &Event,
        user: &UserSummary,
        promoting_user: &UserSummary,
    ) -> Result<Booking, BookingError> {
        info!(
            "promote_to_confirmed: user {} on event {} by {}",
            user.id, event.id, promoting_user.id
        );

        self.ensure_can_manage(event, promoting_user).await?;
        if event.is_cancelled() {
            return Err(BookingError::EventCancelled(event.id.clone()));
        }

        let booking = {
            let _guard = self.store.lock_event(&event.id).await?;

            let existing = self
                .store
                .booking_by_event_and_user(&event.id, &user.id)
                .await?;
            let prior = match existing {
                Some(prior) => prior,
                None => {
                    return Err(BookingError::NotFound(format!(
                        "No booking for user {} on event {}",
                        user.id, event.id
                    )));
                }
            };

            if !prior.status.can_transition_to(BookingStatus::Confirmed) {
                return Err(BookingError::EventBookingUpdate(format!(
                    "Cannot promote a {} booking to CONFIRMED",
                    prior.status
                )));
            }

            let counts = self.store.booking_status_counts(&event.id).await?;
            if !capacity::has_space_to_promote(event, &counts, prior.user_role, &self.audience) {
                return Err(BookingError::EventFull(event.id.clone()));
            }

            self.store
                .update_booking_status(&event.id, &user.id, BookingStatus::Confirmed, None, None)
                .await?
        };

        info!("Promoted user {} on event {}", user.id, event.id);
        self.notify(user, event, TEMPLATE_BOOKING_CONFIRMED, EmailCategory::Booking)
            .await;

        Ok(booking)
    }

    /// Cancels an active booking. Never deletes the row and never promotes
    /// the next waiting-list entrant on its own.
    pub async fn cancel_booking(
        &self,
        event: &Event,
        user: &UserSummary,
    ) -> Result<Booking, BookingError> {
        info!("cancel_booking: user {} on event {}", user.id, event.id);

        if event.is_cancelled() {
            return Err(BookingError::EventCancelled(event.id.clone()));
        }
        if event.has_started(Utc::now()) {
            return Err(BookingError::EventHasStarted(event.id.clone()));
        }

        let booking = {
            let _guard = self.store.lock_event(&event.id).await?;

            let existing = self
                .store
                .booking_by_event_and_user(&event.id, &user.id)
                .await?;
            let prior = match existing {
                Some(prior) => prior,
                None => {
                    return Err(BookingError::NotFound(format!(
                        "No booking for user {} on event {}",
                        user.id, event.id
                    )));
                }
            };

            if !prior.status.can_transition_to(BookingStatus::Cancelled) {
                return Err(BookingError::EventBookingUpdate(format!(
                    "Cannot cancel a {} booking",
                    prior.status
                )));
            }

            self.store
                .update_booking_status(&event.id, &user.id, BookingStatus::Cancelled, None, None)
                .await?
        };

        info!("Booking cancelled: user {} on event {}", user.id, event.id);
        self.notify(
            user,
            event,
            TEMPLATE_BOOKING_CANCELLED,
            EmailCategory::Cancellation,
        )
        .await;

        Ok(booking)
    }

    /// Marks a confirmed booking attended or absent. Corrections between the
    /// two attendance outcomes are allowed.
    pub async fn record_attendance(
        &self,
        event: &Event,
        user: &UserSummary,
        attended: bool,
        recording_user: &UserSummary,
    ) -> Result<Booking, BookingError> {
        info!(
            "record_attendance: user {} on event {} attended={}",
            user.id, event.id, attended
        );

        self.ensure_can_manage(event, recording_user).await?;
        if event.is_cancelled() {
            return Err(BookingError::EventCancelled(event.id.clone()));
        }

        let target = if attended {
            BookingStatus::Attended
        } else {
            BookingStatus::Absent
        };

        let booking = {
            let _guard = self.store.lock_event(&event.id).await?;

            let existing = self
                .store
                .booking_by_event_and_user(&event.id, &user.id)
                .await?;
            let prior = match existing {
                Some(prior) => prior,
                None => {
                    return Err(BookingError::NotFound(format!(
                        "No booking for user {} on event {}",
                        user.id, event.id
                    )));
                }
            };

            if !prior.status.can_transition_to(target) {
                return Err(BookingError::EventBookingUpdate(format!(
                    "Cannot record a {} booking as {}",
                    prior.status, target
                )));
            }

            self.store
                .update_booking_status(&event.id, &user.id, target, None, None)
                .await?
        };

        Ok(booking)
    }

    /// Erases a booking row and its history. Cancellation is the normal
    /// path; this one exists for data corrections only.
    pub async fn delete_booking(
        &self,
        event: &Event,
        user: &UserSummary,
        deleting_user: &UserSummary,
    ) -> Result<(), BookingError> {
        if deleting_user.role != Role::Admin {
            return Err(BookingError::Forbidden(format!(
                "Role {} may not delete bookings",
                deleting_user.role
            )));
        }

        let _guard = self.store.lock_event(&event.id).await?;
        self.store.delete_booking(&event.id, &user.id).await?;
        info!(
            "Booking deleted: user {} on event {} by {}",
            user.id, event.id, deleting_user.id
        );
        Ok(())
    }

    /// Re-sends the notification matching the booking's current status.
    pub async fn resend_confirmation(
        &self,
        event: &Event,
        user: &UserSummary,
        requesting_user: &UserSummary,
    ) -> Result<(), BookingError> {
        self.ensure_can_manage(event, requesting_user).await?;

        let existing = self
            .store
            .booking_by_event_and_user(&event.id, &user.id)
            .await?;
        let booking = match existing {
            Some(booking) => booking,
            None => {
                return Err(BookingError::NotFound(format!(
                    "No booking for user {} on event {}",
                    user.id, event.id
                )));
            }
        };

        let (template_name, category) = match booking.status {
            BookingStatus::Confirmed | BookingStatus::Attended | BookingStatus::Absent => {
                (TEMPLATE_BOOKING_CONFIRMED, EmailCategory::Booking)
            }
            BookingStatus::WaitingList => (TEMPLATE_WAITING_LIST_JOINED, EmailCategory::WaitingList),
            BookingStatus::Reserved => {
                (TEMPLATE_RESERVATION_REQUESTED, EmailCategory::Reservation)
            }
            BookingStatus::Cancelled => (TEMPLATE_BOOKING_CANCELLED, EmailCategory::Cancellation),
        };

        // Resending is the whole point here, so a send failure is the
        // caller's to see.
        let template = self.notifier.email_template(template_name).await?;
        let substitutions = self.substitutions_for(user, event);
        self.notifier
            .send_templated_email(user, &template, &substitutions, category)
            .await?;

        info!(
            "Re-sent {} to user {} for event {}",
            template_name, user.id, event.id
        );
        Ok(())
    }

    /// Point-in-time availability for one role; `None` means unbounded.
    /// Lock-free, so the answer may be stale by the time anyone acts on it.
    pub async fn places_available(
        &self,
        event: &Event,
        role: Role,
    ) -> Result<Option<u64>, BookingError> {
        let counts = self.store.booking_status_counts(&event.id).await?;
        Ok(capacity::places_available(
            event,
            &counts,
            role,
            &self.audience,
        ))
    }

    pub async fn booking_for(
        &self,
        event: &Event,
        user: &UserSummary,
    ) -> Result<Option<Booking>, BookingError> {
        self.store
            .booking_by_event_and_user(&event.id, &user.id)
            .await
    }

    /// Full attendee listing, staff only.
    pub async fn bookings_for_event(
        &self,
        event: &Event,
        requesting_user: &UserSummary,
    ) -> Result<Vec<Booking>, BookingError> {
        self.ensure_can_manage(event, requesting_user).await?;
        self.store.bookings_by_event(&event.id).await
    }

    fn ensure_event_open_for_booking(&self, event: &Event) -> Result<(), BookingError> {
        match event.status {
            EventStatus::Cancelled => Err(BookingError::EventCancelled(event.id.clone())),
            EventStatus::Closed => Err(BookingError::EventClosed(event.id.clone())),
            EventStatus::WaitingListOnly => Err(BookingError::EventFull(event.id.clone())),
            EventStatus::Open => Ok(()),
        }
    }

    fn ensure_deadline_not_passed(&self, event: &Event) -> Result<(), BookingError> {
        if event.deadline_has_passed(Utc::now()) {
            return Err(BookingError::EventDeadline(event.id.clone()));
        }
        Ok(())
    }

    fn ensure_email_verified(&self, user: &UserSummary) -> Result<(), BookingError> {
        if !user.email_verified {
            return Err(BookingError::EmailMustBeVerified(user.id.clone()));
        }
        Ok(())
    }

    async fn ensure_can_manage(
        &self,
        event: &Event,
        user: &UserSummary,
    ) -> Result<(), BookingError> {
        if !is_user_able_to_manage_event(self.oracle.as_ref(), user, event).await? {
            return Err(BookingError::Forbidden(format!(
                "User {} may not manage event {}",
                user.id, event.id
            )));
        }
        Ok(())
    }

    fn substitutions_for(&self, user: &UserSummary, event: &Event) -> BTreeMap<String, String> {
        let mut substitutions = BTreeMap::from([
            ("user_name".to_string(), user.name.clone()),
            ("event_title".to_string(), event.title.clone()),
        ]);
        if let Some(date) = event.date {
            substitutions.insert("event_date".to_string(), date.to_rfc3339());
        }
        substitutions
    }

    async fn notify(
        &self,
        user: &UserSummary,
        event: &Event,
        template_name: &str,
        category: EmailCategory,
    ) {
        let result = async {
            let template = self.notifier.email_template(template_name).await?;
            let substitutions = self.substitutions_for(user, event);
            self.notifier
                .send_templated_email(user, &template, &substitutions, category)
                .await
        }
        .await;

        if let Err(err) = result {
            warn!(
                "Failed to send {} to {} for event {}: {}",
                template_name, user.email, event.id, err
            );
        }
    }
}
