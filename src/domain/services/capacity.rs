use crate::domain::models::counts::EventBookingCounts;
use crate::domain::models::event::{AudienceTags, Event, EventStatus};
use crate::domain::models::user::Role;

// Capacity is partitioned by audience tag: an event tagged "student" caps the
// student pool only. Roles not named in the event's audience tags are exempt
// and never blocked by number_of_places.

pub fn is_role_exempt(event: &Event, role: Role, audience: &AudienceTags) -> bool {
    !audience.is_role_constrained(event, role)
}

/// Fullness test for a brand-new confirmed booking.
pub fn has_space_for(
    event: &Event,
    counts: &EventBookingCounts,
    role: Role,
    audience: &AudienceTags,
) -> bool {
    if is_role_exempt(event, role, audience) {
        return true;
    }
    match event.number_of_places {
        None => true,
        Some(places) => counts.occupancy_for_role(role) < places as u64,
    }
}

/// Fullness test for a whole reservation batch, all-or-nothing.
pub fn has_space_for_batch(
    event: &Event,
    counts: &EventBookingCounts,
    role: Role,
    audience: &AudienceTags,
    batch_size: u64,
) -> bool {
    if is_role_exempt(event, role, audience) {
        return true;
    }
    match event.number_of_places {
        None => true,
        Some(places) => counts.occupancy_for_role(role) + batch_size <= places as u64,
    }
}

/// Promotion test for moving an existing waiting-list, reserved or cancelled
/// booking to confirmed. Waiting-list occupants are not counted against
/// themselves here.
pub fn has_space_to_promote(
    event: &Event,
    counts: &EventBookingCounts,
    role: Role,
    audience: &AudienceTags,
) -> bool {
    if is_role_exempt(event, role, audience) {
        return true;
    }
    match event.number_of_places {
        None => true,
        Some(places) => counts.confirmed_for_role(role) < places as u64,
    }
}

/// Displayed availability for one role. `None` means unbounded: either the
/// event has no place limit or the role is exempt from it.
pub fn places_available(
    event: &Event,
    counts: &EventBookingCounts,
    role: Role,
    audience: &AudienceTags,
) -> Option<u64> {
    if event.is_cancelled() {
        return Some(0);
    }
    if is_role_exempt(event, role, audience) {
        return None;
    }
    let places = event.number_of_places? as u64;

    // On a waiting-list-only event no further confirmations happen without
    // explicit promotion, so waiting entries are not subtracted.
    let taken = match event.status {
        EventStatus::WaitingListOnly => counts.confirmed_for_role(role),
        _ => counts.occupancy_for_role(role),
    };

    Some(places.saturating_sub(taken))
}
