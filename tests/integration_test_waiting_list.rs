mod common;

use booking_core::domain::models::booking::BookingStatus;
use booking_core::domain::models::event::EventStatus;
use booking_core::domain::ports::EmailCategory;
use booking_core::error::BookingError;
use chrono::{Duration, Utc};
use common::{info_of, student, teacher, TestHarness};

#[tokio::test]
async fn test_waiting_list_rejected_while_places_remain() {
    let harness = TestHarness::new();
    let event = common::student_event(Some(10));

    let err = harness
        .manager
        .request_waiting_list_booking(&event, &student("Alice"), info_of(&[]))
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::EventNotFull(_)));
}

#[tokio::test]
async fn test_waiting_list_join_once_event_is_full() {
    let harness = TestHarness::new();
    let event = common::student_event(Some(1));
    let bob = student("Bob");

    harness
        .manager
        .request_booking(&event, &student("Alice"), info_of(&[]))
        .await
        .unwrap();

    let booking = harness
        .manager
        .request_waiting_list_booking(&event, &bob, info_of(&[("diet", "vegan")]))
        .await
        .expect("full event should accept waiting list joins");

    assert_eq!(booking.status, BookingStatus::WaitingList);
    assert_eq!(
        booking.additional_information.get("diet").map(String::as_str),
        Some("vegan")
    );

    let sent = harness.notifier.sent_to(&bob.email);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].template, "event-waiting-list-joined");
    assert_eq!(sent[0].category, EmailCategory::WaitingList);
}

#[tokio::test]
async fn test_waiting_list_only_event_accepts_joins_with_space() {
    let harness = TestHarness::new();
    let mut event = common::student_event(Some(10));
    event.status = EventStatus::WaitingListOnly;

    let booking = harness
        .manager
        .request_waiting_list_booking(&event, &student("Alice"), info_of(&[]))
        .await
        .expect("waiting-list-only events skip the free-places check");
    assert_eq!(booking.status, BookingStatus::WaitingList);
}

#[tokio::test]
async fn test_unconstrained_role_walks_the_waiting_list_only_path_too() {
    let harness = TestHarness::new();
    let mut event = common::student_event(Some(10));
    event.status = EventStatus::WaitingListOnly;
    let miss_honey = teacher("Honey");

    // Direct booking is off for everyone while the event runs list-only.
    let err = harness
        .manager
        .request_booking(&event, &miss_honey, info_of(&[]))
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::EventFull(_)));

    let booking = harness
        .manager
        .request_waiting_list_booking(&event, &miss_honey, info_of(&[]))
        .await
        .unwrap();
    assert_eq!(booking.status, BookingStatus::WaitingList);
}

#[tokio::test]
async fn test_waiting_list_rejoin_after_cancellation() {
    let harness = TestHarness::new();
    let event = common::student_event(Some(1));
    let bob = student("Bob");

    harness
        .manager
        .request_booking(&event, &student("Alice"), info_of(&[]))
        .await
        .unwrap();
    harness
        .manager
        .request_waiting_list_booking(&event, &bob, info_of(&[]))
        .await
        .unwrap();
    harness.manager.cancel_booking(&event, &bob).await.unwrap();

    let rejoined = harness
        .manager
        .request_waiting_list_booking(&event, &bob, info_of(&[]))
        .await
        .expect("cancelled entries may rejoin the list");
    assert_eq!(rejoined.status, BookingStatus::WaitingList);
}

#[tokio::test]
async fn test_waiting_list_duplicate_join() {
    let harness = TestHarness::new();
    let event = common::student_event(Some(1));
    let bob = student("Bob");

    harness
        .manager
        .request_booking(&event, &student("Alice"), info_of(&[]))
        .await
        .unwrap();
    harness
        .manager
        .request_waiting_list_booking(&event, &bob, info_of(&[]))
        .await
        .unwrap();

    let err = harness
        .manager
        .request_waiting_list_booking(&event, &bob, info_of(&[]))
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::DuplicateBooking { .. }));
}

#[tokio::test]
async fn test_waiting_list_rejected_for_closed_event() {
    let harness = TestHarness::new();
    let mut event = common::student_event(Some(1));
    event.status = EventStatus::Closed;

    let err = harness
        .manager
        .request_waiting_list_booking(&event, &student("Alice"), info_of(&[]))
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::EventClosed(_)));
}

#[tokio::test]
async fn test_waiting_list_rejected_for_cancelled_event() {
    let harness = TestHarness::new();
    let mut event = common::student_event(Some(1));
    event.status = EventStatus::Cancelled;

    let err = harness
        .manager
        .request_waiting_list_booking(&event, &student("Alice"), info_of(&[]))
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::EventCancelled(_)));
}

#[tokio::test]
async fn test_waiting_list_rejected_after_deadline() {
    let harness = TestHarness::new();
    let mut event = common::student_event(Some(1));
    event.booking_deadline = Some(Utc::now() - Duration::hours(1));

    let err = harness
        .manager
        .request_waiting_list_booking(&event, &student("Alice"), info_of(&[]))
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::EventDeadline(_)));
}

#[tokio::test]
async fn test_waiting_list_requires_verified_email() {
    let harness = TestHarness::new();
    let event = common::student_event(Some(0));
    let mut alice = student("Alice");
    alice.email_verified = false;

    let err = harness
        .manager
        .request_waiting_list_booking(&event, &alice, info_of(&[]))
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::EmailMustBeVerified(_)));
}

#[tokio::test]
async fn test_recorded_attendance_blocks_waiting_list_join() {
    let harness = TestHarness::new();
    let event = common::student_event(Some(1));
    let alice = student("Alice");

    harness
        .manager
        .create_booking(&event, &alice, info_of(&[]), BookingStatus::Absent)
        .await
        .unwrap();

    let err = harness
        .manager
        .request_waiting_list_booking(&event, &alice, info_of(&[]))
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::EventBookingUpdate(_)));
}

#[tokio::test]
async fn test_cancellation_never_promotes_the_waiting_list_on_its_own() {
    let harness = TestHarness::new();
    let event = common::student_event(Some(1));
    let alice = student("Alice");
    let bob = student("Bob");

    harness
        .manager
        .request_booking(&event, &alice, info_of(&[]))
        .await
        .unwrap();
    harness
        .manager
        .request_waiting_list_booking(&event, &bob, info_of(&[]))
        .await
        .unwrap();
    harness.manager.cancel_booking(&event, &alice).await.unwrap();

    // Bob keeps waiting, and his entry still occupies the place for anyone new.
    let bobs = harness.manager.booking_for(&event, &bob).await.unwrap().unwrap();
    assert_eq!(bobs.status, BookingStatus::WaitingList);

    let err = harness
        .manager
        .request_booking(&event, &student("Cara"), info_of(&[]))
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::EventFull(_)));
}
