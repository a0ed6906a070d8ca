use async_trait::async_trait;
use booking_core::domain::models::booking::AdditionalInformation;
use booking_core::domain::models::event::{AudienceTags, Event, EventStatus};
use booking_core::domain::models::user::{Role, UserSummary};
use booking_core::domain::ports::{AssociationToken, PermissionOracle};
use booking_core::domain::services::booking_manager::BookingManager;
use booking_core::error::BookingError;
use booking_core::infra::notify::log_notification_service::LogNotificationService;
use booking_core::infra::repositories::memory_booking_store::MemoryBookingStore;
use colored::*;
use hdrhistogram::Histogram;
use rand::Rng;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use uuid::Uuid;

const PLACES: u32 = 100;

struct AllowAllOracle;

#[async_trait]
impl PermissionOracle for AllowAllOracle {
    async fn is_owner_or_additional_manager(&self, _: &str, _: &str) -> Result<bool, BookingError> {
        Ok(true)
    }
    async fn lookup_association_token(
        &self,
        _: &UserSummary,
        _: &str,
    ) -> Result<Option<AssociationToken>, BookingError> {
        Ok(None)
    }
    async fn has_permission(&self, _: &UserSummary, _: &str) -> Result<bool, BookingError> {
        Ok(true)
    }
}

enum Outcome {
    Confirmed,
    Waiting,
    Rejected,
}

#[tokio::main]
async fn main() {
    println!("{}", "🚀 Booking Storm".bold().green());
    println!(
        "Racing concurrent booking requests against one event with {} places.",
        PLACES
    );

    println!(
        "\n{:<10} | {:<12} | {:<12} | {:<10} | {:<10} | {:<10}",
        "Callers", "Mean (ms)", "P99 (ms)", "Confirmed", "Waiting", "Rejected"
    );
    println!(
        "{:-<10}-+-{:-<12}-+-{:-<12}-+-{:-<10}-+-{:-<10}-+-{:-<10}",
        "", "", "", "", "", ""
    );

    for &callers in &[200usize, 500, 2000] {
        run_stage(callers).await;
    }

    println!("\n{}", "✅ All stages passed their invariants.".green().bold());
}

async fn run_stage(callers: usize) {
    let store = Arc::new(MemoryBookingStore::new(Duration::from_secs(10)));
    let manager = Arc::new(BookingManager::new(
        store.clone(),
        Arc::new(AllowAllOracle),
        Arc::new(LogNotificationService::new()),
        AudienceTags::default(),
    ));

    let event = Event {
        id: format!("storm-{}", Uuid::new_v4()),
        title: "Storm Night".to_string(),
        tags: BTreeSet::from(["student".to_string()]),
        number_of_places: Some(PLACES),
        group_reservation_limit: None,
        date: None,
        end_date: None,
        booking_deadline: None,
        status: EventStatus::Open,
        allows_group_bookings: false,
        group_token: None,
    };

    let (tx, mut rx) = mpsc::channel(callers.max(1));

    for i in 0..callers {
        let manager = manager.clone();
        let event = event.clone();
        let tx = tx.clone();

        // Every tenth caller is a teacher, exempt from the student cap.
        let role = if i % 10 == 9 {
            Role::Teacher
        } else {
            Role::Student
        };

        tokio::spawn(async move {
            let user = UserSummary::new(
                Uuid::new_v4().to_string(),
                format!("Storm User {i}"),
                format!("storm{i}@example.org"),
                role,
            );

            // Stagger arrivals so a stage is a storm, not one synchronized burst.
            let jitter = rand::thread_rng().gen_range(0..2_000u64);
            tokio::time::sleep(Duration::from_micros(jitter)).await;

            let started = Instant::now();
            let outcome = match manager
                .request_booking(&event, &user, AdditionalInformation::new())
                .await
            {
                Ok(_) => Outcome::Confirmed,
                Err(BookingError::EventFull(_)) => {
                    match manager
                        .request_waiting_list_booking(&event, &user, AdditionalInformation::new())
                        .await
                    {
                        Ok(_) => Outcome::Waiting,
                        Err(_) => Outcome::Rejected,
                    }
                }
                Err(_) => Outcome::Rejected,
            };
            let latency = started.elapsed();

            let _ = tx.send((latency, outcome)).await;
        });
    }

    drop(tx);

    let mut histogram = Histogram::<u64>::new(3).unwrap();
    let mut confirmed = 0u64;
    let mut waiting = 0u64;
    let mut rejected = 0u64;

    while let Some((latency, outcome)) = rx.recv().await {
        histogram.record(latency.as_micros() as u64).unwrap();
        match outcome {
            Outcome::Confirmed => confirmed += 1,
            Outcome::Waiting => waiting += 1,
            Outcome::Rejected => rejected += 1,
        }
    }

    let mean_ms = histogram.mean() / 1000.0;
    let p99_ms = histogram.value_at_quantile(0.99) as f64 / 1000.0;

    println!(
        "{:<10} | {:<12.2} | {:<12.2} | {:<10} | {:<10} | {:<10}",
        callers, mean_ms, p99_ms, confirmed, waiting, rejected
    );

    verify_stage(&store, &event, callers).await;
}

async fn verify_stage(store: &Arc<MemoryBookingStore>, event: &Event, callers: usize) {
    use booking_core::domain::ports::BookingStore;

    let counts = store
        .booking_status_counts(&event.id)
        .await
        .expect("count query failed");

    let confirmed_students = counts.confirmed_for_role(Role::Student);
    if confirmed_students > PLACES as u64 {
        println!(
            "{}",
            format!(
                "❌ Over-subscription: {} confirmed students for {} places",
                confirmed_students, PLACES
            )
            .red()
            .bold()
        );
        std::process::exit(1);
    }

    let registry = store.lock_registry();
    if registry.acquired_count() != registry.released_count() {
        println!(
            "{}",
            format!(
                "❌ Lock leak: {} acquired vs {} released",
                registry.acquired_count(),
                registry.released_count()
            )
            .red()
            .bold()
        );
        std::process::exit(1);
    }

    // Teachers are exempt, so every teacher caller must hold a confirmed row.
    let expected_teachers = (callers / 10) as u64;
    let confirmed_teachers = counts.confirmed_for_role(Role::Teacher);
    if confirmed_teachers != expected_teachers {
        println!(
            "{}",
            format!(
                "❌ Exempt role blocked: {} of {} teachers confirmed",
                confirmed_teachers, expected_teachers
            )
            .red()
            .bold()
        );
        std::process::exit(1);
    }
}
