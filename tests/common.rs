#![allow(dead_code)]

use async_trait::async_trait;
use booking_core::domain::models::event::{AudienceTags, Event, EventStatus};
use booking_core::domain::models::user::{Role, UserSummary};
use booking_core::domain::ports::{
    AssociationToken, EmailCategory, EmailTemplate, NotificationService, PermissionOracle,
};
use booking_core::domain::services::booking_manager::BookingManager;
use booking_core::error::BookingError;
use booking_core::infra::repositories::memory_booking_store::MemoryBookingStore;
use booking_core::infra::repositories::sqlite_booking_store::SqliteBookingStore;
use chrono::{Duration as ChronoDuration, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct SentEmail {
    pub template: String,
    pub recipient: String,
    pub category: EmailCategory,
}

/// Notification double that records every send instead of delivering.
/// Flip `fail_sends` to make every send error.
pub struct RecordingNotifier {
    sent: Mutex<Vec<SentEmail>>,
    fail_sends: AtomicBool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail_sends: AtomicBool::new(false),
        }
    }

    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, email: &str) -> Vec<SentEmail> {
        self.sent()
            .into_iter()
            .filter(|mail| mail.recipient == email)
            .collect()
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail_sends.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl NotificationService for RecordingNotifier {
    async fn email_template(&self, name: &str) -> Result<EmailTemplate, BookingError> {
        Ok(EmailTemplate {
            name: name.to_string(),
            subject: format!("{} for {{{{ event_title }}}}", name),
            body: "Hi {{ user_name }}".to_string(),
        })
    }

    async fn send_templated_email(
        &self,
        user: &UserSummary,
        template: &EmailTemplate,
        _substitutions: &BTreeMap<String, String>,
        category: EmailCategory,
    ) -> Result<(), BookingError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(BookingError::NotFound("Mail collaborator offline".to_string()));
        }
        self.sent.lock().unwrap().push(SentEmail {
            template: template.name.clone(),
            recipient: user.email.clone(),
            category,
        });
        Ok(())
    }
}

/// Permission double: allows everything until told otherwise.
pub struct StubPermissionOracle {
    denied_targets: Mutex<HashSet<String>>,
    group_managers: Mutex<HashSet<(String, String)>>,
    tokens: Mutex<HashMap<String, AssociationToken>>,
}

impl StubPermissionOracle {
    pub fn new() -> Self {
        Self {
            denied_targets: Mutex::new(HashSet::new()),
            group_managers: Mutex::new(HashSet::new()),
            tokens: Mutex::new(HashMap::new()),
        }
    }

    pub fn deny_target(&self, target_user_id: &str) {
        self.denied_targets
            .lock()
            .unwrap()
            .insert(target_user_id.to_string());
    }

    pub fn grant_group_manager(&self, group_id: &str, user_id: &str) {
        self.group_managers
            .lock()
            .unwrap()
            .insert((group_id.to_string(), user_id.to_string()));
    }

    pub fn register_token(&self, token: &str, group_id: &str) {
        self.tokens.lock().unwrap().insert(
            token.to_string(),
            AssociationToken {
                token: token.to_string(),
                group_id: group_id.to_string(),
            },
        );
    }
}

#[async_trait]
impl PermissionOracle for StubPermissionOracle {
    async fn is_owner_or_additional_manager(
        &self,
        group_id: &str,
        user_id: &str,
    ) -> Result<bool, BookingError> {
        Ok(self
            .group_managers
            .lock()
            .unwrap()
            .contains(&(group_id.to_string(), user_id.to_string())))
    }

    async fn lookup_association_token(
        &self,
        _user: &UserSummary,
        token: &str,
    ) -> Result<Option<AssociationToken>, BookingError> {
        Ok(self.tokens.lock().unwrap().get(token).cloned())
    }

    async fn has_permission(
        &self,
        _requester: &UserSummary,
        target_user_id: &str,
    ) -> Result<bool, BookingError> {
        Ok(!self.denied_targets.lock().unwrap().contains(target_user_id))
    }
}

pub struct TestHarness {
    pub manager: BookingManager,
    pub store: Arc<MemoryBookingStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub oracle: Arc<StubPermissionOracle>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_lock_timeout(Duration::from_secs(10))
    }

    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        let store = Arc::new(MemoryBookingStore::new(lock_timeout));
        let notifier = Arc::new(RecordingNotifier::new());
        let oracle = Arc::new(StubPermissionOracle::new());
        let manager = BookingManager::new(
            store.clone(),
            oracle.clone(),
            notifier.clone(),
            AudienceTags::default(),
        );
        Self {
            manager,
            store,
            notifier,
            oracle,
        }
    }
}

pub struct SqliteHarness {
    pub manager: BookingManager,
    pub store: Arc<SqliteBookingStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub oracle: Arc<StubPermissionOracle>,
    pub pool: Pool<Sqlite>,
    pub db_filename: String,
}

impl SqliteHarness {
    pub async fn new() -> Self {
        let db_filename = format!("test_{}.db", Uuid::new_v4());
        let db_url = format!("sqlite://{}?mode=rwc", db_filename);

        let connection_options = SqliteConnectOptions::from_str(&db_url)
            .unwrap()
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .connect_with(connection_options)
            .await
            .expect("Failed to connect to test db");

        sqlx::migrate!("./migrations/sqlite")
            .run(&pool)
            .await
            .expect("Failed to migrate test db");

        let store = Arc::new(SqliteBookingStore::new(pool.clone(), Duration::from_secs(10)));
        let notifier = Arc::new(RecordingNotifier::new());
        let oracle = Arc::new(StubPermissionOracle::new());
        let manager = BookingManager::new(
            store.clone(),
            oracle.clone(),
            notifier.clone(),
            AudienceTags::default(),
        );

        Self {
            manager,
            store,
            notifier,
            oracle,
            pool,
            db_filename,
        }
    }
}

impl Drop for SqliteHarness {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.db_filename);
    }
}

pub fn student_event(places: Option<u32>) -> Event {
    Event {
        id: format!("evt-{}", Uuid::new_v4()),
        title: "Open Lab Night".to_string(),
        tags: BTreeSet::from(["student".to_string()]),
        number_of_places: places,
        group_reservation_limit: Some(30),
        date: Some(Utc::now() + ChronoDuration::days(7)),
        end_date: Some(Utc::now() + ChronoDuration::days(7) + ChronoDuration::hours(3)),
        booking_deadline: Some(Utc::now() + ChronoDuration::days(5)),
        status: EventStatus::Open,
        allows_group_bookings: true,
        group_token: None,
    }
}

pub fn untagged_event(places: Option<u32>) -> Event {
    let mut event = student_event(places);
    event.tags = BTreeSet::from(["excursion".to_string()]);
    event
}

pub fn user_with_role(name: &str, role: Role) -> UserSummary {
    UserSummary::new(
        format!("user-{}", Uuid::new_v4()),
        name,
        format!("{}@example.org", name.to_lowercase().replace(' ', ".")),
        role,
    )
}

pub fn student(name: &str) -> UserSummary {
    user_with_role(name, Role::Student)
}

pub fn teacher(name: &str) -> UserSummary {
    user_with_role(name, Role::Teacher)
}

pub fn event_leader(name: &str) -> UserSummary {
    user_with_role(name, Role::EventLeader)
}

pub fn event_manager(name: &str) -> UserSummary {
    user_with_role(name, Role::EventManager)
}

pub fn admin(name: &str) -> UserSummary {
    user_with_role(name, Role::Admin)
}

pub fn info_of(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
