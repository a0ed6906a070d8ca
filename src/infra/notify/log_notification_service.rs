use crate::domain::models::user::UserSummary;
use crate::domain::ports::{EmailCategory, EmailTemplate, NotificationService};
use crate::error::BookingError;
use async_trait::async_trait;
use std::collections::BTreeMap;
use tracing::info;

const DEFAULT_CONFIRMED_SUBJECT: &str = "Booking Confirmed: {{ event_title }}";
const DEFAULT_WAITING_LIST_SUBJECT: &str = "Waiting List: {{ event_title }}";
const DEFAULT_RESERVATION_SUBJECT: &str = "Place Reserved: {{ event_title }}";
const DEFAULT_RESERVATION_RECAP_SUBJECT: &str = "Reservation Summary: {{ event_title }}";
const DEFAULT_CANCELLED_SUBJECT: &str = "Booking Cancelled: {{ event_title }}";

/// Notification adapter for deployments without a mail collaborator: renders
/// the built-in templates and writes the result to the log instead of
/// delivering anything.
pub struct LogNotificationService;

impl LogNotificationService {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LogNotificationService {
    fn default() -> Self {
        Self::new()
    }
}

fn render(text: &str, substitutions: &BTreeMap<String, String>) -> String {
    let mut rendered = text.to_string();
    for (key, value) in substitutions {
        rendered = rendered.replace(&format!("{{{{ {key} }}}}"), value);
    }
    rendered
}

#[async_trait]
impl NotificationService for LogNotificationService {
    async fn email_template(&self, name: &str) -> Result<EmailTemplate, BookingError> {
        let (subject, body) = match name {
            "event-booking-confirmed" => (
                DEFAULT_CONFIRMED_SUBJECT,
                "Hi {{ user_name }}, your place at {{ event_title }} is confirmed.",
            ),
            "event-waiting-list-joined" => (
                DEFAULT_WAITING_LIST_SUBJECT,
                "Hi {{ user_name }}, you are on the waiting list for {{ event_title }}.",
            ),
            "event-reservation-requested" => (
                DEFAULT_RESERVATION_SUBJECT,
                "Hi {{ user_name }}, a place at {{ event_title }} has been reserved for you. Confirm it to secure your spot.",
            ),
            "event-reservation-recap" => (
                DEFAULT_RESERVATION_RECAP_SUBJECT,
                "Hi {{ user_name }}, your reservations for {{ event_title }} were created.",
            ),
            "event-booking-cancelled" => (
                DEFAULT_CANCELLED_SUBJECT,
                "Hi {{ user_name }}, your booking for {{ event_title }} was cancelled.",
            ),
            other => {
                return Err(BookingError::NotFound(format!("Email template {other}")));
            }
        };

        Ok(EmailTemplate {
            name: name.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        })
    }

    async fn send_templated_email(
        &self,
        user: &UserSummary,
        template: &EmailTemplate,
        substitutions: &BTreeMap<String, String>,
        category: EmailCategory,
    ) -> Result<(), BookingError> {
        let subject = render(&template.subject, substitutions);
        info!(
            "Notification ({:?}) to {}: {} [template {}]",
            category, user.email, subject, template.name
        );
        Ok(())
    }
}
