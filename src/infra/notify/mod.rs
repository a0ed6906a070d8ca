pub mod log_notification_service;
