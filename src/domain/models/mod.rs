pub mod booking;
pub mod counts;
pub mod event;
pub mod user;
