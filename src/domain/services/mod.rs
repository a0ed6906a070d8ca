pub mod booking_manager;
pub mod capacity;
pub mod permissions;
