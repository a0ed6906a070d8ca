pub mod memory_booking_store;
pub mod sqlite_booking_store;
