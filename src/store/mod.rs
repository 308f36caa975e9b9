pub mod booking;
pub mod memory;
