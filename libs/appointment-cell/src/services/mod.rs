pub mod availability;
pub mod booking;
pub mod clock;
pub mod conflict;
pub mod directory;
pub mod lifecycle;
pub mod memory;
pub mod store;
pub mod validation;
