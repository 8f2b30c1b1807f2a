pub mod drivers;
pub mod reports;
pub mod trips;
