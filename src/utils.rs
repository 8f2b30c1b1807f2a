pub mod money;
pub mod phone;
