pub mod admin;
pub mod auth;
pub mod events;
pub mod health;
pub mod payroll;

pub const MISSING_PAYLOAD_ERRORMSG: &str = "Missing payload";
