//! konto: account management with a security and audit core.

pub mod account;
pub mod admin;
pub mod api;
pub mod audit;
pub mod cli;
pub mod error;
pub mod security;
pub mod store;
