//! Dispatch Service - voucher sync, FIFO receipt mapping, cash session
//! reconciliation, and exactly-once gate release.

pub mod config;
pub mod dtos;
pub mod error;
pub mod handlers;
pub mod models;
pub mod services;
pub mod startup;

pub use startup::AppState;
