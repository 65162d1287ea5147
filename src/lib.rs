//! F1 Picks backend
//!
//! Grades user picks against official Grand Prix results, records each
//! pick's outcome exactly once and notifies the user by email. Also hosts
//! the wallet, promo code and payment order plumbing that funds picks.

pub mod api;
pub mod auth;
pub mod config;
pub mod middleware;
pub mod models;
pub mod notify;
pub mod payments;
pub mod picks;
pub mod settlement;
pub mod store;
