pub mod auth;
pub mod config;
pub mod error;
pub mod loans;
pub mod models;
pub mod progress;
pub mod push;
pub mod store;

#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;
