//! HTTP handlers shared by every dashboard deployment.

pub mod health;

pub use health::health_check;
