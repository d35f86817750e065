pub mod evaluations;
pub mod health;
pub mod metrics;
