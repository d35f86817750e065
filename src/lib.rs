//! Photo critique pipeline
//!
//! Queues submitted photo evaluations, asks a vision model for a critique,
//! extracts per-category scores from the free-form answer and writes the
//! result back to the evaluation record.

pub mod app_state;
pub mod config;
pub mod db;
pub mod models;
pub mod routes;
pub mod services;
