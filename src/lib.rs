//! Credit Scoring API Library
//!
//! Client records with an opaque feature bag, scored by an external income
//! prediction service. The predicted income drives an affordability-based
//! credit limit and a set of income-banded promotional offers.
//!
//! # Modules
//!
//! - `api`: HTTP-facing components.
//! - `core`: Scoring and client domain logic.
//! - `integrations`: External services and persistence.
//! - `client_store`: Client persistence (trait + Postgres implementation).
//! - `config`: Configuration management.
//! - `credit_limit`: Affordability-based credit limit formula.
//! - `db`: Database connection pool and schema.
//! - `errors`: Error handling types.
//! - `features`: Feature vector extraction from client records.
//! - `handlers`: HTTP request handlers.
//! - `import`: CSV bulk import.
//! - `models`: Core data models.
//! - `prediction_client`: Income prediction service client.
//! - `promo`: Income-banded promotional offers.
//! - `routes`: Router and middleware stack.
//! - `scoring`: Scoring orchestration.
//! - `services`: Client CRUD service.

pub mod api;
pub mod core;
pub mod integrations;

pub mod client_store;
pub mod config;
pub mod credit_limit;
pub mod db;
pub mod errors;
pub mod features;
pub mod handlers;
pub mod import;
pub mod models;
pub mod prediction_client;
pub mod promo;
pub mod routes;
pub mod scoring;
pub mod services;
