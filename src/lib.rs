//! Treso alerts library
//!
//! Alert engine and notification dispatch for treasury and market management.
//! The binary wires these components together; tests use them directly.

pub mod config;
pub mod db;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod events;
pub mod models;
pub mod queue;
pub mod repository;
pub mod routes;
pub mod scanner;
pub mod services;
pub mod worker;
