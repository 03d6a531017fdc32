//! Unit tests module
//!
//! Exercises the engine, dispatcher, worker and scanners against in-memory
//! fakes of their storage, sender and queue seams.

#[path = "../common/fakes.rs"]
mod fakes;

mod config_test;
