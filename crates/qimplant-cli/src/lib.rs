//! q-implant test harness CLI library
//!
//! This library exposes the command implementations for the
//! `qimplant-test` binary and for testing.

pub mod commands;
pub mod config;
pub mod driver;
pub mod exit;
pub mod logging;
