//! Library crate for ondeck-back, exposing modules for binaries and integration tests.

mod config;
pub mod dao;
mod dto;
mod error;
pub mod routes;
pub mod services;
pub mod state;
