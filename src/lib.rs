//! Library crate for keydance, exposing modules for the server and tooling binaries.

pub mod config;
pub mod device;
pub mod dto;
pub mod error;
pub mod routes;
pub mod services;
pub mod state;
