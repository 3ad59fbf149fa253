//! Internal modules for the NetLib test client.
//!
//! This library provides packet line parsing, the input-producer thread and
//! configuration loading used by the nl_client binary.

pub mod commands;
pub mod config;
pub mod input;
