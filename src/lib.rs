// src/lib.rs

//! A fake CTDB cluster daemon for exercising CTDB clients without a real cluster.

pub mod config;
pub mod connection;
pub mod core;
pub mod server;
