//! Library exports for the URL shortener application
//!
//! This module exposes internal components for testing and for the binary.

pub mod config;
pub mod database;
pub mod error;
pub mod handler;
pub mod keys;
pub mod logging;
pub mod middleware;
pub mod model;
pub mod route;
pub mod service;
pub mod state;
pub mod store;
