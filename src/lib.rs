//! Library crate for squid-trivia-back, exposing modules for binaries and integration tests.

pub mod auth;
pub mod config;
pub mod dao;
mod dto;
mod error;
pub mod routes;
pub mod services;
pub mod state;
