//! Vitrine: a product catalog served cache-aside over Postgres.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
