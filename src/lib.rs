//! Read-through caching proxy for the hotel pricing API.
//!
//! Sits between clients and an expensive, rate-limited pricing API. Rates
//! are served from a shared two-tier (fresh + stale) cache; on a miss a
//! single cross-process fetch is coordinated through a distributed lock,
//! with a circuit breaker guarding the upstream and stale fallback when
//! the fresh path fails.

pub mod app;
pub mod breaker;
pub mod cli;
pub mod config;
pub mod logging;
pub mod pricing;
pub mod rate_api;
pub mod state;
pub mod store;
pub mod utils;
pub mod web;
