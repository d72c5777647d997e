//! tickmux: multi-source real-time equity price ingestion
//!
//! This library provides the core components for:
//! - A shared price cache with source-priority conflict resolution
//! - Priority ranking of instruments for the scarce low-latency channel
//! - A capacity-bounded push-feed connection manager
//! - A tiered, rate-limited poll scheduler plus a backup poll feed
//! - An orchestrator that rebalances subscriptions and drains fresh
//!   prices toward durable storage

pub mod auth;
pub mod backup;
pub mod cache;
pub mod cli;
pub mod config;
pub mod feed;
pub mod orchestrator;
pub mod poll;
pub mod priority;
pub mod push;
pub mod sink;
pub mod telemetry;
