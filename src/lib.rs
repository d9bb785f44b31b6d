// ABOUTME: Main library entry point for the Luma personal context service
// ABOUTME: Provides encrypted credential storage, calendar access, and context snapshot assembly
//
// SPDX-License-Identifier: MIT OR Apache-2.0

#![deny(unsafe_code)]

//! # Luma Context Server
//!
//! A context service for personal assistant workloads. It keeps per-user
//! OAuth credentials encrypted at rest, guarantees a usable access token
//! before every upstream call, and assembles point-in-time context
//! snapshots from independent sources (time, cached location, a remote
//! calendar provider, a task store).
//!
//! ## Architecture
//!
//! - **Crypto**: AEAD envelope codec for secrets at rest
//! - **Database**: SQLite-backed credential vault and task store
//! - **OAuth**: provider abstraction, Google Calendar client, refresh engine
//! - **Context**: snapshot aggregation tolerant of partial failure
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use luma_context_server::config::environment::ServerConfig;
//! use luma_context_server::errors::AppResult;
//!
//! fn main() -> AppResult<()> {
//!     // Fails fast on a bad encryption key or missing provider credentials
//!     let config = ServerConfig::from_env()?;
//!
//!     println!(
//!         "configured: refresh buffer {:?}, max {} calendar events",
//!         config.refresh_buffer, config.calendar_max_results
//!     );
//!
//!     Ok(())
//! }
//! ```

/// Calendar client combining the refresh engine with the event listing API
pub mod calendar;

/// Configuration management, validated once at startup
pub mod config;

/// Context snapshot aggregation and the process-wide location cache
pub mod context;

/// Authenticated encryption of secrets at rest
pub mod crypto;

/// Durable storage: credential vault and task store
pub mod database;

/// Unified error handling with standard error codes
pub mod errors;

/// Structured logging setup
pub mod logging;

/// Common data models
pub mod models;

/// OAuth provider abstraction and token lifecycle management
pub mod oauth;
