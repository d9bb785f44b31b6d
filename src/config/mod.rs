// ABOUTME: Configuration management module
// ABOUTME: All settings are read and validated once at startup
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Startup configuration, validated before anything else runs

pub mod environment;

pub use environment::{GoogleConfig, ServerConfig};
