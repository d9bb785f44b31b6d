// ABOUTME: Cryptographic utilities module
// ABOUTME: Houses the AEAD envelope codec used for secrets at rest
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Authenticated encryption for secrets at rest

pub mod envelope;

pub use envelope::{EncryptionKey, EnvelopeCipher, EnvelopeFailure};
