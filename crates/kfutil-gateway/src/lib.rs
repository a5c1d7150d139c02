// crates/kfutil-gateway/src/lib.rs
// ============================================================================
// Module: kfutil Gateway Library
// Description: HTTP implementation of the Platform gateway.
// Purpose: Connect the root-of-trust pipeline to a live Platform.
// Dependencies: kfutil-core, reqwest, serde, serde_json, tracing
// ============================================================================

//! ## Overview
//! This crate provides [`HttpPlatform`], a blocking REST client implementing
//! [`kfutil_core::PlatformGateway`]. Wire bodies are private to the crate;
//! callers only see kfutil-core records and [`kfutil_core::GatewayError`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod client;
mod wire;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use client::DEFAULT_API_PATH;
pub use client::DEFAULT_MAX_RESPONSE_BYTES;
pub use client::DEFAULT_PAGE_SIZE;
pub use client::DEFAULT_TIMEOUT_MS;
pub use client::HttpPlatform;
pub use client::HttpPlatformConfig;
pub use client::PlatformAuth;
