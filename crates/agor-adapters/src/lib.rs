// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Vendor Tool Adapters (C6): one translator per supported agent family,
//! each turning a vendor CLI's own event stream into the daemon's Message
//! model through a common callback interface.
//!
//! Generalizes the sibling `sven-core::events::AgentEvent` enum and its
//! `agent_event_to_control` bridge function: there, one in-house agent loop
//! emits one fixed event shape that gets translated once, for one consumer.
//! Here the same idea is inverted — several *different* event shapes (one
//! per vendor) are each translated into the one shared `AdapterCallbacks`
//! contract, so the executor binary driving them never has to know which
//! vendor it's talking to.

mod adapter;
pub mod claude;
pub mod codex;
pub mod gemini;
pub mod import;
pub mod opencode;
mod process;

pub use adapter::{AdapterCallbacks, Capabilities, ResolvedMcpServer, UsageSummary, VendorAdapter};

use agor_model::VendorFamily;
use std::sync::Arc;

/// Resolve the adapter for a session's configured vendor family.
pub fn adapter_for(vendor: VendorFamily) -> Arc<dyn VendorAdapter> {
    match vendor {
        VendorFamily::ClaudeCode => Arc::new(claude::ClaudeCodeAdapter::default()),
        VendorFamily::Codex => Arc::new(codex::CodexAdapter::default()),
        VendorFamily::Gemini => Arc::new(gemini::GeminiAdapter::default()),
        VendorFamily::Opencode => Arc::new(opencode::OpencodeAdapter::default()),
    }
}
