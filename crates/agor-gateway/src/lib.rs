// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! The HTTP/WebSocket surface clients (CLI, browser board UI, and the
//! executor's own `RpcClient`) use to reach the Service Layer.
//!
//! Generalizes a prior gateway built around one static bearer token, one
//! libp2p control node for native-app pairing, and a Slack relay, into a
//! single request/response RPC route (`POST /rpc`) plus one event stream
//! route (`GET /ws`), authenticated with the signed claims tokens in
//! `agor_proto::auth` rather than a single shared secret. P2P pairing and a
//! chat-platform relay are native-app/Slack-specific surfaces this
//! workspace has no equivalent client for, so neither is carried forward.

mod auth;
pub mod http;
mod rpc;
mod server;
mod state;
mod ws;

pub use server::{router, serve};
pub use state::AppState;
