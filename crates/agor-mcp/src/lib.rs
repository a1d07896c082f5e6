// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! The MCP Resolver (C7): computes the effective list of MCP servers a
//! session should start its vendor tool with, inheriting from the owner's
//! global servers unless the session has its own isolated assignments, and
//! rendering any `{{ user.env.X }}` templates against an allow-listed
//! environment.

pub mod resolver;
pub mod template;

pub use resolver::{resolve, Mode, Omitted, Resolution, ResolvedServer};
