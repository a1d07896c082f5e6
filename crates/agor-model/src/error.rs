// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use thiserror::Error;

/// Stable, UI-translatable error identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    Validation,
    Auth,
    Forbidden,
    Transient,
    Cancelled,
    Orphaned,
    Internal,
}

impl ErrorKind {
    /// Fixed CLI prefix, following the common practice of rendering each
    /// error kind with a stable tag (`sven-node::error::GatewayError`'s
    /// `#[error("...")]` messages play the same role for one crate's worth
    /// of errors; here it is generalized workspace-wide).
    pub fn prefix(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not-found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Validation => "validation",
            ErrorKind::Auth => "auth",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::Transient => "transient",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Orphaned => "orphaned",
            ErrorKind::Internal => "internal",
        }
    }
}

/// The one error type returned from every fallible agor operation.
#[derive(Debug, Error)]
#[error("{kind:?}: {message}")]
pub struct AgorError {
    pub kind: ErrorKind,
    pub message: String,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AgorError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        kind: ErrorKind,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, what)
    }

    pub fn conflict(what: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, what)
    }

    pub fn busy(session_id: impl std::fmt::Display) -> Self {
        Self::new(
            ErrorKind::Conflict,
            format!("session {session_id} already has a running task"),
        )
    }

    pub fn validation(what: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, what)
    }

    pub fn internal(what: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, what)
    }

    /// Vendor adapter authentication failure.
    pub fn auth(what: impl Into<String>) -> Self {
        Self::new(ErrorKind::Auth, what)
    }

    pub fn cancelled(what: impl Into<String>) -> Self {
        Self::new(ErrorKind::Cancelled, what)
    }

    /// Vendor SDK network failure; the adapter does not retry, the caller does.
    pub fn transient(what: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transient, what)
    }
}
