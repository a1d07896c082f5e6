// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Maps `rusqlite::Error` onto the workspace-wide `AgorError`,
//! following the common pattern of wrapping
//! the driver error as a `source` rather than discarding it.

use agor_model::{AgorError, ErrorKind};
use rusqlite::ErrorCode;

pub fn map_rusqlite_err(what: &str, err: rusqlite::Error) -> AgorError {
    let kind = match &err {
        rusqlite::Error::QueryReturnedNoRows => ErrorKind::NotFound,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation => {
            ErrorKind::Conflict
        }
        _ => ErrorKind::Internal,
    };
    AgorError::with_source(kind, format!("{what}: {err}"), err)
}

pub fn map_json_err(what: &str, err: serde_json::Error) -> AgorError {
    AgorError::with_source(ErrorKind::Internal, format!("{what}: {err}"), err)
}
