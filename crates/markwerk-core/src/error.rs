// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Markwerk.

use thiserror::Error;

/// Top-level error type for all Markwerk operations.
///
/// The first four variants are per-sheet or per-key failures. A batch driver
/// records them next to successful score records instead of aborting.
#[derive(Debug, Error)]
pub enum MarkwerkError {
    // -- Pipeline errors --
    #[error("image could not be decoded: {0}")]
    Decode(String),

    #[error("sheet boundary not found: {0}")]
    Geometry(String),

    #[error("bubble layout rejected: {0}")]
    Layout(String),

    #[error("malformed answer key: {0}")]
    KeyFormat(String),

    // -- Configuration --
    #[error("invalid configuration: {0}")]
    Config(String),

    // -- Storage / persistence --
    #[error("database error: {0}")]
    Database(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MarkwerkError {
    /// Stable lowercase tag for this error, used when a failure is persisted.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Decode(_) => "decode",
            Self::Geometry(_) => "geometry",
            Self::Layout(_) => "layout",
            Self::KeyFormat(_) => "key_format",
            Self::Config(_) => "config",
            Self::Database(_) => "database",
            Self::Io(_) => "io",
            Self::Serialization(_) => "serialization",
        }
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, MarkwerkError>;
