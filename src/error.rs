//! Top-level error taxonomy shared across the crate.
//!
//! Individual modules define their own `thiserror` enums for local detail
//! (see `enrich::EnrichmentError`, `db::DbError`, ...); this module collects
//! the *kinds* that the pipeline driver and CLI care about, per spec §7.

use thiserror::Error;

/// A single error kind from the pipeline's taxonomy.
///
/// Per-album kinds never propagate out of a worker as an `AppError` — they
/// are recorded against the album and logged. Only the fatal kinds at the
/// top of this enum terminate the process.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("process lock held by another instance: {0}")]
    LockHeld(String),

    #[error("interrupted by signal")]
    Interrupted,

    #[error("database locked after retries: {0}")]
    DbLocked(String),

    #[error("database inaccessible: {0}")]
    DbInaccessible(String),

    #[error("no recognized audio files in directory")]
    NoAudio,

    #[error("tag read timed out for {0}")]
    TagReadTimeout(String),

    #[error("malformed sidecar file: {0}")]
    MalformedSidecar(String),

    #[error("artist could not be validated: {0}")]
    ArtistInvalid(String),

    #[error("enrichment unavailable: {0}")]
    EnrichmentUnavailable(String),

    #[error("enrichment confidence below threshold")]
    EnrichmentLowConfidence,

    #[error("destination already exists: {0}")]
    DestExists(String),

    #[error("move verification failed: {0}")]
    VerifyFailed(String),

    #[error("copy failed: {0}")]
    CopyFailed(String),

    #[error("rename failed: {0}")]
    RenameFailed(String),

    #[error("source directory vanished during move: {0}")]
    SourceVanished(String),

    #[error("move cancelled")]
    Cancelled,

    #[error("duplicate group resolution conflict: {0}")]
    DuplicateResolutionConflict(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// Process exit code per spec §6.
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::ConfigInvalid(_) => 2,
            AppError::LockHeld(_) => 3,
            AppError::Interrupted => 4,
            AppError::DbInaccessible(_) | AppError::DbLocked(_) => 5,
            _ => 1,
        }
    }

    /// True for errors that are recorded against one album and never abort
    /// the pipeline (spec §7 propagation policy).
    pub fn is_per_album(&self) -> bool {
        matches!(
            self,
            AppError::NoAudio
                | AppError::TagReadTimeout(_)
                | AppError::MalformedSidecar(_)
                | AppError::ArtistInvalid(_)
                | AppError::EnrichmentUnavailable(_)
                | AppError::EnrichmentLowConfidence
                | AppError::DestExists(_)
                | AppError::VerifyFailed(_)
                | AppError::CopyFailed(_)
                | AppError::RenameFailed(_)
                | AppError::SourceVanished(_)
                | AppError::Cancelled
                | AppError::DuplicateResolutionConflict(_)
        )
    }
}
