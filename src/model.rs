//! In-memory record types shared across the pipeline (spec §3).

use std::path::PathBuf;

/// Audio formats recognized by the extractor (spec §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Mp3,
    Flac,
    Wav,
    Aiff,
    Alac,
    Aac,
    M4a,
    Ogg,
    Opus,
    Wma,
    Ape,
    /// mp4/mkv/avi/mov/webm, always lossy (see DESIGN.md Open Questions)
    VideoContainer,
}

impl Format {
    pub fn from_extension(ext: &str) -> Option<Self> {
        Some(match ext.to_ascii_lowercase().as_str() {
            "mp3" => Format::Mp3,
            "flac" => Format::Flac,
            "wav" => Format::Wav,
            "aiff" | "aif" => Format::Aiff,
            "alac" => Format::Alac,
            "aac" => Format::Aac,
            "m4a" => Format::M4a,
            "ogg" => Format::Ogg,
            "opus" => Format::Opus,
            "wma" => Format::Wma,
            "ape" => Format::Ape,
            "mp4" | "mkv" | "avi" | "mov" | "webm" => Format::VideoContainer,
            _ => return None,
        })
    }

    pub fn is_lossless(self) -> bool {
        matches!(self, Format::Flac | Format::Wav | Format::Aiff | Format::Alac)
    }

    /// Format component of the duplicate-engine quality score (spec §4.7).
    pub fn format_score(self) -> f64 {
        match self {
            Format::Flac => 100.0,
            Format::Wav => 95.0,
            Format::Aiff => 95.0,
            Format::Alac => 90.0,
            Format::Mp3 => 60.0,
            Format::Aac => 55.0,
            Format::M4a => 55.0,
            Format::Ogg => 50.0,
            Format::Opus => 50.0,
            Format::Wma => 30.0,
            Format::Ape => 90.0,
            Format::VideoContainer => 40.0,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Format::Mp3 => "mp3",
            Format::Flac => "flac",
            Format::Wav => "wav",
            Format::Aiff => "aiff",
            Format::Alac => "alac",
            Format::Aac => "aac",
            Format::M4a => "m4a",
            Format::Ogg => "ogg",
            Format::Opus => "opus",
            Format::Wma => "wma",
            Format::Ape => "ape",
            Format::VideoContainer => "mp4",
        }
    }
}

/// Overall quality classification of an album (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quality {
    Lossless,
    Lossy,
    Mixed,
    Unknown,
}

impl Quality {
    /// `quality = Mixed` iff the format set contains both a lossless and a
    /// lossy member (spec §3 invariant).
    pub fn classify(formats: &[Format]) -> Quality {
        if formats.is_empty() {
            return Quality::Unknown;
        }
        let has_lossless = formats.iter().any(|f| f.is_lossless());
        let has_lossy = formats.iter().any(|f| !f.is_lossless());
        match (has_lossless, has_lossy) {
            (true, true) => Quality::Mixed,
            (true, false) => Quality::Lossless,
            (false, true) => Quality::Lossy,
            (false, false) => Quality::Unknown,
        }
    }

    pub fn as_path_segment(self) -> &'static str {
        match self {
            Quality::Lossless => "Lossless",
            Quality::Lossy => "Lossy",
            Quality::Mixed => "Mixed",
            Quality::Unknown => "Unknown",
        }
    }
}

/// Enrichment provider identity (spec §3/§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrichmentSource {
    Primary,
    Secondary,
}

impl EnrichmentSource {
    pub fn as_str(self) -> &'static str {
        match self {
            EnrichmentSource::Primary => "primary",
            EnrichmentSource::Secondary => "secondary",
        }
    }
}

/// A single track, subordinate to an `Album` (spec §3).
#[derive(Debug, Clone)]
pub struct Track {
    pub file_path: PathBuf,
    pub track_number: Option<u32>,
    pub disc_number: Option<u32>,
    pub title: Option<String>,
    pub duration_ms: Option<u64>,
    pub bitrate_kbps: Option<u32>,
    pub format: Format,
    pub artist: Option<String>,
    pub album_artist: Option<String>,
    pub album: Option<String>,
    pub year: Option<u32>,
    pub genre: Option<String>,
    pub label: Option<String>,
    pub catalog_number: Option<String>,
    pub file_size: u64,
}

/// A processed album directory (spec §3). Owned exclusively by the worker
/// handling it from extraction through commit; read-only after commit.
#[derive(Debug, Clone)]
pub struct Album {
    pub source_path: PathBuf,
    pub artist: String,
    pub album_title: String,
    pub year: Option<u32>,
    pub label: Option<String>,
    pub catalog_number: Option<String>,
    pub genre: Option<String>,
    pub track_count: u32,
    pub total_bytes: u64,
    pub avg_bitrate_kbps: Option<u32>,
    pub quality: Quality,
    pub disc_number: Option<u32>,
    pub is_compilation: bool,
    pub is_underground: bool,
    pub is_remix_heavy: bool,
    pub confidence: f64,
    pub enrichment_source: Option<EnrichmentSource>,
    pub fingerprint: String,
    pub metadata_hash: String,
    pub needs_review: bool,
    pub tracks: Vec<Track>,
}

impl Album {
    pub fn formats(&self) -> Vec<Format> {
        self.tracks.iter().map(|t| t.format).collect()
    }
}

/// Terminal status recorded for a processed directory (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStatus {
    Ok,
    Skipped,
    Failed,
    NeedsReview,
}

impl ProcessStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ProcessStatus::Ok => "ok",
            ProcessStatus::Skipped => "skipped",
            ProcessStatus::Failed => "failed",
            ProcessStatus::NeedsReview => "needs_review",
        }
    }
}

/// Status of a single move operation (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveStatus {
    Pending,
    InProgress,
    Committed,
    Failed,
    RolledBack,
}

impl MoveStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MoveStatus::Pending => "pending",
            MoveStatus::InProgress => "in_progress",
            MoveStatus::Committed => "committed",
            MoveStatus::Failed => "failed",
            MoveStatus::RolledBack => "rolled_back",
        }
    }
}

/// Organization mode chosen for an album (spec §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrgMode {
    Artist,
    Label,
    Series,
    Compilation,
    Underground,
    Remix,
}
