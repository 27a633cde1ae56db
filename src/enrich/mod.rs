//! Enrichment clients (spec §4.6): two external lookup providers sharing a
//! common contract — rate-limited, on-disk cache with TTL, confidence
//! scoring.

pub mod cache;
pub mod primary;
pub mod ratelimit;
pub mod secondary;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: String,
    pub artist: String,
    pub album: String,
    pub year: Option<u32>,
    pub label: Option<String>,
    pub catalog_number: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Release {
    pub id: String,
    pub artist: String,
    pub album: String,
    pub year: Option<u32>,
    pub label: Option<String>,
    pub catalog_number: Option<String>,
    pub genre: Option<String>,
}

#[derive(Debug, Error)]
pub enum EnrichmentError {
    #[error("enrichment request failed: {0}")]
    Request(String),
    #[error("enrichment response malformed: {0}")]
    Malformed(String),
    #[error("enrichment request timed out")]
    Timeout,
}

impl From<EnrichmentError> for AppError {
    fn from(err: EnrichmentError) -> Self {
        AppError::EnrichmentUnavailable(err.to_string())
    }
}

/// Shared provider contract (spec §4.6). Every failure mode collapses to
/// `EnrichmentError` at the call boundary; the worker treats any error as
/// "no enrichment" and proceeds with extracted-only metadata (spec §4.6:
/// "Failures are never fatal to the pipeline").
#[async_trait]
pub trait EnrichmentClient: Send + Sync {
    async fn search(
        &self,
        artist: &str,
        album: &str,
        year: Option<u32>,
    ) -> Result<Vec<Candidate>, EnrichmentError>;

    async fn get_release(&self, id: &str) -> Result<Release, EnrichmentError>;
}

fn normalize_for_compare(s: &str) -> String {
    s.to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn string_comparator(local: &str, candidate: &str) -> f64 {
    let local = normalize_for_compare(local);
    let candidate = normalize_for_compare(candidate);
    if local == candidate {
        1.0
    } else if !local.is_empty() && (candidate.contains(&local) || local.contains(&candidate)) {
        0.7
    } else {
        0.0
    }
}

fn year_comparator(local: Option<u32>, candidate: Option<u32>) -> f64 {
    match (local, candidate) {
        (Some(l), Some(c)) if l == c => 1.0,
        (Some(l), Some(c)) if l.abs_diff(c) <= 2 => 0.5,
        _ => 0.0,
    }
}

/// Confidence score of a candidate against the local `(artist, album,
/// year)` tuple (spec §4.6): weighted sum of exact/substring comparators
/// plus a year comparator, rescaled to [0,1].
pub fn confidence_score(
    local_artist: &str,
    local_album: &str,
    local_year: Option<u32>,
    candidate: &Candidate,
) -> f64 {
    let artist_score = string_comparator(local_artist, &candidate.artist);
    let album_score = string_comparator(local_album, &candidate.album);
    let year_score = year_comparator(local_year, candidate.year);

    // Artist and album weighted equally and heavier than year, which only
    // breaks near-ties (spec §4.6 doesn't mandate exact weights beyond
    // "weighted sum... final score in [0,1]").
    (artist_score * 0.4 + album_score * 0.4 + year_score * 0.2).clamp(0.0, 1.0)
}

/// Accept a candidate iff its score meets the configured threshold (spec
/// §4.6, default range 0.6-0.7).
pub fn accepts(score: f64, threshold: f64) -> bool {
    score >= threshold
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(artist: &str, album: &str, year: Option<u32>) -> Candidate {
        Candidate {
            id: "1".into(),
            artist: artist.into(),
            album: album.into(),
            year,
            label: None,
            catalog_number: None,
        }
    }

    #[test]
    fn exact_match_scores_one() {
        let c = candidate("Atom Heart", "Pure Funktion", Some(1994));
        assert_eq!(confidence_score("Atom Heart", "Pure Funktion", Some(1994), &c), 1.0);
    }

    #[test]
    fn year_within_tolerance_scores_partial() {
        let c = candidate("Atom Heart", "Pure Funktion", Some(1996));
        let score = confidence_score("Atom Heart", "Pure Funktion", Some(1994), &c);
        assert!(score < 1.0 && score > 0.8);
    }

    #[test]
    fn mismatched_candidate_scores_low() {
        let c = candidate("Someone Else", "Other Album", Some(2010));
        let score = confidence_score("Atom Heart", "Pure Funktion", Some(1994), &c);
        assert_eq!(score, 0.0);
    }
}
