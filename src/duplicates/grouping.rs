//! Pairwise duplicate scoring and grouping (spec §4.7).

use crate::db::duplicates_db::FingerprintRow;
use crate::extract::pathinfer;

use super::normalized_artist_for_similarity;

/// Path-derived `(artist, album)` used for the substring-similarity term
/// (spec §4.7: "substring-similarity on path-derived artist and album"),
/// since `audio_fingerprints` rows (spec §3) carry only `album_path`, not
/// separately-stored artist/album fields.
fn path_derived_identity(album_path: &str) -> (String, String) {
    let path = std::path::Path::new(album_path);
    let stem = path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
    match pathinfer::infer(&stem) {
        Some(identity) => (identity.artist, identity.title),
        None => (String::new(), stem),
    }
}

fn substring_similarity(a: &str, b: &str) -> f64 {
    let a = normalized_artist_for_similarity(a);
    let b = normalized_artist_for_similarity(b);
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        1.0
    } else if a.contains(&b) || b.contains(&a) {
        0.5
    } else {
        0.0
    }
}

/// Weighted pairwise score in `[0, 1]` (spec §4.7).
pub fn pairwise_score(a: &FingerprintRow, b: &FingerprintRow, duration_tolerance_secs: f64) -> f64 {
    let mut score = 0.0;

    if a.fingerprint == b.fingerprint {
        score += 0.40;
    }

    if a.metadata_hash == b.metadata_hash {
        score += 0.25;
    } else {
        let (a_artist, a_album) = path_derived_identity(&a.album_path);
        let (b_artist, b_album) = path_derived_identity(&b.album_path);
        let artist_sim = substring_similarity(&a_artist, &b_artist);
        let album_sim = substring_similarity(&a_album, &b_album);
        score += ((artist_sim + album_sim) / 2.0) * 0.25;
    }

    let duration_diff_ms = a.duration_ms.abs_diff(b.duration_ms);
    let tolerance_ms = (duration_tolerance_secs * 1000.0).max(0.0) as u64;
    if tolerance_ms > 0 {
        let ratio = 1.0 - (duration_diff_ms as f64 / tolerance_ms as f64).min(1.0);
        score += ratio.max(0.0) * 0.15;
    } else if duration_diff_ms == 0 {
        score += 0.15;
    }

    if a.file_count == b.file_count {
        score += 0.10;
    } else {
        let larger = a.file_count.max(b.file_count) as f64;
        let smaller = a.file_count.min(b.file_count) as f64;
        if larger > 0.0 {
            score += (smaller / larger) * 0.10;
        }
    }

    if (a.quality_score - b.quality_score).abs() <= 10.0 {
        score += 0.10;
    }

    score.clamp(0.0, 1.0)
}

#[derive(Debug, Clone)]
pub struct DuplicateGroup {
    pub members: Vec<FingerprintRow>,
    pub keeper_index: usize,
}

/// Seed-and-absorb grouping ordered by quality score descending (spec
/// §4.7). Keeper election: highest quality, tie-break by larger
/// `total_size`, then by earlier `created_at` — the schema (spec §3) has
/// no per-fingerprint timestamp, so the auto-increment row id (lower id
/// inserted earlier in this scan) stands in for insertion order.
pub fn group_duplicates(
    mut entries: Vec<FingerprintRow>,
    threshold: f64,
    duration_tolerance_secs: f64,
) -> Vec<DuplicateGroup> {
    entries.sort_by(|a, b| b.quality_score.partial_cmp(&a.quality_score).unwrap());

    let mut grouped = vec![false; entries.len()];
    let mut groups = Vec::new();

    for seed_idx in 0..entries.len() {
        if grouped[seed_idx] {
            continue;
        }
        grouped[seed_idx] = true;
        let mut members = vec![entries[seed_idx].clone()];

        for candidate_idx in (seed_idx + 1)..entries.len() {
            if grouped[candidate_idx] {
                continue;
            }
            let score = pairwise_score(&entries[seed_idx], &entries[candidate_idx], duration_tolerance_secs);
            if score >= threshold {
                grouped[candidate_idx] = true;
                members.push(entries[candidate_idx].clone());
            }
        }

        if members.len() > 1 {
            let keeper_index = elect_keeper(&members);
            groups.push(DuplicateGroup { members, keeper_index });
        }
    }

    groups
}

fn elect_keeper(members: &[FingerprintRow]) -> usize {
    let mut best = 0;
    for i in 1..members.len() {
        let candidate = &members[i];
        let current = &members[best];
        let better = candidate.quality_score > current.quality_score
            || (candidate.quality_score == current.quality_score && candidate.total_size > current.total_size)
            || (candidate.quality_score == current.quality_score
                && candidate.total_size == current.total_size
                && candidate.id < current.id);
        if better {
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: i64, fingerprint: &str, quality: f64, size: i64) -> FingerprintRow {
        FingerprintRow {
            id,
            album_path: format!("/in/Atom Heart - Pure Funktion ({id})"),
            fingerprint: fingerprint.to_string(),
            metadata_hash: "same-hash".to_string(),
            duration_ms: 200_000,
            file_count: 10,
            total_size: size,
            quality_score: quality,
            format: "flac".to_string(),
            avg_bitrate: None,
        }
    }

    #[test]
    fn identical_fingerprint_and_metadata_score_above_threshold() {
        let a = entry(1, "fp1", 100.0, 1000);
        let b = entry(2, "fp1", 100.0, 1000);
        assert!(pairwise_score(&a, &b, 2.0) >= 0.85);
    }

    #[test]
    fn groups_two_near_duplicates_and_elects_higher_quality_keeper() {
        let flac = entry(1, "fp1", 100.0, 5000);
        let mp3 = entry(2, "fp1", 70.0, 2000);
        let groups = group_duplicates(vec![mp3, flac], 0.85, 2.0);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].members[groups[0].keeper_index].id, 1);
    }

    #[test]
    fn distinct_fingerprints_with_differing_metadata_do_not_group() {
        let mut a = entry(1, "fp1", 100.0, 5000);
        a.metadata_hash = "hash-a".to_string();
        a.album_path = "/in/Totally Different - Nothing Alike".to_string();
        let mut b = entry(2, "fp2", 60.0, 1000);
        b.metadata_hash = "hash-b".to_string();
        b.duration_ms = 9_000_000;
        b.file_count = 1;
        let groups = group_duplicates(vec![a, b], 0.85, 2.0);
        assert!(groups.is_empty());
    }
}
