//! Duplicate resolution: quarantine planning (spec §4.7).

use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::db::duplicates_db::FingerprintRow;

use super::grouping::DuplicateGroup;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    LowerQuality,
    SceneReleases,
    FormatPreference,
    Other,
}

impl Bucket {
    pub fn as_dir_name(self) -> &'static str {
        match self {
            Bucket::LowerQuality => "lower_quality",
            Bucket::SceneReleases => "scene_releases",
            Bucket::FormatPreference => "format_preference",
            Bucket::Other => "other",
        }
    }

    /// Choose a bucket from the reason string describing why a member
    /// lost to the keeper (spec §4.7: "bucket... chosen from the reason
    /// string").
    pub fn from_reason(reason: &str) -> Bucket {
        let lower = reason.to_lowercase();
        if lower.contains("scene") {
            Bucket::SceneReleases
        } else if lower.contains("format") {
            Bucket::FormatPreference
        } else if lower.contains("quality") || lower.contains("bitrate") {
            Bucket::LowerQuality
        } else {
            Bucket::Other
        }
    }
}

pub struct QuarantinePlan {
    pub source_path: PathBuf,
    pub dest_path: PathBuf,
    pub bucket: Bucket,
    pub reason: String,
    pub sidecar_text: String,
}

fn reason_for(keeper: &FingerprintRow, member: &FingerprintRow) -> String {
    if keeper.quality_score > member.quality_score {
        format!(
            "lower quality score ({:.1} vs keeper {:.1})",
            member.quality_score, keeper.quality_score
        )
    } else if member.total_size < keeper.total_size {
        "smaller total size than keeper".to_string()
    } else {
        "duplicate of kept album".to_string()
    }
}

fn sidecar_text(keeper: &FingerprintRow, member: &FingerprintRow, reason: &str, pairwise_score: f64) -> String {
    format!(
        "keeper_path: {}\nreason: {}\nduplicate_score: {:.4}\nkeeper_quality_score: {:.2}\nthis_quality_score: {:.2}\ntimestamp: {}\n",
        keeper.album_path,
        reason,
        pairwise_score,
        keeper.quality_score,
        member.quality_score,
        Utc::now().to_rfc3339(),
    )
}

/// Plan a quarantine move for every non-keeper member of a group into
/// `duplicates_dir/<bucket>/<album-dir-name>` (spec §4.7).
pub fn plan_group(group: &DuplicateGroup, duplicates_dir: &Path, duration_tolerance_secs: f64) -> Vec<QuarantinePlan> {
    let keeper = &group.members[group.keeper_index];
    let mut plans = Vec::new();

    for (idx, member) in group.members.iter().enumerate() {
        if idx == group.keeper_index {
            continue;
        }
        let reason = reason_for(keeper, member);
        let bucket = Bucket::from_reason(&reason);
        let score = super::grouping::pairwise_score(keeper, member, duration_tolerance_secs);
        let source_path = PathBuf::from(&member.album_path);
        let album_dir_name = source_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let dest_path = duplicates_dir.join(bucket.as_dir_name()).join(&album_dir_name);

        plans.push(QuarantinePlan {
            source_path,
            dest_path,
            bucket,
            sidecar_text: sidecar_text(keeper, member, &reason, score),
            reason,
        });
    }

    plans
}

/// Write the `.duplicate_info.txt` sidecar beside the quarantined album
/// (spec §4.7, §6: "UTF-8 plain text, key/value lines").
pub fn write_sidecar(plan: &QuarantinePlan) -> std::io::Result<()> {
    let sidecar_path = plan.dest_path.join(".duplicate_info.txt");
    if let Some(parent) = sidecar_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(sidecar_path, &plan.sidecar_text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: i64, quality: f64, size: i64) -> FingerprintRow {
        FingerprintRow {
            id,
            album_path: format!("/in/album-{id}"),
            fingerprint: "fp".to_string(),
            metadata_hash: "mh".to_string(),
            duration_ms: 200_000,
            file_count: 10,
            total_size: size,
            quality_score: quality,
            format: "flac".to_string(),
            avg_bitrate: None,
        }
    }

    #[test]
    fn lower_quality_member_is_bucketed_as_lower_quality() {
        let keeper = entry(1, 100.0, 5000);
        let member = entry(2, 60.0, 2000);
        let group = DuplicateGroup { members: vec![keeper, member], keeper_index: 0 };
        let plans = plan_group(&group, Path::new("/dup"), 2.0);
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].bucket, Bucket::LowerQuality);
        assert!(plans[0].dest_path.starts_with("/dup/lower_quality"));
    }

    #[test]
    fn sidecar_text_names_the_keeper_path() {
        let keeper = entry(1, 100.0, 5000);
        let member = entry(2, 60.0, 2000);
        let group = DuplicateGroup { members: vec![keeper, member], keeper_index: 0 };
        let plans = plan_group(&group, Path::new("/dup"), 2.0);
        assert!(plans[0].sidecar_text.contains("/in/album-1"));
    }
}
