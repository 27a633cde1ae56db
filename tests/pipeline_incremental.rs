use shelfkeeper::config::Config;
use shelfkeeper::extract::content_hash;
use shelfkeeper::model::ProcessStatus;
use shelfkeeper::worker::pipeline::filter_incremental;
use shelfkeeper::worker::Context;
use std::fs;
use tempfile::tempdir;

fn test_config(root: &std::path::Path) -> Config {
    let source_dir = root.join("source");
    let destination_dir = root.join("destination");
    fs::create_dir_all(&source_dir).unwrap();
    fs::create_dir_all(&destination_dir).unwrap();
    Config {
        source_dir,
        destination_dir,
        unsorted_dir: root.join("unsorted"),
        duplicates_dir: root.join("duplicates"),
        state_db_path: root.join("state.db"),
        metadata_db_path: root.join("metadata.db"),
        duplicates_db_path: root.join("duplicates.db"),
        incremental: true,
        ..Config::default()
    }
}

/// A directory already recorded `Ok` with a matching content hash is
/// filtered out of the candidate list; one that changed since, or was never
/// recorded, survives the filter.
#[tokio::test]
async fn filter_incremental_skips_only_unchanged_recorded_albums() {
    let root = tempdir().unwrap();
    let config = test_config(root.path());

    let unchanged = config.source_dir.join("unchanged-album");
    let changed = config.source_dir.join("changed-album");
    let never_seen = config.source_dir.join("never-seen-album");
    for dir in [&unchanged, &changed, &never_seen] {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join("track.flac"), b"original-bytes").unwrap();
    }

    let ctx = Context::new(config).await.unwrap();

    let unchanged_hash = content_hash(&unchanged).unwrap();
    ctx.state_db
        .record(&unchanged.to_string_lossy(), 0, &unchanged_hash, 0, ProcessStatus::Ok)
        .await
        .unwrap();

    let stale_hash = content_hash(&changed).unwrap();
    ctx.state_db
        .record(&changed.to_string_lossy(), 0, &stale_hash, 0, ProcessStatus::Ok)
        .await
        .unwrap();
    fs::write(changed.join("track.flac"), b"different-bytes-now").unwrap();

    let candidates = vec![unchanged.clone(), changed.clone(), never_seen.clone()];
    let remaining = filter_incremental(&ctx, candidates).await;

    assert!(!remaining.contains(&unchanged), "unchanged album should be skipped");
    assert!(remaining.contains(&changed), "changed album should survive the filter");
    assert!(remaining.contains(&never_seen), "never-recorded album should survive the filter");
}

/// With incremental mode off, every candidate passes through untouched even
/// if a matching `Ok` row exists.
#[tokio::test]
async fn filter_incremental_is_a_no_op_when_disabled() {
    let root = tempdir().unwrap();
    let mut config = test_config(root.path());
    config.incremental = false;

    let album = config.source_dir.join("album");
    fs::create_dir_all(&album).unwrap();
    fs::write(album.join("track.flac"), b"bytes").unwrap();

    let ctx = Context::new(config).await.unwrap();
    let hash = content_hash(&album).unwrap();
    ctx.state_db
        .record(&album.to_string_lossy(), 0, &hash, 0, ProcessStatus::Ok)
        .await
        .unwrap();

    let remaining = filter_incremental(&ctx, vec![album.clone()]).await;
    assert_eq!(remaining, vec![album]);
}
