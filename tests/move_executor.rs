use shelfkeeper::moveexec::{cleanup_empty_dirs, execute, MovePlan};
use std::fs;
use tempfile::tempdir;

/// Cancellation observed before the copy starts leaves the source directory
/// untouched and never creates a temp sibling.
#[test]
fn cancellation_before_copy_leaves_source_and_dest_untouched() {
    let root = tempdir().unwrap();
    let source = root.path().join("in").join("album");
    fs::create_dir_all(&source).unwrap();
    fs::write(source.join("track.flac"), b"audio-bytes").unwrap();

    let dest = root.path().join("out").join("album");
    fs::create_dir_all(dest.parent().unwrap()).unwrap();

    let plan = MovePlan {
        source_dir: &source,
        dest_dir: &dest,
        operation_id: "cancel-1",
        rename_audio_files: false,
        tracks: &[],
        source_root: &root.path().join("in"),
    };

    let err = execute(&plan, &|| true).unwrap_err();
    assert!(matches!(err, shelfkeeper::moveexec::MoveError::Cancelled));
    assert!(source.exists());
    assert!(!dest.exists());
}

/// After a move, empty parent directories back up to (but excluding) the
/// configured source root are also removed.
#[test]
fn move_ascends_and_removes_now_empty_parent_directories() {
    let root = tempdir().unwrap();
    let source_root = root.path().join("in");
    let source = source_root.join("label").join("artist").join("album");
    fs::create_dir_all(&source).unwrap();
    fs::write(source.join("track.flac"), b"x").unwrap();

    let dest = root.path().join("out").join("album");
    fs::create_dir_all(dest.parent().unwrap()).unwrap();

    let plan = MovePlan {
        source_dir: &source,
        dest_dir: &dest,
        operation_id: "ascend-1",
        rename_audio_files: false,
        tracks: &[],
        source_root: &source_root,
    };

    execute(&plan, &|| false).unwrap();

    assert!(!source.exists());
    assert!(!source.parent().unwrap().exists(), "artist dir should have been swept up");
    assert!(!source.parent().unwrap().parent().unwrap().exists(), "label dir should have been swept up");
    assert!(source_root.exists(), "the source root itself must survive the ascent");
}

/// A sibling album left in a branch should stop the ascent from removing
/// that branch, while an unrelated empty branch elsewhere is untouched by
/// the move itself but still falls to the standalone sweep.
#[test]
fn cleanup_empty_dirs_sweeps_whatever_the_per_move_ascent_left_behind() {
    let root = tempdir().unwrap();
    let source_root = root.path().join("in");
    let busy_artist_dir = source_root.join("label").join("artist");
    let album_a = busy_artist_dir.join("album-a");
    let album_b = busy_artist_dir.join("album-b");
    fs::create_dir_all(&album_a).unwrap();
    fs::create_dir_all(&album_b).unwrap();
    fs::write(album_a.join("track.flac"), b"x").unwrap();
    fs::write(album_b.join("track.flac"), b"y").unwrap();

    let unrelated_empty = source_root.join("leftover").join("nested").join("empty");
    fs::create_dir_all(&unrelated_empty).unwrap();

    let dest = root.path().join("out").join("album-a");
    fs::create_dir_all(dest.parent().unwrap()).unwrap();

    let plan = MovePlan {
        source_dir: &album_a,
        dest_dir: &dest,
        operation_id: "sibling-1",
        rename_audio_files: false,
        tracks: &[],
        source_root: &source_root,
    };
    execute(&plan, &|| false).unwrap();

    assert!(!album_a.exists());
    assert!(busy_artist_dir.exists(), "album-b still lives here, the ascent must stop");
    assert!(album_b.exists());

    let removed = cleanup_empty_dirs(&source_root);
    assert!(removed > 0);
    assert!(!unrelated_empty.exists());
    assert!(album_b.exists(), "the sweep must never touch a non-empty directory");
}
