use shelfkeeper::db::duplicates_db::FingerprintRow;
use shelfkeeper::duplicates::grouping::group_duplicates;
use shelfkeeper::duplicates::{content_fingerprint, metadata_hash, quality_score};
use shelfkeeper::model::{Album, Format, Quality, Track};
use std::path::PathBuf;

fn track(path: &str, format: Format, bitrate: Option<u32>, duration_ms: u64) -> Track {
    Track {
        file_path: PathBuf::from(path),
        track_number: Some(1),
        disc_number: None,
        title: Some("Pure Funktion".into()),
        duration_ms: Some(duration_ms),
        bitrate_kbps: bitrate,
        format,
        artist: Some("Atom Heart".into()),
        album_artist: Some("Atom Heart".into()),
        album: Some("Pure Funktion".into()),
        year: Some(1994),
        genre: None,
        label: None,
        catalog_number: None,
        file_size: 10_000_000,
    }
}

fn album(source_path: &str, tracks: Vec<Track>) -> Album {
    let formats: Vec<Format> = tracks.iter().map(|t| t.format).collect();
    Album {
        source_path: PathBuf::from(source_path),
        artist: "Atom Heart".into(),
        album_title: "Pure Funktion".into(),
        year: Some(1994),
        label: None,
        catalog_number: None,
        genre: None,
        track_count: tracks.len() as u32,
        total_bytes: tracks.iter().map(|t| t.file_size).sum(),
        avg_bitrate_kbps: None,
        quality: Quality::classify(&formats),
        disc_number: None,
        is_compilation: false,
        is_underground: false,
        is_remix_heavy: false,
        confidence: 1.0,
        enrichment_source: None,
        fingerprint: String::new(),
        metadata_hash: String::new(),
        needs_review: false,
        tracks,
    }
}

fn fingerprint_row(id: i64, album: &Album) -> FingerprintRow {
    FingerprintRow {
        id,
        album_path: album.source_path.to_string_lossy().to_string(),
        fingerprint: content_fingerprint(album),
        metadata_hash: metadata_hash(album),
        duration_ms: album.tracks.iter().filter_map(|t| t.duration_ms).sum::<u64>() as i64,
        file_count: album.track_count as i64,
        total_size: album.total_bytes as i64,
        quality_score: quality_score(album),
        format: album.quality.as_path_segment().to_string(),
        avg_bitrate: album.avg_bitrate_kbps.map(|b| b as i64),
    }
}

/// A lossless rip and a lossy rip of the same release, re-ripped into two
/// different destination folders, should round-trip through fingerprinting
/// all the way to a single duplicate group that keeps the FLAC copy.
#[test]
fn two_rips_of_the_same_release_are_fingerprinted_into_one_group() {
    let flac = album(
        "/library/Lossless/Atom Heart/Atom Heart - Pure Funktion (1994)",
        vec![track("01.flac", Format::Flac, None, 200_000)],
    );
    let mp3 = album(
        "/library/Lossy/Atom Heart/Atom Heart - Pure Funktion (1994)",
        vec![track("01.mp3", Format::Mp3, Some(320), 200_000)],
    );

    let rows = vec![fingerprint_row(1, &mp3), fingerprint_row(2, &flac)];
    let groups = group_duplicates(rows, 0.85, 2.0);

    assert_eq!(groups.len(), 1);
    let keeper = &groups[0].members[groups[0].keeper_index];
    assert_eq!(keeper.id, 2, "the FLAC rip should be elected keeper over the MP3 rip");
}

/// Two unrelated albums that merely share a track count and rough duration
/// should not be fingerprinted into the same group.
#[test]
fn unrelated_albums_do_not_collide_into_a_group() {
    let a = album(
        "/library/Lossless/Atom Heart/Atom Heart - Pure Funktion (1994)",
        vec![track("01.flac", Format::Flac, None, 200_000)],
    );
    let mut b = album(
        "/library/Lossless/Orbital/Orbital - In Sides (1996)",
        vec![track("01.flac", Format::Flac, None, 9_000_000)],
    );
    b.artist = "Orbital".into();
    b.album_title = "In Sides".into();
    b.year = Some(1996);

    let rows = vec![fingerprint_row(1, &a), fingerprint_row(2, &b)];
    let groups = group_duplicates(rows, 0.85, 2.0);
    assert!(groups.is_empty());
}
