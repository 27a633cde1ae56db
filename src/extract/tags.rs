//! Per-file tag and property reading (spec §4.2 step 2).
//!
//! Grounded on the teacher's `import/folder_metadata_detector.rs`
//! `read_mp3_metadata`/`read_flac_metadata`, generalized across every format
//! in spec §4.2's list via `lofty` (the teacher's own FLAC path admits it
//! skips tag reading there; `lofty` gives us the breadth for free, the same
//! way `julianallchin-luma` and `resonance-stream-resonance` use it).

use std::path::Path;
use std::time::Duration;

use lofty::file::{AudioFile, TaggedFileExt};
use lofty::probe::Probe;
use lofty::tag::Accessor;
use thiserror::Error;

use crate::model::{Format, Track};

#[derive(Error, Debug)]
pub enum TagReadError {
    #[error("unrecognized audio format: {0}")]
    UnrecognizedFormat(String),
    #[error("tag read timed out after {0:?}: {1}")]
    Timeout(Duration, String),
    #[error("{0}")]
    Lofty(#[from] lofty::error::LoftyError),
}

/// Default per-file tag-read stall timeout (spec §4.2, §5).
pub const TAG_READ_TIMEOUT: Duration = Duration::from_secs(60);

/// Read one audio file's tags and properties into a `Track`.
///
/// Runs the actual `lofty` read on a scoped thread so a pathological file
/// that hangs the parser can be bounded by `TAG_READ_TIMEOUT` without
/// poisoning the caller's async runtime (spec §4.2's `TagReadTimeout`).
pub fn read_track(path: &Path) -> Result<Track, TagReadError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();
    let format = Format::from_extension(ext)
        .ok_or_else(|| TagReadError::UnrecognizedFormat(ext.to_string()))?;

    let file_size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);

    if format == Format::VideoContainer {
        // lofty can read audio properties for several container formats but
        // tag semantics are unreliable there; fall back to filename-derived
        // fields only (spec §4.2 treats these as lossy containers, not as a
        // primary tag source).
        return Ok(Track {
            file_path: path.to_path_buf(),
            track_number: None,
            disc_number: None,
            title: None,
            duration_ms: None,
            bitrate_kbps: None,
            format,
            artist: None,
            album_artist: None,
            album: None,
            year: None,
            genre: None,
            label: None,
            catalog_number: None,
            file_size,
        });
    }

    let (tx, rx) = std::sync::mpsc::channel();
    let owned_path = path.to_path_buf();
    std::thread::spawn(move || {
        let result = Probe::open(&owned_path).and_then(|p| p.read());
        let _ = tx.send(result);
    });

    let result = rx
        .recv_timeout(TAG_READ_TIMEOUT)
        .map_err(|_| TagReadError::Timeout(TAG_READ_TIMEOUT, path.display().to_string()))?;
    let tagged_file = result?;

    let properties = tagged_file.properties();
    let tag = tagged_file.primary_tag().or_else(|| tagged_file.first_tag());

    let (artist, album_artist, album, title, year, genre) = match tag {
        Some(tag) => (
            tag.artist().map(|s| s.to_string()),
            tag.get_string(&lofty::tag::ItemKey::AlbumArtist).map(|s| s.to_string()),
            tag.album().map(|s| s.to_string()),
            tag.title().map(|s| s.to_string()),
            tag.year(),
            tag.genre().map(|s| s.to_string()),
        ),
        None => (None, None, None, None, None, None),
    };

    let (label, catalog_number) = match tag {
        Some(tag) => (
            tag.get_string(&lofty::tag::ItemKey::Publisher).map(|s| s.to_string()),
            tag.get_string(&lofty::tag::ItemKey::CatalogNumber).map(|s| s.to_string()),
        ),
        None => (None, None),
    };

    let track_number = tag.and_then(|t| t.track());
    let disc_number = tag.and_then(|t| t.disk());

    Ok(Track {
        file_path: path.to_path_buf(),
        track_number,
        disc_number,
        title,
        duration_ms: Some(properties.duration().as_millis() as u64),
        bitrate_kbps: properties.audio_bitrate(),
        format,
        artist,
        album_artist,
        album,
        year: year.map(|y| y as u32),
        genre,
        label,
        catalog_number,
        file_size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unrecognized_extension_errs() {
        let path = Path::new("/tmp/not-audio.txt");
        match read_track(path) {
            Err(TagReadError::UnrecognizedFormat(ext)) => assert_eq!(ext, "txt"),
            other => panic!("expected UnrecognizedFormat, got {other:?}"),
        }
    }
}
