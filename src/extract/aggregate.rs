//! Per-track field aggregation into one album record (spec §4.2 step 3).
//!
//! Album-artist uses unanimous-agreement, album-title uses frequency with
//! first-occurrence tie-break, and year uses the earliest value across
//! tracks; label/catalog/genre use the plain "first non-empty across
//! priority list" rule. None of these fields carry a confidence weight —
//! the aggregation is a single deterministic rule per field, not a
//! weighted pick across sources.

use crate::model::Track;

/// Album-artist / artist aggregation per spec §4.2 step 3: if all tracks
/// agree on a non-empty album-artist, use it; else if they agree on artist,
/// use that; else the caller substitutes the compilation sentinel.
pub fn aggregate_album_artist(tracks: &[Track]) -> Option<String> {
    if let Some(value) = unanimous_non_empty(tracks.iter().map(|t| t.album_artist.as_deref())) {
        return Some(value);
    }
    unanimous_non_empty(tracks.iter().map(|t| t.artist.as_deref()))
}

fn unanimous_non_empty<'a>(values: impl Iterator<Item = Option<&'a str>>) -> Option<String> {
    let mut agreed: Option<&str> = None;
    for value in values {
        let value = value.map(str::trim).filter(|v| !v.is_empty())?;
        match agreed {
            None => agreed = Some(value),
            Some(prev) if prev.eq_ignore_ascii_case(value) => {}
            Some(_) => return None,
        }
    }
    agreed.map(|s| s.to_string())
}

/// Album title aggregation per spec §4.2 step 3: most frequent non-empty
/// value, tie-broken by first occurrence.
pub fn aggregate_album_title(tracks: &[Track]) -> Option<String> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for track in tracks {
        let Some(title) = track.album.as_deref().map(str::trim).filter(|t| !t.is_empty()) else {
            continue;
        };
        match counts.iter_mut().find(|(t, _)| t.eq_ignore_ascii_case(title)) {
            Some((_, n)) => *n += 1,
            None => counts.push((title.to_string(), 1)),
        }
    }
    counts
        .into_iter()
        .enumerate()
        .max_by_key(|(idx, (_, count))| (*count, std::cmp::Reverse(*idx)))
        .map(|(_, (title, _))| title)
}

/// Year aggregation per spec §4.2 step 3: earliest 4-digit year among
/// year/date fields.
pub fn aggregate_earliest_year(tracks: &[Track]) -> Option<u32> {
    tracks.iter().filter_map(|t| t.year).filter(|&y| (1000..=9999).contains(&y)).min()
}

/// Label/catalog/genre aggregation per spec §4.2 step 3: first non-empty
/// value across the tracks, in file order.
pub fn first_non_empty<'a>(values: impl Iterator<Item = Option<&'a String>>) -> Option<String> {
    values
        .filter_map(|v| v.map(|s| s.trim()).filter(|s| !s.is_empty()))
        .next()
        .map(|s| s.to_string())
}

/// Average bitrate across tracks that report one (spec §4.2 step 3).
pub fn average_bitrate(tracks: &[Track]) -> Option<u32> {
    let values: Vec<u32> = tracks.iter().filter_map(|t| t.bitrate_kbps).collect();
    if values.is_empty() {
        return None;
    }
    Some((values.iter().map(|&v| v as u64).sum::<u64>() / values.len() as u64) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use crate::model::Format;

    fn track(artist: Option<&str>, album_artist: Option<&str>) -> Track {
        Track {
            file_path: PathBuf::from("t.mp3"),
            track_number: None,
            disc_number: None,
            title: None,
            duration_ms: None,
            bitrate_kbps: Some(320),
            format: Format::Mp3,
            artist: artist.map(String::from),
            album_artist: album_artist.map(String::from),
            album: Some("Album".into()),
            year: Some(1999),
            genre: None,
            label: None,
            catalog_number: None,
            file_size: 1,
        }
    }

    #[test]
    fn unanimous_album_artist_wins() {
        let tracks = vec![track(Some("A"), Some("VA")), track(Some("B"), Some("VA"))];
        assert_eq!(aggregate_album_artist(&tracks), Some("VA".to_string()));
    }

    #[test]
    fn falls_back_to_unanimous_artist() {
        let tracks = vec![track(Some("A"), None), track(Some("A"), None)];
        assert_eq!(aggregate_album_artist(&tracks), Some("A".to_string()));
    }

    #[test]
    fn disagreement_yields_none() {
        let tracks = vec![track(Some("A"), None), track(Some("B"), None)];
        assert_eq!(aggregate_album_artist(&tracks), None);
    }

    #[test]
    fn year_aggregation_prefers_earliest() {
        let mut tracks = vec![track(Some("A"), None), track(Some("A"), None)];
        tracks[0].year = Some(2001);
        tracks[1].year = Some(1994);
        assert_eq!(aggregate_earliest_year(&tracks), Some(1994));
    }
}
