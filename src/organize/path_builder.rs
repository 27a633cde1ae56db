//! Destination path construction (spec §4.4): path templates per
//! organization mode, sanitization, multi-disc suffixes.

use crate::model::{Album, OrgMode};

const MAX_COMPONENT_BYTES: usize = 255;
const TITLE_SANITIZE_THRESHOLD: usize = 100;
const TITLE_TRUNCATED_BYTES: usize = 97;

/// Sanitize one path component per spec §4.4: replace forbidden characters
/// and control characters with `_`; collapse repeated `_`; trim leading and
/// trailing `_`; collapse runs of spaces to one; truncate to 255 bytes.
pub fn sanitize(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|') || c.is_control() {
            out.push('_');
        } else {
            out.push(c);
        }
    }

    let collapsed_underscores = collapse_repeated(&out, '_');
    let trimmed = collapsed_underscores.trim_matches('_').to_string();
    let collapsed_spaces = collapse_repeated(&trimmed, ' ');

    truncate_to_bytes(&collapsed_spaces, MAX_COMPONENT_BYTES)
}

/// Sanitize a title specifically: if it exceeds 100 characters before
/// sanitization, truncate to 97 bytes plus `...` (spec §4.4), then apply
/// the general sanitization rules.
pub fn sanitize_title(title: &str) -> String {
    let pre = if title.chars().count() > TITLE_SANITIZE_THRESHOLD {
        format!("{}...", truncate_to_bytes(title, TITLE_TRUNCATED_BYTES))
    } else {
        title.to_string()
    };
    sanitize(&pre)
}

fn collapse_repeated(s: &str, target: char) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_was_target = false;
    for c in s.chars() {
        if c == target {
            if !prev_was_target {
                out.push(c);
            }
            prev_was_target = true;
        } else {
            out.push(c);
            prev_was_target = false;
        }
    }
    out
}

fn truncate_to_bytes(s: &str, max_bytes: usize) -> String {
    if s.len() <= max_bytes {
        return s.to_string();
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}

fn bracket(label: &str) -> String {
    format!("[{label}]")
}

fn paren(label: &str) -> String {
    format!("({label})")
}

/// Build the destination path (relative to the destination root) for
/// `album` under `mode`, per spec §4.4's path templates.
pub fn build_path(album: &Album, mode: OrgMode, various_artists_sentinel: &str) -> String {
    let quality = sanitize(album.quality.as_path_segment());
    let artist = sanitize(&album.artist);
    let title = sanitize_title(&album.album_title);

    let year_suffix = album.year.map(|y| sanitize(&paren(&y.to_string())));
    let label_suffix = album.label.as_deref().map(|l| sanitize(&bracket(l)));
    let catalog_suffix = album.catalog_number.as_deref().map(|c| sanitize(&bracket(c)));
    let disc_suffix = album.disc_number.map(|n| sanitize(&paren(&format!("Disc {n}"))));

    let mut components: Vec<String> = match mode {
        OrgMode::Artist => {
            let mut name = format!("{artist} - {title}");
            push_optional(&mut name, &year_suffix);
            push_optional(&mut name, &label_suffix);
            push_optional(&mut name, &catalog_suffix);
            push_optional(&mut name, &disc_suffix);
            vec![quality, artist, name]
        }
        OrgMode::Label => {
            let label = sanitize(album.label.as_deref().unwrap_or("Unknown"));
            let mut name = format!("{artist} - {title}");
            push_optional(&mut name, &catalog_suffix);
            vec![quality, "Labels".to_string(), label, name]
        }
        OrgMode::Series => {
            let catalog = album.catalog_number.as_deref().unwrap_or("");
            let series_prefix = sanitize(series_prefix_from_catalog(catalog));
            let name = format!("{} - {} - {}", sanitize(catalog), artist, title);
            vec![quality, "Series".to_string(), series_prefix, name]
        }
        OrgMode::Compilation => {
            let va = sanitize(various_artists_sentinel);
            let mut name = format!("{va} - {title}");
            push_optional(&mut name, &year_suffix);
            push_optional(&mut name, &label_suffix);
            push_optional(&mut name, &catalog_suffix);
            vec![quality, va.clone(), name]
        }
        OrgMode::Underground => {
            let bucket = album
                .catalog_number
                .clone()
                .or_else(|| album.year.map(|y| y.to_string()))
                .unwrap_or_else(|| "Unknown".to_string());
            vec![quality, "Underground".to_string(), sanitize(&bucket), title.clone()]
        }
        OrgMode::Remix => {
            vec![quality, "Remixes".to_string(), artist.clone(), title.clone()]
        }
    };

    for c in components.iter_mut() {
        *c = sanitize(c);
    }
    components.join("/")
}

fn push_optional(name: &mut String, suffix: &Option<String>) {
    if let Some(suffix) = suffix {
        name.push(' ');
        name.push_str(suffix);
    }
}

fn series_prefix_from_catalog(catalog: &str) -> &str {
    catalog.trim_end_matches(|c: char| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Quality;
    use std::path::PathBuf;

    fn album() -> Album {
        Album {
            source_path: PathBuf::from("/in/a"),
            artist: "Atom Heart".into(),
            album_title: "Pure Funktion".into(),
            year: Some(1994),
            label: Some("AFT".into()),
            catalog_number: None,
            genre: None,
            track_count: 8,
            total_bytes: 1000,
            avg_bitrate_kbps: None,
            quality: Quality::Lossless,
            disc_number: None,
            is_compilation: false,
            is_underground: false,
            is_remix_heavy: false,
            confidence: 0.5,
            enrichment_source: None,
            fingerprint: String::new(),
            metadata_hash: String::new(),
            needs_review: false,
            tracks: Vec::new(),
        }
    }

    #[test]
    fn artist_mode_matches_canonical_form() {
        let path = build_path(&album(), OrgMode::Artist, "Various Artists");
        assert_eq!(path, "Lossless/Atom Heart/Atom Heart - Pure Funktion (1994) [AFT]");
    }

    #[test]
    fn multi_disc_suffix_is_appended() {
        let mut a = album();
        a.disc_number = Some(2);
        a.label = None;
        a.artist = "Orbital".into();
        a.album_title = "In Sides".into();
        let path = build_path(&a, OrgMode::Artist, "Various Artists");
        assert_eq!(path, "Lossless/Orbital/Orbital - In Sides (1994) (Disc 2)");
    }

    #[test]
    fn sanitization_is_idempotent() {
        let raw = "AC/DC: Best? <of> \"All\"|Time*";
        assert_eq!(sanitize(&sanitize(raw)), sanitize(raw));
    }

    #[test]
    fn compilation_mode_uses_sentinel() {
        let mut a = album();
        a.is_compilation = true;
        a.artist = "Various Artists".into();
        let path = build_path(&a, OrgMode::Compilation, "Various Artists");
        assert!(path.starts_with("Lossless/Various Artists/Various Artists - Pure Funktion"));
    }
}
