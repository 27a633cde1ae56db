//! Sidecar info-file parsing (spec §4.2 fallback step): XML-ish `title`,
//! `artist`/`albumartist`, `year`, `genre` tags in a loose info/NFO file of
//! unknown encoding.
//!
//! Grounded on the teacher's CUE-sidecar text parsing idiom (line-oriented
//! key lookup in `import/folder_metadata_detector.rs`), adapted to spec
//! §4.2's generic sidecar tags; encoding recovery uses the teacher's own
//! `encoding_rs`/`chardetng` dependencies (there used for CUE/log text,
//! reused here for arbitrary sidecar files).

use std::path::Path;

use chardetng::EncodingDetector;
use once_cell::sync::Lazy;
use regex::Regex;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SidecarFields {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub year: Option<u32>,
    pub genre: Option<String>,
}

const SIDECAR_EXTENSIONS: &[&str] = &["nfo", "info", "txt"];

/// Recover the text contents of a sidecar file, guessing its encoding when
/// it isn't valid UTF-8. Never fails: an unreadable file yields empty
/// fields rather than aborting the album (spec §4.2).
fn read_sidecar_text(path: &Path) -> Option<String> {
    let bytes = std::fs::read(path).ok()?;
    if let Ok(text) = std::str::from_utf8(&bytes) {
        return Some(text.to_string());
    }

    let mut detector = EncodingDetector::new();
    detector.feed(&bytes, true);
    let encoding = detector.guess(None, true);
    let (text, _, _) = encoding.decode(&bytes);
    Some(text.into_owned())
}

/// Find the first sidecar-looking file directly inside `dir` and parse its
/// tags. Returns `None` if no sidecar file is present; a malformed sidecar
/// yields a `SidecarFields` with unset fields rather than an error (spec
/// §4.2: "never raises on a malformed sidecar").
pub fn find_and_parse(dir: &Path) -> Option<SidecarFields> {
    let entries = std::fs::read_dir(dir).ok()?;
    for entry in entries.flatten() {
        let path = entry.path();
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            continue;
        };
        if SIDECAR_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()) {
            if let Some(text) = read_sidecar_text(&path) {
                return Some(parse(&text));
            }
        }
    }
    None
}

static TAG_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^\s*<?(title|artist|albumartist|year|genre)>?\s*[:=]\s*(.+?)\s*>?\s*$").unwrap()
});

/// Parse the loose `key: value` / `<key>value` lines a sidecar info file
/// carries. Unrecognized lines are ignored; never panics on malformed input.
pub fn parse(text: &str) -> SidecarFields {
    let mut fields = SidecarFields::default();
    for caps in TAG_LINE.captures_iter(text) {
        let key = caps[1].to_ascii_lowercase();
        let value = caps[2].trim().trim_end_matches(['>', '<']).trim().to_string();
        if value.is_empty() {
            continue;
        }
        match key.as_str() {
            "title" => fields.title = Some(value),
            "artist" | "albumartist" => fields.artist = fields.artist.or(Some(value)),
            "year" => fields.year = value.chars().take(4).collect::<String>().parse().ok(),
            "genre" => fields.genre = Some(value),
            _ => {}
        }
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_key_value_lines() {
        let text = "title: Pure Funktion\nartist: Atom Heart\nyear: 1994\ngenre: Electronic\n";
        let fields = parse(text);
        assert_eq!(fields.title.as_deref(), Some("Pure Funktion"));
        assert_eq!(fields.artist.as_deref(), Some("Atom Heart"));
        assert_eq!(fields.year, Some(1994));
        assert_eq!(fields.genre.as_deref(), Some("Electronic"));
    }

    #[test]
    fn malformed_sidecar_yields_empty_fields_not_panic() {
        let fields = parse("#!@$ garbage \x00\x01 not a tag file");
        assert_eq!(fields, SidecarFields::default());
    }

    #[test]
    fn xml_ish_tags_are_recognized() {
        let fields = parse("<title>Liedgut</title>\n<albumartist>Uwe Schmidt</albumartist>\n");
        assert_eq!(fields.title.as_deref(), Some("Liedgut"));
        assert_eq!(fields.artist.as_deref(), Some("Uwe Schmidt"));
    }
}
