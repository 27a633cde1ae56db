//! Path-pattern artist/title inference (spec §4.3), applied when the tag
//! artist is invalid. Patterns are tried in the order spec §4.3 lists them;
//! every candidate is re-validated by `artist::normalize`.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::extract::artist::{self, NormalizeResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferredIdentity {
    pub artist: String,
    pub title: Option<String>,
    pub year: Option<u32>,
    pub catalog: Option<String>,
}

static CAT_ARTIST_ALBUM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\[(?P<cat>[^\]]+)\]\s*(?P<artist>[^-]+?)\s*-\s*(?P<album>.+)$").unwrap());
static ARTIST_TITLE_YEAR_CAT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<artist>[^-]+?)\s*-\s*(?P<title>.+?)\s*\((?P<year>\d{4})\)\s*\[(?P<cat>[^\]]+)\]$").unwrap()
});
static ARTIST_TITLE_EMDASH_CAT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?P<artist>[^–]+?)\s*–\s*(?P<title>.+?)\s*\[(?P<cat>[^\]]+)\]$").unwrap());
static CAT_PAREN_ARTIST_TITLE_YEAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\((?P<cat>[^)]+)\)\s*(?P<artist>[^-]+?)\s*-\s*(?P<title>.+?)\s*\((?P<year>\d{4})\)$").unwrap()
});
static SCENE_FULL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<artist>[\w]+(?:_[\w]+)*)-(?P<title>[\w]+(?:_[\w]+)*)-(?P<cat>[A-Za-z0-9]+)-(?P<year>\d{4})-(?P<group>\w+)$",
    )
    .unwrap()
});
static SCENE_SIMPLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<artist>[\w]+(?:_[\w]+)*)-(?P<title>[\w]+(?:_[\w]+)*)-(?P<year>\d{4})-(?P<group>\w+)$").unwrap()
});
static COLLAB_UNDERSCORE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?P<artist>\w+)___(?P<collab>\w+)_-_(?P<title>\w+)__(?P<extras>\w+)$").unwrap());
static GENERIC_ARTIST_TITLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(?P<artist>[^-]+?)\s*-\s*(?P<title>.+)$").unwrap());

fn clean_tokens(s: &str) -> String {
    s.replace('_', " ").trim().to_string()
}

/// Try each path-pattern in spec §4.3 order against a directory/file stem,
/// re-validating the extracted artist with `artist::normalize`.
pub fn infer(stem: &str) -> Option<InferredIdentity> {
    if let Some(caps) = CAT_ARTIST_ALBUM.captures(stem) {
        if let Some(id) = build(&caps["artist"], Some(&caps["album"]), None, Some(&caps["cat"])) {
            return Some(id);
        }
    }
    if let Some(caps) = ARTIST_TITLE_YEAR_CAT.captures(stem) {
        if let Some(id) = build(
            &caps["artist"],
            Some(&caps["title"]),
            caps["year"].parse().ok(),
            Some(&caps["cat"]),
        ) {
            return Some(id);
        }
    }
    if let Some(caps) = ARTIST_TITLE_EMDASH_CAT.captures(stem) {
        if let Some(id) = build(&caps["artist"], Some(&caps["title"]), None, Some(&caps["cat"])) {
            return Some(id);
        }
    }
    if let Some(caps) = CAT_PAREN_ARTIST_TITLE_YEAR.captures(stem) {
        if let Some(id) = build(
            &caps["artist"],
            Some(&caps["title"]),
            caps["year"].parse().ok(),
            Some(&caps["cat"]),
        ) {
            return Some(id);
        }
    }
    if let Some(caps) = SCENE_FULL.captures(stem) {
        let artist = clean_tokens(&caps["artist"]);
        if let Some(id) = build(&artist, Some(&clean_tokens(&caps["title"])), caps["year"].parse().ok(), Some(&caps["cat"])) {
            return Some(id);
        }
    }
    if let Some(caps) = SCENE_SIMPLE.captures(stem) {
        let artist = clean_tokens(&caps["artist"]);
        if let Some(id) = build(&artist, Some(&clean_tokens(&caps["title"])), caps["year"].parse().ok(), None) {
            return Some(id);
        }
    }
    if let Some(caps) = COLLAB_UNDERSCORE.captures(stem) {
        let artist = clean_tokens(&caps["artist"]);
        if let Some(id) = build(&artist, Some(&clean_tokens(&caps["title"])), None, None) {
            return Some(id);
        }
    }
    if let Some(caps) = GENERIC_ARTIST_TITLE.captures(stem) {
        if let Some(id) = build(&caps["artist"], Some(&caps["title"]), None, None) {
            return Some(id);
        }
    }
    None
}

fn build(artist_raw: &str, title: Option<&str>, year: Option<u32>, catalog: Option<&str>) -> Option<InferredIdentity> {
    match artist::normalize(artist_raw.trim()) {
        NormalizeResult::Valid(artist) => Some(InferredIdentity {
            artist,
            title: title.map(|t| t.trim().to_string()).filter(|t| !t.is_empty()),
            year,
            catalog: catalog.map(|c| c.trim().to_string()).filter(|c| !c.is_empty()),
        }),
        NormalizeResult::Invalid => None,
    }
}

/// Disc number derived from path patterns `/Disc N`, `/CD N`, `/Disk N`
/// (spec §3).
pub fn infer_disc_number(path: &std::path::Path) -> Option<u32> {
    static DISC_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^(disc|cd|disk)\s*(\d+)$").unwrap());
    for component in path.components().rev() {
        if let std::path::Component::Normal(name) = component {
            if let Some(name) = name.to_str() {
                if let Some(caps) = DISC_PATTERN.captures(name.trim()) {
                    return caps[2].parse().ok();
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn infers_generic_artist_title() {
        let got = infer("Orbital - In Sides").unwrap();
        assert_eq!(got.artist, "Orbital");
        assert_eq!(got.title.as_deref(), Some("In Sides"));
    }

    #[test]
    fn infers_catalog_bracket_form() {
        let got = infer("[AFT023] Atom Heart - Pure Funktion").unwrap();
        assert_eq!(got.artist, "Atom Heart");
        assert_eq!(got.catalog.as_deref(), Some("AFT023"));
    }

    #[test]
    fn infers_disc_number_from_path() {
        let path = PathBuf::from("/in/Orbital - In Sides/Disc 2");
        assert_eq!(infer_disc_number(&path), Some(2));
    }

    #[test]
    fn no_disc_number_when_absent() {
        let path = PathBuf::from("/in/Orbital - In Sides");
        assert_eq!(infer_disc_number(&path), None);
    }
}
