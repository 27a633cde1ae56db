//! Secondary enrichment provider: a Discogs-shaped release lookup API.
//!
//! Grounded on the teacher's `discogs_client.rs` (token query param auth,
//! status-code branching into typed errors, `search`/`get_*` split).

use async_trait::async_trait;
use serde::Deserialize;

use super::{Candidate, EnrichmentClient, EnrichmentError, Release};

const BASE_URL: &str = "https://api.example-discogs.invalid";

pub struct SecondaryClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl SecondaryClient {
    pub fn new(api_key: String) -> Self {
        SecondaryClient { http: reqwest::Client::new(), api_key, base_url: BASE_URL.to_string() }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    id: u64,
    title: String,
    year: Option<String>,
    label: Option<Vec<String>>,
    catno: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReleaseResponse {
    id: u64,
    title: String,
    year: Option<u32>,
    genres: Option<Vec<String>>,
    labels: Option<Vec<LabelInfo>>,
    artists: Option<Vec<ArtistInfo>>,
}

#[derive(Debug, Deserialize)]
struct LabelInfo {
    name: String,
    catno: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ArtistInfo {
    name: String,
}

/// `"Artist - Title"` is how this API formats a combined search title;
/// split it back into the two fields we need.
fn split_combined_title(title: &str) -> (String, String) {
    match title.split_once(" - ") {
        Some((artist, album)) => (artist.trim().to_string(), album.trim().to_string()),
        None => (String::new(), title.trim().to_string()),
    }
}

#[async_trait]
impl EnrichmentClient for SecondaryClient {
    async fn search(
        &self,
        artist: &str,
        album: &str,
        year: Option<u32>,
    ) -> Result<Vec<Candidate>, EnrichmentError> {
        let url = format!("{}/database/search", self.base_url);
        let query = format!("{artist} {album}");
        let year_str = year.map(|y| y.to_string());

        let mut params = vec![
            ("q", query.as_str()),
            ("type", "release"),
            ("token", self.api_key.as_str()),
        ];
        if let Some(y) = year_str.as_deref() {
            params.push(("year", y));
        }

        let response = self
            .http
            .get(url)
            .query(&params)
            .send()
            .await
            .map_err(|e| EnrichmentError::Request(e.to_string()))?;

        match response.status().as_u16() {
            200 => {}
            429 => return Err(EnrichmentError::Request("rate limited".to_string())),
            401 => return Err(EnrichmentError::Request("invalid api key".to_string())),
            status => return Err(EnrichmentError::Request(format!("status {status}"))),
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| EnrichmentError::Malformed(e.to_string()))?;

        Ok(parsed
            .results
            .into_iter()
            .map(|r| {
                let (artist, album) = split_combined_title(&r.title);
                Candidate {
                    id: r.id.to_string(),
                    artist,
                    album,
                    year: r.year.and_then(|y| y.parse().ok()),
                    label: r.label.and_then(|l| l.into_iter().next()),
                    catalog_number: r.catno,
                }
            })
            .collect())
    }

    async fn get_release(&self, id: &str) -> Result<Release, EnrichmentError> {
        let url = format!("{}/releases/{id}", self.base_url);
        let response = self
            .http
            .get(url)
            .query(&[("token", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| EnrichmentError::Request(e.to_string()))?;

        match response.status().as_u16() {
            200 => {}
            429 => return Err(EnrichmentError::Request("rate limited".to_string())),
            401 => return Err(EnrichmentError::Request("invalid api key".to_string())),
            404 => return Err(EnrichmentError::Request("release not found".to_string())),
            status => return Err(EnrichmentError::Request(format!("status {status}"))),
        }

        let parsed: ReleaseResponse = response
            .json()
            .await
            .map_err(|e| EnrichmentError::Malformed(e.to_string()))?;

        let label = parsed.labels.as_ref().and_then(|l| l.first());

        Ok(Release {
            id: parsed.id.to_string(),
            artist: parsed.artists.unwrap_or_default().into_iter().next().map(|a| a.name).unwrap_or_default(),
            album: parsed.title,
            year: parsed.year,
            label: label.map(|l| l.name.clone()),
            catalog_number: label.and_then(|l| l.catno.clone()),
            genre: parsed.genres.and_then(|g| g.into_iter().next()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_combined_title() {
        assert_eq!(
            split_combined_title("Atom Heart - Pure Funktion"),
            ("Atom Heart".to_string(), "Pure Funktion".to_string())
        );
    }

    #[test]
    fn title_without_separator_becomes_album_only() {
        assert_eq!(split_combined_title("Pure Funktion"), (String::new(), "Pure Funktion".to_string()));
    }
}
