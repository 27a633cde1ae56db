//! Primary enrichment provider: a MusicBrainz-shaped release lookup API.
//!
//! Grounded on the teacher's `musicbrainz.rs` (reqwest JSON client, manual
//! `serde_json::Value` field extraction, dedicated user-agent string).

use async_trait::async_trait;
use serde::Deserialize;

use super::{Candidate, EnrichmentClient, EnrichmentError, Release};

const USER_AGENT: &str = "shelfkeeper/0.1 (+https://example.invalid/shelfkeeper)";
const BASE_URL: &str = "https://musicbrainz.org/ws/2";

pub struct PrimaryClient {
    http: reqwest::Client,
    base_url: String,
}

impl PrimaryClient {
    pub fn new() -> Result<Self, EnrichmentError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| EnrichmentError::Request(e.to_string()))?;
        Ok(PrimaryClient { http, base_url: BASE_URL.to_string() })
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(rename = "release-groups", default)]
    release_groups: Vec<ReleaseGroup>,
}

#[derive(Debug, Deserialize)]
struct ReleaseGroup {
    id: String,
    title: String,
    #[serde(rename = "first-release-date", default)]
    first_release_date: Option<String>,
    #[serde(rename = "artist-credit", default)]
    artist_credit: Vec<ArtistCredit>,
}

#[derive(Debug, Deserialize)]
struct ArtistCredit {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ReleaseResponse {
    id: String,
    title: String,
    #[serde(rename = "first-release-date", default)]
    first_release_date: Option<String>,
    #[serde(rename = "artist-credit", default)]
    artist_credit: Vec<ArtistCredit>,
    #[serde(rename = "label-info", default)]
    label_info: Vec<LabelInfo>,
}

#[derive(Debug, Deserialize, Default)]
struct LabelInfo {
    #[serde(rename = "catalog-number", default)]
    catalog_number: Option<String>,
    label: Option<LabelName>,
}

#[derive(Debug, Deserialize)]
struct LabelName {
    name: String,
}

fn year_from_date(date: &Option<String>) -> Option<u32> {
    date.as_ref()?.get(0..4)?.parse().ok()
}

#[async_trait]
impl EnrichmentClient for PrimaryClient {
    async fn search(
        &self,
        artist: &str,
        album: &str,
        year: Option<u32>,
    ) -> Result<Vec<Candidate>, EnrichmentError> {
        let mut query = format!("artist:\"{artist}\" AND releasegroup:\"{album}\"");
        if let Some(y) = year {
            query.push_str(&format!(" AND firstreleasedate:{y}"));
        }

        let url = format!("{}/release-group", self.base_url);
        let response = self
            .http
            .get(url)
            .query(&[("query", query.as_str()), ("fmt", "json")])
            .send()
            .await
            .map_err(|e| EnrichmentError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(EnrichmentError::Request(format!("status {}", response.status())));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| EnrichmentError::Malformed(e.to_string()))?;

        Ok(parsed
            .release_groups
            .into_iter()
            .map(|rg| Candidate {
                id: rg.id,
                artist: rg
                    .artist_credit
                    .first()
                    .map(|a| a.name.clone())
                    .unwrap_or_default(),
                album: rg.title,
                year: year_from_date(&rg.first_release_date),
                label: None,
                catalog_number: None,
            })
            .collect())
    }

    async fn get_release(&self, id: &str) -> Result<Release, EnrichmentError> {
        let url = format!("{}/release-group/{id}", self.base_url);
        let response = self
            .http
            .get(url)
            .query(&[("fmt", "json"), ("inc", "artist-credits+labels")])
            .send()
            .await
            .map_err(|e| EnrichmentError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(EnrichmentError::Request(format!("status {}", response.status())));
        }

        let parsed: ReleaseResponse = response
            .json()
            .await
            .map_err(|e| EnrichmentError::Malformed(e.to_string()))?;

        let label_info = parsed.label_info.into_iter().next().unwrap_or_default();

        Ok(Release {
            id: parsed.id,
            artist: parsed
                .artist_credit
                .first()
                .map(|a| a.name.clone())
                .unwrap_or_default(),
            album: parsed.title,
            year: year_from_date(&parsed.first_release_date),
            label: label_info.label.map(|l| l.name),
            catalog_number: label_info.catalog_number,
            genre: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn year_from_date_takes_the_leading_four_digits() {
        assert_eq!(year_from_date(&Some("1994-03-15".to_string())), Some(1994));
        assert_eq!(year_from_date(&None), None);
        assert_eq!(year_from_date(&Some("".to_string())), None);
    }

    #[test]
    fn search_response_deserializes_release_groups() {
        let body = serde_json::json!({
            "release-groups": [{
                "id": "abc-123",
                "title": "Pure Funktion",
                "first-release-date": "1994-01-01",
                "artist-credit": [{"name": "Atom Heart"}],
            }]
        });
        let parsed: SearchResponse = serde_json::from_value(body).unwrap();
        assert_eq!(parsed.release_groups.len(), 1);
        assert_eq!(parsed.release_groups[0].artist_credit[0].name, "Atom Heart");
        assert_eq!(year_from_date(&parsed.release_groups[0].first_release_date), Some(1994));
    }
}
