//! Title metadata from The Movie Database: synopsis, artwork, rating.

use std::time::Duration;

use serde::Deserialize;

use crate::catalog::MediaEntry;
use crate::config::MetadataConfig;
use crate::error::{Error, Result};

const POSTER_BASE: &str = "https://image.tmdb.org/t/p/w500";
const BACKDROP_BASE: &str = "https://image.tmdb.org/t/p/original";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    overview: Option<String>,
    poster_path: Option<String>,
    backdrop_path: Option<String>,
    vote_average: Option<f64>,
    release_date: Option<String>,
}

/// What a successful lookup contributes to a catalog entry.
#[derive(Debug, Clone, PartialEq)]
pub struct MovieMetadata {
    pub description: Option<String>,
    pub poster_url: Option<String>,
    pub backdrop_url: Option<String>,
    pub rating: Option<f64>,
    pub release_date: Option<String>,
}

impl From<SearchResult> for MovieMetadata {
    fn from(result: SearchResult) -> Self {
        MovieMetadata {
            description: result.overview.filter(|o| !o.trim().is_empty()),
            poster_url: result.poster_path.map(|p| format!("{POSTER_BASE}{p}")),
            backdrop_url: result.backdrop_path.map(|p| format!("{BACKDROP_BASE}{p}")),
            rating: result.vote_average,
            release_date: result.release_date.filter(|d| !d.is_empty()),
        }
    }
}

impl MovieMetadata {
    /// Overwrites the placeholders in `entry` with whatever was found.
    pub fn apply(self, entry: &mut MediaEntry) {
        if let Some(description) = self.description {
            entry.description = description;
        }
        if let Some(poster_url) = self.poster_url {
            entry.poster_url = poster_url;
        }
        if let Some(backdrop_url) = self.backdrop_url {
            entry.backdrop_url = backdrop_url;
        }
        if self.rating.is_some() {
            entry.rating = self.rating;
        }
        if entry.year.is_none() {
            entry.year = self.release_date.and_then(|d| d.get(..4).map(str::to_string));
        }
    }
}

/// Client for the movie search endpoint.
#[derive(Debug, Clone)]
pub struct MetadataClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    language: String,
}

impl MetadataClient {
    /// `Ok(None)` when no API key is configured.
    pub fn new(config: &MetadataConfig) -> Result<Option<Self>> {
        let Some(api_key) = config.api_key.clone().filter(|k| !k.is_empty()) else {
            return Ok(None);
        };
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()?;
        Ok(Some(MetadataClient {
            http,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            language: config.language.clone(),
        }))
    }

    /// Searches by title (and year, when known). The first hit wins.
    pub async fn lookup(&self, title: &str, year: Option<&str>) -> Result<Option<MovieMetadata>> {
        let mut query = vec![
            ("api_key", self.api_key.as_str()),
            ("query", title),
            ("language", self.language.as_str()),
        ];
        if let Some(year) = year {
            query.push(("year", year));
        }

        let response = self
            .http
            .get(format!("{}/3/search/movie", self.base_url))
            .query(&query)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::MetadataStatus(status));
        }

        let search: SearchResponse = response.json().await?;
        Ok(search.results.into_iter().next().map(MovieMetadata::from))
    }

    /// Looks up every entry in turn. Failures are logged and leave the
    /// entry's placeholders in place. Returns how many entries matched.
    pub async fn enrich(&self, entries: &mut [MediaEntry]) -> usize {
        let mut matched = 0;
        for entry in entries.iter_mut() {
            match self.lookup(&entry.title, entry.year.as_deref()).await {
                Ok(Some(metadata)) => {
                    tracing::debug!(title = %entry.title, "metadata found");
                    metadata.apply(entry);
                    matched += 1;
                }
                Ok(None) => tracing::info!(title = %entry.title, "no metadata match"),
                Err(e) => tracing::warn!(title = %entry.title, error = %e, "metadata lookup failed"),
            }
        }
        matched
    }
}
