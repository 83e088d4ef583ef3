//! Jamendo API client for building the reference corpus.
//!
//! Requests are spaced by a minimum interval so a batch of parallel
//! downloads stays under the API's rate limits.

use crate::error::{Result, StemsimError};
use reqwest::blocking::Client;
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info};

pub const DEFAULT_API_BASE: &str = "https://api.jamendo.com/v3.0";
pub const DEFAULT_ORDER: &str = "popularity_total";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// A downloadable track as returned by the search endpoint
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TrackDescriptor {
    pub id: String,
    pub name: String,
    /// Direct download URL
    pub audio: String,
}

impl TrackDescriptor {
    /// Local file name: `<id>_<name>.mp3` with path-hostile characters replaced
    pub fn file_name(&self) -> String {
        format!("{}_{}.mp3", sanitize(&self.id), sanitize(&self.name))
    }

    fn label(&self) -> String {
        format!("{} ({})", self.name, self.id)
    }
}

/// Search parameters
#[derive(Debug, Clone)]
pub struct TrackQuery {
    pub genre: String,
    pub limit: usize,
    pub order: String,
}

/// Whether a download hit the network
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    Downloaded(PathBuf),
    Cached(PathBuf),
}

impl DownloadOutcome {
    pub fn path(&self) -> &Path {
        match self {
            DownloadOutcome::Downloaded(p) | DownloadOutcome::Cached(p) => p,
        }
    }
}

#[derive(Deserialize)]
struct TracksResponse {
    #[serde(default)]
    headers: Option<ResponseHeaders>,
    #[serde(default)]
    results: Vec<RawTrack>,
}

#[derive(Deserialize)]
struct ResponseHeaders {
    status: Option<String>,
    error_message: Option<String>,
}

#[derive(Deserialize)]
struct RawTrack {
    id: serde_json::Value,
    name: Option<String>,
    audio: Option<String>,
}

pub struct JamendoClient {
    client: Client,
    api_base: String,
    client_id: String,
    min_interval: Duration,
    last_request: Mutex<Instant>,
}

impl JamendoClient {
    pub fn new(api_base: &str, client_id: &str, min_interval: Duration) -> Result<Self> {
        if client_id.trim().is_empty() {
            return Err(StemsimError::ConfigError(
                "A Jamendo client id is required (--client-id or JAMENDO_CLIENT_ID)".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| StemsimError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            client_id: client_id.to_string(),
            min_interval,
            last_request: Mutex::new(
                Instant::now().checked_sub(min_interval).unwrap_or_else(Instant::now),
            ),
        })
    }

    fn rate_limit(&self) {
        let mut last = self.last_request.lock().unwrap_or_else(PoisonError::into_inner);
        let elapsed = last.elapsed();
        if elapsed < self.min_interval {
            std::thread::sleep(self.min_interval - elapsed);
        }
        *last = Instant::now();
    }

    /// Search tracks by tag
    ///
    /// Results missing an id, name, or download URL are dropped.
    pub fn search(&self, query: &TrackQuery) -> Result<Vec<TrackDescriptor>> {
        self.rate_limit();

        let url = format!("{}/tracks", self.api_base);
        let limit = query.limit.to_string();
        let search_failed = |reason: String| StemsimError::DownloadFailed {
            track: format!("search '{}'", query.genre),
            reason,
        };

        let response = self
            .client
            .get(&url)
            .query(&[
                ("client_id", self.client_id.as_str()),
                ("format", "json"),
                ("limit", limit.as_str()),
                ("tags", query.genre.as_str()),
                ("order", query.order.as_str()),
            ])
            .send()
            .map_err(|e| search_failed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(search_failed(format!("status {}", response.status())));
        }

        let body: TracksResponse = response
            .json()
            .map_err(|e| search_failed(format!("invalid response: {}", e)))?;

        if let Some(headers) = &body.headers {
            if headers.status.as_deref() == Some("failed") {
                return Err(search_failed(
                    headers.error_message.clone().unwrap_or_else(|| "API error".to_string()),
                ));
            }
        }

        let tracks = parse_tracks(body.results);
        info!("Found {} '{}' tracks", tracks.len(), query.genre);
        Ok(tracks)
    }

    /// Download `track` into `dir`, skipping the request if the file exists
    pub fn download(&self, track: &TrackDescriptor, dir: &Path) -> Result<DownloadOutcome> {
        let path = dir.join(track.file_name());
        if path.exists() {
            debug!("{} is already downloaded, skipping", track.label());
            return Ok(DownloadOutcome::Cached(path));
        }

        let failed = |reason: String| StemsimError::DownloadFailed {
            track: track.label(),
            reason,
        };

        self.rate_limit();
        let mut response = self
            .client
            .get(&track.audio)
            .send()
            .map_err(|e| failed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(failed(format!("status {}", response.status())));
        }

        fs::create_dir_all(dir).map_err(|e| StemsimError::output_error(dir, e))?;

        // Write to a temp file in the same directory, then rename into place
        let temp_path = path.with_extension("mp3.part");
        let written = fs::File::create(&temp_path)
            .and_then(|mut file| io::copy(&mut response, &mut file));

        let bytes = match written {
            Ok(bytes) => bytes,
            Err(e) => {
                let _ = fs::remove_file(&temp_path);
                return Err(failed(format!("failed to write {}: {}", temp_path.display(), e)));
            }
        };

        fs::rename(&temp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            failed(format!("failed to finalize {}: {}", path.display(), e))
        })?;

        info!("Downloaded {} ({} bytes)", track.label(), bytes);
        Ok(DownloadOutcome::Downloaded(path))
    }
}

fn parse_tracks(raw: Vec<RawTrack>) -> Vec<TrackDescriptor> {
    raw.into_iter()
        .filter_map(|t| {
            let id = match t.id {
                serde_json::Value::String(s) => s,
                serde_json::Value::Number(n) => n.to_string(),
                _ => return None,
            };
            let audio = t.audio.filter(|a| !a.is_empty())?;
            Some(TrackDescriptor {
                id,
                name: t.name.unwrap_or_default(),
                audio,
            })
        })
        .collect()
}

/// Replace characters that are unsafe in file names
fn sanitize(text: &str) -> String {
    let cleaned: String = text
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    cleaned.trim_matches('.').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_is_sanitized() {
        let track = TrackDescriptor {
            id: "1234".into(),
            name: "AC/DC: Live?".into(),
            audio: "https://example.com/a.mp3".into(),
        };
        assert_eq!(track.file_name(), "1234_AC_DC_ Live_.mp3");
    }

    #[test]
    fn test_parse_tracks_accepts_numeric_ids_and_drops_incomplete() {
        let body: TracksResponse = serde_json::from_str(
            r#"{
                "headers": {"status": "success"},
                "results": [
                    {"id": "17", "name": "First", "audio": "https://x/1.mp3"},
                    {"id": 18, "name": "Second", "audio": "https://x/2.mp3"},
                    {"id": "19", "name": "No audio", "audio": ""},
                    {"id": null, "name": "No id", "audio": "https://x/4.mp3"}
                ]
            }"#,
        )
        .unwrap();

        let tracks = parse_tracks(body.results);
        let ids: Vec<_> = tracks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["17", "18"]);
    }

    #[test]
    fn test_client_requires_id() {
        let err = JamendoClient::new(DEFAULT_API_BASE, "  ", Duration::ZERO).err().unwrap();
        assert!(matches!(err, StemsimError::ConfigError(_)));
    }

    #[test]
    fn test_existing_file_is_cached() {
        let dir = tempfile::tempdir().unwrap();
        let client = JamendoClient::new(DEFAULT_API_BASE, "test", Duration::ZERO).unwrap();
        let track = TrackDescriptor {
            id: "5".into(),
            name: "Kept".into(),
            audio: "http://127.0.0.1:9/never-requested.mp3".into(),
        };
        std::fs::write(dir.path().join(track.file_name()), b"ID3").unwrap();

        let outcome = client.download(&track, dir.path()).unwrap();
        assert_eq!(outcome, DownloadOutcome::Cached(dir.path().join("5_Kept.mp3")));
    }

    #[test]
    fn test_unreachable_download_fails_softly() {
        let dir = tempfile::tempdir().unwrap();
        let client = JamendoClient::new(DEFAULT_API_BASE, "test", Duration::ZERO).unwrap();
        let track = TrackDescriptor {
            id: "6".into(),
            name: "Gone".into(),
            audio: "http://127.0.0.1:9/missing.mp3".into(),
        };
        let err = client.download(&track, dir.path()).unwrap_err();
        assert!(matches!(err, StemsimError::DownloadFailed { .. }));
        assert!(err.is_recoverable());
        assert!(!dir.path().join(track.file_name()).exists());
    }
}
