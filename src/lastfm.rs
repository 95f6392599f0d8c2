use crate::{
    error::{LastFmError, TrackError},
    monitor::NowPlayingSource,
    track::Track,
};
use anyhow::Context;
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::Value;
use std::{
    fs::File,
    io::{Read, Write},
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::{debug, error, info, warn};
use url::Url;

pub const BASE_URL: &str = "http://ws.audioscrobbler.com/2.0/";
const APP_NAME: &str = "TuneDisplay";
const CONTACT_INFO: &str = "https://github.com/soehlert/tunedisplay";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
const DOWNLOAD_CHUNK: usize = 1024;
const LARGEST_IMAGE_SIZE: &str = "extralarge";

/// Blocking Last.fm client. Every public call fails soft: problems are
/// logged and surface as `None`.
pub struct LastFmClient {
    http: Client,
    base_url: String,
    api_key: String,
    username: String,
}

impl LastFmClient {
    pub fn new(api_key: impl Into<String>, username: impl Into<String>) -> anyhow::Result<Self> {
        Self::with_base_url(BASE_URL, api_key, username)
    }

    pub fn with_base_url(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        username: impl Into<String>,
    ) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(user_agent())
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
            username: username.into(),
        })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn get_now_playing(&self) -> Option<Track> {
        let body = match self.request(&[("method", "user.getrecenttracks"), ("limit", "1")]) {
            Ok(body) => body,
            Err(err) => {
                error!(error = %err, "Error fetching recent tracks from Last.fm");
                return None;
            }
        };
        now_playing_from_body(body)
    }

    pub fn download_album_art(&self, track: &Track, destination: &Path) -> Option<PathBuf> {
        let Some(url) = track.art_url() else {
            info!("No album art URL available for this track");
            return None;
        };

        match self.stream_to_file(url, destination) {
            Ok(()) => Some(destination.to_path_buf()),
            Err(err) => {
                error!(
                    error = %err,
                    art_url = %url,
                    path = %destination.display(),
                    "Error downloading album art"
                );
                None
            }
        }
    }

    fn request(&self, params: &[(&str, &str)]) -> Result<Value, LastFmError> {
        let response = self
            .http
            .get(&self.base_url)
            .query(params)
            .query(&[
                ("api_key", self.api_key.as_str()),
                ("user", self.username.as_str()),
                ("format", "json"),
            ])
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(LastFmError::Status(status));
        }

        let body = response.text()?;
        decode_body(&body)
    }

    fn stream_to_file(&self, url: &Url, destination: &Path) -> Result<(), LastFmError> {
        let mut response = self.http.get(url.clone()).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(LastFmError::Status(status));
        }

        let mut file = File::create(destination)?;
        let mut chunk = [0u8; DOWNLOAD_CHUNK];
        loop {
            let read = response.read(&mut chunk)?;
            if read == 0 {
                break;
            }
            file.write_all(&chunk[..read])?;
        }
        file.flush()?;
        Ok(())
    }
}

impl NowPlayingSource for LastFmClient {
    fn poll(&mut self) -> anyhow::Result<Option<Track>> {
        Ok(self.get_now_playing())
    }

    fn fetch_art(&self, track: &Track, destination: &Path) -> Option<PathBuf> {
        self.download_album_art(track, destination)
    }
}

fn user_agent() -> String {
    format!("{APP_NAME}-{}: {CONTACT_INFO}", env!("CARGO_PKG_VERSION"))
}

/// Parse a response body and reject explicit error payloads.
fn decode_body(body: &str) -> Result<Value, LastFmError> {
    let value: Value = serde_json::from_str(body)?;
    if let Some(code) = value.get("error") {
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("No message provided")
            .to_string();
        return Err(LastFmError::Api {
            code: code.as_i64().unwrap_or_default(),
            message,
        });
    }
    Ok(value)
}

fn now_playing_from_body(body: Value) -> Option<Track> {
    let response: RecentTracksResponse = match serde_json::from_value(body) {
        Ok(response) => response,
        Err(err) => {
            error!(error = %err, "Error parsing the Last.fm response structure");
            return None;
        }
    };

    let Some(latest) = response.recenttracks.track.into_first() else {
        debug!("No recent tracks found in Last.fm response");
        return None;
    };

    if !latest.is_now_playing() {
        debug!("Latest track is not marked as nowplaying");
        return None;
    }

    match latest.into_track() {
        Ok(track) => Some(track),
        Err(err @ TrackError::MissingField(_)) => {
            warn!(error = %err, "Missing essential track data (artist, name, or album)");
            None
        }
        Err(err) => {
            warn!(error = %err, "Track data failed validation");
            None
        }
    }
}

/// Take the first `extralarge` image. When there is none, or it has no URL,
/// take the last entry instead.
pub fn select_art_url(images: &[ImageEntry]) -> Option<&str> {
    let tagged = images
        .iter()
        .find(|image| image.size.as_deref() == Some(LARGEST_IMAGE_SIZE))
        .and_then(|image| image.url.as_deref())
        .filter(|url| !url.is_empty());

    tagged
        .or_else(|| images.last().and_then(|image| image.url.as_deref()))
        .filter(|url| !url.is_empty())
}

#[derive(Debug, Default, Deserialize)]
struct RecentTracksResponse {
    #[serde(default)]
    recenttracks: RecentTracks,
}

#[derive(Debug, Default, Deserialize)]
struct RecentTracks {
    #[serde(default)]
    track: TrackList,
}

/// Last.fm sends a bare object instead of a one-element list in some cases.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TrackList {
    Many(Vec<TrackEntry>),
    One(Box<TrackEntry>),
}

impl Default for TrackList {
    fn default() -> Self {
        TrackList::Many(Vec::new())
    }
}

impl TrackList {
    fn into_first(self) -> Option<TrackEntry> {
        match self {
            TrackList::Many(entries) => entries.into_iter().next(),
            TrackList::One(entry) => Some(*entry),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TrackEntry {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    artist: Option<TextField>,
    #[serde(default)]
    album: Option<TextField>,
    #[serde(default)]
    image: Vec<ImageEntry>,
    #[serde(rename = "@attr", default)]
    attr: Option<TrackAttr>,
}

impl TrackEntry {
    fn is_now_playing(&self) -> bool {
        self.attr
            .as_ref()
            .and_then(|attr| attr.nowplaying.as_deref())
            == Some("true")
    }

    fn into_track(self) -> Result<Track, TrackError> {
        let art_url = select_art_url(&self.image);
        Track::new(
            self.artist.and_then(|field| field.text).unwrap_or_default(),
            self.name.unwrap_or_default(),
            self.album.and_then(|field| field.text).unwrap_or_default(),
            art_url,
        )
    }
}

#[derive(Debug, Deserialize)]
struct TextField {
    #[serde(rename = "#text", default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TrackAttr {
    #[serde(default)]
    nowplaying: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageEntry {
    #[serde(default)]
    pub size: Option<String>,
    #[serde(rename = "#text", default)]
    pub url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::{
        io::{BufRead, BufReader},
        net::TcpListener,
        thread::{self, JoinHandle},
    };

    fn image(size: &str, url: &str) -> ImageEntry {
        ImageEntry {
            size: Some(size.to_string()),
            url: Some(url.to_string()),
        }
    }

    fn entry(nowplaying: bool) -> Value {
        let mut entry = json!({
            "artist": { "mbid": "", "#text": "Stereolab" },
            "name": "French Disko",
            "album": { "mbid": "", "#text": "Switched On" },
            "image": [
                { "size": "small", "#text": "https://img.example/34s.png" },
                { "size": "extralarge", "#text": "https://img.example/300x300.png" },
                { "size": "large", "#text": "https://img.example/174s.png" }
            ]
        });
        if nowplaying {
            entry["@attr"] = json!({ "nowplaying": "true" });
        }
        entry
    }

    fn response(track: Value) -> Value {
        json!({ "recenttracks": { "track": track, "@attr": { "user": "rj" } } })
    }

    #[test]
    fn prefers_extralarge_image() {
        let images = [image("small", "A"), image("extralarge", "B"), image("large", "C")];
        assert_eq!(select_art_url(&images), Some("B"));
    }

    #[test]
    fn falls_back_to_last_image_without_extralarge() {
        let images = [image("small", "A"), image("medium", "C")];
        assert_eq!(select_art_url(&images), Some("C"));
    }

    #[test]
    fn empty_extralarge_falls_back_to_last_image() {
        let images = [image("extralarge", ""), image("mega", "D")];
        assert_eq!(select_art_url(&images), Some("D"));
    }

    #[test]
    fn only_the_first_extralarge_is_considered() {
        let images = [
            image("extralarge", ""),
            image("extralarge", "X"),
            image("mega", "Y"),
        ];
        assert_eq!(select_art_url(&images), Some("Y"));

        let images = [image("extralarge", "B"), image("extralarge", "X")];
        assert_eq!(select_art_url(&images), Some("B"));
    }

    #[test]
    fn no_images_means_no_art() {
        assert_eq!(select_art_url(&[]), None);
        assert_eq!(select_art_url(&[image("small", "")]), None);
    }

    #[test]
    fn builds_track_from_now_playing_entry() {
        let track = now_playing_from_body(response(json!([entry(true)]))).unwrap();
        assert_eq!(track.artist(), "Stereolab");
        assert_eq!(track.name(), "French Disko");
        assert_eq!(track.album(), "Switched On");
        assert_eq!(track.art_url_str(), "https://img.example/300x300.png");
    }

    #[test]
    fn entry_without_now_playing_marker_is_idle() {
        assert!(now_playing_from_body(response(json!([entry(false)]))).is_none());
    }

    #[test]
    fn only_the_latest_entry_counts() {
        let body = response(json!([entry(false), entry(true)]));
        assert!(now_playing_from_body(body).is_none());
    }

    #[test]
    fn single_object_track_list_is_accepted() {
        assert!(now_playing_from_body(response(entry(true))).is_some());
    }

    #[test]
    fn missing_album_discards_track() {
        let mut latest = entry(true);
        latest["album"] = json!({ "#text": "" });
        assert!(now_playing_from_body(response(json!([latest]))).is_none());

        let mut latest = entry(true);
        latest.as_object_mut().unwrap().remove("artist");
        assert!(now_playing_from_body(response(json!([latest]))).is_none());
    }

    #[test]
    fn invalid_art_url_discards_track() {
        let mut latest = entry(true);
        latest["image"] = json!([{ "size": "extralarge", "#text": "::nope::" }]);
        assert!(now_playing_from_body(response(json!([latest]))).is_none());
    }

    #[test]
    fn empty_or_shapeless_responses_are_absent() {
        assert!(now_playing_from_body(json!({})).is_none());
        assert!(now_playing_from_body(response(json!([]))).is_none());
        assert!(now_playing_from_body(json!({ "recenttracks": "oops" })).is_none());
    }

    #[test]
    fn error_payload_is_reported() {
        let err = decode_body(r#"{"error": 10, "message": "Invalid API key"}"#).unwrap_err();
        match err {
            LastFmError::Api { code, message } => {
                assert_eq!(code, 10);
                assert_eq!(message, "Invalid API key");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(matches!(
            decode_body("<html>busy</html>"),
            Err(LastFmError::Malformed(_))
        ));
    }

    struct Captured {
        request_line: String,
        headers: Vec<String>,
    }

    fn serve_once(
        status: &str,
        content_type: &str,
        body: Vec<u8>,
    ) -> (String, JoinHandle<Captured>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let status = status.to_string();
        let content_type = content_type.to_string();

        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut request_line = String::new();
            reader.read_line(&mut request_line).unwrap();
            let mut headers = Vec::new();
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                if line.trim().is_empty() {
                    break;
                }
                headers.push(line.trim().to_ascii_lowercase());
            }

            let head = format!(
                "HTTP/1.1 {status}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            // The client may hang up early on error paths.
            let _ = stream.write_all(head.as_bytes());
            let _ = stream.write_all(&body);
            let _ = stream.flush();
            Captured {
                request_line,
                headers,
            }
        });

        (format!("http://{addr}/2.0/"), handle)
    }

    #[test]
    fn get_now_playing_sends_credentials_and_parses_reply() {
        let body = response(json!([entry(true)])).to_string().into_bytes();
        let (base_url, server) = serve_once("200 OK", "application/json", body);
        let client = LastFmClient::with_base_url(base_url, "secret-key", "rj").unwrap();

        let track = client.get_now_playing().expect("track");
        assert_eq!(track.name(), "French Disko");

        let captured = server.join().unwrap();
        for expected in [
            "method=user.getrecenttracks",
            "limit=1",
            "api_key=secret-key",
            "user=rj",
            "format=json",
        ] {
            assert!(
                captured.request_line.contains(expected),
                "{expected} missing from {}",
                captured.request_line
            );
        }
        assert!(captured
            .headers
            .iter()
            .any(|header| header.starts_with("user-agent: tunedisplay-")));
    }

    #[test]
    fn http_failure_is_absent() {
        let (base_url, server) =
            serve_once("503 Service Unavailable", "text/plain", b"down".to_vec());
        let client = LastFmClient::with_base_url(base_url, "k", "u").unwrap();
        assert!(client.get_now_playing().is_none());
        server.join().unwrap();
    }

    #[test]
    fn unreachable_service_is_absent() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let client = LastFmClient::with_base_url(format!("http://{addr}/2.0/"), "k", "u").unwrap();
        assert!(client.get_now_playing().is_none());
    }

    #[test]
    fn download_streams_image_to_destination() {
        let payload: Vec<u8> = (0..5000u32).map(|i| (i % 251) as u8).collect();
        let (base_url, server) = serve_once("200 OK", "image/png", payload.clone());
        let art_url = format!("{base_url}cover.png");
        let track = Track::new("a", "b", "c", Some(&art_url)).unwrap();
        let client = LastFmClient::new("k", "u").unwrap();

        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("art.png");
        let saved = client.download_album_art(&track, &destination);

        assert_eq!(saved.as_deref(), Some(destination.as_path()));
        assert_eq!(std::fs::read(&destination).unwrap(), payload);
        server.join().unwrap();
    }

    #[test]
    fn download_without_art_url_is_noop() {
        let track = Track::new("a", "b", "c", None).unwrap();
        let client = LastFmClient::new("k", "u").unwrap();
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("art.png");

        assert!(client.download_album_art(&track, &destination).is_none());
        assert!(!destination.exists());
    }

    #[test]
    fn download_into_missing_directory_is_absent() {
        let (base_url, server) = serve_once("200 OK", "image/png", vec![1, 2, 3]);
        let art_url = format!("{base_url}cover.png");
        let track = Track::new("a", "b", "c", Some(&art_url)).unwrap();
        let client = LastFmClient::new("k", "u").unwrap();
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("missing").join("art.png");

        assert!(client.download_album_art(&track, &destination).is_none());
        server.join().unwrap();
    }
}
