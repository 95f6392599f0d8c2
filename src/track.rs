use crate::error::TrackError;
use std::fmt;
use url::Url;

/// One scrobbled track. Equality over all four fields is what the monitor
/// uses to decide whether playback changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    artist: String,
    name: String,
    album: String,
    art_url: Option<Url>,
}

impl Track {
    pub fn new(
        artist: impl Into<String>,
        name: impl Into<String>,
        album: impl Into<String>,
        art_url: Option<&str>,
    ) -> Result<Self, TrackError> {
        let artist = required(artist.into(), "artist")?;
        let name = required(name.into(), "name")?;
        let album = required(album.into(), "album")?;
        let art_url = match art_url.filter(|raw| !raw.is_empty()) {
            Some(raw) => Some(parse_art_url(raw)?),
            None => None,
        };

        Ok(Self {
            artist,
            name,
            album,
            art_url,
        })
    }

    pub fn artist(&self) -> &str {
        &self.artist
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn album(&self) -> &str {
        &self.album
    }

    pub fn art_url(&self) -> Option<&Url> {
        self.art_url.as_ref()
    }

    /// Art URL as a log field value; empty when the track has none.
    pub fn art_url_str(&self) -> &str {
        self.art_url.as_ref().map(Url::as_str).unwrap_or("")
    }
}

fn required(value: String, field: &'static str) -> Result<String, TrackError> {
    if value.is_empty() {
        Err(TrackError::MissingField(field))
    } else {
        Ok(value)
    }
}

fn parse_art_url(raw: &str) -> Result<Url, TrackError> {
    let url = Url::parse(raw).map_err(|err| TrackError::InvalidArtUrl {
        url: raw.to_string(),
        reason: err.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(TrackError::InvalidArtUrl {
            url: raw.to_string(),
            reason: format!("unsupported scheme {other}"),
        }),
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Artist: {}", self.artist)?;
        writeln!(f, "Track: {}", self.name)?;
        writeln!(f, "Album: {}", self.album)?;
        match &self.art_url {
            Some(url) => write!(f, "Album Art: URL: {url}"),
            None => write!(f, "Album Art: Not available"),
        }
    }
}
