use std::io::{Cursor, Read};
use std::time::Duration;

use base64::prelude::*;
use byteorder::{BigEndian, ReadBytesExt};
use serde::{Deserialize, Serialize};

use crate::common::Severity;

/// A track exactly as the node serializes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackData {
    /// Base64-encoded track data.
    pub encoded: String,
    pub info: TrackInfo,
    #[serde(default = "default_json_object")]
    pub plugin_info: serde_json::Value,
    #[serde(default = "default_json_object")]
    pub user_data: serde_json::Value,
}

fn default_json_object() -> serde_json::Value {
    serde_json::json!({})
}

/// Metadata for an audio track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TrackInfo {
    pub identifier: String,
    pub is_seekable: bool,
    pub author: String,
    /// Duration in milliseconds. 0 for live streams.
    pub length: u64,
    pub is_stream: bool,
    /// Playback position in milliseconds at the time the node reported it.
    pub position: u64,
    pub title: String,
    pub uri: Option<String>,
    pub artwork_url: Option<String>,
    pub isrc: Option<String>,
    pub source_name: String,
}

const TRACK_INFO_VERSIONED: u32 = 1;

impl TrackInfo {
    /// Decodes the metadata embedded in a node-encoded track.
    ///
    /// Layout (big endian): `u32` header whose top two bits are flags, an
    /// optional version byte, then title, author, length, identifier,
    /// stream flag, uri (v2+), artwork url and isrc (v3+), source name and
    /// position. Strings are `u16`-length prefixed, optional strings carry a
    /// presence byte.
    pub fn decode(encoded: &str) -> Option<Self> {
        let data = BASE64_STANDARD.decode(encoded).ok()?;
        let mut reader = MessageReader(Cursor::new(data));

        let header = reader.0.read_u32::<BigEndian>().ok()?;
        let version = if (header >> 30) & TRACK_INFO_VERSIONED != 0 {
            reader.0.read_u8().ok()?
        } else {
            1
        };
        if version == 0 || version > 3 {
            return None;
        }

        let title = reader.utf()?;
        let author = reader.utf()?;
        let length = reader.0.read_u64::<BigEndian>().ok()?;
        let identifier = reader.utf()?;
        let is_stream = reader.0.read_u8().ok()? != 0;
        let uri = if version >= 2 { reader.opt_utf()? } else { None };
        let (artwork_url, isrc) = if version >= 3 {
            (reader.opt_utf()?, reader.opt_utf()?)
        } else {
            (None, None)
        };
        let source_name = reader.utf()?;
        let position = reader.0.read_u64::<BigEndian>().unwrap_or(0);

        Some(Self {
            identifier,
            is_seekable: !is_stream,
            author,
            length,
            is_stream,
            position,
            title,
            uri,
            artwork_url,
            isrc,
            source_name,
        })
    }
}

struct MessageReader(Cursor<Vec<u8>>);

impl MessageReader {
    fn utf(&mut self) -> Option<String> {
        let len = self.0.read_u16::<BigEndian>().ok()? as usize;
        let mut buf = vec![0u8; len];
        self.0.read_exact(&mut buf).ok()?;
        String::from_utf8(buf).ok()
    }

    /// `None` when the stream is truncated, `Some(None)` when the value is absent.
    fn opt_utf(&mut self) -> Option<Option<String>> {
        match self.0.read_u8().ok()? {
            0 => Some(None),
            _ => self.utf().map(Some),
        }
    }
}

/// Immutable track record built from node payloads.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "TrackData")]
pub struct Track {
    encoded: String,
    info: TrackInfo,
    plugin_info: serde_json::Value,
    user_data: serde_json::Value,
}

impl From<TrackData> for Track {
    fn from(data: TrackData) -> Self {
        Self {
            encoded: data.encoded,
            info: data.info,
            plugin_info: data.plugin_info,
            user_data: data.user_data,
        }
    }
}

impl Track {
    /// Builds a track from an encoded id alone, decoding its metadata locally.
    pub fn from_encoded(encoded: impl Into<String>) -> Option<Self> {
        let encoded = encoded.into();
        let info = TrackInfo::decode(&encoded)?;
        Some(Self {
            encoded,
            info,
            plugin_info: default_json_object(),
            user_data: default_json_object(),
        })
    }

    /// The opaque id the node uses to play this track.
    pub fn encoded(&self) -> &str {
        &self.encoded
    }

    pub fn info(&self) -> &TrackInfo {
        &self.info
    }

    pub fn identifier(&self) -> &str {
        &self.info.identifier
    }

    pub fn title(&self) -> &str {
        &self.info.title
    }

    pub fn author(&self) -> &str {
        &self.info.author
    }

    pub fn length(&self) -> Duration {
        Duration::from_millis(self.info.length)
    }

    pub fn position(&self) -> Duration {
        Duration::from_millis(self.info.position)
    }

    pub fn is_seekable(&self) -> bool {
        self.info.is_seekable
    }

    pub fn is_stream(&self) -> bool {
        self.info.is_stream
    }

    pub fn uri(&self) -> Option<&str> {
        self.info.uri.as_deref()
    }

    pub fn artwork_url(&self) -> Option<&str> {
        self.info.artwork_url.as_deref()
    }

    pub fn isrc(&self) -> Option<&str> {
        self.info.isrc.as_deref()
    }

    pub fn source_name(&self) -> &str {
        &self.info.source_name
    }

    pub fn plugin_info(&self) -> &serde_json::Value {
        &self.plugin_info
    }

    pub fn user_data(&self) -> &serde_json::Value {
        &self.user_data
    }
}

/// Result of a `loadtracks` call, tagged by `loadType`.
///
/// Load types this client does not know decode to [`LoadResult::Unknown`]
/// instead of failing; a known type with a malformed `data` is an error.
#[derive(Debug, Deserialize)]
#[serde(try_from = "RawLoadResult")]
pub enum LoadResult {
    Track(TrackData),
    Playlist(PlaylistData),
    Search(Vec<TrackData>),
    Empty {},
    Error(LoadError),
    /// Carries the unrecognized `loadType`.
    Unknown(String),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLoadResult {
    load_type: String,
    #[serde(default)]
    data: serde_json::Value,
}

impl TryFrom<RawLoadResult> for LoadResult {
    type Error = serde_json::Error;

    fn try_from(raw: RawLoadResult) -> Result<Self, serde_json::Error> {
        Ok(match raw.load_type.as_str() {
            "track" => Self::Track(serde_json::from_value(raw.data)?),
            "playlist" => Self::Playlist(serde_json::from_value(raw.data)?),
            "search" => Self::Search(serde_json::from_value(raw.data)?),
            "empty" => Self::Empty {},
            "error" => Self::Error(serde_json::from_value(raw.data)?),
            _ => Self::Unknown(raw.load_type),
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistData {
    pub info: PlaylistInfo,
    #[serde(default = "default_json_object")]
    pub plugin_info: serde_json::Value,
    pub tracks: Vec<TrackData>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistInfo {
    pub name: String,
    /// Index of the selected track, or -1 if none.
    pub selected_track: i32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadError {
    pub message: Option<String>,
    pub severity: Severity,
    pub cause: String,
    #[serde(default)]
    pub cause_stack_trace: Option<String>,
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use byteorder::WriteBytesExt;
    use serde_json::json;

    use super::*;

    fn utf(buf: &mut Vec<u8>, s: &str) {
        buf.write_u16::<BigEndian>(s.len() as u16).unwrap();
        buf.write_all(s.as_bytes()).unwrap();
    }

    fn opt_utf(buf: &mut Vec<u8>, s: Option<&str>) {
        match s {
            Some(s) => {
                buf.write_u8(1).unwrap();
                utf(buf, s);
            }
            None => buf.write_u8(0).unwrap(),
        }
    }

    fn encode_v3(stream: bool, uri: Option<&str>) -> String {
        let mut body = vec![3u8];
        utf(&mut body, "Never Gonna Give You Up");
        utf(&mut body, "Rick Astley");
        body.write_u64::<BigEndian>(212_000).unwrap();
        utf(&mut body, "dQw4w9WgXcQ");
        body.write_u8(stream as u8).unwrap();
        opt_utf(&mut body, uri);
        opt_utf(&mut body, None);
        opt_utf(&mut body, Some("GBARL9300135"));
        utf(&mut body, "youtube");
        body.write_u64::<BigEndian>(5_000).unwrap();

        let mut message = Vec::new();
        message
            .write_u32::<BigEndian>(body.len() as u32 | (1 << 30))
            .unwrap();
        message.extend_from_slice(&body);
        BASE64_STANDARD.encode(message)
    }

    #[test]
    fn decodes_v3_message() {
        let encoded = encode_v3(false, Some("https://www.youtube.com/watch?v=dQw4w9WgXcQ"));
        let info = TrackInfo::decode(&encoded).expect("decode");

        assert_eq!(info.title, "Never Gonna Give You Up");
        assert_eq!(info.author, "Rick Astley");
        assert_eq!(info.length, 212_000);
        assert_eq!(info.identifier, "dQw4w9WgXcQ");
        assert!(info.is_seekable);
        assert_eq!(
            info.uri.as_deref(),
            Some("https://www.youtube.com/watch?v=dQw4w9WgXcQ")
        );
        assert_eq!(info.artwork_url, None);
        assert_eq!(info.isrc.as_deref(), Some("GBARL9300135"));
        assert_eq!(info.source_name, "youtube");
        assert_eq!(info.position, 5_000);
    }

    #[test]
    fn stream_is_not_seekable() {
        let info = TrackInfo::decode(&encode_v3(true, None)).expect("decode");
        assert!(info.is_stream);
        assert!(!info.is_seekable);
        assert_eq!(info.uri, None);
    }

    #[test]
    fn rejects_garbage() {
        assert!(TrackInfo::decode("not_valid_base64!!!").is_none());
        assert!(TrackInfo::decode(&BASE64_STANDARD.encode([1u8, 2, 3])).is_none());
    }

    #[test]
    fn rejects_truncated_message() {
        let full = BASE64_STANDARD.decode(encode_v3(false, None)).unwrap();
        let truncated = BASE64_STANDARD.encode(&full[..20]);
        assert!(TrackInfo::decode(&truncated).is_none());
    }

    #[test]
    fn track_from_node_payload() {
        let track: Track = serde_json::from_value(json!({
            "encoded": "QAAAjQIAJVJpY2s=",
            "info": {
                "identifier": "dQw4w9WgXcQ",
                "isSeekable": true,
                "author": "RickAstleyVEVO",
                "length": 212000,
                "isStream": false,
                "position": 0,
                "title": "Rick Astley - Never Gonna Give You Up",
                "uri": "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
                "artworkUrl": "https://i.ytimg.com/vi/dQw4w9WgXcQ/maxresdefault.jpg",
                "isrc": null,
                "sourceName": "youtube"
            },
            "pluginInfo": {}
        }))
        .unwrap();

        assert_eq!(track.encoded(), "QAAAjQIAJVJpY2s=");
        assert_eq!(track.length(), Duration::from_secs(212));
        assert_eq!(track.source_name(), "youtube");
        assert_eq!(track.isrc(), None);
        assert_eq!(track.user_data(), &json!({}));
    }

    #[test]
    fn load_result_variants() {
        let empty: LoadResult =
            serde_json::from_value(json!({"loadType": "empty", "data": {}})).unwrap();
        assert!(matches!(empty, LoadResult::Empty {}));

        let error: LoadResult = serde_json::from_value(json!({
            "loadType": "error",
            "data": {"message": "Something broke", "severity": "fault", "cause": "Boom"}
        }))
        .unwrap();
        match error {
            LoadResult::Error(e) => {
                assert_eq!(e.severity, Severity::Fault);
                assert_eq!(e.message.as_deref(), Some("Something broke"));
            }
            other => panic!("unexpected {:?}", other),
        }

        let unknown: LoadResult =
            serde_json::from_value(json!({"loadType": "mystery", "data": {}})).unwrap();
        assert!(matches!(unknown, LoadResult::Unknown(t) if t == "mystery"));

        let malformed: Result<LoadResult, _> =
            serde_json::from_value(json!({"loadType": "track", "data": {"encoded": 1}}));
        assert!(malformed.is_err());

        let bare: LoadResult = serde_json::from_value(json!({"loadType": "empty"})).unwrap();
        assert!(matches!(bare, LoadResult::Empty {}));
    }
}
