//! Catalog of videos to process.
//!
//! The scraping and download stages produce a mapping from video URL to the
//! downloaded file and the search string that found it. This module reads
//! that mapping from JSON and derives the clip prefix for each video.
//!
//! ```json
//! {
//!   "https://www.youtube.com/watch?v=dQw4w9WgXcQ": {
//!     "path": "downloads/interview.mp4",
//!     "search_string": "celebrity documentaries"
//!   }
//! }
//! ```

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::error::FaceClipError;

/// Length of a YouTube video id.
const VIDEO_ID_LENGTH: usize = 11;

/// One downloaded video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    /// Source URL the video was downloaded from.
    pub url: String,
    /// Local path of the downloaded file.
    pub path: PathBuf,
    /// Search string that surfaced the video.
    pub search_string: String,
}

impl CatalogEntry {
    /// Create an entry.
    pub fn new<P: AsRef<Path>>(url: &str, path: P, search_string: &str) -> Self {
        Self {
            url: url.to_string(),
            path: path.as_ref().to_path_buf(),
            search_string: search_string.to_string(),
        }
    }

    /// The 11-character video id embedded in the URL.
    ///
    /// Takes the first position where `v=` or `/` is followed by eleven
    /// characters from `[0-9A-Za-z_-]`.
    ///
    /// ```
    /// use faceclip::CatalogEntry;
    ///
    /// let entry = CatalogEntry::new("https://youtu.be/dQw4w9WgXcQ", "a.mp4", "music");
    /// assert_eq!(entry.video_id(), Some("dQw4w9WgXcQ"));
    /// ```
    pub fn video_id(&self) -> Option<&str> {
        let url = self.url.as_str();
        let bytes = url.as_bytes();
        let is_id_byte = |byte: &u8| byte.is_ascii_alphanumeric() || *byte == b'_' || *byte == b'-';

        (0..bytes.len()).find_map(|position| {
            let id_start = if bytes[position..].starts_with(b"v=") {
                position + 2
            } else if bytes[position] == b'/' {
                position + 1
            } else {
                return None;
            };
            let id = bytes.get(id_start..id_start + VIDEO_ID_LENGTH)?;
            // All id bytes are ASCII, so the slice lies on char boundaries.
            id.iter()
                .all(is_id_byte)
                .then(|| &url[id_start..id_start + VIDEO_ID_LENGTH])
        })
    }

    /// Prefix for this video's clip files: `{search_string}_{video_id}`.
    ///
    /// Falls back to the file stem when the URL carries no video id.
    pub fn clip_prefix(&self) -> String {
        let id = match self.video_id() {
            Some(id) => id.to_string(),
            None => self
                .path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_else(|| "video".to_string()),
        };
        format!("{}_{id}", self.search_string)
    }
}

/// An ordered list of catalog entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    /// Entries in document order.
    pub entries: Vec<CatalogEntry>,
}

impl Catalog {
    /// Parse a catalog from a JSON object mapping URL to entry fields.
    ///
    /// # Errors
    ///
    /// Returns [`FaceClipError::CatalogError`] if the document is not an
    /// object of objects, or an entry lacks a string `path`.
    /// `search_string` defaults to an empty string.
    pub fn from_json_str(json: &str) -> Result<Self, FaceClipError> {
        let document: Value = serde_json::from_str(json)
            .map_err(|error| FaceClipError::CatalogError(error.to_string()))?;
        let object = document.as_object().ok_or_else(|| {
            FaceClipError::CatalogError("catalog must be a JSON object keyed by URL".to_string())
        })?;

        let entries = object
            .iter()
            .map(|(url, fields)| {
                let path = fields.get("path").and_then(Value::as_str).ok_or_else(|| {
                    FaceClipError::CatalogError(format!("entry {url} has no string \"path\""))
                })?;
                let search_string = fields
                    .get("search_string")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                Ok(CatalogEntry::new(url, path, search_string))
            })
            .collect::<Result<Vec<_>, FaceClipError>>()?;

        Ok(Self { entries })
    }

    /// Read and parse a catalog file.
    ///
    /// # Errors
    ///
    /// Returns [`FaceClipError::IoError`] if the file cannot be read, or
    /// any error from [`from_json_str`](Catalog::from_json_str).
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, FaceClipError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_id_from_watch_and_short_urls() {
        let watch = CatalogEntry::new("https://www.youtube.com/watch?v=abcDEF123_-&t=4", "a.mp4", "s");
        assert_eq!(watch.video_id(), Some("abcDEF123_-"));

        let short = CatalogEntry::new("https://youtu.be/abcDEF123_-", "a.mp4", "s");
        assert_eq!(short.video_id(), Some("abcDEF123_-"));
    }

    #[test]
    fn video_id_missing() {
        let entry = CatalogEntry::new("https://example.com/x", "clips/talk.mp4", "news");
        assert_eq!(entry.video_id(), None);
        assert_eq!(entry.clip_prefix(), "news_talk");
    }

    #[test]
    fn prefix_joins_search_string_and_id() {
        let entry = CatalogEntry::new("https://youtu.be/dQw4w9WgXcQ", "a.mp4", "interviews");
        assert_eq!(entry.clip_prefix(), "interviews_dQw4w9WgXcQ");
    }

    #[test]
    fn parse_keeps_document_order() {
        let catalog = Catalog::from_json_str(
            r#"{
                "https://youtu.be/zzzzzzzzzzz": {"path": "z.mp4", "search_string": "b"},
                "https://youtu.be/aaaaaaaaaaa": {"path": "a.mp4"}
            }"#,
        )
        .unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.entries[0].path, PathBuf::from("z.mp4"));
        assert_eq!(catalog.entries[1].search_string, "");
    }

    #[test]
    fn rejects_bad_documents() {
        assert!(Catalog::from_json_str("[]").is_err());
        assert!(Catalog::from_json_str("{\"u\": {}}").is_err());
        assert!(Catalog::from_json_str("{").is_err());
    }
}
