use crate::features::error::Rejection;
use bon::bon;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const DEFAULT_MAX_SIZE_BYTES: u64 = 10 * 1024 * 1024;
pub const DEFAULT_ACCEPTED_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/webp"];

/// What is known about a file before reading it: its name, declared type and size.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub name: String,
    pub mime_type: String,
    pub size_bytes: u64,
}

/// A file offered for upload, with its contents.
#[derive(Debug, Clone)]
pub struct CandidateFile {
    metadata: FileMetadata,
    contents: Arc<[u8]>,
}

impl CandidateFile {
    pub fn new(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        contents: impl Into<Arc<[u8]>>,
    ) -> Self {
        let contents = contents.into();
        Self {
            metadata: FileMetadata {
                name: name.into(),
                mime_type: mime_type.into(),
                size_bytes: contents.len() as u64,
            },
            contents,
        }
    }

    pub const fn metadata(&self) -> &FileMetadata {
        &self.metadata
    }

    pub fn contents(&self) -> Arc<[u8]> {
        Arc::clone(&self.contents)
    }
}

/// Pre-flight gate on declared type and size.
///
/// This only looks at what the caller declares; it does not sniff file contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileAcceptance {
    max_size_bytes: u64,
    accepted_types: Vec<String>,
}

#[bon]
impl FileAcceptance {
    /// # Builder Arguments
    ///
    /// * `max_size_bytes: u64` - (Default: 10 MiB) Largest accepted file size, inclusive.
    /// * `accepted_types: Vec<String>` - (Default: JPEG, PNG and WebP) Accepted MIME types.
    #[builder]
    pub fn new(
        #[builder(default = DEFAULT_MAX_SIZE_BYTES)] max_size_bytes: u64,
        #[builder(default = DEFAULT_ACCEPTED_TYPES.iter().map(|t| (*t).to_string()).collect())]
        accepted_types: Vec<String>,
    ) -> Self {
        let accepted_types = accepted_types
            .iter()
            .map(|t| t.trim().to_ascii_lowercase())
            .collect();
        Self {
            max_size_bytes,
            accepted_types,
        }
    }

    pub const fn max_size_bytes(&self) -> u64 {
        self.max_size_bytes
    }

    /// Checks the rules in order and returns the first one that fails:
    /// the type must be accepted, then the size must not exceed the maximum,
    /// then the file must not be empty.
    pub fn validate(&self, file: &FileMetadata) -> Result<(), Rejection> {
        let essence = file
            .mime_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        if !self.accepted_types.contains(&essence) {
            return Err(Rejection::UnsupportedType {
                mime_type: file.mime_type.clone(),
                allowed: self.accepted_types.join(", "),
            });
        }

        if file.size_bytes > self.max_size_bytes {
            return Err(Rejection::TooLarge {
                size_bytes: file.size_bytes,
                max_bytes: self.max_size_bytes,
            });
        }

        if file.size_bytes == 0 {
            return Err(Rejection::Empty);
        }

        Ok(())
    }
}

impl Default for FileAcceptance {
    fn default() -> Self {
        Self::builder().build()
    }
}
