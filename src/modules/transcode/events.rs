use serde::{Deserialize, Serialize};

/// An inbound asset as announced by the transport, before anything is downloaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetRef {
    pub file_id: String,
    pub file_name: Option<String>,
    /// Size declared by the transport, in bytes.
    pub size: u64,
    pub mime_type: Option<String>,
    pub chat_id: i64,
    pub message_id: i64,
}

impl AssetRef {
    /// Extension for the local input file, derived from the MIME hint.
    pub fn input_extension(&self) -> &'static str {
        let subtype = self
            .mime_type
            .as_deref()
            .and_then(|m| m.parse::<mime::Mime>().ok())
            .map(|m| m.subtype().as_str().to_ascii_lowercase());

        match subtype.as_deref() {
            Some("quicktime") => "mov",
            Some("x-matroska") => "mkv",
            _ => "mp4",
        }
    }
}

/// Handle on a posted progress notice so it can be edited later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Notice {
    pub chat_id: i64,
    pub message_id: i64,
}
