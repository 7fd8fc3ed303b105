use serde::Deserialize;

use crate::modules::transcode::events::AssetRef;

/// Container MIME types accepted as documents.
const ACCEPTED_MIME: &[&str] = &["mp4", "quicktime", "x-matroska"];

#[derive(Debug, Deserialize)]
pub struct ApiEnvelope<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
    pub error_code: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Debug, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    pub video: Option<MediaFile>,
    pub document: Option<MediaFile>,
}

/// Shared shape of `Video` and `Document` payloads.
#[derive(Debug, Deserialize)]
pub struct MediaFile {
    pub file_id: String,
    pub file_size: Option<u64>,
    pub mime_type: Option<String>,
    pub file_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct File {
    pub file_id: String,
    pub file_size: Option<u64>,
    pub file_path: Option<String>,
}

impl Message {
    /// The video carried by this message, if it is one the bot handles.
    pub fn asset_ref(&self) -> Option<AssetRef> {
        let media = match (&self.video, &self.document) {
            (Some(video), _) => video,
            (None, Some(doc)) if is_accepted_video(doc.mime_type.as_deref()) => doc,
            _ => return None,
        };

        Some(AssetRef {
            file_id: media.file_id.clone(),
            file_name: media.file_name.clone(),
            size: media.file_size.unwrap_or(0),
            mime_type: media.mime_type.clone(),
            chat_id: self.chat.id,
            message_id: self.message_id,
        })
    }
}

fn is_accepted_video(mime_type: Option<&str>) -> bool {
    mime_type
        .and_then(|m| m.parse::<mime::Mime>().ok())
        .is_some_and(|m| {
            m.type_() == mime::VIDEO
                && ACCEPTED_MIME.contains(&m.subtype().as_str().to_ascii_lowercase().as_str())
        })
}
