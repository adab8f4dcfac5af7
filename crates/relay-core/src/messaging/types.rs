use crate::domain::{ChatId, MessageId, SourceTopicId};

/// A source message, normalised by the protocol adapter.
///
/// All optional event fields are resolved before the core sees the message;
/// the core performs no field-presence probing of its own.
#[derive(Clone, Debug)]
pub struct InboundMessageDescriptor {
    pub source_chat_id: ChatId,
    pub message_id: MessageId,
    pub sender_display_name: String,
    pub text: Option<String>,
    pub media: Option<MediaHandle>,
    pub source_topic_id: Option<SourceTopicId>,
    pub source_topic_title: Option<String>,
    pub is_edit: bool,
}

impl InboundMessageDescriptor {
    pub fn has_media(&self) -> bool {
        self.media.is_some()
    }

    /// Text with surrounding whitespace ignored; `None` when blank.
    pub fn text_body(&self) -> Option<&str> {
        self.text.as_deref().filter(|t| !t.trim().is_empty())
    }
}

/// Opaque reference to media attached to a source message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MediaHandle {
    /// Adapter-specific file reference.
    pub file_ref: String,
    pub file_name: Option<String>,
    pub kind: MediaKind,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaKind {
    Photo,
    Video,
    Animation,
    Audio,
    Voice,
    Document,
}

impl MediaKind {
    pub fn default_extension(self) -> &'static str {
        match self {
            MediaKind::Photo => "jpg",
            MediaKind::Video | MediaKind::Animation => "mp4",
            MediaKind::Audio => "mp3",
            MediaKind::Voice => "ogg",
            MediaKind::Document => "bin",
        }
    }
}

/// Size limits of the destination transport.
#[derive(Clone, Copy, Debug)]
pub struct MessengerLimits {
    pub max_message_len: usize,
    /// Body length per chunk; the gap to `max_message_len` leaves room for the prefix.
    pub safe_message_len: usize,
    pub max_caption_len: usize,
}
