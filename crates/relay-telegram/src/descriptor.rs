//! Normalisation of Telegram messages into [`InboundMessageDescriptor`]s.

use teloxide::types::{ForumTopicCreated, ForumTopicEdited, Message, MessageCommon, MessageKind};

use relay_core::{
    domain::{ChatId, MessageId, SourceTopicId},
    messaging::types::{InboundMessageDescriptor, MediaHandle, MediaKind},
};

/// Forum-topic service accessors missing from this teloxide version.
pub(crate) trait ForumTopicServiceExt {
    fn forum_topic_created(&self) -> Option<&ForumTopicCreated>;
    fn forum_topic_edited(&self) -> Option<&ForumTopicEdited>;
}

impl ForumTopicServiceExt for Message {
    fn forum_topic_created(&self) -> Option<&ForumTopicCreated> {
        match &self.kind {
            MessageKind::ForumTopicCreated(m) => Some(&m.forum_topic_created),
            _ => None,
        }
    }

    fn forum_topic_edited(&self) -> Option<&ForumTopicEdited> {
        match &self.kind {
            MessageKind::ForumTopicEdited(m) => Some(&m.forum_topic_edited),
            _ => None,
        }
    }
}

/// Describe a user message; service messages yield `None`.
pub fn describe(msg: &Message, is_edit: bool) -> Option<InboundMessageDescriptor> {
    let MessageKind::Common(common) = &msg.kind else {
        return None;
    };

    Some(InboundMessageDescriptor {
        source_chat_id: ChatId(msg.chat.id.0),
        message_id: MessageId(msg.id.0),
        sender_display_name: sender_display_name(msg),
        text: msg.text().or_else(|| msg.caption()).map(str::to_string),
        media: media_handle(msg),
        source_topic_id: source_topic(common, msg.thread_id),
        source_topic_title: msg
            .reply_to_message()
            .and_then(|root| root.forum_topic_created())
            .map(|created| created.name.clone()),
        is_edit,
    })
}

/// Only genuine forum posts belong to a topic; `thread_id` alone also marks
/// reply threads in plain supergroups.
fn source_topic(common: &MessageCommon, thread_id: Option<i32>) -> Option<SourceTopicId> {
    topic_of(common.is_topic_message, thread_id)
}

fn topic_of(is_topic_message: bool, thread_id: Option<i32>) -> Option<SourceTopicId> {
    if !is_topic_message {
        return None;
    }
    thread_id.map(|t| SourceTopicId(i64::from(t)))
}

fn sender_display_name(msg: &Message) -> String {
    // Channel posts and anonymous admins speak as a chat.
    if let Some(chat) = msg.sender_chat() {
        return compose_name(None, None, chat.title(), chat.username(), chat.id.0);
    }
    match msg.from() {
        Some(user) => compose_name(
            Some(&user.first_name),
            user.last_name.as_deref(),
            None,
            user.username.as_deref(),
            user.id.0 as i64,
        ),
        None => compose_name(
            None,
            None,
            msg.chat.title(),
            msg.chat.username(),
            msg.chat.id.0,
        ),
    }
}

/// Human name for a sender: first and last name, else the chat title, else
/// the username, else `ID:<id>`.
pub(crate) fn compose_name(
    first: Option<&str>,
    last: Option<&str>,
    title: Option<&str>,
    username: Option<&str>,
    id: i64,
) -> String {
    fn non_blank(s: Option<&str>) -> Option<&str> {
        s.map(str::trim).filter(|s| !s.is_empty())
    }

    let name = [non_blank(first).or(non_blank(title)), non_blank(last)]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ");
    if !name.is_empty() {
        return name;
    }
    match non_blank(username) {
        Some(u) => u.to_string(),
        None => format!("ID:{id}"),
    }
}

fn media_handle(msg: &Message) -> Option<MediaHandle> {
    let handle = |file_ref: &str, file_name: Option<&String>, kind| MediaHandle {
        file_ref: file_ref.to_string(),
        file_name: file_name.cloned(),
        kind,
    };

    // Animations also carry a `document`, so they are checked first.
    if let Some(best) = msg.photo().and_then(|sizes| sizes.last()) {
        return Some(handle(&best.file.id, None, MediaKind::Photo));
    }
    if let Some(a) = msg.animation() {
        return Some(handle(&a.file.id, a.file_name.as_ref(), MediaKind::Animation));
    }
    if let Some(v) = msg.video() {
        return Some(handle(&v.file.id, v.file_name.as_ref(), MediaKind::Video));
    }
    if let Some(a) = msg.audio() {
        return Some(handle(&a.file.id, a.file_name.as_ref(), MediaKind::Audio));
    }
    if let Some(v) = msg.voice() {
        return Some(handle(&v.file.id, None, MediaKind::Voice));
    }
    if let Some(d) = msg.document() {
        return Some(handle(&d.file.id, d.file_name.as_ref(), MediaKind::Document));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_first_and_last_name() {
        assert_eq!(
            compose_name(Some("Ada"), Some("Lovelace"), None, Some("ada"), 1),
            "Ada Lovelace"
        );
        assert_eq!(compose_name(Some("Ada"), Some("  "), None, None, 1), "Ada");
    }

    #[test]
    fn chat_title_stands_in_for_first_name() {
        assert_eq!(
            compose_name(None, None, Some("Release Notes"), Some("notes"), -100),
            "Release Notes"
        );
    }

    #[test]
    fn falls_back_to_username_then_id() {
        assert_eq!(compose_name(Some(""), None, None, Some("ghost"), 5), "ghost");
        assert_eq!(compose_name(None, None, None, None, 5), "ID:5");
        assert_eq!(compose_name(None, None, Some(" "), Some(""), -100), "ID:-100");
    }

    #[test]
    fn only_forum_posts_have_a_topic() {
        assert_eq!(topic_of(true, Some(42)), Some(SourceTopicId(42)));
        assert_eq!(topic_of(false, Some(42)), None);
        assert_eq!(topic_of(true, None), None);
    }
}
