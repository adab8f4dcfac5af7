//! Forum topics as destination containers.
//!
//! The Bot API cannot list a chat's topics, so names are learned from the
//! service messages the bot sees (topic created / renamed) and from the
//! topics it creates itself. The [`TopicDirectory`] keeps what was learned for
//! the lifetime of the process.

use std::{collections::HashMap, sync::Mutex};

use async_trait::async_trait;

use teloxide::prelude::*;

use crate::descriptor::ForumTopicServiceExt;

use tracing::{debug, info};

use relay_core::{
    domain::{ChatId, ContainerId, SourceTopicId},
    errors::ProvisionError,
    ports::{ContainerProvisioner, DefaultContainerLookup, TitleLookup},
};

use crate::{error_map::provision_error, with_retry};

/// Names a destination's default topic may carry.
pub const DEFAULT_TOPIC_NAMES: &[&str] = &["general", "geral", "chat geral"];

/// One of the colours Telegram accepts for new topic icons.
const TOPIC_ICON_COLOR: u32 = 0x6FB9F0;

/// Topic names known per chat, keyed by thread id.
#[derive(Default)]
pub struct TopicDirectory {
    inner: Mutex<HashMap<i64, HashMap<i32, String>>>,
}

impl TopicDirectory {
    pub fn record(&self, chat: i64, thread: i32, name: &str) {
        let Ok(mut map) = self.inner.lock() else {
            return;
        };
        let previous = map
            .entry(chat)
            .or_default()
            .insert(thread, name.to_string());
        if previous.as_deref() != Some(name) {
            debug!(chat, thread, name, "topic name learned");
        }
    }

    pub fn name(&self, chat: i64, thread: i32) -> Option<String> {
        let map = self.inner.lock().ok()?;
        map.get(&chat)?.get(&thread).cloned()
    }

    /// Exact name match. The lowest thread id wins when names repeat.
    pub fn find_by_name(&self, chat: i64, name: &str) -> Option<i32> {
        let map = self.inner.lock().ok()?;
        map.get(&chat)?
            .iter()
            .filter(|(_, n)| n.as_str() == name)
            .map(|(id, _)| *id)
            .min()
    }

    /// First topic whose name is any of `names`, ignoring case; earlier names win.
    pub fn find_any(&self, chat: i64, names: &[&str]) -> Option<i32> {
        let map = self.inner.lock().ok()?;
        let topics = map.get(&chat)?;
        names.iter().find_map(|wanted| {
            topics
                .iter()
                .filter(|(_, n)| n.trim().eq_ignore_ascii_case(wanted))
                .map(|(id, _)| *id)
                .min()
        })
    }

    /// Learn topic names from a message: topic service messages and the
    /// topic-creation message a forum post replies to.
    pub fn observe(&self, msg: &Message) {
        let chat = msg.chat.id.0;
        let thread = msg.thread_id.unwrap_or(msg.id.0);

        if let Some(created) = msg.forum_topic_created() {
            self.record(chat, thread, &created.name);
        }
        if let Some(name) = msg.forum_topic_edited().and_then(|e| e.name.as_deref()) {
            self.record(chat, thread, name);
        }
        if let Some(root) = msg.reply_to_message() {
            if let Some(created) = root.forum_topic_created() {
                self.record(chat, root.thread_id.unwrap_or(root.id.0), &created.name);
            }
        }
    }
}

/// Topic provisioning and lookup for the destination forum.
pub struct TelegramTopics {
    bot: Bot,
    directory: std::sync::Arc<TopicDirectory>,
    destination_is_forum: bool,
}

impl TelegramTopics {
    pub fn new(
        bot: Bot,
        directory: std::sync::Arc<TopicDirectory>,
        destination_is_forum: bool,
    ) -> Self {
        Self {
            bot,
            directory,
            destination_is_forum,
        }
    }
}

#[async_trait]
impl ContainerProvisioner for TelegramTopics {
    async fn create(&self, parent: ChatId, title: &str) -> Result<ContainerId, ProvisionError> {
        if !self.destination_is_forum {
            return Err(ProvisionError::NotSupported(format!(
                "chat {parent} does not have topics enabled"
            )));
        }

        let topic = with_retry(|| {
            self.bot.create_forum_topic(
                teloxide::types::ChatId(parent.0),
                title.to_string(),
                TOPIC_ICON_COLOR,
                String::new(),
            )
        })
        .await
        .map_err(|e| provision_error(&e))?;

        self.directory.record(parent.0, topic.message_thread_id, &topic.name);
        info!(chat = %parent, thread = topic.message_thread_id, name = %topic.name, "topic created");
        Ok(ContainerId(i64::from(topic.message_thread_id)))
    }

    async fn find_existing(
        &self,
        parent: ChatId,
        name: &str,
    ) -> Result<Option<ContainerId>, ProvisionError> {
        Ok(self
            .directory
            .find_by_name(parent.0, name)
            .map(|id| ContainerId(i64::from(id))))
    }
}

#[async_trait]
impl DefaultContainerLookup for TelegramTopics {
    async fn get(&self, parent: ChatId) -> Result<Option<ContainerId>, ProvisionError> {
        if !self.destination_is_forum {
            return Ok(None);
        }
        // The directory only knows topics it has seen, so "not seen yet" is
        // not a final answer.
        match self.directory.find_any(parent.0, DEFAULT_TOPIC_NAMES) {
            Some(id) => Ok(Some(ContainerId(i64::from(id)))),
            None => Err(ProvisionError::Other(format!(
                "no default topic seen in chat {parent} yet"
            ))),
        }
    }
}

#[async_trait]
impl TitleLookup for TelegramTopics {
    async fn title(&self, source: ChatId, topic: SourceTopicId) -> Option<String> {
        let thread = i32::try_from(topic.0).ok()?;
        self.directory.name(source.0, thread)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::fallback::DefaultRoute;

    #[test]
    fn records_and_renames() {
        let dir = TopicDirectory::default();
        dir.record(-100, 7, "News");
        assert_eq!(dir.name(-100, 7).as_deref(), Some("News"));
        assert_eq!(dir.name(-200, 7), None);

        dir.record(-100, 7, "Headlines");
        assert_eq!(dir.name(-100, 7).as_deref(), Some("Headlines"));
        assert_eq!(dir.find_by_name(-100, "News"), None);
        assert_eq!(dir.find_by_name(-100, "Headlines"), Some(7));
    }

    #[test]
    fn exact_lookup_prefers_oldest_topic() {
        let dir = TopicDirectory::default();
        dir.record(-100, 30, "Dupes");
        dir.record(-100, 12, "Dupes");
        assert_eq!(dir.find_by_name(-100, "Dupes"), Some(12));
        assert_eq!(dir.find_by_name(-100, "dupes"), None);
    }

    #[test]
    fn default_topic_names_match_case_insensitively() {
        let dir = TopicDirectory::default();
        dir.record(-100, 4, "Chat Geral");
        assert_eq!(dir.find_any(-100, DEFAULT_TOPIC_NAMES), Some(4));

        dir.record(-100, 9, "GENERAL");
        assert_eq!(dir.find_any(-100, DEFAULT_TOPIC_NAMES), Some(9));

        assert_eq!(dir.find_any(-300, DEFAULT_TOPIC_NAMES), None);
    }

    fn topics(directory: std::sync::Arc<TopicDirectory>, forum: bool) -> TelegramTopics {
        TelegramTopics::new(Bot::new("0:test"), directory, forum)
    }

    #[tokio::test]
    async fn unseen_default_topic_is_not_a_final_answer() {
        let directory = std::sync::Arc::new(TopicDirectory::default());
        let topics = std::sync::Arc::new(topics(directory.clone(), true));
        let mut route = DefaultRoute::new(topics.clone(), ChatId(-200));

        assert!(topics.get(ChatId(-200)).await.is_err());
        assert_eq!(route.container().await, None);

        directory.record(-200, 3, "General");
        assert_eq!(route.container().await, Some(ContainerId(3)));
    }

    #[tokio::test]
    async fn non_forum_has_no_default_topic() {
        let directory = std::sync::Arc::new(TopicDirectory::default());
        directory.record(-200, 3, "General");
        let topics = topics(directory, false);

        assert_eq!(topics.get(ChatId(-200)).await, Ok(None));
        assert!(matches!(
            topics.create(ChatId(-200), "News").await,
            Err(ProvisionError::NotSupported(_))
        ));
    }
}
