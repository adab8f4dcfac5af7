use std::sync::Arc;

use anyhow::Context;

use teloxide::{
    dispatching::Dispatcher,
    dptree,
    prelude::*,
    types::{Chat, ChatKind, ChatPublic, PublicChatKind, PublicChatSupergroup, Recipient},
};

use tracing::{info, warn};

use relay_core::{
    config::{ChatRef, Config},
    domain::{ChatId, ChatPair},
    mapping::MappingStore,
    messaging::types::MessengerLimits,
    resolver::TopicResolver,
    router::MessageRouter,
};

use crate::handlers;
use crate::topics::{TelegramTopics, TopicDirectory};
use crate::TelegramMessenger;

pub struct AppState {
    pub directory: Arc<TopicDirectory>,
    pub router: MessageRouter,
}

/// A configured chat after asking Telegram about it.
struct ResolvedChat {
    id: ChatId,
    title: String,
    is_forum: bool,
}

async fn resolve_chat(bot: &Bot, chat: &ChatRef) -> anyhow::Result<ResolvedChat> {
    let recipient = match chat {
        ChatRef::Id(id) => Recipient::Id(teloxide::types::ChatId(*id)),
        ChatRef::Username(name) => Recipient::ChannelUsername(name.clone()),
    };
    let resolved = bot
        .get_chat(recipient)
        .await
        .with_context(|| format!("failed to resolve chat {chat}"))?;

    Ok(ResolvedChat {
        id: ChatId(resolved.id.0),
        title: resolved
            .title()
            .or_else(|| resolved.username())
            .unwrap_or("?")
            .to_string(),
        is_forum: is_forum(&resolved),
    })
}

fn is_forum(chat: &Chat) -> bool {
    matches!(
        &chat.kind,
        ChatKind::Public(ChatPublic {
            kind: PublicChatKind::Supergroup(PublicChatSupergroup { is_forum: true, .. }),
            ..
        })
    )
}

pub async fn run_polling(cfg: Arc<Config>) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.telegram_bot_token.clone());

    if let Ok(me) = bot.get_me().await {
        info!(bot = %me.username(), "relay started");
    }

    let source = resolve_chat(&bot, &cfg.source_chat).await?;
    let destination = resolve_chat(&bot, &cfg.destination_chat).await?;
    info!(chat = %source.id, title = %source.title, "source chat");
    info!(chat = %destination.id, title = %destination.title, "destination chat");
    if !destination.is_forum {
        warn!(
            chat = %destination.id,
            "destination has no topics enabled; every message will go to the main chat"
        );
    }

    let pair = ChatPair {
        source: source.id,
        destination: destination.id,
    };
    let limits = MessengerLimits {
        max_message_len: cfg.telegram_message_limit,
        safe_message_len: cfg.telegram_safe_limit,
        max_caption_len: cfg.telegram_caption_limit,
    };

    let directory = Arc::new(TopicDirectory::default());
    let messenger = Arc::new(TelegramMessenger::new(
        bot.clone(),
        destination.id,
        cfg.downloads_dir.clone(),
        limits,
    ));
    let topics = Arc::new(TelegramTopics::new(
        bot.clone(),
        directory.clone(),
        destination.is_forum,
    ));

    let store = MappingStore::load(&cfg.mappings_dir, pair);
    info!(path = %store.path().display(), topics = store.len(), "topic mappings loaded");
    let resolver = TopicResolver::new(pair, store, topics.clone(), topics.clone(), topics);
    let router = MessageRouter::new(
        pair,
        cfg.ignored_topics.iter().copied(),
        resolver,
        messenger.clone(),
        messenger,
    );
    if !cfg.ignored_topics.is_empty() {
        info!(topics = ?cfg.ignored_topics, "ignoring topics");
    }

    let state = Arc::new(AppState { directory, router });

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(handlers::handle_message))
        .branch(Update::filter_edited_message().endpoint(handlers::handle_edited_message))
        .branch(Update::filter_channel_post().endpoint(handlers::handle_message))
        .branch(Update::filter_edited_channel_post().endpoint(handlers::handle_edited_message));

    info!(source = %pair.source, destination = %pair.destination, "relaying messages");
    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .default_handler(|_| async {})
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    info!("relay stopped");
    Ok(())
}
