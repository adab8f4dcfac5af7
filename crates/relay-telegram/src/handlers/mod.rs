//! Telegram update handlers.
//!
//! Every message-like update (new or edited, group or channel) goes through
//! [`relay`]: learn topic names from it, drop anything outside the source
//! chat, normalise it and hand it to the core router.

use std::sync::Arc;

use teloxide::{prelude::*, types::Message};

use tracing::debug;

use crate::{descriptor::describe, router::AppState};

pub async fn handle_message(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    relay(&msg, &state, false).await;
    Ok(())
}

pub async fn handle_edited_message(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    relay(&msg, &state, true).await;
    Ok(())
}

async fn relay(msg: &Message, state: &AppState, is_edit: bool) {
    state.directory.observe(msg);

    if msg.chat.id.0 != state.router.pair().source.0 {
        return;
    }
    let Some(descriptor) = describe(msg, is_edit) else {
        return;
    };

    let outcome = state.router.route(&descriptor).await;
    debug!(message = descriptor.message_id.0, ?outcome, "message handled");
}
