use std::{collections::HashSet, sync::Arc};

use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::{
    domain::{ChatPair, ContainerId, SourceTopicId, Target},
    errors::DeliveryError,
    messaging::{
        media::TempMedia,
        payload,
        types::{InboundMessageDescriptor, MediaHandle},
    },
    ports::{Deliverer, MediaSource},
    resolver::TopicResolver,
};

/// Where a message went.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RoutingDecision {
    /// Container the message was resolved to; `None` means the primary surface.
    pub destination: Option<ContainerId>,
    /// The container delivery failed and the message was demoted to the primary surface.
    pub use_fallback: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RouteOutcome {
    /// The topic is ignored; nothing was resolved or delivered.
    Suppressed(SourceTopicId),
    /// Neither text nor media; nothing to forward.
    Empty,
    Delivered {
        decision: RoutingDecision,
        parts: usize,
    },
    Failed {
        decision: RoutingDecision,
        error: DeliveryError,
    },
}

/// Routes normalised source messages of one chat pair to the destination.
///
/// The resolver lock is held for the whole handling of a message, so messages
/// of the pair are resolved and delivered strictly one at a time in the order
/// `route` is entered. Routers of different pairs share nothing.
pub struct MessageRouter {
    pair: ChatPair,
    ignored: HashSet<SourceTopicId>,
    resolver: Mutex<TopicResolver>,
    deliverer: Arc<dyn Deliverer>,
    media: Arc<dyn MediaSource>,
}

impl MessageRouter {
    pub fn new(
        pair: ChatPair,
        ignored: impl IntoIterator<Item = SourceTopicId>,
        resolver: TopicResolver,
        deliverer: Arc<dyn Deliverer>,
        media: Arc<dyn MediaSource>,
    ) -> Self {
        Self {
            pair,
            ignored: ignored.into_iter().collect(),
            resolver: Mutex::new(resolver),
            deliverer,
            media,
        }
    }

    pub fn pair(&self) -> ChatPair {
        self.pair
    }

    pub fn is_ignored(&self, topic: Option<SourceTopicId>) -> bool {
        topic.is_some_and(|t| self.ignored.contains(&t))
    }

    /// Resolve and deliver one message. Never fails: every error ends up in the outcome.
    pub async fn route(&self, msg: &InboundMessageDescriptor) -> RouteOutcome {
        if let Some(topic) = msg.source_topic_id.filter(|t| self.ignored.contains(t)) {
            info!(topic = %topic, message_id = msg.message_id.0, "message from ignored topic");
            return RouteOutcome::Suppressed(topic);
        }
        if msg.text_body().is_none() && !msg.has_media() {
            debug!(message_id = msg.message_id.0, "nothing to forward");
            return RouteOutcome::Empty;
        }

        let mut resolver = self.resolver.lock().await;
        let container = resolver
            .resolve(msg.source_topic_id, msg.source_topic_title.as_deref())
            .await;

        let mut delivery = Delivery {
            deliverer: self.deliverer.as_ref(),
            container,
            demoted: false,
        };
        let prefix = payload::sender_prefix(&msg.sender_display_name, msg.is_edit);
        let result = match &msg.media {
            Some(handle) => {
                self.deliver_media(&mut delivery, handle, &prefix, msg.text_body())
                    .await
            }
            None => {
                self.deliver_text(&mut delivery, &prefix, msg.text_body().unwrap_or_default())
                    .await
            }
        };
        drop(resolver);

        let decision = delivery.decision();
        match result {
            Ok(parts) => {
                info!(
                    message_id = msg.message_id.0,
                    sender = %msg.sender_display_name,
                    edited = msg.is_edit,
                    target = %delivery.target(),
                    parts,
                    fallback = decision.use_fallback,
                    "message forwarded"
                );
                RouteOutcome::Delivered { decision, parts }
            }
            Err(error) => {
                error!(
                    message_id = msg.message_id.0,
                    target = %delivery.target(),
                    error = %error,
                    "failed to forward message"
                );
                RouteOutcome::Failed { decision, error }
            }
        }
    }

    async fn deliver_text(
        &self,
        delivery: &mut Delivery<'_>,
        prefix: &str,
        body: &str,
    ) -> Result<usize, DeliveryError> {
        let limits = self.deliverer.limits();
        let chunks =
            payload::text_chunks(prefix, body, limits.safe_message_len, limits.max_message_len);
        for (i, chunk) in chunks.iter().enumerate() {
            match delivery.text(chunk).await {
                Ok(()) => {}
                // Chunks already fit the configured limit; the transport disagrees.
                Err(DeliveryError::TooLarge(reason)) => {
                    warn!(reason = %reason, part = i + 1, "message part too large, sending placeholder");
                    let lead = if i == 0 {
                        prefix
                    } else {
                        payload::CONTINUATION_MARKER
                    };
                    delivery
                        .text(&payload::text_too_large_placeholder(lead))
                        .await?;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(chunks.len())
    }

    async fn deliver_media(
        &self,
        delivery: &mut Delivery<'_>,
        handle: &MediaHandle,
        prefix: &str,
        text: Option<&str>,
    ) -> Result<usize, DeliveryError> {
        let max_caption = self.deliverer.limits().max_caption_len;

        // Text that does not fit a caption follows the media as regular messages.
        let (caption_text, overflow) = match text {
            Some(t) if !payload::caption_fits(prefix, t, max_caption) => (None, Some(t)),
            other => (other, None),
        };
        let caption = payload::caption(prefix, caption_text, max_caption);

        let sent = match self.media.fetch(handle).await {
            // `media` is dropped, and its file removed, when this arm ends.
            Ok(media) => delivery.media(&media, &caption).await,
            Err(e) => Err(e),
        };

        match sent {
            Ok(()) => {}
            Err(DeliveryError::TooLarge(reason)) => {
                warn!(reason = %reason, "media too large, sending placeholder");
                delivery
                    .text(&payload::too_large_placeholder(&caption))
                    .await?;
            }
            Err(e) => return Err(e),
        }

        let mut parts = 1;
        if let Some(body) = overflow {
            parts += self.deliver_text(delivery, prefix, body).await?;
        }
        Ok(parts)
    }
}

/// Target bookkeeping for one message: container first, primary surface after one failure.
struct Delivery<'a> {
    deliverer: &'a dyn Deliverer,
    container: Option<ContainerId>,
    demoted: bool,
}

impl Delivery<'_> {
    fn target(&self) -> Target {
        if self.demoted {
            Target::Primary
        } else {
            Target::from_container(self.container)
        }
    }

    fn decision(&self) -> RoutingDecision {
        RoutingDecision {
            destination: self.container,
            use_fallback: self.demoted,
        }
    }

    fn should_demote(target: Target, err: &DeliveryError) -> bool {
        matches!(target, Target::Container(_)) && err.is_retryable_elsewhere()
    }

    async fn text(&mut self, text: &str) -> Result<(), DeliveryError> {
        let target = self.target();
        match self.deliverer.send_text(target, text).await {
            Err(e) if Self::should_demote(target, &e) => {
                warn!(target = %target, error = %e, "text delivery failed, falling back to primary surface");
                self.demoted = true;
                self.deliverer.send_text(Target::Primary, text).await
            }
            other => other,
        }
    }

    async fn media(&mut self, media: &TempMedia, caption: &str) -> Result<(), DeliveryError> {
        let target = self.target();
        match self.deliverer.send_media(target, media, caption).await {
            Err(e) if Self::should_demote(target, &e) => {
                warn!(target = %target, error = %e, "media delivery failed, falling back to primary surface");
                self.demoted = true;
                self.deliverer
                    .send_media(Target::Primary, media, caption)
                    .await
            }
            other => other,
        }
    }
}
