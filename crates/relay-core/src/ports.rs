//! Capabilities the core consumes from a protocol adapter.
//!
//! Telegram implements all of them in `relay-telegram`; tests substitute fakes.
//! Every failure crosses this boundary as a value, never as a panic.

use async_trait::async_trait;

use crate::{
    domain::{ChatId, ContainerId, SourceTopicId, Target},
    errors::{DeliveryError, ProvisionError},
    messaging::{
        media::TempMedia,
        types::{MediaHandle, MessengerLimits},
    },
};

/// Creates destination containers (forum topics, channels).
#[async_trait]
pub trait ContainerProvisioner: Send + Sync {
    /// Create a container titled `title` inside `parent`.
    async fn create(&self, parent: ChatId, title: &str) -> Result<ContainerId, ProvisionError>;

    /// Find an existing container in `parent` whose name equals `name`.
    async fn find_existing(
        &self,
        parent: ChatId,
        name: &str,
    ) -> Result<Option<ContainerId>, ProvisionError>;
}

/// Locates the destination's default container ("General"-style topic).
#[async_trait]
pub trait DefaultContainerLookup: Send + Sync {
    async fn get(&self, parent: ChatId) -> Result<Option<ContainerId>, ProvisionError>;
}

/// Resolves the human title of a source topic when the event did not carry one.
#[async_trait]
pub trait TitleLookup: Send + Sync {
    async fn title(&self, source: ChatId, topic: SourceTopicId) -> Option<String>;
}

/// Sends payloads to the destination chat.
#[async_trait]
pub trait Deliverer: Send + Sync {
    fn limits(&self) -> MessengerLimits;

    async fn send_text(&self, target: Target, text: &str) -> Result<(), DeliveryError>;

    async fn send_media(
        &self,
        target: Target,
        media: &TempMedia,
        caption: &str,
    ) -> Result<(), DeliveryError>;
}

/// Downloads the media attached to a source message into a scoped temporary file.
#[async_trait]
pub trait MediaSource: Send + Sync {
    async fn fetch(&self, handle: &MediaHandle) -> Result<TempMedia, DeliveryError>;
}
