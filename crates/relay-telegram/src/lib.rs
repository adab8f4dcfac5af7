//! Telegram adapter (teloxide).
//!
//! This crate implements the `relay-core` ports over the Telegram Bot API:
//! delivery and media download in [`TelegramMessenger`], forum-topic
//! provisioning in [`topics::TelegramTopics`].

use std::{
    future::Future,
    path::PathBuf,
    sync::atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;

use teloxide::{net::Download, prelude::*, types::InputFile};

use tokio::{io::AsyncWriteExt, time::sleep};

use tracing::debug;

pub mod descriptor;
pub mod error_map;
pub mod handlers;
pub mod router;
pub mod topics;

use relay_core::{
    domain::Target,
    errors::DeliveryError,
    messaging::{
        media::TempMedia,
        types::{MediaHandle, MediaKind, MessengerLimits},
    },
    ports::{Deliverer, MediaSource},
};

use crate::error_map::delivery_error;

static DOWNLOAD_COUNTER: AtomicUsize = AtomicUsize::new(1);

/// Delivers payloads into one destination chat and downloads source media.
#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
    destination: teloxide::types::ChatId,
    downloads_dir: PathBuf,
    limits: MessengerLimits,
}

impl TelegramMessenger {
    pub fn new(
        bot: Bot,
        destination: relay_core::domain::ChatId,
        downloads_dir: PathBuf,
        limits: MessengerLimits,
    ) -> Self {
        Self {
            bot,
            destination: teloxide::types::ChatId(destination.0),
            downloads_dir,
            limits,
        }
    }

    fn thread_id(target: Target) -> Result<Option<i32>, DeliveryError> {
        match target {
            Target::Primary => Ok(None),
            Target::Container(id) => i32::try_from(id.0).map(Some).map_err(|_| {
                DeliveryError::Other(format!("container id {id} is not a valid thread id"))
            }),
        }
    }
}

/// Run a Telegram request, retrying once when the server asks us to back off.
pub(crate) async fn with_retry<T, Fut>(
    mut op: impl FnMut() -> Fut,
) -> Result<T, teloxide::RequestError>
where
    Fut: std::future::IntoFuture<Output = Result<T, teloxide::RequestError>>,
    Fut::IntoFuture: Send,
{
    const MAX_RETRIES: usize = 1;
    let mut attempts = 0usize;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(teloxide::RequestError::RetryAfter(d)) if attempts < MAX_RETRIES => {
                attempts += 1;
                debug!(delay = ?d, "telegram asked to retry later");
                sleep(d).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[async_trait]
impl Deliverer for TelegramMessenger {
    fn limits(&self) -> MessengerLimits {
        self.limits
    }

    async fn send_text(&self, target: Target, text: &str) -> Result<(), DeliveryError> {
        let thread = Self::thread_id(target)?;
        with_retry(|| {
            let mut req = self.bot.send_message(self.destination, text.to_string());
            if let Some(t) = thread {
                req = req.message_thread_id(t);
            }
            req
        })
        .await
        .map(drop)
        .map_err(|e| delivery_error(&e))
    }

    async fn send_media(
        &self,
        target: Target,
        media: &TempMedia,
        caption: &str,
    ) -> Result<(), DeliveryError> {
        let thread = Self::thread_id(target)?;
        let path = media.path().to_path_buf();

        // Every send_* payload has the same shape; only the method differs.
        macro_rules! send {
            ($method:ident) => {
                with_retry(|| {
                    let mut req = self
                        .bot
                        .$method(self.destination, InputFile::file(path.clone()))
                        .caption(caption.to_string());
                    if let Some(t) = thread {
                        req = req.message_thread_id(t);
                    }
                    req
                })
                .await
                .map(drop)
            };
        }

        let sent = match media.kind() {
            MediaKind::Photo => send!(send_photo),
            MediaKind::Video => send!(send_video),
            MediaKind::Animation => send!(send_animation),
            MediaKind::Audio => send!(send_audio),
            MediaKind::Voice => send!(send_voice),
            MediaKind::Document => send!(send_document),
        };
        sent.map_err(|e| delivery_error(&e))
    }
}

#[async_trait]
impl MediaSource for TelegramMessenger {
    async fn fetch(&self, handle: &MediaHandle) -> Result<TempMedia, DeliveryError> {
        let file = with_retry(|| self.bot.get_file(handle.file_ref.clone()))
            .await
            .map_err(|e| delivery_error(&e))?;

        let ts = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        let n = DOWNLOAD_COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = self.downloads_dir.join(local_file_name(handle, ts, n));

        let bot = self.bot.clone();
        let remote = file.path;
        let media = download_into(path, handle.kind, |mut dst| async move {
            bot.download_file(&remote, &mut dst)
                .await
                .map_err(|e| DeliveryError::Other(format!("media download failed: {e}")))?;
            dst.flush()
                .await
                .map_err(|e| DeliveryError::Other(format!("failed to write media: {e}")))
        })
        .await?;

        debug!(path = %media.path().display(), "media downloaded");
        Ok(media)
    }
}

/// Create `path` and hand the open file to `write`.
///
/// `write` owns the handle, so the file is closed before the returned
/// `TempMedia` (or, on failure, its cleanup) touches it.
pub(crate) async fn download_into<F, Fut>(
    path: PathBuf,
    kind: MediaKind,
    write: F,
) -> Result<TempMedia, DeliveryError>
where
    F: FnOnce(tokio::fs::File) -> Fut,
    Fut: Future<Output = Result<(), DeliveryError>>,
{
    let dst = tokio::fs::File::create(&path)
        .await
        .map_err(|e| DeliveryError::Other(format!("failed to create {}: {e}", path.display())))?;
    // From here on the file is ours to clean up, whatever happens.
    let media = TempMedia::new(path, kind);
    write(dst).await?;
    Ok(media)
}

fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-') {
                ch
            } else {
                '_'
            }
        })
        .collect()
}

/// Unique on-disk name for a download: keeps the original extension when known.
pub(crate) fn local_file_name(handle: &MediaHandle, ts: u128, n: usize) -> String {
    let original = handle
        .file_name
        .as_deref()
        .map(sanitize_filename)
        .unwrap_or_default();

    if let Some((stem, ext)) = original.rsplit_once('.') {
        if !stem.is_empty() && !ext.is_empty() {
            return format!("{stem}_{ts}_{n}.{ext}");
        }
    }

    let kind = format!("{:?}", handle.kind).to_lowercase();
    format!("{kind}_{ts}_{n}.{}", handle.kind.default_extension())
}
