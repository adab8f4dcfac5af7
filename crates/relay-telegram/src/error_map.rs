//! Classification of Bot API failures into the core's typed errors.
//!
//! Telegram reports most failures as a free-form description ("Bad Request:
//! not enough rights to create a topic"), so classification is by substring.

use relay_core::errors::{DeliveryError, ProvisionError};

#[derive(Debug, PartialEq, Eq)]
enum Failure {
    TooLarge,
    NotSupported,
    PermissionDenied,
    Other,
}

fn classify(description: &str) -> Failure {
    let lower = description.to_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

    if has(&["too big", "too large", "too long", "entity_too_large"]) {
        Failure::TooLarge
    } else if has(&["not a forum", "chat_not_forum", "topics are disabled"]) {
        Failure::NotSupported
    } else if has(&[
        "not enough rights",
        "no rights",
        "admin_required",
        "administrator",
        "forbidden",
        "kicked",
        "not a member",
        "topic_closed",
    ]) {
        Failure::PermissionDenied
    } else {
        Failure::Other
    }
}

pub fn delivery_error(e: &teloxide::RequestError) -> DeliveryError {
    delivery_error_from(&e.to_string())
}

pub fn provision_error(e: &teloxide::RequestError) -> ProvisionError {
    provision_error_from(&e.to_string())
}

fn delivery_error_from(description: &str) -> DeliveryError {
    let msg = format!("telegram error: {description}");
    match classify(description) {
        Failure::TooLarge => DeliveryError::TooLarge(msg),
        Failure::PermissionDenied => DeliveryError::PermissionDenied(msg),
        Failure::NotSupported | Failure::Other => DeliveryError::Other(msg),
    }
}

fn provision_error_from(description: &str) -> ProvisionError {
    let msg = format!("telegram error: {description}");
    match classify(description) {
        Failure::PermissionDenied => ProvisionError::PermissionDenied(msg),
        Failure::NotSupported => ProvisionError::NotSupported(msg),
        Failure::TooLarge | Failure::Other => ProvisionError::Other(msg),
    }
}
