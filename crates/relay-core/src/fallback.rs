use std::sync::Arc;

use tracing::{info, warn};

use crate::{
    domain::{ChatId, ContainerId},
    ports::DefaultContainerLookup,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Cached {
    Unknown,
    Known(Option<ContainerId>),
}

/// Process-wide default container of one destination, queried lazily.
///
/// The first answer (found or not found) is kept for the run. A failed query
/// is not kept, so the next fallback asks again. Lookups that cannot answer
/// yet must therefore fail rather than report "not found".
pub struct DefaultRoute {
    lookup: Arc<dyn DefaultContainerLookup>,
    parent: ChatId,
    cached: Cached,
}

impl DefaultRoute {
    pub fn new(lookup: Arc<dyn DefaultContainerLookup>, parent: ChatId) -> Self {
        Self {
            lookup,
            parent,
            cached: Cached::Unknown,
        }
    }

    pub async fn container(&mut self) -> Option<ContainerId> {
        if let Cached::Known(found) = self.cached {
            return found;
        }

        match self.lookup.get(self.parent).await {
            Ok(found) => {
                match found {
                    Some(id) => info!(container = %id, "default container found"),
                    None => info!(parent = %self.parent, "destination has no default container"),
                }
                self.cached = Cached::Known(found);
                found
            }
            Err(e) => {
                warn!(parent = %self.parent, error = %e, "default container lookup failed");
                None
            }
        }
    }
}
