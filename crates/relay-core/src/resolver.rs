use std::sync::Arc;

use tracing::{error, info, warn};

use crate::{
    domain::{ChatPair, ContainerId, SourceTopicId},
    errors::ProvisionError,
    fallback::DefaultRoute,
    mapping::MappingStore,
    ports::{ContainerProvisioner, DefaultContainerLookup, TitleLookup},
};

/// Maps source topics to destination containers, provisioning on first use.
///
/// One resolver exists per chat pair. `resolve` takes `&mut self`, so callers
/// must serialise access (the router keeps it behind a mutex); that is what
/// makes provisioning at-most-once per source topic.
pub struct TopicResolver {
    pair: ChatPair,
    store: MappingStore,
    provisioner: Arc<dyn ContainerProvisioner>,
    titles: Arc<dyn TitleLookup>,
    default_route: DefaultRoute,
}

impl TopicResolver {
    pub fn new(
        pair: ChatPair,
        store: MappingStore,
        provisioner: Arc<dyn ContainerProvisioner>,
        titles: Arc<dyn TitleLookup>,
        default_lookup: Arc<dyn DefaultContainerLookup>,
    ) -> Self {
        Self {
            pair,
            store,
            provisioner,
            titles,
            default_route: DefaultRoute::new(default_lookup, pair.destination),
        }
    }

    pub fn store(&self) -> &MappingStore {
        &self.store
    }

    /// Destination container for `topic`, or `None` for the primary surface.
    ///
    /// A mapped topic returns immediately. An unmapped one reuses a same-named
    /// container or creates one; when that fails the destination's default
    /// container is used, and either way the answer is recorded so the topic is
    /// never provisioned twice.
    pub async fn resolve(
        &mut self,
        topic: Option<SourceTopicId>,
        title: Option<&str>,
    ) -> Option<ContainerId> {
        let topic = topic?;
        if let Some(container) = self.store.get(topic) {
            return Some(container);
        }

        let title = match title.map(str::trim).filter(|t| !t.is_empty()) {
            Some(t) => t.to_string(),
            None => self.lookup_title(topic).await,
        };

        match self.provision(&title).await {
            Ok(container) => {
                self.record(topic, container);
                Some(container)
            }
            Err(e) => {
                warn!(topic = %topic, title = %title, error = %e, "failed to provision container");
                let container = self.default_route.container().await?;
                info!(
                    topic = %topic,
                    title = %title,
                    container = %container,
                    "routing topic to default container"
                );
                self.record(topic, container);
                Some(container)
            }
        }
    }

    async fn provision(&self, title: &str) -> Result<ContainerId, ProvisionError> {
        let parent = self.pair.destination;
        if let Some(existing) = self.provisioner.find_existing(parent, title).await? {
            info!(title = %title, container = %existing, "reusing existing container");
            return Ok(existing);
        }
        let created = self.provisioner.create(parent, title).await?;
        info!(title = %title, container = %created, "container created");
        Ok(created)
    }

    async fn lookup_title(&self, topic: SourceTopicId) -> String {
        match self.titles.title(self.pair.source, topic).await {
            Some(t) if !t.trim().is_empty() => t,
            _ => fallback_title(topic),
        }
    }

    fn record(&mut self, topic: SourceTopicId, container: ContainerId) {
        if let Err(e) = self.store.add(topic, container) {
            error!(
                topic = %topic,
                container = %container,
                error = %e,
                "failed to persist topic mapping; kept in memory for this run"
            );
        }
    }
}

/// Title used when neither the event nor the title lookup knows the topic name.
pub fn fallback_title(topic: SourceTopicId) -> String {
    format!("Topic {topic}")
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::{ChatId, SourceTopicId};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    };

    #[derive(Default)]
    pub(crate) struct FakeProvisioner {
        pub existing: Mutex<HashMap<String, ContainerId>>,
        pub created: Mutex<Vec<String>>,
        pub fail_with: Mutex<Option<ProvisionError>>,
        next_id: AtomicUsize,
    }

    impl FakeProvisioner {
        pub fn failing(err: ProvisionError) -> Self {
            let p = Self::default();
            *p.fail_with.lock().unwrap() = Some(err);
            p
        }

        pub fn create_calls(&self) -> usize {
            self.created.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ContainerProvisioner for FakeProvisioner {
        async fn create(
            &self,
            _parent: ChatId,
            title: &str,
        ) -> Result<ContainerId, ProvisionError> {
            // Let other tasks run, as a real network call would.
            tokio::task::yield_now().await;
            self.created.lock().unwrap().push(title.to_string());
            if let Some(e) = self.fail_with.lock().unwrap().clone() {
                return Err(e);
            }
            let id = ContainerId(1000 + self.next_id.fetch_add(1, Ordering::SeqCst) as i64);
            self.existing.lock().unwrap().insert(title.to_string(), id);
            Ok(id)
        }

        async fn find_existing(
            &self,
            _parent: ChatId,
            name: &str,
        ) -> Result<Option<ContainerId>, ProvisionError> {
            Ok(self.existing.lock().unwrap().get(name).copied())
        }
    }

    #[derive(Default)]
    pub(crate) struct FakeDefault {
        pub answer: Option<ContainerId>,
        pub calls: AtomicUsize,
    }

    #[async_trait]
    impl DefaultContainerLookup for FakeDefault {
        async fn get(&self, _parent: ChatId) -> Result<Option<ContainerId>, ProvisionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.answer)
        }
    }

    #[derive(Default)]
    pub(crate) struct FakeTitles {
        pub titles: HashMap<i64, String>,
        pub calls: AtomicUsize,
    }

    #[async_trait]
    impl TitleLookup for FakeTitles {
        async fn title(&self, _source: ChatId, topic: SourceTopicId) -> Option<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.titles.get(&topic.0).cloned()
        }
    }

    pub(crate) fn pair() -> ChatPair {
        ChatPair {
            source: ChatId(-100),
            destination: ChatId(-200),
        }
    }

    fn resolver(
        dir: &std::path::Path,
        provisioner: Arc<FakeProvisioner>,
        titles: Arc<FakeTitles>,
        default: Arc<FakeDefault>,
    ) -> TopicResolver {
        TopicResolver::new(
            pair(),
            MappingStore::load(dir, pair()),
            provisioner,
            titles,
            default,
        )
    }

    #[tokio::test]
    async fn no_topic_means_primary_surface() {
        let dir = tempfile::tempdir().unwrap();
        let prov = Arc::new(FakeProvisioner::default());
        let mut r = resolver(dir.path(), prov.clone(), Default::default(), Default::default());

        assert_eq!(r.resolve(None, Some("General")).await, None);
        assert_eq!(prov.create_calls(), 0);
    }

    #[tokio::test]
    async fn resolve_provisions_once() {
        let dir = tempfile::tempdir().unwrap();
        let prov = Arc::new(FakeProvisioner::default());
        let mut r = resolver(dir.path(), prov.clone(), Default::default(), Default::default());

        let first = r.resolve(Some(SourceTopicId(42)), Some("General")).await;
        let second = r.resolve(Some(SourceTopicId(42)), Some("General")).await;

        assert!(first.is_some());
        assert_eq!(first, second);
        assert_eq!(prov.create_calls(), 1);
        assert_eq!(r.store().get(SourceTopicId(42)), first);
    }

    #[tokio::test]
    async fn mapping_from_previous_run_skips_provisioning() {
        let dir = tempfile::tempdir().unwrap();
        MappingStore::load(dir.path(), pair())
            .add(SourceTopicId(42), ContainerId(77))
            .unwrap();

        let prov = Arc::new(FakeProvisioner::default());
        let mut r = resolver(dir.path(), prov.clone(), Default::default(), Default::default());

        assert_eq!(
            r.resolve(Some(SourceTopicId(42)), Some("General")).await,
            Some(ContainerId(77))
        );
        assert_eq!(prov.create_calls(), 0);
    }

    #[tokio::test]
    async fn same_name_container_is_reused() {
        let dir = tempfile::tempdir().unwrap();
        let prov = Arc::new(FakeProvisioner::default());
        prov.existing
            .lock()
            .unwrap()
            .insert("Announcements".to_string(), ContainerId(9));
        let mut r = resolver(dir.path(), prov.clone(), Default::default(), Default::default());

        let got = r.resolve(Some(SourceTopicId(3)), Some("Announcements")).await;
        assert_eq!(got, Some(ContainerId(9)));
        assert_eq!(prov.create_calls(), 0);
        assert_eq!(r.store().get(SourceTopicId(3)), Some(ContainerId(9)));
    }

    #[tokio::test]
    async fn provisioning_failure_falls_back_to_default_once() {
        let dir = tempfile::tempdir().unwrap();
        let prov = Arc::new(FakeProvisioner::failing(ProvisionError::PermissionDenied(
            "admin required".to_string(),
        )));
        let default = Arc::new(FakeDefault {
            answer: Some(ContainerId(1)),
            ..Default::default()
        });
        let mut r = resolver(dir.path(), prov.clone(), Default::default(), default.clone());

        assert_eq!(
            r.resolve(Some(SourceTopicId(8)), Some("Off-topic")).await,
            Some(ContainerId(1))
        );
        assert_eq!(
            r.resolve(Some(SourceTopicId(8)), Some("Off-topic")).await,
            Some(ContainerId(1))
        );
        assert_eq!(prov.create_calls(), 1);
        assert_eq!(default.calls.load(Ordering::SeqCst), 1);
        assert_eq!(r.store().get(SourceTopicId(8)), Some(ContainerId(1)));
    }

    #[tokio::test]
    async fn default_lookup_is_shared_across_topics() {
        let dir = tempfile::tempdir().unwrap();
        let prov = Arc::new(FakeProvisioner::failing(ProvisionError::NotSupported(
            "not a forum".to_string(),
        )));
        let default = Arc::new(FakeDefault {
            answer: Some(ContainerId(1)),
            ..Default::default()
        });
        let mut r = resolver(dir.path(), prov, Default::default(), default.clone());

        r.resolve(Some(SourceTopicId(1)), Some("a")).await;
        r.resolve(Some(SourceTopicId(2)), Some("b")).await;
        assert_eq!(default.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unresolved_topic_is_not_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let prov = Arc::new(FakeProvisioner::failing(ProvisionError::Other(
            "boom".to_string(),
        )));
        let mut r = resolver(dir.path(), prov.clone(), Default::default(), Default::default());

        assert_eq!(r.resolve(Some(SourceTopicId(5)), Some("x")).await, None);
        assert!(r.store().is_empty());
    }

    #[tokio::test]
    async fn missing_title_uses_lookup_then_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let prov = Arc::new(FakeProvisioner::default());
        let titles = Arc::new(FakeTitles {
            titles: HashMap::from([(10, "Releases".to_string())]),
            ..Default::default()
        });
        let mut r = resolver(dir.path(), prov.clone(), titles.clone(), Default::default());

        r.resolve(Some(SourceTopicId(10)), None).await;
        r.resolve(Some(SourceTopicId(11)), Some("  ")).await;
        // Mapped topics never consult the lookup again.
        r.resolve(Some(SourceTopicId(10)), None).await;

        assert_eq!(
            *prov.created.lock().unwrap(),
            vec!["Releases".to_string(), "Topic 11".to_string()]
        );
        assert_eq!(titles.calls.load(Ordering::SeqCst), 2);
    }
}
