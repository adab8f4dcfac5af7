use std::{
    collections::{BTreeMap, HashMap},
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::{
    domain::{ChatPair, ContainerId, SourceTopicId},
    errors::PersistenceError,
};

/// On-disk shape: ids as decimal strings.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(transparent)]
struct MappingFile(BTreeMap<String, String>);

/// Durable source-topic → destination-container map for one chat pair.
///
/// On disk this is a flat JSON object with string keys and string values
/// (`{"42": "1007"}`). The format is shared with earlier deployments, so it must not change.
#[derive(Debug)]
pub struct MappingStore {
    path: PathBuf,
    entries: HashMap<SourceTopicId, ContainerId>,
}

impl MappingStore {
    /// File name for a pair inside the mappings directory.
    pub fn file_path(dir: &Path, pair: ChatPair) -> PathBuf {
        dir.join(format!(
            "topic_mapping_{}_{}.json",
            pair.source, pair.destination
        ))
    }

    /// Load the map for `pair`, or start empty.
    ///
    /// A missing file is normal. An unreadable or malformed file is logged and
    /// replaced by an empty map: the store is a cache of provisioning results,
    /// not the source of truth.
    pub fn load(dir: &Path, pair: ChatPair) -> Self {
        let path = Self::file_path(dir, pair);
        let entries = match read_entries(&path) {
            Ok(Some(entries)) => {
                info!(path = %path.display(), topics = entries.len(), "topic mapping loaded");
                entries
            }
            Ok(None) => HashMap::new(),
            Err(e) => {
                error!(path = %path.display(), error = %e, "failed to load topic mapping, starting empty");
                HashMap::new()
            }
        };
        Self { path, entries }
    }

    pub fn get(&self, topic: SourceTopicId) -> Option<ContainerId> {
        self.entries.get(&topic).copied()
    }

    /// Insert and persist before returning.
    ///
    /// The in-memory entry is kept even when the write fails; the error goes back to the caller.
    pub fn add(
        &mut self,
        topic: SourceTopicId,
        container: ContainerId,
    ) -> Result<(), PersistenceError> {
        self.entries.insert(topic, container);
        self.save()?;
        info!(topic = %topic, container = %container, "topic mapping added");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self) -> Result<(), PersistenceError> {
        let file = MappingFile(
            self.entries
                .iter()
                .map(|(k, v)| (k.0.to_string(), v.0.to_string()))
                .collect(),
        );
        let txt = serde_json::to_string(&file)?;

        let io_err = |source| PersistenceError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).map_err(io_err)?;
        }

        // Write-then-rename so a crash never leaves a half-written map behind.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, txt).map_err(io_err)?;
        fs::rename(&tmp, &self.path).map_err(io_err)?;
        Ok(())
    }
}

fn read_entries(path: &Path) -> crate::Result<Option<HashMap<SourceTopicId, ContainerId>>> {
    if !path.exists() {
        return Ok(None);
    }
    let txt = fs::read_to_string(path)?;
    if txt.trim().is_empty() {
        return Ok(None);
    }
    let MappingFile(raw) = serde_json::from_str(&txt)?;

    let mut out = HashMap::with_capacity(raw.len());
    for (k, v) in raw {
        let (Ok(topic), Ok(container)) = (k.trim().parse::<i64>(), v.trim().parse::<i64>()) else {
            return Err(crate::Error::InvalidData {
                path: path.to_path_buf(),
                reason: format!("non-integer mapping entry {k:?}: {v:?}"),
            });
        };
        out.insert(SourceTopicId(topic), ContainerId(container));
    }
    Ok(Some(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ChatId;

    fn pair() -> ChatPair {
        ChatPair {
            source: ChatId(-1001),
            destination: ChatId(-1002),
        }
    }

    #[test]
    fn file_name_is_derived_from_pair() {
        let p = MappingStore::file_path(Path::new("/m"), pair());
        assert_eq!(p, PathBuf::from("/m/topic_mapping_-1001_-1002.json"));
    }

    #[test]
    fn add_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = MappingStore::load(dir.path(), pair());
        assert!(store.is_empty());

        store.add(SourceTopicId(5), ContainerId(100)).unwrap();

        let reloaded = MappingStore::load(dir.path(), pair());
        assert_eq!(reloaded.get(SourceTopicId(5)), Some(ContainerId(100)));
        assert_eq!(reloaded.len(), 1);
    }

    #[test]
    fn writes_string_encoded_flat_object() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = MappingStore::load(dir.path(), pair());
        store
            .add(SourceTopicId(9_007_199_254_740_993), ContainerId(-7))
            .unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(
            raw,
            serde_json::json!({ "9007199254740993": "-7" }),
            "large ids must round-trip without float coercion"
        );
    }

    #[test]
    fn reads_existing_file_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = MappingStore::file_path(dir.path(), pair());
        fs::write(&path, r#"{"42": "1007", "3": "12"}"#).unwrap();

        let store = MappingStore::load(dir.path(), pair());
        assert_eq!(store.get(SourceTopicId(42)), Some(ContainerId(1007)));
        assert_eq!(store.get(SourceTopicId(3)), Some(ContainerId(12)));
        assert_eq!(store.get(SourceTopicId(4)), None);
    }

    #[test]
    fn malformed_file_resets_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = MappingStore::file_path(dir.path(), pair());

        fs::write(&path, "{not json").unwrap();
        assert!(MappingStore::load(dir.path(), pair()).is_empty());

        fs::write(&path, r#"{"42": "abc"}"#).unwrap();
        assert!(MappingStore::load(dir.path(), pair()).is_empty());
    }

    #[test]
    fn non_integer_entry_is_reported_as_invalid_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = MappingStore::file_path(dir.path(), pair());
        fs::write(&path, r#"{"42": "1007", "7": "seven"}"#).unwrap();

        let err = read_entries(&path).unwrap_err();
        assert!(
            matches!(&err, crate::Error::InvalidData { path: p, reason } if *p == path && reason.contains("seven")),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn failed_write_keeps_memory_entry() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where the mappings directory should be makes every write fail.
        let blocker = dir.path().join("blocked");
        fs::write(&blocker, "").unwrap();

        let mut store = MappingStore::load(&blocker, pair());
        let err = store.add(SourceTopicId(1), ContainerId(2)).unwrap_err();
        assert!(matches!(err, PersistenceError::Io { .. }));
        assert_eq!(store.get(SourceTopicId(1)), Some(ContainerId(2)));
    }

    #[test]
    fn pairs_do_not_share_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut a = MappingStore::load(dir.path(), pair());
        a.add(SourceTopicId(1), ContainerId(10)).unwrap();

        let other = ChatPair {
            source: ChatId(-1001),
            destination: ChatId(-1003),
        };
        assert!(MappingStore::load(dir.path(), other).get(SourceTopicId(1)).is_none());
    }
}
