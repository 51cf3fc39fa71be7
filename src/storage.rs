//! File-backed persistence for vocabulary and node state
//!
//! Each scope (fork or main checkout) is a directory with a `data/`
//! subdirectory holding `terms.json`, `principles.json`, and `rules.json`.
//! Writes go through a temp file in the target directory followed by an
//! atomic rename, so a crash mid-write never leaves a partial snapshot.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::graph::{GraphSnapshot, Origin, Term, TermId, TermKind, TermSet, RESERVED_PREFIX};
use crate::utils::timestamp_secs;

/// Error types for storage operations
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("key not found: {0}")]
    KeyNotFound(String),

    #[error("malformed entry {id} in {file}: {reason}")]
    MalformedEntry {
        file: String,
        id: String,
        reason: String,
    },
}

pub type StorageResult<T> = Result<T, StorageError>;

/// JSON file store rooted at one checkout directory.
pub struct Storage {
    base_path: PathBuf,
}

impl Storage {
    pub fn new(base_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let base_path = base_path.into();
        fs::create_dir_all(&base_path)?;
        Ok(Storage { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let mut path = self.base_path.clone();
        for segment in key.split('/') {
            path.push(segment);
        }
        path
    }

    /// Read and deserialize a value, or `None` when the file is absent.
    pub fn try_get_json<T: DeserializeOwned>(&self, key: &str) -> StorageResult<Option<T>> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(json) => {
                let value = serde_json::from_str(&json)
                    .map_err(|e| StorageError::Serialization(e.to_string()))?;
                Ok(Some(value))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Read and deserialize a value that must exist.
    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> StorageResult<T> {
        self.try_get_json(key)?
            .ok_or_else(|| StorageError::KeyNotFound(key.to_string()))
    }

    /// Serialize and write a value with an atomic replace.
    pub fn put_json<T: Serialize>(&self, key: &str, value: &T) -> StorageResult<()> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(value)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        atomic_write(&path, json.as_bytes())
    }
}

/// Write through a temp file in the destination directory, then rename
/// over the target.
fn atomic_write(path: &Path, data: &[u8]) -> StorageResult<()> {
    let dir = path.parent().ok_or_else(|| {
        StorageError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("{} has no parent directory", path.display()),
        ))
    })?;
    let temp = tempfile::NamedTempFile::new_in(dir)?;
    fs::write(temp.path(), data)?;
    temp.persist(path).map_err(|e| StorageError::Io(e.error))?;
    Ok(())
}

/// On-disk shape of one vocabulary entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct FileEntry {
    definition: String,
    #[serde(default)]
    aligns_with: Vec<TermId>,
    #[serde(default)]
    locked: bool,
}

/// Reserved `@_` entries per data file, preserved verbatim across
/// load/save so fork personalization metadata round-trips losslessly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReservedMeta {
    pub terms: BTreeMap<String, Value>,
    pub principles: BTreeMap<String, Value>,
    pub rules: BTreeMap<String, Value>,
}

impl ReservedMeta {
    fn for_kind(&self, kind: TermKind) -> &BTreeMap<String, Value> {
        match kind {
            TermKind::Term => &self.terms,
            TermKind::Principle => &self.principles,
            TermKind::Rule => &self.rules,
        }
    }

    fn for_kind_mut(&mut self, kind: TermKind) -> &mut BTreeMap<String, Value> {
        match kind {
            TermKind::Term => &mut self.terms,
            TermKind::Principle => &mut self.principles,
            TermKind::Rule => &mut self.rules,
        }
    }
}

/// The snapshot version marker for a main checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotMeta {
    pub version: u64,
    pub updated_at: u64,
}

impl Default for SnapshotMeta {
    fn default() -> Self {
        SnapshotMeta {
            version: 1,
            updated_at: 0,
        }
    }
}

const DATA_DIR: &str = "data";
const SNAPSHOT_META_FILE: &str = "data/snapshot.json";

const KINDS: [TermKind; 3] = [TermKind::Term, TermKind::Principle, TermKind::Rule];

fn data_key(kind: TermKind) -> String {
    format!("{}/{}", DATA_DIR, kind.file_name())
}

/// Load one scope's vocabulary files into a term set, splitting off the
/// reserved metadata entries. Missing files load as empty.
pub fn load_vocabulary(store: &Storage, origin: Origin) -> StorageResult<(TermSet, ReservedMeta)> {
    let mut set = TermSet::new();
    let mut meta = ReservedMeta::default();

    for kind in KINDS {
        let key = data_key(kind);
        let raw: BTreeMap<String, Value> = store.try_get_json(&key)?.unwrap_or_default();
        for (id, value) in raw {
            if id.starts_with(RESERVED_PREFIX) {
                meta.for_kind_mut(kind).insert(id, value);
                continue;
            }
            let term_id = TermId::new(id.clone()).map_err(|e| StorageError::MalformedEntry {
                file: key.clone(),
                id: id.clone(),
                reason: e.to_string(),
            })?;
            let entry: FileEntry =
                serde_json::from_value(value).map_err(|e| StorageError::MalformedEntry {
                    file: key.clone(),
                    id: id.clone(),
                    reason: e.to_string(),
                })?;
            let term = Term {
                id: term_id,
                kind,
                definition: entry.definition,
                aligns_with: entry.aligns_with,
                locked: entry.locked,
                origin,
                revision: 0,
            };
            set.insert(term).map_err(|e| StorageError::MalformedEntry {
                file: key.clone(),
                id,
                reason: e.to_string(),
            })?;
        }
    }

    Ok((set, meta))
}

/// Write one scope's vocabulary back out, regrouping entries by kind and
/// re-attaching the reserved metadata to its original files.
pub fn save_vocabulary(store: &Storage, set: &TermSet, meta: &ReservedMeta) -> StorageResult<()> {
    for kind in KINDS {
        let mut file: BTreeMap<String, Value> = BTreeMap::new();
        for (id, value) in meta.for_kind(kind) {
            file.insert(id.clone(), value.clone());
        }
        for term in set.iter().filter(|t| t.kind == kind) {
            let entry = FileEntry {
                definition: term.definition.clone(),
                aligns_with: term.aligns_with.clone(),
                locked: term.locked,
            };
            let value = serde_json::to_value(&entry)
                .map_err(|e| StorageError::Serialization(e.to_string()))?;
            file.insert(term.id.as_str().to_string(), value);
        }
        store.put_json(&data_key(kind), &file)?;
    }
    Ok(())
}

/// Load the main checkout as a versioned snapshot.
pub fn load_main_snapshot(store: &Storage) -> StorageResult<(GraphSnapshot, ReservedMeta)> {
    let meta: SnapshotMeta = store
        .try_get_json(SNAPSHOT_META_FILE)?
        .unwrap_or_default();
    let (terms, reserved) = load_vocabulary(store, Origin::Main)?;
    Ok((
        GraphSnapshot {
            version: meta.version,
            terms,
        },
        reserved,
    ))
}

/// Persist a main snapshot and its version marker.
pub fn save_main_snapshot(
    store: &Storage,
    snapshot: &GraphSnapshot,
    reserved: &ReservedMeta,
) -> StorageResult<()> {
    save_vocabulary(store, &snapshot.terms, reserved)?;
    store.put_json(
        SNAPSHOT_META_FILE,
        &SnapshotMeta {
            version: snapshot.version,
            updated_at: timestamp_secs(),
        },
    )
}
