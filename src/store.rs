//! Persistence of encoders and models, keyed by dataset.

use anyhow::{Context, Result};
use rmp_serde::encode::write_named;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::time::SystemTime;

/// Which artifact of a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    /// Area/Zone/Time encoder used by the classifier.
    Encoder,
    /// The selected classifier.
    Model,
    /// Encoder over every categorical column.
    FullEncoder,
}

impl ArtifactKind {
    pub fn prefix(self) -> &'static str {
        match self {
            ArtifactKind::Encoder => "ordinal_encoder",
            ArtifactKind::Model => "best_model",
            ArtifactKind::FullEncoder => "label_encoders",
        }
    }

    /// `<prefix>_<dataset>.msgpack`
    pub fn file_name(self, dataset: &str) -> String {
        format!("{}_{dataset}.msgpack", self.prefix())
    }
}

/// Byte storage for artifacts.
pub trait ArtifactStore {
    /// Returns `None` when the artifact has never been written.
    fn get(&self, kind: ArtifactKind, dataset: &str) -> Result<Option<Vec<u8>>>;

    fn put(&mut self, kind: ArtifactKind, dataset: &str, bytes: Vec<u8>) -> Result<()>;

    /// Last write time, when the store tracks one.
    fn modified(&self, _kind: ArtifactKind, _dataset: &str) -> Option<SystemTime> {
        None
    }
}

/// Serializes `value` as named MessagePack and stores it.
pub fn save_artifact<T: Serialize>(
    store: &mut dyn ArtifactStore,
    kind: ArtifactKind,
    dataset: &str,
    value: &T,
) -> Result<()> {
    let mut bytes = Vec::new();
    write_named(&mut bytes, value)
        .with_context(|| format!("failed to serialize {}", kind.file_name(dataset)))?;
    store.put(kind, dataset, bytes)
}

/// Loads and deserializes an artifact; a missing artifact is an error.
pub fn load_artifact<T: DeserializeOwned>(
    store: &dyn ArtifactStore,
    kind: ArtifactKind,
    dataset: &str,
) -> Result<T> {
    let name = kind.file_name(dataset);
    let bytes = store
        .get(kind, dataset)?
        .with_context(|| format!("artifact {name} not found"))?;
    rmp_serde::from_slice(&bytes).with_context(|| format!("failed to deserialize {name}"))
}

/// Artifacts as files in one directory.
#[derive(Debug, Clone)]
pub struct FsStore {
    dir: PathBuf,
}

impl FsStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FsStore { dir: dir.into() }
    }

    pub fn path(&self, kind: ArtifactKind, dataset: &str) -> PathBuf {
        self.dir.join(kind.file_name(dataset))
    }
}

impl ArtifactStore for FsStore {
    fn get(&self, kind: ArtifactKind, dataset: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path(kind, dataset);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("failed to read {}", path.display())),
        }
    }

    fn put(&mut self, kind: ArtifactKind, dataset: &str, bytes: Vec<u8>) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create {}", self.dir.display()))?;
        let path = self.path(kind, dataset);
        fs::write(&path, bytes).with_context(|| format!("failed to write {}", path.display()))
    }

    fn modified(&self, kind: ArtifactKind, dataset: &str) -> Option<SystemTime> {
        self.path(kind, dataset)
            .metadata()
            .and_then(|m| m.modified())
            .ok()
    }
}

/// In-process store, for tests and dry runs.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    items: HashMap<(ArtifactKind, String), Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl ArtifactStore for MemoryStore {
    fn get(&self, kind: ArtifactKind, dataset: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.items.get(&(kind, dataset.to_string())).cloned())
    }

    fn put(&mut self, kind: ArtifactKind, dataset: &str, bytes: Vec<u8>) -> Result<()> {
        self.items.insert((kind, dataset.to_string()), bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::OrdinalEncoder;

    fn encoder() -> OrdinalEncoder {
        OrdinalEncoder::fit(&["Area"], &[vec!["adyar"], vec!["guindy"]]).unwrap()
    }

    #[test]
    fn file_names_follow_artifact_pattern() {
        assert_eq!(
            ArtifactKind::Encoder.file_name("safety_data"),
            "ordinal_encoder_safety_data.msgpack"
        );
        assert_eq!(
            ArtifactKind::Model.file_name("safety_data"),
            "best_model_safety_data.msgpack"
        );
    }

    #[test]
    fn memory_store_round_trip() {
        let mut store = MemoryStore::new();
        save_artifact(&mut store, ArtifactKind::Encoder, "city", &encoder()).unwrap();
        let back: OrdinalEncoder = load_artifact(&store, ArtifactKind::Encoder, "city").unwrap();
        assert_eq!(back, encoder());
        assert_eq!(store.len(), 1);
        assert!(store.get(ArtifactKind::Model, "city").unwrap().is_none());
    }

    #[test]
    fn missing_artifact_names_the_file() {
        let store = MemoryStore::new();
        let err = load_artifact::<OrdinalEncoder>(&store, ArtifactKind::Model, "x").unwrap_err();
        assert!(err.to_string().contains("best_model_x.msgpack"));
    }

    #[test]
    fn fs_store_writes_into_its_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FsStore::new(dir.path().join("artifacts"));
        save_artifact(&mut store, ArtifactKind::Encoder, "blr", &encoder()).unwrap();

        assert!(dir.path().join("artifacts/ordinal_encoder_blr.msgpack").exists());
        assert!(store.modified(ArtifactKind::Encoder, "blr").is_some());
        assert!(store.modified(ArtifactKind::Model, "blr").is_none());
        let back: OrdinalEncoder = load_artifact(&store, ArtifactKind::Encoder, "blr").unwrap();
        assert_eq!(back, encoder());
    }
}
