use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::error::StoreError;
use crate::graph::StageId;

/// Snapshot of artifacts keyed by name, in a stable order.
pub type Artifacts = BTreeMap<String, Artifact>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    Sequence,
    SequenceIndex,
    Annotation,
    PreAnnotation,
    SpliceSites,
    Transcriptome,
    PreTranscriptome,
    Gentrome,
    Decoys,
    IndexDir,
    /// Basename shared by a family of index files; nothing exists at the path itself.
    IndexPrefix,
    ConfigFile,
    Documentation,
}

/// A named, file-backed output of a stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub name: String,
    pub path: PathBuf,
    pub produced_by: StageId,
    pub kind: ArtifactKind,
}

impl Artifact {
    pub fn new(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        produced_by: StageId,
        kind: ArtifactKind,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            produced_by,
            kind,
        }
    }

    /// Whether the artifact exists on disk.
    ///
    /// Index directories must be non-empty. Index prefixes count as present
    /// once any file in the parent directory starts with the prefix basename.
    pub fn is_materialized(&self) -> bool {
        match self.kind {
            ArtifactKind::IndexDir => std::fs::read_dir(&self.path)
                .map(|mut entries| entries.next().is_some())
                .unwrap_or(false),
            ArtifactKind::IndexPrefix => prefix_materialized(&self.path),
            _ => self.path.exists(),
        }
    }
}

fn prefix_materialized(prefix: &Path) -> bool {
    let (Some(parent), Some(stem)) = (prefix.parent(), prefix.file_name()) else {
        return false;
    };
    let stem = stem.to_string_lossy();

    std::fs::read_dir(parent)
        .map(|entries| {
            entries
                .flatten()
                .any(|entry| entry.file_name().to_string_lossy().starts_with(stem.as_ref()))
        })
        .unwrap_or(false)
}

/// Append-only registry of the artifacts produced during one run.
///
/// Shared by every concurrently running stage. Registration goes through the
/// map's entry API, so concurrent `put`s for one name are serialised and only
/// the first one wins.
#[derive(Debug, Default)]
pub struct ArtifactStore {
    artifacts: DashMap<String, Artifact>,
}

impl ArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, artifact: Artifact) -> Result<(), StoreError> {
        match self.artifacts.entry(artifact.name.clone()) {
            Entry::Occupied(existing) => Err(StoreError::DuplicateArtifact {
                name: artifact.name,
                producer: artifact.produced_by,
                existing: existing.get().produced_by,
            }),
            Entry::Vacant(slot) => {
                log::debug!(
                    "DEBUG [{}]: registered {} -> {}",
                    artifact.produced_by,
                    artifact.name,
                    artifact.path.display()
                );
                slot.insert(artifact);
                Ok(())
            }
        }
    }

    pub fn get(&self, name: &str) -> Result<PathBuf, StoreError> {
        self.artifact(name).map(|artifact| artifact.path)
    }

    pub fn artifact(&self, name: &str) -> Result<Artifact, StoreError> {
        self.artifacts
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| StoreError::UnresolvedArtifact(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.artifacts.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    pub fn snapshot(&self) -> Artifacts {
        self.artifacts
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }
}
