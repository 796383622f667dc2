//! The storage collaborator: recording records and the repository seam.

use crate::error::{MemovoxError, Result};
use crate::transcript::TranscriptSegment;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Identifier assigned by the repository on insert.
pub type RecordId = u64;

/// The persisted view of one recording session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingRecord {
    pub name: String,
    pub duration_secs: f32,
    /// Ordered transcript; insertion order is chronological order.
    pub segments: Vec<TranscriptSegment>,
    pub speaker_count: usize,
    /// False while the session is still recording or was aborted.
    pub completed: bool,
}

impl RecordingRecord {
    /// A fresh, in-progress record with the given name.
    pub fn started(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            duration_secs: 0.0,
            segments: Vec::new(),
            speaker_count: 0,
            completed: false,
        }
    }
}

/// Repository seam for recording persistence.
///
/// Query surfaces live with the consuming application; the engine only
/// inserts a record at session start and updates it as the session
/// progresses and finishes.
pub trait StorageRepository: Send {
    /// Persist a new record, returning its id.
    fn insert(&mut self, record: &RecordingRecord) -> Result<RecordId>;

    /// Overwrite an existing record.
    fn update(&mut self, id: RecordId, record: &RecordingRecord) -> Result<()>;
}

/// Share one repository between the orchestrator and an outside observer.
impl<S: StorageRepository> StorageRepository for std::sync::Arc<std::sync::Mutex<S>> {
    fn insert(&mut self, record: &RecordingRecord) -> Result<RecordId> {
        self.lock()
            .map_err(|_| MemovoxError::Storage {
                message: "storage lock poisoned".to_string(),
            })?
            .insert(record)
    }

    fn update(&mut self, id: RecordId, record: &RecordingRecord) -> Result<()> {
        self.lock()
            .map_err(|_| MemovoxError::Storage {
                message: "storage lock poisoned".to_string(),
            })?
            .update(id, record)
    }
}

/// In-memory repository, for tests and embedding without persistence.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    records: Vec<RecordingRecord>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// All stored records in insertion order.
    pub fn records(&self) -> &[RecordingRecord] {
        &self.records
    }

    /// Look up a record by id.
    pub fn get(&self, id: RecordId) -> Option<&RecordingRecord> {
        self.records.get(id as usize)
    }
}

impl StorageRepository for MemoryStorage {
    fn insert(&mut self, record: &RecordingRecord) -> Result<RecordId> {
        self.records.push(record.clone());
        Ok((self.records.len() - 1) as RecordId)
    }

    fn update(&mut self, id: RecordId, record: &RecordingRecord) -> Result<()> {
        match self.records.get_mut(id as usize) {
            Some(slot) => {
                *slot = record.clone();
                Ok(())
            }
            None => Err(MemovoxError::Storage {
                message: format!("no record with id {}", id),
            }),
        }
    }
}

/// JSON-file repository: the whole record list serialized to one file,
/// rewritten on every mutation.
///
/// Suitable for the small record counts of a personal device; anything
/// larger belongs behind a real database in the consuming application.
#[derive(Debug)]
pub struct JsonFileStorage {
    path: PathBuf,
    records: Vec<RecordingRecord>,
}

impl JsonFileStorage {
    /// Open or create the repository file.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let records = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            serde_json::from_str(&contents).map_err(|e| MemovoxError::Storage {
                message: format!("failed to parse {}: {}", path.display(), e),
            })?
        } else {
            Vec::new()
        };
        Ok(Self { path, records })
    }

    /// All stored records in insertion order.
    pub fn records(&self) -> &[RecordingRecord] {
        &self.records
    }

    fn write_out(&self) -> Result<()> {
        let json =
            serde_json::to_string_pretty(&self.records).map_err(|e| MemovoxError::Storage {
                message: format!("failed to serialize records: {}", e),
            })?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

impl StorageRepository for JsonFileStorage {
    fn insert(&mut self, record: &RecordingRecord) -> Result<RecordId> {
        self.records.push(record.clone());
        self.write_out()?;
        Ok((self.records.len() - 1) as RecordId)
    }

    fn update(&mut self, id: RecordId, record: &RecordingRecord) -> Result<()> {
        match self.records.get_mut(id as usize) {
            Some(slot) => {
                *slot = record.clone();
            }
            None => {
                return Err(MemovoxError::Storage {
                    message: format!("no record with id {}", id),
                })
            }
        }
        self.write_out()
    }
}
