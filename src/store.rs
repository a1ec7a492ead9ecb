use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::errors::AppError;
use crate::medication::Medication;

/// The active medication list, mirrored to a JSON file on every change.
#[derive(Debug)]
pub struct MedicationStore {
    path: PathBuf,
    medications: Vec<Medication>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StoreSummary {
    pub medications: usize,
    pub tubes: usize,
    pub schedules: usize,
}

impl MedicationStore {
    /// Loads the list at `path`. A missing or unreadable file starts an empty list.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let medications = match Self::read(&path) {
            Ok(medications) => {
                info!(
                    "Loaded {} medications from {}",
                    medications.len(),
                    path.display()
                );
                medications
            }
            Err(e) => {
                warn!("Failed to load medications, starting empty: {e}");
                Vec::new()
            }
        };
        Self { path, medications }
    }

    fn read(path: &Path) -> Result<Vec<Medication>, AppError> {
        let data = std::fs::read(path).map_err(|e| AppError::ReadFile {
            path: path.to_owned(),
            source: e,
        })?;
        Ok(serde_json::from_slice(&data)?)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn medications(&self) -> &[Medication] {
        &self.medications
    }

    pub fn is_empty(&self) -> bool {
        self.medications.is_empty()
    }

    pub fn len(&self) -> usize {
        self.medications.len()
    }

    fn insert(&mut self, medication: Medication) {
        // One medication per tube, newest wins
        self.medications.retain(|m| m.tube != medication.tube);
        debug!("Adding {} ({}) as {}", medication.name, medication.id, medication.tube);
        self.medications.push(medication);
    }

    pub fn add(&mut self, medication: Medication) -> Result<(), AppError> {
        self.insert(medication);
        self.save()
    }

    /// Adds several medications with a single write.
    pub fn extend(&mut self, medications: Vec<Medication>) -> Result<(), AppError> {
        for medication in medications {
            self.insert(medication);
        }
        self.save()
    }

    /// `index` is zero-based.
    pub fn remove(&mut self, index: usize) -> Result<Medication, AppError> {
        if index >= self.medications.len() {
            return Err(AppError::NoSuchMedication {
                index: index + 1,
                len: self.medications.len(),
            });
        }
        let removed = self.medications.remove(index);
        self.save()?;
        Ok(removed)
    }

    pub fn clear(&mut self) -> Result<(), AppError> {
        self.medications.clear();
        self.save()
    }

    /// Swaps the whole list, e.g. for a file import.
    pub fn replace_all(&mut self, medications: Vec<Medication>) -> Result<(), AppError> {
        self.medications.clear();
        self.extend(medications)
    }

    pub fn summary(&self) -> StoreSummary {
        let tubes: HashSet<&str> = self.medications.iter().map(|m| m.tube.as_str()).collect();
        StoreSummary {
            medications: self.medications.len(),
            tubes: tubes.len(),
            schedules: self.medications.iter().map(|m| m.schedules.len()).sum(),
        }
    }

    /// Writes through a temp file in the same directory so a crash never leaves half a list.
    pub fn save(&self) -> Result<(), AppError> {
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_owned(),
            _ => PathBuf::from("."),
        };
        if !parent.exists() {
            std::fs::create_dir_all(&parent).map_err(|e| AppError::CreateDir {
                path: parent.clone(),
                source: e,
            })?;
        }
        let write_err = |e: std::io::Error| AppError::WriteFile {
            path: self.path.clone(),
            source: e,
        };
        let json = serde_json::to_vec(&self.medications)?;
        let mut file = NamedTempFile::new_in(&parent).map_err(write_err)?;
        file.write_all(&json).map_err(write_err)?;
        file.persist(&self.path).map_err(|e| write_err(e.error))?;
        debug!(
            "Saved {} medications to {}",
            self.medications.len(),
            self.path.display()
        );
        Ok(())
    }
}

/// Reads a medication list file picked by the user.
pub fn import_file(path: &Path) -> Result<Vec<Medication>, AppError> {
    let data = std::fs::read(path).map_err(|e| AppError::ReadFile {
        path: path.to_owned(),
        source: e,
    })?;
    let medications: Vec<Medication> = serde_json::from_slice(&data)?;
    for medication in &medications {
        medication.validate()?;
    }
    Ok(medications)
}
