//! YAML-on-disk persistence.
//!
//! Layout, per patient, under the configured data directory:
//!
//! ```text
//! <data_dir>/<p[0..2]>/<p[2..4]>/<patient>/
//!     sections/<section>.yaml
//!     handover.yaml
//! ```
//!
//! Files are written to a temporary sibling and renamed into place, so a reader never sees
//! a partially written section.

use crate::collaborators::{FinalizeAck, PersistenceService, SaveAck};
use crate::config::CoreConfig;
use crate::constants::{HANDOVER_RECORD_FILENAME, SECTIONS_DIR_NAME};
use crate::document::{SectionContent, SectionKind};
use crate::error::{FinalizeError, SyncError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use handover_ids::{ClinicianId, PatientId, Uuid};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;

/// The finalization record written once a handover is confirmed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HandoverRecord {
    pub patient_id: PatientId,
    pub finalized_by: ClinicianId,
    pub finalized_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct FileSectionStore {
    data_dir: PathBuf,
}

impl FileSectionStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn from_config(cfg: &CoreConfig) -> Self {
        Self::new(cfg.data_dir())
    }

    pub fn patient_dir(&self, patient: &PatientId) -> PathBuf {
        patient.sharded_dir(&self.data_dir)
    }

    pub fn section_path(&self, patient: &PatientId, section: SectionKind) -> PathBuf {
        self.patient_dir(patient)
            .join(SECTIONS_DIR_NAME)
            .join(format!("{section}.yaml"))
    }

    fn record_path(&self, patient: &PatientId) -> PathBuf {
        self.patient_dir(patient).join(HANDOVER_RECORD_FILENAME)
    }

    /// Reads a previously saved section, if one exists.
    pub async fn load_section(
        &self,
        patient: &PatientId,
        section: SectionKind,
    ) -> Result<Option<SectionContent>, SyncError> {
        let Some(text) = read_optional(&self.section_path(patient, section)).await? else {
            return Ok(None);
        };
        let content: SectionContent = serde_yaml::from_str(&text)
            .map_err(|e| SyncError::Serialization(e.to_string()))?;
        Ok(Some(content))
    }

    pub async fn load_record(
        &self,
        patient: &PatientId,
    ) -> Result<Option<HandoverRecord>, FinalizeError> {
        let Some(text) = read_optional(&self.record_path(patient)).await? else {
            return Ok(None);
        };
        let record = serde_yaml::from_str(&text)
            .map_err(|e| FinalizeError::Serialization(e.to_string()))?;
        Ok(Some(record))
    }
}

async fn read_optional(path: &Path) -> io::Result<Option<String>> {
    match fs::read_to_string(path).await {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

async fn write_atomic(path: &Path, contents: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    // Unique per write so overlapping saves of one section never share a temp file.
    let tmp = path.with_extension(format!("yaml.{}.tmp", Uuid::new_v4().simple()));
    fs::write(&tmp, contents).await?;
    if let Err(e) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(e);
    }
    Ok(())
}

#[async_trait]
impl PersistenceService for FileSectionStore {
    async fn save_section(
        &self,
        patient: PatientId,
        section: SectionKind,
        content: &SectionContent,
    ) -> Result<SaveAck, SyncError> {
        if content.kind() != section {
            return Err(SyncError::Rejected(format!(
                "content for {} sent as {section}",
                content.kind()
            )));
        }

        let path = self.section_path(&patient, section);
        let yaml =
            serde_yaml::to_string(content).map_err(|e| SyncError::Serialization(e.to_string()))?;

        let changed = read_optional(&path).await?.as_deref() != Some(yaml.as_str());
        if changed {
            write_atomic(&path, &yaml).await?;
            tracing::debug!(patient = %patient, %section, path = %path.display(), "section written");
        }

        Ok(SaveAck {
            saved_at: Utc::now(),
            changed,
        })
    }

    async fn finalize_handover(
        &self,
        patient: PatientId,
        actor: ClinicianId,
    ) -> Result<FinalizeAck, FinalizeError> {
        if let Some(existing) = self.load_record(&patient).await? {
            if existing.finalized_by == actor {
                return Ok(FinalizeAck {
                    finalized_at: existing.finalized_at,
                });
            }
            return Err(FinalizeError::Rejected(format!(
                "handover for {patient} already finalized by {}",
                existing.finalized_by
            )));
        }

        let record = HandoverRecord {
            patient_id: patient,
            finalized_by: actor,
            finalized_at: Utc::now(),
        };
        let yaml = serde_yaml::to_string(&record)
            .map_err(|e| FinalizeError::Serialization(e.to_string()))?;
        write_atomic(&self.record_path(&patient), &yaml).await?;

        Ok(FinalizeAck {
            finalized_at: record.finalized_at,
        })
    }
}
