use std::{fs, path::{Path, PathBuf}};

use anyhow::{Context, Result};

use crate::domain::records::AlignedData;

/// Reads and writes the aligned dataset file.
pub struct DatasetStore {
    path: PathBuf,
}

impl DatasetStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }

    pub fn save(&self, data: &AlignedData) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Cannot create '{}'", parent.display()))?;
        }
        let json = serde_json::to_string(data)?;
        fs::write(&self.path, json)
            .with_context(|| format!("Cannot write aligned data to '{}'", self.path.display()))?;
        tracing::info!(
            "Saved {} aligned records to '{}'",
            data.records.len(),
            self.path.display()
        );
        Ok(())
    }

    pub fn load(&self) -> Result<AlignedData> {
        let json = fs::read_to_string(&self.path).with_context(|| {
            format!(
                "Cannot read aligned data from '{}'. Have you run 'align' first?",
                self.path.display()
            )
        })?;
        let data: AlignedData = serde_json::from_str(&json)
            .with_context(|| format!("'{}' is not an aligned dataset", self.path.display()))?;
        tracing::info!(
            "Loaded {} aligned records ({} with EEG)",
            data.records.len(),
            data.eeg_count()
        );
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::records::AlignedRecord;

    #[test]
    fn test_save_then_load() {
        let dir  = std::env::temp_dir().join(format!("eeg-kt-store-{}", std::process::id()));
        let store = DatasetStore::new(dir.join("aligned.json"));
        let data = AlignedData {
            band_names: vec!["delta".into()],
            records: vec![AlignedRecord {
                subject: "s1".into(),
                skill:   "add".into(),
                correct: true,
                start:   12.5,
                eeg:     Some(vec![0.25]),
            }],
        };
        store.save(&data).unwrap();
        assert_eq!(store.load().unwrap(), data);
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_missing_file_mentions_align() {
        let store = DatasetStore::new("/definitely/not/here.json");
        let err = store.load().unwrap_err();
        assert!(format!("{err:#}").contains("align"));
    }
}
