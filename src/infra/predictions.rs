use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

/// One scored attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionRow {
    pub subject:     String,
    pub skill:       String,
    pub start:       f64,
    pub correct:     bool,
    pub probability: f32,
}

pub fn write_predictions(path: impl AsRef<Path>, rows: &[PredictionRow]) -> Result<()> {
    let path = path.as_ref();
    let mut w = csv::Writer::from_path(path)
        .with_context(|| format!("Cannot create '{}'", path.display()))?;
    for row in rows {
        w.serialize(row)?;
    }
    w.flush()?;
    tracing::info!("Wrote {} predictions to '{}'", rows.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_and_row() {
        let path = std::env::temp_dir().join(format!("eeg-kt-pred-{}.csv", std::process::id()));
        let rows = vec![PredictionRow {
            subject: "s1".into(), skill: "add".into(), start: 3.0, correct: true, probability: 0.75,
        }];
        write_predictions(&path, &rows).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "subject,skill,start,correct,probability\ns1,add,3.0,true,0.75\n");
        std::fs::remove_file(path).ok();
    }
}
