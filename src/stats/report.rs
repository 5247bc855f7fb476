//! Structured run report handed to output sinks.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use thiserror::Error;

use super::RunSummary;
use crate::runner::ProbeResult;

/// Report writing error types.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode report: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Everything one run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub results: Vec<ProbeResult>,
    pub summary: RunSummary,
}

impl RunReport {
    /// Write the report as pretty-printed JSON.
    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> Result<(), ReportError> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, Endpoint};
    use crate::stats::aggregate;

    #[test]
    fn test_write_json_report() {
        let catalog = Catalog::from_groups(vec![(
            "Intune".to_string(),
            vec!["manage.microsoft.com".to_string()],
        )]);
        let endpoint = Endpoint::new("manage.microsoft.com");
        let results = vec![ProbeResult::unreachable("Intune", &endpoint)];
        let report = RunReport {
            started_at: Utc::now(),
            finished_at: Utc::now(),
            summary: aggregate(&catalog, &results),
            results,
        };

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        tokio_test::assert_ok!(report.write_json(&path));

        let text = std::fs::read_to_string(&path).unwrap();
        let written: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(written["results"][0]["status"], "unreachable");
        assert_eq!(written["summary"]["failed_groups"][0], "Intune");
        assert_eq!(written["summary"]["groups"][0]["health"], "degraded");
        assert_eq!(written["summary"]["overall"]["success_rate"], 0.0);
        assert!(written["summary"]["overall"]["latency_ms"]["avg"].is_null());
    }

    #[test]
    fn test_write_to_missing_directory_fails() {
        let report = RunReport {
            started_at: Utc::now(),
            finished_at: Utc::now(),
            results: Vec::new(),
            summary: aggregate(&Catalog::default(), &[]),
        };
        let dir = tempfile::tempdir().unwrap();
        let err = report.write_json(dir.path().join("missing").join("report.json"));
        assert!(matches!(tokio_test::assert_err!(err), ReportError::Io(_)));
    }
}
