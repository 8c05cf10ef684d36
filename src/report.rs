// Copyright (c) 2024 PostFinance AG
//
// This software is released under the MIT License.
// https://opensource.org/licenses/MIT

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::ProvisionError;
use crate::mapping::LIST_SEPARATOR;

/// Outcome of provisioning a single input row.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub(crate) struct ProvisionResult {
    pub(crate) upn: String,
    pub(crate) sam: String,
    pub(crate) display: String,
    pub(crate) created: bool,
    pub(crate) groups_added: Vec<String>,
    pub(crate) licenses_assigned: Vec<String>,
    pub(crate) what_if: bool,
    pub(crate) error: Option<String>,
}

#[derive(Debug, Deserialize, PartialEq, Serialize)]
pub(crate) struct JsonReport {
    pub(crate) generated: DateTime<Utc>,
    pub(crate) results: Vec<ProvisionResult>,
}

const CSV_HEADERS: [&str; 8] = [
    "upn",
    "sam",
    "display",
    "created",
    "groups_added",
    "licenses_assigned",
    "what_if",
    "error",
];

/// Flat CSV view of a [`ProvisionResult`]; list fields are `;`-joined.
#[derive(Debug, Serialize)]
struct CsvResultRecord<'a> {
    upn: &'a str,
    sam: &'a str,
    display: &'a str,
    created: bool,
    groups_added: String,
    licenses_assigned: String,
    what_if: bool,
    error: &'a str,
}

impl<'a> From<&'a ProvisionResult> for CsvResultRecord<'a> {
    fn from(result: &'a ProvisionResult) -> Self {
        let separator = LIST_SEPARATOR.to_string();

        CsvResultRecord {
            upn: &result.upn,
            sam: &result.sam,
            display: &result.display,
            created: result.created,
            groups_added: result.groups_added.join(&separator),
            licenses_assigned: result.licenses_assigned.join(&separator),
            what_if: result.what_if,
            error: result.error.as_deref().unwrap_or_default(),
        }
    }
}

pub(crate) fn export_results_csv<W: Write>(
    results: &[ProvisionResult],
    writer: W,
) -> Result<(), csv::Error> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    wtr.write_record(CSV_HEADERS)?;

    for result in results {
        wtr.serialize(CsvResultRecord::from(result))?;
    }

    wtr.flush()?;

    Ok(())
}

pub(crate) fn export_results_json<W: Write>(
    results: &[ProvisionResult],
    generated: DateTime<Utc>,
    writer: W,
) -> Result<(), serde_json::Error> {
    let report = JsonReport {
        generated,
        results: results.to_vec(),
    };

    serde_json::to_writer_pretty(writer, &report)
}

pub(crate) fn write_csv_report(
    results: &[ProvisionResult],
    report_path: &Path,
) -> Result<(), ProvisionError> {
    let file = create_report_file(report_path)?;

    export_results_csv(results, BufWriter::new(file)).map_err(|e| ProvisionError::Report {
        path: report_path.display().to_string(),
        reason: e.to_string(),
    })
}

pub(crate) fn write_json_report(
    results: &[ProvisionResult],
    json_path: &Path,
) -> Result<(), ProvisionError> {
    let file = create_report_file(json_path)?;
    let mut writer = BufWriter::new(file);

    export_results_json(results, Utc::now(), &mut writer)
        .map_err(|e| e.to_string())
        .and_then(|_| writer.flush().map_err(|e| e.to_string()))
        .map_err(|reason| ProvisionError::Report {
            path: json_path.display().to_string(),
            reason,
        })
}

fn create_report_file(path: &Path) -> Result<File, ProvisionError> {
    let report_error = |e: std::io::Error| ProvisionError::Report {
        path: path.display().to_string(),
        reason: e.to_string(),
    };

    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(report_error)?;
    }

    debug!("Writing report to: {}", path.display());

    File::create(path).map_err(report_error)
}
