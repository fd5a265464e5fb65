//! Flat persistence for calibration results.
//!
//! Scale vectors are stored as an order-significant JSON list of numbers
//! (index = channel, last entry = bias) with no schema versioning; reloads
//! are bit-exact. Resolution summaries and named histogram documents use the
//! same JSON artifact conventions.

use crate::domain::{CalibError, CalibResult};
use crate::modules::serialization::{read_json_artifact, write_json_artifact};
use crate::numerics::histogram::{GridMap, Histogram1D};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

pub fn save_scales(values: &[f64], path: &Path) -> CalibResult<()> {
    write_json_artifact(path, &values.to_vec()).map_err(|source| {
        CalibError::internal(
            "IO.RESULT_WRITE",
            format!("failed to write results '{}': {source}", path.display()),
        )
    })
}

pub fn load_scales(path: &Path) -> CalibResult<Vec<f64>> {
    if !path.exists() {
        return Err(CalibError::missing_data(
            "IO.RESULT_READ",
            format!("results file '{}' does not exist", path.display()),
        ));
    }
    read_json_artifact(path).map_err(|source| {
        CalibError::computation(
            "IO.RESULT_PARSE",
            format!("failed to parse results '{}': {source}", path.display()),
        )
    })
}

/// Resolution-vs-energy table produced by the per-run fit sweep. Columns are
/// parallel and ordered by run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResolutionSummary {
    pub runs: Vec<u32>,
    pub energies_gev: Vec<f64>,
    pub mus: Vec<f64>,
    pub mu_errors: Vec<f64>,
    pub resolutions: Vec<f64>,
    pub resolution_errors: Vec<f64>,
}

pub fn save_resolution_summary(summary: &ResolutionSummary, path: &Path) -> CalibResult<()> {
    write_json_artifact(path, summary).map_err(|source| {
        CalibError::internal(
            "IO.SUMMARY_WRITE",
            format!("failed to write summary '{}': {source}", path.display()),
        )
    })
}

pub fn load_resolution_summary(path: &Path) -> CalibResult<ResolutionSummary> {
    if !path.exists() {
        return Err(CalibError::missing_data(
            "IO.SUMMARY_READ",
            format!("summary file '{}' does not exist", path.display()),
        ));
    }
    read_json_artifact(path).map_err(|source| {
        CalibError::computation(
            "IO.SUMMARY_PARSE",
            format!("failed to parse summary '{}': {source}", path.display()),
        )
    })
}

/// Named histogram and grid-map collection written per run by the apply
/// step and read back by the resolution sweep.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HistogramDocument {
    pub title: String,
    pub histograms: BTreeMap<String, Histogram1D>,
    pub grids: BTreeMap<String, GridMap>,
}

pub fn save_histogram_document(document: &HistogramDocument, path: &Path) -> CalibResult<()> {
    write_json_artifact(path, document).map_err(|source| {
        CalibError::internal(
            "IO.HISTOGRAM_WRITE",
            format!("failed to write histograms '{}': {source}", path.display()),
        )
    })
}

pub fn load_histogram_document(path: &Path) -> CalibResult<HistogramDocument> {
    if !path.exists() {
        return Err(CalibError::missing_data(
            "IO.HISTOGRAM_READ",
            format!("histogram file '{}' does not exist", path.display()),
        ));
    }
    read_json_artifact(path).map_err(|source| {
        CalibError::computation(
            "IO.HISTOGRAM_PARSE",
            format!("failed to parse histograms '{}': {source}", path.display()),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::{
        load_histogram_document, load_scales, save_histogram_document, save_scales,
        HistogramDocument,
    };
    use crate::numerics::histogram::Histogram1D;
    use tempfile::TempDir;

    #[test]
    fn scales_round_trip_exactly() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = temp.path().join("results.json");
        let values = vec![
            1.0,
            0.987654321987654,
            1.0 / 3.0,
            0.0,
            -100.0,
            100.0,
            1.0e-17,
            203.7 / 197.8,
        ];
        save_scales(&values, &path).expect("save succeeds");
        let reloaded = load_scales(&path).expect("load succeeds");
        assert_eq!(values, reloaded);
    }

    #[test]
    fn missing_results_file_is_a_missing_data_error() {
        let temp = TempDir::new().expect("tempdir should be created");
        let error = load_scales(&temp.path().join("absent.json")).expect_err("file is absent");
        assert_eq!(error.placeholder(), "IO.RESULT_READ");
    }

    #[test]
    fn histogram_documents_round_trip_named_entries() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = temp.path().join("Run500.json");
        let mut hcal = Histogram1D::new(40, 0.0, 8000.0).expect("valid histogram");
        hcal.fill_all([1000.0, 1010.0, 990.0]);
        let mut document = HistogramDocument {
            title: "Run 500, 8 GeV, with attenuator".to_string(),
            ..HistogramDocument::default()
        };
        document.histograms.insert("hcal_linear".to_string(), hcal.clone());
        save_histogram_document(&document, &path).expect("save succeeds");
        let reloaded = load_histogram_document(&path).expect("load succeeds");
        assert_eq!(reloaded.title, document.title);
        assert_eq!(reloaded.histograms.get("hcal_linear"), Some(&hcal));
    }
}
