//! Plot-request artifacts.
//!
//! Rendering is an external concern; the contract here is only "this data,
//! these labels, this output path". Each request is written as a JSON
//! document a plotting tool can consume verbatim.

use crate::domain::{CalibError, CalibResult};
use crate::modules::serialization::write_json_artifact;
use crate::modules::store::ResolutionSummary;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotSeries {
    pub label: String,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub y_errors: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotRequest {
    pub output_name: String,
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub log_y: bool,
    pub series: Vec<PlotSeries>,
}

/// sigma/mu versus beam energy, the headline figure of merit.
pub fn resolution_plot_request(summary: &ResolutionSummary, title: &str) -> PlotRequest {
    PlotRequest {
        output_name: "fit_sigma".to_string(),
        title: title.to_string(),
        x_label: "Energy [GeV]".to_string(),
        y_label: "sigma/mu".to_string(),
        log_y: false,
        series: vec![PlotSeries {
            label: "Data resolution".to_string(),
            x: summary.energies_gev.clone(),
            y: summary.resolutions.clone(),
            y_errors: summary.resolution_errors.clone(),
        }],
    }
}

/// Fitted peak location versus beam energy.
pub fn mean_plot_request(summary: &ResolutionSummary, title: &str) -> PlotRequest {
    PlotRequest {
        output_name: "fit_mean".to_string(),
        title: title.to_string(),
        x_label: "Energy [GeV]".to_string(),
        y_label: "Mean [ADCCount]".to_string(),
        log_y: false,
        series: vec![PlotSeries {
            label: "Data Mean".to_string(),
            x: summary.energies_gev.clone(),
            y: summary.mus.clone(),
            y_errors: summary.mu_errors.clone(),
        }],
    }
}

pub fn write_plot_request(request: &PlotRequest, path: &Path) -> CalibResult<()> {
    write_json_artifact(path, request).map_err(|source| {
        CalibError::internal(
            "IO.PLOT_WRITE",
            format!("failed to write plot request '{}': {source}", path.display()),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::{resolution_plot_request, write_plot_request, PlotRequest};
    use crate::modules::serialization::read_json_artifact;
    use crate::modules::store::ResolutionSummary;
    use tempfile::TempDir;

    fn sample_summary() -> ResolutionSummary {
        ResolutionSummary {
            runs: vec![500, 501],
            energies_gev: vec![8.0, 8.0],
            mus: vec![1120.0, 1118.0],
            mu_errors: vec![2.0, 2.1],
            resolutions: vec![0.061, 0.062],
            resolution_errors: vec![0.002, 0.002],
        }
    }

    #[test]
    fn resolution_request_carries_the_summary_series() {
        let request = resolution_plot_request(&sample_summary(), "Run 500 to 501");
        assert_eq!(request.series.len(), 1);
        assert_eq!(request.series[0].x, vec![8.0, 8.0]);
        assert_eq!(request.y_label, "sigma/mu");
    }

    #[test]
    fn requests_round_trip_through_the_artifact_store() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = temp.path().join("fit_sigma.json");
        let request = resolution_plot_request(&sample_summary(), "Run 500 to 501");
        write_plot_request(&request, &path).expect("write succeeds");
        let reloaded: PlotRequest = read_json_artifact(&path).expect("read succeeds");
        assert_eq!(reloaded, request);
    }
}
