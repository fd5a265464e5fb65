use super::helpers::{accumulate_events, ensure_dir, load_scale_vector, run_range};
use super::CliError;
use emcal_core::common::geometry::CHANNEL_COUNT;
use emcal_core::common::{catalog, geometry};
use emcal_core::modules::calibration::{
    run_mip_calibration, run_robust_regression, EventMatrix, RobustRegressionConfig, ScaleVector,
};
use emcal_core::modules::diagnostics::{
    mean_plot_request, resolution_plot_request, write_plot_request,
};
use emcal_core::modules::ingest::{ingest_run, read_run_events, write_run_events};
use emcal_core::modules::resolution::{scan_resolution, summarize};
use emcal_core::modules::selection;
use emcal_core::modules::serialization::write_text_artifact;
use emcal_core::modules::spectrum::SpectrumModel;
use emcal_core::modules::store::{
    load_histogram_document, save_histogram_document, save_resolution_summary, save_scales,
    HistogramDocument,
};
use emcal_core::modules::weights::{
    aggregate_weight_maps, ChannelImage, NonlinearWeightModel, SigmoidWeightModel,
};
use emcal_core::numerics::histogram::Histogram1D;
use std::path::PathBuf;
use tracing::{info, warn};

const APPLY_BIN_COUNT: usize = 4000;
const APPLY_DATA_MIN: f64 = 0.0;
const APPLY_DATA_MAX: f64 = 8000.0;

#[derive(clap::Args)]
pub(super) struct RunRangeArgs {
    /// First run of the range (inclusive)
    #[arg(short, long)]
    start: u32,

    /// End of the range (exclusive)
    #[arg(short, long)]
    end: u32,
}

#[derive(Clone, Copy, clap::ValueEnum)]
pub(super) enum FitModelArg {
    Gaussian,
    CrystalBall,
}

impl From<FitModelArg> for SpectrumModel {
    fn from(value: FitModelArg) -> Self {
        match value {
            FitModelArg::Gaussian => SpectrumModel::Gaussian,
            FitModelArg::CrystalBall => SpectrumModel::CrystalBallExponential,
        }
    }
}

#[derive(clap::Args)]
pub(super) struct IngestArgs {
    #[command(flatten)]
    range: RunRangeArgs,

    /// Directory holding Run{N}_list.txt DAQ exports
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// Output directory for per-run event files
    #[arg(long, default_value = "events")]
    events_dir: PathBuf,
}

#[derive(clap::Args)]
pub(super) struct SelectArgs {
    #[command(flatten)]
    range: RunRangeArgs,

    /// Directory holding per-run event files
    #[arg(long, default_value = "events")]
    events_dir: PathBuf,

    /// Output directory for selected event files
    #[arg(long, default_value = "events_selected")]
    selected_dir: PathBuf,
}

#[derive(clap::Args)]
pub(super) struct RegressArgs {
    #[command(flatten)]
    range: RunRangeArgs,

    /// Directory holding selected per-run event files
    #[arg(long, default_value = "events_selected")]
    events_dir: PathBuf,

    /// Output path for the calibration scale list
    #[arg(long, default_value = "results/results.json")]
    out: PathBuf,

    /// Output path for the per-round diagnostic log
    #[arg(long, default_value = "results/regression_rounds.log")]
    rounds_log: PathBuf,

    /// Outlier-rejection round budget
    #[arg(long, default_value_t = 20)]
    rounds: usize,

    /// Optimizer iteration budget per round
    #[arg(long, default_value_t = 4000)]
    max_iterations: usize,
}

#[derive(clap::Args)]
pub(super) struct MipCalibArgs {
    #[command(flatten)]
    range: RunRangeArgs,

    /// Directory holding per-run event files
    #[arg(long, default_value = "events")]
    events_dir: PathBuf,

    /// Output path for the per-channel gain ratio list
    #[arg(long, default_value = "results/mip_calib.json")]
    out: PathBuf,

    /// Peak model fitted to each channel spectrum
    #[arg(long, value_enum, default_value = "gaussian")]
    model: FitModelArg,

    /// Channel spectrum bin count
    #[arg(long, default_value_t = 50)]
    bins: usize,
}

#[derive(clap::Args)]
pub(super) struct ApplyArgs {
    #[command(flatten)]
    range: RunRangeArgs,

    /// Directory holding per-run event files
    #[arg(long, default_value = "events")]
    events_dir: PathBuf,

    /// Output directory for per-run histogram documents
    #[arg(long, default_value = "calibrated")]
    out_dir: PathBuf,

    /// Regression scale list to apply as hcal_linear
    #[arg(long)]
    scales: Option<PathBuf>,

    /// MIP gain ratio list to apply as hcal_mip
    #[arg(long)]
    mip: Option<PathBuf>,

    /// Nonlinear weight model parameters to apply as hcal_weighted
    #[arg(long)]
    weight_model: Option<PathBuf>,
}

#[derive(clap::Args)]
pub(super) struct ResolutionArgs {
    #[command(flatten)]
    range: RunRangeArgs,

    /// Directory holding per-run histogram documents
    #[arg(long, default_value = "calibrated")]
    histograms_dir: PathBuf,

    /// Histogram entry to fit in each document
    #[arg(long, default_value = "hcal_linear")]
    entry: String,

    /// Spectrum model for the resolution fits
    #[arg(long, value_enum, default_value = "gaussian")]
    model: FitModelArg,

    /// Use the fit windows re-tuned on linear-regression spectra
    #[arg(long, action = clap::ArgAction::Set, default_value_t = true)]
    linear_windows: bool,

    /// Output path for the resolution summary table
    #[arg(long, default_value = "results/fitresults.json")]
    out: PathBuf,

    /// Output directory for plot-request documents
    #[arg(long, default_value = "plots")]
    plots_dir: PathBuf,
}

pub(super) fn run_ingest_command(args: IngestArgs) -> Result<i32, CliError> {
    let range = run_range(args.range.start, args.range.end)?;
    ensure_dir(&args.events_dir)?;

    let mut ingested = 0_usize;
    for run in range.iter() {
        match ingest_run(&args.data_dir, &args.events_dir, run) {
            Ok(count) => {
                println!("Run {run}: {count} events");
                ingested += 1;
            }
            Err(error) => warn!(run, %error, "skipping run"),
        }
    }
    println!(
        "Ingested {ingested} of {} runs in [{}, {}).",
        range.len(),
        range.start(),
        range.end()
    );
    Ok(0)
}

pub(super) fn run_select_command(args: SelectArgs) -> Result<i32, CliError> {
    let range = run_range(args.range.start, args.range.end)?;
    ensure_dir(&args.selected_dir)?;

    for run in range.iter() {
        let events = match read_run_events(&args.events_dir, run) {
            Ok(events) => events,
            Err(error) => {
                warn!(run, %error, "skipping run");
                continue;
            }
        };
        let Some(config) = catalog::lookup(run) else {
            warn!(run, "run is not in the catalog; skipping");
            continue;
        };
        let Some((low, high)) = catalog::selection_window(
            config.energy_gev(),
            config.has_attenuator,
            config.has_filter,
        ) else {
            warn!(
                run,
                energy_gev = config.energy_gev(),
                "no selection window for this configuration; skipping"
            );
            continue;
        };

        let sums: Vec<f64> = events.iter().map(|event| event.low_gain_sum()).collect();
        let mask = selection::select(&sums, low, high);
        let selected: Vec<_> = events
            .into_iter()
            .zip(&mask)
            .filter_map(|(event, &keep)| keep.then_some(event))
            .collect();
        let total = mask.len();
        let kept = selected.len();
        write_run_events(&args.selected_dir, run, &selected).map_err(CliError::Compute)?;
        println!(
            "Run {run}: kept {kept} of {total} events (efficiency {:.2})",
            kept as f64 / (total as f64 + 1.0e-3)
        );
    }
    Ok(0)
}

pub(super) fn run_regress_command(args: RegressArgs) -> Result<i32, CliError> {
    let range = run_range(args.range.start, args.range.end)?;
    let target = catalog::regression_goal(range.start()).ok_or_else(|| {
        CliError::Usage(format!(
            "run {} has no regression goal in the catalog",
            range.start()
        ))
    })?;

    let events = accumulate_events(&args.events_dir, range)?;
    info!(events = events.len(), goal = target, "starting robust regression");
    let matrix = EventMatrix::from_records(&events);

    let mut config = RobustRegressionConfig::new(target);
    config.rounds = args.rounds;
    config.max_iterations = args.max_iterations;
    let outcome = run_robust_regression(&matrix, &config).map_err(CliError::Compute)?;

    if let Some(parent) = args.out.parent() {
        ensure_dir(parent)?;
    }
    save_scales(&outcome.scales.to_flat(), &args.out).map_err(CliError::Compute)?;

    if let Some(parent) = args.rounds_log.parent() {
        ensure_dir(parent)?;
    }
    let mut log = String::new();
    for (index, round) in outcome.rounds.iter().enumerate() {
        log.push_str(&format!(
            "round {:>2}: sample {:>6}  mu {:>10.3}  sigma {:>9.3}\n",
            index + 1,
            round.sample_size,
            round.mu,
            round.sigma
        ));
    }
    write_text_artifact(&args.rounds_log, &log).map_err(|source| {
        CliError::Internal(anyhow::anyhow!(
            "failed to write rounds log '{}': {source}",
            args.rounds_log.display()
        ))
    })?;

    let last = outcome.rounds.last().expect("round budget is positive");
    println!(
        "Fitted {} events over {} rounds; final mu {:.2}, sigma {:.2} (sigma/mu {:.4}).",
        matrix.n_events(),
        outcome.rounds.len(),
        last.mu,
        last.sigma,
        last.sigma / last.mu
    );
    println!("Scales: {}", args.out.display());
    Ok(0)
}

pub(super) fn run_mip_calib_command(args: MipCalibArgs) -> Result<i32, CliError> {
    let range = run_range(args.range.start, args.range.end)?;
    let window = catalog::mip_fit_window(range.start());

    let mut histograms: [Histogram1D; CHANNEL_COUNT] = std::array::from_fn(|_| {
        Histogram1D::new(args.bins.max(1), window.data_min, window.data_max)
            .expect("catalog MIP window is a valid histogram range")
    });

    let mut chained = 0_usize;
    for run in range.iter() {
        match catalog::lookup(run) {
            Some(config) if config.is_muon_run => {}
            Some(_) => {
                info!(run, "not a muon run; skipping");
                continue;
            }
            None => {
                warn!(run, "run is not in the catalog; skipping");
                continue;
            }
        }
        let events = match read_run_events(&args.events_dir, run) {
            Ok(events) => events,
            Err(error) => {
                warn!(run, %error, "skipping run");
                continue;
            }
        };
        for event in &events {
            for (channel, histogram) in histograms.iter_mut().enumerate() {
                histogram.fill(f64::from(event.ch_lg[channel]));
            }
        }
        chained += events.len();
    }
    info!(events = chained, "chained muon events");

    let outcome = run_mip_calibration(&histograms, args.model.into(), window)
        .map_err(CliError::Compute)?;
    if !outcome.degenerate_channels.is_empty() {
        warn!(
            channels = ?outcome.degenerate_channels,
            "channels with degenerate MIP fits"
        );
    }
    let scales = outcome.scales.ok_or_else(|| {
        CliError::Compute(emcal_core::domain::CalibError::computation(
            "CALIB.MIP_CHANNELS",
            format!(
                "{} channel(s) failed the MIP fit",
                outcome.degenerate_channels.len()
            ),
        ))
    })?;

    if let Some(parent) = args.out.parent() {
        ensure_dir(parent)?;
    }
    save_scales(&scales.to_flat()[..CHANNEL_COUNT], &args.out).map_err(CliError::Compute)?;
    println!("MIP gain ratios: {}", args.out.display());
    for channel in 0..CHANNEL_COUNT {
        let cell = geometry::position(channel).expect("channel index in range");
        println!(
            "  ch {channel:>2} ({}, {}): {:.4}",
            cell.row,
            cell.col,
            scales.weight(channel)
        );
    }
    Ok(0)
}

pub(super) fn run_apply_command(args: ApplyArgs) -> Result<i32, CliError> {
    let range = run_range(args.range.start, args.range.end)?;
    ensure_dir(&args.out_dir)?;

    let linear = args.scales.as_deref().map(load_scale_vector).transpose()?;
    let mip = args.mip.as_deref().map(load_scale_vector).transpose()?;
    let weight_model = args
        .weight_model
        .as_deref()
        .map(|path| SigmoidWeightModel::load(path).map_err(CliError::Compute))
        .transpose()?;

    for run in range.iter() {
        let events = match read_run_events(&args.events_dir, run) {
            Ok(events) => events,
            Err(error) => {
                warn!(run, %error, "skipping run");
                continue;
            }
        };
        if events.is_empty() {
            warn!(run, "no events; skipping");
            continue;
        }
        let matrix = EventMatrix::from_records(&events);

        let mut document = HistogramDocument {
            title: catalog::run_title(run, None).unwrap_or_else(|| format!("Run {run}")),
            ..HistogramDocument::default()
        };

        let mut add_spectrum = |name: &str, scale_vector: &ScaleVector| {
            let mut histogram =
                Histogram1D::new(APPLY_BIN_COUNT, APPLY_DATA_MIN, APPLY_DATA_MAX)
                    .expect("apply range is a valid histogram range");
            histogram.fill_all(matrix.predict(scale_vector));
            document.histograms.insert(name.to_string(), histogram);
        };

        if let Some(scales) = &linear {
            add_spectrum("hcal_linear", scales);
        }
        if let Some(scales) = &mip {
            add_spectrum("hcal_mip", scales);
        }
        add_spectrum("hcal_unc", &ScaleVector::unit());

        if let Some(model) = &weight_model {
            apply_weight_model(run, model, &matrix, &mut document);
        }

        let out_path = args.out_dir.join(format!("Run{run}.json"));
        save_histogram_document(&document, &out_path).map_err(CliError::Compute)?;
        println!("Run {run}: {} events -> {}", events.len(), out_path.display());
    }
    Ok(0)
}

fn apply_weight_model(
    run: u32,
    model: &SigmoidWeightModel,
    matrix: &EventMatrix,
    document: &mut HistogramDocument,
) {
    let predictions: Vec<_> = (0..matrix.n_events())
        .map(|event| model.infer(&ChannelImage::from_channels(&matrix.row(event))))
        .collect();

    let mut histogram = Histogram1D::new(APPLY_BIN_COUNT, APPLY_DATA_MIN, APPLY_DATA_MAX)
        .expect("apply range is a valid histogram range");
    histogram.fill_all(predictions.iter().map(|prediction| prediction.energy));
    document
        .histograms
        .insert("hcal_weighted".to_string(), histogram);

    // weight maps are averaged over the electron-dominated window only
    let mask = match catalog::lookup(run).and_then(|config| {
        catalog::fit_window(
            config.energy_gev(),
            config.has_attenuator,
            config.has_filter,
            false,
        )
    }) {
        Some(window) => {
            let sums = matrix.row_sums();
            selection::select(&sums, window.fit_min, window.fit_max)
        }
        None => {
            warn!(run, "no fit window; averaging weights over all events");
            vec![true; matrix.n_events()]
        }
    };
    if let Some(map) = aggregate_weight_maps(&predictions, &mask) {
        document.grids.insert("hweights".to_string(), map);
    }
}

pub(super) fn run_resolution_command(args: ResolutionArgs) -> Result<i32, CliError> {
    let range = run_range(args.range.start, args.range.end)?;

    let histograms_dir = args.histograms_dir.clone();
    let entry = args.entry.clone();
    let points = scan_resolution(range, args.model.into(), args.linear_windows, |run| {
        let document = load_histogram_document(&histograms_dir.join(format!("Run{run}.json")))?;
        document.histograms.get(&entry).cloned().ok_or_else(|| {
            emcal_core::domain::CalibError::missing_data(
                "IO.HISTOGRAM_ENTRY",
                format!("run {run} document has no '{entry}' spectrum"),
            )
        })
    });

    let summary = summarize(&points);
    if let Some(parent) = args.out.parent() {
        ensure_dir(parent)?;
    }
    save_resolution_summary(&summary, &args.out).map_err(CliError::Compute)?;

    ensure_dir(&args.plots_dir)?;
    let title = catalog::run_title(range.start(), Some(range.end().saturating_sub(1)))
        .unwrap_or_else(|| format!("Runs [{}, {})", range.start(), range.end()));
    write_plot_request(
        &resolution_plot_request(&summary, &title),
        &args.plots_dir.join("fit_sigma.json"),
    )
    .map_err(CliError::Compute)?;
    write_plot_request(
        &mean_plot_request(&summary, &title),
        &args.plots_dir.join("fit_mean.json"),
    )
    .map_err(CliError::Compute)?;

    println!(
        "Fitted {} of {} runs; summary: {}",
        summary.runs.len(),
        range.len(),
        args.out.display()
    );
    for (index, run) in summary.runs.iter().enumerate() {
        println!(
            "  Run {run}: E = {:>5.1} GeV  mu = {:>10.2} +- {:<8.2} sigma/mu = {:.4} +- {:.4}",
            summary.energies_gev[index],
            summary.mus[index],
            summary.mu_errors[index],
            summary.resolutions[index],
            summary.resolution_errors[index]
        );
    }
    Ok(0)
}
