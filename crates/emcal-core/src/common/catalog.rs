//! Test-beam run catalog: beam energy and detector configuration per run,
//! plus the validated fit, selection, and regression lookup tables keyed by
//! that configuration.
//!
//! The catalog is immutable after first access. Explicit logbook entries are
//! layered over range-fill defaults, so a tabulated run always wins. Every
//! lookup returns `Option`; an unlisted key is reported to the caller, never
//! silently defaulted, because an unlisted configuration has no validated
//! window.

use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Nominal beam energy corresponding to one energy unit.
pub const BEAM_ENERGY_UNIT_GEV: f64 = 8.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunConfig {
    /// Beam energy as a multiplier of [`BEAM_ENERGY_UNIT_GEV`].
    pub energy_units: f64,
    pub has_attenuator: bool,
    pub has_filter: bool,
    pub is_muon_run: bool,
}

impl RunConfig {
    pub fn energy_gev(&self) -> f64 {
        self.energy_units * BEAM_ENERGY_UNIT_GEV
    }
}

/// Histogram data range and likelihood fit range for one configuration.
///
/// The data range defines the spectrum histogram; the narrower fit range
/// defines the likelihood window. They differ because the raw spectrum
/// carries pedestal and overflow structure the signal model does not cover.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitWindow {
    pub data_min: f64,
    pub data_max: f64,
    pub fit_min: f64,
    pub fit_max: f64,
}

/// MIP peak fit window used for the muon-run gain equalization.
pub type MipFitWindow = FitWindow;

const FIT_MIN_8GEV: f64 = 2850.0;
const FIT_MAX_8GEV: f64 = 3600.0;

type RunEntry = (u32, f64, bool, bool, bool);

// Logbook entries. Runs 380..=491 are filled by the range default below;
// cosmic runs (528, 561, 562, 639) and DAQ-test runs after 696 are absent on
// purpose. Runs 619..=621 are proton runs kept with their logged energy.
const RUN_TABLE: &[RunEntry] = &[
    // no attenuator, no filter
    (369, 1.0, false, false, false),
    (370, 0.5, false, false, false),
    (371, 1.5, false, false, false),
    (372, 2.0, false, false, false),
    (373, 30.0 / 8.0, false, false, false),
    (374, 0.25, false, false, false),
    // attenuator in
    (493, 0.5, true, false, false),
    (494, 0.5, true, false, false),
    (495, 1.0, true, false, false),
    (496, 1.0, true, false, false),
    (500, 1.0, true, false, false),
    (501, 1.0, true, false, false),
    (502, 1.0, true, false, false),
    (503, 1.0, true, false, false),
    (504, 1.0, true, false, false),
    (505, 1.0, true, false, false),
    (506, 1.0, true, false, false),
    (507, 1.0, true, false, false),
    (508, 1.0, true, false, true),
    (509, 1.0, true, false, false),
    (510, 1.0, true, false, false),
    (511, 1.0, true, false, false),
    (512, 1.0, true, false, false),
    (513, 1.0, true, false, false),
    (514, 0.375, true, false, false),
    (515, 0.375, true, false, false),
    (516, 3.75, true, false, false),
    (517, 3.75, true, false, false),
    (521, 3.75, true, false, true),
    (522, 3.75, true, false, true),
    (523, 3.75, true, false, true),
    (525, 3.75, true, false, true),
    (526, 3.75, true, false, true),
    (527, 1.0, true, false, false),
    (529, 0.25, true, false, false),
    (530, 0.25, true, false, false),
    (531, 0.25, true, false, false),
    (532, 1.5, true, false, false),
    (533, 1.5, true, false, false),
    (534, 2.5, true, false, false),
    (535, 2.5, true, false, false),
    (537, 2.5, true, false, false),
    (538, 2.5, true, false, false),
    (540, 30.0 / 8.0, true, false, false),
    (541, 30.0 / 8.0, true, false, false),
    (542, 30.0 / 8.0, true, false, false),
    (543, 30.0 / 8.0, true, false, false),
    (544, 30.0 / 8.0, true, false, false),
    // attenuator out, filter in
    (563, 0.25, false, true, false),
    (564, 0.25, false, true, false),
    (565, 0.25, false, true, false),
    (566, 0.25, false, true, false),
    (567, 0.25, false, true, false),
    (568, 0.5, false, true, false),
    (569, 0.5, false, true, false),
    (570, 0.5, false, true, false),
    (571, 0.5, false, true, false),
    (572, 0.5, false, true, false),
    (573, 0.5, false, true, false),
    (574, 0.5, false, true, false),
    (575, 0.5, false, true, false),
    (576, 0.5, false, true, false),
    (577, 0.5, false, true, false),
    (578, 0.5, false, true, false),
    (579, 0.5, false, true, false),
    (581, 0.5, false, true, false),
    (582, 0.5, false, true, false),
    (583, 0.5, false, true, false),
    (584, 0.5, false, true, false),
    (585, 1.0, false, true, false),
    (586, 1.0, false, true, false),
    (587, 1.0, false, true, false),
    (588, 1.0, false, true, false),
    (589, 1.0, false, true, false),
    (590, 2.0, false, true, false),
    (591, 2.0, false, true, false),
    (592, 2.0, false, true, false),
    (593, 2.0, false, true, false),
    (594, 2.0, false, true, false),
    (595, 2.5, false, true, false),
    (596, 2.5, false, true, false),
    (597, 2.5, false, true, false),
    (598, 2.5, false, true, false),
    (599, 2.5, false, true, false),
    (600, 2.5, false, true, false),
    (601, 2.5, false, true, false),
    (602, 2.5, false, true, false),
    (604, 3.75, false, true, false),
    (605, 3.75, false, true, false),
    (607, 3.75, false, true, false),
    (609, 3.75, false, true, false),
    (610, 3.75, false, true, false),
    (611, 3.75, false, true, false),
    (612, 3.75, false, true, false),
    (614, 3.75, false, true, true),
    (615, 3.75, false, true, true),
    (616, 3.75, false, true, true),
    (617, 3.75, false, true, true),
    (618, 3.75, false, true, true),
    (619, 15.0, false, true, false),
    (620, 15.0, false, true, false),
    (621, 15.0, false, true, false),
    // filter out, no attenuator
    (642, 1.0, false, false, false),
    (643, 1.0, false, false, false),
    (644, 1.0, false, false, false),
    (645, 1.0, false, false, false),
    (646, 1.0, false, false, false),
    (647, 1.0, false, false, false),
    (648, 1.0, false, false, false),
    (649, 2.0, false, false, false),
    (650, 2.0, false, false, false),
    (651, 2.0, false, false, false),
    (652, 2.0, false, false, false),
    (653, 2.0, false, false, false),
    (654, 2.0, false, false, false),
    (655, 2.0, false, false, true),
    // attenuator believed back in from 656 (logbook note)
    (656, 0.5, true, false, false),
    (657, 0.5, true, false, false),
    (658, 0.5, true, false, false),
    (659, 0.5, true, false, false),
    (660, 0.5, true, false, false),
    (661, 1.0, true, false, false),
    (662, 1.0, true, false, false),
    (663, 1.0, true, false, false),
    (664, 1.0, true, false, false),
    (665, 1.0, true, false, false),
    (666, 1.5, true, false, false),
    (667, 1.5, true, false, false),
    (668, 1.5, true, false, false),
    (669, 1.5, true, false, false),
    (670, 1.5, true, false, false),
    (671, 2.0, true, false, false),
    (672, 2.0, true, false, false),
    (673, 2.0, true, false, false),
    (674, 2.0, true, false, false),
    (675, 2.0, true, false, false),
    (676, 3.75, true, false, true),
    (677, 3.75, true, false, false),
    (678, 3.75, true, false, false),
    (679, 3.75, true, false, false),
    (680, 3.75, true, false, false),
    (682, 3.75, true, false, false),
    (683, 3.75, true, false, false),
    (684, 3.75, true, false, false),
    (685, 2.5, true, false, false),
    (686, 2.5, true, false, false),
    (687, 2.5, true, false, false),
    (688, 2.5, true, false, false),
    (689, 2.5, true, false, false),
    (690, 2.5, true, false, false),
    (691, 2.5, true, false, false),
    (692, 2.5, true, false, false),
    (693, 2.5, true, false, false),
    (694, 2.5, true, false, false),
    (695, 2.5, true, false, false),
];

const RANGE_FILL_START: u32 = 375;
const RANGE_FILL_END: u32 = 491;

fn catalog() -> &'static BTreeMap<u32, RunConfig> {
    static CATALOG: OnceLock<BTreeMap<u32, RunConfig>> = OnceLock::new();
    CATALOG.get_or_init(|| {
        let mut table = BTreeMap::new();
        // range defaults first, explicit logbook entries layered on top
        for run in RANGE_FILL_START..=RANGE_FILL_END {
            table.insert(
                run,
                RunConfig {
                    energy_units: 1.0,
                    has_attenuator: false,
                    has_filter: false,
                    is_muon_run: false,
                },
            );
        }
        for &(run, energy_units, has_attenuator, has_filter, is_muon_run) in RUN_TABLE {
            table.insert(
                run,
                RunConfig {
                    energy_units,
                    has_attenuator,
                    has_filter,
                    is_muon_run,
                },
            );
        }
        table
    })
}

pub fn lookup(run: u32) -> Option<RunConfig> {
    catalog().get(&run).copied()
}

pub fn energy_gev(run: u32) -> Option<f64> {
    lookup(run).map(|config| config.energy_gev())
}

type WindowKey = (i32, bool, bool);

const FIT_WINDOWS: &[(WindowKey, FitWindow)] = &[
    // bare detector
    ((8, false, false), window(1000.0, 6000.0, FIT_MIN_8GEV, 3800.0)),
    ((4, false, false), window(0.0, 3500.0, 1350.0, 1850.0)),
    ((12, false, false), window(2000.0, 7000.0, 4500.0, 5200.0)),
    ((16, false, false), window(4000.0, 8000.0, 6500.0, 7400.0)),
    ((2, false, false), window(0.0, 2000.0, FIT_MIN_8GEV / 4.0, FIT_MAX_8GEV / 4.0)),
    ((3, false, false), window(0.0, 800.0, FIT_MIN_8GEV / 4.0, FIT_MAX_8GEV / 4.0)),
    ((30, false, false), window(2000.0, 5000.0, 3300.0, 4300.0)),
    // attenuator in
    ((2, true, false), window(0.0, 600.0, 180.0, 350.0)),
    ((3, true, false), window(0.0, 800.0, 330.0, 550.0)),
    ((4, true, false), window(0.0, 1000.0, 400.0, 680.0)),
    ((8, true, false), window(0.0, 1500.0, 950.0, 1250.0)),
    ((12, true, false), window(600.0, 2200.0, 1550.0, 1950.0)),
    ((16, true, false), window(8000.0, 3000.0, 1800.0, 2300.0)),
    ((20, true, false), window(1000.0, 3800.0, 2700.0, 3300.0)),
    ((30, true, false), window(2500.0, 5500.0, 4000.0, 4800.0)),
    // filter in
    ((2, false, true), window(0.0, 600.0, 230.0, 460.0)),
    ((3, false, true), window(0.0, 800.0, 290.0, 430.0)),
    ((4, false, true), window(0.0, 1200.0, 600.0, 950.0)),
    ((8, false, true), window(0.0, 2500.0, 1300.0, 1800.0)),
    ((12, false, true), window(600.0, 2200.0, 1300.0, 1650.0)),
    ((16, false, true), window(1500.0, 4000.0, 2800.0, 3500.0)),
    ((20, false, true), window(2500.0, 5000.0, 3700.0, 4400.0)),
    ((30, false, true), window(3500.0, 8000.0, 5400.0, 6500.0)),
    // proton reference
    ((120, false, false), window(20000.0, 50000.0, 30000.0, 40000.0)),
    ((120, true, false), window(20000.0, 50000.0, 30000.0, 40000.0)),
    ((120, false, true), window(20000.0, 50000.0, 30000.0, 40000.0)),
];

// Windows re-tuned on linear-regression output spectra.
const FIT_WINDOWS_LINEAR_OVERRIDES: &[(WindowKey, FitWindow)] = &[
    ((4, true, false), window(0.0, 1000.0, 400.0, 670.0)),
    ((8, true, false), window(0.0, 1500.0, 800.0, 1200.0)),
    ((3, true, false), window(0.0, 800.0, 300.0, 480.0)),
];

const fn window(data_min: f64, data_max: f64, fit_min: f64, fit_max: f64) -> FitWindow {
    FitWindow {
        data_min,
        data_max,
        fit_min,
        fit_max,
    }
}

fn quantized_key(energy_gev: f64, has_attenuator: bool, has_filter: bool) -> WindowKey {
    (energy_gev.round() as i32, has_attenuator, has_filter)
}

/// Validated spectrum fit window for a configuration, or `None` when the
/// configuration was never tuned. `linear_variant` selects the windows
/// re-tuned on linear-regression output spectra.
pub fn fit_window(
    energy_gev: f64,
    has_attenuator: bool,
    has_filter: bool,
    linear_variant: bool,
) -> Option<FitWindow> {
    let key = quantized_key(energy_gev, has_attenuator, has_filter);
    if linear_variant {
        if let Some(&(_, found)) = FIT_WINDOWS_LINEAR_OVERRIDES
            .iter()
            .find(|(candidate, _)| *candidate == key)
        {
            return Some(found);
        }
    }
    FIT_WINDOWS
        .iter()
        .find(|(candidate, _)| *candidate == key)
        .map(|&(_, found)| found)
}

/// ADC-sum window that keeps the electron-dominated part of the spectrum
/// when building regression samples. Only the 8 GeV configurations were
/// ever validated.
pub fn selection_window(
    energy_gev: f64,
    has_attenuator: bool,
    has_filter: bool,
) -> Option<(f64, f64)> {
    match quantized_key(energy_gev, has_attenuator, has_filter) {
        (8, false, false) => Some((2000.0, 3500.0)),
        (8, true, false) => Some((900.0, 1200.0)),
        (8, false, true) => Some((1000.0, 1450.0)),
        _ => None,
    }
}

/// Target energy (ADC counts) the robust regression drives its predictions
/// toward, keyed by the run's configuration.
pub fn regression_goal(run: u32) -> Option<f64> {
    let config = lookup(run)?;
    match quantized_key(config.energy_gev(), config.has_attenuator, config.has_filter) {
        (8, true, false) => Some(1000.0),
        (8, false, false) => Some(2700.0),
        (8, false, true) => Some(1200.0),
        _ => None,
    }
}

/// Per-channel MIP peak window. Run 655 ran without attenuator or filter, so
/// its MIP peak sits higher than every other muon run's.
pub fn mip_fit_window(run: u32) -> MipFitWindow {
    if run == 655 {
        window(500.0, 2000.0, 650.0, 1700.0)
    } else {
        window(100.0, 1100.0, 200.0, 1050.0)
    }
}

/// Human-readable label for diagnostic artifacts.
pub fn run_title(run: u32, run_end: Option<u32>) -> Option<String> {
    let config = lookup(run)?;
    let mut title = format!("Run {run}");
    if let Some(end) = run_end {
        title.push_str(&format!(" to {end}"));
    }
    title.push_str(&format!(", {} GeV", config.energy_gev()));
    if config.has_attenuator {
        title.push_str(", with attenuator");
    }
    if config.has_filter {
        title.push_str(", with filter");
    }
    if config.is_muon_run {
        title.push_str(", muon run");
    }
    Some(title)
}
