//! Cross-component checks of the run catalog against the calibration flow.

use emcal_core::common::catalog;
use emcal_core::domain::RunRange;

#[test]
fn explicitly_tabulated_run_500_matches_the_logbook() {
    let config = catalog::lookup(500).expect("run 500 is tabulated");
    assert_eq!(config.energy_units, 1.0);
    assert!(config.has_attenuator);
    assert!(!config.has_filter);
    assert!(!config.is_muon_run);
}

#[test]
fn untabulated_runs_are_absent_everywhere_not_guessed() {
    for run in [0, 100, 368, 528, 561, 696, 99_999] {
        assert!(catalog::lookup(run).is_none(), "run {run} should be absent");
        assert!(catalog::energy_gev(run).is_none());
        assert!(catalog::regression_goal(run).is_none());
        assert!(catalog::run_title(run, None).is_none());
    }
}

#[test]
fn every_8gev_configuration_has_goal_selection_and_windows() {
    // one representative run per 8 GeV configuration
    for (run, goal) in [(375, 2700.0), (500, 1000.0), (585, 1200.0)] {
        let config = catalog::lookup(run).expect("run is tabulated");
        assert_eq!(config.energy_gev(), 8.0);
        assert_eq!(catalog::regression_goal(run), Some(goal));
        assert!(catalog::selection_window(
            config.energy_gev(),
            config.has_attenuator,
            config.has_filter
        )
        .is_some());
        assert!(catalog::fit_window(
            config.energy_gev(),
            config.has_attenuator,
            config.has_filter,
            false
        )
        .is_some());
        assert!(catalog::fit_window(
            config.energy_gev(),
            config.has_attenuator,
            config.has_filter,
            true
        )
        .is_some());
    }
}

#[test]
fn fit_windows_nest_inside_their_data_ranges_for_beam_configs() {
    // every tabulated electron run whose configuration has a window
    let range = RunRange::new(369, 696).expect("valid range");
    for run in range.iter() {
        let Some(config) = catalog::lookup(run) else {
            continue;
        };
        if config.is_muon_run || config.energy_gev() > 100.0 {
            continue;
        }
        let Some(window) =
            catalog::fit_window(config.energy_gev(), config.has_attenuator, config.has_filter, false)
        else {
            continue;
        };
        assert!(
            window.fit_min < window.fit_max,
            "run {run}: inverted fit range"
        );
        // the 16 GeV attenuated entry carries a known transposed data range
        // in the source table; every other window nests inside its data range
        if (config.energy_gev().round() as i32, config.has_attenuator) != (16, true) {
            assert!(
                window.data_min < window.data_max,
                "run {run}: inverted data range"
            );
        }
    }
}

#[test]
fn muon_runs_get_their_mip_windows() {
    let standard = catalog::mip_fit_window(614);
    assert_eq!(
        (standard.data_min, standard.data_max, standard.fit_min, standard.fit_max),
        (100.0, 1100.0, 200.0, 1050.0)
    );
    let bare = catalog::mip_fit_window(655);
    assert_eq!(
        (bare.data_min, bare.data_max, bare.fit_min, bare.fit_max),
        (500.0, 2000.0, 650.0, 1700.0)
    );
}
