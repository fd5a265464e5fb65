use super::ScaleVector;
use crate::common::geometry::{CHANNEL_COUNT, REFERENCE_CHANNEL};
use crate::common::catalog::MipFitWindow;
use crate::domain::{CalibError, CalibResult};
use crate::modules::spectrum::{fit_spectrum, FitResult, SpectrumFitConfig, SpectrumModel};
use crate::numerics::histogram::Histogram1D;
use tracing::warn;

/// MIP gain-equalization outcome.
///
/// `ratios` holds the raw per-channel location ratios and may contain NaN
/// where a channel's fit was degenerate; `scales` is only present when every
/// channel fit was usable.
#[derive(Debug, Clone)]
pub struct MipOutcome {
    pub ratios: [f64; CHANNEL_COUNT],
    pub scales: Option<ScaleVector>,
    pub channel_fits: Vec<FitResult>,
    pub degenerate_channels: Vec<usize>,
}

/// Equalize channel gains from per-channel MIP spectra: each channel's peak
/// location is fit independently and divided by the reference channel's.
/// No regression, no iteration.
pub fn run_mip_calibration(
    histograms: &[Histogram1D; CHANNEL_COUNT],
    model: SpectrumModel,
    window: MipFitWindow,
) -> CalibResult<MipOutcome> {
    let mut channel_fits = Vec::with_capacity(CHANNEL_COUNT);
    for (channel, histogram) in histograms.iter().enumerate() {
        let config = SpectrumFitConfig {
            model,
            fit_min: window.fit_min,
            fit_max: window.fit_max,
            label: format!("mip_ch{channel:02}"),
        };
        channel_fits.push(fit_spectrum(histogram, &config));
    }

    let reference = &channel_fits[REFERENCE_CHANNEL];
    if !reference.is_usable() || reference.location <= 0.0 {
        return Err(CalibError::computation(
            "CALIB.MIP_REFERENCE",
            format!(
                "reference channel {REFERENCE_CHANNEL} MIP fit is unusable (location {})",
                reference.location
            ),
        ));
    }
    let reference_location = reference.location;

    let mut ratios = [f64::NAN; CHANNEL_COUNT];
    let mut degenerate_channels = Vec::new();
    for (channel, fit) in channel_fits.iter().enumerate() {
        if fit.is_usable() && fit.location > 0.0 {
            ratios[channel] = fit.location / reference_location;
        } else {
            warn!(channel, "MIP fit degenerate; channel left uncalibrated");
            degenerate_channels.push(channel);
        }
    }

    let scales = if degenerate_channels.is_empty() {
        Some(ScaleVector::new(ratios, 0.0)?)
    } else {
        None
    };

    Ok(MipOutcome {
        ratios,
        scales,
        channel_fits,
        degenerate_channels,
    })
}

#[cfg(test)]
mod tests {
    use super::run_mip_calibration;
    use crate::common::catalog::mip_fit_window;
    use crate::common::geometry::REFERENCE_CHANNEL;
    use crate::modules::spectrum::SpectrumModel;
    use crate::numerics::histogram::Histogram1D;

    fn peaked_histogram(mean: f64, sigma: f64) -> Histogram1D {
        let mut histogram = Histogram1D::new(50, 100.0, 1100.0).expect("valid histogram");
        for index in 0..50 {
            let center = histogram.bin_center(index);
            let z = (center - mean) / sigma;
            histogram.fill_weighted(center, (2000.0 * (-0.5 * z * z).exp()).round());
        }
        histogram
    }

    #[test]
    fn ratios_are_relative_to_the_reference_channel() {
        let window = mip_fit_window(614);
        let histograms: [Histogram1D; 16] = std::array::from_fn(|channel| {
            // distinct peak per channel, reference at 500
            let factor = 0.8 + 0.025 * channel as f64;
            let mean = 500.0 * factor / (0.8 + 0.025 * REFERENCE_CHANNEL as f64);
            peaked_histogram(mean, 60.0)
        });
        let outcome = run_mip_calibration(&histograms, SpectrumModel::Gaussian, window)
            .expect("all channels fit");
        let scales = outcome.scales.expect("no degenerate channels");
        assert_eq!(scales.weight(REFERENCE_CHANNEL), 1.0);
        assert_eq!(scales.bias(), 0.0);
        for channel in 0..16 {
            let expected =
                (0.8 + 0.025 * channel as f64) / (0.8 + 0.025 * REFERENCE_CHANNEL as f64);
            assert!(
                (scales.weight(channel) - expected).abs() < 0.02,
                "channel {channel}: weight {} vs expected {expected}",
                scales.weight(channel)
            );
        }
    }

    #[test]
    fn dead_reference_channel_aborts_the_calibration() {
        let window = mip_fit_window(614);
        let histograms: [Histogram1D; 16] = std::array::from_fn(|channel| {
            if channel == REFERENCE_CHANNEL {
                Histogram1D::new(50, 100.0, 1100.0).expect("valid histogram")
            } else {
                peaked_histogram(500.0, 60.0)
            }
        });
        let error = run_mip_calibration(&histograms, SpectrumModel::Gaussian, window)
            .expect_err("reference fit is degenerate");
        assert_eq!(error.placeholder(), "CALIB.MIP_REFERENCE");
    }

    #[test]
    fn dead_non_reference_channel_is_reported_not_fatal() {
        let window = mip_fit_window(614);
        let histograms: [Histogram1D; 16] = std::array::from_fn(|channel| {
            if channel == 3 {
                Histogram1D::new(50, 100.0, 1100.0).expect("valid histogram")
            } else {
                peaked_histogram(500.0, 60.0)
            }
        });
        let outcome = run_mip_calibration(&histograms, SpectrumModel::Gaussian, window)
            .expect("reference channel is alive");
        assert!(outcome.scales.is_none());
        assert_eq!(outcome.degenerate_channels, vec![3]);
        assert!(outcome.ratios[3].is_nan());
        assert!((outcome.ratios[4] - 1.0).abs() < 1.0e-6);
    }
}
