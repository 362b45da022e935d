//! Intensity-based families: statistics, histogram, intensity-volume
//! histogram and local intensity peaks.

use super::{FeatureBuilder, neighbourhood_offsets};
use crate::error::LibraryError;
use crate::features::{FeatureFamily, FeatureMap};
use crate::imaging::{Mask, Volume, ensure_same_shape};
use std::f64::consts::PI;

fn sorted_values(vol: &Volume) -> Result<Vec<f64>, LibraryError> {
    let mut values = vol.finite_values();
    if values.is_empty() {
        return Err(LibraryError::InvalidInput(
            "the ROI contains no voxels".to_string(),
        ));
    }
    values.sort_by(f64::total_cmp);
    Ok(values)
}

/// Linear-interpolated percentile of sorted data, `p` in [0, 1].
fn percentile(sorted: &[f64], p: f64) -> f64 {
    let position = p * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// The statistics shared by the `stats` and `intensity_histogram` families.
struct Moments {
    mean: f64,
    var: f64,
    skew: f64,
    kurt: f64,
    median: f64,
    min: f64,
    p10: f64,
    p25: f64,
    p75: f64,
    p90: f64,
    max: f64,
    mad: f64,
    rmad: f64,
    medad: f64,
}

impl Moments {
    fn of(sorted: &[f64]) -> Self {
        let mu = mean(sorted);
        let central = |k: i32| mean(&sorted.iter().map(|v| (v - mu).powi(k)).collect::<Vec<_>>());
        let var = central(2);
        let (skew, kurt) = if var > 0.0 {
            (central(3) / var.powf(1.5), central(4) / var.powi(2) - 3.0)
        } else {
            (0.0, 0.0)
        };
        let median = percentile(sorted, 0.5);
        let p10 = percentile(sorted, 0.1);
        let p90 = percentile(sorted, 0.9);
        let robust: Vec<f64> = sorted
            .iter()
            .copied()
            .filter(|v| *v >= p10 && *v <= p90)
            .collect();
        let robust_mean = mean(&robust);
        Self {
            mean: mu,
            var,
            skew,
            kurt,
            median,
            min: sorted[0],
            p10,
            p25: percentile(sorted, 0.25),
            p75: percentile(sorted, 0.75),
            p90,
            max: sorted[sorted.len() - 1],
            mad: mean(&sorted.iter().map(|v| (v - mu).abs()).collect::<Vec<_>>()),
            rmad: mean(&robust.iter().map(|v| (v - robust_mean).abs()).collect::<Vec<_>>()),
            medad: mean(&sorted.iter().map(|v| (v - median).abs()).collect::<Vec<_>>()),
        }
    }

    fn record(&self, features: &mut FeatureBuilder) {
        let cov = if self.mean != 0.0 {
            self.var.sqrt() / self.mean
        } else {
            0.0
        };
        let qcod = if self.p75 + self.p25 != 0.0 {
            (self.p75 - self.p25) / (self.p75 + self.p25)
        } else {
            0.0
        };
        features
            .set("mean", self.mean)
            .set("var", self.var)
            .set("skew", self.skew)
            .set("kurt", self.kurt)
            .set("median", self.median)
            .set("min", self.min)
            .set("p10", self.p10)
            .set("p90", self.p90)
            .set("max", self.max)
            .set("iqr", self.p75 - self.p25)
            .set("range", self.max - self.min)
            .set("mad", self.mad)
            .set("rmad", self.rmad)
            .set("medad", self.medad)
            .set("cov", cov)
            .set("qcod", qcod);
    }
}

pub(super) fn stats(vol_int_re: &Volume) -> Result<FeatureMap, LibraryError> {
    let sorted = sorted_values(vol_int_re)?;
    let mut features = FeatureBuilder::new(FeatureFamily::Stats);
    Moments::of(&sorted).record(&mut features);
    let energy: f64 = sorted.iter().map(|v| v * v).sum();
    features
        .set("energy", energy)
        .set("rms", (energy / sorted.len() as f64).sqrt());
    Ok(features.finish())
}

pub(super) fn intensity_histogram(vol_quant_re: &Volume) -> Result<FeatureMap, LibraryError> {
    let sorted = sorted_values(vol_quant_re)?;
    let levels = sorted[sorted.len() - 1].round().max(1.0) as usize;
    let mut counts = vec![0.0; levels];
    for value in &sorted {
        let level = (value.round() as usize).clamp(1, levels);
        counts[level - 1] += 1.0;
    }
    let total = sorted.len() as f64;
    let probabilities: Vec<f64> = counts.iter().map(|c| c / total).collect();

    let mut features = FeatureBuilder::new(FeatureFamily::IntensityHistogram);
    Moments::of(&sorted).record(&mut features);

    let (mode_index, _) = counts
        .iter()
        .enumerate()
        .fold((0, f64::MIN), |best, (i, &c)| if c > best.1 { (i, c) } else { best });
    let entropy: f64 = probabilities
        .iter()
        .filter(|p| **p > 0.0)
        .map(|p| -p * p.log2())
        .sum();
    let uniformity: f64 = probabilities.iter().map(|p| p * p).sum();

    let gradient: Vec<f64> = (0..levels)
        .map(|i| match (i, levels) {
            (_, 1) => 0.0,
            (0, _) => counts[1] - counts[0],
            (i, n) if i == n - 1 => counts[i] - counts[i - 1],
            (i, _) => (counts[i + 1] - counts[i - 1]) / 2.0,
        })
        .collect();
    let (max_grad_index, max_grad) = gradient
        .iter()
        .enumerate()
        .fold((0, f64::MIN), |best, (i, &g)| if g > best.1 { (i, g) } else { best });
    let (min_grad_index, min_grad) = gradient
        .iter()
        .enumerate()
        .fold((0, f64::MAX), |best, (i, &g)| if g < best.1 { (i, g) } else { best });

    features
        .set("mode", (mode_index + 1) as f64)
        .set("entropy", entropy)
        .set("uniformity", uniformity)
        .set("max_grad", max_grad)
        .set("max_grad_gl", (max_grad_index + 1) as f64)
        .set("min_grad", min_grad)
        .set("min_grad_gl", (min_grad_index + 1) as f64);
    Ok(features.finish())
}

pub(super) fn int_vol_hist(
    vol_quant_re_ivh: &Volume,
    vol_int_re: &Volume,
    wd: f64,
) -> Result<FeatureMap, LibraryError> {
    let values = sorted_values(vol_quant_re_ivh)?;
    let intensities = sorted_values(vol_int_re)?;
    let low = values[0];
    let high = values[values.len() - 1];
    let step = if wd > 0.0 { wd } else { 1.0 };
    let span = intensities[intensities.len() - 1] - intensities[0];

    let steps = ((high - low) / step).round().max(0.0) as usize;
    let levels: Vec<f64> = (0..=steps).map(|k| low + k as f64 * step).collect();
    let n = values.len() as f64;
    let tolerance = step * 1e-6;
    let fractions: Vec<f64> = levels
        .iter()
        .map(|level| values.iter().filter(|v| **v >= level - tolerance).count() as f64 / n)
        .collect();
    let relative: Vec<f64> = levels
        .iter()
        .map(|level| {
            if span > 0.0 {
                ((level - intensities[0]) / span).clamp(0.0, 1.0)
            } else {
                0.0
            }
        })
        .collect();

    let volume_at = |gamma: f64| {
        relative
            .iter()
            .position(|r| *r >= gamma)
            .map_or(0.0, |index| fractions[index])
    };
    let intensity_at = |fraction: f64| {
        fractions
            .iter()
            .position(|f| *f <= fraction)
            .map_or(high + step, |index| levels[index])
    };
    let auc: f64 = relative
        .windows(2)
        .zip(fractions.windows(2))
        .map(|(r, f)| (r[1] - r[0]) * (f[0] + f[1]) / 2.0)
        .sum();

    let v10 = volume_at(0.1);
    let v90 = volume_at(0.9);
    let i10 = intensity_at(0.1);
    let i90 = intensity_at(0.9);
    let mut features = FeatureBuilder::new(FeatureFamily::IntVolHist);
    features
        .set("v10", v10)
        .set("v90", v90)
        .set("i10", i10)
        .set("i90", i90)
        .set("diff_v10_v90", v10 - v90)
        .set("diff_i10_i90", i10 - i90)
        .set("auc", auc);
    Ok(features.finish())
}

/// Mean intensity in a 1 cm³ sphere around the hottest voxel (local) and
/// the highest such mean over the whole ROI (global).
pub(super) fn local_intensity(vol: &Volume, mask: &Mask) -> Result<FeatureMap, LibraryError> {
    ensure_same_shape(vol.shape(), mask.shape(), "local intensity")?;
    let radius = (3.0 / (4.0 * PI)).cbrt() * 10.0;
    let offsets = neighbourhood_offsets(vol.spacing, radius);
    let (nx, ny, nz) = vol.shape();
    let sphere_mean = |(i, j, k): (usize, usize, usize)| -> f64 {
        let mut sum = 0.0;
        let mut count = 0usize;
        for [dx, dy, dz] in &offsets {
            let (x, y, z) = (i as isize + dx, j as isize + dy, k as isize + dz);
            if x < 0 || y < 0 || z < 0 {
                continue;
            }
            let (x, y, z) = (x as usize, y as usize, z as usize);
            if x >= nx || y >= ny || z >= nz {
                continue;
            }
            let value = vol.data[[x, y, z]];
            if !value.is_nan() {
                sum += value;
                count += 1;
            }
        }
        if count == 0 { f64::NAN } else { sum / count as f64 }
    };

    let inside: Vec<((usize, usize, usize), f64)> = mask
        .data
        .indexed_iter()
        .filter(|(_, inside)| **inside)
        .map(|(index, _)| (index, vol.data[index]))
        .filter(|(_, value)| !value.is_nan())
        .collect();
    if inside.is_empty() {
        return Err(LibraryError::InvalidInput(
            "the ROI contains no voxels".to_string(),
        ));
    }

    let hottest = inside
        .iter()
        .map(|(_, value)| *value)
        .fold(f64::NEG_INFINITY, f64::max);
    let peak_local = inside
        .iter()
        .filter(|(_, value)| *value == hottest)
        .map(|(index, _)| sphere_mean(*index))
        .fold(f64::NEG_INFINITY, f64::max);
    let peak_global = inside
        .iter()
        .map(|(index, _)| sphere_mean(*index))
        .fold(f64::NEG_INFINITY, f64::max);

    let mut features = FeatureBuilder::new(FeatureFamily::LocalIntensity);
    features
        .set("peak_local", peak_local)
        .set("peak_global", peak_global);
    Ok(features.finish())
}
