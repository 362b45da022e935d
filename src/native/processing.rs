use crate::error::LibraryError;
use crate::imaging::{
    BinningAlgo, Mask, OutlierMethod, Quantization, Scan, Spacing, Volume, ensure_same_shape,
};
use crate::settings::Interpolator;
use ndarray::{Array3, Zip, s};

pub(super) fn get_roi(
    scan: &Scan,
    names: &[String],
    box_string: &str,
) -> Result<(Volume, Mask), LibraryError> {
    if names.is_empty() {
        return Err(LibraryError::InvalidInput("no ROI selected".to_string()));
    }
    let mut union: Option<Array3<bool>> = None;
    for name in names {
        let mask = scan
            .rois
            .get(name)
            .ok_or_else(|| LibraryError::RoiNotFound(name.clone()))?;
        union = Some(match union {
            None => mask.data.clone(),
            Some(mut acc) => {
                Zip::from(&mut acc)
                    .and(&mask.data)
                    .for_each(|a, &b| *a = *a || b);
                acc
            }
        });
    }
    let data = union.ok_or_else(|| LibraryError::InvalidInput("no ROI selected".to_string()))?;
    let mask = Mask::new(data, scan.volume.spacing);

    match parse_box(box_string)? {
        None => Ok((scan.volume.clone(), mask)),
        Some(margin) => Ok(crop_to_box(&scan.volume, &mask, margin)),
    }
}

/// `"full"` keeps the whole volume; `"box"` crops to the ROI bounding box;
/// `"boxN"` adds an N-voxel margin.
fn parse_box(box_string: &str) -> Result<Option<usize>, LibraryError> {
    let trimmed = box_string.trim();
    if trimmed.is_empty() || trimmed == "full" {
        return Ok(None);
    }
    match trimmed.strip_prefix("box") {
        Some("") => Ok(Some(0)),
        Some(margin) => margin.parse().map(Some).map_err(|_| {
            LibraryError::InvalidInput(format!("invalid box string '{box_string}'"))
        }),
        None => Err(LibraryError::InvalidInput(format!(
            "invalid box string '{box_string}'"
        ))),
    }
}

fn crop_to_box(vol: &Volume, mask: &Mask, margin: usize) -> (Volume, Mask) {
    let shape = mask.shape();
    let dims = [shape.0, shape.1, shape.2];
    let mut low = dims;
    let mut high = [0usize; 3];
    let mut any = false;
    for ((i, j, k), &inside) in mask.data.indexed_iter() {
        if inside {
            any = true;
            for (axis, index) in [i, j, k].into_iter().enumerate() {
                low[axis] = low[axis].min(index);
                high[axis] = high[axis].max(index);
            }
        }
    }
    if !any {
        return (vol.clone(), mask.clone());
    }
    let start: Vec<usize> = (0..3).map(|a| low[a].saturating_sub(margin)).collect();
    let end: Vec<usize> = (0..3).map(|a| (high[a] + margin + 1).min(dims[a])).collect();
    let cropped_vol = vol
        .data
        .slice(s![start[0]..end[0], start[1]..end[1], start[2]..end[2]])
        .to_owned();
    let cropped_mask = mask
        .data
        .slice(s![start[0]..end[0], start[1]..end[1], start[2]..end[2]])
        .to_owned();
    (
        Volume::new(cropped_vol, vol.spacing),
        Mask::new(cropped_mask, mask.spacing),
    )
}

fn target_shape(shape: (usize, usize, usize), from: Spacing, to: Spacing) -> [usize; 3] {
    let dims = [shape.0, shape.1, shape.2];
    let mut out = [0usize; 3];
    for axis in 0..3 {
        let extent = dims[axis] as f64 * from[axis];
        out[axis] = ((extent / to[axis]).round() as usize).max(1);
    }
    out
}

fn same_spacing(a: Spacing, b: Spacing) -> bool {
    a.iter().zip(b.iter()).all(|(x, y)| (x - y).abs() < 1e-9)
}

/// Resamples `data` onto a grid of spacing `to`, aligning voxel centres.
fn resample(
    data: &Array3<f64>,
    from: Spacing,
    to: Spacing,
    method: Interpolator,
) -> Result<Array3<f64>, LibraryError> {
    if to.iter().any(|s| !(*s > 0.0)) {
        return Err(LibraryError::InvalidInput(format!(
            "target spacing must be positive, got {to:?}"
        )));
    }
    let shape = data.dim();
    let dims = [shape.0, shape.1, shape.2];
    if dims.contains(&0) {
        return Err(LibraryError::InvalidInput("cannot resample an empty volume".to_string()));
    }
    let [nx, ny, nz] = target_shape(shape, from, to);
    let source = |axis: usize, index: usize| -> f64 {
        let position = (index as f64 + 0.5) * to[axis] / from[axis] - 0.5;
        position.clamp(0.0, (dims[axis] - 1) as f64)
    };

    match method {
        Interpolator::Nearest => Ok(Array3::from_shape_fn((nx, ny, nz), |(i, j, k)| {
            data[[
                source(0, i).round() as usize,
                source(1, j).round() as usize,
                source(2, k).round() as usize,
            ]]
        })),
        Interpolator::Linear => Ok(Array3::from_shape_fn((nx, ny, nz), |(i, j, k)| {
            trilinear(data, [source(0, i), source(1, j), source(2, k)])
        })),
        other => Err(LibraryError::Unsupported(format!(
            "{other:?} interpolation"
        ))),
    }
}

fn trilinear(data: &Array3<f64>, p: [f64; 3]) -> f64 {
    let lower = p.map(|c| c.floor() as usize);
    let dims = data.dim();
    let upper = [
        (lower[0] + 1).min(dims.0 - 1),
        (lower[1] + 1).min(dims.1 - 1),
        (lower[2] + 1).min(dims.2 - 1),
    ];
    let t = [
        p[0] - lower[0] as f64,
        p[1] - lower[1] as f64,
        p[2] - lower[2] as f64,
    ];
    let mut value = 0.0;
    for (dx, wx) in [(lower[0], 1.0 - t[0]), (upper[0], t[0])] {
        for (dy, wy) in [(lower[1], 1.0 - t[1]), (upper[1], t[1])] {
            for (dz, wz) in [(lower[2], 1.0 - t[2]), (upper[2], t[2])] {
                let weight = wx * wy * wz;
                if weight > 0.0 {
                    value += weight * data[[dx, dy, dz]];
                }
            }
        }
    }
    value
}

pub(super) fn interpolate_volume(
    vol: &Volume,
    spacing: Spacing,
    method: Interpolator,
    gl_round: Option<f64>,
) -> Result<Volume, LibraryError> {
    let mut data = if same_spacing(vol.spacing, spacing) {
        vol.data.clone()
    } else {
        resample(&vol.data, vol.spacing, spacing, method)?
    };
    if let Some(step) = gl_round.filter(|step| *step > 0.0) {
        data.mapv_inplace(|v| (v / step).round() * step);
    }
    Ok(Volume::new(data, spacing))
}

pub(super) fn interpolate_mask(
    mask: &Mask,
    spacing: Spacing,
    method: Interpolator,
    roi_pv: f64,
) -> Result<Mask, LibraryError> {
    if same_spacing(mask.spacing, spacing) {
        return Ok(Mask::new(mask.data.clone(), spacing));
    }
    let fraction = mask.data.mapv(|inside| if inside { 1.0 } else { 0.0 });
    let resampled = resample(&fraction, mask.spacing, spacing, method)?;
    Ok(Mask::new(resampled.mapv(|v| v >= roi_pv), spacing))
}

pub(super) fn range_filter(
    vol: &Volume,
    mask: &Mask,
    [low, high]: [f64; 2],
) -> Result<Mask, LibraryError> {
    ensure_same_shape(vol.shape(), mask.shape(), "range re-segmentation")?;
    let data = Zip::from(&vol.data)
        .and(&mask.data)
        .map_collect(|&v, &inside| inside && v >= low && v <= high);
    Ok(Mask::new(data, mask.spacing))
}

pub(super) fn outlier_filter(
    vol: &Volume,
    mask: &Mask,
    method: OutlierMethod,
) -> Result<Mask, LibraryError> {
    ensure_same_shape(vol.shape(), mask.shape(), "outlier re-segmentation")?;
    match method {
        OutlierMethod::None => Ok(mask.clone()),
        OutlierMethod::Collewet => {
            let values: Vec<f64> = Zip::from(&vol.data)
                .and(&mask.data)
                .fold(Vec::new(), |mut acc, &v, &inside| {
                    if inside && !v.is_nan() {
                        acc.push(v);
                    }
                    acc
                });
            if values.is_empty() {
                return Ok(mask.clone());
            }
            let n = values.len() as f64;
            let mean = values.iter().sum::<f64>() / n;
            let sd = (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();
            let (low, high) = (mean - 3.0 * sd, mean + 3.0 * sd);
            let data = Zip::from(&vol.data)
                .and(&mask.data)
                .map_collect(|&v, &inside| inside && v >= low && v <= high);
            Ok(Mask::new(data, mask.spacing))
        }
    }
}

pub(super) fn extract_roi(vol: &Volume, mask: &Mask) -> Result<Volume, LibraryError> {
    ensure_same_shape(vol.shape(), mask.shape(), "ROI extraction")?;
    let data = Zip::from(&vol.data)
        .and(&mask.data)
        .map_collect(|&v, &inside| if inside { v } else { f64::NAN });
    Ok(Volume::new(data, vol.spacing))
}

pub(super) fn discretize(
    vol: &Volume,
    quantization: &Quantization,
    user_set_min_value: Option<f64>,
    ivh: bool,
) -> Result<(Volume, f64), LibraryError> {
    let values = vol.finite_values();
    if values.is_empty() {
        return Err(LibraryError::InvalidInput(
            "the ROI contains no voxels".to_string(),
        ));
    }
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let (origin, width, bins) = match quantization.algo {
        BinningAlgo::Fbn => {
            let bins = quantization.value.floor().max(1.0);
            let range = max - min;
            let width = if range > 0.0 { range / bins } else { 1.0 };
            (min, width, Some(bins))
        }
        BinningAlgo::Fbs => {
            (user_set_min_value.unwrap_or(min), quantization.value, None)
        }
    };

    let bin_of = |v: f64| -> f64 {
        let raw = ((v - origin) / width).floor() + 1.0;
        let bin = raw.max(1.0);
        match bins {
            Some(bins) => bin.min(bins),
            None => bin,
        }
    };

    let data = vol.data.mapv(|v| {
        if v.is_nan() {
            f64::NAN
        } else if ivh {
            origin + (bin_of(v) - 0.5) * width
        } else {
            bin_of(v)
        }
    });
    Ok((Volume::new(data, vol.spacing), width))
}
