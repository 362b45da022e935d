//! Separable convolution filters: mean and Laplacian of Gaussian.

use crate::error::LibraryError;
use crate::imaging::Volume;
use crate::settings::{FilterParams, LogFilterParams, MeanFilterParams, Padding};
use ndarray::{Array3, Axis};

pub(super) fn apply_filter(vol: &Volume, filter: &FilterParams) -> Result<Volume, LibraryError> {
    if vol.data.iter().any(|v| v.is_nan()) {
        return Err(LibraryError::InvalidInput(
            "filters must run before ROI extraction".to_string(),
        ));
    }
    let data = match filter.filter_type.as_str() {
        "mean" => mean_filter(&vol.data, &filter.mean)?,
        "log" => log_filter(vol, &filter.log)?,
        other => return Err(LibraryError::Unsupported(format!("filter '{other}'"))),
    };
    Ok(Volume::new(data, vol.spacing))
}

fn filtered_axes(ndims: usize) -> Result<usize, LibraryError> {
    match ndims {
        2 | 3 => Ok(ndims),
        other => Err(LibraryError::InvalidInput(format!(
            "filters work in 2 or 3 dimensions, got {other}"
        ))),
    }
}

fn mean_filter(data: &Array3<f64>, params: &MeanFilterParams) -> Result<Array3<f64>, LibraryError> {
    if params.size == 0 || params.size % 2 == 0 {
        return Err(LibraryError::InvalidInput(format!(
            "mean filter size must be odd, got {}",
            params.size
        )));
    }
    let kernel = vec![1.0 / params.size as f64; params.size];
    let mut out = data.clone();
    for axis in 0..filtered_axes(params.ndims)? {
        out = convolve_axis(&out, axis, &kernel, params.padding);
    }
    Ok(out)
}

/// Sum over axes of the second Gaussian derivative along that axis,
/// smoothed along the others, scaled by sigma squared.
fn log_filter(vol: &Volume, params: &LogFilterParams) -> Result<Array3<f64>, LibraryError> {
    if !(params.sigma > 0.0) {
        return Err(LibraryError::InvalidInput(format!(
            "LoG sigma must be positive, got {}",
            params.sigma
        )));
    }
    let axes = filtered_axes(params.ndims)?;
    let kernels: Vec<(Vec<f64>, Vec<f64>)> = (0..axes)
        .map(|axis| gaussian_kernels(params.sigma / vol.spacing[axis]))
        .collect();

    let mut response = Array3::<f64>::zeros(vol.data.dim());
    for derivative_axis in 0..axes {
        let mut term = vol.data.clone();
        for (axis, (smooth, second)) in kernels.iter().enumerate() {
            let kernel = if axis == derivative_axis { second } else { smooth };
            term = convolve_axis(&term, axis, kernel, params.padding);
        }
        let scale = vol.spacing[derivative_axis].powi(2);
        response.zip_mut_with(&term, |r, &t| *r += t / scale);
    }
    let sigma2 = params.sigma.powi(2);
    response.mapv_inplace(|v| v * sigma2);
    Ok(response)
}

/// Gaussian and its second derivative sampled out to four sigma (in voxels).
fn gaussian_kernels(sigma: f64) -> (Vec<f64>, Vec<f64>) {
    let radius = (4.0 * sigma).ceil().max(1.0) as isize;
    let offsets: Vec<f64> = (-radius..=radius).map(|x| x as f64).collect();
    let raw: Vec<f64> = offsets
        .iter()
        .map(|x| (-x * x / (2.0 * sigma * sigma)).exp())
        .collect();
    let norm: f64 = raw.iter().sum();
    let smooth: Vec<f64> = raw.iter().map(|g| g / norm).collect();
    let second: Vec<f64> = offsets
        .iter()
        .zip(&smooth)
        .map(|(x, g)| (x * x - sigma * sigma) / sigma.powi(4) * g)
        .collect();
    // Zero mean keeps flat regions at zero response.
    let mean = second.iter().sum::<f64>() / second.len() as f64;
    let second = second.into_iter().map(|v| v - mean).collect();
    (smooth, second)
}

fn pad_index(index: isize, len: usize, padding: Padding) -> Option<usize> {
    let n = len as isize;
    if (0..n).contains(&index) {
        return Some(index as usize);
    }
    let mapped = match padding {
        Padding::Constant => return None,
        Padding::Edge => index.clamp(0, n - 1),
        Padding::Wrap => index.rem_euclid(n),
        Padding::Symmetric => {
            let period = 2 * n;
            let folded = index.rem_euclid(period);
            if folded < n { folded } else { period - 1 - folded }
        }
    };
    Some(mapped as usize)
}

fn convolve_axis(data: &Array3<f64>, axis: usize, kernel: &[f64], padding: Padding) -> Array3<f64> {
    let radius = (kernel.len() / 2) as isize;
    let mut out = Array3::<f64>::zeros(data.dim());
    for (src, mut dst) in data
        .lanes(Axis(axis))
        .into_iter()
        .zip(out.lanes_mut(Axis(axis)))
    {
        let len = src.len();
        for i in 0..len {
            let mut acc = 0.0;
            for (k, weight) in kernel.iter().enumerate() {
                let offset = i as isize + k as isize - radius;
                if let Some(j) = pad_index(offset, len, padding) {
                    acc += weight * src[j];
                }
            }
            dst[i] = acc;
        }
    }
    out
}
