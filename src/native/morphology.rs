//! Voxel-based morphological features.
//!
//! Volume and surface are counted on the voxel grid: the volume is the
//! number of ROI voxels times the voxel volume, the surface is the number
//! of exposed voxel faces times the face area.

use super::FeatureBuilder;
use crate::error::LibraryError;
use crate::features::{FeatureFamily, FeatureMap};
use crate::imaging::{Mask, Volume, ensure_same_shape};
use std::f64::consts::PI;

fn exposed_area(mask: &Mask) -> f64 {
    let (nx, ny, nz) = mask.shape();
    let dims = [nx, ny, nz];
    let [sx, sy, sz] = mask.spacing;
    let face_area = [sy * sz, sx * sz, sx * sy];
    let mut area = 0.0;
    for ((i, j, k), &inside) in mask.data.indexed_iter() {
        if !inside {
            continue;
        }
        let index = [i, j, k];
        for axis in 0..3 {
            for step in [-1isize, 1] {
                let neighbour = index[axis] as isize + step;
                let exposed = if neighbour < 0 || neighbour as usize >= dims[axis] {
                    true
                } else {
                    let mut other = index;
                    other[axis] = neighbour as usize;
                    !mask.data[other]
                };
                if exposed {
                    area += face_area[axis];
                }
            }
        }
    }
    area
}

fn physical(index: [usize; 3], spacing: [f64; 3]) -> [f64; 3] {
    [
        index[0] as f64 * spacing[0],
        index[1] as f64 * spacing[1],
        index[2] as f64 * spacing[2],
    ]
}

pub(super) fn morph(
    vol: &Volume,
    mask_int: &Mask,
    mask_morph: &Mask,
) -> Result<FeatureMap, LibraryError> {
    ensure_same_shape(vol.shape(), mask_morph.shape(), "morphology")?;
    ensure_same_shape(vol.shape(), mask_int.shape(), "morphology")?;
    let count = mask_morph.count();
    if count == 0 {
        return Err(LibraryError::InvalidInput(
            "the morphological mask is empty".to_string(),
        ));
    }
    let spacing = mask_morph.spacing;
    let volume = count as f64 * spacing.iter().product::<f64>();
    let area = exposed_area(mask_morph);

    let mut geometric = [0.0; 3];
    let mut low = [usize::MAX; 3];
    let mut high = [0usize; 3];
    for ((i, j, k), &inside) in mask_morph.data.indexed_iter() {
        if inside {
            let position = physical([i, j, k], spacing);
            for axis in 0..3 {
                geometric[axis] += position[axis] / count as f64;
            }
            for (axis, index) in [i, j, k].into_iter().enumerate() {
                low[axis] = low[axis].min(index);
                high[axis] = high[axis].max(index);
            }
        }
    }

    let mut weighted = [0.0; 3];
    let mut total_intensity = 0.0;
    for ((i, j, k), &inside) in mask_int.data.indexed_iter() {
        let value = vol.data[[i, j, k]];
        if inside && !value.is_nan() {
            let position = physical([i, j, k], spacing);
            for axis in 0..3 {
                weighted[axis] += position[axis] * value;
            }
            total_intensity += value;
        }
    }
    let com_shift = if total_intensity != 0.0 {
        (0..3)
            .map(|axis| (geometric[axis] - weighted[axis] / total_intensity).powi(2))
            .sum::<f64>()
            .sqrt()
    } else {
        0.0
    };

    let extent: Vec<f64> = (0..3)
        .map(|axis| (high[axis] - low[axis] + 1) as f64 * spacing[axis])
        .collect();
    let aabb_volume = extent[0] * extent[1] * extent[2];
    let aabb_area = 2.0 * (extent[0] * extent[1] + extent[0] * extent[2] + extent[1] * extent[2]);

    let sphere_term = (36.0 * PI * volume * volume).cbrt();
    let mut features = FeatureBuilder::new(FeatureFamily::Morph);
    features
        .set("vol_approx", volume)
        .set("area_approx", area)
        .set("av", area / volume)
        .set("comp_1", volume / (PI.sqrt() * area.powf(1.5)))
        .set("comp_2", 36.0 * PI * volume * volume / area.powi(3))
        .set("sph_dispr", area / sphere_term)
        .set("sphericity", sphere_term / area)
        .set("asphericity", area / sphere_term - 1.0)
        .set("com", com_shift)
        .set("v_dens_aabb", volume / aabb_volume)
        .set("a_dens_aabb", area / aabb_area);
    Ok(features.finish())
}
