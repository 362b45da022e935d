//! Texture-matrix families computed on discretised gray levels.
//!
//! Gray levels are the bin numbers written by discretisation (1-based,
//! `NaN` outside the ROI). Directional matrices use the 13 unique
//! directions of the 26-neighbourhood.

use super::FeatureBuilder;
use crate::error::LibraryError;
use crate::features::{FeatureFamily, FeatureMap};
use crate::imaging::{Mask, Volume, ensure_same_shape};
use crate::settings::MatrixParams;
use ndarray::{Array2, Array3};
use std::collections::VecDeque;

const DIRECTIONS: [[isize; 3]; 13] = [
    [0, 0, 1],
    [0, 1, -1],
    [0, 1, 0],
    [0, 1, 1],
    [1, -1, -1],
    [1, -1, 0],
    [1, -1, 1],
    [1, 0, -1],
    [1, 0, 0],
    [1, 0, 1],
    [1, 1, -1],
    [1, 1, 0],
    [1, 1, 1],
];

fn neighbours_26() -> impl Iterator<Item = [isize; 3]> {
    DIRECTIONS
        .into_iter()
        .flat_map(|[x, y, z]| [[x, y, z], [-x, -y, -z]])
}

/// Gray-level grid with 0 for voxels outside the ROI.
struct Levels {
    grid: Array3<usize>,
    count: usize,
    voxels: usize,
}

impl Levels {
    fn of(vol: &Volume) -> Result<Self, LibraryError> {
        let grid = vol
            .data
            .mapv(|v| if v.is_nan() { 0 } else { v.round().max(1.0) as usize });
        let count = grid.iter().copied().max().unwrap_or(0);
        let voxels = grid.iter().filter(|&&level| level > 0).count();
        if voxels == 0 {
            return Err(LibraryError::InvalidInput(
                "the ROI contains no voxels".to_string(),
            ));
        }
        Ok(Self {
            grid,
            count,
            voxels,
        })
    }

    fn at(&self, index: [usize; 3], offset: [isize; 3]) -> Option<([usize; 3], usize)> {
        let (nx, ny, nz) = self.grid.dim();
        let dims = [nx, ny, nz];
        let mut target = [0usize; 3];
        for axis in 0..3 {
            let moved = index[axis] as isize + offset[axis];
            if moved < 0 || moved as usize >= dims[axis] {
                return None;
            }
            target[axis] = moved as usize;
        }
        let level = self.grid[target];
        (level > 0).then_some((target, level))
    }

    fn occupied(&self) -> impl Iterator<Item = ([usize; 3], usize)> + '_ {
        self.grid
            .indexed_iter()
            .filter(|(_, level)| **level > 0)
            .map(|((i, j, k), level)| ([i, j, k], *level))
    }
}

fn entropy(p: &Array2<f64>) -> f64 {
    p.iter().filter(|v| **v > 0.0).map(|v| -v * v.log2()).sum()
}

fn normalised(matrix: &Array2<f64>) -> Option<Array2<f64>> {
    let total = matrix.sum();
    (total > 0.0).then(|| matrix / total)
}

fn merge_mode(params: &MatrixParams) -> Result<bool, LibraryError> {
    match params.merge_method.as_str() {
        "vol_merge" | "" => Ok(true),
        "average" => Ok(false),
        other => Err(LibraryError::Unsupported(format!(
            "texture merge method '{other}'"
        ))),
    }
}

/// Averages per-direction feature maps key by key.
fn average(maps: Vec<FeatureMap>, family: FeatureFamily) -> Result<FeatureMap, LibraryError> {
    if maps.is_empty() {
        return Err(LibraryError::InvalidInput(format!(
            "no {family} matrix could be built for this ROI"
        )));
    }
    let n = maps.len() as f64;
    let mut builder = FeatureBuilder::new(family);
    for name in family.feature_names() {
        let key = family.feature_key(name);
        let sum: f64 = maps
            .iter()
            .filter_map(|map| map.get(&key).and_then(|value| value.as_scalar()))
            .sum();
        builder.set(name, sum / n);
    }
    Ok(builder.finish())
}

// --- GLCM ---

fn cooccurrence(levels: &Levels, direction: [isize; 3]) -> Array2<f64> {
    let mut matrix = Array2::<f64>::zeros((levels.count, levels.count));
    for (index, a) in levels.occupied() {
        if let Some((_, b)) = levels.at(index, direction) {
            matrix[[a - 1, b - 1]] += 1.0;
            matrix[[b - 1, a - 1]] += 1.0;
        }
    }
    matrix
}

fn glcm_features(p: &Array2<f64>) -> FeatureMap {
    let ng = p.nrows();
    let marginal: Vec<f64> = p.rows().into_iter().map(|row| row.sum()).collect();
    let mu: f64 = marginal
        .iter()
        .enumerate()
        .map(|(i, pi)| (i + 1) as f64 * pi)
        .sum();
    let var_x: f64 = marginal
        .iter()
        .enumerate()
        .map(|(i, pi)| ((i + 1) as f64 - mu).powi(2) * pi)
        .sum();

    let mut diff = vec![0.0; ng];
    let mut sum = vec![0.0; 2 * ng + 1];
    let mut acc = GlcmSums::default();
    for ((r, c), &pij) in p.indexed_iter() {
        if pij == 0.0 {
            continue;
        }
        let (i, j) = ((r + 1) as f64, (c + 1) as f64);
        let d = (i - j).abs();
        diff[r.abs_diff(c)] += pij;
        sum[r + c + 2] += pij;
        acc.joint_var += (i - mu).powi(2) * pij;
        acc.contrast += d * d * pij;
        acc.dissimilarity += d * pij;
        acc.inv_diff += pij / (1.0 + d);
        acc.inv_diff_norm += pij / (1.0 + d / ng as f64);
        acc.inv_diff_mom += pij / (1.0 + d * d);
        acc.inv_diff_mom_norm += pij / (1.0 + d * d / (ng * ng) as f64);
        if r != c {
            acc.inv_var += pij / (d * d);
        }
        acc.auto_corr += i * j * pij;
        let cluster = i + j - 2.0 * mu;
        acc.clust_tend += cluster.powi(2) * pij;
        acc.clust_shade += cluster.powi(3) * pij;
        acc.clust_prom += cluster.powi(4) * pij;
        let pxy = marginal[r] * marginal[c];
        if pxy > 0.0 {
            acc.hxy1 -= pij * pxy.log2();
        }
    }
    let hxy2: f64 = marginal
        .iter()
        .flat_map(|pi| marginal.iter().map(move |pj| pi * pj))
        .filter(|v| *v > 0.0)
        .map(|v| -v * v.log2())
        .sum();
    let hx: f64 = marginal
        .iter()
        .filter(|v| **v > 0.0)
        .map(|v| -v * v.log2())
        .sum();
    let joint_entr = entropy(p);

    let diff_avg: f64 = diff.iter().enumerate().map(|(k, v)| k as f64 * v).sum();
    let diff_var: f64 = diff
        .iter()
        .enumerate()
        .map(|(k, v)| (k as f64 - diff_avg).powi(2) * v)
        .sum();
    let sum_avg: f64 = sum.iter().enumerate().map(|(k, v)| k as f64 * v).sum();
    let sum_var: f64 = sum
        .iter()
        .enumerate()
        .map(|(k, v)| (k as f64 - sum_avg).powi(2) * v)
        .sum();
    let list_entropy =
        |values: &[f64]| -> f64 { values.iter().filter(|v| **v > 0.0).map(|v| -v * v.log2()).sum() };

    let corr = if var_x > 0.0 {
        (acc.auto_corr - mu * mu) / var_x
    } else {
        1.0
    };
    let info_corr1 = if hx > 0.0 {
        (joint_entr - acc.hxy1) / hx
    } else {
        0.0
    };
    let info_corr2 = (1.0 - (-2.0 * (hxy2 - joint_entr)).exp()).max(0.0).sqrt();

    let mut features = FeatureBuilder::new(FeatureFamily::Glcm);
    features
        .set("joint_max", p.iter().copied().fold(0.0, f64::max))
        .set("joint_avg", mu)
        .set("joint_var", acc.joint_var)
        .set("joint_entr", joint_entr)
        .set("diff_avg", diff_avg)
        .set("diff_var", diff_var)
        .set("diff_entr", list_entropy(&diff))
        .set("sum_avg", sum_avg)
        .set("sum_var", sum_var)
        .set("sum_entr", list_entropy(&sum))
        .set("energy", p.iter().map(|v| v * v).sum())
        .set("contrast", acc.contrast)
        .set("dissimilarity", acc.dissimilarity)
        .set("inv_diff", acc.inv_diff)
        .set("inv_diff_norm", acc.inv_diff_norm)
        .set("inv_diff_mom", acc.inv_diff_mom)
        .set("inv_diff_mom_norm", acc.inv_diff_mom_norm)
        .set("inv_var", acc.inv_var)
        .set("corr", corr)
        .set("auto_corr", acc.auto_corr)
        .set("clust_tend", acc.clust_tend)
        .set("clust_shade", acc.clust_shade)
        .set("clust_prom", acc.clust_prom)
        .set("info_corr1", info_corr1)
        .set("info_corr2", info_corr2);
    features.finish()
}

#[derive(Default)]
struct GlcmSums {
    joint_var: f64,
    contrast: f64,
    dissimilarity: f64,
    inv_diff: f64,
    inv_diff_norm: f64,
    inv_diff_mom: f64,
    inv_diff_mom_norm: f64,
    inv_var: f64,
    auto_corr: f64,
    clust_tend: f64,
    clust_shade: f64,
    clust_prom: f64,
    hxy1: f64,
}

fn direction_weight(direction: [isize; 3], params: &MatrixParams) -> f64 {
    if params.dist_correction {
        let norm: f64 = direction.iter().map(|d| (d * d) as f64).sum();
        1.0 / norm.sqrt()
    } else {
        1.0
    }
}

pub(super) fn glcm(vol: &Volume, params: &MatrixParams) -> Result<FeatureMap, LibraryError> {
    let levels = Levels::of(vol)?;
    if merge_mode(params)? {
        let mut merged = Array2::<f64>::zeros((levels.count, levels.count));
        for direction in DIRECTIONS {
            merged.scaled_add(
                direction_weight(direction, params),
                &cooccurrence(&levels, direction),
            );
        }
        let p = normalised(&merged).ok_or_else(|| {
            LibraryError::InvalidInput("the ROI has no neighbouring voxel pairs".to_string())
        })?;
        Ok(glcm_features(&p))
    } else {
        let maps = DIRECTIONS
            .into_iter()
            .filter_map(|direction| normalised(&cooccurrence(&levels, direction)))
            .map(|p| glcm_features(&p))
            .collect();
        average(maps, FeatureFamily::Glcm)
    }
}

// --- Zone-style matrices (GLRLM, GLSZM, GLDZM, NGLDM) ---

/// Features of a gray level × size matrix, where "size" is a run length,
/// zone size, zone distance or dependence count. Names come from the
/// family catalog in layout order.
fn zone_features(matrix: &Array2<f64>, voxels: f64, family: FeatureFamily) -> FeatureMap {
    let total = matrix.sum();
    let names = family.feature_names();
    let mut features = FeatureBuilder::new(family);
    if total <= 0.0 {
        for name in names {
            features.set(name, 0.0);
        }
        return features.finish();
    }

    let rows: Vec<f64> = matrix.rows().into_iter().map(|row| row.sum()).collect();
    let cols: Vec<f64> = matrix.columns().into_iter().map(|col| col.sum()).collect();
    let p = matrix / total;

    let mut sums = [0.0f64; 8];
    let mut mu_i = 0.0;
    let mut mu_j = 0.0;
    for ((r, c), &m) in matrix.indexed_iter() {
        if m == 0.0 {
            continue;
        }
        let (i, j) = ((r + 1) as f64, (c + 1) as f64);
        let (i2, j2) = (i * i, j * j);
        sums[0] += m / j2;
        sums[1] += m * j2;
        sums[2] += m / i2;
        sums[3] += m * i2;
        sums[4] += m / (i2 * j2);
        sums[5] += m * i2 / j2;
        sums[6] += m * j2 / i2;
        sums[7] += m * i2 * j2;
        mu_i += i * m / total;
        mu_j += j * m / total;
    }
    let mut gl_var = 0.0;
    let mut size_var = 0.0;
    for ((r, c), &pij) in p.indexed_iter() {
        gl_var += ((r + 1) as f64 - mu_i).powi(2) * pij;
        size_var += ((c + 1) as f64 - mu_j).powi(2) * pij;
    }

    let glnu = rows.iter().map(|r| r * r).sum::<f64>();
    let size_nu = cols.iter().map(|c| c * c).sum::<f64>();
    let values = [
        sums[0] / total,
        sums[1] / total,
        sums[2] / total,
        sums[3] / total,
        sums[4] / total,
        sums[5] / total,
        sums[6] / total,
        sums[7] / total,
        glnu / total,
        glnu / (total * total),
        size_nu / total,
        size_nu / (total * total),
        total / voxels,
        gl_var,
        size_var,
        entropy(&p),
    ];
    for (name, value) in names.iter().zip(values) {
        features.set(name, value);
    }
    // NGLDM carries one extra feature after the shared layout.
    if let Some(extra) = names.get(values.len()) {
        features.set(extra, p.iter().map(|v| v * v).sum());
    }
    features.finish()
}

fn run_lengths(levels: &Levels, direction: [isize; 3]) -> Array2<f64> {
    let (nx, ny, nz) = levels.grid.dim();
    let longest = nx.max(ny).max(nz);
    let mut matrix = Array2::<f64>::zeros((levels.count, longest));
    let backwards = direction.map(|d| -d);
    for (index, level) in levels.occupied() {
        // Only start counting at the first voxel of a run.
        if matches!(levels.at(index, backwards), Some((_, previous)) if previous == level) {
            continue;
        }
        let mut length = 1;
        let mut cursor = index;
        while let Some((next, next_level)) = levels.at(cursor, direction) {
            if next_level != level {
                break;
            }
            length += 1;
            cursor = next;
        }
        matrix[[level - 1, length - 1]] += 1.0;
    }
    matrix
}

pub(super) fn glrlm(vol: &Volume, params: &MatrixParams) -> Result<FeatureMap, LibraryError> {
    let levels = Levels::of(vol)?;
    let voxels = levels.voxels as f64;
    if merge_mode(params)? {
        let (nx, ny, nz) = levels.grid.dim();
        let mut merged = Array2::<f64>::zeros((levels.count, nx.max(ny).max(nz)));
        for direction in DIRECTIONS {
            merged.scaled_add(
                direction_weight(direction, params),
                &run_lengths(&levels, direction),
            );
        }
        Ok(zone_features(
            &merged,
            voxels * DIRECTIONS.len() as f64,
            FeatureFamily::Glrlm,
        ))
    } else {
        let maps = DIRECTIONS
            .into_iter()
            .map(|direction| zone_features(&run_lengths(&levels, direction), voxels, FeatureFamily::Glrlm))
            .collect();
        average(maps, FeatureFamily::Glrlm)
    }
}

/// Connected zones of equal gray level (26-connectivity) as
/// `(level, voxel indices)`.
fn zones(levels: &Levels) -> Vec<(usize, Vec<[usize; 3]>)> {
    let mut visited = Array3::from_elem(levels.grid.dim(), false);
    let mut found = Vec::new();
    for (start, level) in levels.occupied() {
        if visited[start] {
            continue;
        }
        visited[start] = true;
        let mut members = vec![start];
        let mut queue = VecDeque::from([start]);
        while let Some(current) = queue.pop_front() {
            for offset in neighbours_26() {
                if let Some((next, next_level)) = levels.at(current, offset) {
                    if next_level == level && !visited[next] {
                        visited[next] = true;
                        members.push(next);
                        queue.push_back(next);
                    }
                }
            }
        }
        found.push((level, members));
    }
    found
}

pub(super) fn glszm(vol: &Volume) -> Result<FeatureMap, LibraryError> {
    let levels = Levels::of(vol)?;
    let mut matrix = Array2::<f64>::zeros((levels.count, levels.voxels));
    for (level, members) in zones(&levels) {
        matrix[[level - 1, members.len() - 1]] += 1.0;
    }
    Ok(zone_features(
        &matrix,
        levels.voxels as f64,
        FeatureFamily::Glszm,
    ))
}

/// Distance of every ROI voxel to the mask border (6-connectivity, border
/// voxels at distance 1).
fn border_distance(mask: &Mask) -> Array3<usize> {
    let (nx, ny, nz) = mask.shape();
    let dims = [nx, ny, nz];
    let mut distance = Array3::<usize>::zeros(mask.shape());
    let mut queue = VecDeque::new();
    let faces: [[isize; 3]; 6] = [
        [1, 0, 0],
        [-1, 0, 0],
        [0, 1, 0],
        [0, -1, 0],
        [0, 0, 1],
        [0, 0, -1],
    ];
    let step = |index: [usize; 3], offset: [isize; 3]| -> Option<[usize; 3]> {
        let mut target = [0usize; 3];
        for axis in 0..3 {
            let moved = index[axis] as isize + offset[axis];
            if moved < 0 || moved as usize >= dims[axis] {
                return None;
            }
            target[axis] = moved as usize;
        }
        Some(target)
    };

    for ((i, j, k), &inside) in mask.data.indexed_iter() {
        if !inside {
            continue;
        }
        let index = [i, j, k];
        let on_border = faces
            .iter()
            .any(|offset| step(index, *offset).is_none_or(|next| !mask.data[next]));
        if on_border {
            distance[index] = 1;
            queue.push_back(index);
        }
    }
    while let Some(current) = queue.pop_front() {
        for offset in faces {
            if let Some(next) = step(current, offset) {
                if mask.data[next] && distance[next] == 0 {
                    distance[next] = distance[current] + 1;
                    queue.push_back(next);
                }
            }
        }
    }
    distance
}

pub(super) fn gldzm(vol: &Volume, mask_morph: &Mask) -> Result<FeatureMap, LibraryError> {
    ensure_same_shape(vol.shape(), mask_morph.shape(), "GLDZM")?;
    let levels = Levels::of(vol)?;
    let distance = border_distance(mask_morph);
    let found = zones(&levels);
    let largest = distance.iter().copied().max().unwrap_or(0).max(1);
    let mut matrix = Array2::<f64>::zeros((levels.count, largest));
    for (level, members) in found {
        let nearest = members
            .iter()
            .map(|index| distance[*index])
            .filter(|d| *d > 0)
            .min()
            .unwrap_or(1);
        matrix[[level - 1, nearest - 1]] += 1.0;
    }
    Ok(zone_features(
        &matrix,
        levels.voxels as f64,
        FeatureFamily::Gldzm,
    ))
}

pub(super) fn ngldm(vol: &Volume) -> Result<FeatureMap, LibraryError> {
    let levels = Levels::of(vol)?;
    let mut matrix = Array2::<f64>::zeros((levels.count, 27));
    for (index, level) in levels.occupied() {
        let dependent = neighbours_26()
            .filter(|offset| matches!(levels.at(index, *offset), Some((_, other)) if other == level))
            .count();
        matrix[[level - 1, dependent]] += 1.0;
    }
    Ok(zone_features(
        &matrix,
        levels.voxels as f64,
        FeatureFamily::Ngldm,
    ))
}

// --- NGTDM ---

pub(super) fn ngtdm(vol: &Volume) -> Result<FeatureMap, LibraryError> {
    let levels = Levels::of(vol)?;
    let mut s = vec![0.0; levels.count];
    let mut n = vec![0.0; levels.count];
    for (index, level) in levels.occupied() {
        let neighbours: Vec<usize> = neighbours_26()
            .filter_map(|offset| levels.at(index, offset).map(|(_, other)| other))
            .collect();
        if neighbours.is_empty() {
            continue;
        }
        let average = neighbours.iter().sum::<usize>() as f64 / neighbours.len() as f64;
        s[level - 1] += (level as f64 - average).abs();
        n[level - 1] += 1.0;
    }
    let n_valid: f64 = n.iter().sum();
    let mut features = FeatureBuilder::new(FeatureFamily::Ngtdm);
    if n_valid == 0.0 {
        for name in FeatureFamily::Ngtdm.feature_names() {
            features.set(name, 0.0);
        }
        return Ok(features.finish());
    }

    let p: Vec<f64> = n.iter().map(|count| count / n_valid).collect();
    let present: Vec<usize> = (0..levels.count).filter(|i| p[*i] > 0.0).collect();
    let ng_present = present.len() as f64;
    let weighted: f64 = present.iter().map(|i| p[*i] * s[*i]).sum();
    let s_total: f64 = s.iter().sum();

    let mut contrast_sum = 0.0;
    let mut busyness_denominator = 0.0;
    let mut complexity = 0.0;
    let mut strength_sum = 0.0;
    for &a in &present {
        for &b in &present {
            let (ia, ib) = ((a + 1) as f64, (b + 1) as f64);
            contrast_sum += p[a] * p[b] * (ia - ib).powi(2);
            busyness_denominator += (ia * p[a] - ib * p[b]).abs();
            complexity += (ia - ib).abs() * (p[a] * s[a] + p[b] * s[b]) / (p[a] + p[b]);
            strength_sum += (p[a] + p[b]) * (ia - ib).powi(2);
        }
    }

    let coarseness = if weighted > 0.0 { 1.0 / weighted } else { 1.0e6 };
    let contrast = if ng_present > 1.0 {
        contrast_sum / (ng_present * (ng_present - 1.0)) * s_total / n_valid
    } else {
        0.0
    };
    let busyness = if busyness_denominator > 0.0 {
        weighted / busyness_denominator
    } else {
        0.0
    };
    let strength = if s_total > 0.0 {
        strength_sum / s_total
    } else {
        0.0
    };
    features
        .set("coarseness", coarseness)
        .set("contrast", contrast)
        .set("busyness", busyness)
        .set("complexity", complexity / n_valid)
        .set("strength", strength);
    Ok(features.finish())
}
