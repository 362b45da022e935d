use super::FeatureFamily;

const MORPH: &[&str] = &[
    "vol_approx",
    "area_approx",
    "av",
    "comp_1",
    "comp_2",
    "sph_dispr",
    "sphericity",
    "asphericity",
    "com",
    "v_dens_aabb",
    "a_dens_aabb",
];

const LOCAL_INTENSITY: &[&str] = &["peak_local", "peak_global"];

const STATS: &[&str] = &[
    "mean", "var", "skew", "kurt", "median", "min", "p10", "p90", "max", "iqr", "range", "mad",
    "rmad", "medad", "cov", "qcod", "energy", "rms",
];

const INTENSITY_HISTOGRAM: &[&str] = &[
    "mean",
    "var",
    "skew",
    "kurt",
    "median",
    "min",
    "p10",
    "p90",
    "max",
    "mode",
    "iqr",
    "range",
    "mad",
    "rmad",
    "medad",
    "cov",
    "qcod",
    "entropy",
    "uniformity",
    "max_grad",
    "max_grad_gl",
    "min_grad",
    "min_grad_gl",
];

const INT_VOL_HIST: &[&str] = &[
    "v10",
    "v90",
    "i10",
    "i90",
    "diff_v10_v90",
    "diff_i10_i90",
    "auc",
];

const GLCM: &[&str] = &[
    "joint_max",
    "joint_avg",
    "joint_var",
    "joint_entr",
    "diff_avg",
    "diff_var",
    "diff_entr",
    "sum_avg",
    "sum_var",
    "sum_entr",
    "energy",
    "contrast",
    "dissimilarity",
    "inv_diff",
    "inv_diff_norm",
    "inv_diff_mom",
    "inv_diff_mom_norm",
    "inv_var",
    "corr",
    "auto_corr",
    "clust_tend",
    "clust_shade",
    "clust_prom",
    "info_corr1",
    "info_corr2",
];

// The zone families share one feature layout; only the names differ.
const GLRLM: &[&str] = &[
    "sre", "lre", "lgre", "hgre", "srlge", "srhge", "lrlge", "lrhge", "glnu", "glnu_norm", "rlnu",
    "rlnu_norm", "r_perc", "gl_var", "rl_var", "rl_entr",
];

const GLSZM: &[&str] = &[
    "sze", "lze", "lgze", "hgze", "szlge", "szhge", "lzlge", "lzhge", "glnu", "glnu_norm", "zsnu",
    "zsnu_norm", "z_perc", "gl_var", "zs_var", "zs_entr",
];

const GLDZM: &[&str] = &[
    "sde", "lde", "lgze", "hgze", "sdlge", "sdhge", "ldlge", "ldhge", "glnu", "glnu_norm", "zdnu",
    "zdnu_norm", "z_perc", "gl_var", "zd_var", "zd_entr",
];

const NGLDM: &[&str] = &[
    "lde",
    "hde",
    "lgce",
    "hgce",
    "ldlge",
    "ldhge",
    "hdlge",
    "hdhge",
    "glnu",
    "glnu_norm",
    "dcnu",
    "dcnu_norm",
    "dc_perc",
    "gl_var",
    "dc_var",
    "dc_entr",
    "dc_energy",
];

const NGTDM: &[&str] = &["coarseness", "contrast", "busyness", "complexity", "strength"];

pub(super) fn names(family: FeatureFamily) -> &'static [&'static str] {
    match family {
        FeatureFamily::Morph => MORPH,
        FeatureFamily::LocalIntensity => LOCAL_INTENSITY,
        FeatureFamily::Stats => STATS,
        FeatureFamily::IntensityHistogram => INTENSITY_HISTOGRAM,
        FeatureFamily::IntVolHist => INT_VOL_HIST,
        FeatureFamily::Glcm => GLCM,
        FeatureFamily::Glrlm => GLRLM,
        FeatureFamily::Glszm => GLSZM,
        FeatureFamily::Gldzm => GLDZM,
        FeatureFamily::Ngtdm => NGTDM,
        FeatureFamily::Ngldm => NGLDM,
    }
}
