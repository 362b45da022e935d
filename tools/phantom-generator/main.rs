use clap::Parser;
use ndarray::Array3;
use radiomics_flow::imaging::{Mask, ScanRecord, Volume};
use rand::Rng;
use std::collections::BTreeMap;
use std::fs;

/// A CLI tool to generate synthetic phantom scans for radiomics-flow
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// The path to write the scan container to
    #[arg(short, long, default_value = "phantom.scan")]
    output: String,

    /// Edge length of the cubic volume in voxels
    #[arg(long, default_value_t = 32)]
    size: usize,

    /// Sphere radius in voxels
    #[arg(long, default_value_t = 8.0)]
    radius: f64,

    /// Voxel spacing in millimetres (isotropic)
    #[arg(long, default_value_t = 1.0)]
    spacing: f64,

    /// Modality tag written into the container (CTscan, MRscan, PTscan)
    #[arg(long, default_value = "CTscan")]
    modality: String,

    /// Amplitude of the uniform noise added to every voxel
    #[arg(long, default_value_t = 20.0)]
    noise: f64,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let mut rng = rand::rng();

    if cli.size == 0 || cli.radius <= 0.0 || cli.noise < 0.0 {
        eprintln!("Error: --size and --radius must be positive and --noise non-negative");
        std::process::exit(1);
    }

    println!(
        "Generating {}^3 phantom (sphere radius {} voxels, spacing {} mm)...",
        cli.size, cli.radius, cli.spacing
    );

    let centre = (cli.size as f64 - 1.0) / 2.0;
    let inside = |(i, j, k): (usize, usize, usize)| {
        let d2 = (i as f64 - centre).powi(2) + (j as f64 - centre).powi(2) + (k as f64 - centre).powi(2);
        d2 <= cli.radius * cli.radius
    };
    let shape = (cli.size, cli.size, cli.size);
    let spacing = [cli.spacing; 3];

    let mask = Array3::from_shape_fn(shape, &inside);
    let data = Array3::from_shape_fn(shape, |index| {
        let base = if inside(index) { 60.0 } else { -100.0 };
        base + rng.random_range(-cli.noise..=cli.noise)
    });

    let mut rois = BTreeMap::new();
    rois.insert("GTV".to_string(), Mask::new(mask, spacing));
    let record = ScanRecord {
        patient_id: "PHANTOM-001".to_string(),
        modality: cli.modality.clone(),
        volume: Volume::new(data, spacing),
        rois,
    };

    fs::write(&cli.output, record.to_bytes()?)?;
    println!(
        "Successfully generated and saved phantom scan to '{}'",
        cli.output
    );
    Ok(())
}
