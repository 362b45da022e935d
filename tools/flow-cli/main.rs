use clap::{Parser, Subcommand};
use radiomics_flow::prelude::*;
use radiomics_flow::workflow::WorkflowSnapshot;
use std::fs;
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// Builds and runs radiomics pipelines from a node-editor flow graph
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Expand a flow graph and run every pipeline
    Run {
        /// Path to the flow-graph JSON exported by the editor
        flow_path: String,

        /// Directory input nodes resolve their file paths against
        #[arg(short, long, default_value = ".")]
        scans: String,

        /// Optional settings template (imParamCT / imParamMR / ...)
        #[arg(long)]
        settings: Option<String>,

        /// Node id to stop after, or ALL
        #[arg(long, default_value = "ALL")]
        stop_at: String,

        /// Write the aggregated results as JSON here instead of stdout
        #[arg(short, long)]
        output: Option<String>,

        /// Save every node's output after the run
        #[arg(long)]
        snapshot: Option<String>,

        /// Only expand the graph and list the pipelines
        #[arg(long)]
        dry_run: bool,
    },
    /// Show what a node produced in a saved snapshot
    Inspect {
        /// Snapshot file written by `run --snapshot`
        snapshot_path: String,
        /// Id of the node to inspect
        node_id: String,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,radiomics_flow=debug")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Run {
            flow_path,
            scans,
            settings,
            stop_at,
            output,
            snapshot,
            dry_run,
        } => run_flow(RunArgs {
            flow_path,
            scans,
            settings,
            stop_at,
            output,
            snapshot,
            dry_run,
        }),
        Command::Inspect {
            snapshot_path,
            node_id,
        } => inspect(&snapshot_path, &node_id),
    }
}

struct RunArgs {
    flow_path: String,
    scans: String,
    settings: Option<String>,
    stop_at: String,
    output: Option<String>,
    snapshot: Option<String>,
    dry_run: bool,
}

fn run_flow(args: RunArgs) {
    let total_start = Instant::now();

    // --- 1. Loading ---
    let flow_json = fs::read_to_string(&args.flow_path).unwrap_or_else(|e| {
        exit_with_error(&format!(
            "Failed to read flow file '{}': {}",
            args.flow_path, e
        ))
    });
    let document = FlowGraphDocument::from_json(&flow_json)
        .unwrap_or_else(|e| exit_with_error(&e.to_string()));
    let image_params = match &args.settings {
        Some(path) => ImageParams::from_file(path).unwrap_or_else(|e| exit_with_error(&e.to_string())),
        None => ImageParams::default(),
    };

    // --- 2. Expansion ---
    let expand_start = Instant::now();
    let mut workflow = ExtractionWorkflow::build_pipelines(
        &document,
        image_params,
        Arc::new(NativeBackend::new()),
        Arc::new(DirectoryStore::new(&args.scans)),
    )
    .unwrap_or_else(|e| exit_with_error(&format!("Pipeline generation failed: {}", e)));
    let expand_duration = expand_start.elapsed();

    eprintln!(
        "Generated {} pipelines in {:?}",
        workflow.pipelines().len(),
        expand_duration
    );
    for pipeline in workflow.pipelines() {
        eprintln!("  -> {}", pipeline.name());
    }
    if args.dry_run {
        return;
    }

    // --- 3. Execution ---
    let run_start = Instant::now();
    let mut progress = |percent: f64, label: &str| eprintln!("[{:>5.1}%] {}", percent, label);
    let results = workflow.run_pipelines(&mut progress, &StopAt::from(args.stop_at.as_str()));
    let run_duration = run_start.elapsed();

    // --- 4. Results ---
    let json = serde_json::to_string_pretty(&results)
        .unwrap_or_else(|e| exit_with_error(&format!("Failed to serialize results: {}", e)));
    match &args.output {
        Some(path) => {
            fs::write(path, json).unwrap_or_else(|e| {
                exit_with_error(&format!("Failed to write results to '{}': {}", path, e))
            });
            eprintln!("Results written to '{}'", path);
        }
        None => println!("{}", json),
    }

    if let Some(path) = &args.snapshot {
        workflow
            .snapshot()
            .save(path)
            .unwrap_or_else(|e| exit_with_error(&e.to_string()));
        eprintln!("Snapshot written to '{}'", path);
    }

    eprintln!("\n--- Performance Summary ---");
    eprintln!("Pipeline Generation:  {:?}", expand_duration);
    eprintln!("Execution:            {:?}", run_duration);
    eprintln!("-----------------------------");
    eprintln!("Total:                {:?}", total_start.elapsed());
}

fn inspect(snapshot_path: &str, node_id: &str) {
    let snapshot =
        WorkflowSnapshot::load(snapshot_path).unwrap_or_else(|e| exit_with_error(&e.to_string()));
    let Some((node, pipeline)) = snapshot.node_output(node_id) else {
        exit_with_error(&format!("Node '{}' is not part of any pipeline", node_id));
    };

    println!("Node {} ({}) in {}", node.id, node.kind, pipeline.name);
    let output = &node.output;
    if let Some(error) = &output.error {
        println!("  error: {}", error);
    }
    for (label, volume) in [("vol", &output.vol), ("vol_texture", &output.vol_texture)] {
        if let Some(volume) = volume {
            let values = volume.finite_values();
            let mean = values.iter().sum::<f64>() / values.len().max(1) as f64;
            println!(
                "  {}: shape {:?}, spacing {:?}, {} finite voxels, mean {:.3}",
                label,
                volume.shape(),
                volume.spacing,
                values.len(),
                mean
            );
        }
    }
    for (label, mask) in [("roi", &output.roi), ("roi_texture", &output.roi_texture)] {
        if let Some(mask) = mask {
            println!("  {}: shape {:?}, {} voxels", label, mask.shape(), mask.count());
        }
    }
    if output.is_empty() {
        println!("  (no output recorded)");
    }
}

fn exit_with_error(message: &str) -> ! {
    eprintln!("\nError: {}", message);
    std::process::exit(1);
}
