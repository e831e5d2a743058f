//! cadsync - import CAD documents into a persisted scene.
//!
//! Usage: cadsync <document.json>... [--config <config.json>] [--state <scene.json>]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use cadsync_core::{
    ImportConfig, Importer, JsonDocumentProvider, LogReport, SceneDatabase, StoredKernel,
};

const DEFAULT_STATE: &str = "scene.json";

struct Args {
    documents: Vec<PathBuf>,
    config: Option<PathBuf>,
    state: PathBuf,
}

fn parse_args() -> Result<Args> {
    let mut documents = Vec::new();
    let mut config = None;
    let mut state = PathBuf::from(DEFAULT_STATE);

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                config = Some(PathBuf::from(
                    args.next().context("--config needs a file path")?,
                ));
            }
            "--state" => {
                state = PathBuf::from(args.next().context("--state needs a file path")?);
            }
            "-h" | "--help" => {
                print_usage();
                std::process::exit(0);
            }
            flag if flag.starts_with("--") => bail!("Unknown option: {}", flag),
            _ => documents.push(PathBuf::from(arg)),
        }
    }

    if documents.is_empty() {
        print_usage();
        bail!("No documents given");
    }
    Ok(Args {
        documents,
        config,
        state,
    })
}

fn print_usage() {
    println!("Usage: cadsync <document.json>... [--config <config.json>] [--state <scene.json>]");
    println!("\nOptions:");
    println!("  --config <file>  Import options as JSON (defaults apply to missing keys)");
    println!("  --state <file>   Scene state to update (default: {})", DEFAULT_STATE);
}

fn load_config(path: Option<&Path>) -> Result<ImportConfig> {
    let Some(path) = path else {
        return Ok(ImportConfig::default());
    };
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config '{}'", path.display()))?;
    ImportConfig::from_json(&content)
        .with_context(|| format!("Invalid config '{}'", path.display()))
}

fn load_state(path: &Path) -> Result<SceneDatabase> {
    if !path.exists() {
        log::info!("No scene state at '{}', starting empty", path.display());
        return Ok(SceneDatabase::new());
    }
    SceneDatabase::load(path)
        .with_context(|| format!("Failed to load scene state '{}'", path.display()))
}

fn main() -> Result<()> {
    env_logger::init();

    let args = parse_args()?;
    let config = load_config(args.config.as_deref())?;
    let mut scene = load_state(&args.state)?;

    let mut importer = Importer::new(
        JsonDocumentProvider::new(),
        StoredKernel,
        LogReport::default(),
        config,
    );
    let summaries = importer
        .import_files(&mut scene, &args.documents)
        .context("Import failed")?;

    for summary in &summaries {
        println!(
            "{}: {} roots, {} objects, {} meshes, {} skipped",
            summary.document,
            summary.roots,
            summary.objects_touched,
            summary.meshes_touched,
            summary.skipped
        );
    }

    println!("\n=== Scene ===");
    println!("Collections:  {}", scene.collections.len());
    println!("Empties:      {}", scene.empty_count());
    println!("Mesh objects: {}", scene.mesh_object_count());
    println!("Meshes:       {}", scene.meshes.len());
    println!("Materials:    {}", scene.materials.len());
    println!("Warnings:     {}", importer.report().warnings);

    scene
        .save(&args.state)
        .with_context(|| format!("Failed to save scene state '{}'", args.state.display()))?;
    log::info!("Saved scene state to '{}'", args.state.display());
    Ok(())
}
