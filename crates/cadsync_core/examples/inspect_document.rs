//! Example: Load a JSON document, print its node tree and import it.
//!
//! Run with: cargo run --example inspect_document -- demos/linking.json

use std::env;
use std::path::Path;

use cadsync_core::document::{load_appearance_from_str, load_document_from_str};
use cadsync_core::import::classify;
use cadsync_core::{
    import_document, CollectingReport, Document, ImportConfig, NodeId, SceneDatabase, Severity,
    StoredKernel,
};

fn print_node(document: &Document, id: NodeId, depth: usize) {
    let Some(node) = document.node(id) else {
        return;
    };
    println!(
        "{}- {} '{}' ({}) {:?}{}",
        "  ".repeat(depth),
        node.name,
        node.label,
        node.type_id,
        classify(document, id, node),
        if node.visibility { "" } else { " [hidden]" }
    );
    for &child in node.group.iter().chain(&node.elements) {
        print_node(document, child, depth + 1);
    }
    for child in document.host_children(id) {
        print_node(document, child, depth + 1);
    }
    if let Some(target) = node.link_target.and_then(|t| document.node(t)) {
        println!("{}  -> {}", "  ".repeat(depth), target.name);
    }
}

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        println!("Usage: inspect_document <path-to-json-document>");
        println!("\nExamples:");
        println!("  cargo run --example inspect_document -- demos/linking.json");
        return;
    }

    let path = Path::new(&args[1]);
    println!("Loading document: {}", path.display());

    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            eprintln!("Error reading document: {}", e);
            return;
        }
    };
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let loaded = load_document_from_str(&content, &file_name)
        .and_then(|document| Ok((document, load_appearance_from_str(&content)?)));
    let (document, appearance) = match loaded {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error loading document: {}", e);
            return;
        }
    };

    println!("\n=== Document: {} ===", document.name);
    println!("Nodes: {}", document.len());
    println!("Appearance entries: {}", appearance.len());

    println!("\n--- Tree ---");
    for root in document.root_nodes() {
        print_node(&document, root, 0);
    }

    let mut scene = SceneDatabase::new();
    let mut report = CollectingReport::new();
    match import_document(
        &mut scene,
        &document,
        &appearance,
        &ImportConfig::default(),
        &StoredKernel,
        &mut report,
    ) {
        Ok(summary) => {
            println!("\n--- Import ---");
            println!("Objects touched: {}", summary.objects_touched);
            println!("Meshes touched: {}", summary.meshes_touched);
            println!("Skipped: {}", summary.skipped);

            println!("\n--- Objects ---");
            for (_, object) in scene.objects.iter() {
                let pos = object.transform.location;
                println!(
                    "  {} at ({:.3}, {:.3}, {:.3})",
                    object.name, pos.x, pos.y, pos.z
                );
            }
        }
        Err(e) => {
            eprintln!("Error importing document: {}", e);
        }
    }

    for severity in [Severity::Warning, Severity::Error] {
        for message in report.messages(severity) {
            println!("{}: {}", severity, message);
        }
    }
}
