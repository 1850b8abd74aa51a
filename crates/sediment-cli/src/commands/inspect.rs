//! `sediment inspect`: Print a layer snapshot.

use anyhow::Context;
use sediment_snapshot::{LayerSnapshot, ProvenanceFields};
use std::path::Path;

pub fn execute(file: &Path, json: bool) -> anyhow::Result<()> {
    let snapshot = LayerSnapshot::from_file(file)
        .with_context(|| format!("Failed to read layer snapshot {}", file.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    let header = snapshot.header();
    println!("Layer:     {}", snapshot.name());
    println!("Version:   {}", header.version);
    println!("Timestamp: {}", header.timestamp);
    if let Some(checksum) = snapshot.checksum() {
        println!("Checksum:  {}", checksum.to_hex());
    }

    println!();
    println!("Types ({}):", snapshot.types().len());
    for record in snapshot.types() {
        println!(
            "  {:<10} {:<24} {}",
            record.id.to_string(),
            record.tag.name(),
            record.name
        );
        print_fields(&record.fields);
    }

    println!();
    println!("Methods ({}):", snapshot.methods().len());
    for record in snapshot.methods() {
        println!(
            "  {:<10} {:<24} {}.{}({})",
            record.id.to_string(),
            record.tag.name(),
            record.owner,
            record.name,
            record.parameter_types.join(", ")
        );
        print_fields(&record.fields);
    }

    Ok(())
}

fn print_fields(fields: &ProvenanceFields) {
    for (tag, value) in fields.iter() {
        println!("{:>14}{} = {}", "", tag, value);
    }
}
