//! `sediment stubs`: Show the runtime vtable stub section.

use anyhow::Context;
use sediment_provenance::{LayerOptions, RuntimeStubAllocator};
use std::path::Path;

pub fn execute(config: Option<&Path>) -> anyhow::Result<()> {
    let options = match config {
        Some(path) => LayerOptions::from_file(path)
            .with_context(|| format!("Failed to load layer options {}", path.display()))?,
        None => LayerOptions::default(),
    };

    println!("Layer:                 {}", options.layer_name);
    println!("Runtime class loading: {}", options.runtime_class_loading);

    let allocator = RuntimeStubAllocator::new();
    let Some(section) = allocator.allocate(&options)? else {
        println!("No stub section reserved.");
        return Ok(());
    };

    println!(
        "Stub section:          {} slots, {} bytes",
        section.slot_count(),
        section.size()
    );
    println!();
    for stub in section.stubs() {
        println!("  {:>5}  {:#08x}  {}", stub.slot, stub.offset, stub.symbol);
    }
    Ok(())
}
