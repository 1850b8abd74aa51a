//! `sediment verify`: Check a layer snapshot for consistency.

use crate::output::StyledOutput;
use sediment_provenance::{MethodProvenance, TypeProvenance};
use sediment_snapshot::LayerSnapshot;
use std::path::Path;
use termcolor::ColorChoice;

pub fn execute(file: &Path, color: ColorChoice) -> anyhow::Result<()> {
    let mut out = StyledOutput::new(color);

    // Decoding verifies the header, the checksum and every record's field set
    let snapshot = match LayerSnapshot::from_file(file) {
        Ok(snapshot) => snapshot,
        Err(e) => {
            out.fail(&format!("{}: {}", file.display(), e));
            anyhow::bail!("layer snapshot {} is invalid", file.display());
        }
    };
    out.pass(&format!(
        "{} decoded ({} types, {} methods)",
        snapshot.name(),
        snapshot.types().len(),
        snapshot.methods().len()
    ));

    let mut failures = 0;

    for record in snapshot.types() {
        if let Err(e) = TypeProvenance::from_fields(record.id, record.tag, &record.fields) {
            out.fail(&e.to_string());
            failures += 1;
        }
    }
    for record in snapshot.methods() {
        if let Err(e) = MethodProvenance::from_fields(record.id, record.tag, &record.fields) {
            out.fail(&e.to_string());
            failures += 1;
        }
    }
    if failures == 0 {
        out.pass("provenance fields");
    }

    match snapshot.check_references() {
        Ok(()) => out.pass("sibling references"),
        Err(e) => {
            out.fail(&e.to_string());
            failures += 1;
        }
    }

    if failures > 0 {
        anyhow::bail!("{} check(s) failed for {}", failures, file.display());
    }
    Ok(())
}
