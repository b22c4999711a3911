use std::io::{BufWriter, Write};
use std::path::Path;

use nalgebra::DVector;

use crate::{
    datatypes::ElementStress,
    element::DOF,
    error::{Result, TristressError},
    mesher::Geometry,
};

fn create_file(path: &Path) -> Result<BufWriter<std::fs::File>> {
    match std::fs::File::create(path) {
        Ok(f) => Ok(BufWriter::new(f)),
        Err(err) => Err(TristressError::FileNotFound(format!(
            "Failed to create {}: {err}",
            path.display()
        ))),
    }
}

/// Writes nodal displacements, one `original_id ux uy` line per node in
/// ingestion order
///
/// # Arguments
/// * `result_output` - The path of the result file
/// * `geometry` - The solved geometry
/// * `displacements` - The global displacement vector
pub fn write_results<P: AsRef<Path>>(
    result_output: P,
    geometry: &Geometry,
    displacements: &DVector<f64>,
) -> Result<()> {
    let result_output = result_output.as_ref();
    let mut result_file = create_file(result_output)?;

    for node in geometry.nodes() {
        writeln!(
            result_file,
            "{id} {ux} {uy}",
            id = node.id as i64 + geometry.shift(),
            ux = displacements[DOF * node.id],
            uy = displacements[DOF * node.id + 1],
        )?;
    }
    result_file.flush()?;

    println!("info: wrote displacements to {}", result_output.display());
    Ok(())
}

/// Writes element stresses under a `Sx Sy Sxy S` header, one line per
/// element
///
/// # Arguments
/// * `stress_output` - The path of the stress file
/// * `stresses` - Element stresses in element order
pub fn write_stress<P: AsRef<Path>>(stress_output: P, stresses: &[ElementStress]) -> Result<()> {
    let stress_output = stress_output.as_ref();
    let mut stress_file = create_file(stress_output)?;

    writeln!(stress_file, "Sx Sy Sxy S")?;
    for stress in stresses {
        writeln!(
            stress_file,
            "{} {} {} {}",
            stress.sx, stress.sy, stress.sxy, stress.von_mises
        )?;
    }
    stress_file.flush()?;

    println!("info: wrote element stresses to {}", stress_output.display());
    Ok(())
}
