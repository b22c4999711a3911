use std::path::PathBuf;

use clap::Parser;

use tristress::{
    datatypes::ModelMetadata,
    input::{self, PartialMetadata},
    post_processor, solver, TristressError,
};

/// Plane stress analysis of a triangle mesh
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Keyword mesh file with *NODE and *ELEMENT_SHELL sections
    mesh: PathBuf,

    /// JSON input file with a metadata section
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Poisson ratio, overrides the input file
    #[arg(long)]
    poisson_ratio: Option<f64>,

    /// Young's modulus, overrides the input file
    #[arg(long)]
    youngs_modulus: Option<f64>,

    /// x coordinate of the loaded edge
    #[arg(long)]
    right_edge_x: Option<f64>,

    /// Force per unit length on the loaded edge
    #[arg(long)]
    traction: Option<f64>,

    /// Output file for nodal displacements
    #[arg(long, default_value = "result.txt")]
    result: PathBuf,

    /// Output file for element stresses
    #[arg(long, default_value = "stress.txt")]
    stress: PathBuf,
}

fn build_metadata(args: &Args) -> Result<ModelMetadata, TristressError> {
    let from_file = match &args.input {
        Some(input_file) => input::load_partial_metadata(input_file)?,
        None => PartialMetadata::default(),
    };

    let overrides = PartialMetadata {
        poisson_ratio: args.poisson_ratio,
        youngs_modulus: args.youngs_modulus,
        right_edge_x: args.right_edge_x,
        traction_intensity: args.traction,
    };

    let metadata = from_file.overridden_by(overrides).resolve()?;
    println!(
        "info: using E = {}, nu = {}",
        metadata.youngs_modulus, metadata.poisson_ratio
    );

    Ok(metadata)
}

fn run(args: &Args) -> Result<(), TristressError> {
    let metadata = build_metadata(args)?;

    println!("info: loading mesh from {}...", args.mesh.display());
    let (solver, stresses) = solver::run(&args.mesh, metadata)?;

    if let Some(max) = solver::max_stress(&stresses) {
        println!("Max stresses:");
        println!("Sx\tSy\tSxy\tS");
        println!("{}\t{}\t{}\t{}", max.sx, max.sy, max.sxy, max.von_mises);
    }

    post_processor::write_results(&args.result, solver.geometry(), solver.displacements())?;
    post_processor::write_stress(&args.stress, &stresses)?;

    Ok(())
}

fn main() {
    let args = Args::parse();

    if let Err(err) = run(&args) {
        eprintln!("error: {err}");
        std::process::exit(1)
    }
}
