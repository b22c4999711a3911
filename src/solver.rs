use std::path::Path;

use indicatif::ProgressBar;
use nalgebra::{matrix, DMatrix, DVector, Matrix3};
use nalgebra_sparse::{factorization::CscCholesky, CooMatrix, CscMatrix, CsrMatrix};

use crate::{
    boundary,
    datatypes::{ElementStress, ModelMetadata},
    element::DOF,
    error::{Result, TristressError},
    mesher::Geometry,
};

/// Pipeline stages of one analysis, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Unloaded,
    Loaded,
    Assembled,
    Constrained,
    Solved,
    StressAvailable,
}

/// Calculates the plane stress stress-strain matrix
///
/// # Arguments
/// * `poisson_ratio` - The poisson ratio for the model
/// * `youngs_modulus` - The modulus of elasticity of the model
///
/// # Returns
/// A 3x3 stress-strain matrix
pub fn compute_stress_strain_matrix(poisson_ratio: f64, youngs_modulus: f64) -> Matrix3<f64> {
    let mut stress_strain_mat: Matrix3<f64> = matrix![
        1.0, poisson_ratio, 0.0;
        poisson_ratio, 1.0, 0.0;
        0.0, 0.0, (1.0 - poisson_ratio)/2.0;
    ];

    stress_strain_mat *= youngs_modulus / (1.0 - f64::powi(poisson_ratio, 2));

    stress_strain_mat
}

/// Smallest accepted ratio of a squared Cholesky pivot to the matching
/// stiffness diagonal
const PIVOT_TOLERANCE: f64 = 1e-10;

/// Rejects factorizations whose pivots collapsed relative to the stiffness
/// diagonal, which happens when rigid body motion is left unconstrained
fn check_pivots(stiffness: &CsrMatrix<f64>, cholesky: &CscCholesky<f64>) -> Result<()> {
    let mut diagonal = vec![0.0; stiffness.nrows()];
    for (row, col, value) in stiffness.triplet_iter() {
        if row == col {
            diagonal[row] += *value;
        }
    }

    // CscCholesky factors without a fill-reducing permutation, so L's rows match K's
    for (row, col, pivot) in cholesky.l().triplet_iter() {
        if row != col {
            continue;
        }
        if diagonal[row] <= 0.0 || pivot * pivot < PIVOT_TOLERANCE * diagonal[row] {
            return Err(TristressError::SingularSystem(format!(
                "pivot of degree of freedom {row} (node {}) vanished, the structure is not sufficiently supported",
                row / DOF
            )));
        }
    }

    Ok(())
}

/// Owns the geometry and the global system of one analysis and drives it
/// through the pipeline stages
#[derive(Debug)]
pub struct Solver {
    metadata: ModelMetadata,
    stress_strain_mat: Matrix3<f64>,
    stage: Stage,
    geometry: Geometry,
    stiffness: CsrMatrix<f64>,
    loads: DVector<f64>,
    displacements: DVector<f64>,
    constrained_dofs: Vec<usize>,
}

impl Solver {
    pub fn new(metadata: ModelMetadata) -> Solver {
        let stress_strain_mat =
            compute_stress_strain_matrix(metadata.poisson_ratio, metadata.youngs_modulus);

        Solver {
            metadata,
            stress_strain_mat,
            stage: Stage::Unloaded,
            geometry: Geometry::default(),
            stiffness: CsrMatrix::zeros(0, 0),
            loads: DVector::zeros(0),
            displacements: DVector::zeros(0),
            constrained_dofs: Vec::new(),
        }
    }

    fn require(&self, operation: &'static str, required: Stage) -> Result<()> {
        if self.stage != required {
            return Err(TristressError::Stage {
                operation,
                required,
                current: self.stage,
            });
        }
        Ok(())
    }

    /// Loads the mesh and sizes the global system
    ///
    /// # Arguments
    /// * `mesh_file` - Path to the keyword mesh file
    pub fn load_geometry<P: AsRef<Path>>(&mut self, mesh_file: P) -> Result<()> {
        self.require("load_geometry", Stage::Unloaded)?;

        let geometry = Geometry::load_from_file(mesh_file, self.metadata.right_edge_x)?;
        self.set_geometry(geometry)
    }

    /// Uses an already parsed geometry and sizes the global system
    pub fn set_geometry(&mut self, geometry: Geometry) -> Result<()> {
        self.require("set_geometry", Stage::Unloaded)?;

        let num_dofs = DOF * geometry.nodes().len();

        self.geometry = geometry;
        self.stiffness = CsrMatrix::zeros(num_dofs, num_dofs);
        self.loads = DVector::zeros(num_dofs);
        self.displacements = DVector::zeros(num_dofs);
        self.stage = Stage::Loaded;

        Ok(())
    }

    /// Collects every element's stiffness triplets and builds the global
    /// stiffness matrix in one pass. Entries sharing a position are summed.
    pub fn build_stiffness_matrix(&mut self) -> Result<()> {
        self.require("build_stiffness_matrix", Stage::Loaded)?;

        let num_dofs = self.loads.len();
        let elements = self.geometry.elements();
        let nodes = self.geometry.nodes();

        println!("info: building element stiffness matrices...");
        let bar = ProgressBar::new(elements.len() as u64);
        let mut stiffness_coo = CooMatrix::new(num_dofs, num_dofs);
        for element in elements {
            for triplet in element.stiffness_triplets(nodes, &self.stress_strain_mat) {
                stiffness_coo.push(triplet.row, triplet.col, triplet.value);
            }
            bar.inc(1);
        }
        bar.finish_and_clear();

        self.stiffness = CsrMatrix::from(&stiffness_coo);
        println!(
            "info: built {num_dofs}x{num_dofs} stiffness matrix with {} stored entries",
            self.stiffness.nnz()
        );

        self.stage = Stage::Assembled;
        Ok(())
    }

    /// Applies the edge load to the load vector, then holds the fixed
    /// degrees of freedom at zero
    pub fn apply_boundary_conditions(&mut self) -> Result<()> {
        self.require("apply_boundary_conditions", Stage::Assembled)?;

        println!("info: applying loads...");
        boundary::apply_edge_load(
            &self.geometry,
            self.metadata.traction_intensity,
            &mut self.loads,
        )?;

        self.constrained_dofs = boundary::constrained_dofs(self.geometry.boundaries());
        let stiffness = std::mem::replace(&mut self.stiffness, CsrMatrix::zeros(0, 0));
        self.stiffness =
            boundary::apply_displacement_constraints(stiffness, &mut self.loads, &self.constrained_dofs);
        println!(
            "info: constrained {} degrees of freedom",
            self.constrained_dofs.len()
        );

        self.stage = Stage::Constrained;
        Ok(())
    }

    /// Solves `K u = f` with a sparse Cholesky factorization
    pub fn solve(&mut self) -> Result<()> {
        self.require("solve", Stage::Constrained)?;

        println!("info: solving...");
        let start = std::time::Instant::now();

        let stiffness_csc = CscMatrix::from(&self.stiffness);
        let cholesky = match CscCholesky::factor(&stiffness_csc) {
            Ok(c) => c,
            Err(err) => {
                return Err(TristressError::SingularSystem(format!(
                    "Cholesky factorization failed: {err:?}"
                )))
            }
        };
        check_pivots(&self.stiffness, &cholesky)?;

        let rhs = DMatrix::from_column_slice(self.loads.len(), 1, self.loads.as_slice());
        let solution = cholesky.solve(&rhs);

        if solution.iter().any(|u| !u.is_finite()) {
            return Err(TristressError::SingularSystem(
                "solution contains non-finite displacements".to_owned(),
            ));
        }
        self.displacements = solution.column(0).into_owned();

        let elapsed = start.elapsed().as_secs_f32();
        println!("info: solved system in {:.3} seconds", elapsed);

        self.stage = Stage::Solved;
        Ok(())
    }

    /// Calculates the stress in every element
    ///
    /// # Returns
    /// One entry per element, in element ingestion order
    pub fn compute_stress(&mut self) -> Result<Vec<ElementStress>> {
        if self.stage < Stage::Solved {
            return Err(TristressError::Stage {
                operation: "compute_stress",
                required: Stage::Solved,
                current: self.stage,
            });
        }

        let nodes = self.geometry.nodes();
        let stresses = self
            .geometry
            .elements()
            .iter()
            .map(|element| {
                let sigma = element.stress(nodes, &self.displacements, &self.stress_strain_mat);
                ElementStress::from_components(sigma[0], sigma[1], sigma[2])
            })
            .collect();

        self.stage = Stage::StressAvailable;
        Ok(stresses)
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    pub fn stress_strain_matrix(&self) -> &Matrix3<f64> {
        &self.stress_strain_mat
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// Mutable geometry access for deformed-geometry studies. Call
    /// [`Geometry::update_operators`] after moving nodes.
    pub fn geometry_mut(&mut self) -> &mut Geometry {
        &mut self.geometry
    }

    pub fn stiffness_matrix(&self) -> &CsrMatrix<f64> {
        &self.stiffness
    }

    pub fn load_vector(&self) -> &DVector<f64> {
        &self.loads
    }

    /// Nodal displacements, meaningful once the system is solved
    pub fn displacements(&self) -> &DVector<f64> {
        &self.displacements
    }

    pub fn constrained_dofs(&self) -> &[usize] {
        &self.constrained_dofs
    }
}

/// Returns the element stress with the largest von Mises value
pub fn max_stress(stresses: &[ElementStress]) -> Option<&ElementStress> {
    stresses
        .iter()
        .max_by(|a, b| a.von_mises.total_cmp(&b.von_mises))
}

/// Runs the whole pipeline on a mesh file
///
/// # Arguments
/// * `mesh_file` - Path to the keyword mesh file
/// * `metadata` - Material and load parameters
///
/// # Returns
/// The solved system and the stress of every element
pub fn run<P: AsRef<Path>>(
    mesh_file: P,
    metadata: ModelMetadata,
) -> Result<(Solver, Vec<ElementStress>)> {
    let mut solver = Solver::new(metadata);

    solver.load_geometry(mesh_file)?;
    solver.build_stiffness_matrix()?;
    solver.apply_boundary_conditions()?;
    solver.solve()?;
    let stresses = solver.compute_stress()?;

    println!("info: solve complete");

    Ok((solver, stresses))
}
