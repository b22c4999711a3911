use std::path::PathBuf;

use approx::{assert_abs_diff_eq, assert_relative_eq};
use nalgebra::DMatrix;
use tristress::{
    datatypes::ModelMetadata, input, mesher::LOAD_BOUNDARY, post_processor, solver, Geometry,
    Solver, Stage, TristressError,
};

fn fixture_path(name: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests/data");
    path.push(name);
    path
}

fn simple_metadata() -> ModelMetadata {
    input::load_metadata(fixture_path("input.json")).expect("input fixture should load")
}

#[test]
fn load_absent_file() {
    let mut solver = Solver::new(simple_metadata());
    let result = solver.load_geometry(fixture_path("mesh_not_exist.k"));

    assert!(matches!(result, Err(TristressError::FileNotFound(_))));
    assert_eq!(solver.stage(), Stage::Unloaded);
}

#[test]
fn simple_patch_step_by_step() {
    let mut solver = Solver::new(simple_metadata());
    solver.load_geometry(fixture_path("mesh_simple.k")).unwrap();

    let geometry = solver.geometry();
    assert_eq!(geometry.shift(), 1);
    assert_eq!(geometry.nodes().len(), 4);
    assert_eq!(geometry.elements().len(), 2);
    assert_eq!(geometry.boundaries()[0].nodes.len(), 2);

    solver.build_stiffness_matrix().unwrap();
    let assembled = DMatrix::from(solver.stiffness_matrix());
    assert_abs_diff_eq!(assembled, assembled.transpose(), epsilon = 1e-9);

    solver.apply_boundary_conditions().unwrap();
    let expected_loads = [0.0, 0.0, 300.0, 0.0, 0.0, 0.0, 300.0, 0.0];
    for (value, expected) in solver.load_vector().iter().zip(expected_loads) {
        assert_relative_eq!(*value, expected);
    }

    let constrained = DMatrix::from(solver.stiffness_matrix());
    for dof in [0, 1, 3, 4] {
        assert_eq!(constrained[(dof, dof)], 1.0);
    }

    solver.solve().unwrap();
    let u = solver.displacements();
    assert_abs_diff_eq!(u[0], 0.0);
    assert_abs_diff_eq!(u[4], 0.0);

    let stresses = solver.compute_stress().unwrap();
    assert_eq!(stresses.len(), 2);
    assert_eq!(solver.stage(), Stage::StressAvailable);
}

#[test]
fn shuffled_edge_is_loaded_uniformly() {
    let metadata = ModelMetadata::new(0.3, 2.0e11);
    let (solver, stresses) = solver::run(fixture_path("mesh_shuffled_edge.k"), metadata).unwrap();

    let geometry = solver.geometry();
    let edge: Vec<i64> = geometry.boundaries()[LOAD_BOUNDARY]
        .nodes
        .iter()
        .map(|b| b.node as i64 + geometry.shift())
        .collect();
    assert_eq!(edge, vec![3, 6, 9, 12]);

    let loads = solver.load_vector();
    let load_at = |external: i64| loads[2 * geometry.node_by_external_id(external).unwrap().id];
    assert_relative_eq!(load_at(3), 0.5e5, max_relative = 1e-12);
    assert_relative_eq!(load_at(6), 1.0e5, max_relative = 1e-12);
    assert_relative_eq!(load_at(9), 1.0e5, max_relative = 1e-12);
    assert_relative_eq!(load_at(12), 0.5e5, max_relative = 1e-12);

    assert_eq!(stresses.len(), 12);
    for stress in &stresses {
        assert_relative_eq!(stress.sx, 1.0e6, max_relative = 1e-8);
        assert_relative_eq!(stress.von_mises, 1.0e6, max_relative = 1e-8);
    }
}

#[test]
fn deformed_geometry_changes_operators_only_after_update() {
    let mut geometry = Geometry::load_from_file(fixture_path("mesh_simple.k"), 0.15).unwrap();
    let d = solver::compute_stress_strain_matrix(0.3, 2000.0);
    let before = geometry.elements()[0].stiffness_triplets(geometry.nodes(), &d);

    let index = geometry
        .nodes()
        .iter()
        .position(|n| n.id == 3)
        .unwrap();
    geometry.node_mut(index).unwrap().y = 1.2;

    // area is live, B is cached
    let stale = geometry.elements()[0].stiffness_triplets(geometry.nodes(), &d);
    assert_ne!(stale, before);

    geometry.update_operators().unwrap();
    let updated = geometry.elements()[0].stiffness_triplets(geometry.nodes(), &d);
    assert_ne!(updated, stale);
}

#[test]
fn writes_result_and_stress_files() {
    let (solver, stresses) = solver::run(fixture_path("mesh_simple.k"), simple_metadata()).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let result_path = dir.path().join("result.txt");
    let stress_path = dir.path().join("stress.txt");

    post_processor::write_results(&result_path, solver.geometry(), solver.displacements()).unwrap();
    post_processor::write_stress(&stress_path, &stresses).unwrap();

    let result = std::fs::read_to_string(&result_path).unwrap();
    let ids: Vec<&str> = result
        .lines()
        .map(|line| line.split_whitespace().next().unwrap())
        .collect();
    assert_eq!(ids, vec!["1", "2", "4", "3"]);

    let stress = std::fs::read_to_string(&stress_path).unwrap();
    assert_eq!(stress.lines().count(), 3);
    assert_eq!(stress.lines().next(), Some("Sx Sy Sxy S"));
}
