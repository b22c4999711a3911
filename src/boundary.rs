use std::collections::HashSet;

use nalgebra::DVector;
use nalgebra_sparse::{CooMatrix, CsrMatrix};

use crate::{
    datatypes::{Boundary, BoundaryKind},
    element::DOF,
    error::{Result, TristressError},
    mesher::{Geometry, LOAD_BOUNDARY},
};

/// Collects the degrees of freedom held at zero by the boundary groups
///
/// # Returns
/// Sorted, de-duplicated global DOF indices
pub fn constrained_dofs(boundaries: &[Boundary]) -> Vec<usize> {
    let mut dofs: Vec<usize> = Vec::new();

    for boundary in boundaries {
        for boundary_node in &boundary.nodes {
            let x = DOF * boundary_node.node;
            let y = DOF * boundary_node.node + 1;
            match boundary_node.kind {
                BoundaryKind::FixX => dofs.push(x),
                BoundaryKind::FixY => dofs.push(y),
                BoundaryKind::FixXY => dofs.extend([x, y]),
                BoundaryKind::Load => {}
            }
        }
    }

    dofs.sort_unstable();
    dofs.dedup();
    dofs
}

/// Lumps the edge traction onto the x degrees of freedom of the load
/// group. Each pair of consecutive nodes bounds one segment whose force is
/// split evenly between its ends.
///
/// # Arguments
/// * `geometry` - The loaded geometry; its load group is sorted along y
/// * `traction_intensity` - Force per unit edge length
/// * `loads` - The global load vector
pub fn apply_edge_load(
    geometry: &Geometry,
    traction_intensity: f64,
    loads: &mut DVector<f64>,
) -> Result<()> {
    let load_nodes = match geometry.boundaries().get(LOAD_BOUNDARY) {
        Some(boundary) => &boundary.nodes,
        None => return Ok(()),
    };

    for pair in load_nodes.windows(2) {
        let (first, second) = (pair[0].node, pair[1].node);
        let lookup = |id: usize| {
            geometry
                .node_by_id(id)
                .ok_or(TristressError::NodeNotFound(id as i64 + geometry.shift()))
        };

        let length = (lookup(second)?.y - lookup(first)?.y).abs();
        let force = traction_intensity * length;

        loads[DOF * first] += 0.5 * force;
        loads[DOF * second] += 0.5 * force;
    }

    Ok(())
}

/// Collapses the row and column of every constrained DOF to identity and
/// zeroes its load, so the solve returns exactly zero displacement there
///
/// # Arguments
/// * `stiffness` - The assembled global stiffness matrix
/// * `loads` - The global load vector
/// * `dofs` - Sorted constrained DOF indices
///
/// # Returns
/// The constrained stiffness matrix
pub fn apply_displacement_constraints(
    mut stiffness: CsrMatrix<f64>,
    loads: &mut DVector<f64>,
    dofs: &[usize],
) -> CsrMatrix<f64> {
    let constrained: HashSet<usize> = dofs.iter().copied().collect();
    let mut seen_diagonals: HashSet<usize> = HashSet::new();

    for (row, col, value) in stiffness.triplet_iter_mut() {
        if constrained.contains(&row) || constrained.contains(&col) {
            if row == col {
                *value = 1.0;
                seen_diagonals.insert(row);
            } else {
                *value = 0.0;
            }
        }
    }

    for dof in dofs {
        loads[*dof] = 0.0;
    }

    // nodes that belong to no element have no stored diagonal
    let missing: Vec<usize> = dofs
        .iter()
        .copied()
        .filter(|dof| !seen_diagonals.contains(dof))
        .collect();
    if missing.is_empty() {
        return stiffness;
    }

    println!(
        "warning: {} constrained DOFs have no stiffness, inserting unit diagonal",
        missing.len()
    );
    let mut coo = CooMatrix::from(&stiffness);
    for dof in missing {
        coo.push(dof, dof, 1.0);
    }
    CsrMatrix::from(&coo)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatypes::BoundaryNode;
    use crate::mesher::{FIX_X_BOUNDARY, FIX_Y_BOUNDARY};
    use approx::assert_relative_eq;
    use nalgebra::DMatrix;

    fn group(kind: BoundaryKind, nodes: &[usize]) -> Boundary {
        Boundary {
            nodes: nodes
                .iter()
                .map(|node| BoundaryNode { kind, node: *node })
                .collect(),
        }
    }

    #[test]
    fn dofs_from_groups() {
        let boundaries = vec![
            group(BoundaryKind::FixX, &[0, 2]),
            group(BoundaryKind::FixY, &[0, 1]),
            group(BoundaryKind::Load, &[1, 3]),
        ];
        assert_eq!(constrained_dofs(&boundaries), vec![0, 1, 3, 4]);
    }

    #[test]
    fn fix_both_constrains_two_dofs() {
        let boundaries = vec![
            group(BoundaryKind::FixXY, &[3]),
            group(BoundaryKind::FixX, &[3]),
        ];
        assert_eq!(constrained_dofs(&boundaries), vec![6, 7]);
    }

    #[test]
    fn edge_load_ignores_file_order() {
        let sorted = "*NODE\n1 0.0 0.0\n2 1.0 0.0\n3 1.0 0.5\n4 1.0 2.0\n";
        let shuffled = "*NODE\n1 0.0 0.0\n4 1.0 2.0\n2 1.0 0.0\n3 1.0 0.5\n";

        let mut expected = DVector::zeros(8);
        apply_edge_load(&Geometry::parse(sorted, 1.0).unwrap(), 10.0, &mut expected).unwrap();
        let mut loads = DVector::zeros(8);
        apply_edge_load(&Geometry::parse(shuffled, 1.0).unwrap(), 10.0, &mut loads).unwrap();

        assert_relative_eq!(expected[2], 2.5);
        assert_relative_eq!(expected[4], 10.0);
        assert_relative_eq!(expected[6], 7.5);
        assert_eq!(loads, expected);
    }

    #[test]
    fn single_node_edge_has_no_load() {
        let geometry = Geometry::parse("*NODE\n1 0.0 0.0\n2 1.0 0.0\n", 1.0).unwrap();
        let mut loads = DVector::zeros(4);
        apply_edge_load(&geometry, 10.0, &mut loads).unwrap();
        assert!(loads.iter().all(|f| *f == 0.0));
    }

    #[test]
    fn constrained_rows_and_columns_become_identity() {
        let dense = DMatrix::from_row_slice(
            3,
            3,
            &[
                4.0, -1.0, 2.0, //
                -1.0, 5.0, -3.0, //
                2.0, -3.0, 6.0,
            ],
        );
        let stiffness = CsrMatrix::from(&dense);
        let mut loads = DVector::from_vec(vec![1.0, 2.0, 3.0]);

        let constrained = apply_displacement_constraints(stiffness, &mut loads, &[1]);
        let result = DMatrix::from(&constrained);

        let expected = DMatrix::from_row_slice(
            3,
            3,
            &[
                4.0, 0.0, 2.0, //
                0.0, 1.0, 0.0, //
                2.0, 0.0, 6.0,
            ],
        );
        assert_eq!(result, expected);
        assert_eq!(loads, DVector::from_vec(vec![1.0, 0.0, 3.0]));
    }

    #[test]
    fn missing_diagonal_is_inserted() {
        let coo = CooMatrix::try_from_triplets(4, 4, vec![0, 1], vec![0, 1], vec![2.0, 3.0])
            .unwrap();
        let stiffness = CsrMatrix::from(&coo);
        let mut loads = DVector::zeros(4);

        let constrained = apply_displacement_constraints(stiffness, &mut loads, &[1, 3]);
        let result = DMatrix::from(&constrained);

        assert_eq!(result[(0, 0)], 2.0);
        assert_eq!(result[(1, 1)], 1.0);
        assert_eq!(result[(3, 3)], 1.0);
        assert_eq!(result[(2, 2)], 0.0);
    }

    #[test]
    fn group_indices_match_mesher() {
        let geometry = Geometry::parse("*NODE\n1 0.0 0.0\n2 1.0 0.0\n3 0.0 1.0\n", 1.0).unwrap();
        let boundaries = geometry.boundaries();
        assert!(boundaries[FIX_X_BOUNDARY]
            .nodes
            .iter()
            .all(|b| b.kind == BoundaryKind::FixX));
        assert!(boundaries[FIX_Y_BOUNDARY]
            .nodes
            .iter()
            .all(|b| b.kind == BoundaryKind::FixY));
        assert_eq!(constrained_dofs(boundaries), vec![0, 1, 3, 4]);
    }
}
