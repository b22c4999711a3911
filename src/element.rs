use nalgebra::{matrix, DVector, Matrix3, SMatrix, Vector3};

use crate::{
    datatypes::{Node, Triplet},
    error::{Result, TristressError},
};

pub const DOF: usize = 2;

/// Relative tolerance on `det(C)` below which a triangle is considered
/// collinear, scaled by the squared longest edge.
const DEGENERATE_TOLERANCE: f64 = 1e-12;

/// Capabilities every element kernel provides to the assembler and to
/// stress recovery.
///
/// Elements refer to nodes by their position in the node arena owned by
/// the geometry, so every method that needs coordinates takes that arena.
pub trait Element: std::fmt::Debug {
    /// Positions of this element's nodes in the node arena
    fn node_indices(&self) -> &[usize];

    /// Returns the node at `local_id`, or `None` when out of range
    fn node<'a>(&self, nodes: &'a [Node], local_id: usize) -> Option<&'a Node> {
        self.node_indices()
            .get(local_id)
            .and_then(|index| nodes.get(*index))
    }

    /// Calculates the area of the element from the current coordinates
    fn area(&self, nodes: &[Node]) -> f64;

    /// Computes the element stiffness contribution as global triplets
    ///
    /// # Arguments
    /// * `nodes` - The node arena
    /// * `stress_strain_mat` - The constitutive matrix of the model
    fn stiffness_triplets(&self, nodes: &[Node], stress_strain_mat: &Matrix3<f64>)
        -> Vec<Triplet>;

    /// Calculates `[sx, sy, sxy]` from the global displacement vector
    fn stress(
        &self,
        nodes: &[Node],
        displacements: &DVector<f64>,
        stress_strain_mat: &Matrix3<f64>,
    ) -> Vector3<f64>;

    /// Re-derives the cached strain-displacement operator. Must be called
    /// after node coordinates change.
    fn update_b(&mut self, nodes: &[Node]) -> Result<()>;
}

/// Three-node constant strain triangle
#[derive(Debug, Clone)]
pub struct LinearTriangle {
    nodes: [usize; 3],
    b: SMatrix<f64, 3, 6>,
}

impl LinearTriangle {
    /// Creates the element and derives its strain-displacement operator
    ///
    /// # Arguments
    /// * `nodes` - Positions of the three nodes in the node arena
    /// * `arena` - The node arena
    pub fn new(nodes: [usize; 3], arena: &[Node]) -> Result<LinearTriangle> {
        let mut element = LinearTriangle {
            nodes,
            b: SMatrix::zeros(),
        };
        element.update_b(arena)?;
        Ok(element)
    }

    /// The cached strain-displacement matrix
    pub fn strain_displacement_matrix(&self) -> &SMatrix<f64, 3, 6> {
        &self.b
    }

    fn vertices<'a>(&self, arena: &'a [Node]) -> [&'a Node; 3] {
        self.nodes.map(|i| &arena[i])
    }

    /// Computes the dense 6x6 stiffness matrix `B^T D B A`
    pub fn stiffness_matrix(
        &self,
        arena: &[Node],
        stress_strain_mat: &Matrix3<f64>,
    ) -> SMatrix<f64, 6, 6> {
        (self.b.transpose() * stress_strain_mat) * self.b * self.area(arena)
    }
}

impl Element for LinearTriangle {
    fn node_indices(&self) -> &[usize] {
        &self.nodes
    }

    fn area(&self, nodes: &[Node]) -> f64 {
        let [v0, v1, v2] = self.vertices(nodes);

        let det = v1.x * v2.y + v2.x * v0.y + v0.x * v1.y
            - v1.x * v0.y
            - v2.x * v1.y
            - v0.x * v2.y;

        0.5 * det.abs()
    }

    fn stiffness_triplets(
        &self,
        nodes: &[Node],
        stress_strain_mat: &Matrix3<f64>,
    ) -> Vec<Triplet> {
        let stiffness_mat = self.stiffness_matrix(nodes, stress_strain_mat);
        let ids = self.vertices(nodes).map(|n| n.id);

        let mut triplets = Vec::with_capacity(36);
        for (local_row, node_row) in ids.iter().enumerate() {
            for (local_col, node_col) in ids.iter().enumerate() {
                for (dr, dc) in [(0, 0), (0, 1), (1, 0), (1, 1)] {
                    triplets.push(Triplet {
                        row: DOF * node_row + dr,
                        col: DOF * node_col + dc,
                        value: stiffness_mat[(DOF * local_row + dr, DOF * local_col + dc)],
                    });
                }
            }
        }

        triplets
    }

    fn stress(
        &self,
        nodes: &[Node],
        displacements: &DVector<f64>,
        stress_strain_mat: &Matrix3<f64>,
    ) -> Vector3<f64> {
        let [v0, v1, v2] = self.vertices(nodes);

        let nodal_displacements: SMatrix<f64, 6, 1> = SMatrix::from([
            displacements[DOF * v0.id],
            displacements[DOF * v0.id + 1],
            displacements[DOF * v1.id],
            displacements[DOF * v1.id + 1],
            displacements[DOF * v2.id],
            displacements[DOF * v2.id + 1],
        ]);

        stress_strain_mat * self.b * nodal_displacements
    }

    fn update_b(&mut self, nodes: &[Node]) -> Result<()> {
        let [v0, v1, v2] = self.vertices(nodes);

        let c = matrix![
            1.0, v0.x, v0.y;
            1.0, v1.x, v1.y;
            1.0, v2.x, v2.y;
        ];

        let longest_edge_sq = [(v0, v1), (v1, v2), (v2, v0)]
            .iter()
            .map(|(a, b)| (a.x - b.x).powi(2) + (a.y - b.y).powi(2))
            .fold(0.0, f64::max);

        let ids = [v0.id, v1.id, v2.id];
        if c.determinant().abs() <= DEGENERATE_TOLERANCE * longest_edge_sq {
            return Err(TristressError::DegenerateElement(format!(
                "triangle on nodes {ids:?} is collinear or has coincident nodes"
            )));
        }
        let ic = c.try_inverse().ok_or_else(|| {
            TristressError::DegenerateElement(format!(
                "coordinate matrix of triangle on nodes {ids:?} is singular"
            ))
        })?;

        self.b = matrix![
            ic[(1, 0)], 0.0, ic[(1, 1)], 0.0, ic[(1, 2)], 0.0;
            0.0, ic[(2, 0)], 0.0, ic[(2, 1)], 0.0, ic[(2, 2)];
            ic[(2, 0)], ic[(1, 0)], ic[(2, 1)], ic[(1, 1)], ic[(2, 2)], ic[(1, 2)];
        ];

        Ok(())
    }
}
