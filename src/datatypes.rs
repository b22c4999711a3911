pub const DEFAULT_POISSON_RATIO: f64 = 0.3;
pub const DEFAULT_RIGHT_EDGE_X: f64 = 0.15;
pub const DEFAULT_TRACTION_INTENSITY: f64 = 1.0e6;

/// A mesh node. `id` is the normalized id, so `2 * id` and `2 * id + 1`
/// are its x and y degrees of freedom.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: usize,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryKind {
    FixX,
    FixY,
    FixXY,
    Load,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundaryNode {
    pub kind: BoundaryKind,
    pub node: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Boundary {
    pub nodes: Vec<BoundaryNode>,
}

/// One entry of a sparse matrix under construction. Entries sharing
/// `(row, col)` are summed when the matrix is built.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triplet {
    pub row: usize,
    pub col: usize,
    pub value: f64,
}

/// Material and loading parameters of an analysis
#[derive(Debug, Clone, PartialEq)]
pub struct ModelMetadata {
    pub poisson_ratio: f64,
    pub youngs_modulus: f64,
    /// x coordinate of the loaded edge
    pub right_edge_x: f64,
    /// Force per unit length applied along the loaded edge, in x
    pub traction_intensity: f64,
}

impl ModelMetadata {
    pub fn new(poisson_ratio: f64, youngs_modulus: f64) -> ModelMetadata {
        ModelMetadata {
            poisson_ratio,
            youngs_modulus,
            right_edge_x: DEFAULT_RIGHT_EDGE_X,
            traction_intensity: DEFAULT_TRACTION_INTENSITY,
        }
    }
}

/// Constant stress state of one element
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElementStress {
    pub sx: f64,
    pub sy: f64,
    pub sxy: f64,
    pub von_mises: f64,
}

impl ElementStress {
    pub fn from_components(sx: f64, sy: f64, sxy: f64) -> ElementStress {
        ElementStress {
            sx,
            sy,
            sxy,
            von_mises: f64::sqrt(von_mises_argument(sx, sy, sxy)),
        }
    }
}

/// The quantity under the von Mises square root. Equal to
/// `((sx - sy)^2 + sx^2 + sy^2) / 2 + 3 sxy^2`, so it is never negative
/// for finite stresses.
pub fn von_mises_argument(sx: f64, sy: f64, sxy: f64) -> f64 {
    sx * sx - sx * sy + sy * sy + 3.0 * sxy * sxy
}
