use thiserror::Error;

use crate::solver::Stage;

pub type Result<T> = std::result::Result<T, TristressError>;

#[derive(Error, Debug)]
pub enum TristressError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Node not found: no node with external id {0}")]
    NodeNotFound(i64),

    #[error("Mesher error: {0}")]
    Mesher(String),

    #[error("Degenerate element: {0}")]
    DegenerateElement(String),

    #[error("Input error: {0}")]
    Input(String),

    #[error("Solver error: {operation} requires stage {required:?}, current stage is {current:?}")]
    Stage {
        operation: &'static str,
        required: Stage,
        current: Stage,
    },

    #[error("Singular system: {0}")]
    SingularSystem(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
