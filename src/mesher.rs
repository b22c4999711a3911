use std::collections::HashMap;
use std::path::Path;

use crate::{
    datatypes::{Boundary, BoundaryKind, BoundaryNode, Node},
    element::{Element, LinearTriangle},
    error::{Result, TristressError},
};

pub const NODE_KEYWORD: &str = "*NODE";
pub const ELEMENT_KEYWORD: &str = "*ELEMENT_SHELL";
pub const COMMENT_PREFIX: &str = "$";

/// Coordinate tolerance used when deriving boundary groups
pub const BOUNDARY_TOLERANCE: f64 = 1e-10;

pub const FIX_X_BOUNDARY: usize = 0;
pub const FIX_Y_BOUNDARY: usize = 1;
pub const LOAD_BOUNDARY: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MeshParseState {
    Nodes,
    Elements,
    Limbo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Nodes,
    Elements,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionEndReason {
    /// A blank line or an unrecognized `*` keyword
    Sentinel,
    /// A data line whose required fields could not be parsed
    MalformedRecord,
}

/// Records why a mesh section stopped being parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionEnd {
    pub section: Section,
    pub line_number: usize,
    pub line: String,
    pub reason: SectionEndReason,
}

/// The mesh model: node arena, elements and derived boundary groups
#[derive(Debug, Default)]
pub struct Geometry {
    nodes: Vec<Node>,
    elements: Vec<Box<dyn Element>>,
    boundaries: Vec<Boundary>,
    shift: i64,
    /// normalized id -> position in `nodes`
    node_lookup: HashMap<usize, usize>,
    diagnostics: Vec<SectionEnd>,
}

/// A node record before id normalization
struct RawNode {
    id: i64,
    x: f64,
    y: f64,
}

fn parse_node_record(line: &str) -> Option<RawNode> {
    let mut fields = line.split_whitespace();
    let id = fields.next()?.parse().ok()?;
    let x = fields.next()?.parse().ok()?;
    let y = fields.next()?.parse().ok()?;
    Some(RawNode { id, x, y })
}

/// Parses `elem_id part_id n1 n2 n3`
fn parse_element_record(line: &str) -> Option<(i64, [i64; 3])> {
    let fields: Vec<i64> = line
        .split_whitespace()
        .take(5)
        .map(|f| f.parse().ok())
        .collect::<Option<Vec<i64>>>()?;

    match fields.as_slice() {
        [id, _part_id, n0, n1, n2] => Some((*id, [*n0, *n1, *n2])),
        _ => None,
    }
}

fn classify_section_end(line: &str) -> SectionEndReason {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('*') {
        SectionEndReason::Sentinel
    } else {
        SectionEndReason::MalformedRecord
    }
}

impl Geometry {
    /// Loads a mesh file, normalizes its node ids and derives the boundary
    /// groups
    ///
    /// # Arguments
    /// * `mesh_file` - Path to the keyword mesh file
    /// * `right_edge_x` - x coordinate of the loaded edge
    pub fn load_from_file<P: AsRef<Path>>(mesh_file: P, right_edge_x: f64) -> Result<Geometry> {
        let mesh_file = mesh_file.as_ref();
        let contents = match std::fs::read_to_string(mesh_file) {
            Ok(c) => c,
            Err(err) => {
                return Err(TristressError::FileNotFound(format!(
                    "{}: {err}",
                    mesh_file.display()
                )))
            }
        };

        let geometry = Geometry::parse(&contents, right_edge_x)?;

        println!(
            "info: loaded {} nodes and {} elements from {}",
            geometry.nodes.len(),
            geometry.elements.len(),
            mesh_file.display()
        );

        Ok(geometry)
    }

    /// Parses mesh file contents
    ///
    /// # Arguments
    /// * `contents` - The text of a keyword mesh file
    /// * `right_edge_x` - x coordinate of the loaded edge
    pub fn parse(contents: &str, right_edge_x: f64) -> Result<Geometry> {
        let mut geometry = Geometry::default();
        let mut raw_nodes: Vec<RawNode> = Vec::new();
        let mut normalized = false;
        let mut parser_state = MeshParseState::Limbo;

        for (line_idx, line) in contents.lines().enumerate() {
            let line_number = line_idx + 1;

            if line.starts_with(NODE_KEYWORD) {
                parser_state = MeshParseState::Nodes;
                continue;
            }
            if line.starts_with(ELEMENT_KEYWORD) {
                if !normalized {
                    geometry.normalize(std::mem::take(&mut raw_nodes))?;
                    normalized = true;
                }
                parser_state = MeshParseState::Elements;
                continue;
            }
            if line.starts_with(COMMENT_PREFIX) {
                continue;
            }

            match parser_state {
                MeshParseState::Limbo => continue,
                MeshParseState::Nodes => {
                    if normalized {
                        // a second node block after elements started cannot be
                        // renumbered consistently
                        return Err(TristressError::Mesher(format!(
                            "node record on line {line_number} after node ids were normalized"
                        )));
                    }
                    match parse_node_record(line) {
                        Some(raw) => raw_nodes.push(raw),
                        None => {
                            geometry.end_section(Section::Nodes, line_number, line);
                            parser_state = MeshParseState::Limbo;
                            geometry.normalize(std::mem::take(&mut raw_nodes))?;
                            normalized = true;
                        }
                    }
                }
                MeshParseState::Elements => match parse_element_record(line) {
                    Some((elem_id, external_ids)) => {
                        geometry.push_triangle(elem_id, external_ids)?;
                    }
                    None => {
                        geometry.end_section(Section::Elements, line_number, line);
                        parser_state = MeshParseState::Limbo;
                    }
                },
            }
        }

        if !normalized {
            geometry.normalize(raw_nodes)?;
        }

        geometry.create_boundaries(right_edge_x);

        Ok(geometry)
    }

    fn end_section(&mut self, section: Section, line_number: usize, line: &str) {
        let reason = classify_section_end(line);
        match reason {
            SectionEndReason::Sentinel => println!(
                "info: {section:?} section closed at line {line_number}"
            ),
            SectionEndReason::MalformedRecord => println!(
                "warning: malformed record at line {line_number} ended {section:?} section: '{}'",
                line.trim()
            ),
        }

        self.diagnostics.push(SectionEnd {
            section,
            line_number,
            line: line.to_owned(),
            reason,
        });
    }

    /// Shifts node ids so the smallest becomes zero and checks that they
    /// form a contiguous range
    fn normalize(&mut self, raw_nodes: Vec<RawNode>) -> Result<()> {
        self.shift = raw_nodes.iter().map(|n| n.id).min().unwrap_or(0);
        let count = raw_nodes.len();

        for raw in raw_nodes {
            let id = match raw.id.checked_sub(self.shift) {
                Some(offset) => offset as usize,
                None => {
                    return Err(TristressError::Mesher(format!(
                        "node id range from {} to {} does not fit an index",
                        self.shift, raw.id
                    )))
                }
            };
            if id >= count {
                return Err(TristressError::Mesher(format!(
                    "node ids are not contiguous: id {} is out of range for {count} nodes starting at {}",
                    raw.id, self.shift
                )));
            }
            if self.node_lookup.insert(id, self.nodes.len()).is_some() {
                return Err(TristressError::Mesher(format!(
                    "duplicate node id {}",
                    raw.id
                )));
            }
            self.nodes.push(Node {
                id,
                x: raw.x,
                y: raw.y,
            });
        }

        Ok(())
    }

    fn push_triangle(&mut self, elem_id: i64, external_ids: [i64; 3]) -> Result<()> {
        let mut indices = [0usize; 3];
        for (index, external_id) in indices.iter_mut().zip(external_ids) {
            *index = self.node_index(external_id)?;
        }

        let element = LinearTriangle::new(indices, &self.nodes).map_err(|err| match err {
            TristressError::DegenerateElement(msg) => {
                TristressError::DegenerateElement(format!("element {elem_id}: {msg}"))
            }
            other => other,
        })?;
        self.elements.push(Box::new(element));

        Ok(())
    }

    /// Scans nodes in ingestion order and fills the fix-x, fix-y and load
    /// groups. The load group is then sorted along the edge so that
    /// consecutive entries bound one edge segment.
    fn create_boundaries(&mut self, right_edge_x: f64) {
        self.boundaries = vec![Boundary::default(); 3];

        for node in &self.nodes {
            if node.x.abs() <= BOUNDARY_TOLERANCE {
                self.boundaries[FIX_X_BOUNDARY].nodes.push(BoundaryNode {
                    kind: BoundaryKind::FixX,
                    node: node.id,
                });
            }
            if node.y.abs() <= BOUNDARY_TOLERANCE {
                self.boundaries[FIX_Y_BOUNDARY].nodes.push(BoundaryNode {
                    kind: BoundaryKind::FixY,
                    node: node.id,
                });
            }
            if (node.x - right_edge_x).abs() <= BOUNDARY_TOLERANCE {
                self.boundaries[LOAD_BOUNDARY].nodes.push(BoundaryNode {
                    kind: BoundaryKind::Load,
                    node: node.id,
                });
            }
        }

        let nodes = &self.nodes;
        let lookup = &self.node_lookup;
        self.boundaries[LOAD_BOUNDARY]
            .nodes
            .sort_by(|a, b| nodes[lookup[&a.node]].y.total_cmp(&nodes[lookup[&b.node]].y));

        if self.boundaries[LOAD_BOUNDARY].nodes.len() < 2 {
            println!("warning: fewer than two nodes lie on the loaded edge x = {right_edge_x}");
        }
    }

    /// Re-derives the strain-displacement operator of every element. Call
    /// after moving nodes with [`Geometry::node_mut`].
    pub fn update_operators(&mut self) -> Result<()> {
        for element in self.elements.iter_mut() {
            element.update_b(&self.nodes)?;
        }
        Ok(())
    }

    /// Finds a node by its id as written in the mesh file
    pub fn node_by_external_id(&self, external_id: i64) -> Result<&Node> {
        let index = self.node_index(external_id)?;
        Ok(&self.nodes[index])
    }

    /// Finds a node by its normalized id
    pub fn node_by_id(&self, id: usize) -> Option<&Node> {
        self.node_lookup.get(&id).map(|index| &self.nodes[*index])
    }

    fn node_index(&self, external_id: i64) -> Result<usize> {
        let id = match external_id.checked_sub(self.shift) {
            Some(id) if id >= 0 => id as usize,
            _ => return Err(TristressError::NodeNotFound(external_id)),
        };
        self.node_lookup
            .get(&id)
            .copied()
            .ok_or(TristressError::NodeNotFound(external_id))
    }

    /// Nodes in ingestion order
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Mutable access to a node's coordinates by arena position. Element
    /// operators go stale until [`Geometry::update_operators`] is called.
    pub fn node_mut(&mut self, index: usize) -> Option<&mut Node> {
        self.nodes.get_mut(index)
    }

    pub fn elements(&self) -> &[Box<dyn Element>] {
        &self.elements
    }

    pub fn boundaries(&self) -> &[Boundary] {
        &self.boundaries
    }

    /// The amount subtracted from every external node id
    pub fn shift(&self) -> i64 {
        self.shift
    }

    /// Why each section that ended on a non-record line ended
    pub fn diagnostics(&self) -> &[SectionEnd] {
        &self.diagnostics
    }
}
