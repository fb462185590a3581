//! Wireframe geometry read from Wavefront OBJ text.

use std::collections::HashSet;

use nalgebra::Point3;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MeshError {
    #[error("line {line}: {reason}")]
    Syntax { line: usize, reason: String },
    #[error("face on line {line} refers to missing vertex {index}")]
    BadIndex { line: usize, index: i64 },
    #[error("model has no vertices")]
    NoVertices,
    #[error("model has no edges")]
    NoEdges,
}

/// Unique undirected edges over a recentred vertex set.
#[derive(Debug, Clone)]
pub struct WireMesh {
    pub positions: Vec<Point3<f32>>,
    pub edges: Vec<(u32, u32)>,
    /// Distance from the origin to the farthest vertex after recentring.
    pub radius: f32,
}

impl WireMesh {
    pub fn from_obj(text: &str) -> Result<Self, MeshError> {
        let mut positions: Vec<Point3<f32>> = Vec::new();
        let mut seen = HashSet::new();
        let mut edges = Vec::new();

        for (n, raw) in text.lines().enumerate() {
            let line = n + 1;
            let raw = raw.split('#').next().unwrap_or_default();
            let mut fields = raw.split_whitespace();
            match fields.next() {
                Some("v") => {
                    let mut xyz = [0.0f32; 3];
                    for c in &mut xyz {
                        let field = fields.next().ok_or_else(|| MeshError::Syntax {
                            line,
                            reason: "vertex needs three coordinates".to_owned(),
                        })?;
                        *c = field.parse().map_err(|_| MeshError::Syntax {
                            line,
                            reason: format!("bad coordinate {field:?}"),
                        })?;
                    }
                    positions.push(Point3::new(xyz[0], xyz[1], xyz[2]));
                }
                Some(kind @ ("f" | "l")) => {
                    let corners = fields
                        .map(|f| vertex_index(f, positions.len(), line))
                        .collect::<Result<Vec<_>, _>>()?;
                    if corners.len() < 2 {
                        return Err(MeshError::Syntax {
                            line,
                            reason: format!("`{kind}` needs at least two vertices"),
                        });
                    }
                    let closing = (kind == "f" && corners.len() > 2)
                        .then(|| (corners[corners.len() - 1], corners[0]));
                    for (a, b) in corners.windows(2).map(|w| (w[0], w[1])).chain(closing) {
                        let key = (a.min(b), a.max(b));
                        if a != b && seen.insert(key) {
                            edges.push(key);
                        }
                    }
                }
                _ => {}
            }
        }

        if positions.is_empty() {
            return Err(MeshError::NoVertices);
        }
        if edges.is_empty() {
            return Err(MeshError::NoEdges);
        }

        let (min, max) = positions.iter().fold(
            (positions[0], positions[0]),
            |(lo, hi), p| (lo.inf(p), hi.sup(p)),
        );
        let centre = nalgebra::center(&min, &max);
        for p in &mut positions {
            *p = Point3::from(*p - centre);
        }
        let radius = positions
            .iter()
            .map(|p| p.coords.norm())
            .fold(0.0f32, f32::max);

        Ok(Self { positions, edges, radius })
    }

    /// Interleaved `xyz rgb` line vertices, two per edge.
    pub fn vertex_buffer(&self, color: [f32; 3]) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.edges.len() * 12);
        for &(a, b) in &self.edges {
            for i in [a, b] {
                let p = self.positions[i as usize];
                out.extend_from_slice(&[p.x, p.y, p.z]);
                out.extend_from_slice(&color);
            }
        }
        out
    }
}

/// Resolve an OBJ index (`7`, `7/2`, `7//3`, `-1`) to a 0-based vertex.
fn vertex_index(field: &str, count: usize, line: usize) -> Result<u32, MeshError> {
    let head = field.split('/').next().unwrap_or_default();
    let index: i64 = head.parse().map_err(|_| MeshError::Syntax {
        line,
        reason: format!("bad vertex reference {field:?}"),
    })?;
    let count = count as i64;
    let resolved = match index {
        i if i > 0 => i - 1,
        i if i < 0 => count + i,
        _ => -1,
    };
    if (0..count).contains(&resolved) {
        Ok(resolved as u32)
    } else {
        Err(MeshError::BadIndex { line, index })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SQUARE: &str = "\
# unit square, two triangles
v 0 0 0
v 2 0 0
v 2 2 0
v 0 2 0
f 1 2 3
f 1/1 3/3 4/4
";

    #[test]
    fn shared_edges_are_emitted_once() {
        let mesh = WireMesh::from_obj(SQUARE).unwrap();
        assert_eq!(mesh.positions.len(), 4);
        // four sides plus the shared diagonal
        assert_eq!(mesh.edges.len(), 5);
        assert!((mesh.radius - 2f32.sqrt()).abs() < 1e-6);
        assert_eq!(mesh.positions[0], Point3::new(-1.0, -1.0, 0.0));
    }

    #[test]
    fn relative_indices_and_polylines() {
        let text = "v 0 0 0\nv 1 0 0\nv 1 1 1\nf -3//1 -2//1 -1//1\nl 1 3\n";
        let mesh = WireMesh::from_obj(text).unwrap();
        assert_eq!(mesh.edges.len(), 3);
    }

    #[test]
    fn vertex_buffer_layout() {
        let mesh = WireMesh::from_obj("v 0 0 0\nv 2 0 0\nl 1 2\n").unwrap();
        let buf = mesh.vertex_buffer([1.0, 0.5, 0.0]);
        assert_eq!(buf, vec![-1.0, 0.0, 0.0, 1.0, 0.5, 0.0, 1.0, 0.0, 0.0, 1.0, 0.5, 0.0]);
    }

    #[test]
    fn reports_bad_input() {
        assert_eq!(WireMesh::from_obj("# nothing\n").unwrap_err(), MeshError::NoVertices);
        assert_eq!(WireMesh::from_obj("v 0 0 0\n").unwrap_err(), MeshError::NoEdges);
        assert_eq!(
            WireMesh::from_obj("v 0 0 0\nv 1 1 1\nf 1 5\n").unwrap_err(),
            MeshError::BadIndex { line: 3, index: 5 }
        );
        assert!(matches!(
            WireMesh::from_obj("v 0 zero 0\n").unwrap_err(),
            MeshError::Syntax { line: 1, .. }
        ));
        assert!(matches!(
            WireMesh::from_obj("v 0 0 0\nf 1\n").unwrap_err(),
            MeshError::Syntax { line: 2, .. }
        ));
    }
}
