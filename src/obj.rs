use std::collections::BTreeMap;
use std::fs::File;
use std::io::{ self, BufRead, BufReader };
use std::path::Path;

use thiserror::Error;

use crate::linear::{ Point, Vector };
use crate::shape::{ Shape, ShapeArena, ShapeId };

/// Failure to read or understand an OBJ stream.
#[derive(Debug, Error)]
pub enum ObjError {
    #[error("failed to read OBJ input")]
    Io(#[from] io::Error),

    #[error("line {line}: malformed number `{token}`")]
    BadNumber { line: usize, token: String },

    #[error("line {line}: index {index} is out of range")]
    BadIndex { line: usize, index: usize },

    #[error("line {line}: a face needs at least three vertices")]
    ShortFace { line: usize },
}

/// A line-oriented OBJ parser producing triangles grouped by `g` records.
///
/// Supported records: `v` (vertex), `vn` (vertex normal), `f` (face,
/// fan-triangulated when it has more than three vertices) and `g` (named
/// group). Anything else is counted in `ignored_lines` and skipped. Faces
/// whose vertices all carry normals become smooth triangles.
#[derive(Clone, Debug)]
pub struct ObjParser {
    pub ignored_lines: usize,

    pub vertices: Vec<Point>,
    pub normals: Vec<Vector>,

    groups: BTreeMap<String, Vec<Shape>>,
}

/// The group name faces belong to before any `g` record appears.
const DEFAULT_GROUP: &str = "";

impl ObjParser {
    /// Parses OBJ text from any buffered reader.
    pub fn parse<R: BufRead>(reader: R) -> Result<ObjParser, ObjError> {
        let mut parser = ObjParser {
            ignored_lines: 0,
            vertices: Vec::new(),
            normals: Vec::new(),
            groups: BTreeMap::new(),
        };

        let mut current_group = DEFAULT_GROUP.to_string();

        for (at, line) in reader.lines().enumerate() {
            let line = line?;
            let number = at + 1;

            let fields: Vec<&str> = line.split_whitespace().collect();
            match fields.split_first() {
                Some((&"v", rest)) => {
                    let (x, y, z) = Self::parse_triple(rest, number)?;
                    parser.vertices.push(Point::new(x, y, z));
                },

                Some((&"vn", rest)) => {
                    let (x, y, z) = Self::parse_triple(rest, number)?;
                    parser.normals.push(Vector::new(x, y, z));
                },

                Some((&"g", rest)) => {
                    current_group = rest.first()
                        .unwrap_or(&DEFAULT_GROUP)
                        .to_string();
                },

                Some((&"f", rest)) => {
                    let triangles = parser.parse_face(rest, number)?;
                    parser.groups
                        .entry(current_group.clone())
                        .or_default()
                        .extend(triangles);
                },

                _ => parser.ignored_lines += 1,
            }
        }

        Ok(parser)
    }

    pub fn parse_str(text: &str) -> Result<ObjParser, ObjError> {
        Self::parse(text.as_bytes())
    }

    pub fn parse_file(path: &Path) -> Result<ObjParser, ObjError> {
        Self::parse(BufReader::new(File::open(path)?))
    }

    /// The names of all face groups seen so far, default group included.
    pub fn group_names(&self) -> Vec<&str> {
        self.groups.keys().map(|name| name.as_str()).collect()
    }

    /// The triangles parsed into a group.
    pub fn triangles(&self, group: &str) -> &[Shape] {
        self.groups.get(group).map_or(&[], |shapes| shapes.as_slice())
    }

    /// Moves the parsed mesh into the arena as one parent group.
    ///
    /// Default-group triangles become direct children; every named group
    /// becomes a child group of its own, in name order.
    pub fn into_group(self, arena: &mut ShapeArena) -> ShapeId {
        let parent = arena.insert(Shape::group());

        for (name, triangles) in self.groups {
            let target = if name == DEFAULT_GROUP {
                parent
            } else {
                let sub = arena.insert(Shape::group());
                arena.add_child(parent, sub);
                sub
            };

            for triangle in triangles {
                let id = arena.insert(triangle);
                arena.add_child(target, id);
            }
        }

        parent
    }

    fn parse_triple(fields: &[&str], line: usize)
        -> Result<(f64, f64, f64), ObjError> {
        let mut out = [0.0; 3];
        for (slot, token) in out.iter_mut().zip(fields.iter()) {
            *slot = token.parse().map_err(|_| ObjError::BadNumber {
                line,
                token: token.to_string(),
            })?;
        }

        Ok((out[0], out[1], out[2]))
    }

    /// Triangulates one `f` record as a fan anchored on its first vertex.
    fn parse_face(&self, fields: &[&str], line: usize)
        -> Result<Vec<Shape>, ObjError> {
        if fields.len() < 3 {
            return Err(ObjError::ShortFace { line });
        }

        let mut corners = Vec::with_capacity(fields.len());
        for token in fields {
            corners.push(self.parse_face_vertex(token, line)?);
        }

        let mut triangles = Vec::with_capacity(corners.len() - 2);
        for i in 1..corners.len() - 1 {
            let (p1, n1) = corners[0];
            let (p2, n2) = corners[i];
            let (p3, n3) = corners[i + 1];

            let triangle = match (n1, n2, n3) {
                (Some(n1), Some(n2), Some(n3)) =>
                    Shape::smooth_triangle(p1, p2, p3, n1, n2, n3),
                _ => Shape::triangle(p1, p2, p3),
            };

            triangles.push(triangle);
        }

        Ok(triangles)
    }

    /// Resolves one face token of the form `v`, `v/vt`, `v//vn` or
    /// `v/vt/vn`. Indices are 1-based.
    fn parse_face_vertex(&self, token: &str, line: usize)
        -> Result<(Point, Option<Vector>), ObjError> {
        let mut parts = token.split('/');

        let vertex_token = parts.next().unwrap_or("");
        let index: usize = vertex_token.parse().map_err(|_| {
            ObjError::BadNumber { line, token: token.to_string() }
        })?;

        let vertex = *self.vertices.get(index.wrapping_sub(1))
            .ok_or(ObjError::BadIndex { line, index })?;

        // Texture index (ignored), then the optional normal index.
        let _ = parts.next();
        let normal = match parts.next() {
            None | Some("") => None,
            Some(normal_token) => {
                let index: usize = normal_token.parse().map_err(|_| {
                    ObjError::BadNumber { line, token: token.to_string() }
                })?;

                Some(*self.normals.get(index.wrapping_sub(1))
                    .ok_or(ObjError::BadIndex { line, index })?)
            },
        };

        Ok((vertex, normal))
    }
}

/* Tests */

#[cfg(test)]
use crate::shape::ShapeKind;

#[test]
fn gibberish_is_ignored_and_counted() {
    let parser = ObjParser::parse_str(
        "There was a young lady named Bright\n\
         who traveled much faster than light.\n\
         She set out one day\n\
         in a relative way,\n\
         and came back the previous night.\n"
    ).unwrap();

    assert_eq!(parser.ignored_lines, 5);
    assert!(parser.vertices.is_empty());
}

#[test]
fn vertex_records() {
    let parser = ObjParser::parse_str(
        "v -1 1 0\n\
         v -1.0000 0.5000 0.0000\n\
         v 1 0 0\n\
         v 1 1 0\n"
    ).unwrap();

    assert_eq!(parser.vertices.len(), 4);
    assert_eq!(parser.vertices[0], Point::new(-1.0, 1.0, 0.0));
    assert_eq!(parser.vertices[1], Point::new(-1.0, 0.5, 0.0));
    assert_eq!(parser.vertices[2], Point::new(1.0, 0.0, 0.0));
    assert_eq!(parser.vertices[3], Point::new(1.0, 1.0, 0.0));
}

#[test]
fn triangle_faces() {
    let parser = ObjParser::parse_str(
        "v -1 1 0\n\
         v -1 0 0\n\
         v 1 0 0\n\
         v 1 1 0\n\
         \n\
         f 1 2 3\n\
         f 1 3 4\n"
    ).unwrap();

    let triangles = parser.triangles(DEFAULT_GROUP);
    assert_eq!(triangles.len(), 2);

    match (&triangles[0].kind, &triangles[1].kind) {
        (ShapeKind::Triangle(t1), ShapeKind::Triangle(t2)) => {
            assert_eq!(t1.p1, parser.vertices[0]);
            assert_eq!(t1.p2, parser.vertices[1]);
            assert_eq!(t1.p3, parser.vertices[2]);
            assert_eq!(t2.p1, parser.vertices[0]);
            assert_eq!(t2.p2, parser.vertices[2]);
            assert_eq!(t2.p3, parser.vertices[3]);
        },
        _ => unreachable!(),
    }
}

#[test]
fn polygons_triangulate_as_a_fan() {
    let parser = ObjParser::parse_str(
        "v -1 1 0\n\
         v -1 0 0\n\
         v 1 0 0\n\
         v 1 1 0\n\
         v 0 2 0\n\
         \n\
         f 1 2 3 4 5\n"
    ).unwrap();

    let triangles = parser.triangles(DEFAULT_GROUP);
    assert_eq!(triangles.len(), 3);

    if let ShapeKind::Triangle(t3) = &triangles[2].kind {
        assert_eq!(t3.p1, parser.vertices[0]);
        assert_eq!(t3.p2, parser.vertices[3]);
        assert_eq!(t3.p3, parser.vertices[4]);
    } else {
        unreachable!();
    }
}

#[test]
fn named_groups_collect_their_own_faces() {
    let parser = ObjParser::parse_str(
        "v -1 1 0\n\
         v -1 0 0\n\
         v 1 0 0\n\
         v 1 1 0\n\
         \n\
         g FirstGroup\n\
         f 1 2 3\n\
         g SecondGroup\n\
         f 1 3 4\n"
    ).unwrap();

    assert_eq!(parser.group_names(), vec!["FirstGroup", "SecondGroup"]);
    assert_eq!(parser.triangles("FirstGroup").len(), 1);
    assert_eq!(parser.triangles("SecondGroup").len(), 1);
}

#[test]
fn vertex_normal_records() {
    let parser = ObjParser::parse_str(
        "vn 0 0 1\n\
         vn 0.707 0 -0.707\n\
         vn 1 2 3\n"
    ).unwrap();

    assert_eq!(parser.normals.len(), 3);
    assert_eq!(parser.normals[0], Vector::new(0.0, 0.0, 1.0));
    assert_eq!(parser.normals[1], Vector::new(0.707, 0.0, -0.707));
    assert_eq!(parser.normals[2], Vector::new(1.0, 2.0, 3.0));
}

#[test]
fn faces_with_normals_become_smooth_triangles() {
    let parser = ObjParser::parse_str(
        "v 0 1 0\n\
         v -1 0 0\n\
         v 1 0 0\n\
         \n\
         vn -1 0 0\n\
         vn 1 0 0\n\
         vn 0 1 0\n\
         \n\
         f 1//3 2//1 3//2\n\
         f 1/0/3 2/102/1 3/14/2\n"
    ).unwrap();

    let triangles = parser.triangles(DEFAULT_GROUP);
    assert_eq!(triangles.len(), 2);

    match &triangles[0].kind {
        ShapeKind::SmoothTriangle(data) => {
            assert_eq!(data.base.p1, parser.vertices[0]);
            assert_eq!(data.base.p2, parser.vertices[1]);
            assert_eq!(data.base.p3, parser.vertices[2]);
            assert_eq!(data.n1, parser.normals[2]);
            assert_eq!(data.n2, parser.normals[0]);
            assert_eq!(data.n3, parser.normals[1]);
        },
        _ => unreachable!(),
    }

    assert_eq!(triangles[0].kind, triangles[1].kind);
}

#[test]
fn face_index_out_of_range_is_an_error() {
    let err = ObjParser::parse_str(
        "v 0 1 0\n\
         f 1 2 3\n"
    ).unwrap_err();

    match err {
        ObjError::BadIndex { line, index } => {
            assert_eq!(line, 2);
            assert_eq!(index, 2);
        },
        _ => unreachable!(),
    }
}

#[test]
fn malformed_vertex_is_an_error() {
    let err = ObjParser::parse_str("v 0 one 0\n").unwrap_err();

    match err {
        ObjError::BadNumber { line, token } => {
            assert_eq!(line, 1);
            assert_eq!(token, "one");
        },
        _ => unreachable!(),
    }
}

#[test]
fn parsed_mesh_becomes_an_arena_group() {
    let parser = ObjParser::parse_str(
        "v -1 1 0\n\
         v -1 0 0\n\
         v 1 0 0\n\
         v 1 1 0\n\
         \n\
         f 1 2 3\n\
         g FirstGroup\n\
         f 1 2 3\n\
         g SecondGroup\n\
         f 1 3 4\n"
    ).unwrap();

    let mut arena = ShapeArena::new();
    let root = parser.into_group(&mut arena);

    // One loose triangle plus two named subgroups.
    let children = arena.children(root).to_vec();
    assert_eq!(children.len(), 3);

    let triangles = children.iter().filter(|&&id| {
        matches!(arena.shape(id).kind, ShapeKind::Triangle(_))
    }).count();
    let groups = children.iter().filter(|&&id| {
        matches!(arena.shape(id).kind, ShapeKind::Group { .. })
    }).count();

    assert_eq!(triangles, 1);
    assert_eq!(groups, 2);

    for &child in children.iter() {
        assert_eq!(arena.shape(child).parent(), Some(root));
    }
}
