use std::fs;
use std::io;
use std::path::Path;

use serde::{ Serialize, Deserialize };
use thiserror::Error;

use crate::camera::Camera;
use crate::color::Color;
use crate::light::{ Material, MaterialError, PointLight };
use crate::linear::{ Point, Vector };
use crate::matrix::Matrix4x4;
use crate::pattern::Pattern;
use crate::shape::{ CsgOp, Shape, ShapeArena, ShapeId };
use crate::world::World;

/// Failure to load or interpret a scene description.
#[derive(Debug, Error)]
pub enum SceneError {
    #[error("failed to read scene file")]
    Io(#[from] io::Error),

    #[error("invalid scene JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Material(#[from] MaterialError),

    #[error("unknown shape kind `{0}`")]
    UnknownShapeKind(String),

    #[error("unknown pattern kind `{0}`")]
    UnknownPatternKind(String),

    #[error("shape kind `{0}` requires both `left` and `right` operands")]
    MissingOperand(String),

    #[error("a transform needs 16 numbers, got {0}")]
    BadTransform(usize),
}

/// A declarative scene: camera parameters, lights and a shape tree.
///
/// Shapes nest through `children` (groups) and `left`/`right` (CSG).
/// Transforms are 16 row-major floats; an absent transform is the identity.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SceneDescription {
    pub canvas_width: usize,
    pub canvas_height: usize,
    pub field_of_view: f64,

    pub camera_from: Vec<f64>,
    pub camera_to: Vec<f64>,
    pub camera_up: Vec<f64>,

    pub lights: Vec<LightDescription>,
    pub shapes: Vec<ShapeDescription>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LightDescription {
    pub intensity: Vec<f64>,
    pub position: Vec<f64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PatternDescription {
    pub kind: String,
    pub primary: Vec<f64>,
    pub secondary: Vec<f64>,

    #[serde(default)]
    pub transform: Vec<f64>,
}

/// Material coefficients, each defaulting to the standard material's value.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MaterialDescription {
    #[serde(default)]
    pub color: Option<Vec<f64>>,
    #[serde(default)]
    pub pattern: Option<PatternDescription>,

    #[serde(default)]
    pub ambient: Option<f64>,
    #[serde(default)]
    pub diffuse: Option<f64>,
    #[serde(default)]
    pub specular: Option<f64>,
    #[serde(default)]
    pub shininess: Option<f64>,

    #[serde(default)]
    pub reflective: Option<f64>,
    #[serde(default)]
    pub transparency: Option<f64>,
    #[serde(default)]
    pub refractive_index: Option<f64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ShapeDescription {
    pub kind: String,

    #[serde(default)]
    pub transform: Vec<f64>,
    #[serde(default)]
    pub material: Option<MaterialDescription>,

    // Cylinder and cone extents.
    #[serde(default)]
    pub minimum: Option<f64>,
    #[serde(default)]
    pub maximum: Option<f64>,
    #[serde(default)]
    pub closed: Option<bool>,

    // Group children.
    #[serde(default)]
    pub children: Option<Vec<ShapeDescription>>,

    // CSG operands.
    #[serde(default)]
    pub left: Option<Box<ShapeDescription>>,
    #[serde(default)]
    pub right: Option<Box<ShapeDescription>>,
}

/// A fully built scene, ready to render.
#[derive(Debug)]
pub struct Scene {
    pub world: World,
    pub camera: Camera,
}

impl Scene {
    pub fn from_json(text: &str) -> Result<Scene, SceneError> {
        let description: SceneDescription = serde_json::from_str(text)?;
        Scene::build(description)
    }

    pub fn from_file(path: &Path) -> Result<Scene, SceneError> {
        Scene::from_json(&fs::read_to_string(path)?)
    }

    fn build(description: SceneDescription) -> Result<Scene, SceneError> {
        let camera_transform = Matrix4x4::view_transform(
            point_from(&description.camera_from),
            point_from(&description.camera_to),
            vector_from(&description.camera_up)
        );

        let camera = Camera::new(
            description.canvas_width,
            description.canvas_height,
            description.field_of_view,
            camera_transform
        );

        let mut world = World::empty();
        for light in &description.lights {
            world.add_light(PointLight::new(
                Color::from(&light.intensity),
                point_from(&light.position)
            ));
        }

        for shape in description.shapes {
            let id = build_shape(shape, &mut world.arena)?;
            world.roots.push(id);
        }

        Ok(Scene { world, camera })
    }
}

fn point_from(v: &[f64]) -> Point {
    Point::new(
        v.first().copied().unwrap_or(0.0),
        v.get(1).copied().unwrap_or(0.0),
        v.get(2).copied().unwrap_or(0.0),
    )
}

fn vector_from(v: &[f64]) -> Vector {
    Vector::new(
        v.first().copied().unwrap_or(0.0),
        v.get(1).copied().unwrap_or(0.0),
        v.get(2).copied().unwrap_or(0.0),
    )
}

fn matrix_from(values: &[f64]) -> Result<Matrix4x4, SceneError> {
    if values.is_empty() {
        return Ok(Matrix4x4::identity());
    }

    if values.len() != 16 {
        return Err(SceneError::BadTransform(values.len()));
    }

    let mut data = [0.0; 16];
    data.copy_from_slice(values);

    Ok(data.into())
}

fn build_pattern(description: &PatternDescription)
    -> Result<Pattern, SceneError> {
    let primary = Color::from(&description.primary);
    let secondary = Color::from(&description.secondary);

    let mut pattern = match description.kind.as_str() {
        "stripe" => Pattern::stripe(primary, secondary),
        "gradient" => Pattern::gradient(primary, secondary),
        "ring" => Pattern::ring(primary, secondary),
        "checker" => Pattern::checker(primary, secondary),
        other => {
            return Err(SceneError::UnknownPatternKind(other.to_string()));
        },
    };

    pattern.set_transform(matrix_from(&description.transform)?);
    Ok(pattern)
}

/// Builds a validated material; omitted fields keep the default values.
fn build_material(description: &MaterialDescription)
    -> Result<Material, SceneError> {
    let defaults: Material = Default::default();

    let pattern = match &description.pattern {
        Some(pattern) => Some(build_pattern(pattern)?),
        None => None,
    };

    let material = Material::new(
        description.color.as_ref()
            .map_or(defaults.color, Color::from),
        pattern,
        description.ambient.unwrap_or(defaults.ambient),
        description.diffuse.unwrap_or(defaults.diffuse),
        description.specular.unwrap_or(defaults.specular),
        description.shininess.unwrap_or(defaults.shininess),
        description.reflective.unwrap_or(defaults.reflective),
        description.transparency.unwrap_or(defaults.transparency),
        description.refractive_index.unwrap_or(defaults.refractive_index),
    )?;

    Ok(material)
}

/// Recursively builds one shape description into the arena.
fn build_shape(description: ShapeDescription, arena: &mut ShapeArena)
    -> Result<ShapeId, SceneError> {
    let ShapeDescription {
        kind,
        transform,
        material,
        minimum,
        maximum,
        closed,
        children,
        left,
        right,
    } = description;

    let minimum = minimum.unwrap_or(-f64::INFINITY);
    let maximum = maximum.unwrap_or(f64::INFINITY);
    let closed = closed.unwrap_or(false);

    let id = match kind.as_str() {
        "sphere" => arena.insert(Shape::sphere()),
        "glass_sphere" => arena.insert(Shape::glass_sphere()),
        "plane" => arena.insert(Shape::plane()),
        "cube" => arena.insert(Shape::cube()),

        "cylinder" => {
            let shape = if closed {
                Shape::capped_cylinder(minimum, maximum)
            } else {
                Shape::bounded_cylinder(minimum, maximum)
            };

            arena.insert(shape)
        },

        "cone" => {
            let shape = if closed {
                Shape::capped_cone(minimum, maximum)
            } else {
                Shape::bounded_cone(minimum, maximum)
            };

            arena.insert(shape)
        },

        "group" => {
            let group = arena.insert(Shape::group());
            for child in children.unwrap_or_default() {
                let child_id = build_shape(child, arena)?;
                arena.add_child(group, child_id);
            }

            group
        },

        "union" | "intersection" | "difference" => {
            let (left, right) = match (left, right) {
                (Some(left), Some(right)) => (left, right),
                _ => return Err(SceneError::MissingOperand(kind)),
            };

            let op = match kind.as_str() {
                "union" => CsgOp::Union,
                "intersection" => CsgOp::Intersection,
                _ => CsgOp::Difference,
            };

            let left_id = build_shape(*left, arena)?;
            let right_id = build_shape(*right, arena)?;
            arena.insert_csg(op, left_id, right_id)
        },

        other => return Err(SceneError::UnknownShapeKind(other.to_string())),
    };

    arena.set_transform(id, matrix_from(&transform)?);
    if let Some(material) = material {
        arena.set_material(id, build_material(&material)?);
    }

    Ok(id)
}

/* Tests */

#[cfg(test)]
use crate::shape::ShapeKind;

#[cfg(test)]
const BASIC_SCENE: &str = r#"{
    "canvas_width": 320,
    "canvas_height": 240,
    "field_of_view": 1.047,
    "camera_from": [0, 1.5, -5],
    "camera_to": [0, 1, 0],
    "camera_up": [0, 1, 0],
    "lights": [
        { "intensity": [1, 1, 1], "position": [-10, 10, -10] }
    ],
    "shapes": [
        { "kind": "plane",
          "material": { "specular": 0.0,
                        "pattern": { "kind": "checker",
                                     "primary": [1, 1, 1],
                                     "secondary": [0, 0, 0] } } },
        { "kind": "sphere",
          "transform": [1, 0, 0, -0.5,
                        0, 1, 0, 1,
                        0, 0, 1, 0.5,
                        0, 0, 0, 1],
          "material": { "color": [0.1, 1, 0.5],
                        "diffuse": 0.7, "specular": 0.3 } }
    ]
}"#;

#[test]
fn building_a_basic_scene() {
    let scene = Scene::from_json(BASIC_SCENE).unwrap();

    assert_eq!(scene.camera.hsize, 320);
    assert_eq!(scene.camera.vsize, 240);
    assert_eq!(scene.world.lights.len(), 1);
    assert_eq!(scene.world.roots.len(), 2);

    let sphere = scene.world.arena.shape(scene.world.roots[1]);
    assert_eq!(sphere.material.color, Color::rgb(0.1, 1.0, 0.5));
    assert_eq!(sphere.material.diffuse, 0.7);
    assert_eq!(*sphere.transform(),
        Matrix4x4::translation(-0.5, 1.0, 0.5));

    let floor = scene.world.arena.shape(scene.world.roots[0]);
    assert!(floor.material.pattern.is_some());
}

#[test]
fn building_groups_and_csg_shapes() {
    let scene = Scene::from_json(r#"{
        "canvas_width": 100,
        "canvas_height": 100,
        "field_of_view": 0.785,
        "camera_from": [0, 0, -5],
        "camera_to": [0, 0, 0],
        "camera_up": [0, 1, 0],
        "lights": [{ "intensity": [1, 1, 1], "position": [0, 10, -10] }],
        "shapes": [
            { "kind": "group",
              "children": [
                  { "kind": "sphere" },
                  { "kind": "cylinder",
                    "minimum": 0, "maximum": 1, "closed": true }
              ] },
            { "kind": "difference",
              "left": { "kind": "cube" },
              "right": { "kind": "sphere" } }
        ]
    }"#).unwrap();

    assert_eq!(scene.world.roots.len(), 2);

    let group = scene.world.arena.shape(scene.world.roots[0]);
    assert!(matches!(group.kind, ShapeKind::Group { .. }));
    assert_eq!(scene.world.arena.children(scene.world.roots[0]).len(), 2);

    let csg = scene.world.arena.shape(scene.world.roots[1]);
    match csg.kind {
        ShapeKind::Csg { op, .. } => assert_eq!(op, CsgOp::Difference),
        _ => unreachable!(),
    }
}

#[test]
fn unknown_shape_kind_is_rejected() {
    let err = Scene::from_json(r#"{
        "canvas_width": 10,
        "canvas_height": 10,
        "field_of_view": 1.0,
        "camera_from": [0, 0, -5],
        "camera_to": [0, 0, 0],
        "camera_up": [0, 1, 0],
        "lights": [],
        "shapes": [{ "kind": "torus" }]
    }"#).unwrap_err();

    match err {
        SceneError::UnknownShapeKind(kind) => assert_eq!(kind, "torus"),
        _ => unreachable!(),
    }
}

#[test]
fn negative_material_coefficients_are_rejected() {
    let err = Scene::from_json(r#"{
        "canvas_width": 10,
        "canvas_height": 10,
        "field_of_view": 1.0,
        "camera_from": [0, 0, -5],
        "camera_to": [0, 0, 0],
        "camera_up": [0, 1, 0],
        "lights": [],
        "shapes": [{ "kind": "sphere", "material": { "ambient": -1.0 } }]
    }"#).unwrap_err();

    match err {
        SceneError::Material(MaterialError::Negative { field, value }) => {
            assert_eq!(field, "ambient");
            assert_eq!(value, -1.0);
        },
        _ => unreachable!(),
    }
}

#[test]
fn short_transform_is_rejected() {
    let err = Scene::from_json(r#"{
        "canvas_width": 10,
        "canvas_height": 10,
        "field_of_view": 1.0,
        "camera_from": [0, 0, -5],
        "camera_to": [0, 0, 0],
        "camera_up": [0, 1, 0],
        "lights": [],
        "shapes": [{ "kind": "sphere", "transform": [1, 2, 3] }]
    }"#).unwrap_err();

    match err {
        SceneError::BadTransform(len) => assert_eq!(len, 3),
        _ => unreachable!(),
    }
}

#[test]
fn scene_descriptions_round_trip_through_serde() {
    let description: SceneDescription =
        serde_json::from_str(BASIC_SCENE).unwrap();
    let text = serde_json::to_string(&description).unwrap();
    let again: SceneDescription = serde_json::from_str(&text).unwrap();

    assert_eq!(again.canvas_width, description.canvas_width);
    assert_eq!(again.shapes.len(), description.shapes.len());
}
