use thiserror::Error;

use crate::color::Color;
use crate::linear::{ Point, Vector };
use crate::pattern::Pattern;
use crate::shape::Shape;

/// A point light with a position and an intensity (color).
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct PointLight {
    pub intensity: Color,
    pub position: Point,
}

impl PointLight {
    pub fn new(intensity: Color, position: Point) -> PointLight {
        PointLight { intensity, position }
    }
}

/// Rejection of an invalid material coefficient, naming the field.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum MaterialError {
    #[error("material field `{field}` must be non-negative, got {value}")]
    Negative { field: &'static str, value: f64 },
}

/// Phong shading coefficients plus the reflection/refraction parameters.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Material {
    pub color: Color,
    pub pattern: Option<Pattern>,

    pub ambient: f64,
    pub diffuse: f64,
    pub specular: f64,
    pub shininess: f64,

    pub reflective: f64,
    pub transparency: f64,
    pub refractive_index: f64,
}

impl Default for Material {
    fn default() -> Material {
        Material {
            color: Color::white(),
            pattern: None,

            ambient: 0.1,
            diffuse: 0.9,
            specular: 0.9,
            shininess: 200.0,

            reflective: 0.0,
            transparency: 0.0,
            refractive_index: 1.0,
        }
    }
}

impl Material {
    /// Builds a material, rejecting negative coefficients.
    ///
    /// This is the entry point for externally supplied data (the JSON scene
    /// loader); code assembling scenes by hand can fill fields directly.
    #[allow(clippy::too_many_arguments)]
    pub fn new(color: Color, pattern: Option<Pattern>, ambient: f64,
        diffuse: f64, specular: f64, shininess: f64, reflective: f64,
        transparency: f64, refractive_index: f64)
        -> Result<Material, MaterialError> {
        let material = Material {
            color,
            pattern,
            ambient,
            diffuse,
            specular,
            shininess,
            reflective,
            transparency,
            refractive_index,
        };

        material.validate()?;
        Ok(material)
    }

    /// Checks every coefficient for a negative value.
    pub fn validate(&self) -> Result<(), MaterialError> {
        let checks = [
            ("ambient", self.ambient),
            ("diffuse", self.diffuse),
            ("specular", self.specular),
            ("shininess", self.shininess),
            ("reflective", self.reflective),
            ("transparency", self.transparency),
            ("refractive_index", self.refractive_index),
        ];

        for (field, value) in checks {
            if value < 0.0 {
                return Err(MaterialError::Negative { field, value });
            }
        }

        Ok(())
    }
}

/// Shades one point under one light with the Phong model.
///
/// The surface color comes from the material's pattern when one is present.
/// A shadowed point receives only the ambient term; otherwise the diffuse
/// and specular terms are added when the light and reflection face the
/// surface and the eye respectively.
pub fn lighting(m: &Material, shape: &Shape, light: &PointLight, point: Point,
    eyev: Vector, normalv: Vector, in_shadow: bool) -> Color {
    let color = match m.pattern {
        Some(ref pattern) => pattern.color_on_shape_at(shape, point),
        None => m.color,
    };

    let effective_color = color * light.intensity;
    let lightv = (light.position - point).normalize();
    let ambient = effective_color * m.ambient;

    if in_shadow {
        return ambient;
    }

    let diffuse;
    let specular;

    let light_dot_normal = lightv.dot(&normalv);
    if light_dot_normal < 0.0 {
        // Light on the far side of the surface.
        diffuse = Color::black();
        specular = Color::black();
    } else {
        diffuse = effective_color * m.diffuse * light_dot_normal;

        let reflectv = (-lightv).reflect(&normalv);
        let reflect_dot_eye = reflectv.dot(&eyev);

        if reflect_dot_eye <= 0.0 {
            specular = Color::black();
        } else {
            let factor = reflect_dot_eye.powf(m.shininess);
            specular = light.intensity * m.specular * factor;
        }
    }

    ambient + diffuse + specular
}

/* Tests */

#[test]
fn negative_coefficients_are_rejected() {
    let err = Material::new(
        Color::white(), None, 0.1, -0.9, 0.9, 200.0, 0.0, 0.0, 1.0
    ).unwrap_err();

    assert_eq!(err, MaterialError::Negative { field: "diffuse", value: -0.9 });

    let err = Material::new(
        Color::white(), None, 0.1, 0.9, 0.9, 200.0, 0.0, 0.0, -1.5
    ).unwrap_err();

    assert_eq!(err,
        MaterialError::Negative { field: "refractive_index", value: -1.5 });
}

#[test]
fn default_material_is_valid() {
    let m: Material = Default::default();
    assert!(m.validate().is_ok());
    assert_eq!(m.reflective, 0.0);
    assert_eq!(m.transparency, 0.0);
    assert_eq!(m.refractive_index, 1.0);
}

#[test]
fn eye_between_light_and_surface() {
    let m: Material = Default::default();
    let s = Shape::sphere();
    let position = Point::origin();

    let eyev = Vector::new(0.0, 0.0, -1.0);
    let normalv = Vector::new(0.0, 0.0, -1.0);
    let light = PointLight::new(Color::white(), Point::new(0.0, 0.0, -10.0));

    let res = lighting(&m, &s, &light, position, eyev, normalv, false);
    assert_eq!(res, Color::rgb(1.9, 1.9, 1.9));
}

#[test]
fn eye_offset_45_degrees() {
    let m: Material = Default::default();
    let s = Shape::sphere();
    let position = Point::origin();

    let eyev = Vector::new(0.0, 2.0f64.sqrt() / 2.0, -(2.0f64.sqrt()) / 2.0);
    let normalv = Vector::new(0.0, 0.0, -1.0);
    let light = PointLight::new(Color::white(), Point::new(0.0, 0.0, -10.0));

    let res = lighting(&m, &s, &light, position, eyev, normalv, false);
    assert_eq!(res, Color::rgb(1.0, 1.0, 1.0));
}

#[test]
fn light_offset_45_degrees() {
    let m: Material = Default::default();
    let s = Shape::sphere();
    let position = Point::origin();

    let eyev = Vector::new(0.0, 0.0, -1.0);
    let normalv = Vector::new(0.0, 0.0, -1.0);
    let light = PointLight::new(Color::white(), Point::new(0.0, 10.0, -10.0));

    let res = lighting(&m, &s, &light, position, eyev, normalv, false);
    assert_eq!(res, Color::rgb(0.7364, 0.7364, 0.7364));
}

#[test]
fn eye_in_the_reflection_path() {
    let m: Material = Default::default();
    let s = Shape::sphere();
    let position = Point::origin();

    let eyev = Vector::new(0.0, -(2.0f64.sqrt()) / 2.0, -(2.0f64.sqrt()) / 2.0);
    let normalv = Vector::new(0.0, 0.0, -1.0);
    let light = PointLight::new(Color::white(), Point::new(0.0, 10.0, -10.0));

    let res = lighting(&m, &s, &light, position, eyev, normalv, false);
    assert_eq!(res, Color::rgb(1.6364, 1.6364, 1.6364));
}

#[test]
fn light_behind_the_surface() {
    let m: Material = Default::default();
    let s = Shape::sphere();
    let position = Point::origin();

    let eyev = Vector::new(0.0, 0.0, -1.0);
    let normalv = Vector::new(0.0, 0.0, -1.0);
    let light = PointLight::new(Color::white(), Point::new(0.0, 0.0, 10.0));

    let res = lighting(&m, &s, &light, position, eyev, normalv, false);
    assert_eq!(res, Color::rgb(0.1, 0.1, 0.1));
}

#[test]
fn surface_in_shadow_keeps_only_ambient() {
    let m: Material = Default::default();
    let s = Shape::sphere();
    let position = Point::origin();

    let eyev = Vector::new(0.0, 0.0, -1.0);
    let normalv = Vector::new(0.0, 0.0, -1.0);
    let light = PointLight::new(Color::white(), Point::new(0.0, 0.0, -10.0));

    let res = lighting(&m, &s, &light, position, eyev, normalv, true);
    assert_eq!(res, Color::rgb(0.1, 0.1, 0.1));
}

#[test]
fn lighting_samples_the_pattern() {
    let m = Material {
        pattern: Some(Pattern::stripe(Color::white(), Color::black())),
        ambient: 1.0,
        diffuse: 0.0,
        specular: 0.0,
        ..Default::default()
    };

    let s = Shape::sphere();
    let eyev = Vector::new(0.0, 0.0, -1.0);
    let normalv = Vector::new(0.0, 0.0, -1.0);
    let light = PointLight::new(Color::white(), Point::new(0.0, 0.0, -10.0));

    assert_eq!(
        lighting(&m, &s, &light, Point::new(0.9, 0.0, 0.0),
            eyev, normalv, false),
        Color::white()
    );
    assert_eq!(
        lighting(&m, &s, &light, Point::new(1.1, 0.0, 0.0),
            eyev, normalv, false),
        Color::black()
    );
}
