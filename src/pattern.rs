use crate::linear::Point;
use crate::color::Color;
use crate::matrix::Matrix4x4;
use crate::shape::Shape;

/// The procedural rule a pattern evaluates in its own space.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum PatternKind {
    /// Alternating colors along X, switching at integer boundaries.
    Stripe,

    /// Linear blend from primary to secondary along X.
    Gradient,

    /// Concentric circles in the XZ plane.
    Ring,

    /// A 3D checkerboard with unit cells.
    Checker,
}

/// A two-color procedural pattern with its own transform.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Pattern {
    pub kind: PatternKind,
    pub primary: Color,
    pub secondary: Color,

    transform: Matrix4x4,
    inverse: Matrix4x4,
}

impl Pattern {
    fn new(kind: PatternKind, primary: Color, secondary: Color) -> Pattern {
        Pattern {
            kind,
            primary,
            secondary,
            transform: Matrix4x4::identity(),
            inverse: Matrix4x4::identity(),
        }
    }

    pub fn stripe(primary: Color, secondary: Color) -> Pattern {
        Pattern::new(PatternKind::Stripe, primary, secondary)
    }

    pub fn gradient(primary: Color, secondary: Color) -> Pattern {
        Pattern::new(PatternKind::Gradient, primary, secondary)
    }

    pub fn ring(primary: Color, secondary: Color) -> Pattern {
        Pattern::new(PatternKind::Ring, primary, secondary)
    }

    pub fn checker(primary: Color, secondary: Color) -> Pattern {
        Pattern::new(PatternKind::Checker, primary, secondary)
    }

    pub fn transform(&self) -> &Matrix4x4 {
        &self.transform
    }

    /// Sets the pattern transform, caching its inverse.
    pub fn set_transform(&mut self, transform: Matrix4x4) {
        self.transform = transform;
        self.inverse = transform.inverse()
            .expect("Pattern transforms should be invertible.");
    }

    /// Evaluates the pattern at a point already in pattern space.
    pub fn color_at(&self, p: Point) -> Color {
        match self.kind {
            PatternKind::Stripe => {
                if p.x.floor().rem_euclid(2.0) == 0.0 {
                    self.primary
                } else {
                    self.secondary
                }
            },

            PatternKind::Gradient => {
                let distance = self.secondary - self.primary;
                self.primary + distance * (p.x - p.x.floor())
            },

            PatternKind::Ring => {
                let radial = (p.x.powi(2) + p.z.powi(2)).sqrt();
                if radial.floor().rem_euclid(2.0) == 0.0 {
                    self.primary
                } else {
                    self.secondary
                }
            },

            PatternKind::Checker => {
                let cell = p.x.floor() + p.y.floor() + p.z.floor();
                if cell.rem_euclid(2.0) == 0.0 {
                    self.primary
                } else {
                    self.secondary
                }
            },
        }
    }

    /// Evaluates the pattern at a world-space point on a shape.
    ///
    /// The point is brought into the shape's object space first, then into
    /// pattern space, before the pattern rule runs.
    pub fn color_on_shape_at(&self, shape: &Shape, world_point: Point)
        -> Color {
        let object_point = *shape.inverse_transform() * world_point;
        let pattern_point = self.inverse * object_point;

        self.color_at(pattern_point)
    }
}

/* Tests */

#[test]
fn stripes_are_constant_along_y_and_z() {
    let pattern = Pattern::stripe(Color::white(), Color::black());

    assert_eq!(pattern.color_at(Point::new(0.0, 1.0, 0.0)), Color::white());
    assert_eq!(pattern.color_at(Point::new(0.0, 2.0, 0.0)), Color::white());
    assert_eq!(pattern.color_at(Point::new(0.0, 0.0, 1.0)), Color::white());
    assert_eq!(pattern.color_at(Point::new(0.0, 0.0, 2.0)), Color::white());
}

#[test]
fn stripes_alternate_at_integer_boundaries() {
    let pattern = Pattern::stripe(Color::white(), Color::black());

    assert_eq!(pattern.color_at(Point::new(0.0, 0.0, 0.0)), Color::white());
    assert_eq!(pattern.color_at(Point::new(0.9, 0.0, 0.0)), Color::white());
    assert_eq!(pattern.color_at(Point::new(1.0, 0.0, 0.0)), Color::black());
    assert_eq!(pattern.color_at(Point::new(1.1, 0.0, 0.0)), Color::black());
    assert_eq!(pattern.color_at(Point::new(-0.1, 0.0, 0.0)), Color::black());
    assert_eq!(pattern.color_at(Point::new(-1.0, 0.0, 0.0)), Color::black());
    assert_eq!(pattern.color_at(Point::new(-1.1, 0.0, 0.0)), Color::white());
}

#[test]
fn gradient_interpolates_between_colors() {
    let pattern = Pattern::gradient(Color::white(), Color::black());

    assert_eq!(pattern.color_at(Point::new(0.0, 0.0, 0.0)), Color::white());
    assert_eq!(pattern.color_at(Point::new(0.25, 0.0, 0.0)),
        Color::rgb(0.75, 0.75, 0.75));
    assert_eq!(pattern.color_at(Point::new(0.5, 0.0, 0.0)),
        Color::rgb(0.5, 0.5, 0.5));
    assert_eq!(pattern.color_at(Point::new(0.75, 0.0, 0.0)),
        Color::rgb(0.25, 0.25, 0.25));
}

#[test]
fn ring_extends_in_x_and_z() {
    let pattern = Pattern::ring(Color::white(), Color::black());

    assert_eq!(pattern.color_at(Point::new(0.0, 0.0, 0.0)), Color::white());
    assert_eq!(pattern.color_at(Point::new(1.0, 0.0, 0.0)), Color::black());
    assert_eq!(pattern.color_at(Point::new(0.0, 0.0, 1.0)), Color::black());
    assert_eq!(pattern.color_at(Point::new(0.708, 0.0, 0.708)),
        Color::black());
}

#[test]
fn checkers_repeat_in_all_dimensions() {
    let pattern = Pattern::checker(Color::white(), Color::black());

    assert_eq!(pattern.color_at(Point::new(0.0, 0.0, 0.0)), Color::white());
    assert_eq!(pattern.color_at(Point::new(0.99, 0.0, 0.0)), Color::white());
    assert_eq!(pattern.color_at(Point::new(1.01, 0.0, 0.0)), Color::black());
    assert_eq!(pattern.color_at(Point::new(0.0, 0.99, 0.0)), Color::white());
    assert_eq!(pattern.color_at(Point::new(0.0, 1.01, 0.0)), Color::black());
    assert_eq!(pattern.color_at(Point::new(0.0, 0.0, 0.99)), Color::white());
    assert_eq!(pattern.color_at(Point::new(0.0, 0.0, 1.01)), Color::black());
}

#[test]
fn stripes_with_an_object_transformation() {
    let mut shape = Shape::sphere();
    shape.set_transform(Matrix4x4::scaling(2.0, 2.0, 2.0));

    let pattern = Pattern::stripe(Color::white(), Color::black());
    let c = pattern.color_on_shape_at(&shape, Point::new(1.5, 0.0, 0.0));

    assert_eq!(c, Color::white());
}

#[test]
fn stripes_with_a_pattern_transformation() {
    let shape = Shape::sphere();

    let mut pattern = Pattern::stripe(Color::white(), Color::black());
    pattern.set_transform(Matrix4x4::scaling(2.0, 2.0, 2.0));
    let c = pattern.color_on_shape_at(&shape, Point::new(1.5, 0.0, 0.0));

    assert_eq!(c, Color::white());
}

#[test]
fn stripes_with_both_transformations() {
    let mut shape = Shape::sphere();
    shape.set_transform(Matrix4x4::scaling(2.0, 2.0, 2.0));

    let mut pattern = Pattern::stripe(Color::white(), Color::black());
    pattern.set_transform(Matrix4x4::translation(0.5, 0.0, 0.0));
    let c = pattern.color_on_shape_at(&shape, Point::new(2.5, 0.0, 0.0));

    assert_eq!(c, Color::white());
}
