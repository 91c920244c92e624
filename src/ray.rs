use crate::linear::{ Point, Vector };
use crate::matrix::Matrix4x4;

/// A ray with an origin and a (not necessarily unit) direction.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Ray {
    pub origin: Point,
    pub direction: Vector,
}

impl Ray {
    pub fn new(origin: Point, direction: Vector) -> Ray {
        Ray { origin, direction }
    }

    /// The point `t` units along the ray.
    pub fn position_at(&self, t: f64) -> Point {
        self.origin + self.direction * t
    }

    /// Applies a transformation to both origin and direction.
    pub fn transform(&self, m: &Matrix4x4) -> Ray {
        Ray {
            origin: *m * self.origin,
            direction: *m * self.direction,
        }
    }
}

/* Tests */

#[test]
fn position_along_ray() {
    let r = Ray::new(Point::new(2.0, 3.0, 4.0), Vector::new(1.0, 0.0, 0.0));

    assert_eq!(r.position_at(0.0), Point::new(2.0, 3.0, 4.0));
    assert_eq!(r.position_at(1.0), Point::new(3.0, 3.0, 4.0));
    assert_eq!(r.position_at(-1.0), Point::new(1.0, 3.0, 4.0));
    assert_eq!(r.position_at(2.5), Point::new(4.5, 3.0, 4.0));
}

#[test]
fn translate_ray() {
    let r = Ray::new(Point::new(1.0, 2.0, 3.0), Vector::new(0.0, 1.0, 0.0));
    let m = Matrix4x4::translation(3.0, 4.0, 5.0);
    let t = r.transform(&m);

    assert_eq!(t.origin, Point::new(4.0, 6.0, 8.0));
    assert_eq!(t.direction, Vector::new(0.0, 1.0, 0.0));
}

#[test]
fn scale_ray() {
    let r = Ray::new(Point::new(1.0, 2.0, 3.0), Vector::new(0.0, 1.0, 0.0));
    let m = Matrix4x4::scaling(2.0, 3.0, 4.0);
    let t = r.transform(&m);

    assert_eq!(t.origin, Point::new(2.0, 6.0, 12.0));
    assert_eq!(t.direction, Vector::new(0.0, 3.0, 0.0));
}
