use crate::consts::EPSILON;
use crate::linear::Point;
use crate::matrix::Matrix4x4;
use crate::ray::Ray;

/// An axis-aligned bounding box in some shape's local space.
///
/// An empty box carries inverted infinite extents so that growing it by any
/// point or box produces that point or box.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Bounds {
    pub minimum: Point,
    pub maximum: Point,
}

impl Default for Bounds {
    fn default() -> Bounds {
        Bounds::empty()
    }
}

impl Bounds {
    pub fn new(minimum: Point, maximum: Point) -> Bounds {
        Bounds { minimum, maximum }
    }

    /// A box containing nothing.
    pub fn empty() -> Bounds {
        Bounds {
            minimum: Point::new(f64::INFINITY, f64::INFINITY, f64::INFINITY),
            maximum: Point::new(-f64::INFINITY, -f64::INFINITY, -f64::INFINITY),
        }
    }

    /// A box containing everything. Used for unbounded shapes (planes and
    /// uncapped cylinders/cones), where a slab test must never reject a ray.
    pub fn infinite() -> Bounds {
        Bounds {
            minimum: Point::new(-f64::INFINITY, -f64::INFINITY, -f64::INFINITY),
            maximum: Point::new(f64::INFINITY, f64::INFINITY, f64::INFINITY),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.minimum.x > self.maximum.x
    }

    fn is_finite(&self) -> bool {
        [
            self.minimum.x, self.minimum.y, self.minimum.z,
            self.maximum.x, self.maximum.y, self.maximum.z,
        ].iter().all(|c| c.is_finite())
    }

    /// Grows the box to contain `p`.
    pub fn add_point(&mut self, p: Point) {
        self.minimum.x = self.minimum.x.min(p.x);
        self.minimum.y = self.minimum.y.min(p.y);
        self.minimum.z = self.minimum.z.min(p.z);
        self.maximum.x = self.maximum.x.max(p.x);
        self.maximum.y = self.maximum.y.max(p.y);
        self.maximum.z = self.maximum.z.max(p.z);
    }

    /// Grows the box to contain another box.
    pub fn merge(&mut self, other: &Bounds) {
        if other.is_empty() {
            return;
        }

        self.add_point(other.minimum);
        self.add_point(other.maximum);
    }

    /// The box containing this box after a transformation, computed by
    /// transforming all eight corners.
    ///
    /// Infinite extents would poison the corner products with NaN, so any
    /// non-finite box degrades to the conservative all-containing box.
    pub fn transform(&self, m: &Matrix4x4) -> Bounds {
        if self.is_empty() {
            return Bounds::empty();
        }

        if !self.is_finite() {
            return Bounds::infinite();
        }

        let corners = [
            Point::new(self.minimum.x, self.minimum.y, self.minimum.z),
            Point::new(self.minimum.x, self.minimum.y, self.maximum.z),
            Point::new(self.minimum.x, self.maximum.y, self.minimum.z),
            Point::new(self.minimum.x, self.maximum.y, self.maximum.z),
            Point::new(self.maximum.x, self.minimum.y, self.minimum.z),
            Point::new(self.maximum.x, self.minimum.y, self.maximum.z),
            Point::new(self.maximum.x, self.maximum.y, self.minimum.z),
            Point::new(self.maximum.x, self.maximum.y, self.maximum.z),
        ];

        let mut out = Bounds::empty();
        for corner in corners {
            out.add_point(*m * corner);
        }

        out
    }

    /// Minimum and maximum ray offsets crossing one axis-aligned slab.
    ///
    /// `minimum` must not exceed `maximum`; passing an inverted pair is a
    /// caller bug.
    pub fn check_axis(minimum: f64, maximum: f64, origin: f64, direction: f64)
        -> (f64, f64) {
        assert!(minimum <= maximum,
            "slab check called with inverted extents: {} > {}",
            minimum, maximum);

        let tmin_numerator = minimum - origin;
        let tmax_numerator = maximum - origin;

        let (tmin, tmax) = if direction.abs() >= EPSILON {
            (tmin_numerator / direction, tmax_numerator / direction)
        } else {
            (tmin_numerator * f64::INFINITY, tmax_numerator * f64::INFINITY)
        };

        if tmin > tmax {
            (tmax, tmin)
        } else {
            (tmin, tmax)
        }
    }

    /// Slab test over all three axes.
    pub fn intersects(&self, ray: &Ray) -> bool {
        if self.is_empty() {
            return false;
        }

        let (xtmin, xtmax) = Bounds::check_axis(
            self.minimum.x, self.maximum.x, ray.origin.x, ray.direction.x
        );
        let (ytmin, ytmax) = Bounds::check_axis(
            self.minimum.y, self.maximum.y, ray.origin.y, ray.direction.y
        );
        let (ztmin, ztmax) = Bounds::check_axis(
            self.minimum.z, self.maximum.z, ray.origin.z, ray.direction.z
        );

        let tmin = xtmin.max(ytmin).max(ztmin);
        let tmax = xtmax.min(ytmax).min(ztmax);

        tmin <= tmax
    }
}

/* Tests */

#[test]
fn empty_bounds_absorb_points() {
    let mut b = Bounds::empty();
    assert!(b.is_empty());

    b.add_point(Point::new(-5.0, 2.0, 0.0));
    b.add_point(Point::new(7.0, 0.0, -3.0));

    assert!(!b.is_empty());
    assert_eq!(b.minimum, Point::new(-5.0, 0.0, -3.0));
    assert_eq!(b.maximum, Point::new(7.0, 2.0, 0.0));
}

#[test]
fn merge_bounds() {
    let mut b = Bounds::new(
        Point::new(-1.0, -1.0, -1.0), Point::new(1.0, 1.0, 1.0)
    );
    b.merge(&Bounds::new(
        Point::new(0.0, 0.0, 0.0), Point::new(4.0, 4.0, 4.0)
    ));

    assert_eq!(b.minimum, Point::new(-1.0, -1.0, -1.0));
    assert_eq!(b.maximum, Point::new(4.0, 4.0, 4.0));
}

#[test]
fn merging_an_empty_box_changes_nothing() {
    let mut b = Bounds::new(
        Point::new(-1.0, -1.0, -1.0), Point::new(1.0, 1.0, 1.0)
    );
    b.merge(&Bounds::empty());

    assert_eq!(b.minimum, Point::new(-1.0, -1.0, -1.0));
    assert_eq!(b.maximum, Point::new(1.0, 1.0, 1.0));
}

#[test]
fn transform_unit_bounds_by_rotation() {
    let b = Bounds::new(
        Point::new(-1.0, -1.0, -1.0), Point::new(1.0, 1.0, 1.0)
    );

    let rotated = b.transform(
        &(Matrix4x4::rotation_x(std::f64::consts::PI / 4.0)
            * Matrix4x4::rotation_y(std::f64::consts::PI / 4.0))
    );

    assert_eq!(rotated.minimum, Point::new(-1.41421, -1.70711, -1.70711));
    assert_eq!(rotated.maximum, Point::new(1.41421, 1.70711, 1.70711));
}

#[test]
fn transform_unbounded_box_stays_all_containing() {
    use crate::linear::Vector;

    let b = Bounds::new(
        Point::new(-f64::INFINITY, 0.0, -f64::INFINITY),
        Point::new(f64::INFINITY, 0.0, f64::INFINITY)
    );

    let moved = b.transform(&Matrix4x4::translation(0.0, 5.0, 0.0));

    let r = Ray::new(Point::new(0.0, 10.0, 0.0), Vector::new(0.0, 1.0, 0.0));
    assert!(moved.intersects(&r));
}

#[test]
fn ray_hits_and_misses_box() {
    use crate::linear::Vector;

    let b = Bounds::new(
        Point::new(-1.0, -1.0, -1.0), Point::new(1.0, 1.0, 1.0)
    );

    let hit = Ray::new(Point::new(0.0, 0.0, -5.0), Vector::new(0.0, 0.0, 1.0));
    let miss = Ray::new(Point::new(0.0, 2.0, -5.0), Vector::new(0.0, 0.0, 1.0));

    assert!(b.intersects(&hit));
    assert!(!b.intersects(&miss));
}

#[test]
fn empty_box_intersects_nothing() {
    use crate::linear::Vector;

    let b = Bounds::empty();
    let r = Ray::new(Point::origin(), Vector::new(0.0, 0.0, 1.0));

    assert!(!b.intersects(&r));
}

#[test]
#[should_panic]
fn inverted_slab_extents_are_rejected() {
    Bounds::check_axis(1.0, -1.0, 0.0, 1.0);
}
