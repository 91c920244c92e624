use std::ops::Index;

use crate::consts::EPSILON;
use crate::linear::{ Point, Vector };
use crate::ray::Ray;
use crate::shape::{ ShapeArena, ShapeId };

/// One ray-shape intersection at offset `t`.
///
/// The shape is identified by its arena id. The `uv` pair holds barycentric
/// coordinates and is populated only for smooth-triangle hits, where it
/// drives normal interpolation.
#[derive(Copy, Clone, Debug)]
pub struct Intersection {
    pub t: f64,
    pub shape: ShapeId,
    pub uv: Option<(f64, f64)>,
}

impl PartialEq for Intersection {
    fn eq(&self, other: &Intersection) -> bool {
        self.t == other.t && self.shape == other.shape && self.uv == other.uv
    }
}

impl Intersection {
    pub fn new(t: f64, shape: ShapeId) -> Intersection {
        Intersection { t, shape, uv: None }
    }

    pub fn new_uv(t: f64, shape: ShapeId, u: f64, v: f64) -> Intersection {
        Intersection { t, shape, uv: Some((u, v)) }
    }
}

/// A list of intersections, kept sorted ascending by `t` at all times.
///
/// Sortedness is an invariant, not a convention: `add` inserts at the
/// partition point and `extend`/`aggregate` go through `add`, so `hit` can
/// binary-search. Non-finite offsets are discarded on insertion.
#[derive(Clone, Debug, Default)]
pub struct Intersections {
    items: Vec<Intersection>,
}

impl Intersections {
    pub fn new() -> Intersections {
        Intersections { items: Vec::new() }
    }

    pub fn from_vec(items: Vec<Intersection>) -> Intersections {
        let mut is = Intersections::new();
        for i in items {
            is.add(i);
        }

        is
    }

    /// Inserts one intersection, preserving ascending `t` order.
    pub fn add(&mut self, i: Intersection) {
        if !i.t.is_finite() {
            return;
        }

        let at = self.items.partition_point(|x| x.t <= i.t);
        self.items.insert(at, i);
    }

    /// Merges another list into this one.
    pub fn extend(&mut self, other: Intersections) {
        for i in other.items {
            self.add(i);
        }
    }

    /// Merges many lists into a single sorted list.
    pub fn aggregate(lists: Vec<Intersections>) -> Intersections {
        let mut out = Intersections::new();
        for list in lists {
            out.extend(list);
        }

        out
    }

    /// The visible hit: the intersection with the smallest `t >= 0`.
    pub fn hit(&self) -> Option<Intersection> {
        let at = self.items.partition_point(|x| x.t < 0.0);
        self.items.get(at).copied()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Intersection> {
        self.items.iter()
    }
}

impl Index<usize> for Intersections {
    type Output = Intersection;

    fn index(&self, index: usize) -> &Intersection {
        &self.items[index]
    }
}

/// Shading geometry precomputed for one hit.
///
/// Everything downstream shading needs is derived once here: the hit point
/// with its over/under offsets, the eye and (possibly flipped) normal
/// vectors, the reflection direction and the refractive boundary indices.
#[derive(Clone, Debug)]
pub struct IntersectionState {
    /// The ray offset of the hit.
    pub t: f64,

    /// The shape that was hit.
    pub shape: ShapeId,

    /// The point where the hit occurs.
    pub point: Point,

    /// The hit point nudged above the surface; shadow and reflection rays
    /// start here so a surface cannot shadow or reflect itself ("acne").
    pub over_point: Point,

    /// The hit point nudged below the surface; refraction rays start here.
    pub under_point: Point,

    /// The direction back toward the eye.
    pub eyev: Vector,

    /// The surface normal, flipped toward the eye when `inside`.
    pub normalv: Vector,

    /// The ray direction reflected across the normal.
    pub reflectv: Vector,

    /// Whether the geometric normal faced away from the eye.
    pub inside: bool,

    /// Refractive index of the medium being exited.
    pub n1: f64,

    /// Refractive index of the medium being entered.
    pub n2: f64,
}

impl IntersectionState {
    /// Precomputes the shading state for `hit`.
    ///
    /// When the full intersection list is supplied, the refractive boundary
    /// indices `n1`/`n2` are derived from it; otherwise both default to the
    /// vacuum index.
    pub fn new(hit: &Intersection, ray: &Ray, xs: Option<&Intersections>,
        arena: &ShapeArena) -> IntersectionState {
        let t = hit.t;
        let shape = hit.shape;
        let point = ray.position_at(t);
        let eyev = -ray.direction;
        let mut normalv = arena.normal_at(shape, point, Some(hit));

        let inside = if normalv.dot(&eyev) < 0.0 {
            normalv = -normalv;
            true
        } else {
            false
        };

        let over_point = point + normalv * EPSILON;
        let under_point = point - normalv * EPSILON;
        let reflectv = ray.direction.reflect(&normalv);

        let (n1, n2) = match xs {
            Some(xs) => Self::refractive_boundary(hit, xs, arena),
            None => (1.0, 1.0),
        };

        IntersectionState {
            t, shape,
            point, over_point, under_point,
            eyev, normalv, reflectv,
            inside,
            n1, n2,
        }
    }

    /// Walks the sorted intersection list up to `hit`, toggling shapes in
    /// and out of a container list to find the media on both sides of the
    /// refraction boundary.
    fn refractive_boundary(hit: &Intersection, xs: &Intersections,
        arena: &ShapeArena) -> (f64, f64) {
        let mut n1 = 1.0;
        let mut n2 = 1.0;

        // Shapes entered but not yet exited, innermost last.
        let mut containers: Vec<ShapeId> = Vec::new();

        for i in xs.iter() {
            if i == hit {
                n1 = match containers.last() {
                    Some(&id) => arena.shape(id).material.refractive_index,
                    None => 1.0,
                };
            }

            // Toggle membership: a second crossing of the same shape exits it.
            if let Some(at) = containers.iter().position(|&id| id == i.shape) {
                containers.remove(at);
            } else {
                containers.push(i.shape);
            }

            if i == hit {
                n2 = match containers.last() {
                    Some(&id) => arena.shape(id).material.refractive_index,
                    None => 1.0,
                };

                break;
            }
        }

        (n1, n2)
    }

    /// Schlick's approximation of the Fresnel reflectance at the hit.
    ///
    /// Returns 1.0 under total internal reflection.
    pub fn schlick(&self) -> f64 {
        let mut cos = self.eyev.dot(&self.normalv);

        // Total internal reflection can only occur when exiting into a less
        // dense medium.
        if self.n1 > self.n2 {
            let n = self.n1 / self.n2;
            let sin2_t = n.powi(2) * (1.0 - cos.powi(2));

            if sin2_t > 1.0 {
                return 1.0;
            }

            cos = (1.0 - sin2_t).sqrt();
        }

        let r0 = ((self.n1 - self.n2) / (self.n1 + self.n2)).powi(2);
        r0 + (1.0 - r0) * (1.0 - cos).powi(5)
    }
}

/* Tests */

#[cfg(test)]
use crate::shape::Shape;
#[cfg(test)]
use crate::matrix::Matrix4x4;

#[test]
fn hit_with_all_positive_offsets() {
    let mut arena = ShapeArena::new();
    let s = arena.insert(Shape::sphere());

    let i1 = Intersection::new(1.0, s);
    let i2 = Intersection::new(2.0, s);
    let is = Intersections::from_vec(vec![i2, i1]);

    assert_eq!(is.hit().unwrap(), i1);
}

#[test]
fn hit_with_some_negative_offsets() {
    let mut arena = ShapeArena::new();
    let s = arena.insert(Shape::sphere());

    let i1 = Intersection::new(-1.0, s);
    let i2 = Intersection::new(1.0, s);
    let is = Intersections::from_vec(vec![i2, i1]);

    assert_eq!(is.hit().unwrap(), i2);
}

#[test]
fn hit_with_all_negative_offsets() {
    let mut arena = ShapeArena::new();
    let s = arena.insert(Shape::sphere());

    let i1 = Intersection::new(-2.0, s);
    let i2 = Intersection::new(-1.0, s);
    let is = Intersections::from_vec(vec![i2, i1]);

    assert_eq!(is.hit(), None);
}

#[test]
fn hit_is_the_lowest_nonnegative_offset() {
    let mut arena = ShapeArena::new();
    let s = arena.insert(Shape::sphere());

    let i1 = Intersection::new(5.0, s);
    let i2 = Intersection::new(7.0, s);
    let i3 = Intersection::new(-3.0, s);
    let i4 = Intersection::new(2.0, s);
    let is = Intersections::from_vec(vec![i1, i2, i3, i4]);

    assert_eq!(is.hit().unwrap(), i4);
}

#[test]
fn additions_keep_the_list_sorted() {
    let mut arena = ShapeArena::new();
    let s = arena.insert(Shape::sphere());

    let mut is = Intersections::new();
    for t in [4.0, -2.0, 7.5, 0.0, 3.25] {
        is.add(Intersection::new(t, s));
    }

    let offsets: Vec<f64> = is.iter().map(|i| i.t).collect();
    assert_eq!(offsets, vec![-2.0, 0.0, 3.25, 4.0, 7.5]);

    let mut other = Intersections::new();
    other.add(Intersection::new(1.0, s));
    other.add(Intersection::new(-5.0, s));
    is.extend(other);

    let offsets: Vec<f64> = is.iter().map(|i| i.t).collect();
    assert_eq!(offsets, vec![-5.0, -2.0, 0.0, 1.0, 3.25, 4.0, 7.5]);
}

#[test]
fn non_finite_offsets_are_discarded() {
    let mut arena = ShapeArena::new();
    let s = arena.insert(Shape::sphere());

    let mut is = Intersections::new();
    is.add(Intersection::new(f64::INFINITY, s));
    is.add(Intersection::new(f64::NAN, s));
    is.add(Intersection::new(2.0, s));

    assert_eq!(is.len(), 1);
    assert_eq!(is[0].t, 2.0);
}

#[test]
fn precompute_state_of_an_outside_hit() {
    let mut arena = ShapeArena::new();
    let s = arena.insert(Shape::sphere());

    let r = Ray::new(Point::new(0.0, 0.0, -5.0), Vector::new(0.0, 0.0, 1.0));
    let i = Intersection::new(4.0, s);
    let comps = IntersectionState::new(&i, &r, None, &arena);

    assert_eq!(comps.t, i.t);
    assert_eq!(comps.shape, s);
    assert_eq!(comps.point, Point::new(0.0, 0.0, -1.0));
    assert_eq!(comps.eyev, Vector::new(0.0, 0.0, -1.0));
    assert_eq!(comps.normalv, Vector::new(0.0, 0.0, -1.0));
    assert!(!comps.inside);
}

#[test]
fn precompute_state_of_an_inside_hit() {
    let mut arena = ShapeArena::new();
    let s = arena.insert(Shape::sphere());

    let r = Ray::new(Point::origin(), Vector::new(0.0, 0.0, 1.0));
    let i = Intersection::new(1.0, s);
    let comps = IntersectionState::new(&i, &r, None, &arena);

    assert!(comps.inside);
    assert_eq!(comps.point, Point::new(0.0, 0.0, 1.0));
    assert_eq!(comps.eyev, Vector::new(0.0, 0.0, -1.0));

    // The normal is flipped back toward the eye.
    assert_eq!(comps.normalv, Vector::new(0.0, 0.0, -1.0));
}

#[test]
fn hit_point_is_offset_above_the_surface() {
    let mut arena = ShapeArena::new();
    let mut sphere = Shape::sphere();
    sphere.set_transform(Matrix4x4::translation(0.0, 0.0, 1.0));
    let s = arena.insert(sphere);

    let r = Ray::new(Point::new(0.0, 0.0, -5.0), Vector::new(0.0, 0.0, 1.0));
    let i = Intersection::new(5.0, s);
    let comps = IntersectionState::new(&i, &r, None, &arena);

    assert!(comps.over_point.z < -EPSILON / 2.0);
    assert!(comps.point.z > comps.over_point.z);
}

#[test]
fn hit_point_is_offset_below_the_surface() {
    let mut arena = ShapeArena::new();
    let mut sphere = Shape::glass_sphere();
    sphere.set_transform(Matrix4x4::translation(0.0, 0.0, 1.0));
    let s = arena.insert(sphere);

    let r = Ray::new(Point::new(0.0, 0.0, -5.0), Vector::new(0.0, 0.0, 1.0));
    let i = Intersection::new(5.0, s);
    let is = Intersections::from_vec(vec![i]);
    let comps = IntersectionState::new(&i, &r, Some(&is), &arena);

    assert!(comps.under_point.z > EPSILON / 2.0);
    assert!(comps.point.z < comps.under_point.z);
}

#[test]
fn precompute_the_reflection_vector() {
    let mut arena = ShapeArena::new();
    let s = arena.insert(Shape::plane());

    let half_sqrt2 = 2.0f64.sqrt() / 2.0;
    let r = Ray::new(
        Point::new(0.0, 1.0, -1.0),
        Vector::new(0.0, -half_sqrt2, half_sqrt2)
    );

    let i = Intersection::new(2.0f64.sqrt(), s);
    let comps = IntersectionState::new(&i, &r, None, &arena);

    assert_eq!(comps.reflectv, Vector::new(0.0, half_sqrt2, half_sqrt2));
}

#[test]
fn refractive_boundaries_across_nested_glass_spheres() {
    let mut arena = ShapeArena::new();

    let mut a = Shape::glass_sphere();
    a.set_transform(Matrix4x4::scaling(2.0, 2.0, 2.0));
    a.material.refractive_index = 1.5;
    let a = arena.insert(a);

    let mut b = Shape::glass_sphere();
    b.set_transform(Matrix4x4::translation(0.0, 0.0, -0.25));
    b.material.refractive_index = 2.0;
    let b = arena.insert(b);

    let mut c = Shape::glass_sphere();
    c.set_transform(Matrix4x4::translation(0.0, 0.0, 0.25));
    c.material.refractive_index = 2.5;
    let c = arena.insert(c);

    let r = Ray::new(Point::new(0.0, 0.0, -4.0), Vector::new(0.0, 0.0, 1.0));
    let is = Intersections::from_vec(vec![
        Intersection::new(2.0, a),
        Intersection::new(2.75, b),
        Intersection::new(3.25, c),
        Intersection::new(4.75, b),
        Intersection::new(5.25, c),
        Intersection::new(6.0, a),
    ]);

    let expected = [
        (1.0, 1.5),
        (1.5, 2.0),
        (2.0, 2.5),
        (2.5, 2.5),
        (2.5, 1.5),
        (1.5, 1.0),
    ];

    for (at, (n1, n2)) in expected.iter().enumerate() {
        let comps = IntersectionState::new(&is[at], &r, Some(&is), &arena);
        assert_eq!(comps.n1, *n1, "n1 mismatch at intersection {}", at);
        assert_eq!(comps.n2, *n2, "n2 mismatch at intersection {}", at);
    }
}

#[test]
fn schlick_under_total_internal_reflection() {
    let mut arena = ShapeArena::new();
    let s = arena.insert(Shape::glass_sphere());

    let half_sqrt2 = 2.0f64.sqrt() / 2.0;
    let r = Ray::new(
        Point::new(0.0, 0.0, half_sqrt2),
        Vector::new(0.0, 1.0, 0.0)
    );

    let is = Intersections::from_vec(vec![
        Intersection::new(-half_sqrt2, s),
        Intersection::new(half_sqrt2, s),
    ]);

    let comps = IntersectionState::new(&is[1], &r, Some(&is), &arena);
    assert_eq!(comps.schlick(), 1.0);
}

#[test]
fn schlick_at_a_perpendicular_viewing_angle() {
    use crate::feq;

    let mut arena = ShapeArena::new();
    let s = arena.insert(Shape::glass_sphere());

    let r = Ray::new(Point::origin(), Vector::new(0.0, 1.0, 0.0));
    let is = Intersections::from_vec(vec![
        Intersection::new(-1.0, s),
        Intersection::new(1.0, s),
    ]);

    let comps = IntersectionState::new(&is[1], &r, Some(&is), &arena);
    assert!(feq(comps.schlick(), 0.04));
}

#[test]
fn schlick_at_a_grazing_angle_into_denser_medium() {
    use crate::feq;

    let mut arena = ShapeArena::new();
    let s = arena.insert(Shape::glass_sphere());

    let r = Ray::new(
        Point::new(0.0, 0.99, -2.0),
        Vector::new(0.0, 0.0, 1.0)
    );

    let is = Intersections::from_vec(vec![Intersection::new(1.8589, s)]);

    let comps = IntersectionState::new(&is[0], &r, Some(&is), &arena);
    assert!(feq(comps.schlick(), 0.48873));
}
