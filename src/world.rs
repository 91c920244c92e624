use crate::feq;
use crate::color::Color;
use crate::linear::Point;
use crate::ray::Ray;
use crate::light::{ PointLight, lighting };
use crate::intersect::{ Intersections, IntersectionState };
use crate::shape::{ Shape, ShapeArena, ShapeId };

/// A scene: one or more lights plus the shapes to render.
///
/// The arena owns every shape; `roots` lists the top-level ones a ray is
/// tested against (children of groups and CSG nodes are reached through
/// their parents). A world is read-only while a render is in flight.
#[derive(Clone, Debug)]
pub struct World {
    pub lights: Vec<PointLight>,
    pub arena: ShapeArena,
    pub roots: Vec<ShapeId>,
}

impl World {
    /// A world with no lights and no shapes.
    pub fn empty() -> World {
        World {
            lights: Vec::new(),
            arena: ShapeArena::new(),
            roots: Vec::new(),
        }
    }

    /// Inserts a shape as a top-level object and returns its id.
    pub fn add_shape(&mut self, shape: Shape) -> ShapeId {
        let id = self.arena.insert(shape);
        self.roots.push(id);

        id
    }

    pub fn add_light(&mut self, light: PointLight) {
        self.lights.push(light);
    }

    /// Intersects a ray with every top-level shape, merged and sorted.
    pub fn intersect(&self, ray: &Ray) -> Intersections {
        let lists = self.roots.iter()
            .map(|&id| self.arena.intersect(id, ray))
            .collect();

        Intersections::aggregate(lists)
    }

    /// Whether something sits strictly between `point` and the light.
    pub fn is_shadowed(&self, point: Point, light: &PointLight) -> bool {
        let to_light = light.position - point;
        let distance = to_light.magnitude();

        let shadow_ray = Ray::new(point, to_light.normalize());
        match self.intersect(&shadow_ray).hit() {
            Some(hit) => hit.t < distance,
            None => false,
        }
    }

    /// Shades one precomputed hit: direct lighting from every light plus
    /// the recursive reflection and refraction contributions.
    ///
    /// When the material is both reflective and transparent, the two
    /// secondary contributions are blended by the Schlick reflectance
    /// instead of summed.
    pub fn shade_hit(&self, comps: &IntersectionState, remaining: usize)
        -> Color {
        let shape = self.arena.shape(comps.shape);
        let material = &shape.material;

        let mut surface = Color::black();
        for light in self.lights.iter() {
            let shadowed = self.is_shadowed(comps.over_point, light);
            surface = surface + lighting(material, shape, light,
                comps.over_point, comps.eyev, comps.normalv, shadowed);
        }

        let reflected = self.reflected_color(comps, remaining);
        let refracted = self.refracted_color(comps, remaining);

        if material.reflective > 0.0 && material.transparency > 0.0 {
            let reflectance = comps.schlick();
            surface + reflected * reflectance + refracted * (1.0 - reflectance)
        } else {
            surface + reflected + refracted
        }
    }

    /// The color contributed by the reflection bounce, black once the
    /// recursion allowance runs out or for non-reflective materials.
    pub fn reflected_color(&self, comps: &IntersectionState, remaining: usize)
        -> Color {
        if remaining == 0 {
            return Color::black();
        }

        let reflective = self.arena.shape(comps.shape).material.reflective;
        if feq(reflective, 0.0) {
            return Color::black();
        }

        let reflect_ray = Ray::new(comps.over_point, comps.reflectv);
        self.color_at(&reflect_ray, remaining - 1) * reflective
    }

    /// The color carried through the surface by refraction.
    ///
    /// Black once the recursion allowance runs out, for opaque materials,
    /// and under total internal reflection.
    pub fn refracted_color(&self, comps: &IntersectionState, remaining: usize)
        -> Color {
        if remaining == 0 {
            return Color::black();
        }

        let transparency = self.arena.shape(comps.shape).material.transparency;
        if feq(transparency, 0.0) {
            return Color::black();
        }

        // Snell's law, with the ratio of the boundary indices.
        let n_ratio = comps.n1 / comps.n2;
        let cos_i = comps.eyev.dot(&comps.normalv);
        let sin2_t = n_ratio.powi(2) * (1.0 - cos_i.powi(2));

        if sin2_t > 1.0 {
            return Color::black();
        }

        let cos_t = (1.0 - sin2_t).sqrt();
        let direction = comps.normalv * (n_ratio * cos_i - cos_t)
            - comps.eyev * n_ratio;

        let refract_ray = Ray::new(comps.under_point, direction);
        self.color_at(&refract_ray, remaining - 1) * transparency
    }

    /// The color seen along a ray: black on a miss, otherwise the shaded
    /// closest visible hit.
    pub fn color_at(&self, ray: &Ray, remaining: usize) -> Color {
        let xs = self.intersect(ray);
        match xs.hit() {
            None => Color::black(),
            Some(hit) => {
                let comps =
                    IntersectionState::new(&hit, ray, Some(&xs), &self.arena);
                self.shade_hit(&comps, remaining)
            },
        }
    }
}

/// The conventional two-sphere test world.
impl Default for World {
    fn default() -> World {
        let mut world = World::empty();

        world.add_light(PointLight::new(
            Color::white(),
            Point::new(-10.0, 10.0, -10.0)
        ));

        let mut outer = Shape::sphere();
        outer.material.color = Color::rgb(0.8, 1.0, 0.6);
        outer.material.diffuse = 0.7;
        outer.material.specular = 0.2;
        world.add_shape(outer);

        let mut inner = Shape::sphere();
        inner.set_transform(crate::matrix::Matrix4x4::scaling(0.5, 0.5, 0.5));
        world.add_shape(inner);

        world
    }
}

/* Tests */

#[cfg(test)]
use crate::consts::RECURSION_DEPTH;
#[cfg(test)]
use crate::linear::Vector;
#[cfg(test)]
use crate::matrix::Matrix4x4;
#[cfg(test)]
use crate::intersect::Intersection;

#[test]
fn intersect_default_world_with_ray() {
    let w: World = Default::default();
    let r = Ray::new(Point::new(0.0, 0.0, -5.0), Vector::new(0.0, 0.0, 1.0));

    let is = w.intersect(&r);

    assert_eq!(is.len(), 4);
    assert_eq!(is[0].t, 4.0);
    assert_eq!(is[1].t, 4.5);
    assert_eq!(is[2].t, 5.5);
    assert_eq!(is[3].t, 6.0);
}

#[test]
fn shade_an_intersection_from_outside() {
    let w: World = Default::default();
    let r = Ray::new(Point::new(0.0, 0.0, -5.0), Vector::new(0.0, 0.0, 1.0));

    let i = Intersection::new(4.0, w.roots[0]);
    let comps = IntersectionState::new(&i, &r, None, &w.arena);
    let c = w.shade_hit(&comps, RECURSION_DEPTH);

    assert_eq!(c, Color::rgb(0.38066, 0.47583, 0.2855));
}

#[test]
fn shade_an_intersection_from_inside() {
    let mut w: World = Default::default();
    w.lights = vec![PointLight::new(
        Color::white(),
        Point::new(0.0, 0.25, 0.0)
    )];

    let r = Ray::new(Point::origin(), Vector::new(0.0, 0.0, 1.0));
    let i = Intersection::new(0.5, w.roots[1]);
    let comps = IntersectionState::new(&i, &r, None, &w.arena);
    let c = w.shade_hit(&comps, RECURSION_DEPTH);

    assert_eq!(c, Color::rgb(0.90498, 0.90498, 0.90498));
}

#[test]
fn shade_an_intersection_in_shadow() {
    let mut w = World::empty();
    w.add_light(PointLight::new(
        Color::white(),
        Point::new(0.0, 0.0, -10.0)
    ));

    w.add_shape(Shape::sphere());

    let mut second = Shape::sphere();
    second.set_transform(Matrix4x4::translation(0.0, 0.0, 10.0));
    let s2 = w.add_shape(second);

    let r = Ray::new(Point::new(0.0, 0.0, 5.0), Vector::new(0.0, 0.0, 1.0));
    let i = Intersection::new(4.0, s2);
    let comps = IntersectionState::new(&i, &r, None, &w.arena);
    let c = w.shade_hit(&comps, RECURSION_DEPTH);

    assert_eq!(c, Color::rgb(0.1, 0.1, 0.1));
}

#[test]
fn color_of_a_missing_ray() {
    let w: World = Default::default();
    let r = Ray::new(Point::new(0.0, 0.0, -5.0), Vector::new(0.0, 1.0, 0.0));

    assert_eq!(w.color_at(&r, RECURSION_DEPTH), Color::black());
}

#[test]
fn color_of_a_hitting_ray() {
    let w: World = Default::default();
    let r = Ray::new(Point::new(0.0, 0.0, -5.0), Vector::new(0.0, 0.0, 1.0));

    assert_eq!(w.color_at(&r, RECURSION_DEPTH),
        Color::rgb(0.38066, 0.47583, 0.2855));
}

#[test]
fn color_with_an_intersection_behind_the_ray() {
    let mut w: World = Default::default();
    let outer = w.roots[0];
    let inner = w.roots[1];

    w.arena.shape_mut(outer).material.ambient = 1.0;
    w.arena.shape_mut(inner).material.ambient = 1.0;

    let r = Ray::new(Point::new(0.0, 0.0, 0.75), Vector::new(0.0, 0.0, -1.0));
    let inner_color = w.arena.shape(inner).material.color;

    assert_eq!(w.color_at(&r, RECURSION_DEPTH), inner_color);
}

#[test]
fn two_lights_shade_additively() {
    let mut w: World = Default::default();
    let single = {
        let r = Ray::new(
            Point::new(0.0, 0.0, -5.0), Vector::new(0.0, 0.0, 1.0)
        );
        w.color_at(&r, RECURSION_DEPTH)
    };

    w.add_light(w.lights[0]);
    let r = Ray::new(Point::new(0.0, 0.0, -5.0), Vector::new(0.0, 0.0, 1.0));

    assert_eq!(w.color_at(&r, RECURSION_DEPTH), single * 2.0);
}

#[test]
fn no_shadow_when_nothing_blocks_the_light() {
    let w: World = Default::default();
    let light = w.lights[0];

    assert!(!w.is_shadowed(Point::new(0.0, 10.0, 0.0), &light));
}

#[test]
fn shadow_when_an_object_is_between_point_and_light() {
    let w: World = Default::default();
    let light = w.lights[0];

    assert!(w.is_shadowed(Point::new(10.0, -10.0, 10.0), &light));
}

#[test]
fn no_shadow_when_object_is_behind_the_light() {
    let w: World = Default::default();
    let light = w.lights[0];

    assert!(!w.is_shadowed(Point::new(-20.0, 20.0, -20.0), &light));
}

#[test]
fn no_shadow_when_object_is_behind_the_point() {
    let w: World = Default::default();
    let light = w.lights[0];

    assert!(!w.is_shadowed(Point::new(-2.0, 2.0, -2.0), &light));
}

#[test]
fn reflected_color_of_a_nonreflective_material() {
    let mut w: World = Default::default();
    let inner = w.roots[1];
    w.arena.shape_mut(inner).material.ambient = 1.0;

    let r = Ray::new(Point::origin(), Vector::new(0.0, 0.0, 1.0));
    let i = Intersection::new(1.0, inner);
    let comps = IntersectionState::new(&i, &r, None, &w.arena);

    assert_eq!(w.reflected_color(&comps, RECURSION_DEPTH), Color::black());
}

#[test]
fn reflected_color_off_a_reflective_plane() {
    let mut w: World = Default::default();

    let mut floor = Shape::plane();
    floor.material.reflective = 0.5;
    floor.set_transform(Matrix4x4::translation(0.0, -1.0, 0.0));
    let p = w.add_shape(floor);

    let half_sqrt2 = 2.0f64.sqrt() / 2.0;
    let r = Ray::new(
        Point::new(0.0, 0.0, -3.0),
        Vector::new(0.0, -half_sqrt2, half_sqrt2)
    );

    let i = Intersection::new(2.0f64.sqrt(), p);
    let comps = IntersectionState::new(&i, &r, None, &w.arena);

    assert_eq!(w.reflected_color(&comps, RECURSION_DEPTH),
        Color::rgb(0.19032, 0.2379, 0.14274));
}

#[test]
fn shade_hit_includes_the_reflection() {
    let mut w: World = Default::default();

    let mut floor = Shape::plane();
    floor.material.reflective = 0.5;
    floor.set_transform(Matrix4x4::translation(0.0, -1.0, 0.0));
    let p = w.add_shape(floor);

    let half_sqrt2 = 2.0f64.sqrt() / 2.0;
    let r = Ray::new(
        Point::new(0.0, 0.0, -3.0),
        Vector::new(0.0, -half_sqrt2, half_sqrt2)
    );

    let i = Intersection::new(2.0f64.sqrt(), p);
    let comps = IntersectionState::new(&i, &r, None, &w.arena);

    assert_eq!(w.shade_hit(&comps, RECURSION_DEPTH),
        Color::rgb(0.87677, 0.92436, 0.82918));
}

#[test]
fn reflected_color_at_exhausted_recursion_depth() {
    let mut w: World = Default::default();

    let mut floor = Shape::plane();
    floor.material.reflective = 0.5;
    floor.set_transform(Matrix4x4::translation(0.0, -1.0, 0.0));
    let p = w.add_shape(floor);

    let half_sqrt2 = 2.0f64.sqrt() / 2.0;
    let r = Ray::new(
        Point::new(0.0, 0.0, -3.0),
        Vector::new(0.0, -half_sqrt2, half_sqrt2)
    );

    let i = Intersection::new(2.0f64.sqrt(), p);
    let comps = IntersectionState::new(&i, &r, None, &w.arena);

    assert_eq!(w.reflected_color(&comps, 0), Color::black());
}

#[test]
fn facing_mirrors_terminate_with_a_finite_color() {
    let mut w = World::empty();
    w.add_light(PointLight::new(Color::white(), Point::origin()));

    let mut lower = Shape::plane();
    lower.material.reflective = 1.0;
    lower.set_transform(Matrix4x4::translation(0.0, -1.0, 0.0));
    w.add_shape(lower);

    let mut upper = Shape::plane();
    upper.material.reflective = 1.0;
    upper.set_transform(Matrix4x4::translation(0.0, 1.0, 0.0));
    w.add_shape(upper);

    let r = Ray::new(Point::origin(), Vector::new(0.0, 1.0, 0.0));
    let c = w.color_at(&r, RECURSION_DEPTH);

    assert!(c.r.is_finite() && c.g.is_finite() && c.b.is_finite());
    assert_eq!(c, Color::rgb(11.4, 11.4, 11.4));
}

#[test]
fn refracted_color_of_an_opaque_surface() {
    let w: World = Default::default();
    let outer = w.roots[0];

    let r = Ray::new(Point::new(0.0, 0.0, -5.0), Vector::new(0.0, 0.0, 1.0));
    let xs = Intersections::from_vec(vec![
        Intersection::new(4.0, outer),
        Intersection::new(6.0, outer),
    ]);

    let comps = IntersectionState::new(&xs[0], &r, Some(&xs), &w.arena);
    assert_eq!(w.refracted_color(&comps, RECURSION_DEPTH), Color::black());
}

#[test]
fn refracted_color_at_exhausted_recursion_depth() {
    let mut w: World = Default::default();
    let outer = w.roots[0];
    w.arena.shape_mut(outer).material.transparency = 1.0;
    w.arena.shape_mut(outer).material.refractive_index = 1.5;

    let r = Ray::new(Point::new(0.0, 0.0, -5.0), Vector::new(0.0, 0.0, 1.0));
    let xs = Intersections::from_vec(vec![
        Intersection::new(4.0, outer),
        Intersection::new(6.0, outer),
    ]);

    let comps = IntersectionState::new(&xs[0], &r, Some(&xs), &w.arena);
    assert_eq!(w.refracted_color(&comps, 0), Color::black());
}

#[test]
fn refracted_color_under_total_internal_reflection() {
    let mut w: World = Default::default();
    let outer = w.roots[0];
    w.arena.shape_mut(outer).material.transparency = 1.0;
    w.arena.shape_mut(outer).material.refractive_index = 1.5;

    let half_sqrt2 = 2.0f64.sqrt() / 2.0;
    let r = Ray::new(
        Point::new(0.0, 0.0, half_sqrt2),
        Vector::new(0.0, 1.0, 0.0)
    );

    let xs = Intersections::from_vec(vec![
        Intersection::new(-half_sqrt2, outer),
        Intersection::new(half_sqrt2, outer),
    ]);

    // The hit is the second intersection; the ray starts inside the sphere.
    let comps = IntersectionState::new(&xs[1], &r, Some(&xs), &w.arena);
    assert_eq!(w.refracted_color(&comps, RECURSION_DEPTH), Color::black());
}

#[test]
fn shade_hit_with_a_transparent_floor() {
    let mut w: World = Default::default();

    let mut floor = Shape::plane();
    floor.set_transform(Matrix4x4::translation(0.0, -1.0, 0.0));
    floor.material.transparency = 0.5;
    floor.material.refractive_index = 1.5;
    let p = w.add_shape(floor);

    let mut ball = Shape::sphere();
    ball.material.color = Color::red();
    ball.material.ambient = 0.5;
    ball.set_transform(Matrix4x4::translation(0.0, -3.5, -0.5));
    w.add_shape(ball);

    let half_sqrt2 = 2.0f64.sqrt() / 2.0;
    let r = Ray::new(
        Point::new(0.0, 0.0, -3.0),
        Vector::new(0.0, -half_sqrt2, half_sqrt2)
    );

    let xs = Intersections::from_vec(vec![
        Intersection::new(2.0f64.sqrt(), p),
    ]);

    let comps = IntersectionState::new(&xs[0], &r, Some(&xs), &w.arena);
    let c = w.shade_hit(&comps, RECURSION_DEPTH);

    assert_eq!(c, Color::rgb(0.93642, 0.68642, 0.68642));
}

#[test]
fn shade_hit_blends_reflection_and_refraction_by_reflectance() {
    let mut w: World = Default::default();

    let mut floor = Shape::plane();
    floor.set_transform(Matrix4x4::translation(0.0, -1.0, 0.0));
    floor.material.reflective = 0.5;
    floor.material.transparency = 0.5;
    floor.material.refractive_index = 1.5;
    let p = w.add_shape(floor);

    let mut ball = Shape::sphere();
    ball.material.color = Color::red();
    ball.material.ambient = 0.5;
    ball.set_transform(Matrix4x4::translation(0.0, -3.5, -0.5));
    w.add_shape(ball);

    let half_sqrt2 = 2.0f64.sqrt() / 2.0;
    let r = Ray::new(
        Point::new(0.0, 0.0, -3.0),
        Vector::new(0.0, -half_sqrt2, half_sqrt2)
    );

    let xs = Intersections::from_vec(vec![
        Intersection::new(2.0f64.sqrt(), p),
    ]);

    let comps = IntersectionState::new(&xs[0], &r, Some(&xs), &w.arena);
    let c = w.shade_hit(&comps, RECURSION_DEPTH);

    assert_eq!(c, Color::rgb(0.93391, 0.69643, 0.69243));
}
