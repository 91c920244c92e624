use crate::consts::EPSILON;
use crate::linear::{ Point, Vector };
use crate::matrix::Matrix4x4;
use crate::ray::Ray;
use crate::light::Material;
use crate::bounds::Bounds;
use crate::intersect::{ Intersection, Intersections };

/// A stable handle into a `ShapeArena`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ShapeId(usize);

/// The boolean operation a CSG node applies to its operands.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CsgOp {
    Union,
    Intersection,
    Difference,
}

/// Vertex and edge data shared by flat and smooth triangles.
///
/// Edges and the face normal are precomputed at construction; the
/// Möller-Trumbore test only touches these derived fields.
#[derive(Clone, Debug, PartialEq)]
pub struct TriangleData {
    pub p1: Point,
    pub p2: Point,
    pub p3: Point,

    pub e1: Vector,
    pub e2: Vector,
    pub normal: Vector,
}

impl TriangleData {
    pub fn new(p1: Point, p2: Point, p3: Point) -> TriangleData {
        let e1 = p2 - p1;
        let e2 = p3 - p1;
        let normal = e2.cross(&e1).normalize();

        TriangleData { p1, p2, p3, e1, e2, normal }
    }

    /// Möller-Trumbore ray-triangle test.
    ///
    /// Returns `(t, u, v)` on a hit; `None` when the ray is parallel to the
    /// triangle's plane or the barycentric coordinates fall outside it.
    fn intersect(&self, ray: &Ray) -> Option<(f64, f64, f64)> {
        let dir_cross_e2 = ray.direction.cross(&self.e2);
        let determinant = self.e1.dot(&dir_cross_e2);

        if determinant.abs() < EPSILON {
            return None;
        }

        let f = 1.0 / determinant;
        let p1_to_origin = ray.origin - self.p1;
        let u = f * p1_to_origin.dot(&dir_cross_e2);
        if !(0.0..=1.0).contains(&u) {
            return None;
        }

        let origin_cross_e1 = p1_to_origin.cross(&self.e1);
        let v = f * ray.direction.dot(&origin_cross_e1);
        if v < 0.0 || u + v > 1.0 {
            return None;
        }

        let t = f * self.e2.dot(&origin_cross_e1);
        Some((t, u, v))
    }

    fn bounds(&self) -> Bounds {
        let mut out = Bounds::empty();
        out.add_point(self.p1);
        out.add_point(self.p2);
        out.add_point(self.p3);

        out
    }
}

/// A triangle with per-vertex normals for interpolated shading.
#[derive(Clone, Debug, PartialEq)]
pub struct SmoothTriangleData {
    pub base: TriangleData,

    pub n1: Vector,
    pub n2: Vector,
    pub n3: Vector,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ShapeKind {
    /// A unit sphere centered at the object-space origin.
    Sphere,

    /// The XZ plane, infinite in X and Z.
    Plane,

    /// An axis-aligned cube spanning -1 to 1 on every axis.
    Cube,

    /// A unit-radius cylinder around the Y axis, truncated to
    /// `minimum < y < maximum`, with optional end caps.
    Cylinder { minimum: f64, maximum: f64, closed: bool },

    /// A double-napped unit cone around the Y axis, truncated like the
    /// cylinder. The radius at height y is |y|.
    Cone { minimum: f64, maximum: f64, closed: bool },

    Triangle(TriangleData),

    SmoothTriangle(SmoothTriangleData),

    /// A container of child shapes with a cached local-space bounding box.
    Group { children: Vec<ShapeId>, bounds: Bounds },

    /// A boolean combination of two child shapes.
    Csg { op: CsgOp, left: ShapeId, right: ShapeId, bounds: Bounds },
}

/// A shape in the arena: a kind, a material and a transform.
///
/// The transform's inverse and inverse-transpose are cached eagerly by
/// `set_transform` so the render loop never inverts a matrix. The parent id
/// is a plain lookup key for coordinate-space walks; the arena owns every
/// shape, and the parent graph is a tree.
#[derive(Clone, Debug, PartialEq)]
pub struct Shape {
    pub kind: ShapeKind,
    pub material: Material,

    transform: Matrix4x4,
    inverse: Matrix4x4,
    inverse_transpose: Matrix4x4,

    parent: Option<ShapeId>,
}

impl Default for Shape {
    fn default() -> Shape {
        Shape {
            kind: ShapeKind::Sphere,
            material: Default::default(),
            transform: Matrix4x4::identity(),
            inverse: Matrix4x4::identity(),
            inverse_transpose: Matrix4x4::identity(),
            parent: None,
        }
    }
}

impl Shape {
    pub fn sphere() -> Shape {
        Shape {
            kind: ShapeKind::Sphere,
            ..Default::default()
        }
    }

    /// A sphere of common glass: fully transparent, refractive index 1.5.
    pub fn glass_sphere() -> Shape {
        let mut shape = Shape::sphere();
        shape.material.transparency = 1.0;
        shape.material.refractive_index = crate::consts::GLASS_RI;

        shape
    }

    pub fn plane() -> Shape {
        Shape {
            kind: ShapeKind::Plane,
            ..Default::default()
        }
    }

    pub fn cube() -> Shape {
        Shape {
            kind: ShapeKind::Cube,
            ..Default::default()
        }
    }

    /// An infinitely long open cylinder.
    pub fn cylinder() -> Shape {
        Shape {
            kind: ShapeKind::Cylinder {
                minimum: -f64::INFINITY,
                maximum: f64::INFINITY,
                closed: false,
            },
            ..Default::default()
        }
    }

    pub fn bounded_cylinder(minimum: f64, maximum: f64) -> Shape {
        Shape {
            kind: ShapeKind::Cylinder { minimum, maximum, closed: false },
            ..Default::default()
        }
    }

    pub fn capped_cylinder(minimum: f64, maximum: f64) -> Shape {
        Shape {
            kind: ShapeKind::Cylinder { minimum, maximum, closed: true },
            ..Default::default()
        }
    }

    /// An infinite double-napped open cone.
    pub fn cone() -> Shape {
        Shape {
            kind: ShapeKind::Cone {
                minimum: -f64::INFINITY,
                maximum: f64::INFINITY,
                closed: false,
            },
            ..Default::default()
        }
    }

    pub fn bounded_cone(minimum: f64, maximum: f64) -> Shape {
        Shape {
            kind: ShapeKind::Cone { minimum, maximum, closed: false },
            ..Default::default()
        }
    }

    pub fn capped_cone(minimum: f64, maximum: f64) -> Shape {
        Shape {
            kind: ShapeKind::Cone { minimum, maximum, closed: true },
            ..Default::default()
        }
    }

    pub fn triangle(p1: Point, p2: Point, p3: Point) -> Shape {
        Shape {
            kind: ShapeKind::Triangle(TriangleData::new(p1, p2, p3)),
            ..Default::default()
        }
    }

    pub fn smooth_triangle(p1: Point, p2: Point, p3: Point,
        n1: Vector, n2: Vector, n3: Vector) -> Shape {
        Shape {
            kind: ShapeKind::SmoothTriangle(SmoothTriangleData {
                base: TriangleData::new(p1, p2, p3),
                n1, n2, n3,
            }),
            ..Default::default()
        }
    }

    /// An empty group; children are attached through the arena.
    pub fn group() -> Shape {
        Shape {
            kind: ShapeKind::Group {
                children: Vec::new(),
                bounds: Bounds::empty(),
            },
            ..Default::default()
        }
    }

    pub fn transform(&self) -> &Matrix4x4 {
        &self.transform
    }

    pub fn inverse_transform(&self) -> &Matrix4x4 {
        &self.inverse
    }

    pub fn parent(&self) -> Option<ShapeId> {
        self.parent
    }

    /// Sets the transform and refreshes the cached inverses.
    ///
    /// A singular transform is a caller bug. When the shape already sits
    /// inside a group, use `ShapeArena::set_transform` instead so ancestor
    /// bounding boxes stay current.
    pub fn set_transform(&mut self, transform: Matrix4x4) {
        self.transform = transform;
        self.inverse = transform.inverse()
            .expect("Shape transforms should be invertible.");
        self.inverse_transpose = self.inverse.transpose();
    }

    /// The shape's bounding box in its own object space.
    pub fn local_bounds(&self) -> Bounds {
        match &self.kind {
            ShapeKind::Sphere | ShapeKind::Cube => Bounds::new(
                Point::new(-1.0, -1.0, -1.0),
                Point::new(1.0, 1.0, 1.0),
            ),

            ShapeKind::Plane => Bounds::new(
                Point::new(-f64::INFINITY, 0.0, -f64::INFINITY),
                Point::new(f64::INFINITY, 0.0, f64::INFINITY),
            ),

            ShapeKind::Cylinder { minimum, maximum, .. } => Bounds::new(
                Point::new(-1.0, *minimum, -1.0),
                Point::new(1.0, *maximum, 1.0),
            ),

            ShapeKind::Cone { minimum, maximum, .. } => {
                // The cone's radius grows with |y|.
                let limit = minimum.abs().max(maximum.abs());
                Bounds::new(
                    Point::new(-limit, *minimum, -limit),
                    Point::new(limit, *maximum, limit),
                )
            },

            ShapeKind::Triangle(data) => data.bounds(),
            ShapeKind::SmoothTriangle(data) => data.base.bounds(),

            ShapeKind::Group { bounds, .. } => *bounds,
            ShapeKind::Csg { bounds, .. } => *bounds,
        }
    }

    fn intersect_sphere(&self, ray: &Ray, id: ShapeId) -> Intersections {
        let sphere_to_ray = ray.origin - Point::origin();

        let a = ray.direction.dot(&ray.direction);
        let b = 2.0 * ray.direction.dot(&sphere_to_ray);
        let c = sphere_to_ray.dot(&sphere_to_ray) - 1.0;

        let discriminant = b.powi(2) - 4.0 * a * c;
        if discriminant < 0.0 {
            return Intersections::new();
        }

        let t1 = (-b - discriminant.sqrt()) / (2.0 * a);
        let t2 = (-b + discriminant.sqrt()) / (2.0 * a);

        Intersections::from_vec(vec![
            Intersection::new(t1, id),
            Intersection::new(t2, id),
        ])
    }

    fn intersect_plane(&self, ray: &Ray, id: ShapeId) -> Intersections {
        // A ray without a Y component never meets the XZ plane.
        if ray.direction.y.abs() < EPSILON {
            return Intersections::new();
        }

        let t = -ray.origin.y / ray.direction.y;
        Intersections::from_vec(vec![Intersection::new(t, id)])
    }

    fn intersect_cube(&self, ray: &Ray, id: ShapeId) -> Intersections {
        let (xtmin, xtmax) =
            Bounds::check_axis(-1.0, 1.0, ray.origin.x, ray.direction.x);
        let (ytmin, ytmax) =
            Bounds::check_axis(-1.0, 1.0, ray.origin.y, ray.direction.y);
        let (ztmin, ztmax) =
            Bounds::check_axis(-1.0, 1.0, ray.origin.z, ray.direction.z);

        let tmin = xtmin.max(ytmin).max(ztmin);
        let tmax = xtmax.min(ytmax).min(ztmax);

        if tmin > tmax {
            return Intersections::new();
        }

        Intersections::from_vec(vec![
            Intersection::new(tmin, id),
            Intersection::new(tmax, id),
        ])
    }

    fn intersect_cylinder(&self, ray: &Ray, id: ShapeId) -> Intersections {
        let (minimum, maximum) = match self.kind {
            ShapeKind::Cylinder { minimum, maximum, .. } => (minimum, maximum),
            _ => unreachable!(),
        };

        let mut is = Intersections::new();

        let a = ray.direction.x.powi(2) + ray.direction.z.powi(2);

        // Parallel to the axis: only the caps can be hit.
        if a < EPSILON {
            self.intersect_cylinder_caps(ray, id, &mut is);
            return is;
        }

        let b = 2.0 * ray.origin.x * ray.direction.x
              + 2.0 * ray.origin.z * ray.direction.z;
        let c = ray.origin.x.powi(2) + ray.origin.z.powi(2) - 1.0;

        let disc = b.powi(2) - 4.0 * a * c;
        if disc < 0.0 {
            return Intersections::new();
        }

        let mut t0 = (-b - disc.sqrt()) / (2.0 * a);
        let mut t1 = (-b + disc.sqrt()) / (2.0 * a);
        if t0 > t1 {
            std::mem::swap(&mut t0, &mut t1);
        }

        let y0 = ray.origin.y + t0 * ray.direction.y;
        if minimum < y0 && y0 < maximum {
            is.add(Intersection::new(t0, id));
        }

        let y1 = ray.origin.y + t1 * ray.direction.y;
        if minimum < y1 && y1 < maximum {
            is.add(Intersection::new(t1, id));
        }

        self.intersect_cylinder_caps(ray, id, &mut is);
        is
    }

    fn intersect_cylinder_caps(&self, ray: &Ray, id: ShapeId,
        is: &mut Intersections) {
        let (minimum, maximum, closed) = match self.kind {
            ShapeKind::Cylinder { minimum, maximum, closed }
                => (minimum, maximum, closed),
            _ => unreachable!(),
        };

        if !closed || ray.direction.y.abs() < EPSILON {
            return;
        }

        // Lower cap, then upper cap.
        let tl = (minimum - ray.origin.y) / ray.direction.y;
        if Self::within_cylinder_cap(ray, tl) {
            is.add(Intersection::new(tl, id));
        }

        let tu = (maximum - ray.origin.y) / ray.direction.y;
        if Self::within_cylinder_cap(ray, tu) {
            is.add(Intersection::new(tu, id));
        }
    }

    /// Whether the point `t` along the ray lies within the cylinder's unit
    /// radius of the Y axis.
    fn within_cylinder_cap(ray: &Ray, t: f64) -> bool {
        let x = ray.origin.x + t * ray.direction.x;
        let z = ray.origin.z + t * ray.direction.z;

        x.powi(2) + z.powi(2) <= 1.0
    }

    fn intersect_cone(&self, ray: &Ray, id: ShapeId) -> Intersections {
        let (minimum, maximum) = match self.kind {
            ShapeKind::Cone { minimum, maximum, .. } => (minimum, maximum),
            _ => unreachable!(),
        };

        let a = ray.direction.x.powi(2)
              - ray.direction.y.powi(2)
              + ray.direction.z.powi(2);

        let b = 2.0 * ray.origin.x * ray.direction.x
              - 2.0 * ray.origin.y * ray.direction.y
              + 2.0 * ray.origin.z * ray.direction.z;

        let c = ray.origin.x.powi(2)
              - ray.origin.y.powi(2)
              + ray.origin.z.powi(2);

        let mut is = Intersections::new();

        if a.abs() < EPSILON {
            // Parallel to one nappe. The ray misses entirely when b is also
            // zero; otherwise it crosses the other nappe exactly once.
            if b.abs() >= EPSILON {
                let t = -c / (2.0 * b);
                is.add(Intersection::new(t, id));
            }

            self.intersect_cone_caps(ray, id, &mut is);
            return is;
        }

        let disc = b.powi(2) - 4.0 * a * c;
        if disc < 0.0 {
            return Intersections::new();
        }

        let mut t0 = (-b - disc.sqrt()) / (2.0 * a);
        let mut t1 = (-b + disc.sqrt()) / (2.0 * a);
        if t0 > t1 {
            std::mem::swap(&mut t0, &mut t1);
        }

        let y0 = ray.origin.y + t0 * ray.direction.y;
        if minimum < y0 && y0 < maximum {
            is.add(Intersection::new(t0, id));
        }

        let y1 = ray.origin.y + t1 * ray.direction.y;
        if minimum < y1 && y1 < maximum {
            is.add(Intersection::new(t1, id));
        }

        self.intersect_cone_caps(ray, id, &mut is);
        is
    }

    fn intersect_cone_caps(&self, ray: &Ray, id: ShapeId,
        is: &mut Intersections) {
        let (minimum, maximum, closed) = match self.kind {
            ShapeKind::Cone { minimum, maximum, closed }
                => (minimum, maximum, closed),
            _ => unreachable!(),
        };

        if !closed || ray.direction.y.abs() < EPSILON {
            return;
        }

        let tl = (minimum - ray.origin.y) / ray.direction.y;
        if Self::within_cone_cap(ray, tl, minimum) {
            is.add(Intersection::new(tl, id));
        }

        let tu = (maximum - ray.origin.y) / ray.direction.y;
        if Self::within_cone_cap(ray, tu, maximum) {
            is.add(Intersection::new(tu, id));
        }
    }

    /// The cone cap at height `y` has radius |y|, not 1.
    fn within_cone_cap(ray: &Ray, t: f64, y: f64) -> bool {
        let x = ray.origin.x + t * ray.direction.x;
        let z = ray.origin.z + t * ray.direction.z;

        x.powi(2) + z.powi(2) <= y.powi(2)
    }

    fn intersect_triangle(&self, ray: &Ray, id: ShapeId) -> Intersections {
        let data = match self.kind {
            ShapeKind::Triangle(ref data) => data,
            _ => unreachable!(),
        };

        match data.intersect(ray) {
            Some((t, _, _)) => {
                Intersections::from_vec(vec![Intersection::new(t, id)])
            },
            None => Intersections::new(),
        }
    }

    fn intersect_smooth_triangle(&self, ray: &Ray, id: ShapeId)
        -> Intersections {
        let data = match self.kind {
            ShapeKind::SmoothTriangle(ref data) => data,
            _ => unreachable!(),
        };

        match data.base.intersect(ray) {
            Some((t, u, v)) => {
                Intersections::from_vec(vec![Intersection::new_uv(t, id, u, v)])
            },
            None => Intersections::new(),
        }
    }

    fn normal_at_cube(p: &Point) -> Vector {
        let xa = p.x.abs();
        let ya = p.y.abs();
        let za = p.z.abs();

        let max_component = xa.max(ya).max(za);
        if max_component == xa {
            Vector::new(p.x, 0.0, 0.0)
        } else if max_component == ya {
            Vector::new(0.0, p.y, 0.0)
        } else {
            Vector::new(0.0, 0.0, p.z)
        }
    }

    fn normal_at_cylinder(&self, at: &Point) -> Vector {
        let (minimum, maximum) = match self.kind {
            ShapeKind::Cylinder { minimum, maximum, .. } => (minimum, maximum),
            _ => unreachable!(),
        };

        let dist = at.x.powi(2) + at.z.powi(2);

        if dist < 1.0 && at.y >= maximum - EPSILON {
            Vector::new(0.0, 1.0, 0.0)
        } else if dist < 1.0 && at.y <= minimum + EPSILON {
            Vector::new(0.0, -1.0, 0.0)
        } else {
            Vector::new(at.x, 0.0, at.z)
        }
    }

    fn normal_at_cone(&self, at: &Point) -> Vector {
        let (minimum, maximum) = match self.kind {
            ShapeKind::Cone { minimum, maximum, .. } => (minimum, maximum),
            _ => unreachable!(),
        };

        let dist = at.x.powi(2) + at.z.powi(2);

        if dist < at.y.powi(2) && at.y >= maximum - EPSILON {
            Vector::new(0.0, 1.0, 0.0)
        } else if dist < at.y.powi(2) && at.y <= minimum + EPSILON {
            Vector::new(0.0, -1.0, 0.0)
        } else {
            let mut y = dist.sqrt();
            if at.y > 0.0 {
                y = -y;
            }

            Vector::new(at.x, y, at.z)
        }
    }
}

/// Flat storage for every shape in a scene.
///
/// Composite shapes reference their children by id; the arena is the single
/// owner, so scene graphs are plain data and share freely across render
/// threads.
#[derive(Clone, Debug, Default)]
pub struct ShapeArena {
    shapes: Vec<Shape>,
}

/// The CSG truth table: whether an intersection is kept given which operand
/// was hit and which operands the ray is currently inside.
pub fn is_intersection_allowed(op: CsgOp, is_left_hit: bool,
    inside_left: bool, inside_right: bool) -> bool {
    match op {
        CsgOp::Union =>
            (is_left_hit && !inside_right) || (!is_left_hit && !inside_left),
        CsgOp::Intersection =>
            (is_left_hit && inside_right) || (!is_left_hit && inside_left),
        CsgOp::Difference =>
            (is_left_hit && !inside_right) || (!is_left_hit && inside_left),
    }
}

impl ShapeArena {
    pub fn new() -> ShapeArena {
        ShapeArena { shapes: Vec::new() }
    }

    /// Adds a shape to the arena, returning its id.
    pub fn insert(&mut self, shape: Shape) -> ShapeId {
        let id = ShapeId(self.shapes.len());
        self.shapes.push(shape);

        id
    }

    /// Builds a CSG node over two previously inserted shapes.
    ///
    /// Both operands must be unparented; they become children of the new
    /// node.
    pub fn insert_csg(&mut self, op: CsgOp, left: ShapeId, right: ShapeId)
        -> ShapeId {
        assert!(left != right, "CSG operands must be distinct shapes");

        let id = ShapeId(self.shapes.len());
        for child in [left, right] {
            let shape = self.shape_mut(child);
            assert!(shape.parent.is_none(),
                "CSG operand is already parented to another shape");
            shape.parent = Some(id);
        }

        let bounds = self.composite_bounds(&[left, right]);
        self.shapes.push(Shape {
            kind: ShapeKind::Csg { op, left, right, bounds },
            ..Default::default()
        });

        id
    }

    pub fn shape(&self, id: ShapeId) -> &Shape {
        &self.shapes[id.0]
    }

    pub fn shape_mut(&mut self, id: ShapeId) -> &mut Shape {
        &mut self.shapes[id.0]
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    /// Attaches `child` to a group, keeping bounding boxes of the group and
    /// every ancestor current.
    pub fn add_child(&mut self, group: ShapeId, child: ShapeId) {
        assert!(group != child, "a group cannot contain itself");
        assert!(self.shape(child).parent.is_none(),
            "shape is already parented; shapes have at most one parent");

        match self.shape_mut(group).kind {
            ShapeKind::Group { ref mut children, .. } => children.push(child),
            _ => panic!("add_child called on a non-group shape"),
        }

        self.shape_mut(child).parent = Some(group);
        self.refresh_bounds_upward(group);
    }

    /// The child ids of a group, empty for any other kind.
    pub fn children(&self, id: ShapeId) -> &[ShapeId] {
        match self.shape(id).kind {
            ShapeKind::Group { ref children, .. } => children,
            _ => &[],
        }
    }

    /// Sets a shape's material; on a group, the material cascades
    /// recursively to every descendant.
    pub fn set_material(&mut self, id: ShapeId, material: Material) {
        self.shape_mut(id).material = material;

        let children: Vec<ShapeId> = self.children(id).to_vec();
        for child in children {
            self.set_material(child, material);
        }
    }

    /// Replaces a shape's transform and refreshes every ancestor's bounds.
    pub fn set_transform(&mut self, id: ShapeId, transform: Matrix4x4) {
        self.shape_mut(id).set_transform(transform);

        if let Some(parent) = self.shape(id).parent {
            self.refresh_bounds_upward(parent);
        }
    }

    /// Union of the children's bounds, each carried into the parent's local
    /// space by the child's own transform.
    fn composite_bounds(&self, children: &[ShapeId]) -> Bounds {
        let mut out = Bounds::empty();
        for &child in children {
            let shape = self.shape(child);
            out.merge(&shape.local_bounds().transform(shape.transform()));
        }

        out
    }

    /// Recomputes the stored bounds of `from` and each composite ancestor.
    fn refresh_bounds_upward(&mut self, from: ShapeId) {
        let mut at = Some(from);
        while let Some(id) = at {
            let child_ids: Option<Vec<ShapeId>> = match self.shape(id).kind {
                ShapeKind::Group { ref children, .. } => Some(children.clone()),
                ShapeKind::Csg { left, right, .. } => Some(vec![left, right]),
                _ => None,
            };

            if let Some(child_ids) = child_ids {
                let bounds = self.composite_bounds(&child_ids);
                match self.shape_mut(id).kind {
                    ShapeKind::Group { bounds: ref mut b, .. } => *b = bounds,
                    ShapeKind::Csg { bounds: ref mut b, .. } => *b = bounds,
                    _ => unreachable!(),
                }
            }

            at = self.shape(id).parent;
        }
    }

    /// Intersects a ray with a shape.
    ///
    /// An identity transform delegates straight to `local_intersect`;
    /// otherwise the ray is brought into object space with the cached
    /// inverse first.
    pub fn intersect(&self, id: ShapeId, ray: &Ray) -> Intersections {
        let shape = self.shape(id);
        if shape.transform.is_identity() {
            self.local_intersect(id, ray)
        } else {
            let local_ray = ray.transform(shape.inverse_transform());
            self.local_intersect(id, &local_ray)
        }
    }

    /// Intersects a ray already in the shape's object space.
    pub fn local_intersect(&self, id: ShapeId, ray: &Ray) -> Intersections {
        let shape = self.shape(id);
        match shape.kind {
            ShapeKind::Sphere => shape.intersect_sphere(ray, id),
            ShapeKind::Plane => shape.intersect_plane(ray, id),
            ShapeKind::Cube => shape.intersect_cube(ray, id),
            ShapeKind::Cylinder { .. } => shape.intersect_cylinder(ray, id),
            ShapeKind::Cone { .. } => shape.intersect_cone(ray, id),
            ShapeKind::Triangle(_) => shape.intersect_triangle(ray, id),
            ShapeKind::SmoothTriangle(_)
                => shape.intersect_smooth_triangle(ray, id),
            ShapeKind::Group { .. } => self.intersect_group(id, ray),
            ShapeKind::Csg { .. } => self.intersect_csg(id, ray),
        }
    }

    fn intersect_group(&self, id: ShapeId, ray: &Ray) -> Intersections {
        let (children, bounds) = match self.shape(id).kind {
            ShapeKind::Group { ref children, bounds } => (children, bounds),
            _ => unreachable!(),
        };

        if children.is_empty() {
            return Intersections::new();
        }

        // Reject against the cached box before touching any child.
        if !bounds.intersects(ray) {
            return Intersections::new();
        }

        let lists = children.iter()
            .map(|&child| self.intersect(child, ray))
            .collect();

        Intersections::aggregate(lists)
    }

    fn intersect_csg(&self, id: ShapeId, ray: &Ray) -> Intersections {
        let (left, right) = match self.shape(id).kind {
            ShapeKind::Csg { left, right, .. } => (left, right),
            _ => unreachable!(),
        };

        // Both children share the CSG's local space.
        let mut all = self.intersect(left, ray);
        all.extend(self.intersect(right, ray));

        self.filter_intersections(id, &all)
    }

    /// Filters a merged, sorted intersection list down to the surfaces the
    /// CSG operation actually exposes.
    pub fn filter_intersections(&self, csg: ShapeId, xs: &Intersections)
        -> Intersections {
        let (op, left) = match self.shape(csg).kind {
            ShapeKind::Csg { op, left, .. } => (op, left),
            _ => panic!("filter_intersections called on a non-CSG shape"),
        };

        let mut inside_left = false;
        let mut inside_right = false;

        let mut out = Intersections::new();
        for i in xs.iter() {
            let is_left_hit = self.belongs_to(left, i.shape);

            if is_intersection_allowed(op, is_left_hit,
                inside_left, inside_right) {
                out.add(*i);
            }

            if is_left_hit {
                inside_left = !inside_left;
            } else {
                inside_right = !inside_right;
            }
        }

        out
    }

    /// Whether `hit` belongs to the `operand` subtree, looking exactly one
    /// level into composite operands.
    ///
    /// Deeper CSG trees can misclassify hits on grandchildren; see the
    /// membership tests below before changing this.
    fn belongs_to(&self, operand: ShapeId, hit: ShapeId) -> bool {
        if operand == hit {
            return true;
        }

        match self.shape(operand).kind {
            ShapeKind::Group { ref children, .. } => children.contains(&hit),
            ShapeKind::Csg { left, right, .. } => left == hit || right == hit,
            _ => false,
        }
    }

    /// The world-space surface normal at a point on a shape.
    ///
    /// The `hit` parameter carries the barycentric coordinates smooth
    /// triangles interpolate with.
    pub fn normal_at(&self, id: ShapeId, world_point: Point,
        hit: Option<&Intersection>) -> Vector {
        let local_point = self.world_to_object(id, world_point);
        let local_normal = self.local_normal_at(id, local_point, hit);

        self.normal_to_world(id, local_normal)
    }

    /// Converts a world-space point into a shape's object space by applying
    /// each ancestor's inverse, outermost first.
    pub fn world_to_object(&self, id: ShapeId, point: Point) -> Point {
        let shape = self.shape(id);
        let point = match shape.parent {
            Some(parent) => self.world_to_object(parent, point),
            None => point,
        };

        *shape.inverse_transform() * point
    }

    /// Converts an object-space normal back to world space, applying each
    /// inverse-transpose innermost-first and renormalizing along the way.
    pub fn normal_to_world(&self, id: ShapeId, normal: Vector) -> Vector {
        let shape = self.shape(id);
        let normal = (shape.inverse_transpose * normal).normalize();

        match shape.parent {
            Some(parent) => self.normal_to_world(parent, normal),
            None => normal,
        }
    }

    /// The object-space normal for a point already in object space.
    ///
    /// Composite shapes have no surface of their own; asking them for a
    /// normal is a caller bug, since intersections always record the leaf
    /// shape that was hit.
    pub fn local_normal_at(&self, id: ShapeId, at: Point,
        hit: Option<&Intersection>) -> Vector {
        let shape = self.shape(id);
        match shape.kind {
            ShapeKind::Sphere => at - Point::origin(),
            ShapeKind::Plane => Vector::new(0.0, 1.0, 0.0),
            ShapeKind::Cube => Shape::normal_at_cube(&at),
            ShapeKind::Cylinder { .. } => shape.normal_at_cylinder(&at),
            ShapeKind::Cone { .. } => shape.normal_at_cone(&at),
            ShapeKind::Triangle(ref data) => data.normal,

            ShapeKind::SmoothTriangle(ref data) => {
                let (u, v) = hit.and_then(|h| h.uv).expect(
                    "Smooth triangle normals need a hit with barycentric \
                     coordinates."
                );

                data.n2 * u + data.n3 * v + data.n1 * (1.0 - u - v)
            },

            ShapeKind::Group { .. } => panic!(
                "Local normal calculations should never occur on groups."
            ),
            ShapeKind::Csg { .. } => panic!(
                "Local normal calculations should never occur on CSG ops."
            ),
        }
    }
}

/* Tests */

#[test]
fn ray_pierces_sphere() {
    let mut arena = ShapeArena::new();
    let s = arena.insert(Shape::sphere());

    let r = Ray::new(Point::new(0.0, 0.0, -5.0), Vector::new(0.0, 0.0, 1.0));
    let is = arena.intersect(s, &r);

    assert_eq!(is.len(), 2);
    assert_eq!(is[0].t, 4.0);
    assert_eq!(is[1].t, 6.0);
}

#[test]
fn ray_is_tangent_to_sphere() {
    let mut arena = ShapeArena::new();
    let s = arena.insert(Shape::sphere());

    let r = Ray::new(Point::new(0.0, 1.0, -5.0), Vector::new(0.0, 0.0, 1.0));
    let is = arena.intersect(s, &r);

    assert_eq!(is.len(), 2);
    assert_eq!(is[0].t, 5.0);
    assert_eq!(is[1].t, 5.0);
}

#[test]
fn ray_misses_sphere() {
    let mut arena = ShapeArena::new();
    let s = arena.insert(Shape::sphere());

    let r = Ray::new(Point::new(0.0, 2.0, -5.0), Vector::new(0.0, 0.0, 1.0));
    assert!(arena.intersect(s, &r).is_empty());
}

#[test]
fn ray_starts_inside_sphere() {
    let mut arena = ShapeArena::new();
    let s = arena.insert(Shape::sphere());

    let r = Ray::new(Point::origin(), Vector::new(0.0, 0.0, 1.0));
    let is = arena.intersect(s, &r);

    assert_eq!(is.len(), 2);
    assert_eq!(is[0].t, -1.0);
    assert_eq!(is[1].t, 1.0);
}

#[test]
fn sphere_is_behind_ray() {
    let mut arena = ShapeArena::new();
    let s = arena.insert(Shape::sphere());

    let r = Ray::new(Point::new(0.0, 0.0, 5.0), Vector::new(0.0, 0.0, 1.0));
    let is = arena.intersect(s, &r);

    assert_eq!(is.len(), 2);
    assert_eq!(is[0].t, -6.0);
    assert_eq!(is[1].t, -4.0);
}

#[test]
fn ray_hits_scaled_sphere() {
    let mut arena = ShapeArena::new();
    let mut sphere = Shape::sphere();
    sphere.set_transform(Matrix4x4::scaling(2.0, 2.0, 2.0));
    let s = arena.insert(sphere);

    let r = Ray::new(Point::new(0.0, 0.0, -5.0), Vector::new(0.0, 0.0, 1.0));
    let is = arena.intersect(s, &r);

    assert_eq!(is.len(), 2);
    assert_eq!(is[0].t, 3.0);
    assert_eq!(is[1].t, 7.0);
}

#[test]
fn ray_misses_translated_sphere() {
    let mut arena = ShapeArena::new();
    let mut sphere = Shape::sphere();
    sphere.set_transform(Matrix4x4::translation(5.0, 0.0, 0.0));
    let s = arena.insert(sphere);

    let r = Ray::new(Point::new(0.0, 0.0, -5.0), Vector::new(0.0, 0.0, 1.0));
    assert!(arena.intersect(s, &r).is_empty());
}

#[test]
fn normals_on_a_sphere() {
    let mut arena = ShapeArena::new();
    let s = arena.insert(Shape::sphere());

    assert_eq!(arena.normal_at(s, Point::new(1.0, 0.0, 0.0), None),
        Vector::new(1.0, 0.0, 0.0));
    assert_eq!(arena.normal_at(s, Point::new(0.0, 1.0, 0.0), None),
        Vector::new(0.0, 1.0, 0.0));
    assert_eq!(arena.normal_at(s, Point::new(0.0, 0.0, 1.0), None),
        Vector::new(0.0, 0.0, 1.0));

    let third = 3.0f64.sqrt() / 3.0;
    assert_eq!(arena.normal_at(s, Point::new(third, third, third), None),
        Vector::new(third, third, third));
}

#[test]
fn normal_on_translated_sphere() {
    let mut arena = ShapeArena::new();
    let mut sphere = Shape::sphere();
    sphere.set_transform(Matrix4x4::translation(0.0, 1.0, 0.0));
    let s = arena.insert(sphere);

    let n = arena.normal_at(s, Point::new(0.0, 1.70711, -0.70711), None);
    assert_eq!(n, Vector::new(0.0, 0.70711, -0.70711));
}

#[test]
fn normal_on_transformed_sphere() {
    let mut arena = ShapeArena::new();
    let mut sphere = Shape::sphere();
    sphere.set_transform(Matrix4x4::scaling(1.0, 0.5, 1.0)
        * Matrix4x4::rotation_z(std::f64::consts::PI / 5.0));
    let s = arena.insert(sphere);

    let half_sqrt2 = 2.0f64.sqrt() / 2.0;
    let n = arena.normal_at(s, Point::new(0.0, half_sqrt2, -half_sqrt2), None);
    assert_eq!(n, Vector::new(0.0, 0.97014, -0.24254));
}

#[test]
fn plane_normal_is_constant() {
    let mut arena = ShapeArena::new();
    let p = arena.insert(Shape::plane());

    let up = Vector::new(0.0, 1.0, 0.0);
    assert_eq!(arena.local_normal_at(p, Point::origin(), None), up);
    assert_eq!(arena.local_normal_at(p, Point::new(10.0, 0.0, -10.0), None),
        up);
    assert_eq!(arena.local_normal_at(p, Point::new(-5.0, 0.0, 150.0), None),
        up);
}

#[test]
fn ray_parallel_to_plane_misses() {
    let mut arena = ShapeArena::new();
    let p = arena.insert(Shape::plane());

    let parallel = Ray::new(
        Point::new(0.0, 10.0, 0.0), Vector::new(0.0, 0.0, 1.0)
    );
    let coplanar = Ray::new(Point::origin(), Vector::new(0.0, 0.0, 1.0));

    assert!(arena.local_intersect(p, &parallel).is_empty());
    assert!(arena.local_intersect(p, &coplanar).is_empty());
}

#[test]
fn ray_crosses_plane_from_above_and_below() {
    let mut arena = ShapeArena::new();
    let p = arena.insert(Shape::plane());

    let above = Ray::new(
        Point::new(0.0, 1.0, 0.0), Vector::new(0.0, -1.0, 0.0)
    );
    let below = Ray::new(
        Point::new(0.0, -1.0, 0.0), Vector::new(0.0, 1.0, 0.0)
    );

    let is = arena.local_intersect(p, &above);
    assert_eq!(is.len(), 1);
    assert_eq!(is[0].t, 1.0);

    let is = arena.local_intersect(p, &below);
    assert_eq!(is.len(), 1);
    assert_eq!(is[0].t, 1.0);
}

#[test]
fn rays_strike_a_cube_from_every_side() {
    let mut arena = ShapeArena::new();
    let c = arena.insert(Shape::cube());

    let cases = [
        (Point::new(5.0, 0.5, 0.0), Vector::new(-1.0, 0.0, 0.0), 4.0, 6.0),
        (Point::new(-5.0, 0.5, 0.0), Vector::new(1.0, 0.0, 0.0), 4.0, 6.0),
        (Point::new(0.5, 5.0, 0.0), Vector::new(0.0, -1.0, 0.0), 4.0, 6.0),
        (Point::new(0.5, -5.0, 0.0), Vector::new(0.0, 1.0, 0.0), 4.0, 6.0),
        (Point::new(0.5, 0.0, 5.0), Vector::new(0.0, 0.0, -1.0), 4.0, 6.0),
        (Point::new(0.5, 0.0, -5.0), Vector::new(0.0, 0.0, 1.0), 4.0, 6.0),
        (Point::new(0.0, 0.5, 0.0), Vector::new(0.0, 0.0, 1.0), -1.0, 1.0),
    ];

    for (origin, direction, t1, t2) in cases {
        let is = arena.local_intersect(c, &Ray::new(origin, direction));
        assert_eq!(is.len(), 2);
        assert_eq!(is[0].t, t1);
        assert_eq!(is[1].t, t2);
    }
}

#[test]
fn rays_miss_a_cube() {
    let mut arena = ShapeArena::new();
    let c = arena.insert(Shape::cube());

    let cases = [
        (Point::new(-2.0, 0.0, 0.0), Vector::new(0.2673, 0.5345, 0.8018)),
        (Point::new(0.0, -2.0, 0.0), Vector::new(0.8018, 0.2673, 0.5345)),
        (Point::new(0.0, 0.0, -2.0), Vector::new(0.5345, 0.8018, 0.2673)),
        (Point::new(2.0, 0.0, 2.0), Vector::new(0.0, 0.0, -1.0)),
        (Point::new(0.0, 2.0, 2.0), Vector::new(0.0, -1.0, 0.0)),
        (Point::new(2.0, 2.0, 0.0), Vector::new(-1.0, 0.0, 0.0)),
    ];

    for (origin, direction) in cases {
        assert!(arena.local_intersect(c, &Ray::new(origin, direction))
            .is_empty());
    }
}

#[test]
fn normals_on_a_cube() {
    let mut arena = ShapeArena::new();
    let c = arena.insert(Shape::cube());

    let cases = [
        (Point::new(1.0, 0.5, -0.8), Vector::new(1.0, 0.0, 0.0)),
        (Point::new(-1.0, -0.2, 0.9), Vector::new(-1.0, 0.0, 0.0)),
        (Point::new(-0.4, 1.0, -0.1), Vector::new(0.0, 1.0, 0.0)),
        (Point::new(0.3, -1.0, -0.7), Vector::new(0.0, -1.0, 0.0)),
        (Point::new(-0.6, 0.3, 1.0), Vector::new(0.0, 0.0, 1.0)),
        (Point::new(0.4, 0.4, -1.0), Vector::new(0.0, 0.0, -1.0)),
        (Point::new(1.0, 1.0, 1.0), Vector::new(1.0, 0.0, 0.0)),
        (Point::new(-1.0, -1.0, -1.0), Vector::new(-1.0, 0.0, 0.0)),
    ];

    for (at, expected) in cases {
        assert_eq!(arena.local_normal_at(c, at, None), expected);
    }
}

#[test]
fn rays_miss_a_cylinder() {
    let mut arena = ShapeArena::new();
    let c = arena.insert(Shape::cylinder());

    let cases = [
        (Point::new(1.0, 0.0, 0.0), Vector::new(0.0, 1.0, 0.0)),
        (Point::origin(), Vector::new(0.0, 1.0, 0.0)),
        (Point::new(0.0, 0.0, -5.0), Vector::new(1.0, 1.0, 1.0).normalize()),
    ];

    for (origin, direction) in cases {
        assert!(arena.local_intersect(c, &Ray::new(origin, direction))
            .is_empty());
    }
}

#[test]
fn rays_strike_a_cylinder() {
    use crate::feq;

    let mut arena = ShapeArena::new();
    let c = arena.insert(Shape::cylinder());

    let cases = [
        (Point::new(1.0, 0.0, -5.0), Vector::new(0.0, 0.0, 1.0), 5.0, 5.0),
        (Point::new(0.0, 0.0, -5.0), Vector::new(0.0, 0.0, 1.0), 4.0, 6.0),
        (Point::new(0.5, 0.0, -5.0),
            Vector::new(0.1, 1.0, 1.0).normalize(), 6.80798, 7.08872),
    ];

    for (origin, direction, t0, t1) in cases {
        let is = arena.local_intersect(c, &Ray::new(origin, direction));
        assert_eq!(is.len(), 2);
        assert!(feq(is[0].t, t0));
        assert!(feq(is[1].t, t1));
    }
}

#[test]
fn normals_on_a_cylinder() {
    let mut arena = ShapeArena::new();
    let c = arena.insert(Shape::cylinder());

    let cases = [
        (Point::new(1.0, 0.0, 0.0), Vector::new(1.0, 0.0, 0.0)),
        (Point::new(0.0, 5.0, -1.0), Vector::new(0.0, 0.0, -1.0)),
        (Point::new(0.0, -2.0, 1.0), Vector::new(0.0, 0.0, 1.0)),
        (Point::new(-1.0, 1.0, 0.0), Vector::new(-1.0, 0.0, 0.0)),
    ];

    for (at, expected) in cases {
        assert_eq!(arena.local_normal_at(c, at, None), expected);
    }
}

#[test]
fn truncated_cylinder_clips_intersections() {
    let mut arena = ShapeArena::new();
    let c = arena.insert(Shape::bounded_cylinder(1.0, 2.0));

    let cases = [
        (Point::new(0.0, 1.5, 0.0), Vector::new(0.1, 1.0, 0.0), 0),
        (Point::new(0.0, 3.0, -5.0), Vector::new(0.0, 0.0, 1.0), 0),
        (Point::new(0.0, 0.0, -5.0), Vector::new(0.0, 0.0, 1.0), 0),
        (Point::new(0.0, 2.0, -5.0), Vector::new(0.0, 0.0, 1.0), 0),
        (Point::new(0.0, 1.0, -5.0), Vector::new(0.0, 0.0, 1.0), 0),
        (Point::new(0.0, 1.5, -2.0), Vector::new(0.0, 0.0, 1.0), 2),
    ];

    for (origin, direction, count) in cases {
        let r = Ray::new(origin, direction.normalize());
        assert_eq!(arena.local_intersect(c, &r).len(), count);
    }
}

#[test]
fn capped_cylinder_intersects_its_caps() {
    let mut arena = ShapeArena::new();
    let c = arena.insert(Shape::capped_cylinder(1.0, 2.0));

    let cases = [
        (Point::new(0.0, 3.0, 0.0), Vector::new(0.0, -1.0, 0.0), 2),
        (Point::new(0.0, 3.0, -2.0), Vector::new(0.0, -1.0, 2.0), 2),
        (Point::new(0.0, 4.0, -2.0), Vector::new(0.0, -1.0, 1.0), 2),
        (Point::new(0.0, 0.0, -2.0), Vector::new(0.0, 1.0, 2.0), 2),
        (Point::new(0.0, -1.0, -2.0), Vector::new(0.0, 1.0, 1.0), 2),
    ];

    for (origin, direction, count) in cases {
        let r = Ray::new(origin, direction.normalize());
        assert_eq!(arena.local_intersect(c, &r).len(), count);
    }
}

#[test]
fn normals_on_cylinder_caps() {
    let mut arena = ShapeArena::new();
    let c = arena.insert(Shape::capped_cylinder(1.0, 2.0));

    let cases = [
        (Point::new(0.0, 1.0, 0.0), Vector::new(0.0, -1.0, 0.0)),
        (Point::new(0.5, 1.0, 0.0), Vector::new(0.0, -1.0, 0.0)),
        (Point::new(0.0, 1.0, 0.5), Vector::new(0.0, -1.0, 0.0)),
        (Point::new(0.0, 2.0, 0.0), Vector::new(0.0, 1.0, 0.0)),
        (Point::new(0.5, 2.0, 0.0), Vector::new(0.0, 1.0, 0.0)),
        (Point::new(0.0, 2.0, 0.5), Vector::new(0.0, 1.0, 0.0)),
    ];

    for (at, expected) in cases {
        assert_eq!(arena.local_normal_at(c, at, None), expected);
    }
}

#[test]
fn rays_strike_a_cone() {
    use crate::feq;

    let mut arena = ShapeArena::new();
    let c = arena.insert(Shape::cone());

    let cases = [
        (Point::new(0.0, 0.0, -5.0), Vector::new(0.0, 0.0, 1.0), 5.0, 5.0),
        (Point::new(0.0, 0.0, -5.0),
            Vector::new(1.0, 1.0, 1.0).normalize(), 8.66025, 8.66025),
        (Point::new(1.0, 1.0, -5.0),
            Vector::new(-0.5, -1.0, 1.0).normalize(), 4.55006, 49.44994),
    ];

    for (origin, direction, t0, t1) in cases {
        let is = arena.local_intersect(c, &Ray::new(origin, direction));
        assert_eq!(is.len(), 2);
        assert!(feq(is[0].t, t0));
        assert!(feq(is[1].t, t1));
    }
}

#[test]
fn ray_parallel_to_one_cone_nappe_hits_the_other() {
    use crate::feq;

    let mut arena = ShapeArena::new();
    let c = arena.insert(Shape::cone());

    let r = Ray::new(
        Point::new(0.0, 0.0, -1.0),
        Vector::new(0.0, 1.0, 1.0).normalize()
    );

    let is = arena.local_intersect(c, &r);
    assert_eq!(is.len(), 1);
    assert!(feq(is[0].t, 0.35355));
}

#[test]
fn capped_cone_intersects_its_caps() {
    let mut arena = ShapeArena::new();
    let c = arena.insert(Shape::capped_cone(-0.5, 0.5));

    let cases = [
        (Point::new(0.0, 0.0, -5.0), Vector::new(0.0, 1.0, 0.0), 0),
        (Point::new(0.0, 0.0, -0.25), Vector::new(0.0, 1.0, 1.0), 2),
        (Point::new(0.0, 0.0, -0.25), Vector::new(0.0, 1.0, 0.0), 4),
    ];

    for (origin, direction, count) in cases {
        let r = Ray::new(origin, direction.normalize());
        assert_eq!(arena.local_intersect(c, &r).len(), count);
    }
}

#[test]
fn normals_on_a_cone() {
    let mut arena = ShapeArena::new();
    let c = arena.insert(Shape::cone());

    let cases = [
        (Point::new(1.0, 1.0, 1.0), Vector::new(1.0, -(2.0f64.sqrt()), 1.0)),
        (Point::new(-1.0, -1.0, 0.0), Vector::new(-1.0, 1.0, 0.0)),
    ];

    for (at, expected) in cases {
        assert_eq!(arena.local_normal_at(c, at, None), expected);
    }
}

#[test]
fn constructing_a_triangle_precomputes_edges_and_normal() {
    let p1 = Point::new(0.0, 1.0, 0.0);
    let p2 = Point::new(-1.0, 0.0, 0.0);
    let p3 = Point::new(1.0, 0.0, 0.0);
    let t = Shape::triangle(p1, p2, p3);

    if let ShapeKind::Triangle(ref data) = t.kind {
        assert_eq!(data.e1, Vector::new(-1.0, -1.0, 0.0));
        assert_eq!(data.e2, Vector::new(1.0, -1.0, 0.0));
        assert_eq!(data.normal, Vector::new(0.0, 0.0, -1.0));
    } else {
        unreachable!();
    }
}

#[test]
fn rays_miss_a_triangle() {
    let mut arena = ShapeArena::new();
    let t = arena.insert(Shape::triangle(
        Point::new(0.0, 1.0, 0.0),
        Point::new(-1.0, 0.0, 0.0),
        Point::new(1.0, 0.0, 0.0)
    ));

    let cases = [
        // Parallel to the triangle's plane.
        (Point::new(0.0, -1.0, -2.0), Vector::new(0.0, 1.0, 0.0)),
        // Past the p1-p3 edge.
        (Point::new(1.0, 1.0, -2.0), Vector::new(0.0, 0.0, 1.0)),
        // Past the p1-p2 edge.
        (Point::new(-1.0, 1.0, -2.0), Vector::new(0.0, 0.0, 1.0)),
        // Past the p2-p3 edge.
        (Point::new(0.0, -1.0, -2.0), Vector::new(0.0, 0.0, 1.0)),
    ];

    for (origin, direction) in cases {
        assert!(arena.local_intersect(t, &Ray::new(origin, direction))
            .is_empty());
    }
}

#[test]
fn ray_strikes_a_triangle() {
    use crate::feq;

    let mut arena = ShapeArena::new();
    let t = arena.insert(Shape::triangle(
        Point::new(0.0, 1.0, 0.0),
        Point::new(-1.0, 0.0, 0.0),
        Point::new(1.0, 0.0, 0.0)
    ));

    let r = Ray::new(Point::new(0.0, 0.5, -2.0), Vector::new(0.0, 0.0, 1.0));
    let is = arena.local_intersect(t, &r);

    assert_eq!(is.len(), 1);
    assert!(feq(is[0].t, 2.0));
}

#[test]
fn smooth_triangle_intersection_records_uv() {
    use crate::feq;

    let mut arena = ShapeArena::new();
    let t = arena.insert(Shape::smooth_triangle(
        Point::new(0.0, 1.0, 0.0),
        Point::new(-1.0, 0.0, 0.0),
        Point::new(1.0, 0.0, 0.0),
        Vector::new(0.0, 1.0, 0.0),
        Vector::new(-1.0, 0.0, 0.0),
        Vector::new(1.0, 0.0, 0.0)
    ));

    let r = Ray::new(Point::new(-0.2, 0.3, -2.0), Vector::new(0.0, 0.0, 1.0));
    let is = arena.local_intersect(t, &r);

    let (u, v) = is[0].uv.unwrap();
    assert!(feq(u, 0.45));
    assert!(feq(v, 0.25));
}

#[test]
fn smooth_triangle_interpolates_its_normal() {
    let mut arena = ShapeArena::new();
    let t = arena.insert(Shape::smooth_triangle(
        Point::new(0.0, 1.0, 0.0),
        Point::new(-1.0, 0.0, 0.0),
        Point::new(1.0, 0.0, 0.0),
        Vector::new(0.0, 1.0, 0.0),
        Vector::new(-1.0, 0.0, 0.0),
        Vector::new(1.0, 0.0, 0.0)
    ));

    let i = Intersection::new_uv(1.0, t, 0.45, 0.25);
    let n = arena.normal_at(t, Point::origin(), Some(&i));

    assert_eq!(n, Vector::new(-0.5547, 0.83205, 0.0));
}

#[test]
#[should_panic]
fn smooth_triangle_normal_without_a_hit_is_a_bug() {
    let mut arena = ShapeArena::new();
    let t = arena.insert(Shape::smooth_triangle(
        Point::new(0.0, 1.0, 0.0),
        Point::new(-1.0, 0.0, 0.0),
        Point::new(1.0, 0.0, 0.0),
        Vector::new(0.0, 1.0, 0.0),
        Vector::new(-1.0, 0.0, 0.0),
        Vector::new(1.0, 0.0, 0.0)
    ));

    arena.local_normal_at(t, Point::origin(), None);
}

#[test]
fn adding_a_child_sets_its_parent() {
    let mut arena = ShapeArena::new();
    let g = arena.insert(Shape::group());
    let s = arena.insert(Shape::sphere());

    arena.add_child(g, s);

    assert_eq!(arena.children(g), &[s]);
    assert_eq!(arena.shape(s).parent(), Some(g));
}

#[test]
#[should_panic]
fn a_shape_cannot_have_two_parents() {
    let mut arena = ShapeArena::new();
    let g1 = arena.insert(Shape::group());
    let g2 = arena.insert(Shape::group());
    let s = arena.insert(Shape::sphere());

    arena.add_child(g1, s);
    arena.add_child(g2, s);
}

#[test]
fn intersecting_an_empty_group() {
    let mut arena = ShapeArena::new();
    let g = arena.insert(Shape::group());

    let r = Ray::new(Point::origin(), Vector::new(0.0, 0.0, 1.0));
    assert!(arena.local_intersect(g, &r).is_empty());
}

#[test]
fn intersecting_a_group_gathers_child_hits_in_order() {
    let mut arena = ShapeArena::new();
    let g = arena.insert(Shape::group());

    let s1 = arena.insert(Shape::sphere());

    let mut second = Shape::sphere();
    second.set_transform(Matrix4x4::translation(0.0, 0.0, -3.0));
    let s2 = arena.insert(second);

    let mut third = Shape::sphere();
    third.set_transform(Matrix4x4::translation(5.0, 0.0, 0.0));
    let s3 = arena.insert(third);

    arena.add_child(g, s1);
    arena.add_child(g, s2);
    arena.add_child(g, s3);

    let r = Ray::new(Point::new(0.0, 0.0, -5.0), Vector::new(0.0, 0.0, 1.0));
    let is = arena.local_intersect(g, &r);

    assert_eq!(is.len(), 4);
    assert_eq!(is[0].shape, s2);
    assert_eq!(is[1].shape, s2);
    assert_eq!(is[2].shape, s1);
    assert_eq!(is[3].shape, s1);
}

#[test]
fn intersecting_a_transformed_group() {
    let mut arena = ShapeArena::new();

    let mut group = Shape::group();
    group.set_transform(Matrix4x4::scaling(2.0, 2.0, 2.0));
    let g = arena.insert(group);

    let mut sphere = Shape::sphere();
    sphere.set_transform(Matrix4x4::translation(5.0, 0.0, 0.0));
    let s = arena.insert(sphere);

    arena.add_child(g, s);

    let r = Ray::new(Point::new(10.0, 0.0, -10.0), Vector::new(0.0, 0.0, 1.0));
    let is = arena.intersect(g, &r);

    assert_eq!(is.len(), 2);
}

#[test]
fn group_bounds_cover_transformed_children() {
    let mut arena = ShapeArena::new();
    let g = arena.insert(Shape::group());

    let mut sphere = Shape::sphere();
    sphere.set_transform(Matrix4x4::translation(2.0, 5.0, -3.0)
        * Matrix4x4::scaling(2.0, 2.0, 2.0));
    let s = arena.insert(sphere);

    let mut cylinder = Shape::bounded_cylinder(-2.0, 2.0);
    cylinder.set_transform(Matrix4x4::translation(-4.0, -1.0, 4.0)
        * Matrix4x4::scaling(0.5, 1.0, 0.5));
    let c = arena.insert(cylinder);

    arena.add_child(g, s);
    arena.add_child(g, c);

    let bounds = arena.shape(g).local_bounds();
    assert_eq!(bounds.minimum, Point::new(-4.5, -3.0, -5.0));
    assert_eq!(bounds.maximum, Point::new(4.0, 7.0, 4.5));
}

#[test]
fn nested_group_bounds_refresh_eagerly() {
    let mut arena = ShapeArena::new();
    let outer = arena.insert(Shape::group());
    let inner = arena.insert(Shape::group());
    arena.add_child(outer, inner);

    let mut sphere = Shape::sphere();
    sphere.set_transform(Matrix4x4::translation(5.0, 0.0, 0.0));
    let s = arena.insert(sphere);
    arena.add_child(inner, s);

    let bounds = arena.shape(outer).local_bounds();
    assert_eq!(bounds.minimum, Point::new(4.0, -1.0, -1.0));
    assert_eq!(bounds.maximum, Point::new(6.0, 1.0, 1.0));
}

#[test]
fn group_material_cascades_to_descendants() {
    use crate::color::Color;

    let mut arena = ShapeArena::new();
    let outer = arena.insert(Shape::group());
    let inner = arena.insert(Shape::group());
    let s = arena.insert(Shape::sphere());

    arena.add_child(outer, inner);
    arena.add_child(inner, s);

    let mut material: Material = Default::default();
    material.color = Color::rgb(1.0, 0.2, 0.2);
    arena.set_material(outer, material);

    assert_eq!(arena.shape(s).material.color, Color::rgb(1.0, 0.2, 0.2));
    assert_eq!(arena.shape(inner).material.color, Color::rgb(1.0, 0.2, 0.2));
}

#[test]
fn converting_a_point_from_world_to_object_space() {
    let mut arena = ShapeArena::new();

    let mut g1_shape = Shape::group();
    g1_shape.set_transform(Matrix4x4::rotation_y(std::f64::consts::PI / 2.0));
    let g1 = arena.insert(g1_shape);

    let mut g2_shape = Shape::group();
    g2_shape.set_transform(Matrix4x4::scaling(2.0, 2.0, 2.0));
    let g2 = arena.insert(g2_shape);

    let mut sphere = Shape::sphere();
    sphere.set_transform(Matrix4x4::translation(5.0, 0.0, 0.0));
    let s = arena.insert(sphere);

    arena.add_child(g1, g2);
    arena.add_child(g2, s);

    let p = arena.world_to_object(s, Point::new(-2.0, 0.0, -10.0));
    assert_eq!(p, Point::new(0.0, 0.0, -1.0));
}

#[test]
fn converting_a_normal_from_object_to_world_space() {
    let mut arena = ShapeArena::new();

    let mut g1_shape = Shape::group();
    g1_shape.set_transform(Matrix4x4::rotation_y(std::f64::consts::PI / 2.0));
    let g1 = arena.insert(g1_shape);

    let mut g2_shape = Shape::group();
    g2_shape.set_transform(Matrix4x4::scaling(1.0, 2.0, 3.0));
    let g2 = arena.insert(g2_shape);

    let mut sphere = Shape::sphere();
    sphere.set_transform(Matrix4x4::translation(5.0, 0.0, 0.0));
    let s = arena.insert(sphere);

    arena.add_child(g1, g2);
    arena.add_child(g2, s);

    let third = 3.0f64.sqrt() / 3.0;
    let n = arena.normal_to_world(s, Vector::new(third, third, third));
    assert_eq!(n, Vector::new(0.2857, 0.4286, -0.8571));
}

#[test]
fn finding_the_normal_on_a_grouped_child() {
    let mut arena = ShapeArena::new();

    let mut g1_shape = Shape::group();
    g1_shape.set_transform(Matrix4x4::rotation_y(std::f64::consts::PI / 2.0));
    let g1 = arena.insert(g1_shape);

    let mut g2_shape = Shape::group();
    g2_shape.set_transform(Matrix4x4::scaling(1.0, 2.0, 3.0));
    let g2 = arena.insert(g2_shape);

    let mut sphere = Shape::sphere();
    sphere.set_transform(Matrix4x4::translation(5.0, 0.0, 0.0));
    let s = arena.insert(sphere);

    arena.add_child(g1, g2);
    arena.add_child(g2, s);

    let n = arena.normal_at(s, Point::new(1.7321, 1.1547, -5.5774), None);
    assert_eq!(n, Vector::new(0.2857, 0.4286, -0.8571));
}

#[test]
#[should_panic]
fn group_has_no_normal_of_its_own() {
    let mut arena = ShapeArena::new();
    let g = arena.insert(Shape::group());

    arena.local_normal_at(g, Point::origin(), None);
}

#[test]
fn creating_a_csg_node_parents_both_operands() {
    let mut arena = ShapeArena::new();
    let s1 = arena.insert(Shape::sphere());
    let s2 = arena.insert(Shape::cube());

    let c = arena.insert_csg(CsgOp::Union, s1, s2);

    match arena.shape(c).kind {
        ShapeKind::Csg { op, left, right, .. } => {
            assert_eq!(op, CsgOp::Union);
            assert_eq!(left, s1);
            assert_eq!(right, s2);
        },
        _ => unreachable!(),
    }

    assert_eq!(arena.shape(s1).parent(), Some(c));
    assert_eq!(arena.shape(s2).parent(), Some(c));
}

#[test]
fn csg_operation_truth_table() {
    use CsgOp::*;

    let cases = [
        (Union, true, true, true, false),
        (Union, true, true, false, true),
        (Union, true, false, true, false),
        (Union, true, false, false, true),
        (Union, false, true, true, false),
        (Union, false, true, false, false),
        (Union, false, false, true, true),
        (Union, false, false, false, true),

        (Intersection, true, true, true, true),
        (Intersection, true, true, false, false),
        (Intersection, true, false, true, true),
        (Intersection, true, false, false, false),
        (Intersection, false, true, true, true),
        (Intersection, false, true, false, true),
        (Intersection, false, false, true, false),
        (Intersection, false, false, false, false),

        (Difference, true, true, true, false),
        (Difference, true, true, false, true),
        (Difference, true, false, true, false),
        (Difference, true, false, false, true),
        (Difference, false, true, true, true),
        (Difference, false, true, false, true),
        (Difference, false, false, true, false),
        (Difference, false, false, false, false),
    ];

    for (op, lhit, inl, inr, expected) in cases {
        assert_eq!(is_intersection_allowed(op, lhit, inl, inr), expected,
            "({:?}, {}, {}, {})", op, lhit, inl, inr);
    }
}

#[test]
fn filtering_a_list_of_intersections() {
    let cases = [
        (CsgOp::Union, 0, 3),
        (CsgOp::Intersection, 1, 2),
        (CsgOp::Difference, 0, 1),
    ];

    for (op, x0, x1) in cases {
        let mut arena = ShapeArena::new();
        let s1 = arena.insert(Shape::sphere());
        let s2 = arena.insert(Shape::cube());
        let c = arena.insert_csg(op, s1, s2);

        let xs = Intersections::from_vec(vec![
            Intersection::new(1.0, s1),
            Intersection::new(2.0, s2),
            Intersection::new(3.0, s1),
            Intersection::new(4.0, s2),
        ]);

        let filtered = arena.filter_intersections(c, &xs);
        assert_eq!(filtered.len(), 2, "{:?}", op);
        assert_eq!(filtered[0], xs[x0], "{:?}", op);
        assert_eq!(filtered[1], xs[x1], "{:?}", op);
    }
}

#[test]
fn ray_misses_a_csg_shape() {
    let mut arena = ShapeArena::new();
    let s1 = arena.insert(Shape::sphere());
    let s2 = arena.insert(Shape::cube());
    let c = arena.insert_csg(CsgOp::Union, s1, s2);

    let r = Ray::new(Point::new(0.0, 2.0, -5.0), Vector::new(0.0, 0.0, 1.0));
    assert!(arena.local_intersect(c, &r).is_empty());
}

#[test]
fn ray_hits_a_csg_union() {
    use crate::feq;

    let mut arena = ShapeArena::new();
    let s1 = arena.insert(Shape::sphere());

    let mut second = Shape::sphere();
    second.set_transform(Matrix4x4::translation(0.0, 0.0, 0.5));
    let s2 = arena.insert(second);

    let c = arena.insert_csg(CsgOp::Union, s1, s2);

    let r = Ray::new(Point::new(0.0, 0.0, -5.0), Vector::new(0.0, 0.0, 1.0));
    let is = arena.local_intersect(c, &r);

    assert_eq!(is.len(), 2);
    assert!(feq(is[0].t, 4.0));
    assert_eq!(is[0].shape, s1);
    assert!(feq(is[1].t, 6.5));
    assert_eq!(is[1].shape, s2);
}

#[test]
fn csg_membership_sees_direct_group_children() {
    let mut arena = ShapeArena::new();
    let g = arena.insert(Shape::group());
    let s1 = arena.insert(Shape::sphere());
    arena.add_child(g, s1);

    let s2 = arena.insert(Shape::cube());
    let c = arena.insert_csg(CsgOp::Union, g, s2);

    // A hit on the group's direct child counts as a left-operand hit, so
    // overlapping surfaces of the right operand are filtered out.
    let xs = Intersections::from_vec(vec![
        Intersection::new(1.0, s1),
        Intersection::new(2.0, s2),
        Intersection::new(3.0, s1),
        Intersection::new(4.0, s2),
    ]);

    let filtered = arena.filter_intersections(c, &xs);
    assert_eq!(filtered.len(), 2);
    assert_eq!(filtered[0], xs[0]);
    assert_eq!(filtered[1], xs[3]);
}

#[test]
fn csg_membership_checks_only_one_level_of_nesting() {
    // Known boundary: operand membership inspects direct children only.
    // A shape buried two levels below an operand is treated as belonging
    // to the other side. Deeper trees need a real containment walk before
    // this can change.
    let mut arena = ShapeArena::new();

    let s0 = arena.insert(Shape::sphere());
    let s1 = arena.insert(Shape::sphere());
    let inner = arena.insert_csg(CsgOp::Union, s0, s1);

    let s2 = arena.insert(Shape::sphere());
    let middle = arena.insert_csg(CsgOp::Union, inner, s2);

    // One level down resolves correctly...
    assert!(arena.belongs_to(middle, inner));
    assert!(arena.belongs_to(middle, s2));

    // ...but grandchildren of an operand are not recognized as part of it.
    assert!(!arena.belongs_to(middle, s0));
    assert!(!arena.belongs_to(middle, s1));
}
