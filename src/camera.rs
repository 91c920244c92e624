use std::sync::Arc;
use std::sync::atomic::{ AtomicBool, AtomicUsize, Ordering };

use rayon::prelude::*;

use crate::consts::RECURSION_DEPTH;
use crate::linear::Point;
use crate::matrix::Matrix4x4;
use crate::ray::Ray;
use crate::color::Color;
use crate::world::World;
use crate::canvas::Canvas;

/// A cooperative cancellation flag shared with a running render.
///
/// Cancellation never raises an error: the render loop polls the token and
/// hands back whatever rows it finished.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> CancelToken {
        Default::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// A finished row, reported to the progress callback.
#[derive(Debug)]
pub struct RenderProgress<'a> {
    /// Rows finished so far, as a percentage of the canvas.
    pub percent: f64,

    /// The row that just finished.
    pub row: usize,

    /// That row's pixels.
    pub pixels: &'a [Color],
}

/// Signature of a progress callback; called once per finished row, from
/// whichever worker thread finished it.
pub type ProgressFn<'f> = dyn for<'a> Fn(RenderProgress<'a>) + Send + Sync + 'f;

/// A view into the world that turns pixels into rays.
#[derive(Clone, Debug, PartialEq)]
pub struct Camera {
    pub hsize: usize,
    pub vsize: usize,

    /// The angle describing how much of the world the camera sees.
    pub field_of_view: f64,

    pub half_width: f64,
    pub half_height: f64,
    pub pixel_size: f64,

    transform: Matrix4x4,
    inverse: Matrix4x4,
}

impl Camera {
    /// Derives the canvas-plane extents and pixel size from the field of
    /// view and aspect ratio.
    pub fn new(hsize: usize, vsize: usize, field_of_view: f64,
        transform: Matrix4x4) -> Camera {
        let half_view = (field_of_view / 2.0).tan();
        let aspect = hsize as f64 / vsize as f64;

        let (half_width, half_height) = if aspect >= 1.0 {
            (half_view, half_view / aspect)
        } else {
            (half_view * aspect, half_view)
        };

        let pixel_size = half_width * 2.0 / hsize as f64;
        let inverse = transform.inverse()
            .expect("Camera transforms should be invertible.");

        Camera {
            hsize,
            vsize,
            field_of_view,
            half_width,
            half_height,
            pixel_size,
            transform,
            inverse,
        }
    }

    pub fn transform(&self) -> &Matrix4x4 {
        &self.transform
    }

    pub fn set_transform(&mut self, transform: Matrix4x4) {
        self.transform = transform;
        self.inverse = transform.inverse()
            .expect("Camera transforms should be invertible.");
    }

    /// The world-space ray through the center of pixel `(px, py)`.
    pub fn ray_for_pixel(&self, px: usize, py: usize) -> Ray {
        // Offsets from the canvas edge to the pixel's center.
        let xoffset = (px as f64 + 0.5) * self.pixel_size;
        let yoffset = (py as f64 + 0.5) * self.pixel_size;

        // The untransformed target on the canvas plane at z = -1.
        let world_x = self.half_width - xoffset;
        let world_y = self.half_height - yoffset;

        let pixel = self.inverse * Point::new(world_x, world_y, -1.0);
        let origin = self.inverse * Point::origin();
        let direction = (pixel - origin).normalize();

        Ray::new(origin, direction)
    }

    /// Renders the world, without progress reporting or cancellation.
    pub fn render(&self, world: &World) -> Canvas {
        self.render_with(world, None, None)
    }

    /// Renders the world into a canvas, rows in parallel.
    ///
    /// Rows write disjoint slices of the pixel buffer, so no locking guards
    /// pixel data; only the finished-row counter backing the progress
    /// percentage is shared. The cancel token is polled per row and per
    /// pixel; once it trips, remaining work is skipped and the partially
    /// filled canvas is returned.
    pub fn render_with(&self, world: &World, progress: Option<&ProgressFn<'_>>,
        cancel: Option<&CancelToken>) -> Canvas {
        log::info!("rendering {}x{} canvas", self.hsize, self.vsize);

        let mut image = Canvas::new(self.hsize, self.vsize);
        let width = self.hsize;
        let total_rows = self.vsize;
        let finished = AtomicUsize::new(0);

        image.pixels_mut()
            .par_chunks_mut(width)
            .enumerate()
            .for_each(|(y, row)| {
                if cancel.map_or(false, |c| c.is_cancelled()) {
                    return;
                }

                for (x, pixel) in row.iter_mut().enumerate() {
                    if cancel.map_or(false, |c| c.is_cancelled()) {
                        return;
                    }

                    let ray = self.ray_for_pixel(x, y);
                    *pixel = world.color_at(&ray, RECURSION_DEPTH);
                }

                let done = finished.fetch_add(1, Ordering::SeqCst) + 1;
                log::trace!("finished row {}", y);

                if let Some(report) = progress {
                    report(RenderProgress {
                        percent: 100.0 * done as f64 / total_rows as f64,
                        row: y,
                        pixels: row,
                    });
                }
            });

        if cancel.map_or(false, |c| c.is_cancelled()) {
            log::info!("render cancelled after {} of {} rows",
                finished.load(Ordering::SeqCst), total_rows);
        }

        image
    }
}

/* Tests */

#[cfg(test)]
use crate::feq;
#[cfg(test)]
use crate::linear::Vector;

#[test]
fn pixel_size_for_a_horizontal_canvas() {
    let c = Camera::new(200, 125, std::f64::consts::PI / 2.0,
        Matrix4x4::identity());
    assert!(feq(c.pixel_size, 0.01));
}

#[test]
fn pixel_size_for_a_vertical_canvas() {
    let c = Camera::new(125, 200, std::f64::consts::PI / 2.0,
        Matrix4x4::identity());
    assert!(feq(c.pixel_size, 0.01));
}

#[test]
fn ray_through_canvas_center() {
    let c = Camera::new(201, 101, std::f64::consts::PI / 2.0,
        Matrix4x4::identity());
    let r = c.ray_for_pixel(100, 50);

    assert_eq!(r.origin, Point::origin());
    assert_eq!(r.direction, Vector::new(0.0, 0.0, -1.0));
}

#[test]
fn ray_through_canvas_corner() {
    let c = Camera::new(201, 101, std::f64::consts::PI / 2.0,
        Matrix4x4::identity());
    let r = c.ray_for_pixel(0, 0);

    assert_eq!(r.origin, Point::origin());
    assert_eq!(r.direction, Vector::new(0.66519, 0.33259, -0.66851));
}

#[test]
fn ray_through_a_transformed_camera() {
    let c = Camera::new(201, 101, std::f64::consts::PI / 2.0,
        Matrix4x4::rotation_y(std::f64::consts::PI / 4.0)
            * Matrix4x4::translation(0.0, -2.0, 5.0));
    let r = c.ray_for_pixel(100, 50);

    let half_sqrt2 = 2.0f64.sqrt() / 2.0;
    assert_eq!(r.origin, Point::new(0.0, 2.0, -5.0));
    assert_eq!(r.direction, Vector::new(half_sqrt2, 0.0, -half_sqrt2));
}

#[test]
fn render_the_default_world() {
    let w: World = Default::default();

    let mut c = Camera::new(11, 11, std::f64::consts::PI / 2.0,
        Matrix4x4::identity());
    c.set_transform(Matrix4x4::view_transform(
        Point::new(0.0, 0.0, -5.0),
        Point::origin(),
        Vector::new(0.0, 1.0, 0.0)
    ));

    let image = c.render(&w);
    assert_eq!(image.pixel(5, 5).unwrap(),
        Color::rgb(0.38066, 0.47583, 0.2855));
}

#[test]
fn progress_reports_every_row_once() {
    use std::sync::Mutex;

    let w: World = Default::default();
    let c = Camera::new(4, 6, std::f64::consts::PI / 2.0,
        Matrix4x4::identity());

    let seen: Mutex<Vec<usize>> = Mutex::new(Vec::new());
    let report = |p: RenderProgress<'_>| {
        assert_eq!(p.pixels.len(), 4);
        assert!(p.percent > 0.0 && p.percent <= 100.0);
        seen.lock().unwrap().push(p.row);
    };

    c.render_with(&w, Some(&report), None);

    let mut rows = seen.into_inner().unwrap();
    rows.sort_unstable();
    assert_eq!(rows, vec![0, 1, 2, 3, 4, 5]);
}

#[test]
fn cancelled_render_returns_a_partial_canvas() {
    let w: World = Default::default();
    let mut c = Camera::new(11, 11, std::f64::consts::PI / 2.0,
        Matrix4x4::identity());
    c.set_transform(Matrix4x4::view_transform(
        Point::new(0.0, 0.0, -5.0),
        Point::origin(),
        Vector::new(0.0, 1.0, 0.0)
    ));

    let token = CancelToken::new();
    token.cancel();

    // Pre-cancelled: every row is skipped and left black.
    let image = c.render_with(&w, None, Some(&token));
    assert!(image.pixels().iter().all(|p| *p == Color::black()));
}
