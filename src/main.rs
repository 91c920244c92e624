use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::{ ArgEnum, Parser };
use log::LevelFilter;

use glint::camera::{ Camera, RenderProgress };
use glint::color::Color;
use glint::light::PointLight;
use glint::linear::{ Point, Vector };
use glint::matrix::Matrix4x4;
use glint::pattern::Pattern;
use glint::scene::Scene;
use glint::shape::{ CsgOp, Shape };
use glint::world::World;

#[derive(Debug, Clone, ArgEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> LevelFilter {
        match level {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Clone, ArgEnum)]
enum Demo {
    Showcase,
    Hexagon,
    Csg,
}

/// Command line arguments.
#[derive(Parser)]
#[clap(name = "glint", version)]
#[clap(about = "A recursive ray tracer with CSG, groups and refraction")]
struct Args {
    /// JSON scene description to render
    #[clap(short, long)]
    scene: Option<PathBuf>,

    /// Built-in demo scene, rendered when no scene file is given
    #[clap(long, arg_enum, default_value = "showcase")]
    demo: Demo,

    /// Output PPM file
    #[clap(short, long, default_value = "out.ppm")]
    output: PathBuf,

    /// Canvas width override, in pixels
    #[clap(long)]
    width: Option<usize>,

    /// Canvas height override, in pixels
    #[clap(long)]
    height: Option<usize>,

    /// Worker threads; defaults to one per core
    #[clap(short, long)]
    threads: Option<usize>,

    /// Logging verbosity
    #[clap(long, arg_enum, default_value = "info")]
    log_level: LogLevel,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    env_logger::Builder::from_default_env()
        .filter_level(args.log_level.clone().into())
        .init();

    if let Some(threads) = args.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("failed to size the worker pool")?;
    }

    let Scene { world, mut camera } = match &args.scene {
        Some(path) => Scene::from_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => demo_scene(&args.demo),
    };

    if args.width.is_some() || args.height.is_some() {
        camera = Camera::new(
            args.width.unwrap_or(camera.hsize),
            args.height.unwrap_or(camera.vsize),
            camera.field_of_view,
            *camera.transform()
        );
    }

    let report = |p: RenderProgress<'_>| {
        log::debug!("row {} done ({:.1}%)", p.row, p.percent);
    };

    let started = Instant::now();
    let canvas = camera.render_with(&world, Some(&report), None);
    log::info!("rendered in {:.2?}", started.elapsed());

    canvas.save(&args.output)
        .with_context(|| format!("failed to write {}", args.output.display()))?;
    log::info!("wrote {}", args.output.display());

    Ok(())
}

fn demo_scene(demo: &Demo) -> Scene {
    match demo {
        Demo::Showcase => showcase_scene(),
        Demo::Hexagon => hexagon_scene(),
        Demo::Csg => csg_scene(),
    }
}

/// A checkered reflective floor with a glassy sphere, a capped cone and a
/// refractive cube.
fn showcase_scene() -> Scene {
    let mut world = World::empty();
    world.add_light(PointLight::new(
        Color::white(),
        Point::new(-10.0, 10.0, -10.0)
    ));

    let mut floor = Shape::plane();
    floor.material.specular = 0.0;
    floor.material.reflective = 0.3;
    let mut checker = Pattern::checker(Color::white(), Color::black());
    checker.set_transform(Matrix4x4::scaling(0.5, 0.5, 0.5));
    floor.material.pattern = Some(checker);
    world.add_shape(floor);

    let mut middle = Shape::glass_sphere();
    middle.set_transform(Matrix4x4::translation(-0.5, 1.0, 2.0));
    middle.material.color = Color::rgb(1.0, 0.4666, 0.2666);
    middle.material.diffuse = 0.7;
    middle.material.specular = 0.3;
    middle.material.transparency = 0.5;
    middle.material.reflective = 0.5;
    world.add_shape(middle);

    let mut right = Shape::capped_cone(0.0, 3.0);
    right.set_transform(Matrix4x4::translation(1.5, 2.5, -0.5)
        * Matrix4x4::scaling(0.25, 0.25, 0.25)
        * Matrix4x4::rotation_z(std::f64::consts::PI / 4.0)
        * Matrix4x4::rotation_y(std::f64::consts::PI / 8.0));
    right.material.color = Color::rgb(1.0, 0.6666, 0.2666);
    right.material.diffuse = 0.7;
    right.material.specular = 0.3;
    right.material.reflective = 0.3;
    world.add_shape(right);

    let mut left = Shape::cube();
    left.set_transform(Matrix4x4::translation(-1.5, 1.0, -0.75)
        * Matrix4x4::scaling(0.33, 0.33, 0.33)
        * Matrix4x4::rotation_x(std::f64::consts::PI / 4.0)
        * Matrix4x4::rotation_y(std::f64::consts::PI / 4.0));
    left.material.color = Color::rgb(0.8666, 0.2, 0.2);
    left.material.diffuse = 0.7;
    left.material.specular = 0.3;
    left.material.transparency = 0.5;
    left.material.refractive_index = 1.1;
    world.add_shape(left);

    let camera = Camera::new(960, 540, std::f64::consts::PI / 3.0,
        Matrix4x4::view_transform(
            Point::new(0.0, 1.5, -5.0),
            Point::new(0.0, 1.0, 0.0),
            Vector::new(0.0, 1.0, 0.0)
        ));

    Scene { world, camera }
}

fn hexagon_corner() -> Shape {
    let mut corner = Shape::sphere();
    corner.set_transform(Matrix4x4::translation(0.0, 0.0, -1.0)
        * Matrix4x4::scaling(0.25, 0.25, 0.25));

    corner
}

fn hexagon_edge() -> Shape {
    let mut edge = Shape::bounded_cylinder(0.0, 1.0);
    edge.set_transform(Matrix4x4::translation(0.0, 0.0, -1.0)
        * Matrix4x4::rotation_y(-std::f64::consts::PI / 6.0)
        * Matrix4x4::rotation_z(-std::f64::consts::PI / 2.0)
        * Matrix4x4::scaling(0.25, 1.0, 0.25));

    edge
}

/// A ring of six corner-and-edge groups, demonstrating nested groups.
fn hexagon_scene() -> Scene {
    let mut world = World::empty();
    world.add_light(PointLight::new(
        Color::white(),
        Point::new(-10.0, 10.0, -10.0)
    ));

    let mut floor = Shape::plane();
    floor.material.specular = 0.1;
    floor.material.pattern =
        Some(Pattern::ring(Color::rgb(0.8, 0.8, 0.9), Color::white()));
    world.add_shape(floor);

    let mut hex_group = Shape::group();
    hex_group.set_transform(Matrix4x4::translation(0.0, 0.5, 0.0));
    let hex = world.add_shape(hex_group);

    for n in 0..6 {
        let mut side_group = Shape::group();
        side_group.set_transform(
            Matrix4x4::rotation_y(n as f64 * std::f64::consts::PI / 3.0)
        );
        let side = world.arena.insert(side_group);

        let corner = world.arena.insert(hexagon_corner());
        let edge = world.arena.insert(hexagon_edge());
        world.arena.add_child(side, corner);
        world.arena.add_child(side, edge);
        world.arena.add_child(hex, side);
    }

    let camera = Camera::new(800, 600, std::f64::consts::PI / 3.0,
        Matrix4x4::view_transform(
            Point::new(0.0, 3.0, -4.0),
            Point::new(0.0, 0.5, 0.0),
            Vector::new(0.0, 1.0, 0.0)
        ));

    Scene { world, camera }
}

/// A die-like solid: a rounded cube minus a sphere, next to a lens made
/// from intersecting spheres.
fn csg_scene() -> Scene {
    let mut world = World::empty();
    world.add_light(PointLight::new(
        Color::white(),
        Point::new(-10.0, 10.0, -10.0)
    ));

    let mut floor = Shape::plane();
    floor.material.specular = 0.0;
    floor.material.pattern =
        Some(Pattern::checker(Color::rgb(0.7, 0.7, 0.7), Color::white()));
    world.add_shape(floor);

    let mut die_body = Shape::cube();
    die_body.material.color = Color::rgb(0.9, 0.2, 0.2);
    let body = world.arena.insert(die_body);

    let mut die_scoop = Shape::sphere();
    die_scoop.set_transform(Matrix4x4::translation(0.0, 1.0, -1.0)
        * Matrix4x4::scaling(0.5, 0.5, 0.5));
    die_scoop.material.color = Color::rgb(0.2, 0.2, 0.9);
    let scoop = world.arena.insert(die_scoop);

    let die = world.arena.insert_csg(CsgOp::Difference, body, scoop);
    world.arena.set_transform(die,
        Matrix4x4::translation(-1.5, 1.0, 0.5)
            * Matrix4x4::rotation_y(std::f64::consts::PI / 6.0));
    world.roots.push(die);

    let mut lens_left = Shape::glass_sphere();
    lens_left.set_transform(Matrix4x4::translation(0.0, 0.0, -0.4));
    let lens_l = world.arena.insert(lens_left);

    let mut lens_right = Shape::glass_sphere();
    lens_right.set_transform(Matrix4x4::translation(0.0, 0.0, 0.4));
    let lens_r = world.arena.insert(lens_right);

    let lens = world.arena.insert_csg(CsgOp::Intersection, lens_l, lens_r);
    world.arena.set_transform(lens, Matrix4x4::translation(1.5, 1.0, 0.0));
    world.roots.push(lens);

    let camera = Camera::new(800, 600, std::f64::consts::PI / 3.0,
        Matrix4x4::view_transform(
            Point::new(0.0, 2.5, -5.0),
            Point::new(0.0, 1.0, 0.0),
            Vector::new(0.0, 1.0, 0.0)
        ));

    Scene { world, camera }
}
