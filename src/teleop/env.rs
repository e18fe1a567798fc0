//! # Simulation Collaborator Module
//!
//! The contract the teleop loop consumes from a simulation environment, and
//! a kinematic stand-in implementing it.
//!
//! The real soft-body environment (particles, contact handling, GPU kernels)
//! lives outside this crate. [`KinematicPrimitive`] only moves a rigid
//! cylinder primitive over a static block of particles so the loop, the CLI
//! and the tests have something to drive.
//!
//! Frames are a top-down view: world `x` runs along columns, world `z` along
//! rows, and higher `y` is nearer the camera.

use nalgebra::{Point3, UnitQuaternion, Vector3};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::path::Path;
use tracing::debug;

use super::render::Frame;
use crate::error::{Result, TeleopError};
use crate::mesh::{pose_to_isometry, Color, Mesh, RgbDepth};

/// Output requested from [`SimulationEnv::render`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    Rgb,
}

/// Observable simulation state.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvState {
    /// Particle positions.
    pub particles: Vec<Vector3<f32>>,
    /// Primitive pose as `[x, y, z, qw, qx, qy, qz]`.
    pub primitive_pose: [f32; 7],
}

/// Simulation environment driven by the teleop loop.
pub trait SimulationEnv {
    fn seed(&mut self, seed: u64);

    fn reset(&mut self) -> Result<()>;

    /// Advances the simulation by one step. May be slow.
    fn step(&mut self, action: &[f32]) -> Result<()>;

    fn render(&mut self, mode: RenderMode) -> Result<Frame>;

    /// Length of the action vector `step` expects.
    fn action_dim(&self) -> usize;

    fn get_state(&self) -> EnvState;

    fn max_episode_steps(&self) -> usize;
}

/// Particle block resolution along each axis.
const BLOCK_RESOLUTION: (usize, usize, usize) = (8, 4, 8);

/// Initial primitive position above the particle block.
const PRIMITIVE_START: [f32; 3] = [0.5, 0.2, 0.5];

/// Largest per-axis offset applied to a particle's lattice position.
const PARTICLE_JITTER: f32 = 0.004;

/// Cylinder radius and height the unit model is scaled to.
pub const PRIMITIVE_RADIUS: f32 = 0.0254;
pub const PRIMITIVE_HEIGHT: f32 = 0.254;

/// Half-width of the primitive marker in pixels, drawn when no model is set.
const PRIMITIVE_MARKER: usize = 3;

/// Camera height above the floor. Depth is measured down from here.
const CAMERA_HEIGHT: f32 = 1.0;

const PARTICLE_COLOR: Color = [220.0 / 255.0, 200.0 / 255.0, 160.0 / 255.0];
const PRIMITIVE_COLOR: Color = [200.0 / 255.0, 40.0 / 255.0, 40.0 / 255.0];

/// Built-in unit cylinder: radius 1, height 1, axis along y.
const CYLINDER_OBJ: &str = include_str!("../../assets/cylinder.obj");

/// Loads the primitive's cylinder model and scales it to
/// [`PRIMITIVE_RADIUS`] x [`PRIMITIVE_HEIGHT`].
///
/// Reads the OBJ at `path`, or the built-in unit cylinder when `None`. Faces
/// carry the primitive colour.
///
/// # Errors
///
/// Returns `Io` if `path` cannot be read, or `Mesh` for malformed OBJ text.
pub fn cylinder_model(path: Option<&Path>) -> Result<Mesh> {
    let color = Some(PRIMITIVE_COLOR);
    let mut mesh = match path {
        Some(path) => Mesh::from_obj_file(path, color)?,
        None => Mesh::from_obj_str(CYLINDER_OBJ, color)?,
    };
    mesh.scale(&Vector3::new(PRIMITIVE_RADIUS, PRIMITIVE_HEIGHT, PRIMITIVE_RADIUS));
    Ok(mesh)
}

/// Rigid cylinder primitive over a static particle block.
///
/// Actions are `[body-x displacement, yaw increment, world-y displacement]`.
#[derive(Debug, Clone)]
pub struct KinematicPrimitive {
    name: String,
    width: usize,
    height: usize,
    max_episode_steps: usize,
    seed: u64,
    particles: Vec<Vector3<f32>>,
    position: Vector3<f32>,
    yaw: f32,
    steps: usize,
    model: Mesh,
}

impl KinematicPrimitive {
    pub const ACTION_DIM: usize = 3;

    #[must_use]
    pub fn new(name: &str, width: usize, height: usize, max_episode_steps: usize) -> Self {
        let mut env = Self {
            name: name.to_string(),
            width,
            height,
            max_episode_steps,
            seed: 0,
            particles: Vec::new(),
            position: Vector3::from(PRIMITIVE_START),
            yaw: 0.0,
            steps: 0,
            model: Mesh::empty(),
        };
        env.particles = env.sample_particles();
        env
    }

    /// Draws the primitive with `model`, given in the primitive's body frame,
    /// instead of a square marker.
    #[must_use]
    pub fn with_model(mut self, model: Mesh) -> Self {
        self.model = model;
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Steps taken since the last reset.
    #[must_use]
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Dough block in `[0.4, 0.6] x [0, 0.1] x [0.4, 0.6]`, jittered by seed.
    fn sample_particles(&self) -> Vec<Vector3<f32>> {
        let (nx, ny, nz) = BLOCK_RESOLUTION;
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut particles = Vec::with_capacity(nx * ny * nz);

        for i in 0..nx {
            for j in 0..ny {
                for k in 0..nz {
                    let jitter = Vector3::new(
                        rng.random_range(-1.0..1.0),
                        rng.random_range(-1.0..1.0),
                        rng.random_range(-1.0..1.0),
                    ) * PARTICLE_JITTER;
                    let base = Vector3::new(
                        0.4 + 0.2 * (i as f32 + 0.5) / nx as f32,
                        0.1 * (j as f32 + 0.5) / ny as f32,
                        0.4 + 0.2 * (k as f32 + 0.5) / nz as f32,
                    );
                    particles.push(base + jitter);
                }
            }
        }

        particles
    }

    fn orientation(&self) -> UnitQuaternion<f32> {
        UnitQuaternion::from_axis_angle(&Vector3::y_axis(), self.yaw)
    }

    fn pose(&self) -> [f32; 7] {
        let q = self.orientation();
        [
            self.position.x,
            self.position.y,
            self.position.z,
            q.w,
            q.i,
            q.j,
            q.k,
        ]
    }

    /// Maps a world point to `(col, row, depth)` in pixel space.
    fn to_pixel_space(&self, point: &Point3<f32>) -> Point3<f32> {
        Point3::new(
            point.x * self.width as f32,
            point.z * self.height as f32,
            CAMERA_HEIGHT - point.y,
        )
    }

    /// Maps world `(x, z)` in `[0, 1]` to a pixel.
    fn project(&self, point: &Point3<f32>) -> Option<(usize, usize)> {
        let p = self.to_pixel_space(point);
        if !(p.x >= 0.0 && p.y >= 0.0 && p.x < self.width as f32 && p.y < self.height as f32) {
            return None;
        }
        Some((p.x as usize, p.y as usize))
    }

    fn draw_particles(&self) -> RgbDepth {
        let mut layer = RgbDepth::new(self.width, self.height);
        for particle in &self.particles {
            let point = Point3::from(*particle);
            if let Some((col, row)) = self.project(&point) {
                layer.plot(col, row, CAMERA_HEIGHT - point.y, PARTICLE_COLOR);
            }
        }
        layer
    }

    fn draw_primitive(&self) -> Result<RgbDepth> {
        let mut layer = RgbDepth::new(self.width, self.height);

        if self.model.is_empty() {
            let center = Point3::from(self.position);
            if let Some((cx, cy)) = self.project(&center) {
                let depth = CAMERA_HEIGHT - center.y;
                for row in cy.saturating_sub(PRIMITIVE_MARKER)..=cy + PRIMITIVE_MARKER {
                    for col in cx.saturating_sub(PRIMITIVE_MARKER)..=cx + PRIMITIVE_MARKER {
                        layer.plot(col, row, depth, PRIMITIVE_COLOR);
                    }
                }
            }
            return Ok(layer);
        }

        let body_to_world = pose_to_isometry(&self.pose())?;
        for (&face, texture) in self.model.faces.iter().zip(&self.model.textures) {
            let corners = face.map(|i| {
                let world = body_to_world * self.model.vertices[i];
                self.to_pixel_space(&world)
            });
            let color = texture.texels.first().copied().unwrap_or(PRIMITIVE_COLOR);
            layer.fill_triangle(&corners, color);
        }
        Ok(layer)
    }
}

fn to_rgb8(color: Color) -> [u8; 3] {
    color.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8)
}

impl SimulationEnv for KinematicPrimitive {
    fn seed(&mut self, seed: u64) {
        self.seed = seed;
        self.particles = self.sample_particles();
    }

    fn reset(&mut self) -> Result<()> {
        self.position = Vector3::from(PRIMITIVE_START);
        self.yaw = 0.0;
        self.steps = 0;
        self.particles = self.sample_particles();
        debug!("{} reset", self.name);
        Ok(())
    }

    fn step(&mut self, action: &[f32]) -> Result<()> {
        if action.len() != Self::ACTION_DIM {
            return Err(TeleopError::ActionDimension {
                expected: Self::ACTION_DIM,
                actual: action.len(),
            });
        }

        self.yaw += action[1];
        let body_x = self.orientation() * Vector3::x();
        self.position += body_x * action[0];
        self.position.y += action[2];
        self.steps += 1;
        Ok(())
    }

    fn render(&mut self, mode: RenderMode) -> Result<Frame> {
        match mode {
            RenderMode::Rgb => {}
        }

        let mut image = RgbDepth::default();
        image.add(&self.draw_particles())?;
        image.add(&self.draw_primitive()?)?;

        let mut frame = Frame::new(self.width, self.height);
        for row in 0..self.height {
            for col in 0..self.width {
                let i = row * self.width + col;
                if image.depth[i].is_finite() {
                    frame.set_pixel(col, row, to_rgb8(image.rgb[i]));
                }
            }
        }
        Ok(frame)
    }

    fn action_dim(&self) -> usize {
        Self::ACTION_DIM
    }

    fn get_state(&self) -> EnvState {
        EnvState {
            particles: self.particles.clone(),
            primitive_pose: self.pose(),
        }
    }

    fn max_episode_steps(&self) -> usize {
        self.max_episode_steps
    }
}
