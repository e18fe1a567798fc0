//! # Mesh Module
//!
//! Triangle meshes, depth compositing and camera helpers used to build
//! scenes of the primitive and the dough.
//!
//! Meshes are loaded from Wavefront OBJ. Only geometry is read: the first
//! three coordinates of each `v` line and the vertex index of each `f`
//! corner. Polygons are fan-triangulated.

use nalgebra::{Isometry3, Matrix3, Point3, Quaternion, Rotation3, Translation3, UnitQuaternion, Vector3};
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::error::{Result, TeleopError};

/// RGB colour with channels in `[0, 1]`.
pub type Color = [f32; 3];

/// Per-face texture block of `num_tex^3` texels.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceTexture {
    pub num_tex: usize,
    pub texels: Vec<Color>,
}

/// Triangle mesh with one texture block per face.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    pub vertices: Vec<Point3<f32>>,
    pub faces: Vec<[usize; 3]>,
    pub textures: Vec<FaceTexture>,
}

impl Mesh {
    /// Mesh with no geometry, ready to accumulate objects.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Loads an OBJ file with flat textures.
    ///
    /// Faces are textured with `color`, or white when `None`.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file cannot be read, or `Mesh` naming the first
    /// malformed line.
    pub fn from_obj_file(path: impl AsRef<Path>, color: Option<Color>) -> Result<Self> {
        let path = path.as_ref();
        let mesh = Self::from_obj_str(&fs::read_to_string(path)?, color)?;
        debug!(
            "Loaded {} ({} vertices, {} faces)",
            path.display(),
            mesh.vertices.len(),
            mesh.faces.len()
        );
        Ok(mesh)
    }

    /// Parses OBJ text. See [`Mesh::from_obj_file`].
    ///
    /// # Errors
    ///
    /// Returns `Mesh` naming the first malformed line.
    pub fn from_obj_str(text: &str, color: Option<Color>) -> Result<Self> {
        let mut vertices = Vec::new();
        let mut faces = Vec::new();

        for (number, raw) in text.lines().enumerate() {
            let line = number + 1;
            let mut tokens = raw.split_whitespace();
            match tokens.next() {
                Some("v") => vertices.push(parse_vertex(tokens, line)?),
                Some("f") => {
                    let corners = tokens
                        .map(|token| resolve_index(token, vertices.len(), line))
                        .collect::<Result<Vec<_>>>()?;
                    if corners.len() < 3 {
                        return Err(mesh_error(line, "face needs at least 3 vertices"));
                    }
                    for k in 1..corners.len() - 1 {
                        faces.push([corners[0], corners[k], corners[k + 1]]);
                    }
                }
                _ => {}
            }
        }

        let textures = make_fake_textures(faces.len(), color, 1);
        Ok(Self {
            vertices,
            faces,
            textures,
        })
    }

    /// Appends `obj` placed at `p_wo` with optional rotation `r_wo`.
    ///
    /// Vertices become `R * v + p`. Face indices are offset by the current
    /// vertex count.
    pub fn add_object(&mut self, obj: &Mesh, p_wo: &Vector3<f32>, r_wo: Option<&Rotation3<f32>>) {
        let offset = self.vertices.len();

        self.vertices.extend(obj.vertices.iter().map(|v| match r_wo {
            Some(r) => r * v + p_wo,
            None => v + p_wo,
        }));
        self.faces
            .extend(obj.faces.iter().map(|f| [f[0] + offset, f[1] + offset, f[2] + offset]));
        self.textures.extend(obj.textures.iter().cloned());
    }

    /// Scales vertices per axis.
    pub fn scale(&mut self, s: &Vector3<f32>) {
        for v in &mut self.vertices {
            v.coords.component_mul_assign(s);
        }
    }
}

fn mesh_error(line: usize, message: impl Into<String>) -> TeleopError {
    TeleopError::Mesh {
        line,
        message: message.into(),
    }
}

fn parse_vertex<'a>(tokens: impl Iterator<Item = &'a str>, line: usize) -> Result<Point3<f32>> {
    let coords = tokens
        .take(3)
        .map(|t| {
            t.parse::<f32>()
                .map_err(|e| mesh_error(line, format!("bad coordinate {:?}: {}", t, e)))
        })
        .collect::<Result<Vec<_>>>()?;

    match coords[..] {
        [x, y, z] => Ok(Point3::new(x, y, z)),
        _ => Err(mesh_error(line, "vertex needs 3 coordinates")),
    }
}

/// Resolves a face corner (`i`, `i/t`, `i/t/n` or `i//n`) to a 0-based
/// vertex index. Negative indices count back from the last vertex.
fn resolve_index(token: &str, num_vertices: usize, line: usize) -> Result<usize> {
    let raw = token.split('/').next().unwrap_or_default();
    let index: i64 = raw
        .parse()
        .map_err(|e| mesh_error(line, format!("bad face index {:?}: {}", token, e)))?;

    let resolved = match index {
        0 => None,
        i if i > 0 => Some(i - 1),
        i => Some(num_vertices as i64 + i),
    };

    match resolved {
        Some(i) if i >= 0 && (i as usize) < num_vertices => Ok(i as usize),
        _ => Err(mesh_error(
            line,
            format!("face index {} out of range for {} vertices", index, num_vertices),
        )),
    }
}

/// Flat textures: every texel is `color`, or white when `None`.
#[must_use]
pub fn make_fake_textures(num_faces: usize, color: Option<Color>, num_tex: usize) -> Vec<FaceTexture> {
    let texel = color.unwrap_or([1.0; 3]);
    let block = FaceTexture {
        num_tex,
        texels: vec![texel; num_tex.pow(3)],
    };
    vec![block; num_faces]
}

/// Colour image with a per-pixel depth buffer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RgbDepth {
    pub width: usize,
    pub height: usize,
    pub rgb: Vec<Color>,
    pub depth: Vec<f32>,
}

impl RgbDepth {
    /// Image with every pixel at infinite depth.
    #[must_use]
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            rgb: vec![[0.0; 3]; width * height],
            depth: vec![f32::INFINITY; width * height],
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.depth.is_empty()
    }

    /// Composites `other` over `self`: wherever `other` is strictly nearer,
    /// its colour and depth win. An empty image takes `other` as is.
    ///
    /// # Errors
    ///
    /// Returns `Render` if the two images differ in size.
    pub fn add(&mut self, other: &RgbDepth) -> Result<()> {
        if self.is_empty() {
            *self = other.clone();
            return Ok(());
        }

        if (self.width, self.height) != (other.width, other.height) {
            return Err(TeleopError::Render(format!(
                "cannot composite {}x{} onto {}x{}",
                other.width, other.height, self.width, self.height
            )));
        }

        for i in 0..self.depth.len() {
            if other.depth[i] < self.depth[i] {
                self.depth[i] = other.depth[i];
                self.rgb[i] = other.rgb[i];
            }
        }
        Ok(())
    }

    /// Writes one sample if it is nearer than what the pixel holds.
    /// Samples outside the image are dropped.
    pub fn plot(&mut self, col: usize, row: usize, depth: f32, color: Color) {
        if col >= self.width || row >= self.height {
            return;
        }
        let i = row * self.width + col;
        if depth < self.depth[i] {
            self.depth[i] = depth;
            self.rgb[i] = color;
        }
    }

    /// Fills a triangle whose corners are `(col, row, depth)` in pixel space.
    ///
    /// A pixel is covered when its centre lies inside the triangle, edges
    /// included. Depth is interpolated across the face. Degenerate triangles
    /// cover nothing.
    pub fn fill_triangle(&mut self, corners: &[Point3<f32>; 3], color: Color) {
        let [a, b, c] = corners;
        let area = edge(a, b, c);
        if !(area.abs() > f32::EPSILON) {
            return;
        }

        let cols = pixel_span(a.x.min(b.x).min(c.x), a.x.max(b.x).max(c.x), self.width);
        let rows = pixel_span(a.y.min(b.y).min(c.y), a.y.max(b.y).max(c.y), self.height);

        for row in rows {
            for col in cols.clone() {
                let p = Point3::new(col as f32 + 0.5, row as f32 + 0.5, 0.0);
                let wa = edge(b, c, &p) / area;
                let wb = edge(c, a, &p) / area;
                let wc = edge(a, b, &p) / area;
                if wa < 0.0 || wb < 0.0 || wc < 0.0 {
                    continue;
                }
                self.plot(col, row, wa * a.z + wb * b.z + wc * c.z, color);
            }
        }
    }
}

/// Twice the signed area of `(a, b, p)` in the xy plane.
fn edge(a: &Point3<f32>, b: &Point3<f32>, p: &Point3<f32>) -> f32 {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
}

/// Pixel indices whose centres can fall in `[lo, hi]`, clipped to `[0, size)`.
fn pixel_span(lo: f32, hi: f32, size: usize) -> std::ops::Range<usize> {
    let start = lo.floor().max(0.0) as usize;
    let end = (hi.ceil().max(0.0) as usize).min(size);
    start.min(end)..end
}

/// Pinhole intrinsics from a vertical field of view in radians.
///
/// The principal point sits at the OpenGL half-pixel centre.
#[must_use]
pub fn intrinsic_matrix_from_fov(width: usize, height: usize, fov_y: f64) -> Matrix3<f64> {
    let focal = height as f64 * 0.5 / (0.5 * fov_y).tan();
    let pp_x = width as f64 / 2.0 - 0.5;
    let pp_y = height as f64 / 2.0 - 0.5;

    Matrix3::new(
        focal, 0.0, pp_x, //
        0.0, focal, pp_y, //
        0.0, 0.0, 1.0,
    )
}

/// Converts `[x, y, z, qw, qx, qy, qz]` to a rigid transform. The quaternion
/// is normalized first.
///
/// # Errors
///
/// Returns `Render` if the quaternion has zero length.
pub fn pose_to_isometry(pose: &[f32; 7]) -> Result<Isometry3<f32>> {
    let [x, y, z, w, i, j, k] = *pose;
    let rotation = UnitQuaternion::try_new(Quaternion::new(w, i, j, k), f32::EPSILON)
        .ok_or_else(|| TeleopError::Render(format!("degenerate pose quaternion {:?}", &pose[3..])))?;

    Ok(Isometry3::from_parts(Translation3::new(x, y, z), rotation))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;
    use tempfile::TempDir;

    const SQUARE: &str = "\
# unit square
v 0 0 0 1 1 1
v 1 0 0
v 1 1 0
v 0 1 0
vt 0 0
f 1/1 2/1 3/1 4/1
";

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    // ==================== OBJ Tests ====================

    #[test]
    fn test_quad_fan_triangulated() {
        let mesh = Mesh::from_obj_str(SQUARE, None).unwrap();
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.faces, vec![[0, 1, 2], [0, 2, 3]]);
        assert_eq!(mesh.textures.len(), 2);
    }

    #[test]
    fn test_extra_vertex_columns_dropped() {
        let mesh = Mesh::from_obj_str(SQUARE, None).unwrap();
        assert_eq!(mesh.vertices[0], Point3::new(0.0, 0.0, 0.0));
    }

    #[test]
    fn test_negative_indices() {
        let text = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf -3 -2 -1\n";
        let mesh = Mesh::from_obj_str(text, None).unwrap();
        assert_eq!(mesh.faces, vec![[0, 1, 2]]);
    }

    #[test]
    fn test_bad_lines_report_line_number() {
        let cases = [
            ("v 0 0\n", 1),
            ("v 0 0 0\nv 1 x 0\n", 2),
            ("v 0 0 0\nv 1 0 0\nf 1 2\n", 3),
            ("v 0 0 0\nf 1 2 4\n", 2),
            ("v 0 0 0\nf 0 1 1\n", 2),
            ("v 0 0 0\nf -2 1 1\n", 2),
        ];

        for (text, expected) in cases {
            match Mesh::from_obj_str(text, None) {
                Err(TeleopError::Mesh { line, .. }) => assert_eq!(line, expected, "{:?}", text),
                other => panic!("Expected Mesh error for {:?}, got {:?}", text, other),
            }
        }
    }

    #[test]
    fn test_from_obj_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("square.obj");
        fs::write(&path, SQUARE).unwrap();

        let mesh = Mesh::from_obj_file(&path, Some([1.0, 0.0, 0.0])).unwrap();
        assert_eq!(mesh.faces.len(), 2);
        assert_eq!(mesh.textures[0].texels, vec![[1.0, 0.0, 0.0]]);

        assert!(matches!(
            Mesh::from_obj_file(dir.path().join("missing.obj"), None),
            Err(TeleopError::Io(_))
        ));
    }

    // ==================== Mesh Operation Tests ====================

    #[test]
    fn test_add_object_offsets_faces() {
        let square = Mesh::from_obj_str(SQUARE, None).unwrap();
        let mut scene = Mesh::empty();
        assert!(scene.is_empty());

        scene.add_object(&square, &Vector3::zeros(), None);
        scene.add_object(&square, &Vector3::new(0.0, 0.0, 2.0), None);

        assert_eq!(scene.vertices.len(), 8);
        assert_eq!(scene.faces[2], [4, 5, 6]);
        assert_eq!(scene.textures.len(), 4);
        assert_eq!(scene.vertices[5], Point3::new(1.0, 0.0, 2.0));
    }

    #[test]
    fn test_add_object_rotates_then_translates() {
        let square = Mesh::from_obj_str(SQUARE, None).unwrap();
        let rotation = Rotation3::from_axis_angle(&Vector3::z_axis(), FRAC_PI_2);
        let mut scene = Mesh::empty();
        scene.add_object(&square, &Vector3::new(10.0, 0.0, 0.0), Some(&rotation));

        // (1, 0, 0) rotated to (0, 1, 0), then moved
        let v = scene.vertices[1];
        assert!(close(v.x, 10.0));
        assert!(close(v.y, 1.0));
        assert!(close(v.z, 0.0));
    }

    #[test]
    fn test_scale_per_axis() {
        let mut mesh = Mesh::from_obj_str(SQUARE, None).unwrap();
        mesh.scale(&Vector3::new(0.0254, 0.254, 0.0254));
        assert!(close(mesh.vertices[2].x, 0.0254));
        assert!(close(mesh.vertices[2].y, 0.254));
    }

    #[test]
    fn test_fake_textures() {
        let white = make_fake_textures(2, None, 2);
        assert_eq!(white.len(), 2);
        assert_eq!(white[0].num_tex, 2);
        assert_eq!(white[0].texels.len(), 8);
        assert!(white[0].texels.iter().all(|t| *t == [1.0; 3]));

        let red = make_fake_textures(1, Some([0.8, 0.1, 0.1]), 1);
        assert_eq!(red[0].texels, vec![[0.8, 0.1, 0.1]]);
    }

    // ==================== Compositing Tests ====================

    #[test]
    fn test_rgb_depth_nearer_wins() {
        let mut base = RgbDepth::new(2, 1);
        base.depth = vec![1.0, 1.0];
        base.rgb = vec![[1.0, 0.0, 0.0]; 2];

        let mut other = RgbDepth::new(2, 1);
        other.depth = vec![0.5, 1.0];
        other.rgb = vec![[0.0, 0.0, 1.0]; 2];

        base.add(&other).unwrap();
        assert_eq!(base.depth, vec![0.5, 1.0]);
        assert_eq!(base.rgb, vec![[0.0, 0.0, 1.0], [1.0, 0.0, 0.0]]);
    }

    #[test]
    fn test_rgb_depth_empty_takes_other() {
        let mut acc = RgbDepth::default();
        let mut layer = RgbDepth::new(1, 1);
        layer.depth = vec![2.0];
        acc.add(&layer).unwrap();
        assert_eq!(acc, layer);
    }

    #[test]
    fn test_rgb_depth_size_mismatch() {
        let mut a = RgbDepth::new(2, 2);
        assert!(matches!(
            a.add(&RgbDepth::new(3, 2)),
            Err(TeleopError::Render(_))
        ));
    }

    #[test]
    fn test_plot_keeps_nearer_sample() {
        let mut image = RgbDepth::new(2, 2);
        image.plot(1, 0, 0.5, [1.0, 0.0, 0.0]);
        image.plot(1, 0, 0.8, [0.0, 1.0, 0.0]);
        image.plot(5, 5, 0.1, [0.0, 0.0, 1.0]);
        assert_eq!(image.rgb[1], [1.0, 0.0, 0.0]);
        assert_eq!(image.depth[1], 0.5);
        assert_eq!(image.depth.iter().filter(|d| d.is_finite()).count(), 1);
    }

    #[test]
    fn test_fill_triangle_covers_pixel_centres() {
        let mut image = RgbDepth::new(4, 4);
        let corners = [
            Point3::new(0.0, 0.0, 1.0),
            Point3::new(4.0, 0.0, 1.0),
            Point3::new(0.0, 4.0, 1.0),
        ];
        image.fill_triangle(&corners, [1.0, 1.0, 1.0]);

        // Centres on or below the hypotenuse col + row = 3
        for row in 0..4 {
            for col in 0..4 {
                let covered = image.depth[row * 4 + col].is_finite();
                assert_eq!(covered, col + row <= 3, "pixel ({}, {})", col, row);
            }
        }
    }

    #[test]
    fn test_fill_triangle_winding_and_depth() {
        let mut image = RgbDepth::new(4, 4);
        let clockwise = [
            Point3::new(0.0, 0.0, 2.0),
            Point3::new(0.0, 4.0, 2.0),
            Point3::new(4.0, 0.0, 2.0),
        ];
        image.fill_triangle(&clockwise, [0.0, 1.0, 0.0]);
        assert_eq!(image.depth[0], 2.0);

        let nearer = [
            Point3::new(0.0, 0.0, 1.0),
            Point3::new(4.0, 0.0, 1.0),
            Point3::new(0.0, 4.0, 1.0),
        ];
        image.fill_triangle(&nearer, [1.0, 0.0, 0.0]);
        assert_eq!(image.rgb[0], [1.0, 0.0, 0.0]);
        assert_eq!(image.depth[0], 1.0);
    }

    #[test]
    fn test_fill_triangle_degenerate_and_clipped() {
        let mut image = RgbDepth::new(4, 4);
        let line = [
            Point3::new(0.0, 0.0, 1.0),
            Point3::new(2.0, 2.0, 1.0),
            Point3::new(4.0, 4.0, 1.0),
        ];
        image.fill_triangle(&line, [1.0; 3]);
        assert!(image.depth.iter().all(|d| d.is_infinite()));

        let off_image = [
            Point3::new(-10.0, -10.0, 1.0),
            Point3::new(15.0, -10.0, 1.0),
            Point3::new(-10.0, 15.0, 1.0),
        ];
        image.fill_triangle(&off_image, [1.0; 3]);
        assert!(image.depth[0].is_finite());
        assert!(image.depth[15].is_infinite());
    }

    // ==================== Camera Tests ====================

    #[test]
    fn test_intrinsics_from_fov() {
        let k = intrinsic_matrix_from_fov(640, 480, std::f64::consts::FRAC_PI_2);
        assert!((k[(0, 0)] - 240.0).abs() < 1e-9);
        assert!((k[(1, 1)] - 240.0).abs() < 1e-9);
        assert_eq!(k[(0, 2)], 319.5);
        assert_eq!(k[(1, 2)], 239.5);
        assert_eq!(k[(2, 2)], 1.0);
        assert_eq!(k[(1, 0)], 0.0);
    }

    #[test]
    fn test_pose_normalizes_quaternion() {
        let pose = [1.0, 2.0, 3.0, 2.0, 0.0, 0.0, 0.0];
        let iso = pose_to_isometry(&pose).unwrap();
        assert_eq!(iso.translation.vector, Vector3::new(1.0, 2.0, 3.0));
        assert!(close(iso.rotation.angle(), 0.0));
    }

    #[test]
    fn test_pose_rotation() {
        let half = FRAC_PI_2 / 2.0;
        let pose = [0.0, 0.0, 0.0, half.cos(), 0.0, half.sin(), 0.0];
        let iso = pose_to_isometry(&pose).unwrap();
        let p = iso * Point3::new(1.0, 0.0, 0.0);
        assert!(close(p.x, 0.0));
        assert!(close(p.z, -1.0));
    }

    #[test]
    fn test_pose_zero_quaternion_rejected() {
        let pose = [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        assert!(matches!(pose_to_isometry(&pose), Err(TeleopError::Render(_))));
    }
}
