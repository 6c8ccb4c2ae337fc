// math.rs — World-space vectors and the world-to-screen projection.

use glam::{Mat4, Vec4};

use crate::error::MathError;

/// Points with a clip-space w at or below this are behind (or on) the camera plane.
pub const MIN_CLIP_W: f32 = 0.001;

/// A 3-component vector (x, y, z) matching the engine's float[3] layout.
/// Used for world-space positions (feet and head positions).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[repr(C)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance between two 3D points.
    pub fn distance(self, other: Self) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Same point raised by `dz` world units.
    pub fn raised(self, dz: f32) -> Self {
        Self { z: self.z + dz, ..self }
    }
}

/// Row-major 4x4 world-to-clip transform, read fresh every frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewMatrix(pub [f32; 16]);

impl ViewMatrix {
    pub const IDENTITY: Self = Self([
        1.0, 0.0, 0.0, 0.0, //
        0.0, 1.0, 0.0, 0.0, //
        0.0, 0.0, 1.0, 0.0, //
        0.0, 0.0, 0.0, 1.0,
    ]);

    pub fn from_slice(values: &[f32]) -> Result<Self, MathError> {
        let values: [f32; 16] = values.try_into().map_err(|_| {
            MathError::InvalidInput(format!("view matrix needs 16 values, got {}", values.len()))
        })?;
        Ok(Self(values))
    }

    /// Decode 64 little-endian bytes as written by the engine.
    pub fn from_le_bytes(bytes: &[u8; 64]) -> Self {
        let mut m = [0.0f32; 16];
        for (v, chunk) in m.iter_mut().zip(bytes.chunks_exact(4)) {
            *v = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        Self(m)
    }

    /// Clip-space coordinates (cx, cy, cz, cw) of a world point.
    pub fn transform(&self, p: Vec3) -> Vec4 {
        // glam stores columns; the engine's matrix is rows.
        Mat4::from_cols_array(&self.0).transpose() * Vec4::new(p.x, p.y, p.z, 1.0)
    }
}

/// Pixel position inside the overlay window. Y grows downward.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ScreenPoint {
    pub x: f32,
    pub y: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ViewportSize {
    pub height: u32,
    pub width: u32,
}

impl ViewportSize {
    pub const fn new(height: u32, width: u32) -> Self {
        Self { height, width }
    }

    fn half(self) -> (f32, f32) {
        (self.width as f32 / 2.0, self.height as f32 / 2.0)
    }
}

/// Project a world point to screen space.
///
/// Returns `None` when the point is behind or at the camera plane. Results
/// are not clamped to the viewport; see [`is_on_screen`].
pub fn project(matrix: &ViewMatrix, point: Vec3, viewport: ViewportSize) -> Option<ScreenPoint> {
    let clip = matrix.transform(point);
    // NaN w is treated as behind the camera.
    if clip.w.is_nan() || clip.w <= MIN_CLIP_W {
        return None;
    }
    Some(ndc_to_screen(clip.x / clip.w, clip.y / clip.w, viewport))
}

/// [`project`] over untyped input, as read from a loose source such as a
/// replay file. Fails only when a slice has the wrong length.
pub fn project_slices(
    matrix: &[f32],
    point: &[f32],
    viewport: &[u32],
) -> Result<Option<ScreenPoint>, MathError> {
    let matrix = ViewMatrix::from_slice(matrix)?;
    let &[x, y, z] = point else {
        return Err(MathError::InvalidInput(format!(
            "world point needs 3 values, got {}",
            point.len()
        )));
    };
    let &[height, width] = viewport else {
        return Err(MathError::InvalidInput(format!(
            "viewport needs (height, width), got {} values",
            viewport.len()
        )));
    };
    Ok(project(&matrix, Vec3::new(x, y, z), ViewportSize::new(height, width)))
}

/// Map NDC (-1..1, Y up) to pixels (top-left origin, Y down).
pub fn ndc_to_screen(ndc_x: f32, ndc_y: f32, viewport: ViewportSize) -> ScreenPoint {
    let (hw, hh) = viewport.half();
    ScreenPoint {
        x: hw + hw * ndc_x,
        y: hh - hh * ndc_y,
    }
}

/// Inverse of [`ndc_to_screen`].
pub fn screen_to_ndc(p: ScreenPoint, viewport: ViewportSize) -> (f32, f32) {
    let (hw, hh) = viewport.half();
    ((p.x - hw) / hw, (hh - p.y) / hh)
}

/// Whether a screen point lies inside the viewport (edges inclusive).
pub fn is_on_screen(p: ScreenPoint, viewport: ViewportSize) -> bool {
    (0.0..=viewport.width as f32).contains(&p.x) && (0.0..=viewport.height as f32).contains(&p.y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const FULL_HD: ViewportSize = ViewportSize::new(1080, 1920);

    /// Matrix whose clip-space w is the constant `w` for every point.
    fn constant_w(w: f32) -> ViewMatrix {
        let mut m = ViewMatrix::IDENTITY.0;
        m[15] = w;
        ViewMatrix(m)
    }

    /// Simple perspective: w = z, x and y scaled by `focal`.
    fn perspective(focal: f32) -> ViewMatrix {
        ViewMatrix([
            focal, 0.0, 0.0, 0.0, //
            0.0, focal, 0.0, 0.0, //
            0.0, 0.0, 1.0, 0.0, //
            0.0, 0.0, 1.0, 0.0,
        ])
    }

    #[test]
    fn origin_maps_to_viewport_center() {
        let p = project(&ViewMatrix::IDENTITY, Vec3::default(), FULL_HD).unwrap();
        assert_eq!(p, ScreenPoint { x: 960.0, y: 540.0 });

        // On the optical axis of a perspective camera.
        let p = project(&perspective(1.5), Vec3::new(0.0, 0.0, 10.0), FULL_HD).unwrap();
        assert_eq!(p, ScreenPoint { x: 960.0, y: 540.0 });
    }

    #[test]
    fn w_boundary_is_invalid() {
        assert!(project(&constant_w(MIN_CLIP_W), Vec3::default(), FULL_HD).is_none());
        assert!(project(&constant_w(0.0), Vec3::default(), FULL_HD).is_none());
        assert!(project(&constant_w(-5.0), Vec3::new(1.0, 2.0, 3.0), FULL_HD).is_none());
        assert!(project(&constant_w(0.002), Vec3::default(), FULL_HD).is_some());
    }

    #[test]
    fn nan_w_is_invalid() {
        assert!(project(&constant_w(f32::NAN), Vec3::default(), FULL_HD).is_none());
        let nan_point = Vec3::new(0.0, 0.0, f32::NAN);
        assert!(project(&perspective(1.0), nan_point, FULL_HD).is_none());
    }

    #[test]
    fn behind_perspective_camera_is_invalid() {
        assert!(project(&perspective(1.0), Vec3::new(0.0, 0.0, -1.0), FULL_HD).is_none());
    }

    #[test]
    fn y_is_inverted() {
        // NDC y = +0.5 lands in the upper half of the screen.
        let p = project(&ViewMatrix::IDENTITY, Vec3::new(0.0, 0.5, 0.0), FULL_HD).unwrap();
        assert_eq!(p.y, 270.0);
        assert_eq!(p.x, 960.0);
    }

    #[test]
    fn no_clamping_to_viewport() {
        let p = project(&ViewMatrix::IDENTITY, Vec3::new(3.0, -2.0, 0.0), FULL_HD).unwrap();
        assert_eq!(p, ScreenPoint { x: 3840.0, y: 1620.0 });
        assert!(!is_on_screen(p, FULL_HD));
        assert!(is_on_screen(ScreenPoint { x: 1920.0, y: 0.0 }, FULL_HD));
    }

    #[test]
    fn row_major_translation_is_honored() {
        // Translation lives in the last column of each row.
        let mut m = ViewMatrix::IDENTITY.0;
        m[3] = 0.5;
        let p = project(&ViewMatrix(m), Vec3::default(), FULL_HD).unwrap();
        assert_eq!(p.x, 960.0 + 480.0);
    }

    #[test]
    fn slices_are_shape_checked() {
        let m = ViewMatrix::IDENTITY.0;
        assert!(matches!(
            project_slices(&m[..15], &[0.0, 0.0, 0.0], &[1080, 1920]),
            Err(MathError::InvalidInput(_))
        ));
        assert!(project_slices(&m, &[0.0, 0.0], &[1080, 1920]).is_err());
        assert!(project_slices(&m, &[0.0, 0.0, 0.0], &[1080]).is_err());
        assert_eq!(
            project_slices(&m, &[0.0, 0.0, 0.0], &[1080, 1920]).unwrap(),
            Some(ScreenPoint { x: 960.0, y: 540.0 })
        );
    }

    #[test]
    fn matrix_decodes_from_little_endian() {
        let mut bytes = [0u8; 64];
        for (i, chunk) in bytes.chunks_exact_mut(4).enumerate() {
            chunk.copy_from_slice(&(i as f32).to_le_bytes());
        }
        let m = ViewMatrix::from_le_bytes(&bytes);
        assert_eq!(m.0[0], 0.0);
        assert_eq!(m.0[15], 15.0);
    }

    #[test]
    fn distance_and_raise() {
        let a = Vec3::new(0.0, 3.0, 0.0);
        assert_eq!(a.distance(Vec3::new(4.0, 0.0, 0.0)), 5.0);
        assert_eq!(a.raised(64.0), Vec3::new(0.0, 3.0, 64.0));
    }

    proptest! {
        #[test]
        fn non_positive_w_never_projects(
            w in -1000.0f32..=MIN_CLIP_W,
            x in -1e4f32..1e4, y in -1e4f32..1e4, z in -1e4f32..1e4,
        ) {
            prop_assert!(project(&constant_w(w), Vec3::new(x, y, z), FULL_HD).is_none());
        }

        #[test]
        fn doubling_viewport_doubles_output(
            nx in -1.0f32..=1.0, ny in -1.0f32..=1.0,
            h in 1u32..4000, w in 1u32..4000,
        ) {
            let p = Vec3::new(nx, ny, 0.0);
            let a = project(&ViewMatrix::IDENTITY, p, ViewportSize::new(h, w)).unwrap();
            let b = project(&ViewMatrix::IDENTITY, p, ViewportSize::new(h * 2, w * 2)).unwrap();
            prop_assert!((b.x - 2.0 * a.x).abs() <= 1e-2);
            prop_assert!((b.y - 2.0 * a.y).abs() <= 1e-2);
        }

        #[test]
        fn ndc_round_trips_through_screen(
            nx in -1.0f32..=1.0, ny in -1.0f32..=1.0,
            h in 1u32..4000, w in 1u32..4000,
        ) {
            let vp = ViewportSize::new(h, w);
            let (rx, ry) = screen_to_ndc(ndc_to_screen(nx, ny, vp), vp);
            prop_assert!((rx - nx).abs() <= 1e-4);
            prop_assert!((ry - ny).abs() <= 1e-4);
        }
    }
}
