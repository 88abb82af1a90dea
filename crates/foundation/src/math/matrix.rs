use super::Vec3;

/// Column-major 4x4 matrix (column-vector convention, `p' = M * p`).
///
/// The `then_*` builders append an operation that is applied *after* the
/// ones already in the matrix, so a chain reads in the order a vertex sees
/// the transforms.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Mat4 {
    cols: [[f64; 4]; 4],
}

impl Default for Mat4 {
    fn default() -> Self {
        Self::identity()
    }
}

impl Mat4 {
    pub const fn identity() -> Self {
        Self {
            cols: [
                [1.0, 0.0, 0.0, 0.0],
                [0.0, 1.0, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ],
        }
    }

    pub fn translation(v: Vec3) -> Self {
        let mut m = Self::identity();
        m.cols[3] = [v.x, v.y, v.z, 1.0];
        m
    }

    pub fn scaling(v: Vec3) -> Self {
        let mut m = Self::identity();
        m.cols[0][0] = v.x;
        m.cols[1][1] = v.y;
        m.cols[2][2] = v.z;
        m
    }

    /// Counter-clockwise rotation about +Z.
    pub fn rotation_z(angle_deg: f64) -> Self {
        let (s, c) = angle_deg.to_radians().sin_cos();
        let mut m = Self::identity();
        m.cols[0][0] = c;
        m.cols[0][1] = s;
        m.cols[1][0] = -s;
        m.cols[1][1] = c;
        m
    }

    pub fn then_translate(self, v: Vec3) -> Self {
        Self::translation(v) * self
    }

    pub fn then_scale(self, v: Vec3) -> Self {
        Self::scaling(v) * self
    }

    pub fn then_rotate_z(self, angle_deg: f64) -> Self {
        Self::rotation_z(angle_deg) * self
    }

    pub fn transform_point(&self, p: Vec3) -> Vec3 {
        let v = [p.x, p.y, p.z, 1.0];
        let mut out = [0.0; 4];
        for (r, slot) in out.iter_mut().enumerate() {
            *slot = (0..4).map(|c| self.cols[c][r] * v[c]).sum();
        }
        Vec3::new(out[0], out[1], out[2])
    }

    pub fn to_cols_array(&self) -> [f64; 16] {
        let mut out = [0.0; 16];
        for c in 0..4 {
            out[c * 4..c * 4 + 4].copy_from_slice(&self.cols[c]);
        }
        out
    }

    /// GPU upload layout (column-major `f32`).
    pub fn to_cols_array_f32(&self) -> [f32; 16] {
        self.to_cols_array().map(|v| v as f32)
    }
}

impl std::ops::Mul for Mat4 {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self::Output {
        let mut cols = [[0.0; 4]; 4];
        for (c, col) in cols.iter_mut().enumerate() {
            for (r, slot) in col.iter_mut().enumerate() {
                *slot = (0..4).map(|k| self.cols[k][r] * rhs.cols[c][k]).sum();
            }
        }
        Self { cols }
    }
}
