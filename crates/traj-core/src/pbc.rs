use crate::error::{TrajError, TrajResult};
use crate::geom::Vec3;

/// Periodic cell described by edge lengths and dimensionless tilt factors.
///
/// Edge vectors are `a1 = (Lx, 0, 0)`, `a2 = (xy*Ly, Ly, 0)` and
/// `a3 = (xz*Lz, yz*Lz, Lz)`. A zero length disables periodicity along that axis.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TriclinicBox {
    length: Vec3,
    tilt: Vec3,
}

impl TriclinicBox {
    pub fn new(lx: f64, ly: f64, lz: f64, xy: f64, xz: f64, yz: f64) -> TrajResult<Self> {
        let length = Vec3::new(lx, ly, lz);
        let tilt = Vec3::new(xy, xz, yz);
        if !length.is_finite() || lx < 0.0 || ly < 0.0 || lz < 0.0 {
            return Err(TrajError::Invalid(format!(
                "box lengths must be finite and non-negative, got ({lx}, {ly}, {lz})"
            )));
        }
        if !tilt.is_finite() {
            return Err(TrajError::Invalid(format!(
                "box tilt factors must be finite, got ({xy}, {xz}, {yz})"
            )));
        }
        Ok(Self { length, tilt })
    }

    pub fn orthorhombic(lx: f64, ly: f64, lz: f64) -> TrajResult<Self> {
        Self::new(lx, ly, lz, 0.0, 0.0, 0.0)
    }

    /// Reduce three arbitrary edge vectors to lengths and tilts.
    pub fn from_vectors(v1: Vec3, v2: Vec3, v3: Vec3) -> TrajResult<Self> {
        let lx = v1.norm();
        if lx == 0.0 {
            return Self::orthorhombic(0.0, v2.norm(), v3.norm());
        }
        let a2x = v1.dot(v2) / lx;
        let ly = (v2.norm_sq() - a2x * a2x).max(0.0).sqrt();
        let xy = if ly > 0.0 { a2x / ly } else { 0.0 };

        let normal = v1.cross(v2);
        let normal_len = normal.norm();
        let lz = if normal_len > 0.0 {
            v3.dot(normal) / normal_len
        } else {
            v3.norm()
        };
        let a3x = v1.dot(v3) / lx;
        let xz = if lz != 0.0 { a3x / lz } else { 0.0 };
        let yz = if ly > 0.0 && lz != 0.0 {
            (v2.dot(v3) - a2x * a3x) / (ly * lz)
        } else {
            0.0
        };
        Self::new(lx, ly, lz, xy, xz, yz)
    }

    /// Crystallographic cell parameters, angles in degrees.
    pub fn from_lattice(a: f64, b: f64, c: f64, alpha: f64, beta: f64, gamma: f64) -> TrajResult<Self> {
        if a < 0.0 || b < 0.0 || c < 0.0 {
            return Err(TrajError::Invalid(format!(
                "lattice lengths must be non-negative, got ({a}, {b}, {c})"
            )));
        }
        let (cos_a, cos_b, cos_g) = (
            alpha.to_radians().cos(),
            beta.to_radians().cos(),
            gamma.to_radians().cos(),
        );
        let lx = a;
        let xy_abs = b * cos_g;
        let xz_abs = c * cos_b;
        let ly = (b * b - xy_abs * xy_abs).max(0.0).sqrt();
        let yz_abs = if ly > 0.0 {
            (b * c * cos_a - xy_abs * xz_abs) / ly
        } else {
            0.0
        };
        let lz = (c * c - xz_abs * xz_abs - yz_abs * yz_abs).max(0.0).sqrt();
        let xy = if ly > 0.0 { xy_abs / ly } else { 0.0 };
        let (xz, yz) = if lz > 0.0 {
            (xz_abs / lz, yz_abs / lz)
        } else {
            (0.0, 0.0)
        };
        Self::new(lx, ly, lz, xy, xz, yz)
    }

    pub fn length(&self) -> Vec3 {
        self.length
    }

    /// Tilt factors packed as `(xy, xz, yz)`.
    pub fn tilt(&self) -> Vec3 {
        self.tilt
    }

    pub fn is_orthorhombic(&self) -> bool {
        self.tilt == Vec3::ZERO
    }

    pub fn volume(&self) -> f64 {
        self.length.x * self.length.y * self.length.z
    }

    pub fn vectors(&self) -> [Vec3; 3] {
        let l = self.length;
        let t = self.tilt;
        [
            Vec3::new(l.x, 0.0, 0.0),
            Vec3::new(t.x * l.y, l.y, 0.0),
            Vec3::new(t.y * l.z, t.z * l.z, l.z),
        ]
    }

    /// Shortest equivalent displacement, reducing z, then y, then x.
    pub fn min_image(&self, d: Vec3) -> Vec3 {
        let l = self.length;
        let (xy, xz, yz) = (self.tilt.x, self.tilt.y, self.tilt.z);
        let mut out = d;
        if l.z > 0.0 {
            let img = (out.z / l.z).round();
            out.x -= img * xz * l.z;
            out.y -= img * yz * l.z;
            out.z -= img * l.z;
        }
        if l.y > 0.0 {
            let img = (out.y / l.y).round();
            out.x -= img * xy * l.y;
            out.y -= img * l.y;
        }
        if l.x > 0.0 {
            let img = (out.x / l.x).round();
            out.x -= img * l.x;
        }
        out
    }

    pub fn unwrap(&self, pos: Vec3, image: [i32; 3]) -> Vec3 {
        let l = self.length;
        let (xy, xz, yz) = (self.tilt.x, self.tilt.y, self.tilt.z);
        let (ix, iy, iz) = (image[0] as f64, image[1] as f64, image[2] as f64);
        Vec3::new(
            pos.x + ix * l.x + xy * iy * l.y + xz * iz * l.z,
            pos.y + iy * l.y + yz * iz * l.z,
            pos.z + iz * l.z,
        )
    }

    /// Wrap each coordinate into `[0, L)` of the orthogonal extents.
    pub fn wrap_orthogonal(&self, pos: Vec3) -> Vec3 {
        let wrap = |x: f64, len: f64| {
            if len > 0.0 {
                x - (x / len).floor() * len
            } else {
                x
            }
        };
        Vec3::new(
            wrap(pos.x, self.length.x),
            wrap(pos.y, self.length.y),
            wrap(pos.z, self.length.z),
        )
    }

    /// Fractional coordinates relative to the cell origin.
    pub fn fractional(&self, pos: Vec3) -> Vec3 {
        let l = self.length;
        let (xy, xz, yz) = (self.tilt.x, self.tilt.y, self.tilt.z);
        let fz = if l.z > 0.0 { pos.z / l.z } else { 0.0 };
        let y = pos.y - yz * l.z * fz;
        let fy = if l.y > 0.0 { y / l.y } else { 0.0 };
        let x = pos.x - xz * l.z * fz - xy * l.y * fy;
        let fx = if l.x > 0.0 { x / l.x } else { 0.0 };
        Vec3::new(fx, fy, fz)
    }

    /// Distances between opposite faces of the cell.
    pub fn nearest_plane_distances(&self) -> Vec3 {
        let l = self.length;
        let (xy, xz, yz) = (self.tilt.x, self.tilt.y, self.tilt.z);
        let off = xy * yz - xz;
        Vec3::new(
            l.x / (1.0 + xy * xy + off * off).sqrt(),
            l.y / (1.0 + yz * yz).sqrt(),
            l.z,
        )
    }
}
