use crate::error::{TrajError, TrajResult};
use crate::geom::Vec3;
use crate::pbc::TriclinicBox;

/// One timestep of particle data as produced by a reader.
///
/// Every per-particle field is optional because formats differ in what they
/// store; when present it holds exactly `n_atoms` entries.
#[derive(Debug, Clone, Default)]
pub struct Frame {
    pub index: usize,
    pub time: f64,
    pub n_atoms: usize,
    pub box_: Option<TriclinicBox>,
    pub names: Option<Vec<String>>,
    pub types: Option<Vec<u32>>,
    pub positions: Option<Vec<Vec3>>,
    pub velocities: Option<Vec<Vec3>>,
    pub images: Option<Vec<[i32; 3]>>,
    pub masses: Option<Vec<f64>>,
    pub diameters: Option<Vec<f64>>,
}

impl Frame {
    pub fn new(n_atoms: usize, time: f64) -> Self {
        Self {
            n_atoms,
            time,
            ..Self::default()
        }
    }

    pub fn with_box(mut self, box_: TriclinicBox) -> Self {
        self.box_ = Some(box_);
        self
    }

    pub fn with_positions(mut self, positions: Vec<Vec3>) -> Self {
        self.positions = Some(positions);
        self
    }

    pub fn with_velocities(mut self, velocities: Vec<Vec3>) -> Self {
        self.velocities = Some(velocities);
        self
    }

    pub fn with_names(mut self, names: Vec<String>) -> Self {
        self.names = Some(names);
        self
    }

    pub fn with_images(mut self, images: Vec<[i32; 3]>) -> Self {
        self.images = Some(images);
        self
    }

    pub fn with_masses(mut self, masses: Vec<f64>) -> Self {
        self.masses = Some(masses);
        self
    }

    pub fn positions(&self) -> TrajResult<&[Vec3]> {
        self.positions
            .as_deref()
            .ok_or_else(|| TrajError::Invalid(format!("frame {} has no positions", self.index)))
    }

    pub fn velocities(&self) -> TrajResult<&[Vec3]> {
        self.velocities
            .as_deref()
            .ok_or_else(|| TrajError::Invalid(format!("frame {} has no velocities", self.index)))
    }

    pub fn box_required(&self) -> TrajResult<TriclinicBox> {
        self.box_
            .ok_or_else(|| TrajError::Invalid(format!("frame {} has no simulation box", self.index)))
    }

    /// Positions with periodic images folded back in.
    pub fn unwrapped_positions(&self) -> TrajResult<Vec<Vec3>> {
        let pos = self.positions()?;
        let images = self.images.as_deref().ok_or_else(|| {
            TrajError::Invalid(format!(
                "frame {} has no image flags to unwrap positions",
                self.index
            ))
        })?;
        let box_ = self.box_required()?;
        Ok(pos
            .iter()
            .zip(images)
            .map(|(&p, &img)| box_.unwrap(p, img))
            .collect())
    }

    /// Check that every populated per-particle field has `n_atoms` entries.
    pub fn validate(&self) -> TrajResult<()> {
        let n = self.n_atoms;
        let check = |field: &str, len: Option<usize>| -> TrajResult<()> {
            match len {
                Some(len) if len != n => Err(TrajError::Mismatch(format!(
                    "frame {}: {field} has {len} entries, expected {n}",
                    self.index
                ))),
                _ => Ok(()),
            }
        };
        check("names", self.names.as_ref().map(Vec::len))?;
        check("types", self.types.as_ref().map(Vec::len))?;
        check("positions", self.positions.as_ref().map(Vec::len))?;
        check("velocities", self.velocities.as_ref().map(Vec::len))?;
        check("images", self.images.as_ref().map(Vec::len))?;
        check("masses", self.masses.as_ref().map(Vec::len))?;
        check("diameters", self.diameters.as_ref().map(Vec::len))?;
        Ok(())
    }
}
