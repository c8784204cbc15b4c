use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use traj_core::error::{TrajError, TrajResult};
use traj_core::frame::Frame;
use traj_core::geom::Vec3;
use traj_core::pbc::TriclinicBox;

use crate::format::{default_dt, default_precision, default_time_step, open_text_reader, TrajFormat};

/// Tags accepted for the file that supplies particle names, masses and
/// diameters to a coordinate-only stream.
pub const TOPOLOGY_TAGS: [&str; 9] = [
    "HOOMDXML", "XML", "xml", "GRO", "gro", "PDB", "pdb", "XYZ", "xyz",
];

/// Particle data taken from the first frame of a topology file.
#[derive(Debug, Clone)]
pub struct Topology {
    pub n_atoms: usize,
    pub time: f64,
    pub positions: Option<Vec<Vec3>>,
    pub velocities: Option<Vec<Vec3>>,
    pub images: Option<Vec<[i32; 3]>>,
    pub names: Option<Vec<String>>,
    pub masses: Option<Vec<f64>>,
    pub diameters: Option<Vec<f64>>,
    pub box_: Option<TriclinicBox>,
}

impl Topology {
    pub fn from_frame(frame: Frame) -> Self {
        Self {
            n_atoms: frame.n_atoms,
            time: frame.time,
            positions: frame.positions,
            velocities: frame.velocities,
            images: frame.images,
            names: frame.names,
            masses: frame.masses,
            diameters: frame.diameters,
            box_: frame.box_,
        }
    }

    pub fn check_atoms(&self, n_atoms: usize, source: &str) -> TrajResult<()> {
        if n_atoms != self.n_atoms {
            return Err(TrajError::Mismatch(format!(
                "{source} holds {n_atoms} atoms but the topology has {}",
                self.n_atoms
            )));
        }
        Ok(())
    }

    /// The topology snapshot itself as a trajectory frame.
    pub fn initial_frame(&self, index: usize) -> Frame {
        let mut frame = Frame::new(self.n_atoms, self.time);
        frame.index = index;
        frame.positions = self.positions.clone();
        frame.velocities = self.velocities.clone();
        frame.images = self.images.clone();
        self.decorate(&mut frame);
        frame
    }

    /// Copy the per-particle data onto a frame read from a coordinate stream.
    pub fn decorate(&self, frame: &mut Frame) {
        if frame.names.is_none() {
            frame.names = self.names.clone();
        }
        if frame.masses.is_none() {
            frame.masses = self.masses.clone();
        }
        if frame.diameters.is_none() {
            frame.diameters = self.diameters.clone();
        }
        if frame.box_.is_none() {
            frame.box_ = self.box_;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologySpec {
    pub path: PathBuf,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default = "default_precision")]
    pub precision: usize,
    #[serde(default = "default_time_step")]
    pub time_step: f64,
    #[serde(default = "default_dt")]
    pub dt: f64,
}

impl TopologySpec {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            format: None,
            precision: default_precision(),
            time_step: default_time_step(),
            dt: default_dt(),
        }
    }

    pub fn with_format(mut self, tag: impl Into<String>) -> Self {
        self.format = Some(tag.into());
        self
    }

    /// Explicit tag first, then a `.`-separated component of the file name.
    pub fn resolve_format(&self) -> TrajResult<TrajFormat> {
        if let Some(tag) = self.format.as_deref() {
            return topology_format(tag).ok_or_else(|| unknown_type(tag));
        }
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        infer_from_name(&file_name).ok_or_else(|| unknown_type(&file_name))
    }

    pub fn load(&self) -> TrajResult<Topology> {
        let format = self.resolve_format()?;
        log::debug!(
            "loading topology {} as {}",
            self.path.display(),
            format.name()
        );
        let mut reader = open_text_reader(
            format,
            &self.path,
            self.precision,
            self.time_step,
            self.dt,
            0,
        )?;
        let frame = reader.next_frame()?.ok_or_else(|| {
            TrajError::Parse(format!("{}: topology file has no frame", self.path.display()))
        })?;
        Ok(Topology::from_frame(frame))
    }
}

fn topology_format(tag: &str) -> Option<TrajFormat> {
    match tag.to_ascii_lowercase().as_str() {
        "hoomdxml" | "xml" => Some(TrajFormat::HoomdXml),
        "gro" => Some(TrajFormat::Gro),
        "pdb" => Some(TrajFormat::Pdb),
        "xyz" => Some(TrajFormat::Xyz),
        _ => None,
    }
}

fn infer_from_name(file_name: &str) -> Option<TrajFormat> {
    file_name.split('.').skip(1).find_map(topology_format)
}

fn unknown_type(name: &str) -> TrajError {
    TrajError::Invalid(format!(
        "the file type '{name}' does not exist. Maybe you meant one of these: {}",
        TOPOLOGY_TAGS.join(", ")
    ))
}
