use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use traj_core::error::{TrajError, TrajResult};

use crate::dcd::DcdReader;
use crate::gro::GroReader;
use crate::hoomd_xml::HoomdXmlReader;
use crate::pdb::PdbReader;
use crate::topology::{Topology, TopologySpec};
use crate::trr::TrrReader;
use crate::xtc::XtcReader;
use crate::xyz::XyzReader;
use crate::FrameReader;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrajFormat {
    HoomdXml,
    Gro,
    Xyz,
    Pdb,
    Dcd,
    Xtc,
    Trr,
}

impl TrajFormat {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.to_ascii_lowercase().as_str() {
            "hoomdxml" | "hoomd_xml" | "xml" => Some(Self::HoomdXml),
            "gro" => Some(Self::Gro),
            "xyz" => Some(Self::Xyz),
            "pdb" => Some(Self::Pdb),
            "dcd" => Some(Self::Dcd),
            "xtc" => Some(Self::Xtc),
            "trr" => Some(Self::Trr),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_tag)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::HoomdXml => "HOOMD-XML",
            Self::Gro => "GRO",
            Self::Xyz => "XYZ",
            Self::Pdb => "PDB",
            Self::Dcd => "DCD",
            Self::Xtc => "XTC",
            Self::Trr => "TRR",
        }
    }

    pub fn supports_multi_frame_file(self) -> bool {
        !matches!(self, Self::HoomdXml)
    }

    /// Coordinate-only formats that take particle data from a topology file.
    pub fn needs_topology(self) -> bool {
        matches!(self, Self::Dcd | Self::Xtc | Self::Trr)
    }
}

pub(crate) fn default_dt() -> f64 {
    1.0
}

pub(crate) fn default_precision() -> usize {
    3
}

pub(crate) fn default_time_step() -> f64 {
    1.0
}

/// Reader choice plus its construction parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "format", rename_all = "snake_case")]
pub enum FormatSpec {
    HoomdXml {
        #[serde(default = "default_dt")]
        dt: f64,
    },
    Gro {
        #[serde(default = "default_precision")]
        precision: usize,
    },
    Xyz,
    Pdb {
        #[serde(default = "default_time_step")]
        time_step: f64,
    },
    Dcd {
        topology: TopologySpec,
        /// Below 0.001 the time step stored in the file header is used.
        #[serde(default)]
        time_step: f64,
        /// Zero means the save frequency stored in the file header.
        #[serde(default)]
        freq: u32,
    },
    Xtc {
        topology: TopologySpec,
    },
    Trr {
        topology: TopologySpec,
    },
}

impl FormatSpec {
    pub fn hoomd_xml(dt: f64) -> Self {
        Self::HoomdXml { dt }
    }

    pub fn gro(precision: usize) -> Self {
        Self::Gro { precision }
    }

    pub fn pdb(time_step: f64) -> Self {
        Self::Pdb { time_step }
    }

    pub fn dcd(topology: TopologySpec) -> Self {
        Self::Dcd {
            topology,
            time_step: 0.0,
            freq: 0,
        }
    }

    pub fn format(&self) -> TrajFormat {
        match self {
            Self::HoomdXml { .. } => TrajFormat::HoomdXml,
            Self::Gro { .. } => TrajFormat::Gro,
            Self::Xyz => TrajFormat::Xyz,
            Self::Pdb { .. } => TrajFormat::Pdb,
            Self::Dcd { .. } => TrajFormat::Dcd,
            Self::Xtc { .. } => TrajFormat::Xtc,
            Self::Trr { .. } => TrajFormat::Trr,
        }
    }

    pub fn topology(&self) -> Option<&TopologySpec> {
        match self {
            Self::Dcd { topology, .. } | Self::Xtc { topology } | Self::Trr { topology } => {
                Some(topology)
            }
            _ => None,
        }
    }

    pub fn validate(&self) -> TrajResult<()> {
        match self {
            Self::HoomdXml { dt } => {
                if !(*dt > 0.0) {
                    return Err(TrajError::Invalid(format!(
                        "HOOMD-XML time step must be positive, got {dt}"
                    )));
                }
            }
            Self::Gro { precision } => check_precision(*precision)?,
            Self::Pdb { time_step } => {
                if !(*time_step > 0.0) {
                    return Err(TrajError::Invalid(format!(
                        "PDB time step must be positive, got {time_step}"
                    )));
                }
            }
            Self::Dcd { time_step, .. } => {
                if !time_step.is_finite() || *time_step < 0.0 {
                    return Err(TrajError::Invalid(format!(
                        "DCD time step must be non-negative, got {time_step}"
                    )));
                }
            }
            Self::Xyz | Self::Xtc { .. } | Self::Trr { .. } => {}
        }
        if let Some(topology) = self.topology() {
            topology.resolve_format()?;
            check_precision(topology.precision)?;
        }
        Ok(())
    }
}

fn check_precision(precision: usize) -> TrajResult<()> {
    if precision == 0 {
        return Err(TrajError::Invalid("GRO precision must be at least 1".into()));
    }
    Ok(())
}

pub(crate) fn open_text_reader(
    format: TrajFormat,
    path: &Path,
    precision: usize,
    time_step: f64,
    dt: f64,
    first_index: usize,
) -> TrajResult<Box<dyn FrameReader>> {
    Ok(match format {
        TrajFormat::HoomdXml => Box::new(HoomdXmlReader::open(path, dt, first_index)?),
        TrajFormat::Gro => Box::new(GroReader::open(path, precision, first_index)?),
        TrajFormat::Xyz => Box::new(XyzReader::open(path, first_index)?),
        TrajFormat::Pdb => Box::new(PdbReader::open(path, time_step, first_index)?),
        other => {
            return Err(TrajError::Unsupported(format!(
                "{} is not a text format",
                other.name()
            )))
        }
    })
}

/// Validated format spec with its topology loaded, ready to open files.
pub struct ReaderFactory {
    spec: FormatSpec,
    topology: Option<Arc<Topology>>,
}

impl ReaderFactory {
    pub fn new(spec: FormatSpec) -> TrajResult<Self> {
        spec.validate()?;
        let topology = match spec.topology() {
            Some(top) => Some(Arc::new(top.load()?)),
            None => None,
        };
        Ok(Self { spec, topology })
    }

    pub fn spec(&self) -> &FormatSpec {
        &self.spec
    }

    pub fn topology(&self) -> Option<&Topology> {
        self.topology.as_deref()
    }

    /// Open one file; frames are numbered from `first_index`.
    pub fn open(&self, path: &Path, first_index: usize) -> TrajResult<Box<dyn FrameReader>> {
        let topology = || {
            self.topology
                .clone()
                .ok_or_else(|| TrajError::Invalid("coordinate format without topology".into()))
        };
        Ok(match &self.spec {
            FormatSpec::HoomdXml { dt } => {
                open_text_reader(TrajFormat::HoomdXml, path, 0, 0.0, *dt, first_index)?
            }
            FormatSpec::Gro { precision } => {
                open_text_reader(TrajFormat::Gro, path, *precision, 0.0, 0.0, first_index)?
            }
            FormatSpec::Xyz => open_text_reader(TrajFormat::Xyz, path, 0, 0.0, 0.0, first_index)?,
            FormatSpec::Pdb { time_step } => {
                open_text_reader(TrajFormat::Pdb, path, 0, *time_step, 0.0, first_index)?
            }
            FormatSpec::Dcd {
                time_step, freq, ..
            } => Box::new(DcdReader::open(path, topology()?, *time_step, *freq, first_index)?),
            FormatSpec::Xtc { .. } => Box::new(XtcReader::open(path, topology()?, first_index)?),
            FormatSpec::Trr { .. } => Box::new(TrrReader::open(path, topology()?, first_index)?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_and_extensions() {
        assert_eq!(TrajFormat::from_tag("HOOMDXML"), Some(TrajFormat::HoomdXml));
        assert_eq!(TrajFormat::from_tag("Trr"), Some(TrajFormat::Trr));
        assert_eq!(TrajFormat::from_tag("lammps"), None);
        assert_eq!(
            TrajFormat::from_path(Path::new("run/traj.xtc")),
            Some(TrajFormat::Xtc)
        );
        assert!(!TrajFormat::HoomdXml.supports_multi_frame_file());
        assert!(TrajFormat::Dcd.supports_multi_frame_file());
    }

    #[test]
    fn validation_rejects_bad_parameters() {
        assert!(FormatSpec::hoomd_xml(0.0).validate().unwrap_err().is_config());
        assert!(FormatSpec::gro(0).validate().unwrap_err().is_config());
        assert!(FormatSpec::pdb(-1.0).validate().unwrap_err().is_config());
        assert!(FormatSpec::hoomd_xml(0.005).validate().is_ok());
    }

    #[test]
    fn dcd_with_unknown_topology_type_fails() {
        let spec = FormatSpec::dcd(TopologySpec::new("frame.wrong_type.1"));
        assert!(spec.validate().unwrap_err().is_config());
        assert!(ReaderFactory::new(spec).err().map_or(false, |e| e.is_config()));
    }

    #[test]
    fn spec_from_json() {
        let spec: FormatSpec =
            serde_json::from_str(r#"{"format": "dcd", "topology": {"path": "init.xml"}}"#).unwrap();
        match spec {
            FormatSpec::Dcd {
                topology,
                time_step,
                freq,
            } => {
                assert_eq!(topology.precision, 3);
                assert_eq!(time_step, 0.0);
                assert_eq!(freq, 0);
            }
            other => panic!("unexpected spec {other:?}"),
        }
    }
}
