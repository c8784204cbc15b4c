use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use traj_core::error::{TrajError, TrajResult};
use traj_core::pbc::TriclinicBox;
use traj_io::FormatSpec;

use crate::analyzer::Analyzer;
use crate::analyzers::{
    Clustering, DensityProfile, MeanSquaredDisplacement, RadialDistribution, TemperatureProfile,
    UnwrapPolicy, VelocityAutocorrelation,
};
use crate::trajectory::Trajectory;

/// One analysis run read from a JSON or YAML file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub reader: FormatSpec,
    pub files: Vec<PathBuf>,
    #[serde(rename = "box", default)]
    pub box_: Option<BoxSpec>,
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    #[serde(default)]
    pub analyzers: Vec<AnalyzerConfig>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BoxSpec {
    pub size: [f64; 3],
    #[serde(default)]
    pub tilt: [f64; 3],
}

impl BoxSpec {
    pub fn to_box(&self) -> TrajResult<TriclinicBox> {
        let [lx, ly, lz] = self.size;
        let [xy, xz, yz] = self.tilt;
        TriclinicBox::new(lx, ly, lz, xy, xz, yz)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalyzerConfig {
    Density {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        file_name: Option<String>,
        bins: [usize; 3],
        #[serde(default = "default_true")]
        mass_weighted: bool,
        #[serde(default)]
        types: Vec<String>,
    },
    Temperature {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        file_name: Option<String>,
        bins: [usize; 3],
        #[serde(default)]
        types: Vec<String>,
    },
    Clustering {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        file_name: Option<String>,
        #[serde(default = "default_cutoff")]
        cutoff: f64,
    },
    Msd {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        file_name: Option<String>,
        #[serde(default = "default_stride")]
        stride: usize,
        #[serde(default)]
        max_lag: Option<usize>,
        #[serde(default)]
        unwrap: UnwrapPolicy,
        #[serde(default)]
        types: Vec<String>,
    },
    Rdf {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        file_name: Option<String>,
        #[serde(default = "default_bin_size")]
        bin_size: f64,
        #[serde(default)]
        max_radius: f64,
        #[serde(default = "default_stride")]
        stride: usize,
    },
    Vacf {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        file_name: Option<String>,
        #[serde(default = "default_stride")]
        stride: usize,
        #[serde(default)]
        max_lag: Option<usize>,
        #[serde(default)]
        types: Vec<String>,
    },
}

fn default_cutoff() -> f64 {
    1.0
}

fn default_stride() -> usize {
    1
}

fn default_bin_size() -> f64 {
    1.0
}

fn default_true() -> bool {
    true
}

impl AnalyzerConfig {
    pub fn build(&self) -> TrajResult<Box<dyn Analyzer>> {
        let analyzer: Box<dyn Analyzer> = match self {
            Self::Density {
                name,
                file_name,
                bins,
                mass_weighted,
                types,
            } => {
                let mut a = DensityProfile::new(name.clone(), *bins).with_mass_weighted(*mass_weighted);
                if let Some(file_name) = file_name {
                    a = a.with_file_name(file_name.as_str());
                }
                a.filter_mut().add_types(types.as_slice());
                Box::new(a)
            }
            Self::Temperature {
                name,
                file_name,
                bins,
                types,
            } => {
                let mut a = TemperatureProfile::new(name.clone(), *bins);
                if let Some(file_name) = file_name {
                    a = a.with_file_name(file_name.as_str());
                }
                a.filter_mut().add_types(types.as_slice());
                Box::new(a)
            }
            Self::Clustering {
                name,
                file_name,
                cutoff,
            } => {
                let mut a = Clustering::new(name.clone()).with_cutoff(*cutoff)?;
                if let Some(file_name) = file_name {
                    a = a.with_file_name(file_name.as_str());
                }
                Box::new(a)
            }
            Self::Msd {
                name,
                file_name,
                stride,
                max_lag,
                unwrap,
                types,
            } => {
                let mut a = MeanSquaredDisplacement::new(name.clone())
                    .with_stride(*stride)?
                    .with_unwrap(*unwrap)
                    .with_types(types.as_slice());
                if let Some(max_lag) = max_lag {
                    a = a.with_max_lag(*max_lag);
                }
                if let Some(file_name) = file_name {
                    a = a.with_file_name(file_name.as_str());
                }
                Box::new(a)
            }
            Self::Rdf {
                name,
                file_name,
                bin_size,
                max_radius,
                stride,
            } => {
                let mut a = RadialDistribution::new(name.clone(), *bin_size, *max_radius)?
                    .with_stride(*stride)?;
                if let Some(file_name) = file_name {
                    a = a.with_file_name(file_name.as_str());
                }
                Box::new(a)
            }
            Self::Vacf {
                name,
                file_name,
                stride,
                max_lag,
                types,
            } => {
                let mut a = VelocityAutocorrelation::new(name.clone())
                    .with_stride(*stride)?
                    .with_types(types.as_slice());
                if let Some(max_lag) = max_lag {
                    a = a.with_max_lag(*max_lag);
                }
                if let Some(file_name) = file_name {
                    a = a.with_file_name(file_name.as_str());
                }
                Box::new(a)
            }
        };
        Ok(analyzer)
    }
}

impl AnalysisConfig {
    pub fn from_path(path: &Path) -> TrajResult<Self> {
        let content = fs::read_to_string(path)?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_lowercase();
        let config: Self = if ext == "yaml" || ext == "yml" {
            serde_yaml::from_str(&content)
                .map_err(|e| TrajError::Parse(format!("yaml parse error: {e}")))?
        } else {
            serde_json::from_str(&content)
                .map_err(|e| TrajError::Parse(format!("json parse error: {e}")))?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> TrajResult<()> {
        if self.files.is_empty() {
            return Err(TrajError::Invalid("files list is empty".into()));
        }
        self.reader.validate()?;
        if let Some(box_) = &self.box_ {
            box_.to_box()?;
        }
        Ok(())
    }

    /// Open the reader and attach every analyzer in listed order.
    pub fn build(&self) -> TrajResult<Trajectory> {
        self.validate()?;
        let mut traj = Trajectory::new(self.reader.clone())?;
        traj.add(&self.files)?;
        if let Some(box_) = &self.box_ {
            traj.set_box(box_.to_box()?);
        }
        if let Some(dir) = &self.output_dir {
            traj.set_output_dir(dir.clone());
        }
        for analyzer in &self.analyzers {
            traj.attach_boxed(analyzer.build()?)?;
        }
        Ok(traj)
    }
}
