use traj_core::error::{TrajError, TrajResult};
use traj_core::frame::Frame;
use traj_core::geom::Vec3;
use traj_core::interner::TypeMap;
use traj_core::pbc::TriclinicBox;

use crate::analyzer::{AnalysisOutput, Analyzer, AnalyzerBase, AnalyzerKind, ProfileOutput};
use crate::filter::TypeFilter;

/// Orthogonal binning grid over the box extents. An axis requested with
/// zero bins collapses to a single bin.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ProfileGrid {
    bins: [usize; 3],
}

impl ProfileGrid {
    pub(crate) fn new(bins: [usize; 3]) -> Self {
        Self {
            bins: bins.map(|n| n.max(1)),
        }
    }

    pub(crate) fn bins(&self) -> [usize; 3] {
        self.bins
    }

    pub(crate) fn len(&self) -> usize {
        self.bins[0] * self.bins[1] * self.bins[2]
    }

    pub(crate) fn checked_box(frame: &Frame, who: &str) -> TrajResult<TriclinicBox> {
        let box_ = frame.box_required()?;
        let l = box_.length();
        if l.x <= 0.0 || l.y <= 0.0 || l.z <= 0.0 {
            return Err(TrajError::Invalid(format!(
                "{who} needs a box with positive lengths, frame {} has ({}, {}, {})",
                frame.index, l.x, l.y, l.z
            )));
        }
        Ok(box_)
    }

    /// Flat bin index, z fastest.
    pub(crate) fn bin_of(&self, box_: &TriclinicBox, pos: Vec3) -> usize {
        let l = box_.length();
        let w = box_.wrap_orthogonal(pos);
        let axis = |x: f64, len: f64, n: usize| ((x / len * n as f64).floor() as usize).min(n - 1);
        let ix = axis(w.x, l.x, self.bins[0]);
        let iy = axis(w.y, l.y, self.bins[1]);
        let iz = axis(w.z, l.z, self.bins[2]);
        (ix * self.bins[1] + iy) * self.bins[2] + iz
    }

    pub(crate) fn bin_volume(&self, box_: &TriclinicBox) -> f64 {
        let l = box_.length();
        l.x * l.y * l.z / self.len() as f64
    }

    pub(crate) fn centers(&self, lengths: Vec3) -> Vec<[f64; 3]> {
        let [nx, ny, nz] = self.bins;
        let mut out = Vec::with_capacity(self.len());
        for ix in 0..nx {
            for iy in 0..ny {
                for iz in 0..nz {
                    out.push([
                        (ix as f64 + 0.5) * lengths.x / nx as f64,
                        (iy as f64 + 0.5) * lengths.y / ny as f64,
                        (iz as f64 + 0.5) * lengths.z / nz as f64,
                    ]);
                }
            }
        }
        out
    }
}

/// Number or mass density on a grid, averaged over frames.
pub struct DensityProfile {
    base: AnalyzerBase,
    filter: TypeFilter,
    grid: ProfileGrid,
    mass_weighted: bool,
    sums: Vec<Vec<f64>>,
    first_lengths: Option<Vec3>,
    n_frames: usize,
}

impl DensityProfile {
    pub fn new(name: Option<String>, bins: [usize; 3]) -> Self {
        Self {
            base: AnalyzerBase::new(name, "density"),
            filter: TypeFilter::new(),
            grid: ProfileGrid::new(bins),
            mass_weighted: true,
            sums: Vec::new(),
            first_lengths: None,
            n_frames: 0,
        }
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.base.set_file_name(file_name);
        self
    }

    /// Without masses on the frame, mass weighting degrades to counting.
    pub fn with_mass_weighted(mut self, mass_weighted: bool) -> Self {
        self.mass_weighted = mass_weighted;
        self
    }

    pub fn filter(&self) -> &TypeFilter {
        &self.filter
    }

    pub fn filter_mut(&mut self) -> &mut TypeFilter {
        &mut self.filter
    }

    pub fn bins(&self) -> [usize; 3] {
        self.grid.bins()
    }
}

impl Analyzer for DensityProfile {
    fn base(&self) -> &AnalyzerBase {
        &self.base
    }

    fn kind(&self) -> AnalyzerKind {
        AnalyzerKind::Density
    }

    fn init(&mut self) -> TrajResult<()> {
        let n_columns = self.filter.column_names().len();
        self.sums = vec![vec![0.0; self.grid.len()]; n_columns];
        self.first_lengths = None;
        self.n_frames = 0;
        Ok(())
    }

    fn process_frame(&mut self, frame: &Frame, types: &TypeMap) -> TrajResult<()> {
        let box_ = ProfileGrid::checked_box(frame, "density profile")?;
        let positions = frame.positions()?;
        let columns = self.filter.columns_for(frame, types)?;
        let masses = if self.mass_weighted {
            frame.masses.as_deref()
        } else {
            None
        };
        let inv_volume = 1.0 / self.grid.bin_volume(&box_);
        for (i, (&pos, col)) in positions.iter().zip(&columns).enumerate() {
            let Some(col) = *col else {
                continue;
            };
            let weight = masses.map_or(1.0, |m| m[i]);
            let bin = self.grid.bin_of(&box_, pos);
            self.sums[col][bin] += weight * inv_volume;
        }
        self.first_lengths.get_or_insert(box_.length());
        self.n_frames += 1;
        Ok(())
    }

    fn finalize(&mut self, _types: &TypeMap) -> TrajResult<AnalysisOutput> {
        let norm = if self.n_frames > 0 {
            1.0 / self.n_frames as f64
        } else {
            0.0
        };
        let values = self
            .sums
            .iter()
            .map(|col| col.iter().map(|v| v * norm).collect())
            .collect();
        Ok(AnalysisOutput::Profile(ProfileOutput {
            bins: self.grid.bins(),
            centers: self.grid.centers(self.first_lengths.unwrap_or_default()),
            columns: self.filter.column_names(),
            values,
        }))
    }
}

/// Kinetic temperature `Σ m v² / (3 (n - 1))` per bin.
///
/// Each frame's bin temperature is weighted by the bin's particle count when
/// averaging over frames. Bins that never hold two or more particles report 0.
pub struct TemperatureProfile {
    base: AnalyzerBase,
    filter: TypeFilter,
    grid: ProfileGrid,
    weighted_sum: Vec<Vec<f64>>,
    weight: Vec<Vec<f64>>,
    frame_ke: Vec<Vec<f64>>,
    frame_count: Vec<Vec<usize>>,
    first_lengths: Option<Vec3>,
}

impl TemperatureProfile {
    pub fn new(name: Option<String>, bins: [usize; 3]) -> Self {
        Self {
            base: AnalyzerBase::new(name, "temperature"),
            filter: TypeFilter::new(),
            grid: ProfileGrid::new(bins),
            weighted_sum: Vec::new(),
            weight: Vec::new(),
            frame_ke: Vec::new(),
            frame_count: Vec::new(),
            first_lengths: None,
        }
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.base.set_file_name(file_name);
        self
    }

    pub fn filter(&self) -> &TypeFilter {
        &self.filter
    }

    pub fn filter_mut(&mut self) -> &mut TypeFilter {
        &mut self.filter
    }

    pub fn bins(&self) -> [usize; 3] {
        self.grid.bins()
    }
}

impl Analyzer for TemperatureProfile {
    fn base(&self) -> &AnalyzerBase {
        &self.base
    }

    fn kind(&self) -> AnalyzerKind {
        AnalyzerKind::Temperature
    }

    fn init(&mut self) -> TrajResult<()> {
        let n_columns = self.filter.column_names().len();
        let n_bins = self.grid.len();
        self.weighted_sum = vec![vec![0.0; n_bins]; n_columns];
        self.weight = vec![vec![0.0; n_bins]; n_columns];
        self.frame_ke = vec![vec![0.0; n_bins]; n_columns];
        self.frame_count = vec![vec![0; n_bins]; n_columns];
        self.first_lengths = None;
        Ok(())
    }

    fn process_frame(&mut self, frame: &Frame, types: &TypeMap) -> TrajResult<()> {
        let box_ = ProfileGrid::checked_box(frame, "temperature profile")?;
        let positions = frame.positions()?;
        let velocities = frame.velocities()?;
        let masses = frame.masses.as_deref().ok_or_else(|| {
            TrajError::Invalid(format!(
                "temperature profile needs particle masses, frame {} has none",
                frame.index
            ))
        })?;
        let columns = self.filter.columns_for(frame, types)?;

        for (ke, count) in self.frame_ke.iter_mut().zip(self.frame_count.iter_mut()) {
            ke.fill(0.0);
            count.fill(0);
        }
        for i in 0..positions.len() {
            let Some(col) = columns[i] else {
                continue;
            };
            let bin = self.grid.bin_of(&box_, positions[i]);
            self.frame_ke[col][bin] += masses[i] * velocities[i].norm_sq();
            self.frame_count[col][bin] += 1;
        }
        for col in 0..self.frame_ke.len() {
            for bin in 0..self.grid.len() {
                let n = self.frame_count[col][bin];
                if n > 1 {
                    let t = self.frame_ke[col][bin] / (3.0 * (n as f64 - 1.0));
                    self.weighted_sum[col][bin] += n as f64 * t;
                    self.weight[col][bin] += n as f64;
                }
            }
        }
        self.first_lengths.get_or_insert(box_.length());
        Ok(())
    }

    fn finalize(&mut self, _types: &TypeMap) -> TrajResult<AnalysisOutput> {
        let mut empty = 0usize;
        let values = self
            .weighted_sum
            .iter()
            .zip(&self.weight)
            .map(|(sums, weights)| {
                sums.iter()
                    .zip(weights)
                    .map(|(s, w)| {
                        if *w > 0.0 {
                            s / w
                        } else {
                            empty += 1;
                            0.0
                        }
                    })
                    .collect()
            })
            .collect();
        if empty > 0 {
            log::warn!(
                "temperature profile '{}': {empty} bin(s) never held two particles, reported as 0",
                self.base.name()
            );
        }
        Ok(AnalysisOutput::Profile(ProfileOutput {
            bins: self.grid.bins(),
            centers: self.grid.centers(self.first_lengths.unwrap_or_default()),
            columns: self.filter.column_names(),
            values,
        }))
    }
}
