use std::f64::consts::PI;

use traj_core::error::{TrajError, TrajResult};
use traj_core::frame::Frame;
use traj_core::geom::Vec3;
use traj_core::interner::TypeMap;
use traj_core::pbc::TriclinicBox;
use traj_core::spatial_hash::SpatialHash;

use crate::analyzer::{AnalysisOutput, Analyzer, AnalyzerBase, AnalyzerKind, RdfOutput};

/// Pair radial distribution function `g(r)` over every `stride`-th frame.
pub struct RadialDistribution {
    base: AnalyzerBase,
    stride: usize,
    bin_size: f64,
    max_radius: f64,
    radius: f64,
    counts: Vec<u64>,
    n_samples: usize,
    n_particles: usize,
    length_sum: Vec3,
    frames_seen: usize,
}

impl RadialDistribution {
    /// `max_radius` of 0 picks the largest radius the first sampled box allows.
    pub fn new(name: Option<String>, bin_size: f64, max_radius: f64) -> TrajResult<Self> {
        if !(bin_size > 0.0) || !bin_size.is_finite() {
            return Err(TrajError::Invalid(format!(
                "rdf bin size must be positive, got {bin_size}"
            )));
        }
        if !(max_radius >= 0.0) || !max_radius.is_finite() {
            return Err(TrajError::Invalid(format!(
                "rdf maximum radius must be non-negative, got {max_radius}"
            )));
        }
        Ok(Self {
            base: AnalyzerBase::new(name, "rdf.dat"),
            stride: 1,
            bin_size,
            max_radius,
            radius: 0.0,
            counts: Vec::new(),
            n_samples: 0,
            n_particles: 0,
            length_sum: Vec3::ZERO,
            frames_seen: 0,
        })
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.base.set_file_name(file_name);
        self
    }

    pub fn with_stride(mut self, stride: usize) -> TrajResult<Self> {
        if stride == 0 {
            return Err(TrajError::Invalid("rdf origin stride must be at least 1".into()));
        }
        self.stride = stride;
        Ok(self)
    }

    pub fn bin_size(&self) -> f64 {
        self.bin_size
    }

    pub fn max_radius(&self) -> f64 {
        self.max_radius
    }

    fn periodic_limit(box_: &TriclinicBox) -> f64 {
        let plane = box_.nearest_plane_distances();
        plane.x.min(plane.y).min(plane.z)
    }

    fn start(&mut self, box_: &TriclinicBox, frame: &Frame) -> TrajResult<()> {
        let limit = Self::periodic_limit(box_);
        self.radius = if self.max_radius > 0.0 {
            self.max_radius
        } else {
            0.5 * limit
        };
        if !(self.radius > 0.0) {
            return Err(TrajError::Invalid(format!(
                "rdf needs a box with positive extent, frame {} has none",
                frame.index
            )));
        }
        let ratio = self.radius / self.bin_size;
        let n_bins = (ratio * (1.0 - 1e-12)).ceil().max(1.0) as usize;
        self.counts = vec![0; n_bins];
        Ok(())
    }
}

impl Analyzer for RadialDistribution {
    fn base(&self) -> &AnalyzerBase {
        &self.base
    }

    fn kind(&self) -> AnalyzerKind {
        AnalyzerKind::Rdf
    }

    fn init(&mut self) -> TrajResult<()> {
        self.radius = 0.0;
        self.counts.clear();
        self.n_samples = 0;
        self.n_particles = 0;
        self.length_sum = Vec3::ZERO;
        self.frames_seen = 0;
        Ok(())
    }

    fn process_frame(&mut self, frame: &Frame, _types: &TypeMap) -> TrajResult<()> {
        let sample = self.frames_seen % self.stride == 0;
        self.frames_seen += 1;
        if !sample {
            return Ok(());
        }
        let box_ = frame.box_required()?;
        if self.n_samples == 0 {
            self.start(&box_, frame)?;
        }
        let limit = Self::periodic_limit(&box_);
        if 2.0 * self.radius > limit {
            return Err(TrajError::Invalid(format!(
                "rdf maximum radius {} exceeds the periodic bound of frame {}: twice the radius must not exceed {limit}",
                self.radius, frame.index
            )));
        }

        let positions = frame.positions()?;
        let hash = SpatialHash::build(positions, Some(box_), self.radius);
        let inv_bin = 1.0 / self.bin_size;
        let counts = &mut self.counts;
        hash.for_each_pair(positions, |_, _, d| {
            let bin = (d.norm() * inv_bin) as usize;
            if let Some(c) = counts.get_mut(bin) {
                *c += 2;
            }
        });
        self.n_particles = positions.len();
        let length = box_.length();
        self.length_sum = Vec3::new(
            self.length_sum.x + length.x,
            self.length_sum.y + length.y,
            self.length_sum.z + length.z,
        );
        self.n_samples += 1;
        Ok(())
    }

    fn finalize(&mut self, _types: &TypeMap) -> TrajResult<AnalysisOutput> {
        let n_bins = self.counts.len();
        let mut r = Vec::with_capacity(n_bins);
        let mut g_r = Vec::with_capacity(n_bins);
        let n = self.n_particles as f64;
        // volume of the box with averaged edge lengths
        let samples = self.n_samples.max(1) as f64;
        let mean_volume =
            (self.length_sum.x / samples) * (self.length_sum.y / samples) * (self.length_sum.z / samples);
        let density = if mean_volume > 0.0 { n / mean_volume } else { 0.0 };
        for (bin, &count) in self.counts.iter().enumerate() {
            let r_lo = bin as f64 * self.bin_size;
            let r_hi = r_lo + self.bin_size;
            r.push(r_lo + 0.5 * self.bin_size);
            let ideal = 4.0 / 3.0 * PI * density * (r_hi.powi(3) - r_lo.powi(3));
            let norm = self.n_samples as f64 * ideal * n;
            g_r.push(if norm > 0.0 { count as f64 / norm } else { 0.0 });
        }
        Ok(AnalysisOutput::Rdf(RdfOutput {
            r,
            g_r,
            counts: self.counts.clone(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair_frame(d: f64, l: f64) -> Frame {
        Frame::new(2, 0.0)
            .with_box(TriclinicBox::orthorhombic(l, l, l).unwrap())
            .with_positions(vec![Vec3::new(1.0, 1.0, 1.0), Vec3::new(1.0 + d, 1.0, 1.0)])
    }

    #[test]
    fn two_particles_fill_one_bin() {
        let types = TypeMap::new();
        let mut rdf = RadialDistribution::new(Some("g".into()), 0.5, 5.0).unwrap();
        rdf.init().unwrap();
        rdf.process_frame(&pair_frame(2.2, 1000.0), &types).unwrap();
        let AnalysisOutput::Rdf(out) = rdf.finalize(&types).unwrap() else {
            panic!("unexpected output");
        };
        assert_eq!(out.counts.len(), 10);
        for (bin, g) in out.g_r.iter().enumerate() {
            if bin == 4 {
                assert!(*g > 0.0);
            } else {
                assert_eq!(*g, 0.0);
            }
        }
        assert_eq!(out.counts[4], 2);
        assert!((out.r[4] - 2.25).abs() < 1e-12);
    }

    #[test]
    fn normalization_matches_ideal_shell() {
        let types = TypeMap::new();
        let mut rdf = RadialDistribution::new(Some("g2".into()), 1.0, 3.0).unwrap();
        rdf.init().unwrap();
        let l = 10.0;
        rdf.process_frame(&pair_frame(1.5, l), &types).unwrap();
        let AnalysisOutput::Rdf(out) = rdf.finalize(&types).unwrap() else {
            panic!("unexpected output");
        };
        let rho = 2.0 / (l * l * l);
        let ideal = 4.0 / 3.0 * PI * rho * (8.0 - 1.0);
        let expected = 2.0 / (ideal * 2.0);
        assert!((out.g_r[1] - expected).abs() < 1e-9);
    }

    #[test]
    fn radius_beyond_periodic_bound_fails_at_analysis() {
        let types = TypeMap::new();
        let mut rdf = RadialDistribution::new(Some("g3".into()), 0.1, 12.0).unwrap();
        rdf.init().unwrap();
        let err = rdf.process_frame(&pair_frame(1.0, 5.0), &types).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn default_radius_is_half_the_box() {
        let types = TypeMap::new();
        let mut rdf = RadialDistribution::new(Some("g4".into()), 1.0, 0.0).unwrap();
        rdf.init().unwrap();
        rdf.process_frame(&pair_frame(1.0, 8.0), &types).unwrap();
        let AnalysisOutput::Rdf(out) = rdf.finalize(&types).unwrap() else {
            panic!("unexpected output");
        };
        assert_eq!(out.counts.len(), 4);
        assert_eq!(out.counts[1], 2);
    }

    #[test]
    fn stride_skips_frames() {
        let types = TypeMap::new();
        let mut rdf = RadialDistribution::new(Some("g5".into()), 1.0, 3.0)
            .unwrap()
            .with_stride(2)
            .unwrap();
        rdf.init().unwrap();
        for _ in 0..3 {
            rdf.process_frame(&pair_frame(1.5, 10.0), &types).unwrap();
        }
        let AnalysisOutput::Rdf(out) = rdf.finalize(&types).unwrap() else {
            panic!("unexpected output");
        };
        assert_eq!(out.counts[1], 4);
    }

    #[test]
    fn bin_count_rounds_up_partial_shell() {
        let types = TypeMap::new();
        let mut rdf = RadialDistribution::new(Some("g6".into()), 1.0, 2.5).unwrap();
        rdf.init().unwrap();
        rdf.process_frame(&pair_frame(2.2, 10.0), &types).unwrap();
        let AnalysisOutput::Rdf(out) = rdf.finalize(&types).unwrap() else {
            panic!("unexpected output");
        };
        assert_eq!(out.counts.len(), 3);
        assert_eq!(out.counts[2], 2);
    }

    #[test]
    fn ideal_gas_outer_shell_is_not_depressed() {
        let types = TypeMap::new();
        let l = 10.0;
        let n = 400;
        let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
        let mut uniform = move || {
            seed = seed
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            (seed >> 11) as f64 / (1u64 << 53) as f64 * l
        };
        let mut rdf = RadialDistribution::new(Some("gas".into()), 1.0, 0.0).unwrap();
        rdf.init().unwrap();
        for _ in 0..5 {
            let positions = (0..n).map(|_| Vec3::new(uniform(), uniform(), uniform())).collect();
            let frame = Frame::new(n, 0.0)
                .with_box(TriclinicBox::orthorhombic(l, l, l).unwrap())
                .with_positions(positions);
            rdf.process_frame(&frame, &types).unwrap();
        }
        let AnalysisOutput::Rdf(out) = rdf.finalize(&types).unwrap() else {
            panic!("unexpected output");
        };
        assert_eq!(out.counts.len(), 5);
        for (bin, g) in out.g_r.iter().enumerate().skip(1) {
            assert!((g - 1.0).abs() < 0.15, "bin {bin}: g = {g}");
        }
    }

    #[test]
    fn density_uses_mean_edge_lengths() {
        let types = TypeMap::new();
        let mut rdf = RadialDistribution::new(Some("g7".into()), 1.0, 2.0).unwrap();
        rdf.init().unwrap();
        let frame = |l: f64| {
            Frame::new(2, 0.0)
                .with_box(TriclinicBox::orthorhombic(l, l, 10.0).unwrap())
                .with_positions(vec![Vec3::new(1.0, 1.0, 1.0), Vec3::new(2.5, 1.0, 1.0)])
        };
        rdf.process_frame(&frame(8.0), &types).unwrap();
        rdf.process_frame(&frame(12.0), &types).unwrap();
        let AnalysisOutput::Rdf(out) = rdf.finalize(&types).unwrap() else {
            panic!("unexpected output");
        };
        // mean edges give 1000, the mean volume would be 1040
        let rho = 2.0 / 1000.0;
        let ideal = 4.0 / 3.0 * PI * rho * (8.0 - 1.0);
        let expected = 4.0 / (2.0 * ideal * 2.0);
        assert!((out.g_r[1] - expected).abs() < 1e-9);
    }

    #[test]
    fn rejects_bad_parameters() {
        assert!(RadialDistribution::new(None, 0.0, 1.0).err().unwrap().is_config());
        assert!(RadialDistribution::new(None, 1.0, -1.0).err().unwrap().is_config());
    }
}
