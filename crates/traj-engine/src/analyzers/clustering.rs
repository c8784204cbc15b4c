use traj_core::error::{TrajError, TrajResult};
use traj_core::frame::Frame;
use traj_core::interner::TypeMap;
use traj_core::spatial_hash::SpatialHash;

use crate::analyzer::{AnalysisOutput, Analyzer, AnalyzerBase, AnalyzerKind, ClusteringOutput};

/// Disjoint-set forest with path halving and union by size.
pub(crate) struct UnionFind {
    parent: Vec<usize>,
    size: Vec<usize>,
}

impl UnionFind {
    pub(crate) fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            size: vec![1; n],
        }
    }

    pub(crate) fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    pub(crate) fn union(&mut self, a: usize, b: usize) {
        let mut ra = self.find(a);
        let mut rb = self.find(b);
        if ra == rb {
            return;
        }
        if self.size[ra] < self.size[rb] {
            std::mem::swap(&mut ra, &mut rb);
        }
        self.parent[rb] = ra;
        self.size[ra] += self.size[rb];
    }

    /// Number of sets and the size of the largest.
    pub(crate) fn summary(&mut self) -> (usize, usize) {
        let mut n_sets = 0;
        let mut largest = 0;
        for i in 0..self.parent.len() {
            if self.find(i) == i {
                n_sets += 1;
                largest = largest.max(self.size[i]);
            }
        }
        (n_sets, largest)
    }
}

/// Per-frame cluster count and largest cluster size for a distance cutoff.
pub struct Clustering {
    base: AnalyzerBase,
    cutoff: f64,
    frames: Vec<usize>,
    n_clusters: Vec<usize>,
    max_size: Vec<usize>,
}

impl Clustering {
    pub fn new(name: Option<String>) -> Self {
        Self {
            base: AnalyzerBase::new(name, "clustering.dat"),
            cutoff: 1.0,
            frames: Vec::new(),
            n_clusters: Vec::new(),
            max_size: Vec::new(),
        }
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.base.set_file_name(file_name);
        self
    }

    pub fn with_cutoff(mut self, cutoff: f64) -> TrajResult<Self> {
        self.set_cutoff(cutoff)?;
        Ok(self)
    }

    pub fn set_cutoff(&mut self, cutoff: f64) -> TrajResult<()> {
        if !(cutoff > 0.0) || !cutoff.is_finite() {
            return Err(TrajError::Invalid(format!(
                "cluster cutoff must be positive, got {cutoff}"
            )));
        }
        self.cutoff = cutoff;
        Ok(())
    }

    pub fn cutoff(&self) -> f64 {
        self.cutoff
    }
}

impl Analyzer for Clustering {
    fn base(&self) -> &AnalyzerBase {
        &self.base
    }

    fn kind(&self) -> AnalyzerKind {
        AnalyzerKind::Clustering
    }

    fn init(&mut self) -> TrajResult<()> {
        self.frames.clear();
        self.n_clusters.clear();
        self.max_size.clear();
        Ok(())
    }

    fn process_frame(&mut self, frame: &Frame, _types: &TypeMap) -> TrajResult<()> {
        let positions = frame.positions()?;
        let hash = SpatialHash::build(positions, frame.box_, self.cutoff);
        let mut sets = UnionFind::new(positions.len());
        hash.for_each_pair(positions, |i, j, _| sets.union(i, j));
        let (n_clusters, max_size) = sets.summary();
        self.frames.push(frame.index);
        self.n_clusters.push(n_clusters);
        self.max_size.push(max_size);
        Ok(())
    }

    fn finalize(&mut self, _types: &TypeMap) -> TrajResult<AnalysisOutput> {
        Ok(AnalysisOutput::Clustering(ClusteringOutput {
            frames: std::mem::take(&mut self.frames),
            n_clusters: std::mem::take(&mut self.n_clusters),
            max_size: std::mem::take(&mut self.max_size),
        }))
    }
}
