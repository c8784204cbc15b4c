use serde::Serialize;
use traj_core::error::TrajResult;
use traj_core::frame::Frame;
use traj_core::interner::TypeMap;
use traj_core::naming::analyzer_names;

/// Name and output stub shared by every analyzer.
#[derive(Debug, Clone)]
pub struct AnalyzerBase {
    name: String,
    file_name: String,
}

impl AnalyzerBase {
    /// Analyzers without an explicit name draw one from the process-wide counter.
    pub fn new(name: Option<String>, file_name: impl Into<String>) -> Self {
        let name = name.unwrap_or_else(|| analyzer_names().next_name());
        Self {
            name,
            file_name: file_name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn set_file_name(&mut self, file_name: impl Into<String>) {
        self.file_name = file_name.into();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalyzerKind {
    Density,
    Temperature,
    Clustering,
    Msd,
    Rdf,
    Vacf,
}

impl AnalyzerKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AnalyzerKind::Density => "density",
            AnalyzerKind::Temperature => "temperature",
            AnalyzerKind::Clustering => "clustering",
            AnalyzerKind::Msd => "msd",
            AnalyzerKind::Rdf => "rdf",
            AnalyzerKind::Vacf => "vacf",
        }
    }
}

/// A statistic accumulated over one streaming pass.
///
/// The driver calls `init` once before the first frame, `process_frame` for
/// every frame in order, then `finalize` once. Frames reaching an analyzer
/// already carry interned type ids and any trajectory-level fallbacks.
pub trait Analyzer {
    fn base(&self) -> &AnalyzerBase;

    fn kind(&self) -> AnalyzerKind;

    fn name(&self) -> &str {
        self.base().name()
    }

    fn file_name(&self) -> &str {
        self.base().file_name()
    }

    fn init(&mut self) -> TrajResult<()>;

    fn process_frame(&mut self, frame: &Frame, types: &TypeMap) -> TrajResult<()>;

    fn finalize(&mut self, types: &TypeMap) -> TrajResult<AnalysisOutput>;
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalysisOutput {
    Profile(ProfileOutput),
    Clustering(ClusteringOutput),
    Correlation(CorrelationOutput),
    Rdf(RdfOutput),
}

/// Values on an `nx × ny × nz` grid, one column per selected type (or a
/// single `average` column).
#[derive(Debug, Clone, Serialize)]
pub struct ProfileOutput {
    pub bins: [usize; 3],
    /// Bin centres on the first frame's box, row-major with z fastest.
    pub centers: Vec<[f64; 3]>,
    pub columns: Vec<String>,
    /// `values[column][bin]`
    pub values: Vec<Vec<f64>>,
}

impl ProfileOutput {
    pub fn column(&self, name: &str) -> Option<&[f64]> {
        let idx = self.columns.iter().position(|c| c == name)?;
        Some(&self.values[idx])
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ClusteringOutput {
    pub frames: Vec<usize>,
    pub n_clusters: Vec<usize>,
    pub max_size: Vec<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TypeSeries {
    pub type_name: String,
    pub total: Vec<f64>,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub z: Vec<f64>,
}

/// Lag-resolved time correlation. `time[k]` is the elapsed time at lag `k`.
#[derive(Debug, Clone, Serialize)]
pub struct CorrelationOutput {
    pub time: Vec<f64>,
    pub series: Vec<TypeSeries>,
}

impl CorrelationOutput {
    pub fn series(&self, type_name: &str) -> Option<&TypeSeries> {
        self.series.iter().find(|s| s.type_name == type_name)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RdfOutput {
    pub r: Vec<f64>,
    pub g_r: Vec<f64>,
    pub counts: Vec<u64>,
}
