pub mod analyzer;
pub mod analyzers;
pub mod config;
mod correlators;
pub mod filter;
pub mod output;
pub mod trajectory;

pub use analyzer::{
    AnalysisOutput, Analyzer, AnalyzerBase, AnalyzerKind, ClusteringOutput, CorrelationOutput,
    ProfileOutput, RdfOutput, TypeSeries,
};
pub use analyzers::{
    Clustering, DensityProfile, MeanSquaredDisplacement, RadialDistribution, TemperatureProfile,
    UnwrapPolicy, VelocityAutocorrelation,
};
pub use config::{AnalysisConfig, AnalyzerConfig, BoxSpec};
pub use filter::TypeFilter;
pub use output::write_output;
pub use trajectory::{AnalysisResult, Trajectory};

#[cfg(test)]
mod tests;
