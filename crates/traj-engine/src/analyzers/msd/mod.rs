mod accumulate;
mod builder;
mod execute;
mod utils;

use serde::{Deserialize, Serialize};

use crate::analyzer::AnalyzerBase;
use crate::correlators::{LagAccumulator, OriginBuffer, SelectedParticles};
use crate::filter::TypeFilter;

pub(crate) use accumulate::{dot_components, squared_displacement};
pub(crate) use utils::{check_selection, warn_empty_columns, CorrelationParams};

/// How MSD recovers continuous trajectories from stored positions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnwrapPolicy {
    /// Add image flags times the box edge vectors; frames without images fail.
    #[default]
    Images,
    /// Positions are already unwrapped.
    Stored,
}

/// Mean-squared displacement per selected type.
pub struct MeanSquaredDisplacement {
    base: AnalyzerBase,
    filter: TypeFilter,
    params: CorrelationParams,
    unwrap: UnwrapPolicy,
    selected: Option<SelectedParticles>,
    origins: OriginBuffer,
    acc: LagAccumulator,
    times: Vec<f64>,
}
