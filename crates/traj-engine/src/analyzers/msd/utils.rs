use traj_core::error::{TrajError, TrajResult};

use crate::correlators::SelectedParticles;
use crate::filter::TypeFilter;

/// Origin spacing and lag cap shared by the time-correlation analyzers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CorrelationParams {
    pub(crate) stride: usize,
    pub(crate) max_lag: Option<usize>,
}

impl Default for CorrelationParams {
    fn default() -> Self {
        Self {
            stride: 1,
            max_lag: None,
        }
    }
}

impl CorrelationParams {
    pub(crate) fn with_stride(mut self, stride: usize) -> TrajResult<Self> {
        if stride == 0 {
            return Err(TrajError::Invalid("origin stride must be at least 1".into()));
        }
        self.stride = stride;
        Ok(self)
    }

    pub(crate) fn with_max_lag(mut self, max_lag: usize) -> Self {
        self.max_lag = Some(max_lag);
        self
    }
}

/// At least one type must be selected before a correlation pass.
pub(crate) fn check_selection(filter: &TypeFilter, who: &str) -> TrajResult<()> {
    if filter.is_empty() {
        return Err(TrajError::Invalid(format!(
            "{who} needs at least one particle type selected"
        )));
    }
    Ok(())
}

pub(crate) fn warn_empty_columns(selected: &SelectedParticles, filter: &TypeFilter, who: &str) {
    for (name, &count) in filter.names().iter().zip(&selected.per_column) {
        if count == 0 {
            log::warn!("{who}: no particles of type '{name}'");
        }
    }
}
