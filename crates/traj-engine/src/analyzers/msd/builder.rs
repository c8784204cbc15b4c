use traj_core::error::TrajResult;

use crate::analyzer::AnalyzerBase;
use crate::correlators::{LagAccumulator, OriginBuffer};
use crate::filter::TypeFilter;

use super::{CorrelationParams, MeanSquaredDisplacement, UnwrapPolicy};

impl MeanSquaredDisplacement {
    pub fn new(name: Option<String>) -> Self {
        let params = CorrelationParams::default();
        Self {
            base: AnalyzerBase::new(name, "msd"),
            filter: TypeFilter::new(),
            params,
            unwrap: UnwrapPolicy::default(),
            selected: None,
            origins: OriginBuffer::new(params.stride, params.max_lag),
            acc: LagAccumulator::default(),
            times: Vec::new(),
        }
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.base.set_file_name(file_name);
        self
    }

    /// Every `stride`-th frame starts a new time origin.
    pub fn with_stride(mut self, stride: usize) -> TrajResult<Self> {
        self.params = self.params.with_stride(stride)?;
        Ok(self)
    }

    pub fn with_max_lag(mut self, max_lag: usize) -> Self {
        self.params = self.params.with_max_lag(max_lag);
        self
    }

    pub fn with_unwrap(mut self, unwrap: UnwrapPolicy) -> Self {
        self.unwrap = unwrap;
        self
    }

    pub fn with_types<S: AsRef<str>>(mut self, names: &[S]) -> Self {
        self.filter.add_types(names);
        self
    }

    pub fn filter(&self) -> &TypeFilter {
        &self.filter
    }

    pub fn filter_mut(&mut self) -> &mut TypeFilter {
        &mut self.filter
    }

    pub fn stride(&self) -> usize {
        self.params.stride
    }

    pub fn unwrap_policy(&self) -> UnwrapPolicy {
        self.unwrap
    }
}
