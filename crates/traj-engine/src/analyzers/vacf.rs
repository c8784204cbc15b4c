use traj_core::error::TrajResult;
use traj_core::frame::Frame;
use traj_core::interner::TypeMap;

use crate::analyzer::{AnalysisOutput, Analyzer, AnalyzerBase, AnalyzerKind};
use crate::correlators::{correlation_output, LagAccumulator, OriginBuffer, SelectedParticles};
use crate::filter::TypeFilter;

use super::msd::{check_selection, dot_components, warn_empty_columns, CorrelationParams};

/// Velocity autocorrelation `⟨v(t0 + Δ) · v(t0)⟩` per selected type.
pub struct VelocityAutocorrelation {
    base: AnalyzerBase,
    filter: TypeFilter,
    params: CorrelationParams,
    selected: Option<SelectedParticles>,
    origins: OriginBuffer,
    acc: LagAccumulator,
    times: Vec<f64>,
}

impl VelocityAutocorrelation {
    pub fn new(name: Option<String>) -> Self {
        let params = CorrelationParams::default();
        Self {
            base: AnalyzerBase::new(name, "vacf"),
            filter: TypeFilter::new(),
            params,
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

    pub fn with_stride(mut self, stride: usize) -> TrajResult<Self> {
        self.params = self.params.with_stride(stride)?;
        Ok(self)
    }

    pub fn with_max_lag(mut self, max_lag: usize) -> Self {
        self.params = self.params.with_max_lag(max_lag);
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
}

impl Analyzer for VelocityAutocorrelation {
    fn base(&self) -> &AnalyzerBase {
        &self.base
    }

    fn kind(&self) -> AnalyzerKind {
        AnalyzerKind::Vacf
    }

    fn init(&mut self) -> TrajResult<()> {
        check_selection(&self.filter, "velocity autocorrelation")?;
        self.selected = None;
        self.origins = OriginBuffer::new(self.params.stride, self.params.max_lag);
        self.acc = LagAccumulator::new(self.filter.len());
        self.times.clear();
        Ok(())
    }

    fn process_frame(&mut self, frame: &Frame, types: &TypeMap) -> TrajResult<()> {
        let velocities = frame.velocities()?;
        if self.selected.is_none() {
            let columns = self.filter.columns_for(frame, types)?;
            let selected = SelectedParticles::from_columns(&columns, self.filter.len());
            warn_empty_columns(&selected, &self.filter, "velocity autocorrelation");
            self.selected = Some(selected);
        }
        let Some(selected) = self.selected.as_ref() else {
            return Ok(());
        };
        let sample = selected.gather(velocities);
        let acc = &mut self.acc;
        self.origins.push(sample, |lag, origin, now| {
            acc.add(lag, selected, origin, now, dot_components);
        });
        self.times.push(frame.time);
        Ok(())
    }

    fn finalize(&mut self, _types: &TypeMap) -> TrajResult<AnalysisOutput> {
        let selected = self.selected.take().unwrap_or_default();
        Ok(AnalysisOutput::Correlation(correlation_output(
            &self.acc,
            &selected,
            self.filter.names(),
            &self.times,
        )))
    }
}
