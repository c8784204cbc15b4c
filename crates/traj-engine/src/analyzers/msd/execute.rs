use traj_core::error::TrajResult;
use traj_core::frame::Frame;
use traj_core::interner::TypeMap;

use crate::analyzer::{AnalysisOutput, Analyzer, AnalyzerBase, AnalyzerKind};
use crate::correlators::{correlation_output, LagAccumulator, OriginBuffer, SelectedParticles};

use super::accumulate::squared_displacement;
use super::utils::{check_selection, warn_empty_columns};
use super::{MeanSquaredDisplacement, UnwrapPolicy};

impl Analyzer for MeanSquaredDisplacement {
    fn base(&self) -> &AnalyzerBase {
        &self.base
    }

    fn kind(&self) -> AnalyzerKind {
        AnalyzerKind::Msd
    }

    fn init(&mut self) -> TrajResult<()> {
        check_selection(&self.filter, "mean-squared displacement")?;
        self.selected = None;
        self.origins = OriginBuffer::new(self.params.stride, self.params.max_lag);
        self.acc = LagAccumulator::new(self.filter.len());
        self.times.clear();
        Ok(())
    }

    fn process_frame(&mut self, frame: &Frame, types: &TypeMap) -> TrajResult<()> {
        let positions = match self.unwrap {
            UnwrapPolicy::Images => frame.unwrapped_positions()?,
            UnwrapPolicy::Stored => frame.positions()?.to_vec(),
        };
        if self.selected.is_none() {
            let columns = self.filter.columns_for(frame, types)?;
            let selected = SelectedParticles::from_columns(&columns, self.filter.len());
            warn_empty_columns(&selected, &self.filter, "mean-squared displacement");
            self.selected = Some(selected);
        }
        let Some(selected) = self.selected.as_ref() else {
            return Ok(());
        };
        let sample = selected.gather(&positions);
        let acc = &mut self.acc;
        self.origins.push(sample, |lag, origin, now| {
            acc.add(lag, selected, origin, now, squared_displacement);
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
