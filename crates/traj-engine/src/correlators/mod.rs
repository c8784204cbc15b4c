//! Streaming time-origin correlation shared by MSD and VACF.

mod origin;

pub(crate) use origin::{LagAccumulator, OriginBuffer, SelectedParticles};

use crate::analyzer::{CorrelationOutput, TypeSeries};

/// Lag-resolved series per column. `times[k]` is the time of the `k`-th
/// sample; lag times are measured from the first sample.
pub(crate) fn correlation_output(
    acc: &LagAccumulator,
    selected: &SelectedParticles,
    column_names: &[String],
    times: &[f64],
) -> CorrelationOutput {
    let n_lags = acc.n_lags();
    let t0 = times.first().copied().unwrap_or(0.0);
    let time = (0..n_lags)
        .map(|lag| times.get(lag).map_or(0.0, |t| t - t0))
        .collect();
    let series = column_names
        .iter()
        .enumerate()
        .map(|(col, name)| {
            let n_particles = selected.per_column.get(col).copied().unwrap_or(0);
            let mut s = TypeSeries {
                type_name: name.clone(),
                total: Vec::with_capacity(n_lags),
                x: Vec::with_capacity(n_lags),
                y: Vec::with_capacity(n_lags),
                z: Vec::with_capacity(n_lags),
            };
            for lag in 0..n_lags {
                let [x, y, z] = acc.mean(lag, col, n_particles);
                s.total.push(x + y + z);
                s.x.push(x);
                s.y.push(y);
                s.z.push(z);
            }
            s
        })
        .collect();
    CorrelationOutput { time, series }
}
