use std::collections::VecDeque;

use traj_core::geom::Vec3;

/// Particles that take part in a correlation, each tagged with its output column.
#[derive(Debug, Clone, Default)]
pub(crate) struct SelectedParticles {
    pub(crate) indices: Vec<usize>,
    pub(crate) columns: Vec<usize>,
    pub(crate) per_column: Vec<usize>,
}

impl SelectedParticles {
    pub(crate) fn from_columns(columns: &[Option<usize>], n_columns: usize) -> Self {
        let mut out = Self {
            indices: Vec::new(),
            columns: Vec::new(),
            per_column: vec![0; n_columns],
        };
        for (i, col) in columns.iter().enumerate() {
            if let Some(col) = *col {
                out.indices.push(i);
                out.columns.push(col);
                out.per_column[col] += 1;
            }
        }
        out
    }

    pub(crate) fn gather(&self, values: &[Vec3]) -> Vec<Vec3> {
        self.indices.iter().map(|&i| values[i]).collect()
    }
}

/// Retained samples at time origins. Every `stride`-th sample becomes an
/// origin; with `max_lag` set, origins older than that are dropped.
#[derive(Debug)]
pub(crate) struct OriginBuffer {
    stride: usize,
    max_lag: Option<usize>,
    origins: VecDeque<(usize, Vec<Vec3>)>,
    next: usize,
}

impl OriginBuffer {
    pub(crate) fn new(stride: usize, max_lag: Option<usize>) -> Self {
        Self {
            stride: stride.max(1),
            max_lag,
            origins: VecDeque::new(),
            next: 0,
        }
    }

    /// Record `sample` and call `f(lag, origin, sample)` for every live origin,
    /// including the sample itself at lag 0 when it starts a new origin.
    pub(crate) fn push<F>(&mut self, sample: Vec<Vec3>, mut f: F)
    where
        F: FnMut(usize, &[Vec3], &[Vec3]),
    {
        let k = self.next;
        self.next += 1;
        if let Some(max_lag) = self.max_lag {
            while let Some((first, _)) = self.origins.front() {
                if k - first > max_lag {
                    self.origins.pop_front();
                } else {
                    break;
                }
            }
        }
        let is_origin = k % self.stride == 0;
        for (origin_k, origin) in &self.origins {
            f(k - origin_k, origin, &sample);
        }
        if is_origin {
            f(0, &sample, &sample);
            self.origins.push_back((k, sample));
        }
    }

    pub(crate) fn samples_seen(&self) -> usize {
        self.next
    }

    pub(crate) fn n_origins(&self) -> usize {
        self.origins.len()
    }
}

/// Per-lag, per-column sums of x, y and z components.
#[derive(Debug, Default)]
pub(crate) struct LagAccumulator {
    n_columns: usize,
    sums: Vec<[f64; 3]>,
    origins: Vec<u64>,
}

impl LagAccumulator {
    pub(crate) fn new(n_columns: usize) -> Self {
        Self {
            n_columns,
            sums: Vec::new(),
            origins: Vec::new(),
        }
    }

    fn ensure_lag(&mut self, lag: usize) {
        if self.origins.len() <= lag {
            self.origins.resize(lag + 1, 0);
            self.sums.resize((lag + 1) * self.n_columns, [0.0; 3]);
        }
    }

    /// Add one origin's contribution at `lag`; `term(a, b)` gives the
    /// per-axis product for a particle at the origin and now.
    pub(crate) fn add<T>(
        &mut self,
        lag: usize,
        selected: &SelectedParticles,
        origin: &[Vec3],
        current: &[Vec3],
        term: T,
    ) where
        T: Fn(Vec3, Vec3) -> [f64; 3],
    {
        self.ensure_lag(lag);
        self.origins[lag] += 1;
        let base = lag * self.n_columns;
        for ((&col, &a), &b) in selected.columns.iter().zip(origin).zip(current) {
            let t = term(a, b);
            let slot = &mut self.sums[base + col];
            slot[0] += t[0];
            slot[1] += t[1];
            slot[2] += t[2];
        }
    }

    pub(crate) fn n_lags(&self) -> usize {
        self.origins.len()
    }

    /// Average over origins and over the particles of `col`.
    pub(crate) fn mean(&self, lag: usize, col: usize, n_particles: usize) -> [f64; 3] {
        let norm = self.origins[lag] as f64 * n_particles as f64;
        if norm == 0.0 {
            return [0.0; 3];
        }
        let s = self.sums[lag * self.n_columns + col];
        [s[0] / norm, s[1] / norm, s[2] / norm]
    }
}
