use fxhash::FxHashMap;

use crate::geom::Vec3;
use crate::pbc::TriclinicBox;

const NONE: usize = usize::MAX;

/// Cell list for pair searches within a cutoff.
///
/// With a fully periodic box the cell grid is laid out in fractional
/// coordinates and wraps; without a box cells tile open space. Grids too
/// small to separate neighbours fall back to an all-pairs scan.
pub struct SpatialHash {
    box_: Option<TriclinicBox>,
    cutoff: f64,
    dims: [i32; 3],
    periodic: bool,
    all_pairs: bool,
    map: FxHashMap<(i32, i32, i32), usize>,
    next: Vec<usize>,
    cells: Vec<(i32, i32, i32)>,
}

impl SpatialHash {
    pub fn build(positions: &[Vec3], box_: Option<TriclinicBox>, cutoff: f64) -> Self {
        let mut hash = Self {
            box_,
            cutoff,
            dims: [0; 3],
            periodic: false,
            all_pairs: !(cutoff > 0.0) || positions.len() < 2,
            map: FxHashMap::default(),
            next: vec![NONE; positions.len()],
            cells: Vec::with_capacity(positions.len()),
        };
        if hash.all_pairs {
            return hash;
        }
        match box_ {
            Some(b) => {
                let l = b.length();
                if l.x <= 0.0 || l.y <= 0.0 || l.z <= 0.0 {
                    hash.all_pairs = true;
                    return hash;
                }
                let plane = b.nearest_plane_distances();
                let dims = [
                    (plane.x / cutoff).floor() as i32,
                    (plane.y / cutoff).floor() as i32,
                    (plane.z / cutoff).floor() as i32,
                ];
                if dims.iter().any(|&d| d < 3) {
                    hash.all_pairs = true;
                    return hash;
                }
                hash.dims = dims;
                hash.periodic = true;
            }
            None => {}
        }
        for (idx, &p) in positions.iter().enumerate() {
            let key = hash.cell_of(p);
            let head = hash.map.entry(key).or_insert(NONE);
            hash.next[idx] = *head;
            *head = idx;
            hash.cells.push(key);
        }
        hash
    }

    pub fn is_all_pairs(&self) -> bool {
        self.all_pairs
    }

    fn cell_of(&self, p: Vec3) -> (i32, i32, i32) {
        match (self.periodic, self.box_) {
            (true, Some(b)) => {
                let f = b.fractional(p);
                let idx = |frac: f64, dim: i32| {
                    ((frac - frac.floor()) * dim as f64).floor() as i32 % dim
                };
                (
                    idx(f.x, self.dims[0]),
                    idx(f.y, self.dims[1]),
                    idx(f.z, self.dims[2]),
                )
            }
            _ => (
                (p.x / self.cutoff).floor() as i32,
                (p.y / self.cutoff).floor() as i32,
                (p.z / self.cutoff).floor() as i32,
            ),
        }
    }

    fn displacement(&self, a: Vec3, b: Vec3) -> Vec3 {
        let d = b.sub(a);
        match self.box_ {
            Some(bx) => bx.min_image(d),
            None => d,
        }
    }

    /// Visit every unordered pair `i < j` whose separation is within the
    /// cutoff, passing the minimum-image displacement from `i` to `j`.
    pub fn for_each_pair<F>(&self, positions: &[Vec3], mut f: F)
    where
        F: FnMut(usize, usize, Vec3),
    {
        let cutoff_sq = self.cutoff * self.cutoff;
        if self.all_pairs {
            for i in 0..positions.len() {
                for j in (i + 1)..positions.len() {
                    let d = self.displacement(positions[i], positions[j]);
                    if !(self.cutoff > 0.0) || d.norm_sq() <= cutoff_sq {
                        f(i, j, d);
                    }
                }
            }
            return;
        }
        for (i, &(cx, cy, cz)) in self.cells.iter().enumerate() {
            for dx in -1..=1 {
                for dy in -1..=1 {
                    for dz in -1..=1 {
                        let key = self.wrap_key((cx + dx, cy + dy, cz + dz));
                        let Some(&head) = self.map.get(&key) else {
                            continue;
                        };
                        let mut j = head;
                        while j != NONE {
                            if j > i {
                                let d = self.displacement(positions[i], positions[j]);
                                if d.norm_sq() <= cutoff_sq {
                                    f(i, j, d);
                                }
                            }
                            j = self.next[j];
                        }
                    }
                }
            }
        }
    }

    fn wrap_key(&self, key: (i32, i32, i32)) -> (i32, i32, i32) {
        if !self.periodic {
            return key;
        }
        (
            key.0.rem_euclid(self.dims[0]),
            key.1.rem_euclid(self.dims[1]),
            key.2.rem_euclid(self.dims[2]),
        )
    }
}
