use std::path::{Path, PathBuf};
use std::sync::Arc;

use traj_core::error::{TrajError, TrajResult};
use traj_core::frame::Frame;
use traj_core::geom::Vec3;
use traj_core::pbc::TriclinicBox;
use xdrfile::{Frame as XdrFrame, Trajectory, XTCTrajectory};

use crate::topology::Topology;
use crate::FrameReader;

/// Compressed GROMACS trajectory. Coordinates and box stay in nm.
pub struct XtcReader {
    traj: XTCTrajectory,
    n_atoms: usize,
    frame: XdrFrame,
    path: PathBuf,
    topology: Arc<Topology>,
    next_index: usize,
    emitted: usize,
}

impl XtcReader {
    pub fn open(path: &Path, topology: Arc<Topology>, first_index: usize) -> TrajResult<Self> {
        let path = path.to_path_buf();
        let mut traj = XTCTrajectory::open_read(&path).map_err(map_xtc_err)?;
        let n_atoms = traj.get_num_atoms().map_err(map_xtc_err)?;
        topology.check_atoms(n_atoms, &path.display().to_string())?;
        let frame = XdrFrame::with_len(n_atoms);
        Ok(Self {
            traj,
            n_atoms,
            frame,
            path,
            topology,
            next_index: first_index,
            emitted: 0,
        })
    }
}

impl FrameReader for XtcReader {
    fn next_frame(&mut self) -> TrajResult<Option<Frame>> {
        match self.traj.read(&mut self.frame) {
            Ok(()) => {}
            Err(err) if err.is_eof() => return Ok(None),
            Err(err) => {
                return Err(TrajError::Parse(format!(
                    "{}: frame {}: {}",
                    self.path.display(),
                    self.emitted,
                    map_xtc_err(err)
                )))
            }
        }
        let positions = self.frame.coords.iter().map(|c| Vec3::from_f32(*c)).collect();
        let mut frame = Frame::new(self.n_atoms, self.frame.time as f64).with_positions(positions);
        frame.index = self.next_index;
        frame.box_ = convert_box(self.frame.box_vector)?.or(self.topology.box_);
        if self.emitted == 0 {
            self.topology.decorate(&mut frame);
        }
        self.next_index += 1;
        self.emitted += 1;
        Ok(Some(frame))
    }

    fn supports_multi_frame_file(&self) -> bool {
        true
    }
}

/// Row-vector box matrix to a reduced box; an all-zero matrix means "no box".
pub(crate) fn convert_box<T: Copy + Into<f64>>(m: [[T; 3]; 3]) -> TrajResult<Option<TriclinicBox>> {
    let rows = m.map(|r| Vec3::new(r[0].into(), r[1].into(), r[2].into()));
    if rows.iter().all(|v| v.norm_sq() == 0.0) {
        return Ok(None);
    }
    TriclinicBox::from_vectors(rows[0], rows[1], rows[2]).map(Some)
}

fn map_xtc_err(err: xdrfile::Error) -> TrajError {
    TrajError::Parse(format!("xtc error: {err}"))
}
