pub mod dcd;
pub mod fixed;
pub mod format;
pub mod gro;
pub mod hoomd_xml;
pub mod pdb;
pub mod text;
pub mod topology;
pub mod trr;
pub mod xtc;
pub mod xyz;

use traj_core::error::TrajResult;
use traj_core::frame::Frame;

pub use dcd::DcdReader;
pub use format::{FormatSpec, ReaderFactory, TrajFormat};
pub use gro::GroReader;
pub use hoomd_xml::HoomdXmlReader;
pub use pdb::PdbReader;
pub use text::LineReader;
pub use topology::{Topology, TopologySpec, TOPOLOGY_TAGS};
pub use trr::TrrReader;
pub use xtc::XtcReader;
pub use xyz::XyzReader;

/// Streaming source of frames from one file.
///
/// Readers hand out frames one at a time and return `Ok(None)` once the file
/// is exhausted. Frame indices continue from the `first_index` the reader was
/// opened with, so several files can be chained into one sequence.
pub trait FrameReader {
    fn next_frame(&mut self) -> TrajResult<Option<Frame>>;

    /// Whether a single file of this format may hold more than one frame.
    fn supports_multi_frame_file(&self) -> bool;
}
