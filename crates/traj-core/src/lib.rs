#![forbid(unsafe_code)]

pub mod error;
pub mod frame;
pub mod geom;
pub mod interner;
pub mod naming;
pub mod pbc;
pub mod spatial_hash;

pub use error::{TrajError, TrajResult};
pub use frame::Frame;
pub use geom::Vec3;
pub use interner::TypeMap;
pub use naming::{analyzer_names, NameCounter};
pub use pbc::TriclinicBox;
pub use spatial_hash::SpatialHash;
