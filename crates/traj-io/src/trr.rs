use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::sync::Arc;

use traj_core::error::{TrajError, TrajResult};
use traj_core::frame::Frame;
use traj_core::geom::Vec3;

use crate::topology::Topology;
use crate::xtc::convert_box;
use crate::FrameReader;

const TRR_MAGIC: i32 = 1993;
const TRR_IO_BUFFER_BYTES: usize = 256 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Precision {
    Single,
    Double,
}

impl Precision {
    fn width(self) -> usize {
        match self {
            Precision::Single => 4,
            Precision::Double => 8,
        }
    }
}

/// Block sizes from a TRR frame header, in bytes.
#[derive(Debug, Clone, Copy, Default)]
struct TrrHeader {
    box_size: usize,
    vir_size: usize,
    pres_size: usize,
    x_size: usize,
    v_size: usize,
    f_size: usize,
    natoms: usize,
    step: i64,
}

impl TrrHeader {
    fn precision(&self) -> TrajResult<Precision> {
        let width = if self.box_size > 0 {
            self.box_size / 9
        } else if self.natoms == 0 {
            4
        } else if self.x_size > 0 {
            self.x_size / (self.natoms * 3)
        } else if self.v_size > 0 {
            self.v_size / (self.natoms * 3)
        } else if self.f_size > 0 {
            self.f_size / (self.natoms * 3)
        } else {
            4
        };
        match width {
            4 => Ok(Precision::Single),
            8 => Ok(Precision::Double),
            other => Err(TrajError::Parse(format!(
                "TRR block sizes imply a {other}-byte real"
            ))),
        }
    }
}

/// Full-precision GROMACS trajectory with optional velocities. XDR big-endian.
pub struct TrrReader {
    label: String,
    file: BufReader<File>,
    topology: Arc<Topology>,
    next_index: usize,
    emitted: usize,
    scratch: Vec<u8>,
}

impl TrrReader {
    pub fn open(path: &Path, topology: Arc<Topology>, first_index: usize) -> TrajResult<Self> {
        let file = File::open(path)?;
        Ok(Self {
            label: path.display().to_string(),
            file: BufReader::with_capacity(TRR_IO_BUFFER_BYTES, file),
            topology,
            next_index: first_index,
            emitted: 0,
            scratch: Vec::new(),
        })
    }

    fn frame_error(&self, msg: impl std::fmt::Display) -> TrajError {
        TrajError::Parse(format!("{}: frame {}: {msg}", self.label, self.emitted))
    }

    fn read_i32(&mut self) -> TrajResult<i32> {
        let mut buf = [0u8; 4];
        self.file.read_exact(&mut buf)?;
        Ok(i32::from_be_bytes(buf))
    }

    fn read_size(&mut self, what: &str) -> TrajResult<usize> {
        let v = self.read_i32()?;
        usize::try_from(v).map_err(|_| self.frame_error(format!("negative {what} ({v})")))
    }

    fn read_real(&mut self, precision: Precision) -> TrajResult<f64> {
        Ok(match precision {
            Precision::Single => {
                let mut buf = [0u8; 4];
                self.file.read_exact(&mut buf)?;
                f32::from_be_bytes(buf) as f64
            }
            Precision::Double => {
                let mut buf = [0u8; 8];
                self.file.read_exact(&mut buf)?;
                f64::from_be_bytes(buf)
            }
        })
    }

    fn read_reals(&mut self, precision: Precision, count: usize) -> TrajResult<Vec<f64>> {
        let width = precision.width();
        self.scratch.resize(count * width, 0);
        self.file.read_exact(&mut self.scratch)?;
        Ok(self
            .scratch
            .chunks_exact(width)
            .map(|c| match precision {
                Precision::Single => f32::from_be_bytes([c[0], c[1], c[2], c[3]]) as f64,
                Precision::Double => {
                    f64::from_be_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]])
                }
            })
            .collect())
    }

    fn skip(&mut self, len: usize) -> TrajResult<()> {
        let copied = std::io::copy(&mut (&mut self.file).take(len as u64), &mut std::io::sink())?;
        if copied != len as u64 {
            return Err(self.frame_error("truncated block"));
        }
        Ok(())
    }

    fn read_vectors(&mut self, precision: Precision, natoms: usize) -> TrajResult<Vec<Vec3>> {
        let flat = self.read_reals(precision, natoms * 3)?;
        Ok(flat
            .chunks_exact(3)
            .map(|c| Vec3::new(c[0], c[1], c[2]))
            .collect())
    }

    /// Returns `None` on a clean end of file before the magic number.
    fn read_magic(&mut self) -> TrajResult<Option<()>> {
        let mut buf = [0u8; 4];
        let mut filled = 0;
        while filled < 4 {
            let n = self.file.read(&mut buf[filled..])?;
            if n == 0 {
                if filled == 0 {
                    return Ok(None);
                }
                return Err(self.frame_error("truncated frame header"));
            }
            filled += n;
        }
        let magic = i32::from_be_bytes(buf);
        if magic != TRR_MAGIC {
            return Err(self.frame_error(format!("bad magic number {magic}")));
        }
        Ok(Some(()))
    }

    fn read_header(&mut self) -> TrajResult<TrrHeader> {
        let _slen = self.read_i32()?;
        let len = self.read_size("version string length")?;
        self.skip(len.div_ceil(4) * 4)?;
        let mut sizes = [0usize; 11];
        let names = [
            "ir_size", "e_size", "box_size", "vir_size", "pres_size", "top_size", "sym_size",
            "x_size", "v_size", "f_size", "natoms",
        ];
        for (slot, name) in sizes.iter_mut().zip(names) {
            *slot = self.read_size(name)?;
        }
        let step = self.read_i32()? as i64;
        let _nre = self.read_i32()?;
        if sizes[0] != 0 || sizes[1] != 0 || sizes[5] != 0 || sizes[6] != 0 {
            log::debug!("{}: ignoring TRR energy/topology blocks", self.label);
        }
        Ok(TrrHeader {
            box_size: sizes[2],
            vir_size: sizes[3],
            pres_size: sizes[4],
            x_size: sizes[7],
            v_size: sizes[8],
            f_size: sizes[9],
            natoms: sizes[10],
            step,
        })
    }

    fn read_frame(&mut self) -> TrajResult<Option<Frame>> {
        if self.read_magic()?.is_none() {
            return Ok(None);
        }
        let header = self
            .read_header()
            .map_err(|e| self.frame_error(format!("header: {e}")))?;
        let precision = header.precision()?;
        let natoms = header.natoms;
        if self.emitted == 0 {
            self.topology.check_atoms(natoms, &self.label)?;
        } else if natoms != self.topology.n_atoms {
            return Err(TrajError::Mismatch(format!(
                "{}: frame {} holds {natoms} atoms, expected {}",
                self.label, self.emitted, self.topology.n_atoms
            )));
        }
        let time = self.read_real(precision)?;
        let _lambda = self.read_real(precision)?;

        let mut box_ = None;
        if header.box_size > 0 {
            let m = self.read_reals(precision, 9)?;
            box_ = convert_box([[m[0], m[1], m[2]], [m[3], m[4], m[5]], [m[6], m[7], m[8]]])?;
        }
        self.skip(header.vir_size)?;
        self.skip(header.pres_size)?;
        let positions = if header.x_size > 0 {
            Some(self.read_vectors(precision, natoms)?)
        } else {
            None
        };
        let velocities = if header.v_size > 0 {
            Some(self.read_vectors(precision, natoms)?)
        } else {
            None
        };
        self.skip(header.f_size)?;
        log::trace!("{}: step {} t={time}", self.label, header.step);

        let mut frame = Frame::new(natoms, time);
        frame.index = self.next_index;
        frame.positions = positions;
        frame.velocities = velocities;
        frame.box_ = box_.or(self.topology.box_);
        if self.emitted == 0 {
            self.topology.decorate(&mut frame);
        }
        self.next_index += 1;
        self.emitted += 1;
        Ok(Some(frame))
    }
}

impl FrameReader for TrrReader {
    fn next_frame(&mut self) -> TrajResult<Option<Frame>> {
        self.read_frame()
    }

    fn supports_multi_frame_file(&self) -> bool {
        true
    }
}
