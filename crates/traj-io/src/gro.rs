use std::path::Path;

use traj_core::error::TrajResult;
use traj_core::frame::Frame;
use traj_core::geom::Vec3;
use traj_core::pbc::TriclinicBox;

use crate::fixed::{find_time, parse_f64_field, parse_int_opt, slice_trim_opt};
use crate::text::LineReader;
use crate::FrameReader;

const NAME_COLS: (usize, usize) = (10, 15);
const NUMBER_COLS: (usize, usize) = (15, 20);
const COORD_START: usize = 20;

/// GROMACS `.gro` reader; frames follow one another, optionally separated
/// by blank lines.
pub struct GroReader {
    lines: LineReader,
    precision: usize,
    next_index: usize,
}

impl GroReader {
    pub fn open(path: &Path, precision: usize, first_index: usize) -> TrajResult<Self> {
        Ok(Self::from_lines(LineReader::open(path)?, precision, first_index))
    }

    pub fn from_lines(lines: LineReader, precision: usize, first_index: usize) -> Self {
        Self {
            lines,
            precision,
            next_index: first_index,
        }
    }

    fn pos_width(&self) -> usize {
        self.precision + 5
    }

    fn vel_width(&self) -> usize {
        self.precision + 6
    }

    fn parse_atom_line(
        &self,
        line: &str,
        n_atoms: usize,
        sequential: usize,
    ) -> Result<(usize, String, Vec3, Option<Vec3>), String> {
        if line.len() < COORD_START {
            return Err(format!(
                "atom record has {} columns, expected at least {COORD_START}",
                line.len()
            ));
        }
        let name = slice_trim_opt(line, NAME_COLS.0, NAME_COLS.1)
            .unwrap_or("")
            .to_string();
        let idx = match parse_int_opt(line, NUMBER_COLS.0, NUMBER_COLS.1, "atom number")? {
            Some(number) => {
                if number < 1 || number as usize > n_atoms {
                    return Err(format!(
                        "atom number {number} outside 1..={n_atoms}"
                    ));
                }
                number as usize - 1
            }
            None => sequential,
        };

        let w = self.pos_width();
        let axis = |k: usize, start: usize, width: usize, label: &str| {
            parse_f64_field(line, start + k * width, start + (k + 1) * width, label)
        };
        let pos = Vec3::new(
            axis(0, COORD_START, w, "x")?,
            axis(1, COORD_START, w, "y")?,
            axis(2, COORD_START, w, "z")?,
        );

        let vel_start = COORD_START + 3 * w;
        let vel = if line.trim_end().len() > vel_start {
            let vw = self.vel_width();
            Some(Vec3::new(
                axis(0, vel_start, vw, "vx")?,
                axis(1, vel_start, vw, "vy")?,
                axis(2, vel_start, vw, "vz")?,
            ))
        } else {
            None
        };
        Ok((idx, name, pos, vel))
    }
}

/// Box line: three diagonal lengths, or nine values in the order
/// `v1x v2y v3z v1y v1z v2x v2z v3x v3y`.
pub fn parse_gro_box(line: &str) -> Result<TriclinicBox, String> {
    let values = line
        .split_whitespace()
        .map(|tok| {
            tok.parse::<f64>()
                .map_err(|_| format!("invalid box value '{tok}'"))
        })
        .collect::<Result<Vec<_>, _>>()?;
    let to_msg = |err: traj_core::TrajError| err.to_string();
    match values.as_slice() {
        [lx, ly, lz] => TriclinicBox::orthorhombic(*lx, *ly, *lz).map_err(to_msg),
        [v1x, v2y, v3z, v1y, v1z, v2x, v2z, v3x, v3y] => {
            if [v1y, v1z, v2x, v2z, v3x, v3y].iter().all(|v| **v == 0.0) {
                return TriclinicBox::orthorhombic(*v1x, *v2y, *v3z).map_err(to_msg);
            }
            TriclinicBox::from_vectors(
                Vec3::new(*v1x, *v1y, *v1z),
                Vec3::new(*v2x, *v2y, *v2z),
                Vec3::new(*v3x, *v3y, *v3z),
            )
            .map_err(to_msg)
        }
        other => Err(format!(
            "box line must hold 3 or 9 values, found {}",
            other.len()
        )),
    }
}

impl FrameReader for GroReader {
    fn next_frame(&mut self) -> TrajResult<Option<Frame>> {
        let Some(comment) = self.lines.next_nonblank()? else {
            return Ok(None);
        };
        let time = match find_time(&comment) {
            Ok(Some(t)) => t,
            Ok(None) => return Err(self.lines.error("frame title must set the time with t=")),
            Err(msg) => return Err(self.lines.error(msg)),
        };

        let count_line = self.lines.require_line("particle count")?;
        let n_atoms = count_line
            .trim()
            .parse::<usize>()
            .map_err(|_| self.lines.error(format!("invalid particle count '{}'", count_line.trim())))?;

        let mut names = vec![String::new(); n_atoms];
        let mut positions = vec![Vec3::ZERO; n_atoms];
        let mut velocities: Option<Vec<Vec3>> = None;
        let mut filled = vec![false; n_atoms];
        for i in 0..n_atoms {
            let line = self.lines.require_line("atom record")?;
            let (idx, name, pos, vel) = self
                .parse_atom_line(&line, n_atoms, i)
                .map_err(|msg| self.lines.error(msg))?;
            if std::mem::replace(&mut filled[idx], true) {
                return Err(self.lines.error(format!("atom number {} appears twice", idx + 1)));
            }
            names[idx] = name;
            positions[idx] = pos;
            match (vel, i) {
                (Some(v), 0) => {
                    let mut all = vec![Vec3::ZERO; n_atoms];
                    all[idx] = v;
                    velocities = Some(all);
                }
                (Some(v), _) => match velocities.as_mut() {
                    Some(all) => all[idx] = v,
                    None => return Err(self.lines.error("velocity given for only some atoms")),
                },
                (None, _) => {
                    if velocities.is_some() {
                        return Err(self.lines.error("velocity missing for atom"));
                    }
                }
            }
        }

        let box_line = self.lines.require_line("box line")?;
        let box_ = parse_gro_box(&box_line).map_err(|msg| self.lines.error(msg))?;

        let mut frame = Frame::new(n_atoms, time)
            .with_box(box_)
            .with_names(names)
            .with_positions(positions);
        frame.velocities = velocities;
        frame.index = self.next_index;
        self.next_index += 1;
        Ok(Some(frame))
    }

    fn supports_multi_frame_file(&self) -> bool {
        true
    }
}
