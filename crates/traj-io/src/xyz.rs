use std::path::Path;

use traj_core::error::TrajResult;
use traj_core::frame::Frame;
use traj_core::geom::Vec3;

use crate::fixed::find_time;
use crate::text::LineReader;
use crate::FrameReader;

/// XYZ reader. The box is never stored in this format.
///
/// When the first frame's comment carries `t=` every frame must; otherwise
/// the frame index stands in for the time.
pub struct XyzReader {
    lines: LineReader,
    next_index: usize,
    timed: Option<bool>,
}

impl XyzReader {
    pub fn open(path: &Path, first_index: usize) -> TrajResult<Self> {
        Ok(Self::from_lines(LineReader::open(path)?, first_index))
    }

    pub fn from_lines(lines: LineReader, first_index: usize) -> Self {
        Self {
            lines,
            next_index: first_index,
            timed: None,
        }
    }
}

fn parse_atom(line: &str) -> Result<(String, Vec3), String> {
    let mut tokens = line.split_whitespace();
    let name = tokens
        .next()
        .ok_or_else(|| "empty atom record".to_string())?
        .to_string();
    let mut coord = [0.0f64; 3];
    for (axis, value) in coord.iter_mut().enumerate() {
        let tok = tokens
            .next()
            .ok_or_else(|| format!("atom record is missing coordinate {axis}"))?;
        *value = tok
            .parse::<f64>()
            .map_err(|_| format!("invalid coordinate '{tok}'"))?;
    }
    Ok((name, Vec3::from_array(coord)))
}

impl FrameReader for XyzReader {
    fn next_frame(&mut self) -> TrajResult<Option<Frame>> {
        let Some(count_line) = self.lines.next_nonblank()? else {
            return Ok(None);
        };
        let n_atoms = count_line.trim().parse::<usize>().map_err(|_| {
            self.lines
                .error(format!("invalid particle count '{}'", count_line.trim()))
        })?;

        let comment = self.lines.require_line("comment line")?;
        let stamped = find_time(&comment).map_err(|msg| self.lines.error(msg))?;
        let timed = *self.timed.get_or_insert(stamped.is_some());
        let time = match (timed, stamped) {
            (true, Some(t)) => t,
            (false, None) => self.next_index as f64,
            _ => {
                return Err(self
                    .lines
                    .error("all frames must have a time in the comment if one does"))
            }
        };

        let mut names = Vec::with_capacity(n_atoms);
        let mut positions = Vec::with_capacity(n_atoms);
        for _ in 0..n_atoms {
            let line = self.lines.require_line("atom record")?;
            let (name, pos) = parse_atom(&line).map_err(|msg| self.lines.error(msg))?;
            names.push(name);
            positions.push(pos);
        }

        let mut frame = Frame::new(n_atoms, time)
            .with_names(names)
            .with_positions(positions);
        frame.index = self.next_index;
        self.next_index += 1;
        Ok(Some(frame))
    }

    fn supports_multi_frame_file(&self) -> bool {
        true
    }
}
