use std::path::Path;

use traj_core::error::TrajResult;
use traj_core::frame::Frame;
use traj_core::geom::Vec3;
use traj_core::pbc::TriclinicBox;

use crate::fixed::{parse_f64_field, parse_int_opt, slice_trim_opt};
use crate::text::LineReader;
use crate::FrameReader;

/// Multi-model PDB reader. Each `MODEL`/`ENDMDL` block is one frame whose
/// time is the model serial scaled by `time_step`.
pub struct PdbReader {
    lines: LineReader,
    time_step: f64,
    box_: Option<TriclinicBox>,
    next_index: usize,
}

struct Model {
    time: f64,
    names: Vec<String>,
    positions: Vec<Vec3>,
}

impl PdbReader {
    pub fn open(path: &Path, time_step: f64, first_index: usize) -> TrajResult<Self> {
        Ok(Self::from_lines(LineReader::open(path)?, time_step, first_index))
    }

    pub fn from_lines(lines: LineReader, time_step: f64, first_index: usize) -> Self {
        Self {
            lines,
            time_step,
            box_: None,
            next_index: first_index,
        }
    }
}

fn record_tag(line: &str) -> &str {
    let end = line.len().min(6);
    line.get(..end).unwrap_or("").trim_end()
}

fn parse_cryst1(line: &str) -> Result<TriclinicBox, String> {
    if line.len() < 54 {
        return Err("CRYST1 record is too short".into());
    }
    let a = parse_f64_field(line, 6, 15, "a")?;
    let b = parse_f64_field(line, 15, 24, "b")?;
    let c = parse_f64_field(line, 24, 33, "c")?;
    let alpha = parse_f64_field(line, 33, 40, "alpha")?;
    let beta = parse_f64_field(line, 40, 47, "beta")?;
    let gamma = parse_f64_field(line, 47, 54, "gamma")?;
    TriclinicBox::from_lattice(a, b, c, alpha, beta, gamma).map_err(|err| err.to_string())
}

fn parse_model_serial(line: &str) -> Result<f64, String> {
    let raw = match slice_trim_opt(line, 10, 14) {
        Some(s) if !s.is_empty() => s,
        _ => line[6.min(line.len())..].split_whitespace().next().unwrap_or(""),
    };
    raw.parse::<f64>()
        .map_err(|_| "MODEL record must set the model serial".to_string())
}

fn parse_atom(line: &str, expected_serial: usize) -> Result<(String, Vec3), String> {
    if line.len() < 54 {
        return Err("ATOM record is too short".into());
    }
    match parse_int_opt(line, 6, 11, "atom serial")? {
        Some(serial) if serial == expected_serial as i64 => {}
        _ => return Err("atoms must be numbered in order starting from 1".into()),
    }
    let name = slice_trim_opt(line, 12, 16).unwrap_or("").to_string();
    let pos = Vec3::new(
        parse_f64_field(line, 30, 38, "x")?,
        parse_f64_field(line, 38, 46, "y")?,
        parse_f64_field(line, 46, 54, "z")?,
    );
    Ok((name, pos))
}

impl FrameReader for PdbReader {
    fn next_frame(&mut self) -> TrajResult<Option<Frame>> {
        let mut model: Option<Model> = None;
        loop {
            let Some(line) = self.lines.next_line()? else {
                if model.is_some() {
                    return Err(self.lines.error("MODEL is missing its ENDMDL"));
                }
                return Ok(None);
            };
            match record_tag(&line) {
                "CRYST1" if self.box_.is_none() => {
                    let box_ = parse_cryst1(&line).map_err(|msg| self.lines.error(msg))?;
                    self.box_ = Some(box_);
                }
                "MODEL" if model.is_none() => {
                    let serial = parse_model_serial(&line).map_err(|msg| self.lines.error(msg))?;
                    model = Some(Model {
                        time: serial * self.time_step,
                        names: Vec::new(),
                        positions: Vec::new(),
                    });
                }
                "ATOM" | "HETATM" => {
                    if let Some(m) = model.as_mut() {
                        let (name, pos) = parse_atom(&line, m.positions.len() + 1)
                            .map_err(|msg| self.lines.error(msg))?;
                        m.names.push(name);
                        m.positions.push(pos);
                    }
                }
                "ENDMDL" => {
                    let Some(m) = model.take() else {
                        continue;
                    };
                    if m.positions.is_empty() {
                        continue;
                    }
                    let box_ = self
                        .box_
                        .ok_or_else(|| self.lines.error("CRYST1 record must precede the first model"))?;
                    let mut frame = Frame::new(m.positions.len(), m.time)
                        .with_box(box_)
                        .with_names(m.names)
                        .with_positions(m.positions);
                    frame.index = self.next_index;
                    self.next_index += 1;
                    return Ok(Some(frame));
                }
                // TER and every other record leave the frame open.
                _ => {}
            }
        }
    }

    fn supports_multi_frame_file(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reader(text: &'static str) -> PdbReader {
        PdbReader::from_lines(LineReader::from_reader("test.pdb", text.as_bytes()), 2.0, 0)
    }

    const TWO_MODELS: &str = "\
CRYST1   10.000   20.000   30.000  90.00  90.00  90.00 P 1           1
MODEL        1
ATOM      1  N   ALA A   1       1.000   2.000   3.000  1.00  0.00           N
TER
ATOM      2  CA  ALA A   1       4.000   5.000   6.000  1.00  0.00           C
ENDMDL
MODEL        2
ATOM      1  N   ALA A   1       1.500   2.500   3.500  1.00  0.00           N
HETATM    2  CA  ALA A   1       4.500   5.500   6.500  1.00  0.00           C
ENDMDL
END
";

    #[test]
    fn reads_models_as_frames() {
        let mut r = reader(TWO_MODELS);
        let f0 = r.next_frame().unwrap().unwrap();
        assert_eq!(f0.n_atoms, 2);
        assert_eq!(f0.time, 2.0);
        assert_eq!(f0.names.as_ref().unwrap()[1], "CA");
        assert_eq!(f0.positions.as_ref().unwrap()[1], Vec3::new(4.0, 5.0, 6.0));
        let b = f0.box_.unwrap();
        assert!((b.length().y - 20.0).abs() < 1e-9);
        assert!(b.tilt().norm() < 1e-9);

        let f1 = r.next_frame().unwrap().unwrap();
        assert_eq!(f1.time, 4.0);
        assert_eq!(f1.index, 1);
        assert!(r.next_frame().unwrap().is_none());
    }

    #[test]
    fn out_of_order_serial_is_error() {
        let text = "\
CRYST1   10.000   20.000   30.000  90.00  90.00  90.00 P 1           1
MODEL        1
ATOM      2  N   ALA A   1       1.000   2.000   3.000  1.00  0.00           N
ENDMDL
";
        assert!(reader(text).next_frame().is_err());
    }

    #[test]
    fn missing_cryst1_is_error() {
        let text = "\
MODEL        1
ATOM      1  N   ALA A   1       1.000   2.000   3.000  1.00  0.00           N
ENDMDL
";
        assert!(reader(text).next_frame().is_err());
    }

    #[test]
    fn unterminated_model_is_error() {
        let text = "\
CRYST1   10.000   20.000   30.000  90.00  90.00  90.00 P 1           1
MODEL        1
ATOM      1  N   ALA A   1       1.000   2.000   3.000  1.00  0.00           N
";
        assert!(reader(text).next_frame().is_err());
    }
}
