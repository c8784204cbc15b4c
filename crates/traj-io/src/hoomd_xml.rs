use std::path::Path;
use std::str::FromStr;

use traj_core::error::{TrajError, TrajResult};
use traj_core::frame::Frame;
use traj_core::geom::Vec3;
use traj_core::pbc::TriclinicBox;

use crate::FrameReader;

const MIN_VERSION: f64 = 1.0;
const TILT_VERSION: f64 = 1.5;

/// HOOMD-blue XML snapshot reader; every file holds exactly one frame.
#[derive(Debug)]
pub struct HoomdXmlReader {
    label: String,
    source: Option<String>,
    dt: f64,
    index: usize,
}

impl HoomdXmlReader {
    pub fn open(path: &Path, dt: f64, index: usize) -> TrajResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|err| {
            log::warn!("cannot open {}: {err}", path.display());
            TrajError::Io(err)
        })?;
        Self::from_str_with_label(path.display().to_string(), text, dt, index)
    }

    pub fn from_str_with_label(
        label: impl Into<String>,
        text: String,
        dt: f64,
        index: usize,
    ) -> TrajResult<Self> {
        if !(dt > 0.0) {
            return Err(TrajError::Invalid(format!(
                "HOOMD-XML time step must be positive, got {dt}"
            )));
        }
        Ok(Self {
            label: label.into(),
            source: Some(text),
            dt,
            index,
        })
    }

    fn error(&self, msg: impl std::fmt::Display) -> TrajError {
        TrajError::Parse(format!("{}: {msg}", self.label))
    }

    fn parse(&self, text: &str) -> TrajResult<Frame> {
        let doc = roxmltree::Document::parse(text).map_err(|err| self.error(err))?;
        let root = doc.root_element();
        if root.tag_name().name() != "hoomd_xml" {
            return Err(self.error("root node must be hoomd_xml"));
        }
        let version = match root.attribute("version") {
            Some(raw) => raw
                .trim()
                .parse::<f64>()
                .map_err(|_| self.error(format!("invalid version '{raw}'")))?,
            None => return Err(self.error("hoomd_xml node must set a version")),
        };
        if version < MIN_VERSION {
            return Err(self.error(format!("version {version} is too old")));
        }

        let config = root
            .children()
            .find(|n| n.has_tag_name("configuration"))
            .ok_or_else(|| self.error("missing configuration node"))?;
        let time_step = config
            .attribute("time_step")
            .ok_or_else(|| self.error("frames must have time_step set"))?;
        let time_step = time_step
            .trim()
            .parse::<f64>()
            .map_err(|_| self.error(format!("invalid time_step '{time_step}'")))?;

        let box_node = config
            .children()
            .find(|n| n.has_tag_name("box"))
            .ok_or_else(|| self.error("missing box node"))?;
        let box_attr = |name: &str, required: bool| -> TrajResult<f64> {
            match box_node.attribute(name) {
                Some(raw) => raw
                    .trim()
                    .parse::<f64>()
                    .map_err(|_| self.error(format!("invalid box {name} '{raw}'"))),
                None if required => Err(self.error(format!("box must set {name}"))),
                None => Ok(0.0),
            }
        };
        let (lx, ly, lz) = (box_attr("lx", true)?, box_attr("ly", true)?, box_attr("lz", true)?);
        let (xy, xz, yz) = if version >= TILT_VERSION {
            (box_attr("xy", false)?, box_attr("xz", false)?, box_attr("yz", false)?)
        } else {
            (0.0, 0.0, 0.0)
        };
        let box_ = TriclinicBox::new(lx, ly, lz, xy, xz, yz).map_err(|err| self.error(err))?;

        let declared = match config.attribute("natoms") {
            Some(raw) => Some(
                raw.trim()
                    .parse::<usize>()
                    .map_err(|_| self.error(format!("invalid natoms '{raw}'")))?,
            ),
            None => None,
        };
        let mut n_atoms = declared;
        let mut frame = Frame::new(0, time_step * self.dt).with_box(box_);

        for node in config.children().filter(|n| n.is_element()) {
            let name = node.tag_name().name();
            let body = node.text().unwrap_or("");
            let count = match name {
                "position" => {
                    let v = self.vectors::<f64>(name, body)?;
                    let count = v.len();
                    frame.positions = Some(v.into_iter().map(Vec3::from_array).collect());
                    count
                }
                "velocity" => {
                    let v = self.vectors::<f64>(name, body)?;
                    let count = v.len();
                    frame.velocities = Some(v.into_iter().map(Vec3::from_array).collect());
                    count
                }
                "image" => {
                    let v = self.vectors::<i32>(name, body)?;
                    let count = v.len();
                    frame.images = Some(v);
                    count
                }
                "mass" => {
                    let v = self.scalars::<f64>(name, body)?;
                    let count = v.len();
                    frame.masses = Some(v);
                    count
                }
                "diameter" => {
                    let v = self.scalars::<f64>(name, body)?;
                    let count = v.len();
                    frame.diameters = Some(v);
                    count
                }
                "type" => {
                    let v: Vec<String> = body.split_whitespace().map(str::to_string).collect();
                    let count = v.len();
                    frame.names = Some(v);
                    count
                }
                _ => continue,
            };
            if let Some(raw) = node.attribute("num") {
                if raw.trim().parse::<usize>().ok() != Some(count) {
                    return Err(self.error(format!(
                        "{name} declares num={raw} but holds {count} entries"
                    )));
                }
            }
            match n_atoms {
                Some(n) if n != count => {
                    return Err(self.error(format!("{name} holds {count} entries, expected {n}")));
                }
                _ => n_atoms = Some(count),
            }
        }

        frame.n_atoms = n_atoms.unwrap_or(0);
        frame.index = self.index;
        Ok(frame)
    }

    fn scalars<T: FromStr>(&self, node: &str, body: &str) -> TrajResult<Vec<T>> {
        body.split_whitespace()
            .map(|tok| {
                tok.parse::<T>()
                    .map_err(|_| self.error(format!("invalid {node} value '{tok}'")))
            })
            .collect()
    }

    fn vectors<T: FromStr + Copy + Default>(&self, node: &str, body: &str) -> TrajResult<Vec<[T; 3]>> {
        let flat = self.scalars::<T>(node, body)?;
        if flat.len() % 3 != 0 {
            return Err(self.error(format!(
                "{node} holds {} values, not a multiple of 3",
                flat.len()
            )));
        }
        Ok(flat.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect())
    }
}

impl FrameReader for HoomdXmlReader {
    fn next_frame(&mut self) -> TrajResult<Option<Frame>> {
        let Some(text) = self.source.take() else {
            return Ok(None);
        };
        self.parse(&text).map(Some)
    }

    fn supports_multi_frame_file(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SNAPSHOT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<hoomd_xml version="1.6">
<configuration time_step="100" dimensions="3" natoms="2">
<box lx="10" ly="20" lz="30" xy="0.5" xz="0" yz="0.25"/>
<position num="2">
1.0 2.0 3.0
-1.0 -2.0 -3.0
</position>
<image num="2">
0 0 0
1 -1 2
</image>
<velocity num="2">
0.5 0 0
0 0.5 0
</velocity>
<mass num="2">
1.0
2.0
</mass>
<type num="2">
A
B
</type>
</configuration>
</hoomd_xml>
"#;

    fn reader(text: &str, dt: f64) -> TrajResult<HoomdXmlReader> {
        HoomdXmlReader::from_str_with_label("test.xml", text.to_string(), dt, 0)
    }

    #[test]
    fn parses_snapshot() {
        let mut r = reader(SNAPSHOT, 0.005).unwrap();
        let f = r.next_frame().unwrap().unwrap();
        assert_eq!(f.n_atoms, 2);
        assert!((f.time - 0.5).abs() < 1e-12);
        let b = f.box_.unwrap();
        assert_eq!(b.tilt(), Vec3::new(0.5, 0.0, 0.25));
        assert_eq!(f.images.as_ref().unwrap()[1], [1, -1, 2]);
        assert_eq!(f.masses.as_ref().unwrap(), &vec![1.0, 2.0]);
        assert_eq!(f.names.as_ref().unwrap()[1], "B");
        assert!(f.diameters.is_none());
        assert!(r.next_frame().unwrap().is_none());
    }

    #[test]
    fn rejects_nonpositive_dt() {
        assert!(reader(SNAPSHOT, 0.0).unwrap_err().is_config());
        assert!(reader(SNAPSHOT, -1.0).unwrap_err().is_config());
    }

    #[test]
    fn tilts_ignored_before_version_1_5() {
        let text = SNAPSHOT.replace("version=\"1.6\"", "version=\"1.4\"");
        let f = reader(&text, 1.0).unwrap().next_frame().unwrap().unwrap();
        assert!(f.box_.unwrap().is_orthorhombic());
    }

    #[test]
    fn required_pieces() {
        let old = SNAPSHOT.replace("version=\"1.6\"", "version=\"0.9\"");
        assert!(reader(&old, 1.0).unwrap().next_frame().is_err());
        let no_time = SNAPSHOT.replace("time_step=\"100\"", "");
        assert!(reader(&no_time, 1.0).unwrap().next_frame().is_err());
        let no_lz = SNAPSHOT.replace("lz=\"30\"", "");
        assert!(reader(&no_lz, 1.0).unwrap().next_frame().is_err());
    }

    #[test]
    fn count_mismatch_is_error() {
        let text = SNAPSHOT.replace("1.0\n2.0\n</mass>", "1.0\n</mass>");
        assert!(reader(&text, 1.0).unwrap().next_frame().is_err());
    }
}
