#![allow(dead_code)]

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

pub fn temp_path(dir: &Path, label: &str) -> PathBuf {
    dir.join(label)
}

pub fn write_text(path: &Path, contents: &str) {
    fs::write(path, contents).unwrap();
}

/// One GRO frame with a cubic box of edge `l`.
pub fn gro_frame(time: f64, atoms: &[(&str, [f64; 3])], l: f64) -> String {
    let mut out = String::new();
    writeln!(out, "Generated t= {time}").unwrap();
    writeln!(out, "{:>5}", atoms.len()).unwrap();
    for (i, (name, p)) in atoms.iter().enumerate() {
        writeln!(
            out,
            "{:>5}{:<5}{:>5}{:>5}{:>8.3}{:>8.3}{:>8.3}",
            1,
            "SOL",
            name,
            i + 1,
            p[0],
            p[1],
            p[2]
        )
        .unwrap();
    }
    writeln!(out, "{l:>10.5}{l:>10.5}{l:>10.5}").unwrap();
    out
}

pub struct Particle {
    pub name: &'static str,
    pub position: [f64; 3],
    pub velocity: [f64; 3],
    pub mass: f64,
}

/// HOOMD-XML snapshot with a cubic box of edge `l`.
pub fn hoomd_snapshot(time_step: u64, particles: &[Particle], l: f64) -> String {
    let n = particles.len();
    let mut out = String::new();
    writeln!(out, r#"<?xml version="1.0" encoding="UTF-8"?>"#).unwrap();
    writeln!(out, r#"<hoomd_xml version="1.6">"#).unwrap();
    writeln!(
        out,
        r#"<configuration time_step="{time_step}" dimensions="3" natoms="{n}">"#
    )
    .unwrap();
    writeln!(out, r#"<box lx="{l}" ly="{l}" lz="{l}"/>"#).unwrap();
    let mut section = |tag: &str, rows: Vec<String>| {
        writeln!(out, r#"<{tag} num="{n}">"#).unwrap();
        for row in rows {
            writeln!(out, "{row}").unwrap();
        }
        writeln!(out, "</{tag}>").unwrap();
    };
    let vec_row = |v: [f64; 3]| format!("{} {} {}", v[0], v[1], v[2]);
    section("position", particles.iter().map(|p| vec_row(p.position)).collect());
    section("velocity", particles.iter().map(|p| vec_row(p.velocity)).collect());
    section("mass", particles.iter().map(|p| p.mass.to_string()).collect());
    section("type", particles.iter().map(|p| p.name.to_string()).collect());
    writeln!(out, "</configuration>").unwrap();
    writeln!(out, "</hoomd_xml>").unwrap();
    out
}

/// Little-endian CHARMM DCD with 4-byte record markers and no unit cell.
pub fn dcd_file(delta: f32, nsavc: i32, frames: &[Vec<[f32; 3]>]) -> Vec<u8> {
    let n_atoms = frames.first().map_or(0, Vec::len);
    let mut out = Vec::new();
    let mut record = |payload: &[u8]| {
        let len = (payload.len() as u32).to_le_bytes();
        out.extend_from_slice(&len);
        out.extend_from_slice(payload);
        out.extend_from_slice(&len);
    };

    let mut header = b"CORD".to_vec();
    for word in 0..20 {
        let bytes = match word {
            0 => (frames.len() as i32).to_le_bytes(),
            2 => nsavc.to_le_bytes(),
            9 => delta.to_le_bytes(),
            19 => 24i32.to_le_bytes(),
            _ => [0; 4],
        };
        header.extend_from_slice(&bytes);
    }
    record(&header);
    let mut title = 1i32.to_le_bytes().to_vec();
    title.extend_from_slice(&[b' '; 80]);
    record(&title);
    record(&(n_atoms as i32).to_le_bytes());

    for frame in frames {
        for axis in 0..3 {
            let payload: Vec<u8> = frame.iter().flat_map(|p| p[axis].to_le_bytes()).collect();
            record(&payload);
        }
    }
    out
}
