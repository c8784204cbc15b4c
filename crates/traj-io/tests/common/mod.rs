#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

pub fn temp_path(dir: &Path, label: &str) -> PathBuf {
    dir.join(label)
}

pub fn write_text(path: &Path, contents: &str) {
    fs::write(path, contents).unwrap();
}

pub const GRO_TOPOLOGY: &str = "\
two waters t= 1.0
    2
    1SOL     OW    1   0.100   0.200   0.300
    1SOL    HW1    2   0.400   0.500   0.600
   3.00000   3.00000   3.00000
";
