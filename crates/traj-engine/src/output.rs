use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use traj_core::error::TrajResult;

use crate::analyzer::{
    AnalysisOutput, AnalyzerKind, ClusteringOutput, CorrelationOutput, ProfileOutput, RdfOutput,
};

/// Write one analyzer's result under `dir`, returning the files created.
///
/// Profiles go to `<stub>.dat`, correlations to `<stub>_<type>.dat`, and
/// clustering and RDF results to the configured file name as given.
pub fn write_output(
    dir: &Path,
    kind: AnalyzerKind,
    file_name: &str,
    output: &AnalysisOutput,
) -> TrajResult<Vec<PathBuf>> {
    match output {
        AnalysisOutput::Profile(out) => {
            let path = dir.join(format!("{file_name}.dat"));
            write_profile(&path, out)?;
            Ok(vec![path])
        }
        AnalysisOutput::Clustering(out) => {
            let path = dir.join(file_name);
            write_clustering(&path, out)?;
            Ok(vec![path])
        }
        AnalysisOutput::Correlation(out) => write_correlation(dir, kind, file_name, out),
        AnalysisOutput::Rdf(out) => {
            let path = dir.join(file_name);
            write_rdf(&path, out)?;
            Ok(vec![path])
        }
    }
}

fn write_profile(path: &Path, out: &ProfileOutput) -> TrajResult<()> {
    let mut file = BufWriter::new(File::create(path)?);
    write!(file, "# x\ty\tz")?;
    for column in &out.columns {
        write!(file, "\t{column}")?;
    }
    writeln!(file)?;
    for (bin, center) in out.centers.iter().enumerate() {
        write!(file, "{:.8}\t{:.8}\t{:.8}", center[0], center[1], center[2])?;
        for values in &out.values {
            write!(file, "\t{:.8}", values[bin])?;
        }
        writeln!(file)?;
    }
    file.flush()?;
    Ok(())
}

fn write_clustering(path: &Path, out: &ClusteringOutput) -> TrajResult<()> {
    let mut file = BufWriter::new(File::create(path)?);
    writeln!(file, "# cluster statistics per frame")?;
    writeln!(file, "# frame\tn_clusters\tmax_size")?;
    for ((frame, n), max) in out.frames.iter().zip(&out.n_clusters).zip(&out.max_size) {
        writeln!(file, "{frame}\t{n}\t{max}")?;
    }
    file.flush()?;
    Ok(())
}

fn write_correlation(
    dir: &Path,
    kind: AnalyzerKind,
    stub: &str,
    out: &CorrelationOutput,
) -> TrajResult<Vec<PathBuf>> {
    let label = kind.as_str();
    let mut written = Vec::with_capacity(out.series.len());
    for series in &out.series {
        let path = dir.join(format!("{stub}_{}.dat", series.type_name));
        let mut file = BufWriter::new(File::create(&path)?);
        writeln!(file, "# time\t{label}-total\t-x\t-y\t-z")?;
        for (lag, t) in out.time.iter().enumerate() {
            writeln!(
                file,
                "{t:.6}\t{:.8}\t{:.8}\t{:.8}\t{:.8}",
                series.total[lag], series.x[lag], series.y[lag], series.z[lag]
            )?;
        }
        file.flush()?;
        written.push(path);
    }
    Ok(written)
}

fn write_rdf(path: &Path, out: &RdfOutput) -> TrajResult<()> {
    let mut file = BufWriter::new(File::create(path)?);
    writeln!(file, "# radial distribution function")?;
    writeln!(file, "# r    g2(r)")?;
    for (r, g) in out.r.iter().zip(&out.g_r) {
        writeln!(file, "{r:.6}\t{g:.8}")?;
    }
    file.flush()?;
    Ok(())
}
