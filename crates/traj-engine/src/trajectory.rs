use std::path::{Path, PathBuf};

use traj_core::error::{TrajError, TrajResult};
use traj_core::frame::Frame;
use traj_core::interner::TypeMap;
use traj_core::pbc::TriclinicBox;
use traj_io::{FormatSpec, FrameReader, ReaderFactory, TrajFormat};

use crate::analyzer::{AnalysisOutput, Analyzer, AnalyzerKind};
use crate::output::write_output;

/// Result of one analyzer after a pass.
#[derive(Debug)]
pub struct AnalysisResult {
    pub name: String,
    pub kind: AnalyzerKind,
    pub output: AnalysisOutput,
    pub files: Vec<PathBuf>,
}

/// Ordered file list, optional forced box and the analyzers run over them.
///
/// `analyze` makes a single forward pass: each file is opened in `add`
/// order, frames are pulled one at a time and handed to every analyzer in
/// attachment order, then dropped.
pub struct Trajectory {
    factory: ReaderFactory,
    files: Vec<PathBuf>,
    box_override: Option<TriclinicBox>,
    analyzers: Vec<Box<dyn Analyzer>>,
    output_dir: PathBuf,
}

impl Trajectory {
    /// Validates the reader parameters and loads the topology for binary formats.
    pub fn new(spec: FormatSpec) -> TrajResult<Self> {
        let factory = ReaderFactory::new(spec)?;
        Ok(Self {
            factory,
            files: Vec::new(),
            box_override: None,
            analyzers: Vec::new(),
            output_dir: PathBuf::from("."),
        })
    }

    pub fn format(&self) -> TrajFormat {
        self.factory.spec().format()
    }

    pub fn spec(&self) -> &FormatSpec {
        self.factory.spec()
    }

    pub fn add<I, P>(&mut self, files: I) -> TrajResult<()>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        for file in files {
            self.add_file(file)?;
        }
        Ok(())
    }

    pub fn add_file(&mut self, path: impl AsRef<Path>) -> TrajResult<()> {
        let path = path.as_ref();
        if !path.is_file() {
            log::warn!("cannot add {}: no such file", path.display());
            return Err(TrajError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{}: no such file", path.display()),
            )));
        }
        self.files.push(path.to_path_buf());
        Ok(())
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Force `box_` onto every frame.
    pub fn set_box(&mut self, box_: TriclinicBox) {
        self.box_override = Some(box_);
    }

    pub fn box_override(&self) -> Option<TriclinicBox> {
        self.box_override
    }

    /// Directory output files are written to; the working directory by default.
    pub fn set_output_dir(&mut self, dir: impl Into<PathBuf>) {
        self.output_dir = dir.into();
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn attach<A: Analyzer + 'static>(&mut self, analyzer: A) -> TrajResult<()> {
        self.attach_boxed(Box::new(analyzer))
    }

    pub fn attach_boxed(&mut self, analyzer: Box<dyn Analyzer>) -> TrajResult<()> {
        if self.analyzer(analyzer.name()).is_some() {
            return Err(TrajError::Invalid(format!(
                "an analyzer named '{}' is already attached",
                analyzer.name()
            )));
        }
        self.analyzers.push(analyzer);
        Ok(())
    }

    pub fn remove_analyzer(&mut self, name: &str) -> TrajResult<Box<dyn Analyzer>> {
        let idx = self
            .analyzers
            .iter()
            .position(|a| a.name() == name)
            .ok_or_else(|| TrajError::Invalid(format!("no analyzer named '{name}' is attached")))?;
        Ok(self.analyzers.remove(idx))
    }

    pub fn analyzer(&self, name: &str) -> Option<&dyn Analyzer> {
        self.analyzers
            .iter()
            .find(|a| a.name() == name)
            .map(|a| &**a)
    }

    pub fn analyzer_names(&self) -> Vec<&str> {
        self.analyzers.iter().map(|a| a.name()).collect()
    }

    /// Run every attached analyzer over all added files and write their outputs.
    pub fn analyze(&mut self) -> TrajResult<Vec<AnalysisResult>> {
        if self.files.is_empty() {
            return Err(TrajError::Invalid("no trajectory files were added".into()));
        }
        let mut pass = FramePass::new(self.box_override);
        for analyzer in self.analyzers.iter_mut() {
            analyzer.init()?;
        }
        for path in &self.files {
            let label = path.display().to_string();
            log::info!("reading {label} as {}", self.factory.spec().format().name());
            let mut reader = self.factory.open(path, pass.n_frames)?;
            let before = pass.n_frames;
            pass.drain(reader.as_mut(), &label, &mut self.analyzers)?;
            log::debug!("{label}: {} frame(s)", pass.n_frames - before);
        }
        self.finish(pass)
    }

    /// Same as `analyze` but pulls frames from an already opened source.
    pub fn analyze_reader(&mut self, reader: &mut dyn FrameReader) -> TrajResult<Vec<AnalysisResult>> {
        let mut pass = FramePass::new(self.box_override);
        for analyzer in self.analyzers.iter_mut() {
            analyzer.init()?;
        }
        pass.drain(reader, "<reader>", &mut self.analyzers)?;
        self.finish(pass)
    }

    fn finish(&mut self, pass: FramePass) -> TrajResult<Vec<AnalysisResult>> {
        if pass.n_frames == 0 {
            return Err(TrajError::Invalid("no frames were read".into()));
        }
        if pass.time_regressions > 0 {
            log::warn!(
                "{} frame(s) did not advance the simulation time",
                pass.time_regressions
            );
        }
        let mut results = Vec::with_capacity(self.analyzers.len());
        for analyzer in self.analyzers.iter_mut() {
            let output = analyzer.finalize(&pass.types)?;
            let files = write_output(&self.output_dir, analyzer.kind(), analyzer.file_name(), &output)?;
            for file in &files {
                log::info!("{} '{}' wrote {}", analyzer.kind().as_str(), analyzer.name(), file.display());
            }
            results.push(AnalysisResult {
                name: analyzer.name().to_string(),
                kind: analyzer.kind(),
                output,
                files,
            });
        }
        Ok(results)
    }
}

/// Per-pass state: type interning and the trajectory-level fallbacks taken
/// from the first frame that carries each field.
struct FramePass {
    box_override: Option<TriclinicBox>,
    types: TypeMap,
    n_atoms: Option<usize>,
    n_frames: usize,
    last_time: Option<f64>,
    time_regressions: usize,
    fallback_types: Option<Vec<u32>>,
    fallback_masses: Option<Vec<f64>>,
    fallback_diameters: Option<Vec<f64>>,
    fallback_box: Option<TriclinicBox>,
}

impl FramePass {
    fn new(box_override: Option<TriclinicBox>) -> Self {
        Self {
            box_override,
            types: TypeMap::new(),
            n_atoms: None,
            n_frames: 0,
            last_time: None,
            time_regressions: 0,
            fallback_types: None,
            fallback_masses: None,
            fallback_diameters: None,
            fallback_box: None,
        }
    }

    fn drain(
        &mut self,
        reader: &mut dyn FrameReader,
        label: &str,
        analyzers: &mut [Box<dyn Analyzer>],
    ) -> TrajResult<()> {
        while let Some(frame) = reader.next_frame()? {
            let frame = self.prepare(frame, label)?;
            for analyzer in analyzers.iter_mut() {
                analyzer.process_frame(&frame, &self.types)?;
            }
            self.n_frames += 1;
        }
        Ok(())
    }

    fn prepare(&mut self, mut frame: Frame, label: &str) -> TrajResult<Frame> {
        frame.index = self.n_frames;
        match self.n_atoms {
            None => self.n_atoms = Some(frame.n_atoms),
            Some(n) if n != frame.n_atoms => {
                return Err(TrajError::Mismatch(format!(
                    "{label}: frame {} holds {} particles, earlier frames hold {n}",
                    frame.index, frame.n_atoms
                )))
            }
            Some(_) => {}
        }
        frame.validate()?;

        if let Some(names) = &frame.names {
            let ids = self.types.intern_all(names);
            if self.fallback_types.is_none() {
                self.fallback_types = Some(ids.clone());
            }
            frame.types = Some(ids);
        } else if frame.types.is_none() {
            frame.types = self.fallback_types.clone();
        }
        fill_from(&mut frame.masses, &mut self.fallback_masses);
        fill_from(&mut frame.diameters, &mut self.fallback_diameters);
        match (frame.box_, self.fallback_box) {
            (None, fallback) => frame.box_ = fallback,
            (Some(b), None) => self.fallback_box = Some(b),
            (Some(_), Some(_)) => {}
        }
        if let Some(b) = self.box_override {
            frame.box_ = Some(b);
        }

        if let Some(prev) = self.last_time {
            if frame.time <= prev {
                if self.time_regressions == 0 {
                    log::warn!(
                        "{label}: frame {} time {} does not advance past {prev}",
                        frame.index,
                        frame.time
                    );
                }
                self.time_regressions += 1;
            }
        }
        self.last_time = Some(frame.time);
        Ok(frame)
    }
}

fn fill_from<T: Clone>(slot: &mut Option<Vec<T>>, fallback: &mut Option<Vec<T>>) {
    match slot {
        Some(values) if fallback.is_none() => *fallback = Some(values.clone()),
        Some(_) => {}
        None => *slot = fallback.clone(),
    }
}
