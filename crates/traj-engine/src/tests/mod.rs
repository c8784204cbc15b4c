use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use super::*;
use traj_core::error::{TrajError, TrajResult};
use traj_core::frame::Frame;
use traj_core::geom::Vec3;
use traj_core::interner::TypeMap;
use traj_core::pbc::TriclinicBox;
use traj_io::{FormatSpec, FrameReader};

struct InMemoryReader {
    frames: VecDeque<Frame>,
}

impl InMemoryReader {
    fn new(frames: Vec<Frame>) -> Self {
        Self {
            frames: frames.into(),
        }
    }
}

impl FrameReader for InMemoryReader {
    fn next_frame(&mut self) -> TrajResult<Option<Frame>> {
        Ok(self.frames.pop_front())
    }

    fn supports_multi_frame_file(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone)]
struct Seen {
    index: usize,
    time: f64,
    types: Option<Vec<u32>>,
    masses: Option<Vec<f64>>,
    diameters: Option<Vec<f64>>,
    box_: Option<TriclinicBox>,
}

type SeenLog = Rc<RefCell<Vec<Seen>>>;

/// Records every frame as it reached the analyzers.
struct Probe {
    base: AnalyzerBase,
    seen: SeenLog,
}

impl Probe {
    fn new(name: &str) -> (Self, SeenLog) {
        let seen = SeenLog::default();
        let probe = Self {
            base: AnalyzerBase::new(Some(name.to_string()), format!("{name}.dat")),
            seen: Rc::clone(&seen),
        };
        (probe, seen)
    }
}

impl Analyzer for Probe {
    fn base(&self) -> &AnalyzerBase {
        &self.base
    }

    fn kind(&self) -> AnalyzerKind {
        AnalyzerKind::Clustering
    }

    fn init(&mut self) -> TrajResult<()> {
        self.seen.borrow_mut().clear();
        Ok(())
    }

    fn process_frame(&mut self, frame: &Frame, _types: &TypeMap) -> TrajResult<()> {
        self.seen.borrow_mut().push(Seen {
            index: frame.index,
            time: frame.time,
            types: frame.types.clone(),
            masses: frame.masses.clone(),
            diameters: frame.diameters.clone(),
            box_: frame.box_,
        });
        Ok(())
    }

    fn finalize(&mut self, _types: &TypeMap) -> TrajResult<AnalysisOutput> {
        let n = self.seen.borrow().len();
        Ok(AnalysisOutput::Clustering(ClusteringOutput {
            frames: self.seen.borrow().iter().map(|s| s.index).collect(),
            n_clusters: vec![1; n],
            max_size: vec![1; n],
        }))
    }
}

fn cube(l: f64) -> TriclinicBox {
    TriclinicBox::orthorhombic(l, l, l).unwrap()
}

fn frame(time: f64, positions: &[[f64; 3]]) -> Frame {
    Frame::new(positions.len(), time)
        .with_positions(positions.iter().copied().map(Vec3::from_array).collect())
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn new_traj(dir: &std::path::Path) -> Trajectory {
    let mut traj = Trajectory::new(FormatSpec::Xyz).unwrap();
    traj.set_output_dir(dir);
    traj
}

#[test]
fn every_analyzer_sees_every_frame_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let mut traj = new_traj(dir.path());
    let (first, first_seen) = Probe::new("first");
    let (second, second_seen) = Probe::new("second");
    traj.attach(first).unwrap();
    traj.attach(second).unwrap();
    let frames = (0..4)
        .map(|k| frame(k as f64, &[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]]))
        .collect();
    let results = traj.analyze_reader(&mut InMemoryReader::new(frames)).unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].name, "first");
    assert_eq!(results[1].name, "second");
    for seen in [&first_seen, &second_seen] {
        let idx: Vec<usize> = seen.borrow().iter().map(|s| s.index).collect();
        assert_eq!(idx, vec![0, 1, 2, 3]);
    }
    assert!(dir.path().join("first.dat").exists());
    assert!(dir.path().join("second.dat").exists());
    assert_eq!(results[0].files, vec![dir.path().join("first.dat")]);
}

#[test]
fn fallbacks_come_from_first_frame_with_field() {
    let mut first = frame(0.0, &[[0.0; 3], [1.0, 0.0, 0.0]])
        .with_names(names(&["B", "A"]))
        .with_masses(vec![2.0, 3.0])
        .with_box(cube(10.0));
    first.diameters = Some(vec![0.5, 0.5]);
    let second = frame(1.0, &[[0.5, 0.0, 0.0], [1.5, 0.0, 0.0]]);
    let dir = tempfile::tempdir().unwrap();
    let mut traj = new_traj(dir.path());
    let (probe, seen) = Probe::new("probe");
    traj.attach(probe).unwrap();
    traj.analyze_reader(&mut InMemoryReader::new(vec![first, second]))
        .unwrap();

    let seen = seen.borrow();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].types, Some(vec![0, 1]));
    assert_eq!(seen[1].types, Some(vec![0, 1]));
    assert_eq!(seen[1].masses, Some(vec![2.0, 3.0]));
    assert_eq!(seen[1].diameters, Some(vec![0.5, 0.5]));
    assert_eq!(seen[1].box_, Some(cube(10.0)));
}

#[test]
fn frame_box_wins_over_fallback_and_override_wins_over_both() {
    let first = frame(0.0, &[[0.0; 3]]).with_box(cube(10.0));
    let second = frame(1.0, &[[0.0; 3]]).with_box(cube(12.0));
    let dir = tempfile::tempdir().unwrap();

    let mut traj = new_traj(dir.path());
    let (probe, seen) = Probe::new("boxes");
    traj.attach(probe).unwrap();
    traj.analyze_reader(&mut InMemoryReader::new(vec![first.clone(), second.clone()]))
        .unwrap();
    assert_eq!(seen.borrow()[1].box_, Some(cube(12.0)));

    traj.set_box(cube(20.0));
    traj.analyze_reader(&mut InMemoryReader::new(vec![first, second]))
        .unwrap();
    let seen = seen.borrow();
    assert_eq!(seen.len(), 2);
    assert!(seen.iter().all(|s| s.box_ == Some(cube(20.0))));
}

#[test]
fn particle_count_change_is_a_mismatch() {
    let dir = tempfile::tempdir().unwrap();
    let mut traj = new_traj(dir.path());
    let (probe, _) = Probe::new("probe");
    traj.attach(probe).unwrap();
    let frames = vec![frame(0.0, &[[0.0; 3], [1.0; 3]]), frame(1.0, &[[0.0; 3]])];
    let err = traj
        .analyze_reader(&mut InMemoryReader::new(frames))
        .unwrap_err();
    assert!(matches!(err, TrajError::Mismatch(_)));
}

#[test]
fn non_increasing_time_is_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let mut traj = new_traj(dir.path());
    let (probe, seen) = Probe::new("probe");
    traj.attach(probe).unwrap();
    let frames = vec![
        frame(2.0, &[[0.0; 3]]),
        frame(1.0, &[[0.0; 3]]),
        frame(1.0, &[[0.0; 3]]),
    ];
    traj.analyze_reader(&mut InMemoryReader::new(frames)).unwrap();
    let times: Vec<f64> = seen.borrow().iter().map(|s| s.time).collect();
    assert_eq!(times, vec![2.0, 1.0, 1.0]);
}

#[test]
fn empty_source_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut traj = new_traj(dir.path());
    let (probe, _) = Probe::new("probe");
    traj.attach(probe).unwrap();
    let err = traj
        .analyze_reader(&mut InMemoryReader::new(Vec::new()))
        .unwrap_err();
    assert!(err.is_config());
}

#[test]
fn analyze_without_files_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut traj = new_traj(dir.path());
    assert!(traj.analyze().unwrap_err().is_config());
}

#[test]
fn duplicate_and_missing_names_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut traj = new_traj(dir.path());
    traj.attach(Probe::new("same").0).unwrap();
    let err = traj.attach(Probe::new("same").0).unwrap_err();
    assert!(err.is_config());
    assert!(matches!(
        traj.remove_analyzer("other"),
        Err(TrajError::Invalid(_))
    ));
    let removed = traj.remove_analyzer("same").unwrap();
    assert_eq!(removed.name(), "same");
    assert!(traj.analyzer_names().is_empty());
}

#[test]
fn missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut traj = new_traj(dir.path());
    let err = traj.add_file(dir.path().join("absent.xyz")).unwrap_err();
    match err {
        TrajError::Io(e) => assert_eq!(e.kind(), std::io::ErrorKind::NotFound),
        other => panic!("unexpected error {other:?}"),
    }
    assert!(traj.files().is_empty());
}

#[test]
fn clustering_through_driver() {
    let dir = tempfile::tempdir().unwrap();
    let mut traj = new_traj(dir.path());
    traj.set_box(cube(10.0));
    traj.attach(Clustering::new(Some("clusters".into()))).unwrap();
    let frames = vec![
        frame(0.0, &[[0.0; 3], [0.5, 0.0, 0.0], [5.0, 5.0, 5.0]]),
        frame(1.0, &[[0.0; 3], [3.0, 0.0, 0.0], [6.0, 0.0, 0.0]]),
    ];
    let results = traj.analyze_reader(&mut InMemoryReader::new(frames)).unwrap();
    let AnalysisOutput::Clustering(out) = &results[0].output else {
        panic!("unexpected output");
    };
    assert_eq!(out.n_clusters, vec![2, 3]);
    assert_eq!(out.max_size, vec![2, 1]);
    let text = std::fs::read_to_string(dir.path().join("clustering.dat")).unwrap();
    assert!(text.starts_with("# cluster statistics per frame"));
}

#[test]
fn rdf_radius_beyond_half_box_fails_at_analyze() {
    let dir = tempfile::tempdir().unwrap();
    let mut traj = new_traj(dir.path());
    traj.set_box(cube(4.0));
    traj.attach(RadialDistribution::new(Some("g".into()), 0.1, 2.5).unwrap())
        .unwrap();
    let frames = vec![frame(0.0, &[[0.0; 3], [1.0, 0.0, 0.0]])];
    let err = traj
        .analyze_reader(&mut InMemoryReader::new(frames))
        .unwrap_err();
    assert!(err.is_config());
}

#[test]
fn msd_uses_frame_times() {
    let dir = tempfile::tempdir().unwrap();
    let mut traj = new_traj(dir.path());
    traj.attach(
        MeanSquaredDisplacement::new(Some("msd".into()))
            .with_unwrap(UnwrapPolicy::Stored)
            .with_types(&["A"]),
    )
    .unwrap();
    let frames = (0..3)
        .map(|k| {
            let t = k as f64;
            frame(0.5 * t, &[[t, 0.0, 0.0]]).with_names(names(&["A"]))
        })
        .collect();
    let results = traj.analyze_reader(&mut InMemoryReader::new(frames)).unwrap();
    let AnalysisOutput::Correlation(out) = &results[0].output else {
        panic!("unexpected output");
    };
    assert_eq!(out.time, vec![0.0, 0.5, 1.0]);
    let series = out.series("A").unwrap();
    assert_eq!(series.total, vec![0.0, 1.0, 4.0]);
    assert!(dir.path().join("msd_A.dat").exists());
}
