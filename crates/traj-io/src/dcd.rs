use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;

use traj_core::error::{TrajError, TrajResult};
use traj_core::frame::Frame;
use traj_core::geom::Vec3;
use traj_core::pbc::TriclinicBox;

use crate::topology::Topology;
use crate::FrameReader;

const READ_BUFFER_BYTES: usize = 1 << 20;

/// Time-step values below this mean "use the header's time step".
const MIN_EXPLICIT_TIME_STEP: f64 = 0.001;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    fn u32(self, raw: [u8; 4]) -> u32 {
        match self {
            ByteOrder::Little => u32::from_le_bytes(raw),
            ByteOrder::Big => u32::from_be_bytes(raw),
        }
    }

    fn u64(self, raw: [u8; 8]) -> u64 {
        match self {
            ByteOrder::Little => u64::from_le_bytes(raw),
            ByteOrder::Big => u64::from_be_bytes(raw),
        }
    }

    fn i32(self, raw: [u8; 4]) -> i32 {
        self.u32(raw) as i32
    }

    fn f32(self, raw: [u8; 4]) -> f32 {
        f32::from_bits(self.u32(raw))
    }

    fn f64(self, raw: [u8; 8]) -> f64 {
        f64::from_bits(self.u64(raw))
    }

    fn is_native(self) -> bool {
        cfg!(target_endian = "little") == (self == ByteOrder::Little)
    }
}

fn word4(bytes: &[u8]) -> [u8; 4] {
    [bytes[0], bytes[1], bytes[2], bytes[3]]
}

fn word8(bytes: &[u8]) -> [u8; 8] {
    [
        bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
    ]
}

/// Fortran unformatted stream: every payload sits between two equal length
/// markers of 4 or 8 bytes.
struct Records<R> {
    inner: R,
    order: ByteOrder,
    marker: usize,
}

impl<R: Read> Records<R> {
    /// Leading marker of the next record, `None` at a clean end of file.
    fn begin(&mut self) -> TrajResult<Option<u64>> {
        let mut raw = [0u8; 8];
        match self.inner.read_exact(&mut raw[..self.marker]) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(err) => return Err(err.into()),
        }
        Ok(Some(if self.marker == 4 {
            self.order.u32(word4(&raw)) as u64
        } else {
            self.order.u64(raw)
        }))
    }

    fn begin_required(&mut self, what: &str) -> TrajResult<u64> {
        self.begin()?
            .ok_or_else(|| TrajError::Parse(format!("DCD file ends before the {what} record")))
    }

    fn finish(&mut self, len: u64, what: &str) -> TrajResult<()> {
        let end = self.begin_required(what)?;
        if end != len {
            return Err(TrajError::Parse(format!(
                "DCD {what} record markers disagree ({len} vs {end})"
            )));
        }
        Ok(())
    }

    fn payload(&mut self, len: u64, what: &str) -> TrajResult<Vec<u8>> {
        let size = usize::try_from(len)
            .map_err(|_| TrajError::Parse(format!("DCD {what} record is too large")))?;
        let mut bytes = vec![0u8; size];
        self.inner.read_exact(&mut bytes)?;
        self.finish(len, what)?;
        Ok(bytes)
    }

    fn skip(&mut self, len: u64, what: &str) -> TrajResult<()> {
        let skipped = io::copy(&mut (&mut self.inner).take(len), &mut io::sink())?;
        if skipped != len {
            return Err(TrajError::Parse(format!("DCD {what} record is truncated")));
        }
        self.finish(len, what)
    }

    /// One record of `count` single-precision values, decoded into `out`.
    fn floats(
        &mut self,
        len: u64,
        count: usize,
        out: &mut Vec<f32>,
        scratch: &mut Vec<u8>,
    ) -> TrajResult<()> {
        if len != (count * 4) as u64 {
            return Err(TrajError::Parse(format!(
                "DCD coordinate record holds {len} bytes, expected {}",
                count * 4
            )));
        }
        out.resize(count, 0.0);
        if self.order.is_native() {
            self.inner.read_exact(bytemuck::cast_slice_mut(&mut out[..]))?;
        } else {
            scratch.resize(count * 4, 0);
            self.inner.read_exact(scratch)?;
            for (dst, raw) in out.iter_mut().zip(scratch.chunks_exact(4)) {
                *dst = self.order.f32(word4(raw));
            }
        }
        self.finish(len, "coordinate")
    }
}

fn is_header_len(len: u64) -> bool {
    len == 84 || len == 164
}

/// Marker width and byte order are whatever makes the first marker a valid
/// header length.
fn sniff_layout(file: &mut (impl Read + Seek)) -> TrajResult<(ByteOrder, usize, u64)> {
    let mut raw = [0u8; 8];
    file.read_exact(&mut raw)?;
    let orders = [ByteOrder::Little, ByteOrder::Big];
    if let Some(order) = orders.into_iter().find(|o| is_header_len(o.u64(raw))) {
        return Ok((order, 8, order.u64(raw)));
    }
    if let Some(order) = orders.into_iter().find(|o| is_header_len(o.u32(word4(&raw)) as u64)) {
        file.seek(SeekFrom::Start(4))?;
        return Ok((order, 4, order.u32(word4(&raw)) as u64));
    }
    Err(TrajError::Unsupported("not a DCD file: unrecognised record marker".into()))
}

/// Control words of the 84-byte CORD header.
#[derive(Debug, Clone, Copy)]
struct Header {
    nset: i32,
    istart: i32,
    nsavc: i32,
    delta: f64,
    charmm: bool,
    has_unitcell: bool,
    four_dims: bool,
    fixed_atoms: bool,
}

impl Header {
    fn parse(raw: &[u8], order: ByteOrder) -> TrajResult<Self> {
        if raw.len() < 84 || &raw[..4] != b"CORD" {
            return Err(TrajError::Parse("DCD header must start with CORD".into()));
        }
        let word = |k: usize| order.i32(word4(&raw[4 + 4 * k..]));
        let charmm = word(19) != 0;
        // CHARMM writes delta as f32 in word 9, X-PLOR as f64 over words 9-10
        let delta = if charmm {
            order.f32(word4(&raw[40..])) as f64
        } else {
            order.f64(word8(&raw[40..]))
        };
        Ok(Self {
            nset: word(0),
            istart: word(1),
            nsavc: word(2),
            delta,
            charmm,
            has_unitcell: charmm && word(10) != 0,
            four_dims: charmm && word(11) != 0,
            fixed_atoms: word(8) != 0,
        })
    }
}

/// Unit-cell record order: X-PLOR stores `[a, b, c, alpha, beta, gamma]`,
/// CHARMM stores `[a, gamma, b, beta, alpha, c]`.
fn cell_to_box(values: [f64; 6], charmm: bool) -> Option<TriclinicBox> {
    let [a, b, c, alpha, beta, gamma] = if charmm {
        [values[0], values[2], values[5], values[4], values[3], values[1]]
    } else {
        values
    };
    if [a, b, c].iter().any(|l| !l.is_finite() || *l <= 1e-6) {
        return None;
    }
    let [alpha, beta, gamma] = [alpha, beta, gamma].map(angle_degrees);
    if ![alpha, beta, gamma].iter().all(|v| v.is_finite()) {
        return None;
    }
    TriclinicBox::from_lattice(a, b, c, alpha, beta, gamma).ok()
}

/// Cosines (|x| <= 1) are converted, anything else is already in degrees.
fn angle_degrees(value: f64) -> f64 {
    if value.abs() <= 1.0 {
        value.acos().to_degrees()
    } else {
        value
    }
}

/// CHARMM/NAMD/X-PLOR DCD reader. Coordinates come from the file; names,
/// masses and the fallback box come from the topology.
///
/// The first file of a trajectory (opened with `first_index == 0`) yields the
/// topology snapshot as frame 0, followed by the binary records. Record frame
/// `i` (global index) is stamped `time_step * freq * i + topology.time`.
pub struct DcdReader {
    label: String,
    records: Records<BufReader<File>>,
    header: Header,
    n_atoms: usize,
    topology: Arc<Topology>,
    time_step: f64,
    freq: f64,
    leading: Option<Frame>,
    next_index: usize,
    decorated: bool,
    scratch: Vec<u8>,
    axes: [Vec<f32>; 3],
}

impl DcdReader {
    /// `time_step` below 0.001 takes the header delta; `freq` of 0 takes the
    /// header's save interval.
    pub fn open(
        path: &Path,
        topology: Arc<Topology>,
        time_step: f64,
        freq: u32,
        first_index: usize,
    ) -> TrajResult<Self> {
        let label = path.display().to_string();
        let mut file = BufReader::with_capacity(READ_BUFFER_BYTES, File::open(path)?);
        let (order, marker, header_len) = sniff_layout(&mut file)?;
        let mut records = Records {
            inner: file,
            order,
            marker,
        };
        let raw = records.payload(header_len, "header")?;
        let header = Header::parse(&raw, order)?;
        if header.four_dims {
            return Err(TrajError::Unsupported(format!("{label}: 4D DCD files are not supported")));
        }
        if header.fixed_atoms {
            return Err(TrajError::Unsupported(format!(
                "{label}: DCD files with fixed atoms are not supported"
            )));
        }

        let title_len = records.begin_required("title")?;
        records.skip(title_len, "title")?;
        let natoms_len = records.begin_required("atom count")?;
        if natoms_len != 4 {
            return Err(TrajError::Parse(format!(
                "{label}: atom count record holds {natoms_len} bytes"
            )));
        }
        let natoms = order.i32(word4(&records.payload(4, "atom count")?));
        let n_atoms = usize::try_from(natoms)
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| TrajError::Parse(format!("{label}: invalid atom count {natoms}")))?;
        topology.check_atoms(n_atoms, &label)?;

        let time_step = if time_step < MIN_EXPLICIT_TIME_STEP {
            header.delta
        } else {
            time_step
        };
        let freq = if freq == 0 {
            header.nsavc.max(0) as f64
        } else {
            freq as f64
        };
        log::debug!(
            "{label}: natoms={n_atoms} nset={} istart={} nsavc={} delta={} charmm={} unitcell={}",
            header.nset,
            header.istart,
            header.nsavc,
            header.delta,
            header.charmm,
            header.has_unitcell
        );

        let leading = (first_index == 0).then(|| topology.initial_frame(0));
        Ok(Self {
            label,
            records,
            header,
            n_atoms,
            topology,
            time_step,
            freq,
            leading,
            next_index: first_index,
            decorated: false,
            scratch: Vec::new(),
            axes: [
                Vec::with_capacity(n_atoms),
                Vec::with_capacity(n_atoms),
                Vec::with_capacity(n_atoms),
            ],
        })
    }

    fn frame_error(&self, msg: &str) -> TrajError {
        TrajError::Parse(format!("{}: frame {}: {msg}", self.label, self.next_index))
    }

    fn read_cell(&mut self, len: u64) -> TrajResult<Option<TriclinicBox>> {
        let values: [f64; 6] = match len {
            24 => {
                let raw = self.records.payload(len, "unit cell")?;
                std::array::from_fn(|k| self.records.order.f32(word4(&raw[4 * k..])) as f64)
            }
            48 => {
                let raw = self.records.payload(len, "unit cell")?;
                std::array::from_fn(|k| self.records.order.f64(word8(&raw[8 * k..])))
            }
            _ => {
                self.records.skip(len, "unit cell")?;
                return Ok(None);
            }
        };
        Ok(cell_to_box(values, self.header.charmm))
    }

    fn read_record_frame(&mut self) -> TrajResult<Option<Frame>> {
        let coord_len = (self.n_atoms * 4) as u64;
        let Some(mut len) = self.records.begin()? else {
            return Ok(None);
        };
        let has_cell = if self.header.charmm {
            self.header.has_unitcell
        } else {
            len != coord_len && (len == 24 || len == 48)
        };
        let mut box_ = None;
        if has_cell {
            box_ = self.read_cell(len)?;
            len = self
                .records
                .begin_required("coordinate")
                .map_err(|_| self.frame_error("truncated after unit cell"))?;
        }
        if len != coord_len {
            return Err(self.frame_error("unexpected DCD coordinate record length"));
        }
        for axis in 0..3 {
            if axis > 0 {
                len = self.records.begin_required("coordinate")?;
            }
            self.records
                .floats(len, self.n_atoms, &mut self.axes[axis], &mut self.scratch)?;
        }

        let [xs, ys, zs] = &self.axes;
        let positions = xs
            .iter()
            .zip(ys)
            .zip(zs)
            .map(|((&x, &y), &z)| Vec3::new(x as f64, y as f64, z as f64))
            .collect();
        let index = self.next_index;
        let time = self.time_step * self.freq * index as f64 + self.topology.time;
        let mut frame = Frame::new(self.n_atoms, time).with_positions(positions);
        frame.index = index;
        frame.box_ = box_.or(self.topology.box_);
        if !self.decorated {
            self.topology.decorate(&mut frame);
            self.decorated = true;
        }
        self.next_index += 1;
        Ok(Some(frame))
    }
}

impl FrameReader for DcdReader {
    fn next_frame(&mut self) -> TrajResult<Option<Frame>> {
        if let Some(frame) = self.leading.take() {
            self.decorated = true;
            self.next_index += 1;
            return Ok(Some(frame));
        }
        self.read_record_frame()
    }

    fn supports_multi_frame_file(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    struct TestDcd<'a> {
        n_atoms: usize,
        nsavc: i32,
        delta: f32,
        charmm_version: i32,
        big_endian: bool,
        unitcell: Option<[f64; 6]>,
        frames: &'a [[Vec<f32>; 3]],
    }

    impl Default for TestDcd<'static> {
        fn default() -> Self {
            Self {
                n_atoms: 1,
                nsavc: 1,
                delta: 1.0,
                charmm_version: 24,
                big_endian: false,
                unitcell: None,
                frames: &[],
            }
        }
    }

    fn topology(n_atoms: usize) -> Arc<Topology> {
        Arc::new(Topology {
            n_atoms,
            time: 0.5,
            positions: Some((0..n_atoms).map(|i| Vec3::new(i as f64, 0.0, 0.0)).collect()),
            velocities: None,
            images: None,
            names: Some((0..n_atoms).map(|i| format!("T{i}")).collect()),
            masses: Some(vec![2.0; n_atoms]),
            diameters: None,
            box_: Some(TriclinicBox::orthorhombic(9.0, 9.0, 9.0).unwrap()),
        })
    }

    fn write_test_dcd(path: &Path, dcd: &TestDcd) {
        let be = dcd.big_endian;
        let i32_bytes = |v: i32| if be { v.to_be_bytes() } else { v.to_le_bytes() };
        let f32_bytes = |v: f32| if be { v.to_be_bytes() } else { v.to_le_bytes() };
        let f64_bytes = |v: f64| if be { v.to_be_bytes() } else { v.to_le_bytes() };
        let mut out = Vec::new();
        let mut record = |payload: &[u8]| {
            let len = i32_bytes(payload.len() as i32);
            out.extend_from_slice(&len);
            out.extend_from_slice(payload);
            out.extend_from_slice(&len);
        };

        let mut header = b"CORD".to_vec();
        let mut icntrl = [0i32; 20];
        icntrl[0] = dcd.frames.len() as i32;
        icntrl[2] = dcd.nsavc;
        icntrl[10] = dcd.unitcell.is_some() as i32;
        icntrl[19] = dcd.charmm_version;
        for (k, value) in icntrl.iter().enumerate() {
            if k == 9 {
                header.extend_from_slice(&f32_bytes(dcd.delta));
            } else {
                header.extend_from_slice(&i32_bytes(*value));
            }
        }
        assert_eq!(header.len(), 84);
        record(&header);

        let mut title = i32_bytes(1).to_vec();
        title.extend_from_slice(&[b' '; 80]);
        record(&title);
        record(&i32_bytes(dcd.n_atoms as i32));

        for frame in dcd.frames {
            if let Some(cell) = dcd.unitcell {
                let payload: Vec<u8> = cell.iter().flat_map(|v| f64_bytes(*v)).collect();
                record(&payload);
            }
            for axis in frame {
                let payload: Vec<u8> = axis.iter().flat_map(|v| f32_bytes(*v)).collect();
                record(&payload);
            }
        }
        File::create(path).unwrap().write_all(&out).unwrap();
    }

    fn one_atom_frame() -> [[Vec<f32>; 3]; 1] {
        [[vec![1.0], vec![2.0], vec![3.0]]]
    }

    #[test]
    fn reject_invalid_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.dcd");
        let mut file = File::create(&path).unwrap();
        file.write_all(&[1, 2, 3, 4]).unwrap();
        let err = DcdReader::open(&path, topology(1), 0.0, 0, 0).err().unwrap();
        match err {
            TrajError::Unsupported(_) | TrajError::Io(_) | TrajError::Parse(_) => {}
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn topology_frame_leads_with_header_timing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("two.dcd");
        let frames = [
            [vec![1.0, 4.0], vec![2.0, 5.0], vec![3.0, 6.0]],
            [vec![1.5, 4.5], vec![2.5, 5.5], vec![3.5, 6.5]],
        ];
        write_test_dcd(
            &path,
            &TestDcd {
                n_atoms: 2,
                nsavc: 5,
                delta: 0.5,
                frames: &frames,
                ..TestDcd::default()
            },
        );

        let mut reader = DcdReader::open(&path, topology(2), 0.0, 0, 0).unwrap();
        let mut all = Vec::new();
        while let Some(frame) = reader.next_frame().unwrap() {
            all.push(frame);
        }
        assert_eq!(all.len(), frames.len() + 1);
        let times: Vec<f64> = all.iter().map(|f| f.time).collect();
        for (got, want) in times.iter().zip([0.5, 3.0, 5.5]) {
            assert!((got - want).abs() < 1e-9, "{times:?}");
        }
        let indices: Vec<usize> = all.iter().map(|f| f.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);

        let top = &all[0];
        assert_eq!(top.positions.as_ref().unwrap()[1], Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(top.names.as_ref().unwrap()[1], "T1");
        assert_eq!(top.box_.unwrap().length().x, 9.0);

        let first = &all[1];
        assert_eq!(first.positions.as_ref().unwrap()[1], Vec3::new(4.0, 5.0, 6.0));
        assert!(first.names.is_none());
        assert_eq!(first.box_.unwrap().length().x, 9.0);
    }

    #[test]
    fn later_files_skip_topology_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("timed.dcd");
        let frames = one_atom_frame();
        write_test_dcd(
            &path,
            &TestDcd {
                nsavc: 10,
                delta: 0.25,
                frames: &frames,
                ..TestDcd::default()
            },
        );
        let mut reader = DcdReader::open(&path, topology(1), 2.0, 3, 4).unwrap();
        let f = reader.next_frame().unwrap().unwrap();
        assert_eq!(f.index, 4);
        assert!((f.time - (2.0 * 3.0 * 4.0 + 0.5)).abs() < 1e-9);
        assert_eq!(f.positions.as_ref().unwrap()[0], Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(f.masses.as_ref().unwrap()[0], 2.0);
        assert!(reader.next_frame().unwrap().is_none());
    }

    #[test]
    fn reads_big_endian_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.dcd");
        let frames = one_atom_frame();
        write_test_dcd(
            &path,
            &TestDcd {
                big_endian: true,
                frames: &frames,
                ..TestDcd::default()
            },
        );
        let mut reader = DcdReader::open(&path, topology(1), 0.0, 0, 1).unwrap();
        let f = reader.next_frame().unwrap().unwrap();
        assert_eq!(f.positions.as_ref().unwrap()[0], Vec3::new(1.0, 2.0, 3.0));
        assert!((f.time - 1.5).abs() < 1e-9);
    }

    #[test]
    fn reads_charmm_unitcell() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("charmm_box.dcd");
        let frames = one_atom_frame();
        // cosines of 90 degrees stored as zero
        write_test_dcd(
            &path,
            &TestDcd {
                unitcell: Some([10.0, 0.0, 20.0, 0.0, 0.0, 30.0]),
                frames: &frames,
                ..TestDcd::default()
            },
        );
        let mut reader = DcdReader::open(&path, topology(1), 0.0, 0, 1).unwrap();
        let b = reader.next_frame().unwrap().unwrap().box_.unwrap();
        assert!((b.length().x - 10.0).abs() < 1e-9);
        assert!((b.length().y - 20.0).abs() < 1e-9);
        assert!((b.length().z - 30.0).abs() < 1e-9);
        assert!(b.tilt().norm() < 1e-9);
    }

    #[test]
    fn zero_unitcell_falls_back_to_topology_box() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zero_box.dcd");
        let frames = one_atom_frame();
        write_test_dcd(
            &path,
            &TestDcd {
                unitcell: Some([0.0; 6]),
                frames: &frames,
                ..TestDcd::default()
            },
        );
        let mut reader = DcdReader::open(&path, topology(1), 0.0, 0, 1).unwrap();
        let f = reader.next_frame().unwrap().unwrap();
        assert_eq!(f.box_.unwrap().length().z, 9.0);
    }

    #[test]
    fn topology_atom_count_must_match() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mismatch.dcd");
        let frames = one_atom_frame();
        write_test_dcd(
            &path,
            &TestDcd {
                frames: &frames,
                ..TestDcd::default()
            },
        );
        let err = DcdReader::open(&path, topology(3), 0.0, 0, 0).err().unwrap();
        assert!(matches!(err, TrajError::Mismatch(_)));
    }

    #[test]
    fn charmm_cell_order_is_remapped() {
        let b = cell_to_box([4.0, 90.0, 5.0, 90.0, 90.0, 6.0], true).unwrap();
        assert!((b.length().y - 5.0).abs() < 1e-9);
        assert!((b.length().z - 6.0).abs() < 1e-9);
        assert!(cell_to_box([4.0, 5.0, 0.0, 90.0, 90.0, 90.0], false).is_none());
    }
}
