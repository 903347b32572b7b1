// ========================================================================================
//
//                              NETWORK OUTPUT SINKS
//
// ========================================================================================
//
// A run streams its results into exactly one `RelationSink`, chosen once from the
// `OutputMode`. Both formats start with the same text preamble:
//
//   #boolnet <dense|sparse> 1
//   header <TAB> key <TAB> value             (one line per entry)
//   list <TAB> low|high|balanced <TAB> count <TAB> id ... (three lines)
//
// Dense files then carry a `matrix <TAB> n <TAB> bits_per_cell` line followed by a
// packed n×n cell matrix addressed by balanced index, written through a memory map.
// Only cells with i < j are stored; the reader mirrors the lower triangle.
//
// Sparse files carry a column header followed by one TSV row per relation, addressed
// by raw gene row and annotated with the contingency counts.

use crate::error::{NetworkError, Result};
use crate::types::{ContingencyCounts, GeneCategory, NetworkHeader, RelationCode, RelationHit};
use ahash::AHashMap;
use itertools::Itertools;
use memmap2::{Mmap, MmapMut, MmapOptions};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Seek, Write};
use std::path::{Path, PathBuf};

const DENSE_MAGIC: &str = "#boolnet dense 1";
const SPARSE_MAGIC: &str = "#boolnet sparse 1";
const SPARSE_COLUMNS: &str = "gene_a\tgene_b\tcode\tscore\tcounts";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Balanced × balanced code matrix.
    Dense,
    /// One row per significant pair.
    Sparse,
}

/// Receives the results of a scan, in order: header, the three gene lists, then
/// the relations.
pub trait RelationSink {
    fn write_header(&mut self, header: &NetworkHeader) -> Result<()>;
    fn write_list(&mut self, category: GeneCategory, ids: &[String]) -> Result<()>;
    /// Called once after the lists, before the first `record`.
    fn begin_relations(&mut self, balanced_count: usize) -> Result<()>;
    fn record(&mut self, hit: &RelationHit) -> Result<()>;
    /// Flushes everything to disk. The file is incomplete until this returns.
    fn finish(&mut self) -> Result<()>;
}

/// Creates the sink for `mode`. Nothing touches `path` until the first write, so a
/// run that fails before its header leaves an existing file at `path` intact.
pub fn open_sink(mode: OutputMode, path: &Path) -> Box<dyn RelationSink> {
    match mode {
        OutputMode::Dense => Box::new(DenseMatrixSink::create(path)),
        OutputMode::Sparse => Box::new(SparsePairSink::create(path)),
    }
}

/// The open writer in `slot`, creating (and truncating) `path` with its format
/// line on first use.
fn lazy_writer<'a>(
    slot: &'a mut Option<BufWriter<File>>,
    path: &Path,
    magic: &str,
) -> Result<&'a mut BufWriter<File>> {
    let writer = match slot.take() {
        Some(writer) => writer,
        None => {
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(true)
                .open(path)
                .map_err(|e| NetworkError::resource(path, e))?;
            let mut writer = BufWriter::new(file);
            writeln!(writer, "{magic}").map_err(|e| NetworkError::resource(path, e))?;
            writer
        }
    };
    Ok(slot.insert(writer))
}

fn write_preamble_header<W: Write>(w: &mut W, header: &NetworkHeader) -> std::io::Result<()> {
    for (key, value) in header.entries() {
        writeln!(w, "header\t{key}\t{value}")?;
    }
    Ok(())
}

fn write_preamble_list<W: Write>(
    w: &mut W,
    category: GeneCategory,
    ids: &[String],
) -> std::io::Result<()> {
    if ids.is_empty() {
        writeln!(w, "list\t{category}\t0")
    } else {
        writeln!(w, "list\t{category}\t{}\t{}", ids.len(), ids.iter().format("\t"))
    }
}

/// Smallest power-of-two cell width (1, 2, 4 or 8 bits) that holds `categories` codes.
pub fn bits_per_cell(categories: usize) -> u32 {
    match categories {
        0..=2 => 1,
        3..=4 => 2,
        5..=16 => 4,
        _ => 8,
    }
}

// ========================================================================================
//                                   Dense matrix
// ========================================================================================

struct MatrixRegion {
    mmap: Option<MmapMut>,
    n: usize,
    bits: u32,
}

impl MatrixRegion {
    fn set(&mut self, i: usize, j: usize, value: u8) {
        let Some(mmap) = self.mmap.as_mut() else {
            return;
        };
        let bit_offset = (i * self.n + j) * self.bits as usize;
        let byte = bit_offset / 8;
        let shift = (bit_offset % 8) as u32;
        let mask = (((1u16 << self.bits) - 1) as u8) << shift;
        mmap[byte] = (mmap[byte] & !mask) | ((value << shift) & mask);
    }
}

pub struct DenseMatrixSink {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    matrix: Option<MatrixRegion>,
}

impl DenseMatrixSink {
    /// The file is created on the first write.
    pub fn create(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            writer: None,
            matrix: None,
        }
    }

    fn writer(&mut self) -> Result<&mut BufWriter<File>> {
        if self.matrix.is_some() {
            return Err(NetworkError::config(
                "dense network preamble written after the matrix was started",
            ));
        }
        lazy_writer(&mut self.writer, &self.path, DENSE_MAGIC)
    }

    /// Allocates the zeroed `n × n` matrix at the current end of the file.
    pub fn start_matrix(&mut self, n: usize, categories: usize) -> Result<()> {
        if self.matrix.is_some() {
            return Err(NetworkError::config("dense network matrix started twice"));
        }
        let bits = bits_per_cell(categories);
        let path = self.path.clone();
        self.writer()?;
        let mut writer = self
            .writer
            .take()
            .ok_or_else(|| NetworkError::config("dense network file is not open"))?;
        writeln!(writer, "matrix\t{n}\t{bits}").map_err(|e| NetworkError::resource(&path, e))?;
        let mut file = writer
            .into_inner()
            .map_err(|e| NetworkError::resource(&path, e.into_error()))?;
        let offset = file
            .stream_position()
            .map_err(|e| NetworkError::resource(&path, e))?;

        let cell_bits = (n as u64)
            .checked_mul(n as u64)
            .and_then(|cells| cells.checked_mul(bits as u64))
            .ok_or_else(|| NetworkError::config(format!("dense matrix of {n} genes is too large")))?;
        let len = cell_bits.div_ceil(8);
        file.set_len(offset + len)
            .map_err(|e| NetworkError::resource(&path, e))?;

        let mmap = if len == 0 {
            None
        } else {
            let len = usize::try_from(len).map_err(|_| {
                NetworkError::config(format!("dense matrix of {n} genes does not fit in memory"))
            })?;
            // SAFETY: the file was created by this sink and is not shared.
            let map = unsafe { MmapOptions::new().offset(offset).len(len).map_mut(&file) }
                .map_err(|e| NetworkError::resource(&path, e))?;
            Some(map)
        };
        log::debug!(
            "Dense matrix: {n}×{n} cells, {bits} bits each, {len} bytes at offset {offset}"
        );
        self.matrix = Some(MatrixRegion { mmap, n, bits });
        Ok(())
    }

    /// Stores `code` for the balanced pair `(i, j)`, `i < j`.
    pub fn set_cell(&mut self, i: usize, j: usize, code: RelationCode) -> Result<()> {
        let matrix = self
            .matrix
            .as_mut()
            .ok_or_else(|| NetworkError::config("dense cell written before the matrix was started"))?;
        if i >= matrix.n || j >= matrix.n {
            return Err(NetworkError::config(format!(
                "dense cell ({i}, {j}) outside a {0}×{0} matrix",
                matrix.n
            )));
        }
        matrix.set(i, j, code.as_u8());
        Ok(())
    }
}

impl RelationSink for DenseMatrixSink {
    fn write_header(&mut self, header: &NetworkHeader) -> Result<()> {
        let path = self.path.clone();
        write_preamble_header(self.writer()?, header).map_err(|e| NetworkError::resource(&path, e))
    }

    fn write_list(&mut self, category: GeneCategory, ids: &[String]) -> Result<()> {
        let path = self.path.clone();
        write_preamble_list(self.writer()?, category, ids)
            .map_err(|e| NetworkError::resource(&path, e))
    }

    fn begin_relations(&mut self, balanced_count: usize) -> Result<()> {
        self.start_matrix(balanced_count, RelationCode::CATEGORIES)
    }

    fn record(&mut self, hit: &RelationHit) -> Result<()> {
        self.set_cell(hit.balanced_a.0 as usize, hit.balanced_b.0 as usize, hit.code)
    }

    fn finish(&mut self) -> Result<()> {
        if self.matrix.is_none() {
            let path = self.path.clone();
            self.writer()?
                .flush()
                .map_err(|e| NetworkError::resource(&path, e))?;
        }
        if let Some(MatrixRegion { mmap: Some(mmap), .. }) = self.matrix.as_ref() {
            mmap.flush().map_err(|e| NetworkError::resource(&self.path, e))?;
        }
        Ok(())
    }
}

/// Read access to a finished dense network file.
pub struct DenseNetwork {
    header: Vec<(String, String)>,
    lists: AHashMap<GeneCategory, Vec<String>>,
    n: usize,
    bits: u32,
    data_offset: usize,
    mmap: Option<Mmap>,
}

impl DenseNetwork {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| NetworkError::resource(path, e))?;
        let len = file.metadata().map_err(|e| NetworkError::resource(path, e))?.len();
        if len == 0 {
            return Err(NetworkError::format(path, 1, "dense network file is empty"));
        }
        // SAFETY: read-only view of a file this process does not modify.
        let mmap = unsafe { Mmap::map(&file) }.map_err(|e| NetworkError::resource(path, e))?;

        let mut header = Vec::new();
        let mut lists = AHashMap::new();
        let mut cursor = 0usize;
        let mut line_number = 0usize;
        loop {
            let Some(newline) = mmap[cursor..].iter().position(|&b| b == b'\n') else {
                return Err(NetworkError::format(path, line_number + 1, "missing matrix line"));
            };
            line_number += 1;
            let line = std::str::from_utf8(&mmap[cursor..cursor + newline]).map_err(|_| {
                NetworkError::format(path, line_number, "preamble is not valid UTF-8")
            })?;
            cursor += newline + 1;

            if line_number == 1 {
                if line != DENSE_MAGIC {
                    return Err(NetworkError::format(path, 1, "not a dense boolnet file"));
                }
                continue;
            }

            let fields: Vec<&str> = line.split('\t').collect();
            match fields.as_slice() {
                ["header", key, value] => header.push((key.to_string(), value.to_string())),
                ["list", category, count, ids @ ..] => {
                    let category = GeneCategory::parse(category).ok_or_else(|| {
                        NetworkError::format(path, line_number, format!("unknown list '{category}'"))
                    })?;
                    if count.parse::<usize>().ok() != Some(ids.len()) {
                        return Err(NetworkError::format(path, line_number, "list count mismatch"));
                    }
                    lists.insert(category, ids.iter().map(|s| s.to_string()).collect());
                }
                ["matrix", n, bits] => {
                    let n: usize = n.parse().map_err(|_| {
                        NetworkError::format(path, line_number, "invalid matrix size")
                    })?;
                    let bits: u32 = match bits.parse() {
                        Ok(b @ (1 | 2 | 4 | 8)) => b,
                        _ => {
                            return Err(NetworkError::format(
                                path,
                                line_number,
                                "invalid cell width",
                            ));
                        }
                    };
                    let needed = (n as u64)
                        .checked_mul(n as u64)
                        .and_then(|cells| cells.checked_mul(bits as u64))
                        .map(|cell_bits| cell_bits.div_ceil(8))
                        .and_then(|bytes| usize::try_from(bytes).ok())
                        .ok_or_else(|| {
                            NetworkError::format(path, line_number, "matrix size overflows")
                        })?;
                    if mmap.len() - cursor < needed {
                        return Err(NetworkError::format(path, line_number, "matrix is truncated"));
                    }
                    return Ok(Self {
                        header,
                        lists,
                        n,
                        bits,
                        data_offset: cursor,
                        mmap: (needed > 0).then_some(mmap),
                    });
                }
                _ => {
                    return Err(NetworkError::format(path, line_number, "unrecognised preamble line"));
                }
            }
        }
    }

    /// Number of balanced genes (matrix side).
    pub fn size(&self) -> usize {
        self.n
    }

    pub fn list(&self, category: GeneCategory) -> &[String] {
        self.lists.get(&category).map_or(&[], Vec::as_slice)
    }

    pub fn header_value(&self, key: &str) -> Option<&str> {
        self.header
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// The relation between balanced genes `i` and `j`, read in that order.
    /// `None` if either index is out of range or the cell holds an unknown code.
    pub fn code(&self, i: usize, j: usize) -> Option<RelationCode> {
        if i >= self.n || j >= self.n {
            return None;
        }
        if i == j {
            return Some(RelationCode::None);
        }
        if i > j {
            return self.code(j, i).map(RelationCode::mirrored);
        }
        let mmap = self.mmap.as_ref()?;
        let bit_offset = (i * self.n + j) * self.bits as usize;
        let byte = mmap[self.data_offset + bit_offset / 8];
        let mask = ((1u16 << self.bits) - 1) as u8;
        RelationCode::from_u8((byte >> (bit_offset % 8)) & mask)
    }
}

// ========================================================================================
//                                    Sparse pairs
// ========================================================================================

pub struct SparsePairSink {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    score_buffer: ryu::Buffer,
}

impl SparsePairSink {
    /// The file is created on the first write.
    pub fn create(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            writer: None,
            score_buffer: ryu::Buffer::new(),
        }
    }

    /// Appends one relation between raw gene rows `i < j`.
    pub fn write_pair(
        &mut self,
        i: usize,
        j: usize,
        code: RelationCode,
        score: f64,
        counts: &ContingencyCounts,
    ) -> Result<()> {
        let [c0, c1, c2, c3] = counts.cells;
        let writer = lazy_writer(&mut self.writer, &self.path, SPARSE_MAGIC)?;
        let score = self.score_buffer.format(score);
        writeln!(
            writer,
            "{i}\t{j}\t{}\t{score}\t{c0},{c1},{c2},{c3}",
            code.as_u8()
        )
        .map_err(|e| NetworkError::resource(&self.path, e))
    }
}

impl RelationSink for SparsePairSink {
    fn write_header(&mut self, header: &NetworkHeader) -> Result<()> {
        let writer = lazy_writer(&mut self.writer, &self.path, SPARSE_MAGIC)?;
        write_preamble_header(writer, header).map_err(|e| NetworkError::resource(&self.path, e))
    }

    fn write_list(&mut self, category: GeneCategory, ids: &[String]) -> Result<()> {
        let writer = lazy_writer(&mut self.writer, &self.path, SPARSE_MAGIC)?;
        write_preamble_list(writer, category, ids)
            .map_err(|e| NetworkError::resource(&self.path, e))
    }

    fn begin_relations(&mut self, _balanced_count: usize) -> Result<()> {
        let writer = lazy_writer(&mut self.writer, &self.path, SPARSE_MAGIC)?;
        writeln!(writer, "{SPARSE_COLUMNS}").map_err(|e| NetworkError::resource(&self.path, e))
    }

    fn record(&mut self, hit: &RelationHit) -> Result<()> {
        self.write_pair(hit.gene_a.0, hit.gene_b.0, hit.code, hit.score, &hit.counts)
    }

    fn finish(&mut self) -> Result<()> {
        lazy_writer(&mut self.writer, &self.path, SPARSE_MAGIC)?
            .flush()
            .map_err(|e| NetworkError::resource(&self.path, e))
    }
}
