use crate::error::{NetworkError, Result};
use ahash::AHashMap;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One gene as stored in a bit-vector file: its id plus one tri-state byte per
/// raw sample. The display-name column is not carried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneRow {
    pub id: String,
    pub bits: Vec<u8>,
}

impl GeneRow {
    pub fn new(id: impl Into<String>, bits: impl Into<Vec<u8>>) -> Self {
        Self {
            id: id.into(),
            bits: bits.into(),
        }
    }
}

/// Random access to the gene rows of a data set.
///
/// Every row of a source has exactly `sample_count()` tri-state bytes; sources
/// validate this when they are opened. Implementations may cache rows but are
/// not required to be thread-safe, so callers serialize access.
pub trait RowSource {
    fn row_count(&self) -> usize;
    fn sample_count(&self) -> usize;
    fn row(&mut self, index: usize) -> Result<Arc<GeneRow>>;

    /// A short human-readable name for logs and output headers.
    fn describe(&self) -> String {
        String::from("<rows>")
    }
}

/// An in-memory row source, used by tests and benchmarks.
#[derive(Debug, Clone)]
pub struct MemoryRows {
    rows: Vec<Arc<GeneRow>>,
    sample_count: usize,
}

impl MemoryRows {
    pub fn new(rows: Vec<GeneRow>) -> Result<Self> {
        let sample_count = rows.first().map_or(0, |row| row.bits.len());
        for (i, row) in rows.iter().enumerate() {
            if row.bits.len() != sample_count {
                return Err(NetworkError::format(
                    "<memory>",
                    i + 1,
                    format!(
                        "gene '{}' has {} samples, expected {sample_count}",
                        row.id,
                        row.bits.len()
                    ),
                ));
            }
        }
        Ok(Self {
            rows: rows.into_iter().map(Arc::new).collect(),
            sample_count,
        })
    }

    /// Rows named `g0`, `g1`, ... from bare tri-state strings.
    pub fn from_bit_strings<I, S>(bit_strings: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let rows = bit_strings
            .into_iter()
            .enumerate()
            .map(|(i, bits)| GeneRow::new(format!("g{i}"), bits.as_ref().as_bytes()))
            .collect();
        Self::new(rows)
    }
}

impl RowSource for MemoryRows {
    fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn sample_count(&self) -> usize {
        self.sample_count
    }

    fn row(&mut self, index: usize) -> Result<Arc<GeneRow>> {
        self.rows
            .get(index)
            .cloned()
            .ok_or_else(|| out_of_range("<memory>", index, self.rows.len()))
    }
}

#[derive(Debug, Clone, Copy)]
struct RowLocation {
    offset: u64,
    line: usize,
}

/// A tab-separated bit-vector file:
///
/// ```text
/// ProbeID <TAB> Name <TAB> BitVector        (header, ignored)
/// 1007_s_at <TAB> DDR1 <TAB> 0022221102...
/// ```
///
/// The file is indexed once on open: the byte offset of every row is recorded and
/// every bit-string is checked against the width of the first row. Rows are then
/// read on demand by seeking, through a bounded LRU cache.
pub struct BitVectorFile {
    path: PathBuf,
    reader: BufReader<File>,
    locations: Vec<RowLocation>,
    sample_count: usize,
    cache: RowCache,
    line: Vec<u8>,
}

impl BitVectorFile {
    pub fn open(path: &Path, cache_rows: usize) -> Result<Self> {
        let file = File::open(path).map_err(|e| NetworkError::resource(path, e))?;
        let mut reader = BufReader::new(file);
        let mut line = Vec::with_capacity(4096);

        let header_len = read_trimmed_line(&mut reader, &mut line)
            .map_err(|e| NetworkError::resource(path, e))?;
        if header_len == 0 {
            return Err(NetworkError::format(path, 1, "bit-vector file is empty"));
        }

        let mut offset = header_len as u64;
        let mut line_number = 1usize;
        let mut locations = Vec::new();
        let mut sample_count: Option<usize> = None;

        loop {
            let bytes_read = read_trimmed_line(&mut reader, &mut line)
                .map_err(|e| NetworkError::resource(path, e))?;
            if bytes_read == 0 {
                break;
            }
            line_number += 1;
            let row_offset = offset;
            offset += bytes_read as u64;

            if line.is_empty() {
                continue;
            }
            let row = parse_row(&line, path, line_number)?;
            match sample_count {
                None => sample_count = Some(row.bits.len()),
                Some(expected) if expected != row.bits.len() => {
                    return Err(width_mismatch(path, line_number, &row, expected));
                }
                Some(_) => {}
            }
            locations.push(RowLocation {
                offset: row_offset,
                line: line_number,
            });
        }

        log::debug!(
            "Indexed {} rows of {} from {}",
            locations.len(),
            sample_count.unwrap_or(0),
            path.display()
        );

        Ok(Self {
            path: path.to_path_buf(),
            reader,
            locations,
            sample_count: sample_count.unwrap_or(0),
            cache: RowCache::new(cache_rows),
            line,
        })
    }
}

impl RowSource for BitVectorFile {
    fn row_count(&self) -> usize {
        self.locations.len()
    }

    fn sample_count(&self) -> usize {
        self.sample_count
    }

    fn row(&mut self, index: usize) -> Result<Arc<GeneRow>> {
        if let Some(row) = self.cache.get(index) {
            return Ok(row);
        }
        let location = *self
            .locations
            .get(index)
            .ok_or_else(|| out_of_range(&self.path, index, self.locations.len()))?;

        self.reader
            .seek(SeekFrom::Start(location.offset))
            .map_err(|e| NetworkError::resource(&self.path, e))?;
        let bytes_read = read_trimmed_line(&mut self.reader, &mut self.line)
            .map_err(|e| NetworkError::resource(&self.path, e))?;
        if bytes_read == 0 {
            return Err(NetworkError::resource(
                &self.path,
                io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("row {index} vanished at line {}", location.line),
                ),
            ));
        }

        let row = parse_row(&self.line, &self.path, location.line)?;
        if row.bits.len() != self.sample_count {
            return Err(width_mismatch(&self.path, location.line, &row, self.sample_count));
        }
        let row = Arc::new(row);
        self.cache.insert(index, Arc::clone(&row));
        Ok(row)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Reads one line into `line` without its `\n` / `\r\n` terminator and returns
/// the number of bytes consumed, terminator included.
fn read_trimmed_line<R: BufRead>(reader: &mut R, line: &mut Vec<u8>) -> io::Result<usize> {
    line.clear();
    let bytes_read = reader.read_until(b'\n', line)?;
    if line.last() == Some(&b'\n') {
        line.pop();
    }
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    Ok(bytes_read)
}

fn parse_row(line: &[u8], path: &Path, line_number: usize) -> Result<GeneRow> {
    let mut fields = line.splitn(4, |&b| b == b'\t');
    let (Some(id), Some(_name), Some(bits)) = (fields.next(), fields.next(), fields.next()) else {
        return Err(NetworkError::format(
            path,
            line_number,
            "expected three tab-separated columns: id, name, bit-vector",
        ));
    };
    Ok(GeneRow::new(String::from_utf8_lossy(id).into_owned(), bits))
}

fn width_mismatch(path: &Path, line: usize, row: &GeneRow, expected: usize) -> NetworkError {
    NetworkError::format(
        path,
        line,
        format!(
            "gene '{}' has {} samples, expected {expected}",
            row.id,
            row.bits.len()
        ),
    )
}

fn out_of_range(path: impl AsRef<Path>, index: usize, len: usize) -> NetworkError {
    NetworkError::resource(
        path,
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("row {index} requested from a source of {len} rows"),
        ),
    )
}

/// Least-recently-used row cache, bounded by row count.
///
/// Every access stamps the row with a fresh generation; `order` maps generations
/// back to rows, so its first entry is always the least recently used one.
struct RowCache {
    capacity: usize,
    rows: AHashMap<usize, (u64, Arc<GeneRow>)>,
    order: BTreeMap<u64, usize>,
    generation: u64,
}

impl RowCache {
    fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            rows: AHashMap::with_capacity(capacity),
            order: BTreeMap::new(),
            generation: 0,
        }
    }

    fn get(&mut self, index: usize) -> Option<Arc<GeneRow>> {
        let generation = self.next_generation();
        let (stamp, row) = self.rows.get_mut(&index)?;
        self.order.remove(&*stamp);
        *stamp = generation;
        self.order.insert(generation, index);
        Some(Arc::clone(row))
    }

    fn insert(&mut self, index: usize, row: Arc<GeneRow>) {
        let generation = self.next_generation();
        if let Some((stamp, _)) = self.rows.insert(index, (generation, row)) {
            self.order.remove(&stamp);
        } else if self.rows.len() > self.capacity {
            if let Some((_, oldest)) = self.order.pop_first() {
                self.rows.remove(&oldest);
            }
        }
        self.order.insert(generation, index);
    }

    fn next_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        debug_assert_eq!(self.rows.len(), self.order.len());
        self.rows.len()
    }
}
