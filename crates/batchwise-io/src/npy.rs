//! NumPy `.npy` arrays read by row range.
//!
//! Only the header is parsed when a file is opened. Rows are read on demand
//! with a seek to `data_offset + start * row_bytes`, so a dataset larger
//! than memory can be consumed one window at a time.

use std::fs::File;
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use batchwise_core::{BatchError, BatchResult, Float, Shape, Tensor};
use log::debug;

const MAGIC: &[u8; 6] = b"\x93NUMPY";

/// Element types this reader understands (little-endian only).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DType {
    F4,
    F8,
    I4,
    I8,
}

impl DType {
    pub fn parse(descr: &str) -> BatchResult<DType> {
        match descr {
            "<f4" => Ok(DType::F4),
            "<f8" => Ok(DType::F8),
            "<i4" => Ok(DType::I4),
            "<i8" => Ok(DType::I8),
            other => Err(BatchError::Format(format!("unsupported npy dtype '{}'", other))),
        }
    }

    pub fn descr(&self) -> &'static str {
        match self {
            DType::F4 => "<f4",
            DType::F8 => "<f8",
            DType::I4 => "<i4",
            DType::I8 => "<i8",
        }
    }

    /// Bytes per element.
    pub fn size(&self) -> usize {
        match self {
            DType::F4 | DType::I4 => 4,
            DType::F8 | DType::I8 => 8,
        }
    }

    fn decode<T: Float>(&self, bytes: &[u8], out: &mut Vec<T>) {
        let size = self.size();
        out.reserve(bytes.len() / size);
        for chunk in bytes.chunks_exact(size) {
            let v = match self {
                DType::F4 => f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]) as f64,
                DType::I4 => i32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]) as f64,
                DType::F8 => f64::from_le_bytes(eight(chunk)),
                DType::I8 => i64::from_le_bytes(eight(chunk)) as f64,
            };
            out.push(T::from_f64(v));
        }
    }

    fn encode(&self, v: f64, out: &mut Vec<u8>) {
        match self {
            DType::F4 => out.extend_from_slice(&(v as f32).to_le_bytes()),
            DType::F8 => out.extend_from_slice(&v.to_le_bytes()),
            DType::I4 => out.extend_from_slice(&(v.round() as i32).to_le_bytes()),
            DType::I8 => out.extend_from_slice(&(v.round() as i64).to_le_bytes()),
        }
    }
}

fn eight(chunk: &[u8]) -> [u8; 8] {
    let mut b = [0u8; 8];
    b.copy_from_slice(&chunk[..8]);
    b
}

/// Parsed `.npy` preamble.
#[derive(Debug, Clone, PartialEq)]
pub struct NpyHeader {
    pub dtype: DType,
    pub fortran_order: bool,
    pub shape: Shape,
    /// Byte offset of the first element.
    pub data_offset: u64,
}

impl NpyHeader {
    /// Parse the magic string, version, and header dictionary.
    pub fn read<R: Read>(reader: &mut R) -> BatchResult<NpyHeader> {
        let mut preamble = [0u8; 8];
        reader.read_exact(&mut preamble)?;
        if &preamble[..6] != MAGIC {
            return Err(BatchError::Format("missing npy magic string".to_string()));
        }
        let major = preamble[6];
        let (header_len, prefix_len) = match major {
            1 => {
                let mut len = [0u8; 2];
                reader.read_exact(&mut len)?;
                (u16::from_le_bytes(len) as usize, 10usize)
            }
            2 | 3 => {
                let mut len = [0u8; 4];
                reader.read_exact(&mut len)?;
                (u32::from_le_bytes(len) as usize, 12usize)
            }
            v => return Err(BatchError::Format(format!("unsupported npy version {}", v))),
        };

        let mut dict = vec![0u8; header_len];
        reader.read_exact(&mut dict)?;
        let dict = String::from_utf8(dict)
            .map_err(|_| BatchError::Format("npy header is not valid UTF-8".to_string()))?;

        let descr = dict_value(&dict, "descr")?;
        let descr = descr.trim().trim_matches(|c| c == '\'' || c == '"');
        let fortran_order = match dict_value(&dict, "fortran_order")?.trim() {
            "True" => true,
            "False" => false,
            other => {
                return Err(BatchError::Format(format!("bad fortran_order value '{}'", other)))
            }
        };

        Ok(NpyHeader {
            dtype: DType::parse(descr)?,
            fortran_order,
            shape: parse_shape(&dict)?,
            data_offset: (prefix_len + header_len) as u64,
        })
    }

    /// Number of bytes of one leading-dimension entry.
    pub fn row_bytes(&self) -> u64 {
        (self.shape.row_numel() * self.dtype.size()) as u64
    }
}

/// Text following `'key':` up to the next top-level comma.
fn dict_value<'a>(dict: &'a str, key: &str) -> BatchResult<&'a str> {
    let needle = format!("'{}':", key);
    let start = dict
        .find(&needle)
        .map(|i| i + needle.len())
        .ok_or_else(|| BatchError::Format(format!("npy header has no '{}' entry", key)))?;
    let rest = &dict[start..];
    let mut depth = 0i32;
    for (i, c) in rest.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            ',' | '}' if depth == 0 => return Ok(&rest[..i]),
            _ => {}
        }
    }
    Ok(rest)
}

fn parse_shape(dict: &str) -> BatchResult<Shape> {
    let raw = dict_value(dict, "shape")?.trim();
    let inner = raw
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .ok_or_else(|| BatchError::Format(format!("bad shape tuple '{}'", raw)))?;
    let mut dims = Vec::new();
    for part in inner.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let d = part
            .trim_end_matches('L')
            .parse::<usize>()
            .map_err(|_| BatchError::Format(format!("bad shape entry '{}'", part)))?;
        dims.push(d);
    }
    if dims.is_empty() {
        return Err(BatchError::Format("rank-0 npy arrays cannot be batched".to_string()));
    }
    Ok(Shape::new(dims))
}

/// A `.npy` file known by path and header; no element data is held.
#[derive(Debug, Clone)]
pub struct NpyFile {
    path: PathBuf,
    header: NpyHeader,
}

impl NpyFile {
    /// Read and validate the header without touching the data section.
    pub fn open<P: AsRef<Path>>(path: P) -> BatchResult<NpyFile> {
        let path = path.as_ref().to_path_buf();
        let mut file = File::open(&path)?;
        let header = NpyHeader::read(&mut file)?;
        if header.fortran_order {
            return Err(BatchError::Format(format!(
                "{}: Fortran-ordered arrays are not supported",
                path.display()
            )));
        }

        let expected = header.data_offset + header.row_bytes() * header.shape.leading() as u64;
        let actual = file.metadata()?.len();
        if actual < expected {
            return Err(BatchError::Format(format!(
                "{}: truncated data section ({} bytes, expected {})",
                path.display(),
                actual,
                expected
            )));
        }

        debug!(
            "opened npy file {} dtype={} shape={}",
            path.display(),
            header.dtype.descr(),
            header.shape
        );
        Ok(NpyFile { path, header })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn header(&self) -> &NpyHeader {
        &self.header
    }

    pub fn shape(&self) -> &Shape {
        &self.header.shape
    }

    /// Leading-dimension size.
    pub fn len(&self) -> usize {
        self.header.shape.leading()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Open an independent read handle.
    pub fn reader(&self) -> BatchResult<NpyReader> {
        Ok(NpyReader {
            file: File::open(&self.path)?,
            header: self.header.clone(),
            buf: Vec::new(),
        })
    }

    /// Read rows `[start, end)` through a fresh handle.
    pub fn read_rows<T: Float>(&self, start: usize, end: usize) -> BatchResult<Tensor<T>> {
        self.reader()?.read_rows(start, end)
    }
}

/// Open handle over a `.npy` data section.
pub struct NpyReader {
    file: File,
    header: NpyHeader,
    buf: Vec<u8>,
}

impl NpyReader {
    /// Materialize rows `[start, end)` as a tensor of the file's trailing shape.
    pub fn read_rows<T: Float>(&mut self, start: usize, end: usize) -> BatchResult<Tensor<T>> {
        let rows = self.header.shape.leading();
        if start > end || end > rows {
            return Err(BatchError::IndexOutOfBounds {
                index: end,
                axis: 0,
                size: rows,
            });
        }
        let row_bytes = self.header.row_bytes();
        let offset = self.header.data_offset + start as u64 * row_bytes;
        self.buf.resize(((end - start) as u64 * row_bytes) as usize, 0);
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(&mut self.buf)?;

        let mut data = Vec::new();
        self.header.dtype.decode(&self.buf, &mut data);
        Tensor::new(data, self.header.shape.with_leading(end - start).to_vec())
    }
}

/// Write a tensor as a version 1.0 `.npy` file with the given element type.
pub fn write_npy<T: Float, P: AsRef<Path>>(path: P, tensor: &Tensor<T>, dtype: DType) -> BatchResult<()> {
    let dims = tensor.shape().dims();
    let shape = match dims.len() {
        1 => format!("({},)", dims[0]),
        _ => format!(
            "({})",
            dims.iter().map(|d| d.to_string()).collect::<Vec<_>>().join(", ")
        ),
    };
    let mut dict = format!(
        "{{'descr': '{}', 'fortran_order': False, 'shape': {}, }}",
        dtype.descr(),
        shape
    );
    // magic (6) + version (2) + length (2) + dict + newline, padded to 64
    let unpadded = 10 + dict.len() + 1;
    dict.push_str(&" ".repeat((64 - unpadded % 64) % 64));
    dict.push('\n');
    let header_len = u16::try_from(dict.len())
        .map_err(|_| BatchError::Format("npy header too long for version 1.0".to_string()))?;

    let mut out = BufWriter::new(File::create(path.as_ref())?);
    out.write_all(MAGIC)?;
    out.write_all(&[1, 0])?;
    out.write_all(&header_len.to_le_bytes())?;
    out.write_all(dict.as_bytes())?;

    let mut bytes = Vec::with_capacity(tensor.numel() * dtype.size());
    for &v in tensor.data() {
        dtype.encode(v.to_f64(), &mut bytes);
    }
    out.write_all(&bytes)?;
    out.flush()?;
    Ok(())
}
