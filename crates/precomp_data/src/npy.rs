//! Memory-mapped stores over NumPy `.npy` region arrays.
//!
//! Precomp dumps ship one array per split and store: features as
//! (num_images, regions, feature_dim) and boxes as (num_images, regions,
//! box_dim), little-endian f32, C order. The header is parsed by hand and the
//! data region is either memory-mapped (default) or copied into memory,
//! selected through [`StoreMode`].

use crate::types::{DatasetResult, PrecompError, StoreMode};
use memmap2::{Mmap, MmapOptions};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const NPY_MAGIC: &[u8; 6] = b"\x93NUMPY";

/// Parsed `.npy` preamble: validated dtype/order plus the array geometry.
#[derive(Debug, Clone, PartialEq, Eq)]
struct NpyHeader {
    shape: Vec<usize>,
    /// Byte offset of the first data element.
    data_offset: usize,
}

fn npy_error(path: &Path, msg: impl Into<String>) -> PrecompError {
    PrecompError::Npy {
        path: path.to_path_buf(),
        msg: msg.into(),
    }
}

/// Extracts the quoted string value for `key` out of the header dict literal.
fn dict_str_value(header: &str, key: &str) -> Option<String> {
    let rest = dict_value_start(header, key)?;
    let quote = rest.chars().next()?;
    if quote != '\'' && quote != '"' {
        return None;
    }
    let rest = &rest[1..];
    let end = rest.find(quote)?;
    Some(rest[..end].to_string())
}

fn dict_bool_value(header: &str, key: &str) -> Option<bool> {
    let rest = dict_value_start(header, key)?;
    if rest.starts_with("True") {
        Some(true)
    } else if rest.starts_with("False") {
        Some(false)
    } else {
        None
    }
}

fn dict_shape_value(header: &str, key: &str) -> Option<Vec<usize>> {
    let rest = dict_value_start(header, key)?;
    let rest = rest.strip_prefix('(')?;
    let inner = &rest[..rest.find(')')?];
    let mut dims = Vec::new();
    for part in inner.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        dims.push(part.parse().ok()?);
    }
    Some(dims)
}

/// Positions after the `:` following `'key'` in the dict literal.
fn dict_value_start<'a>(header: &'a str, key: &str) -> Option<&'a str> {
    let key_pat = format!("'{key}'");
    let rest = &header[header.find(&key_pat)? + key_pat.len()..];
    Some(rest.trim_start().strip_prefix(':')?.trim_start())
}

/// Parses and validates the `.npy` preamble from the start of the file bytes.
///
/// Accepts format versions 1.x (u16 header length) and 2.x/3.x (u32). The
/// dtype must be `<f4` and the array must be C order; anything else is
/// rejected with an error naming the offending field.
fn parse_header(path: &Path, raw: &[u8]) -> DatasetResult<NpyHeader> {
    if raw.len() < 10 {
        return Err(npy_error(path, "file too small for an npy header"));
    }
    if &raw[0..6] != NPY_MAGIC {
        return Err(npy_error(path, "bad magic (not an npy file)"));
    }
    let major = raw[6];
    let (header_len, header_start): (usize, usize) = match major {
        1 => (u16::from_le_bytes([raw[8], raw[9]]) as usize, 10),
        2 | 3 => {
            if raw.len() < 12 {
                return Err(npy_error(path, "file too small for an npy v2 header"));
            }
            (
                u32::from_le_bytes([raw[8], raw[9], raw[10], raw[11]]) as usize,
                12,
            )
        }
        other => {
            return Err(npy_error(path, format!("unsupported npy version {other}")));
        }
    };
    let header_end = header_start
        .checked_add(header_len)
        .ok_or_else(|| npy_error(path, "header length overflow"))?;
    if raw.len() < header_end {
        return Err(npy_error(path, "header truncated"));
    }
    let header = std::str::from_utf8(&raw[header_start..header_end])
        .map_err(|_| npy_error(path, "header is not valid utf-8"))?;

    let descr = dict_str_value(header, "descr")
        .ok_or_else(|| npy_error(path, "missing or malformed 'descr' field"))?;
    if descr != "<f4" {
        return Err(npy_error(
            path,
            format!("unsupported dtype {descr:?} (want little-endian f32 '<f4')"),
        ));
    }
    let fortran = dict_bool_value(header, "fortran_order")
        .ok_or_else(|| npy_error(path, "missing or malformed 'fortran_order' field"))?;
    if fortran {
        return Err(npy_error(path, "fortran-order arrays are not supported"));
    }
    let shape = dict_shape_value(header, "shape")
        .ok_or_else(|| npy_error(path, "missing or malformed 'shape' field"))?;

    Ok(NpyHeader {
        shape,
        data_offset: header_end,
    })
}

enum StoreBacking {
    Owned(Vec<f32>),
    Mmap { mmap: Arc<Mmap>, data_offset: usize },
}

/// One split-level region array: `items` records of `rows` x `cols` f32
/// values, read-only after open.
pub struct RegionStore {
    path: PathBuf,
    backing: StoreBacking,
    items: usize,
    rows: usize,
    cols: usize,
}

impl RegionStore {
    /// Opens with the backing selected by `PRECOMP_STORE_MODE` (mmap unless
    /// overridden).
    pub fn open(path: &Path) -> DatasetResult<Self> {
        Self::open_with_mode(path, StoreMode::from_env())
    }

    pub fn open_with_mode(path: &Path, mode: StoreMode) -> DatasetResult<Self> {
        let mut file = File::open(path).map_err(|e| PrecompError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        match mode {
            StoreMode::Mmap => {
                let mmap = unsafe {
                    MmapOptions::new().map(&file).map_err(|e| PrecompError::Io {
                        path: path.to_path_buf(),
                        source: e,
                    })?
                };
                let header = parse_header(path, &mmap)?;
                let (items, rows, cols) = validate_geometry(path, &header, mmap.len())?;
                Ok(RegionStore {
                    path: path.to_path_buf(),
                    backing: StoreBacking::Mmap {
                        mmap: Arc::new(mmap),
                        data_offset: header.data_offset,
                    },
                    items,
                    rows,
                    cols,
                })
            }
            StoreMode::InMemory => {
                let mut raw = Vec::new();
                file.read_to_end(&mut raw).map_err(|e| PrecompError::Io {
                    path: path.to_path_buf(),
                    source: e,
                })?;
                let header = parse_header(path, &raw)?;
                let (items, rows, cols) = validate_geometry(path, &header, raw.len())?;
                let mut data = Vec::with_capacity(items * rows * cols);
                for chunk in raw[header.data_offset..]
                    .chunks_exact(4)
                    .take(items * rows * cols)
                {
                    let mut arr = [0u8; 4];
                    arr.copy_from_slice(chunk);
                    data.push(f32::from_le_bytes(arr));
                }
                Ok(RegionStore {
                    path: path.to_path_buf(),
                    backing: StoreBacking::Owned(data),
                    items,
                    rows,
                    cols,
                })
            }
        }
    }

    /// Number of records (images).
    pub fn len(&self) -> usize {
        self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items == 0
    }

    /// Regions per record.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Values per region (feature_dim or box_dim).
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Copies one record out as a row-major [rows * cols] vector.
    pub fn item(&self, index: usize) -> DatasetResult<Vec<f32>> {
        if index >= self.items {
            return Err(PrecompError::IndexOutOfRange {
                what: "image",
                index,
                len: self.items,
            });
        }
        let elems = self.rows * self.cols;
        match &self.backing {
            StoreBacking::Owned(data) => {
                let start = index * elems;
                Ok(data[start..start + elems].to_vec())
            }
            StoreBacking::Mmap { mmap, data_offset } => {
                let bytes = elems * std::mem::size_of::<f32>();
                let start = data_offset
                    .checked_add(index * bytes)
                    .ok_or_else(|| npy_error(&self.path, "record offset overflow"))?;
                let end = start + bytes;
                if end > mmap.len() {
                    return Err(npy_error(&self.path, "mmap truncated for requested record"));
                }
                let mut out = Vec::with_capacity(elems);
                for chunk in mmap[start..end].chunks_exact(4) {
                    let mut arr = [0u8; 4];
                    arr.copy_from_slice(chunk);
                    out.push(f32::from_le_bytes(arr));
                }
                Ok(out)
            }
        }
    }
}

/// Checks the header shape is 3-dimensional and the data region holds the
/// full array; returns (items, rows, cols).
fn validate_geometry(
    path: &Path,
    header: &NpyHeader,
    file_len: usize,
) -> DatasetResult<(usize, usize, usize)> {
    if header.shape.len() != 3 {
        return Err(npy_error(
            path,
            format!(
                "expected a (num_images, regions, dim) array, got {} dims",
                header.shape.len()
            ),
        ));
    }
    let (items, rows, cols) = (header.shape[0], header.shape[1], header.shape[2]);
    let total_bytes = items
        .checked_mul(rows)
        .and_then(|v| v.checked_mul(cols))
        .and_then(|v| v.checked_mul(std::mem::size_of::<f32>()))
        .ok_or_else(|| npy_error(path, "array size overflow"))?;
    let data_end = header
        .data_offset
        .checked_add(total_bytes)
        .ok_or_else(|| npy_error(path, "array size overflow"))?;
    if file_len < data_end {
        return Err(npy_error(
            path,
            format!("data region truncated: need {data_end} bytes, file has {file_len}"),
        ));
    }
    Ok((items, rows, cols))
}
