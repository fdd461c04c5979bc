//! Safetensors I/O for sessions and results.
//!
//! Session files hold two tensors:
//!   lfp    [trials, samples]        F32 | F64
//!   tones  [trials] or [trials, 1]  F32 | F64 | I32 | I64
//!
//! Results are written as one flat safetensors file with keys
//! `{index}_{session}/{tone}/{mean|freqs|times|power|n_trials}`, where
//! `index` is the session's position in the run.  Two inputs with the same
//! file stem therefore never collide.
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use ndarray::{Array1, Array2};

use crate::error::{LfpError, Result};
use crate::pipeline::{Session, SessionResult, SessionSource};

// ── Low-level safetensors parser ──────────────────────────────────────────────

fn parse_header(bytes: &[u8]) -> Result<(HashMap<String, serde_json::Value>, usize)> {
    if bytes.len() < 8 {
        return Err(LfpError::Format("safetensors file too small".into()));
    }
    let mut len_bytes = [0u8; 8];
    len_bytes.copy_from_slice(&bytes[..8]);
    let n = u64::from_le_bytes(len_bytes) as usize;
    let end = 8usize
        .checked_add(n)
        .filter(|&e| e <= bytes.len())
        .ok_or_else(|| LfpError::Format(format!("header length {n} exceeds file size")))?;
    let header: HashMap<String, serde_json::Value> = serde_json::from_slice(&bytes[8..end])?;
    Ok((header, end))
}

/// Decode one tensor entry to `f64` values plus its shape.
fn read_tensor(bytes: &[u8], data_start: usize, name: &str, entry: &serde_json::Value) -> Result<(Vec<f64>, Vec<usize>)> {
    let bad = |what: &str| LfpError::Format(format!("tensor '{name}': {what}"));

    let dtype = entry["dtype"].as_str().ok_or_else(|| bad("missing dtype"))?;
    let shape: Vec<usize> = entry["shape"]
        .as_array()
        .ok_or_else(|| bad("missing shape"))?
        .iter()
        .map(|v| v.as_u64().map(|d| d as usize).ok_or_else(|| bad("non-integer shape")))
        .collect::<Result<_>>()?;
    let offsets = entry["data_offsets"].as_array().ok_or_else(|| bad("missing data_offsets"))?;
    let (s, e) = match (offsets.first().and_then(|v| v.as_u64()), offsets.get(1).and_then(|v| v.as_u64())) {
        (Some(s), Some(e)) if s <= e => (s as usize, e as usize),
        _ => return Err(bad("malformed data_offsets")),
    };
    let raw = match (data_start.checked_add(s), data_start.checked_add(e)) {
        (Some(lo), Some(hi)) => bytes.get(lo..hi),
        _ => None,
    }
    .ok_or_else(|| bad("data_offsets out of bounds"))?;

    let values: Vec<f64> = match dtype {
        "F32" => raw.chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f64)
            .collect(),
        "F64" => raw.chunks_exact(8)
            .map(|b| f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
            .collect(),
        "I32" => raw.chunks_exact(4)
            .map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f64)
            .collect(),
        "I64" => raw.chunks_exact(8)
            .map(|b| i64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]) as f64)
            .collect(),
        other => return Err(bad(&format!("unsupported dtype {other}"))),
    };

    let expected: usize = shape.iter().product();
    if values.len() != expected {
        return Err(bad(&format!("{} values for shape {shape:?}", values.len())));
    }
    Ok((values, shape))
}

// ── Session reader ────────────────────────────────────────────────────────────

/// Read one session from a safetensors file.  The session id is the file stem.
pub fn read_session(path: &Path) -> Result<Session> {
    let bytes = std::fs::read(path)?;
    let (header, data_start) = parse_header(&bytes)?;

    let lfp_entry = header
        .get("lfp")
        .ok_or_else(|| LfpError::Format(format!("{}: missing 'lfp' tensor", path.display())))?;
    let (lfp, lfp_shape) = read_tensor(&bytes, data_start, "lfp", lfp_entry)?;
    if lfp_shape.len() != 2 {
        return Err(LfpError::Format(format!(
            "{}: 'lfp' must be [trials, samples], got shape {lfp_shape:?}",
            path.display()
        )));
    }
    let trials = Array2::from_shape_vec((lfp_shape[0], lfp_shape[1]), lfp)
        .map_err(|e| LfpError::Format(e.to_string()))?;

    let tones_entry = header
        .get("tones")
        .ok_or_else(|| LfpError::Format(format!("{}: missing 'tones' tensor", path.display())))?;
    let (tones, tones_shape) = read_tensor(&bytes, data_start, "tones", tones_entry)?;
    let flat = match tones_shape.as_slice() {
        [_] => true,
        [_, 1] | [1, _] => true,
        _ => false,
    };
    if !flat {
        return Err(LfpError::Format(format!(
            "{}: 'tones' must be one-dimensional, got shape {tones_shape:?}",
            path.display()
        )));
    }

    let id = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Session::new(id, trials, Array1::from_vec(tones))
}

/// A list of session files, loaded lazily by index.
#[derive(Debug, Clone)]
pub struct SessionFiles {
    paths: Vec<PathBuf>,
}

impl SessionFiles {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }
}

impl SessionSource for SessionFiles {
    fn n_sessions(&self) -> usize {
        self.paths.len()
    }

    fn load(&self, index: usize) -> Result<Session> {
        let path = self.paths.get(index).ok_or_else(|| {
            LfpError::InvalidInput(format!("session index {index} out of range ({} files)", self.paths.len()))
        })?;
        log::debug!("loading session {index} from {}", path.display());
        read_session(path)
    }
}

// ── Generic safetensors builder ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
enum Dtype {
    F64,
    I32,
}

impl Dtype {
    fn name(self) -> &'static str {
        match self {
            Dtype::F64 => "F64",
            Dtype::I32 => "I32",
        }
    }
}

#[derive(Debug)]
struct PendingTensor {
    name: String,
    dtype: Dtype,
    shape: Vec<usize>,
    bytes: Vec<u8>,
}

/// Safetensors writer for F64 and I32 tensors.
///
/// Tensor names must be unique; a repeated name is rejected when it is
/// added, so every byte written is reachable from the header.
///
/// ```rust,no_run
/// use lfp::io::StWriter;
/// use std::path::Path;
/// let mut w = StWriter::new();
/// w.add_f64("signal", &[1.0, 2.0, 3.0], &[3]).unwrap();
/// w.write(Path::new("/tmp/out.safetensors")).unwrap();
/// ```
#[derive(Debug, Default)]
pub struct StWriter {
    tensors: Vec<PendingTensor>,
    names: HashSet<String>,
}

impl StWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    pub fn add_f64(&mut self, name: &str, data: &[f64], shape: &[usize]) -> Result<()> {
        let bytes = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.push(name, Dtype::F64, shape, data.len(), bytes)
    }

    pub fn add_f64_arr1(&mut self, name: &str, arr: &Array1<f64>) -> Result<()> {
        let bytes = arr.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.push(name, Dtype::F64, &[arr.len()], arr.len(), bytes)
    }

    /// Row-major, whatever the memory layout of `arr`.
    pub fn add_f64_arr2(&mut self, name: &str, arr: &Array2<f64>) -> Result<()> {
        let bytes = arr.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.push(name, Dtype::F64, &[arr.nrows(), arr.ncols()], arr.len(), bytes)
    }

    pub fn add_i32(&mut self, name: &str, data: &[i32], shape: &[usize]) -> Result<()> {
        let bytes = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.push(name, Dtype::I32, shape, data.len(), bytes)
    }

    fn push(&mut self, name: &str, dtype: Dtype, shape: &[usize], n: usize, bytes: Vec<u8>) -> Result<()> {
        let expected: usize = shape.iter().product();
        if expected != n {
            return Err(LfpError::Format(format!(
                "tensor '{name}': {n} values for shape {shape:?}"
            )));
        }
        if !self.names.insert(name.to_string()) {
            return Err(LfpError::Format(format!("duplicate tensor name '{name}'")));
        }
        self.tensors.push(PendingTensor { name: name.to_string(), dtype, shape: shape.to_vec(), bytes });
        Ok(())
    }

    /// Header (8-byte length, JSON padded to a multiple of 8) followed by
    /// the tensor bytes in insertion order.
    pub fn write(&self, path: &Path) -> Result<()> {
        use std::io::Write;

        let mut header = serde_json::Map::with_capacity(self.tensors.len());
        let mut offset = 0usize;
        for t in &self.tensors {
            let end = offset + t.bytes.len();
            header.insert(
                t.name.clone(),
                serde_json::json!({
                    "dtype": t.dtype.name(),
                    "shape": t.shape,
                    "data_offsets": [offset, end],
                }),
            );
            offset = end;
        }
        let mut hdr = serde_json::to_vec(&header)?;
        hdr.resize(hdr.len().next_multiple_of(8), b' ');

        let mut f = std::io::BufWriter::new(std::fs::File::create(path)?);
        f.write_all(&(hdr.len() as u64).to_le_bytes())?;
        f.write_all(&hdr)?;
        for t in &self.tensors {
            f.write_all(&t.bytes)?;
        }
        f.flush()?;
        log::debug!("wrote {} tensors ({offset} data bytes) to {}", self.tensors.len(), path.display());
        Ok(())
    }
}

/// Write a session in the layout [`read_session`] expects.
pub fn write_session(session: &Session, path: &Path) -> Result<()> {
    let mut w = StWriter::new();
    w.add_f64_arr2("lfp", &session.trials)?;
    w.add_f64_arr1("tones", &session.tones)?;
    w.write(path)
}

/// Prefix of every tensor written for `r` by [`write_results`].
pub fn result_prefix(r: &SessionResult) -> String {
    format!("{}_{}", r.index, r.id)
}

/// Write every (session, tone) result to one safetensors file.
///
/// Fails with [`LfpError::Format`] if two results share an index.
pub fn write_results(results: &[SessionResult], path: &Path) -> Result<()> {
    let mut w = StWriter::new();
    for r in results {
        let prefix = result_prefix(r);
        for (tone, cond) in &r.conditions {
            let key = |field: &str| format!("{prefix}/{tone}/{field}");
            let n_trials = i32::try_from(cond.n_trials)
                .map_err(|_| LfpError::Format(format!("{}: trial count overflows I32", key("n_trials"))))?;
            w.add_f64_arr1(&key("mean"), &cond.mean)?;
            w.add_f64_arr1(&key("freqs"), &cond.spectrogram.frequencies)?;
            w.add_f64_arr1(&key("times"), &cond.spectrogram.times)?;
            w.add_f64_arr2(&key("power"), &cond.spectrogram.power)?;
            w.add_i32(&key("n_trials"), &[n_trials], &[1])?;
        }
    }
    log::info!("writing {} result tensors for {} sessions", w.len(), results.len());
    w.write(path)
}
