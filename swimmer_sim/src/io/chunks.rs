// swimmer_sim/src/io/chunks.rs

//! A frame-structured container of named, typed 2-D arrays.
//!
//! ```text
//! header  "SWMTRAJ\0" | version: u32 | reserved: u32
//! frame   "FRAM" | chunk count: u32 | chunk*
//! chunk   name len: u16 | name | type tag: u8 | rows: u64 | cols: u32 | payload
//! ```
//!
//! Structural integers are little-endian; payloads are `rows · cols` native-endian values.

use bytemuck::Pod;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::Path;
use tracing::debug;

use swimmer_core::error::SnapshotError;

pub const MAGIC: &[u8; 8] = b"SWMTRAJ\0";
pub const VERSION: u32 = 1;
const FRAME_TAG: &[u8; 4] = b"FRAM";
/// Upper bound on the per-frame index reserved before any chunk header is read.
const MAX_PREALLOCATED_CHUNKS: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ElementType {
    U8 = 0,
    U32 = 1,
    U64 = 2,
    I32 = 3,
    F32 = 4,
    F64 = 5,
}

impl ElementType {
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::U8),
            1 => Some(Self::U32),
            2 => Some(Self::U64),
            3 => Some(Self::I32),
            4 => Some(Self::F32),
            5 => Some(Self::F64),
            _ => None,
        }
    }

    pub fn size(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::U32 | Self::I32 | Self::F32 => 4,
            Self::U64 | Self::F64 => 8,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::U8 => "u8",
            Self::U32 => "u32",
            Self::U64 => "u64",
            Self::I32 => "i32",
            Self::F32 => "f32",
            Self::F64 => "f64",
        }
    }
}

/// A plain value type that can be stored in a chunk.
pub trait Element: Pod {
    const TYPE: ElementType;
}

impl Element for u8 {
    const TYPE: ElementType = ElementType::U8;
}
impl Element for u32 {
    const TYPE: ElementType = ElementType::U32;
}
impl Element for u64 {
    const TYPE: ElementType = ElementType::U64;
}
impl Element for i32 {
    const TYPE: ElementType = ElementType::I32;
}
impl Element for f32 {
    const TYPE: ElementType = ElementType::F32;
}
impl Element for f64 {
    const TYPE: ElementType = ElementType::F64;
}

/// Shape and location of a chunk inside the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkInfo {
    pub element: ElementType,
    pub rows: u64,
    pub cols: u32,
    offset: u64,
    /// Payload size, checked against overflow when the header is read.
    byte_len: u64,
}

impl ChunkInfo {
    fn len(&self) -> usize {
        (self.byte_len / self.element.size() as u64) as usize
    }
}

/// A chunk's values, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk<T> {
    pub rows: u64,
    pub cols: u32,
    pub data: Vec<T>,
}

// --- Reader ---

pub struct ChunkReader {
    file: BufReader<File>,
    frames: Vec<HashMap<String, ChunkInfo>>,
}

fn corrupt(msg: impl Into<String>) -> SnapshotError {
    SnapshotError::Corrupt(msg.into())
}

fn read_array<const N: usize>(r: &mut impl Read) -> Result<[u8; N], SnapshotError> {
    let mut buf = [0u8; N];
    r.read_exact(&mut buf).map_err(|e| match e.kind() {
        ErrorKind::UnexpectedEof => corrupt("unexpected end of file"),
        _ => SnapshotError::Io(e),
    })?;
    Ok(buf)
}

impl ChunkReader {
    /// Opens a container and indexes every frame.
    pub fn open(path: &Path) -> Result<Self, SnapshotError> {
        let file = File::open(path)?;
        let file_len = file.metadata()?.len();
        let mut file = BufReader::new(file);

        let header: [u8; 16] = read_array(&mut file).map_err(|_| SnapshotError::InvalidHeader)?;
        if &header[..8] != MAGIC {
            return Err(SnapshotError::InvalidHeader);
        }
        let version = u32::from_le_bytes([header[8], header[9], header[10], header[11]]);
        if version != VERSION {
            return Err(corrupt(format!("unsupported version {version}")));
        }

        let mut frames = Vec::new();
        loop {
            let mut tag = [0u8; 4];
            match file.read_exact(&mut tag) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e.into()),
            }
            if &tag != FRAME_TAG {
                return Err(corrupt(format!("bad frame tag in frame {}", frames.len())));
            }
            let count = u32::from_le_bytes(read_array(&mut file)?);
            let mut chunks = HashMap::with_capacity((count as usize).min(MAX_PREALLOCATED_CHUNKS));
            for _ in 0..count {
                let (name, info) = Self::read_chunk_header(&mut file)?;
                let end = info
                    .offset
                    .checked_add(info.byte_len)
                    .ok_or_else(|| corrupt(format!("chunk '{name}' size overflows")))?;
                if end > file_len {
                    return Err(corrupt(format!("chunk '{name}' is truncated")));
                }
                file.seek(SeekFrom::Start(end))?;
                chunks.insert(name, info);
            }
            frames.push(chunks);
        }

        debug!("Indexed {} frame(s) in {}", frames.len(), path.display());
        Ok(Self { file, frames })
    }

    fn read_chunk_header(file: &mut BufReader<File>) -> Result<(String, ChunkInfo), SnapshotError> {
        let name_len = u16::from_le_bytes(read_array(file)?) as usize;
        let mut name = vec![0u8; name_len];
        file.read_exact(&mut name)?;
        let name = String::from_utf8(name).map_err(|_| corrupt("chunk name is not UTF-8"))?;

        let [tag] = read_array::<1>(file)?;
        let element = ElementType::from_tag(tag)
            .ok_or_else(|| corrupt(format!("chunk '{name}' has unknown type tag {tag}")))?;
        let rows = u64::from_le_bytes(read_array(file)?);
        let cols = u32::from_le_bytes(read_array(file)?);
        let byte_len = rows
            .checked_mul(cols as u64)
            .and_then(|len| len.checked_mul(element.size() as u64))
            .ok_or_else(|| corrupt(format!("chunk '{name}' size overflows")))?;
        let offset = file.stream_position()?;
        Ok((
            name,
            ChunkInfo {
                element,
                rows,
                cols,
                offset,
                byte_len,
            },
        ))
    }

    pub fn num_frames(&self) -> usize {
        self.frames.len()
    }

    /// True when `frame` itself holds `name`, ignoring the frame-0 fallback.
    pub fn contains(&self, frame: usize, name: &str) -> bool {
        self.frames
            .get(frame)
            .is_some_and(|chunks| chunks.contains_key(name))
    }

    /// Locates `name` in `frame`, falling back to frame 0.
    pub fn info(&self, frame: usize, name: &str) -> Result<ChunkInfo, SnapshotError> {
        let frames = self.frames.len();
        let chunks = self
            .frames
            .get(frame)
            .ok_or(SnapshotError::FrameOutOfRange { frame, frames })?;
        chunks
            .get(name)
            .or_else(|| self.frames[0].get(name))
            .copied()
            .ok_or_else(|| SnapshotError::ChunkNotFound {
                name: name.to_string(),
                frame,
            })
    }

    fn read_payload<T: Element>(&mut self, name: &str, info: &ChunkInfo) -> Result<Vec<T>, SnapshotError> {
        if info.element != T::TYPE {
            return Err(SnapshotError::TypeMismatch {
                name: name.to_string(),
                expected: T::TYPE.name(),
                found: info.element.name(),
            });
        }
        let mut bytes = vec![0u8; info.byte_len as usize];
        self.file.seek(SeekFrom::Start(info.offset))?;
        self.file.read_exact(&mut bytes)?;
        Ok(bytemuck::pod_collect_to_vec(&bytes))
    }

    pub fn read_chunk<T: Element>(&mut self, frame: usize, name: &str) -> Result<Chunk<T>, SnapshotError> {
        let info = self.info(frame, name)?;
        let data = self.read_payload(name, &info)?;
        Ok(Chunk {
            rows: info.rows,
            cols: info.cols,
            data,
        })
    }

    /// Reads a `rows × cols` chunk; any other shape is an error.
    pub fn read_shaped<T: Element>(
        &mut self,
        frame: usize,
        name: &str,
        rows: usize,
        cols: usize,
    ) -> Result<Vec<T>, SnapshotError> {
        let info = self.info(frame, name)?;
        if info.rows as usize != rows || info.cols as usize != cols {
            return Err(SnapshotError::SizeMismatch {
                name: name.to_string(),
                expected: rows * cols,
                found: info.len(),
            });
        }
        self.read_payload(name, &info)
    }

    pub fn read_scalar<T: Element>(&mut self, frame: usize, name: &str) -> Result<T, SnapshotError> {
        Ok(self.read_shaped::<T>(frame, name, 1, 1)?[0])
    }

    /// Reads a scalar stored as either `f32` or `f64`.
    pub fn read_float(&mut self, frame: usize, name: &str) -> Result<f64, SnapshotError> {
        match self.info(frame, name)?.element {
            ElementType::F32 => Ok(self.read_scalar::<f32>(frame, name)? as f64),
            _ => self.read_scalar::<f64>(frame, name),
        }
    }
}

// --- Writer ---

pub struct ChunkWriter {
    out: BufWriter<File>,
    pending: Option<(u32, Vec<u8>)>,
    frames: usize,
}

impl ChunkWriter {
    /// Creates (or truncates) a container and writes its header.
    pub fn create(path: &Path) -> Result<Self, SnapshotError> {
        let mut out = BufWriter::new(File::create(path)?);
        out.write_all(MAGIC)?;
        out.write_all(&VERSION.to_le_bytes())?;
        out.write_all(&0u32.to_le_bytes())?;
        out.flush()?;
        Ok(Self {
            out,
            pending: None,
            frames: 0,
        })
    }

    pub fn frames_written(&self) -> usize {
        self.frames
    }

    pub fn begin_frame(&mut self) -> Result<(), SnapshotError> {
        if self.pending.is_some() {
            return Err(corrupt("begin_frame called while a frame is open"));
        }
        self.pending = Some((0, Vec::new()));
        Ok(())
    }

    /// Adds a `rows × cols` chunk to the open frame.
    pub fn write_chunk<T: Element>(
        &mut self,
        name: &str,
        rows: usize,
        cols: usize,
        data: &[T],
    ) -> Result<(), SnapshotError> {
        if data.len() != rows * cols {
            return Err(SnapshotError::SizeMismatch {
                name: name.to_string(),
                expected: rows * cols,
                found: data.len(),
            });
        }
        let name_len = u16::try_from(name.len())
            .map_err(|_| corrupt(format!("chunk name '{name}' is too long")))?;
        let (count, buf) = self
            .pending
            .as_mut()
            .ok_or_else(|| corrupt("write_chunk called outside a frame"))?;

        buf.extend_from_slice(&name_len.to_le_bytes());
        buf.extend_from_slice(name.as_bytes());
        buf.push(T::TYPE as u8);
        buf.extend_from_slice(&(rows as u64).to_le_bytes());
        buf.extend_from_slice(&(cols as u32).to_le_bytes());
        buf.extend_from_slice(bytemuck::cast_slice(data));
        *count += 1;
        Ok(())
    }

    pub fn write_scalar<T: Element>(&mut self, name: &str, value: T) -> Result<(), SnapshotError> {
        self.write_chunk(name, 1, 1, &[value])
    }

    /// Commits the open frame and flushes it to disk.
    pub fn end_frame(&mut self) -> Result<(), SnapshotError> {
        let (count, buf) = self
            .pending
            .take()
            .ok_or_else(|| corrupt("end_frame called without an open frame"))?;
        self.out.write_all(FRAME_TAG)?;
        self.out.write_all(&count.to_le_bytes())?;
        self.out.write_all(&buf)?;
        self.out.flush()?;
        self.frames += 1;
        Ok(())
    }
}
