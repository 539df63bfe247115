//! Self-describing binary recordings.
//!
//! A payload is a flat run of little-endian `f32`: `[width, height]` followed by
//! whole 2-channel frames of `width × height × 2` values each.

use std::fs;
use std::path::Path;

use crate::config::HEADER_LEN;
use crate::error::{WarpError, WarpResult};
use crate::simulation::{ChannelLayout, GridDimensions};

const PAYLOAD_CHANNELS: usize = 2;

#[derive(Clone, Debug, PartialEq)]
pub struct Payload {
    pub dims: GridDimensions,
    pub frames: Vec<f32>,
}

impl Payload {
    pub fn frame_size(&self) -> usize {
        self.dims.cell_count() * PAYLOAD_CHANNELS
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len() / self.frame_size()
    }

    pub fn frame(&self, index: usize) -> Option<&[f32]> {
        let size = self.frame_size();
        self.frames.get(index * size..(index + 1) * size)
    }

    /// Pack recorded frames, keeping only the first two channels of each cell
    pub fn from_frames(dims: GridDimensions, layout: ChannelLayout, frames: &[f32]) -> Self {
        let frames = match layout {
            ChannelLayout::Rg => frames.to_vec(),
            ChannelLayout::Rgba => frames
                .chunks_exact(layout.channels())
                .flat_map(|cell| [cell[0], cell[1]])
                .collect(),
        };
        Self { dims, frames }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity((HEADER_LEN + self.frames.len()) * 4);
        bytes.extend_from_slice(&(self.dims.width as f32).to_le_bytes());
        bytes.extend_from_slice(&(self.dims.height as f32).to_le_bytes());
        for value in &self.frames {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        bytes
    }

    pub fn decode(bytes: &[u8]) -> WarpResult<Self> {
        if bytes.len() % 4 != 0 {
            return Err(WarpError::payload(format!(
                "length {} is not a whole number of f32 values",
                bytes.len()
            )));
        }
        let values: Vec<f32> = bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        if values.len() < HEADER_LEN {
            return Err(WarpError::payload(format!(
                "data is unreasonably small: {} values",
                values.len()
            )));
        }

        let (width, height) = (values[0], values[1]);
        if !is_dimension(width) || !is_dimension(height) {
            return Err(WarpError::payload(format!(
                "header [{width}, {height}] is not a grid size"
            )));
        }
        let dims = GridDimensions::new(width as u32, height as u32);
        let frames = values[HEADER_LEN..].to_vec();
        let frame_size = dims
            .cell_count()
            .checked_mul(PAYLOAD_CHANNELS)
            .ok_or_else(|| WarpError::payload("grid size overflows"))?;
        if frames.len() % frame_size != 0 {
            return Err(WarpError::payload(format!(
                "{} values do not split into {}x{} frames",
                frames.len(),
                dims.width,
                dims.height
            )));
        }
        Ok(Self { dims, frames })
    }

    pub fn read(path: &Path) -> WarpResult<Self> {
        let bytes = fs::read(path)?;
        Self::decode(&bytes)
    }

    pub fn write(&self, path: &Path) -> WarpResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.encode())?;
        Ok(())
    }
}

fn is_dimension(value: f32) -> bool {
    value >= 1.0 && value.fract() == 0.0 && value <= u32::MAX as f32
}

/// Options for joining recordings made in separate sessions
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConcatOptions {
    pub in_framerate: u32,
    pub out_framerate: u32,
    /// Divide values by this and clamp to [-1, 1]
    pub max: Option<f32>,
}

/// Join payloads end to end, rescaling and dropping frames as requested.
///
/// Every input must share the first one's dimensions, and `out_framerate`
/// must divide `in_framerate`; every `in / out`-th frame is kept.
pub fn concat(payloads: &[Payload], options: ConcatOptions) -> WarpResult<Payload> {
    let ConcatOptions {
        in_framerate,
        out_framerate,
        max,
    } = options;
    if out_framerate == 0 || out_framerate > in_framerate || in_framerate % out_framerate != 0 {
        return Err(WarpError::payload(
            "out_framerate must be a factor of in_framerate",
        ));
    }
    if let Some(max) = max {
        if !(max > 0.0 && max <= 1.0) {
            return Err(WarpError::invalid_parameter("max", max, "in (0, 1]"));
        }
    }
    let Some(first) = payloads.first() else {
        return Err(WarpError::payload("nothing to concatenate"));
    };

    let dims = first.dims;
    let stride = (in_framerate / out_framerate) as usize;
    let mut frames = Vec::new();
    for payload in payloads {
        if payload.dims != dims {
            return Err(WarpError::payload(format!(
                "frame dimension mismatch: {}x{} vs {}x{}",
                payload.dims.width, payload.dims.height, dims.width, dims.height
            )));
        }
        for index in (0..payload.frame_count()).step_by(stride) {
            let Some(frame) = payload.frame(index) else {
                break;
            };
            match max {
                Some(max) => frames.extend(frame.iter().map(|v| (v / max).clamp(-1.0, 1.0))),
                None => frames.extend_from_slice(frame),
            }
        }
        log::debug!(
            "appended {} of {} frames",
            payload.frame_count().div_ceil(stride),
            payload.frame_count()
        );
    }

    Ok(Payload { dims, frames })
}
