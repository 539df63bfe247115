use crate::config::HEADER_LEN;
use crate::error::{WarpError, WarpResult};
use crate::recording::payload::Payload;
use crate::simulation::GridDimensions;

/// How a frame lands in its slot
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WriteMode {
    #[default]
    Overwrite,
    /// Add onto what is already there (layering over an earlier take)
    Accumulate,
}

/// Fixed-capacity flat store of successive field frames.
///
/// Layout: optional `[width, height]` header followed by `max_frames` slots of
/// `frame_size` elements. Capacity never changes after allocation.
#[derive(Clone, Debug, Default)]
pub struct RecordingBuffer {
    data: Vec<f32>,
    header_len: usize,
    frame_size: usize,
    max_frames: usize,
    recorded: usize,
}

impl RecordingBuffer {
    /// Allocate room for `frame_rate × max_duration` frames, discarding any
    /// previous content
    pub fn allocate(
        frame_size: usize,
        frame_rate: u32,
        max_duration: f32,
        header: Option<GridDimensions>,
    ) -> Self {
        let max_frames = (frame_rate as f64 * max_duration as f64).floor().max(0.0) as usize;
        let header_len = if header.is_some() { HEADER_LEN } else { 0 };
        let mut data = vec![0.0; header_len + frame_size * max_frames];
        if let Some(dims) = header {
            data[0] = dims.width as f32;
            data[1] = dims.height as f32;
        }
        Self {
            data,
            header_len,
            frame_size,
            max_frames,
            recorded: 0,
        }
    }

    /// Buffer preloaded with a payload's frames
    pub fn from_payload(payload: &Payload, frame_rate: u32, max_duration: f32) -> Self {
        let frame_size = payload.frame_size();
        let frame_count = payload.frame_count();
        let mut buffer = Self::allocate(frame_size, frame_rate, max_duration, Some(payload.dims));
        if frame_count > buffer.max_frames {
            buffer = Self::allocate(frame_size, 1, frame_count as f32, Some(payload.dims));
        }
        let start = buffer.header_len;
        buffer.data[start..start + payload.frames.len()].copy_from_slice(&payload.frames);
        buffer.recorded = frame_count;
        buffer
    }

    /// Frame storage in elements, header excluded
    pub fn capacity(&self) -> usize {
        self.frame_size * self.max_frames
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    pub fn max_frames(&self) -> usize {
        self.max_frames
    }

    pub fn header_len(&self) -> usize {
        self.header_len
    }

    pub fn recorded_frames(&self) -> usize {
        self.recorded
    }

    pub fn is_empty(&self) -> bool {
        self.recorded == 0
    }

    /// Dimensions stored in the header, if present
    pub fn header(&self) -> Option<GridDimensions> {
        (self.header_len == HEADER_LEN)
            .then(|| GridDimensions::new(self.data[0] as u32, self.data[1] as u32))
    }

    pub fn write_frame(&mut self, frame_index: usize, data: &[f32], mode: WriteMode) -> WarpResult<()> {
        if data.len() != self.frame_size {
            return Err(WarpError::FrameSizeMismatch {
                expected: self.frame_size,
                actual: data.len(),
            });
        }
        let end = frame_index
            .checked_add(1)
            .and_then(|n| n.checked_mul(self.frame_size))
            .filter(|end| *end <= self.capacity());
        let Some(end) = end else {
            return Err(WarpError::CapacityExceeded {
                frame_index,
                capacity: self.capacity(),
            });
        };

        let slot = &mut self.data[self.header_len + end - self.frame_size..self.header_len + end];
        match mode {
            WriteMode::Overwrite => slot.copy_from_slice(data),
            WriteMode::Accumulate => {
                for (stored, value) in slot.iter_mut().zip(data) {
                    *stored += value;
                }
            }
        }
        self.recorded = self.recorded.max(frame_index + 1);
        Ok(())
    }

    pub fn read_frame(&self, frame_index: usize) -> WarpResult<&[f32]> {
        if frame_index >= self.recorded {
            return Err(WarpError::OutOfRange {
                frame_index,
                recorded: self.recorded,
            });
        }
        let start = self.header_len + frame_index * self.frame_size;
        Ok(&self.data[start..start + self.frame_size])
    }

    /// Zero every slot and forget the recorded count; the header stays
    pub fn clear(&mut self) {
        self.data[self.header_len..].fill(0.0);
        self.recorded = 0;
    }

    /// The whole flat buffer, header included
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Header plus the recorded frames only
    pub fn recorded_slice(&self) -> &[f32] {
        &self.data[..self.header_len + self.recorded * self.frame_size]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::ChannelLayout;

    #[test]
    fn test_capacity_full_hd() {
        let dims = GridDimensions::new(120, 67);
        let frame_size = dims.frame_size(ChannelLayout::Rg);
        let buffer = RecordingBuffer::allocate(frame_size, 60, 5.0, Some(dims));
        assert_eq!(buffer.capacity(), 4_824_000);
        assert_eq!(buffer.max_frames(), 300);
        assert_eq!(buffer.as_slice().len(), 4_824_002);
        assert_eq!(buffer.header(), Some(dims));
    }

    #[test]
    fn test_write_read_roundtrip_exact() {
        let mut buffer = RecordingBuffer::allocate(4, 10, 1.0, None);
        let frame = [0.1, -3.5e-9, f32::MIN_POSITIVE, 42.0];
        buffer.write_frame(3, &frame, WriteMode::Overwrite).unwrap();
        let read = buffer.read_frame(3).unwrap();
        let bits: Vec<u32> = read.iter().map(|v| v.to_bits()).collect();
        let expected: Vec<u32> = frame.iter().map(|v| v.to_bits()).collect();
        assert_eq!(bits, expected);
        assert_eq!(buffer.recorded_frames(), 4);
    }

    #[test]
    fn test_overflow_leaves_buffer_unchanged() {
        let mut buffer = RecordingBuffer::allocate(2, 2, 1.0, Some(GridDimensions::new(1, 1)));
        buffer.write_frame(0, &[1.0, 2.0], WriteMode::Overwrite).unwrap();
        buffer.write_frame(1, &[3.0, 4.0], WriteMode::Overwrite).unwrap();
        let before = buffer.as_slice().to_vec();

        let err = buffer.write_frame(2, &[5.0, 6.0], WriteMode::Overwrite).unwrap_err();
        assert!(matches!(err, WarpError::CapacityExceeded { frame_index: 2, capacity: 4 }));
        assert_eq!(buffer.as_slice(), before.as_slice());
        assert_eq!(buffer.recorded_frames(), 2);

        assert!(buffer.write_frame(usize::MAX, &[0.0, 0.0], WriteMode::Overwrite).is_err());
    }

    #[test]
    fn test_read_unwritten_is_out_of_range() {
        let mut buffer = RecordingBuffer::allocate(2, 10, 1.0, None);
        assert!(matches!(buffer.read_frame(0), Err(WarpError::OutOfRange { .. })));
        buffer.write_frame(0, &[1.0, 1.0], WriteMode::Overwrite).unwrap();
        assert!(buffer.read_frame(0).is_ok());
        assert!(buffer.read_frame(1).is_err());
    }

    #[test]
    fn test_accumulate_layers_onto_slot() {
        let mut buffer = RecordingBuffer::allocate(2, 10, 1.0, None);
        buffer.write_frame(0, &[1.0, -1.0], WriteMode::Overwrite).unwrap();
        buffer.write_frame(0, &[0.5, 0.5], WriteMode::Accumulate).unwrap();
        assert_eq!(buffer.read_frame(0).unwrap(), &[1.5, -0.5]);
    }

    #[test]
    fn test_frame_size_checked() {
        let mut buffer = RecordingBuffer::allocate(4, 10, 1.0, None);
        assert!(matches!(
            buffer.write_frame(0, &[0.0; 3], WriteMode::Overwrite),
            Err(WarpError::FrameSizeMismatch { expected: 4, actual: 3 })
        ));
    }

    #[test]
    fn test_clear_keeps_header() {
        let dims = GridDimensions::new(3, 2);
        let mut buffer = RecordingBuffer::allocate(12, 10, 1.0, Some(dims));
        buffer.write_frame(5, &[9.0; 12], WriteMode::Overwrite).unwrap();
        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(buffer.header(), Some(dims));
        assert!(buffer.as_slice()[2..].iter().all(|v| *v == 0.0));
        assert_eq!(buffer.recorded_slice(), &[3.0, 2.0]);
    }
}
