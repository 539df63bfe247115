use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::FieldParams;
use crate::error::{WarpError, WarpResult};
use crate::recording::buffer::{RecordingBuffer, WriteMode};
use crate::simulation::{DisplacementField, Falloff, PointerState};

static NEXT_CONTROLLER_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TransportState {
    #[default]
    Idle,
    Recording,
    Playing,
}

/// What a new recording does with the previous take
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RecordMode {
    /// Clear the buffer and record from scratch
    #[default]
    Overwrite,
    /// Keep the buffer and add new input on top of it
    Layered,
}

impl RecordMode {
    fn write_mode(self) -> WriteMode {
        match self {
            Self::Overwrite => WriteMode::Overwrite,
            Self::Layered => WriteMode::Accumulate,
        }
    }
}

/// Receives the whole elapsed seconds while recording or playing
pub trait TimeDisplay {
    fn set_time(&mut self, seconds: u64);
}

/// Shared slot allowing a single controller to record at a time.
///
/// Cloning shares the slot. Controllers without a lock never contend.
#[derive(Clone, Debug, Default)]
pub struct RecordLock {
    owner: Arc<AtomicU64>,
}

impl RecordLock {
    pub fn new() -> Self {
        Self::default()
    }

    fn try_acquire(&self, id: u64) -> bool {
        match self.owner.compare_exchange(0, id, Ordering::AcqRel, Ordering::Acquire) {
            Ok(_) => true,
            Err(current) => current == id,
        }
    }

    fn release(&self, id: u64) {
        let _ = self
            .owner
            .compare_exchange(id, 0, Ordering::AcqRel, Ordering::Acquire);
    }

    pub fn is_held(&self) -> bool {
        self.owner.load(Ordering::Acquire) != 0
    }
}

/// Idle / Recording / Playing state machine with its frame index and clock
#[derive(Debug)]
pub struct TransportController {
    id: u64,
    state: TransportState,
    mode: RecordMode,
    frame_index: usize,
    /// Simulated seconds: admitted ticks times the tick interval
    elapsed: f64,
    loop_playback: bool,
    lock: Option<RecordLock>,
}

impl TransportController {
    pub fn new(loop_playback: bool, lock: Option<RecordLock>) -> Self {
        Self {
            id: NEXT_CONTROLLER_ID.fetch_add(1, Ordering::Relaxed),
            state: TransportState::Idle,
            mode: RecordMode::Overwrite,
            frame_index: 0,
            elapsed: 0.0,
            loop_playback,
            lock,
        }
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn mode(&self) -> RecordMode {
        self.mode
    }

    pub fn frame_index(&self) -> usize {
        self.frame_index
    }

    pub fn elapsed(&self) -> Duration {
        Duration::from_secs_f64(self.elapsed)
    }

    pub fn set_loop_playback(&mut self, enabled: bool) {
        self.loop_playback = enabled;
    }

    fn expect_idle(&self, action: &'static str) -> WarpResult<()> {
        if self.state == TransportState::Idle {
            Ok(())
        } else {
            Err(WarpError::InvalidTransition {
                state: self.state,
                action,
            })
        }
    }

    pub fn start_recording(
        &mut self,
        mode: RecordMode,
        buffer: &mut RecordingBuffer,
        field: &mut DisplacementField,
        reset_field: bool,
    ) -> WarpResult<()> {
        self.expect_idle("start recording")?;
        if let Some(lock) = &self.lock {
            if !lock.try_acquire(self.id) {
                return Err(WarpError::RecorderBusy);
            }
        }

        if mode == RecordMode::Overwrite {
            buffer.clear();
        }
        // a layered take accumulates only new input on top of the stored frames
        if reset_field || mode == RecordMode::Layered {
            field.clear();
        }
        self.mode = mode;
        self.frame_index = 0;
        self.elapsed = 0.0;
        self.state = TransportState::Recording;
        log::info!("Recording started ({:?})", mode);
        Ok(())
    }

    pub fn stop_recording(&mut self) -> WarpResult<()> {
        if self.state != TransportState::Recording {
            return Err(WarpError::InvalidTransition {
                state: self.state,
                action: "stop recording",
            });
        }
        self.finish();
        Ok(())
    }

    pub fn play(&mut self, buffer: &RecordingBuffer) -> WarpResult<()> {
        self.expect_idle("play")?;
        if buffer.is_empty() {
            return Err(WarpError::InvalidTransition {
                state: self.state,
                action: "play an empty recording",
            });
        }
        self.frame_index = 0;
        self.elapsed = 0.0;
        self.state = TransportState::Playing;
        log::info!("Playback started ({} frames)", buffer.recorded_frames());
        Ok(())
    }

    pub fn stop(&mut self) -> WarpResult<()> {
        if self.state != TransportState::Playing {
            return Err(WarpError::InvalidTransition {
                state: self.state,
                action: "stop playback",
            });
        }
        self.finish();
        Ok(())
    }

    /// Return to Idle from any state
    pub fn halt(&mut self) {
        if self.state != TransportState::Idle {
            self.finish();
        }
    }

    fn finish(&mut self) {
        let previous = self.state;
        self.state = TransportState::Idle;
        if previous == TransportState::Recording {
            if let Some(lock) = &self.lock {
                lock.release(self.id);
            }
        }
        log::info!(
            "{:?} stopped after {} frames ({:.2}s)",
            previous,
            self.frame_index,
            self.elapsed
        );
    }

    /// Run one admitted tick. Returns the whole seconds to display, if any.
    pub fn advance(
        &mut self,
        interval: f64,
        field: &mut DisplacementField,
        buffer: &mut RecordingBuffer,
        pointer: &PointerState,
        params: &FieldParams,
        falloff: Falloff,
    ) -> Option<u64> {
        match self.state {
            TransportState::Idle => {
                field.step(pointer, params, falloff);
                None
            }
            TransportState::Recording => {
                field.step(pointer, params, falloff);
                match buffer.write_frame(self.frame_index, field.data(), self.mode.write_mode()) {
                    Ok(()) => Some(self.tick_clock(interval)),
                    Err(err) => {
                        log::info!("Recording auto-stopped: {}", err);
                        self.finish();
                        None
                    }
                }
            }
            TransportState::Playing => {
                let copied = buffer
                    .read_frame(self.frame_index)
                    .and_then(|frame| field.copy_from(frame));
                if let Err(err) = copied {
                    log::info!("Playback auto-stopped: {}", err);
                    self.finish();
                    field.step(pointer, params, falloff);
                    return None;
                }

                let seconds = self.tick_clock(interval);
                if self.frame_index >= buffer.recorded_frames() {
                    if self.loop_playback {
                        self.frame_index = 0;
                        self.elapsed = 0.0;
                    } else {
                        self.finish();
                    }
                }
                Some(seconds)
            }
        }
    }

    fn tick_clock(&mut self, interval: f64) -> u64 {
        self.frame_index += 1;
        self.elapsed += interval;
        self.elapsed.floor() as u64
    }
}

impl Drop for TransportController {
    fn drop(&mut self) {
        if let Some(lock) = &self.lock {
            lock.release(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::{ChannelLayout, FieldInit, GridDimensions};

    struct Rig {
        field: DisplacementField,
        buffer: RecordingBuffer,
        transport: TransportController,
        params: FieldParams,
    }

    impl Rig {
        fn new(frames: u32) -> Self {
            let dims = GridDimensions::new(4, 4);
            let field = DisplacementField::new(dims, ChannelLayout::Rg, FieldInit::Noise { seed: Some(1) });
            let buffer = RecordingBuffer::allocate(dims.frame_size(ChannelLayout::Rg), frames, 1.0, Some(dims));
            Self {
                field,
                buffer,
                transport: TransportController::new(false, None),
                params: FieldParams::default(),
            }
        }

        fn tick(&mut self) -> Option<u64> {
            self.transport.advance(
                0.25,
                &mut self.field,
                &mut self.buffer,
                &PointerState::default(),
                &self.params,
                Falloff::Linear,
            )
        }

        fn record(&mut self, mode: RecordMode) -> WarpResult<()> {
            self.transport.start_recording(mode, &mut self.buffer, &mut self.field, false)
        }
    }

    #[test]
    fn test_record_then_play_replays_exactly() {
        let mut rig = Rig::new(10);
        rig.record(RecordMode::Overwrite).unwrap();
        let mut recorded = Vec::new();
        for _ in 0..3 {
            rig.tick();
            recorded.push(rig.field.data().to_vec());
        }
        rig.transport.stop_recording().unwrap();
        assert_eq!(rig.buffer.recorded_frames(), 3);

        rig.transport.play(&rig.buffer).unwrap();
        for expected in &recorded {
            rig.tick();
            assert_eq!(rig.field.data(), expected.as_slice());
        }
        // playback ends on its own after the last frame
        assert_eq!(rig.transport.state(), TransportState::Idle);
    }

    #[test]
    fn test_overflow_auto_stops() {
        let mut rig = Rig::new(2);
        rig.record(RecordMode::Overwrite).unwrap();
        assert_eq!(rig.tick(), Some(0));
        assert_eq!(rig.tick(), Some(0));
        let before = rig.buffer.as_slice().to_vec();

        assert_eq!(rig.tick(), None);
        assert_eq!(rig.transport.state(), TransportState::Idle);
        assert_eq!(rig.buffer.as_slice(), before.as_slice());
        assert_eq!(rig.buffer.recorded_frames(), 2);
    }

    #[test]
    fn test_play_without_frames_is_noop() {
        let mut rig = Rig::new(4);
        let err = rig.transport.play(&rig.buffer).unwrap_err();
        assert!(matches!(err, WarpError::InvalidTransition { .. }));
        assert_eq!(rig.transport.state(), TransportState::Idle);
    }

    #[test]
    fn test_invalid_transitions_leave_state() {
        let mut rig = Rig::new(4);
        assert!(rig.transport.stop().is_err());
        assert!(rig.transport.stop_recording().is_err());

        rig.record(RecordMode::Overwrite).unwrap();
        assert!(rig.record(RecordMode::Overwrite).is_err());
        assert!(rig.transport.play(&rig.buffer).is_err());
        assert!(rig.transport.stop().is_err());
        assert_eq!(rig.transport.state(), TransportState::Recording);

        rig.tick();
        rig.transport.stop_recording().unwrap();
        rig.transport.play(&rig.buffer).unwrap();
        assert!(rig.transport.play(&rig.buffer).is_err());
        assert!(rig.record(RecordMode::Overwrite).is_err());
        assert_eq!(rig.transport.state(), TransportState::Playing);
    }

    #[test]
    fn test_elapsed_seconds_published() {
        let mut rig = Rig::new(20);
        assert_eq!(rig.tick(), None);
        rig.record(RecordMode::Overwrite).unwrap();
        let published: Vec<Option<u64>> = (0..6).map(|_| rig.tick()).collect();
        assert_eq!(
            published,
            vec![Some(0), Some(0), Some(0), Some(1), Some(1), Some(1)]
        );
        assert_eq!(rig.transport.elapsed(), Duration::from_secs_f64(1.5));
    }

    #[test]
    fn test_loop_playback_wraps() {
        let mut rig = Rig::new(4);
        rig.transport.set_loop_playback(true);
        rig.record(RecordMode::Overwrite).unwrap();
        rig.tick();
        rig.tick();
        rig.transport.stop_recording().unwrap();
        let first = rig.buffer.read_frame(0).unwrap().to_vec();

        rig.transport.play(&rig.buffer).unwrap();
        rig.tick();
        rig.tick();
        assert_eq!(rig.transport.state(), TransportState::Playing);
        assert_eq!(rig.transport.frame_index(), 0);
        rig.tick();
        assert_eq!(rig.field.data(), first.as_slice());
    }

    #[test]
    fn test_layered_recording_accumulates() {
        let mut rig = Rig::new(4);
        rig.record(RecordMode::Overwrite).unwrap();
        rig.tick();
        rig.transport.stop_recording().unwrap();
        let base = rig.buffer.read_frame(0).unwrap().to_vec();

        rig.record(RecordMode::Layered).unwrap();
        assert_eq!(rig.buffer.recorded_frames(), 1);
        assert!(rig.field.data().iter().all(|v| *v == 0.0));
        rig.tick();
        rig.tick();
        rig.transport.stop_recording().unwrap();

        // no input: the base take must come through untouched
        let layered = rig.buffer.read_frame(0).unwrap();
        let same_bits = layered.iter().zip(&base).all(|(a, b)| a.to_bits() == b.to_bits());
        assert!(same_bits);
        assert_eq!(rig.buffer.recorded_frames(), 2);
        assert!(rig.buffer.read_frame(1).unwrap().iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_layered_recording_adds_new_input() {
        let mut rig = Rig::new(4);
        rig.record(RecordMode::Overwrite).unwrap();
        rig.tick();
        rig.transport.stop_recording().unwrap();
        let base = rig.buffer.read_frame(0).unwrap().to_vec();

        rig.record(RecordMode::Layered).unwrap();
        rig.transport.advance(
            0.25,
            &mut rig.field,
            &mut rig.buffer,
            &PointerState {
                x: 0.5,
                y: 0.5,
                v_x: 0.1,
                v_y: 0.1,
                down: true,
            },
            &rig.params,
            Falloff::Linear,
        );
        let live = rig.field.data().to_vec();
        rig.transport.stop_recording().unwrap();

        assert!(live.iter().any(|v| *v != 0.0));
        let layered = rig.buffer.read_frame(0).unwrap();
        for ((sum, b), l) in layered.iter().zip(&base).zip(&live) {
            assert_eq!(*sum, b + l);
        }
    }

    #[test]
    fn test_overwrite_recording_clears_previous_take() {
        let mut rig = Rig::new(4);
        rig.record(RecordMode::Overwrite).unwrap();
        rig.tick();
        rig.tick();
        rig.transport.stop_recording().unwrap();

        rig.record(RecordMode::Overwrite).unwrap();
        assert!(rig.buffer.is_empty());
        assert_eq!(rig.transport.frame_index(), 0);
    }

    #[test]
    fn test_record_lock_is_exclusive() {
        let lock = RecordLock::new();
        let mut a = Rig::new(4);
        let mut b = Rig::new(4);
        a.transport = TransportController::new(false, Some(lock.clone()));
        b.transport = TransportController::new(false, Some(lock.clone()));

        a.record(RecordMode::Overwrite).unwrap();
        assert!(lock.is_held());
        assert!(matches!(b.record(RecordMode::Overwrite), Err(WarpError::RecorderBusy)));
        assert_eq!(b.transport.state(), TransportState::Idle);

        a.transport.stop_recording().unwrap();
        assert!(!lock.is_held());
        b.record(RecordMode::Overwrite).unwrap();
        drop(b);
        assert!(!lock.is_held());
    }

    #[test]
    fn test_failed_read_falls_back_to_idle_step() {
        let mut rig = Rig::new(4);
        rig.record(RecordMode::Overwrite).unwrap();
        rig.tick();
        rig.transport.stop_recording().unwrap();
        rig.transport.play(&rig.buffer).unwrap();
        rig.buffer.clear();

        assert_eq!(rig.tick(), None);
        assert_eq!(rig.transport.state(), TransportState::Idle);
        assert_eq!(rig.field.data().len(), 32);
    }
}
