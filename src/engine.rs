use std::time::Duration;

use crate::config::{FieldParams, SimConfig};
use crate::error::{WarpError, WarpResult};
use crate::recording::{
    Payload, RecordLock, RecordMode, RecordingBuffer, TimeDisplay, TransportController,
    TransportState,
};
use crate::simulation::topology::{cell_aspect, derive};
use crate::simulation::{
    ChannelLayout, DisplacementField, Falloff, FrameClock, GridDimensions, GridSizing,
    PointerEvent, PointerState, PointerTracker,
};

/// Read-only view of the field handed to the renderer after a tick
#[derive(Clone, Copy, Debug)]
pub struct Snapshot<'a> {
    pub dims: GridDimensions,
    pub layout: ChannelLayout,
    pub data: &'a [f32],
    pub state: TransportState,
    /// Whether the clock admitted a simulation step this call
    pub stepped: bool,
    /// Whether the grid was reallocated this call
    pub resized: bool,
    /// Whole seconds published this tick (Recording or Playing only)
    pub elapsed_secs: Option<u64>,
}

/// The simulation core: field, input, recording and transport behind a
/// single `tick`
pub struct Simulation {
    config: SimConfig,
    viewport: (f32, f32),
    pending_resize: Option<(f32, f32)>,
    clock: FrameClock,
    pointer: PointerTracker,
    field: DisplacementField,
    recording: RecordingBuffer,
    transport: TransportController,
    /// Base take plus live input, shown while layering
    composite: Vec<f32>,
    show_composite: bool,
    time_display: Option<Box<dyn TimeDisplay>>,
}

impl Simulation {
    pub fn new(config: SimConfig, viewport_width: f32, viewport_height: f32) -> WarpResult<Self> {
        Self::with_lock(config, viewport_width, viewport_height, None)
    }

    /// Build a simulation that shares `lock` with others, so that only one
    /// of them records at a time
    pub fn with_lock(
        config: SimConfig,
        viewport_width: f32,
        viewport_height: f32,
        lock: Option<RecordLock>,
    ) -> WarpResult<Self> {
        config.validate()?;

        let dims = derive(viewport_width, viewport_height, config.sizing);
        let mut field = DisplacementField::new(dims, config.layout, config.init);
        field.set_aspect(cell_aspect(viewport_width, viewport_height, dims));
        let recording = allocate_recording(&config, dims);
        log::info!(
            "Grid {}x{} ({} values per frame, {} frames of storage)",
            dims.width,
            dims.height,
            recording.frame_size(),
            recording.max_frames()
        );

        Ok(Self {
            clock: FrameClock::new(config.tick_interval()),
            pointer: PointerTracker::new(viewport_width, viewport_height),
            transport: TransportController::new(config.loop_playback, lock),
            viewport: (viewport_width, viewport_height),
            pending_resize: None,
            field,
            recording,
            composite: Vec::new(),
            show_composite: false,
            time_display: None,
            config,
        })
    }

    /// Advance by `delta` of wall time and return the field to render
    pub fn tick(&mut self, delta: Duration) -> Snapshot<'_> {
        let stepped = self.clock.advance(delta);
        let mut resized = false;
        let mut elapsed_secs = None;

        if stepped {
            resized = self.apply_pending_resize();
            self.pointer.drain();
            let pointer = self.pointer.state();
            elapsed_secs = self.transport.advance(
                self.clock.interval(),
                &mut self.field,
                &mut self.recording,
                &pointer,
                &self.config.params,
                self.config.falloff,
            );
            self.pointer.decay();
            self.refresh_composite();

            if let (Some(seconds), Some(display)) = (elapsed_secs, self.time_display.as_mut()) {
                display.set_time(seconds);
            }
        }

        Snapshot {
            dims: self.field.dims(),
            layout: self.field.layout(),
            data: if self.show_composite {
                self.composite.as_slice()
            } else {
                self.field.data()
            },
            state: self.transport.state(),
            stepped,
            resized,
            elapsed_secs,
        }
    }

    fn apply_pending_resize(&mut self) -> bool {
        let Some((width, height)) = self.pending_resize.take() else {
            return false;
        };
        self.viewport = (width, height);
        self.pointer.set_viewport(width, height);

        let dims = derive(width, height, self.config.sizing);
        self.field.set_aspect(cell_aspect(width, height, dims));
        if dims == self.field.dims() {
            return false;
        }

        self.transport.halt();
        self.show_composite = false;
        self.field.regenerate(dims);
        self.recording = allocate_recording(&self.config, dims);
        log::info!("Grid resized to {}x{}", dims.width, dims.height);
        true
    }

    fn refresh_composite(&mut self) {
        self.show_composite = false;
        if self.transport.state() != TransportState::Recording
            || self.transport.mode() != RecordMode::Layered
        {
            return;
        }
        let Some(last) = self.transport.frame_index().checked_sub(1) else {
            return;
        };
        if let Ok(frame) = self.recording.read_frame(last) {
            self.composite.clear();
            self.composite.extend_from_slice(frame);
            self.show_composite = true;
        }
    }

    pub fn push_pointer(&mut self, event: PointerEvent) {
        self.pointer.push(event);
    }

    /// Queue a viewport change; it takes effect at the start of the next step
    pub fn request_resize(&mut self, width: f32, height: f32) {
        self.pending_resize = Some((width, height));
    }

    pub fn start_recording(&mut self) -> bool {
        self.begin_recording(RecordMode::Overwrite)
    }

    /// Record on top of the current take instead of replacing it
    pub fn start_layered_recording(&mut self) -> bool {
        self.begin_recording(RecordMode::Layered)
    }

    fn begin_recording(&mut self, mode: RecordMode) -> bool {
        let result = self.transport.start_recording(
            mode,
            &mut self.recording,
            &mut self.field,
            self.config.reset_field_on_record,
        );
        self.accept(result)
    }

    pub fn stop_recording(&mut self) -> bool {
        let result = self.transport.stop_recording();
        self.accept(result)
    }

    pub fn play(&mut self) -> bool {
        let result = self.transport.play(&self.recording);
        self.accept(result)
    }

    pub fn stop(&mut self) -> bool {
        let result = self.transport.stop();
        self.accept(result)
    }

    fn accept(&mut self, result: WarpResult<()>) -> bool {
        match result {
            Ok(()) => {
                self.show_composite = false;
                true
            }
            Err(err) if err.is_recoverable() => {
                log::debug!("Ignored transport request: {}", err);
                false
            }
            Err(err) => {
                log::warn!("Transport request failed: {}", err);
                false
            }
        }
    }

    /// Stop everything and zero both the field and the recording
    pub fn clear(&mut self) {
        self.transport.halt();
        self.show_composite = false;
        self.field.clear();
        self.recording.clear();
    }

    pub fn set_parameters(&mut self, relaxation: f32, radius: f32, strength: f32) -> WarpResult<()> {
        self.config.params = FieldParams::new(relaxation, radius, strength)?;
        Ok(())
    }

    pub fn set_falloff(&mut self, falloff: Falloff) {
        self.config.falloff = falloff;
    }

    pub fn set_loop_playback(&mut self, enabled: bool) {
        self.config.loop_playback = enabled;
        self.transport.set_loop_playback(enabled);
    }

    pub fn set_time_display(&mut self, display: Box<dyn TimeDisplay>) {
        self.time_display = Some(display);
    }

    pub fn params(&self) -> FieldParams {
        self.config.params
    }

    pub fn falloff(&self) -> Falloff {
        self.config.falloff
    }

    pub fn state(&self) -> TransportState {
        self.transport.state()
    }

    pub fn dims(&self) -> GridDimensions {
        self.field.dims()
    }

    pub fn field(&self) -> &DisplacementField {
        &self.field
    }

    pub fn pointer_state(&self) -> PointerState {
        self.pointer.state()
    }

    pub fn recording_buffer(&self) -> &RecordingBuffer {
        &self.recording
    }

    /// Recorded frames as a self-describing payload
    pub fn recording_payload(&self) -> Payload {
        let frames = &self.recording.recorded_slice()[self.recording.header_len()..];
        Payload::from_frames(self.field.dims(), self.field.layout(), frames)
    }

    pub fn export_recording(&self) -> Vec<u8> {
        self.recording_payload().encode()
    }

    /// Replace the recording with `payload`, pin the grid to its size and
    /// start playing it
    pub fn load_recording(&mut self, payload: &Payload) -> WarpResult<()> {
        if self.config.layout != ChannelLayout::Rg {
            return Err(WarpError::payload(
                "payloads hold 2-channel frames but the field has 4 channels",
            ));
        }
        if payload.frame_count() == 0 {
            return Err(WarpError::payload("payload has no frames"));
        }

        self.transport.halt();
        self.show_composite = false;
        self.pending_resize = None;
        self.clock.reset();
        self.config.sizing = GridSizing::Fixed(payload.dims);
        self.field.regenerate(payload.dims);
        let (width, height) = self.viewport;
        self.field.set_aspect(cell_aspect(width, height, payload.dims));
        self.recording =
            RecordingBuffer::from_payload(payload, self.config.framerate, self.config.max_duration);
        log::info!(
            "Loaded {} frames at {}x{}",
            payload.frame_count(),
            payload.dims.width,
            payload.dims.height
        );
        self.play();
        Ok(())
    }
}

fn allocate_recording(config: &SimConfig, dims: GridDimensions) -> RecordingBuffer {
    RecordingBuffer::allocate(
        dims.frame_size(config.layout),
        config.framerate,
        config.max_duration,
        config.header.then_some(dims),
    )
}
