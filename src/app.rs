use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use winit::application::ApplicationHandler;
use winit::event::{ElementState, MouseButton, WindowEvent};
use winit::event_loop::ActiveEventLoop;
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

use warpfield::config::{RADIUS_STEP, RELAXATION_STEP};
use warpfield::recording::{Payload, TimeDisplay, TransportState};
use warpfield::simulation::PointerEvent;
use warpfield::{SimConfig, Simulation};

use crate::gpu::{FieldTexture, FieldView, GpuContext};

const TITLE: &str = "warpfield";

/// Shows the transport clock in the window title
struct TitleClock {
    window: Arc<Window>,
    shown: Option<u64>,
}

impl TimeDisplay for TitleClock {
    fn set_time(&mut self, seconds: u64) {
        if self.shown != Some(seconds) {
            self.shown = Some(seconds);
            self.window
                .set_title(&format!("{} - {:02}:{:02}", TITLE, seconds / 60, seconds % 60));
        }
    }
}

/// Application state
pub struct App {
    config: SimConfig,
    load: Option<Payload>,
    export_path: PathBuf,
    window: Option<Arc<Window>>,
    gpu: Option<GpuContext>,
    simulation: Option<Simulation>,
    field_texture: Option<FieldTexture>,
    field_view: Option<FieldView>,
    bind_group: Option<wgpu::BindGroup>,
    last_frame: Option<Instant>,
    last_state: TransportState,
    fps_counter: FpsCounter,
    startup_error: Option<anyhow::Error>,
}

impl App {
    pub fn new(config: SimConfig, load: Option<Payload>, export_path: PathBuf) -> Self {
        Self {
            config,
            load,
            export_path,
            window: None,
            gpu: None,
            simulation: None,
            field_texture: None,
            field_view: None,
            bind_group: None,
            last_frame: None,
            last_state: TransportState::Idle,
            fps_counter: FpsCounter::new(),
            startup_error: None,
        }
    }

    /// Error that stopped initialization, if any
    pub fn into_result(self) -> anyhow::Result<()> {
        match self.startup_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn initialize(&mut self, event_loop: &ActiveEventLoop) -> anyhow::Result<()> {
        log::info!("Initializing displacement field viewer...");

        let window_attrs = Window::default_attributes()
            .with_title(TITLE)
            .with_inner_size(winit::dpi::LogicalSize::new(1280, 720));
        let window = Arc::new(event_loop.create_window(window_attrs)?);

        log::info!("Creating GPU context...");
        let gpu = pollster::block_on(GpuContext::new(window.clone()))?;

        let size = window.inner_size();
        let mut simulation = Simulation::new(self.config.clone(), size.width as f32, size.height as f32)?;
        simulation.set_time_display(Box::new(TitleClock {
            window: window.clone(),
            shown: None,
        }));
        if let Some(payload) = self.load.take() {
            simulation.load_recording(&payload)?;
        }

        let field_texture = FieldTexture::new(&gpu.device, simulation.dims(), simulation.field().layout())?;
        field_texture.upload(&gpu.queue, simulation.field().data());
        field_texture.update_params(&gpu.queue, simulation.state());

        log::info!("Creating render pipeline...");
        let field_view = FieldView::new(&gpu.device, gpu.format());
        let bind_group = field_view.bind(&gpu.device, &field_texture);

        log::info!("Initialization complete!");
        log::info!("Controls:");
        log::info!("  Drag: Push the field");
        log::info!("  R: Start/stop recording");
        log::info!("  L: Start/stop layered recording");
        log::info!("  Space: Play/stop");
        log::info!("  O: Toggle looped playback");
        log::info!("  E: Export recording to {}", self.export_path.display());
        log::info!("  C: Clear field and recording");
        log::info!("  F: Toggle linear/quadratic falloff");
        log::info!("  [/]: Adjust relaxation");
        log::info!("  -/=: Adjust radius");
        log::info!("  Escape: Quit");

        self.window = Some(window);
        self.gpu = Some(gpu);
        self.simulation = Some(simulation);
        self.field_texture = Some(field_texture);
        self.field_view = Some(field_view);
        self.bind_group = Some(bind_group);
        Ok(())
    }

    fn render(&mut self) {
        let now = Instant::now();
        let delta = self.last_frame.map(|last| now - last).unwrap_or_default();
        self.last_frame = Some(now);

        let (Some(gpu), Some(simulation), Some(texture), Some(field_view)) = (
            self.gpu.as_ref(),
            self.simulation.as_mut(),
            self.field_texture.as_mut(),
            self.field_view.as_ref(),
        ) else {
            return;
        };

        let snapshot = simulation.tick(delta);

        let mut upload = snapshot.stepped;
        if !texture.matches(snapshot.dims, snapshot.layout) {
            log::info!("Reallocating field texture for {}x{}", snapshot.dims.width, snapshot.dims.height);
            match FieldTexture::new(&gpu.device, snapshot.dims, snapshot.layout) {
                Ok(resized) => {
                    *texture = resized;
                    self.bind_group = Some(field_view.bind(&gpu.device, texture));
                    upload = true;
                }
                Err(e) => {
                    // keep drawing the old texture
                    log::error!("Field texture reallocation failed: {:#}", e);
                    upload = false;
                }
            }
        }
        if upload {
            texture.upload(&gpu.queue, snapshot.data);
        }
        texture.update_params(&gpu.queue, snapshot.state);

        if snapshot.state != self.last_state {
            self.last_state = snapshot.state;
            if snapshot.state == TransportState::Idle {
                if let Some(window) = &self.window {
                    window.set_title(TITLE);
                }
            }
        }

        let Some(bind_group) = self.bind_group.as_ref() else {
            return;
        };

        let output = match gpu.surface.get_current_texture() {
            Ok(texture) => texture,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                gpu.reconfigure();
                return;
            }
            Err(e) => {
                log::error!("Surface error: {:?}", e);
                return;
            }
        };

        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame-encoder"),
            });
        field_view.draw(&mut encoder, &view, bind_group);

        gpu.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        if let Some(fps) = self.fps_counter.tick() {
            log::debug!("{:.0} FPS", fps);
        }
    }

    fn handle_key(&mut self, key_code: KeyCode) {
        let Some(simulation) = self.simulation.as_mut() else {
            return;
        };

        match key_code {
            KeyCode::KeyR => {
                if simulation.state() == TransportState::Recording {
                    simulation.stop_recording();
                } else {
                    simulation.start_recording();
                }
            }
            KeyCode::KeyL => {
                if simulation.state() == TransportState::Recording {
                    simulation.stop_recording();
                } else {
                    simulation.start_layered_recording();
                }
            }
            KeyCode::Space => {
                if simulation.state() == TransportState::Playing {
                    simulation.stop();
                } else {
                    simulation.play();
                }
            }
            KeyCode::KeyO => {
                self.config.loop_playback = !self.config.loop_playback;
                simulation.set_loop_playback(self.config.loop_playback);
                log::info!("Looped playback: {}", if self.config.loop_playback { "ON" } else { "OFF" });
            }
            KeyCode::KeyE => {
                let payload = simulation.recording_payload();
                match payload.write(&self.export_path) {
                    Ok(()) => log::info!(
                        "Exported {} frames to {}",
                        payload.frame_count(),
                        self.export_path.display()
                    ),
                    Err(e) => log::error!("Export to {} failed: {}", self.export_path.display(), e),
                }
            }
            KeyCode::KeyC => {
                simulation.clear();
                log::info!("Cleared field and recording");
            }
            KeyCode::KeyF => {
                let falloff = simulation.falloff().toggled();
                simulation.set_falloff(falloff);
                log::info!("Falloff: {:?}", falloff);
            }
            KeyCode::BracketLeft | KeyCode::BracketRight => {
                let params = simulation.params();
                let step = if key_code == KeyCode::BracketLeft {
                    -RELAXATION_STEP
                } else {
                    RELAXATION_STEP
                };
                let relaxation = (params.relaxation + step).clamp(RELAXATION_STEP, 1.0 - RELAXATION_STEP);
                if simulation
                    .set_parameters(relaxation, params.radius, params.strength)
                    .is_ok()
                {
                    log::info!("Relaxation: {:.2}", relaxation);
                }
            }
            KeyCode::Minus | KeyCode::Equal => {
                let params = simulation.params();
                let step = if key_code == KeyCode::Minus {
                    -RADIUS_STEP
                } else {
                    RADIUS_STEP
                };
                let radius = (params.radius + step).max(RADIUS_STEP);
                if simulation
                    .set_parameters(params.relaxation, radius, params.strength)
                    .is_ok()
                {
                    log::info!("Radius: {:.2}", radius);
                }
            }
            _ => {}
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(e) = self.initialize(event_loop) {
            log::error!("Initialization failed: {:#}", e);
            self.startup_error = Some(e);
            event_loop.exit();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, exiting...");
                event_loop.exit();
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state.is_pressed() && !event.repeat {
                    if let PhysicalKey::Code(key_code) = event.physical_key {
                        if key_code == KeyCode::Escape {
                            log::info!("Escape pressed, exiting...");
                            event_loop.exit();
                        } else {
                            self.handle_key(key_code);
                        }
                    }
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                if let Some(simulation) = &mut self.simulation {
                    simulation.push_pointer(PointerEvent::Moved {
                        x: position.x as f32,
                        y: position.y as f32,
                    });
                }
            }
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => {
                if let Some(simulation) = &mut self.simulation {
                    simulation.push_pointer(match state {
                        ElementState::Pressed => PointerEvent::Pressed,
                        ElementState::Released => PointerEvent::Released,
                    });
                }
            }
            WindowEvent::Resized(new_size) => {
                if let Some(gpu) = &mut self.gpu {
                    log::info!("Window resized to {}x{}", new_size.width, new_size.height);
                    gpu.resize(new_size);
                }
                if let Some(simulation) = &mut self.simulation {
                    if new_size.width > 0 && new_size.height > 0 {
                        simulation.request_resize(new_size.width as f32, new_size.height as f32);
                    }
                }
            }
            WindowEvent::RedrawRequested => {
                self.render();
                // Request another frame immediately
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            _ => {}
        }
    }
}

/// Simple FPS counter
struct FpsCounter {
    last_update: Instant,
    frame_count: u32,
}

impl FpsCounter {
    fn new() -> Self {
        Self {
            last_update: Instant::now(),
            frame_count: 0,
        }
    }

    /// Tick the counter, returns Some(fps) every second
    fn tick(&mut self) -> Option<f64> {
        self.frame_count += 1;
        let elapsed = self.last_update.elapsed();

        if elapsed.as_secs_f64() >= 1.0 {
            let fps = self.frame_count as f64 / elapsed.as_secs_f64();
            self.frame_count = 0;
            self.last_update = Instant::now();
            Some(fps)
        } else {
            None
        }
    }
}
