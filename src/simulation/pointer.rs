use std::collections::VecDeque;

use crate::config::POINTER_VELOCITY_DECAY;

/// Raw pointer input, in viewport pixels
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PointerEvent {
    Pressed,
    Released,
    Moved { x: f32, y: f32 },
}

/// Pointer position and per-sample velocity, in normalized viewport units
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PointerState {
    pub x: f32,
    pub y: f32,
    pub v_x: f32,
    pub v_y: f32,
    pub down: bool,
}

/// Integrates queued pointer events into a [`PointerState`].
///
/// Input handlers only [`push`](Self::push); the simulation applies the queue
/// once per tick with [`drain`](Self::drain), so ordering stays deterministic
/// no matter when the host delivers events.
#[derive(Debug)]
pub struct PointerTracker {
    state: PointerState,
    queue: VecDeque<PointerEvent>,
    viewport_width: f32,
    viewport_height: f32,
}

impl PointerTracker {
    pub fn new(viewport_width: f32, viewport_height: f32) -> Self {
        let mut tracker = Self {
            state: PointerState::default(),
            queue: VecDeque::new(),
            viewport_width: 1.0,
            viewport_height: 1.0,
        };
        tracker.set_viewport(viewport_width, viewport_height);
        tracker
    }

    pub fn set_viewport(&mut self, width: f32, height: f32) {
        self.viewport_width = sanitize_extent(width);
        self.viewport_height = sanitize_extent(height);
    }

    pub fn push(&mut self, event: PointerEvent) {
        self.queue.push_back(event);
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Apply every queued event in arrival order
    pub fn drain(&mut self) {
        while let Some(event) = self.queue.pop_front() {
            self.apply(event);
        }
    }

    fn apply(&mut self, event: PointerEvent) {
        match event {
            PointerEvent::Pressed => self.state.down = true,
            PointerEvent::Released => {
                self.state.down = false;
                self.state.v_x = 0.0;
                self.state.v_y = 0.0;
            }
            PointerEvent::Moved { x, y } => {
                let x = x / self.viewport_width;
                let y = y / self.viewport_height;
                if !x.is_finite() || !y.is_finite() {
                    return;
                }
                if self.state.down {
                    self.state.v_x = x - self.state.x;
                    self.state.v_y = y - self.state.y;
                } else {
                    self.state.v_x = 0.0;
                    self.state.v_y = 0.0;
                }
                self.state.x = x;
                self.state.y = y;
            }
        }
    }

    /// Bleed off velocity after a step; move events do not arrive every tick
    pub fn decay(&mut self) {
        self.state.v_x *= POINTER_VELOCITY_DECAY;
        self.state.v_y *= POINTER_VELOCITY_DECAY;
    }

    pub fn state(&self) -> PointerState {
        self.state
    }
}

fn sanitize_extent(extent: f32) -> f32 {
    if extent.is_finite() {
        extent.max(1.0)
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn moved(x: f32, y: f32) -> PointerEvent {
        PointerEvent::Moved { x, y }
    }

    #[test]
    fn test_events_wait_for_drain() {
        let mut tracker = PointerTracker::new(100.0, 100.0);
        tracker.push(moved(50.0, 50.0));
        assert_eq!(tracker.pending(), 1);
        assert_eq!(tracker.state().x, 0.0);

        tracker.drain();
        assert_eq!(tracker.pending(), 0);
        assert_eq!(tracker.state().x, 0.5);
        assert_eq!(tracker.state().y, 0.5);
    }

    #[test]
    fn test_velocity_only_while_down() {
        let mut tracker = PointerTracker::new(100.0, 200.0);
        tracker.push(moved(10.0, 20.0));
        tracker.push(moved(20.0, 40.0));
        tracker.drain();
        assert_eq!(tracker.state().v_x, 0.0);
        assert_eq!(tracker.state().v_y, 0.0);

        tracker.push(PointerEvent::Pressed);
        tracker.push(moved(30.0, 80.0));
        tracker.drain();
        let state = tracker.state();
        assert!(state.down);
        assert!((state.v_x - 0.1).abs() < 1e-6);
        assert!((state.v_y - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_release_zeroes_velocity() {
        let mut tracker = PointerTracker::new(100.0, 100.0);
        tracker.push(PointerEvent::Pressed);
        tracker.push(moved(10.0, 10.0));
        tracker.push(moved(30.0, 10.0));
        tracker.push(PointerEvent::Released);
        tracker.drain();
        let state = tracker.state();
        assert!(!state.down);
        assert_eq!(state.v_x, 0.0);
        assert_eq!(state.x, 0.3);
    }

    #[test]
    fn test_decay_shrinks_velocity() {
        let mut tracker = PointerTracker::new(100.0, 100.0);
        tracker.push(PointerEvent::Pressed);
        tracker.push(moved(0.0, 0.0));
        tracker.push(moved(10.0, 0.0));
        tracker.drain();
        tracker.decay();
        assert!((tracker.state().v_x - 0.09).abs() < 1e-6);
        for _ in 0..200 {
            tracker.decay();
        }
        assert!(tracker.state().v_x.abs() < 1e-9);
    }

    #[test]
    fn test_non_finite_moves_ignored() {
        let mut tracker = PointerTracker::new(0.0, f32::NAN);
        tracker.push(moved(f32::NAN, 1.0));
        tracker.drain();
        assert_eq!(tracker.state(), PointerState::default());
    }
}
