use crate::error::{WarpError, WarpResult};
use crate::simulation::{ChannelLayout, Falloff, FieldInit, GridSizing};

/// Simulation steps per second (also the recording frame rate)
pub const DEFAULT_FRAMERATE: u32 = 60;

/// Viewport pixels per grid cell
pub const DEFAULT_CELL_DIVISOR: f32 = 16.0;

/// Longest recording the buffer is sized for, in seconds
pub const DEFAULT_MAX_DURATION: f32 = 5.0;

/// Elements in the self-describing `[width, height]` header
pub const HEADER_LEN: usize = 2;

// ============================================
// Field Parameters
// ============================================

/// Per-step multiplier applied to every displacement value
pub const DEFAULT_RELAXATION: f32 = 0.9;

/// Pointer influence radius, as a fraction of the grid width
pub const DEFAULT_RADIUS: f32 = 0.2;

/// Impulse gain applied to pointer velocity
pub const DEFAULT_STRENGTH: f32 = 1.0;

/// Upper bound of the falloff power
pub const MAX_POWER: f32 = 10.0;

/// Per-tick pointer velocity decay, so a still pointer stops pushing
pub const POINTER_VELOCITY_DECAY: f32 = 0.9;

// ============================================
// Host Controls
// ============================================

/// Relaxation change per key press
pub const RELAXATION_STEP: f32 = 0.01;

/// Radius change per key press
pub const RADIUS_STEP: f32 = 0.02;

/// Live-tunable field parameters
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FieldParams {
    pub relaxation: f32,
    pub radius: f32,
    pub strength: f32,
}

impl Default for FieldParams {
    fn default() -> Self {
        Self {
            relaxation: DEFAULT_RELAXATION,
            radius: DEFAULT_RADIUS,
            strength: DEFAULT_STRENGTH,
        }
    }
}

impl FieldParams {
    /// Build parameters, rejecting values outside their ranges
    pub fn new(relaxation: f32, radius: f32, strength: f32) -> WarpResult<Self> {
        let params = Self {
            relaxation,
            radius,
            strength,
        };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> WarpResult<()> {
        if !(self.relaxation > 0.0 && self.relaxation < 1.0) {
            return Err(WarpError::invalid_parameter(
                "relaxation",
                self.relaxation,
                "in (0, 1)",
            ));
        }
        if !(self.radius > 0.0 && self.radius.is_finite()) {
            return Err(WarpError::invalid_parameter("radius", self.radius, "> 0"));
        }
        if !(self.strength >= 0.0 && self.strength.is_finite()) {
            return Err(WarpError::invalid_parameter(
                "strength",
                self.strength,
                ">= 0",
            ));
        }
        Ok(())
    }
}

/// Everything needed to build a [`crate::Simulation`]
#[derive(Clone, Debug)]
pub struct SimConfig {
    pub framerate: u32,
    pub max_duration: f32,
    pub sizing: GridSizing,
    pub layout: ChannelLayout,
    pub init: FieldInit,
    pub falloff: Falloff,
    pub params: FieldParams,
    /// Store `[width, height]` ahead of the frames
    pub header: bool,
    /// Zero the live field when an overwrite recording starts
    pub reset_field_on_record: bool,
    /// Wrap to the first frame instead of stopping at the end of playback
    pub loop_playback: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            framerate: DEFAULT_FRAMERATE,
            max_duration: DEFAULT_MAX_DURATION,
            sizing: GridSizing::CellDivisor(DEFAULT_CELL_DIVISOR),
            layout: ChannelLayout::Rg,
            init: FieldInit::Zero,
            falloff: Falloff::Linear,
            params: FieldParams::default(),
            header: true,
            reset_field_on_record: true,
            loop_playback: false,
        }
    }
}

impl SimConfig {
    pub fn validate(&self) -> WarpResult<()> {
        if self.framerate == 0 {
            return Err(WarpError::invalid_parameter("framerate", 0.0, "> 0"));
        }
        if !(self.max_duration > 0.0 && self.max_duration.is_finite()) {
            return Err(WarpError::invalid_parameter(
                "max_duration",
                self.max_duration,
                "> 0",
            ));
        }
        match self.sizing {
            GridSizing::CellDivisor(d) if !(d > 0.0 && d.is_finite()) => {
                return Err(WarpError::invalid_parameter("cell_divisor", d, "> 0"));
            }
            GridSizing::FixedColumns(0) => {
                return Err(WarpError::invalid_parameter("columns", 0.0, ">= 1"));
            }
            _ => {}
        }
        self.params.validate()
    }

    /// Seconds between simulation steps
    pub fn tick_interval(&self) -> f64 {
        1.0 / self.framerate.max(1) as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_params_valid() {
        assert!(FieldParams::default().validate().is_ok());
        assert!(SimConfig::default().validate().is_ok());
    }

    #[test]
    fn test_relaxation_bounds() {
        assert!(FieldParams::new(0.0, 0.2, 1.0).is_err());
        assert!(FieldParams::new(1.0, 0.2, 1.0).is_err());
        assert!(FieldParams::new(f32::NAN, 0.2, 1.0).is_err());
        assert!(FieldParams::new(0.5, 0.2, 1.0).is_ok());
    }

    #[test]
    fn test_radius_and_strength_bounds() {
        assert!(FieldParams::new(0.9, 0.0, 1.0).is_err());
        assert!(FieldParams::new(0.9, 0.1, -0.5).is_err());
        assert!(FieldParams::new(0.9, 0.1, 0.0).is_ok());
    }

    #[test]
    fn test_config_rejects_zero_framerate() {
        let config = SimConfig {
            framerate: 0,
            ..SimConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_tick_interval() {
        let config = SimConfig::default();
        assert!((config.tick_interval() - 1.0 / 60.0).abs() < 1e-12);

        let zero = SimConfig {
            framerate: 0,
            ..SimConfig::default()
        };
        assert_eq!(zero.tick_interval(), 1.0);
    }
}
