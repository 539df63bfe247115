use crate::recording::TransportState;

pub type WarpResult<T> = Result<T, WarpError>;

#[derive(thiserror::Error, Debug)]
pub enum WarpError {
    #[error("recording capacity exceeded: frame {frame_index} does not fit in {capacity} elements")]
    CapacityExceeded { frame_index: usize, capacity: usize },

    #[error("frame {frame_index} out of range ({recorded} recorded)")]
    OutOfRange { frame_index: usize, recorded: usize },

    #[error("cannot {action} while {state:?}")]
    InvalidTransition {
        state: TransportState,
        action: &'static str,
    },

    #[error("another instance is already recording")]
    RecorderBusy,

    #[error("frame size mismatch: expected {expected}, got {actual}")]
    FrameSizeMismatch { expected: usize, actual: usize },

    #[error("invalid parameter {name} = {value}: expected {expected}")]
    InvalidParameter {
        name: &'static str,
        value: f32,
        expected: &'static str,
    },

    #[error("payload error: {0}")]
    Payload(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl WarpError {
    pub fn invalid_parameter(name: &'static str, value: f32, expected: &'static str) -> Self {
        Self::InvalidParameter {
            name,
            value,
            expected,
        }
    }

    pub fn payload(msg: impl Into<String>) -> Self {
        Self::Payload(msg.into())
    }

    /// Errors the core recovers from by returning to Idle
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::CapacityExceeded { .. }
                | Self::OutOfRange { .. }
                | Self::InvalidTransition { .. }
                | Self::RecorderBusy
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = WarpError::CapacityExceeded {
            frame_index: 300,
            capacity: 4_824_000,
        };
        assert!(err.to_string().contains("capacity exceeded"));

        let err = WarpError::InvalidTransition {
            state: TransportState::Playing,
            action: "play",
        };
        assert_eq!(err.to_string(), "cannot play while Playing");

        assert!(WarpError::payload("x").to_string().starts_with("payload error:"));
    }

    #[test]
    fn test_recoverable_taxonomy() {
        assert!(WarpError::RecorderBusy.is_recoverable());
        assert!(WarpError::OutOfRange {
            frame_index: 0,
            recorded: 0
        }
        .is_recoverable());
        assert!(!WarpError::payload("bad").is_recoverable());
    }
}
