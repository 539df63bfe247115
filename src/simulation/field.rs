use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::{FieldParams, MAX_POWER};
use crate::error::{WarpError, WarpResult};
use crate::simulation::pointer::PointerState;
use crate::simulation::topology::{ChannelLayout, GridDimensions};

/// Initial content of a freshly allocated field
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FieldInit {
    #[default]
    Zero,
    /// Uniform noise in [-1, 1]; `None` seeds from OS entropy
    Noise { seed: Option<u64> },
}

/// Pointer impulse falloff with distance
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Falloff {
    /// `maxDist / dist - 1`, sharp peak at the pointer
    #[default]
    Linear,
    /// `((maxDist² - dist²) / maxDist²)²`, smooth bump
    Quadratic,
}

impl Falloff {
    /// Impulse power for a cell at squared distance `dist_sq`
    pub fn power(self, dist_sq: f32, max_dist: f32) -> f32 {
        let raw = match self {
            Self::Linear => max_dist / dist_sq.sqrt() - 1.0,
            Self::Quadratic => {
                let max_dist_sq = max_dist * max_dist;
                let t = (max_dist_sq - dist_sq) / max_dist_sq;
                t * t
            }
        };
        // f32::clamp would keep a NaN
        if raw.is_nan() {
            0.0
        } else {
            raw.clamp(0.0, MAX_POWER)
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Self::Linear => Self::Quadratic,
            Self::Quadratic => Self::Linear,
        }
    }
}

/// Live per-cell displacement vectors, row-major
#[derive(Clone, Debug)]
pub struct DisplacementField {
    data: Vec<f32>,
    dims: GridDimensions,
    layout: ChannelLayout,
    init: FieldInit,
    /// Cell height over cell width, applied to vertical distances
    aspect: f32,
}

impl DisplacementField {
    pub fn new(dims: GridDimensions, layout: ChannelLayout, init: FieldInit) -> Self {
        let mut field = Self {
            data: Vec::new(),
            dims,
            layout,
            init,
            aspect: 1.0,
        };
        field.regenerate(dims);
        field
    }

    /// Reallocate for new dimensions using this field's init policy
    pub fn regenerate(&mut self, dims: GridDimensions) {
        self.dims = dims;
        let len = dims.frame_size(self.layout);
        self.data = match self.init {
            FieldInit::Zero => vec![0.0; len],
            FieldInit::Noise { seed } => {
                let mut rng = match seed {
                    Some(seed) => StdRng::seed_from_u64(seed),
                    None => StdRng::from_entropy(),
                };
                (0..len).map(|_| rng.gen_range(-1.0..=1.0)).collect()
            }
        };
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        self.aspect = if aspect.is_finite() && aspect > 0.0 {
            aspect
        } else {
            1.0
        };
    }

    /// Decay every value, then push cells near the pointer along its velocity
    pub fn step(&mut self, pointer: &PointerState, params: &FieldParams, falloff: Falloff) {
        let relaxation = params.relaxation;
        for value in &mut self.data {
            *value *= relaxation;
        }

        if pointer.v_x == 0.0 && pointer.v_y == 0.0 {
            return;
        }
        self.apply_impulse(pointer, params, falloff);
    }

    fn apply_impulse(&mut self, pointer: &PointerState, params: &FieldParams, falloff: Falloff) {
        let width = self.dims.width as f32;
        let height = self.dims.height as f32;
        let max_dist = width * params.radius;
        let max_dist_sq = max_dist * max_dist;
        if !(max_dist > 0.0) || !max_dist_sq.is_finite() {
            return;
        }

        let px = pointer.x * width;
        let py = pointer.y * height;
        if !px.is_finite() || !py.is_finite() {
            return;
        }

        // Bounding box of the influence disc, clipped to the grid
        let reach_y = max_dist / self.aspect;
        let x0 = (px - max_dist).floor().max(0.0);
        let x1 = (px + max_dist).ceil().min(width - 1.0);
        let y0 = (py - reach_y).floor().max(0.0);
        let y1 = (py + reach_y).ceil().min(height - 1.0);
        if x0 > x1 || y0 > y1 {
            return;
        }

        let channels = self.layout.channels();
        let row_len = self.dims.width as usize;
        let push_x = params.strength * pointer.v_x;
        let push_y = params.strength * pointer.v_y;

        for y in y0 as usize..=y1 as usize {
            let dy = (y as f32 - py) * self.aspect;
            for x in x0 as usize..=x1 as usize {
                let dx = x as f32 - px;
                let dist_sq = dx * dx + dy * dy;
                if dist_sq >= max_dist_sq {
                    continue;
                }
                let power = falloff.power(dist_sq, max_dist);
                let index = (y * row_len + x) * channels;
                self.data[index] -= push_x * power;
                self.data[index + 1] += push_y * power;
            }
        }
    }

    /// Replace the whole field with a stored frame
    pub fn copy_from(&mut self, frame: &[f32]) -> WarpResult<()> {
        if frame.len() != self.data.len() {
            return Err(WarpError::FrameSizeMismatch {
                expected: self.data.len(),
                actual: frame.len(),
            });
        }
        self.data.copy_from_slice(frame);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.data.fill(0.0);
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn dims(&self) -> GridDimensions {
        self.dims
    }

    pub fn layout(&self) -> ChannelLayout {
        self.layout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value_at(field: &DisplacementField, x: u32, y: u32, channel: usize) -> f32 {
        let dims = field.dims();
        let index = (y as usize * dims.width as usize + x as usize) * field.layout().channels();
        field.data()[index + channel]
    }

    fn pointer(x: f32, y: f32, v_x: f32, v_y: f32) -> PointerState {
        PointerState {
            x,
            y,
            v_x,
            v_y,
            down: true,
        }
    }

    fn params(relaxation: f32, radius: f32, strength: f32) -> FieldParams {
        FieldParams {
            relaxation,
            radius,
            strength,
        }
    }

    #[test]
    fn test_zero_init() {
        let field = DisplacementField::new(GridDimensions::new(4, 3), ChannelLayout::Rg, FieldInit::Zero);
        assert_eq!(field.data().len(), 24);
        assert!(field.data().iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_noise_init_in_range_and_seeded() {
        let dims = GridDimensions::new(16, 16);
        let init = FieldInit::Noise { seed: Some(7) };
        let a = DisplacementField::new(dims, ChannelLayout::Rgba, init);
        let b = DisplacementField::new(dims, ChannelLayout::Rgba, init);
        assert_eq!(a.data().len(), 16 * 16 * 4);
        assert!(a.data().iter().all(|v| (-1.0..=1.0).contains(v)));
        assert_eq!(a.data(), b.data());
        assert!(a.data().iter().any(|v| *v != 0.0));
    }

    #[test]
    fn test_decay_monotonic_without_velocity() {
        let dims = GridDimensions::new(8, 8);
        let mut field = DisplacementField::new(dims, ChannelLayout::Rg, FieldInit::Noise { seed: Some(3) });
        let still = pointer(0.5, 0.5, 0.0, 0.0);
        for relaxation in [0.01, 0.5, 0.99] {
            let p = params(relaxation, 0.2, 1.0);
            let before = field.data().to_vec();
            field.step(&still, &p, Falloff::Linear);
            for (old, new) in before.iter().zip(field.data()) {
                if *old != 0.0 {
                    assert!(new.abs() < old.abs());
                }
            }
        }
    }

    #[test]
    fn test_impulse_within_radius_only() {
        // 320 columns, radius 0.2 -> maxDist 64
        let dims = GridDimensions::new(320, 180);
        let mut field = DisplacementField::new(dims, ChannelLayout::Rg, FieldInit::Zero);
        let p = pointer(0.5, 0.5, 0.1, 0.0);
        field.step(&p, &params(0.9, 0.2, 1.0), Falloff::Linear);

        // pointer sits at grid (160, 90)
        assert!(value_at(&field, 170, 90, 0) != 0.0);
        assert!(value_at(&field, 170, 90, 0) < 0.0);
        assert_eq!(value_at(&field, 260, 90, 0), 0.0);
        assert_eq!(value_at(&field, 160, 90, 1), 0.0);
    }

    #[test]
    fn test_quadratic_falloff_reaches_same_cells() {
        let dims = GridDimensions::new(320, 180);
        let mut field = DisplacementField::new(dims, ChannelLayout::Rg, FieldInit::Zero);
        let p = pointer(0.5, 0.5, 0.0, 0.1);
        field.step(&p, &params(0.9, 0.2, 1.0), Falloff::Quadratic);
        assert!(value_at(&field, 170, 90, 1) > 0.0);
        assert_eq!(value_at(&field, 260, 90, 1), 0.0);
        assert_eq!(value_at(&field, 170, 90, 0), 0.0);
    }

    #[test]
    fn test_falloff_power_bounds() {
        assert_eq!(Falloff::Linear.power(0.0, 64.0), MAX_POWER);
        assert_eq!(Falloff::Linear.power(64.0 * 64.0, 64.0), 0.0);
        assert!((Falloff::Linear.power(100.0, 64.0) - 5.4).abs() < 1e-5);
        assert_eq!(Falloff::Quadratic.power(0.0, 64.0), 1.0);
        assert_eq!(Falloff::Quadratic.power(64.0 * 64.0, 64.0), 0.0);
        assert_eq!(Falloff::Linear.toggled(), Falloff::Quadratic);
    }

    #[test]
    fn test_off_grid_pointer_is_harmless() {
        let dims = GridDimensions::new(10, 10);
        let mut field = DisplacementField::new(dims, ChannelLayout::Rg, FieldInit::Zero);
        for (x, y) in [(5.0, 5.0), (-4.0, 0.5), (0.5, 30.0), (f32::MAX, f32::MIN)] {
            field.step(&pointer(x, y, 0.3, 0.3), &params(0.9, 0.1, 1.0), Falloff::Linear);
        }
        assert!(field.data().iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_rgba_leaves_upper_channels() {
        let dims = GridDimensions::new(20, 20);
        let mut field = DisplacementField::new(dims, ChannelLayout::Rgba, FieldInit::Zero);
        field.step(&pointer(0.5, 0.5, 0.2, 0.2), &params(0.9, 0.2, 1.0), Falloff::Linear);
        assert!(value_at(&field, 11, 10, 0) != 0.0);
        assert!(value_at(&field, 11, 10, 1) != 0.0);
        assert_eq!(value_at(&field, 11, 10, 2), 0.0);
        assert_eq!(value_at(&field, 11, 10, 3), 0.0);
    }

    #[test]
    fn test_copy_from_checks_length() {
        let mut field = DisplacementField::new(GridDimensions::new(2, 2), ChannelLayout::Rg, FieldInit::Zero);
        assert!(field.copy_from(&[1.0; 3]).is_err());
        assert!(field.copy_from(&[1.0; 8]).is_ok());
        assert!(field.data().iter().all(|v| *v == 1.0));
        field.clear();
        assert!(field.data().iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_regenerate_resizes() {
        let mut field = DisplacementField::new(GridDimensions::new(2, 2), ChannelLayout::Rg, FieldInit::Zero);
        field.regenerate(GridDimensions::new(5, 3));
        assert_eq!(field.data().len(), 30);
        assert_eq!(field.dims(), GridDimensions::new(5, 3));
    }
}
