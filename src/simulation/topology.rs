/// Discrete grid size, in cells
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GridDimensions {
    pub width: u32,
    pub height: u32,
}

impl GridDimensions {
    /// Create dimensions, clamping each side to at least one cell
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
        }
    }

    pub fn cell_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Elements in one frame for the given layout
    pub fn frame_size(&self, layout: ChannelLayout) -> usize {
        self.cell_count() * layout.channels()
    }
}

/// Values stored per cell. The impulse only ever writes the first two.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ChannelLayout {
    /// Two channels (x, y), matching an RG float texture
    #[default]
    Rg,
    /// Four channels, matching an RGBA float texture
    Rgba,
}

impl ChannelLayout {
    pub fn channels(self) -> usize {
        match self {
            Self::Rg => 2,
            Self::Rgba => 4,
        }
    }
}

/// How the grid is derived from the viewport
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum GridSizing {
    /// One cell per `divisor` viewport pixels on each axis
    CellDivisor(f32),
    /// Fixed column count, rows follow the viewport aspect ratio
    FixedColumns(u32),
    /// Pinned size, the viewport is ignored
    Fixed(GridDimensions),
}

/// Derive grid dimensions for a viewport.
///
/// Pure: identical inputs always give identical output, and neither side is
/// ever zero. Degenerate viewports (zero, negative, NaN) collapse to a single
/// cell on that axis.
pub fn derive(viewport_width: f32, viewport_height: f32, sizing: GridSizing) -> GridDimensions {
    match sizing {
        GridSizing::CellDivisor(divisor) => GridDimensions::new(
            cells_along(viewport_width, divisor),
            cells_along(viewport_height, divisor),
        ),
        GridSizing::FixedColumns(columns) => {
            let columns = columns.max(1);
            let height = if viewport_width > 0.0 && viewport_width.is_finite() {
                cells_along(columns as f32 * viewport_height, viewport_width)
            } else {
                1
            };
            GridDimensions::new(columns, height)
        }
        GridSizing::Fixed(dims) => GridDimensions::new(dims.width, dims.height),
    }
}

fn cells_along(extent: f32, divisor: f32) -> u32 {
    let cells = (extent / divisor).floor();
    // `as` saturates, and maps NaN to 0
    if cells.is_finite() {
        (cells as u32).max(1)
    } else {
        1
    }
}

/// Height of one cell relative to its width, in viewport pixels
pub fn cell_aspect(viewport_width: f32, viewport_height: f32, dims: GridDimensions) -> f32 {
    let cell_w = viewport_width / dims.width as f32;
    let cell_h = viewport_height / dims.height as f32;
    let aspect = cell_h / cell_w;
    if aspect.is_finite() && aspect > 0.0 {
        aspect
    } else {
        1.0
    }
}
