//! Processing windows
//!
//! A window is a block of consecutive full-width rows. Windows are planned
//! so that their height is a multiple of the block height, which means no
//! strip or tile is decoded twice during one pass over the raster.

/// A band of full-width rows of the raster (pixel coordinates)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    /// First row of the window
    pub row: usize,
    /// Number of rows in the window
    pub rows: usize,
    /// Raster width in pixels
    pub width: usize,
}

impl Window {
    pub fn new(row: usize, rows: usize, width: usize) -> Self {
        Window { row, rows, width }
    }

    /// Row immediately below the window (exclusive end)
    pub fn end_row(&self) -> usize {
        self.row + self.rows
    }

    /// Number of pixels in the window
    pub fn pixels(&self) -> usize {
        self.rows * self.width
    }

    /// Whether raster row `row` lies inside the window
    pub fn contains_row(&self, row: usize) -> bool {
        row >= self.row && row < self.end_row()
    }

    /// Split a raster into windows
    ///
    /// # Arguments
    /// * `width` - Raster width
    /// * `height` - Raster height
    /// * `block_height` - Rows per strip or tile height
    /// * `min_rows` - Requested minimum rows per window
    ///
    /// # Returns
    /// Windows covering every row exactly once, top to bottom
    pub fn plan(width: usize, height: usize, block_height: usize, min_rows: usize) -> Vec<Window> {
        let block_height = block_height.max(1);
        let blocks = min_rows.max(1).div_ceil(block_height);
        let step = blocks * block_height;

        (0..height)
            .step_by(step)
            .map(|row| Window::new(row, step.min(height - row), width))
            .collect()
    }
}

/// Decoded samples of one window, band-major
#[derive(Debug, Clone)]
pub struct WindowData {
    pub window: Window,
    /// One vector of `window.pixels()` samples per band
    pub bands: Vec<Vec<f64>>,
}

impl WindowData {
    /// Zero-filled buffers for `band_count` bands
    pub fn new(window: Window, band_count: usize) -> Self {
        WindowData {
            window,
            bands: vec![vec![0.0; window.pixels()]; band_count],
        }
    }

    /// Sample of `band` (0-based) at raster column `col` and window-relative row `row`
    pub fn value(&self, band: usize, col: usize, row: usize) -> f64 {
        self.bands[band][row * self.window.width + col]
    }

    /// Bytes held by the sample buffers
    pub fn byte_size(&self) -> u64 {
        (self.bands.len() * self.window.pixels() * std::mem::size_of::<f64>()) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_aligns_to_block_height() {
        let windows = Window::plan(10, 100, 16, 20);
        assert_eq!(windows.len(), 4);
        assert_eq!(windows[0], Window::new(0, 32, 10));
        assert_eq!(windows[3], Window::new(96, 4, 10));
        assert_eq!(windows.iter().map(|w| w.rows).sum::<usize>(), 100);
    }

    #[test]
    fn test_plan_small_raster() {
        let windows = Window::plan(3, 2, 8, 256);
        assert_eq!(windows, vec![Window::new(0, 2, 3)]);
        assert!(Window::plan(3, 0, 8, 256).is_empty());
    }

    #[test]
    fn test_window_data_indexing() {
        let mut data = WindowData::new(Window::new(4, 2, 3), 2);
        data.bands[1][5] = 7.0;
        assert_eq!(data.value(1, 2, 1), 7.0);
        assert_eq!(data.byte_size(), 2 * 6 * 8);
    }
}
