use crate::models::{ColorMatch, ColorMatchTable, Frame};

/// Exact-RGB frame scanner.
///
/// Walks the frame row-major and stops at the first pixel whose color is in
/// the palette. Only found/not-found matters to callers, so the walk order is
/// not part of the contract.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameScanner;

impl FrameScanner {
    pub fn new() -> Self {
        Self
    }

    /// Return the first palette entry present in `frame`, if any.
    pub fn scan(&self, frame: &Frame, table: &ColorMatchTable) -> Option<ColorMatch> {
        if table.is_empty() || frame.is_empty() {
            return None;
        }

        frame
            .pixels()
            .find_map(|&[r, g, b]| table.lookup(r, g, b))
            .cloned()
    }
}
