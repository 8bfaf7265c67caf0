use crate::models::{CaptureRegion, DisplayBounds, Frame};
use camino::Utf8Path;
use thiserror::Error;

/// Errors from capturing the configured region. Fatal to the running scan loop.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("Capture region {0} is empty")]
    EmptyRegion(CaptureRegion),

    #[error("Capture region {0} is not on any active display")]
    OutsideDisplays(CaptureRegion),

    #[error("Capture region {0} spans more than one display")]
    SpansDisplays(CaptureRegion),

    #[error("Capture region {0} lies on {1} overlapping displays")]
    Ambiguous(CaptureRegion, usize),

    #[error("Screen capture failed: {0}")]
    Backend(String),
}

/// Source of frames for the scan loop.
///
/// `capture` may block on the OS; the scan loop calls it from a blocking
/// worker thread.
#[cfg_attr(test, mockall::automock)]
pub trait ScreenCapturer: Send + Sync {
    fn capture(&self, region: &CaptureRegion) -> Result<Frame, CaptureError>;
}

/// Find the single display that fully contains `region`.
pub fn locate_display<'a>(
    displays: &'a [DisplayBounds],
    region: &CaptureRegion,
) -> Result<&'a DisplayBounds, CaptureError> {
    if region.is_empty() {
        return Err(CaptureError::EmptyRegion(*region));
    }

    let containing: Vec<&DisplayBounds> = displays.iter().filter(|d| d.contains(region)).collect();
    match containing.as_slice() {
        [display] => Ok(*display),
        [] if displays.iter().any(|d| d.overlaps(region)) => {
            Err(CaptureError::SpansDisplays(*region))
        }
        [] => Err(CaptureError::OutsideDisplays(*region)),
        many => Err(CaptureError::Ambiguous(*region, many.len())),
    }
}

/// [`ScreenCapturer`] backed by `xcap`.
#[derive(Debug, Clone, Copy, Default)]
pub struct XcapCapturer;

impl XcapCapturer {
    pub fn new() -> Self {
        Self
    }

    fn monitors() -> Result<Vec<xcap::Monitor>, CaptureError> {
        xcap::Monitor::all().map_err(backend)
    }

    fn bounds(index: usize, monitor: &xcap::Monitor) -> Result<DisplayBounds, CaptureError> {
        Ok(DisplayBounds {
            index,
            name: monitor.name().unwrap_or_else(|_| format!("display-{index}")),
            x: monitor.x().map_err(backend)?,
            y: monitor.y().map_err(backend)?,
            width: monitor.width().map_err(backend)?,
            height: monitor.height().map_err(backend)?,
        })
    }

    /// Bounds of every active display, in enumeration order.
    pub fn displays(&self) -> Result<Vec<DisplayBounds>, CaptureError> {
        Self::monitors()?
            .iter()
            .enumerate()
            .map(|(index, monitor)| Self::bounds(index, monitor))
            .collect()
    }
}

impl ScreenCapturer for XcapCapturer {
    fn capture(&self, region: &CaptureRegion) -> Result<Frame, CaptureError> {
        let monitors = Self::monitors()?;
        let displays = monitors
            .iter()
            .enumerate()
            .map(|(index, monitor)| Self::bounds(index, monitor))
            .collect::<Result<Vec<_>, _>>()?;

        let display = locate_display(&displays, region)?;
        let monitor = &monitors[display.index];

        // xcap regions are relative to the monitor origin
        let captured = monitor
            .capture_region(
                region.left.abs_diff(display.x),
                region.top.abs_diff(display.y),
                region.width(),
                region.height(),
            )
            .map_err(backend)?;

        // tracing's macros import `field::display`, which shadows a local named `display`
        let (display_index, display_name) = (display.index, &display.name);
        tracing::trace!(
            "Captured {}x{} from display {} ({})",
            captured.width(),
            captured.height(),
            display_index,
            display_name
        );

        Frame::from_rgba(captured.width(), captured.height(), captured.as_raw()).ok_or_else(|| {
            CaptureError::Backend(format!(
                "unexpected buffer size for {}x{} capture",
                captured.width(),
                captured.height()
            ))
        })
    }
}

/// Write `frame` as an RGB PNG, used for the startup region preview.
pub fn save_frame_png(frame: &Frame, path: &Utf8Path) -> Result<(), image::ImageError> {
    image::save_buffer(
        path,
        &frame.to_rgb_bytes(),
        frame.width(),
        frame.height(),
        image::ExtendedColorType::Rgb8,
    )
}

fn backend(err: impl std::fmt::Display) -> CaptureError {
    CaptureError::Backend(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dual_displays() -> Vec<DisplayBounds> {
        vec![
            DisplayBounds {
                index: 0,
                name: "left".to_string(),
                x: 0,
                y: 0,
                width: 1920,
                height: 1080,
            },
            DisplayBounds {
                index: 1,
                name: "right".to_string(),
                x: 1920,
                y: 0,
                width: 2560,
                height: 1440,
            },
        ]
    }

    #[test]
    fn test_locate_display_picks_containing_display() {
        let displays = dual_displays();

        let region = CaptureRegion::from_corners(2000, 100, 2100, 200);
        assert_eq!(locate_display(&displays, &region).unwrap().name, "right");

        let region = CaptureRegion::from_corners(10, 10, 20, 20);
        assert_eq!(locate_display(&displays, &region).unwrap().index, 0);
    }

    #[test]
    fn test_locate_display_rejects_spanning_region() {
        let region = CaptureRegion::from_corners(1900, 100, 1950, 200);
        assert_eq!(
            locate_display(&dual_displays(), &region),
            Err(CaptureError::SpansDisplays(region))
        );
    }

    #[test]
    fn test_locate_display_rejects_offscreen_region() {
        let region = CaptureRegion::from_corners(-500, -500, -400, -400);
        assert_eq!(
            locate_display(&dual_displays(), &region),
            Err(CaptureError::OutsideDisplays(region))
        );
    }

    #[test]
    fn test_locate_display_rejects_mirrored_displays() {
        let mut displays = dual_displays();
        displays[1].x = 0;

        let region = CaptureRegion::from_corners(10, 10, 20, 20);
        assert_eq!(
            locate_display(&displays, &region),
            Err(CaptureError::Ambiguous(region, 2))
        );
    }

    #[test]
    fn test_save_frame_png() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let dir = camino::Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        let path = dir.join("left_3x2.png");

        let mut frame = Frame::filled(3, 2, [0, 0, 0]);
        frame.set_pixel(2, 1, [117, 10, 10]);
        save_frame_png(&frame, &path).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[1..4], b"PNG");
    }

    #[test]
    fn test_locate_display_rejects_empty_region() {
        let region = CaptureRegion::from_corners(10, 10, 10, 20);
        assert_eq!(
            locate_display(&dual_displays(), &region),
            Err(CaptureError::EmptyRegion(region))
        );
    }
}
