//! Landmark frames delivered by the external face-mesh detector.
//!
//! Detector payloads are validated once here; everything downstream can
//! rely on finite coordinates and bounds-checked index access.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A single landmark point
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Landmark {
    /// Landmark at `(x, y, z)`
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// Coordinate space of the landmark points
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum CoordinateSpace {
    /// `[0, 1]` on both axes; `aspect_ratio` is frame width over height
    Normalized { aspect_ratio: f64 },
    /// Pixel coordinates in a frame of the given size
    Pixel { width: f64, height: f64 },
}

impl CoordinateSpace {
    /// Normalized space for a square frame
    pub const fn normalized() -> Self {
        Self::Normalized { aspect_ratio: 1.0 }
    }

    fn validate(&self) -> Result<()> {
        match *self {
            Self::Normalized { aspect_ratio } => {
                if !(aspect_ratio.is_finite() && aspect_ratio > 0.0) {
                    return Err(Error::InvalidInput(format!("Invalid aspect ratio: {aspect_ratio}")));
                }
            }
            Self::Pixel { width, height } => {
                if !(width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0) {
                    return Err(Error::InvalidInput(format!("Invalid frame size: {width}x{height}")));
                }
            }
        }
        Ok(())
    }
}

/// Axis-aligned box in normalized frame units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    /// Horizontal extent
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    /// Vertical extent
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Midpoint of the box
    pub fn center(&self) -> (f64, f64) {
        ((self.min_x + self.max_x) / 2.0, (self.min_y + self.max_y) / 2.0)
    }
}

/// One detector output: indexed points plus the monotonic capture time
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkFrame {
    points: Vec<Landmark>,
    space: CoordinateSpace,
    timestamp: Duration,
}

impl LandmarkFrame {
    /// Build a frame, rejecting malformed detector output
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if any coordinate is not finite or the
    /// coordinate space is malformed. An empty point list is accepted
    /// and means no face was found.
    pub fn new(points: Vec<Landmark>, space: CoordinateSpace, timestamp: Duration) -> Result<Self> {
        space.validate()?;
        if let Some(idx) = points.iter().position(|p| !p.is_finite()) {
            return Err(Error::InvalidInput(format!("Landmark {idx} has a non-finite coordinate")));
        }
        Ok(Self { points, space, timestamp })
    }

    /// Build a frame from flat `x, y, z` triples
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if the length is not a multiple of three or
    /// the values fail [`LandmarkFrame::new`] validation.
    pub fn from_flat(data: &[f64], space: CoordinateSpace, timestamp: Duration) -> Result<Self> {
        if data.len() % 3 != 0 {
            return Err(Error::InvalidInput(format!(
                "Flat landmark data must hold x,y,z triples, got {} values",
                data.len()
            )));
        }
        let points = data
            .chunks_exact(3)
            .map(|c| Landmark::new(c[0], c[1], c[2]))
            .collect();
        Self::new(points, space, timestamp)
    }

    /// Frame from points already known to be finite
    pub(crate) fn from_trusted(points: Vec<Landmark>, space: CoordinateSpace, timestamp: Duration) -> Self {
        debug_assert!(points.iter().all(Landmark::is_finite));
        Self { points, space, timestamp }
    }

    /// Frame with no face in it
    pub fn empty(space: CoordinateSpace, timestamp: Duration) -> Self {
        Self { points: Vec::new(), space, timestamp }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Monotonic capture time
    pub fn timestamp(&self) -> Duration {
        self.timestamp
    }

    /// Coordinate space of the points
    pub fn space(&self) -> CoordinateSpace {
        self.space
    }

    /// All landmarks in detector order
    pub fn points(&self) -> &[Landmark] {
        &self.points
    }

    /// Raw point as delivered by the detector
    pub fn point(&self, index: usize) -> Option<Landmark> {
        self.points.get(index).copied()
    }

    /// Point in isotropic units (equal scale on x and y)
    pub fn isotropic(&self, index: usize) -> Option<Landmark> {
        let p = self.point(index)?;
        Some(match self.space {
            CoordinateSpace::Normalized { aspect_ratio } => Landmark::new(p.x * aspect_ratio, p.y, p.z),
            CoordinateSpace::Pixel { .. } => p,
        })
    }

    /// Point in `[0, 1]` frame units
    pub fn normalized(&self, index: usize) -> Option<Landmark> {
        let p = self.point(index)?;
        Some(Self::normalize(self.space, p))
    }

    fn normalize(space: CoordinateSpace, p: Landmark) -> Landmark {
        match space {
            CoordinateSpace::Normalized { .. } => p,
            CoordinateSpace::Pixel { width, height } => Landmark::new(p.x / width, p.y / height, p.z / width),
        }
    }

    /// Normalized bounding box of all landmarks, `None` for an empty frame
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        let mut iter = self.points.iter().map(|&p| Self::normalize(self.space, p));
        let first = iter.next()?;
        let init = BoundingBox {
            min_x: first.x,
            min_y: first.y,
            max_x: first.x,
            max_y: first.y,
        };
        Some(iter.fold(init, |b, p| BoundingBox {
            min_x: b.min_x.min(p.x),
            min_y: b.min_y.min(p.y),
            max_x: b.max_x.max(p.x),
            max_y: b.max_y.max(p.y),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_finite() {
        let points = vec![Landmark::new(0.1, 0.2, 0.0), Landmark::new(f64::NAN, 0.2, 0.0)];
        let result = LandmarkFrame::new(points, CoordinateSpace::normalized(), Duration::ZERO);
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_from_flat() {
        let frame = LandmarkFrame::from_flat(
            &[0.1, 0.2, 0.0, 0.3, 0.4, 0.0],
            CoordinateSpace::normalized(),
            Duration::from_millis(5),
        )
        .unwrap();
        assert_eq!(frame.len(), 2);
        assert_eq!(frame.point(1), Some(Landmark::new(0.3, 0.4, 0.0)));
        assert_eq!(frame.point(2), None);

        assert!(LandmarkFrame::from_flat(&[0.1, 0.2], CoordinateSpace::normalized(), Duration::ZERO).is_err());
    }

    #[test]
    fn test_invalid_space() {
        let space = CoordinateSpace::Pixel { width: 0.0, height: 480.0 };
        assert!(LandmarkFrame::new(Vec::new(), space, Duration::ZERO).is_err());
        let space = CoordinateSpace::Normalized { aspect_ratio: -1.0 };
        assert!(LandmarkFrame::new(Vec::new(), space, Duration::ZERO).is_err());
    }

    #[test]
    fn test_pixel_normalization_and_bbox() {
        let points = vec![Landmark::new(160.0, 120.0, 0.0), Landmark::new(480.0, 360.0, 0.0)];
        let space = CoordinateSpace::Pixel { width: 640.0, height: 480.0 };
        let frame = LandmarkFrame::new(points, space, Duration::ZERO).unwrap();

        let p = frame.normalized(1).unwrap();
        assert!((p.x - 0.75).abs() < 1e-12);
        assert!((p.y - 0.75).abs() < 1e-12);

        let bbox = frame.bounding_box().unwrap();
        assert!((bbox.width() - 0.5).abs() < 1e-12);
        assert_eq!(bbox.center(), (0.5, 0.5));
    }

    #[test]
    fn test_isotropic_scales_x() {
        let space = CoordinateSpace::Normalized { aspect_ratio: 4.0 / 3.0 };
        let frame = LandmarkFrame::new(vec![Landmark::new(0.3, 0.3, 0.0)], space, Duration::ZERO).unwrap();
        let p = frame.isotropic(0).unwrap();
        assert!((p.x - 0.4).abs() < 1e-12);
        assert!((p.y - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_empty_frame() {
        let frame = LandmarkFrame::empty(CoordinateSpace::normalized(), Duration::ZERO);
        assert!(frame.is_empty());
        assert!(frame.bounding_box().is_none());
    }
}
