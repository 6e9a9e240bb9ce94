//! Basic geometric types shared by layouts and render viewports.

use serde::{Deserialize, Serialize};

/// A 2-D coordinate.
///
/// Serialized as `{"x": .., "y": ..}`, which is the shape layouts use on
/// the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    x: f64,
    y: f64,
}

impl Point {
    /// Creates a new point with the specified coordinates
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Returns the x-coordinate of the point
    pub fn x(self) -> f64 {
        self.x
    }

    /// Returns the y-coordinate of the point
    pub fn y(self) -> f64 {
        self.y
    }

    /// Checks if both x and y coordinates are zero
    pub fn is_zero(self) -> bool {
        self.x == 0.0 && self.y == 0.0
    }

    /// Adds another point to this point, returning a new point
    pub fn add_point(self, other: Point) -> Self {
        Self {
            x: self.x + other.x,
            y: self.y + other.y,
        }
    }

    /// Subtracts another point from this point, returning a new point
    pub fn sub_point(self, other: Point) -> Self {
        Self {
            x: self.x - other.x,
            y: self.y - other.y,
        }
    }

    /// Component-wise minimum of two points
    pub fn min(self, other: Point) -> Self {
        Self {
            x: self.x.min(other.x),
            y: self.y.min(other.y),
        }
    }

    /// Component-wise maximum of two points
    pub fn max(self, other: Point) -> Self {
        Self {
            x: self.x.max(other.x),
            y: self.y.max(other.y),
        }
    }
}

/// Represents the dimensions of an element with width and height
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Size {
    width: f64,
    height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Returns the width dimension of this size
    pub fn width(self) -> f64 {
        self.width
    }

    /// Returns the height dimension of this size
    pub fn height(self) -> f64 {
        self.height
    }

    /// Returns a new Size with padding added to both width and height
    pub fn add_padding(self, insets: Insets) -> Self {
        Self {
            width: self.width + insets.horizontal_sum(),
            height: self.height + insets.vertical_sum(),
        }
    }

    /// Returns true if either dimension is zero or negative
    pub fn is_empty(self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// Represents a rectangular bounding box with minimum and maximum coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    min: Point,
    max: Point,
}

impl Bounds {
    /// Smallest bounds containing every point, or `None` for an empty iterator.
    pub fn enclosing(points: impl IntoIterator<Item = Point>) -> Option<Self> {
        let mut points = points.into_iter();
        let first = points.next()?;
        Some(points.fold(
            Self {
                min: first,
                max: first,
            },
            |bounds, point| Self {
                min: bounds.min.min(point),
                max: bounds.max.max(point),
            },
        ))
    }

    /// Returns the top-left corner
    pub fn min_point(self) -> Point {
        self.min
    }

    /// Returns the bottom-right corner
    pub fn max_point(self) -> Point {
        self.max
    }

    /// Converts bounds to a Size object
    pub fn to_size(self) -> Size {
        Size::new(self.max.x - self.min.x, self.max.y - self.min.y)
    }
}

/// Represents spacing around an element with potentially different values
/// for each side
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Insets {
    top: f64,
    right: f64,
    bottom: f64,
    left: f64,
}

impl Insets {
    /// Creates uniform insets with the same value for all sides
    pub fn uniform(value: f64) -> Self {
        Self {
            top: value,
            right: value,
            bottom: value,
            left: value,
        }
    }

    /// Returns the sum of left and right insets
    pub fn horizontal_sum(self) -> f64 {
        self.left + self.right
    }

    /// Returns the sum of top and bottom insets
    pub fn vertical_sum(self) -> f64 {
        self.top + self.bottom
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_new() {
        let point = Point::new(3.5, 4.2);
        assert_eq!(point.x(), 3.5);
        assert_eq!(point.y(), 4.2);
    }

    #[test]
    fn test_point_sub() {
        let result = Point::new(5.0, 8.0).sub_point(Point::new(2.0, 3.0));
        assert_eq!(result, Point::new(3.0, 5.0));
    }

    #[test]
    fn test_point_serde_shape() {
        let json = serde_json::to_value(Point::new(10.0, -2.5)).unwrap();
        assert_eq!(json, serde_json::json!({"x": 10.0, "y": -2.5}));

        let parsed: Point = serde_json::from_str(r#"{"x": 4, "y": 7}"#).unwrap();
        assert_eq!(parsed, Point::new(4.0, 7.0));
    }

    #[test]
    fn test_bounds_enclosing() {
        let bounds = Bounds::enclosing([
            Point::new(10.0, 5.0),
            Point::new(-3.0, 8.0),
            Point::new(4.0, -1.0),
        ])
        .unwrap();

        assert_eq!(bounds.min_point(), Point::new(-3.0, -1.0));
        assert_eq!(bounds.max_point(), Point::new(10.0, 8.0));
        assert_eq!(bounds.to_size(), Size::new(13.0, 9.0));
    }

    #[test]
    fn test_bounds_enclosing_empty() {
        assert!(Bounds::enclosing(std::iter::empty()).is_none());
    }

    #[test]
    fn test_size_add_padding() {
        let padded = Size::new(300.0, 200.0).add_padding(Insets::uniform(40.0));
        assert_eq!(padded, Size::new(380.0, 280.0));
    }
}
