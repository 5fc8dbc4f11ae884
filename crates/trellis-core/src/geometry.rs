//! Plain geometry shared by layout and virtualization

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Point { x, y }
    }

    pub fn offset(self, by: Point) -> Self {
        Point::new(self.x + by.x, self.y + by.y)
    }

    /// Largest axis distance to another point.
    pub fn max_delta(self, other: Point) -> f64 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Size { width, height }
    }

    pub fn max_delta(self, other: Size) -> f64 {
        (self.width - other.width)
            .abs()
            .max((self.height - other.height).abs())
    }
}

/// Axis-aligned rectangle in graph coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub min: Point,
    pub max: Point,
}

impl Rect {
    pub fn new(origin: Point, size: Size) -> Self {
        Rect {
            min: origin,
            max: Point::new(origin.x + size.width, origin.y + size.height),
        }
    }

    /// Smallest rectangle containing both points.
    pub fn from_points(a: Point, b: Point) -> Self {
        Rect {
            min: Point::new(a.x.min(b.x), a.y.min(b.y)),
            max: Point::new(a.x.max(b.x), a.y.max(b.y)),
        }
    }

    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    pub fn center(&self) -> Point {
        Point::new((self.min.x + self.max.x) * 0.5, (self.min.y + self.max.y) * 0.5)
    }

    pub fn union(&self, other: &Rect) -> Rect {
        Rect {
            min: Point::new(self.min.x.min(other.min.x), self.min.y.min(other.min.y)),
            max: Point::new(self.max.x.max(other.max.x), self.max.y.max(other.max.y)),
        }
    }

    /// Edges touching counts as intersecting.
    pub fn intersects(&self, other: &Rect) -> bool {
        !(self.max.x < other.min.x
            || self.min.x > other.max.x
            || self.max.y < other.min.y
            || self.min.y > other.max.y)
    }

    pub fn expand(&self, padding: f64) -> Rect {
        Rect {
            min: Point::new(self.min.x - padding, self.min.y - padding),
            max: Point::new(self.max.x + padding, self.max.y + padding),
        }
    }

    /// Bounding box of a set of rectangles, `None` when empty or non-finite.
    pub fn bounding<'a>(rects: impl IntoIterator<Item = &'a Rect>) -> Option<Rect> {
        let mut iter = rects.into_iter();
        let first = *iter.next()?;
        let bounds = iter.fold(first, |acc, r| acc.union(r));
        let finite = bounds.min.x.is_finite()
            && bounds.min.y.is_finite()
            && bounds.max.x.is_finite()
            && bounds.max.y.is_finite();
        finite.then_some(bounds)
    }
}

/// Pan/zoom transform of the rendering surface. A graph point `p` lands on
/// screen at `p * zoom + (x, y)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub x: f64,
    pub y: f64,
    pub zoom: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Viewport { x: 0.0, y: 0.0, zoom: 1.0 }
    }
}

impl Viewport {
    /// The part of the graph visible in a container of the given screen size.
    pub fn visible_rect(&self, container: Size) -> Rect {
        let zoom = if self.zoom > f64::EPSILON { self.zoom } else { f64::EPSILON };
        let min = Point::new(-self.x / zoom, -self.y / zoom);
        Rect::new(min, Size::new(container.width / zoom, container.height / zoom))
    }

    /// Viewport that fits `bounds` into `container` with a screen-space margin.
    pub fn fit(bounds: &Rect, container: Size, padding: f64, max_zoom: f64) -> Viewport {
        let avail_w = (container.width - 2.0 * padding).max(1.0);
        let avail_h = (container.height - 2.0 * padding).max(1.0);
        let zoom_x = avail_w / bounds.width().max(1.0);
        let zoom_y = avail_h / bounds.height().max(1.0);
        let zoom = zoom_x.min(zoom_y).min(max_zoom);
        let center = bounds.center();
        Viewport {
            x: container.width * 0.5 - center.x * zoom,
            y: container.height * 0.5 - center.y * zoom,
            zoom,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visible_rect_accounts_for_pan_and_zoom() {
        let viewport = Viewport { x: -100.0, y: -50.0, zoom: 2.0 };
        let rect = viewport.visible_rect(Size::new(800.0, 600.0));
        assert_eq!(rect.min, Point::new(50.0, 25.0));
        assert_eq!(rect.max, Point::new(450.0, 325.0));
    }

    #[test]
    fn fit_centers_bounds() {
        let bounds = Rect::new(Point::new(0.0, 0.0), Size::new(100.0, 100.0));
        let viewport = Viewport::fit(&bounds, Size::new(200.0, 200.0), 0.0, 4.0);
        assert_eq!(viewport.zoom, 2.0);
        let visible = viewport.visible_rect(Size::new(200.0, 200.0));
        assert!((visible.min.x - 0.0).abs() < 1e-9);
        assert!((visible.max.y - 100.0).abs() < 1e-9);
    }

    #[test]
    fn rect_intersection_is_inclusive() {
        let a = Rect::new(Point::new(0.0, 0.0), Size::new(10.0, 10.0));
        let b = Rect::new(Point::new(10.0, 10.0), Size::new(5.0, 5.0));
        let c = Rect::new(Point::new(11.0, 0.0), Size::new(5.0, 5.0));
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
    }
}
