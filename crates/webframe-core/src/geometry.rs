#![forbid(unsafe_code)]

//! Integer geometry in document and window coordinates.
//!
//! All coordinates are signed pixels. Rectangles are half-open: the left
//! and top edges are inside, the right and bottom edges are not.

use std::ops::{Add, Sub};

/// A point in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct IntPoint {
    pub x: i32,
    pub y: i32,
}

impl IntPoint {
    #[inline]
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    #[inline]
    #[must_use]
    pub const fn zero() -> Self {
        Self::new(0, 0)
    }

    /// Offset by a size.
    #[inline]
    #[must_use]
    pub const fn translated(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x.saturating_add(dx), self.y.saturating_add(dy))
    }

    /// Manhattan distance to another point.
    #[inline]
    #[must_use]
    pub fn manhattan_distance(self, other: IntPoint) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }
}

impl Add<IntSize> for IntPoint {
    type Output = IntPoint;

    fn add(self, rhs: IntSize) -> IntPoint {
        self.translated(rhs.width, rhs.height)
    }
}

impl Sub<IntSize> for IntPoint {
    type Output = IntPoint;

    fn sub(self, rhs: IntSize) -> IntPoint {
        self.translated(-rhs.width, -rhs.height)
    }
}

impl Sub for IntPoint {
    type Output = IntSize;

    fn sub(self, rhs: IntPoint) -> IntSize {
        IntSize::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// A width/height pair. Also used as a displacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct IntSize {
    pub width: i32,
    pub height: i32,
}

impl IntSize {
    #[inline]
    #[must_use]
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Clamp both dimensions to be non-negative.
    #[inline]
    #[must_use]
    pub fn clamped_to_zero(self) -> Self {
        Self::new(self.width.max(0), self.height.max(0))
    }
}

/// An axis-aligned rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct IntRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl IntRect {
    #[inline]
    #[must_use]
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    #[inline]
    #[must_use]
    pub const fn from_origin_size(origin: IntPoint, size: IntSize) -> Self {
        Self::new(origin.x, origin.y, size.width, size.height)
    }

    #[inline]
    #[must_use]
    pub const fn origin(&self) -> IntPoint {
        IntPoint::new(self.x, self.y)
    }

    #[inline]
    #[must_use]
    pub const fn size(&self) -> IntSize {
        IntSize::new(self.width, self.height)
    }

    /// Right edge (exclusive).
    #[inline]
    #[must_use]
    pub const fn right(&self) -> i32 {
        self.x.saturating_add(self.width)
    }

    /// Bottom edge (exclusive).
    #[inline]
    #[must_use]
    pub const fn bottom(&self) -> i32 {
        self.y.saturating_add(self.height)
    }

    /// Area in square pixels; zero for empty rectangles.
    #[inline]
    #[must_use]
    pub fn area(&self) -> u64 {
        if self.is_empty() {
            0
        } else {
            self.width as u64 * self.height as u64
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    #[inline]
    #[must_use]
    pub const fn contains_point(&self, point: IntPoint) -> bool {
        point.x >= self.x && point.x < self.right() && point.y >= self.y && point.y < self.bottom()
    }

    /// Whether `other` lies entirely inside this rectangle. An empty
    /// `other` is contained by anything.
    #[inline]
    #[must_use]
    pub const fn contains_rect(&self, other: &IntRect) -> bool {
        other.is_empty()
            || (other.x >= self.x
                && other.y >= self.y
                && other.right() <= self.right()
                && other.bottom() <= self.bottom())
    }

    #[inline]
    #[must_use]
    pub fn intersects(&self, other: &IntRect) -> bool {
        self.intersection_opt(other).is_some()
    }

    /// Intersection, or `None` when the rectangles do not overlap.
    #[must_use]
    pub fn intersection_opt(&self, other: &IntRect) -> Option<IntRect> {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        (x < right && y < bottom).then(|| IntRect::new(x, y, right - x, bottom - y))
    }

    /// Intersection; an empty rectangle when they do not overlap.
    #[inline]
    #[must_use]
    pub fn intersection(&self, other: &IntRect) -> IntRect {
        self.intersection_opt(other).unwrap_or_default()
    }

    /// Smallest rectangle containing both. Empty operands are ignored so
    /// that uniting into a default rectangle does not drag in the origin.
    #[must_use]
    pub fn union(&self, other: &IntRect) -> IntRect {
        if other.is_empty() {
            return *self;
        }
        if self.is_empty() {
            return *other;
        }
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        IntRect::new(x, y, right - x, bottom - y)
    }

    #[inline]
    #[must_use]
    pub fn translated(&self, dx: i32, dy: i32) -> IntRect {
        IntRect::new(
            self.x.saturating_add(dx),
            self.y.saturating_add(dy),
            self.width,
            self.height,
        )
    }

    /// Center point, rounded toward the origin.
    #[inline]
    #[must_use]
    pub const fn center(&self) -> IntPoint {
        IntPoint::new(self.x + self.width / 2, self.y + self.height / 2)
    }
}
