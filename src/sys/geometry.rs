use std::fmt;

use serde::{Deserialize, Serialize};

/// An axis-aligned rectangle in root-window coordinates.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Rect {
        Rect { x, y, width, height }
    }

    pub fn right(&self) -> i32 { self.x + self.width }

    pub fn bottom(&self) -> i32 { self.y + self.height }

    pub fn center(&self) -> (i32, i32) { (self.x + self.width / 2, self.y + self.height / 2) }

    pub fn area(&self) -> i64 { i64::from(self.width.max(0)) * i64::from(self.height.max(0)) }

    pub fn is_empty(&self) -> bool { self.width <= 0 || self.height <= 0 }

    pub fn contains_point(&self, x: i32, y: i32) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }

    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        (right > x && bottom > y).then(|| Rect::new(x, y, right - x, bottom - y))
    }

    pub fn intersection_area(&self, other: &Rect) -> i64 {
        self.intersection(other).map_or(0, |r| r.area())
    }

    /// Shrinks every edge by `amount`. Sizes never drop below one pixel.
    pub fn inset(&self, amount: i32) -> Rect { self.inset_edges(amount, amount, amount, amount) }

    pub fn inset_edges(&self, left: i32, top: i32, right: i32, bottom: i32) -> Rect {
        Rect {
            x: self.x + left,
            y: self.y + top,
            width: (self.width - left - right).max(1),
            height: (self.height - top - bottom).max(1),
        }
    }

    pub fn translate(&self, dx: i32, dy: i32) -> Rect {
        Rect { x: self.x + dx, y: self.y + dy, ..*self }
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}{:+}{:+}", self.width, self.height, self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use test_log::test;

    use super::*;

    #[test]
    fn intersection_of_overlapping_rects() {
        let a = Rect::new(0, 0, 100, 100);
        let b = Rect::new(50, 25, 100, 100);
        assert_eq!(a.intersection(&b), Some(Rect::new(50, 25, 50, 75)));
        assert_eq!(a.intersection_area(&b), 50 * 75);
    }

    #[test]
    fn touching_rects_do_not_intersect() {
        let a = Rect::new(0, 0, 100, 100);
        let b = Rect::new(100, 0, 100, 100);
        assert_eq!(a.intersection(&b), None);
        assert!(!a.contains_point(100, 50));
        assert!(b.contains_point(100, 50));
    }

    #[test]
    fn inset_keeps_a_pixel() {
        assert_eq!(Rect::new(0, 0, 100, 50).inset(10), Rect::new(10, 10, 80, 30));
        assert_eq!(Rect::new(0, 0, 10, 10).inset(20).width, 1);
    }

    #[test]
    fn displays_like_an_x_geometry_string() {
        assert_eq!(Rect::new(-5, 10, 640, 480).to_string(), "640x480-5+10");
    }
}
