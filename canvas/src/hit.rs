#[cfg(test)]
#[path = "hit_test.rs"]
mod hit_test;

use frames::{Element, ElementKind};

use crate::camera::{Point, ViewTransform};
use crate::consts::{HIT_TOLERANCE_PX, TEXT_ADVANCE_PER_CHAR, TEXT_LINE_HEIGHT};
use crate::doc::DocStore;

/// Front-most element under `world_pt`, if any.
///
/// Elements are checked in reverse draw order so the topmost one wins.
/// Line and stroke slop is a fixed screen distance, converted to world units
/// through `view`.
#[must_use]
pub fn hit_test<'a>(world_pt: Point, doc: &'a DocStore, view: &ViewTransform) -> Option<&'a Element> {
    let tolerance = view.screen_dist_to_world(HIT_TOLERANCE_PX);
    doc.elements()
        .iter()
        .rev()
        .find(|element| contains_point(element, world_pt, tolerance))
}

/// Whether `p` lies on or inside `element`, with `tolerance` world units of slop
/// for thin geometry.
#[must_use]
pub fn contains_point(element: &Element, p: Point, tolerance: f64) -> bool {
    match element.kind {
        ElementKind::Rectangle | ElementKind::Image => in_corners(element, p),
        ElementKind::Circle => {
            let center = Point::new((element.x1 + element.x2) / 2.0, (element.y1 + element.y2) / 2.0);
            let radius = distance(Point::new(element.x1, element.y1), Point::new(element.x2, element.y2)) / 2.0;
            distance(center, p) <= radius
        }
        ElementKind::Line => {
            let a = Point::new(element.x1, element.y1);
            let b = Point::new(element.x2, element.y2);
            (distance(a, b) - (distance(a, p) + distance(b, p))).abs() < tolerance
        }
        ElementKind::PenStroke => near_any_point(&element.points, p, tolerance),
        ElementKind::FreeFormShape => {
            near_any_point(&element.points, p, tolerance) || in_polygon(&element.points, p)
        }
        ElementKind::Text => {
            let chars = element.text.as_deref().map_or(0, |t| t.chars().count());
            #[allow(clippy::cast_precision_loss)]
            let width = chars as f64 * element.stroke_size * TEXT_ADVANCE_PER_CHAR;
            let height = element.stroke_size * TEXT_LINE_HEIGHT;
            p.x >= element.x1 && p.x <= element.x1 + width && p.y >= element.y1 - height && p.y <= element.y1
        }
    }
}

fn in_corners(element: &Element, p: Point) -> bool {
    let (min_x, max_x) = (element.x1.min(element.x2), element.x1.max(element.x2));
    let (min_y, max_y) = (element.y1.min(element.y2), element.y1.max(element.y2));
    p.x >= min_x && p.x <= max_x && p.y >= min_y && p.y <= max_y
}

fn near_any_point(points: &[Point], p: Point, tolerance: f64) -> bool {
    points
        .iter()
        .any(|q| (q.x - p.x).abs() < tolerance && (q.y - p.y).abs() < tolerance)
}

/// Even-odd ray cast against the closed outline through `points`.
fn in_polygon(points: &[Point], p: Point) -> bool {
    if points.len() < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = points.len() - 1;
    for i in 0..points.len() {
        let (a, b) = (points[i], points[j]);
        if (a.y > p.y) != (b.y > p.y) && p.x < (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x {
            inside = !inside;
        }
        j = i;
    }
    inside
}

fn distance(a: Point, b: Point) -> f64 {
    (a.x - b.x).hypot(a.y - b.y)
}
