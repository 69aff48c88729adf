#![allow(clippy::float_cmp)]

use super::*;

const EPSILON: f64 = 1e-10;

fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < EPSILON
}

fn point_approx_eq(a: Point, b: Point) -> bool {
    approx_eq(a.x, b.x) && approx_eq(a.y, b.y)
}

// --- Defaults ---

#[test]
fn default_is_identity() {
    let view = ViewTransform::default();
    assert_eq!(view.scale, 1.0);
    assert_eq!(view.offset_x, 0.0);
    assert_eq!(view.offset_y, 0.0);
    let p = Point::new(12.0, -7.0);
    assert!(point_approx_eq(view.screen_to_world(p), p));
}

// --- Conversions ---

#[test]
fn screen_to_world_undoes_offset_then_scale() {
    let view = ViewTransform { scale: 2.0, offset_x: 100.0, offset_y: 50.0 };
    let world = view.screen_to_world(Point::new(300.0, 150.0));
    assert!(point_approx_eq(world, Point::new(100.0, 50.0)));
}

#[test]
fn world_to_screen_inverts_screen_to_world() {
    let view = ViewTransform { scale: 0.75, offset_x: -40.0, offset_y: 13.0 };
    let screen = Point::new(210.0, 95.5);
    let back = view.world_to_screen(view.screen_to_world(screen));
    assert!(point_approx_eq(back, screen));
}

#[test]
fn screen_dist_scales_with_zoom() {
    let view = ViewTransform { scale: 4.0, ..ViewTransform::default() };
    assert!(approx_eq(view.screen_dist_to_world(8.0), 2.0));
}

// --- Pan / zoom ---

#[test]
fn pan_by_accumulates() {
    let mut view = ViewTransform::default();
    view.pan_by(10.0, -5.0);
    view.pan_by(2.5, 1.0);
    assert!(approx_eq(view.offset_x, 12.5));
    assert!(approx_eq(view.offset_y, -4.0));
}

#[test]
fn zoom_at_keeps_anchor_fixed() {
    let mut view = ViewTransform { scale: 1.0, offset_x: 30.0, offset_y: 20.0 };
    let anchor = Point::new(200.0, 120.0);
    let world_before = view.screen_to_world(anchor);
    view.zoom_at(anchor, 1.2);
    assert!(approx_eq(view.scale, 1.2));
    assert!(point_approx_eq(view.screen_to_world(anchor), world_before));
}

#[test]
fn zoom_is_clamped() {
    let mut view = ViewTransform::default();
    for _ in 0..100 {
        view.zoom_at(Point::default(), 1.2);
    }
    assert_eq!(view.scale, MAX_SCALE);
    for _ in 0..200 {
        view.zoom_at(Point::default(), 1.0 / 1.2);
    }
    assert_eq!(view.scale, MIN_SCALE);
}

#[test]
fn serializes_with_camel_case_offsets() {
    let view = ViewTransform { scale: 2.0, offset_x: 1.0, offset_y: 3.0 };
    let value = serde_json::to_value(view).unwrap();
    assert_eq!(value["offsetX"], 1.0);
    assert_eq!(value["offsetY"], 3.0);
}
