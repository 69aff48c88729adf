use super::*;
use serde_json::json;

fn sample_rect() -> Element {
    Element::new("e1", ElementKind::Rectangle, 0.0, 0.0, 10.0, 10.0).with_color("#000")
}

// =============================================================================
// Element wire shape
// =============================================================================

#[test]
fn element_serializes_camel_case_fields() {
    let element = sample_rect().with_stroke_size(4.0).with_created_by("p1");
    let value = serde_json::to_value(&element).expect("serialize");
    assert_eq!(value["kind"], "rectangle");
    assert_eq!(value["strokeSize"], 4.0);
    assert_eq!(value["createdBy"], "p1");
    assert!(value.get("points").is_none(), "empty points are omitted");
    assert!(value.get("imageData").is_none());
}

#[test]
fn element_deserializes_minimal_payload_with_defaults() {
    let element: Element = serde_json::from_value(json!({
        "id": "e1", "kind": "rectangle", "x1": 0, "y1": 0, "x2": 10, "y2": 10, "color": "#000"
    }))
    .expect("deserialize");
    assert_eq!(element, sample_rect());
    assert!((element.stroke_size - DEFAULT_STROKE_SIZE).abs() < f64::EPSILON);
    assert!(!element.filled);
}

#[test]
fn kind_accepts_short_aliases() {
    let pen: ElementKind = serde_json::from_str("\"pen\"").expect("pen alias");
    let shape: ElementKind = serde_json::from_str("\"shape\"").expect("shape alias");
    assert_eq!(pen, ElementKind::PenStroke);
    assert_eq!(shape, ElementKind::FreeFormShape);
    assert_eq!(serde_json::to_string(&ElementKind::PenStroke).expect("serialize"), "\"pen-stroke\"");
    assert_eq!(
        serde_json::to_string(&ElementKind::FreeFormShape).expect("serialize"),
        "\"free-form-shape\""
    );
}

#[test]
fn unknown_kind_is_rejected() {
    let result = serde_json::from_value::<Element>(json!({
        "id": "e1", "kind": "hexagon", "x1": 0, "y1": 0, "x2": 1, "y2": 1
    }));
    assert!(result.is_err());
}

#[test]
fn extended_to_appends_points_only_for_point_kinds() {
    let pen = Element::new("p", ElementKind::PenStroke, 1.0, 1.0, 1.0, 1.0).with_points(vec![Point::new(1.0, 1.0)]);
    let grown = pen.extended_to(Point::new(5.0, 6.0));
    assert_eq!(grown.points.len(), 2);
    assert!((grown.x2 - 5.0).abs() < f64::EPSILON);

    let rect = sample_rect().extended_to(Point::new(20.0, 30.0));
    assert!(rect.points.is_empty());
    assert!((rect.y2 - 30.0).abs() < f64::EPSILON);
}

#[test]
fn translated_moves_corners_and_points() {
    let pen = Element::new("p", ElementKind::PenStroke, 0.0, 0.0, 2.0, 2.0)
        .with_points(vec![Point::new(0.0, 0.0), Point::new(2.0, 2.0)]);
    let moved = pen.translated(10.0, -1.0);
    assert_eq!(moved.points, vec![Point::new(10.0, -1.0), Point::new(12.0, 1.0)]);
    assert!((moved.x1 - 10.0).abs() < f64::EPSILON);
    assert!((moved.y2 - 1.0).abs() < f64::EPSILON);
}

// =============================================================================
// Validation
// =============================================================================

#[test]
fn validate_accepts_well_formed_element() {
    assert!(sample_rect().validate().is_ok());
}

#[test]
fn validate_rejects_empty_id() {
    let element = Element::new("", ElementKind::Line, 0.0, 0.0, 1.0, 1.0);
    assert_eq!(element.validate(), Err(ElementError::EmptyId));
}

#[test]
fn validate_rejects_non_finite_points() {
    let element = Element::new("p", ElementKind::PenStroke, 0.0, 0.0, 1.0, 1.0)
        .with_points(vec![Point::new(f64::NAN, 0.0)]);
    assert!(matches!(element.validate(), Err(ElementError::NonFiniteGeometry { .. })));
}

#[test]
fn validate_rejects_negative_stroke() {
    let element = sample_rect().with_stroke_size(-1.0);
    assert!(matches!(element.validate(), Err(ElementError::InvalidStrokeSize { .. })));
}

// =============================================================================
// Client events
// =============================================================================

#[test]
fn decode_element_add() {
    let text = r##"{"type":"element-add","element":{"id":"e1","kind":"rectangle","x1":0,"y1":0,"x2":10,"y2":10,"color":"#000"}}"##;
    let event = decode_client_event(text).expect("decode");
    assert_eq!(event, ClientEvent::ElementAdd { element: sample_rect() });
    assert_eq!(event.name(), "element-add");
}

#[test]
fn decode_element_delete_and_cursor_move() {
    let delete = decode_client_event(r#"{"type":"element-delete","id":"e1"}"#).expect("delete");
    assert_eq!(delete, ClientEvent::ElementDelete { id: "e1".into() });

    let cursor = decode_client_event(r#"{"type":"cursor-move","position":{"x":3.5,"y":-2}}"#).expect("cursor");
    assert_eq!(cursor, ClientEvent::CursorMove { position: Point::new(3.5, -2.0) });
}

#[test]
fn decode_rejects_unknown_event_type() {
    let err = decode_client_event(r#"{"type":"element-explode","id":"e1"}"#).expect_err("unknown type");
    assert!(matches!(err, CodecError::Json(_)));
    assert_eq!(err.error_code(), "E_MALFORMED_EVENT");
}

#[test]
fn decode_rejects_non_json() {
    assert!(matches!(decode_client_event("not json"), Err(CodecError::Json(_))));
}

#[test]
fn decode_rejects_invalid_element_inside_replace() {
    let text = r#"{"type":"elements-replace","elements":[{"id":"","kind":"line","x1":0,"y1":0,"x2":1,"y2":1}]}"#;
    let err = decode_client_event(text).expect_err("empty id");
    assert!(matches!(err, CodecError::InvalidElement(ElementError::EmptyId)));
    assert_eq!(err.error_code(), "E_INVALID_ELEMENT");
}

#[test]
fn decode_rejects_empty_delete_id() {
    let err = decode_client_event(r#"{"type":"element-delete","id":""}"#).expect_err("empty id");
    assert!(matches!(err, CodecError::InvalidElement(ElementError::EmptyId)));
}

// =============================================================================
// Server events
// =============================================================================

#[test]
fn server_cursor_move_uses_camel_case_participant_id() {
    let event = ServerEvent::CursorMove { participant_id: "p1".into(), position: Point::new(1.0, 2.0) };
    let text = encode_server_event(&event).expect("encode");
    let value: serde_json::Value = serde_json::from_str(&text).expect("json");
    assert_eq!(value["type"], "cursor-move");
    assert_eq!(value["participantId"], "p1");
    assert!(event.is_cursor());
}

#[test]
fn server_joined_decodes_from_wire_text() {
    let event = decode_server_event(r#"{"type":"joined","roomId":"r1","participantId":"p1"}"#).expect("decode");
    assert_eq!(event, ServerEvent::Joined { room_id: "r1".into(), participant_id: "p1".into() });
    assert_eq!(event.name(), "joined");
}

#[test]
fn users_event_omits_absent_cursor() {
    let event = ServerEvent::Users {
        users: vec![Participant { id: "p1".into(), name: "Ada".into(), color: "#f44336".into(), cursor: None }],
    };
    let value = serde_json::to_value(&event).expect("serialize");
    assert!(value["users"][0].get("cursor").is_none());
}

#[test]
fn error_from_typed_carries_code_and_message() {
    let event = ServerEvent::error_from(&ElementError::EmptyId);
    assert_eq!(
        event,
        ServerEvent::Error { code: "E_INVALID_ELEMENT".into(), message: "element id must not be empty".into() }
    );
}

#[test]
fn identity_missing_fields_default_to_empty() {
    let identity: Identity = serde_json::from_value(json!({"name": "Ada"})).expect("deserialize");
    assert!(identity.id.is_empty());
    assert_eq!(identity.name, "Ada");
    assert!(identity.color.is_none());
}
