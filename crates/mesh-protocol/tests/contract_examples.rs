//! Frozen wire-format examples. Each asserts the exact JSON the protocol
//! produces for a given message, so an accidental field rename or tag change
//! surfaces here before it breaks a deployed client.

use mesh_protocol::*;

#[test]
fn set_value_req_wire_shape() {
    let msg = WireMessage::SetValueReq(SetValueReq {
        key: "room.count".to_owned(),
        value: b"\"3\"".to_vec(),
    });
    let json: serde_json::Value = serde_json::to_value(&msg).unwrap();
    assert_eq!(json["kind"], "set_value_req");
    assert_eq!(json["key"], "room.count");
}

#[test]
fn value_change_notify_ack_round_trips() {
    let msg = WireMessage::ValueChangeNotifyAck(ValueChangeNotifyAck {
        key: "_svcdesc_chat#0@default".to_owned(),
        value: b"{}".to_vec(),
    });
    let json = serde_json::to_string(&msg).unwrap();
    let back: WireMessage = serde_json::from_str(&json).unwrap();
    assert_eq!(back, msg);
}

#[test]
fn delete_value_ack_reports_status_and_key() {
    let msg = WireMessage::DeleteValueAck(DeleteValueAck {
        code: StatusCode::NotExists,
        key: "missing".to_owned(),
    });
    let json: serde_json::Value = serde_json::to_value(&msg).unwrap();
    assert_eq!(json["code"], "not_exists");
    assert_eq!(json["key"], "missing");
}

#[test]
fn unknown_kind_fails_to_deserialize() {
    let raw = r#"{"kind":"totally_unknown"}"#;
    assert!(serde_json::from_str::<WireMessage>(raw).is_err());
}
