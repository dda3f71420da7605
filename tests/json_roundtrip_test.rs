mod common;

use sge_tools_lib::model::assemble_tracks;
use sge_tools_lib::{decode_json, encode_json, SgeError, SgeFormatVersion};

#[test]
fn flat_document_round_trips_exactly() {
    let model = common::character_model();
    let text = encode_json(&model, SgeFormatVersion::Flat).unwrap();
    let decoded = decode_json(&text).unwrap();
    assert_eq!(decoded, model);

    // Encoding the decoded model again is byte-stable.
    let text2 = encode_json(&decoded, SgeFormatVersion::Flat).unwrap();
    assert_eq!(text, text2);
}

#[test]
fn nested_document_round_trips() {
    let mut model = common::character_model();
    model.header.version = 6;
    let text = encode_json(&model, SgeFormatVersion::Nested).unwrap();
    let decoded = decode_json(&text).unwrap();
    // The fixture's bones are in depth-first order already, so addresses
    // survive the nested detour unchanged.
    assert_eq!(decoded, model);
}

#[test]
fn decoded_model_supports_track_assembly() {
    let model = common::character_model();
    let text = encode_json(&model, SgeFormatVersion::Flat).unwrap();
    let decoded = decode_json(&text).unwrap();

    let tracks = assemble_tracks(&decoded, 0).unwrap();
    assert_eq!(tracks.len(), 2);
    assert_eq!(tracks[0].bone_address, 2);
    assert_eq!(tracks[0].poses[0].frame, 0);
    assert_eq!(tracks[0].poses[1].frame, 20);
}

#[test]
fn dangling_references_fail_eagerly() {
    let model = common::character_model();
    let text = encode_json(&model, SgeFormatVersion::Flat).unwrap();

    // Point a used keyframe past the definition table.
    let mangled = text.replace(
        "\"UsedKeyframes\": [\n        0,\n        1\n      ]",
        "\"UsedKeyframes\": [\n        0,\n        9\n      ]",
    );
    assert_ne!(mangled, text);
    let err = decode_json(&mangled).unwrap_err();
    assert!(matches!(err, SgeError::UnresolvedReference { .. }));
}

#[test]
fn garbage_input_is_malformed() {
    let err = decode_json("not json at all").unwrap_err();
    assert!(matches!(err, SgeError::MalformedDocument(_)));
}
