mod common;

use sge_tools_lib::model::{children_of, SgeModelType};
use sge_tools_lib::{decode_json, encode_json, SgeFormatVersion};

#[test]
fn bone_links_survive_both_schemas() {
    let model = common::character_model();

    for version in [SgeFormatVersion::Flat, SgeFormatVersion::Nested] {
        let text = encode_json(&model, version).unwrap();
        let decoded = decode_json(&text).unwrap();
        assert_eq!(children_of(&decoded.bones, 1).unwrap(), vec![2]);
        assert_eq!(children_of(&decoded.bones, 2).unwrap(), vec![3]);
        assert_eq!(children_of(&decoded.bones, 3).unwrap(), Vec::<i32>::new());
        assert_eq!(
            decoded.bones[2].body_part,
            Some(sge_tools_lib::model::bone::BODY_PART_NECK)
        );
    }
}

#[test]
fn vertex_groups_rebuild_from_palettes() {
    let mut model = common::character_model();
    model.rebuild_vertex_groups().unwrap();

    // Vertex 1 carries weight 0.75 on palette slot 1 (bone 2) and the
    // remaining 0.25 on slot 0 (bone 1).
    assert_eq!(model.bones[1].vertex_group.get("0,0,1"), Some(&0.75));
    assert_eq!(model.bones[0].vertex_group.get("0,0,1"), Some(&0.25));
    // Vertex 2 is fully bound to bone 3.
    assert_eq!(model.bones[2].vertex_group.get("0,0,2"), Some(&1.0));

    // Groups ride through the flat document.
    let text = encode_json(&model, SgeFormatVersion::Flat).unwrap();
    let decoded = decode_json(&text).unwrap();
    assert_eq!(decoded.bones[1].vertex_group, model.bones[1].vertex_group);
}

#[test]
fn splitter_output_encodes_cleanly() {
    use sge_tools_lib::math::SgeVector3;
    use sge_tools_lib::model::{build_submesh_group, SourceMesh, SourceVertex};

    // Enough fresh bones per triangle to force several submeshes.
    let mut vertices = vec![];
    let mut faces = vec![];
    for i in 0..10u32 {
        let b = (i * 3 + 1) as i32;
        for j in 0..3 {
            vertices.push(SourceVertex {
                position: SgeVector3::new(i as f32, j as f32, 0.0),
                normal: SgeVector3::new(0.0, 1.0, 0.0),
                uv_coords: sge_tools_lib::math::SgeVector2::zero(),
                color: sge_tools_lib::math::SgeColor::white(),
                bone_weights: vec![(b + j as i32, 1.0)],
            });
        }
        faces.push([i * 3, i * 3 + 1, i * 3 + 2]);
    }
    let source = SourceMesh {
        vertices,
        faces,
        material: Some(0),
        gx_lighting_address: Some(1),
        blend_address: None,
        outline_address: None,
    };

    let group = build_submesh_group(&[source], SgeModelType::Character).unwrap();
    assert!(group.len() > 1);

    let mut model = common::character_model();
    model.bones = (1..=30)
        .map(|a| sge_tools_lib::model::SgeBone::new(a, SgeVector3::zero()))
        .collect();
    model.animations.clear();
    model.submesh_groups = vec![group];

    // The splitter's bookkeeping satisfies the validators on both paths.
    let text = encode_json(&model, SgeFormatVersion::Flat).unwrap();
    let decoded = decode_json(&text).unwrap();
    assert_eq!(decoded.submesh_groups, model.submesh_groups);

    let data = sge_tools_lib::encode_binary(&model).unwrap();
    let from_binary = sge_tools_lib::decode_binary(&data).unwrap();
    assert_eq!(
        from_binary.submesh_groups[0].len(),
        model.submesh_groups[0].len()
    );
}
