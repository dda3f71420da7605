use std::path::PathBuf;

use ptree::{print_tree, TreeBuilder};

use sge_tools_lib::model::{children_of, SgeBone, SgeModel};
use sge_tools_lib::SgeFormatVersion;

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage:");
        eprintln!("  sge_inspect <model_file>");
        eprintln!("  sge_inspect <model_file> --to-json <output_file> [--version v6|v8]");
        eprintln!();
        eprintln!("Examples:");
        eprintln!("  sge_inspect ./c_haruhi.sge");
        eprintln!("  sge_inspect ./c_haruhi.sge --to-json ./c_haruhi.json --version v8");
        std::process::exit(1);
    }

    let input = PathBuf::from(&args[1]);
    let model = match sge_tools_lib::load_model(&input) {
        Ok(model) => model,
        Err(e) => {
            eprintln!("Failed to load '{}': {:?}", input.display(), e);
            std::process::exit(1);
        }
    };

    // Parse optional --to-json / --version flags
    let mut output: Option<PathBuf> = None;
    let mut version = SgeFormatVersion::Flat;
    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--to-json" => {
                if let Some(path) = args.get(i + 1) {
                    output = Some(PathBuf::from(path));
                    i += 2;
                } else {
                    eprintln!("--to-json requires an output path");
                    std::process::exit(1);
                }
            }
            "--version" => {
                match args.get(i + 1).map(|s| s.as_str()) {
                    Some("v6") => version = SgeFormatVersion::Nested,
                    Some("v8") => version = SgeFormatVersion::Flat,
                    other => {
                        eprintln!("Unknown version '{:?}', expected v6 or v8", other);
                        std::process::exit(1);
                    }
                }
                i += 2;
            }
            other => {
                eprintln!("Unknown argument '{}'", other);
                std::process::exit(1);
            }
        }
    }

    print_summary(&model);
    if let Err(e) = print_bone_tree(&model) {
        eprintln!("Failed to print bone tree: {:?}", e);
        std::process::exit(1);
    }

    if let Some(output) = output {
        if let Err(e) = sge_tools_lib::save_model_json(&model, &output, version) {
            eprintln!("Failed to write '{}': {:?}", output.display(), e);
            std::process::exit(1);
        }
        eprintln!("Wrote {}", output.display());
    }
}

fn print_summary(model: &SgeModel) {
    println!("version:        {}", model.header.version);
    println!("model type:     {:?}", model.header.model_type);
    println!("materials:      {}", model.materials.len());
    println!("bones:          {}", model.bones.len());
    println!("submesh groups: {}", model.submesh_groups.len());
    for (g, group) in model.submesh_groups.iter().enumerate() {
        let vertices: usize = group.iter().map(|s| s.vertices.len()).sum();
        let faces: usize = group.iter().map(|s| s.faces.len()).sum();
        println!(
            "  group {}: {} submeshes, {} vertices, {} faces",
            g,
            group.len(),
            vertices,
            faces
        );
    }
    println!("animations:     {}", model.animations.len());
}

fn print_bone_tree(model: &SgeModel) -> sge_tools_lib::Result<()> {
    if model.bones.is_empty() {
        return Ok(());
    }
    let mut tree = TreeBuilder::new("bones".to_string());
    for bone in model.bones.iter().filter(|b| b.is_root()) {
        add_bone_to_tree(model, bone, &mut tree)?;
    }
    print_tree(&tree.build())?;
    Ok(())
}

fn add_bone_to_tree(
    model: &SgeModel,
    bone: &SgeBone,
    tree: &mut TreeBuilder,
) -> sge_tools_lib::Result<()> {
    let label = match bone.body_part {
        Some(tag) => format!("[{}] body part {:#06x}", bone.address, tag as u16),
        None => format!("[{}]", bone.address),
    };
    let children = children_of(&model.bones, bone.address)?;
    if children.is_empty() {
        tree.add_empty_child(label);
        return Ok(());
    }
    tree.begin_child(label);
    for address in children {
        if let Some(child) = model.bones.iter().find(|b| b.address == address) {
            add_bone_to_tree(model, child, tree)?;
        }
    }
    tree.end_child();
    Ok(())
}
