// Load a scene or a single model file and print what was decoded.
//
// Usage:
//   ilo_inspect <scene.xml> [--config config.json]
//   ilo_inspect --model <file> [format]

use anyhow::{bail, Context, Result};
use ilo_core::{LoaderConfig, Mesh, ModelFormat, Registry, Scene, SceneAssembler};
use ilo_math::{Aabb, Vec3};
use std::env;
use std::path::{Path, PathBuf};

enum Command {
    Scene { path: PathBuf, config: Option<PathBuf> },
    Model { path: PathBuf, format: Option<ModelFormat> },
}

fn parse_args(args: &[String]) -> Result<Command> {
    match args {
        [flag, path] if flag == "--model" => Ok(Command::Model {
            path: PathBuf::from(path),
            format: None,
        }),
        [flag, path, format] if flag == "--model" => Ok(Command::Model {
            path: PathBuf::from(path),
            format: Some(format.parse().map_err(anyhow::Error::msg)?),
        }),
        [path] => Ok(Command::Scene {
            path: PathBuf::from(path),
            config: None,
        }),
        [path, flag, config] if flag == "--config" => Ok(Command::Scene {
            path: PathBuf::from(path),
            config: Some(PathBuf::from(config)),
        }),
        _ => bail!("Usage: ilo_inspect <scene.xml> [--config config.json] | --model <file> [format]"),
    }
}

fn fmt_vec3(v: Vec3) -> String {
    format!("({:.3}, {:.3}, {:.3})", v.x, v.y, v.z)
}

fn fmt_bounds(bounds: &Aabb) -> String {
    if bounds.is_empty() {
        "empty".to_string()
    } else {
        format!("{} .. {}", fmt_vec3(bounds.min), fmt_vec3(bounds.max))
    }
}

fn print_mesh(label: &str, mesh: &Mesh) {
    println!(
        "  {}: {} vertices, {} faces, bounds {}, radius {:.3}{}",
        label,
        mesh.vertex_count(),
        mesh.face_count(),
        fmt_bounds(mesh.bounds()),
        mesh.bounding_sphere().radius,
        if mesh.has_colors() { ", colored" } else { "" }
    );
}

fn inspect_model(path: &Path, format: Option<ModelFormat>) -> Result<()> {
    let format = match format {
        Some(format) => format,
        None => ModelFormat::from_path(path)?,
    };
    let models = format
        .decode_file(path)
        .with_context(|| format!("Failed to decode {}", path.display()))?;

    println!("{} ({}): {} model(s)", path.display(), format, models.len());
    for raw in &models {
        let mesh = Mesh::from_raw(raw)?;
        print_mesh(&raw.name, &mesh);
        println!(
            "    raw: {} positions, {} normals, {} uvs, {} colors",
            raw.positions.len(),
            raw.normals.len(),
            raw.uvs.len(),
            raw.colors.len()
        );
    }
    Ok(())
}

fn print_scene(scene: &Scene, registry: &Registry) -> Result<()> {
    println!("\n=== Scene ===");
    println!("Id:   {}", scene.info.id.as_deref().unwrap_or("-"));
    println!("Name: {}", scene.info.name.as_deref().unwrap_or("-"));
    println!("Type: {}", scene.info.kind.as_deref().unwrap_or("-"));

    println!("\n=== Geometry ({}) ===", registry.geometry().len());
    for (key, mesh) in registry.geometry().iter() {
        print_mesh(&key.to_string(), mesh);
    }

    println!("\n=== Materials ({}) ===", registry.materials().len());
    for (key, material) in registry.materials().iter() {
        let d = material.diffuse;
        println!(
            "  {}: diffuse ({:.2}, {:.2}, {:.2}, {:.2}), shininess {:.1}, texture {}, shader {}",
            key,
            d[0],
            d[1],
            d[2],
            d[3],
            material.shininess,
            material.texture.as_ref().map(|t| t.path.as_str()).unwrap_or("-"),
            if material.shader.is_some() { "yes" } else { "no" }
        );
        if let Some(image) = material.texture.as_ref().and_then(|t| t.image.as_ref()) {
            let [r, g, b, a] = image.pixel(0, 0);
            println!(
                "    image: {}x{}, first texel ({}, {}, {}, {})",
                image.width, image.height, r, g, b, a
            );
        }
    }

    println!("\n=== Nodes ({}) ===", scene.node_count());
    scene.root.visit(|node, depth, world| {
        let geometry = node.geometry().map(|k| k.to_string()).unwrap_or_else(|| "-".to_string());
        let material = node.material().map(|k| k.to_string()).unwrap_or_else(|| "-".to_string());
        println!(
            "{}{} geometry={} material={} at {}{}",
            "  ".repeat(depth + 1),
            node.id(),
            geometry,
            material,
            fmt_vec3(world.transform_point3(Vec3::ZERO)),
            if node.visible { "" } else { " (hidden)" }
        );
    });

    println!("\nWorld bounds: {}", fmt_bounds(&scene.world_bounds(registry)?));
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    match parse_args(&args)? {
        Command::Model { path, format } => inspect_model(&path, format),
        Command::Scene { path, config } => {
            let config = match config {
                Some(config) => LoaderConfig::from_json_file(&config)
                    .with_context(|| format!("Failed to read config {}", config.display()))?,
                None => LoaderConfig::default(),
            };

            let mut registry = Registry::new();
            let scene = SceneAssembler::new(&mut registry, &config)
                .load(&path)
                .with_context(|| format!("Failed to load scene {}", path.display()))?;

            print_scene(&scene, &registry)
        }
    }
}
