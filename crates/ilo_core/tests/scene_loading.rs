//! End-to-end scene loading against the committed fixtures.

use std::path::{Path, PathBuf};

use ilo_core::formats::bsp::lumps::LumpKind;
use ilo_core::formats::bsp::BSP_MAGIC;
use ilo_core::{
    load_geometry_library, AssetError, IdFilter, LoaderConfig, ModelFormat, Namespace, Registry, SceneAssembler,
    TextureFilter,
};
use ilo_math::Vec3;

fn fixtures() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("fixtures")
}

fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("ilo_it_{}_{}", name, std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn approx(a: Vec3, b: Vec3) -> bool {
    (a - b).length() < 1e-4
}

#[test]
fn test_load_fixture_scene() {
    init_logging();
    let mut registry = Registry::new();
    let config = LoaderConfig::default();

    let scene = SceneAssembler::new(&mut registry, &config)
        .load(fixtures().join("scene.xml"))
        .unwrap();

    assert_eq!(scene.info.id.as_deref(), Some("fixture"));
    assert_eq!(scene.info.name.as_deref(), Some("Fixture room"));
    assert_eq!(scene.info.kind.as_deref(), Some("indoor"));

    let root = &scene.root;
    assert_eq!(root.id(), "main");
    assert!(root.hittest && root.shadow);
    let children: Vec<&str> = root.children().iter().map(|c| c.id()).collect();
    assert_eq!(children, vec!["a", "b"]);
    assert_eq!(root.child("a").unwrap().root_id(), Some("main"));

    let b = root.child("b").unwrap();
    assert!(!b.visible);
    assert!(b.material().is_none());
    assert_eq!(b.geometry().unwrap().to_string(), "level.Floor");

    // Only referenced ids are registered
    let geometry: Vec<String> = registry.geometry().keys().map(|k| k.to_string()).collect();
    assert_eq!(geometry, vec!["level.Box01", "level.Floor", "props.Tri"]);
    let materials: Vec<String> = registry.materials().keys().map(|k| k.to_string()).collect();
    assert_eq!(materials, vec!["mats.plain", "mats.wood"]);

    let box01 = registry.geometry().get("level", "Box01").unwrap();
    assert_eq!(box01.vertex_count(), 4);
    assert_eq!(box01.face_count(), 2);
    assert_eq!(box01.bounds().max, Vec3::new(2.0, 2.0, 0.0));

    let wood = registry.materials().get("mats", "wood").unwrap();
    assert_eq!(wood.diffuse, [0.8, 0.5, 0.2, 1.0]);
    let texture = wood.texture.as_ref().unwrap();
    assert_eq!(texture.filter, TextureFilter::Mipmap);
    assert!(Path::new(&texture.path).ends_with("wood.png"));
    assert!(texture.image.is_none());
    assert!(registry.materials().get("mats", "plain").unwrap().shader.is_some());

    // Hidden floor does not contribute
    let bounds = scene.world_bounds(&registry).unwrap();
    assert!(approx(bounds.min, Vec3::ZERO));
    assert!(approx(bounds.max, Vec3::new(2.0, 2.0, 0.0)));
}

#[test]
fn test_unresolved_reference_aborts_whole_load() {
    init_logging();
    let mut registry = Registry::new();
    let config = LoaderConfig::default();

    let markup = r#"<scene>
  <geometry id="level" src="box.ase"/>
  <matlib id="mats" src="materials.xml"/>
  <object id="main" geometry="level.Box01" texture="mats.wood"/>
  <object id="a" geometry="level.Missing"/>
</scene>"#;

    let err = SceneAssembler::new(&mut registry, &config)
        .load_from_str(markup, "broken.xml", &fixtures())
        .unwrap_err();
    match err {
        AssetError::UnresolvedReference { namespace, library, id } => {
            assert_eq!(namespace, Namespace::Geometry);
            assert_eq!(library, "level");
            assert_eq!(id, "Missing");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(registry.geometry().is_empty());
    assert!(registry.materials().is_empty());
}

#[test]
fn test_missing_asset_file() {
    let mut registry = Registry::new();
    let config = LoaderConfig::default();

    let markup = r#"<scene>
  <geometry id="level" src="nowhere.ase"/>
  <object id="main" geometry="level.Box01"/>
</scene>"#;

    let err = SceneAssembler::new(&mut registry, &config)
        .load_from_str(markup, "missing.xml", &fixtures())
        .unwrap_err();
    assert!(matches!(err, AssetError::FileNotFound { .. }));
}

#[test]
fn test_preload_textures_with_base_dir() {
    init_logging();
    let dir = temp_dir("preload");
    image::RgbaImage::from_pixel(2, 2, image::Rgba([200, 120, 40, 255]))
        .save(dir.join("wood.png"))
        .unwrap();
    std::fs::copy(fixtures().join("materials.xml"), dir.join("materials.xml")).unwrap();
    std::fs::copy(fixtures().join("box.ase"), dir.join("box.ase")).unwrap();

    let config = LoaderConfig::from_json_str(
        &format!(
            r#"{{ "base_dir": {:?}, "preload_textures": true, "shaders": false }}"#,
            dir.display().to_string()
        ),
        "config.json",
    )
    .unwrap();

    let markup = r#"<scene>
  <geometry id="level" src="box.ase"/>
  <matlib id="mats" src="materials.xml"/>
  <object id="main" geometry="level.Box01" texture="mats.wood"/>
  <object id="lamp" texture="mats.plain"/>
</scene>"#;

    let mut registry = Registry::new();
    let mut assembler = SceneAssembler::new(&mut registry, &config);
    let scene = assembler.load_from_str(markup, "preload.xml", Path::new("/elsewhere")).unwrap();
    assert_eq!(scene.node_count(), 2);
    assert_eq!(assembler.textures().len(), 1);

    let wood = assembler.registry().materials().get("mats", "wood").unwrap();
    let image = wood.texture.as_ref().unwrap().image.as_ref().unwrap();
    assert_eq!((image.width, image.height), (2, 2));
    assert_eq!(image.pixel(1, 1), [200, 120, 40, 255]);

    let plain = assembler.registry().materials().get("mats", "plain").unwrap();
    assert!(plain.shader.is_none());
}

/// One square polygon face in model 0, written with an empty directory for
/// every other lump.
fn square_level() -> Vec<u8> {
    let mut lumps: Vec<Vec<u8>> = vec![Vec::new(); LumpKind::COUNT];
    let mut put_i32 = |kind: LumpKind, values: &[i32]| {
        for v in values {
            lumps[kind as usize].extend_from_slice(&v.to_le_bytes());
        }
    };
    put_i32(LumpKind::Meshverts, &[0, 1, 2, 0, 2, 3]);
    put_i32(LumpKind::Faces, &[0, -1, 1, 0, 4, 0, 6, -1, 0, 0, 0, 0]);
    put_i32(LumpKind::Faces, &[0; 12]);
    put_i32(LumpKind::Faces, &[0, 0]);
    put_i32(LumpKind::Models, &[0; 6]);
    put_i32(LumpKind::Models, &[0, 1, 0, 0]);

    for corner in [[0.0f32, 0.0, 0.0], [4.0, 0.0, 0.0], [4.0, 4.0, 0.0], [0.0, 4.0, 0.0]] {
        let vertexes = &mut lumps[LumpKind::Vertexes as usize];
        for v in corner.iter().chain([0.0f32; 4].iter()).chain([0.0f32, 0.0, 1.0].iter()) {
            vertexes.extend_from_slice(&v.to_le_bytes());
        }
        vertexes.extend_from_slice(&[255, 255, 255, 255]);
    }

    let mut out = Vec::new();
    out.extend_from_slice(&BSP_MAGIC);
    out.extend_from_slice(&46i32.to_le_bytes());
    let mut offset = 8 + LumpKind::COUNT * 8;
    for lump in &lumps {
        out.extend_from_slice(&(offset as i32).to_le_bytes());
        out.extend_from_slice(&(lump.len() as i32).to_le_bytes());
        offset += lump.len();
    }
    for lump in &lumps {
        out.extend_from_slice(lump);
    }
    out
}

#[test]
fn test_bsp_level_in_scene() {
    init_logging();
    let dir = temp_dir("bsp");
    std::fs::write(dir.join("arena.bsp"), square_level()).unwrap();

    let markup = r#"<scene>
  <geometry id="arena" src="arena.bsp" format="q3bsp"/>
  <object id="main" geometry="arena.model_0" coord="0;0;1"/>
</scene>"#;

    let mut registry = Registry::new();
    let config = LoaderConfig::default();
    let scene = SceneAssembler::new(&mut registry, &config)
        .load_from_str(markup, "arena.xml", &dir)
        .unwrap();

    let world = registry.geometry().get("arena", "model_0").unwrap();
    assert_eq!(world.vertex_count(), 4);
    assert_eq!(world.face_count(), 2);
    assert!(world.has_colors());

    let bounds = scene.world_bounds(&registry).unwrap();
    assert_eq!(bounds.min, Vec3::new(0.0, 0.0, 1.0));
    assert_eq!(bounds.max, Vec3::new(4.0, 4.0, 1.0));
}

#[test]
fn test_library_loading_outside_a_scene() {
    let mut registry = Registry::new();
    let keys = load_geometry_library(
        &mut registry,
        "level",
        &fixtures().join("box.ase"),
        Some(ModelFormat::Ase),
        &IdFilter::from_ids(["*"]),
    )
    .unwrap();
    assert_eq!(keys.len(), 3);

    // A later scene load reuses the registered meshes
    let config = LoaderConfig::default();
    let scene = SceneAssembler::new(&mut registry, &config)
        .load(fixtures().join("scene.xml"))
        .unwrap();
    assert_eq!(scene.node_count(), 3);
    assert!(registry.geometry().has("level", "Unused"));
    assert_eq!(registry.geometry().len(), 4);
}
