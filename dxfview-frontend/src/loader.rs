use std::fs;
use std::path::{Path, PathBuf};

use dxfview_core::geometry::{Point2, Vector2};
use dxfview_core::scene::{
    Attribute, BlockDefinition, EntityKind, Handle, SceneEntity, SceneGraph,
};
use tracing::{info, warn};

use crate::errors::FrontendError;

/// 文档来源，便于前端呈现加载信息。
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentSource {
    Json(PathBuf),
    Demo,
}

/// 内置示例中各图元的句柄。
#[derive(Debug, Clone, PartialEq)]
pub struct DemoEntities {
    pub outline: Handle,
    pub column: Handle,
    pub door_swing: Handle,
    pub baseline: Handle,
    pub corridor: Handle,
    pub label: Handle,
    pub marker: Handle,
    pub title_block: Handle,
}

/// 统一封装加载后的场景与元信息。
#[derive(Debug)]
pub struct LoadedScene {
    pub scene: SceneGraph,
    pub source: DocumentSource,
    pub demo_entities: Option<DemoEntities>,
}

/// 读取 JSON 格式的场景图文件。
pub fn load_scene_file(path: impl AsRef<Path>) -> Result<SceneGraph, FrontendError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|source| FrontendError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let scene: SceneGraph =
        serde_json::from_str(&content).map_err(|source| FrontendError::Json {
            path: path.to_path_buf(),
            source,
        })?;
    let stats = scene.stats();
    info!(
        path = %path.display(),
        entity_count = stats.entity_count,
        layer_count = stats.layer_count,
        "从 JSON 加载场景成功"
    );
    Ok(scene)
}

/// 有场景文件时加载它，失败或未指定时回退到内置示例。
pub fn load_scene_or_demo(path: Option<&Path>) -> LoadedScene {
    if let Some(path) = path {
        match load_scene_file(path) {
            Ok(scene) => {
                return LoadedScene {
                    scene,
                    source: DocumentSource::Json(path.to_path_buf()),
                    demo_entities: None,
                };
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "加载场景失败，回退到内置示例");
            }
        }
    }

    let (scene, entities) = build_demo_scene();
    LoadedScene {
        scene,
        source: DocumentSource::Demo,
        demo_entities: Some(entities),
    }
}

/// 构建一张小户型示例图：外墙、柱、门、轴线、走廊、标签与图框块。
pub fn build_demo_scene() -> (SceneGraph, DemoEntities) {
    let mut scene = SceneGraph::new();
    scene.drawing_properties.insunits = Some(4);
    for layer in ["Walls", "Columns", "Doors", "Axis", "Annotation", "Frame"] {
        scene.ensure_layer(layer);
    }

    let outline = scene.add_polyline(
        [
            Point2::new(0.0, 0.0),
            Point2::new(6000.0, 0.0),
            Point2::new(6000.0, 4000.0),
            Point2::new(0.0, 4000.0),
        ],
        true,
        "Walls",
    );
    let column = scene.add_circle(Point2::new(3000.0, 2000.0), 200.0, "Columns");
    let door_swing = scene.add_arc(
        Point2::new(6000.0, 1000.0),
        900.0,
        std::f64::consts::FRAC_PI_2,
        std::f64::consts::PI,
        "Doors",
    );
    let baseline = scene.add_line(
        Point2::new(-500.0, 2000.0),
        Point2::new(6500.0, 2000.0),
        "Axis",
    );
    let corridor = scene.add_polyline(
        [
            Point2::new(500.0, 500.0),
            Point2::new(2500.0, 500.0),
            Point2::new(2500.0, 1500.0),
        ],
        false,
        "Walls",
    );
    let label = scene.add_text(Point2::new(200.0, 3600.0), "LIVING ROOM", 250.0, "Annotation");
    let marker = scene.add_point(Point2::new(4500.0, 3000.0), "0");

    let border = SceneEntity {
        handle: scene.next_handle(),
        layer: "Frame".to_string(),
        lineweight: None,
        color: None,
        kind: EntityKind::Polyline {
            vertices: vec![
                Point2::new(0.0, 0.0),
                Point2::new(2000.0, 0.0),
                Point2::new(2000.0, 600.0),
                Point2::new(0.0, 600.0),
            ],
            closed: true,
        },
    };
    scene.add_block_definition(BlockDefinition {
        name: "TITLE".to_string(),
        base_point: Point2::ORIGIN,
        entities: vec![border],
    });
    let attribute_handle = scene.next_handle();
    let title_block = scene.add_insert(
        "TITLE",
        Point2::new(4000.0, -1000.0),
        Vector2::new(1.0, 1.0),
        0.0,
        vec![Attribute {
            handle: attribute_handle,
            tag: "SHEET".to_string(),
            text: "A-101".to_string(),
            insert: Point2::new(4100.0, -900.0),
            height: 200.0,
            is_invisible: false,
        }],
        "Frame",
    );

    let entities = DemoEntities {
        outline,
        column,
        door_swing,
        baseline,
        corridor,
        label,
        marker,
        title_block,
    };
    (scene, entities)
}
