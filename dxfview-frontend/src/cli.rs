use std::path::PathBuf;

use dxfview_config::AppConfig;
use dxfview_core::geometry::Point2;
use dxfview_core::scene::{Handle, SceneStats};
use dxfview_core::view::ViewState;
use dxfview_engine::command::{CommandBus, CommandContext, CommandRequest, CommandResponse};
use dxfview_engine::interaction::{Modifiers, PointerInput};
use dxfview_engine::measure::MeasurementReport;
use dxfview_engine::transform::world_to_screen;
use dxfview_engine::{EngineSettings, InMemoryDocuments, SoftwareSurface, TabId, ViewportEngine};
use tracing::{debug, info, warn};

use crate::errors::FrontendError;
use crate::loader::{DocumentSource, load_scene_or_demo};

const DEMO_TAB: TabId = TabId::new(1);
const DEMO_POINTER: u32 = 1;

/// CLI 演示会话的启动参数。
#[derive(Debug, Clone)]
pub struct DemoOptions {
    pub scene_path: Option<PathBuf>,
    pub width: f64,
    pub height: f64,
    pub device_pixel_ratio: f64,
    pub settings: EngineSettings,
}

impl DemoOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            scene_path: config.frontend.scene_path.clone(),
            width: config.frontend.viewport_width,
            height: config.frontend.viewport_height,
            device_pixel_ratio: config.frontend.device_pixel_ratio,
            settings: crate::engine_settings(&config.viewport),
        }
    }
}

impl Default for DemoOptions {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// 一次演示会话的结果概览。
#[derive(Debug, Clone)]
pub struct DemoSummary {
    pub source: DocumentSource,
    pub stats: SceneStats,
    pub commands: Vec<String>,
    /// 依次执行的命令及其是否成功。
    pub command_log: Vec<(String, bool)>,
    pub view: Option<ViewState>,
    pub selection: Vec<Handle>,
    pub isolated_pickables: usize,
    pub visible_pickables: usize,
    pub measurement: Option<MeasurementReport>,
    pub event_count: usize,
}

type DemoEngine = ViewportEngine<SoftwareSurface, InMemoryDocuments>;

/// 脚本化的 CLI 演示：加载场景，驱动导航、选择、隔离与测量，并打印概览。
pub fn run_demo(options: &DemoOptions) -> Result<DemoSummary, FrontendError> {
    let loaded = load_scene_or_demo(options.scene_path.as_deref());
    let stats = loaded.scene.stats();
    info!(
        entity_count = stats.entity_count,
        layer_count = stats.layer_count,
        block_count = stats.block_count,
        "CLI 演示文档统计"
    );

    let mut documents = InMemoryDocuments::new();
    documents.insert(DEMO_TAB, loaded.scene);
    let surface = SoftwareSurface::new(options.width, options.height, options.device_pixel_ratio);
    let mut engine = ViewportEngine::new(surface, documents, options.settings);
    engine.open_viewport();
    engine.activate_tab(DEMO_TAB);

    let bus = CommandBus::new();
    let mut commands: Vec<String> = bus.available_commands().map(|name| name.to_string()).collect();
    commands.sort();
    let mut command_log = Vec::new();

    for name in ["zoom_in", "pan_left", "orbit_left", "undo_view", "redo_view", "reset_view"] {
        run_command(&bus, &mut engine, CommandRequest::new(name), &mut command_log);
    }

    click_smallest_pickable(&mut engine);
    let selection: Vec<Handle> = engine
        .selection()
        .map(|set| set.handles().iter().cloned().collect())
        .unwrap_or_default();

    run_command(&bus, &mut engine, CommandRequest::new("isolate_selection"), &mut command_log);
    let isolated_pickables = pickable_count(&engine);
    run_command(&bus, &mut engine, CommandRequest::new("clear_isolation"), &mut command_log);
    let visible_pickables = pickable_count(&engine);

    run_command(
        &bus,
        &mut engine,
        CommandRequest::new("set_measurement").with_arg("distance"),
        &mut command_log,
    );
    measure_first_segment(&mut engine);
    let report = engine.measurement_report();
    let measurement = report.has_data.then_some(report);

    // Esc 两次：先清空测量点，再退出测量模式。
    for _ in 0..2 {
        let response = {
            let mut context = CommandContext {
                viewport: &mut engine,
            };
            bus.dispatch_key("Escape", Modifiers::NONE, &mut context)
        };
        record(&mut command_log, "escape", response);
    }

    let view = engine.current_view();
    let event_count = engine.drain_events().len();
    engine.close_viewport();

    let summary = DemoSummary {
        source: loaded.source,
        stats,
        commands,
        command_log,
        view,
        selection,
        isolated_pickables,
        visible_pickables,
        measurement,
        event_count,
    };
    print_summary(&summary);
    Ok(summary)
}

fn run_command(
    bus: &CommandBus,
    engine: &mut DemoEngine,
    request: CommandRequest,
    log: &mut Vec<(String, bool)>,
) {
    let name = request.name.clone();
    let response = {
        let mut context = CommandContext { viewport: engine };
        bus.dispatch(&request, &mut context)
    };
    record(log, &name, response);
}

fn record(log: &mut Vec<(String, bool)>, name: &str, response: CommandResponse) {
    if response.success {
        debug!(command = name, message = ?response.message, "命令执行成功");
    } else {
        warn!(command = name, message = ?response.message, "CLI 命令执行失败");
    }
    log.push((name.to_string(), response.success));
}

fn pickable_count(engine: &DemoEngine) -> usize {
    engine.frame().map_or(0, |frame| frame.pickables.len())
}

/// 点击屏幕包围盒最小的图元中心，模拟一次单击拾取。
fn click_smallest_pickable(engine: &mut DemoEngine) {
    let Some(target) = engine.frame().and_then(|frame| {
        frame
            .pickables
            .iter()
            .min_by(|a, b| a.screen_bounds.area().total_cmp(&b.screen_bounds.area()))
            .map(|pickable| pickable.screen_bounds.center())
    }) else {
        return;
    };
    engine.pointer_down(PointerInput::primary(DEMO_POINTER, target));
    engine.pointer_up(DEMO_POINTER, target);
}

/// 在第一条有两个采样点的图元上量取距离。
fn measure_first_segment(engine: &mut DemoEngine) {
    let Some(points) = engine.frame().and_then(|frame| {
        let pickable = frame
            .pickables
            .iter()
            .find(|pickable| pickable.world_points.len() >= 2)?;
        let start = world_to_screen(pickable.world_points[0], Some(frame))?;
        let end = world_to_screen(pickable.world_points[1], Some(frame))?;
        Some([start, end])
    }) else {
        return;
    };
    for point in points {
        engine.pointer_down(PointerInput::primary(DEMO_POINTER, point));
    }
}

fn print_summary(summary: &DemoSummary) {
    println!("DXF 视口引擎 CLI 演示");
    match &summary.source {
        DocumentSource::Json(path) => println!("已从 JSON 加载场景：{}", path.display()),
        DocumentSource::Demo => println!("已构建内置示例场景"),
    }
    println!(
        "实体 {} 个，图层 {} 个，块定义 {} 个",
        summary.stats.entity_count, summary.stats.layer_count, summary.stats.block_count
    );
    println!("支持的命令: {}", summary.commands.join(", "));
    for (name, success) in &summary.command_log {
        println!("  [{}] {name}", if *success { "成功" } else { "失败" });
    }
    match summary.view.as_ref().and_then(ViewState::params) {
        Some(params) => println!(
            "当前视图: 中心={}, 比例={:.4}, 旋转={:.1}°",
            format_point(params.center),
            params.scale,
            params.rotation_rad.to_degrees()
        ),
        None => println!("当前视图: 自动适配"),
    }
    if summary.selection.is_empty() {
        println!("当前尚未选中任何实体。");
    } else {
        let handles: Vec<&str> = summary.selection.iter().map(Handle::as_str).collect();
        println!("选中集包含句柄：{}", handles.join(", "));
    }
    println!(
        "隔离后可拾取图元 {} 个，恢复后 {} 个",
        summary.isolated_pickables, summary.visible_pickables
    );
    match &summary.measurement {
        Some(report) => println!("测量结果：{}", report.label),
        None => println!("测量结果：<无>"),
    }
    println!("共产生 {} 个视口事件", summary.event_count);
}

fn format_point(point: Point2) -> String {
    format!("({:.2}, {:.2})", point.x(), point.y())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dxfview_core::scene::SceneGraph;
    use std::io::Write;

    #[test]
    fn demo_session_exercises_engine() {
        let summary = run_demo(&DemoOptions::default()).expect("demo should run");
        assert_eq!(summary.source, DocumentSource::Demo);
        assert!(summary.command_log.iter().all(|(_, success)| *success));
        assert_eq!(summary.view, Some(ViewState::Auto));
        assert_eq!(summary.selection.len(), 1);
        assert_eq!(summary.isolated_pickables, 1);
        assert!(summary.visible_pickables > summary.isolated_pickables);
        assert!(summary.measurement.is_some());
        assert!(summary.commands.iter().any(|name| name == "undo_view"));
        assert!(summary.event_count > 0);
    }

    #[test]
    fn json_scene_drives_the_session() {
        let mut scene = SceneGraph::new();
        scene.drawing_properties.insunits = Some(6);
        scene.add_line(Point2::new(0.0, 0.0), Point2::new(30.0, 40.0), "0");
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        let json = serde_json::to_string(&scene).expect("serialize scene");
        file.write_all(json.as_bytes()).expect("write scene");

        let options = DemoOptions {
            scene_path: Some(file.path().to_path_buf()),
            ..DemoOptions::default()
        };
        let summary = run_demo(&options).expect("demo should run");
        assert_eq!(summary.source, DocumentSource::Json(file.path().to_path_buf()));
        assert_eq!(summary.stats.entity_count, 1);
        let report = summary.measurement.expect("distance measured");
        assert!(report.label.contains("50.000"), "label = {}", report.label);
        assert!(report.label.ends_with(" m"), "label = {}", report.label);
    }
}
