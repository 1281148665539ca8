use std::collections::HashMap;

use crate::engine::ViewportControl;
use crate::errors::EngineError;
use crate::interaction::Modifiers;
use crate::measure::MeasurementMode;

#[derive(Debug, Clone)]
pub struct CommandRequest {
    pub name: String,
    pub args: Vec<String>,
}

impl CommandRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }

    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct CommandResponse {
    pub success: bool,
    pub message: Option<String>,
}

impl CommandResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }

    /// 视图类命令的统一结果：没有活动视图时视为失败。
    fn view<T>(outcome: Option<T>, message: &str) -> Self {
        match outcome {
            Some(_) => Self::ok(message),
            None => Self::err("当前没有可导航的视图"),
        }
    }
}

impl From<EngineError> for CommandResponse {
    fn from(error: EngineError) -> Self {
        Self::err(error.to_string())
    }
}

pub trait CommandHandler: Send + Sync {
    fn name(&self) -> &'static str;
    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse;
}

pub struct CommandContext<'a> {
    pub viewport: &'a mut dyn ViewportControl,
}

pub struct CommandBus {
    handlers: HashMap<&'static str, Box<dyn CommandHandler>>,
}

impl Default for CommandBus {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandBus {
    pub fn new() -> Self {
        let mut bus = Self {
            handlers: HashMap::new(),
        };
        bus.register(ZoomCommand::In);
        bus.register(ZoomCommand::Out);
        bus.register(PanCommand::Left);
        bus.register(PanCommand::Right);
        bus.register(PanCommand::Up);
        bus.register(PanCommand::Down);
        bus.register(OrbitCommand::Left);
        bus.register(OrbitCommand::Right);
        bus.register(HistoryCommand::Undo);
        bus.register(HistoryCommand::Redo);
        bus.register(HistoryCommand::Reset);
        bus.register(ViewCubeCommand);
        bus.register(MeasurementCommand::Cycle);
        bus.register(MeasurementCommand::Set);
        bus.register(MeasurementCommand::Clear);
        bus.register(SelectionCommand::Clear);
        bus.register(SelectionCommand::Isolate);
        bus.register(SelectionCommand::ClearIsolation);
        bus.register(EscapeCommand);
        bus
    }

    pub fn register<H: CommandHandler + 'static>(&mut self, handler: H) {
        self.handlers.insert(handler.name(), Box::new(handler));
    }

    pub fn dispatch(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        if let Some(handler) = self.handlers.get(request.name.as_str()) {
            handler.execute(request, context)
        } else {
            EngineError::UnknownCommand(request.name.clone()).into()
        }
    }

    /// 按键触发：先查绑定再分发，未绑定的按键返回错误。
    pub fn dispatch_key(
        &self,
        key: &str,
        modifiers: Modifiers,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        match key_binding(key, modifiers) {
            Some(name) => self.dispatch(&CommandRequest::new(name), context),
            None => EngineError::UnboundKey(key.to_string()).into(),
        }
    }

    pub fn available_commands(&self) -> impl Iterator<Item = &&'static str> {
        self.handlers.keys()
    }
}

/// 键盘绑定表。`key` 使用 DOM `KeyboardEvent.key` 的命名，大小写不敏感。
pub fn key_binding(key: &str, modifiers: Modifiers) -> Option<&'static str> {
    let key = key.to_ascii_lowercase();
    if modifiers.command() {
        return match key.as_str() {
            "z" if modifiers.shift => Some("redo_view"),
            "z" => Some("undo_view"),
            "y" => Some("redo_view"),
            _ => None,
        };
    }
    let name = match key.as_str() {
        "+" | "=" => "zoom_in",
        "-" | "_" => "zoom_out",
        "arrowleft" => "pan_left",
        "arrowright" => "pan_right",
        "arrowup" => "pan_up",
        "arrowdown" => "pan_down",
        "[" => "orbit_left",
        "]" => "orbit_right",
        "home" => "reset_view",
        "m" => "cycle_measurement",
        "i" => "isolate_selection",
        "escape" => "escape",
        _ => return None,
    };
    Some(name)
}

enum ZoomCommand {
    In,
    Out,
}

impl CommandHandler for ZoomCommand {
    fn name(&self) -> &'static str {
        match self {
            ZoomCommand::In => "zoom_in",
            ZoomCommand::Out => "zoom_out",
        }
    }

    fn execute(
        &self,
        _request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let step = context.viewport.settings().wheel_zoom_step;
        let factor = match self {
            ZoomCommand::In => step,
            ZoomCommand::Out => 1.0 / step,
        };
        CommandResponse::view(context.viewport.zoom_view(factor, None), "视图已缩放")
    }
}

enum PanCommand {
    Left,
    Right,
    Up,
    Down,
}

impl CommandHandler for PanCommand {
    fn name(&self) -> &'static str {
        match self {
            PanCommand::Left => "pan_left",
            PanCommand::Right => "pan_right",
            PanCommand::Up => "pan_up",
            PanCommand::Down => "pan_down",
        }
    }

    fn execute(
        &self,
        _request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        // 视野向左移动，即内容向右移动。
        let step = context.viewport.settings().pan_step_px;
        let (dx, dy) = match self {
            PanCommand::Left => (step, 0.0),
            PanCommand::Right => (-step, 0.0),
            PanCommand::Up => (0.0, step),
            PanCommand::Down => (0.0, -step),
        };
        CommandResponse::view(context.viewport.pan_view(dx, dy), "视图已平移")
    }
}

enum OrbitCommand {
    Left,
    Right,
}

impl CommandHandler for OrbitCommand {
    fn name(&self) -> &'static str {
        match self {
            OrbitCommand::Left => "orbit_left",
            OrbitCommand::Right => "orbit_right",
        }
    }

    fn execute(
        &self,
        _request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let step = context.viewport.settings().orbit_step_degrees;
        let delta = match self {
            OrbitCommand::Left => step,
            OrbitCommand::Right => -step,
        };
        CommandResponse::view(context.viewport.orbit_view(delta), "视图已旋转")
    }
}

enum HistoryCommand {
    Undo,
    Redo,
    Reset,
}

impl CommandHandler for HistoryCommand {
    fn name(&self) -> &'static str {
        match self {
            HistoryCommand::Undo => "undo_view",
            HistoryCommand::Redo => "redo_view",
            HistoryCommand::Reset => "reset_view",
        }
    }

    fn execute(
        &self,
        _request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        match self {
            HistoryCommand::Undo => match context.viewport.undo_view_navigation() {
                Some(_) => CommandResponse::ok("已撤销视图操作"),
                None => CommandResponse::err("没有可撤销的视图操作"),
            },
            HistoryCommand::Redo => match context.viewport.redo_view_navigation() {
                Some(_) => CommandResponse::ok("已重做视图操作"),
                None => CommandResponse::err("没有可重做的视图操作"),
            },
            HistoryCommand::Reset => {
                CommandResponse::view(context.viewport.reset_view_navigation(), "视图已复位")
            }
        }
    }
}

struct ViewCubeCommand;

impl CommandHandler for ViewCubeCommand {
    fn name(&self) -> &'static str {
        "view_cube"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let Some(orientation) = request.args.first() else {
            return EngineError::MissingArgument {
                command: self.name(),
                argument: "orientation",
            }
            .into();
        };
        match context.viewport.on_view_cube_orientation(orientation) {
            Ok(outcome) => CommandResponse::view(outcome, "视图方位已切换"),
            Err(error) => error.into(),
        }
    }
}

enum MeasurementCommand {
    Cycle,
    Set,
    Clear,
}

impl CommandHandler for MeasurementCommand {
    fn name(&self) -> &'static str {
        match self {
            MeasurementCommand::Cycle => "cycle_measurement",
            MeasurementCommand::Set => "set_measurement",
            MeasurementCommand::Clear => "clear_measurement",
        }
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        match self {
            MeasurementCommand::Cycle => {
                let mode = context.viewport.cycle_measurement_mode();
                CommandResponse::ok(format!("测量模式: {mode}"))
            }
            MeasurementCommand::Set => {
                let Some(raw) = request.args.first() else {
                    return EngineError::MissingArgument {
                        command: self.name(),
                        argument: "mode",
                    }
                    .into();
                };
                match raw.parse::<MeasurementMode>() {
                    Ok(mode) => {
                        context.viewport.set_measurement_mode(mode);
                        CommandResponse::ok(format!("测量模式: {mode}"))
                    }
                    Err(error) => error.into(),
                }
            }
            MeasurementCommand::Clear => {
                context.viewport.clear_measurement();
                CommandResponse::ok("测量已清除")
            }
        }
    }
}

enum SelectionCommand {
    Clear,
    Isolate,
    ClearIsolation,
}

impl CommandHandler for SelectionCommand {
    fn name(&self) -> &'static str {
        match self {
            SelectionCommand::Clear => "clear_selection",
            SelectionCommand::Isolate => "isolate_selection",
            SelectionCommand::ClearIsolation => "clear_isolation",
        }
    }

    fn execute(
        &self,
        _request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        match self {
            SelectionCommand::Clear => {
                context.viewport.clear_selection();
                CommandResponse::ok("选中集已清空")
            }
            SelectionCommand::Isolate => {
                if context.viewport.isolate_selection() {
                    CommandResponse::ok("已隔离选中对象")
                } else {
                    CommandResponse::err("没有可隔离的选中对象")
                }
            }
            SelectionCommand::ClearIsolation => {
                context.viewport.clear_isolation();
                CommandResponse::ok("隔离已结束")
            }
        }
    }
}

struct EscapeCommand;

impl CommandHandler for EscapeCommand {
    fn name(&self) -> &'static str {
        "escape"
    }

    fn execute(
        &self,
        _request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        context.viewport.escape();
        CommandResponse::ok("已取消")
    }
}

#[cfg(test)]
mod tests {
    use dxfview_core::geometry::Point2;
    use dxfview_core::scene::{Handle, SceneGraph};
    use dxfview_core::view::ViewState;

    use super::*;
    use crate::engine::{EngineSettings, ViewportEngine};
    use crate::navigation::TabId;
    use crate::selection::CommitMode;
    use crate::surface::{InMemoryDocuments, SoftwareSurface};

    fn engine() -> ViewportEngine<SoftwareSurface, InMemoryDocuments> {
        let mut scene = SceneGraph::new();
        scene.add_circle(Point2::new(0.0, 0.0), 10.0, "0");
        let mut documents = InMemoryDocuments::new();
        documents.insert(TabId::new(1), scene);
        let mut engine = ViewportEngine::new(
            SoftwareSurface::new(640.0, 480.0, 1.0),
            documents,
            EngineSettings::default(),
        );
        engine.open_viewport();
        engine.activate_tab(TabId::new(1));
        engine
    }

    #[test]
    fn key_bindings_map_to_commands() {
        let ctrl = Modifiers {
            ctrl: true,
            ..Modifiers::NONE
        };
        let ctrl_shift = Modifiers {
            shift: true,
            ..ctrl
        };
        assert_eq!(key_binding("+", Modifiers::NONE), Some("zoom_in"));
        assert_eq!(key_binding("ArrowLeft", Modifiers::NONE), Some("pan_left"));
        assert_eq!(key_binding("z", ctrl), Some("undo_view"));
        assert_eq!(key_binding("Z", ctrl_shift), Some("redo_view"));
        assert_eq!(key_binding("y", ctrl), Some("redo_view"));
        assert_eq!(key_binding("Escape", Modifiers::NONE), Some("escape"));
        assert_eq!(key_binding("q", Modifiers::NONE), None);
    }

    #[test]
    fn every_bound_key_has_a_handler() {
        let bus = CommandBus::new();
        let names: Vec<&str> = bus.available_commands().copied().collect();
        for key in ["+", "-", "arrowleft", "arrowright", "arrowup", "arrowdown", "[", "]", "home", "m", "i", "escape"] {
            let name = key_binding(key, Modifiers::NONE).expect("bound key");
            assert!(names.contains(&name), "missing handler for {name}");
        }
    }

    #[test]
    fn zoom_then_undo_restores_auto_view() {
        let mut engine = engine();
        let bus = CommandBus::new();
        let mut context = CommandContext {
            viewport: &mut engine,
        };

        assert!(bus.dispatch(&CommandRequest::new("zoom_in"), &mut context).success);
        assert!(bus.dispatch(&CommandRequest::new("orbit_left"), &mut context).success);
        let undo = bus.dispatch_key("z", Modifiers { ctrl: true, ..Modifiers::NONE }, &mut context);
        assert!(undo.success);
        assert!(bus.dispatch(&CommandRequest::new("undo_view"), &mut context).success);
        assert!(!bus.dispatch(&CommandRequest::new("undo_view"), &mut context).success);
        assert_eq!(engine.current_view(), Some(ViewState::Auto));
    }

    #[test]
    fn measurement_and_selection_commands() {
        let mut engine = engine();
        engine.select_handles([Handle::new("1")], CommitMode::Replace);
        let bus = CommandBus::new();
        let mut context = CommandContext {
            viewport: &mut engine,
        };

        let response = bus.dispatch(&CommandRequest::new("set_measurement").with_arg("angle"), &mut context);
        assert_eq!(response.message.as_deref(), Some("测量模式: angle"));
        let response = bus.dispatch(&CommandRequest::new("cycle_measurement"), &mut context);
        assert_eq!(response.message.as_deref(), Some("测量模式: none"));
        assert!(!bus.dispatch(&CommandRequest::new("set_measurement"), &mut context).success);
        assert!(bus.dispatch(&CommandRequest::new("isolate_selection"), &mut context).success);
        assert!(bus.dispatch(&CommandRequest::new("clear_isolation"), &mut context).success);
        assert!(bus.dispatch(&CommandRequest::new("clear_selection"), &mut context).success);
        assert!(engine.selection().is_some_and(|selection| selection.is_empty()));
    }

    #[test]
    fn unknown_commands_and_orientations_fail_softly() {
        let mut engine = engine();
        let bus = CommandBus::new();
        let mut context = CommandContext {
            viewport: &mut engine,
        };
        let response = bus.dispatch(&CommandRequest::new("explode"), &mut context);
        assert!(!response.success);
        assert_eq!(response.message.as_deref(), Some("unknown command: explode"));

        let response = bus.dispatch(&CommandRequest::new("view_cube").with_arg("upside"), &mut context);
        assert!(!response.success);
        assert!(bus.dispatch(&CommandRequest::new("view_cube").with_arg("iso"), &mut context).success);
        assert!(!bus.dispatch_key("F13", Modifiers::NONE, &mut context).success);
    }
}
