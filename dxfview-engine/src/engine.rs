//! 视口引擎：把导航、捕捉、选择、测量与隔离状态组织在一起。
//!
//! 引擎通过依赖注入获得渲染面与文档来源，对外只通过返回值和事件队列通信。
//! 缺少活动标签页、场景图或帧时，所有操作都是静默的空操作。

use std::collections::{BTreeSet, HashMap, VecDeque};

use dxfview_core::frame::Frame;
use dxfview_core::geometry::Point2;
use dxfview_core::scene::{Handle, LayerKey};
use dxfview_core::view::{ViewPatch, ViewState};
use tracing::{debug, info, trace};

use crate::errors::EngineError;
use crate::interaction::{
    GestureOutcome, InteractionController, InteractionKind, PointerButton, PointerInput,
};
use crate::isolation::{EffectiveLayerState, IsolationStore, LayerProperty, TabLayerState};
use crate::measure::{MeasurementMode, MeasurementPoint, MeasurementReport, MeasurementState, unit_label};
use crate::navigation::{
    DEFAULT_HISTORY_LIMIT, DEFAULT_WHEEL_ZOOM_STEP, Pane, TabId, ViewContext, ViewCubeOrientation,
    ViewKey, ViewRequest, orbit_by, pan_by, wheel_zoom_factor, zoom_about,
};
use crate::selection::{CommitMode, SelectionSet, SelectionStore, pick_at, select_in_lasso, select_in_rect};
use crate::snap::{DEFAULT_SNAP_THRESHOLD_PX, SnapCache};
use crate::surface::{AttributeDisplay, DocumentProvider, RenderingSurface};
use crate::transform::FrameTransform;

/// 引擎的可调参数。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineSettings {
    pub snap_threshold_px: f64,
    pub history_limit: usize,
    pub wheel_zoom_step: f64,
    pub orbit_step_degrees: f64,
    pub pan_step_px: f64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            snap_threshold_px: DEFAULT_SNAP_THRESHOLD_PX,
            history_limit: DEFAULT_HISTORY_LIMIT,
            wheel_zoom_step: DEFAULT_WHEEL_ZOOM_STEP,
            orbit_step_degrees: 15.0,
            pan_step_px: 50.0,
        }
    }
}

/// 引擎发往宿主应用的通知，由调用方通过 [`ViewportEngine::drain_events`] 取走。
#[derive(Debug, Clone, PartialEq)]
pub enum ViewportEvent {
    ViewChanged { key: ViewKey, view: ViewState },
    SelectionChanged { tab: TabId, handles: Vec<Handle> },
    MeasurementChanged(MeasurementReport),
    /// 文字或块属性被激活，宿主应跳转到对应句柄。
    HandleActivated(Handle),
    IsolationChanged { tab: TabId },
    PointerCaptured(u32),
    PointerReleased(u32),
    /// 视口已关闭，宿主应收起视口面板。
    ViewportClosed,
}

pub struct ViewportEngine<S, D> {
    surface: S,
    documents: D,
    settings: EngineSettings,
    active_tab: Option<TabId>,
    active_pane: Pane,
    views: HashMap<ViewKey, ViewContext>,
    frames: HashMap<ViewKey, Frame>,
    snap_cache: SnapCache,
    selections: SelectionStore,
    isolation: IsolationStore,
    measurement: MeasurementState,
    interaction: Option<InteractionController>,
    pan_origin: Option<ViewState>,
    events: VecDeque<ViewportEvent>,
}

impl<S, D> ViewportEngine<S, D>
where
    S: RenderingSurface,
    D: DocumentProvider,
{
    pub fn new(surface: S, documents: D, settings: EngineSettings) -> Self {
        Self {
            surface,
            documents,
            settings,
            active_tab: None,
            active_pane: Pane::default(),
            views: HashMap::new(),
            frames: HashMap::new(),
            snap_cache: SnapCache::new(),
            selections: SelectionStore::new(),
            isolation: IsolationStore::new(),
            measurement: MeasurementState::new(),
            interaction: None,
            pan_origin: None,
            events: VecDeque::new(),
        }
    }

    #[inline]
    pub fn surface(&self) -> &S {
        &self.surface
    }

    #[inline]
    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    #[inline]
    pub fn documents(&self) -> &D {
        &self.documents
    }

    /// 修改文档后需调用 [`Self::refresh`] 重新渲染。
    #[inline]
    pub fn documents_mut(&mut self) -> &mut D {
        &mut self.documents
    }

    #[inline]
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    #[inline]
    pub fn active_tab(&self) -> Option<TabId> {
        self.active_tab
    }

    #[inline]
    pub fn active_pane(&self) -> Pane {
        self.active_pane
    }

    pub fn active_key(&self) -> Option<ViewKey> {
        self.active_tab.map(|tab| ViewKey::new(tab, self.active_pane))
    }

    /// 活动视图的最近一帧。
    pub fn frame(&self) -> Option<&Frame> {
        self.frames.get(&self.active_key()?)
    }

    pub fn view_context(&self, key: ViewKey) -> Option<&ViewContext> {
        self.views.get(&key)
    }

    pub fn current_view(&self) -> Option<ViewState> {
        self.views.get(&self.active_key()?).map(ViewContext::current)
    }

    pub fn selection(&self) -> Option<&SelectionSet> {
        self.selections.get(self.active_tab?)
    }

    pub fn layer_state(&self, tab: TabId) -> Option<&TabLayerState> {
        self.isolation.get(tab)
    }

    #[inline]
    pub fn measurement(&self) -> &MeasurementState {
        &self.measurement
    }

    pub fn interaction(&self) -> Option<&InteractionController> {
        self.interaction.as_ref()
    }

    pub fn drain_events(&mut self) -> Vec<ViewportEvent> {
        self.events.drain(..).collect()
    }

    // ---- 视口生命周期 ----

    /// 打开视口时创建交互控制器。
    pub fn open_viewport(&mut self) {
        if self.interaction.is_none() {
            self.interaction = Some(InteractionController::new());
            info!("视口已打开");
        }
    }

    /// 关闭视口：丢弃控制器及其持有的全部手势状态。
    pub fn close_viewport(&mut self) {
        if let Some(controller) = self.interaction.take() {
            if let Some(pointer) = controller.captured_pointer() {
                self.events.push_back(ViewportEvent::PointerReleased(pointer));
            }
            self.pan_origin = None;
            self.measurement.clear();
            self.events.push_back(ViewportEvent::ViewportClosed);
            info!("视口已关闭");
        }
    }

    #[inline]
    pub fn is_viewport_open(&self) -> bool {
        self.interaction.is_some()
    }

    /// 切换活动标签页，并整体换入该页的图层、隔离与选中状态。
    pub fn activate_tab(&mut self, tab: TabId) -> bool {
        if self.active_tab == Some(tab) {
            return false;
        }
        self.cancel_gesture();
        self.active_tab = Some(tab);
        self.measurement.clear();
        self.sync_surface_state(tab);
        info!(%tab, "已切换活动标签页");
        self.render_current();
        true
    }

    /// 关闭标签页，丢弃它的全部视图上下文与状态。
    pub fn close_tab(&mut self, tab: TabId) -> bool {
        let had_views = self.views.keys().any(|key| key.tab == tab);
        self.views.retain(|key, _| key.tab != tab);
        self.frames.retain(|key, _| key.tab != tab);
        let had_selection = self.selections.remove(tab).is_some();
        let had_layers = self.isolation.remove(tab).is_some();
        if self.active_tab == Some(tab) {
            self.cancel_gesture();
            self.active_tab = None;
            self.measurement.clear();
            self.surface.set_layer_state(None);
            self.surface.set_entity_isolation(None);
            self.surface.set_selection_handles(&BTreeSet::new());
        }
        debug!(%tab, "已关闭标签页");
        had_views || had_selection || had_layers
    }

    pub fn set_active_pane(&mut self, pane: Pane) -> bool {
        if self.active_pane == pane {
            return false;
        }
        self.cancel_gesture();
        self.active_pane = pane;
        self.render_current();
        true
    }

    /// 以当前视图重新渲染，不写历史；首次渲染某视图时以自动适配开始历史。
    pub fn refresh(&mut self) -> Option<ViewState> {
        let key = self.active_key()?;
        let state = self.views.get(&key).map(ViewContext::current);
        self.render_view(state.unwrap_or(ViewState::Auto).into(), false)
    }

    fn render_current(&mut self) -> Option<ViewState> {
        let key = self.active_key()?;
        match self.views.get(&key).map(ViewContext::current) {
            Some(state) => self.render_view(state.into(), false),
            None => self.render_view(ViewRequest::Auto, true),
        }
    }

    fn render_view(&mut self, request: ViewRequest, record_history: bool) -> Option<ViewState> {
        let key = self.active_key()?;
        let scene = self.documents.scene_graph(key.tab)?;
        let limit = self.settings.history_limit;
        let requested = match self.views.get(&key) {
            Some(context) => context.normalize(request),
            None => ViewContext::new(limit).normalize(request),
        };
        // 渲染面暂停时不创建上下文，首帧出现后才开始记录历史。
        let frame = self.surface.render_scene(scene, &requested)?;
        let context = self
            .views
            .entry(key)
            .or_insert_with(|| ViewContext::new(limit));
        let state = context.commit(&requested, frame.view(), record_history);
        trace!(
            tab = %key.tab,
            version = frame.version,
            record_history,
            "视图已重新渲染"
        );
        self.frames.insert(key, frame);
        self.events
            .push_back(ViewportEvent::ViewChanged { key, view: state });
        Some(state)
    }

    // ---- 视图导航 ----

    /// 应用一个视图请求；缺失的字段从当前视图补齐。
    pub fn apply_view_state(
        &mut self,
        request: impl Into<ViewRequest>,
        record_history: bool,
    ) -> Option<ViewState> {
        self.render_view(request.into(), record_history)
    }

    /// 以 `anchor`（默认视口中心）为不动点缩放。
    pub fn zoom_view(&mut self, factor: f64, anchor: Option<Point2>) -> Option<ViewState> {
        let frame = self.frame()?;
        let anchor = anchor.unwrap_or_else(|| frame.viewport_center());
        let transform = FrameTransform::from_frame(frame)?;
        let params = zoom_about(&transform, factor, anchor)?;
        debug!(factor, "缩放视图");
        self.apply_view_state(params, true)
    }

    pub fn pan_view(&mut self, dx: f64, dy: f64) -> Option<ViewState> {
        self.pan_with(dx, dy, true)
    }

    fn pan_with(&mut self, dx: f64, dy: f64, record_history: bool) -> Option<ViewState> {
        let transform = FrameTransform::from_frame(self.frame()?)?;
        let params = pan_by(&transform, dx, dy)?;
        self.apply_view_state(params, record_history)
    }

    pub fn orbit_view(&mut self, delta_degrees: f64) -> Option<ViewState> {
        let params = orbit_by(self.frame()?.view(), delta_degrees)?;
        debug!(delta_degrees, "旋转视图");
        self.apply_view_state(params, true)
    }

    pub fn undo_view_navigation(&mut self) -> Option<ViewState> {
        let key = self.active_key()?;
        let (index, target) = self.views.get(&key)?.undo_target()?;
        self.replay(key, index, target)
    }

    pub fn redo_view_navigation(&mut self) -> Option<ViewState> {
        let key = self.active_key()?;
        let (index, target) = self.views.get(&key)?.redo_target()?;
        self.replay(key, index, target)
    }

    /// 回放历史项：只移动索引，不写入新的历史。
    fn replay(&mut self, key: ViewKey, index: usize, target: ViewState) -> Option<ViewState> {
        let scene = self.documents.scene_graph(key.tab)?;
        let frame = self.surface.render_scene(scene, &target)?;
        let state = self.views.get_mut(&key)?.commit_replay(index, frame.view())?;
        debug!(tab = %key.tab, index, "回放视图历史");
        self.frames.insert(key, frame);
        self.events
            .push_back(ViewportEvent::ViewChanged { key, view: state });
        Some(state)
    }

    /// 复位到已捕获的自动适配视图。
    pub fn reset_view_navigation(&mut self) -> Option<ViewState> {
        let key = self.active_key()?;
        let target = self
            .views
            .get(&key)
            .map(ViewContext::reset_target)
            .unwrap_or(ViewState::Auto);
        self.apply_view_state(target, true)
    }

    /// 视图立方体方位：保持中心与缩放，只改旋转；`home` 等同复位。
    pub fn on_view_cube_orientation(&mut self, name: &str) -> Result<Option<ViewState>, EngineError> {
        let orientation: ViewCubeOrientation = name.parse()?;
        let state = match orientation.rotation_degrees() {
            None => self.reset_view_navigation(),
            Some(degrees) => {
                if self.frame().is_none() {
                    return Ok(None);
                }
                let patch = ViewPatch {
                    rotation_rad: Some(degrees.to_radians()),
                    ..ViewPatch::default()
                };
                self.apply_view_state(ViewRequest::Patch(patch), true)
            }
        };
        Ok(state)
    }

    /// 滚轮缩放，以光标位置为锚点。
    pub fn wheel(&mut self, delta_y: f64, cursor: Point2) -> Option<ViewState> {
        let factor = wheel_zoom_factor(delta_y, self.settings.wheel_zoom_step);
        if factor == 1.0 {
            return None;
        }
        self.zoom_view(factor, Some(cursor))
    }

    pub fn resize(&mut self, width: f64, height: f64, device_pixel_ratio: f64) -> Option<ViewState> {
        self.surface.resize(width, height, device_pixel_ratio);
        self.refresh()
    }

    pub fn suspend(&mut self) {
        self.surface.suspend();
    }

    pub fn resume(&mut self) -> Option<ViewState> {
        self.surface.resume();
        self.refresh()
    }

    // ---- 指针事件 ----

    pub fn pointer_down(&mut self, input: PointerInput) -> bool {
        if self.interaction.is_none() {
            return false;
        }
        if self.measurement.mode().is_active() && input.button == PointerButton::Primary {
            let Some(point) = self.resolve_measurement_point(input.position) else {
                return false;
            };
            self.measurement.add_point(point);
            self.push_measurement_event();
            return true;
        }
        let origin = self.current_view();
        let Some(controller) = self.interaction.as_mut() else {
            return false;
        };
        if !controller.pointer_down(input) {
            return false;
        }
        if input.button == PointerButton::Middle {
            self.pan_origin = origin;
        }
        self.events
            .push_back(ViewportEvent::PointerCaptured(input.pointer_id));
        true
    }

    pub fn pointer_move(&mut self, pointer_id: u32, position: Point2) {
        let gesture_active = self
            .interaction
            .as_ref()
            .is_some_and(InteractionController::is_active);
        if !gesture_active {
            if self.interaction.is_some() && self.measurement.mode().is_active() {
                let preview = self.resolve_measurement_point(position);
                if self.measurement.set_preview(preview) {
                    self.push_measurement_event();
                }
            }
            return;
        }
        let Some(controller) = self.interaction.as_mut() else {
            return;
        };
        if let GestureOutcome::Pan { dx, dy } = controller.pointer_move(pointer_id, position) {
            self.pan_with(dx, dy, false);
        }
    }

    pub fn pointer_up(&mut self, pointer_id: u32, position: Point2) {
        let Some(controller) = self.interaction.as_mut() else {
            return;
        };
        let captured = controller.captured_pointer() == Some(pointer_id);
        let outcome = controller.pointer_up(pointer_id, position);
        if captured {
            self.events
                .push_back(ViewportEvent::PointerReleased(pointer_id));
        }
        self.apply_gesture(outcome);
    }

    /// 系统中断手势：框选/套索直接丢弃，平移恢复到开始前的视图。
    pub fn pointer_cancel(&mut self, pointer_id: u32) {
        let Some(controller) = self.interaction.as_mut() else {
            return;
        };
        let outcome = controller.pointer_cancel(pointer_id);
        if matches!(outcome, GestureOutcome::Cancelled { .. }) {
            self.events
                .push_back(ViewportEvent::PointerReleased(pointer_id));
        }
        self.apply_gesture(outcome);
    }

    pub fn double_click(&mut self, position: Point2) -> bool {
        if self.measurement.mode().is_active() {
            let changed = self.measurement.double_click();
            if changed {
                self.push_measurement_event();
            }
            return changed;
        }
        self.activate_text_at(position).is_some()
    }

    fn cancel_gesture(&mut self) {
        let Some(controller) = self.interaction.as_mut() else {
            return;
        };
        let pointer = controller.captured_pointer();
        let outcome = controller.cancel();
        if let Some(pointer) = pointer {
            self.events.push_back(ViewportEvent::PointerReleased(pointer));
        }
        self.apply_gesture(outcome);
    }

    fn apply_gesture(&mut self, outcome: GestureOutcome) {
        match outcome {
            GestureOutcome::None | GestureOutcome::Pan { .. } => {}
            GestureOutcome::Pick { point, modifiers } => {
                let mode = CommitMode::from_modifiers(modifiers);
                let picked: BTreeSet<Handle> = self
                    .frame()
                    .and_then(|frame| pick_at(frame, point))
                    .map(|pickable| pickable.handle.clone())
                    .into_iter()
                    .collect();
                if picked.is_empty() && mode != CommitMode::Replace {
                    return;
                }
                self.commit_selection(picked, mode);
            }
            GestureOutcome::Rect {
                start,
                end,
                modifiers,
            } => {
                let Some(frame) = self.frame() else {
                    return;
                };
                let handles = select_in_rect(frame, start, end);
                self.commit_selection(handles, CommitMode::from_modifiers(modifiers));
            }
            GestureOutcome::Lasso { path, modifiers } => {
                let Some(frame) = self.frame() else {
                    return;
                };
                let handles = select_in_lasso(frame, &path);
                self.commit_selection(handles, CommitMode::from_modifiers(modifiers));
            }
            GestureOutcome::PanFinished => {
                self.pan_origin = None;
                if let Some(state) = self.current_view() {
                    self.apply_view_state(state, true);
                }
            }
            GestureOutcome::Cancelled { kind } => {
                if kind == InteractionKind::Pan {
                    if let Some(origin) = self.pan_origin.take() {
                        self.apply_view_state(origin, false);
                    }
                }
            }
        }
    }

    /// 文字或块属性激活：命中的文字片段发出 `HandleActivated`。
    pub fn activate_text_at(&mut self, position: Point2) -> Option<Handle> {
        let handle = self
            .frame()?
            .texts
            .iter()
            .filter(|run| run.screen_bounds.contains_point(position))
            .min_by(|a, b| a.screen_bounds.area().total_cmp(&b.screen_bounds.area()))
            .map(|run| run.handle.clone())?;
        info!(%handle, "激活文字句柄");
        self.events
            .push_back(ViewportEvent::HandleActivated(handle.clone()));
        Some(handle)
    }

    // ---- 选择 ----

    pub fn select_handles<I>(&mut self, handles: I, mode: CommitMode) -> bool
    where
        I: IntoIterator<Item = Handle>,
    {
        self.commit_selection(handles.into_iter().collect(), mode)
    }

    pub fn clear_selection(&mut self) -> bool {
        self.commit_selection(BTreeSet::new(), CommitMode::Replace)
    }

    fn commit_selection(&mut self, handles: BTreeSet<Handle>, mode: CommitMode) -> bool {
        let Some(tab) = self.active_tab else {
            return false;
        };
        let selection = self.selections.get_mut(tab);
        if !selection.commit(handles, mode) {
            return false;
        }
        let handles = selection.handles().clone();
        self.surface.set_selection_handles(&handles);
        debug!(%tab, count = handles.len(), ?mode, "选中集已更新");
        self.events.push_back(ViewportEvent::SelectionChanged {
            tab,
            handles: handles.into_iter().collect(),
        });
        true
    }

    // ---- 测量 ----

    pub fn set_measurement_mode(&mut self, mode: MeasurementMode) -> bool {
        let changed = self.measurement.set_mode(mode);
        if changed {
            info!(mode = %mode, "测量模式已切换");
            self.push_measurement_event();
        }
        changed
    }

    pub fn cycle_measurement_mode(&mut self) -> MeasurementMode {
        let mode = self.measurement.cycle_mode();
        info!(mode = %mode, "测量模式已切换");
        self.push_measurement_event();
        mode
    }

    pub fn clear_measurement(&mut self) -> bool {
        if !self.measurement.has_points() {
            return false;
        }
        self.measurement.clear();
        self.push_measurement_event();
        true
    }

    /// 当前测量报告，单位标签取自活动文档的 `$INSUNITS`。
    pub fn measurement_report(&self) -> MeasurementReport {
        let insunits = self
            .active_tab
            .and_then(|tab| self.documents.scene_graph(tab))
            .and_then(|scene| scene.drawing_properties.insunits);
        self.measurement.report(unit_label(insunits))
    }

    /// 测量点优先取捕捉候选，否则取光标处的世界坐标。
    fn resolve_measurement_point(&mut self, screen: Point2) -> Option<MeasurementPoint> {
        let key = self.active_key()?;
        let frame = self.frames.get(&key)?;
        let threshold = self.settings.snap_threshold_px;
        if let Some(candidate) = self.snap_cache.find(screen, frame, threshold) {
            return Some(MeasurementPoint::snapped(&candidate));
        }
        let world = FrameTransform::from_frame(frame)?.screen_to_world(screen);
        Some(MeasurementPoint::free(world))
    }

    fn push_measurement_event(&mut self) {
        let report = self.measurement_report();
        self.events
            .push_back(ViewportEvent::MeasurementChanged(report));
    }

    // ---- 图层与对象隔离 ----

    pub fn effective_layer_state(&self, layer: &str) -> Option<EffectiveLayerState> {
        let tab = self.active_tab?;
        let tables = &self.documents.scene_graph(tab)?.tables;
        Some(match self.isolation.get(tab) {
            Some(state) => state.effective_layer_state(tables, layer),
            None => TabLayerState::new().effective_layer_state(tables, layer),
        })
    }

    pub fn set_layer_override(&mut self, layer: &str, property: LayerProperty) -> bool {
        let Some(tab) = self.active_tab else {
            return false;
        };
        let Some(scene) = self.documents.scene_graph(tab) else {
            return false;
        };
        if !self
            .isolation
            .get_mut(tab)
            .set_layer_override(&scene.tables, layer, property)
        {
            return false;
        }
        debug!(%tab, layer, ?property, "图层覆盖已更新");
        self.after_isolation_change(tab);
        true
    }

    pub fn reset_layer(&mut self, layer: &str) -> bool {
        let Some(tab) = self.active_tab else {
            return false;
        };
        if !self.isolation.get_mut(tab).reset_layer(layer) {
            return false;
        }
        self.after_isolation_change(tab);
        true
    }

    pub fn apply_layer_isolation<I>(&mut self, layer_keys: I) -> bool
    where
        I: IntoIterator<Item = LayerKey>,
    {
        let Some(tab) = self.active_tab else {
            return false;
        };
        let Some(scene) = self.documents.scene_graph(tab) else {
            return false;
        };
        if !self
            .isolation
            .get_mut(tab)
            .apply_layer_isolation(scene, layer_keys)
        {
            return false;
        }
        self.after_isolation_change(tab);
        true
    }

    pub fn clear_layer_isolation(&mut self) -> bool {
        let Some(tab) = self.active_tab else {
            return false;
        };
        if !self.isolation.get_mut(tab).clear_layer_isolation() {
            return false;
        }
        self.after_isolation_change(tab);
        true
    }

    pub fn apply_object_isolation<I>(&mut self, handles: I) -> bool
    where
        I: IntoIterator<Item = Handle>,
    {
        let Some(tab) = self.active_tab else {
            return false;
        };
        if !self.isolation.get_mut(tab).apply_object_isolation(handles) {
            return false;
        }
        self.after_isolation_change(tab);
        true
    }

    pub fn clear_object_isolation(&mut self) -> bool {
        let Some(tab) = self.active_tab else {
            return false;
        };
        if !self.isolation.get_mut(tab).clear_object_isolation() {
            return false;
        }
        self.after_isolation_change(tab);
        true
    }

    /// 以当前选中集做对象隔离。
    pub fn isolate_selection(&mut self) -> bool {
        let handles: Vec<Handle> = match self.selection() {
            Some(selection) if !selection.is_empty() => {
                selection.handles().iter().cloned().collect()
            }
            _ => return false,
        };
        self.apply_object_isolation(handles)
    }

    /// 同时结束图层隔离与对象隔离。
    pub fn clear_isolation(&mut self) -> bool {
        let Some(tab) = self.active_tab else {
            return false;
        };
        let state = self.isolation.get_mut(tab);
        let layers = state.clear_layer_isolation();
        let objects = state.clear_object_isolation();
        if layers || objects {
            self.after_isolation_change(tab);
        }
        layers || objects
    }

    pub fn set_block_isolation(&mut self, blocks: Option<&BTreeSet<String>>) -> Option<ViewState> {
        self.surface.set_block_isolation(blocks);
        self.refresh()
    }

    pub fn set_attribute_display(&mut self, flags: AttributeDisplay) -> Option<ViewState> {
        self.surface.set_attribute_display(flags);
        self.refresh()
    }

    fn after_isolation_change(&mut self, tab: TabId) {
        self.sync_surface_state(tab);
        self.events
            .push_back(ViewportEvent::IsolationChanged { tab });
        self.refresh();
    }

    /// 把某个标签页的状态整体推送给渲染面。
    fn sync_surface_state(&mut self, tab: TabId) {
        let layer_state = match (self.documents.scene_graph(tab), self.isolation.get(tab)) {
            (Some(scene), Some(state)) => state.layer_state_map(&scene.tables),
            _ => None,
        };
        self.surface.set_layer_state(layer_state.as_ref());
        let entities = self
            .isolation
            .get(tab)
            .and_then(TabLayerState::object_isolation)
            .map(|isolation| &isolation.handles);
        self.surface.set_entity_isolation(entities);
        let selection = self
            .selections
            .get(tab)
            .map(|selection| selection.handles().clone())
            .unwrap_or_default();
        self.surface.set_selection_handles(&selection);
    }

    /// Escape：先清测量点，其次退出测量模式，再取消进行中的手势；
    /// 都没有时关闭视口。视口已关闭时返回 `false`。
    pub fn escape(&mut self) -> bool {
        if self.clear_measurement() {
            return true;
        }
        if self.measurement.mode().is_active() {
            return self.set_measurement_mode(MeasurementMode::None);
        }
        if self
            .interaction
            .as_ref()
            .is_some_and(InteractionController::is_active)
        {
            self.cancel_gesture();
            return true;
        }
        if !self.is_viewport_open() {
            return false;
        }
        self.close_viewport();
        true
    }
}

/// 命令层使用的对象安全视口接口。
pub trait ViewportControl {
    fn settings(&self) -> &EngineSettings;
    fn zoom_view(&mut self, factor: f64, anchor: Option<Point2>) -> Option<ViewState>;
    fn pan_view(&mut self, dx: f64, dy: f64) -> Option<ViewState>;
    fn orbit_view(&mut self, delta_degrees: f64) -> Option<ViewState>;
    fn undo_view_navigation(&mut self) -> Option<ViewState>;
    fn redo_view_navigation(&mut self) -> Option<ViewState>;
    fn reset_view_navigation(&mut self) -> Option<ViewState>;
    fn on_view_cube_orientation(&mut self, name: &str) -> Result<Option<ViewState>, EngineError>;
    fn set_measurement_mode(&mut self, mode: MeasurementMode) -> bool;
    fn cycle_measurement_mode(&mut self) -> MeasurementMode;
    fn clear_measurement(&mut self) -> bool;
    fn clear_selection(&mut self) -> bool;
    fn isolate_selection(&mut self) -> bool;
    fn clear_isolation(&mut self) -> bool;
    fn escape(&mut self) -> bool;
}

impl<S, D> ViewportControl for ViewportEngine<S, D>
where
    S: RenderingSurface,
    D: DocumentProvider,
{
    fn settings(&self) -> &EngineSettings {
        ViewportEngine::settings(self)
    }

    fn zoom_view(&mut self, factor: f64, anchor: Option<Point2>) -> Option<ViewState> {
        ViewportEngine::zoom_view(self, factor, anchor)
    }

    fn pan_view(&mut self, dx: f64, dy: f64) -> Option<ViewState> {
        ViewportEngine::pan_view(self, dx, dy)
    }

    fn orbit_view(&mut self, delta_degrees: f64) -> Option<ViewState> {
        ViewportEngine::orbit_view(self, delta_degrees)
    }

    fn undo_view_navigation(&mut self) -> Option<ViewState> {
        ViewportEngine::undo_view_navigation(self)
    }

    fn redo_view_navigation(&mut self) -> Option<ViewState> {
        ViewportEngine::redo_view_navigation(self)
    }

    fn reset_view_navigation(&mut self) -> Option<ViewState> {
        ViewportEngine::reset_view_navigation(self)
    }

    fn on_view_cube_orientation(&mut self, name: &str) -> Result<Option<ViewState>, EngineError> {
        ViewportEngine::on_view_cube_orientation(self, name)
    }

    fn set_measurement_mode(&mut self, mode: MeasurementMode) -> bool {
        ViewportEngine::set_measurement_mode(self, mode)
    }

    fn cycle_measurement_mode(&mut self) -> MeasurementMode {
        ViewportEngine::cycle_measurement_mode(self)
    }

    fn clear_measurement(&mut self) -> bool {
        ViewportEngine::clear_measurement(self)
    }

    fn clear_selection(&mut self) -> bool {
        ViewportEngine::clear_selection(self)
    }

    fn isolate_selection(&mut self) -> bool {
        ViewportEngine::isolate_selection(self)
    }

    fn clear_isolation(&mut self) -> bool {
        ViewportEngine::clear_isolation(self)
    }

    fn escape(&mut self) -> bool {
        ViewportEngine::escape(self)
    }
}

#[cfg(test)]
mod tests {
    use dxfview_core::scene::SceneGraph;

    use super::*;
    use crate::surface::{InMemoryDocuments, SoftwareSurface};

    fn engine() -> ViewportEngine<SoftwareSurface, InMemoryDocuments> {
        let mut scene = SceneGraph::new();
        scene.add_line(Point2::new(0.0, 0.0), Point2::new(100.0, 0.0), "0");
        scene.add_line(Point2::new(0.0, 0.0), Point2::new(0.0, 50.0), "0");
        let mut documents = InMemoryDocuments::new();
        documents.insert(TabId::new(1), scene);
        let mut engine = ViewportEngine::new(
            SoftwareSurface::new(800.0, 600.0, 1.0),
            documents,
            EngineSettings::default(),
        );
        engine.open_viewport();
        engine
    }

    #[test]
    fn navigation_is_a_no_op_without_tab() {
        let mut engine = engine();
        assert!(engine.zoom_view(2.0, None).is_none());
        assert!(engine.pan_view(10.0, 0.0).is_none());
        assert!(engine.undo_view_navigation().is_none());
        assert!(engine.reset_view_navigation().is_none());
        assert!(!engine.clear_selection());
        assert_eq!(engine.on_view_cube_orientation("top").ok(), Some(None));
        assert!(engine.drain_events().is_empty());
    }

    #[test]
    fn activating_a_tab_renders_auto_fit_into_history() {
        let mut engine = engine();
        assert!(engine.activate_tab(TabId::new(1)));
        assert!(!engine.activate_tab(TabId::new(1)));
        let key = engine.active_key().expect("key");
        let context = engine.view_context(key).expect("context");
        assert_eq!(context.history().len(), 1);
        assert_eq!(context.current(), ViewState::Auto);
        assert!(context.auto().is_some());
        assert!(matches!(
            engine.drain_events().last(),
            Some(ViewportEvent::ViewChanged { view: ViewState::Auto, .. })
        ));
    }

    #[test]
    fn unknown_orientation_is_reported() {
        let mut engine = engine();
        engine.activate_tab(TabId::new(1));
        assert!(matches!(
            engine.on_view_cube_orientation("sideways"),
            Err(EngineError::UnknownOrientation(name)) if name == "sideways"
        ));
        let rotated = engine
            .on_view_cube_orientation("left")
            .expect("known orientation")
            .and_then(|state| state.params())
            .expect("custom view");
        assert!((rotated.rotation_rad - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
    }

    #[test]
    fn wheel_zoom_uses_configured_step() {
        let mut engine = engine();
        engine.activate_tab(TabId::new(1));
        let before = engine.frame().expect("frame").scale;
        engine.wheel(-1.0, Point2::new(400.0, 300.0));
        let after = engine.frame().expect("frame").scale;
        assert!((after / before - 1.1).abs() < 1e-9);
        assert!(engine.wheel(0.0, Point2::new(400.0, 300.0)).is_none());
    }

    #[test]
    fn escape_clears_measurement_then_closes_viewport() {
        let mut engine = engine();
        engine.activate_tab(TabId::new(1));
        engine.select_handles([Handle::new("1")], CommitMode::Replace);
        engine.set_measurement_mode(MeasurementMode::Distance);
        engine.pointer_down(PointerInput::primary(1, Point2::new(10.0, 10.0)));
        assert_eq!(engine.measurement().points().len(), 1);

        assert!(engine.escape());
        assert!(engine.measurement().points().is_empty());
        assert!(engine.escape());
        assert_eq!(engine.measurement().mode(), MeasurementMode::None);
        assert!(engine.is_viewport_open());

        engine.drain_events();
        assert!(engine.escape());
        assert!(!engine.is_viewport_open());
        assert!(engine.drain_events().contains(&ViewportEvent::ViewportClosed));
        // 选中集不受 Escape 影响。
        assert_eq!(engine.selection().map(SelectionSet::len), Some(1));
        assert!(!engine.escape());
    }

    #[test]
    fn cycle_measurement_mode_wraps_and_reports() {
        let mut engine = engine();
        engine.activate_tab(TabId::new(1));
        engine.drain_events();
        assert_eq!(engine.cycle_measurement_mode(), MeasurementMode::Distance);
        assert!(matches!(
            engine.drain_events().last(),
            Some(ViewportEvent::MeasurementChanged(report)) if report.mode == MeasurementMode::Distance
        ));
        while engine.cycle_measurement_mode() != MeasurementMode::None {}
        assert!(!engine.measurement().mode().is_active());
    }

    #[test]
    fn closing_the_viewport_drops_gesture_state() {
        let mut engine = engine();
        engine.activate_tab(TabId::new(1));
        assert!(engine.pointer_down(PointerInput::primary(7, Point2::new(5.0, 5.0))));
        engine.close_viewport();
        assert!(!engine.is_viewport_open());
        assert!(engine
            .drain_events()
            .contains(&ViewportEvent::PointerReleased(7)));
        assert!(!engine.pointer_down(PointerInput::primary(8, Point2::new(5.0, 5.0))));
    }
}
