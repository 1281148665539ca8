//! 视图导航：按 (标签页, 窗格) 维护视图上下文与有界的撤销/重做历史。

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

use dxfview_core::geometry::{Point2, normalize_angle};
use dxfview_core::view::{ViewParams, ViewPatch, ViewState, clamp_scale};

use crate::errors::EngineError;
use crate::transform::FrameTransform;

pub const DEFAULT_HISTORY_LIMIT: usize = 64;
pub const DEFAULT_WHEEL_ZOOM_STEP: f64 = 1.1;
/// 视图去重比较的容差（缩放按相对误差，中心按像素）。
pub const VIEW_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TabId(u64);

impl TabId {
    #[inline]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[inline]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tab#{}", self.0)
    }
}

/// 同一标签页可拆分为主/副两个窗格，各自独立导航。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Pane {
    #[default]
    Primary,
    Secondary,
}

/// 视图上下文的复合键。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewKey {
    pub tab: TabId,
    pub pane: Pane,
}

impl ViewKey {
    #[inline]
    pub fn new(tab: TabId, pane: Pane) -> Self {
        Self { tab, pane }
    }
}

/// 导航请求：回到自动适配，或在当前视图上修改部分参数。
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViewRequest {
    Auto,
    Patch(ViewPatch),
}

impl From<ViewState> for ViewRequest {
    fn from(state: ViewState) -> Self {
        match state {
            ViewState::Auto => ViewRequest::Auto,
            ViewState::Custom(params) => ViewRequest::Patch(params.into()),
        }
    }
}

impl From<ViewParams> for ViewRequest {
    fn from(params: ViewParams) -> Self {
        ViewRequest::Patch(params.into())
    }
}

/// 单个 (标签页, 窗格) 的视图状态与历史。
#[derive(Debug, Clone)]
pub struct ViewContext {
    current: ViewState,
    resolved: Option<ViewParams>,
    auto: Option<ViewState>,
    history: VecDeque<ViewState>,
    index: usize,
    limit: usize,
}

impl ViewContext {
    pub fn new(limit: usize) -> Self {
        Self {
            current: ViewState::Auto,
            resolved: None,
            auto: None,
            history: VecDeque::new(),
            index: 0,
            limit: limit.max(1),
        }
    }

    #[inline]
    pub fn current(&self) -> ViewState {
        self.current
    }

    /// 最近一帧实际使用的视图参数。
    #[inline]
    pub fn resolved(&self) -> Option<ViewParams> {
        self.resolved
    }

    #[inline]
    pub fn auto(&self) -> Option<ViewState> {
        self.auto
    }

    #[inline]
    pub fn history(&self) -> &VecDeque<ViewState> {
        &self.history
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    #[inline]
    pub fn can_undo(&self) -> bool {
        !self.history.is_empty() && self.index > 0
    }

    #[inline]
    pub fn can_redo(&self) -> bool {
        !self.history.is_empty() && self.index + 1 < self.history.len()
    }

    /// 规范化请求：缺失字段取自最近一帧的实际视图。
    pub fn normalize(&self, request: ViewRequest) -> ViewState {
        match request {
            ViewRequest::Auto => ViewState::Auto,
            ViewRequest::Patch(patch) => {
                let base = self
                    .resolved
                    .unwrap_or_else(|| ViewParams::new(Point2::ORIGIN, 1.0, 0.0));
                ViewState::Custom(patch.resolve(base))
            }
        }
    }

    /// 以渲染后的实际视图更新当前状态，并按需写入历史。返回记录的状态。
    /// 历史为空时总会记录，保证首帧可作为撤销终点。
    pub fn commit(
        &mut self,
        requested: &ViewState,
        frame_view: ViewParams,
        record_history: bool,
    ) -> ViewState {
        let actual = self.absorb(requested, frame_view);
        if record_history || self.history.is_empty() {
            self.push_history(actual);
        }
        actual
    }

    /// 撤销/重做回放：只移动索引，不产生新的历史项。
    pub fn commit_replay(&mut self, index: usize, frame_view: ViewParams) -> Option<ViewState> {
        let requested = *self.history.get(index)?;
        self.index = index;
        Some(self.absorb(&requested, frame_view))
    }

    pub fn undo_target(&self) -> Option<(usize, ViewState)> {
        if !self.can_undo() {
            return None;
        }
        let index = self.index - 1;
        self.history.get(index).map(|state| (index, *state))
    }

    pub fn redo_target(&self) -> Option<(usize, ViewState)> {
        if !self.can_redo() {
            return None;
        }
        let index = self.index + 1;
        self.history.get(index).map(|state| (index, *state))
    }

    /// 复位目标：已捕获的自动适配视图，否则回到 `Auto`。
    pub fn reset_target(&self) -> ViewState {
        self.auto.unwrap_or(ViewState::Auto)
    }

    fn absorb(&mut self, requested: &ViewState, frame_view: ViewParams) -> ViewState {
        self.resolved = Some(frame_view);
        let actual = match requested {
            ViewState::Auto => {
                self.auto = Some(ViewState::Custom(frame_view));
                ViewState::Auto
            }
            ViewState::Custom(_) => ViewState::Custom(frame_view),
        };
        self.current = actual;
        actual
    }

    fn push_history(&mut self, state: ViewState) {
        if !self.history.is_empty() {
            self.history.truncate(self.index + 1);
            if self
                .history
                .back()
                .is_some_and(|top| top.approx_eq(&state, VIEW_EPSILON))
            {
                self.index = self.history.len() - 1;
                return;
            }
        }
        self.history.push_back(state);
        while self.history.len() > self.limit {
            self.history.pop_front();
        }
        self.index = self.history.len() - 1;
    }
}

/// 以 `anchor` 为不动点缩放，返回新的视图参数。
pub fn zoom_about(transform: &FrameTransform, factor: f64, anchor: Point2) -> Option<ViewParams> {
    if !(factor.is_finite() && factor > 0.0) || !anchor.is_finite() {
        return None;
    }
    let scale = clamp_scale(transform.scale * factor)?;
    let anchored_world = transform.screen_to_world(anchor);
    let zoomed = FrameTransform {
        scale,
        world_center: Point2::ORIGIN,
        ..*transform
    };
    let offset = zoomed.screen_to_world(anchor).vector_to(Point2::ORIGIN);
    Some(ViewParams::new(
        anchored_world.translate(offset),
        scale,
        transform.rotation_rad,
    ))
}

/// 拖拽平移：屏幕位移换算成世界位移后从中心减去，内容随指针移动。
pub fn pan_by(transform: &FrameTransform, dx: f64, dy: f64) -> Option<ViewParams> {
    if !(dx.is_finite() && dy.is_finite()) {
        return None;
    }
    let offset = transform.screen_delta_to_world(dx, dy).scale(-1.0);
    Some(ViewParams::new(
        transform.world_center.translate(offset),
        transform.scale,
        transform.rotation_rad,
    ))
}

pub fn orbit_by(view: ViewParams, delta_degrees: f64) -> Option<ViewParams> {
    if !delta_degrees.is_finite() {
        return None;
    }
    Some(ViewParams::new(
        view.center,
        view.scale,
        normalize_angle(view.rotation_rad + delta_degrees.to_radians()),
    ))
}

/// 滚轮缩放倍率：向上滚（负值）放大，向下滚缩小。
pub fn wheel_zoom_factor(delta_y: f64, step: f64) -> f64 {
    let step = if step.is_finite() && step > 1.0 {
        step
    } else {
        DEFAULT_WHEEL_ZOOM_STEP
    };
    if delta_y < 0.0 {
        step
    } else if delta_y > 0.0 {
        1.0 / step
    } else {
        1.0
    }
}

/// 视图立方体的固定方位词汇。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewCubeOrientation {
    Top,
    Bottom,
    Left,
    Right,
    Front,
    Back,
    Iso,
    IsoLeft,
    IsoRight,
    Home,
}

impl ViewCubeOrientation {
    /// 对应的平面旋转角（度）；`Home` 触发复位，没有固定角度。
    pub fn rotation_degrees(self) -> Option<f64> {
        match self {
            ViewCubeOrientation::Top | ViewCubeOrientation::Front => Some(0.0),
            ViewCubeOrientation::Bottom | ViewCubeOrientation::Back => Some(180.0),
            ViewCubeOrientation::Left => Some(90.0),
            ViewCubeOrientation::Right => Some(-90.0),
            ViewCubeOrientation::Iso => Some(45.0),
            ViewCubeOrientation::IsoLeft => Some(135.0),
            ViewCubeOrientation::IsoRight => Some(-45.0),
            ViewCubeOrientation::Home => None,
        }
    }
}

impl FromStr for ViewCubeOrientation {
    type Err = EngineError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "top" => Ok(Self::Top),
            "bottom" => Ok(Self::Bottom),
            "left" => Ok(Self::Left),
            "right" => Ok(Self::Right),
            "front" => Ok(Self::Front),
            "back" => Ok(Self::Back),
            "iso" => Ok(Self::Iso),
            "iso-left" => Ok(Self::IsoLeft),
            "iso-right" => Ok(Self::IsoRight),
            "home" => Ok(Self::Home),
            other => Err(EngineError::UnknownOrientation(other.to_string())),
        }
    }
}
