//! 选择：单点拾取、窗选/叉选、套索，以及按标签页维护的选中集。

use std::collections::{BTreeSet, HashMap};

use dxfview_core::frame::{Frame, Pickable};
use dxfview_core::geometry::{Point2, ScreenRect};
use dxfview_core::planar::{point_in_polygon, rect_crosses_polygon};
use dxfview_core::scene::Handle;

use crate::interaction::Modifiers;
use crate::navigation::TabId;

const MIN_PICK_TOLERANCE_PX: f64 = 3.0;
const PICK_WEIGHT_FACTOR: f64 = 1.6;

/// 提交方式，由修饰键决定。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommitMode {
    #[default]
    Replace,
    Add,
    Toggle,
}

impl CommitMode {
    /// `ctrl`/`meta` 优先于 `shift`。
    pub fn from_modifiers(modifiers: Modifiers) -> Self {
        if modifiers.ctrl || modifiers.meta {
            CommitMode::Toggle
        } else if modifiers.shift {
            CommitMode::Add
        } else {
            CommitMode::Replace
        }
    }
}

/// 矩形选择的两种语义。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RectSelectionKind {
    /// 从左向右拖：只保留完全包含的图元。
    Window,
    /// 从右向左拖：保留与矩形相交的图元。
    Crossing,
}

impl RectSelectionKind {
    pub fn from_drag(start: Point2, end: Point2) -> Self {
        if end.x() > start.x() {
            RectSelectionKind::Window
        } else {
            RectSelectionKind::Crossing
        }
    }
}

fn pick_tolerance(pickable: &Pickable) -> f64 {
    let weight = if pickable.weight.is_finite() {
        pickable.weight
    } else {
        0.0
    };
    (weight * PICK_WEIGHT_FACTOR).max(MIN_PICK_TOLERANCE_PX)
}

/// 单点拾取：命中多个时取包围盒面积最小者，面积相同保留先出现的。
pub fn pick_at(frame: &Frame, point: Point2) -> Option<&Pickable> {
    if !point.is_finite() {
        return None;
    }
    frame
        .pickables
        .iter()
        .filter(|pickable| {
            pickable
                .screen_bounds
                .expand(pick_tolerance(pickable))
                .contains_point(point)
        })
        .min_by(|a, b| a.screen_bounds.area().total_cmp(&b.screen_bounds.area()))
}

pub fn select_in_rect(frame: &Frame, start: Point2, end: Point2) -> BTreeSet<Handle> {
    let rect = ScreenRect::from_corners(start, end);
    let kind = RectSelectionKind::from_drag(start, end);
    frame
        .pickables
        .iter()
        .filter(|pickable| match kind {
            RectSelectionKind::Window => rect.contains_rect(&pickable.screen_bounds),
            RectSelectionKind::Crossing => rect.intersects(&pickable.screen_bounds),
        })
        .map(|pickable| pickable.handle.clone())
        .collect()
}

/// 套索选择。路径按闭合多边形处理，少于三个点时不选中任何图元。
pub fn select_in_lasso(frame: &Frame, path: &[Point2]) -> BTreeSet<Handle> {
    if path.len() < 3 {
        return BTreeSet::new();
    }
    frame
        .pickables
        .iter()
        .filter(|pickable| {
            let bounds = &pickable.screen_bounds;
            point_in_polygon(bounds.center(), path) || rect_crosses_polygon(bounds, path)
        })
        .map(|pickable| pickable.handle.clone())
        .collect()
}

/// 单个标签页的选中集，句柄有序存放以保证输出稳定。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSet {
    handles: BTreeSet<Handle>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn handles(&self) -> &BTreeSet<Handle> {
        &self.handles
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn contains(&self, handle: &Handle) -> bool {
        self.handles.contains(handle)
    }

    /// 按提交方式合并句柄，返回选中集是否发生变化。
    pub fn commit<I>(&mut self, handles: I, mode: CommitMode) -> bool
    where
        I: IntoIterator<Item = Handle>,
    {
        let before = self.handles.clone();
        match mode {
            CommitMode::Replace => {
                self.handles = handles.into_iter().collect();
            }
            CommitMode::Add => self.handles.extend(handles),
            CommitMode::Toggle => {
                let incoming: BTreeSet<Handle> = handles.into_iter().collect();
                for handle in incoming {
                    if !self.handles.remove(&handle) {
                        self.handles.insert(handle);
                    }
                }
            }
        }
        before != self.handles
    }

    pub fn clear(&mut self) -> bool {
        let changed = !self.handles.is_empty();
        self.handles.clear();
        changed
    }
}

#[derive(Debug, Default)]
pub struct SelectionStore {
    tabs: HashMap<TabId, SelectionSet>,
}

impl SelectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, tab: TabId) -> Option<&SelectionSet> {
        self.tabs.get(&tab)
    }

    pub fn get_mut(&mut self, tab: TabId) -> &mut SelectionSet {
        self.tabs.entry(tab).or_default()
    }

    pub fn remove(&mut self, tab: TabId) -> Option<SelectionSet> {
        self.tabs.remove(&tab)
    }
}
