//! 对象捕捉：从帧的可拾取图元中派生特征点，并在像素容差内寻找最近的候选。

use std::collections::HashMap;

use dxfview_core::frame::{Frame, Pickable};
use dxfview_core::geometry::Point2;
use dxfview_core::planar::estimate_circle_center;
use dxfview_core::scene::{EntityType, Handle};
use tracing::trace;

use crate::transform::FrameTransform;

pub const DEFAULT_SNAP_THRESHOLD_PX: f64 = 14.0;
const MIN_SNAP_THRESHOLD_PX: f64 = 6.0;
const TIE_TOLERANCE_PX: f64 = 0.25;
const DUPLICATE_EPSILON: f64 = 1e-6;

/// 捕捉类型，按优先级排序（数值越小越优先）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SnapType {
    Endpoint,
    Midpoint,
    Center,
    Node,
}

impl SnapType {
    #[inline]
    pub fn priority(self) -> u8 {
        match self {
            SnapType::Endpoint => 0,
            SnapType::Midpoint => 1,
            SnapType::Center => 2,
            SnapType::Node => 3,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SnapType::Endpoint => "Endpoint",
            SnapType::Midpoint => "Midpoint",
            SnapType::Center => "Center",
            SnapType::Node => "Node",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SnapCandidate {
    pub snap_type: SnapType,
    pub world: Point2,
    pub screen: Point2,
    pub source_handle: Handle,
    pub layer: String,
    pub priority: u8,
}

/// 去重收集器：世界坐标相距不超过 1e-6 的点只保留第一个。
struct CandidateSink<'a> {
    transform: &'a FrameTransform,
    candidates: Vec<SnapCandidate>,
    grid: HashMap<(i64, i64), Vec<usize>>,
}

impl<'a> CandidateSink<'a> {
    fn new(transform: &'a FrameTransform) -> Self {
        Self {
            transform,
            candidates: Vec::new(),
            grid: HashMap::new(),
        }
    }

    fn cell(point: Point2) -> (i64, i64) {
        (
            (point.x() / DUPLICATE_EPSILON).floor() as i64,
            (point.y() / DUPLICATE_EPSILON).floor() as i64,
        )
    }

    fn is_duplicate(&self, point: Point2) -> bool {
        let (cx, cy) = Self::cell(point);
        for dx in -1..=1 {
            for dy in -1..=1 {
                if let Some(indices) = self.grid.get(&(cx + dx, cy + dy)) {
                    if indices
                        .iter()
                        .any(|&i| self.candidates[i].world.distance(point) <= DUPLICATE_EPSILON)
                    {
                        return true;
                    }
                }
            }
        }
        false
    }

    fn push(&mut self, snap_type: SnapType, world: Point2, source: &Pickable) {
        if !world.is_finite() || self.is_duplicate(world) {
            return;
        }
        let index = self.candidates.len();
        self.grid.entry(Self::cell(world)).or_default().push(index);
        self.candidates.push(SnapCandidate {
            snap_type,
            world,
            screen: self.transform.world_to_screen(world),
            source_handle: source.handle.clone(),
            layer: source.layer.clone(),
            priority: snap_type.priority(),
        });
    }
}

/// 派生一帧的全部捕捉候选。
pub fn derive_candidates(frame: &Frame) -> Vec<SnapCandidate> {
    let Some(transform) = FrameTransform::from_frame(frame) else {
        return Vec::new();
    };
    let mut sink = CandidateSink::new(&transform);
    for pickable in &frame.pickables {
        collect_pickable(&mut sink, pickable);
    }
    sink.candidates
}

fn collect_pickable(sink: &mut CandidateSink<'_>, pickable: &Pickable) {
    let points = &pickable.world_points;
    let (Some(first), Some(last)) = (points.first().copied(), points.last().copied()) else {
        return;
    };
    match pickable.entity_type {
        EntityType::Point => sink.push(SnapType::Node, first, pickable),
        EntityType::Circle => {
            if let Some(center) = estimate_circle_center(points) {
                sink.push(SnapType::Center, center, pickable);
            }
        }
        EntityType::Arc => {
            sink.push(SnapType::Endpoint, first, pickable);
            sink.push(SnapType::Endpoint, last, pickable);
            sink.push(SnapType::Midpoint, points[points.len() / 2], pickable);
            if let Some(center) = estimate_circle_center(points) {
                sink.push(SnapType::Center, center, pickable);
            }
        }
        EntityType::Hatch | EntityType::Solid => {}
        // 文字与块参照只提供插入点。
        EntityType::Text | EntityType::Attribute | EntityType::Insert => {
            sink.push(SnapType::Node, first, pickable);
        }
        EntityType::Line | EntityType::Polyline => {
            // 端点先于节点写入，重合时保留端点。
            if !pickable.is_closed {
                sink.push(SnapType::Endpoint, first, pickable);
                sink.push(SnapType::Endpoint, last, pickable);
            }
            for vertex in points {
                sink.push(SnapType::Node, *vertex, pickable);
            }
            for pair in points.windows(2) {
                sink.push(SnapType::Midpoint, pair[0].midpoint(pair[1]), pickable);
            }
            if pickable.is_closed && points.len() > 2 {
                sink.push(SnapType::Midpoint, last.midpoint(first), pickable);
            }
        }
    }
}

/// 按设备像素比放大的捕捉容差：`max(6, t * max(1, dpr * 0.75))`。
pub fn effective_threshold(threshold_px: f64, device_pixel_ratio: f64) -> f64 {
    let ratio = if device_pixel_ratio.is_finite() {
        (device_pixel_ratio * 0.75).max(1.0)
    } else {
        1.0
    };
    (threshold_px * ratio).max(MIN_SNAP_THRESHOLD_PX)
}

/// 在容差内选屏幕距离最近的候选；距离相差不超过 0.25px 时按优先级决胜。
pub fn find_snap_candidate<'a>(
    screen: Point2,
    candidates: &'a [SnapCandidate],
    device_pixel_ratio: f64,
    threshold_px: f64,
) -> Option<&'a SnapCandidate> {
    if !screen.is_finite() {
        return None;
    }
    let threshold = effective_threshold(threshold_px, device_pixel_ratio);
    let within: Vec<(f64, &SnapCandidate)> = candidates
        .iter()
        .map(|candidate| (candidate.screen.distance(screen), candidate))
        .filter(|(distance, _)| *distance <= threshold)
        .collect();
    let nearest = within
        .iter()
        .map(|(distance, _)| *distance)
        .fold(f64::INFINITY, f64::min);
    within
        .into_iter()
        .filter(|(distance, _)| *distance <= nearest + TIE_TOLERANCE_PX)
        .min_by(|(da, a), (db, b)| a.priority.cmp(&b.priority).then(da.total_cmp(db)))
        .map(|(_, candidate)| candidate)
}

/// 按帧版本缓存的候选集，帧变化时才重新派生。
#[derive(Debug, Default)]
pub struct SnapCache {
    version: Option<u64>,
    candidates: Vec<SnapCandidate>,
}

impl SnapCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn candidates(&mut self, frame: &Frame) -> &[SnapCandidate] {
        if self.version != Some(frame.version) {
            self.candidates = derive_candidates(frame);
            self.version = Some(frame.version);
            trace!(
                version = frame.version,
                count = self.candidates.len(),
                "已重新派生捕捉候选"
            );
        }
        &self.candidates
    }

    pub fn find(
        &mut self,
        screen: Point2,
        frame: &Frame,
        threshold_px: f64,
    ) -> Option<SnapCandidate> {
        let ratio = frame.device_pixel_ratio;
        find_snap_candidate(screen, self.candidates(frame), ratio, threshold_px).cloned()
    }

    #[inline]
    pub fn version(&self) -> Option<u64> {
        self.version
    }

    pub fn invalidate(&mut self) {
        self.version = None;
        self.candidates.clear();
    }
}
