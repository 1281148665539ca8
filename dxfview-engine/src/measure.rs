//! 测量：距离、面积与角度。所有计算在世界坐标中进行。

use std::fmt;
use std::str::FromStr;

use dxfview_core::geometry::{Point2, Vector2};
use dxfview_core::planar::{path_length, polygon_area, polygon_centroid};
use dxfview_core::scene::Handle;

use crate::errors::EngineError;
use crate::snap::{SnapCandidate, SnapType};

const ANGLE_ARC_RADIUS_FACTOR: f64 = 0.45;
const MIN_LEG_LENGTH: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MeasurementMode {
    #[default]
    None,
    Distance,
    Area,
    Angle,
}

impl MeasurementMode {
    /// 循环顺序：无 → 距离 → 面积 → 角度 → 无。
    pub fn next(self) -> Self {
        match self {
            MeasurementMode::None => MeasurementMode::Distance,
            MeasurementMode::Distance => MeasurementMode::Area,
            MeasurementMode::Area => MeasurementMode::Angle,
            MeasurementMode::Angle => MeasurementMode::None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MeasurementMode::None => "none",
            MeasurementMode::Distance => "distance",
            MeasurementMode::Area => "area",
            MeasurementMode::Angle => "angle",
        }
    }

    #[inline]
    pub fn is_active(self) -> bool {
        self != MeasurementMode::None
    }
}

impl fmt::Display for MeasurementMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MeasurementMode {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "off" => Ok(MeasurementMode::None),
            "distance" => Ok(MeasurementMode::Distance),
            "area" => Ok(MeasurementMode::Area),
            "angle" => Ok(MeasurementMode::Angle),
            _ => Err(EngineError::UnknownMeasurementMode(s.to_string())),
        }
    }
}

/// 测量点携带的捕捉信息。
#[derive(Debug, Clone, PartialEq)]
pub struct SnapInfo {
    pub snap_type: SnapType,
    pub label: String,
    pub source_handle: Handle,
}

impl From<&SnapCandidate> for SnapInfo {
    fn from(candidate: &SnapCandidate) -> Self {
        Self {
            snap_type: candidate.snap_type,
            label: candidate.snap_type.label().to_string(),
            source_handle: candidate.source_handle.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementPoint {
    pub world: Point2,
    pub snap: Option<SnapInfo>,
}

impl MeasurementPoint {
    pub fn free(world: Point2) -> Self {
        Self { world, snap: None }
    }

    pub fn snapped(candidate: &SnapCandidate) -> Self {
        Self {
            world: candidate.world,
            snap: Some(SnapInfo::from(candidate)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DistanceReport {
    pub total: f64,
    /// 含预览段的总长；没有预览点时为 `None`。
    pub preview_total: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AreaReport {
    pub area: f64,
    pub perimeter: f64,
    pub centroid: Point2,
}

/// 角度标注弧的绘制参数（世界坐标）。
#[derive(Debug, Clone, PartialEq)]
pub struct AngleArc {
    pub vertex: Point2,
    pub radius: f64,
    pub start_angle: f64,
    /// 从基准边转到目标边的有向扫掠角，逆时针为正。
    pub sweep: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AngleReport {
    pub radians: f64,
    pub degrees: f64,
    pub reflex_degrees: f64,
    pub arc: AngleArc,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReportDetail {
    Distance(DistanceReport),
    Area(AreaReport),
    Angle(AngleReport),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementReport {
    pub mode: MeasurementMode,
    pub has_data: bool,
    pub label: String,
    pub detail: Option<ReportDetail>,
}

impl MeasurementReport {
    fn placeholder(mode: MeasurementMode, label: &str) -> Self {
        Self {
            mode,
            has_data: false,
            label: label.to_string(),
            detail: None,
        }
    }
}

/// `$INSUNITS` 代码对应的单位后缀；无单位或未知代码返回 `None`。
pub fn unit_label(insunits: Option<i16>) -> Option<&'static str> {
    let label = match insunits? {
        1 => "in",
        2 => "ft",
        3 => "mi",
        4 => "mm",
        5 => "cm",
        6 => "m",
        7 => "km",
        8 => "µin",
        9 => "mil",
        10 => "yd",
        11 => "Å",
        12 => "nm",
        13 => "µm",
        14 => "dm",
        15 => "dam",
        16 => "hm",
        17 => "Gm",
        18 => "AU",
        19 => "ly",
        20 => "pc",
        21 => "ft (US)",
        _ => return None,
    };
    Some(label)
}

fn with_unit(value: f64, unit: Option<&str>) -> String {
    match unit {
        Some(unit) => format!("{value:.3} {unit}"),
        None => format!("{value:.3}"),
    }
}

fn with_square_unit(value: f64, unit: Option<&str>) -> String {
    match unit {
        Some(unit) => format!("{value:.3} {unit}²"),
        None => format!("{value:.3}"),
    }
}

/// 测量状态：已提交的点加一个仅用于叠加层的预览点。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeasurementState {
    mode: MeasurementMode,
    points: Vec<MeasurementPoint>,
    preview: Option<MeasurementPoint>,
}

impl MeasurementState {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn mode(&self) -> MeasurementMode {
        self.mode
    }

    #[inline]
    pub fn points(&self) -> &[MeasurementPoint] {
        &self.points
    }

    #[inline]
    pub fn preview(&self) -> Option<&MeasurementPoint> {
        self.preview.as_ref()
    }

    pub fn has_points(&self) -> bool {
        !self.points.is_empty() || self.preview.is_some()
    }

    /// 切换模式总会清空已累积的点，返回模式是否变化。
    pub fn set_mode(&mut self, mode: MeasurementMode) -> bool {
        let changed = self.mode != mode;
        self.mode = mode;
        self.clear();
        changed
    }

    pub fn cycle_mode(&mut self) -> MeasurementMode {
        self.set_mode(self.mode.next());
        self.mode
    }

    pub fn clear(&mut self) {
        self.points.clear();
        self.preview = None;
    }

    /// 提交一个点。角度模式已满三点时从新点重新开始。
    pub fn add_point(&mut self, point: MeasurementPoint) -> bool {
        if !self.mode.is_active() || !point.world.is_finite() {
            return false;
        }
        if self.mode == MeasurementMode::Angle && self.points.len() >= 3 {
            self.points.clear();
        }
        self.points.push(point);
        self.preview = None;
        true
    }

    pub fn set_preview(&mut self, point: Option<MeasurementPoint>) -> bool {
        if !self.mode.is_active() {
            return false;
        }
        let point = point.filter(|p| p.world.is_finite());
        let changed = self.preview != point;
        self.preview = point;
        changed
    }

    /// 双击：角度模式重新开始累积，其余模式只丢弃预览。
    pub fn double_click(&mut self) -> bool {
        match self.mode {
            MeasurementMode::None => false,
            MeasurementMode::Angle => {
                self.clear();
                true
            }
            _ => self.set_preview(None),
        }
    }

    pub fn report(&self, unit: Option<&str>) -> MeasurementReport {
        let worlds: Vec<Point2> = self.points.iter().map(|p| p.world).collect();
        match self.mode {
            MeasurementMode::None => MeasurementReport::placeholder(self.mode, ""),
            MeasurementMode::Distance => {
                distance_report(&worlds, self.preview.as_ref().map(|p| p.world), unit)
            }
            MeasurementMode::Area => area_report(&worlds, unit),
            MeasurementMode::Angle => angle_report(&worlds),
        }
    }
}

pub fn distance_report(points: &[Point2], preview: Option<Point2>, unit: Option<&str>) -> MeasurementReport {
    let mode = MeasurementMode::Distance;
    let total = path_length(points, false);
    let preview_total = match (points.last(), preview) {
        (Some(last), Some(preview)) => Some(total + last.distance(preview)),
        _ => None,
    };
    if points.len() < 2 && preview_total.is_none() {
        return MeasurementReport::placeholder(mode, "Distance: pick points");
    }
    let mut label = format!("Distance: {}", with_unit(total, unit));
    if let Some(preview_total) = preview_total {
        label.push_str(&format!(" (preview {})", with_unit(preview_total, unit)));
    }
    MeasurementReport {
        mode,
        has_data: true,
        label,
        detail: Some(ReportDetail::Distance(DistanceReport {
            total,
            preview_total,
        })),
    }
}

pub fn area_report(points: &[Point2], unit: Option<&str>) -> MeasurementReport {
    let mode = MeasurementMode::Area;
    if points.len() < 3 {
        return MeasurementReport::placeholder(mode, "Area: add more points");
    }
    let Some(centroid) = polygon_centroid(points) else {
        return MeasurementReport::placeholder(mode, "Area: add more points");
    };
    let area = polygon_area(points);
    let perimeter = path_length(points, true);
    MeasurementReport {
        mode,
        has_data: true,
        label: format!(
            "Area: {}, perimeter {}",
            with_square_unit(area, unit),
            with_unit(perimeter, unit)
        ),
        detail: Some(ReportDetail::Area(AreaReport {
            area,
            perimeter,
            centroid,
        })),
    }
}

/// 三点角度：基准点、顶点、目标点。
pub fn angle_report(points: &[Point2]) -> MeasurementReport {
    let mode = MeasurementMode::Angle;
    let [base, vertex, target] = points else {
        return MeasurementReport::placeholder(mode, "Angle: pick base, vertex and target");
    };
    let leg_a = Vector2::from_points(*vertex, *base);
    let leg_b = Vector2::from_points(*vertex, *target);
    let (len_a, len_b) = (leg_a.length(), leg_b.length());
    if len_a <= MIN_LEG_LENGTH || len_b <= MIN_LEG_LENGTH {
        return MeasurementReport::placeholder(mode, "Angle: legs must not be zero length");
    }
    let cross = leg_a.cross(leg_b);
    let dot = leg_a.dot(leg_b);
    let radians = cross.abs().atan2(dot);
    let degrees = radians.to_degrees();
    let reflex_degrees = 360.0 - degrees;
    let arc = AngleArc {
        vertex: *vertex,
        radius: ANGLE_ARC_RADIUS_FACTOR * len_a.min(len_b),
        start_angle: leg_a.angle(),
        sweep: cross.atan2(dot),
    };
    MeasurementReport {
        mode,
        has_data: true,
        label: format!("Angle: {degrees:.2}° (reflex {reflex_degrees:.2}°)"),
        detail: Some(ReportDetail::Angle(AngleReport {
            radians,
            degrees,
            reflex_degrees,
            arc,
        })),
    }
}
