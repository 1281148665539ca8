pub mod geometry {
    use std::f64::consts::{PI, TAU};

    use glam::DVec2;
    use serde::{Deserialize, Serialize};

    /// 二维点，内部以 `glam::DVec2` 表示。世界坐标与屏幕坐标共用此类型。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Point2(pub DVec2);

    impl Point2 {
        pub const ORIGIN: Point2 = Point2(DVec2::ZERO);

        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn from_vec(vec: DVec2) -> Self {
            Self(vec)
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn translate(self, offset: Vector2) -> Self {
            Self(self.0 + offset.0)
        }

        #[inline]
        pub fn vector_to(self, other: Point2) -> Vector2 {
            Vector2(other.0 - self.0)
        }

        #[inline]
        pub fn distance(self, other: Point2) -> f64 {
            self.0.distance(other.0)
        }

        #[inline]
        pub fn distance_squared(self, other: Point2) -> f64 {
            self.0.distance_squared(other.0)
        }

        #[inline]
        pub fn midpoint(self, other: Point2) -> Point2 {
            Self((self.0 + other.0) * 0.5)
        }

        #[inline]
        pub fn is_finite(self) -> bool {
            self.0.is_finite()
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }
    }

    impl From<DVec2> for Point2 {
        fn from(value: DVec2) -> Self {
            Self::from_vec(value)
        }
    }

    /// 二维向量。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Vector2(pub DVec2);

    impl Vector2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn from_points(start: Point2, end: Point2) -> Self {
            Self(end.0 - start.0)
        }

        #[inline]
        pub fn length(self) -> f64 {
            self.0.length()
        }

        #[inline]
        pub fn length_squared(self) -> f64 {
            self.0.length_squared()
        }

        #[inline]
        pub fn dot(self, other: Vector2) -> f64 {
            self.0.dot(other.0)
        }

        /// 二维叉积（z 分量），逆时针为正。
        #[inline]
        pub fn cross(self, other: Vector2) -> f64 {
            self.0.perp_dot(other.0)
        }

        /// 逆时针旋转 `angle` 弧度。
        #[inline]
        pub fn rotate(self, angle: f64) -> Vector2 {
            let (sin, cos) = angle.sin_cos();
            Self::new(
                cos * self.0.x - sin * self.0.y,
                sin * self.0.x + cos * self.0.y,
            )
        }

        #[inline]
        pub fn scale(self, factor: f64) -> Vector2 {
            Self(self.0 * factor)
        }

        #[inline]
        pub fn angle(self) -> f64 {
            self.0.y.atan2(self.0.x)
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }
    }

    impl From<DVec2> for Vector2 {
        fn from(value: DVec2) -> Self {
            Self(value)
        }
    }

    /// 世界坐标下的轴对齐边界框，用于自动适配视图。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Bounds2D {
        min: Point2,
        max: Point2,
    }

    impl Bounds2D {
        #[inline]
        pub fn new(min: Point2, max: Point2) -> Self {
            Self { min, max }
        }

        #[inline]
        pub fn empty() -> Self {
            Self {
                min: Point2::new(f64::INFINITY, f64::INFINITY),
                max: Point2::new(f64::NEG_INFINITY, f64::NEG_INFINITY),
            }
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.min.x() > self.max.x() || self.min.y() > self.max.y()
        }

        #[inline]
        pub fn min(&self) -> Point2 {
            self.min
        }

        #[inline]
        pub fn max(&self) -> Point2 {
            self.max
        }

        #[inline]
        pub fn width(&self) -> f64 {
            if self.is_empty() {
                0.0
            } else {
                self.max.x() - self.min.x()
            }
        }

        #[inline]
        pub fn height(&self) -> f64 {
            if self.is_empty() {
                0.0
            } else {
                self.max.y() - self.min.y()
            }
        }

        pub fn include_point(&mut self, point: Point2) {
            if !point.is_finite() {
                return;
            }
            if self.is_empty() {
                self.min = point;
                self.max = point;
                return;
            }
            let min_vec = self.min.as_vec2().min(point.as_vec2());
            let max_vec = self.max.as_vec2().max(point.as_vec2());
            self.min = Point2::from_vec(min_vec);
            self.max = Point2::from_vec(max_vec);
        }

        pub fn include_bounds(&mut self, other: &Bounds2D) {
            if other.is_empty() {
                return;
            }
            self.include_point(other.min);
            self.include_point(other.max);
        }

        #[inline]
        pub fn center(&self) -> Point2 {
            debug_assert!(!self.is_empty());
            self.min.midpoint(self.max)
        }
    }

    impl Default for Bounds2D {
        fn default() -> Self {
            Self::empty()
        }
    }

    /// 屏幕坐标（CSS 像素）下的矩形。Y 轴向下。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ScreenRect {
        pub min_x: f64,
        pub min_y: f64,
        pub max_x: f64,
        pub max_y: f64,
    }

    impl ScreenRect {
        #[inline]
        pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
            Self {
                min_x,
                min_y,
                max_x,
                max_y,
            }
        }

        /// 由任意两个角点构造规范化矩形。
        pub fn from_corners(a: Point2, b: Point2) -> Self {
            Self {
                min_x: a.x().min(b.x()),
                min_y: a.y().min(b.y()),
                max_x: a.x().max(b.x()),
                max_y: a.y().max(b.y()),
            }
        }

        /// 包住所有点的最小矩形，点集为空时返回 `None`。
        pub fn enclosing<I>(points: I) -> Option<Self>
        where
            I: IntoIterator<Item = Point2>,
        {
            let mut iter = points.into_iter().filter(|p| p.is_finite());
            let first = iter.next()?;
            let mut rect = Self::from_corners(first, first);
            for point in iter {
                rect.min_x = rect.min_x.min(point.x());
                rect.min_y = rect.min_y.min(point.y());
                rect.max_x = rect.max_x.max(point.x());
                rect.max_y = rect.max_y.max(point.y());
            }
            Some(rect)
        }

        #[inline]
        pub fn width(&self) -> f64 {
            self.max_x - self.min_x
        }

        #[inline]
        pub fn height(&self) -> f64 {
            self.max_y - self.min_y
        }

        #[inline]
        pub fn area(&self) -> f64 {
            self.width().max(0.0) * self.height().max(0.0)
        }

        #[inline]
        pub fn center(&self) -> Point2 {
            Point2::new(
                (self.min_x + self.max_x) * 0.5,
                (self.min_y + self.max_y) * 0.5,
            )
        }

        #[inline]
        pub fn expand(&self, margin: f64) -> Self {
            Self {
                min_x: self.min_x - margin,
                min_y: self.min_y - margin,
                max_x: self.max_x + margin,
                max_y: self.max_y + margin,
            }
        }

        #[inline]
        pub fn contains_point(&self, point: Point2) -> bool {
            point.x() >= self.min_x
                && point.x() <= self.max_x
                && point.y() >= self.min_y
                && point.y() <= self.max_y
        }

        /// `other` 是否完全落在当前矩形内（边界相接视为包含）。
        #[inline]
        pub fn contains_rect(&self, other: &ScreenRect) -> bool {
            other.min_x >= self.min_x
                && other.max_x <= self.max_x
                && other.min_y >= self.min_y
                && other.max_y <= self.max_y
        }

        #[inline]
        pub fn intersects(&self, other: &ScreenRect) -> bool {
            self.min_x <= other.max_x
                && self.max_x >= other.min_x
                && self.min_y <= other.max_y
                && self.max_y >= other.min_y
        }

        /// 四个角点，顺序为左上、右上、右下、左下。
        pub fn corners(&self) -> [Point2; 4] {
            [
                Point2::new(self.min_x, self.min_y),
                Point2::new(self.max_x, self.min_y),
                Point2::new(self.max_x, self.max_y),
                Point2::new(self.min_x, self.max_y),
            ]
        }
    }

    /// 将角度规范化到 `(-π, π]`，非有限值退化为 0。
    pub fn normalize_angle(angle: f64) -> f64 {
        if !angle.is_finite() {
            return 0.0;
        }
        let wrapped = angle.rem_euclid(TAU);
        if wrapped > PI { wrapped - TAU } else { wrapped }
    }
}

/// 平面几何算法：线段相交、点在多边形内、外接圆心估计与鞋带公式。
pub mod planar {
    use crate::geometry::{Point2, ScreenRect, Vector2};

    const ORIENTATION_EPSILON: f64 = 1e-12;
    const COLLINEAR_EPSILON: f64 = 1e-9;
    const DISTINCT_EPSILON: f64 = 1e-9;

    /// 三点走向：`> 0` 逆时针，`< 0` 顺时针，`0` 共线。
    #[inline]
    pub fn orientation(a: Point2, b: Point2, c: Point2) -> f64 {
        a.vector_to(b).cross(a.vector_to(c))
    }

    fn orientation_sign(a: Point2, b: Point2, c: Point2) -> i8 {
        let value = orientation(a, b, c);
        let scale = a.vector_to(b).length() * a.vector_to(c).length();
        if value.abs() <= ORIENTATION_EPSILON * scale.max(1.0) {
            0
        } else if value > 0.0 {
            1
        } else {
            -1
        }
    }

    /// 已知 `p` 与 `a`、`b` 共线时，判断 `p` 是否落在线段 `ab` 上。
    #[inline]
    pub fn on_segment(a: Point2, b: Point2, p: Point2) -> bool {
        p.x() >= a.x().min(b.x())
            && p.x() <= a.x().max(b.x())
            && p.y() >= a.y().min(b.y())
            && p.y() <= a.y().max(b.y())
    }

    /// 线段 `p1p2` 与 `q1q2` 是否相交（端点接触与共线重叠都算相交）。
    pub fn segments_intersect(p1: Point2, p2: Point2, q1: Point2, q2: Point2) -> bool {
        let o1 = orientation_sign(p1, p2, q1);
        let o2 = orientation_sign(p1, p2, q2);
        let o3 = orientation_sign(q1, q2, p1);
        let o4 = orientation_sign(q1, q2, p2);

        if o1 != o2 && o3 != o4 {
            return true;
        }

        (o1 == 0 && on_segment(p1, p2, q1))
            || (o2 == 0 && on_segment(p1, p2, q2))
            || (o3 == 0 && on_segment(q1, q2, p1))
            || (o4 == 0 && on_segment(q1, q2, p2))
    }

    /// 射线法判断点是否在多边形内，多边形隐式闭合；少于 3 个顶点时恒为 `false`。
    pub fn point_in_polygon(point: Point2, polygon: &[Point2]) -> bool {
        if polygon.len() < 3 {
            return false;
        }
        let mut inside = false;
        let mut j = polygon.len() - 1;
        for i in 0..polygon.len() {
            let pi = polygon[i];
            let pj = polygon[j];
            if (pi.y() > point.y()) != (pj.y() > point.y()) {
                let cross_x = (pj.x() - pi.x()) * (point.y() - pi.y()) / (pj.y() - pi.y()) + pi.x();
                if point.x() < cross_x {
                    inside = !inside;
                }
            }
            j = i;
        }
        inside
    }

    /// 矩形的任意一条边是否与闭合多边形的某条边相交。
    pub fn rect_crosses_polygon(rect: &ScreenRect, polygon: &[Point2]) -> bool {
        if polygon.len() < 2 {
            return false;
        }
        let corners = rect.corners();
        let rect_edges = (0..4).map(|i| (corners[i], corners[(i + 1) % 4]));
        for (r1, r2) in rect_edges {
            for i in 0..polygon.len() {
                let a = polygon[i];
                let b = polygon[(i + 1) % polygon.len()];
                if segments_intersect(r1, r2, a, b) {
                    return true;
                }
            }
        }
        false
    }

    /// 三点外接圆圆心；三点共线或重合时返回 `None`。
    pub fn circumcenter(a: Point2, b: Point2, c: Point2) -> Option<Point2> {
        let ab = a.vector_to(b);
        let ac = a.vector_to(c);
        let denominator = 2.0 * ab.cross(ac);
        if denominator.abs() <= COLLINEAR_EPSILON * ab.length() * ac.length()
            || denominator == 0.0
        {
            return None;
        }
        let ab_sq = ab.length_squared();
        let ac_sq = ac.length_squared();
        let offset = Vector2::new(
            (ac.y() * ab_sq - ab.y() * ac_sq) / denominator,
            (ab.x() * ac_sq - ac.x() * ab_sq) / denominator,
        );
        let center = a.translate(offset);
        center.is_finite().then_some(center)
    }

    /// 采样点上的圆心估计：取第一个点、第一个与其不同的点，
    /// 再取其后第一个与前两点不共线的点，求外接圆心。
    pub fn estimate_circle_center(points: &[Point2]) -> Option<Point2> {
        let first = *points.first()?;
        let (second_index, second) = points
            .iter()
            .enumerate()
            .skip(1)
            .find(|(_, p)| p.distance(first) > DISTINCT_EPSILON)
            .map(|(i, p)| (i, *p))?;
        let chord = first.vector_to(second);
        let third = points.iter().skip(second_index + 1).find(|p| {
            let candidate = first.vector_to(**p);
            candidate.length() > DISTINCT_EPSILON
                && p.distance(second) > DISTINCT_EPSILON
                && chord.cross(candidate).abs()
                    > COLLINEAR_EPSILON * chord.length() * candidate.length()
        })?;
        circumcenter(first, second, *third)
    }

    /// 鞋带公式求有向面积（逆时针为正），多边形隐式闭合。
    pub fn signed_area(points: &[Point2]) -> f64 {
        if points.len() < 3 {
            return 0.0;
        }
        let mut twice = 0.0;
        for i in 0..points.len() {
            let a = points[i];
            let b = points[(i + 1) % points.len()];
            twice += a.x() * b.y() - b.x() * a.y();
        }
        twice * 0.5
    }

    #[inline]
    pub fn polygon_area(points: &[Point2]) -> f64 {
        signed_area(points).abs()
    }

    /// 折线长度；`closed` 为真时包含最后一点回到起点的闭合边。
    pub fn path_length(points: &[Point2], closed: bool) -> f64 {
        let open: f64 = points.windows(2).map(|pair| pair[0].distance(pair[1])).sum();
        match (closed, points.first(), points.last()) {
            (true, Some(first), Some(last)) if points.len() > 2 => open + last.distance(*first),
            _ => open,
        }
    }

    /// 多边形质心；有向面积近似为 0（例如共线点）时退化为顶点算术平均。
    pub fn polygon_centroid(points: &[Point2]) -> Option<Point2> {
        if points.is_empty() {
            return None;
        }
        let area = signed_area(points);
        let extent = ScreenRect::enclosing(points.iter().copied())
            .map(|rect| rect.width().max(rect.height()))
            .unwrap_or(0.0);
        if points.len() >= 3 && area.abs() > 1e-12 * extent * extent && area != 0.0 {
            let mut cx = 0.0;
            let mut cy = 0.0;
            for i in 0..points.len() {
                let a = points[i];
                let b = points[(i + 1) % points.len()];
                let cross = a.x() * b.y() - b.x() * a.y();
                cx += (a.x() + b.x()) * cross;
                cy += (a.y() + b.y()) * cross;
            }
            let factor = 1.0 / (6.0 * area);
            return Some(Point2::new(cx * factor, cy * factor));
        }
        let count = points.len() as f64;
        let sum = points
            .iter()
            .fold(glam::DVec2::ZERO, |acc, p| acc + p.as_vec2());
        Some(Point2::from_vec(sum / count))
    }
}

pub mod scene {
    use std::collections::{BTreeMap, BTreeSet};
    use std::fmt;

    use serde::{Deserialize, Serialize};

    use crate::geometry::{Point2, Vector2};

    /// 实体句柄。DXF 句柄大小写不敏感，构造时统一转为大写。
    #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
    #[serde(from = "String", into = "String")]
    pub struct Handle(String);

    impl Handle {
        pub fn new(raw: impl AsRef<str>) -> Self {
            Self(raw.as_ref().trim().to_ascii_uppercase())
        }

        #[inline]
        pub fn as_str(&self) -> &str {
            &self.0
        }
    }

    impl From<String> for Handle {
        fn from(value: String) -> Self {
            Self::new(value)
        }
    }

    impl From<&str> for Handle {
        fn from(value: &str) -> Self {
            Self::new(value)
        }
    }

    impl From<Handle> for String {
        fn from(value: Handle) -> Self {
            value.0
        }
    }

    impl fmt::Display for Handle {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(&self.0)
        }
    }

    /// 图层键：图层名去空白后转大写，与 DXF 的图层名比较规则一致。
    #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
    #[serde(from = "String", into = "String")]
    pub struct LayerKey(String);

    impl LayerKey {
        pub fn new(name: impl AsRef<str>) -> Self {
            Self(name.as_ref().trim().to_uppercase())
        }

        #[inline]
        pub fn as_str(&self) -> &str {
            &self.0
        }
    }

    impl From<String> for LayerKey {
        fn from(value: String) -> Self {
            Self::new(value)
        }
    }

    impl From<&str> for LayerKey {
        fn from(value: &str) -> Self {
            Self::new(value)
        }
    }

    impl From<LayerKey> for String {
        fn from(value: LayerKey) -> Self {
            value.0
        }
    }

    impl fmt::Display for LayerKey {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(&self.0)
        }
    }

    /// 图层表中的一条记录（基础元数据，不含用户覆盖）。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct LayerRecord {
        pub name: String,
        #[serde(default = "default_true")]
        pub is_on: bool,
        #[serde(default)]
        pub is_frozen: bool,
        #[serde(default)]
        pub is_locked: bool,
        /// 不透明度，1.0 为完全不透明。
        #[serde(default = "default_alpha")]
        pub transparency_alpha: f64,
        /// ACI 颜色号。
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub color: Option<u16>,
    }

    fn default_true() -> bool {
        true
    }

    fn default_alpha() -> f64 {
        1.0
    }

    impl LayerRecord {
        pub fn new(name: impl Into<String>) -> Self {
            Self {
                name: name.into(),
                is_on: true,
                is_frozen: false,
                is_locked: false,
                transparency_alpha: 1.0,
                color: None,
            }
        }

        #[inline]
        pub fn key(&self) -> LayerKey {
            LayerKey::new(&self.name)
        }
    }

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    pub struct SceneTables {
        #[serde(default)]
        pub layers: Vec<LayerRecord>,
    }

    impl SceneTables {
        pub fn layer(&self, key: &LayerKey) -> Option<&LayerRecord> {
            self.layers.iter().find(|layer| &layer.key() == key)
        }
    }

    /// 块参照附带的属性文字。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Attribute {
        pub handle: Handle,
        pub tag: String,
        pub text: String,
        pub insert: Point2,
        #[serde(default = "default_text_height")]
        pub height: f64,
        #[serde(default)]
        pub is_invisible: bool,
    }

    fn default_text_height() -> f64 {
        2.5
    }

    fn default_insert_scale() -> Vector2 {
        Vector2::new(1.0, 1.0)
    }

    /// 场景中实体的几何形态，角度均为弧度、逆时针。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
    pub enum EntityKind {
        Point {
            position: Point2,
        },
        Line {
            start: Point2,
            end: Point2,
        },
        Circle {
            center: Point2,
            radius: f64,
        },
        Arc {
            center: Point2,
            radius: f64,
            start_angle: f64,
            end_angle: f64,
        },
        Polyline {
            vertices: Vec<Point2>,
            #[serde(default)]
            closed: bool,
        },
        Hatch {
            boundary: Vec<Point2>,
        },
        Solid {
            corners: Vec<Point2>,
        },
        Text {
            insert: Point2,
            content: String,
            #[serde(default = "default_text_height")]
            height: f64,
        },
        Insert {
            block: String,
            insert: Point2,
            #[serde(default = "default_insert_scale")]
            scale: Vector2,
            #[serde(default)]
            rotation: f64,
            #[serde(default)]
            attributes: Vec<Attribute>,
        },
    }

    impl EntityKind {
        pub fn entity_type(&self) -> EntityType {
            match self {
                EntityKind::Point { .. } => EntityType::Point,
                EntityKind::Line { .. } => EntityType::Line,
                EntityKind::Circle { .. } => EntityType::Circle,
                EntityKind::Arc { .. } => EntityType::Arc,
                EntityKind::Polyline { .. } => EntityType::Polyline,
                EntityKind::Hatch { .. } => EntityType::Hatch,
                EntityKind::Solid { .. } => EntityType::Solid,
                EntityKind::Text { .. } => EntityType::Text,
                EntityKind::Insert { .. } => EntityType::Insert,
            }
        }
    }

    /// 可拾取图元的类型标签。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
    pub enum EntityType {
        Point,
        Line,
        Circle,
        Arc,
        Polyline,
        Hatch,
        Solid,
        Text,
        Insert,
        Attribute,
    }

    impl EntityType {
        pub fn as_str(self) -> &'static str {
            match self {
                EntityType::Point => "POINT",
                EntityType::Line => "LINE",
                EntityType::Circle => "CIRCLE",
                EntityType::Arc => "ARC",
                EntityType::Polyline => "LWPOLYLINE",
                EntityType::Hatch => "HATCH",
                EntityType::Solid => "SOLID",
                EntityType::Text => "TEXT",
                EntityType::Insert => "INSERT",
                EntityType::Attribute => "ATTRIB",
            }
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct SceneEntity {
        pub handle: Handle,
        pub layer: String,
        /// 线宽（屏幕像素），缺省为 1。
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub lineweight: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub color: Option<u16>,
        #[serde(flatten)]
        pub kind: EntityKind,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct BlockDefinition {
        pub name: String,
        #[serde(default = "origin")]
        pub base_point: Point2,
        #[serde(default)]
        pub entities: Vec<SceneEntity>,
    }

    fn origin() -> Point2 {
        Point2::ORIGIN
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct PaperSpace {
        pub name: String,
        #[serde(default)]
        pub entities: Vec<SceneEntity>,
    }

    /// 图纸级属性（对应 HEADER 段中与视口相关的变量）。
    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    pub struct DrawingProperties {
        /// `$INSUNITS` 单位代码。
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub insunits: Option<i16>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub acad_version: Option<String>,
    }

    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
    pub struct SceneStats {
        pub entity_count: usize,
        pub layer_count: usize,
        pub block_count: usize,
        pub paper_space_count: usize,
    }

    /// 解析后的图纸场景图，由外部解析器产出，视口引擎只读。
    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    pub struct SceneGraph {
        #[serde(default)]
        pub model_space: Vec<SceneEntity>,
        #[serde(default)]
        pub paper_spaces: Vec<PaperSpace>,
        #[serde(default)]
        pub blocks: BTreeMap<String, BlockDefinition>,
        #[serde(default)]
        pub tables: SceneTables,
        #[serde(default)]
        pub drawing_properties: DrawingProperties,
        #[serde(skip)]
        next_handle: u64,
    }

    impl SceneGraph {
        pub fn new() -> Self {
            let mut scene = Self::default();
            scene.ensure_layer("0");
            scene
        }

        pub fn ensure_layer(&mut self, name: impl AsRef<str>) {
            let key = LayerKey::new(name.as_ref());
            if self.tables.layer(&key).is_none() {
                self.tables.layers.push(LayerRecord::new(name.as_ref()));
            }
        }

        pub fn layer(&self, name: &str) -> Option<&LayerRecord> {
            self.tables.layer(&LayerKey::new(name))
        }

        /// 图层表中的图层，加上实体引用但未登记在表中的图层。按键去重，图层表优先。
        pub fn layer_names(&self) -> Vec<String> {
            let mut seen = BTreeSet::new();
            let mut names = Vec::new();
            let table_names = self.tables.layers.iter().map(|layer| layer.name.as_str());
            let entity_names = self
                .model_space
                .iter()
                .chain(self.paper_spaces.iter().flat_map(|space| &space.entities))
                .chain(self.blocks.values().flat_map(|block| &block.entities))
                .map(|entity| entity.layer.as_str());
            for name in table_names.chain(entity_names) {
                if seen.insert(LayerKey::new(name)) {
                    names.push(name.to_string());
                }
            }
            names
        }

        pub fn stats(&self) -> SceneStats {
            SceneStats {
                entity_count: self.model_space.len()
                    + self
                        .paper_spaces
                        .iter()
                        .map(|space| space.entities.len())
                        .sum::<usize>(),
                layer_count: self.tables.layers.len(),
                block_count: self.blocks.len(),
                paper_space_count: self.paper_spaces.len(),
            }
        }

        pub fn block(&self, name: &str) -> Option<&BlockDefinition> {
            self.blocks.get(name)
        }

        pub fn add_block_definition(&mut self, definition: BlockDefinition) {
            self.blocks.insert(definition.name.clone(), definition);
        }

        /// 生成下一个未占用的十六进制句柄。
        pub fn next_handle(&mut self) -> Handle {
            loop {
                self.next_handle += 1;
                let candidate = Handle::new(format!("{:X}", self.next_handle + 0x1F));
                if !self.model_space.iter().any(|e| e.handle == candidate) {
                    return candidate;
                }
            }
        }

        /// 追加模型空间实体并返回其句柄。
        pub fn add_entity(&mut self, layer: impl Into<String>, kind: EntityKind) -> Handle {
            let layer = layer.into();
            self.ensure_layer(&layer);
            let handle = self.next_handle();
            self.model_space.push(SceneEntity {
                handle: handle.clone(),
                layer,
                lineweight: None,
                color: None,
                kind,
            });
            handle
        }

        pub fn add_point(&mut self, position: Point2, layer: impl Into<String>) -> Handle {
            self.add_entity(layer, EntityKind::Point { position })
        }

        pub fn add_line(&mut self, start: Point2, end: Point2, layer: impl Into<String>) -> Handle {
            self.add_entity(layer, EntityKind::Line { start, end })
        }

        pub fn add_circle(
            &mut self,
            center: Point2,
            radius: f64,
            layer: impl Into<String>,
        ) -> Handle {
            self.add_entity(
                layer,
                EntityKind::Circle {
                    center,
                    radius: radius.abs(),
                },
            )
        }

        pub fn add_arc(
            &mut self,
            center: Point2,
            radius: f64,
            start_angle: f64,
            end_angle: f64,
            layer: impl Into<String>,
        ) -> Handle {
            self.add_entity(
                layer,
                EntityKind::Arc {
                    center,
                    radius: radius.abs(),
                    start_angle,
                    end_angle,
                },
            )
        }

        pub fn add_polyline<I>(&mut self, vertices: I, closed: bool, layer: impl Into<String>) -> Handle
        where
            I: IntoIterator<Item = Point2>,
        {
            self.add_entity(
                layer,
                EntityKind::Polyline {
                    vertices: vertices.into_iter().collect(),
                    closed,
                },
            )
        }

        pub fn add_hatch<I>(&mut self, boundary: I, layer: impl Into<String>) -> Handle
        where
            I: IntoIterator<Item = Point2>,
        {
            self.add_entity(
                layer,
                EntityKind::Hatch {
                    boundary: boundary.into_iter().collect(),
                },
            )
        }

        pub fn add_text(
            &mut self,
            insert: Point2,
            content: impl Into<String>,
            height: f64,
            layer: impl Into<String>,
        ) -> Handle {
            self.add_entity(
                layer,
                EntityKind::Text {
                    insert,
                    content: content.into(),
                    height,
                },
            )
        }

        pub fn add_insert(
            &mut self,
            block: impl Into<String>,
            insert: Point2,
            scale: Vector2,
            rotation: f64,
            attributes: Vec<Attribute>,
            layer: impl Into<String>,
        ) -> Handle {
            self.add_entity(
                layer,
                EntityKind::Insert {
                    block: block.into(),
                    insert,
                    scale,
                    rotation,
                    attributes,
                },
            )
        }

        pub fn entity(&self, handle: &Handle) -> Option<&SceneEntity> {
            self.model_space.iter().find(|entity| &entity.handle == handle)
        }
    }
}

pub mod view {
    use serde::{Deserialize, Serialize};

    use crate::geometry::{Point2, normalize_angle};

    pub const MIN_VIEW_SCALE: f64 = 1e-9;
    pub const MAX_VIEW_SCALE: f64 = 1e12;

    /// 将缩放限制在合法范围内，非有限或非正值返回 `None`。
    #[inline]
    pub fn clamp_scale(scale: f64) -> Option<f64> {
        (scale.is_finite() && scale > 0.0).then(|| scale.clamp(MIN_VIEW_SCALE, MAX_VIEW_SCALE))
    }

    /// 显式视图参数：世界中心、缩放（像素/世界单位）与平面旋转角。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ViewParams {
        pub center: Point2,
        pub scale: f64,
        pub rotation_rad: f64,
    }

    impl ViewParams {
        /// 构造时即规范化：缩放被夹取，旋转落在 `(-π, π]`。
        pub fn new(center: Point2, scale: f64, rotation_rad: f64) -> Self {
            Self {
                center,
                scale: clamp_scale(scale).unwrap_or(1.0),
                rotation_rad: normalize_angle(rotation_rad),
            }
        }

        /// 数值近似相等：缩放按相对误差比较，中心按屏幕像素比较。
        pub fn approx_eq(&self, other: &ViewParams, epsilon: f64) -> bool {
            let scale_ref = self.scale.abs().max(other.scale.abs());
            if (self.scale - other.scale).abs() > epsilon * scale_ref {
                return false;
            }
            if self.center.distance(other.center) * scale_ref > epsilon {
                return false;
            }
            (normalize_angle(self.rotation_rad - other.rotation_rad)).abs() <= epsilon
        }
    }

    /// 视图状态。`Auto` 表示由渲染器自动适配，不携带任何参数。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    #[serde(tag = "mode", rename_all = "lowercase")]
    pub enum ViewState {
        Auto,
        Custom(ViewParams),
    }

    impl ViewState {
        #[inline]
        pub fn is_auto(&self) -> bool {
            matches!(self, ViewState::Auto)
        }

        #[inline]
        pub fn params(&self) -> Option<ViewParams> {
            match self {
                ViewState::Auto => None,
                ViewState::Custom(params) => Some(*params),
            }
        }

        pub fn approx_eq(&self, other: &ViewState, epsilon: f64) -> bool {
            match (self, other) {
                (ViewState::Auto, ViewState::Auto) => true,
                (ViewState::Custom(a), ViewState::Custom(b)) => a.approx_eq(b, epsilon),
                _ => false,
            }
        }
    }

    impl Default for ViewState {
        fn default() -> Self {
            ViewState::Auto
        }
    }

    /// 部分视图请求，缺失字段由当前视图补齐。
    #[derive(Debug, Clone, Copy, Default, PartialEq)]
    pub struct ViewPatch {
        pub center: Option<Point2>,
        pub scale: Option<f64>,
        pub rotation_rad: Option<f64>,
    }

    impl ViewPatch {
        /// 以 `base` 补齐缺失字段并规范化。
        pub fn resolve(&self, base: ViewParams) -> ViewParams {
            let center = self
                .center
                .filter(|center| center.is_finite())
                .unwrap_or(base.center);
            let scale = self.scale.and_then(clamp_scale).unwrap_or(base.scale);
            let rotation = self
                .rotation_rad
                .filter(|rotation| rotation.is_finite())
                .unwrap_or(base.rotation_rad);
            ViewParams::new(center, scale, rotation)
        }
    }

    impl From<ViewParams> for ViewPatch {
        fn from(params: ViewParams) -> Self {
            Self {
                center: Some(params.center),
                scale: Some(params.scale),
                rotation_rad: Some(params.rotation_rad),
            }
        }
    }
}

pub mod frame {
    use serde::{Deserialize, Serialize};

    use crate::geometry::{Point2, ScreenRect};
    use crate::scene::{EntityType, Handle};
    use crate::view::ViewParams;

    /// 一个可拾取图元：屏幕包围盒加世界坐标采样点。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Pickable {
        pub handle: Handle,
        pub layer: String,
        pub entity_type: EntityType,
        pub is_closed: bool,
        pub world_points: Vec<Point2>,
        pub screen_bounds: ScreenRect,
        pub weight: f64,
    }

    /// 已投影到屏幕的文字片段（文字或块属性）。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct TextRun {
        pub handle: Handle,
        pub content: String,
        pub screen: Point2,
        pub screen_bounds: ScreenRect,
        pub height_px: f64,
        pub alpha: f64,
        pub is_attribute: bool,
    }

    /// 渲染一次场景图得到的不可变快照。`version` 单调递增，用于缓存失效判断。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Frame {
        pub version: u64,
        pub width: f64,
        pub height: f64,
        pub device_pixel_ratio: f64,
        pub scale: f64,
        pub world_center: Point2,
        pub rotation_rad: f64,
        pub pickables: Vec<Pickable>,
        pub texts: Vec<TextRun>,
        pub is_empty: bool,
    }

    impl Frame {
        /// 帧实际使用的视图参数。
        #[inline]
        pub fn view(&self) -> ViewParams {
            ViewParams::new(self.world_center, self.scale, self.rotation_rad)
        }

        #[inline]
        pub fn viewport_center(&self) -> Point2 {
            Point2::new(self.width * 0.5, self.height * 0.5)
        }

        pub fn pickable(&self, handle: &Handle) -> Option<&Pickable> {
            self.pickables.iter().find(|p| &p.handle == handle)
        }
    }
}
