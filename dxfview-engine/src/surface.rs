//! 渲染面与文档来源的接口，以及一个不依赖 GPU 的软件参考实现。

use std::collections::{BTreeMap, BTreeSet};
use std::f64::consts::TAU;

use dxfview_core::frame::{Frame, Pickable, TextRun};
use dxfview_core::geometry::{Bounds2D, Point2, ScreenRect, Vector2};
use dxfview_core::scene::{
    Attribute, BlockDefinition, EntityKind, EntityType, Handle, LayerKey, SceneEntity, SceneGraph,
};
use dxfview_core::view::{ViewParams, ViewState};
use tracing::{debug, trace};

use crate::isolation::{EffectiveLayerState, LayerStateMap};
use crate::navigation::TabId;
use crate::transform::FrameTransform;

const CIRCLE_SEGMENTS: usize = 64;
const AUTO_FIT_MARGIN: f64 = 0.9;
const TEXT_WIDTH_FACTOR: f64 = 0.6;

/// 块属性的显示模式，对应 `ATTMODE`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AttributeDisplay {
    Hidden,
    #[default]
    Normal,
    All,
}

/// 渲染面：把场景图按给定视图渲染成 [`Frame`]。调用是同步的。
pub trait RenderingSurface {
    /// 渲染失败或渲染面暂停时返回 `None`。
    fn render_scene(&mut self, scene: &SceneGraph, view: &ViewState) -> Option<Frame>;
    fn resize(&mut self, width: f64, height: f64, device_pixel_ratio: f64);
    fn set_layer_state(&mut self, state: Option<&LayerStateMap>);
    fn set_selection_handles(&mut self, handles: &BTreeSet<Handle>);
    fn set_block_isolation(&mut self, blocks: Option<&BTreeSet<String>>);
    fn set_entity_isolation(&mut self, handles: Option<&BTreeSet<Handle>>);
    fn set_attribute_display(&mut self, flags: AttributeDisplay);
    fn suspend(&mut self);
    fn resume(&mut self);
}

/// 文档来源：按标签页提供已解析的场景图。
pub trait DocumentProvider {
    fn scene_graph(&self, tab: TabId) -> Option<&SceneGraph>;
}

/// 内存中的文档集合。
#[derive(Debug, Default)]
pub struct InMemoryDocuments {
    tabs: BTreeMap<TabId, SceneGraph>,
}

impl InMemoryDocuments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, tab: TabId, scene: SceneGraph) -> Option<SceneGraph> {
        self.tabs.insert(tab, scene)
    }

    pub fn remove(&mut self, tab: TabId) -> Option<SceneGraph> {
        self.tabs.remove(&tab)
    }

    pub fn tabs(&self) -> impl Iterator<Item = TabId> + '_ {
        self.tabs.keys().copied()
    }
}

impl DocumentProvider for InMemoryDocuments {
    fn scene_graph(&self, tab: TabId) -> Option<&SceneGraph> {
        self.tabs.get(&tab)
    }
}

/// 采样后的实体，尚未投影到屏幕。
#[derive(Debug, Clone)]
struct SampledEntity {
    handle: Handle,
    layer: String,
    entity_type: EntityType,
    is_closed: bool,
    points: Vec<Point2>,
    weight: f64,
}

#[derive(Debug, Clone)]
struct SampledText {
    handle: Handle,
    content: String,
    insert: Point2,
    height: f64,
    alpha: f64,
    is_attribute: bool,
}

/// 软件参考渲染面：采样几何、计算自动适配并生成可拾取图元，不产生像素。
#[derive(Debug)]
pub struct SoftwareSurface {
    width: f64,
    height: f64,
    device_pixel_ratio: f64,
    layer_state: Option<LayerStateMap>,
    selection: BTreeSet<Handle>,
    block_isolation: Option<BTreeSet<String>>,
    entity_isolation: Option<BTreeSet<Handle>>,
    attribute_display: AttributeDisplay,
    suspended: bool,
    last_version: u64,
}

impl SoftwareSurface {
    pub fn new(width: f64, height: f64, device_pixel_ratio: f64) -> Self {
        Self {
            width: width.max(1.0),
            height: height.max(1.0),
            device_pixel_ratio: sanitize_ratio(device_pixel_ratio),
            layer_state: None,
            selection: BTreeSet::new(),
            block_isolation: None,
            entity_isolation: None,
            attribute_display: AttributeDisplay::default(),
            suspended: false,
            last_version: 0,
        }
    }

    #[inline]
    pub fn size(&self) -> (f64, f64, f64) {
        (self.width, self.height, self.device_pixel_ratio)
    }

    #[inline]
    pub fn selection_handles(&self) -> &BTreeSet<Handle> {
        &self.selection
    }

    #[inline]
    pub fn entity_isolation(&self) -> Option<&BTreeSet<Handle>> {
        self.entity_isolation.as_ref()
    }

    #[inline]
    pub fn layer_state(&self) -> Option<&LayerStateMap> {
        self.layer_state.as_ref()
    }

    #[inline]
    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    fn layer_effective(&self, scene: &SceneGraph, layer: &str) -> EffectiveLayerState {
        let key = LayerKey::new(layer);
        if let Some(state) = self.layer_state.as_ref().and_then(|map| map.get(&key)) {
            return *state;
        }
        scene
            .tables
            .layer(&key)
            .map(EffectiveLayerState::from_record)
            .unwrap_or_default()
    }

    fn entity_passes_filters(&self, entity: &SceneEntity) -> bool {
        if let Some(handles) = &self.entity_isolation {
            if !handles.contains(&entity.handle) {
                return false;
            }
        }
        if let Some(blocks) = &self.block_isolation {
            match &entity.kind {
                EntityKind::Insert { block, .. } if blocks.contains(block) => {}
                _ => return false,
            }
        }
        true
    }

    fn sample_scene(&self, scene: &SceneGraph) -> (Vec<SampledEntity>, Vec<SampledText>) {
        let mut entities = Vec::new();
        let mut texts = Vec::new();
        for entity in &scene.model_space {
            if !self.entity_passes_filters(entity) {
                continue;
            }
            let layer_state = self.layer_effective(scene, &entity.layer);
            if !layer_state.is_visible() {
                continue;
            }
            let weight = entity.lineweight.unwrap_or(1.0).max(0.0);
            match &entity.kind {
                EntityKind::Text {
                    insert,
                    content,
                    height,
                } => {
                    entities.push(SampledEntity {
                        handle: entity.handle.clone(),
                        layer: entity.layer.clone(),
                        entity_type: EntityType::Text,
                        is_closed: false,
                        points: text_box(*insert, content, *height),
                        weight,
                    });
                    texts.push(SampledText {
                        handle: entity.handle.clone(),
                        content: content.clone(),
                        insert: *insert,
                        height: *height,
                        alpha: layer_state.transparency_alpha,
                        is_attribute: false,
                    });
                }
                EntityKind::Insert {
                    block,
                    insert,
                    scale,
                    rotation,
                    attributes,
                } => {
                    let placement = BlockPlacement {
                        insert: *insert,
                        scale: *scale,
                        rotation: *rotation,
                    };
                    let mut points = vec![*insert];
                    match scene.block(block) {
                        Some(definition) => {
                            points.extend(sample_block(definition, &placement));
                        }
                        None => {
                            debug!(block = %block, handle = %entity.handle, "块定义缺失，仅保留插入点");
                        }
                    }
                    entities.push(SampledEntity {
                        handle: entity.handle.clone(),
                        layer: entity.layer.clone(),
                        entity_type: EntityType::Insert,
                        is_closed: false,
                        points,
                        weight,
                    });
                    texts.extend(self.sample_attributes(
                        attributes,
                        layer_state.transparency_alpha,
                    ));
                }
                kind => {
                    let (points, is_closed) = sample_kind(kind);
                    if points.is_empty() {
                        continue;
                    }
                    entities.push(SampledEntity {
                        handle: entity.handle.clone(),
                        layer: entity.layer.clone(),
                        entity_type: kind.entity_type(),
                        is_closed,
                        points,
                        weight,
                    });
                }
            }
        }
        (entities, texts)
    }

    fn sample_attributes(&self, attributes: &[Attribute], alpha: f64) -> Vec<SampledText> {
        attributes
            .iter()
            .filter(|attribute| match self.attribute_display {
                AttributeDisplay::Hidden => false,
                AttributeDisplay::Normal => !attribute.is_invisible,
                AttributeDisplay::All => true,
            })
            .map(|attribute| SampledText {
                handle: attribute.handle.clone(),
                content: attribute.text.clone(),
                insert: attribute.insert,
                height: attribute.height,
                alpha,
                is_attribute: true,
            })
            .collect()
    }

    /// 自动适配：让可见几何以 90% 边距充满视口。
    fn auto_fit(&self, entities: &[SampledEntity]) -> Option<ViewParams> {
        let mut bounds = Bounds2D::empty();
        for entity in entities {
            for point in &entity.points {
                bounds.include_point(*point);
            }
        }
        if bounds.is_empty() {
            return None;
        }
        let (w, h) = (bounds.width(), bounds.height());
        let scale = match (w > f64::EPSILON, h > f64::EPSILON) {
            (true, true) => (self.width / w).min(self.height / h),
            (true, false) => self.width / w,
            (false, true) => self.height / h,
            (false, false) => 1.0,
        } * AUTO_FIT_MARGIN;
        Some(ViewParams::new(bounds.center(), scale, 0.0))
    }

    fn next_version(&mut self) -> u64 {
        self.last_version += 1;
        self.last_version
    }
}

impl RenderingSurface for SoftwareSurface {
    fn render_scene(&mut self, scene: &SceneGraph, view: &ViewState) -> Option<Frame> {
        if self.suspended {
            trace!("渲染面已暂停，跳过渲染");
            return None;
        }
        let (entities, texts) = self.sample_scene(scene);
        let fitted = self.auto_fit(&entities);
        let is_empty = fitted.is_none();
        let params = match view {
            ViewState::Custom(params) => *params,
            ViewState::Auto => fitted.unwrap_or_else(|| ViewParams::new(Point2::ORIGIN, 1.0, 0.0)),
        };
        let transform = FrameTransform::new(params, self.width, self.height)?;

        let pickables: Vec<Pickable> = entities
            .into_iter()
            .filter_map(|entity| {
                let screen_bounds = ScreenRect::enclosing(
                    entity.points.iter().map(|p| transform.world_to_screen(*p)),
                )?;
                Some(Pickable {
                    handle: entity.handle,
                    layer: entity.layer,
                    entity_type: entity.entity_type,
                    is_closed: entity.is_closed,
                    world_points: entity.points,
                    screen_bounds,
                    weight: entity.weight,
                })
            })
            .collect();

        let texts: Vec<TextRun> = texts
            .into_iter()
            .map(|text| {
                let screen = transform.world_to_screen(text.insert);
                let height_px = text.height * params.scale;
                let width_px = text_width(&text.content, text.height) * params.scale;
                TextRun {
                    handle: text.handle,
                    screen_bounds: ScreenRect::new(
                        screen.x(),
                        screen.y() - height_px,
                        screen.x() + width_px,
                        screen.y(),
                    ),
                    content: text.content,
                    screen,
                    height_px,
                    alpha: text.alpha,
                    is_attribute: text.is_attribute,
                }
            })
            .collect();

        let version = self.next_version();
        debug!(
            version,
            pickables = pickables.len(),
            texts = texts.len(),
            scale = params.scale,
            "软件渲染面生成新帧"
        );
        Some(Frame {
            version,
            width: self.width,
            height: self.height,
            device_pixel_ratio: self.device_pixel_ratio,
            scale: params.scale,
            world_center: params.center,
            rotation_rad: params.rotation_rad,
            pickables,
            texts,
            is_empty,
        })
    }

    fn resize(&mut self, width: f64, height: f64, device_pixel_ratio: f64) {
        self.width = width.max(1.0);
        self.height = height.max(1.0);
        self.device_pixel_ratio = sanitize_ratio(device_pixel_ratio);
    }

    fn set_layer_state(&mut self, state: Option<&LayerStateMap>) {
        self.layer_state = state.cloned();
    }

    fn set_selection_handles(&mut self, handles: &BTreeSet<Handle>) {
        self.selection = handles.clone();
    }

    fn set_block_isolation(&mut self, blocks: Option<&BTreeSet<String>>) {
        self.block_isolation = blocks.cloned();
    }

    fn set_entity_isolation(&mut self, handles: Option<&BTreeSet<Handle>>) {
        self.entity_isolation = handles.cloned();
    }

    fn set_attribute_display(&mut self, flags: AttributeDisplay) {
        self.attribute_display = flags;
    }

    fn suspend(&mut self) {
        self.suspended = true;
    }

    fn resume(&mut self) {
        self.suspended = false;
    }
}

fn sanitize_ratio(ratio: f64) -> f64 {
    if ratio.is_finite() && ratio > 0.0 {
        ratio
    } else {
        1.0
    }
}

/// 块参照的放置参数：先缩放、再旋转、最后平移到插入点。
#[derive(Debug, Clone, Copy)]
struct BlockPlacement {
    insert: Point2,
    scale: Vector2,
    rotation: f64,
}

fn apply_block_transform(placement: &BlockPlacement, base_point: Point2, point: Point2) -> Point2 {
    let local = base_point.vector_to(point);
    let scaled = Vector2::new(
        local.x() * placement.scale.x(),
        local.y() * placement.scale.y(),
    );
    placement.insert.translate(scaled.rotate(placement.rotation))
}

fn sample_block(definition: &BlockDefinition, placement: &BlockPlacement) -> Vec<Point2> {
    definition
        .entities
        .iter()
        .flat_map(|entity| match &entity.kind {
            // 不展开嵌套块，只取其插入点。
            EntityKind::Insert { insert, .. } => vec![*insert],
            EntityKind::Text {
                insert,
                content,
                height,
            } => text_box(*insert, content, *height),
            kind => sample_kind(kind).0,
        })
        .map(|point| apply_block_transform(placement, definition.base_point, point))
        .collect()
}

fn sample_kind(kind: &EntityKind) -> (Vec<Point2>, bool) {
    match kind {
        EntityKind::Point { position } => (vec![*position], false),
        EntityKind::Line { start, end } => (vec![*start, *end], false),
        EntityKind::Circle { center, radius } => (sample_circle(*center, *radius), true),
        EntityKind::Arc {
            center,
            radius,
            start_angle,
            end_angle,
        } => (
            sample_arc_points(*center, *radius, *start_angle, *end_angle),
            false,
        ),
        EntityKind::Polyline { vertices, closed } => (vertices.clone(), *closed),
        EntityKind::Hatch { boundary } => (boundary.clone(), true),
        EntityKind::Solid { corners } => (corners.clone(), true),
        EntityKind::Text { insert, .. } | EntityKind::Insert { insert, .. } => {
            (vec![*insert], false)
        }
    }
}

fn point_on_circle(center: Point2, radius: f64, angle: f64) -> Point2 {
    center.translate(Vector2::new(radius * angle.cos(), radius * angle.sin()))
}

fn sample_circle(center: Point2, radius: f64) -> Vec<Point2> {
    if !(radius.is_finite() && radius > 0.0) {
        return vec![center];
    }
    (0..CIRCLE_SEGMENTS)
        .map(|i| point_on_circle(center, radius, TAU * i as f64 / CIRCLE_SEGMENTS as f64))
        .collect()
}

/// 逆时针从起始角采样到终止角，包含两端点；扫角为 0 时视为整圆。
fn sample_arc_points(center: Point2, radius: f64, start: f64, end: f64) -> Vec<Point2> {
    if !(radius.is_finite() && radius > 0.0) {
        return vec![center];
    }
    let mut sweep = (end - start).rem_euclid(TAU);
    if sweep <= 1e-12 {
        sweep = TAU;
    }
    let segments = ((sweep / TAU * CIRCLE_SEGMENTS as f64).ceil() as usize).max(2);
    (0..=segments)
        .map(|i| point_on_circle(center, radius, start + sweep * i as f64 / segments as f64))
        .collect()
}

fn text_width(content: &str, height: f64) -> f64 {
    content.chars().count().max(1) as f64 * height * TEXT_WIDTH_FACTOR
}

/// 文字的近似外框，首点为插入点。
fn text_box(insert: Point2, content: &str, height: f64) -> Vec<Point2> {
    let width = text_width(content, height);
    vec![
        insert,
        insert.translate(Vector2::new(width, 0.0)),
        insert.translate(Vector2::new(width, height)),
        insert.translate(Vector2::new(0.0, height)),
    ]
}
