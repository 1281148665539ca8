//! 按标签页维护的图层覆盖与图层/对象隔离状态。
//!
//! 覆盖表保持最小：与图层表基础值相同的覆盖项会被删除。

use std::collections::{BTreeMap, BTreeSet, HashMap};

use dxfview_core::scene::{Handle, LayerKey, LayerRecord, SceneGraph, SceneTables};
use tracing::debug;

use crate::navigation::TabId;

const MAX_TRANSPARENCY_PERCENT: f64 = 90.0;

/// 图层的最终显示状态（覆盖优先，否则取图层表）。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectiveLayerState {
    pub is_on: bool,
    pub is_frozen: bool,
    pub is_locked: bool,
    pub transparency_alpha: f64,
}

impl EffectiveLayerState {
    pub fn from_record(record: &LayerRecord) -> Self {
        Self {
            is_on: record.is_on,
            is_frozen: record.is_frozen,
            is_locked: record.is_locked,
            transparency_alpha: clamp_alpha(record.transparency_alpha),
        }
    }

    #[inline]
    pub fn is_visible(&self) -> bool {
        self.is_on && !self.is_frozen
    }
}

impl Default for EffectiveLayerState {
    /// 未知图层：可见、未锁定、不透明。
    fn default() -> Self {
        Self {
            is_on: true,
            is_frozen: false,
            is_locked: false,
            transparency_alpha: 1.0,
        }
    }
}

/// 交给渲染面的图层状态表。
pub type LayerStateMap = BTreeMap<LayerKey, EffectiveLayerState>;

/// 单个图层的显式覆盖，`None` 表示沿用基础值。
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LayerOverride {
    pub is_on: Option<bool>,
    pub is_frozen: Option<bool>,
    pub is_locked: Option<bool>,
    pub transparency_alpha: Option<f64>,
}

impl LayerOverride {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.is_on.is_none()
            && self.is_frozen.is_none()
            && self.is_locked.is_none()
            && self.transparency_alpha.is_none()
    }

    fn apply_to(&self, base: EffectiveLayerState) -> EffectiveLayerState {
        EffectiveLayerState {
            is_on: self.is_on.unwrap_or(base.is_on),
            is_frozen: self.is_frozen.unwrap_or(base.is_frozen),
            is_locked: self.is_locked.unwrap_or(base.is_locked),
            transparency_alpha: self.transparency_alpha.unwrap_or(base.transparency_alpha),
        }
    }
}

/// 覆盖表快照，隔离前捕获以便精确还原。
pub type OverrideSnapshot = BTreeMap<LayerKey, LayerOverride>;

/// 可覆盖的图层属性及其新值。
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LayerProperty {
    On(bool),
    Frozen(bool),
    Locked(bool),
    /// 不透明度，范围 `[0, 1]`。
    TransparencyAlpha(f64),
}

#[inline]
fn clamp_alpha(alpha: f64) -> f64 {
    if alpha.is_finite() {
        alpha.clamp(0.0, 1.0)
    } else {
        1.0
    }
}

/// 不透明度换算为界面百分比：`round((1 - alpha) * 100)`，限制在 `[0, 90]`。
pub fn transparency_percent(alpha: f64) -> u8 {
    ((1.0 - clamp_alpha(alpha)) * 100.0)
        .round()
        .clamp(0.0, MAX_TRANSPARENCY_PERCENT) as u8
}

/// 界面百分比换算回不透明度。
pub fn alpha_from_percent(percent: f64) -> f64 {
    let percent = if percent.is_finite() {
        percent.clamp(0.0, MAX_TRANSPARENCY_PERCENT)
    } else {
        0.0
    };
    1.0 - percent / 100.0
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayerIsolation {
    pub layer_keys: BTreeSet<LayerKey>,
    pub layer_names: Vec<String>,
    pub snapshot: OverrideSnapshot,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ObjectIsolation {
    pub handles: BTreeSet<Handle>,
}

/// 单个标签页的图层覆盖与隔离状态。
#[derive(Debug, Clone, Default)]
pub struct TabLayerState {
    overrides: OverrideSnapshot,
    layer_isolation: Option<LayerIsolation>,
    object_isolation: Option<ObjectIsolation>,
}

impl TabLayerState {
    pub fn new() -> Self {
        Self::default()
    }

    fn base_state(tables: &SceneTables, key: &LayerKey) -> EffectiveLayerState {
        tables
            .layer(key)
            .map(EffectiveLayerState::from_record)
            .unwrap_or_default()
    }

    pub fn effective_layer_state(&self, tables: &SceneTables, layer: &str) -> EffectiveLayerState {
        let key = LayerKey::new(layer);
        let base = Self::base_state(tables, &key);
        match self.overrides.get(&key) {
            Some(layer_override) => layer_override.apply_to(base),
            None => base,
        }
    }

    /// 写入覆盖；新值与基础值相同则删除该覆盖项。返回覆盖表是否变化。
    pub fn set_layer_override(
        &mut self,
        tables: &SceneTables,
        layer: &str,
        property: LayerProperty,
    ) -> bool {
        let key = LayerKey::new(layer);
        let base = Self::base_state(tables, &key);
        let before = self.overrides.get(&key).copied();
        let mut entry = before.unwrap_or_default();
        match property {
            LayerProperty::On(value) => {
                entry.is_on = (value != base.is_on).then_some(value);
            }
            LayerProperty::Frozen(value) => {
                entry.is_frozen = (value != base.is_frozen).then_some(value);
            }
            LayerProperty::Locked(value) => {
                entry.is_locked = (value != base.is_locked).then_some(value);
            }
            LayerProperty::TransparencyAlpha(alpha) => {
                let alpha = clamp_alpha(alpha);
                entry.transparency_alpha =
                    ((alpha - base.transparency_alpha).abs() > 1e-9).then_some(alpha);
            }
        }
        if entry.is_empty() {
            self.overrides.remove(&key);
        } else {
            self.overrides.insert(key, entry);
        }
        self.overrides.get(&LayerKey::new(layer)).copied() != before
    }

    /// 删除某图层的全部覆盖。
    pub fn reset_layer(&mut self, layer: &str) -> bool {
        self.overrides.remove(&LayerKey::new(layer)).is_some()
    }

    #[inline]
    pub fn has_overrides(&self) -> bool {
        !self.overrides.is_empty()
    }

    #[inline]
    pub fn overrides(&self) -> &OverrideSnapshot {
        &self.overrides
    }

    /// 隔离指定图层：先快照覆盖表，再打开/解冻/解锁选中图层并关闭其余图层。
    /// “其余图层”包括实体引用但图层表中没有记录的图层。已处于隔离时保留最初的快照。
    pub fn apply_layer_isolation<I>(&mut self, scene: &SceneGraph, layer_keys: I) -> bool
    where
        I: IntoIterator<Item = LayerKey>,
    {
        let tables = &scene.tables;
        let keys: BTreeSet<LayerKey> = layer_keys.into_iter().collect();
        if keys.is_empty() {
            return false;
        }
        let snapshot = match self.layer_isolation.take() {
            Some(previous) => previous.snapshot,
            None => self.overrides.clone(),
        };
        self.overrides = snapshot.clone();

        let mut layer_names = Vec::new();
        for key in &keys {
            let name = tables
                .layer(key)
                .map(|record| record.name.clone())
                .unwrap_or_else(|| key.as_str().to_string());
            self.set_layer_override(tables, &name, LayerProperty::On(true));
            self.set_layer_override(tables, &name, LayerProperty::Frozen(false));
            self.set_layer_override(tables, &name, LayerProperty::Locked(false));
            layer_names.push(name);
        }
        for name in scene.layer_names() {
            if !keys.contains(&LayerKey::new(&name)) {
                self.set_layer_override(tables, &name, LayerProperty::On(false));
            }
        }
        debug!(layers = ?layer_names, "已应用图层隔离");
        self.layer_isolation = Some(LayerIsolation {
            layer_keys: keys,
            layer_names,
            snapshot,
        });
        true
    }

    /// 结束图层隔离，覆盖表精确还原为隔离前的快照。
    pub fn clear_layer_isolation(&mut self) -> bool {
        match self.layer_isolation.take() {
            Some(isolation) => {
                self.overrides = isolation.snapshot;
                true
            }
            None => false,
        }
    }

    #[inline]
    pub fn layer_isolation(&self) -> Option<&LayerIsolation> {
        self.layer_isolation.as_ref()
    }

    pub fn apply_object_isolation<I>(&mut self, handles: I) -> bool
    where
        I: IntoIterator<Item = Handle>,
    {
        let handles: BTreeSet<Handle> = handles.into_iter().collect();
        if handles.is_empty() {
            return false;
        }
        self.object_isolation = Some(ObjectIsolation { handles });
        true
    }

    pub fn clear_object_isolation(&mut self) -> bool {
        self.object_isolation.take().is_some()
    }

    #[inline]
    pub fn object_isolation(&self) -> Option<&ObjectIsolation> {
        self.object_isolation.as_ref()
    }

    /// 渲染面使用的图层状态；无覆盖时返回 `None`，由渲染面直接取图层表。
    pub fn layer_state_map(&self, tables: &SceneTables) -> Option<LayerStateMap> {
        if self.overrides.is_empty() {
            return None;
        }
        let mut map: LayerStateMap = tables
            .layers
            .iter()
            .map(|record| (record.key(), EffectiveLayerState::from_record(record)))
            .collect();
        for (key, layer_override) in &self.overrides {
            let base = map.get(key).copied().unwrap_or_default();
            map.insert(key.clone(), layer_override.apply_to(base));
        }
        Some(map)
    }
}

/// 所有标签页的图层状态，切换标签页时整体换入换出。
#[derive(Debug, Default)]
pub struct IsolationStore {
    tabs: HashMap<TabId, TabLayerState>,
}

impl IsolationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, tab: TabId) -> Option<&TabLayerState> {
        self.tabs.get(&tab)
    }

    pub fn get_mut(&mut self, tab: TabId) -> &mut TabLayerState {
        self.tabs.entry(tab).or_default()
    }

    pub fn remove(&mut self, tab: TabId) -> Option<TabLayerState> {
        self.tabs.remove(&tab)
    }
}
