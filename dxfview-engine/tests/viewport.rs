use dxfview_core::geometry::Point2;
use dxfview_core::scene::{EntityKind, Handle, LayerKey, SceneEntity, SceneGraph};
use dxfview_core::view::ViewState;
use dxfview_engine::interaction::{Modifiers, PointerButton, PointerInput};
use dxfview_engine::isolation::LayerProperty;
use dxfview_engine::measure::{MeasurementMode, ReportDetail};
use dxfview_engine::snap::SnapType;
use dxfview_engine::transform::{screen_to_world, world_to_screen};
use dxfview_engine::{
    EngineSettings, InMemoryDocuments, SoftwareSurface, TabId, ViewportEngine, ViewportEvent,
};

const TAB_A: TabId = TabId::new(1);
const TAB_B: TabId = TabId::new(2);

struct Fixture {
    engine: ViewportEngine<SoftwareSurface, InMemoryDocuments>,
    outline: Handle,
    marker: Handle,
    hole: Handle,
    label: Handle,
}

fn fixture() -> Fixture {
    let mut scene = SceneGraph::new();
    let outline = scene.add_polyline(
        [
            Point2::new(0.0, 0.0),
            Point2::new(100.0, 0.0),
            Point2::new(100.0, 50.0),
            Point2::new(0.0, 50.0),
        ],
        true,
        "Walls",
    );
    let marker = scene.add_point(Point2::new(20.0, 25.0), "0");
    let hole = scene.add_circle(Point2::new(200.0, 25.0), 10.0, "Dims");
    let label = scene.add_text(Point2::new(0.0, 60.0), "LABEL", 5.0, "0");
    scene.drawing_properties.insunits = Some(4);

    let mut other = SceneGraph::new();
    other.add_line(Point2::new(-5.0, -5.0), Point2::new(5.0, 5.0), "0");

    let mut documents = InMemoryDocuments::new();
    documents.insert(TAB_A, scene);
    documents.insert(TAB_B, other);

    let mut engine = ViewportEngine::new(
        SoftwareSurface::new(800.0, 600.0, 1.0),
        documents,
        EngineSettings::default(),
    );
    engine.open_viewport();
    engine.activate_tab(TAB_A);
    Fixture {
        engine,
        outline,
        marker,
        hole,
        label,
    }
}

fn engine_with(scene: SceneGraph) -> ViewportEngine<SoftwareSurface, InMemoryDocuments> {
    let mut documents = InMemoryDocuments::new();
    documents.insert(TAB_A, scene);
    let mut engine = ViewportEngine::new(
        SoftwareSurface::new(800.0, 600.0, 1.0),
        documents,
        EngineSettings::default(),
    );
    engine.open_viewport();
    engine
}

fn screen_of(engine: &ViewportEngine<SoftwareSurface, InMemoryDocuments>, world: Point2) -> Point2 {
    world_to_screen(world, engine.frame()).expect("当前应存在可用帧")
}

fn offset(point: Point2, dx: f64, dy: f64) -> Point2 {
    Point2::new(point.x() + dx, point.y() + dy)
}

fn click(engine: &mut ViewportEngine<SoftwareSurface, InMemoryDocuments>, at: Point2, modifiers: Modifiers) {
    engine.pointer_down(PointerInput::primary(1, at).with_modifiers(modifiers));
    engine.pointer_up(1, at);
}

fn drag(
    engine: &mut ViewportEngine<SoftwareSurface, InMemoryDocuments>,
    from: Point2,
    to: Point2,
    modifiers: Modifiers,
) {
    engine.pointer_down(PointerInput::primary(1, from).with_modifiers(modifiers));
    engine.pointer_move(1, to);
    engine.pointer_up(1, to);
}

fn selected(engine: &ViewportEngine<SoftwareSurface, InMemoryDocuments>) -> Vec<Handle> {
    engine
        .selection()
        .map(|selection| selection.handles().iter().cloned().collect())
        .unwrap_or_default()
}

#[test]
fn undo_then_redo_replays_history_without_new_entries() {
    let Fixture { mut engine, .. } = fixture();
    assert_eq!(engine.current_view(), Some(ViewState::Auto));

    let zoomed = engine
        .zoom_view(2.0, Some(Point2::new(120.0, 80.0)))
        .expect("缩放失败");
    let panned = engine.pan_view(30.0, -10.0).expect("平移失败");
    let orbited = engine.orbit_view(30.0).expect("旋转失败");
    let key = engine.active_key().expect("缺少活动视图");
    assert_eq!(engine.view_context(key).map(|c| c.history().len()), Some(4));

    for _ in 0..3 {
        assert!(engine.undo_view_navigation().is_some());
    }
    assert_eq!(engine.current_view(), Some(ViewState::Auto));
    assert!(engine.undo_view_navigation().is_none());

    let redone = engine.redo_view_navigation().expect("重做失败");
    assert!(redone.approx_eq(&zoomed, 1e-9));
    let redone = engine.redo_view_navigation().expect("重做失败");
    assert!(redone.approx_eq(&panned, 1e-9));
    let redone = engine.redo_view_navigation().expect("重做失败");
    assert!(redone.approx_eq(&orbited, 1e-9));
    assert!(engine.redo_view_navigation().is_none());
    assert_eq!(engine.view_context(key).map(|c| c.history().len()), Some(4));
}

#[test]
fn zoom_keeps_anchor_stationary() {
    let Fixture { mut engine, .. } = fixture();
    engine.orbit_view(-40.0);
    let anchor = Point2::new(613.0, 127.0);
    let before = screen_to_world(anchor, engine.frame()).expect("缺少帧");
    engine.zoom_view(3.5, Some(anchor)).expect("缩放失败");
    let after = screen_to_world(anchor, engine.frame()).expect("缺少帧");
    assert!(before.distance(after) < 1e-9);
}

#[test]
fn reset_returns_to_captured_auto_fit() {
    let Fixture { mut engine, .. } = fixture();
    let fitted = engine.frame().expect("缺少帧").view();
    engine.zoom_view(4.0, None);
    engine.orbit_view(90.0);
    let reset = engine
        .reset_view_navigation()
        .and_then(|state| state.params())
        .expect("复位失败");
    assert!(reset.approx_eq(&fitted, 1e-9));
}

#[test]
fn wheel_zoom_is_anchored_at_cursor() {
    let Fixture { mut engine, .. } = fixture();
    let cursor = Point2::new(100.0, 500.0);
    let before = screen_to_world(cursor, engine.frame()).expect("缺少帧");
    engine.wheel(120.0, cursor).expect("滚轮缩放失败");
    let after = screen_to_world(cursor, engine.frame()).expect("缺少帧");
    assert!(before.distance(after) < 1e-9);
}

#[test]
fn clicks_pick_smallest_entity_and_modifiers_change_commit_mode() {
    let Fixture {
        mut engine,
        marker,
        hole,
        ..
    } = fixture();

    let at_marker = screen_of(&engine, Point2::new(20.0, 25.0));
    click(&mut engine, at_marker, Modifiers::NONE);
    assert_eq!(selected(&engine), vec![marker.clone()]);

    let at_hole = screen_of(&engine, Point2::new(200.0, 25.0));
    let ctrl = Modifiers {
        ctrl: true,
        ..Modifiers::NONE
    };
    click(&mut engine, at_hole, ctrl);
    assert_eq!(selected(&engine).len(), 2);
    click(&mut engine, at_marker, ctrl);
    assert_eq!(selected(&engine), vec![hole.clone()]);

    let empty = Point2::new(790.0, 590.0);
    let shift = Modifiers {
        shift: true,
        ..Modifiers::NONE
    };
    click(&mut engine, empty, shift);
    assert_eq!(selected(&engine), vec![hole]);
    click(&mut engine, empty, Modifiers::NONE);
    assert!(selected(&engine).is_empty());
    assert_eq!(engine.surface().selection_handles().len(), 0);
}

#[test]
fn window_and_crossing_follow_drag_direction() {
    let Fixture {
        mut engine,
        outline,
        hole,
        ..
    } = fixture();

    let left = screen_of(&engine, Point2::new(185.0, 40.0));
    let right = screen_of(&engine, Point2::new(215.0, 10.0));
    drag(&mut engine, left, right, Modifiers::NONE);
    assert_eq!(selected(&engine), vec![hole]);

    let near_edge_right = screen_of(&engine, Point2::new(105.0, 40.0));
    let near_edge_left = screen_of(&engine, Point2::new(95.0, 10.0));
    drag(&mut engine, near_edge_left, near_edge_right, Modifiers::NONE);
    assert!(selected(&engine).is_empty());

    drag(&mut engine, near_edge_right, near_edge_left, Modifiers::NONE);
    assert_eq!(selected(&engine), vec![outline]);
}

#[test]
fn alt_drag_selects_with_lasso() {
    let Fixture {
        mut engine, marker, ..
    } = fixture();
    let alt = Modifiers {
        alt: true,
        ..Modifiers::NONE
    };
    let path = [
        Point2::new(10.0, 15.0),
        Point2::new(30.0, 15.0),
        Point2::new(30.0, 35.0),
        Point2::new(10.0, 35.0),
    ]
    .map(|world| screen_of(&engine, world));

    engine.pointer_down(PointerInput::primary(4, path[0]).with_modifiers(alt));
    for point in &path[1..] {
        engine.pointer_move(4, *point);
    }
    engine.pointer_up(4, path[3]);
    assert_eq!(selected(&engine), vec![marker]);
}

#[test]
fn pointer_cancel_discards_marquee() {
    let Fixture { mut engine, .. } = fixture();
    engine.pointer_down(PointerInput::primary(9, Point2::new(10.0, 10.0)));
    engine.pointer_move(9, Point2::new(700.0, 500.0));
    engine.pointer_cancel(9);
    engine.pointer_up(9, Point2::new(700.0, 500.0));
    assert!(selected(&engine).is_empty());
    let events = engine.drain_events();
    assert!(events.contains(&ViewportEvent::PointerCaptured(9)));
    assert!(events.contains(&ViewportEvent::PointerReleased(9)));
    assert!(
        !events
            .iter()
            .any(|event| matches!(event, ViewportEvent::SelectionChanged { .. }))
    );
}

#[test]
fn middle_button_pan_records_history_once() {
    let Fixture { mut engine, .. } = fixture();
    let key = engine.active_key().expect("缺少活动视图");
    let start = Point2::new(400.0, 300.0);
    let anchored = screen_to_world(start, engine.frame()).expect("缺少帧");

    engine.pointer_down(PointerInput::primary(2, start).with_button(PointerButton::Middle));
    engine.pointer_move(2, Point2::new(420.0, 300.0));
    engine.pointer_move(2, Point2::new(440.0, 310.0));
    assert_eq!(engine.view_context(key).map(|c| c.history().len()), Some(1));
    engine.pointer_up(2, Point2::new(440.0, 310.0));
    assert_eq!(engine.view_context(key).map(|c| c.history().len()), Some(2));

    let moved = screen_of(&engine, anchored);
    assert!(moved.distance(Point2::new(440.0, 310.0)) < 1e-9);
}

#[test]
fn cancelled_pan_restores_previous_view() {
    let Fixture { mut engine, .. } = fixture();
    let key = engine.active_key().expect("缺少活动视图");
    let original = engine.frame().expect("缺少帧").view();

    engine.pointer_down(PointerInput::primary(2, Point2::new(400.0, 300.0)).with_button(PointerButton::Middle));
    engine.pointer_move(2, Point2::new(480.0, 350.0));
    engine.pointer_cancel(2);

    assert_eq!(engine.current_view(), Some(ViewState::Auto));
    assert!(engine.frame().expect("缺少帧").view().approx_eq(&original, 1e-9));
    assert_eq!(engine.view_context(key).map(|c| c.history().len()), Some(1));
}

#[test]
fn measurement_points_snap_to_features() {
    let Fixture { mut engine, .. } = fixture();
    engine.set_measurement_mode(MeasurementMode::Distance);

    let corner = screen_of(&engine, Point2::new(100.0, 0.0));
    engine.pointer_down(PointerInput::primary(1, offset(corner, 2.0, -2.0)));
    let center = screen_of(&engine, Point2::new(200.0, 25.0));
    engine.pointer_move(1, offset(center, 1.0, 1.0));
    assert!(engine.measurement().preview().is_some());
    engine.pointer_down(PointerInput::primary(1, offset(center, 1.0, 1.0)));

    let points = engine.measurement().points();
    assert_eq!(points.len(), 2);
    assert_eq!(points[0].world, Point2::new(100.0, 0.0));
    assert_eq!(points[0].snap.as_ref().map(|s| s.snap_type), Some(SnapType::Node));
    assert_eq!(points[1].snap.as_ref().map(|s| s.snap_type), Some(SnapType::Center));
    assert!(points[1].world.distance(Point2::new(200.0, 25.0)) < 1e-9);

    let report = engine.measurement_report();
    assert!(report.has_data);
    assert!(report.label.contains("mm"));
    match report.detail {
        Some(ReportDetail::Distance(distance)) => {
            assert!((distance.total - (100.0f64.powi(2) + 25.0f64.powi(2)).sqrt()).abs() < 1e-9);
        }
        other => panic!("期望距离报告，实际为 {other:?}"),
    }
    // 测量模式下点击不改变选中集。
    assert!(selected(&engine).is_empty());
}

#[test]
fn unsnapped_measurement_uses_cursor_world_position() {
    let Fixture { mut engine, .. } = fixture();
    engine.set_measurement_mode(MeasurementMode::Area);
    let far = Point2::new(700.0, 550.0);
    let expected = screen_to_world(far, engine.frame()).expect("缺少帧");
    engine.pointer_down(PointerInput::primary(1, far));
    let point = &engine.measurement().points()[0];
    assert!(point.snap.is_none());
    assert!(point.world.distance(expected) < 1e-9);
    assert!(!engine.measurement_report().has_data);
}

#[test]
fn layer_state_is_swapped_per_tab() {
    let Fixture {
        mut engine, outline, ..
    } = fixture();

    assert!(engine.set_layer_override("walls", LayerProperty::On(false)));
    assert!(engine.frame().expect("缺少帧").pickable(&outline).is_none());
    assert!(engine.surface().layer_state().is_some());

    engine.activate_tab(TAB_B);
    assert!(engine.surface().layer_state().is_none());
    let walls = engine.effective_layer_state("Walls").expect("缺少活动文档");
    assert!(walls.is_on);

    engine.activate_tab(TAB_A);
    let state = engine
        .surface()
        .layer_state()
        .and_then(|map| map.get(&LayerKey::new("Walls")).copied())
        .expect("图层状态未换回");
    assert!(!state.is_on);
}

#[test]
fn layer_override_equal_to_base_is_pruned() {
    let Fixture { mut engine, .. } = fixture();
    assert!(!engine.set_layer_override("Walls", LayerProperty::On(true)));
    assert!(
        engine
            .layer_state(TAB_A)
            .is_none_or(|state| !state.has_overrides())
    );
}

#[test]
fn clearing_layer_isolation_restores_previous_overrides() {
    let Fixture {
        mut engine, outline, ..
    } = fixture();
    engine.set_layer_override("Dims", LayerProperty::TransparencyAlpha(0.5));
    let snapshot = engine
        .layer_state(TAB_A)
        .map(|state| state.overrides().clone())
        .expect("缺少图层状态");

    assert!(engine.apply_layer_isolation([LayerKey::new("Walls")]));
    let frame = engine.frame().expect("缺少帧");
    assert_eq!(frame.pickables.len(), 1);
    assert_eq!(frame.pickables[0].handle, outline);

    assert!(engine.clear_layer_isolation());
    let restored = engine
        .layer_state(TAB_A)
        .map(|state| state.overrides().clone())
        .expect("缺少图层状态");
    assert_eq!(restored, snapshot);
    assert_eq!(engine.frame().expect("缺少帧").pickables.len(), 4);
}

#[test]
fn isolate_selection_filters_frame_until_cleared() {
    let Fixture {
        mut engine, hole, ..
    } = fixture();
    let at_hole = screen_of(&engine, Point2::new(200.0, 25.0));
    click(&mut engine, at_hole, Modifiers::NONE);
    assert!(engine.isolate_selection());
    let handles: Vec<Handle> = engine
        .frame()
        .expect("缺少帧")
        .pickables
        .iter()
        .map(|p| p.handle.clone())
        .collect();
    assert_eq!(handles, vec![hole]);
    assert!(engine.clear_isolation());
    assert_eq!(engine.frame().expect("缺少帧").pickables.len(), 4);
}

#[test]
fn double_click_on_text_activates_its_handle() {
    let Fixture {
        mut engine, label, ..
    } = fixture();
    engine.drain_events();
    let inside = screen_of(&engine, Point2::new(1.0, 61.0));
    assert!(engine.double_click(inside));
    assert!(
        engine
            .drain_events()
            .contains(&ViewportEvent::HandleActivated(label))
    );
    assert!(!engine.double_click(Point2::new(795.0, 595.0)));
}

#[test]
fn closing_a_tab_discards_its_contexts() {
    let Fixture { mut engine, .. } = fixture();
    engine.zoom_view(2.0, None);
    let key = engine.active_key().expect("缺少活动视图");
    assert!(engine.close_tab(TAB_A));
    assert!(engine.view_context(key).is_none());
    assert!(engine.frame().is_none());
    assert!(engine.zoom_view(2.0, None).is_none());
    assert!(engine.surface().layer_state().is_none());
}

#[test]
fn activation_while_suspended_still_records_auto_fit() {
    let mut scene = SceneGraph::new();
    scene.add_line(Point2::new(0.0, 0.0), Point2::new(100.0, 40.0), "0");
    let mut engine = engine_with(scene);

    engine.suspend();
    assert!(engine.activate_tab(TAB_A));
    assert!(engine.frame().is_none());
    let key = engine.active_key().expect("缺少活动视图");
    assert!(engine.view_context(key).is_none());

    assert_eq!(engine.resume(), Some(ViewState::Auto));
    assert!(engine.zoom_view(2.0, None).is_some());
    assert_eq!(engine.view_context(key).map(|c| c.history().len()), Some(2));
    assert_eq!(engine.undo_view_navigation(), Some(ViewState::Auto));
    assert!(engine.undo_view_navigation().is_none());
}

#[test]
fn layer_isolation_hides_entities_on_layers_missing_from_table() {
    let mut scene = SceneGraph::new();
    let wall = scene.add_line(Point2::new(0.0, 0.0), Point2::new(100.0, 0.0), "Walls");
    let xref = Handle::new("F00");
    scene.model_space.push(SceneEntity {
        handle: xref.clone(),
        layer: "Xref".to_string(),
        lineweight: None,
        color: None,
        kind: EntityKind::Point {
            position: Point2::new(50.0, 30.0),
        },
    });
    assert!(scene.layer("Xref").is_none());
    let mut engine = engine_with(scene);
    engine.activate_tab(TAB_A);
    assert_eq!(engine.frame().expect("缺少帧").pickables.len(), 2);

    assert!(engine.apply_layer_isolation([LayerKey::new("Walls")]));
    let handles: Vec<Handle> = engine
        .frame()
        .expect("缺少帧")
        .pickables
        .iter()
        .map(|p| p.handle.clone())
        .collect();
    assert_eq!(handles, vec![wall]);
    let state = engine.effective_layer_state("xref").expect("缺少图层状态");
    assert!(!state.is_on);

    assert!(engine.clear_layer_isolation());
    let frame = engine.frame().expect("缺少帧");
    assert!(frame.pickables.iter().any(|p| p.handle == xref));
}

#[test]
fn escape_cancels_marquee_before_closing_viewport() {
    let Fixture { mut engine, .. } = fixture();
    engine.pointer_down(PointerInput::primary(4, Point2::new(10.0, 10.0)));
    engine.pointer_move(4, Point2::new(700.0, 500.0));
    assert!(engine.interaction().is_some_and(|c| c.is_active()));
    engine.drain_events();

    assert!(engine.escape());
    assert!(engine.is_viewport_open());
    assert!(!engine.interaction().is_some_and(|c| c.is_active()));
    engine.pointer_up(4, Point2::new(700.0, 500.0));
    assert!(selected(&engine).is_empty());
    let events = engine.drain_events();
    assert!(events.contains(&ViewportEvent::PointerReleased(4)));
    assert!(!events.contains(&ViewportEvent::ViewportClosed));
}

#[test]
fn escape_with_nothing_in_progress_closes_viewport() {
    let Fixture {
        mut engine, hole, ..
    } = fixture();
    let at_hole = screen_of(&engine, Point2::new(200.0, 25.0));
    click(&mut engine, at_hole, Modifiers::NONE);
    engine.drain_events();

    assert!(engine.escape());
    assert!(!engine.is_viewport_open());
    assert!(engine.drain_events().contains(&ViewportEvent::ViewportClosed));
    assert_eq!(selected(&engine), vec![hole]);
    assert!(!engine.escape());
    assert!(!engine.pointer_down(PointerInput::primary(1, at_hole)));
}
