//! 指针交互状态机。
//!
//! 一个视口同一时刻只跟踪一个指针：按下后处于 `Pending`，拖动超过阈值转为
//! `Marquee`；按下时按住 alt 直接进入 `Lasso`；中键按下进入 `Pan`。控制器只产生
//! 手势结果，不直接修改选中集或视图。

use dxfview_core::geometry::{Point2, ScreenRect};
use tracing::trace;

/// 拖动距离平方超过该值（px²）才视为框选。
const DRAG_THRESHOLD_SQ: f64 = 16.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        shift: false,
        ctrl: false,
        alt: false,
        meta: false,
    };

    /// `ctrl` 或 `meta`（macOS 的 command）。
    #[inline]
    pub fn command(self) -> bool {
        self.ctrl || self.meta
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PointerButton {
    #[default]
    Primary,
    Middle,
    Secondary,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerInput {
    pub pointer_id: u32,
    pub position: Point2,
    pub button: PointerButton,
    pub modifiers: Modifiers,
}

impl PointerInput {
    pub fn primary(pointer_id: u32, position: Point2) -> Self {
        Self {
            pointer_id,
            position,
            button: PointerButton::Primary,
            modifiers: Modifiers::NONE,
        }
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn with_button(mut self, button: PointerButton) -> Self {
        self.button = button;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionKind {
    Pending,
    Marquee,
    Lasso,
    Pan,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Interaction {
    pub pointer_id: u32,
    pub kind: InteractionKind,
    pub start: Point2,
    pub last: Point2,
    pub modifiers: Modifiers,
    /// 套索路径（屏幕坐标），其余类型为空。
    pub path: Vec<Point2>,
}

/// 一次指针事件处理后的结果，由引擎负责落实。
#[derive(Debug, Clone, PartialEq)]
pub enum GestureOutcome {
    None,
    Pick {
        point: Point2,
        modifiers: Modifiers,
    },
    Rect {
        start: Point2,
        end: Point2,
        modifiers: Modifiers,
    },
    Lasso {
        path: Vec<Point2>,
        modifiers: Modifiers,
    },
    /// 平移增量（像素）。
    Pan {
        dx: f64,
        dy: f64,
    },
    PanFinished,
    Cancelled {
        kind: InteractionKind,
    },
}

/// 每个打开的视口持有一个控制器，关闭视口时随之丢弃。
#[derive(Debug, Default)]
pub struct InteractionController {
    current: Option<Interaction>,
    captured: Option<u32>,
}

impl InteractionController {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn current(&self) -> Option<&Interaction> {
        self.current.as_ref()
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.current.is_some()
    }

    /// 当前持有指针捕获的指针 id。
    #[inline]
    pub fn captured_pointer(&self) -> Option<u32> {
        self.captured
    }

    /// 框选矩形，仅在 `Marquee` 状态下存在，用于叠加层绘制。
    pub fn marquee_rect(&self) -> Option<ScreenRect> {
        self.current
            .as_ref()
            .filter(|interaction| interaction.kind == InteractionKind::Marquee)
            .map(|interaction| ScreenRect::from_corners(interaction.start, interaction.last))
    }

    pub fn lasso_path(&self) -> Option<&[Point2]> {
        self.current
            .as_ref()
            .filter(|interaction| interaction.kind == InteractionKind::Lasso)
            .map(|interaction| interaction.path.as_slice())
    }

    /// 开始一次交互。已有交互进行中或按下右键时忽略，返回是否开始。
    pub fn pointer_down(&mut self, input: PointerInput) -> bool {
        if self.current.is_some() || !input.position.is_finite() {
            return false;
        }
        let kind = match input.button {
            PointerButton::Secondary => return false,
            PointerButton::Middle => InteractionKind::Pan,
            PointerButton::Primary if input.modifiers.alt => InteractionKind::Lasso,
            PointerButton::Primary => InteractionKind::Pending,
        };
        let path = if kind == InteractionKind::Lasso {
            vec![input.position]
        } else {
            Vec::new()
        };
        self.current = Some(Interaction {
            pointer_id: input.pointer_id,
            kind,
            start: input.position,
            last: input.position,
            modifiers: input.modifiers,
            path,
        });
        self.captured = Some(input.pointer_id);
        trace!(pointer = input.pointer_id, ?kind, "开始指针交互");
        true
    }

    pub fn pointer_move(&mut self, pointer_id: u32, position: Point2) -> GestureOutcome {
        let Some(interaction) = self.current.as_mut() else {
            return GestureOutcome::None;
        };
        if interaction.pointer_id != pointer_id || !position.is_finite() {
            return GestureOutcome::None;
        }
        let previous = interaction.last;
        interaction.last = position;
        match interaction.kind {
            InteractionKind::Pending => {
                if interaction.start.distance_squared(position) > DRAG_THRESHOLD_SQ {
                    interaction.kind = InteractionKind::Marquee;
                }
                GestureOutcome::None
            }
            InteractionKind::Marquee => GestureOutcome::None,
            InteractionKind::Lasso => {
                if interaction.path.last() != Some(&position) {
                    interaction.path.push(position);
                }
                GestureOutcome::None
            }
            InteractionKind::Pan => GestureOutcome::Pan {
                dx: position.x() - previous.x(),
                dy: position.y() - previous.y(),
            },
        }
    }

    /// 结束交互并释放捕获。
    pub fn pointer_up(&mut self, pointer_id: u32, position: Point2) -> GestureOutcome {
        if self
            .current
            .as_ref()
            .is_none_or(|interaction| interaction.pointer_id != pointer_id)
        {
            return GestureOutcome::None;
        }
        let Some(mut interaction) = self.current.take() else {
            return GestureOutcome::None;
        };
        self.captured = None;
        let end = if position.is_finite() {
            position
        } else {
            interaction.last
        };
        match interaction.kind {
            InteractionKind::Pending => GestureOutcome::Pick {
                point: interaction.start,
                modifiers: interaction.modifiers,
            },
            InteractionKind::Marquee => GestureOutcome::Rect {
                start: interaction.start,
                end,
                modifiers: interaction.modifiers,
            },
            InteractionKind::Lasso => {
                if interaction.path.last() != Some(&end) {
                    interaction.path.push(end);
                }
                GestureOutcome::Lasso {
                    path: interaction.path,
                    modifiers: interaction.modifiers,
                }
            }
            InteractionKind::Pan => GestureOutcome::PanFinished,
        }
    }

    /// 指针被系统中断：丢弃一切临时状态，不提交任何结果。
    pub fn pointer_cancel(&mut self, pointer_id: u32) -> GestureOutcome {
        match self.current.as_ref() {
            Some(interaction) if interaction.pointer_id == pointer_id => self.cancel(),
            _ => GestureOutcome::None,
        }
    }

    pub fn cancel(&mut self) -> GestureOutcome {
        self.captured = None;
        match self.current.take() {
            Some(interaction) => {
                trace!(pointer = interaction.pointer_id, kind = ?interaction.kind, "指针交互已取消");
                GestureOutcome::Cancelled {
                    kind: interaction.kind,
                }
            }
            None => GestureOutcome::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn down(controller: &mut InteractionController, x: f64, y: f64) -> bool {
        controller.pointer_down(PointerInput::primary(1, Point2::new(x, y)))
    }

    #[test]
    fn short_drag_stays_a_pick() {
        let mut controller = InteractionController::new();
        assert!(down(&mut controller, 10.0, 10.0));
        assert_eq!(controller.captured_pointer(), Some(1));
        controller.pointer_move(1, Point2::new(13.0, 12.0));
        assert_eq!(controller.current().map(|i| i.kind), Some(InteractionKind::Pending));
        let outcome = controller.pointer_up(1, Point2::new(13.0, 12.0));
        assert_eq!(
            outcome,
            GestureOutcome::Pick {
                point: Point2::new(10.0, 10.0),
                modifiers: Modifiers::NONE
            }
        );
        assert!(!controller.is_active());
        assert_eq!(controller.captured_pointer(), None);
    }

    #[test]
    fn drag_beyond_threshold_becomes_marquee() {
        let mut controller = InteractionController::new();
        down(&mut controller, 10.0, 10.0);
        controller.pointer_move(1, Point2::new(14.0, 10.0));
        assert!(controller.marquee_rect().is_none());
        controller.pointer_move(1, Point2::new(14.1, 10.0));
        assert!(controller.marquee_rect().is_some());
        let outcome = controller.pointer_up(1, Point2::new(40.0, 30.0));
        assert!(matches!(outcome, GestureOutcome::Rect { end, .. } if end == Point2::new(40.0, 30.0)));
    }

    #[test]
    fn alt_starts_lasso_immediately() {
        let mut controller = InteractionController::new();
        let alt = Modifiers {
            alt: true,
            ..Modifiers::NONE
        };
        controller.pointer_down(PointerInput::primary(3, Point2::new(0.0, 0.0)).with_modifiers(alt));
        assert_eq!(controller.lasso_path().map(<[Point2]>::len), Some(1));
        controller.pointer_move(3, Point2::new(10.0, 0.0));
        controller.pointer_move(3, Point2::new(10.0, 0.0));
        match controller.pointer_up(3, Point2::new(10.0, 10.0)) {
            GestureOutcome::Lasso { path, .. } => assert_eq!(path.len(), 3),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn second_pointer_is_ignored() {
        let mut controller = InteractionController::new();
        assert!(down(&mut controller, 0.0, 0.0));
        assert!(!controller.pointer_down(PointerInput::primary(2, Point2::new(5.0, 5.0))));
        assert_eq!(controller.pointer_move(2, Point2::new(50.0, 50.0)), GestureOutcome::None);
        assert_eq!(controller.pointer_up(2, Point2::new(50.0, 50.0)), GestureOutcome::None);
        assert_eq!(controller.current().map(|i| i.pointer_id), Some(1));
    }

    #[test]
    fn cancel_discards_marquee() {
        let mut controller = InteractionController::new();
        down(&mut controller, 0.0, 0.0);
        controller.pointer_move(1, Point2::new(50.0, 50.0));
        assert_eq!(controller.pointer_cancel(2), GestureOutcome::None);
        assert_eq!(
            controller.pointer_cancel(1),
            GestureOutcome::Cancelled {
                kind: InteractionKind::Marquee
            }
        );
        assert!(!controller.is_active());
        assert_eq!(controller.pointer_up(1, Point2::new(50.0, 50.0)), GestureOutcome::None);
    }

    #[test]
    fn middle_button_pans_incrementally() {
        let mut controller = InteractionController::new();
        controller.pointer_down(
            PointerInput::primary(1, Point2::new(100.0, 100.0)).with_button(PointerButton::Middle),
        );
        assert_eq!(
            controller.pointer_move(1, Point2::new(110.0, 95.0)),
            GestureOutcome::Pan { dx: 10.0, dy: -5.0 }
        );
        assert_eq!(
            controller.pointer_move(1, Point2::new(112.0, 95.0)),
            GestureOutcome::Pan { dx: 2.0, dy: 0.0 }
        );
        assert_eq!(controller.pointer_up(1, Point2::new(112.0, 95.0)), GestureOutcome::PanFinished);
    }

    #[test]
    fn secondary_button_does_not_start_interaction() {
        let mut controller = InteractionController::new();
        let input = PointerInput::primary(1, Point2::ORIGIN).with_button(PointerButton::Secondary);
        assert!(!controller.pointer_down(input));
        assert!(controller.captured_pointer().is_none());
    }
}
