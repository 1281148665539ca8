//! 世界坐标与屏幕坐标之间的换算。
//!
//! 屏幕基相对世界坐标旋转 `rotation_rad`，屏幕 Y 轴向下。所有函数在缺少帧或
//! 缩放无效时返回 `None`，调用方应把它当作"当前没有可用变换"处理。

use dxfview_core::frame::Frame;
use dxfview_core::geometry::{Point2, Vector2};
use dxfview_core::view::ViewParams;

/// 从帧中提取的变换参数。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTransform {
    pub scale: f64,
    pub world_center: Point2,
    pub rotation_rad: f64,
    pub width: f64,
    pub height: f64,
}

impl FrameTransform {
    /// 缩放为零或非有限时无法建立变换。
    pub fn new(view: ViewParams, width: f64, height: f64) -> Option<Self> {
        if !view.scale.is_finite() || view.scale == 0.0 {
            return None;
        }
        Some(Self {
            scale: view.scale,
            world_center: view.center,
            rotation_rad: view.rotation_rad,
            width,
            height,
        })
    }

    pub fn from_frame(frame: &Frame) -> Option<Self> {
        if !frame.scale.is_finite() || frame.scale == 0.0 {
            return None;
        }
        Some(Self {
            scale: frame.scale,
            world_center: frame.world_center,
            rotation_rad: frame.rotation_rad,
            width: frame.width,
            height: frame.height,
        })
    }

    pub fn world_to_screen(&self, world: Point2) -> Point2 {
        let d = self.world_center.vector_to(world).rotate(self.rotation_rad);
        Point2::new(
            d.x() * self.scale + self.width * 0.5,
            self.height * 0.5 - d.y() * self.scale,
        )
    }

    pub fn screen_to_world(&self, screen: Point2) -> Point2 {
        let local = Vector2::new(
            (screen.x() - self.width * 0.5) / self.scale,
            (self.height * 0.5 - screen.y()) / self.scale,
        );
        self.world_center.translate(local.rotate(-self.rotation_rad))
    }

    /// 屏幕位移（像素）换算为世界位移，不含平移分量。
    pub fn screen_delta_to_world(&self, dx: f64, dy: f64) -> Vector2 {
        Vector2::new(dx / self.scale, -dy / self.scale).rotate(-self.rotation_rad)
    }
}

pub fn world_to_screen(world: Point2, frame: Option<&Frame>) -> Option<Point2> {
    frame
        .and_then(FrameTransform::from_frame)
        .map(|transform| transform.world_to_screen(world))
}

pub fn screen_to_world(screen: Point2, frame: Option<&Frame>) -> Option<Point2> {
    frame
        .and_then(FrameTransform::from_frame)
        .map(|transform| transform.screen_to_world(screen))
}
