pub mod cli;
pub mod errors;
pub mod loader;

use dxfview_config::{AppConfig, ViewportConfig};
use dxfview_engine::EngineSettings;
use errors::FrontendError;
use tracing::info;

pub use cli::{DemoOptions, DemoSummary};

/// 启动 CLI 演示，返回会话摘要。
pub fn run_cli_demo(config: &AppConfig) -> Result<DemoSummary, FrontendError> {
    info!("启动 CLI 演示前端");
    cli::run_demo(&DemoOptions::from_config(config))
}

/// 把 `[viewport]` 配置映射为引擎参数。
pub fn engine_settings(config: &ViewportConfig) -> EngineSettings {
    EngineSettings {
        snap_threshold_px: config.snap_threshold_px,
        history_limit: config.history_limit,
        wheel_zoom_step: config.wheel_zoom_step,
        orbit_step_degrees: config.orbit_step_degrees,
        pan_step_px: config.pan_step_px,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_viewport_config_matches_engine_defaults() {
        let settings = engine_settings(&ViewportConfig::default());
        assert_eq!(settings, EngineSettings::default());
    }
}
