use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// 指定配置文件路径的环境变量。
pub const CONFIG_ENV: &str = "DXFVIEW_CONFIG";

/// 应用配置的根结构。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub frontend: FrontendConfig,
    #[serde(default)]
    pub viewport: ViewportConfig,
}

impl AppConfig {
    /// 从显式路径加载配置，并校验数值范围。
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// 自动发现配置文件：优先读取环境变量 `DXFVIEW_CONFIG`，否则寻找 `./config/default.toml`。
    /// 若文件缺失，则返回默认配置。
    pub fn discover() -> Result<Self, ConfigError> {
        if let Some(path) = env::var_os(CONFIG_ENV) {
            return Self::from_file(PathBuf::from(path));
        }

        let current_dir = env::current_dir().map_err(|source| ConfigError::Context {
            message: "获取当前工作目录失败".to_string(),
            source,
        })?;
        Self::discover_in(&current_dir)
    }

    /// 在指定目录下寻找 `config/default.toml`。
    pub fn discover_in(dir: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let default_path = dir.as_ref().join("config").join("default.toml");
        if default_path.exists() {
            Self::from_file(default_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.frontend.validate()?;
        self.viewport.validate()
    }
}

/// 日志配置，支持设置默认等级。
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

/// 前端配置：场景文件与初始视口尺寸。
#[derive(Debug, Clone, Deserialize)]
pub struct FrontendConfig {
    /// JSON 场景文件；为空时加载内置演示场景。
    #[serde(default)]
    pub scene_path: Option<PathBuf>,
    #[serde(default = "FrontendConfig::default_width")]
    pub viewport_width: f64,
    #[serde(default = "FrontendConfig::default_height")]
    pub viewport_height: f64,
    #[serde(default = "FrontendConfig::default_ratio")]
    pub device_pixel_ratio: f64,
}

impl FrontendConfig {
    fn default_width() -> f64 {
        1280.0
    }

    fn default_height() -> f64 {
        800.0
    }

    fn default_ratio() -> f64 {
        1.0
    }

    fn validate(&self) -> Result<(), ConfigError> {
        positive("frontend.viewport_width", self.viewport_width)?;
        positive("frontend.viewport_height", self.viewport_height)?;
        positive("frontend.device_pixel_ratio", self.device_pixel_ratio)
    }
}

impl Default for FrontendConfig {
    fn default() -> Self {
        Self {
            scene_path: None,
            viewport_width: Self::default_width(),
            viewport_height: Self::default_height(),
            device_pixel_ratio: Self::default_ratio(),
        }
    }
}

/// 视口交互参数。
#[derive(Debug, Clone, Deserialize)]
pub struct ViewportConfig {
    #[serde(default = "ViewportConfig::default_snap_threshold")]
    pub snap_threshold_px: f64,
    #[serde(default = "ViewportConfig::default_history_limit")]
    pub history_limit: usize,
    #[serde(default = "ViewportConfig::default_wheel_step")]
    pub wheel_zoom_step: f64,
    #[serde(default = "ViewportConfig::default_orbit_step")]
    pub orbit_step_degrees: f64,
    #[serde(default = "ViewportConfig::default_pan_step")]
    pub pan_step_px: f64,
}

impl ViewportConfig {
    fn default_snap_threshold() -> f64 {
        14.0
    }

    fn default_history_limit() -> usize {
        64
    }

    fn default_wheel_step() -> f64 {
        1.1
    }

    fn default_orbit_step() -> f64 {
        15.0
    }

    fn default_pan_step() -> f64 {
        50.0
    }

    fn validate(&self) -> Result<(), ConfigError> {
        positive("viewport.snap_threshold_px", self.snap_threshold_px)?;
        if self.history_limit == 0 {
            return Err(ConfigError::Invalid {
                field: "viewport.history_limit",
                message: "必须至少为 1".to_string(),
            });
        }
        if !(self.wheel_zoom_step.is_finite() && self.wheel_zoom_step > 1.0) {
            return Err(ConfigError::Invalid {
                field: "viewport.wheel_zoom_step",
                message: format!("必须大于 1，当前为 {}", self.wheel_zoom_step),
            });
        }
        positive("viewport.orbit_step_degrees", self.orbit_step_degrees)?;
        positive("viewport.pan_step_px", self.pan_step_px)
    }
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            snap_threshold_px: Self::default_snap_threshold(),
            history_limit: Self::default_history_limit(),
            wheel_zoom_step: Self::default_wheel_step(),
            orbit_step_degrees: Self::default_orbit_step(),
            pan_step_px: Self::default_pan_step(),
        }
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            field,
            message: format!("必须为正数，当前为 {value}"),
        })
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读取配置文件 {path:?} 失败: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("解析配置文件 {path:?} 失败: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("配置项 {field} 无效: {message}")]
    Invalid {
        field: &'static str,
        message: String,
    },
    #[error("{message}")]
    Context {
        message: String,
        #[source]
        source: std::io::Error,
    },
}
