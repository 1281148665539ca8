use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use dxfview_config::{AppConfig, ConfigError};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser, Debug)]
#[command(name = "dxfview", version, about = "DXF 视口引擎演示")]
struct Cli {
    /// 配置文件路径，缺省时按 DXFVIEW_CONFIG 与 ./config/default.toml 查找
    #[arg(long)]
    config: Option<PathBuf>,
    /// JSON 场景文件，覆盖配置中的 frontend.scene_path
    #[arg(long)]
    scene: Option<PathBuf>,
    #[arg(long)]
    width: Option<f64>,
    #[arg(long)]
    height: Option<f64>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let (mut config, discovery_error) = load_configuration(cli.config.as_deref())?;
    apply_overrides(&mut config, &cli);
    config.validate().context("命令行参数无效")?;

    init_logging(&config);
    if let Some(err) = discovery_error {
        report_discovery_failure(&err);
    }
    info!("启动 DXF 视口引擎演示");

    let summary = dxfview_frontend::run_cli_demo(&config).context("执行 CLI 演示失败")?;
    info!(
        commands = summary.command_log.len(),
        events = summary.event_count,
        "CLI 演示结束"
    );
    Ok(())
}

/// 显式指定的配置加载失败时直接报错；自动发现失败则回退到内建默认值，
/// 错误随结果返回，待日志初始化后再输出。
fn load_configuration(
    override_path: Option<&std::path::Path>,
) -> Result<(AppConfig, Option<ConfigError>)> {
    if let Some(path) = override_path {
        let config = AppConfig::from_file(path)
            .with_context(|| format!("加载配置 {} 失败", path.display()))?;
        return Ok((config, None));
    }
    match AppConfig::discover() {
        Ok(config) => Ok((config, None)),
        Err(err) => Ok((AppConfig::default(), Some(err))),
    }
}

fn report_discovery_failure(err: &ConfigError) {
    match err {
        ConfigError::Io { path, .. } | ConfigError::Parse { path, .. } => {
            warn!(path = %path.display(), error = %err, "加载默认配置失败，使用内建默认值");
        }
        ConfigError::Invalid { .. } | ConfigError::Context { .. } => {
            warn!(error = %err, "加载默认配置失败，使用内建默认值");
        }
    }
}

fn apply_overrides(config: &mut AppConfig, cli: &Cli) {
    if let Some(scene) = &cli.scene {
        config.frontend.scene_path = Some(scene.clone());
    }
    if let Some(width) = cli.width {
        config.frontend.viewport_width = width;
    }
    if let Some(height) = cli.height {
        config.frontend.viewport_height = height;
    }
}

fn init_logging(config: &AppConfig) {
    let (filter, rejected) = match EnvFilter::try_new(&config.logging.level) {
        Ok(filter) => (filter, None),
        Err(err) => (EnvFilter::new("info"), Some(err)),
    };
    let subscriber = fmt().with_env_filter(filter).with_writer(std::io::stderr);
    if subscriber.try_init().is_err() {
        warn!("日志系统已初始化，忽略重复设置");
    }
    if let Some(err) = rejected {
        warn!(filter = %config.logging.level, error = %err, "无效的日志过滤器，改用 info");
    }
}
