use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;

fn dxfview(dir: &tempfile::TempDir) -> Command {
    let mut cmd = Command::cargo_bin("dxfview").expect("找到 dxfview 可执行文件");
    cmd.current_dir(dir.path()).env_remove("DXFVIEW_CONFIG");
    cmd
}

#[test]
fn demo_session_prints_summary() {
    let dir = tempfile::tempdir().expect("创建临时目录");
    dxfview(&dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("DXF 视口引擎 CLI 演示"))
        .stdout(predicate::str::contains("已构建内置示例场景"))
        .stdout(predicate::str::contains("当前视图: 自动适配"))
        .stdout(predicate::str::contains("测量结果：Distance: 6000.000 mm"));
}

#[test]
fn scene_argument_loads_json() {
    let dir = tempfile::tempdir().expect("创建临时目录");
    let scene = dir.path().join("scene.json");
    fs::write(
        &scene,
        r#"{
            "model_space": [
                { "handle": "B1", "layer": "0", "type": "LINE", "start": [0.0, 0.0], "end": [3.0, 4.0] }
            ],
            "tables": { "layers": [ { "name": "0" } ] },
            "drawing_properties": { "insunits": 1 }
        }"#,
    )
    .expect("写入场景文件");

    dxfview(&dir)
        .arg("--scene")
        .arg(&scene)
        .args(["--width", "640", "--height", "480"])
        .assert()
        .success()
        .stdout(predicate::str::contains("已从 JSON 加载场景"))
        .stdout(predicate::str::contains("Distance: 5.000 in"));
}

#[test]
fn discovered_config_is_applied() {
    let dir = tempfile::tempdir().expect("创建临时目录");
    fs::create_dir(dir.path().join("config")).expect("创建配置目录");
    fs::write(
        dir.path().join("config").join("default.toml"),
        "[logging]\nlevel = \"warn\"\n\n[frontend]\nscene_path = \"missing.json\"\n",
    )
    .expect("写入配置");

    // 场景文件缺失时回退到内置示例
    dxfview(&dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("已构建内置示例场景"));
}

#[test]
fn malformed_discovered_config_falls_back_with_warning() {
    let dir = tempfile::tempdir().expect("创建临时目录");
    fs::create_dir(dir.path().join("config")).expect("创建配置目录");
    fs::write(dir.path().join("config").join("default.toml"), "[logging\nlevel = ")
        .expect("写入配置");

    dxfview(&dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("已构建内置示例场景"))
        .stderr(predicate::str::contains("WARN"))
        .stderr(predicate::str::contains("加载默认配置失败，使用内建默认值"));
}

#[test]
fn explicit_config_failure_is_fatal() {
    let dir = tempfile::tempdir().expect("创建临时目录");
    dxfview(&dir)
        .args(["--config", "absent.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("加载配置 absent.toml 失败"));
}

#[test]
fn invalid_viewport_size_is_rejected() {
    let dir = tempfile::tempdir().expect("创建临时目录");
    dxfview(&dir)
        .args(["--width", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("frontend.viewport_width"));
}
