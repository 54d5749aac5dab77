// swww 单次更新：设置壁纸后保持，直到取消才执行 clear
#![cfg(unix)]

mod common;

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use wallseek::setter::Swww;
use wallseek::{
    CancelHandle, CancelToken, Image, ImageSource, Monitor, Resolution, Result, UpdateParams,
    WallpaperService,
};

struct FixedImage;

#[async_trait]
impl ImageSource for FixedImage {
    async fn search(
        &self,
        _cancel: &CancelToken,
        _query: &str,
        _resolution: Option<Resolution>,
    ) -> Result<Image> {
        Image::from_bytes(common::jpeg(1920, 1080))
    }
}

/// 把参数逐行追加到 log 的假 swww
fn fake_swww(dir: &Path, log: &Path) -> PathBuf {
    let bin = dir.join("swww");
    let script = format!("#!/bin/sh\necho \"$@\" >> '{}'\n", log.display());
    std::fs::write(&bin, script).unwrap();
    std::fs::set_permissions(&bin, std::fs::Permissions::from_mode(0o755)).unwrap();
    bin
}

#[tokio::test]
async fn one_shot_swww_update_keeps_wallpaper_until_cancelled() {
    let tmp = tempfile::tempdir().unwrap();
    let log = tmp.path().join("calls.log");
    let bin = fake_swww(tmp.path(), &log);
    let service = WallpaperService::new(Box::new(FixedImage), None, Box::new(Swww::new(bin)));

    let params = UpdateParams {
        phrase: Some("mountains".into()),
        fallback_phrase: None,
        resolution: None,
        save_dir: tmp.path().join("walls"),
        file_prefix: "sw".into(),
        output: Monitor::new("eDP-1", None),
        retry_count: 1,
        tag_files: false,
    };

    let handle = CancelHandle::new();
    let token = handle.token();
    let stored = service.update(&token, &params).await.unwrap();

    let calls = std::fs::read_to_string(&log).unwrap();
    assert_eq!(calls, format!("img {} -o eDP-1\n", stored.path.display()));

    assert!(service.needs_wait(false));
    assert!(!service.needs_wait(true));

    // 未取消时 shutdown 一直等待，不会 clear
    let waited = tokio::time::timeout(Duration::from_millis(200), service.shutdown(&token, true)).await;
    assert!(waited.is_err());
    assert!(!std::fs::read_to_string(&log).unwrap().contains("clear"));

    handle.cancel();
    service.shutdown(&token, true).await.unwrap();
    let calls = std::fs::read_to_string(&log).unwrap();
    assert!(calls.ends_with("clear\n"), "{calls}");
    assert_eq!(calls.lines().count(), 2);
}
