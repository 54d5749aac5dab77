// setter.rs — 壁纸设置工具
// swaybg / wbg 需要常驻进程显示壁纸，swww 通过守护进程切换，system 走 wallpaper 库

use std::ffi::OsStr;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::process::{Child, Command};

use crate::cancel::CancelToken;
use crate::error::{Error, Result};

/// 设置壁纸的外部协作者
#[async_trait]
pub trait WallpaperSetter: Send + Sync {
    /// 把 `path` 设为 `output` 上的壁纸，`output` 为空表示所有输出
    async fn change(&self, cancel: &CancelToken, path: &Path, output: &str) -> Result<()>;

    /// 壁纸是否依赖本进程：进程退出或 [`close`](Self::close) 会撤下壁纸
    ///
    /// 为真时一次性运行要等到中断才能清理退出。
    fn holds_wallpaper(&self) -> bool {
        false
    }

    /// 进程退出前的清理
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// 可选的壁纸工具
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SetterKind {
    Swaybg,
    Swww,
    Wbg,
    System,
}

impl SetterKind {
    pub const ALL: [SetterKind; 4] = [
        SetterKind::Swaybg,
        SetterKind::Swww,
        SetterKind::Wbg,
        SetterKind::System,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SetterKind::Swaybg => "swaybg",
            SetterKind::Swww => "swww",
            SetterKind::Wbg => "wbg",
            SetterKind::System => "system",
        }
    }
}

impl fmt::Display for SetterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SetterKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        SetterKind::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::UnknownSetter(s.to_string()))
    }
}

/// 在 PATH 中查找可执行文件
pub(crate) fn lookup(name: &str) -> Result<PathBuf> {
    let paths = std::env::var_os("PATH").unwrap_or_default();
    std::env::split_paths(&paths)
        .map(|dir| dir.join(name))
        .find(|p| p.is_file())
        .ok_or_else(|| Error::UtilityNotFound(name.to_string()))
}

/// 根据种类构造壁纸工具；二进制不在 PATH 中时返回错误
pub fn build(kind: SetterKind) -> Result<Box<dyn WallpaperSetter>> {
    let setter: Box<dyn WallpaperSetter> = match kind {
        SetterKind::Swaybg => Box::new(Persistent::new(kind, lookup("swaybg")?)),
        SetterKind::Wbg => Box::new(Persistent::new(kind, lookup("wbg")?)),
        SetterKind::Swww => Box::new(Swww::new(lookup("swww")?)),
        SetterKind::System => Box::new(System),
    };
    Ok(setter)
}

/// 常驻进程类工具（swaybg、wbg）
///
/// 每次切换启动新进程并结束上一个，关闭时结束当前进程。
pub struct Persistent {
    kind: SetterKind,
    bin: PathBuf,
    child: Mutex<Option<Child>>,
}

impl Persistent {
    pub fn new(kind: SetterKind, bin: PathBuf) -> Self {
        Self {
            kind,
            bin,
            child: Mutex::new(None),
        }
    }

    fn command(&self, path: &Path, output: &str) -> Command {
        let mut cmd = Command::new(&self.bin);
        match self.kind {
            SetterKind::Wbg => {
                cmd.arg(path);
            }
            _ => {
                let output = if output.is_empty() { "*" } else { output };
                cmd.arg("-i").arg(path).arg("-o").arg(output);
            }
        }
        cmd.kill_on_drop(true);
        cmd
    }

    fn replace_child(&self, child: Option<Child>) -> Option<Child> {
        match self.child.lock() {
            Ok(mut guard) => std::mem::replace(&mut *guard, child),
            Err(poisoned) => std::mem::replace(&mut *poisoned.into_inner(), child),
        }
    }
}

#[async_trait]
impl WallpaperSetter for Persistent {
    async fn change(&self, cancel: &CancelToken, path: &Path, output: &str) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let child = self.command(path, output).spawn().map_err(|e| Error::Setter {
            tool: self.kind.to_string(),
            source: e,
        })?;
        tracing::debug!(tool = %self.kind, path = %path.display(), output, "started wallpaper process");

        if let Some(mut previous) = self.replace_child(Some(child)) {
            let _ = previous.start_kill();
        }
        Ok(())
    }

    fn holds_wallpaper(&self) -> bool {
        true
    }

    async fn close(&self) -> Result<()> {
        if let Some(mut child) = self.replace_child(None) {
            let _ = child.kill().await;
        }
        Ok(())
    }
}

/// swww：通过 swww-daemon 切换，命令本身很快退出；关闭时 `swww clear`
pub struct Swww {
    bin: PathBuf,
}

impl Swww {
    pub fn new(bin: PathBuf) -> Self {
        Self { bin }
    }

    async fn run(&self, cancel: &CancelToken, args: Vec<&OsStr>) -> Result<()> {
        let mut cmd = Command::new(&self.bin);
        cmd.args(args).kill_on_drop(true);

        let out = cancel
            .guard(async {
                cmd.output().await.map_err(|e| Error::Setter {
                    tool: SetterKind::Swww.to_string(),
                    source: e,
                })
            })
            .await?;

        if !out.status.success() {
            return Err(Error::SetterFailed {
                tool: SetterKind::Swww.to_string(),
                message: String::from_utf8_lossy(&out.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl WallpaperSetter for Swww {
    async fn change(&self, cancel: &CancelToken, path: &Path, output: &str) -> Result<()> {
        let mut args: Vec<&OsStr> = vec![OsStr::new("img"), path.as_os_str()];
        if !output.is_empty() {
            args.push(OsStr::new("-o"));
            args.push(OsStr::new(output));
        }
        self.run(cancel, args).await
    }

    fn holds_wallpaper(&self) -> bool {
        true
    }

    async fn close(&self) -> Result<()> {
        self.run(&CancelToken::never(), vec![OsStr::new("clear")]).await
    }
}

/// 调用 wallpaper 库，自动识别桌面环境
pub struct System;

#[async_trait]
impl WallpaperSetter for System {
    async fn change(&self, cancel: &CancelToken, path: &Path, _output: &str) -> Result<()> {
        let path_str = path
            .to_str()
            .ok_or_else(|| Error::Config(format!("path is not valid UTF-8: {}", path.display())))?
            .to_string();

        let task = tokio::task::spawn_blocking(move || {
            wallpaper::set_from_path(&path_str).map_err(|e| e.to_string())
        });

        let res = cancel
            .guard(async {
                task.await.map_err(|e| Error::SetterFailed {
                    tool: SetterKind::System.to_string(),
                    message: e.to_string(),
                })
            })
            .await?;

        res.map_err(|message| Error::SetterFailed {
            tool: SetterKind::System.to_string(),
            message,
        })
    }
}

/// 不设置壁纸，只记录路径（fetch 子命令使用）
pub struct DryRun;

#[async_trait]
impl WallpaperSetter for DryRun {
    async fn change(&self, _cancel: &CancelToken, path: &Path, output: &str) -> Result<()> {
        tracing::info!(path = %path.display(), output, "dry run, wallpaper unchanged");
        Ok(())
    }
}
