// config.rs — 配置管理模块
// 遵循 Unix 风格：从 ~/.config/wallseek/config.toml 读取配置

use schemars::JsonSchema; // 引入用于生成 JSON Schema 的 trait
use serde::{Deserialize, Serialize}; // 引入序列化与反序列化 trait
use shellexpand::tilde; // 用于展开 ~ 和环境变量
use std::env; // 环境变量模块
use std::fs; // 文件系统模块
use std::path::{Path, PathBuf}; // 路径处理类型
use std::time::Duration;

use crate::error::{Error, Result};
use crate::output::Resolution;
use crate::setter::SetterKind;
use crate::source::{SourceKind, SourceSettings};

/// 展开路径中的 ~ 和环境变量，相对路径则相对于 `home`
fn expand_path(path_str: &str, home: &Path) -> PathBuf {
    let p = PathBuf::from(tilde(path_str).into_owned());
    if p.is_absolute() { p } else { home.join(p) }
}

/// 映射 config.toml 文件内容的嵌套结构体
#[derive(Debug, Deserialize, Serialize, Default, JsonSchema)]
struct ConfigFile {
    #[serde(default)]
    common: CommonConfig,
    #[serde(default)]
    source: SourceConfigs,
    #[serde(default)]
    follow: FollowConfig,
    #[serde(default)]
    http: HttpConfig,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
struct CommonConfig {
    /// 壁纸保存目录 (支持 ~、$HOME 等环境变量，相对路径则相对于 $HOME)
    save_dir: Option<String>,
    /// 图片来源 (unsplash / nasa / local)
    #[serde(default = "default_source")]
    source: String,
    /// 壁纸工具 (swaybg / swww / wbg / system)
    #[serde(default = "default_setter")]
    setter: String,
    /// 显示器输出 ID，如 eDP-1；留空表示所有输出
    #[serde(default)]
    output: String,
    /// 目标分辨率，如 1920x1080；auto 表示用 xrandr 检测输出的当前分辨率；留空表示不限
    #[serde(default = "default_resolution")]
    resolution: String,
    /// 固定搜索短语
    #[serde(default)]
    phrase: Option<String>,
    /// 没有可用短语时使用
    #[serde(default)]
    fallback_phrase: Option<String>,
    /// 随机短语列表，留空则使用内置列表
    #[serde(default)]
    phrases: Vec<String>,
    /// 每次更新最多尝试几次搜索
    #[serde(default = "default_retry_count")]
    retry_count: usize,
    /// 是否把关键词写进文件名
    #[serde(default)]
    tag_files: bool,
    /// 保存文件名前缀
    #[serde(default = "default_prefix")]
    file_prefix: String,
}

impl Default for CommonConfig {
    fn default() -> Self {
        Self {
            save_dir: None,
            source: default_source(),
            setter: default_setter(),
            output: String::new(),
            resolution: default_resolution(),
            phrase: None,
            fallback_phrase: None,
            phrases: Vec::new(),
            retry_count: default_retry_count(),
            tag_files: false,
            file_prefix: default_prefix(),
        }
    }
}

const AUTO_RESOLUTION: &str = "auto";

fn default_source() -> String {
    "nasa".to_string()
}
fn default_setter() -> String {
    "swaybg".to_string()
}
fn default_resolution() -> String {
    "1920x1080".to_string()
}
fn default_retry_count() -> usize {
    3
}
fn default_prefix() -> String {
    crate::store::DEFAULT_PREFIX.to_string()
}
fn default_interval() -> String {
    "1h".to_string()
}
fn default_timeout() -> u64 {
    30
}

#[derive(Debug, Deserialize, Serialize, Default, JsonSchema)]
struct SourceConfigs {
    #[serde(default)]
    unsplash: UnsplashConfig,
    #[serde(default)]
    local: LocalConfig,
}

#[derive(Debug, Deserialize, Serialize, Default, JsonSchema)]
struct UnsplashConfig {
    access_key: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Default, JsonSchema)]
struct LocalConfig {
    /// 本地图片目录
    dir: Option<String>,
}

/// 定时更新配置
#[derive(Debug, Deserialize, Serialize, JsonSchema)]
struct FollowConfig {
    /// 更新间隔，如 30m、1h、1h30m
    #[serde(default = "default_interval")]
    interval: String,
}

impl Default for FollowConfig {
    fn default() -> Self {
        Self {
            interval: default_interval(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
struct HttpConfig {
    /// 单个请求的超时秒数
    #[serde(default = "default_timeout")]
    timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
        }
    }
}

/// 应用全局配置项
#[derive(Debug)]
pub struct AppConfig {
    /// 壁纸保存目录
    pub save_dir: PathBuf,
    pub source: String,
    pub setter: String,
    pub output: String,
    pub resolution: String,
    pub phrase: Option<String>,
    pub fallback_phrase: Option<String>,
    pub phrases: Vec<String>,
    pub retry_count: usize,
    pub tag_files: bool,
    pub file_prefix: String,
    /// Unsplash Access Key (优先级：ENV > TOML)
    pub unsplash_access_key: Option<String>,
    pub local_dir: Option<PathBuf>,
    pub follow_interval: String,
    pub http_timeout_secs: u64,
    /// 配置文件所在路径
    pub config_path: PathBuf,
    /// 相对路径的基准目录
    home: PathBuf,
}

impl AppConfig {
    /// 从 ~/.config/wallseek/config.toml 加载配置
    pub fn load() -> Result<Self> {
        let home = env::var("HOME")
            .map_err(|_| Error::Config("cannot read $HOME".to_string()))?;
        let home_path = PathBuf::from(&home);
        let config_path = home_path.join(".config").join("wallseek").join("config.toml");
        Self::load_from(&config_path, &home_path)
    }

    /// 从指定文件加载；文件不存在时使用默认值
    pub fn load_from(config_path: &Path, home: &Path) -> Result<Self> {
        let file = Self::read_file(config_path)?;

        // 优先级：环境变量 > 配置文件内容
        let unsplash_access_key = env::var("UNSPLASH_ACCESS_KEY")
            .ok()
            .filter(|k| !k.is_empty())
            .or(file.source.unsplash.access_key);

        // 未配置时默认使用 $HOME/Pictures/wallseek
        let save_dir = match &file.common.save_dir {
            Some(dir) => expand_path(dir, home),
            None => home.join("Pictures").join("wallseek"),
        };
        let local_dir = file.source.local.dir.as_deref().map(|d| expand_path(d, home));

        let common = file.common;
        Ok(Self {
            save_dir,
            source: common.source,
            setter: common.setter,
            output: common.output,
            resolution: common.resolution,
            phrase: common.phrase,
            fallback_phrase: common.fallback_phrase,
            phrases: common.phrases,
            retry_count: common.retry_count,
            tag_files: common.tag_files,
            file_prefix: common.file_prefix,
            unsplash_access_key,
            local_dir,
            follow_interval: file.follow.interval,
            http_timeout_secs: file.http.timeout_secs,
            config_path: config_path.to_path_buf(),
            home: home.to_path_buf(),
        })
    }

    /// 辅助函数：解析 TOML 配置文件
    fn read_file(path: &Path) -> Result<ConfigFile> {
        match fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content)
                .map_err(|e| Error::Config(format!("{}: {}", path.display(), e))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ConfigFile::default()),
            Err(e) => Err(Error::io(path, e)),
        }
    }

    /// 确保配置目录与保存目录存在
    pub fn ensure_dirs(&self) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        fs::create_dir_all(&self.save_dir).map_err(|e| Error::io(&self.save_dir, e))
    }

    pub fn source_kind(&self) -> Result<SourceKind> {
        self.source.parse()
    }

    pub fn setter_kind(&self) -> Result<SetterKind> {
        self.setter.parse()
    }

    /// 空字符串和 auto 都返回 `None`，auto 由 [`Self::detect_resolution`] 区分
    pub fn target_resolution(&self) -> Result<Option<Resolution>> {
        let s = self.resolution.trim();
        if s.is_empty() || self.detect_resolution() {
            return Ok(None);
        }
        s.parse().map(Some)
    }

    /// 是否需要检测显示器的当前分辨率
    pub fn detect_resolution(&self) -> bool {
        self.resolution.trim().eq_ignore_ascii_case(AUTO_RESOLUTION)
    }

    pub fn interval(&self) -> Result<Duration> {
        parse_interval(&self.follow_interval)
    }

    pub fn source_settings(&self) -> SourceSettings {
        SourceSettings {
            unsplash_access_key: self.unsplash_access_key.clone(),
            local_dir: self.local_dir.clone(),
            timeout: Some(Duration::from_secs(self.http_timeout_secs)),
        }
    }

    /// 修改单个配置项，值会先校验
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "phrase" | "query" => self.phrase = Some(value.to_string()).filter(|v| !v.is_empty()),
            "fallback_phrase" => {
                self.fallback_phrase = Some(value.to_string()).filter(|v| !v.is_empty())
            }
            "res" | "resolution" => {
                if !value.is_empty() && !value.eq_ignore_ascii_case(AUTO_RESOLUTION) {
                    value.parse::<Resolution>()?;
                }
                self.resolution = value.to_string();
            }
            "source" => {
                value.parse::<SourceKind>()?;
                self.source = value.to_string();
            }
            "setter" | "tool" => {
                value.parse::<SetterKind>()?;
                self.setter = value.to_string();
            }
            "output" => self.output = value.to_string(),
            "save_dir" => self.save_dir = expand_path(value, &self.home),
            "retry_count" => {
                self.retry_count = value
                    .parse()
                    .ok()
                    .filter(|n| *n > 0)
                    .ok_or_else(|| Error::Config(format!("invalid retry count {value:?}")))?;
            }
            "interval" => {
                parse_interval(value)?;
                self.follow_interval = value.to_string();
            }
            _ => return Err(Error::Config(format!("unknown key {key:?}"))),
        }
        Ok(())
    }

    fn to_file(&self) -> ConfigFile {
        ConfigFile {
            common: CommonConfig {
                save_dir: Some(self.save_dir.to_string_lossy().to_string()),
                source: self.source.clone(),
                setter: self.setter.clone(),
                output: self.output.clone(),
                resolution: self.resolution.clone(),
                phrase: self.phrase.clone(),
                fallback_phrase: self.fallback_phrase.clone(),
                phrases: self.phrases.clone(),
                retry_count: self.retry_count,
                tag_files: self.tag_files,
                file_prefix: self.file_prefix.clone(),
            },
            source: SourceConfigs {
                unsplash: UnsplashConfig {
                    access_key: self.unsplash_access_key.clone(),
                },
                local: LocalConfig {
                    dir: self.local_dir.as_ref().map(|d| d.to_string_lossy().to_string()),
                },
            },
            follow: FollowConfig {
                interval: self.follow_interval.clone(),
            },
            http: HttpConfig {
                timeout_secs: self.http_timeout_secs,
            },
        }
    }

    /// 将配置保存回文件
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        let toml_str = toml::to_string_pretty(&self.to_file())
            .map_err(|e| Error::Config(e.to_string()))?;
        fs::write(&self.config_path, toml_str).map_err(|e| Error::io(&self.config_path, e))
    }

    /// 获取配置文件的 JSON Schema
    pub fn get_schema() -> String {
        let schema = schemars::schema_for!(ConfigFile);
        serde_json::to_string_pretty(&schema).unwrap_or_default()
    }

    /// 将当前配置转换为 TOML 字符串
    pub fn to_toml(&self) -> String {
        let toml_str = toml::to_string_pretty(&self.to_file())
            .unwrap_or_else(|_| "# Error serializing config".to_string());

        // toml 库不支持带注释序列化，所以手动插入
        toml_str.replace(
            "[source.unsplash]",
            "# 图片来源: nasa (default), unsplash, local\n# 不配置 access_key 时使用 Unsplash 网页接口\n[source.unsplash]",
        )
    }
}

/// 解析 `1h30m`、`45s`、`2d` 这样的时间间隔
pub fn parse_interval(s: &str) -> Result<Duration> {
    let invalid = || Error::InvalidInterval(s.to_string());
    let s = s.trim();
    if s.is_empty() {
        return Err(invalid());
    }

    let mut total = 0u64;
    let mut digits = String::new();
    for c in s.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        let n: u64 = digits.parse().map_err(|_| invalid())?;
        let unit = match c {
            'd' => 86_400,
            'h' => 3_600,
            'm' => 60,
            's' => 1,
            _ => return Err(invalid()),
        };
        total = n
            .checked_mul(unit)
            .and_then(|v| total.checked_add(v))
            .ok_or_else(invalid)?;
        digits.clear();
    }

    // 末尾的数字没有单位
    if !digits.is_empty() || total == 0 {
        return Err(invalid());
    }
    Ok(Duration::from_secs(total))
}
