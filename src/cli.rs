// cli.rs — 命令行接口定义模块
// 使用 clap 的 derive 模式定义所有子命令和参数

use clap::{Args, Parser, Subcommand}; // Parser: 解析命令行参数的 trait; Subcommand: 定义子命令的 trait
use clap_complete::Shell; // Shell 枚举：Bash, Zsh, Fish, Elvish, PowerShell

use wallseek::{SetterKind, SourceKind};

/// 按关键词获取壁纸的工具
///
/// 从 NASA、Unsplash 或本地目录取图，按内容保存，
/// 再交给 swaybg / swww / wbg 设置为壁纸。
#[derive(Parser)]
#[command(name = "wallseek")]
#[command(version)] // 自动从 Cargo.toml 读取 version 字段
#[command(author)] // 自动从 Cargo.toml 读取 authors 字段
#[command(about = "按关键词获取壁纸 — 支持 NASA、Unsplash 与本地目录")]
pub struct Cli {
    /// 输出调试日志
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// update 与 fetch 共用的搜索参数
#[derive(Args, Debug, Clone, Default)]
pub struct SearchArgs {
    /// 搜索关键词（如 "mountains", "nebula"）
    #[arg(short, long)]
    pub query: Option<String>,

    /// 目标分辨率，如 1920x1080；auto 表示检测显示器当前分辨率
    #[arg(short, long)]
    pub resolution: Option<String>,

    /// 图片来源
    #[arg(short, long, value_enum)]
    pub source: Option<SourceKind>,

    /// 保存目录
    #[arg(short = 'd', long)]
    pub save_dir: Option<String>,

    /// 最多尝试次数
    #[arg(long, value_name = "N")]
    pub retry: Option<usize>,

    /// 把关键词写进文件名
    #[arg(long)]
    pub tags: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 搜索、保存并设置壁纸
    ///
    /// 用法示例:
    ///   wallseek update -q mountains
    ///   wallseek update -s unsplash -t swww -o eDP-1
    ///   wallseek update --follow --interval 30m
    Update {
        #[command(flatten)]
        search: SearchArgs,

        /// 壁纸工具
        #[arg(short = 't', long, value_enum)]
        setter: Option<SetterKind>,

        /// 显示器输出 ID（不指定则为全部输出）
        #[arg(short, long)]
        output: Option<String>,

        /// 按间隔持续更新，直到 Ctrl-C
        #[arg(short, long)]
        follow: bool,

        /// 更新间隔，如 30m、1h30m
        #[arg(short, long, requires = "follow")]
        interval: Option<String>,
    },

    /// 只搜索并保存，不设置壁纸
    ///
    /// 用法示例:
    ///   wallseek fetch -q aurora -r 2560x1440
    Fetch {
        #[command(flatten)]
        search: SearchArgs,
    },

    /// 配置管理操作
    ///
    /// 用法示例:
    ///   wallseek config show
    ///   wallseek config dump
    ///   wallseek config set source unsplash
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// 生成 shell 补全脚本（支持 bash, zsh, fish, elvish, powershell）
    ///
    /// 用法示例：
    ///   wallseek completions zsh > ~/.zsh/completions/_wallseek
    ///   wallseek completions fish > ~/.config/fish/completions/wallseek.fish
    Completions {
        /// 目标 shell 类型
        shell: Shell,
    },

    /// 清理保存目录中带有文件名前缀的图片
    ///
    /// 用法示例:
    ///   wallseek clean
    Clean,
}

/// 配置管理操作
#[derive(Subcommand)]
pub enum ConfigAction {
    /// 查看当前所有配置简报
    Show,
    /// 生成配置文件对应的 JSON Schema
    Schema,
    /// 以 TOML 格式打印当前完整配置内容
    Dump,
    /// 设置配置项的值
    Set {
        /// 要设置的键 (phrase, fallback_phrase, resolution, source, setter, output, save_dir, retry_count, interval)
        key: String,
        /// 要设置的值
        value: String,
    },
}
