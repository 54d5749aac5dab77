// main.rs — 程序入口
// 负责初始化日志与异步运行时、解析命令行参数、分发子命令

mod cli; // 声明 cli 模块，对应 src/cli.rs

// 初始化多语言支持，嵌入 locales 目录下的所有翻译
rust_i18n::i18n!("locales");

use clap::{CommandFactory, Parser}; // 引入 Parser trait 的 parse() 方法; CommandFactory 用于生成补全脚本
use clap_complete::generate; // 引入补全脚本生成函数
use cli::{Cli, Commands, ConfigAction, SearchArgs}; // 引入 CLI 结构体和子命令枚举
use rust_i18n::t; // 引入翻译宏
use tracing_subscriber::EnvFilter;

use wallseek::config::AppConfig;
use wallseek::phrase::{FixedPhrase, PhraseSource, RandomPhrase};
use wallseek::setter::{self, DryRun, WallpaperSetter};
use wallseek::source::Source;
use wallseek::{CancelHandle, CancelToken, Monitor, UpdateParams, WallpaperService};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// `#[tokio::main]` 宏将 async main 转换为同步 main + tokio 运行时
#[tokio::main]
async fn main() -> CliResult<()> {
    // 自动检测系统语言并设置
    let locale = std::env::var("LANG").unwrap_or_else(|_| "en".to_string());
    if locale.starts_with("zh") {
        rust_i18n::set_locale("zh-CN");
    } else {
        rust_i18n::set_locale("en");
    }

    // 解析命令行参数
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // 读取配置文件（不存在时使用默认值）
    let mut config = AppConfig::load()?;

    // 根据子命令分发执行逻辑
    match &cli.command {
        Commands::Update {
            search,
            setter: setter_kind,
            output,
            follow,
            interval,
        } => {
            apply_search_args(&mut config, search)?;
            if let Some(kind) = setter_kind {
                config.setter = kind.to_string();
            }
            if let Some(out) = output {
                config.output = out.clone();
            }
            if let Some(every) = interval {
                config.set("interval", every)?;
            }
            config.ensure_dirs()?;

            let setter = setter::build(config.setter_kind()?)?;
            handle_update(&config, search.query.clone(), setter, *follow).await?;
        }

        Commands::Fetch { search } => {
            apply_search_args(&mut config, search)?;
            config.ensure_dirs()?;
            handle_fetch(&config, search.query.clone()).await?;
        }

        Commands::Config { action } => {
            handle_config(&mut config, action)?;
        }

        Commands::Completions { shell } => {
            generate(
                *shell,
                &mut Cli::command(),
                "wallseek",
                &mut std::io::stdout(),
            );
        }

        Commands::Clean => {
            handle_clean(&config)?;
        }
    }

    Ok(())
}

/// 日志输出到 stderr；RUST_LOG 优先，--verbose 打开本 crate 的 debug 日志
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("info,wallseek=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// 命令行参数覆盖配置文件中的值
fn apply_search_args(config: &mut AppConfig, search: &SearchArgs) -> CliResult<()> {
    if let Some(res) = &search.resolution {
        config.set("resolution", res)?;
    }
    if let Some(kind) = search.source {
        config.source = kind.to_string();
    }
    if let Some(dir) = &search.save_dir {
        config.set("save_dir", dir)?;
    }
    if let Some(n) = search.retry {
        config.set("retry_count", &n.to_string())?;
    }
    config.tag_files |= search.tags;
    Ok(())
}

/// Ctrl-C 时触发取消
fn spawn_interrupt_handler() -> CancelToken {
    let handle = CancelHandle::new();
    let token = handle.token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("handling interrupt signal");
            handle.cancel();
        }
    });
    token
}

fn build_service(
    config: &AppConfig,
    setter: Box<dyn WallpaperSetter>,
) -> CliResult<WallpaperService> {
    let source = Source::build(config.source_kind()?, &config.source_settings())?;

    // 配置里的固定短语优先，否则从列表中随机挑
    let phrases: Box<dyn PhraseSource> = match &config.phrase {
        Some(phrase) => Box::new(FixedPhrase(phrase.clone())),
        None if config.phrases.is_empty() => Box::new(RandomPhrase::default()),
        None => Box::new(RandomPhrase::new(config.phrases.clone())),
    };

    Ok(WallpaperService::new(
        Box::new(source),
        Some(phrases),
        setter,
    ))
}

/// resolution = "auto" 时用 xrandr 检测输出的当前分辨率
async fn resolve_output(config: &AppConfig, cancel: &CancelToken) -> wallseek::Result<Monitor> {
    if config.detect_resolution() {
        Monitor::detect(&config.output, cancel).await
    } else {
        Ok(Monitor::new(config.output.clone(), None))
    }
}

fn update_params(
    config: &AppConfig,
    phrase: Option<String>,
    output: Monitor,
) -> CliResult<UpdateParams> {
    Ok(UpdateParams {
        phrase,
        fallback_phrase: config.fallback_phrase.clone(),
        resolution: config.target_resolution()?,
        save_dir: config.save_dir.clone(),
        file_prefix: config.file_prefix.clone(),
        output,
        retry_count: config.retry_count,
        tag_files: config.tag_files,
    })
}

/// 处理 update 子命令：取图、保存、设置壁纸；--follow 时按间隔循环
async fn handle_update(
    config: &AppConfig,
    phrase: Option<String>,
    setter: Box<dyn WallpaperSetter>,
    follow: bool,
) -> CliResult<()> {
    let interval = config.interval()?;
    let service = build_service(config, setter)?;
    let cancel = spawn_interrupt_handler();

    let output = match resolve_output(config, &cancel).await {
        Ok(output) => output,
        Err(e) if e.is_cancelled() => return Ok(()),
        Err(e) => return Err(e.into()),
    };
    let params = update_params(config, phrase, output)?;

    let result = run_ticks(
        &service,
        &cancel,
        &params,
        follow,
        interval,
        &config.follow_interval,
    )
    .await;

    // 非 follow 模式下，壁纸依赖本进程的工具要等到 Ctrl-C 才清理退出
    let wait = result.is_ok() && service.needs_wait(follow) && !cancel.is_cancelled();
    if wait {
        println!("{}", t!("waiting_interrupt"));
    }

    service.shutdown(&cancel, wait).await?;
    result
}

async fn run_ticks(
    service: &WallpaperService,
    cancel: &CancelToken,
    params: &UpdateParams,
    follow: bool,
    interval: std::time::Duration,
    interval_label: &str,
) -> CliResult<()> {
    loop {
        match service.update(cancel, params).await {
            Ok(stored) => {
                println!("{}", t!("wallpaper_set", path => stored.path.display()));
            }
            Err(e) if e.is_cancelled() => return Ok(()),
            Err(e) if follow => {
                tracing::error!(error = %e, "update failed");
                eprintln!("{}", t!("update_failed", error => e));
            }
            Err(e) => return Err(e.into()),
        }

        if !follow {
            return Ok(());
        }

        println!("{}", t!("follow_next", interval => interval_label));
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = cancel.cancelled() => return Ok(()),
        }
    }
}

/// 处理 fetch 子命令：只下载保存，不设置壁纸
async fn handle_fetch(config: &AppConfig, phrase: Option<String>) -> CliResult<()> {
    let service = build_service(config, Box::new(DryRun))?;
    let cancel = spawn_interrupt_handler();
    let output = match resolve_output(config, &cancel).await {
        Ok(output) => output,
        Err(e) if e.is_cancelled() => return Ok(()),
        Err(e) => return Err(e.into()),
    };
    let params = update_params(config, phrase, output)?;

    println!("{}", t!("search_start"));
    match service.fetch(&cancel, &params).await {
        Ok(stored) if stored.already_present => {
            println!("{}", t!("already_present", path => stored.path.display()));
            Ok(())
        }
        Ok(stored) => {
            println!("{}", t!("save_path", path => stored.path.display()));
            Ok(())
        }
        Err(e) if e.is_cancelled() => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// 处理 clean 子命令：清理所有以 {prefix}- 开头的文件
fn handle_clean(config: &AppConfig) -> CliResult<()> {
    let dir = &config.save_dir;
    let prefix = format!("{}-", config.file_prefix);
    let mut deleted_count = 0;

    if dir.exists() {
        println!("{}", t!("cleaning_dir", path => dir.display()));

        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            if let Some(filename) = path.file_name().and_then(|n| n.to_str()) {
                if filename.starts_with(&prefix) {
                    std::fs::remove_file(&path)?;
                    deleted_count += 1;
                    println!("  {} {}", t!("deleted"), filename);
                }
            }
        }
    }

    println!("{}", t!("clean_done", count => deleted_count));
    Ok(())
}

/// 处理 config 子命令：查看或修改配置
fn handle_config(config: &mut AppConfig, action: &ConfigAction) -> CliResult<()> {
    match action {
        ConfigAction::Show => {
            println!("{}", t!("config_title"));
            println!(
                "{}",
                t!("config_path", path => config.config_path.display())
            );
            println!(
                "{}",
                t!("config_save_dir", path => config.save_dir.display())
            );
            println!("{}", t!("config_source", source => config.source));
            println!("{}", t!("config_setter", setter => config.setter));
            let phrase = config.phrase.as_deref().unwrap_or("-");
            println!("{}", t!("config_phrase", phrase => phrase));
            let res = if config.resolution.is_empty() {
                "-"
            } else {
                config.resolution.as_str()
            };
            println!("{}", t!("config_res", res => res));
            println!(
                "{}",
                t!("config_interval", interval => config.follow_interval)
            );
        }
        ConfigAction::Schema => {
            println!("{}", AppConfig::get_schema());
        }
        ConfigAction::Dump => {
            println!("{}", config.to_toml());
        }
        ConfigAction::Set { key, value } => {
            config.set(key, value)?;
            config.save()?;
            println!("{}", t!("config_updated", key => key, value => value));
        }
    }
    Ok(())
}
