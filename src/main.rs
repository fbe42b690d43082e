//! 类路径解析命令行工具
//!
//! 读取平台定义文件，计算模块类路径或查询受影响的模块。
//!
//! # 命令概览
//!
//! - `resolve` - 计算并打印模块的类路径与诊断
//! - `affected` - 列出依赖某模块的全部模块
//! - `check-platform` - 校验平台定义文件
//! - `check-config` - 校验配置文件
//! - `version` - 显示版本信息
//!
//! # 使用示例
//!
//! ```bash
//! classpath-resolver resolve org.example.app -p platform.yaml
//! classpath-resolver resolve org.example.app -p platform.yaml --json
//! classpath-resolver affected org.example.core -p platform.yaml
//! classpath-resolver -c resolver.yaml check-config
//! ```

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};

use bundle_classpath::{
    ClasspathService, LogGuard, Logger, LoggerConfig, PlatformDefinition, PlatformParser,
    Resolution, ResolverConfig,
};

/// 模块类路径解析工具
#[derive(Parser)]
#[command(name = "classpath-resolver")]
#[command(version, about = "计算模块的编译类路径", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// 配置文件路径
    #[arg(short, long, default_value = "resolver.yaml", global = true)]
    config: PathBuf,

    /// 日志级别 (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// 子命令
    #[command(subcommand)]
    command: Commands,
}

/// 可用的子命令
#[derive(Subcommand)]
enum Commands {
    /// 计算模块的类路径
    Resolve {
        /// 模块符号名
        module: String,

        /// 平台定义文件
        #[arg(short, long)]
        platform: PathBuf,

        /// 以 JSON 输出完整结果
        #[arg(long)]
        json: bool,
    },

    /// 列出依赖给定模块的全部模块（含传递依赖）
    Affected {
        /// 模块符号名
        module: String,

        /// 平台定义文件
        #[arg(short, long)]
        platform: PathBuf,
    },

    /// 校验平台定义文件
    CheckPlatform {
        /// 平台定义文件
        platform: PathBuf,
    },

    /// 校验配置文件
    CheckConfig,

    /// 查看版本信息
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Resolve {
            module,
            platform,
            json,
        } => {
            let config = load_config(&cli.config).await?;
            let _guard = init_logging(&config, cli.log_level.as_deref());
            resolve(config, &platform, &module, json).await?;
        }
        Commands::Affected { module, platform } => {
            let config = load_config(&cli.config).await?;
            let _guard = init_logging(&config, cli.log_level.as_deref());
            affected(&platform, &module).await?;
        }
        Commands::CheckPlatform { platform } => check_platform(&platform).await?,
        Commands::CheckConfig => check_config(&cli.config).await?,
        Commands::Version => print_version(),
    }

    Ok(())
}

/// 加载配置文件，文件不存在时使用默认配置
async fn load_config(path: &Path) -> anyhow::Result<ResolverConfig> {
    if !path.exists() {
        return Ok(ResolverConfig::default());
    }
    ResolverConfig::from_file(path)
        .await
        .with_context(|| format!("加载配置文件 '{}' 失败", path.display()))
}

/// 命令行默认只输出警告以上，避免与结果混在一起
fn init_logging(config: &ResolverConfig, level: Option<&str>) -> LogGuard {
    let mut logger = LoggerConfig::from_log_config(&config.logging);
    logger.level = level.unwrap_or("warn").to_string();
    Logger::try_init(logger)
}

async fn load_platform(path: &Path) -> anyhow::Result<PlatformDefinition> {
    PlatformParser::parse_file(path)
        .await
        .with_context(|| format!("解析平台定义 '{}' 失败", path.display()))
}

async fn resolve(
    mut config: ResolverConfig,
    platform_path: &Path,
    module: &str,
    json: bool,
) -> anyhow::Result<()> {
    let platform = load_platform(platform_path).await?;
    let root = platform
        .find(module)
        .ok_or_else(|| anyhow!("平台定义中没有模块 '{}'", module))?
        .identity();

    // 平台定义中的执行环境优先于配置文件
    if !platform.profiles.is_empty() {
        config.profiles.environments = platform.profiles.clone();
        config.profiles.default_environment = platform.default_environment.clone();
    }

    let service = ClasspathService::new(config, platform.registry());
    let result = service.get_classpath(&root).await;
    service.shutdown().await;
    let resolution = result?;

    if json {
        println!("{}", serde_json::to_string_pretty(&*resolution)?);
    } else {
        print_resolution(&resolution);
    }

    if resolution.has_errors() {
        let errors = resolution.diagnostics.iter().filter(|d| d.is_error()).count();
        anyhow::bail!("模块 '{}' 的类路径存在 {} 个错误", resolution.root, errors);
    }
    Ok(())
}

fn print_resolution(resolution: &Resolution) {
    println!("模块:     {}", resolution.root);
    println!(
        "执行环境: {}",
        resolution.profile.as_deref().unwrap_or("(无)")
    );
    println!();
    println!("类路径 ({} 个条目):", resolution.classpath.len());
    for (index, entry) in resolution.classpath.iter().enumerate() {
        println!("  {:>3}. {}", index + 1, entry.location.display());
        for rule in &entry.access_rules {
            println!("         {:?} {}", rule.kind, rule.pattern);
        }
    }

    if !resolution.diagnostics.is_empty() {
        println!();
        println!("诊断 ({} 条):", resolution.diagnostics.len());
        for diagnostic in &resolution.diagnostics {
            println!("  {}", diagnostic);
        }
    }
}

async fn affected(platform_path: &Path, module: &str) -> anyhow::Result<()> {
    let platform = load_platform(platform_path).await?;
    let registry = platform.registry();
    let affected = registry.affected_by([module]);

    if affected.is_empty() {
        println!("没有模块依赖 '{}'", module);
        return Ok(());
    }
    for identity in affected {
        println!("{}", identity);
    }
    Ok(())
}

async fn check_platform(path: &Path) -> anyhow::Result<()> {
    let platform = load_platform(path).await?;
    println!("平台定义有效: {}", path.display());
    println!("  工作区模块: {}", platform.workspace.len());
    println!("  外部模块:   {}", platform.external.len());
    println!("  执行环境:   {}", platform.profiles.len());
    if let Some(default) = &platform.default_environment {
        println!("  默认环境:   {}", default);
    }
    Ok(())
}

async fn check_config(path: &Path) -> anyhow::Result<()> {
    if !path.exists() {
        println!("配置文件不存在 ({})，将使用默认配置", path.display());
        print_config(&ResolverConfig::default());
        return Ok(());
    }

    let config = ResolverConfig::from_file(path)
        .await
        .with_context(|| format!("配置文件 '{}' 无效", path.display()))?;
    println!("配置文件有效: {}", path.display());
    print_config(&config);
    Ok(())
}

fn print_config(config: &ResolverConfig) {
    println!("────────────────────────────────────────");
    println!("  [调度器]");
    println!("    防抖时间:   {} ms", config.scheduler.debounce_ms);
    println!("    并行解析数: {}", config.scheduler.worker_count);
    println!("    缓存容量:   {}", config.scheduler.cache_capacity);
    println!("    队列上限:   {}", config.scheduler.queue_size);
    println!();
    println!("  [日志]");
    println!("    日志级别:   {}", config.logging.level);
    println!("    文件输出:   {}", if config.logging.file_output { "是" } else { "否" });
    println!("    JSON 格式:  {}", if config.logging.json_format { "是" } else { "否" });
    println!();
    println!("  [执行环境]");
    for env in &config.profiles.environments {
        println!("    {} ({} 个系统包)", env.id, env.system_packages.len());
    }
    if let Some(default) = &config.profiles.default_environment {
        println!("    默认: {}", default);
    }
    println!("────────────────────────────────────────");
}

fn print_version() {
    println!("classpath-resolver {}", bundle_classpath::VERSION);
    println!("  目标平台: {}", std::env::consts::ARCH);
    println!("  操作系统: {}", std::env::consts::OS);
}
