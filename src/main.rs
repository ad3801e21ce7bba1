use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use levlist_merger::{
    EspDebugger, LevelListMerger, ListKind, MergeConfig, MergeReport, Plugin, SUPPORTED_EXTENSIONS,
};
use std::path::{Path, PathBuf};
use tracing::Level;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "levlist_merger")]
#[command(about = "合并 Morrowind 插件中的等级列表 (LEVC/LEVI)")]
#[command(version = "0.1.0")]
struct Cli {
    /// 显示调试日志
    #[arg(short, long, global = true)]
    verbose: bool,

    /// 静默模式(仅输出警告和错误)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// 按加载顺序合并插件的等级列表
    Merge(MergeArgs),
    /// 显示插件统计信息
    Info {
        /// 输入ESM/ESP文件路径
        input: PathBuf,
    },
    /// 测试模式：解析文件后直接重建，用于验证解析和重建逻辑
    Rebuild {
        input: PathBuf,
        /// 重建文件输出路径
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// 输出文件结构dump
    Dump {
        input: PathBuf,
        /// dump输出路径
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args)]
struct MergeArgs {
    /// 合并配置文件(JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 输出文件路径
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// 不参与合并的插件(可重复)，追加到配置中的黑名单
    #[arg(long = "never-merge", value_name = "NAME")]
    never_merge: Vec<String>,

    /// 保留只出现在一个插件中的列表
    #[arg(long)]
    keep_unmerged: bool,

    /// 将合并报告写入JSON文件
    #[arg(long, value_name = "FILE")]
    report_json: Option<PathBuf>,

    /// 按加载顺序排列的插件
    #[arg(required = true)]
    plugins: Vec<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    match cli.command {
        Command::Merge(args) => handle_merge(args),
        Command::Info { input } => handle_info(&input),
        Command::Rebuild { input, output } => handle_rebuild(&input, output),
        Command::Dump { input, output } => handle_dump(&input, output),
    }
}

/// 初始化日志；RUST_LOG 优先
fn init_logging(cli: &Cli) {
    let level = if cli.verbose {
        Level::DEBUG
    } else if cli.quiet {
        Level::WARN
    } else {
        Level::INFO
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,levlist_merger={level}",
            level = level.as_str().to_lowercase()
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// 验证输入文件
fn validate_input(input: &Path) -> Result<()> {
    if !input.exists() {
        bail!("输入文件不存在: {:?}", input);
    }

    let extension = input
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase());

    if !SUPPORTED_EXTENSIONS.iter().any(|&ext| Some(ext) == extension.as_deref()) {
        bail!("输入文件必须是ESM、ESP或OMWADDON文件: {:?}", input);
    }

    Ok(())
}

/// 处理合并
fn handle_merge(args: MergeArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => MergeConfig::load(path)
            .with_context(|| format!("读取配置文件失败: {:?}", path))?,
        None => MergeConfig::default(),
    };

    if let Some(output) = args.output {
        config.output = output;
    }
    config.never_merge.extend(args.never_merge);
    if args.keep_unmerged {
        config.keep_unmerged = true;
    }

    for plugin in &args.plugins {
        validate_input(plugin)?;
    }

    let output_path = config.output.clone();
    let backup = config.backup_existing;
    let merger = LevelListMerger::new(config);

    let mut outcome = merger.run(&args.plugins).context("合并失败")?;
    print_merge_summary(&outcome.report);

    let backup_path = outcome
        .write(&output_path, backup)
        .with_context(|| format!("写入合并结果失败: {:?}", output_path))?;
    if let Some(backup_path) = backup_path {
        println!("已备份原文件: {:?}", backup_path);
    }
    println!(
        "合并完成: {} 个列表，输出到 {:?}",
        outcome.plugin.records().len(),
        output_path
    );

    if let Some(report_path) = &args.report_json {
        let json = serde_json::to_string_pretty(&outcome.report).context("序列化合并报告失败")?;
        std::fs::write(report_path, json)
            .with_context(|| format!("写入合并报告失败: {:?}", report_path))?;
        println!("合并报告已写入: {:?}", report_path);
    }

    Ok(())
}

/// 打印每个插件新增和合并的列表
fn print_merge_summary(report: &MergeReport) {
    for name in &report.skipped {
        println!("跳过: {}", name);
    }

    for step in &report.steps {
        if step.diff.is_empty() {
            println!("{}: 无变化", step.plugin);
            continue;
        }

        println!("{}:", step.plugin);
        for kind in ListKind::ALL {
            let diff = step.diff.get(kind);
            if !diff.added.is_empty() {
                println!("  [{}] 新增: {}", kind, diff.added.join(", "));
            }
            if !diff.merged.is_empty() {
                println!("  [{}] 合并: {}", kind, diff.merged.join(", "));
            }
        }
    }

    if report.removed_unmerged > 0 {
        println!("删除未合并的列表: {}", report.removed_unmerged);
    }
}

/// 处理统计信息
fn handle_info(input: &Path) -> Result<()> {
    validate_input(input)?;
    let plugin = Plugin::load(input.to_path_buf())
        .with_context(|| format!("解析插件失败: {:?}", input))?;
    println!("{}", plugin.get_stats());
    Ok(())
}

/// 处理测试重建模式
fn handle_rebuild(input: &Path, output: Option<PathBuf>) -> Result<()> {
    validate_input(input)?;
    let output_path = output.unwrap_or_else(|| get_rebuild_output_path(input));

    let mut plugin = Plugin::load(input.to_path_buf())
        .with_context(|| format!("解析插件失败: {:?}", input))?;
    plugin
        .write_to_file(&output_path)
        .with_context(|| format!("写入重建文件失败: {:?}", output_path))?;

    let original = std::fs::read(input)?;
    let rebuilt = std::fs::read(&output_path)?;

    println!("重建文件输出到: {:?}", output_path);
    println!("文件大小对比:");
    println!("  原文件: {} 字节", original.len());
    println!("  重建文件: {} 字节", rebuilt.len());

    if original == rebuilt {
        println!("✓ 重建文件与原文件逐字节一致");
        return Ok(());
    }

    println!("⚠ 重建文件与原文件不一致");
    let mut rebuilt_plugin = Plugin::load(output_path.clone())
        .with_context(|| format!("解析重建文件失败: {:?}", output_path))?;
    let mut report = Vec::new();
    let mismatches = EspDebugger::compare_structures(&mut plugin, &mut rebuilt_plugin, &mut report)?;
    print!("{}", String::from_utf8_lossy(&report));
    bail!("发现 {} 处结构差异", mismatches);
}

/// 处理结构dump
fn handle_dump(input: &Path, output: Option<PathBuf>) -> Result<()> {
    validate_input(input)?;
    let output_path = output.unwrap_or_else(|| input.with_extension("dump"));

    let mut plugin = Plugin::load(input.to_path_buf())
        .with_context(|| format!("解析插件失败: {:?}", input))?;
    EspDebugger::dump_file_structure(&mut plugin, &output_path)
        .with_context(|| format!("写入dump失败: {:?}", output_path))?;

    println!("结构dump已写入: {:?}", output_path);
    Ok(())
}

/// 获取重建输出路径
fn get_rebuild_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file_name = match input.extension() {
        Some(extension) => format!("{}_rebuilt.{}", stem, extension.to_string_lossy()),
        None => format!("{}_rebuilt", stem),
    };
    input.with_file_name(file_name)
}
