use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use montage::backend::cpu::CpuBackend;
use montage::backend::ffmpeg::FfmpegBackend;
use montage::{
    EngineConfig, FeatureRegistry, Locator, MediaBackend, ParamValue, Params, RunContext,
    ScratchStorage, open_item,
};

#[derive(Parser, Debug)]
#[command(name = "montage", version)]
struct Cli {
    /// Engine configuration JSON.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Backend to use.
    #[arg(long, value_enum, default_value_t = BackendChoice::Ffmpeg, global = true)]
    backend: BackendChoice,

    /// Override the scratch directory outputs are written to.
    #[arg(long, global = true)]
    scratch: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List operations as JSON, optionally only those applicable to a file.
    Ops(OpsArgs),
    /// Describe a media file as JSON.
    Probe(ProbeArgs),
    /// Run one operation and print the resulting item as JSON.
    Run(RunArgs),
}

#[derive(Parser, Debug)]
struct OpsArgs {
    /// Only list operations that apply to this file.
    #[arg(long = "for")]
    for_path: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct ProbeArgs {
    path: PathBuf,
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Operation id, see `montage ops`.
    op: String,

    /// Input media file.
    input: PathBuf,

    /// Scalar parameters as `key=value`; numbers and booleans are detected.
    #[arg(value_parser = parse_pair)]
    params: Vec<(String, String)>,

    /// Asset parameter as `key=path`.
    #[arg(long = "asset", value_parser = parse_pair)]
    assets: Vec<(String, String)>,

    /// Asset list parameter as `key=path`; repeat to append.
    #[arg(long = "assets", value_parser = parse_pair)]
    asset_lists: Vec<(String, String)>,

    /// Metadata entry as `key=value`, collected into the `metadata` parameter.
    #[arg(long = "meta", value_parser = parse_pair)]
    meta: Vec<(String, String)>,

    /// Copy the result here instead of leaving it in the scratch directory.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum BackendChoice {
    Cpu,
    Ffmpeg,
}

fn parse_pair(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((k, v)) if !k.is_empty() => Ok((k.to_string(), v.to_string())),
        _ => Err(format!("expected key=value, got '{raw}'")),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut cfg = match &cli.config {
        Some(path) => EngineConfig::from_json_file(path)?,
        None => EngineConfig::default(),
    };
    if let Some(dir) = &cli.scratch {
        cfg.scratch_dir = dir.clone();
    }
    let backend = make_backend(cli.backend, &cfg).await?;

    match cli.cmd {
        Command::Ops(args) => cmd_ops(args, backend.as_ref()).await,
        Command::Probe(args) => cmd_probe(args, backend.as_ref()).await,
        Command::Run(args) => cmd_run(args, backend, &cfg).await,
    }
}

async fn make_backend(
    choice: BackendChoice,
    cfg: &EngineConfig,
) -> anyhow::Result<Arc<dyn MediaBackend>> {
    Ok(match choice {
        BackendChoice::Cpu => Arc::new(CpuBackend::new()),
        BackendChoice::Ffmpeg => {
            let backend = FfmpegBackend::new(cfg.ffmpeg.clone());
            if !backend.is_available().await {
                anyhow::bail!(
                    "'{}' or '{}' not found; install ffmpeg or pass --backend cpu",
                    cfg.ffmpeg.ffmpeg.display(),
                    cfg.ffmpeg.ffprobe.display()
                );
            }
            Arc::new(backend)
        }
    })
}

fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("serialize output")?;
    println!("{out}");
    Ok(())
}

async fn probe(backend: &dyn MediaBackend, path: &Path) -> anyhow::Result<montage::MediaItem> {
    open_item(backend, Locator::from_path(path))
        .await
        .with_context(|| format!("probe '{}'", path.display()))
}

async fn cmd_ops(args: OpsArgs, backend: &dyn MediaBackend) -> anyhow::Result<()> {
    let registry = FeatureRegistry::with_builtin_operations();
    let descriptors: Vec<_> = match &args.for_path {
        Some(path) => {
            let item = probe(backend, path).await?;
            registry.list(&item).copied().collect()
        }
        None => registry.descriptors().copied().collect(),
    };
    print_json(&descriptors)
}

async fn cmd_probe(args: ProbeArgs, backend: &dyn MediaBackend) -> anyhow::Result<()> {
    print_json(&probe(backend, &args.path).await?)
}

async fn cmd_run(
    args: RunArgs,
    backend: Arc<dyn MediaBackend>,
    cfg: &EngineConfig,
) -> anyhow::Result<()> {
    let input = probe(backend.as_ref(), &args.input).await?;

    let mut params = Params::new();
    for (key, raw) in &args.params {
        params.insert(key.clone(), ParamValue::parse_scalar(raw));
    }
    for (key, path) in &args.assets {
        let item = probe(backend.as_ref(), Path::new(path)).await?;
        params.insert(key.clone(), ParamValue::Asset(item));
    }
    let mut lists: BTreeMap<String, Vec<montage::MediaItem>> = BTreeMap::new();
    for (key, path) in &args.asset_lists {
        let item = probe(backend.as_ref(), Path::new(path)).await?;
        lists.entry(key.clone()).or_default().push(item);
    }
    for (key, items) in lists {
        params.insert(key, ParamValue::Assets(items));
    }
    if !args.meta.is_empty() {
        params.insert(
            "metadata".to_string(),
            ParamValue::Map(args.meta.iter().cloned().collect()),
        );
    }

    let storage = Arc::new(ScratchStorage::new(&cfg.scratch_dir));
    let ctx = RunContext::new(backend, storage, cfg.frame_rate()?);

    let cancel = ctx.cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling");
            cancel.cancel();
        }
    });

    let registry = FeatureRegistry::with_builtin_operations();
    let mut result = registry
        .dispatch(&args.op, &input, &params, &ctx)
        .await
        .with_context(|| format!("run '{}' on '{}'", args.op, args.input.display()))?;

    if let Some(out) = &args.out {
        if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("create output dir '{}'", parent.display()))?;
        }
        let from = result.locator.as_path().to_path_buf();
        tokio::fs::copy(&from, out)
            .await
            .with_context(|| format!("copy '{}' to '{}'", from.display(), out.display()))?;
        tokio::fs::remove_file(&from)
            .await
            .with_context(|| format!("remove '{}'", from.display()))?;
        result.locator = Locator::from_path(out);
    }

    print_json(&result)
}
