//! `process-server`: run the polling scheduler, or inspect and feed its store.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args as ClapArgs, Parser, Subcommand};
use process_scheduler::builders::SchedulerBuilder;
use process_scheduler::config::SchedulerConfig;
use process_scheduler::core::{
    AppResult, InMemoryCompletionSink, ProcessRegistry, TaskKind, TaskStatus, TaskStore,
};
use process_scheduler::infra::{JsonlTaskStore, ShellProcess};
use process_scheduler::runtime::{self, TaskSubmission, TokioSpawner};
use process_scheduler::util::{init_tracing_with, write_pid_file};

#[derive(Parser, Debug)]
#[command(name = "process-server", version, about = "Polling background process scheduler")]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Directory holding the task store.
    #[arg(long, default_value = ".process-server", global = true)]
    store_dir: PathBuf,

    /// Store stream name; the records live in `<store-dir>/<stream>.jsonl`.
    #[arg(long, default_value = "tasks", global = true)]
    stream: String,

    /// JSON configuration file. Without it, configuration comes from the environment.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: Overrides,
}

#[derive(ClapArgs, Debug, Clone, Default)]
struct Overrides {
    /// Maximum number of concurrently running tasks.
    #[arg(long, global = true)]
    max_processes: Option<usize>,

    /// Seconds between polling cycles.
    #[arg(long, global = true)]
    wait_time: Option<u64>,

    #[arg(long, global = true)]
    log_name: Option<String>,

    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[arg(long, global = true)]
    pid_file: Option<PathBuf>,

    #[arg(long, global = true)]
    debug: bool,
}

#[derive(ClapArgs, Debug, Clone)]
struct SubmitArgs {
    /// Process kind, e.g. `shell`.
    #[arg(long)]
    kind: String,

    /// JSON payload handed to the process.
    #[arg(long, default_value = "null")]
    payload: String,
}

#[derive(ClapArgs, Debug, Clone)]
struct ListArgs {
    /// Only show records in this status.
    #[arg(long)]
    status: Option<TaskStatus>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the admission loop until interrupted.
    Serve {
        /// Requeue records left `Running` by a previous server before polling.
        /// Use only when no other server works on this store.
        #[arg(long)]
        requeue_running: bool,
    },
    /// Queue a new pending task.
    Submit(SubmitArgs),
    /// Print records as JSON lines.
    List(ListArgs),
    /// Return a finished task to pending.
    Reset {
        /// Task id.
        id: u64,

        /// Also requeue a `Running` task orphaned by a stopped server.
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = real_main().await {
        eprintln!("{e:#}");
        std::process::exit(1);
    }
}

async fn real_main() -> AppResult<()> {
    let args = Args::parse();
    let cfg = load_config(&args)?;
    init_tracing_with(&cfg.logging).map_err(anyhow::Error::msg)?;

    let store: Arc<dyn TaskStore> = Arc::new(
        JsonlTaskStore::open(&args.store_dir, &args.stream).context("open task store")?,
    );

    match args.command {
        Commands::Serve { requeue_running } => serve(cfg, store, requeue_running).await,
        Commands::Submit(submit) => {
            let payload: serde_json::Value =
                serde_json::from_str(&submit.payload).context("--payload is not valid JSON")?;
            let record = runtime::submit_task(
                store.as_ref(),
                TaskSubmission {
                    kind: TaskKind::new(submit.kind),
                    payload,
                },
            )
            .await?;
            println!("{}", serde_json::to_string(&record)?);
            Ok(())
        }
        Commands::List(list) => {
            for record in runtime::list_tasks(store.as_ref(), list.status).await? {
                println!("{}", serde_json::to_string(&record)?);
            }
            let counts = runtime::status_counts(store.as_ref()).await?;
            eprintln!(
                "pending={} running={} completed={} failed={}",
                counts.pending, counts.running, counts.completed, counts.failed
            );
            Ok(())
        }
        Commands::Reset { id, force } => {
            let record = runtime::reset_task(store.as_ref(), id, force).await?;
            println!("{}", serde_json::to_string(&record)?);
            Ok(())
        }
    }
}

fn load_config(args: &Args) -> AppResult<SchedulerConfig> {
    let mut cfg = match args.config.as_deref() {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("read config {}", path.display()))?;
            SchedulerConfig::from_json_str(&raw).map_err(anyhow::Error::msg)?
        }
        None => SchedulerConfig::from_env().map_err(anyhow::Error::msg)?,
    };
    apply_overrides(&mut cfg, &args.overrides);
    cfg.validate().map_err(anyhow::Error::msg)?;
    Ok(cfg)
}

fn apply_overrides(cfg: &mut SchedulerConfig, o: &Overrides) {
    if let Some(n) = o.max_processes {
        cfg.max_concurrent_tasks = n;
    }
    if let Some(secs) = o.wait_time {
        cfg.poll_interval_secs = secs;
    }
    if let Some(name) = &o.log_name {
        cfg.logging.log_name = Some(name.clone());
    }
    if let Some(file) = &o.log_file {
        cfg.logging.log_file = Some(file.clone());
    }
    if let Some(pid) = &o.pid_file {
        cfg.pid_file = Some(pid.clone());
    }
    if o.debug {
        cfg.logging.debug = true;
    }
}

async fn serve(
    cfg: SchedulerConfig,
    store: Arc<dyn TaskStore>,
    requeue_running: bool,
) -> AppResult<()> {
    if let Some(pid_file) = cfg.pid_file.as_deref() {
        write_pid_file(pid_file).with_context(|| format!("write pid file {}", pid_file.display()))?;
    }

    let mut registry = ProcessRegistry::new();
    ShellProcess::register(&mut registry)?;

    let history = Arc::new(InMemoryCompletionSink::new(1024));
    let scheduler = SchedulerBuilder::new(cfg)
        .store(Arc::clone(&store))
        .registry(registry)
        .sink(history.clone())
        .build(TokioSpawner::current())?;

    if requeue_running {
        runtime::requeue_running(store.as_ref()).await?;
    }

    scheduler
        .run_until_signal(tokio::signal::ctrl_c())
        .await
        .context("listen for ctrl-c")?;

    tracing::info!(finished = history.events().len(), "process server stopped");
    Ok(())
}
