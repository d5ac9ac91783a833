//! Telegram media downloader CLI - main entry point

use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

use telegram_media_dl::commands::{self, BatchOptions, GetOptions};
use telegram_media_dl::{metrics, Config};
use tracing::warn;

#[derive(Parser)]
#[command(name = "telegram_media_dl")]
#[command(about = "Download media from Telegram message links", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the YAML config (default: config.yml, then ../config.yml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Address to expose Prometheus metrics (e.g., 0.0.0.0:9898)
    #[arg(long, env = "METRICS_ADDR", global = true)]
    metrics_addr: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Overrides for the `download` config section.
#[derive(Args, Debug, Default)]
struct DownloadArgs {
    /// Directory for downloaded files
    #[arg(short = 'd', long)]
    output_dir: Option<PathBuf>,

    /// Parallel downloads
    #[arg(short, long)]
    workers: Option<usize>,

    /// Chunk size in KB (multiple of 4, at most 512)
    #[arg(long)]
    part_size_kb: Option<u32>,

    /// Seconds to wait for a single chunk
    #[arg(long)]
    timeout_secs: Option<u64>,
}

impl DownloadArgs {
    fn apply(self, config: &mut Config) {
        let download = &mut config.download;
        if let Some(dir) = self.output_dir {
            download.output_dir = dir;
        }
        if let Some(workers) = self.workers {
            download.workers = workers.max(1);
        }
        if let Some(kb) = self.part_size_kb {
            download.part_size_kb = kb;
        }
        if let Some(secs) = self.timeout_secs {
            download.timeout = Duration::from_secs(secs.max(1));
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Download every message listed in a links file
    Batch {
        /// Links file, one `<link> ; <description>` per line
        #[arg(short, long, default_value = ".stuff/messages.md")]
        file: PathBuf,

        /// Append an extension detected from the file content
        #[arg(long)]
        infer_extension: bool,

        /// Append channel and message ids to file names
        #[arg(long)]
        detailed_name: bool,

        /// Print planned file names without downloading
        #[arg(long)]
        dry_run: bool,

        /// Write a JSON report of the run
        #[arg(long)]
        report: Option<PathBuf>,

        #[command(flatten)]
        download: DownloadArgs,
    },

    /// Download the media of one message
    Get {
        /// Message link (https://t.me/c/<channel>/<message> or https://t.me/<name>/<message>)
        #[arg(short, long, conflicts_with_all = ["channel", "message"])]
        link: Option<String>,

        /// Channel id or username
        #[arg(short = 'C', long, requires = "message")]
        channel: Option<String>,

        /// Message id
        #[arg(short = 'M', long, requires = "channel")]
        message: Option<i32>,

        /// Comment id in the linked discussion group
        #[arg(long)]
        comment: Option<i32>,

        /// Output file name
        #[arg(short = 'O', long, default_value = "file")]
        output: String,

        /// Append an extension detected from the file content
        #[arg(long)]
        infer_extension: bool,

        /// Append channel and message ids to the file name
        #[arg(long)]
        detailed_name: bool,

        /// Print the planned file name without downloading
        #[arg(long)]
        dry_run: bool,

        #[command(flatten)]
        download: DownloadArgs,
    },

    /// Initialize a new Telegram session (interactive login)
    InitSession,
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Batch { .. } => "batch",
            Commands::Get { .. } => "get",
            Commands::InitSession => "init_session",
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env for local development
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("telegram_media_dl=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    if let Some(addr) = cli.metrics_addr.as_deref() {
        match addr.parse::<SocketAddr>() {
            Ok(socket) => metrics::spawn_metrics_server(socket),
            Err(err) => warn!(%addr, "Invalid metrics address: {}", err),
        }
    }

    let config = Config::load(cli.config.as_deref())?;

    let command_name = cli.command.name();
    metrics::record_command_start(command_name);
    let start = Instant::now();

    let result = execute_command(config, cli.command).await;

    metrics::record_command_result(command_name, start.elapsed(), result.is_ok());

    result
}

async fn execute_command(mut config: Config, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Batch {
            file,
            infer_extension,
            detailed_name,
            dry_run,
            report,
            download,
        } => {
            download.apply(&mut config);
            let options = BatchOptions {
                input: file,
                detailed_name,
                infer_extension,
                dry_run,
                report,
            };
            let report = commands::batch_run(&config, &options).await?;
            if report.has_failures() {
                anyhow::bail!("{} of {} item(s) failed", report.failed, report.items.len());
            }
        }
        Commands::Get {
            link,
            channel,
            message,
            comment,
            output,
            infer_extension,
            detailed_name,
            dry_run,
            download,
        } => {
            download.apply(&mut config);
            let options = GetOptions {
                link,
                channel,
                message,
                comment,
                output,
                detailed_name,
                infer_extension,
                dry_run,
            };
            for file in commands::get_run(&config, &options).await? {
                println!("{}", file.path.display());
            }
        }
        Commands::InitSession => {
            commands::init_session::run(&config).await?;
        }
    }

    Ok(())
}
