use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

use stegolink_core::{
    ClientConfig, HttpStegoService, ReceiverWorkflow, SelectedFile, SenderWorkflow, Status,
};
use storage::LocalDownloads;

#[derive(Parser, Debug)]
#[command(name = "stegolink", version, about = "Hide encrypted messages in cover files")]
struct Cli {
    /// Set log level: error,warn,info,debug,trace
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Directory holding config.json
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Override the service URL from config.json
    #[arg(long, global = true)]
    server_url: Option<String>,

    /// Override where produced files are saved
    #[arg(long, global = true)]
    download_dir: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a config.json with the given (or default) settings
    Init,

    /// Show the effective configuration
    Config,

    /// Receiver: generate a key pair and save public_key.bin / private_key.bin
    GenerateKeys,

    /// Sender: encrypt a message and hide it in a cover file
    Hide {
        /// Receiver's public key file
        #[arg(long)]
        public_key: PathBuf,

        /// Cover file (image, audio, video or text)
        #[arg(long)]
        cover: PathBuf,

        /// Message to conceal
        #[arg(long)]
        message: String,
    },

    /// Receiver: extract and decrypt the message from a stego file
    Extract {
        /// Receiver's private key file
        #[arg(long)]
        private_key: PathBuf,

        /// Stego file produced by `hide`
        #[arg(long)]
        stego: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    fmt()
        .with_env_filter(EnvFilter::new(&cli.log_level))
        .with_target(false)
        .init();

    // Determine data directory
    let data_dir = cli.data_dir.clone().unwrap_or_else(|| {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".stegolink")
    });

    let cfg = apply_overrides(load_config(&data_dir)?, &cli);

    match cli.cmd {
        Commands::Init => {
            std::fs::create_dir_all(&data_dir)?;
            cfg.ensure_download_dir()?;

            let cfg_path = data_dir.join("config.json");
            let cfg_json = serde_json::to_string_pretty(&cfg)?;
            std::fs::write(&cfg_path, cfg_json)
                .with_context(|| format!("writing {}", cfg_path.display()))?;

            println!("✓ Configuration written: {}", cfg_path.display());
            print_config(&cfg);
        }

        Commands::Config => {
            println!("Configuration ({}):", data_dir.join("config.json").display());
            print_config(&cfg);
        }

        Commands::GenerateKeys => {
            let mut receiver = receiver_workflow(&cfg)?;
            println!("Requesting key pair from {}...", cfg.server_url);
            let status = receiver.generate_keys().await;
            finish(&status);
            println!("  Share the saved public key with the sender; keep the private key secret.");
        }

        Commands::Hide { public_key, cover, message } => {
            let mut sender = SenderWorkflow::new(service(&cfg)?, downloads(&cfg)?);
            sender.select_public_key(read_selection(&public_key).await?);
            sender.select_cover_file(read_selection(&cover).await?);
            sender.set_message(message);

            println!("Hiding message in {}...", cover.display());
            let status = sender.embed().await;
            finish(&status);
        }

        Commands::Extract { private_key, stego } => {
            let mut receiver = receiver_workflow(&cfg)?;
            receiver.select_private_key(read_selection(&private_key).await?);
            receiver.select_stego_file(read_selection(&stego).await?);

            println!("Extracting from {}...", stego.display());
            let status = receiver.extract().await;
            if let Some(message) = receiver.decoded_payload() {
                println!("Decrypted payload:");
                println!("{}", message);
            }
            finish(&status);
        }
    }

    Ok(())
}

fn load_config(data_dir: &Path) -> Result<ClientConfig> {
    let cfg_path = data_dir.join("config.json");
    if !cfg_path.exists() {
        tracing::debug!("No config at {}; using defaults", cfg_path.display());
        return Ok(ClientConfig::default());
    }

    let cfg_json = std::fs::read_to_string(&cfg_path)
        .with_context(|| format!("reading {}", cfg_path.display()))?;
    let cfg: ClientConfig = serde_json::from_str(&cfg_json)
        .with_context(|| format!("parsing {}", cfg_path.display()))?;
    Ok(cfg)
}

fn apply_overrides(mut cfg: ClientConfig, cli: &Cli) -> ClientConfig {
    if let Some(url) = &cli.server_url {
        cfg = cfg.with_server(url.clone());
    }
    if let Some(dir) = &cli.download_dir {
        cfg = cfg.with_download_dir(dir.clone());
    }
    cfg
}

fn print_config(cfg: &ClientConfig) {
    println!("  Server URL: {}", cfg.server_url);
    println!("  Download directory: {}", cfg.download_dir.display());
    match cfg.request_timeout() {
        Some(t) => println!("  Request timeout: {}s", t.as_secs()),
        None => println!("  Request timeout: none"),
    }
    println!("  Connect timeout: {}s", cfg.connect_timeout().as_secs());
}

fn service(cfg: &ClientConfig) -> Result<Arc<HttpStegoService>> {
    Ok(Arc::new(HttpStegoService::new(cfg)?))
}

fn downloads(cfg: &ClientConfig) -> Result<Arc<LocalDownloads>> {
    Ok(Arc::new(LocalDownloads::new(cfg.download_dir.clone())?))
}

fn receiver_workflow(
    cfg: &ClientConfig,
) -> Result<ReceiverWorkflow<HttpStegoService, LocalDownloads>> {
    Ok(ReceiverWorkflow::new(service(cfg)?, downloads(cfg)?))
}

async fn read_selection(path: &Path) -> Result<SelectedFile> {
    SelectedFile::from_path(path).await
}

/// Print the final status; a failed workflow exits non-zero.
fn finish(status: &Status) {
    println!("{}", status.render());
    if status.is_failure() {
        std::process::exit(1);
    }
}
