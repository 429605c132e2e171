//! `roast <resume.pdf>` — roasts a resume from the terminal.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use roast_api::config::{
    BackendConfig, DEFAULT_BASE_URL, DEFAULT_MODEL_NAME, DEFAULT_TIMEOUT_SECS,
};
use roast_api::critique::CritiquePipeline;
use roast_api::extract::{ensure_readable, extract_text_from_path};
use roast_api::llm_client::local::DevicePreference;
use roast_api::llm_client::{build_backend, BackendKind, HttpSettings};
use roast_api::report::{render_critique, render_failure, BANNER};

#[derive(Debug, Parser)]
#[command(name = "roast", version, about = "Brutally honest resume critique from a language model")]
struct Cli {
    /// Path to the resume PDF
    pdf: PathBuf,

    /// Which model backend to call
    #[arg(long, env = "LLM_BACKEND", value_enum, default_value_t = BackendKind::Chat)]
    backend: BackendKind,

    /// Model identifier sent to the server
    #[arg(long, env = "MODEL_NAME", default_value = DEFAULT_MODEL_NAME)]
    model: String,

    /// Model server root URL
    #[arg(long, env = "LLM_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Bearer token for authenticated servers
    #[arg(long, env = "LLM_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    #[arg(long, env = "LLM_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout_secs: u64,

    /// Drop the JSON format hint on the generate backend
    #[arg(long)]
    no_force_json: bool,

    #[arg(long, env = "LOCAL_DEVICE", value_enum, default_value_t = DevicePreference::Auto)]
    device: DevicePreference,

    /// Debug logging on stderr
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn backend_config(&self) -> BackendConfig {
        BackendConfig {
            kind: self.backend,
            http: HttpSettings {
                base_url: self.base_url.clone(),
                model: self.model.clone(),
                api_key: self.api_key.clone(),
                timeout: Duration::from_secs(self.timeout_secs),
            },
            force_json: !self.no_force_json,
            local_model_path: None,
            local_device: self.device,
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("roast_api={level}"))),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    println!("{BANNER}\n");

    let text = extract_text_from_path(&cli.pdf)
        .with_context(|| format!("Error reading PDF {}", cli.pdf.display()))?;

    // Too little text is a warning, not a failure: nothing was sent to the model.
    let resume_text = match ensure_readable(&text) {
        Ok(t) => t,
        Err(e) => {
            println!("{}", render_failure(&e));
            return Ok(ExitCode::SUCCESS);
        }
    };

    let backend = build_backend(&cli.backend_config(), None).context("Client init failed")?;
    let pipeline = CritiquePipeline::new(backend);

    eprintln!("Roasting this poor soul...");
    match pipeline.produce_critique(resume_text).await {
        Ok(critique) => {
            println!("{}", render_critique(&critique));
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            println!("{}", render_failure(&e));
            Ok(ExitCode::FAILURE)
        }
    }
}
