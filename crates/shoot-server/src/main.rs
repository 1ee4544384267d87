use clap::Parser;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use shoot_config::{load_config, ConfigError};
use shoot_llm::{create_provider, ProviderSettings};
use shoot_loop::Investigator;
use shoot_server::logging::init_logging;
use shoot_server::{run_server, AppState, ServerSettings};

#[derive(Parser, Debug, Clone)]
#[command(name = "shoot")]
#[command(about = "Multi-agent investigation service")]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(long, env = "DEBUG", default_value = "false")]
    debug: bool,

    /// Agent configuration file
    #[arg(long, env = "SHOOT_CONFIG", default_value = "config.yaml")]
    config: PathBuf,

    /// Bind address
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: String,

    /// Server port
    #[arg(long, env = "PORT", default_value = "8080")]
    port: u16,

    /// LLM provider
    #[arg(long, env = "LLM_PROVIDER", default_value = "anthropic")]
    provider: ProviderType,

    /// LLM API base URL (provider default when unset)
    #[arg(long, env = "LLM_BASE_URL")]
    llm_base_url: Option<String>,

    /// LLM API key
    #[arg(long, env = "LLM_API_KEY", default_value = "", hide_env_values = true)]
    api_key: String,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum ProviderType {
    #[value(name = "openai")]
    OpenAI,
    Anthropic,
}

impl ProviderType {
    fn as_str(self) -> &'static str {
        match self {
            ProviderType::OpenAI => "openai",
            ProviderType::Anthropic => "anthropic",
        }
    }
}

fn report_config_error(path: &std::path::Path, error: &ConfigError) {
    log::error!("Refusing to start: {} is invalid", path.display());
    let problems = error.errors();
    if problems.is_empty() {
        log::error!("  {}", error);
    }
    for problem in problems {
        log::error!("  {}", problem);
    }
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);

    log::info!("Starting shoot on {}:{}", cli.host, cli.port);
    log::info!("  Config: {}", cli.config.display());
    log::info!("  Provider: {}", cli.provider.as_str());
    if let Some(url) = &cli.llm_base_url {
        log::info!("  Base URL: {}", url);
    }

    let config = match load_config(&cli.config) {
        Ok(config) => Arc::new(config),
        Err(error) => {
            report_config_error(&cli.config, &error);
            std::process::exit(1);
        }
    };

    let llm = create_provider(&ProviderSettings {
        provider: cli.provider.as_str().to_string(),
        api_key: cli.api_key.clone(),
        base_url: cli.llm_base_url.clone(),
    })
    .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;

    let state = AppState::new(Investigator::new(config, llm));
    run_server(
        ServerSettings {
            host: cli.host,
            port: cli.port,
        },
        state,
    )
    .await
}
