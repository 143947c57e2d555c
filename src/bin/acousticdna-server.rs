//! HTTP server binary exposing the fingerprinting API.

use std::path::PathBuf;
use std::sync::Arc;

use acousticdna::config::Config;
use acousticdna::logging;
use acousticdna::server::{self, AppState, ServerConfig};
use acousticdna::service::Service;

#[tokio::main]
async fn main() {
    if let Err(err) = logging::init() {
        eprintln!("Warning: logging unavailable: {err}");
    }
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), String> {
    let Some(options) = parse_args(std::env::args().skip(1).collect())? else {
        return Ok(());
    };

    let mut config = Config::from_env();
    if let Some(path) = options.db_path {
        config = config.with_db_path(path);
    }
    if let Some(dir) = options.temp_dir {
        config = config.with_temp_dir(dir);
    }
    if let Some(rate) = options.sample_rate {
        config = config.with_sample_rate(rate);
    }

    let mut server_config = ServerConfig::from_env();
    if let Some(port) = options.port {
        server_config.port = port;
    }
    if let Some(origins) = options.allowed_origins {
        server_config.allowed_origins = origins;
    }

    let service = Service::open(config.clone()).map_err(|err| err.to_string())?;
    let state = Arc::new(AppState {
        service,
        config,
        server_config,
    });
    server::serve(state).await.map_err(|err| err.to_string())
}

#[derive(Debug, Clone, Default)]
struct CliOptions {
    db_path: Option<PathBuf>,
    temp_dir: Option<PathBuf>,
    sample_rate: Option<u32>,
    port: Option<u16>,
    allowed_origins: Option<Vec<String>>,
}

fn parse_args(args: Vec<String>) -> Result<Option<CliOptions>, String> {
    let mut options = CliOptions::default();
    let mut idx = 0usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "-h" | "--help" => {
                println!("{}", help_text());
                return Ok(None);
            }
            "--db" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--db requires a value".to_string())?;
                options.db_path = Some(PathBuf::from(value));
            }
            "--temp" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--temp requires a value".to_string())?;
                options.temp_dir = Some(PathBuf::from(value));
            }
            "--rate" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--rate requires a value".to_string())?;
                options.sample_rate = Some(
                    value
                        .parse()
                        .map_err(|_| format!("--rate must be a sample rate in Hz, got '{value}'"))?,
                );
            }
            "--port" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--port requires a value".to_string())?;
                options.port = Some(
                    value
                        .parse()
                        .map_err(|_| format!("--port must be a port number, got '{value}'"))?,
                );
            }
            "--origins" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--origins requires a value".to_string())?;
                options.allowed_origins = Some(
                    value
                        .split(',')
                        .map(|origin| origin.trim().to_string())
                        .filter(|origin| !origin.is_empty())
                        .collect(),
                );
            }
            unknown => return Err(format!("Unknown argument: {unknown}\n\n{}", help_text())),
        }
        idx += 1;
    }
    Ok(Some(options))
}

fn help_text() -> String {
    [
        "acousticdna-server - HTTP API for audio fingerprinting",
        "",
        "Usage:",
        "  acousticdna-server [--db <path>] [--temp <dir>] [--rate <hz>] [--port <port>] [--origins <list>]",
        "",
        "Options:",
        "  --db <path>       SQLite database file (env ACOUSTIC_DB_PATH)",
        "  --temp <dir>      Temp directory for uploads (env ACOUSTIC_TEMP_DIR)",
        "  --rate <hz>       Analysis sample rate (default 11025)",
        "  --port <port>     Listen port (env ACOUSTIC_PORT, default 8080)",
        "  --origins <list>  Comma-separated CORS allow-list (env ACOUSTIC_ALLOWED_ORIGINS, default *)",
    ]
    .join("\n")
}
