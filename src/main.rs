//! Command-line front-end for the fingerprinting service.

use std::path::{Path, PathBuf};
use std::time::Duration;

use acousticdna::audio::youtube;
use acousticdna::config::Config;
use acousticdna::logging;
use acousticdna::service::{CancelToken, Service};
use acousticdna::storage::Database;

const INGEST_TIMEOUT: Duration = Duration::from_secs(300);
const MATCH_TIMEOUT: Duration = Duration::from_secs(120);

fn main() {
    if let Err(err) = logging::init() {
        eprintln!("Warning: logging unavailable: {err}");
    }
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let Some(options) = parse_args(std::env::args().skip(1).collect())? else {
        return Ok(());
    };
    let config = options.resolved_config();
    let service = Service::open(config.clone()).map_err(|err| err.to_string())?;
    let result = match options.command {
        Command::Add(add) => run_add(&service, &config, add),
        Command::Match { file } => run_match(&service, &file),
        Command::List => run_list(&service),
        Command::Delete { id } => run_delete(&service, &id),
    };
    if let Err(err) = service.close() {
        tracing::debug!("Closing the index failed: {err}");
    }
    result
}

#[derive(Debug, Clone)]
struct CliOptions {
    db_path: Option<PathBuf>,
    temp_dir: Option<PathBuf>,
    sample_rate: Option<u32>,
    command: Command,
}

impl CliOptions {
    /// Environment-derived defaults overridden by explicit flags.
    fn resolved_config(&self) -> Config {
        let mut config = Config::from_env();
        if let Some(path) = &self.db_path {
            config = config.with_db_path(path.clone());
        }
        if let Some(dir) = &self.temp_dir {
            config = config.with_temp_dir(dir.clone());
        }
        if let Some(rate) = self.sample_rate {
            config = config.with_sample_rate(rate);
        }
        config
    }
}

#[derive(Debug, Clone)]
enum Command {
    Add(AddArgs),
    Match { file: PathBuf },
    List,
    Delete { id: String },
}

#[derive(Debug, Clone, Default)]
struct AddArgs {
    file: Option<PathBuf>,
    title: Option<String>,
    artist: Option<String>,
    youtube_id: Option<String>,
    youtube_url: Option<String>,
}

fn parse_args(args: Vec<String>) -> Result<Option<CliOptions>, String> {
    let mut db_path: Option<PathBuf> = None;
    let mut temp_dir: Option<PathBuf> = None;
    let mut sample_rate: Option<u32> = None;
    let mut command_name: Option<String> = None;
    let mut command_args: Vec<String> = Vec::new();

    let mut idx = 0usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "-h" | "--help" if command_name.is_none() => {
                println!("{}", help_text());
                return Ok(None);
            }
            "--db" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--db requires a value".to_string())?;
                db_path = Some(PathBuf::from(value));
            }
            "--temp" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--temp requires a value".to_string())?;
                temp_dir = Some(PathBuf::from(value));
            }
            "--rate" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--rate requires a value".to_string())?;
                let rate = value
                    .parse::<u32>()
                    .map_err(|_| format!("--rate must be a sample rate in Hz, got '{value}'"))?;
                sample_rate = Some(rate);
            }
            other => {
                if command_name.is_none() {
                    command_name = Some(other.to_string());
                } else {
                    command_args.push(other.to_string());
                }
            }
        }
        idx += 1;
    }

    let command = match command_name.as_deref() {
        Some("add") => Command::Add(parse_add_args(&command_args)?),
        Some("match") => {
            let file = command_args
                .first()
                .ok_or_else(|| format!("match requires an audio file\n\n{}", help_text()))?;
            Command::Match {
                file: PathBuf::from(file),
            }
        }
        Some("list") => Command::List,
        Some("delete") => {
            let id = command_args
                .first()
                .ok_or_else(|| format!("delete requires a song id\n\n{}", help_text()))?;
            Command::Delete { id: id.clone() }
        }
        Some(unknown) => return Err(format!("Unknown command: {unknown}\n\n{}", help_text())),
        None => return Err(format!("A command is required\n\n{}", help_text())),
    };

    Ok(Some(CliOptions {
        db_path,
        temp_dir,
        sample_rate,
        command,
    }))
}

fn parse_add_args(args: &[String]) -> Result<AddArgs, String> {
    let mut add = AddArgs::default();
    let mut idx = 0usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "--title" => {
                idx += 1;
                add.title = Some(required_value(args, idx, "--title")?);
            }
            "--artist" => {
                idx += 1;
                add.artist = Some(required_value(args, idx, "--artist")?);
            }
            "--youtube" => {
                idx += 1;
                add.youtube_id = Some(required_value(args, idx, "--youtube")?);
            }
            "--youtube-url" => {
                idx += 1;
                add.youtube_url = Some(required_value(args, idx, "--youtube-url")?);
            }
            other if !other.starts_with('-') && add.file.is_none() => {
                add.file = Some(PathBuf::from(other));
            }
            other => return Err(format!("Unknown add argument: {other}\n\n{}", help_text())),
        }
        idx += 1;
    }
    Ok(add)
}

fn required_value(args: &[String], idx: usize, flag: &str) -> Result<String, String> {
    args.get(idx)
        .cloned()
        .ok_or_else(|| format!("{flag} requires a value"))
}

fn help_text() -> String {
    [
        "acousticdna - audio fingerprinting and matching",
        "",
        "Usage:",
        "  acousticdna [--db <path>] [--temp <dir>] [--rate <hz>] <command> [args]",
        "",
        "Commands:",
        "  add <file> --title <title> --artist <artist> [--youtube <id>]",
        "  add --youtube-url <url> [--title <title>] [--artist <artist>]",
        "  match <file>",
        "  list",
        "  delete <id>",
        "",
        "Options:",
        "  --db <path>    SQLite database file (env ACOUSTIC_DB_PATH, default acousticdna.sqlite3)",
        "  --temp <dir>   Temp directory for conversions (env ACOUSTIC_TEMP_DIR, default /tmp)",
        "  --rate <hz>    Analysis sample rate (default 11025)",
    ]
    .join("\n")
}

fn run_add(service: &Service<Database>, config: &Config, add: AddArgs) -> Result<(), String> {
    let cancel = CancelToken::with_timeout(INGEST_TIMEOUT);

    let (path, title, artist, youtube_id, cleanup) = if let Some(url) = &add.youtube_url {
        let (path, metadata) = youtube::fetch_audio(url, &config.temp_dir, &cancel)
            .map_err(|err| err.to_string())?;
        let title = add
            .title
            .clone()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| metadata.title.clone());
        let artist = add
            .artist
            .clone()
            .filter(|a| !a.trim().is_empty())
            .unwrap_or_else(|| metadata.resolved_artist().to_string());
        (path, title, artist, metadata.id.clone(), true)
    } else {
        let file = add
            .file
            .clone()
            .ok_or_else(|| format!("add requires an audio file or --youtube-url\n\n{}", help_text()))?;
        let title = add
            .title
            .clone()
            .ok_or_else(|| "--title is required when adding from a file".to_string())?;
        let artist = add
            .artist
            .clone()
            .ok_or_else(|| "--artist is required when adding from a file".to_string())?;
        (file, title, artist, add.youtube_id.clone().unwrap_or_default(), false)
    };

    let result = service.add_song(&cancel, &path, &title, &artist, &youtube_id);
    if cleanup {
        let _ = std::fs::remove_file(&path);
    }
    let id = result.map_err(|err| err.to_string())?;

    println!("Added song to the catalog");
    println!("  id:      {id}");
    println!("  title:   {title}");
    println!("  artist:  {artist}");
    if !youtube_id.is_empty() {
        println!("  youtube: {youtube_id}");
    }
    Ok(())
}

fn run_match(service: &Service<Database>, file: &Path) -> Result<(), String> {
    let cancel = CancelToken::with_timeout(MATCH_TIMEOUT);
    let results = service
        .match_file(&cancel, file)
        .map_err(|err| err.to_string())?;

    if results.is_empty() {
        println!("No matches found.");
        return Ok(());
    }
    for (rank, result) in results.iter().enumerate() {
        println!(
            "{}. {} - {} (id {})",
            rank + 1,
            result.title,
            result.artist,
            result.song_id
        );
        println!(
            "   score: {} votes, confidence: {:.1}%, offset: {} ms",
            result.score, result.confidence, result.offset_ms
        );
    }
    Ok(())
}

fn run_list(service: &Service<Database>) -> Result<(), String> {
    let songs = service.list_songs().map_err(|err| err.to_string())?;
    if songs.is_empty() {
        println!("The catalog is empty.");
        return Ok(());
    }
    for song in &songs {
        let youtube = if song.youtube_id.is_empty() {
            String::new()
        } else {
            format!("  youtube={}", song.youtube_id)
        };
        println!(
            "{}  {} - {}  ({} ms){youtube}",
            song.id, song.title, song.artist, song.duration_ms
        );
    }
    println!("{} song(s)", songs.len());
    Ok(())
}

fn run_delete(service: &Service<Database>, id: &str) -> Result<(), String> {
    let cancel = CancelToken::with_timeout(MATCH_TIMEOUT);
    let song = service
        .delete_song(&cancel, id)
        .map_err(|err| err.to_string())?;
    println!("Deleted song");
    println!("  id:     {}", song.id);
    println!("  title:  {}", song.title);
    println!("  artist: {}", song.artist);
    Ok(())
}
