mod telemetry;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use log::{error, info};
use serde::Serialize;

use lexora::config::{default_config_path, VoiceSettings};
use lexora::providers::{speak, VoiceSample};
use lexora::{
    load_config, ArtifactStorage, AvatarUpload, Config, Database, ElevenLabsClient,
    LipSyncClient, PoolSettings, SubmitRequest, VideoCatalog, VideoGenerator, VideoService,
};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

const POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Parser)]
#[command(author, version, about = "Generate narrated avatar videos for lessons")]
struct Cli {
    #[arg(long, global = true, help = "Path to the config file (default ~/.lexora/config.json)")]
    config: Option<PathBuf>,

    #[arg(long, global = true, help = "Emit logs as JSON lines")]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Submit a lesson for video generation and wait for the result.
    Generate {
        #[arg(long)]
        user: i64,
        #[arg(long)]
        lesson: i64,
        #[arg(long, help = "Voice to use instead of the user's default")]
        voice: Option<String>,
        #[arg(long, help = "Avatar image to use instead of the user's default")]
        avatar: Option<PathBuf>,
    },
    /// Print the current state of a job.
    Status { job_id: String },
    /// Print every job of a lesson, newest first.
    List {
        #[arg(long)]
        user: i64,
        #[arg(long)]
        lesson: i64,
    },
    /// Delete a job and its files.
    Delete {
        #[arg(long)]
        user: i64,
        job_id: String,
    },
    /// Manage speech provider voices.
    Voices {
        #[command(subcommand)]
        action: VoicesCommand,
    },
    /// Narrate a short text into the audio directory.
    Speak {
        #[arg(long)]
        voice: String,
        #[arg(long)]
        text: String,
        #[arg(long, help = "Overrides the configured stability")]
        stability: Option<f64>,
        #[arg(long, help = "Overrides the configured similarity boost")]
        similarity: Option<f64>,
    },
}

#[derive(Subcommand)]
enum VoicesCommand {
    /// List the voices of the account.
    List,
    /// Print one voice.
    Show { voice_id: String },
    /// Clone a voice from audio recordings.
    #[command(name = "clone")]
    CloneVoice {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(required = true)]
        samples: Vec<PathBuf>,
    },
    /// Delete a cloned voice.
    Delete { voice_id: String },
    /// Print subscription and character usage.
    Account,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = telemetry::init(cli.json_logs) {
        eprintln!("Failed to initialize logging: {}", e);
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> CliResult<ExitCode> {
    let config = resolve_config(cli.config.as_deref())?;

    match cli.command {
        Command::Generate {
            user,
            lesson,
            voice,
            avatar,
        } => generate(&config, user, lesson, voice, avatar).await,
        Command::Status { job_id } => match open_catalog(&config)?.get(&job_id)? {
            Some(job) => {
                print_json(&job)?;
                Ok(ExitCode::SUCCESS)
            }
            None => {
                eprintln!("Video job {} not found", job_id);
                Ok(ExitCode::FAILURE)
            }
        },
        Command::List { user, lesson } => {
            match open_catalog(&config)?.list_for_lesson(user, lesson)? {
                Some(jobs) => {
                    print_json(&jobs)?;
                    Ok(ExitCode::SUCCESS)
                }
                None => {
                    eprintln!("Lesson {} not found", lesson);
                    Ok(ExitCode::FAILURE)
                }
            }
        }
        Command::Delete { user, job_id } => {
            if open_catalog(&config)?.delete(user, &job_id).await? {
                println!("Deleted video job {}", job_id);
                Ok(ExitCode::SUCCESS)
            } else {
                eprintln!("Video job {} not found", job_id);
                Ok(ExitCode::FAILURE)
            }
        }
        Command::Voices { action } => voices(&config, action).await,
        Command::Speak {
            voice,
            text,
            stability,
            similarity,
        } => {
            let defaults = config.speech.voice_settings;
            let settings = VoiceSettings {
                stability: stability.unwrap_or(defaults.stability),
                similarity_boost: similarity.unwrap_or(defaults.similarity_boost),
            };
            let client = ElevenLabsClient::from_config(&config.speech)?;
            let storage = open_storage(&config);
            storage.ensure_layout()?;
            print_json(&speak(&client, &storage, &text, &voice, settings).await?)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn voices(config: &Config, action: VoicesCommand) -> CliResult<ExitCode> {
    let client = ElevenLabsClient::from_config(&config.speech)?;

    match action {
        VoicesCommand::List => print_json(&client.list_voices().await?)?,
        VoicesCommand::Show { voice_id } => match client.get_voice(&voice_id).await? {
            Some(voice) => print_json(&voice)?,
            None => {
                eprintln!("Voice {} not found", voice_id);
                return Ok(ExitCode::FAILURE);
            }
        },
        VoicesCommand::CloneVoice {
            name,
            description,
            samples,
        } => {
            let mut uploads = Vec::with_capacity(samples.len());
            for path in &samples {
                uploads.push(read_sample(path).await?);
            }
            print_json(&client.clone_voice(&name, &description, uploads).await?)?;
        }
        VoicesCommand::Delete { voice_id } => {
            if !client.delete_voice(&voice_id).await? {
                eprintln!("Voice {} not found", voice_id);
                return Ok(ExitCode::FAILURE);
            }
            println!("Deleted voice {}", voice_id);
        }
        VoicesCommand::Account => print_json(&client.user_info().await?)?,
    }
    Ok(ExitCode::SUCCESS)
}

/// An explicit `--config` must exist; the default location may be absent.
fn resolve_config(explicit: Option<&Path>) -> CliResult<Config> {
    if let Some(path) = explicit {
        return Ok(load_config(path)?);
    }

    match default_config_path() {
        Some(path) if path.exists() => {
            info!("Using config file {}", path.display());
            Ok(load_config(&path)?)
        }
        _ => {
            info!("No config file found, using defaults");
            Ok(Config::default())
        }
    }
}

fn open_database(config: &Config) -> CliResult<Database> {
    Ok(Database::open(&config.resolved_database_path())?)
}

fn open_storage(config: &Config) -> ArtifactStorage {
    ArtifactStorage::new(&config.upload_directory, &config.public_prefix)
}

/// Job lookups and deletes. Starts no workers and leaves other processes'
/// jobs untouched.
fn open_catalog(config: &Config) -> CliResult<VideoCatalog> {
    Ok(VideoCatalog::new(open_database(config)?, open_storage(config)))
}

async fn start_service(config: &Config) -> CliResult<VideoService> {
    let db = open_database(config)?;
    let storage = open_storage(config);

    let speech = ElevenLabsClient::from_config(&config.speech)?;
    let lipsync = LipSyncClient::from_config(&config.lipsync)?;
    let generator = VideoGenerator::new(
        Arc::new(speech),
        Arc::new(lipsync),
        config.speech.voice_settings,
    );

    let service = VideoService::start(
        db,
        storage,
        generator,
        PoolSettings {
            worker_count: config.worker_count,
            queue_capacity: config.queue_capacity,
        },
    )
    .await?;
    Ok(service)
}

async fn generate(
    config: &Config,
    user_id: i64,
    lesson_id: i64,
    voice_id: Option<String>,
    avatar: Option<PathBuf>,
) -> CliResult<ExitCode> {
    let avatar = match avatar {
        Some(path) => Some(read_avatar(&path).await?),
        None => None,
    };

    let service = start_service(config).await?;
    let outcome = submit_and_wait(&service, user_id, lesson_id, voice_id, avatar).await;
    service.shutdown().await;
    outcome
}

async fn submit_and_wait(
    service: &VideoService,
    user_id: i64,
    lesson_id: i64,
    voice_id: Option<String>,
    avatar: Option<AvatarUpload>,
) -> CliResult<ExitCode> {
    let receipt = service
        .submit(SubmitRequest {
            user_id,
            lesson_id,
            voice_id,
            avatar,
        })
        .await?;
    print_json(&receipt)?;

    loop {
        let job = service
            .get(&receipt.job_id)?
            .ok_or_else(|| format!("Video job {} disappeared", receipt.job_id))?;

        if job.status.is_terminal() {
            print_json(&job)?;
            return Ok(if job.status == lexora::VideoStatus::Completed {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            });
        }

        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

async fn read_avatar(path: &Path) -> CliResult<AvatarUpload> {
    let content = tokio::fs::read(path)
        .await
        .map_err(|e| format!("Failed to read avatar '{}': {}", path.display(), e))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "avatar".to_string());

    Ok(AvatarUpload { file_name, content })
}

async fn read_sample(path: &Path) -> CliResult<VoiceSample> {
    let content = tokio::fs::read(path)
        .await
        .map_err(|e| format!("Failed to read sample '{}': {}", path.display(), e))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| format!("'{}' is not a file", path.display()))?;

    Ok(VoiceSample { file_name, content })
}

fn print_json<T: Serialize>(value: &T) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
