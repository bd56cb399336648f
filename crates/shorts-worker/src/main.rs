//! `shorts` command-line entry point.

use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use shorts_models::EnvReader;
use shorts_services::{
    SpeechSynthesizer, VideoHost, VoicevoxClient, YoutubeClient, YoutubeConfig,
};
use shorts_worker::pipeline::format_elapsed;
use shorts_worker::{
    FfmpegToolkit, MediaToolkit, Pipeline, PipelineConfig, PipelineError, RunReport, Services,
};

/// Exit status after Ctrl-C.
const EXIT_INTERRUPTED: u8 = 130;

#[derive(Debug, Parser)]
#[command(name = "shorts", version, about = "Turn a topic into a narrated vertical short video")]
struct Cli {
    /// Video topic; prompts interactively when absent
    #[arg(short, long)]
    topic: Option<String>,

    /// Output file name inside OUTPUT_DIR (".mp4" is appended when missing)
    #[arg(short, long)]
    output: Option<String>,

    /// Validate configuration and external tools, then exit
    #[arg(long)]
    check_config: bool,

    /// Produce the video without uploading it
    #[arg(long)]
    skip_upload: bool,

    /// Delete the cached YouTube token, then exit
    #[arg(long)]
    revoke_youtube: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() -> anyhow::Result<()> {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env().add_directive("shorts=info".parse()?);

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
    Ok(())
}

async fn run() -> anyhow::Result<ExitCode> {
    // A provider may already be installed by an embedding process
    let _ = rustls::crypto::ring::default_provider().install_default();

    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing()?;

    if cli.revoke_youtube {
        return revoke_youtube().await;
    }

    let config = match PipelineConfig::from_env() {
        Ok(c) => c,
        Err(e) => return Ok(ExitCode::from(report_failure(&e))),
    };
    info!("Configuration: {}", config.summary());

    if cli.check_config {
        return check_config(&config).await;
    }

    let (cancel_tx, cancel_rx) = watch::channel(false);
    let services = match Services::from_config(&config, Some(cancel_rx)) {
        Ok(s) => s,
        Err(e) => return Ok(ExitCode::from(report_failure(&e))),
    };
    let pipeline = Pipeline::new(config, services).with_skip_upload(cli.skip_upload);

    match cli.topic {
        Some(topic) => Ok(ExitCode::from(
            run_once(&pipeline, &topic, cli.output.as_deref(), &cancel_tx).await,
        )),
        None => interactive(&pipeline, &cancel_tx).await,
    }
}

/// Run one topic, stopping ffmpeg on Ctrl-C. Returns the exit status.
async fn run_once(
    pipeline: &Pipeline,
    topic: &str,
    output: Option<&str>,
    cancel_tx: &watch::Sender<bool>,
) -> u8 {
    tokio::select! {
        result = pipeline.run(topic, output) => match result {
            Ok(report) => {
                print_report(&report);
                0
            }
            Err(e) => report_failure(&e),
        },
        _ = tokio::signal::ctrl_c() => {
            let _ = cancel_tx.send(true);
            warn!("Interrupted; the run workspace is left in place");
            EXIT_INTERRUPTED
        }
    }
}

/// One interactive request: a topic and an optional output name.
#[derive(Debug, PartialEq, Eq)]
struct TopicRequest {
    topic: String,
    output: Option<String>,
}

async fn prompt<W: AsyncWrite + Unpin>(out: &mut W, text: &str) -> anyhow::Result<()> {
    out.write_all(text.as_bytes())
        .await
        .context("failed to write prompt")?;
    out.flush().await.context("failed to flush prompt")?;
    Ok(())
}

/// Ask for a topic, then an output name. `None` on quit or end of input.
///
/// Blank topics ask again; a blank output name keeps the generated one.
async fn read_request<R, W>(lines: &mut Lines<R>, out: &mut W) -> anyhow::Result<Option<TopicRequest>>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let topic = loop {
        prompt(out, "\nTopic (quit to exit): ").await?;
        let Some(line) = lines.next_line().await.context("failed to read topic")? else {
            return Ok(None);
        };
        let topic = line.trim();
        if topic.is_empty() {
            continue;
        }
        if matches!(topic.to_lowercase().as_str(), "quit" | "exit" | "q") {
            return Ok(None);
        }
        break topic.to_string();
    };

    prompt(out, "Output file name (Enter for automatic): ").await?;
    let output = lines
        .next_line()
        .await
        .context("failed to read output name")?
        .map(|line| line.trim().to_string())
        .filter(|name| !name.is_empty());

    Ok(Some(TopicRequest { topic, output }))
}

async fn interactive(
    pipeline: &Pipeline,
    cancel_tx: &watch::Sender<bool>,
) -> anyhow::Result<ExitCode> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(request) = read_request(&mut lines, &mut stdout).await? {
        let status = run_once(pipeline, &request.topic, request.output.as_deref(), cancel_tx).await;
        if status == EXIT_INTERRUPTED {
            return Ok(ExitCode::from(EXIT_INTERRUPTED));
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn print_report(report: &RunReport) {
    println!();
    let elapsed = Duration::from_secs_f64(report.total_seconds());
    println!("Done in {}", format_elapsed(elapsed));
    println!("  Title:     {}", report.script.title);
    println!("  Video:     {}", report.output_path.display());
    println!("  Subtitles: {}", report.srt_path.display());
    if let Some(thumbnail) = &report.thumbnail_path {
        println!("  Thumbnail: {}", thumbnail.display());
    }
    match &report.upload {
        Some(upload) => println!("  YouTube:   {}", upload.url),
        None => println!("  YouTube:   not uploaded"),
    }
    if let Some(workspace) = &report.workspace {
        println!("  Workspace: {}", workspace.display());
    }
}

/// Log a failure. Returns its exit status.
fn report_failure(e: &PipelineError) -> u8 {
    match e.failed_stage() {
        Some(stage) => error!(stage = %stage, code = e.code(), "Run failed: {}", e),
        None => error!(code = e.code(), "{}", e),
    }
    eprintln!("error: {}", e);
    e.exit_code() as u8
}

async fn check_config(config: &PipelineConfig) -> anyhow::Result<ExitCode> {
    println!("Configuration OK: {}", config.summary());

    let mut problems = 0;

    let media = FfmpegToolkit::default();
    match media.check_tools() {
        Ok(paths) => {
            for path in paths {
                println!("  found {}", path.display());
            }
        }
        Err(e) => {
            println!("  ffmpeg: {}", e);
            problems += 1;
        }
    }

    let voicevox = VoicevoxClient::new(config.voicevox.clone())
        .context("failed to build VOICEVOX client")?;
    match voicevox.health_check().await {
        Ok(version) => println!("  VOICEVOX {} at {}", version, config.voicevox.base_url),
        Err(e) => {
            println!("  VOICEVOX: {}", e);
            problems += 1;
        }
    }

    if config.upload.enabled {
        match config.youtube.client_secrets().await {
            Ok(_) => println!("  YouTube client credentials found"),
            Err(e) => {
                println!("  YouTube: {}", e);
                problems += 1;
            }
        }
    }

    if problems == 0 {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(2))
    }
}

async fn revoke_youtube() -> anyhow::Result<ExitCode> {
    let mut env = EnvReader::from_env();
    let youtube = YoutubeConfig::from_reader(&mut env);
    if let Err(errors) = env.finish() {
        return Ok(ExitCode::from(report_failure(&PipelineError::Config(errors))));
    }

    let client = YoutubeClient::new(youtube).context("failed to build YouTube client")?;
    if client.revoke().await.context("failed to revoke YouTube token")? {
        println!("Cached YouTube token removed");
    } else {
        println!("No cached YouTube token");
    }
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn requests(input: &str) -> Vec<TopicRequest> {
        let mut lines = BufReader::new(input.as_bytes()).lines();
        let mut out = Vec::new();
        let mut found = Vec::new();
        while let Some(request) = read_request(&mut lines, &mut out).await.unwrap() {
            found.push(request);
        }
        found
    }

    #[tokio::test]
    async fn test_output_name_is_trimmed() {
        let found = requests("深海生物\n  deep_sea  \n").await;
        assert_eq!(
            found,
            vec![TopicRequest {
                topic: "深海生物".to_string(),
                output: Some("deep_sea".to_string()),
            }]
        );
    }

    #[tokio::test]
    async fn test_blank_output_name_keeps_generated() {
        let found = requests("\n  \n宇宙\n   \nquit\n").await;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].topic, "宇宙");
        assert_eq!(found[0].output, None);
    }

    #[tokio::test]
    async fn test_end_of_input_after_topic() {
        let found = requests("火山").await;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].output, None);
        assert!(requests("").await.is_empty());
        assert!(requests("Q\nignored\n").await.is_empty());
    }

    #[tokio::test]
    async fn test_prompts_are_written() {
        let mut lines = BufReader::new("a\nb\n".as_bytes()).lines();
        let mut out = Vec::new();
        read_request(&mut lines, &mut out).await.unwrap();
        let shown = String::from_utf8(out).unwrap();
        assert!(shown.contains("Topic (quit to exit): "));
        assert!(shown.contains("Output file name"));
    }
}
