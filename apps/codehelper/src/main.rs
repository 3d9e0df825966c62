use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use codehelper_rs::types::{DiffHunk, DiffType, ModifyCodeRequest};
use codehelper_rs::{ChatRequest, Client, ClientBuilder};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "codehelper")]
#[command(about = "Talk to the AI code helper backend")]
#[command(version)]
struct Args {
    /// Backend base URL, including the `/api` prefix
    #[arg(long, global = true, env = "CODEHELPER_BASE_URL")]
    base_url: Option<String>,

    /// Query parameter carrying the session id (some backends expect `memoryId`)
    #[arg(long, global = true)]
    session_param: Option<String>,

    /// Request timeout in seconds for the code endpoints
    #[arg(long, global = true)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream an answer to stdout
    Chat {
        /// Conversation id
        #[arg(long)]
        session: String,
        /// Project directory the backend should look at
        #[arg(long)]
        project_path: Option<String>,
        message: String,
    },
    /// Probe the backend; exit status 0 when healthy
    Health {
        /// Probe timeout in seconds
        #[arg(long, default_value_t = 5)]
        probe_timeout: u64,
    },
    /// Rewrite a file according to an instruction
    Modify {
        #[arg(long)]
        file: PathBuf,
        #[arg(long)]
        instruction: String,
        /// Print the hunks instead of the whole modified file
        #[arg(long)]
        diff: bool,
        /// With --diff, print the raw result as JSON
        #[arg(long, requires = "diff")]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "codehelper=info,codehelper_rs=info".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut builder = ClientBuilder::new();
    if let Some(url) = args.base_url {
        builder = builder.base_url(url);
    }
    if let Some(param) = args.session_param {
        builder = builder.session_param(param);
    }
    if let Some(secs) = args.timeout {
        builder = builder.timeout_secs(secs);
    }

    match args.command {
        Commands::Health { probe_timeout } => {
            let client = builder
                .health_timeout(Duration::from_secs(probe_timeout))
                .build()?;
            health(&client).await
        }
        Commands::Chat {
            session,
            project_path,
            message,
        } => {
            let mut request = ChatRequest::new(session, message);
            if let Some(path) = project_path {
                request = request.project_path(path);
            }
            chat(&builder.build()?, request).await
        }
        Commands::Modify {
            file,
            instruction,
            diff,
            json,
        } => modify(&builder.build()?, &file, instruction, diff, json).await,
    }
}

async fn health(client: &Client) -> Result<ExitCode> {
    if client.check_health().await {
        println!("healthy");
        Ok(ExitCode::SUCCESS)
    } else {
        println!("unhealthy");
        Ok(ExitCode::FAILURE)
    }
}

async fn chat(client: &Client, request: ChatRequest) -> Result<ExitCode> {
    let mut sub = client.subscribe_chat(request);
    let mut stdout = std::io::stdout();
    let mut failed = false;

    loop {
        tokio::select! {
            item = sub.recv() => match item {
                Some(Ok(chunk)) => {
                    stdout.write_all(chunk.as_bytes())?;
                    stdout.flush()?;
                }
                Some(Err(e)) => {
                    failed = true;
                    eprintln!("\nError: {e}");
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted");
                sub.close();
                failed = true;
                break;
            }
        }
    }
    println!();

    Ok(if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

async fn modify(
    client: &Client,
    file: &Path,
    instruction: String,
    diff: bool,
    json: bool,
) -> Result<ExitCode> {
    let code = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let mut request = ModifyCodeRequest::new(code, instruction);
    if let Some(name) = file.file_name() {
        request = request.file_name(name.to_string_lossy());
    }

    if !diff {
        let modified = client.modify_code(&request).await?;
        print!("{modified}");
        return Ok(ExitCode::SUCCESS);
    }

    let result = client.modify_code_with_diff(&request).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        for hunk in &result.hunks {
            print!("{}", render_hunk(hunk));
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// Unified-diff style rendering; the backend counts lines from zero.
fn render_hunk(hunk: &DiffHunk) -> String {
    let mut out = format!(
        "@@ -{},{} +{},{} @@",
        hunk.original_start + 1,
        hunk.original_lines,
        hunk.modified_start + 1,
        hunk.modified_lines
    );
    if let Some(description) = &hunk.description {
        out.push(' ');
        out.push_str(description);
    }
    out.push('\n');

    let (removed, added) = match hunk.kind {
        DiffType::Unchanged => ("  ", "  "),
        DiffType::Added | DiffType::Removed | DiffType::Modified => ("- ", "+ "),
    };
    for line in &hunk.original_lines_list {
        out.push_str(removed);
        out.push_str(line);
        out.push('\n');
    }
    if hunk.kind != DiffType::Unchanged {
        for line in &hunk.modified_lines_list {
            out.push_str(added);
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hunk(kind: DiffType, original: &[&str], modified: &[&str]) -> DiffHunk {
        DiffHunk {
            original_start: 2,
            original_lines: original.len() as u32,
            modified_start: 2,
            modified_lines: modified.len() as u32,
            original_lines_list: original.iter().map(ToString::to_string).collect(),
            modified_lines_list: modified.iter().map(ToString::to_string).collect(),
            kind,
            description: None,
        }
    }

    #[test]
    fn renders_modified_hunk() {
        let out = render_hunk(&hunk(DiffType::Modified, &["old"], &["new"]));
        assert_eq!(out, "@@ -3,1 +3,1 @@\n- old\n+ new\n");
    }

    #[test]
    fn renders_unchanged_hunk_once() {
        let out = render_hunk(&hunk(DiffType::Unchanged, &["same"], &["same"]));
        assert_eq!(out, "@@ -3,1 +3,1 @@\n  same\n");
    }

    #[test]
    fn cli_parses_chat() {
        let args = Args::try_parse_from([
            "codehelper",
            "--session-param",
            "memoryId",
            "chat",
            "--session",
            "7",
            "hello there",
        ])
        .unwrap();
        assert_eq!(args.session_param.as_deref(), Some("memoryId"));
        match args.command {
            Commands::Chat {
                session, message, ..
            } => {
                assert_eq!(session, "7");
                assert_eq!(message, "hello there");
            }
            _ => panic!("expected chat"),
        }
    }
}
