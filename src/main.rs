use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chatstream::config::{load_config, ClientConfig};
use chatstream::observability::init_tracing;
use chatstream::stream::decode_reader;
use chatstream::{ChatClient, ChatCompletionRequest, ChatMessage, CompletionEvent};
use clap::{Parser, Subcommand};
use futures_util::StreamExt;

/// Decode streamed chat completions and print each event as a JSON line.
#[derive(Parser, Debug)]
#[command(name = "chatstream", about = "Decode streamed chat completions")]
struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,

    /// Log level override (falls back to CHATSTREAM_LOG).
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Replay a captured SSE body.
    Replay {
        /// Transcript file; stdin when omitted.
        transcript: Option<PathBuf>,
    },
    /// Stream a real completion.
    ///
    /// Reads OPENAI_API_KEY, OPENAI_ORGANIZATION and OPENAI_BASE_URL unless
    /// --config is given.
    Live {
        /// Model name.
        model: String,
        /// User prompt.
        prompt: String,
        /// YAML client config.
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    // An explicit level wins; otherwise each mode installs its own default.
    if let Some(log_level) = cli
        .log_level
        .clone()
        .or_else(|| std::env::var("CHATSTREAM_LOG").ok())
    {
        init_tracing(&log_level);
    }

    let failed = match cli.command {
        Command::Replay { transcript } => replay(transcript.as_deref()),
        Command::Live {
            model,
            prompt,
            config,
        } => live(&model, &prompt, config.as_deref()),
    };
    if failed {
        std::process::exit(1);
    }
}

/// Decode a transcript and print every event; returns `true` on a failed stream.
fn replay(path: Option<&Path>) -> bool {
    init_tracing("WARNING");
    let reader: Box<dyn BufRead> = match path {
        Some(path) => match File::open(path) {
            Ok(file) => Box::new(BufReader::new(file)),
            Err(e) => {
                eprintln!("Failed to open transcript '{}': {e}", path.display());
                std::process::exit(1);
            }
        },
        None => Box::new(io::stdin().lock()),
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut failed = false;
    decode_reader(reader, |event| {
        failed |= matches!(event, CompletionEvent::Failed(_));
        print_event(&mut out, &event);
    });
    failed
}

fn live(model: &str, prompt: &str, config_path: Option<&Path>) -> bool {
    let config = match config_path {
        Some(path) => load_config(path),
        None => ClientConfig::from_env(),
    }
    .unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {e}");
        std::process::exit(1);
    });
    init_tracing(&config.log_level);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap_or_else(|e| {
            eprintln!("Failed to initialize Tokio runtime: {e}");
            std::process::exit(1);
        });

    runtime.block_on(async move {
        let client = match ChatClient::new(config) {
            Ok(client) => client,
            Err(e) => {
                eprintln!("Failed to build client: {e}");
                return true;
            }
        };
        let request = ChatCompletionRequest::new(model, vec![ChatMessage::user(prompt)])
            .with_usage_in_stream();
        let mut events = match client.stream_chat_completion(request).await {
            Ok(events) => events,
            Err(e) => {
                eprintln!("Request failed: {e}");
                return true;
            }
        };

        let stdout = io::stdout();
        let mut failed = false;
        while let Some(event) = events.next().await {
            failed |= matches!(event, CompletionEvent::Failed(_));
            print_event(&mut stdout.lock(), &event);
        }
        failed
    })
}

fn event_json(event: &CompletionEvent) -> serde_json::Value {
    match event {
        CompletionEvent::Delta(completion) => {
            serde_json::json!({"event": "delta", "completion": completion})
        }
        CompletionEvent::Done(completion) => {
            serde_json::json!({"event": "done", "completion": completion})
        }
        CompletionEvent::Failed(err) => serde_json::json!({
            "event": "failed",
            "error": err.to_string(),
            "category": format!("{:?}", err.category()),
        }),
    }
}

fn print_event(out: &mut impl Write, event: &CompletionEvent) {
    if let Err(e) = writeln!(out, "{}", event_json(event)) {
        tracing::warn!(error = %e, "failed to write event");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_replay() {
        let cli = Cli::try_parse_from(["chatstream", "replay"]).unwrap();
        assert_eq!(cli.command, Command::Replay { transcript: None });

        let cli = Cli::try_parse_from(["chatstream", "replay", "body.sse"]).unwrap();
        assert_eq!(
            cli.command,
            Command::Replay {
                transcript: Some(PathBuf::from("body.sse"))
            }
        );
        assert!(Cli::try_parse_from(["chatstream", "replay", "a", "b"]).is_err());
    }

    #[test]
    fn test_parse_live() {
        let cli = Cli::try_parse_from([
            "chatstream",
            "live",
            "gpt-4o",
            "hello",
            "--config",
            "c.yaml",
        ])
        .unwrap();
        assert_eq!(
            cli.command,
            Command::Live {
                model: "gpt-4o".into(),
                prompt: "hello".into(),
                config: Some(PathBuf::from("c.yaml")),
            }
        );
        assert!(Cli::try_parse_from(["chatstream", "live", "gpt-4o"]).is_err());
    }

    #[test]
    fn test_parse_global_log_level() {
        let cli = Cli::try_parse_from(["chatstream", "replay", "--log-level", "debug"]).unwrap();
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert!(Cli::try_parse_from(["chatstream"]).is_err());
    }

    #[test]
    fn test_event_json_shapes() {
        let done = event_json(&CompletionEvent::Done(chatstream::ChatCompletion::default()));
        assert_eq!(done["event"], "done");
        let failed = event_json(&CompletionEvent::Failed(
            chatstream::StreamError::Transport("reset".into()),
        ));
        assert_eq!(failed["event"], "failed");
        assert_eq!(failed["category"], "ServerError");
    }
}
