use anyhow::Context;
use chatorg_core::ChatorgClient;
use chatorgd::{EngineConfig, JsonLinesSink, ProgressSink, RemoteApi, Service};
use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, PartialEq, Eq)]
enum CliMode {
    Serve,
    Once(String),
    Help,
}

fn parse_cli_mode<I>(args: I) -> anyhow::Result<CliMode>
where
    I: IntoIterator<Item = String>,
{
    let mut mode = CliMode::Serve;
    let mut args = args.into_iter().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--command" | "-c" => {
                let command = args.next().context("--command needs a JSON argument")?;
                mode = CliMode::Once(command);
            }
            "--help" | "-h" => mode = CliMode::Help,
            other => match other.strip_prefix("--command=") {
                Some(command) => mode = CliMode::Once(command.to_string()),
                None => anyhow::bail!("unknown argument: {other}"),
            },
        }
    }
    Ok(mode)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let mode = parse_cli_mode(std::env::args())?;
    if mode == CliMode::Help {
        println!("Usage: chatorgd [--command '<json>']");
        println!("  (no arguments)      Read one JSON command per stdin line");
        println!("  --command '<json>'  Run a single command and exit");
        println!("Configuration comes from CHATORG_* environment variables.");
        return Ok(());
    }
    init_tracing();

    let config = EngineConfig::from_env();
    let client_config = config.client_config().context("missing api credentials")?;
    let client = ChatorgClient::with_config(client_config).context("invalid api client config")?;
    let service = Service::new(client, JsonLinesSink::new(std::io::stdout()), config);

    match mode {
        CliMode::Once(line) => {
            let reply = service.handle_line(&line).await;
            service.sink().write_json(&reply);
            Ok(())
        }
        CliMode::Serve | CliMode::Help => serve(&service).await,
    }
}

/// Reads commands until stdin closes, running them concurrently; the guard
/// decides which runs may overlap.
async fn serve<A: RemoteApi>(
    service: &Service<A, JsonLinesSink<std::io::Stdout>>,
) -> anyhow::Result<()> {
    tracing::info!("waiting for commands on stdin");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut running = FuturesUnordered::new();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            line = lines.next_line(), if stdin_open => {
                match line.context("failed to read stdin")? {
                    Some(line) if line.trim().is_empty() => {}
                    Some(line) => running.push(respond(service, line)),
                    None => {
                        tracing::debug!(pending = running.len(), "stdin closed");
                        stdin_open = false;
                    }
                }
            }
            Some(reply) = running.next(), if !running.is_empty() => {
                service.sink().write_json(&reply);
            }
            else => break,
        }
    }
    tracing::info!("all commands finished");
    Ok(())
}

async fn respond<A: RemoteApi, S: ProgressSink>(
    service: &Service<A, S>,
    line: String,
) -> serde_json::Value {
    service.handle_line(&line).await
}
