//! shopchat binary - composition root.
//!
//! 1. Parse CLI arguments and read configuration from TOML
//! 2. Initialize tracing on stderr, then report how the config load went
//! 3. Build the HTTP collaborators
//! 4. Run the requested command: interactive chat, one-shot ask, catalog, ping

mod cli;
mod display;

use std::io::Write;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use shopchat_chat::{
    CatalogService, HttpCatalogClient, HttpSearchClient, RenderedMessage, SearchService,
    ShoppingAssistant,
};
use shopchat_core::{MessageId, Sender};

use cli::{CliArgs, Command};
use display::TranscriptPrinter;

/// Print every message appended after `after`.
fn print_since<S: SearchService>(
    bot: &ShoppingAssistant<S>,
    after: MessageId,
    printer: &TranscriptPrinter,
    skip_user: bool,
) {
    for message in bot.conversation().since(after) {
        if skip_user && message.sender() == Sender::User {
            continue;
        }
        let view = RenderedMessage::from_message(message);
        print!("{}", printer.format_message(&view));
    }
}

/// Interactive read-submit-print loop on stdin.
async fn run_chat(
    client: HttpSearchClient,
    printer: &TranscriptPrinter,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut bot = ShoppingAssistant::new(client);
    print_since(&bot, MessageId(0), printer, false);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("you> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let trimmed = line.trim();
        if trimmed == "quit" || trimmed == "exit" {
            break;
        }

        let before = bot.conversation().last_id();
        bot.set_input(line);
        if bot.submit_input().await.is_some() {
            print_since(&bot, before, printer, true);
        }
    }

    tracing::info!(
        session_id = %bot.conversation().session_id(),
        messages = bot.conversation().len(),
        "Chat ended"
    );
    Ok(())
}

/// Run a single turn and print the user message and reply.
async fn run_ask(client: HttpSearchClient, query: &str, printer: &TranscriptPrinter) {
    let mut bot = ShoppingAssistant::new(client);
    let before = bot.conversation().last_id();
    if bot.submit(query).await.is_some() {
        print_since(&bot, before, printer, false);
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config. Load errors are logged after tracing is up.
    let config_file = args.resolve_config_path();
    let (config, load_error) = args.load_config(&config_file);

    // Tracing.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.general.log_level)),
        )
        .init();

    tracing::info!("Starting shopchat v{}", env!("CARGO_PKG_VERSION"));
    if let Some(e) = &load_error {
        tracing::warn!(
            "Failed to load config from {}: {}. Using defaults.",
            config_file.display(),
            e
        );
    }
    tracing::info!(
        path = %config_file.display(),
        base_url = %config.search.base_url,
        "Configuration resolved"
    );

    let printer = TranscriptPrinter::new(&config.display);

    match args.command() {
        Command::Chat => {
            let client = HttpSearchClient::new(config.search.clone())?;
            run_chat(client, &printer).await?;
        }
        Command::Ask { query } => {
            let client = HttpSearchClient::new(config.search.clone())?;
            run_ask(client, &query.join(" "), &printer).await;
        }
        Command::Catalog => {
            let client = HttpCatalogClient::new(config.search.clone())?;
            let products = client.list_products().await?;
            print!("{}", printer.format_catalog(&products));
        }
        Command::Ping => {
            let client = HttpSearchClient::new(config.search.clone())?;
            match client.health().await {
                Ok(()) => println!("{} is up", config.search.base_url),
                Err(e) => {
                    tracing::error!(error = %e, "Health check failed");
                    return Err(e.into());
                }
            }
        }
    }

    Ok(())
}
