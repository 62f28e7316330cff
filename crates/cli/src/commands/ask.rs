//! `iiot-assistant ask` — Single-question or interactive chat mode.

use iiot_assistant_config::AppConfig;
use iiot_assistant_core::event::DomainEvent;
use iiot_assistant_core::session::SessionId;
use std::io::Write;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, BufReader};

use super::{CliResult, build_assistant, config_path, load_config};

pub async fn run(
    path: Option<&Path>,
    message: Option<String>,
    session_id: String,
    verbose: bool,
) -> CliResult {
    let config = load_config(path)?;

    if missing_api_key(&config) {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables (or put it in .env):");
        eprintln!("    OPENAI_API_KEY          = 'sk-...'");
        eprintln!("    IIOT_ASSISTANT_API_KEY  = 'sk-...'");
        eprintln!();
        eprintln!("  Or add api_key to {}", config_path(path).display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let assistant = build_assistant(&config)?;

    if verbose {
        let mut events = assistant.event_bus().subscribe();
        tokio::spawn(async move {
            while let Ok(event) = events.recv().await {
                match event.as_ref() {
                    DomainEvent::ToolExecuted { tool_name, success, duration_ms, .. } => {
                        tracing::debug!(tool = %tool_name, success, duration_ms, "Tool executed");
                    }
                    DomainEvent::ResponseGenerated { model, tokens_used, .. } => {
                        tracing::debug!(model = %model, tokens_used, "Model responded");
                    }
                    other => tracing::debug!(event = ?other, "Event"),
                }
            }
        });
    }

    let mut session = assistant.new_session(SessionId::from(&session_id));

    if let Some(msg) = message {
        eprint!("  Thinking...");
        let response = assistant.respond(&mut session, &msg).await;
        eprint!("\r              \r");
        println!("{}", response?);
        return Ok(());
    }

    print_banner(&config, &assistant.tools().names(), &session_id);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt()?;

    while let Some(line) = lines.next_line().await? {
        let input = line.trim();
        match input {
            "" => {}
            "exit" | "quit" => break,
            "/reset" => {
                assistant.reset(&mut session);
                println!("  Conversation cleared.\n");
            }
            _ => {
                eprint!("  ...");
                match assistant.respond(&mut session, input).await {
                    Ok(response) => {
                        eprint!("\r     \r");
                        println!();
                        for line in response.lines() {
                            println!("  Assistant > {line}");
                        }
                        println!();
                    }
                    Err(e) => {
                        eprint!("\r     \r");
                        eprintln!("  [Error] {e}");
                        println!();
                    }
                }
            }
        }
        prompt()?;
    }

    println!();
    println!("  Goodbye!");
    println!();

    Ok(())
}

/// Local providers run without a key; everything else needs one.
fn missing_api_key(config: &AppConfig) -> bool {
    !config.has_api_key() && !iiot_assistant_providers::is_keyless(&config.default_provider)
}

fn prompt() -> std::io::Result<()> {
    print!("  You > ");
    std::io::stdout().flush()
}

fn print_banner(config: &AppConfig, tools: &[&str], session_id: &str) {
    println!();
    println!("  IIoT Assistant — Interactive Mode");
    println!();
    println!("  Provider:  {}", config.default_provider);
    println!("  Model:     {}", config.default_model);
    println!("  Tools:     {}", tools.join(", "));
    println!("  Session:   {session_id}");
    println!();
    println!("  Type your question and press Enter.");
    println!("  Type '/reset' to start over, 'exit' or Ctrl+C to quit.");
    println!();
}
