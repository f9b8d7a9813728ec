//! flowing - conversational diagram generator CLI

mod commands;
mod config;
mod oauth;
mod prompt;

use anyhow::{Context, bail};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use flowing_agent::{RunOutcome, SandboxConfig, SandboxRunner, TurnState, Workflow, WorkflowEvent};
use flowing_ai::{AnthropicClient, Message, ModelClient, OpenAiCompatClient};

/// flowing - conversational diagram generator
#[derive(Parser, Debug)]
#[command(name = "flowing")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Provider (tongyi, claude, custom)
    #[arg(short, long)]
    provider: Option<String>,

    /// Model to use (overrides the configured model)
    #[arg(short, long)]
    model: Option<String>,

    /// Directory for generated diagrams
    #[arg(short, long)]
    output_dir: Option<String>,

    /// Root of the flowing library checkout
    #[arg(long)]
    flowing_root: Option<String>,

    /// Run a single prompt non-interactively
    #[arg(short = 'c', long)]
    command: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Initialize config file
    #[arg(long)]
    init_config: bool,

    /// Login to Anthropic with a Claude Pro/Max account
    #[arg(long)]
    login: bool,

    /// Remove the stored OAuth login
    #[arg(long)]
    logout: bool,

    /// Show OAuth login status
    #[arg(long)]
    auth_status: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("flowing=debug")
            .init();
    }

    if args.init_config {
        match config::Config::init() {
            Ok(path) => {
                println!("Config file created at: {}", path.display());
                println!("\nExample config:\n{}", config::example_config());
            }
            Err(e) => {
                eprintln!("Error creating config: {}", e);
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    if args.login {
        return handle_login().await;
    }
    if args.logout {
        return handle_logout();
    }
    if args.auth_status {
        return show_auth_status();
    }

    let cfg = config::Config::load();

    // CLI flags over config over defaults
    let mut provider = args
        .provider
        .clone()
        .or(cfg.provider.clone())
        .unwrap_or_else(|| config::DEFAULT_PROVIDER.to_string());

    let output_dir = args
        .output_dir
        .clone()
        .or(cfg.output_dir.clone())
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    let flowing_root = args
        .flowing_root
        .clone()
        .or(cfg.flowing_root.clone())
        .map(PathBuf::from)
        .unwrap_or_else(|| output_dir.clone());

    if cfg.get_api_key_with_oauth(&provider).await.is_none() {
        print_auth_guidance(&provider);
        std::process::exit(1);
    }

    let client = build_client(&cfg, &provider, args.model.as_deref()).await?;
    let sandbox = SandboxRunner::new(make_sandbox_config(&cfg, &flowing_root));
    let mut workflow = Workflow::new(client, sandbox);

    let system_prompt = prompt::build_system_prompt(
        &flowing_root.display().to_string(),
        &output_dir.display().to_string(),
    );
    let mut history = vec![Message::system(system_prompt.clone())];

    // Non-interactive mode
    if let Some(command) = args.command {
        let (outcome, state) = run_one_turn(&workflow, history, &command).await?;
        print_outcome(outcome, &state);
        if outcome == RunOutcome::Failure {
            std::process::exit(1);
        }
        return Ok(());
    }

    // Interactive mode
    print_banner(&provider, &output_dir);
    let mut last_code = String::new();

    loop {
        use std::io::{self, Write};

        print!("> ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            // EOF
            println!("\nBye!");
            break;
        }

        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        if let Some(result) = commands::execute_command(input, &provider) {
            match result {
                commands::CommandResult::Exit => {
                    println!("Bye!");
                    break;
                }
                commands::CommandResult::Clear => {
                    history = vec![Message::system(system_prompt.clone())];
                    println!("Conversation cleared.");
                }
                commands::CommandResult::ShowLast => {
                    if last_code.is_empty() {
                        println!("No code generated yet.");
                    } else {
                        println!("\n--- last generated code ---");
                        println!("{}", last_code);
                        println!("--- end ---");
                    }
                }
                commands::CommandResult::Switch(new_provider) => {
                    match build_client(&cfg, &new_provider, None).await {
                        Ok(client) => {
                            let sandbox =
                                SandboxRunner::new(make_sandbox_config(&cfg, &flowing_root));
                            workflow = Workflow::new(client, sandbox);
                            provider = new_provider;
                            println!("Switched to {}", provider);
                        }
                        Err(e) => {
                            println!("Switch failed: {}", e);
                        }
                    }
                }
                commands::CommandResult::Message(msg) => {
                    println!("{}", msg);
                }
                commands::CommandResult::Unknown(cmd) => {
                    println!("Unknown command: /{}", cmd);
                    println!("Type /help for available commands.");
                }
            }
            println!();
            continue;
        }

        println!();
        match run_one_turn(&workflow, history.clone(), input).await {
            Ok((outcome, state)) => {
                if let Some(code) = &state.last_code {
                    last_code = code.clone();
                }
                history = state.messages.clone();
                print_outcome(outcome, &state);
            }
            Err(e) => {
                // Model-call failure; the turn is discarded and the
                // previous history stays in effect
                eprintln!("Error: {}", e);
            }
        }
        println!();
    }

    Ok(())
}

/// Drive one turn with progress output and Ctrl-C wired to abort.
async fn run_one_turn(
    workflow: &Workflow,
    history: Vec<Message>,
    user_text: &str,
) -> anyhow::Result<(RunOutcome, TurnState)> {
    let mut receiver = workflow.subscribe();
    let printer = tokio::spawn(async move {
        while let Ok(event) = receiver.recv().await {
            match event {
                WorkflowEvent::GenerationStart { attempt } => {
                    if attempt == 1 {
                        println!("Generating...");
                    } else {
                        println!("Regenerating (attempt {})...", attempt);
                    }
                }
                WorkflowEvent::ExecutionStart { .. } => {
                    println!("Running generated code...");
                }
                WorkflowEvent::RepairRequested { retry_count, .. } => {
                    println!("Execution failed, asking the model to fix it (retry {})", retry_count);
                }
                WorkflowEvent::RunEnd { .. } => break,
                _ => {}
            }
        }
    });

    let handle = workflow.handle();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            handle.abort();
        }
    });

    let result = workflow.run_turn(history, user_text).await;

    watcher.abort();
    // Let the printer drain buffered events
    tokio::time::sleep(Duration::from_millis(50)).await;
    printer.abort();

    Ok(result?)
}

fn print_outcome(outcome: RunOutcome, state: &TurnState) {
    match outcome {
        RunOutcome::Success => {
            println!();
            match &state.output_path {
                Some(path) => {
                    println!("Generated successfully!");
                    println!("Output file: {}", path);
                }
                None => println!("Done (no output file path detected)"),
            }
        }
        RunOutcome::Failure => {
            println!();
            println!(
                "Execution failed: {}",
                state.last_error.as_deref().unwrap_or("unknown error")
            );
            println!("Use /last to inspect the code, then adjust your description and retry.");
        }
        RunOutcome::Cancelled => {
            println!();
            println!("Cancelled.");
        }
    }
}

fn make_sandbox_config(cfg: &config::Config, flowing_root: &std::path::Path) -> SandboxConfig {
    let mut sandbox = SandboxConfig::new(flowing_root);
    if let Some(runtime) = &cfg.runtime {
        sandbox.runtime = runtime.clone();
        sandbox.runtime_args = cfg.runtime_args.clone().unwrap_or_default();
    }
    if let Some(secs) = cfg.timeout_secs {
        sandbox.timeout = Duration::from_secs(secs);
    }
    sandbox
}

/// Build the model client for a provider, resolving credentials through
/// OAuth, config, and environment in that order.
async fn build_client(
    cfg: &config::Config,
    provider: &str,
    model_override: Option<&str>,
) -> anyhow::Result<Arc<dyn ModelClient>> {
    let api_key = cfg
        .get_api_key_with_oauth(provider)
        .await
        .with_context(|| format!("no authentication found for {}", provider))?;

    let model = model_override
        .map(str::to_string)
        .or_else(|| cfg.model_for(provider))
        .with_context(|| format!("no model configured for {}", provider))?;

    match provider {
        "claude" => Ok(Arc::new(AnthropicClient::new(api_key, model))),
        "tongyi" | "custom" => {
            let endpoint = cfg
                .endpoint_for(provider)
                .with_context(|| format!("no endpoint configured for {}", provider))?;
            Ok(Arc::new(OpenAiCompatClient::new(api_key, endpoint, model)))
        }
        other => bail!("unknown provider: {}", other),
    }
}

fn print_auth_guidance(provider: &str) {
    eprintln!("Error: No authentication found for {}", provider);
    eprintln!();
    match provider {
        "claude" => {
            eprintln!("Options:");
            eprintln!("  1. Login with Claude Pro/Max: flowing --login");
            eprintln!("  2. Set API key: export ANTHROPIC_API_KEY=your-key");
            eprintln!("  3. Add to config: flowing --init-config");
        }
        "tongyi" => {
            eprintln!("Set your API key with: export DASHSCOPE_API_KEY=your-key");
            eprintln!("Or add it to config file: flowing --init-config");
        }
        _ => {
            eprintln!("Set your API key with: export FLOWING_API_KEY=your-key");
            eprintln!("Or add it to config file: flowing --init-config");
        }
    }
}

fn print_banner(provider: &str, output_dir: &std::path::Path) {
    println!();
    println!("flowing — conversational diagram generator");
    println!("  provider:   {}", provider);
    println!("  output dir: {}", output_dir.display());
    println!();
    println!("Describe a diagram to generate it, or use a command:");
    println!("  /quit     exit");
    println!("  /switch   change provider");
    println!("  /last     show the last generated code");
    println!("  /clear    clear conversation history");
    println!();
}

async fn handle_login() -> anyhow::Result<()> {
    println!("Logging in to Anthropic (Claude Pro/Max)...");
    println!();

    match oauth::login().await {
        Ok(()) => {
            println!();
            println!("Successfully logged in!");
            println!(
                "Credentials saved to {}",
                config::Config::config_dir().join("oauth.json").display()
            );
        }
        Err(e) => {
            eprintln!();
            eprintln!("Login failed: {}", e);
            std::process::exit(1);
        }
    }

    Ok(())
}

fn handle_logout() -> anyhow::Result<()> {
    match oauth::logout() {
        Ok(()) => println!("Logged out."),
        Err(e) => {
            eprintln!("Logout failed: {}", e);
            std::process::exit(1);
        }
    }
    Ok(())
}

fn show_auth_status() -> anyhow::Result<()> {
    println!("OAuth Authentication Status");
    println!("{}", "-".repeat(40));

    let status = if let Some(creds) = oauth::load_credentials() {
        let expires = chrono::DateTime::from_timestamp_millis(creds.expires)
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "unknown".to_string());

        if creds.is_expired() {
            "Logged in (token expired, will refresh on next use)".to_string()
        } else {
            format!("Logged in (expires: {})", expires)
        }
    } else {
        "Not logged in".to_string()
    };

    println!("{:<25} {}", "Anthropic (Claude Pro/Max)", status);
    println!();
    println!("Login with: flowing --login");
    println!("Logout with: flowing --logout");

    Ok(())
}
