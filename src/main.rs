use std::collections::BTreeSet;
use std::io::{self, Read, Write};
use std::path::PathBuf;

use color_eyre::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod config;
mod error;
mod extract;
mod highlight;
mod llm;
mod pipeline;
mod prompt;
mod redaction;
mod render;
mod response;
mod session;
mod verdict;

use config::{AppConfig, DetectionSettings, RedactionSettings};
use extract::BasicExtractor;
use llm::{ChatGateway, LlmProvider, ModelGateway};
use prompt::{Check, ContentType, ResponseFormat, Sensitivity};
use redaction::{Placeholder, RedactionCategory, RedactionRuleSet};
use session::SessionContext;

fn load_llm_credentials(configured: Option<&str>) -> Result<(LlmProvider, String), String> {
    // Project-local .env first.
    let _ = dotenvy::dotenv();

    // Then the user-level one for global installs.
    if let Some(dir) = config::config_dir() {
        let user_env = dir.join(".env");
        if user_env.exists() {
            let _ = dotenvy::from_path(user_env);
        }
    }

    let key_for = |provider: LlmProvider| -> Option<(LlmProvider, String)> {
        std::env::var(provider.key_var())
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .map(|k| (provider, k))
    };

    let preferred = std::env::var("TEXTGUARD_PROVIDER")
        .ok()
        .or_else(|| configured.map(str::to_string));
    if let Some(name) = preferred {
        let provider: LlmProvider = name.parse()?;
        return key_for(provider).ok_or_else(|| {
            format!(
                "provider is {} but {} is not set",
                provider.as_str(),
                provider.key_var()
            )
        });
    }

    [LlmProvider::Groq, LlmProvider::OpenRouter, LlmProvider::OpenAI]
        .into_iter()
        .find_map(key_for)
        .ok_or_else(|| {
            "No API key found.\n\nSet GROQ_API_KEY, OPENROUTER_API_KEY or OPENAI_API_KEY.\n\nOptional: set TEXTGUARD_PROVIDER=groq|openrouter|openai".to_string()
        })
}

fn connect(config: &AppConfig) -> Result<ChatGateway, String> {
    let settings = config.gateway_settings();
    let (provider, api_key) = load_llm_credentials(settings.provider.as_deref())?;
    tracing::debug!(provider = provider.as_str(), model = %settings.model, "connecting");
    ChatGateway::new(
        provider,
        api_key,
        settings.model,
        settings.vision_model,
        settings.base_url.as_deref(),
        settings.timeout,
    )
    .map_err(|e| e.to_string())
}

fn connect_or_exit(config: &AppConfig) -> ChatGateway {
    match connect(config) {
        Ok(gateway) => gateway,
        Err(msg) => {
            eprintln!("{}", msg);
            eprintln!();
            eprintln!("Examples:");
            eprintln!("  export GROQ_API_KEY=...");
            eprintln!("  echo 'GROQ_API_KEY=...' > ~/.textguard/.env");
            std::process::exit(1);
        }
    }
}

/// Gateway for actions that work without one. Missing credentials only
/// narrow what the action can do.
fn connect_optional(config: &AppConfig, wanted: bool) -> Option<ChatGateway> {
    if !wanted {
        return None;
    }
    match connect(config) {
        Ok(gateway) => Some(gateway),
        Err(msg) => {
            tracing::warn!(reason = %msg.lines().next().unwrap_or_default(), "no model available");
            None
        }
    }
}

#[derive(Debug, Default)]
struct CliArgs {
    format: Option<ResponseFormat>,
    mode: Option<Sensitivity>,
    content_type: Option<ContentType>,
    threshold: Option<u8>,
    checks: Option<BTreeSet<Check>>,
    no_ai: bool,
    placeholder: Option<Placeholder>,
    only: Option<Vec<RedactionCategory>>,
    json: bool,
    positional: Vec<String>,
}

impl CliArgs {
    fn parse(args: &[String]) -> Result<Self, String> {
        let mut out = CliArgs::default();
        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            let mut value = |flag: &str| {
                iter.next()
                    .cloned()
                    .ok_or_else(|| format!("{} needs a value", flag))
            };
            match arg.as_str() {
                "--format" => out.format = Some(value(arg)?.parse()?),
                "--mode" => out.mode = Some(value(arg)?.parse()?),
                "--type" => out.content_type = Some(value(arg)?.parse()?),
                "--threshold" => {
                    let raw = value(arg)?;
                    let n = raw
                        .parse::<u8>()
                        .map_err(|_| format!("invalid threshold: {}", raw))?;
                    out.threshold = Some(n);
                }
                "--checks" => {
                    let list = value(arg)?;
                    out.checks = Some(parse_list::<Check>(&list)?.into_iter().collect());
                }
                "--no-ai" => out.no_ai = true,
                "--placeholder" => out.placeholder = Some(value(arg)?.parse()?),
                "--only" => out.only = Some(parse_list(&value(arg)?)?),
                "--json" => out.json = true,
                "-" => out.positional.push(arg.clone()),
                flag if flag.starts_with("--") => return Err(format!("Unknown option: {}", flag)),
                _ => out.positional.push(arg.clone()),
            }
        }
        Ok(out)
    }

    fn detection(&self, config: &AppConfig) -> DetectionSettings {
        let mut settings = config.detection_settings();
        if let Some(format) = self.format {
            settings.format = format;
        }
        if let Some(mode) = self.mode {
            settings.sensitivity = mode;
        }
        if let Some(content_type) = self.content_type {
            settings.content_type = content_type;
        }
        if let Some(checks) = &self.checks {
            settings.checks = checks.clone();
        }
        if let Some(threshold) = self.threshold {
            settings.set_threshold(threshold);
        }
        settings
    }

    fn redaction(&self, config: &AppConfig) -> RedactionSettings {
        let mut settings = config.redaction_settings();
        if let Some(only) = &self.only {
            settings.rules = RedactionRuleSet::only(only);
        }
        if let Some(placeholder) = self.placeholder {
            settings.placeholder = placeholder;
        }
        if self.no_ai {
            settings.use_ai = false;
        }
        settings
    }

    /// Text from the arguments, or stdin when none is given or `-` is.
    fn input_text(&self) -> io::Result<String> {
        if self.positional.is_empty() || self.positional == ["-"] {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            return Ok(buf);
        }
        Ok(self.positional.join(" "))
    }

    fn input_path(&self) -> Option<PathBuf> {
        match self.positional.as_slice() {
            [path] => Some(PathBuf::from(path)),
            _ => None,
        }
    }
}

fn parse_list<T: std::str::FromStr<Err = String>>(list: &str) -> Result<Vec<T>, String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse)
        .collect()
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn fail(err: &error::ActionError) -> ! {
    eprintln!("{}", render::error_line(err));
    std::process::exit(1);
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let args: Vec<String> = std::env::args().collect();
    let Some(command) = args.get(1) else {
        print_help();
        return Ok(());
    };

    let cli = match CliArgs::parse(&args[2..]) {
        Ok(cli) => cli,
        Err(msg) => {
            eprintln!("{}", msg);
            eprintln!();
            print_help();
            std::process::exit(1);
        }
    };
    let config = AppConfig::load();

    match command.as_str() {
        "classify" => run_classify(&cli, &config).await,
        "redact" => run_redact(&cli, &config).await,
        "extract" => run_extract(&cli, &config).await,
        "redact-file" => run_redact_file(&cli, &config).await,
        "shell" => run_shell(&cli, &config).await,
        "help" | "--help" | "-h" => {
            print_help();
            Ok(())
        }
        _ => {
            eprintln!("Unknown command: {}", command);
            print_help();
            std::process::exit(1);
        }
    }
}

async fn run_classify(cli: &CliArgs, config: &AppConfig) -> Result<()> {
    let settings = cli.detection(config);
    let text = cli.input_text()?;
    let gateway = connect_or_exit(config);

    match pipeline::classify(&gateway, &settings, &text).await {
        Ok(result) if cli.json => print_json(&result),
        Ok(result) => {
            let shown = prompt::truncate_chars(&text, prompt::CLASSIFICATION_CHAR_LIMIT);
            print!("{}", render::verdict_card(&result, shown));
            Ok(())
        }
        Err(e) => fail(&e),
    }
}

async fn run_redact(cli: &CliArgs, config: &AppConfig) -> Result<()> {
    let settings = cli.redaction(config);
    let text = cli.input_text()?;
    let gateway = connect_optional(config, settings.use_ai);
    let gateway = gateway.as_ref().map(|g| g as &dyn ModelGateway);

    match pipeline::redact(gateway, &settings, &text).await {
        Ok(outcome) if cli.json => print_json(&outcome.result),
        Ok(outcome) => {
            print!("{}", render::redaction_report(&outcome));
            Ok(())
        }
        Err(e) => fail(&e),
    }
}

async fn run_extract(cli: &CliArgs, config: &AppConfig) -> Result<()> {
    let Some(path) = cli.input_path() else {
        eprintln!("Usage: textguard extract FILE");
        std::process::exit(1);
    };
    let gateway = connect_optional(config, !cli.no_ai);
    let gateway = gateway.as_ref().map(|g| g as &dyn ModelGateway);

    match pipeline::extract_document(gateway, &BasicExtractor, &path).await {
        Ok(text) => {
            println!("{}", text);
            Ok(())
        }
        Err(e) => fail(&e),
    }
}

async fn run_redact_file(cli: &CliArgs, config: &AppConfig) -> Result<()> {
    let Some(path) = cli.input_path() else {
        eprintln!("Usage: textguard redact-file [--no-ai] [--placeholder tag|block] FILE");
        std::process::exit(1);
    };
    let settings = cli.redaction(config);
    let gateway = connect_optional(config, settings.use_ai);
    let gateway = gateway.as_ref().map(|g| g as &dyn ModelGateway);

    match pipeline::redact_document(gateway, &BasicExtractor, &settings, &path).await {
        Ok(outcome) if cli.json => print_json(&outcome.result),
        Ok(outcome) => {
            print!("{}", render::redaction_report(&outcome));
            Ok(())
        }
        Err(e) => fail(&e),
    }
}

async fn run_shell(cli: &CliArgs, config: &AppConfig) -> Result<()> {
    let settings = cli.detection(config);
    let gateway = connect_or_exit(config);
    let mut session = SessionContext::new();

    println!("textguard shell. Paste a message to classify; :help for commands.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        match line.trim() {
            "" => continue,
            ":quit" | ":q" | ":exit" => break,
            ":history" => print!("{}", render::history_list(&session)),
            ":stats" => println!("{}", render::stats_line(&session)),
            ":clear" => {
                session.clear();
                println!("History cleared.");
            }
            ":help" => print_shell_help(),
            cmd if cmd.starts_with(':') => println!("Unknown command: {} (try :help)", cmd),
            text => {
                match pipeline::classify_in_session(&gateway, &settings, &mut session, text).await {
                    Ok(result) => print!("{}", render::verdict_card(&result, text)),
                    Err(e) => println!("{}", render::error_line(&e)),
                }
            }
        }
    }
    Ok(())
}

fn print_shell_help() {
    println!("  :history   last {} classifications, newest first", session::HISTORY_CAPACITY);
    println!("  :stats     verdict counts");
    println!("  :clear     forget history and counters");
    println!("  :quit      leave the shell");
}

fn print_help() {
    println!("textguard - spam detection and sensitive-data redaction");
    println!();
    println!("USAGE:");
    println!("    textguard classify [OPTIONS] [TEXT | -]    Classify a message");
    println!("    textguard redact [OPTIONS] [TEXT | -]      Redact sensitive data");
    println!("    textguard extract FILE                     Print the text of a document");
    println!("    textguard redact-file [OPTIONS] FILE       Extract and redact a document");
    println!("    textguard shell [OPTIONS]                  Interactive classification session");
    println!("    textguard help                             Show this help message");
    println!();
    println!(
        "CLASSIFY OPTIONS:
    --format detailed|binary
    --mode lenient|balanced|strict
    --type auto|email|sms|social|comment|chat|url
    --threshold N          10-90, SUSPICIOUS at or above N becomes SPAM
    --checks LIST          phishing,urgency,offers,impersonation,sentiment
    --json                 print the result as JSON

REDACT OPTIONS:
    --no-ai                pattern pass only, no model call
    --placeholder tag|block
    --only LIST            ids,phones,banking,passwords,names,dates
    --json

ENVIRONMENT:
    GROQ_API_KEY           API key for Groq (preferred)
    OPENROUTER_API_KEY     API key for OpenRouter
    OPENAI_API_KEY         API key for OpenAI
    TEXTGUARD_PROVIDER     groq|openrouter|openai
    TEXTGUARD_CONFIG       config file (default ~/.textguard/config.toml)
    RUST_LOG               log filter, logs go to stderr

NOTES:
    Keys can also be stored in ~/.textguard/.env"
    );
}

#[cfg(test)]
mod pipeline_tests;
