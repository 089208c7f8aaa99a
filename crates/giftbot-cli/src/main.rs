use std::fs;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use giftbot_contracts::catalog::Catalog;
use giftbot_contracts::chat::{
    parse_command, trim_history, ChatTurn, ImageSize, Language, Role, CHAT_HELP_COMMANDS,
};
use giftbot_contracts::error::BrokerError;
use giftbot_engine::catalog_source::load_catalog;
use giftbot_engine::{
    BackendMode, BrokerConfig, CredentialState, ImageOrigin, ImageRef, RenderedImage,
    ResponseBroker,
};
use reqwest::blocking::Client as HttpClient;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "giftbot", version, about = "GiftBot toy-shop shopping assistant")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct GlobalArgs {
    /// JSON catalog file; overrides the backend.
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,
    /// Catalog backend: mock or networked.
    #[arg(long, global = true)]
    backend: Option<String>,
    #[arg(long, global = true)]
    api_url: Option<String>,
    /// Append the request audit trail to this JSONL file.
    #[arg(long, global = true)]
    events: Option<PathBuf>,
    #[arg(long, global = true)]
    text_model: Option<String>,
    /// Ignore any configured API key and answer locally.
    #[arg(long, global = true)]
    offline: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Interactive chat with slash commands.
    Chat(ChatArgs),
    Ask(MessageArgs),
    Voice(MessageArgs),
    Recommend(MessageArgs),
    Generate(GenerateArgs),
    Edit(EditArgs),
    Catalog(CatalogArgs),
}

#[derive(Debug, Parser)]
struct ChatArgs {
    #[arg(long, default_value = "en")]
    lang: String,
    /// Directory for images produced during the session.
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,
}

#[derive(Debug, Parser)]
struct MessageArgs {
    message: String,
    #[arg(long, default_value = "en")]
    lang: String,
}

#[derive(Debug, Parser)]
struct GenerateArgs {
    prompt: String,
    #[arg(long)]
    size: Option<String>,
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Debug, Parser)]
struct EditArgs {
    #[arg(long)]
    image: PathBuf,
    instruction: String,
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Debug, Parser)]
struct CatalogArgs {
    /// Print the products as JSON instead of context lines.
    #[arg(long)]
    json: bool,
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("giftbot error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    init_tracing();
    let cli = Cli::parse();
    let config = build_config(&cli.global)?;
    let catalog = load_catalog(&config)?;

    if let Command::Catalog(args) = &cli.command {
        print_catalog(&catalog, args.json)?;
        return Ok(0);
    }

    let broker = ResponseBroker::from_config(&config, catalog)?;
    match cli.command {
        Command::Chat(args) => {
            run_chat(&broker, args)?;
            Ok(0)
        }
        Command::Ask(args) => {
            let reply = broker.chat(&args.message, Vec::new(), parse_language(&args.lang)?);
            finish(reply.map(|text| println!("{text}")))
        }
        Command::Voice(args) => {
            let reply = broker.voice(&args.message, Vec::new(), parse_language(&args.lang)?);
            finish(reply.map(|text| println!("{text}")))
        }
        Command::Recommend(args) => {
            let categories = broker.search_recommend(&args.message, parse_language(&args.lang)?);
            finish(categories.map(|categories| {
                for category in categories {
                    println!("{category}");
                }
            }))
        }
        Command::Generate(args) => {
            match broker.generate_image(&args.prompt, args.size.as_deref()) {
                Ok(rendered) => {
                    let path = args.out.unwrap_or_else(|| default_image_path(Path::new(".")));
                    deliver_image(&rendered, &path)?;
                    Ok(0)
                }
                Err(err) => finish(Err(err)),
            }
        }
        Command::Edit(args) => {
            let (bytes, mime_type) = read_source_image(&args.image)?;
            match broker.edit_image(bytes, &mime_type, &args.instruction) {
                Ok(rendered) => {
                    let path = args.out.unwrap_or_else(|| default_image_path(Path::new(".")));
                    deliver_image(&rendered, &path)?;
                    Ok(0)
                }
                Err(err) => finish(Err(err)),
            }
        }
        Command::Catalog(_) => Ok(0),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("GIFTBOT_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn build_config(global: &GlobalArgs) -> Result<BrokerConfig> {
    let mut config = BrokerConfig::from_env()?;
    if let Some(path) = global.catalog.as_ref() {
        config.catalog_path = Some(path.clone());
    }
    if let Some(raw) = global.backend.as_deref() {
        config.backend = BackendMode::parse(raw)
            .with_context(|| format!("--backend must be 'mock' or 'networked', got '{raw}'"))?;
    }
    if let Some(url) = global.api_url.as_deref() {
        config.shop_api_url = url.trim_end_matches('/').to_string();
    }
    if let Some(path) = global.events.as_ref() {
        config.events_path = Some(path.clone());
    }
    if let Some(model) = global.text_model.as_deref() {
        config.text_model = Some(model.to_string());
    }
    if global.offline {
        config.api_key = None;
    }
    Ok(config)
}

fn parse_language(raw: &str) -> Result<Language> {
    Language::parse(raw).with_context(|| format!("unsupported language '{raw}' (use en or bn)"))
}

/// Terminal broker failures are reported with every strategy's reason and
/// exit 1; validation errors propagate as ordinary errors.
fn finish(result: Result<(), BrokerError>) -> Result<i32> {
    match result {
        Ok(()) => Ok(0),
        Err(BrokerError::Terminal(err)) => {
            report_terminal(&err);
            Ok(1)
        }
        Err(err) => Err(err.into()),
    }
}

fn report_terminal(err: &giftbot_contracts::error::TerminalError) {
    eprintln!("giftbot: {err}");
    for failure in &err.failures {
        eprintln!("  - {failure}");
    }
}

fn run_chat(broker: &ResponseBroker, args: ChatArgs) -> Result<()> {
    let mut language = parse_language(&args.lang)?;
    let mut size: Option<String> = None;
    let mut history: Vec<ChatTurn> = Vec::new();

    let stdin = io::stdin();
    let mut line = String::new();

    match broker.credential_state() {
        CredentialState::CredentialPresent => {
            println!("GiftBot chat started. Type /help for commands.")
        }
        CredentialState::NoCredential => println!(
            "GiftBot chat started in offline mode (local answers only). Type /help for commands."
        ),
    }

    loop {
        print!("> ");
        io::stdout().flush()?;

        line.clear();
        let read = match stdin.read_line(&mut line) {
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        if read == 0 {
            break;
        }

        let command = parse_command(line.trim_end_matches(['\n', '\r']));
        match command.action.as_str() {
            "noop" => {}
            "help" => println!("Commands: {}", CHAT_HELP_COMMANDS.join(" ")),
            "quit" => break,
            "chat" | "voice" => {
                let Some(text) = command.text else {
                    println!("/voice requires a transcript");
                    continue;
                };
                let reply = if command.action == "voice" {
                    broker.voice(&text, history.clone(), language)
                } else {
                    broker.chat(&text, history.clone(), language)
                };
                match reply {
                    Ok(reply) => {
                        println!("{reply}");
                        history.push(ChatTurn::user(text));
                        history.push(ChatTurn::assistant(reply));
                        history = trim_history(history);
                    }
                    Err(err) => report_repl_error(&err),
                }
            }
            "search" => {
                let Some(query) = command.text else {
                    println!("/search requires a query");
                    continue;
                };
                match broker.search_recommend(&query, language) {
                    Ok(categories) => {
                        let names: Vec<&str> = categories.iter().map(|c| c.as_str()).collect();
                        println!("Recommended categories: {}", names.join(", "));
                    }
                    Err(err) => report_repl_error(&err),
                }
            }
            "generate_image" => {
                let Some(prompt) = command.text else {
                    println!("/image requires a prompt");
                    continue;
                };
                match broker.generate_image(&prompt, size.as_deref()) {
                    Ok(rendered) => {
                        let path = default_image_path(&args.out_dir);
                        if let Err(err) = deliver_image(&rendered, &path) {
                            println!("Could not save image: {err:#}");
                        }
                    }
                    Err(err) => report_repl_error(&err),
                }
            }
            "edit_image" => {
                let (Some(path), Some(instruction)) = (command.path, command.text) else {
                    println!("/edit requires a path and an instruction");
                    continue;
                };
                let (bytes, mime_type) = match read_source_image(Path::new(&path)) {
                    Ok(source) => source,
                    Err(err) => {
                        println!("Could not read {path}: {err:#}");
                        continue;
                    }
                };
                match broker.edit_image(bytes, &mime_type, &instruction) {
                    Ok(rendered) => {
                        let out = default_image_path(&args.out_dir);
                        if let Err(err) = deliver_image(&rendered, &out) {
                            println!("Could not save image: {err:#}");
                        }
                    }
                    Err(err) => report_repl_error(&err),
                }
            }
            "set_language" => match command.text.as_deref().and_then(Language::parse) {
                Some(next) => {
                    language = next;
                    println!("Language set to {}", language.as_str());
                }
                None => println!("/lang expects en or bn"),
            },
            "set_size" => match command.text.as_deref() {
                Some(raw) if ImageSize::parse(raw).is_some() => {
                    size = Some(raw.to_string());
                    println!("Image size set to {raw}");
                }
                _ => println!("/size expects WxH (256-2048), square, portrait or landscape"),
            },
            "show_history" => {
                if history.is_empty() {
                    println!("(no history)");
                }
                for turn in &history {
                    let speaker = match turn.role {
                        Role::User => "you",
                        Role::Assistant => "giftbot",
                    };
                    println!("{speaker}: {}", turn.text);
                }
            }
            "clear_history" => {
                history.clear();
                println!("History cleared.");
            }
            "show_catalog" => print_catalog(broker.catalog(), false)?,
            "unknown" => println!(
                "Unknown command: /{}. Type /help for commands.",
                command.text.unwrap_or_default()
            ),
            other => println!("Unhandled command: {other}"),
        }
    }
    Ok(())
}

fn report_repl_error(err: &BrokerError) {
    match err {
        BrokerError::Terminal(err) => report_terminal(err),
        BrokerError::Validation(err) => println!("{err}"),
    }
}

fn print_catalog(catalog: &Catalog, as_json: bool) -> Result<()> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(catalog.products())?);
        return Ok(());
    }
    println!(
        "{} products (fingerprint {})",
        catalog.len(),
        catalog.fingerprint()
    );
    if !catalog.is_empty() {
        println!("{}", catalog.context());
    }
    Ok(())
}

fn read_source_image(path: &Path) -> Result<(Vec<u8>, String)> {
    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let mime_type = image::guess_format(&bytes)
        .map(|format| format.to_mime_type().to_string())
        .or_else(|_| mime_for_extension(path).context("unrecognized image format"))?;
    Ok((bytes, mime_type))
}

fn mime_for_extension(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let mime = match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        _ => return None,
    };
    Some(mime.to_string())
}

fn extension_for_mime(mime_type: &str) -> &'static str {
    match mime_type {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => "png",
    }
}

fn default_image_path(dir: &Path) -> PathBuf {
    dir.join(format!("giftbot-{}", Utc::now().format("%Y%m%d-%H%M%S%3f")))
}

/// Save or print a rendered image. URLs are always printed; inline images are
/// written next to `path` with an extension matching their mime type.
fn deliver_image(rendered: &RenderedImage, path: &Path) -> Result<()> {
    if rendered.origin == ImageOrigin::GeneratedFromInstruction {
        println!("Note: the edit could not be applied; this is a new image generated from your instruction.");
    }
    match &rendered.image {
        ImageRef::Url(url) => {
            println!("Image URL ({}): {url}", rendered.strategy);
            if path.extension().is_some() {
                let bytes = download_image(url)?;
                write_image(path, &bytes)?;
                println!("Saved image to {}", path.display());
            }
        }
        ImageRef::DataUri(_) => {
            let (mime_type, bytes) = rendered
                .image
                .decode_data_uri()
                .context("image payload is not a valid data URI")?;
            let target = if path.extension().is_some() {
                path.to_path_buf()
            } else {
                path.with_extension(extension_for_mime(&mime_type))
            };
            write_image(&target, &bytes)?;
            println!("Saved image ({}) to {}", rendered.strategy, target.display());
        }
    }
    Ok(())
}

fn download_image(url: &str) -> Result<Vec<u8>> {
    let response = HttpClient::new()
        .get(url)
        .timeout(Duration::from_secs(60))
        .send()
        .with_context(|| format!("image download failed ({url})"))?;
    if !response.status().is_success() {
        bail!("image download failed ({url}): {}", response.status());
    }
    Ok(response.bytes()?.to_vec())
}

fn write_image(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, bytes).with_context(|| format!("failed to write {}", path.display()))
}
