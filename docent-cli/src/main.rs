use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use docent_core::{Answer, ChatManager, Config, Provenance, RagError};
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG: &str = "config.yaml";

#[derive(Parser)]
#[command(name = "docent")]
#[command(about = "Ask questions about a PDF or text document", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file; defaults apply when omitted and config.yaml is absent
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Show current configuration")]
    Show,

    #[command(about = "Model management commands")]
    Model {
        #[command(subcommand)]
        command: ModelCommands,
    },

    #[command(about = "Load a document and answer one question about it")]
    Ask {
        file: PathBuf,
        question: String,
        #[arg(short = 'k', long, help = "Number of fragments to retrieve")]
        top_k: Option<usize>,
    },

    #[command(about = "Load a document and summarize it")]
    Summarize { file: PathBuf },

    #[command(about = "Summarize a piece of text in a few sentences")]
    SummarizeText { text: String },

    #[command(about = "Interactive session (type :help for commands)")]
    Chat {
        #[arg(short, long, help = "Document to load before the session starts")]
        file: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum ModelCommands {
    #[command(about = "Show current models")]
    Show,

    #[command(about = "Set the generation model")]
    Set {
        #[arg(help = "Model name (e.g., 'llama3.2:3b' or 'mistral:7b')")]
        model: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("docent_core=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run(Cli::parse()).await {
        print_error(&err);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Show => show_config(&config),
        Commands::Model { command } => match command {
            ModelCommands::Show => show_model(&config),
            ModelCommands::Set { model } => {
                set_model(cli.config.as_deref().unwrap_or(Path::new(DEFAULT_CONFIG)), &model)
            }
        },
        Commands::Ask { file, question, top_k } => {
            let k = top_k.unwrap_or(config.rag.top_k);
            let manager = ChatManager::new(config)?;
            load(&manager, &file).await?;
            let answer = manager.answer_with_k(&question, k).await?;
            print_answer(&answer);
            Ok(())
        }
        Commands::Summarize { file } => {
            let manager = ChatManager::new(config)?;
            load(&manager, &file).await?;
            println!("{}", manager.summarize_whole().await?);
            Ok(())
        }
        Commands::SummarizeText { text } => {
            let manager = ChatManager::new(config)?;
            println!("{}", manager.summarize_text(&text).await?);
            Ok(())
        }
        Commands::Chat { file } => {
            let manager = ChatManager::new(config)?;
            if let Some(file) = file {
                load(&manager, &file).await?;
            }
            repl(&manager).await
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Config::load_or_default()
            .with_context(|| format!("Failed to load config from {}", DEFAULT_CONFIG)),
    }
}

fn show_config(config: &Config) -> Result<()> {
    println!("{}", "Current Configuration:".bold().green());
    println!();
    println!("{}", "LLM:".bold());
    println!("  Model:           {}", config.llm.model.cyan());
    println!("  Embedding Model: {}", config.llm.embedding_model.cyan());
    println!("  Base URL:        {}", config.llm.base_url);
    println!("  Temperature:     {}", config.llm.temperature);
    println!("  Timeout:         {}s", config.llm.request_timeout_secs);
    println!();
    println!("{}", "RAG:".bold());
    println!("  Chunk Size:      {}", config.rag.chunk_size);
    println!("  Chunk Overlap:   {}", config.rag.chunk_overlap);
    println!("  Top K:           {}", config.rag.top_k);
    println!("  Summary:         {:?}", config.rag.summary.strategy);
    println!();
    println!("{}", "Memory:".bold());
    println!("  Window:          {} turns", config.memory.window_turns);
    println!("  Turn Limit:      {} chars", config.memory.turn_char_limit);

    Ok(())
}

fn show_model(config: &Config) -> Result<()> {
    println!("{}: {}", "Generation model".bold(), config.llm.model.cyan());
    println!("{}: {}", "Embedding model".bold(), config.llm.embedding_model.cyan());
    Ok(())
}

fn set_model(config_path: &Path, model: &str) -> Result<()> {
    let mut config: serde_yaml::Value = if config_path.exists() {
        let content = std::fs::read_to_string(config_path).context("Failed to read config file")?;
        serde_yaml::from_str(&content).context("Failed to parse config")?
    } else {
        serde_yaml::to_value(Config::default()).context("Failed to serialize default config")?
    };

    let llm = config
        .as_mapping_mut()
        .context("Config file is not a mapping")?
        .entry(serde_yaml::Value::String("llm".to_string()))
        .or_insert_with(|| serde_yaml::Value::Mapping(Default::default()));
    if let Some(llm_map) = llm.as_mapping_mut() {
        llm_map.insert(
            serde_yaml::Value::String("model".to_string()),
            serde_yaml::Value::String(model.to_string()),
        );
    }

    let updated_content = serde_yaml::to_string(&config).context("Failed to serialize config")?;
    std::fs::write(config_path, updated_content).context("Failed to write config file")?;

    println!("{} Model updated to: {}", "✓".green().bold(), model.cyan());
    Ok(())
}

async fn load(manager: &ChatManager, file: &Path) -> Result<()> {
    println!("{} Loading {}...", "→".blue(), file.display());
    let report = manager
        .ingest_file(file)
        .await
        .with_context(|| format!("Failed to load {}", file.display()))?;

    println!(
        "{} Indexed {} chunks ({} dimensions)",
        "✓".green().bold(),
        report.chunks,
        report.dimension
    );
    if let Some(provenance) = manager.current_provenance().await {
        print_provenance(&provenance);
    }
    println!();
    Ok(())
}

fn print_answer(answer: &Answer) {
    println!("{}", answer.text);
    println!();
    println!(
        "{}",
        format!("Based on {} fragment(s)", answer.fragments_used).dimmed()
    );
    if let Some(provenance) = &answer.provenance {
        print_provenance(provenance);
    }
}

fn print_provenance(provenance: &Provenance) {
    let pages = provenance
        .pages
        .map(|p| format!(", {} pages", p))
        .unwrap_or_default();
    println!(
        "{}",
        format!(
            "Source: {} ({}{}, {} characters, loaded {})",
            provenance.source,
            provenance.kind,
            pages,
            provenance.characters,
            provenance.ingested_at.format("%Y-%m-%d %H:%M:%S UTC")
        )
        .dimmed()
    );
}

fn print_help() {
    println!("{}", "Commands:".bold());
    println!("  :load PATH      load a PDF or text file");
    println!("  :ask QUESTION   answer from the loaded document");
    println!("  :summary        summarize the loaded document");
    println!("  :info           show the loaded document");
    println!("  :history        show the conversation so far");
    println!("  :clear          forget the conversation");
    println!("  :quit           leave");
    println!("Anything else is sent as a chat message.");
}

/// Prints an error chain, plus a hint when it came from the library.
fn print_error(err: &anyhow::Error) {
    eprintln!("{} {:#}", "Error:".red().bold(), err);
    if let Some(rag) = err.downcast_ref::<RagError>() {
        eprintln!("{} {}", "Hint:".yellow().bold(), rag.hint());
    }
}

fn report(err: &RagError) {
    eprintln!("{} {}", "Error:".red().bold(), err);
    eprintln!("{} {}", "Hint:".yellow().bold(), err.hint());
}

async fn repl(manager: &ChatManager) -> Result<()> {
    print_help();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("{} ", ">".cyan().bold());
        std::io::stdout().flush().context("Failed to flush stdout")?;

        let Some(line) = lines.next_line().await.context("Failed to read input")? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let (command, argument) = match line.split_once(char::is_whitespace) {
            Some((command, rest)) => (command, rest.trim()),
            None => (line, ""),
        };

        match command {
            ":quit" | ":exit" => break,
            ":help" => print_help(),
            ":load" if !argument.is_empty() => {
                if let Err(err) = load(manager, Path::new(argument)).await {
                    print_error(&err);
                }
            }
            ":ask" if !argument.is_empty() => match manager.answer(argument).await {
                Ok(answer) => print_answer(&answer),
                Err(err) => report(&err),
            },
            ":summary" => match manager.summarize_whole().await {
                Ok(summary) => println!("{}", summary),
                Err(err) => report(&err),
            },
            ":info" => match manager.current_provenance().await {
                Some(provenance) => print_provenance(&provenance),
                None => match manager.chunk_count().await {
                    0 => println!("{}", "No document loaded.".yellow()),
                    chunks => println!("Loaded text in {} chunks.", chunks),
                },
            },
            ":history" => {
                let turns = manager.read_memory().await;
                if turns.is_empty() {
                    println!("{}", "No conversation yet.".yellow());
                }
                for turn in turns {
                    println!("{} {}", "you:".bold(), turn.input);
                    println!("{} {}", "docent:".bold().cyan(), turn.output);
                }
            }
            ":clear" => {
                manager.clear_memory();
                println!("{} Conversation cleared", "✓".green().bold());
            }
            _ if command.starts_with(':') => {
                println!("{}", "Unknown command or missing argument. Type :help.".yellow())
            }
            _ => match manager.chat(line).await {
                Ok(reply) => println!("{}", reply),
                Err(err) => report(&err),
            },
        }
        println!();
    }

    Ok(())
}
