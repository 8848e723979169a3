mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use compilerace_common::config::Config;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "compilerace")]
#[command(about = "CompileRace - timed Java coding races judged by a remote Judge0 service", long_about = None)]
struct Cli {
    /// Judge0 base URL (overrides COMPILERACE_JUDGE0_URL)
    #[arg(long, global = true)]
    judge0_url: Option<String>,

    /// Store file for best times and cached settings (overrides COMPILERACE_STORE)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Alternate question bank (overrides COMPILERACE_QUESTIONS)
    #[arg(long, global = true)]
    questions: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true, default_value = "false")]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the question bank
    Questions,

    /// Show a question's objective, sample and starter code
    Show {
        /// Question index (clamped into range)
        #[arg(short, long)]
        question: Option<String>,
    },

    /// Start an interactive race on a source file
    Race {
        /// Question index (clamped into range)
        #[arg(short, long)]
        question: Option<String>,

        /// Source file to edit; created with the starter code if missing
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Judge a finished source file in one shot
    Submit {
        /// Question index (clamped into range)
        #[arg(short, long)]
        question: Option<String>,

        /// Source file to judge
        #[arg(short, long)]
        file: PathBuf,

        /// Print the race summary as JSON
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// Show recorded best times
    Best {
        /// Only this question
        #[arg(short, long)]
        question: Option<String>,
    },

    /// Resolve the Java language id used for submissions
    Language {
        /// Drop the cached id and ask the service again
        #[arg(long, default_value = "false")]
        refresh: bool,
    },

    /// Show or set the accent colour (#rrggbb)
    Accent {
        colour: Option<String>,
    },
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_line_number(true)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // A missing .env is fine
    dotenvy::dotenv().ok();
    init_tracing(cli.log_json);

    let mut config = Config::from_env();
    if let Some(url) = cli.judge0_url {
        config.judge0_url = url.trim_end_matches('/').to_string();
    }
    if let Some(store) = cli.store {
        config.store_path = store;
    }
    if let Some(questions) = cli.questions {
        config.questions_path = Some(questions);
    }

    let app = commands::App::load(config)?;

    match cli.command {
        Commands::Questions => {
            commands::list_questions(&app);
        }
        Commands::Show { question } => {
            commands::show_question(&app, question.as_deref());
        }
        Commands::Race { question, file } => {
            commands::race(&app, question.as_deref(), &file).await?;
        }
        Commands::Submit { question, file, json } => {
            commands::submit(&app, question.as_deref(), &file, json).await?;
        }
        Commands::Best { question } => {
            commands::show_best(&app, question.as_deref());
        }
        Commands::Language { refresh } => {
            commands::language(&app, refresh).await?;
        }
        Commands::Accent { colour } => {
            commands::accent(&app, colour.as_deref())?;
        }
    }

    Ok(())
}
