//! ndtutor CLI
//!
//! Terminal front-end for the natural-deduction tutor:
//! - Browsing exercises (sorted by likes, grouped by difficulty, favorites)
//! - Proving an exercise interactively against the tutor backend
//! - Exporting the last finished proof as Typst source

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use ndtutor_client::{ApiClient, ClientConfig};
use ndtutor_core::catalog::{self, ListMode};
use ndtutor_core::{export_typst, CreateExerciseRequest, ExerciseId, Feedback, Formula, Statement};
use ndtutor_storage::{LocalStore, StoreConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod render;
mod repl;
mod session;

use session::Session;

#[derive(Parser)]
#[command(name = "ndtutor")]
#[command(author, version, about = "Natural-deduction proof tutor")]
struct Cli {
    /// Backend base URL (overrides NDTUTOR_API_URL).
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Directory for local progress (overrides NDTUTOR_HOME).
    #[arg(long, global = true)]
    store_dir: Option<PathBuf>,

    /// Log more (repeat for debug output).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List exercises.
    Exercises {
        /// all, likes, difficulty, favorites or incomplete.
        #[arg(long, default_value = "all")]
        mode: ListMode,
        /// Print the raw exercise list as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show one exercise.
    Show { id: ExerciseId },

    /// Toggle an exercise as favorite.
    Favorite { id: ExerciseId },

    /// Parse a formula with the backend and print it.
    Parse { formula: String },

    /// Ask whether a statement is still provable.
    Check(StatementArgs),

    /// Ask the backend for next-step hints.
    Hint(StatementArgs),

    /// Submit a new exercise.
    Create(StatementArgs),

    /// List the derivation rules offered by the backend.
    Rules,

    /// Rate an exercise.
    Feedback {
        id: ExerciseId,
        #[arg(long, conflicts_with = "dislike", required_unless_present = "dislike")]
        like: bool,
        #[arg(long)]
        dislike: bool,
        /// Perceived difficulty from 1 to 10.
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..=10))]
        difficulty: Option<u32>,
    },

    /// Export the last finished proof as Typst source.
    Export {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the welcome text (until collapsed).
    Welcome {
        #[arg(long, conflicts_with = "expand")]
        collapse: bool,
        #[arg(long)]
        expand: bool,
    },

    /// Prove an exercise interactively.
    Session { id: ExerciseId },
}

#[derive(Args)]
struct StatementArgs {
    /// Goal formula.
    goal: String,
    /// Hypothesis formula (repeatable).
    #[arg(long = "hyp")]
    hypotheses: Vec<String>,
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        _ => EnvFilter::new("debug"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let store = Arc::new(open_store(cli.store_dir.clone())?);

    // Local-only commands never touch the backend.
    match cli.command {
        Commands::Export { output } => return cmd_export(&store, output),
        Commands::Welcome { collapse, expand } => return cmd_welcome(&store, collapse, expand),
        Commands::Favorite { id } => return cmd_favorite(&store, id),
        _ => {}
    }

    let client = Arc::new(open_client(cli.api_url.as_deref())?);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| anyhow!("failed to initialize tokio runtime: {e}"))?;

    match cli.command {
        Commands::Session { id } => {
            let session = runtime.block_on(start_session(id, client, store))?;
            repl::run(repl::ReplState::new(session, runtime))
        }
        command => runtime.block_on(run_online(command, &client, &store)),
    }
}

fn open_store(dir: Option<PathBuf>) -> Result<LocalStore> {
    let config = match dir {
        Some(dir) => StoreConfig::new(dir),
        None => StoreConfig::from_env()?,
    };
    LocalStore::open(config).context("failed to open local store")
}

fn open_client(api_url: Option<&str>) -> Result<ApiClient> {
    let mut config = ClientConfig::from_env()?;
    if let Some(url) = api_url {
        config = config.with_base_url(url)?;
    }
    tracing::debug!(base_url = %config.base_url, "using backend");
    Ok(ApiClient::new(config)?)
}

async fn start_session(id: ExerciseId, client: Arc<ApiClient>, store: Arc<LocalStore>) -> Result<Session> {
    let statement = client
        .exercise(id)
        .await
        .with_context(|| format!("failed to load exercise {id}"))?;
    let rules = client.rules().await.context("failed to load rules")?;
    println!("{} {statement}", "exercise:".cyan().bold());
    Ok(Session::new(id, statement, rules, client, store))
}

async fn run_online(command: Commands, client: &ApiClient, store: &LocalStore) -> Result<()> {
    match command {
        Commands::Exercises { mode, json } => cmd_exercises(client, store, mode, json).await,
        Commands::Show { id } => {
            let statement = client.exercise(id).await?;
            let favorite = if store.is_favorite(id)? { " *" } else { "" };
            let done = if store.is_completed(id)? { " (done)" } else { "" };
            println!("{id}{favorite}{done}");
            println!("  {statement}");
            Ok(())
        }
        Commands::Parse { formula } => {
            let parsed = client.parse(&formula).await?;
            println!("{parsed}");
            Ok(())
        }
        Commands::Check(args) => {
            let statement = parse_statement(client, &args).await?;
            if client.check(&statement).await? {
                println!("{} {statement}", "provable:".green().bold());
            } else {
                println!("{} {statement}", "not provable:".yellow().bold());
            }
            Ok(())
        }
        Commands::Hint(args) => {
            let statement = parse_statement(client, &args).await?;
            let tipps = client.hint(&statement).await?;
            if tipps.is_empty() {
                println!("no hint available");
            }
            for tipp in &tipps {
                println!("{}", render::render_tipp(tipp));
            }
            Ok(())
        }
        Commands::Create(args) => {
            let statement = parse_statement(client, &args).await?;
            let request = CreateExerciseRequest {
                lhs: statement.lhs,
                rhs: statement.formula,
            };
            if client.create_exercise(&request).await? {
                println!("{}", "exercise created".green().bold());
                Ok(())
            } else {
                bail!("the backend did not accept the exercise")
            }
        }
        Commands::Rules => {
            for rule in client.rules().await? {
                println!("{}", render::render_rule(&rule));
            }
            Ok(())
        }
        Commands::Feedback {
            id,
            like,
            dislike: _,
            difficulty,
        } => {
            if store.has_feedback(id)? {
                bail!("feedback for {id} was already given");
            }
            client.feedback(id, &Feedback { like, difficulty }).await?;
            store.add_feedback(id)?;
            println!("{}", "thanks for the feedback".green());
            Ok(())
        }
        Commands::Export { .. }
        | Commands::Welcome { .. }
        | Commands::Favorite { .. }
        | Commands::Session { .. } => unreachable!("handled before connecting"),
    }
}

async fn parse_statement(client: &ApiClient, args: &StatementArgs) -> Result<Statement> {
    let mut lhs: Vec<Formula> = Vec::with_capacity(args.hypotheses.len());
    for hyp in &args.hypotheses {
        lhs.push(client.parse(hyp).await.with_context(|| format!("in hypothesis `{hyp}`"))?);
    }
    let goal = client
        .parse(&args.goal)
        .await
        .with_context(|| format!("in goal `{}`", args.goal))?;
    Ok(Statement::new(lhs, goal))
}

async fn cmd_exercises(client: &ApiClient, store: &LocalStore, mode: ListMode, json: bool) -> Result<()> {
    let exercises = client.exercises().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&exercises)?);
        return Ok(());
    }

    let progress = store.progress()?;
    let line = |e: &ndtutor_core::Exercise| {
        render::render_exercise(
            e,
            progress.favorite_items.contains(&e.id),
            progress.completed.contains(&e.id),
        )
    };

    match mode {
        ListMode::All => exercises.iter().for_each(|e| println!("{}", line(e))),
        ListMode::Likes => catalog::sorted_by_likes(&exercises)
            .into_iter()
            .for_each(|e| println!("{}", line(e))),
        ListMode::Difficulty => {
            for (bucket, group) in catalog::by_difficulty(&exercises) {
                println!("{}", bucket.to_string().bold());
                if group.is_empty() {
                    println!("  (none)");
                }
                group.into_iter().for_each(|e| println!("{}", line(e)));
            }
        }
        ListMode::Favorites => catalog::favorites(&exercises, &progress.favorite_items)
            .into_iter()
            .for_each(|e| println!("{}", line(e))),
        ListMode::Incomplete => catalog::incomplete(&exercises, &progress.completed)
            .into_iter()
            .for_each(|e| println!("{}", line(e))),
    }
    Ok(())
}

fn cmd_favorite(store: &LocalStore, id: ExerciseId) -> Result<()> {
    if store.toggle_favorite(id)? {
        println!("{} {id}", "favorite:".yellow().bold());
    } else {
        println!("removed {id} from favorites");
    }
    Ok(())
}

fn cmd_export(store: &LocalStore, output: Option<PathBuf>) -> Result<()> {
    let tree = store
        .load_tree()?
        .ok_or_else(|| anyhow!("no finished proof has been saved yet"))?;
    let typst = export_typst(&tree, tree.root_id())?;
    match output {
        Some(path) => {
            std::fs::write(&path, typst).with_context(|| format!("failed to write {}", path.display()))?;
            println!("wrote {}", path.display());
        }
        None => println!("{typst}"),
    }
    Ok(())
}

const WELCOME: &str = "\
Welcome to the natural-deduction tutor.

Pick an exercise with `ndtutor exercises`, then start proving it with
`ndtutor session <id>`. Inside a session, apply rules to open goals until
every branch is closed; `hint` suggests a next step and `delete` undoes one.
Finished proofs can be exported as Typst source with `export`.";

fn cmd_welcome(store: &LocalStore, collapse: bool, expand: bool) -> Result<()> {
    if collapse || expand {
        store.set_welcome_collapsed(collapse)?;
    }
    if !store.welcome_collapsed()? {
        println!("{WELCOME}");
    }
    Ok(())
}
