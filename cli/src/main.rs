use anyhow::Result;
use clap::{Parser, Subcommand};
use holocron_core::campaign::{CampaignConfig, evaluate_campaign};
use holocron_core::database::Database;
use holocron_core::datastore::{extract_reputations, extract_toons};
use holocron_core::file_utils::{find_files_with_extension, read_saved_variables};
use holocron_core::lua;
use holocron_core::models::{QuestDefinition, QuestDependency, ReputationRecord, ToonRecord};
use holocron_core::quest::{QuestId, Resolution, resolve};
use rayon::prelude::*;
use serde_json::json;
use std::collections::HashSet;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(
    name = "holocron",
    version = "0.1.0",
    about = "CLI tool for Holocron WoW character data aggregation",
    long_about = None
)]
struct Cli {
    /// Path to SQLite database file
    #[arg(long, global = true)]
    database: Option<std::path::PathBuf>,

    /// Path to log file
    #[arg(long, global = true, default_value = "/tmp/holocron-tools.log")]
    log_file: std::path::PathBuf,

    /// Verbosity level (repeat for more verbose output)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse SavedVariables files and ingest them into the database
    Ingest {
        /// SavedVariables directory of a WoW account
        #[arg(long)]
        saved_variables: std::path::PathBuf,
        /// Quiet mode (0=show messages/warnings, 1=suppress messages, 2=suppress both)
        #[arg(long, default_value_t = 0)]
        quiet: u8,
    },

    /// Seed the quest graph tables from CSV exports
    LoadQuestGraph {
        /// CSV with quest_id,title columns
        #[arg(long)]
        definitions: std::path::PathBuf,
        /// CSV with quest_id,required_quest_id columns
        #[arg(long)]
        dependencies: std::path::PathBuf,
    },

    /// Find the nearest unmet prerequisite blocking a quest
    Blocker {
        /// Target quest, as a numeric id or a title fragment
        #[arg(long)]
        quest: String,
        /// Comma-separated completed quest ids
        #[arg(long)]
        completed: Option<String>,
        /// Character key whose recorded completions should count
        #[arg(long)]
        guid: Option<String>,
        /// Emit the verdict as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Evaluate campaign progress for a character
    Campaigns {
        /// TOML file defining campaigns
        #[arg(long)]
        config: std::path::PathBuf,
        /// Character key whose recorded completions should count
        #[arg(long)]
        guid: Option<String>,
    },
}

fn setup_logging(
    verbose: u8,
    log_file: &std::path::Path,
) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    let filter_level = match verbose {
        0 => tracing::Level::ERROR,
        1 => tracing::Level::WARN,
        2 => tracing::Level::INFO,
        3 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    let filter = EnvFilter::from_default_env().add_directive(filter_level.into());

    let file_appender = tracing_appender::rolling::never(
        log_file.parent().unwrap_or(std::path::Path::new(".")),
        log_file
            .file_name()
            .unwrap_or(std::ffi::OsStr::new("holocron.log")),
    );
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::Layer::new().with_writer(std::io::stderr).with_ansi(true))
        .with(fmt::Layer::new().with_writer(non_blocking).with_ansi(false));

    tracing::subscriber::set_global_default(subscriber)?;

    Ok(guard)
}

/// Lenient comma-list parsing: junk entries are dropped, not errors.
fn parse_completed_list(raw: Option<&str>) -> HashSet<QuestId> {
    raw.map(|list| {
        list.split(',')
            .filter_map(|part| part.trim().parse().ok())
            .collect()
    })
    .unwrap_or_default()
}

enum Extracted {
    Reputations(Vec<ReputationRecord>),
    Toons(Vec<ToonRecord>),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let _guard = setup_logging(cli.verbose, &cli.log_file)?;

    info!("Starting holocron CLI");

    let db_path = cli
        .database
        .unwrap_or_else(|| std::path::PathBuf::from("./holocron.sqlite"));

    match cli.command {
        Commands::Ingest {
            saved_variables,
            quiet,
        } => {
            let db = Database::new(&db_path)?;

            let lua_files = find_files_with_extension(&saved_variables, "lua")?;
            if quiet == 0 {
                info!(
                    "Found {} .lua files in {:?}",
                    lua_files.len(),
                    saved_variables
                );
            }

            // Parse in parallel; dispatch on file stem the way the addon
            // bridge does (DataStore_Reputations*, SavedInstances).
            let extracted: Vec<Extracted> = lua_files
                .par_iter()
                .filter_map(|path| {
                    let stem = path.file_stem()?.to_str()?;
                    let is_reputations = stem.starts_with("DataStore_Reputations");
                    let is_instances = stem == "SavedInstances";
                    if !is_reputations && !is_instances {
                        return None;
                    }

                    match read_saved_variables(path) {
                        Ok(text) => {
                            let parsed = lua::parse(&text);
                            if is_reputations {
                                Some(Extracted::Reputations(extract_reputations(&parsed)))
                            } else {
                                Some(Extracted::Toons(extract_toons(&parsed)))
                            }
                        }
                        Err(e) => {
                            if quiet < 2 {
                                tracing::warn!("Failed to read {:?}: {}", path, e);
                            }
                            None
                        }
                    }
                })
                .collect();

            let mut reputation_count = 0;
            let mut toon_count = 0;
            for batch in extracted {
                match batch {
                    Extracted::Reputations(records) => {
                        reputation_count += db.ingest_reputations(&records)?;
                    }
                    Extracted::Toons(records) => {
                        toon_count += db.ingest_toons(&records)?;
                    }
                }
            }

            if quiet == 0 {
                info!(
                    "Ingested {} reputation snapshots and {} character summaries into {:?}",
                    reputation_count, toon_count, db_path
                );
            }
        }
        Commands::LoadQuestGraph {
            definitions,
            dependencies,
        } => {
            let db = Database::new(&db_path)?;

            let mut reader = csv::Reader::from_path(&definitions)?;
            let mut defs = Vec::new();
            for result in reader.deserialize() {
                let record: QuestDefinition = result?;
                defs.push(record);
            }
            info!("Parsed {} quest definitions from {:?}", defs.len(), definitions);
            let loaded = db.load_quest_definitions(&defs)?;
            info!("Loaded {} quest definitions", loaded);

            let mut reader = csv::Reader::from_path(&dependencies)?;
            let mut deps = Vec::new();
            for result in reader.deserialize() {
                let record: QuestDependency = result?;
                deps.push(record);
            }
            info!(
                "Parsed {} prerequisite edges from {:?}",
                deps.len(),
                dependencies
            );
            let loaded = db.load_quest_dependencies(&deps)?;
            info!("Loaded {} prerequisite edges", loaded);
        }
        Commands::Blocker {
            quest,
            completed,
            guid,
            json,
        } => {
            let db = Database::new(&db_path)?;

            let mut completed_ids = parse_completed_list(completed.as_deref());
            if let Some(guid) = &guid {
                completed_ids.extend(db.completed_quests_for(guid)?);
            }

            let Some(quest_id) = db.lookup_quest_id(&quest)? else {
                anyhow::bail!("Quest not found: {}", quest);
            };

            let resolution = resolve(&db, quest_id, &completed_ids);
            let (state, blocking, message) = match &resolution {
                Resolution::AlreadyComplete => {
                    ("complete", None, "Quest already completed.".to_string())
                }
                Resolution::Blocked(b) => (
                    "blocked",
                    Some(b.clone()),
                    format!("Missing prerequisite: {} (ID: {})", b.title, b.quest_id),
                ),
                Resolution::NextStep(b) => (
                    "ready",
                    Some(b.clone()),
                    format!("Next step: {} (ID: {})", b.title, b.quest_id),
                ),
                Resolution::Cycle(id) => (
                    "cycle",
                    None,
                    format!("Dependency loop detected at quest {}.", id),
                ),
            };

            if json {
                let verdict = json!({
                    "target_quest_id": quest_id,
                    "blocking_quest_id": blocking.as_ref().map(|b| b.quest_id),
                    "blocking_title": blocking.as_ref().map(|b| b.title.clone()),
                    "state": state,
                    "message": message,
                });
                println!("{}", serde_json::to_string_pretty(&verdict)?);
            } else {
                println!("{}", message);
            }
        }
        Commands::Campaigns { config, guid } => {
            let db = Database::new(&db_path)?;

            let config = CampaignConfig::from_file(&config)?;
            let completed = match &guid {
                Some(guid) => db.completed_quests_for(guid)?,
                None => HashSet::new(),
            };

            for campaign in &config.campaigns {
                let status = evaluate_campaign(campaign, &db, &completed);
                println!(
                    "[{}] {}: {}",
                    status.step_label(),
                    status.name,
                    status.status_text
                );
            }
        }
    }

    info!("Holocron CLI finished");
    Ok(())
}
