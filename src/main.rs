use clap::{Parser, Subcommand};
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use localesync::catalog::{flatten, merge_documents, unflatten};
use anyhow::Result;
use localesync::{
    AssetWatcher, ChainRegistry, CodeScanner, FileCategory, HttpBackend, LockTable, NullBackend,
    ProcessingContext, Settings, SyncError, SyncResult, TranslationBackend, logging,
};

#[derive(Parser)]
#[command(name = "localesync")]
#[command(version)]
#[command(about = "Keeps JSON locale catalogs, PO exports, and code usages in sync")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize configuration file
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Show current configuration
    Config,

    /// Scan code and report missing and unused keys
    Scan,

    /// Reconcile catalogs, exports, and code usages once
    Sync,

    /// Watch the project and synchronize continuously
    Watch,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Commands::Init { force } = cli.command {
        return match Settings::init_config_file(force) {
            Ok(path) => {
                println!("Created configuration file at: {}", path.display());
                println!("Edit this file to customize your settings.");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Error: {e}");
                ExitCode::FAILURE
            }
        };
    }

    let settings = Arc::new(Settings::load().unwrap_or_else(|e| {
        eprintln!("Configuration error: {e}");
        eprintln!("Using default configuration.");
        Settings::default()
    }));

    logging::init_with_config(&settings.logging);

    let result = match cli.command {
        Commands::Init { .. } => unreachable!("handled above"),
        Commands::Config => {
            match toml::to_string_pretty(settings.as_ref()) {
                Ok(text) => print!("{text}"),
                Err(e) => {
                    eprintln!("Error displaying config: {e}");
                    return ExitCode::FAILURE;
                }
            }
            Ok(())
        }
        Commands::Scan => run_scan(settings).await,
        Commands::Sync => run_sync(settings).await,
        Commands::Watch => run_watch(settings).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Full code scan plus a report of keys used in code but absent from
/// the source catalog, and catalog keys no code references.
async fn run_scan(settings: Arc<Settings>) -> Result<()> {
    let scanner = CodeScanner::new(settings.clone());
    let stats = scanner.full_scan().await?;
    println!(
        "Scanned {} files, {} key usages",
        stats.files_scanned, stats.keys_found
    );

    let catalog_keys = source_catalog_keys(&settings).await?;

    let missing = scanner.missing_keys(&catalog_keys);
    if missing.is_empty() {
        println!("No missing keys");
    } else {
        println!("Missing from {}.json:", settings.source_locale);
        for key in &missing {
            println!("  + {key}");
        }
    }

    let unused = scanner.unused_keys(&catalog_keys);
    if !unused.is_empty() {
        println!("Never referenced from code:");
        for key in &unused {
            println!("  - {key}");
        }
    }

    Ok(())
}

/// One-shot reconciliation, in dependency order: edited PO files flow
/// back into catalogs, code usages flow into the source catalog, then
/// every catalog re-derives its exports.
async fn run_sync(settings: Arc<Settings>) -> Result<()> {
    let locks = Arc::new(LockTable::new());
    let scanner = Arc::new(CodeScanner::new(settings.clone()));
    let backend: Arc<dyn TranslationBackend> = if settings.stages.machine_translate {
        Arc::new(HttpBackend::new(settings.backend.clone()))
    } else {
        Arc::new(NullBackend)
    };
    let registry = ChainRegistry::standard(
        settings.clone(),
        locks.clone(),
        scanner.clone(),
        backend,
    );

    let locales_root = settings.locales_root();

    for path in locale_files(&locales_root, "po").await? {
        let mut ctx = ProcessingContext::for_event(&path, FileCategory::Po, &settings);
        registry.run(FileCategory::Po, &mut ctx).await?;
    }

    let stats = scanner.full_scan().await?;
    let added = seed_source_catalog(&settings, &scanner).await?;
    println!(
        "Scanned {} files; added {added} keys to {}.json",
        stats.files_scanned, settings.source_locale
    );

    for path in locale_files(&locales_root, "json").await? {
        let mut ctx = ProcessingContext::for_event(&path, FileCategory::LocaleJson, &settings);
        registry.run(FileCategory::LocaleJson, &mut ctx).await?;
    }

    Ok(())
}

async fn run_watch(settings: Arc<Settings>) -> Result<()> {
    let watcher = AssetWatcher::builder().settings(settings).build()?;

    // Seed records so the first change event diffs against current state
    watcher.scanner().full_scan().await?;

    watcher.watch().await?;
    Ok(())
}

/// Keys of the source-locale catalog, empty when it does not exist yet.
async fn source_catalog_keys(settings: &Settings) -> SyncResult<HashSet<String>> {
    let path = settings
        .locales_root()
        .join(format!("{}.json", settings.source_locale));

    let doc = match tokio::fs::read_to_string(&path).await {
        Ok(text) => serde_json::from_str::<Value>(&text)
            .map_err(|e| SyncError::format(&path, e.to_string()))?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Value::Object(Default::default()),
        Err(e) => return Err(SyncError::from_io(&path, e)),
    };

    Ok(flatten(&doc).into_keys().collect())
}

/// Merge keys used in code but absent from the source catalog, valued
/// by their authored default text.
async fn seed_source_catalog(settings: &Settings, scanner: &CodeScanner) -> SyncResult<usize> {
    let path = settings
        .locales_root()
        .join(format!("{}.json", settings.source_locale));

    let doc = match tokio::fs::read_to_string(&path).await {
        Ok(text) => serde_json::from_str::<Value>(&text)
            .map_err(|e| SyncError::format(&path, e.to_string()))?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Value::Object(Default::default()),
        Err(e) => return Err(SyncError::from_io(&path, e)),
    };

    let existing: HashSet<String> = flatten(&doc).into_keys().collect();
    let missing = scanner.missing_keys(&existing);
    if missing.is_empty() {
        return Ok(0);
    }

    let defaults = scanner.default_texts();
    let additions: Vec<(&str, Value)> = missing
        .iter()
        .map(|key| {
            let text = defaults.get(key).cloned().unwrap_or_default();
            (key.as_str(), Value::String(text))
        })
        .collect();

    let doc = merge_documents(doc, unflatten(additions));
    let mut text = serde_json::to_string_pretty(&doc)
        .map_err(|e| SyncError::format(&path, e.to_string()))?;
    text.push('\n');

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| SyncError::from_io(parent, e))?;
    }
    tokio::fs::write(&path, text)
        .await
        .map_err(|e| SyncError::from_io(&path, e))?;

    Ok(missing.len())
}

/// Files directly under `dir` with the given extension, sorted.
async fn locale_files(dir: &Path, extension: &str) -> SyncResult<Vec<PathBuf>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(SyncError::from_io(dir, e)),
    };

    let mut files = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| SyncError::from_io(dir, e))?
    {
        let path = entry.path();
        if path.is_file()
            && path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case(extension))
        {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}
