//! AdSift CLI
//!
//! Offline tool for running the classifier over page descriptions and
//! inspecting the stored feedback state.

mod sink;
mod storage;

use std::fs;
use std::path::Path;
use std::rc::Rc;

use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;

use sift_core::clock::{SharedClock, SystemClock};
use sift_core::config::{FeedbackConfig, ScorerConfig, Settings};
use sift_core::dom::{Document, PageSpec};
use sift_core::feedback::{BlockedTally, FeedbackSink, FeedbackStore, NullSink};
use sift_core::scan::Session;
use sift_core::scorer::Scorer;
use sift_core::signature::{Fingerprint, Signature};
use sift_core::snapshot::{ElementSnapshot, FeatureExtractor};
use sift_core::suppress::SuppressionState;

use crate::sink::JsonLinesSink;
use crate::storage::JsonFileStorage;

#[derive(Parser)]
#[command(name = "sift-cli")]
#[command(about = "AdSift ad-element classifier and feedback tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a JSON page description and suppress detected ads
    Scan {
        /// Page description (JSON)
        #[arg(short, long)]
        page: String,

        /// State file holding settings, feedback and the blocked tally
        #[arg(short, long, default_value = "adsift-state.json")]
        state: String,

        /// Decision threshold on the 0..=1 scale
        #[arg(long)]
        threshold: Option<f32>,

        /// Capacity of each verdict set
        #[arg(long)]
        capacity: Option<usize>,

        /// Write feedback records to this file (JSON lines)
        #[arg(long)]
        records: Option<String>,

        /// Undo the suppression of the element with this id (repeatable)
        #[arg(long)]
        undo: Vec<String>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Score a single element snapshot
    Score {
        /// Element snapshot (JSON)
        #[arg(short = 'i', long)]
        snapshot: String,

        /// State file holding the feedback verdicts
        #[arg(short, long, default_value = "adsift-state.json")]
        state: String,

        /// Decision threshold on the 0..=1 scale
        #[arg(long)]
        threshold: Option<f32>,
    },

    /// Show the stored verdict for a signature
    Verdict {
        /// Signature, e.g. `div#.ad-banner`
        signature: String,

        #[arg(short, long, default_value = "adsift-state.json")]
        state: String,
    },

    /// Dump state file info
    Info {
        #[arg(short, long, default_value = "adsift-state.json")]
        state: String,
    },

    /// Clear feedback verdicts and the blocked tally
    Reset {
        #[arg(short, long, default_value = "adsift-state.json")]
        state: String,
    },
}

fn main() {
    let cli = Cli::parse();

    let verbose = matches!(cli.command, Commands::Scan { verbose: true, .. });
    init_logging(verbose);

    let result = match cli.command {
        Commands::Scan {
            page,
            state,
            threshold,
            capacity,
            records,
            undo,
            verbose,
        } => cmd_scan(&page, &state, threshold, capacity, records.as_deref(), &undo, verbose),
        Commands::Score {
            snapshot,
            state,
            threshold,
        } => cmd_score(&snapshot, &state, threshold),
        Commands::Verdict { signature, state } => cmd_verdict(&signature, &state),
        Commands::Info { state } => cmd_info(&state),
        Commands::Reset { state } => cmd_reset(&state),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();
}

fn read_json<T: DeserializeOwned>(path: &str) -> Result<T, String> {
    let content = fs::read_to_string(path).map_err(|e| format!("Failed to read '{}': {}", path, e))?;
    serde_json::from_str(&content).map_err(|e| format!("Invalid JSON in '{}': {}", path, e))
}

fn scorer_with(threshold: Option<f32>) -> Result<Scorer, String> {
    let mut config = ScorerConfig::default();
    if let Some(threshold) = threshold {
        config.threshold = threshold;
    }
    Scorer::new(config).map_err(|e| e.to_string())
}

fn feedback_config(capacity: Option<usize>) -> Result<FeedbackConfig, String> {
    let mut config = FeedbackConfig::default();
    if let Some(capacity) = capacity {
        config.capacity = capacity;
    }
    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

fn clock() -> SharedClock {
    Rc::new(SystemClock)
}

fn load_feedback(storage: &JsonFileStorage, config: FeedbackConfig) -> Result<FeedbackStore, String> {
    let mut store = FeedbackStore::new(config, Box::new(storage.clone()), clock());
    store.load().map_err(|e| e.to_string())?;
    Ok(store)
}

fn load_tally(storage: &JsonFileStorage, config: FeedbackConfig) -> Result<BlockedTally, String> {
    let mut tally = BlockedTally::new(config, Box::new(storage.clone()), clock());
    tally.load().map_err(|e| e.to_string())?;
    Ok(tally)
}

fn cmd_scan(
    page_path: &str,
    state: &str,
    threshold: Option<f32>,
    capacity: Option<usize>,
    records: Option<&str>,
    undo: &[String],
    verbose: bool,
) -> Result<(), String> {
    let page: PageSpec = read_json(page_path)?;
    let scorer = scorer_with(threshold)?;
    let config = feedback_config(capacity)?;
    let storage = JsonFileStorage::open(Path::new(state))?;
    let settings = Settings::load(&storage);

    let sink: Box<dyn FeedbackSink> = match records {
        Some(path) => Box::new(JsonLinesSink::create(Path::new(path))?),
        None => Box::new(NullSink),
    };

    let mut session = Session::open(settings, scorer, config, storage, sink, clock());
    let mut doc = Document::from_spec(&page);

    if !session.start(&mut doc) {
        println!("Skipped '{}' (scanning disabled or page whitelisted)", page.url);
        return Ok(());
    }

    for id in undo {
        let node = doc
            .find_by_id(id)
            .ok_or_else(|| format!("No element with id '{}'", id))?;
        let SuppressionState::Suppressed { placeholder } = session.state(node) else {
            return Err(format!("Element '{}' is not suppressed", id));
        };
        session.undo(&mut doc, placeholder).map_err(|e| e.to_string())?;
        if verbose {
            println!("  Restored '{}'", id);
        }
    }

    let extractor = FeatureExtractor::default();
    let placeholders = doc.placeholders();
    println!("Scanned '{}'", page.url);
    for placeholder in &placeholders {
        let Some(node) = doc.placeholder_for(*placeholder) else {
            continue;
        };
        match extractor.extract(&doc, node) {
            Ok(snapshot) => println!("  Suppressed:  {}", Signature::of(&snapshot)),
            Err(e) => println!("  Suppressed:  {:?} ({})", node, e),
        }
    }

    let stats = session.stats();
    println!("  Evaluated:   {}", stats.evaluated);
    println!("  Suppressed:  {}", stats.suppressed);
    println!("  Restored:    {}", stats.restored);
    println!("  Sanctuary:   {}", stats.sanctuary);
    println!("  Skipped:     {}", stats.skipped);
    println!("  Blocked:     {} total across {} signatures", session.tally().total(), session.tally().len());

    let sink_errors = session.controller().reporter().errors().len();
    if sink_errors > 0 {
        println!("  Feedback delivery failures: {}", sink_errors);
    }
    let unsaved = session.feedback().fallback().len() + session.tally().fallback().len();
    if unsaved > 0 {
        return Err(format!("{} state write(s) to '{}' failed", unsaved, state));
    }

    Ok(())
}

fn cmd_score(snapshot_path: &str, state: &str, threshold: Option<f32>) -> Result<(), String> {
    let snapshot: ElementSnapshot = read_json(snapshot_path)?;
    let scorer = scorer_with(threshold)?;
    let storage = JsonFileStorage::open(Path::new(state))?;
    let feedback = load_feedback(&storage, FeedbackConfig::default())?;

    let result = scorer.score(&snapshot, &feedback);

    println!("Snapshot: {}", snapshot_path);
    println!("  Signature:   {}", Signature::of(&snapshot));
    println!("  Fingerprint: {}", Fingerprint::of(&snapshot));
    println!("  Score:       {:.2} (threshold {:.2})", result.score, scorer.threshold());
    println!("  Is ad:       {}", result.is_ad);
    println!("  Source:      {}", result.source.as_str());
    println!("  Signals:     {}", result.signals.labels().join(", "));

    Ok(())
}

fn cmd_verdict(signature: &str, state: &str) -> Result<(), String> {
    let storage = JsonFileStorage::open(Path::new(state))?;
    let config = FeedbackConfig::default();
    let feedback = load_feedback(&storage, config)?;
    let tally = load_tally(&storage, config)?;

    let signature = Signature::from(signature);
    println!("Signature: {}", signature);
    println!(
        "  Verdict:     {}",
        feedback.verdict(&signature).map(|v| v.as_str()).unwrap_or("none")
    );
    println!("  Blocked:     {}", tally.count(&signature));

    Ok(())
}

fn cmd_info(state: &str) -> Result<(), String> {
    let storage = JsonFileStorage::open(Path::new(state))?;
    let config = FeedbackConfig::default();
    let settings = Settings::load(&storage);
    let feedback = load_feedback(&storage, config)?;
    let tally = load_tally(&storage, config)?;

    println!("State: {}", state);
    println!("  Enabled:     {}", settings.enabled);
    println!("  Whitelist:   {}", settings.whitelist.join(", "));
    println!();

    println!("Feedback:");
    println!("  Confirmed:   {} (capacity {})", feedback.confirmed_ads().len(), config.capacity);
    println!("  False pos.:  {} (capacity {})", feedback.false_positives().len(), config.capacity);
    println!();

    let mut counts: Vec<_> = tally.iter().collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    println!("Blocked:");
    println!("  Total:       {} across {} signatures", tally.total(), tally.len());
    for (signature, count) in counts.into_iter().take(10) {
        println!("  {:>6}  {}", count, signature);
    }

    Ok(())
}

fn cmd_reset(state: &str) -> Result<(), String> {
    let storage = JsonFileStorage::open(Path::new(state))?;
    let config = FeedbackConfig::default();
    let mut feedback = FeedbackStore::new(config, Box::new(storage.clone()), clock());
    let mut tally = BlockedTally::new(config, Box::new(storage), clock());

    feedback.reset();
    tally.reset();
    if !feedback.fallback().is_empty() || !tally.fallback().is_empty() {
        return Err(format!("Failed to write '{}'", state));
    }

    println!("Reset feedback and blocked tally in '{}'", state);
    Ok(())
}
