// CLI commands for CompileRace
use anyhow::{bail, Context, Result};
use compilerace_common::config::Config;
use compilerace_common::questions::{next_question_index, QuestionBank};
use compilerace_common::store::{self, FileStore, KeyValueStore};
use compilerace_common::types::{Question, Verdict};
use compilerace_engine::engine::{ExecutionClient, PollPolicy, RuntimeSelector};
use compilerace_engine::judge0::Judge0Service;
use compilerace_engine::race::{editor_stats, IgnoredReason, RaceOrchestrator, RacePhase, RaceSummary, RunOutcome, TestPhase};
use compilerace_engine::source::SourcePreparer;
use std::fs;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, warn};

/// How often the race command re-reads the source file
const WATCH_INTERVAL: Duration = Duration::from_millis(500);

/// Everything a command needs, loaded once from the configuration
pub struct App {
    config: Config,
    bank: QuestionBank,
    store: Arc<FileStore>,
}

impl App {
    pub fn load(config: Config) -> Result<Self> {
        let bank = match &config.questions_path {
            Some(path) => QuestionBank::load(path)
                .with_context(|| format!("Failed to load question bank {}", path.display()))?,
            None => QuestionBank::builtin().context("Built-in question bank is invalid")?,
        };
        let store = Arc::new(FileStore::open(&config.store_path));
        debug!(store = %store.path().display(), questions = bank.len(), "Loaded configuration");

        Ok(Self { config, bank, store })
    }

    fn client(&self) -> Result<ExecutionClient> {
        let service = Judge0Service::new(
            &self.config.judge0_url,
            Duration::from_secs(self.config.http_timeout_secs),
        )
        .context("Failed to build the HTTP client")?;

        Ok(ExecutionClient::new(
            Arc::new(service),
            self.store.clone(),
            RuntimeSelector::from(&self.config),
            PollPolicy::from(&self.config.poll),
        ))
    }

    fn orchestrator(&self, raw_index: Option<&str>) -> Result<(usize, RaceOrchestrator)> {
        let (index, question) = self.bank.select(raw_index);
        let race = RaceOrchestrator::new(
            self.client()?,
            SourcePreparer::new(self.bank.template.clone()),
            self.store.clone(),
            question,
        );
        Ok((index, race))
    }
}

/// List the question bank
pub fn list_questions(app: &App) {
    if app.bank.is_empty() {
        println!("No questions in the bank.");
        return;
    }

    println!("📋 Questions:\n");
    println!("{:<4} {:<28} {:<36} {:<10} {:<6}", "#", "ID", "TITLE", "LEVEL", "TESTS");
    println!("{}", "─".repeat(88));

    for (index, question) in app.bank.questions.iter().enumerate() {
        println!(
            "{:<4} {:<28} {:<36} {:<10} {:<6}",
            index,
            question.id,
            question.title,
            question.difficulty.as_deref().unwrap_or("-"),
            question.test_cases().len()
        );
    }

    println!("\n✅ Total: {} question(s)", app.bank.len());
}

/// Show a question's objective, sample and starter code
pub fn show_question(app: &App, raw_index: Option<&str>) {
    let (index, question) = app.bank.select(raw_index);
    let preparer = SourcePreparer::new(app.bank.template.clone());

    print_question_header(index, app.bank.len(), &question);
    println!("\n📄 Starter code:\n");
    println!("{}", preparer.starter_code(&question));
}

fn print_question_header(index: usize, total: usize, question: &Question) {
    println!("🏁 Challenge {}/{}: {}", index + 1, total.max(1), question.title);
    if let Some(difficulty) = &question.difficulty {
        println!("   Difficulty: {}", difficulty);
    }
    if !question.tags.is_empty() {
        println!("   Tags: {}", question.tags.join(", "));
    }
    println!("\n🎯 {}", question.objective);
    println!("\n📥 Sample input:\n{}", question.sample.input);
    println!("\n📤 Sample output:\n{}", question.sample.output);
}

/// Interactive race on a source file
pub async fn race(app: &App, raw_index: Option<&str>, file: &Path) -> Result<()> {
    let (index, mut race) = app.orchestrator(raw_index)?;

    if !file.exists() {
        fs::write(file, race.source())
            .with_context(|| format!("Failed to write starter code to {}", file.display()))?;
        println!("📝 Wrote starter code to {}", file.display());
    }

    print_question_header(index, app.bank.len(), race.question());
    println!("\n⏱️  The clock starts with your first saved edit to {}", file.display());
    println!("💡 Commands: run (or Enter), restart, status, quit\n");

    race.warm_up().await;
    sync_file(&mut race, file);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut watch = tokio::time::interval(WATCH_INTERVAL);
    // One handler for the whole session, also watched while judging
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = watch.tick() => {
                sync_file(&mut race, file);
            }
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read command")? else {
                    break;
                };
                match line.trim() {
                    "" | "run" => {
                        sync_file(&mut race, file);
                        if race.phase() == RacePhase::Racing {
                            println!("🚀 Judging at {}...", format_time(race.elapsed_secs()));
                        }
                        let Some(outcome) = until_interrupted(race.run(), &mut ctrl_c).await else {
                            println!();
                            break;
                        };
                        print_outcome(&outcome, (index, app.bank.len()));
                    }
                    "restart" => {
                        race.restart();
                        fs::write(file, race.source())
                            .with_context(|| format!("Failed to reset {}", file.display()))?;
                        println!("🔄 Restarted. Starter code written to {}", file.display());
                    }
                    "status" => print_status(&race, file),
                    "quit" | "exit" => break,
                    other => println!("❓ Unknown command '{}'. Use run, restart, status or quit.", other),
                }
            }
            _ = &mut ctrl_c => {
                println!();
                break;
            }
        }
    }

    println!("👋 Bye");
    Ok(())
}

/// Await `work` unless `interrupt` completes first
async fn until_interrupted<T>(work: impl Future<Output = T>, interrupt: impl Future) -> Option<T> {
    tokio::select! {
        value = work => Some(value),
        _ = interrupt => None,
    }
}

fn sync_file(race: &mut RaceOrchestrator, file: &Path) {
    match fs::read_to_string(file) {
        Ok(text) => {
            race.record_edit(&text);
        }
        Err(e) => warn!(file = %file.display(), error = %e, "Failed to read source file"),
    }
}

fn print_status(race: &RaceOrchestrator, file: &Path) {
    let phase = match race.phase() {
        RacePhase::NotStarted => "waiting for the first edit",
        RacePhase::Racing => "racing",
        RacePhase::Judging => "judging",
        RacePhase::Finished => "finished",
    };
    println!("⏱️  {} ({})", format_time(race.elapsed_secs()), phase);
    println!("📄 {}: {}", file.display(), editor_stats(race.source()));
    println!("⌨️  {} chars typed", race.total_chars_typed());
    match race.best_time() {
        Some(best) => println!("🏆 Best: {}", format_time(best)),
        None => println!("🏆 No best time yet"),
    }
}

/// Judge a finished file once
pub async fn submit(app: &App, raw_index: Option<&str>, file: &Path, json: bool) -> Result<()> {
    let text = fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let (index, mut race) = app.orchestrator(raw_index)?;
    ensure_judgeable(file, &text, race.source())?;
    race.record_edit(&text);

    if !json {
        println!("🚀 Judging {} against '{}'...", file.display(), race.question().title);
    }
    let outcome = race.run().await;
    match &outcome {
        RunOutcome::Accepted(summary) if json => {
            let rendered = serde_json::to_string_pretty(summary).context("Failed to serialize summary")?;
            println!("{}", rendered);
        }
        _ => print_outcome(&outcome, (index, app.bank.len())),
    }

    if !matches!(outcome, RunOutcome::Accepted(_)) {
        bail!("Submission was not accepted");
    }
    Ok(())
}

/// A submission needs some code that differs from the starter
fn ensure_judgeable(file: &Path, text: &str, starter: &str) -> Result<()> {
    if text.trim().is_empty() {
        bail!("{} is empty, nothing to judge", file.display());
    }
    if text == starter {
        bail!("{} is unchanged from the starter code, nothing to judge", file.display());
    }
    Ok(())
}

fn print_outcome(outcome: &RunOutcome, (index, total): (usize, usize)) {
    match outcome {
        RunOutcome::Ignored(IgnoredReason::NotStarted) => {
            println!("⏳ Nothing to run yet. Save an edit to start the clock.");
        }
        RunOutcome::Ignored(IgnoredReason::AlreadyRunning) => {
            println!("⏳ Already judging.");
        }
        RunOutcome::Ignored(IgnoredReason::Finished) => {
            println!("🏁 This race is finished. Type 'restart' to race again.");
        }
        RunOutcome::CompilerUnavailable { message } => {
            println!("⚠️  Compiler unavailable: {}", message);
            println!("   The clock is running again. Run to retry.");
        }
        RunOutcome::Failed { phase, verdicts } => {
            print_verdicts(verdicts);
            let phase = match phase {
                TestPhase::Quick => "Quick tests",
                TestPhase::Full => "Full tests",
            };
            println!("❌ {} failed. The clock is running again.", phase);
        }
        RunOutcome::Accepted(summary) => {
            print_verdicts(&summary.verdicts);
            print_summary(summary);
            match next_question_index(index, total) {
                Some(next) => println!("\n➡️  Next challenge: compilerace race -q {}", next),
                None => println!("\n🎉 That was the last challenge!"),
            }
        }
    }
}

fn print_verdicts(verdicts: &[Verdict]) {
    for verdict in verdicts {
        println!("{}", verdict);
    }
}

fn print_summary(summary: &RaceSummary) {
    println!("\n🏁 Accepted in {}", format_time(summary.final_time_secs));
    println!(
        "⌨️  {:.2} chars/sec ({} chars typed)",
        summary.chars_per_second, summary.chars_typed
    );
    if summary.new_best {
        println!("🏆 New best time!");
    } else {
        println!("🏆 Best: {}", format_time(summary.best_time_secs));
    }
}

/// Show recorded best times
pub fn show_best(app: &App, raw_index: Option<&str>) {
    if raw_index.is_some() {
        let (_, question) = app.bank.select(raw_index);
        let best = store::get_parsed::<u64>(app.store.as_ref(), &store::best_time_key(&question.id))
            .filter(|best| *best > 0);
        match best {
            Some(best) => println!("🏆 {}: {}", question.title, format_time(best)),
            None => println!("No best time recorded for '{}'.", question.title),
        }
        return;
    }

    let entries = app.store.entries(store::BEST_TIME_PREFIX);
    if entries.is_empty() {
        println!("No best times recorded yet.");
        println!("\n💡 Start a race with: compilerace race -q 0 -f Main.java");
        return;
    }

    println!("🏆 Best times:\n");
    for (key, value) in entries {
        let Some(id) = question_id_from_key(&key) else {
            continue;
        };
        let Some(secs) = value.trim().parse::<u64>().ok().filter(|secs| *secs > 0) else {
            continue;
        };
        let title = app
            .bank
            .questions
            .iter()
            .find(|q| q.id == id)
            .map(|q| q.title.as_str())
            .unwrap_or(id);
        println!("  {:<36} {}", title, format_time(secs));
    }
}

fn question_id_from_key(key: &str) -> Option<&str> {
    key.strip_prefix(store::BEST_TIME_PREFIX)?
        .strip_prefix(':')
        .filter(|id| !id.is_empty())
}

/// Resolve (and cache) the language id
pub async fn language(app: &App, refresh: bool) -> Result<()> {
    let mut client = app.client()?;
    if refresh {
        client
            .forget_language_id()
            .context("Failed to clear the cached language id")?;
        println!("🗑️  Cleared cached language id");
    }

    let id = match client.resolve_language_id().await {
        Ok(id) => id,
        Err(e) if e.is_catalog_failure() => bail!("Compiler unavailable at {}: {}", app.config.judge0_url, e),
        Err(e) => return Err(e).context("Failed to resolve the language id"),
    };
    println!("✅ Java language id: {} ({})", id, app.config.judge0_url);
    Ok(())
}

/// Show or set the accent colour
pub fn accent(app: &App, colour: Option<&str>) -> Result<()> {
    let Some(colour) = colour else {
        println!("🎨 Accent: {}", store::accent(app.store.as_ref()));
        return Ok(());
    };

    if !store::is_valid_accent(colour) {
        bail!("Invalid colour '{}': expected # followed by six hex digits", colour);
    }
    app.store
        .set(store::ACCENT_KEY, colour)
        .context("Failed to save accent colour")?;
    println!("✅ Accent set to {}", colour);
    Ok(())
}

fn format_time(secs: u64) -> String {
    if secs < 60 {
        format!("{}s", secs)
    } else {
        format!("{}m {:02}s", secs / 60, secs % 60)
    }
}
