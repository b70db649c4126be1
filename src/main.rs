use clap::{Arg, ArgMatches, Command};
use cybersentinel::client::{AnalysisResult, ApiClient};
use cybersentinel::error::{AnalysisError, SubmitError};
use cybersentinel::feedback::{FeedbackDraft, FeedbackReporter, FeedbackSubmission};
use cybersentinel::threat::{FeedbackCategory, ThreatLabel};
use cybersentinel::workflow::{Notice, Phase, Ticket, Workflow};
use cybersentinel::Config;
use log::LevelFilter;
use std::process;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

/// Network outcomes reported back to the interactive loop.
enum Completion {
    Analysis(Ticket, Result<AnalysisResult, AnalysisError>),
    Feedback(FeedbackSubmission, Result<(), SubmitError>),
}

fn cli() -> Command {
    Command::new("cybersentinel")
        .version(env!("CARGO_PKG_VERSION"))
        .about("URL threat analysis client for the CyberSentinel classifier")
        .long_about("CyberSentinel client - submit URLs for classification and report corrections:\n\
                    • Classifies URLs as Benign, Defacement, Malware or Phishing\n\
                    • Keeps the five most recent analyses of the session\n\
                    • Reports misclassifications seeded from the last analysis")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("/etc/cybersentinel.yaml"),
        )
        .arg(
            Arg::new("generate-config")
                .long("generate-config")
                .value_name("FILE")
                .help("Generate a default configuration file")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("test-config")
                .long("test-config")
                .help("Test configuration validity")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("analyze")
                .short('a')
                .long("analyze")
                .value_name("URL")
                .help("Analyze a single URL and exit")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("report")
                .long("report")
                .help("Submit feedback about a classification (seeded from --analyze when given)")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("url")
                .long("url")
                .value_name("URL")
                .help("URL the feedback is about")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("actual")
                .long("actual")
                .value_name("LABEL")
                .help("Actual threat level: Benign, Defacement, Malware or Phishing")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("predicted")
                .long("predicted")
                .value_name("LABEL")
                .help("What the classifier predicted (false_negative/false_positive only)")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("category")
                .long("category")
                .value_name("CATEGORY")
                .help("Feedback category: false_negative, false_positive, new_threat, improvement")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("description")
                .long("description")
                .value_name("TEXT")
                .help("Additional details for the feedback report")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("stats")
                .long("stats")
                .help("Show aggregate feedback statistics from the backend")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("interactive")
                .short('i')
                .long("interactive")
                .help("Start an interactive analysis session (default when no action is given)")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(clap::ArgAction::SetTrue),
        )
}

#[tokio::main]
async fn main() {
    let matches = cli().get_matches();

    let config_path = matches
        .get_one::<String>("config")
        .map(String::as_str)
        .unwrap_or("/etc/cybersentinel.yaml");

    // Initialize logger: --verbose wins, then the config file's level
    let log_level = if matches.get_flag("verbose") {
        LevelFilter::Debug
    } else {
        Config::from_file(config_path)
            .ok()
            .and_then(|config| config.log_level())
            .unwrap_or(LevelFilter::Info)
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    if let Some(generate_path) = matches.get_one::<String>("generate-config") {
        generate_default_config(generate_path);
        return;
    }

    let config = match Config::load(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            process::exit(1);
        }
    };

    if matches.get_flag("test-config") {
        println!("🔍 Testing configuration...");
        println!("   API base URL: {}", config.api.base_url);
        println!("   Request timeout: {}s", config.api.timeout_seconds);
        println!("   User agent: {}", config.api.user_agent);
        println!("✅ Configuration is valid");
        return;
    }

    let api = match ApiClient::new(&config.api) {
        Ok(api) => api,
        Err(e) => {
            eprintln!("❌ Failed to create HTTP client: {e}");
            process::exit(1);
        }
    };

    if matches.get_flag("stats") {
        if let Err(e) = show_stats(&api).await {
            eprintln!("❌ {e}");
            process::exit(1);
        }
        return;
    }

    let analyze_url = matches.get_one::<String>("analyze");
    let report = matches.get_flag("report");

    if analyze_url.is_some() || report {
        let mut workflow = Workflow::new();
        let mut failed = false;

        if let Some(url) = analyze_url {
            let outcome = workflow.submit(&api, url).await;
            print_notices(&mut workflow);
            match outcome {
                Ok(result) => print_result(&result),
                Err(_) => failed = true,
            }
        }

        if report && !failed {
            failed = !submit_report(&matches, &mut workflow, &api).await;
        }

        if failed {
            process::exit(1);
        }
        return;
    }

    if let Err(e) = run_interactive(api).await {
        log::error!("Interactive session error: {e}");
        process::exit(1);
    }
}

fn generate_default_config(path: &str) {
    let config = Config::default();
    match config.to_file(path) {
        Ok(()) => {
            println!("Default configuration written to: {path}");
            println!("Please edit the configuration file to point at your classifier backend.");
        }
        Err(e) => {
            eprintln!("Error writing configuration file: {e}");
            process::exit(1);
        }
    }
}

fn parse_label(raw: &str) -> Option<ThreatLabel> {
    let label = ThreatLabel::parse(raw);
    if label.is_none() {
        eprintln!("⚠️  Unrecognized threat label '{raw}' (expected Benign, Defacement, Malware or Phishing)");
    }
    label
}

fn parse_category(raw: &str) -> Option<FeedbackCategory> {
    let category = FeedbackCategory::parse(raw);
    if category.is_none() {
        eprintln!(
            "⚠️  Unrecognized feedback category '{raw}' (expected false_negative, false_positive, new_threat or improvement)"
        );
    }
    category
}

/// Apply the report flags on top of the prefilled draft.
///
/// An unrecognized label or category leaves the draft untouched and returns
/// `false`, so a typo never silently drops a prefilled field.
fn apply_report_args(matches: &ArgMatches, draft: &mut FeedbackDraft) -> bool {
    let actual = match matches.get_one::<String>("actual") {
        Some(raw) => match parse_label(raw) {
            Some(label) => Some(label),
            None => return false,
        },
        None => draft.actual_threat,
    };
    let predicted = match matches.get_one::<String>("predicted") {
        Some(raw) => match parse_label(raw) {
            Some(label) => Some(label),
            None => return false,
        },
        None => draft.our_prediction,
    };
    let category = match matches.get_one::<String>("category") {
        Some(raw) => match parse_category(raw) {
            Some(category) => Some(category),
            None => return false,
        },
        None => draft.category,
    };

    if let Some(url) = matches.get_one::<String>("url") {
        draft.url = url.clone();
    }
    if let Some(description) = matches.get_one::<String>("description") {
        draft.description = description.clone();
    }
    draft.actual_threat = actual;
    draft.our_prediction = predicted;
    draft.category = category;
    true
}

/// One-shot feedback submission. Returns `true` when the report was accepted.
async fn submit_report(matches: &ArgMatches, workflow: &mut Workflow, api: &ApiClient) -> bool {
    if !apply_report_args(matches, workflow.open_feedback()) {
        return false;
    }

    let reporter = FeedbackReporter::new(api.clone());
    match reporter.submit(workflow.feedback_mut()).await {
        Ok(()) => {
            println!("🎉 Thank you! Your feedback helps improve our detection system");
            true
        }
        Err(e) => {
            eprintln!("❌ {e}");
            false
        }
    }
}

async fn show_stats(api: &ApiClient) -> anyhow::Result<()> {
    let stats = api.feedback_stats().await?;
    println!("📊 Feedback Statistics");
    println!("═══════════════════════════════════════");
    if stats.0.is_empty() {
        println!("📭 No feedback recorded yet");
    }
    for (name, value) in &stats.0 {
        println!("  {:<30} {}", name, value);
    }
    Ok(())
}

fn print_result(result: &AnalysisResult) {
    println!();
    println!("{} {}", result.risk_level.marker(), result.risk_level);
    println!("   {}", result.risk_level.description());
    println!("   URL: {}", result.analyzed_url);
    println!("   Response time: {}ms", result.response_time_ms);
    println!(
        "   Analyzed at: {}",
        result.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
    );
}

fn print_notices(workflow: &mut Workflow) {
    for notice in workflow.drain_notices() {
        match notice {
            Notice::Success(message) => println!("✅ {message}"),
            Notice::Error(message) => eprintln!("❌ {message}"),
        }
    }
}

fn print_history(workflow: &Workflow) {
    let entries = workflow.history().list();
    if entries.is_empty() {
        println!("📭 No recent scans");
        return;
    }
    println!("🕒 Recent Scans");
    for entry in entries {
        let local = entry.captured_at.with_timezone(&chrono::Local);
        println!(
            "  {} {:<10} {}  {}",
            entry.result.risk_level.marker(),
            entry.result.risk_level,
            local.format("%H:%M:%S"),
            entry.url
        );
    }
}

fn print_status(workflow: &Workflow) {
    let snapshot = workflow.snapshot();
    println!("State: {:?}", snapshot.phase);
    if let Some(result) = &snapshot.result {
        print_result(result);
    }
    if let Some(error) = &snapshot.error {
        println!("Last error: {error}");
    }
    if let Some(draft) = &snapshot.feedback_draft {
        println!(
            "Open feedback draft: {} (predicted {})",
            draft.url,
            draft
                .our_prediction
                .map(|label| label.to_string())
                .unwrap_or_else(|| "-".to_string())
        );
    }
}

fn print_help() {
    println!("Commands:");
    println!("  <url> | analyze <url>                        analyze a URL");
    println!("  report <category> <actual> [description]     report the last result");
    println!("  history                                      show recent scans");
    println!("  status                                       show current state");
    println!("  stats                                        show feedback statistics");
    println!("  quit                                         leave the session");
    println!();
    println!("Categories:");
    for category in FeedbackCategory::ALL {
        println!("  {:<16} {}", category.as_str(), category.description());
    }
}

async fn run_interactive(api: ApiClient) -> anyhow::Result<()> {
    ctrlc::set_handler(|| {
        println!();
        log::info!("Received interrupt, leaving session");
        process::exit(0);
    })?;

    println!("🛡️  CyberSentinel - URL threat analysis");
    println!("Backend: {}", api.base_url());
    println!("Type 'help' for commands.");

    let mut workflow = Workflow::new();
    let (tx, mut rx) = mpsc::unbounded_channel::<Completion>();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if !handle_command(line.trim(), &mut workflow, &api, &tx) {
                    break;
                }
            }
            Some(completion) = rx.recv() => {
                match completion {
                    Completion::Analysis(ticket, outcome) => {
                        if workflow.complete(&ticket, outcome) && workflow.phase() == Phase::Succeeded {
                            if let Some(result) = workflow.result() {
                                print_result(result);
                            }
                        }
                    }
                    Completion::Feedback(sent, outcome) => {
                        workflow.settle_feedback(&sent, &outcome);
                    }
                }
            }
        }
        print_notices(&mut workflow);
    }

    Ok(())
}

/// Dispatch one input line. Returns `false` when the session should end.
fn handle_command(
    line: &str,
    workflow: &mut Workflow,
    api: &ApiClient,
    tx: &mpsc::UnboundedSender<Completion>,
) -> bool {
    let (command, rest) = match line.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (line, ""),
    };

    match command.to_lowercase().as_str() {
        "" => {}
        "quit" | "exit" => return false,
        "help" => print_help(),
        "history" => print_history(workflow),
        "status" => print_status(workflow),
        "stats" => {
            let api = api.clone();
            tokio::spawn(async move {
                if let Err(e) = show_stats(&api).await {
                    eprintln!("❌ {e}");
                }
            });
        }
        "report" => {
            let mut parts = rest.splitn(3, char::is_whitespace);
            let category = parts.next().unwrap_or_default();
            let actual = parts.next().unwrap_or_default();
            let description = parts.next().unwrap_or_default().to_string();

            let draft = workflow.open_feedback();
            draft.category = if category.is_empty() { None } else { parse_category(category) };
            draft.actual_threat = if actual.is_empty() { None } else { parse_label(actual) };
            draft.description = description;

            if let Ok(sent) = workflow.prepare_feedback() {
                println!("📨 Submitting feedback for {}...", sent.url);
                let api = api.clone();
                let tx = tx.clone();
                tokio::spawn(async move {
                    let outcome = api.submit_feedback(&sent).await;
                    let _ = tx.send(Completion::Feedback(sent, outcome));
                });
            }
        }
        "analyze" => start_analysis(rest, workflow, api, tx),
        _ => start_analysis(line, workflow, api, tx),
    }
    true
}

fn start_analysis(
    input: &str,
    workflow: &mut Workflow,
    api: &ApiClient,
    tx: &mpsc::UnboundedSender<Completion>,
) {
    let Ok(ticket) = workflow.begin(input) else {
        return;
    };

    println!("🔎 Analyzing {} (#{})...", ticket.url(), ticket.generation());
    let api = api.clone();
    let tx = tx.clone();
    tokio::spawn(async move {
        let outcome = api.analyze(ticket.url()).await;
        let _ = tx.send(Completion::Analysis(ticket, outcome));
    });
}
