use crate::error::{IdSiftError, UserFriendlyError};
use crate::extractor::report::{ExtractionReport, StopReason};
use crate::ui::progress::{format_duration, ProgressSnapshot};
use console::{style, Emoji, Term};
use indicatif::ProgressBar;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputMode {
    Human,
    Json,
    Plain,
}

impl OutputMode {
    pub fn from_string(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputMode::Json,
            "plain" => OutputMode::Plain,
            _ => OutputMode::Human,
        }
    }
}

// Emojis with text fallbacks
static CHECKMARK: Emoji = Emoji("✅ ", "✓ ");
static CROSS: Emoji = Emoji("❌ ", "✗ ");
static INFO: Emoji = Emoji("ℹ️  ", "i ");
static WARNING: Emoji = Emoji("⚠️  ", "! ");
static ROCKET: Emoji = Emoji("🚀 ", "> ");
static SPARKLES: Emoji = Emoji("✨ ", "* ");
static HEARTBEAT: Emoji = Emoji("💓 ", "~ ");

#[derive(Clone)]
pub struct OutputFormatter {
    #[allow(dead_code)]
    term: Term,
    mode: OutputMode,
    use_colors: bool,
    verbose_level: u8,
    quiet: bool,
}

impl OutputFormatter {
    pub fn new(mode: OutputMode, verbose: u8, quiet: bool) -> Self {
        let term = Term::stdout();
        let use_colors = match mode {
            OutputMode::Human => term.features().colors_supported() && !quiet,
            _ => false,
        };

        Self {
            term,
            mode,
            use_colors,
            verbose_level: if quiet { 0 } else { verbose },
            quiet,
        }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet
    }

    // Core messaging methods
    pub fn success(&self, message: &str) {
        match self.mode {
            OutputMode::Human => self.print_human_message(MessageType::Success, message),
            OutputMode::Json => self.print_json_message("success", message),
            OutputMode::Plain => println!("SUCCESS: {}", message),
        }
    }

    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Human => self.print_human_message(MessageType::Error, message),
            OutputMode::Json => self.print_json_message("error", message),
            OutputMode::Plain => eprintln!("ERROR: {}", message),
        }
    }

    pub fn warning(&self, message: &str) {
        if self.should_show_message(0) {
            match self.mode {
                OutputMode::Human => self.print_human_message(MessageType::Warning, message),
                OutputMode::Json => self.print_json_message("warning", message),
                OutputMode::Plain => println!("WARNING: {}", message),
            }
        }
    }

    pub fn info(&self, message: &str) {
        if self.should_show_message(1) {
            match self.mode {
                OutputMode::Human => self.print_human_message(MessageType::Info, message),
                OutputMode::Json => self.print_json_message("info", message),
                OutputMode::Plain => println!("INFO: {}", message),
            }
        }
    }

    pub fn debug(&self, message: &str) {
        if self.should_show_message(2) {
            match self.mode {
                OutputMode::Human => {
                    if self.use_colors {
                        println!("  {}", style(message).dim());
                    } else {
                        println!("  DEBUG: {}", message);
                    }
                }
                OutputMode::Json => self.print_json_message("debug", message),
                OutputMode::Plain => println!("DEBUG: {}", message),
            }
        }
    }

    pub fn start_operation(&self, operation: &str) {
        if self.should_show_message(0) {
            match self.mode {
                OutputMode::Human => {
                    if self.use_colors {
                        println!("{}{}", ROCKET, style(operation).bold());
                    } else {
                        println!("> {}", operation);
                    }
                }
                OutputMode::Json => self.print_json_message("operation_start", operation),
                OutputMode::Plain => println!("STARTING: {}", operation),
            }
        }
    }

    /// One heartbeat line. Printed at default verbosity, suppressed by `--quiet`.
    pub fn heartbeat(&self, snapshot: &ProgressSnapshot) {
        if !self.should_show_message(0) {
            return;
        }

        match self.mode {
            OutputMode::Human => {
                if self.use_colors {
                    println!("{}{}", HEARTBEAT, style(snapshot.display_line()).dim());
                } else {
                    println!("{}", snapshot.display_line());
                }
            }
            OutputMode::Json => {
                let mut obj = serde_json::to_value(snapshot).unwrap_or_else(|_| serde_json::json!({}));
                if let Some(map) = obj.as_object_mut() {
                    map.insert("type".to_string(), serde_json::json!("heartbeat"));
                }
                self.print_json_object(&obj);
            }
            OutputMode::Plain => println!("{}", snapshot.display_line()),
        }
    }

    // User-friendly error handling
    pub fn print_user_friendly_error(&self, error: &IdSiftError) {
        let user_message = error.user_message();
        self.error(&user_message);

        if let Some(suggestion) = error.suggestion() {
            match self.mode {
                OutputMode::Human => {
                    eprintln!();
                    if self.use_colors {
                        eprintln!(
                            "{}{}",
                            INFO,
                            style(&format!("Suggestion: {}", suggestion)).cyan()
                        );
                    } else {
                        eprintln!("Suggestion: {}", suggestion);
                    }
                }
                OutputMode::Json => {
                    self.print_json_object(&serde_json::json!({
                        "type": "suggestion",
                        "message": suggestion
                    }));
                }
                OutputMode::Plain => {
                    eprintln!("SUGGESTION: {}", suggestion);
                }
            }
        }
    }

    pub fn print_extraction_report(&self, report: &ExtractionReport) {
        match self.mode {
            OutputMode::Human => {
                if !self.quiet {
                    self.print_human_report(report);
                }
            }
            OutputMode::Json => {
                let json_output =
                    serde_json::to_string_pretty(report).unwrap_or_else(|_| "{}".to_string());
                println!("{}", json_output);
            }
            OutputMode::Plain => self.print_plain_report(report),
        }
    }

    // Specialized output methods
    pub fn print_header(&self, title: &str) {
        if self.quiet {
            return;
        }

        match self.mode {
            OutputMode::Human => {
                println!();
                if self.use_colors {
                    println!("{} {}", SPARKLES, style(title).bold().cyan());
                } else {
                    println!("=== {} ===", title);
                }
                println!();
            }
            OutputMode::Json => {
                self.print_json_object(&serde_json::json!({
                    "type": "header",
                    "title": title
                }));
            }
            OutputMode::Plain => {
                println!("=== {} ===", title);
            }
        }
    }

    pub fn print_separator(&self) {
        if self.quiet {
            return;
        }

        match self.mode {
            OutputMode::Human => {
                if self.use_colors {
                    println!("{}", style("─".repeat(60)).dim());
                } else {
                    println!("{}", "-".repeat(60));
                }
            }
            OutputMode::Plain => {
                println!("{}", "-".repeat(60));
            }
            OutputMode::Json => {}
        }
    }

    fn should_show_message(&self, min_verbose_level: u8) -> bool {
        !self.quiet && self.verbose_level >= min_verbose_level
    }

    fn print_human_message(&self, msg_type: MessageType, message: &str) {
        #[allow(clippy::type_complexity)]
        let (emoji, color_fn): (Emoji, Box<dyn Fn(&str) -> console::StyledObject<&str>>) =
            match msg_type {
                MessageType::Success => (CHECKMARK, Box::new(|msg| style(msg).green().bold())),
                MessageType::Error => (CROSS, Box::new(|msg| style(msg).red().bold())),
                MessageType::Warning => (WARNING, Box::new(|msg| style(msg).yellow().bold())),
                MessageType::Info => (INFO, Box::new(|msg| style(msg).cyan())),
            };

        if self.use_colors {
            match msg_type {
                MessageType::Error => eprintln!("{}{}", emoji, color_fn(message)),
                _ => println!("{}{}", emoji, color_fn(message)),
            }
        } else {
            let prefix = match msg_type {
                MessageType::Success => "✓",
                MessageType::Error => "✗",
                MessageType::Warning => "!",
                MessageType::Info => "i",
            };

            match msg_type {
                MessageType::Error => eprintln!("{} {}", prefix, message),
                _ => println!("{} {}", prefix, message),
            }
        }
    }

    fn print_json_message(&self, level: &str, message: &str) {
        self.print_json_object(&serde_json::json!({
            "type": "message",
            "level": level,
            "message": message,
            "timestamp": chrono::Utc::now().to_rfc3339()
        }));
    }

    fn print_json_object(&self, obj: &serde_json::Value) {
        println!(
            "{}",
            serde_json::to_string(obj).unwrap_or_else(|_| "{}".to_string())
        );
    }

    fn highlight(&self, value: impl ToString) -> String {
        if self.use_colors {
            style(value.to_string()).cyan().bold().to_string()
        } else {
            value.to_string()
        }
    }

    fn print_human_report(&self, report: &ExtractionReport) {
        let summary = &report.summary;
        println!();
        self.print_separator();

        let headline = match report.stop_reason {
            StopReason::AllFound => "All target IDs extracted!",
            StopReason::Exhausted => "Scan finished",
            StopReason::Interrupted => "Scan interrupted, progress saved",
        };
        if self.use_colors {
            let styled = if report.is_complete() {
                style(headline).green().bold()
            } else {
                style(headline).yellow().bold()
            };
            println!("{} {}", styled, if report.is_complete() { CHECKMARK } else { WARNING });
        } else {
            println!("{}", headline);
        }

        println!();
        println!("  Source:           {}", report.source);
        println!("  Target IDs:       {}", self.highlight(summary.target_ids));
        println!("  Found IDs:        {}", self.highlight(summary.found_ids));
        println!("  Written this run: {}", self.highlight(summary.records_written));
        println!("  Missing IDs:      {}", self.highlight(summary.missing_ids));
        println!(
            "  Partitions:       {} scanned, {} already done, {} total",
            summary.partitions_scanned, summary.partitions_already_done, summary.partitions_total
        );
        println!(
            "  Time taken:       {}",
            self.highlight(format_duration(Duration::from_secs_f64(summary.duration_secs)))
        );
        println!("  Output:           {}", report.output_path.display());

        if !report.missing_sample.is_empty() {
            println!();
            println!("  Missing sample:   {}", join_ids(&report.missing_sample));
        }

        if !report.failed_partitions.is_empty() {
            println!();
            println!("Partitions that could not be read:");
            for partition in &report.failed_partitions {
                println!("  - {}", partition);
            }
        }

        if !report.skipped_in_checkpoint.is_empty() {
            println!();
            println!(
                "{} partition(s) are recorded as skipped; rerun with --resume --retry-skipped to read them again",
                report.skipped_in_checkpoint.len()
            );
        }

        self.print_separator();
    }

    fn print_plain_report(&self, report: &ExtractionReport) {
        let summary = &report.summary;
        println!(
            "[done] target_ids={} found={} written_this_run={} missing={}",
            summary.target_ids, summary.found_ids, summary.records_written, summary.missing_ids
        );
        if !report.missing_sample.is_empty() {
            println!("[done] missing_sample={}", join_ids(&report.missing_sample));
        }
        if !report.failed_partitions.is_empty() {
            println!("[done] failed_partitions={}", report.failed_partitions.len());
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum MessageType {
    Success,
    Error,
    Warning,
    Info,
}

fn join_ids(ids: &[i64]) -> String {
    ids.iter().map(|id| id.to_string()).collect::<Vec<_>>().join(", ")
}

/// Formatter paired with an optional bar, so messages don't tear the bar.
pub struct ProgressAwareOutput {
    formatter: OutputFormatter,
    bar: Option<ProgressBar>,
}

impl ProgressAwareOutput {
    pub fn new(formatter: OutputFormatter, bar: Option<ProgressBar>) -> Self {
        Self { formatter, bar }
    }

    pub fn suspend_and_print<F>(&self, f: F)
    where
        F: FnOnce(&OutputFormatter),
    {
        match self.bar {
            Some(ref bar) if !bar.is_hidden() => bar.suspend(|| f(&self.formatter)),
            _ => f(&self.formatter),
        }
    }

    pub fn warning(&self, message: &str) {
        self.suspend_and_print(|f| f.warning(message));
    }

    pub fn info(&self, message: &str) {
        self.suspend_and_print(|f| f.info(message));
    }

    pub fn heartbeat(&self, snapshot: &ProgressSnapshot) {
        self.suspend_and_print(|f| f.heartbeat(snapshot));
    }
}
