use clap::Parser;
use idsift::{
    Cli, IdSift, IdSiftError, OutputFormatter, OutputMode, StopReason, UserFriendlyError,
};
use std::process;

#[tokio::main]
async fn main() {
    let exit_code = run().await;
    process::exit(exit_code);
}

async fn run() -> i32 {
    let cli = Cli::parse();

    // Handle special commands first
    if cli.generate_config {
        return handle_generate_config(&cli);
    }

    let idsift = match IdSift::from_cli(&cli) {
        Ok(idsift) => idsift,
        Err(e) => {
            print_startup_error(&e);
            return exit_code_for(&e);
        }
    };

    idsift::logging::init(&idsift.config().logging, cli.verbose, cli.quiet);
    tracing::debug!(version = idsift::version_info(), "idsift starting");

    if cli.dry_run {
        return handle_dry_run(&idsift);
    }

    match idsift.run().await {
        Ok(report) => {
            idsift.output_formatter().print_extraction_report(&report);

            // Missing IDs and skipped partitions are diagnostics, not failures
            match report.stop_reason {
                StopReason::Interrupted => 130,
                StopReason::AllFound | StopReason::Exhausted => 0,
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "run failed");
            idsift.handle_error(&e);
            exit_code_for(&e)
        }
    }
}

fn exit_code_for(error: &IdSiftError) -> i32 {
    match error {
        IdSiftError::Cancelled => 130, // Interrupted (SIGINT)
        IdSiftError::EmptyTargetSet { .. } => 3,
        IdSiftError::NoPartitions { .. } => 4,
        IdSiftError::Io(_) | IdSiftError::CheckpointWrite { .. } | IdSiftError::Json(_) => 5,
        e if e.is_configuration() => 2,
        _ => 1,
    }
}

fn handle_generate_config(cli: &Cli) -> i32 {
    let config_path = cli
        .config
        .as_ref()
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|| "idsift.toml".to_string());

    match IdSift::generate_sample_config(&config_path) {
        Ok(()) => {
            println!("Generated sample configuration file: {}", config_path);
            println!("\nTo use this configuration:");
            println!("  idsift --config {}", config_path);
            println!("\nEdit the file to point [source].location at your partitions.");
            0
        }
        Err(e) => {
            eprintln!("Failed to generate configuration file: {}", e.user_message());
            if let Some(suggestion) = e.suggestion() {
                eprintln!("Suggestion: {}", suggestion);
            }
            exit_code_for(&e)
        }
    }
}

fn handle_dry_run(idsift: &IdSift) -> i32 {
    let formatter = idsift.output_formatter();
    let config = idsift.config();

    formatter.print_header("Dry run");
    formatter.info("Nothing will be written");
    formatter.print_separator();

    formatter.info("Configuration that would be used:");
    println!("  Source: {}", config.source.location);
    println!("  Extensions: {}", config.source.extensions.join(", "));
    println!("  Exclude patterns: {}", config.source.exclude_patterns.join(", "));
    println!("  ID field: {}", config.source.id_field);
    println!("  Workload: {}", config.run.workload_path.display());
    println!("  Output: {}", config.output.output_path.display());
    println!("  Checkpoint: {}", config.output.checkpoint_path.display());
    println!("  Resume: {}", config.run.resume);
    println!("  Heartbeat: {}s", config.heartbeat_interval().as_secs());

    formatter.print_separator();

    let preview = match idsift.preview() {
        Ok(preview) => preview,
        Err(e) => {
            idsift.handle_error(&e);
            return exit_code_for(&e);
        }
    };

    formatter.info("Extraction plan:");
    println!(
        "  Target IDs: {} ({} values dropped)",
        preview.target_ids, preview.load_statistics.values_dropped
    );
    if config.run.resume {
        println!("  Already extracted: {}", preview.already_found);
        println!(
            "  Resume after: {}",
            preview.resume_after.as_deref().unwrap_or("(start)")
        );
        println!("  Partitions to retry: {}", preview.retry_partitions);
    }
    println!("  Partitions to scan: {}", preview.pending_partitions);
    print!("{}", preview.partitions.display_summary());

    formatter.print_separator();
    formatter.success("Dry run completed successfully");
    formatter.info("Run without --dry-run to perform the extraction");

    0
}

fn print_startup_error(error: &IdSiftError) {
    let formatter = OutputFormatter::new(OutputMode::Human, 0, false);
    formatter.print_user_friendly_error(error);
}

#[cfg(test)]
mod tests {
    use super::*;
    use idsift::Config;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_generate_config_command() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let cli = Cli::try_parse_from([
            "idsift",
            "--generate-config",
            "--config",
            config_path.to_str().unwrap(),
        ])
        .unwrap();

        assert_eq!(handle_generate_config(&cli), 0);
        let content = fs::read_to_string(&config_path).unwrap();
        assert!(content.contains("[source]"));
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(exit_code_for(&IdSiftError::Cancelled), 130);
        assert_eq!(
            exit_code_for(&IdSiftError::EmptyTargetSet {
                path: PathBuf::from("q.json")
            }),
            3
        );
        assert_eq!(
            exit_code_for(&IdSiftError::NoPartitions {
                location: "/data".to_string(),
                searched_extensions: vec![],
            }),
            4
        );
        assert_eq!(
            exit_code_for(&IdSiftError::Config {
                message: "bad".to_string()
            }),
            2
        );
        assert_eq!(
            exit_code_for(&IdSiftError::CheckpointWrite {
                path: PathBuf::from("state.json"),
                reason: "disk full".to_string(),
            }),
            5
        );
        assert_eq!(exit_code_for(&IdSiftError::partition_read("a", "b")), 1);
    }

    #[test]
    fn test_dry_run_mode() {
        let temp_dir = TempDir::new().unwrap();
        let data = temp_dir.path().join("data");
        fs::create_dir(&data).unwrap();
        fs::write(data.join("part-0.jsonl"), "{\"id\": 1}\n").unwrap();
        fs::write(temp_dir.path().join("q.json"), r#"{"q": [1]}"#).unwrap();

        let mut config = Config::default();
        config.source.location = data.display().to_string();
        config.run.workload_path = temp_dir.path().join("q.json");
        config.output.output_path = temp_dir.path().join("out.jsonl");
        config.output.checkpoint_path = temp_dir.path().join("state.json");

        let idsift = IdSift::new_for_test(config, OutputMode::Plain, 0, true);
        assert_eq!(handle_dry_run(&idsift), 0);
        assert!(!temp_dir.path().join("out.jsonl").exists());
    }

    #[test]
    fn test_dry_run_with_missing_source() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("q.json"), r#"{"q": [1]}"#).unwrap();

        let mut config = Config::default();
        config.source.location = temp_dir.path().join("absent").display().to_string();
        config.run.workload_path = temp_dir.path().join("q.json");

        let idsift = IdSift::new_for_test(config, OutputMode::Plain, 0, true);
        assert_eq!(handle_dry_run(&idsift), 4);
    }
}
