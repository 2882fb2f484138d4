//! Command line shell
//!
//! Thin front end over [`AppState`]: every command maps onto one store,
//! generator or printing call. Editing commands require the admin password.

use crate::core::{AppState, Config};
use crate::labels::{self, LabelFields, LabelRecord, LabelTag, FIELD_DESCRIPTION, FIELD_NAME};
use crate::printing::{CleanupStatus, MAX_COPIES, PrintRequest};
use crate::utils::{AppError, AppResult};
use clap::{Parser, Subcommand};
use label_printer::{CopyStrategy, Preview, placeholder_image};
use std::io::Read;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Parser)]
#[command(name = "label-station", version, about = "Label printing station")]
pub struct Cli {
    /// Working directory (database, spool files, assets)
    #[arg(long, env = "WORK_DIR", global = true)]
    pub work_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Admin password for add, edit, delete and import
    #[arg(long, env = "ADMIN_PASSWORD", global = true, hide_env_values = true)]
    pub admin_password: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create a label with a newly generated code
    Add {
        /// Material name (headline)
        name: String,
        #[arg(short, long)]
        description: String,
        /// Extra field, repeatable: --field quantity=25kg
        #[arg(short = 'f', long = "field", value_parser = parse_key_val)]
        fields: Vec<(String, String)>,
    },
    /// Import "NAME description" lines from a file ("-" for stdin)
    Import { file: PathBuf },
    /// List all labels
    List,
    /// Search code, name and fields
    Search { query: String },
    /// Show one label
    Show { label: String },
    /// Change fields of a label (the code never changes)
    Edit {
        label: String,
        #[arg(short = 'f', long = "field", value_parser = parse_key_val, required = true)]
        fields: Vec<(String, String)>,
    },
    /// Delete a label
    Delete { label: String },
    /// Print a label silently
    Print {
        label: String,
        #[arg(short = 'n', long, default_value_t = 1,
              value_parser = clap::value_parser!(u32).range(1..=MAX_COPIES as i64))]
        copies: u32,
        /// loop or nx (defaults to COPIES_MODE)
        #[arg(long)]
        mode: Option<CopyStrategy>,
        /// Printer name (defaults to PRINTER_NAME, then the system default)
        #[arg(short, long, env = "PRINTER_NAME")]
        printer: Option<String>,
        /// Secondary tag: scrap or regrind
        #[arg(long)]
        tag: Option<LabelTag>,
    },
    /// Render a label preview to a PNG file
    Preview {
        label: String,
        #[arg(short, long, default_value = "preview.png")]
        output: PathBuf,
        #[arg(long)]
        tag: Option<LabelTag>,
    },
    /// List installed printers
    Printers,
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", s))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty field name in '{}'", s));
    }
    Ok((key.to_string(), value.trim().to_string()))
}

impl Cli {
    /// Apply command line overrides on top of the environment configuration
    pub fn apply(&self, config: &mut Config) {
        if let Some(dir) = &self.work_dir {
            if std::env::var_os("ASSETS_DIR").is_none() {
                config.assets_dir = dir.join("assets");
            }
            config.work_dir = dir.clone();
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
    }
}

/// Run one command against freshly initialised state
///
/// `Ok(false)` means the command failed and already told the operator why.
pub async fn run(cli: Cli, config: Config) -> AppResult<bool> {
    let state = AppState::initialize(&config)?;
    let admin_password = cli.admin_password.as_deref();

    match cli.command {
        Command::Add {
            name,
            description,
            fields,
        } => {
            state.admin.require(admin_password)?;
            let mut all = LabelFields::new();
            all.set(FIELD_NAME, name.trim());
            all.set(FIELD_DESCRIPTION, description.trim());
            for (k, v) in fields {
                all.set(k, v);
            }
            check_required(all.iter())?;
            let record = state.generator.generate(&state.store, all)?;
            state.store.insert(&record)?;
            println!("Added {}", record.code);
            print_record(&record);
        }
        Command::Import { file } => {
            state.admin.require(admin_password)?;
            let text = read_input(&file)?;
            let summary = labels::import_bulk(&state.generator, &state.store, &text)?;
            for record in &summary.added {
                println!("added   {}  {}", record.code, record.name().unwrap_or_default());
            }
            for skipped in &summary.skipped {
                println!(
                    "skipped line {}: {} ({:?})",
                    skipped.line_no, skipped.name, skipped.reason
                );
            }
            println!(
                "{} added, {} skipped",
                summary.added.len(),
                summary.skipped.len()
            );
        }
        Command::List => {
            let records = state.store.list()?;
            print_table(&records);
        }
        Command::Search { query } => {
            let records = state.store.search(&query)?;
            print_table(&records);
        }
        Command::Show { label } => {
            let record = lookup(&state, &label)?;
            print_record(&record);
        }
        Command::Edit { label, fields } => {
            state.admin.require(admin_password)?;
            check_required(fields.iter().map(|(k, v)| (k.as_str(), v.as_str())))?;
            let record = lookup(&state, &label)?;
            let updated = state
                .store
                .update(&record.code, fields.into_iter().collect())?;
            println!("Updated {}", updated.code);
            print_record(&updated);
        }
        Command::Delete { label } => {
            state.admin.require(admin_password)?;
            let record = lookup(&state, &label)?;
            state.store.delete(&record.code)?;
            println!("Deleted {}", record.code);
        }
        Command::Print {
            label,
            copies,
            mode,
            printer,
            tag,
        } => {
            let record = lookup(&state, &label)?;
            let request = PrintRequest {
                code: record.code.clone(),
                copies,
                strategy: mode,
                printer,
                tag,
            };
            return print_label(&state, request).await;
        }
        Command::Preview { label, output, tag } => {
            let record = lookup(&state, &label)?;
            let pdf = state.pipeline.render_preview(&record, tag).await?;
            let preview = state.previewer.preview(&pdf);
            if let Err(e) = std::fs::remove_file(&pdf) {
                tracing::warn!(path = %pdf.display(), error = %e, "preview PDF not removed");
            }

            let raster = match preview {
                Preview::Image(image) => image,
                Preview::Unavailable { reason } => {
                    println!("Preview unavailable: {}", reason);
                    placeholder_image(288, 432)
                }
            };
            raster
                .save_with_format(&output, image::ImageFormat::Png)
                .map_err(|e| AppError::invalid(format!("cannot write {}: {}", output.display(), e)))?;
            println!("Preview written to {}", output.display());
        }
        Command::Printers => {
            let default = label_printer::default_printer()?;
            let printers = label_printer::list_printers()?;
            if printers.is_empty() {
                println!("No printers found.");
            }
            for name in printers {
                let marker = if default.as_deref() == Some(name.as_str()) {
                    "*"
                } else {
                    " "
                };
                println!("{} {}", marker, name);
            }
        }
    }

    Ok(true)
}

/// Queue the job, report the outcome, then wait for the temp PDF cleanup
async fn print_label(state: &AppState, request: PrintRequest) -> AppResult<bool> {
    let shutdown = CancellationToken::new();
    let (queue, worker) = state.start_print_worker(shutdown.clone());

    let copies = request.copies;
    let outcome = queue.print(request).await?;
    let success = outcome.is_success();
    match &outcome.result {
        Ok(report) => println!(
            "Sent {} of {} copies ({} invocation(s))",
            report.copies, copies, report.invocations
        ),
        Err(e) => eprintln!("{}", e.user_message()),
    }

    if let Some(cleanup) = outcome.cleanup {
        println!(
            "Removing {} in {}s...",
            cleanup.path().display(),
            state.config.persist_pdf.as_secs()
        );
        match cleanup.wait().await {
            CleanupStatus::CleanedUp | CleanupStatus::AlreadyGone => {}
            CleanupStatus::Failed(reason) => {
                tracing::warn!(reason = %reason, "temp PDF left behind")
            }
        }
    }

    shutdown.cancel();
    let _ = worker.await;
    Ok(success)
}

/// Name and description can be changed but never left blank
fn check_required<'a>(fields: impl IntoIterator<Item = (&'a str, &'a str)>) -> AppResult<()> {
    for (key, value) in fields {
        if (key == FIELD_NAME || key == FIELD_DESCRIPTION) && value.trim().is_empty() {
            return Err(AppError::invalid(format!("{} must not be empty", key)));
        }
    }
    Ok(())
}

/// Resolve a code, or a material name when no code matches
fn lookup(state: &AppState, label: &str) -> AppResult<LabelRecord> {
    if let Some(record) = state.store.find(label.trim())? {
        return Ok(record);
    }
    state
        .store
        .find_by_name(label)?
        .ok_or_else(|| AppError::not_found(label.trim()))
}

fn read_input(file: &Path) -> AppResult<String> {
    if file.as_os_str() == "-" {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text)?;
        Ok(text)
    } else {
        Ok(std::fs::read_to_string(file)?)
    }
}

fn print_table(records: &[LabelRecord]) {
    if records.is_empty() {
        println!("No labels.");
        return;
    }
    for record in records {
        println!(
            "{:<28} {:<16} {}",
            record.code,
            record.name().unwrap_or_default(),
            record.description().unwrap_or_default()
        );
    }
}

fn print_record(record: &LabelRecord) {
    let created = chrono::DateTime::from_timestamp_millis(record.created_at)
        .map(|t| t.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default();
    println!("code:    {}", record.code);
    println!("created: {}", created);
    for (k, v) in record.fields.iter() {
        println!("{}: {}", k, v);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_print() {
        let cli = Cli::try_parse_from([
            "label-station", "print", "VG0100", "-n", "3", "--mode", "nx", "--tag", "scrap",
        ])
        .unwrap();
        match cli.command {
            Command::Print {
                label,
                copies,
                mode,
                tag,
                ..
            } => {
                assert_eq!(label, "VG0100");
                assert_eq!(copies, 3);
                assert_eq!(mode, Some(CopyStrategy::DuplicatePages));
                assert_eq!(tag, Some(LabelTag::Scrap));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_copies_range() {
        assert!(Cli::try_parse_from(["label-station", "print", "X", "-n", "0"]).is_err());
        assert!(Cli::try_parse_from(["label-station", "print", "X", "-n", "1000"]).is_err());
    }

    #[test]
    fn test_add_requires_description() {
        assert!(Cli::try_parse_from(["label-station", "add", "VG0100"]).is_err());
        assert!(Cli::try_parse_from(["label-station", "add", "VG0100", "-d", "Natural"]).is_ok());
    }

    #[test]
    fn test_blank_name_or_description_rejected() {
        assert!(check_required([("name", "VG0100"), ("description", "Natural")]).is_ok());
        assert!(check_required([("quantity", "")]).is_ok());
        assert!(matches!(
            check_required([("name", " ")]),
            Err(AppError::InvalidRequest(_))
        ));
        assert!(check_required([("name", "VG0100"), ("description", "")]).is_err());
    }

    #[test]
    fn test_key_val() {
        assert_eq!(
            parse_key_val("quantity = 25 kg").unwrap(),
            ("quantity".to_string(), "25 kg".to_string())
        );
        assert!(parse_key_val("novalue").is_err());
        assert!(parse_key_val("=x").is_err());
    }
}
