use crate::batch::{convert_batch, find_spreadsheets, llm_recommendation, BatchReport, ContextFit};
use crate::config::{Config, DEFAULT_CONSOLIDATED_DIR, DEFAULT_OUTPUT_DIR};
use crate::converter::{convert_workbook, write_workbook_json};
use crate::error::{DigestError, DigestResult};
use crate::merge::{merge_files, write_consolidated_json, MergeReport};
use crate::types::ConsolidatedDocument;
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use walkdir::WalkDir;

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn print_recommendation(tokens: f64) {
    println!("\n{}", "🤖 LLM context fit:".bold().cyan());
    match llm_recommendation(tokens) {
        fit @ ContextFit::Fits(_) => println!("   {}", format!("✅ {}", fit.message()).green()),
        fit @ ContextFit::TooLarge => println!("   {}", format!("⚠️  {}", fit.message()).yellow()),
    }
}

/// Execute the convert command
pub fn convert(file: PathBuf, config: &Config) -> DigestResult<()> {
    println!("{}", "📊 sheetdigest - Converting workbook".bold().green());
    println!("   File: {}", file.display());
    if config.sampling.enabled {
        println!(
            "   Sampling: base rate {}{}",
            config.sampling.base_rate,
            if config.sampling.aggressive { ", aggressive" } else { "" }
        );
    }
    println!();

    let started = Instant::now();
    let options = config.output_options(DEFAULT_OUTPUT_DIR);
    let mut document = convert_workbook(&file, &config.convert_options())?;
    let written = write_workbook_json(&mut document, &file, &options)?;

    for (name, sheet) in &document.sheets {
        println!(
            "   📄 {} ({} rows, {} cells kept)",
            name.bright_blue().bold(),
            sheet.metadata.max_row,
            sheet.cells.len()
        );
    }
    if !document.named_ranges.is_empty() {
        println!("   🏷️  {} named ranges", document.named_ranges.len());
    }

    println!(
        "\n{}",
        format!("✅ Saved {}", written.path.display()).bold().green()
    );
    println!("   Estimated tokens: {}", written.token_count.to_string().bold());
    println!("   Time: {:.2}s", started.elapsed().as_secs_f64());

    print_recommendation(written.token_count as f64);
    Ok(())
}

fn print_batch_outcomes(report: &BatchReport) {
    for outcome in &report.outcomes {
        let name = display_name(&outcome.source);
        match &outcome.result {
            Ok(written) => println!(
                "   {} {} → {} ({} tokens, {:.2}s)",
                "✓".green(),
                name,
                display_name(&written.path),
                written.token_count,
                outcome.elapsed.as_secs_f64()
            ),
            Err(e) => println!("   {} {} - {}", "✗".red(), name, e.to_string().red()),
        }
    }
}

fn run_batch(files: &[PathBuf], config: &Config, output_dir: &Path) -> DigestResult<BatchReport> {
    let mut output = config.output_options(DEFAULT_OUTPUT_DIR);
    output.output_dir = output_dir.to_path_buf();

    println!(
        "{}",
        format!(
            "🔄 Converting {} workbooks with {} jobs",
            files.len(),
            config.jobs
        )
        .cyan()
    );
    let report = convert_batch(files, &config.convert_options(), &output, config.jobs)?;
    print_batch_outcomes(&report);
    Ok(report)
}

/// Execute the batch command
pub fn batch(inputs: Vec<String>, config: &Config) -> DigestResult<()> {
    println!("{}", "📊 sheetdigest - Batch conversion".bold().green());

    let files = find_spreadsheets(&inputs);
    if files.is_empty() {
        println!("{}", "❌ No spreadsheet files found".bold().red());
        return Err(DigestError::NoInputs(format!(
            "no spreadsheet files found in {}",
            inputs.join(", ")
        )));
    }
    println!("   Found {} files\n", files.len());

    let output_dir = config
        .output_options(DEFAULT_OUTPUT_DIR)
        .output_dir;
    let report = run_batch(&files, config, &output_dir)?;

    println!("\n{}", "📋 Batch Summary:".bold().cyan());
    println!("   Converted: {}", report.succeeded().to_string().green());
    if report.failed() > 0 {
        println!("   Failed:    {}", report.failed().to_string().red());
    }
    println!("   Output:    {}", output_dir.display());
    println!("   Time:      {:.2}s", report.elapsed.as_secs_f64());

    match report.average_tokens() {
        Some(average) => {
            println!("   Average tokens: {:.0}", average);
            print_recommendation(average);
            Ok(())
        }
        None => Err(DigestError::NoInputs(
            "no workbook could be converted".to_string(),
        )),
    }
}

/// Existing `*.json` documents directly under `dir`
fn json_documents(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.file_type().is_file()
                && e.path()
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
        })
        .map(|e| e.path().to_path_buf())
        .collect()
}

fn print_merge_summary(
    document: &ConsolidatedDocument,
    report: &MergeReport,
    path: &Path,
    started: Instant,
) {
    for (file, e) in &report.failed {
        println!("   {} {} - {}", "✗".red(), display_name(file), e.to_string().red());
    }

    println!(
        "\n{}",
        format!("✅ Saved {}", path.display()).bold().green()
    );
    println!("\n{}", "📋 Consolidation Summary:".bold().cyan());
    println!("   Workbooks merged:          {}", document.metadata.workbook_count);
    if !report.failed.is_empty() {
        println!(
            "   Skipped documents:         {}",
            report.failed.len().to_string().red()
        );
    }
    println!(
        "   Cross-workbook references: {}",
        document.cross_references.len()
    );
    println!(
        "   Estimated tokens:          {}",
        document.metadata.token_count.to_string().bold()
    );
    println!("   Time:                      {:.2}s", started.elapsed().as_secs_f64());

    print_recommendation(document.metadata.token_count as f64);
}

fn merge_and_write(json_files: &[PathBuf], config: &Config, started: Instant) -> DigestResult<()> {
    println!(
        "{}",
        format!("🔗 Merging {} workbook documents", json_files.len()).cyan()
    );
    let (document, report) = merge_files(json_files, config.key_mode());
    if report.merged.is_empty() {
        for (file, e) in &report.failed {
            println!("   {} {} - {}", "✗".red(), display_name(file), e.to_string().red());
        }
        return Err(DigestError::NoInputs(
            "no workbook document could be read".to_string(),
        ));
    }

    let output = config.output_options(DEFAULT_CONSOLIDATED_DIR);
    let path = write_consolidated_json(&document, &output.output_dir, output.minify)?;
    print_merge_summary(&document, &report, &path, started);
    Ok(())
}

/// Directory holding per-workbook documents for `directory`
pub fn converted_dir_for(directory: &Path) -> PathBuf {
    directory
        .parent()
        .unwrap_or_else(|| Path::new(""))
        .join(DEFAULT_OUTPUT_DIR)
}

/// Execute the combine command: convert a directory, then merge the results
pub fn combine(directory: PathBuf, skip_processing: bool, config: &Config) -> DigestResult<()> {
    println!("{}", "📊 sheetdigest - Combining workbooks".bold().green());
    println!("   Directory: {}\n", directory.display());
    let started = Instant::now();

    if !directory.is_dir() {
        println!("{}", "❌ Directory not found".bold().red());
        return Err(DigestError::InputNotFound(directory));
    }

    let converted_dir = converted_dir_for(&directory);
    let json_files = if skip_processing {
        let existing = json_documents(&converted_dir);
        if existing.is_empty() {
            return Err(DigestError::NoInputs(format!(
                "no existing JSON documents in {}",
                converted_dir.display()
            )));
        }
        println!(
            "   Using {} existing documents from {}",
            existing.len(),
            converted_dir.display()
        );
        existing
    } else {
        let files = find_spreadsheets(&[directory.to_string_lossy().into_owned()]);
        if files.is_empty() {
            return Err(DigestError::NoInputs(format!(
                "no spreadsheet files found in {}",
                directory.display()
            )));
        }
        let report = run_batch(&files, config, &converted_dir)?;
        let written = report.written_paths();
        if written.is_empty() {
            return Err(DigestError::NoInputs(
                "no workbook could be converted".to_string(),
            ));
        }
        println!();
        written
    };

    merge_and_write(&json_files, config, started)?;
    if config.sampling.enabled && !skip_processing {
        println!("   Used intelligent sampling to reduce token count");
    }
    Ok(())
}

/// Execute the merge command on existing workbook documents
pub fn merge(files: Vec<PathBuf>, config: &Config) -> DigestResult<()> {
    println!("{}", "📊 sheetdigest - Merging documents".bold().green());
    println!("   Files: {}\n", files.len());
    merge_and_write(&files, config, Instant::now())
}
