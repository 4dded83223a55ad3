// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Subcommand implementations. Each returns the process exit code.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use markwerk_batch::{
    BatchReport, BatchRunner, ResultStatus, ResultStore, SheetInput, SheetPipeline, SheetResult,
};
use markwerk_core::error::{MarkwerkError, Result};
use markwerk_core::{MarkMatrix, MarkState, PipelineConfig, SheetId};
use markwerk_grading::{AnswerKey, CategoryMap};
use markwerk_vision::RawSheetImage;
use tracing::{info, warn};

use crate::cli::{InitConfigArgs, InspectArgs, ResultsArgs, SampleKeyArgs, ScoreArgs};
use crate::exit_codes;
use crate::services::app_services::AppServices;

const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

// ============ Score Command ============

pub fn run_score(args: &ScoreArgs, services: &AppServices) -> Result<i32> {
    let layout = args.layout.layout()?;
    let config = services.pipeline_config(args.config.as_deref())?;
    let key = AnswerKey::load(&args.key, &layout)?;
    let categories = args
        .categories
        .as_ref()
        .map(|path| CategoryMap::load(path, layout.cols() as usize))
        .transpose()?;

    let paths = collect_images(&args.inputs)?;
    if paths.is_empty() {
        eprintln!("Error: no jpg/jpeg/png sheets found in the given inputs");
        return Ok(exit_codes::INPUT_NOT_FOUND);
    }
    let inputs: Vec<SheetInput> = paths
        .iter()
        .map(|path| SheetInput::from_path(path, args.set.as_deref()))
        .collect();

    let pipeline = SheetPipeline::new(config, layout)?;
    let mut runner = BatchRunner::new(pipeline, key, categories)?;
    if let Some(label) = &args.set {
        runner = runner.with_set_label(label.clone());
    }

    let report = match args.jobs {
        Some(threads) => rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|e| MarkwerkError::Config(format!("worker pool: {e}")))?
            .install(|| runner.run(&inputs)),
        None => runner.run(&inputs),
    };

    let mut store = services.open_store(args.db.as_deref())?;
    for (sheet, first) in repeated_photos(&store, &report)? {
        warn!(sheet = %sheet, same_as = %first, "Photo was already submitted");
    }
    store.record_report(&report)?;

    if let Some(path) = &args.report {
        std::fs::write(path, report.to_json_pretty()?)?;
        info!(path = %path.display(), "batch report written");
    }

    print_report(&report);

    Ok(if report.summary.scored > 0 {
        exit_codes::SUCCESS
    } else {
        exit_codes::NOTHING_SCORED
    })
}

/// Expand files and directories into a list of sheet photos. Directory
/// entries are sorted; a photo reached twice is listed once, at its first
/// position.
pub fn collect_images(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut images = Vec::new();
    let mut seen = HashSet::new();
    let mut push = |path: PathBuf| {
        let identity = std::fs::canonicalize(&path).unwrap_or_else(|_| path.clone());
        if seen.insert(identity) {
            images.push(path);
        }
    };

    for input in inputs {
        if input.is_dir() {
            let mut found = Vec::new();
            for entry in std::fs::read_dir(input)? {
                let path = entry?.path();
                if path.is_file() && is_image(&path) {
                    found.push(path);
                }
            }
            found.sort();
            found.into_iter().for_each(&mut push);
        } else if input.is_file() && is_image(input) {
            push(input.clone());
        } else {
            warn!(path = %input.display(), "skipping input that is not a sheet photo");
        }
    }
    Ok(images)
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

/// Sheets whose photo bytes were seen before, paired with the sheet that
/// first carried them: earlier in the same batch, or in a stored run.
fn repeated_photos(store: &ResultStore, report: &BatchReport) -> Result<Vec<(SheetId, SheetId)>> {
    let mut first_seen: HashMap<&str, &SheetId> = HashMap::new();
    let mut repeats = Vec::new();

    for outcome in &report.outcomes {
        let Some(digest) = outcome.digest.as_deref() else {
            continue;
        };
        if let Some(first) = first_seen.get(digest) {
            repeats.push((outcome.sheet_id.clone(), (*first).clone()));
            continue;
        }
        first_seen.insert(digest, &outcome.sheet_id);
        if let Some(previous) = store.results_with_digest(digest)?.first() {
            repeats.push((outcome.sheet_id.clone(), previous.sheet_id.clone()));
        }
    }
    Ok(repeats)
}

fn print_report(report: &BatchReport) {
    println!("Run {}", report.run_id);
    println!();
    for outcome in &report.outcomes {
        match &outcome.result {
            SheetResult::Scored(record) => {
                let review = if record.anomalies.is_empty() {
                    String::new()
                } else {
                    format!("  ({} to review)", record.anomalies.len())
                };
                println!(
                    "  {:<24} {:>4}/{:<4} {:>6.1}%  weighted {:.2}{}",
                    outcome.sheet_id.as_str(),
                    record.total_score,
                    record.max_score,
                    record.percentage(),
                    record.weighted_score,
                    review
                );
                for subtotal in &record.subtotals {
                    println!("      {:<20} {}", subtotal.label, subtotal.correct);
                }
            }
            SheetResult::Failed(failure) => {
                println!("  {:<24} FAILED  {}", outcome.sheet_id.as_str(), failure.message);
                println!("      {}", failure.suggestion);
            }
        }
    }

    let s = &report.summary;
    println!();
    println!(
        "Sheets: {}  scored: {}  failed: {}  success: {:.1}%",
        s.total_sheets, s.scored, s.failed, s.success_rate
    );
    if let (Some(avg), Some(high), Some(low)) = (s.average_score, s.highest_score, s.lowest_score)
    {
        println!("Average: {avg:.2}  highest: {high}  lowest: {low}");
    }
    println!("Questions flagged for review: {}", s.anomaly_count);
}

// ============ Inspect Command ============

pub fn run_inspect(args: &InspectArgs, services: &AppServices) -> Result<i32> {
    let layout = args.layout.layout()?;
    let config = services.pipeline_config(args.config.as_deref())?;
    let id = args
        .image
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "sheet".into());

    let raw = RawSheetImage::open(SheetId::new(id), &args.image)?;
    let inspection = SheetPipeline::new(config, layout)?.inspect(&raw)?;

    println!("Sheet:        {}", inspection.sheet_id);
    println!("Orientation:  {:?}", inspection.orientation);
    match inspection.ink_level {
        Some(level) => println!("Ink level:    {level}"),
        None => println!("Ink level:    none (blank sheet)"),
    }
    let st = &inspection.statistics;
    println!(
        "Bubbles:      {} marked, {} faint of {} ({:.1}% filled)",
        st.marked_bubbles,
        st.faint_bubbles,
        st.total_bubbles,
        st.fill_rate * 100.0
    );
    println!(
        "Rows:         {} with several marks, {} with none",
        st.multiple_mark_rows, st.unmarked_rows
    );
    println!();
    print!("{}", render_matrix(&inspection.matrix));

    Ok(exit_codes::SUCCESS)
}

/// One line per question: `X` marked, `?` faint, `.` empty.
pub fn render_matrix(matrix: &MarkMatrix) -> String {
    let mut out = String::new();
    for row in 0..matrix.rows() {
        let cells: Vec<&str> = matrix
            .row(row)
            .iter()
            .map(|cell| match cell.state {
                MarkState::Marked => "X",
                MarkState::Ambiguous => "?",
                MarkState::Unmarked => ".",
            })
            .collect();
        out.push_str(&format!("Q{:<4} {}\n", row + 1, cells.join(" ")));
    }
    out
}

// ============ Key / Config Commands ============

pub fn run_sample_key(args: &SampleKeyArgs) -> Result<i32> {
    let layout = args.layout.layout()?;
    let key = AnswerKey::sample(&layout);
    std::fs::write(&args.output, key.to_json_pretty()?)?;
    println!(
        "Wrote a {}-question sample key to {}",
        key.rows(),
        args.output.display()
    );
    Ok(exit_codes::SUCCESS)
}

pub fn run_init_config(args: &InitConfigArgs) -> Result<i32> {
    PipelineConfig::default().save(&args.output)?;
    println!("Wrote default configuration to {}", args.output.display());
    Ok(exit_codes::SUCCESS)
}

// ============ Results Command ============

pub fn run_results(args: &ResultsArgs, services: &AppServices) -> Result<i32> {
    let store = services.open_store(args.db.as_deref())?;
    let results = match &args.run {
        Some(run_id) => store.results_for_run(run_id)?,
        None => store.all_results()?,
    };

    if results.is_empty() {
        println!("No stored results.");
        return Ok(exit_codes::SUCCESS);
    }

    for r in &results {
        let detail = match r.status {
            ResultStatus::Scored => format!(
                "{}/{}  weighted {:.2}",
                r.total_score.unwrap_or(0),
                r.max_score.unwrap_or(0),
                r.weighted_score.unwrap_or(0.0)
            ),
            ResultStatus::Failed => format!(
                "failed ({})",
                r.error_kind.as_deref().unwrap_or("unknown")
            ),
        };
        println!(
            "{}  {}  {:<24} {}",
            r.processed_at.format("%Y-%m-%d %H:%M"),
            r.run_id,
            r.sheet_id.as_str(),
            detail
        );
    }
    Ok(exit_codes::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use markwerk_batch::{BatchSummary, SheetFailure, SheetOutcome};

    #[test]
    fn directories_expand_to_sorted_images() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.png", "a.JPG", "notes.txt", "c.jpeg"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }

        let images = collect_images(&[dir.path().to_path_buf()]).unwrap();
        let names: Vec<_> = images
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["a.JPG", "b.png", "c.jpeg"]);
    }

    #[test]
    fn photo_named_twice_is_collected_once() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a.png", "b.png"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        let single = dir.path().join("b.png");
        let dotted = dir.path().join(".").join("a.png");

        let images =
            collect_images(&[single.clone(), dir.path().to_path_buf(), dotted]).unwrap();
        assert_eq!(images, [single, dir.path().join("a.png")]);
    }

    fn outcome(id: &str, digest: Option<&str>) -> SheetOutcome {
        SheetOutcome {
            sheet_id: SheetId::new(id),
            source: format!("{id}.png"),
            digest: digest.map(str::to_string),
            result: SheetResult::Failed(SheetFailure {
                kind: "geometry".into(),
                message: "sheet boundary not found".into(),
                suggestion: String::new(),
                resubmit: true,
            }),
        }
    }

    fn report(outcomes: Vec<SheetOutcome>) -> BatchReport {
        BatchReport {
            run_id: uuid::Uuid::new_v4(),
            set_label: None,
            summary: BatchSummary::from_outcomes(&outcomes),
            outcomes,
        }
    }

    #[test]
    fn repeated_photo_within_a_batch_is_reported() {
        let store = ResultStore::open_in_memory().unwrap();
        let batch = report(vec![
            outcome("a", Some("d1")),
            outcome("b", Some("d2")),
            outcome("c", Some("d1")),
            outcome("d", None),
        ]);

        let repeats = repeated_photos(&store, &batch).unwrap();
        assert_eq!(repeats, [(SheetId::new("c"), SheetId::new("a"))]);
    }

    #[test]
    fn repeated_photo_from_an_earlier_run_is_reported() {
        let mut store = ResultStore::open_in_memory().unwrap();
        store.record_report(&report(vec![outcome("old", Some("d1"))])).unwrap();

        let batch = report(vec![outcome("new", Some("d1")), outcome("other", Some("d2"))]);
        let repeats = repeated_photos(&store, &batch).unwrap();
        assert_eq!(repeats, [(SheetId::new("new"), SheetId::new("old"))]);
    }

    #[test]
    fn missing_inputs_are_skipped() {
        let images = collect_images(&[PathBuf::from("/nonexistent/sheet.png")]).unwrap();
        assert!(images.is_empty());
    }

    #[test]
    fn matrix_renders_one_line_per_question() {
        let matrix = MarkMatrix::from_selections(3, &[vec![0], vec![], vec![1, 2]]).unwrap();
        assert_eq!(render_matrix(&matrix), "Q1    X . .\nQ2    . . .\nQ3    . X X\n");
    }
}
