//! Accuracy/latency report over a labelled fixtures directory.
//!
//! Layout: `<fixtures>/<genre>/<clip>`; the directory name is the expected label.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use genre_core::inference::onnx::OrtExecutionPreference;
use genre_core::{
    Genre, GenreClassifier, ModelHandle, OnnxGenreModel, OnnxModelConfig, PipelineConfig,
};
use serde::Serialize;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "genre_core=warn".into()),
        )
        .init();

    if let Err(e) = run() {
        eprintln!("evaluation failed: {e}");
        std::process::exit(1);
    }
}

#[derive(Debug)]
struct Args {
    fixtures_dir: PathBuf,
    model_path: PathBuf,
    ort_ep: OrtExecutionPreference,
    output: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
struct CaseResult {
    file: String,
    expected: Genre,
    predicted: Option<Genre>,
    confidence: Option<f64>,
    chunks: usize,
    latency_ms: f64,
    error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct GenreSummary {
    genre: Genre,
    files: usize,
    correct: usize,
    accuracy: f64,
    avg_confidence: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
struct Summary {
    fixtures_dir: String,
    model_path: String,
    total_files: usize,
    correct: usize,
    errors: usize,
    accuracy: f64,
    p50_latency_ms: f64,
    p95_latency_ms: f64,
    avg_latency_ms: f64,
    genres: Vec<GenreSummary>,
    cases: Vec<CaseResult>,
}

fn parse_args() -> Result<Args, String> {
    let mut fixtures_dir: Option<PathBuf> = None;
    let mut model_path: Option<PathBuf> = None;
    let mut ort_ep = OrtExecutionPreference::Auto;
    let mut output: Option<PathBuf> = None;

    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--fixtures" => {
                let Some(v) = it.next() else {
                    return Err("missing value for --fixtures".into());
                };
                fixtures_dir = Some(PathBuf::from(v));
            }
            "--model" => {
                let Some(v) = it.next() else {
                    return Err("missing value for --model".into());
                };
                model_path = Some(PathBuf::from(v));
            }
            "--ort-ep" => {
                let Some(v) = it.next() else {
                    return Err("missing value for --ort-ep".into());
                };
                ort_ep = OrtExecutionPreference::parse(&v);
            }
            "--output" => {
                let Some(v) = it.next() else {
                    return Err("missing value for --output".into());
                };
                output = Some(PathBuf::from(v));
            }
            "--help" | "-h" => {
                println!(
                    "Usage: cargo run -p genre-core --bin genre-evaluate -- \\
  --fixtures <dir> [--model <model.onnx>] [--ort-ep auto|cpu] [--output <file.json>]"
                );
                std::process::exit(0);
            }
            other => {
                return Err(format!("unknown argument: {other}"));
            }
        }
    }

    Ok(Args {
        fixtures_dir: fixtures_dir.unwrap_or_else(|| PathBuf::from("fixtures")),
        model_path: model_path.unwrap_or_else(|| OnnxModelConfig::default().model_path),
        ort_ep,
        output,
    })
}

fn collect_cases(dir: &Path) -> Result<Vec<(Genre, PathBuf)>, String> {
    let mut out = Vec::new();
    for genre in Genre::ALL {
        let genre_dir = dir.join(genre.as_str());
        if !genre_dir.is_dir() {
            continue;
        }
        let entries = std::fs::read_dir(&genre_dir).map_err(|e| e.to_string())?;
        for entry in entries {
            let path = entry.map_err(|e| e.to_string())?.path();
            if path.is_file() {
                out.push((genre, path));
            }
        }
    }
    out.sort_by(|a, b| a.1.cmp(&b.1));
    Ok(out)
}

fn percentile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let idx = ((sorted.len() - 1) as f64 * p.clamp(0.0, 1.0)).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

fn summarize(genre: Genre, rows: &[&CaseResult]) -> GenreSummary {
    let correct = rows
        .iter()
        .filter(|r| r.predicted == Some(r.expected))
        .count();
    let confidences: Vec<f64> = rows.iter().filter_map(|r| r.confidence).collect();
    GenreSummary {
        genre,
        files: rows.len(),
        correct,
        accuracy: ratio(correct, rows.len()),
        avg_confidence: if confidences.is_empty() {
            None
        } else {
            Some(confidences.iter().sum::<f64>() / confidences.len() as f64)
        },
    }
}

fn run() -> Result<(), String> {
    let args = parse_args()?;
    if !args.fixtures_dir.exists() {
        return Err(format!(
            "fixtures directory not found: {}",
            args.fixtures_dir.display()
        ));
    }

    let fixtures = collect_cases(&args.fixtures_dir)?;
    if fixtures.is_empty() {
        return Err(format!(
            "no <genre>/<clip> fixtures found in {}",
            args.fixtures_dir.display()
        ));
    }

    println!("Evaluating {} fixtures", fixtures.len());

    let model = OnnxGenreModel::load(OnnxModelConfig {
        model_path: args.model_path.clone(),
        execution: args.ort_ep,
        ..OnnxModelConfig::default()
    })
    .map_err(|e| e.to_string())?;
    let classifier = GenreClassifier::new(ModelHandle::new(model), PipelineConfig::default())
        .map_err(|e| e.to_string())?;
    classifier.warm_up().map_err(|e| e.to_string())?;

    let mut cases = Vec::with_capacity(fixtures.len());
    for (expected, path) in &fixtures {
        let file = path
            .strip_prefix(&args.fixtures_dir)
            .unwrap_or(path)
            .display()
            .to_string();
        let started = Instant::now();
        let outcome = classifier.classify_file(path);
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

        let case = match outcome {
            Ok(prediction) => CaseResult {
                file,
                expected: *expected,
                predicted: Some(prediction.genre),
                confidence: Some(prediction.confidence),
                chunks: prediction.chunk_count,
                latency_ms,
                error: None,
            },
            Err(e) => CaseResult {
                file,
                expected: *expected,
                predicted: None,
                confidence: None,
                chunks: 0,
                latency_ms,
                error: Some(e.to_string()),
            },
        };
        println!(
            "{} expected={} predicted={} {:.1} ms",
            case.file,
            case.expected,
            case.predicted
                .map(|g| g.to_string())
                .unwrap_or_else(|| "error".into()),
            case.latency_ms
        );
        cases.push(case);
    }

    let mut grouped: BTreeMap<usize, Vec<&CaseResult>> = BTreeMap::new();
    for row in &cases {
        grouped.entry(row.expected.index()).or_default().push(row);
    }
    let genres = grouped
        .into_iter()
        .filter_map(|(idx, rows)| Genre::from_index(idx).map(|g| summarize(g, &rows)))
        .collect::<Vec<_>>();

    let latencies = cases.iter().map(|r| r.latency_ms).collect::<Vec<_>>();
    let correct = cases
        .iter()
        .filter(|r| r.predicted == Some(r.expected))
        .count();
    let summary = Summary {
        fixtures_dir: args.fixtures_dir.display().to_string(),
        model_path: args.model_path.display().to_string(),
        total_files: cases.len(),
        correct,
        errors: cases.iter().filter(|r| r.error.is_some()).count(),
        accuracy: ratio(correct, cases.len()),
        p50_latency_ms: percentile(&latencies, 0.50),
        p95_latency_ms: percentile(&latencies, 0.95),
        avg_latency_ms: if latencies.is_empty() {
            0.0
        } else {
            latencies.iter().sum::<f64>() / latencies.len() as f64
        },
        genres,
        cases,
    };

    println!(
        "Done. files={} accuracy={:.1}% p50={:.1}ms p95={:.1}ms",
        summary.total_files,
        summary.accuracy * 100.0,
        summary.p50_latency_ms,
        summary.p95_latency_ms
    );

    let json = serde_json::to_string_pretty(&summary).map_err(|e| e.to_string())?;
    if let Some(out) = args.output {
        if let Some(parent) = out.parent() {
            std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }
        std::fs::write(&out, json).map_err(|e| e.to_string())?;
        println!("Wrote evaluation report: {}", out.display());
    } else {
        println!("{json}");
    }

    Ok(())
}
