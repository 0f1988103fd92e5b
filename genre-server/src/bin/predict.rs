//! `genre-predict`: upload a song to a running genre-server.
//!
//! Usage: `genre-predict <file> [--url http://127.0.0.1:8000/predict]`

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use reqwest::blocking::{multipart, Client};
use serde::Deserialize;

const DEFAULT_URL: &str = "http://127.0.0.1:8000/predict";

#[derive(Debug, Deserialize)]
struct Prediction {
    predicted_genre: String,
    confidence: f64,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

struct Args {
    file: PathBuf,
    url: String,
}

fn parse_args() -> Result<Args, String> {
    let mut file: Option<PathBuf> = None;
    let mut url = DEFAULT_URL.to_string();

    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--url" => {
                let Some(v) = it.next() else {
                    return Err("missing value for --url".into());
                };
                url = v;
            }
            "--help" | "-h" => {
                println!("Usage: genre-predict <file> [--url {DEFAULT_URL}]");
                std::process::exit(0);
            }
            other if file.is_none() && !other.starts_with("--") => {
                file = Some(PathBuf::from(other));
            }
            other => return Err(format!("unexpected argument: {other}")),
        }
    }

    let file = file.ok_or_else(|| "missing <file> argument".to_string())?;
    Ok(Args { file, url })
}

fn title_case(label: &str) -> String {
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// `Ok(true)` when the server returned a prediction.
fn run(args: &Args) -> Result<bool> {
    let form = multipart::Form::new()
        .file("file", &args.file)
        .with_context(|| format!("reading {}", args.file.display()))?;
    let response = Client::new()
        .post(&args.url)
        .multipart(form)
        .send()
        .with_context(|| format!("sending request to {}", args.url))?;

    let status = response.status();
    let body = response.bytes().context("reading response body")?;

    if status.is_success() {
        if let Ok(prediction) = serde_json::from_slice::<Prediction>(&body) {
            println!("Predicted genre: {}", title_case(&prediction.predicted_genre));
            println!("Confidence: {:.1}%", prediction.confidence * 100.0);
            return Ok(true);
        }
    }
    match serde_json::from_slice::<ErrorBody>(&body) {
        Ok(err) => eprintln!("Error: {}", err.error),
        Err(_) => eprintln!("Backend error: {}", status.as_u16()),
    }
    Ok(false)
}

fn main() -> ExitCode {
    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{e}");
            eprintln!("Usage: genre-predict <file> [--url {DEFAULT_URL}]");
            return ExitCode::from(2);
        }
    };

    match run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
