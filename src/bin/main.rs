use clap::Parser;
use crossterm::execute;
use crossterm::style::{Attribute, Color, Print, ResetColor, SetAttribute, SetForegroundColor};
use serde::Deserialize;
use std::collections::HashMap;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use swipe_core::{Config, GesturePath, GestureSample, KeyBounds, PredictionOutcome, SwipeEngine};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Reads swipe gestures as JSON lines on stdin and prints ranked word predictions.
#[derive(Parser, Debug)]
#[command(name = "swipe_engine", version)]
struct Args {
    /// Newline-delimited word list, most frequent first
    #[arg(long)]
    vocab: Option<PathBuf>,

    /// Compiled vocabulary snapshot; created from --vocab when missing
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// JSON config overriding the built-in defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Keyboard width in pixels
    #[arg(long, default_value_t = 1080.0)]
    width: f32,

    /// Keyboard height in pixels
    #[arg(long, default_value_t = 720.0)]
    height: f32,

    /// How many predictions to print per gesture
    #[arg(long, default_value_t = 5)]
    top: usize,
}

/// `{"points": [[x, y, t_ms], ...]}` or just the bare array.
#[derive(Deserialize)]
#[serde(untagged)]
enum GestureLine {
    Object { points: Vec<(f32, f32, u64)> },
    Bare(Vec<(f32, f32, u64)>),
}

impl GestureLine {
    fn into_samples(self) -> Vec<GestureSample> {
        let points = match self {
            GestureLine::Object { points } | GestureLine::Bare(points) => points,
        };
        points.into_iter().map(|(x, y, t)| GestureSample::new(x, y, t)).collect()
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "swipe_core=info,swipe_engine=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    let engine = SwipeEngine::from_sources(config, args.vocab.as_deref(), args.snapshot.as_deref());
    let orchestrator = engine.orchestrator();
    let layout = scaled_layout(&engine, args.width, args.height);
    orchestrator.set_key_bounds(&layout, args.width, args.height);
    info!(width = args.width, height = args.height, "ready for gestures");

    let mut stdout = io::stdout();
    for line in io::stdin().lock().lines() {
        let line = line?;
        let input = line.trim();
        match input {
            "" => continue,
            ":quit" => break,
            ":stats" => {
                let stats = serde_json::json!({
                    "predictions": orchestrator.stats(),
                    "cache": orchestrator.cache_stats(),
                    "vocabulary": orchestrator.ranker().stats(),
                });
                writeln!(stdout, "{}", stats)?;
                continue;
            }
            ":clear" => {
                orchestrator.clear_cache();
                orchestrator.reset_stats();
                writeln!(stdout, "cache and stats cleared")?;
                continue;
            }
            _ => {}
        }

        let samples = match serde_json::from_str::<GestureLine>(input) {
            Ok(gesture) => gesture.into_samples(),
            Err(e) => {
                warn!(error = %e, "ignoring malformed gesture line");
                continue;
            }
        };
        let path = match GesturePath::new(samples) {
            Ok(path) => path,
            Err(e) => {
                warn!(error = %e, "ignoring invalid gesture");
                continue;
            }
        };
        let outcome = orchestrator.submit(path).outcome().await;
        print_outcome(&mut stdout, &outcome, args.top)?;
    }

    if let Err(e) = engine.save_vocabulary() {
        warn!(error = %e, "could not save vocabulary snapshot");
    }
    Ok(())
}

/// The built-in QWERTY layout expressed in pixels of the requested keyboard.
fn scaled_layout(engine: &SwipeEngine, width: f32, height: f32) -> HashMap<char, KeyBounds> {
    let model = engine.orchestrator().key_model();
    ('a'..='z')
        .filter_map(|c| model.key_info(c).map(|info| (c, info)))
        .map(|(c, info)| {
            let (cx, cy) = (info.center.x * width, info.center.y * height);
            let (hw, hh) = (info.width * width / 2.0, info.height * height / 2.0);
            (c, KeyBounds::new(cx - hw, cy - hh, cx + hw, cy + hh))
        })
        .collect()
}

fn print_outcome(stdout: &mut io::Stdout, outcome: &PredictionOutcome, top: usize) -> io::Result<()> {
    match outcome {
        PredictionOutcome::Completed(predictions) if predictions.is_empty() => {
            execute!(stdout, SetForegroundColor(Color::DarkGrey), Print("(no predictions)\n"), ResetColor)
        }
        PredictionOutcome::Completed(predictions) => {
            for (i, p) in predictions.iter().take(top).enumerate() {
                if i == 0 {
                    execute!(stdout, SetAttribute(Attribute::Bold), SetForegroundColor(Color::Green))?;
                }
                execute!(
                    stdout,
                    Print(format!("{:>2}. {:<16} {:.4}\n", i + 1, p.word, p.score)),
                    SetAttribute(Attribute::Reset),
                    ResetColor
                )?;
            }
            Ok(())
        }
        PredictionOutcome::Cancelled => {
            execute!(stdout, SetForegroundColor(Color::Yellow), Print("(cancelled)\n"), ResetColor)
        }
        PredictionOutcome::Failed(e) => {
            execute!(stdout, SetForegroundColor(Color::Red), Print(format!("error: {}\n", e)), ResetColor)
        }
    }
}
