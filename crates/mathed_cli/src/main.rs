//! mathconv - convert LaTeX math formulas to other notations

use anyhow::{bail, Context, Result};
use clap::Parser;
use mathed::{
    to_latex_fragile, HullType, MathConfig, MathEditor, Point, RecordingPainter, Target,
};
use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "mathconv")]
#[command(version)]
#[command(about = "Convert LaTeX math formulas to LaTeX, MathML and CAS notations", long_about = None)]
struct Cli {
    /// Input file path (reads from stdin if not provided)
    input: Option<PathBuf>,

    /// Output file path (writes to stdout if not provided)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output notation: latex, normalized, maple, mathematica, octave or mathml
    #[arg(short, long, default_value = "latex", value_parser = parse_target)]
    target: Target,

    /// Convert the formula to another hull first (simple, display, equation,
    /// align, eqnarray, gather, multline)
    #[arg(long, value_parser = parse_hull)]
    hull: Option<HullType>,

    /// Write the first cell with `\protect` before fragile commands, without
    /// the hull wrapper (latex target only)
    #[arg(long)]
    fragile: bool,

    /// Print the formula's width, ascent and descent after the conversion
    #[arg(long)]
    metrics: bool,

    /// Print the recorded draw primitives as JSON after the conversion
    #[arg(long)]
    draw: bool,

    /// Layout and color configuration (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn parse_target(name: &str) -> Result<Target, String> {
    Target::from_name(name).ok_or_else(|| {
        let known: Vec<&str> = Target::ALL.iter().map(|t| t.name()).collect();
        format!("unknown target '{}', expected one of {}", name, known.join(", "))
    })
}

fn parse_hull(name: &str) -> Result<HullType, String> {
    match name {
        "simple" | "inline" => Ok(HullType::Simple),
        "display" => Ok(HullType::Equation),
        env => HullType::from_env(env)
            .map(|(hull, _)| hull)
            .ok_or_else(|| format!("unknown hull '{}'", env)),
    }
}

fn read_input(path: Option<&PathBuf>) -> Result<String> {
    match path {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display())),
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("failed to read stdin")?;
            Ok(buffer)
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    if cli.fragile && cli.target != Target::Latex {
        bail!("--fragile only applies to the latex target");
    }

    let config = cli
        .config
        .as_deref()
        .map(MathConfig::load_or_default)
        .unwrap_or_default();
    let source = read_input(cli.input.as_ref())?;
    let mut editor = MathEditor::from_latex(source.trim()).with_config(config);
    tracing::debug!("parsed {:?} formula", editor.formula().hull());
    if let Some(hull) = cli.hull {
        editor.set_hull(hull);
    }

    let mut text = if cli.fragile {
        to_latex_fragile(editor.formula().cell())
    } else {
        editor
            .write(cli.target)
            .with_context(|| format!("failed to write {}", cli.target.name()))?
    };
    text.push('\n');

    if cli.metrics {
        let dim = editor.dim();
        text.push_str(&format!(
            "width={} ascent={} descent={}\n",
            dim.width, dim.ascent, dim.descent
        ));
    }
    if cli.draw {
        let ascent = editor.dim().ascent;
        let mut painter = RecordingPainter::new();
        editor.draw(&mut painter, Point::new(0, ascent));
        let json = serde_json::to_string_pretty(&painter).context("failed to encode primitives")?;
        text.push_str(&json);
        text.push('\n');
    }

    match cli.output {
        Some(path) => fs::write(&path, text)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => io::stdout().write_all(text.as_bytes())?,
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    run(Cli::parse())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_target_names() {
        assert_eq!(parse_target("MathML"), Ok(Target::MathMl));
        assert_eq!(parse_target("octave"), Ok(Target::Octave));
        assert!(parse_target("word").is_err());
    }

    #[test]
    fn test_parse_hull_names() {
        assert_eq!(parse_hull("display"), Ok(HullType::Equation));
        assert_eq!(parse_hull("align"), Ok(HullType::Align));
        assert_eq!(parse_hull("align*"), Ok(HullType::Align));
        assert!(parse_hull("matrix").is_err());
    }

    #[test]
    fn test_cli_arguments() {
        let cli = Cli::try_parse_from(["mathconv", "in.tex", "-t", "maple", "--metrics"]).unwrap();
        assert_eq!(cli.target, Target::Maple);
        assert!(cli.metrics);
        assert_eq!(cli.input, Some(PathBuf::from("in.tex")));
    }
}
