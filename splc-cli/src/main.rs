use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use splc::backend::{basic, sim};
use splc::ir::flat::FlatProgram;
use splc::{compile, LowerOptions};
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "splc")]
#[command(about = "Compile SPL to a flat, line-numbered program")]
struct Args {
    /// Path to the source file to compile. Uses a built-in sample if omitted.
    file: Option<PathBuf>,

    /// Emit the flat instruction listing. If none of --flat/--basic/--both is
    /// given, defaults to --basic.
    #[arg(long)]
    flat: bool,

    /// Emit BASIC text
    #[arg(long)]
    basic: bool,

    /// Emit both the flat listing and BASIC text
    #[arg(long)]
    both: bool,

    /// Execute the compiled program and print its output
    #[arg(long)]
    run: bool,

    /// Print a JSON snapshot instead of text
    #[arg(long)]
    json: bool,

    /// Lowering options as JSON; flags below override individual fields
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    max_inline_depth: Option<usize>,

    #[arg(long)]
    line_start: Option<u32>,

    #[arg(long)]
    line_step: Option<u32>,

    /// Keep jumps to the immediately following instruction
    #[arg(long)]
    keep_dead_jumps: bool,

    /// Step budget for --run
    #[arg(long, default_value_t = sim::DEFAULT_STEP_LIMIT)]
    step_limit: usize,

    /// Log pipeline stages to stderr (RUST_LOG overrides)
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Serialize)]
struct Snapshot {
    success: bool,
    error: Option<String>,
    error_kind: Option<String>,
    flat: Option<Vec<String>>,
    basic: Option<Vec<String>>,
    output: Option<Vec<String>>,
}

impl Snapshot {
    fn error(kind: String, message: String) -> Self {
        Self {
            success: false,
            error: Some(message),
            error_kind: Some(kind),
            flat: None,
            basic: None,
            output: None,
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let options = load_options(&args)?;
    tracing::debug!(?options, "lowering options");
    let src = match &args.file {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("Error reading file '{}'", path.display()))?,
        None => DEFAULT_SAMPLE.trim().to_string(),
    };

    // Determine outputs
    let mut want_flat = args.flat;
    let mut want_basic = args.basic;
    if args.both {
        want_flat = true;
        want_basic = true;
    }
    if !want_flat && !want_basic {
        want_basic = true;
    }

    if args.json {
        let snapshot = snapshot(&src, &options, want_flat, want_basic, &args);
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    let program = compile(&src, &options).context("Compilation error")?;

    if want_flat {
        for line in program.to_lines() {
            println!("{line}");
        }
        println!();
    }
    if want_basic {
        print!("{}", basic::write_program(&program));
    }
    if args.run {
        let outcome = sim::run(&program, args.step_limit).context("Run failed")?;
        println!();
        for line in outcome.output {
            println!("{line}");
        }
    }
    Ok(())
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_options(args: &Args) -> Result<LowerOptions> {
    let mut options = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("Error reading config '{}'", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("Invalid config '{}'", path.display()))?
        }
        None => LowerOptions::default(),
    };
    if let Some(depth) = args.max_inline_depth {
        options.max_inline_depth = depth;
    }
    if let Some(start) = args.line_start {
        options.line_start = start;
    }
    if let Some(step) = args.line_step {
        options.line_step = step;
    }
    if args.keep_dead_jumps {
        options.eliminate_dead_jumps = false;
    }
    Ok(options)
}

fn snapshot(src: &str, options: &LowerOptions, want_flat: bool, want_basic: bool, args: &Args) -> Snapshot {
    let program: FlatProgram = match compile(src, options) {
        Ok(p) => p,
        Err(e) => return Snapshot::error(format!("{:?}", e.kind()), e.to_string()),
    };
    let output = if args.run {
        match sim::run(&program, args.step_limit) {
            Ok(outcome) => Some(outcome.output),
            Err(e) => return Snapshot::error("Run".to_string(), e.to_string()),
        }
    } else {
        None
    };
    Snapshot {
        success: true,
        error: None,
        error_kind: None,
        flat: want_flat.then(|| program.to_lines()),
        basic: want_basic.then(|| basic::write_lines(&program.instrs)),
        output,
    }
}

const DEFAULT_SAMPLE: &str = r#"
glob { c }
proc {
  show() { local { } print c }
}
func {
  double(n) { local { } ; return (n plus n) }
}
main {
  var { x }
  x = 5;
  c = double(x);
  show();
  halt
}
"#;
