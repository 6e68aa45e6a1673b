//! The Weft resolver driver.
//!
//! Reads declarations and expressions, resolves each expression to its
//! minimum-cost typed interpretation, and prints the result or the
//! reason there is none. Filters partition the outcomes instead,
//! printing the input form of the expressions each one keeps.

use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, ValueEnum};
use weft_resolve::resolver::{ResolveFailure, Resolver, SearchDir};
use weft_resolve::ConversionGraph;

#[derive(Parser)]
#[command(name = "weftc", about = "Minimum-cost overload resolution for Weft inputs")]
struct Cli {
    /// Echo input lines among the output
    #[arg(short, long, conflicts_with_all = ["quiet", "test"])]
    verbose: bool,

    /// Resolve without printing interpretations
    #[arg(short, long, conflicts_with = "test")]
    quiet: bool,

    /// Deterministic output for test scripts (no environments or
    /// variable instance ids)
    #[arg(long)]
    test: bool,

    /// Print the input form of the expressions the filter keeps,
    /// instead of resolutions
    #[arg(long, value_enum)]
    filter: Option<Filter>,

    /// Append a final CSV line: n_decls,n_exprs,runtime_ms
    #[arg(long)]
    bench: bool,

    /// Interpretation search direction
    #[arg(long, value_enum, default_value = "td")]
    dir: Dir,

    /// Input file; stdin if omitted
    input: Option<PathBuf>,

    /// Output file; stdout if omitted
    output: Option<PathBuf>,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Filter {
    /// Keep only expressions with a unique valid resolution
    Invalid,
    /// Keep only expressions whose resolution is ambiguous
    Unambiguous,
    /// Keep only expressions with no resolution (invalid or unbound)
    Resolvable,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Dir {
    /// Top-down: expected types flow from the caller
    Td,
    /// Bottom-up: argument combinations are enumerated first
    Bu,
}

fn run(cli: &Cli) -> io::Result<i32> {
    let src = match &cli.input {
        Some(path) => fs::read_to_string(path)?,
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    let mut out: Box<dyn Write> = match &cli.output {
        Some(path) => Box::new(fs::File::create(path)?),
        None => Box::new(io::stdout().lock()),
    };

    let program = match weft_parser::parse_input(&src) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("{e}");
            return Ok(1);
        }
    };

    if cli.verbose {
        out.write_all(src.as_bytes())?;
    }

    let conversions = ConversionGraph::make_conversions(program.types.iter());
    let dir = match cli.dir {
        Dir::Td => SearchDir::TopDown,
        Dir::Bu => SearchDir::BottomUp,
    };
    let mut resolver = Resolver::new(&conversions, &program.funcs, dir);

    let start = Instant::now();
    for expr in &program.exprs {
        let result = resolver.resolve_expr(expr);

        if cli.quiet {
            continue;
        }

        match cli.filter {
            None => {
                writeln!(out)?;
                match result {
                    Ok(i) => {
                        if cli.test {
                            writeln!(out, "{}", i.test_style())?;
                        } else {
                            writeln!(out, "{i}")?;
                        }
                    }
                    Err(ResolveFailure::Invalid) => {
                        writeln!(out, "ERROR: no valid resolution for {expr}")?;
                    }
                    Err(ResolveFailure::Ambiguous(alts)) => {
                        writeln!(out, "ERROR: ambiguous resolution for {expr}")?;
                        writeln!(out, "       candidates are:")?;
                        for alt in alts {
                            if cli.test {
                                writeln!(out, "{}", alt.test_style())?;
                            } else {
                                writeln!(out, "{alt}")?;
                            }
                        }
                    }
                    Err(ResolveFailure::Unbound(classes)) => {
                        write!(out, "ERROR: unbound type variables in {expr}:")?;
                        for c in classes {
                            write!(out, " {c}")?;
                        }
                        writeln!(out)?;
                    }
                }
            }
            Some(filter) => {
                let keep = match filter {
                    Filter::Invalid => result.is_ok(),
                    Filter::Unambiguous => matches!(result, Err(ResolveFailure::Ambiguous(_))),
                    Filter::Resolvable => matches!(
                        result,
                        Err(ResolveFailure::Invalid) | Err(ResolveFailure::Unbound(_))
                    ),
                };
                if keep {
                    writeln!(out, "{expr}")?;
                }
            }
        }
    }
    let elapsed = start.elapsed().as_millis();

    if cli.bench {
        writeln!(out, "{},{},{}", program.funcs.len(), program.exprs.len(), elapsed)?;
    }

    Ok(0)
}

fn main() {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("weftc: {e}");
            std::process::exit(1);
        }
    }
}
