use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use clap::Subcommand;
use env_logger::Builder;
use log::{debug, info};
use memmap2::Mmap;

use rox::ast_printer::AstPrinter;
use rox::error::LoxError;
use rox::interpreter::Interpreter;
use rox::parser::Parser;
use rox::resolver::Resolver;
use rox::scanner::{scan_all, Scanner};
use rox::token::Token;

/// Exit code for scan, parse and resolve errors.
const EXIT_STATIC_ERROR: i32 = 65;

/// Exit code for runtime errors.
const EXIT_RUNTIME_ERROR: i32 = 70;

#[derive(ClapParser, Debug)]
#[command(version, about = "Lox language interpreter", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    commands: Commands,

    /// Enable logging to app.log
    #[arg(long, global = true)]
    log: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Tokenizes input from a file, printing each token
    Tokenize {
        filename: Option<PathBuf>,

        /// Print the tokens as a JSON array instead of one per line
        #[arg(long)]
        json: bool,
    },

    /// Parses input from a file as a single expression and prints its AST
    Parse { filename: Option<PathBuf> },

    /// Evaluates input from a file as a single expression and prints the result
    Evaluate { filename: Option<PathBuf> },

    /// Runs input from a file as a Lox program
    Run { filename: Option<PathBuf> },
}

impl Commands {
    fn filename(&self) -> Option<&PathBuf> {
        match self {
            Commands::Tokenize { filename, .. }
            | Commands::Parse { filename }
            | Commands::Evaluate { filename }
            | Commands::Run { filename } => filename.as_ref(),
        }
    }
}

/// Maps a source file into memory.
fn map_file(filename: &Path) -> Result<Mmap> {
    info!("Mapping file: {:?}", filename);

    let file = File::open(filename).context(format!("Failed to open file {:?}", filename))?;

    // SAFETY: the map is read-only and the file is not expected to change
    // while the interpreter runs.
    let mmap = unsafe { Mmap::map(&file) }
        .context(format!("Failed to map file {:?}", filename))?;

    info!("Mapped {} bytes from {:?}", mmap.len(), filename);

    Ok(mmap)
}

fn source_text(mmap: &Mmap) -> Result<&str> {
    std::str::from_utf8(mmap)
        .map_err(LoxError::from)
        .context("Source is not valid UTF-8")
}

fn init_logger() -> Result<()> {
    let log_file = File::create("app.log").context("Failed to create app.log")?;

    Builder::new()
        .format(|buf, record| {
            let module = record
                .module_path()
                .unwrap_or("<unnamed>")
                .strip_prefix("rox::")
                .unwrap_or(record.module_path().unwrap_or("<unnamed>"));
            writeln!(
                buf,
                "[{}:{}] - {}",
                module,
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .filter(None, log::LevelFilter::Debug)
        .parse_default_env()
        .init();

    info!("Logger initialized, writing to app.log");
    Ok(())
}

/// Print every diagnostic and leave with `code`.
fn fail(errors: &[LoxError], code: i32) -> ! {
    for e in errors {
        debug!("Reporting: {}", e);
        eprintln!("{}", e);
    }

    std::process::exit(code);
}

fn no_input() {
    info!("No filepath provided");
    println!("No input filepath was provided. Exiting...");
}

fn tokenize(source: &str, json: bool) -> Result<()> {
    let mut tokens: Vec<Token<'_>> = Vec::new();
    let mut tokenized = true;

    for token in Scanner::new(source) {
        match token {
            Ok(token) => {
                debug!("Scanned token: {}", token);

                if !json {
                    println!("{}", token);
                }
                tokens.push(token);
            }

            Err(e) => {
                tokenized = false;

                debug!("Tokenization debug: {}", e);

                eprintln!("{}", e);
            }
        }
    }

    if json {
        let rendered = serde_json::to_string_pretty(&tokens).context("Failed to encode tokens")?;
        println!("{}", rendered);
    }

    if !tokenized {
        debug!("Tokenization failed, exiting with code {}", EXIT_STATIC_ERROR);

        std::process::exit(EXIT_STATIC_ERROR);
    }

    info!("Tokenization completed successfully");
    Ok(())
}

fn parse(source: &str) -> Result<()> {
    let tokens = scan_all(source).unwrap_or_else(|errors| fail(&errors, EXIT_STATIC_ERROR));
    let mut parser = Parser::new(&tokens);

    match parser.parse_expression() {
        Ok(expr) => {
            let ast_str = AstPrinter::print(&expr);

            debug!("AST: {}", ast_str);
            println!("{}", ast_str);
        }

        Err(e) => fail(&[e], EXIT_STATIC_ERROR),
    }

    info!("Parse subcommand completed");
    Ok(())
}

fn evaluate(source: &str) -> Result<()> {
    let tokens = scan_all(source).unwrap_or_else(|errors| fail(&errors, EXIT_STATIC_ERROR));
    let mut parser = Parser::new(&tokens);

    let expr = match parser.parse_expression() {
        Ok(expr) => expr,
        Err(e) => fail(&[e], EXIT_STATIC_ERROR),
    };

    let mut interpreter = Interpreter::new();

    match interpreter.evaluate(&expr) {
        Ok(value) => {
            debug!("Evaluated to: {}", value);
            println!("{}", value);
        }

        Err(e) => fail(&[e], EXIT_RUNTIME_ERROR),
    }

    info!("Evaluate subcommand completed");
    Ok(())
}

fn run(source: &str) -> Result<()> {
    info!("Provided input:\n {}", source);

    let tokens = scan_all(source).unwrap_or_else(|errors| fail(&errors, EXIT_STATIC_ERROR));
    let mut parser = Parser::new(&tokens);

    let statements = parser
        .parse()
        .unwrap_or_else(|errors| fail(&errors, EXIT_STATIC_ERROR));

    info!("Parsed {} statements", statements.len());

    let mut interpreter = Interpreter::new();

    let locals = Resolver::with_globals(interpreter.global_names())
        .resolve(&statements)
        .unwrap_or_else(|errors| fail(&errors, EXIT_STATIC_ERROR));

    interpreter.resolve(locals);

    match interpreter.interpret(&statements) {
        Ok(()) => info!("Program executed successfully"),
        Err(e) => fail(&[e], EXIT_RUNTIME_ERROR),
    }

    Ok(())
}

fn main() -> Result<()> {
    let args: Cli = Cli::parse();

    if args.log {
        init_logger()?;
    } else {
        // Keeps the log macros quiet without a "no logger" fallback.
        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Off)
            .init();
    }

    info!("CLI arguments: {:?}", args);

    let Some(filename) = args.commands.filename() else {
        no_input();
        return Ok(());
    };

    let mmap = map_file(filename)?;
    let source = source_text(&mmap)?;

    match &args.commands {
        Commands::Tokenize { json, .. } => tokenize(source, *json),
        Commands::Parse { .. } => parse(source),
        Commands::Evaluate { .. } => evaluate(source),
        Commands::Run { .. } => run(source),
    }
}
