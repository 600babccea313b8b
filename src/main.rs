use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use miette::{bail, IntoDiagnostic, NamedSource, Report, Result};

use lc3_toolchain::disasm::{self, disassemble, disassemble_lenient};
use lc3_toolchain::runtime::START_PC;
use lc3_toolchain::{AsmError, AsmOptions, Image, OffsetMode, RunState, Status, SymbolTable};

/// Assembler, disassembler and virtual machine for LC3 programs.
#[derive(Parser)]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create binary `.obj` image from a `.asm` file
    Assemble {
        /// `.asm` file to assemble
        name: PathBuf,
        /// Destination to output the image to
        dest: Option<PathBuf>,
        #[command(flatten)]
        flags: AsmFlags,
    },
    /// Check a `.asm` file without outputting binary
    Check {
        /// File to check
        name: PathBuf,
        #[command(flatten)]
        flags: AsmFlags,
    },
    /// Print the instructions of a binary image
    Disas {
        /// Image to disassemble
        name: PathBuf,
        /// Show words that are not instructions as `.FILL` instead of failing
        #[arg(short, long)]
        lenient: bool,
    },
    /// Run text `.asm` or binary image directly and output to terminal
    Run {
        /// `.asm` or image file to run
        name: PathBuf,
        /// Stop after this many instructions
        #[arg(long)]
        max_steps: Option<u64>,
        #[command(flatten)]
        flags: AsmFlags,
    },
    /// Print the labels of a `.asm` file with their addresses
    Symbols {
        /// `.asm` file to read labels from
        name: PathBuf,
    },
}

#[derive(clap::Args)]
struct AsmFlags {
    /// Reject operands that do not fit their field instead of truncating them
    #[arg(long)]
    strict: bool,
    /// How label operands are encoded, defaults to `LC3_OFFSETS` or relative
    #[arg(long, value_enum)]
    offsets: Option<Offsets>,
}

#[derive(Clone, Copy, ValueEnum)]
enum Offsets {
    /// Distance from the next instruction
    Relative,
    /// Offset from the origin
    Absolute,
}

impl From<Offsets> for OffsetMode {
    fn from(value: Offsets) -> Self {
        match value {
            Offsets::Relative => OffsetMode::Relative,
            Offsets::Absolute => OffsetMode::Absolute,
        }
    }
}

impl AsmFlags {
    /// Flags override the environment.
    fn options(&self) -> AsmOptions {
        let env = lc3_toolchain::env::asm_options();
        AsmOptions {
            offsets: self.offsets.map_or(env.offsets, OffsetMode::from),
            strict: self.strict || env.strict,
        }
    }
}

fn main() -> miette::Result<()> {
    use MsgColor::*;
    let args = Args::parse();
    env_logger::init();
    lc3_toolchain::env::init();

    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new() //
                .context_lines(lc3_toolchain::DIAGNOSTIC_CONTEXT_LINES)
                .build(),
        )
    }))?;

    match args.command {
        Command::Assemble { name, dest, flags } => {
            file_message(Green, "Assembling", &name);
            let image = assemble(&name, flags.options())?;
            message(Green, "Finished", "emit binary");

            let dest = dest.unwrap_or_else(|| name.with_extension("obj"));
            fs::write(&dest, image.to_bytes()).into_diagnostic()?;
            file_message(Green, "Saved", &dest);
            Ok(())
        }
        Command::Check { name, flags } => {
            file_message(Green, "Checking", &name);
            let _ = assemble(&name, flags.options())?;
            message(Green, "Success", "no errors found!");
            Ok(())
        }
        Command::Disas { name, lenient } => {
            let image = read_image(&name)?;
            let lines = if lenient {
                disassemble_lenient(&image)
            } else {
                disassemble(&image)?
            };
            print!("{}", disasm::render(&image, &lines));
            Ok(())
        }
        Command::Run {
            name,
            max_steps,
            flags,
        } => run(&name, max_steps, flags.options()),
        Command::Symbols { name } => {
            let src = fs::read_to_string(&name).into_diagnostic()?;
            let (image, symbols) = resolve(&src, AsmOptions::default())
                .map_err(|e| with_source(e, &name, src.clone()))?;
            for (label, sym) in symbols.iter() {
                let addr = image.orig().wrapping_add(sym.offset);
                println!("{label:<20} x{addr:04X} (+{})", sym.offset);
            }
            Ok(())
        }
    }
}

enum MsgColor {
    Green,
    Cyan,
    Red,
}

fn file_message(color: MsgColor, left: &str, right: &Path) {
    let right = format!("target {}", right.display());
    message(color, left, &right);
}

fn message<S>(color: MsgColor, left: S, right: S)
where
    S: Colorize + std::fmt::Display,
{
    let left = match color {
        MsgColor::Green => left.green(),
        MsgColor::Cyan => left.cyan(),
        MsgColor::Red => left.red(),
    };
    println!("{left:>12} {right}");
}

fn run(name: &Path, max_steps: Option<u64>, opts: AsmOptions) -> Result<()> {
    let image = match name.extension().and_then(|ext| ext.to_str()) {
        Some("asm") => {
            file_message(MsgColor::Green, "Assembling", name);
            assemble(name, opts)?
        }
        Some(_) => read_image(name)?,
        None => bail!("File has no extension. Exiting..."),
    };
    if image.orig() != START_PC {
        log::warn!(
            "image loads at x{:04X} but execution starts at x{START_PC:04X}",
            image.orig()
        );
    }

    let mut state = RunState::boot_with(&image, opts.offsets);
    let mut input = io::stdin().lock();
    let mut output = io::stdout().lock();

    message(MsgColor::Green, "Running", "emitted binary");
    let status = match max_steps {
        Some(limit) => state.run_with_limit(&mut input, &mut output, limit)?,
        None => {
            state.run(&mut input, &mut output)?;
            Status::Halted
        }
    };
    match status {
        Status::Halted => println!("\n{:>12}", "Halted".cyan()),
        Status::Running => println!("\n{:>12} step limit reached", "Stopped".red()),
    }

    file_message(MsgColor::Green, "Completed", name);
    Ok(())
}

/// Assemble a source file, attaching the source to any diagnostic.
fn assemble(name: &Path, opts: AsmOptions) -> Result<Image> {
    let src = fs::read_to_string(name).into_diagnostic()?;
    lc3_toolchain::assemble_source(&src, opts).map_err(|e| with_source(e, name, src))
}

fn resolve(src: &str, opts: AsmOptions) -> std::result::Result<(Image, SymbolTable), AsmError> {
    let nodes = lc3_toolchain::parse(src)?;
    let symbols = SymbolTable::resolve(&nodes)?;
    let image = lc3_toolchain::asm::encode(&nodes, &symbols, opts)?;
    Ok((image, symbols))
}

fn read_image(name: &Path) -> Result<Image> {
    let bytes = fs::read(name).into_diagnostic()?;
    Ok(Image::from_bytes(&bytes)?)
}

fn with_source(err: AsmError, name: &Path, src: String) -> Report {
    Report::new(err).with_source_code(NamedSource::new(name.display().to_string(), src))
}
