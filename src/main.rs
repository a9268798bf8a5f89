//! unbind - EPUB to single-HTML converter

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;

use unbind::{ConvertOptions, convert_epub};

#[derive(Parser)]
#[command(name = "unbind")]
#[command(version, about = "Convert EPUB ebooks into a single browsable HTML document", long_about = None)]
#[command(after_help = "EXAMPLES:
    unbind book.epub           Convert one archive (resources extracted alongside)
    unbind -s book.epub        Convert to one self-contained HTML file
    unbind ~/books             Convert every .epub in a directory")]
struct Cli {
    /// EPUB file, or a directory of EPUBs to convert in turn
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Inline every resource into a single HTML file
    #[arg(short, long)]
    single_file: bool,

    /// Suppress progress messages
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), String> {
    let options = ConvertOptions {
        single_file: cli.single_file,
    };
    let out_dir = Path::new(".");

    if cli.input.is_file() {
        return convert_one(&cli.input, out_dir, &options, cli.quiet).map_err(|e| e.to_string());
    }

    if cli.input.is_dir() {
        let mut archives: Vec<PathBuf> = std::fs::read_dir(&cli.input)
            .map_err(|e| e.to_string())?
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file() && path.extension().is_some_and(|ext| ext == "epub")
            })
            .collect();
        archives.sort();

        if archives.is_empty() {
            return Err(format!("no .epub archives in {}", cli.input.display()));
        }

        // One archive's failure must not abort the batch.
        for archive in archives {
            if let Err(e) = convert_one(&archive, out_dir, &options, cli.quiet) {
                eprintln!("error: {}: {e}", archive.display());
            }
        }
        return Ok(());
    }

    Err(format!("invalid input path: {}", cli.input.display()))
}

fn convert_one(
    path: &Path,
    out_dir: &Path,
    options: &ConvertOptions,
    quiet: bool,
) -> unbind::Result<()> {
    if !quiet {
        println!("converting {}", path.display());
    }
    let out_path = convert_epub(path, out_dir, options)?;
    if !quiet {
        println!("  wrote {}", out_path.display());
    }
    Ok(())
}
