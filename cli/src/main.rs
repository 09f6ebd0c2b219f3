use clap::Parser;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use dali_compiler::DaliError;

#[derive(Parser)]
#[command(name = "dali")]
#[command(about = "Parses the golden register json document and expands template files", long_about = None)]
struct Cli {
    /// Full path to the register json document file
    #[arg(short, long)]
    input: PathBuf,

    /// Full path to the directory where template files can be found
    #[arg(short, long)]
    templates: PathBuf,

    /// Full directory path to generate output in
    #[arg(short = 'd', long)]
    outdir: PathBuf,
}

fn run(cli: &Cli) -> Result<(), DaliError> {
    // Make sure we can write to the desired output path before doing any work
    let meta = fs::metadata(&cli.outdir).map_err(|_| {
        DaliError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("the directory specified {} does not exist", cli.outdir.display()),
        ))
    })?;
    if !meta.is_dir() || meta.permissions().readonly() {
        return Err(DaliError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            format!("the directory specified {} is not writable", cli.outdir.display()),
        )));
    }

    dali_compiler::run(&cli.input, &cli.templates, &cli.outdir)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_target(false)
        .without_time()
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => {
            println!(
                "Generated output in {} from {}",
                cli.outdir.display(),
                cli.input.display()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            println!("{}", e);
            ExitCode::FAILURE
        }
    }
}
