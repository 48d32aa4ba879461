use anyhow::Result;
use bitpatch::areas::repository::Repository;
use bitpatch::artifacts::diff::options::{DEFAULT_CONTEXT_LINES, DiffFlags, DiffOptions};
use clap::{Args, Parser, Subcommand};
use std::io::Write;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "bitpatch",
    version = "0.1.0",
    author = "Sami Barbut-Dica",
    about = "Line diffs and patches between blobs and working tree files",
    long_about = "Compare two versions of a file, each either a blob stored in the \
    repository's object database or a path in the working tree, and print \
    the result as a unified patch or as per-hunk statistics.",
    help_template = r"
{name} {version} - {about}

USAGE:
    {usage}

OPTIONS:
    {all-args}
",
)]
struct Cli {
    #[arg(short, long, global = true, help = "Log diff internals to stderr")]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct DiffArgs {
    #[arg(index = 1, help = "The old side: a blob ID or a path")]
    old: String,
    #[arg(index = 2, help = "The new side: a blob ID or a path")]
    new: String,
    #[arg(
        short = 'U',
        long = "unified",
        default_value_t = DEFAULT_CONTEXT_LINES,
        help = "Lines of context around each change"
    )]
    unified: usize,
    #[arg(
        long = "inter-hunk-context",
        default_value_t = 0,
        help = "Merge hunks separated by at most this many lines"
    )]
    inter_hunk_context: usize,
    #[arg(short = 'a', long, help = "Treat all files as text")]
    text: bool,
    #[arg(short = 'w', long, help = "Ignore all whitespace")]
    ignore_all_space: bool,
    #[arg(short = 'b', long, help = "Ignore changes in amount of whitespace")]
    ignore_space_change: bool,
    #[arg(long, help = "Ignore whitespace at end of line")]
    ignore_space_at_eol: bool,
    #[arg(short = 'R', help = "Swap the two sides")]
    reverse: bool,
    #[arg(long, help = "Never colorize the output")]
    no_color: bool,
}

impl DiffArgs {
    fn options(&self) -> DiffOptions {
        let mut flags = DiffFlags::empty();
        flags.set(DiffFlags::FORCE_TEXT, self.text);
        flags.set(DiffFlags::IGNORE_WHITESPACE, self.ignore_all_space);
        flags.set(DiffFlags::IGNORE_WHITESPACE_CHANGE, self.ignore_space_change);
        flags.set(DiffFlags::IGNORE_WHITESPACE_EOL, self.ignore_space_at_eol);
        flags.set(DiffFlags::REVERSE, self.reverse);

        DiffOptions::default()
            .with_flags(flags)
            .with_context_lines(self.unified)
            .with_interhunk_lines(self.inter_hunk_context)
    }
}

#[derive(Subcommand)]
enum Commands {
    #[command(
        name = "diff",
        about = "Show a unified patch between two files or blobs",
        long_about = "This command prints the line changes needed to turn the old side into the new side. \
        Each side is either a blob ID in the object database or a path in the working tree; \
        a path that does not exist stands for an added or deleted file."
    )]
    Diff(DiffArgs),
    #[command(
        name = "stat",
        about = "Show per-hunk line counts between two files or blobs",
        long_about = "This command walks the same diff as `diff` and reports how many lines each hunk \
        touches, followed by the insertions and deletions of every file."
    )]
    Stat(DiffArgs),
    #[command(
        name = "hash-object",
        about = "Hash a file as a blob and optionally write it to the object database",
        long_about = "This command hashes a working tree file and can write it to the object database. \
        It requires the path to the file to be specified."
    )]
    HashObject {
        #[arg(short, long, required = false, help = "Write the object to the object database")]
        write: bool,
        #[arg(index = 1)]
        file: String,
    },
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let pwd = std::env::current_dir()?;
    let repository = Repository::new(&pwd.to_string_lossy(), Box::new(std::io::stdout()))?;

    match &cli.command {
        Commands::Diff(args) => {
            if args.no_color {
                colored::control::set_override(false);
            }

            repository.diff(&args.old, &args.new, args.options())?
        }
        Commands::Stat(args) => {
            if args.no_color {
                colored::control::set_override(false);
            }

            repository.stat(&args.old, &args.new, args.options())?
        }
        Commands::HashObject { write, file } => repository.hash_object(file, *write)?,
    }

    repository.writer().flush()?;

    Ok(())
}
