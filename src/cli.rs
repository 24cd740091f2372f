use clap::Parser;
use std::path::PathBuf;

/// Bulk find-and-replace over a directory tree.
///
/// `newtext` walks a directory, skips binary and oversized files, and rewrites
/// every text file containing a match. Each file is replaced atomically.
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Fast, atomic find-and-replace across a directory tree",
    long_about = "newtext - Replace text in every file under a directory.

Files are matched as raw bytes, binary files are left alone, and every rewrite
goes through a temporary file that is renamed over the original.

QUICK EXAMPLES:
  newtext foo bar                         # Replace 'foo' with 'bar' under .
  newtext -p 'v(\\d+)' 'version $1' -d src # Regex with capture groups
  newtext -w -i color colour --dry-run    # Whole-word, case-insensitive preview
  newtext -c rules.yaml -f json           # Rules from a config file, JSON report

Config file format (newtext.yaml):
  rules:
    - find: 'oldName'
      replace: 'newName'
      whole_word: true
    - find: 'v(\\d+)\\.(\\d+)'
      replace: 'v$1.$2.0'
      regex: true
  exclude: ['target/**', '*.lock']
  max_file_size: 10485760
  workers: 8"
)]
pub struct Args {
    /// The text (or regex, with --pattern) to search for.
    #[arg(required_unless_present = "config", requires = "replace")]
    pub find: Option<String>,

    /// The replacement. With --pattern, `$1` and `${name}` expand capture groups.
    #[arg(required_unless_present = "config")]
    pub replace: Option<String>,

    /// Treat FIND as a regular expression.
    #[arg(short, long)]
    pub pattern: bool,

    /// Match case-insensitively.
    #[arg(short, long)]
    pub ignore_case: bool,

    /// Only replace matches that are whole words.
    #[arg(short, long = "word")]
    pub whole_word: bool,

    /// Let `^` and `$` match at line boundaries (regex only).
    #[arg(short, long)]
    pub multiline: bool,

    /// The directory to process.
    #[arg(short, long, default_value = ".")]
    pub dir: PathBuf,

    /// Path to a YAML file with replacement rules and run settings.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// A comma-separated list of gitignore-style globs to exclude.
    #[arg(short = 'e', long = "exclude", value_delimiter = ',')]
    pub exclude: Vec<String>,

    /// Skip files larger than this many bytes.
    #[arg(long = "max-size")]
    pub max_size: Option<u64>,

    /// The number of parallel worker threads to use. Defaults to the number of logical CPU cores.
    #[arg(short = 'j', long = "workers", env = "NEWTEXT_WORKERS")]
    pub workers: Option<usize>,

    /// Do not follow symlinks to files.
    #[arg(long)]
    pub no_follow_symlinks: bool,

    /// Include hidden files and directories.
    #[arg(long)]
    pub hidden: bool,

    /// Do not respect .gitignore, .ignore and similar files.
    #[arg(long)]
    pub no_ignore: bool,

    /// Preview the changes without actually modifying any files.
    #[arg(long)]
    pub dry_run: bool,

    /// Stop starting new files after this many seconds.
    #[arg(long)]
    pub timeout: Option<u64>,

    /// The output format for the run report (`text`, `json`, `csv`).
    #[arg(short = 'f', long = "format", default_value = "text")]
    pub format: String,

    /// Print every file, not just modified ones, and enable debug logging.
    #[arg(short, long)]
    pub verbose: bool,

    /// Only print errors.
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

/// Parses command-line arguments and returns the populated `Args` struct.
pub fn parse_args() -> Args {
    Args::parse()
}
