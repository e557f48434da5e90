//! Command-line arguments.

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use drivepath_tree::Expect;
use std::path::PathBuf;

/// Manage a cloud drive using ordinary slash-separated paths.
#[derive(Debug, Parser)]
#[command(name = "drivepath", version)]
pub struct Cli {
    /// Configuration file (TOML, YAML or JSON).
    #[arg(long, global = true, env = "DRIVEPATH_CONFIG")]
    pub config: Option<PathBuf>,
    /// Log mutations instead of performing them.
    #[arg(long, global = true)]
    pub dry_run: bool,
    /// Increase log verbosity (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, PartialEq, Eq)]
pub enum Command {
    /// Print the id of the node at PATH.
    Resolve { path: String },
    /// List the contents of a folder.
    Ls {
        #[arg(default_value = "/")]
        path: String,
        /// Extra provider query, e.g. "mimeType = 'text/plain'".
        #[arg(long)]
        filter: Option<String>,
    },
    /// Create a folder and print its id.
    Mkdir {
        name: String,
        /// Folder to create it in (defaults to the root).
        #[arg(long)]
        parent: Option<String>,
    },
    /// Delete a file or folder.
    Rm {
        path: String,
        /// Delete folders along with everything inside them.
        #[arg(short, long)]
        recursive: bool,
        /// Refuse unless PATH is of this kind.
        #[arg(long, value_enum)]
        expect: Option<ExpectArg>,
    },
    /// Move a file or folder into another folder.
    Mv { source: String, destination: String },
    /// Write the content of a file to stdout.
    Cat { path: String },
    /// Download a file, or every file directly inside a folder.
    Fetch {
        path: String,
        /// Local directory (defaults to the configured download_dir).
        #[arg(long)]
        into: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExpectArg {
    File,
    Folder,
}
impl From<ExpectArg> for Expect {
    fn from(value: ExpectArg) -> Self {
        match value {
            ExpectArg::File => Expect::File,
            ExpectArg::Folder => Expect::Folder,
        }
    }
}

/// Default log filter for the number of `-v` flags given.
pub fn log_level(verbose: u8) -> &'static str {
    match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(&["drivepath", "resolve", "/a/b"], Command::Resolve { path: "/a/b".to_string() })]
    #[case(&["drivepath", "ls"], Command::Ls { path: "/".to_string(), filter: None })]
    #[case(
        &["drivepath", "ls", "/docs", "--filter", "name contains 'x'"],
        Command::Ls { path: "/docs".to_string(), filter: Some("name contains 'x'".to_string()) }
    )]
    #[case(
        &["drivepath", "mkdir", "New", "--parent", "/docs"],
        Command::Mkdir { name: "New".to_string(), parent: Some("/docs".to_string()) }
    )]
    #[case(
        &["drivepath", "rm", "-r", "/old"],
        Command::Rm { path: "/old".to_string(), recursive: true, expect: None }
    )]
    #[case(
        &["drivepath", "rm", "/old.txt", "--expect", "file"],
        Command::Rm { path: "/old.txt".to_string(), recursive: false, expect: Some(ExpectArg::File) }
    )]
    #[case(
        &["drivepath", "mv", "/a.txt", "/archive"],
        Command::Mv { source: "/a.txt".to_string(), destination: "/archive".to_string() }
    )]
    #[case(&["drivepath", "cat", "/a.txt"], Command::Cat { path: "/a.txt".to_string() })]
    #[case(
        &["drivepath", "fetch", "/docs", "--into", "out"],
        Command::Fetch { path: "/docs".to_string(), into: Some(PathBuf::from("out")) }
    )]
    fn test_parse(#[case] argv: &[&str], #[case] expected: Command) {
        let cli = Cli::try_parse_from(argv).unwrap();
        assert_eq!(cli.command, expected);
    }

    #[test]
    fn test_global_flags() {
        let cli = Cli::try_parse_from(["drivepath", "rm", "/x", "--dry-run", "-vv"]).unwrap();
        assert!(cli.dry_run);
        assert_eq!(log_level(cli.verbose), "trace");
        assert_eq!(log_level(0), "info");
    }

    #[test]
    fn test_invalid_expect() {
        assert!(Cli::try_parse_from(["drivepath", "rm", "/x", "--expect", "symlink"]).is_err());
    }
}
