// File: ./src/cli.rs
//! Command-line parsing and help text for the `tasklink` binary.
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SyncArgs {
    pub vault: Option<PathBuf>,
    pub json: bool,
    pub quiet: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Sync(SyncArgs),
    Todos,
    Databases,
    Config,
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub root: Option<PathBuf>,
    pub verbose: bool,
    pub command: Command,
}

/// Parses `args` (without the binary name). Unknown flags are ignored and
/// no command at all means help.
pub fn parse_args(args: &[String]) -> Result<Invocation, String> {
    let mut root = None;
    let mut verbose = false;
    let mut command: Option<&str> = None;
    let mut sync = SyncArgs::default();

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" | "help" => {
                return Ok(Invocation {
                    root,
                    verbose,
                    command: Command::Help,
                });
            }
            "--root" | "-r" | "--vault" => {
                let Some(value) = args.get(i + 1) else {
                    return Err(format!("{} needs a path", args[i]));
                };
                if args[i] == "--vault" {
                    sync.vault = Some(PathBuf::from(value));
                } else {
                    root = Some(PathBuf::from(value));
                }
                i += 1;
            }
            "--json" => sync.json = true,
            "--quiet" | "-q" => sync.quiet = true,
            "--verbose" | "-v" => verbose = true,
            arg if !arg.starts_with('-') => {
                if command.is_some() {
                    return Err(format!("unexpected argument '{}'", arg));
                }
                command = Some(args[i].as_str());
            }
            other => log::debug!("Ignoring unknown flag {}", other),
        }
        i += 1;
    }

    let command = match command {
        Some("sync") => Command::Sync(sync),
        Some("todos") => Command::Todos,
        Some("databases") => Command::Databases,
        Some("config") => Command::Config,
        Some(other) => return Err(format!("unknown command '{}'", other)),
        None => Command::Help,
    };
    Ok(Invocation {
        root,
        verbose,
        command,
    })
}

pub fn print_help(binary_name: &str) {
    println!(
        "Tasklink v{} - Sync markdown checkboxes with Notion tasks",
        env!("CARGO_PKG_VERSION")
    );
    println!();
    println!("USAGE:");
    println!(
        "    {} [--root <path>] sync [--vault <path>] [--json] [-q] [-v]",
        binary_name
    );
    println!("    {} [--root <path>] todos", binary_name);
    println!("    {} [--root <path>] databases", binary_name);
    println!("    {} [--root <path>] config", binary_name);
    println!("    {} --help", binary_name);
    println!();
    println!("COMMANDS:");
    println!("    sync        Run one pass over the recently open notes.");
    println!("    todos       List open tasks as checkbox lines ready to paste.");
    println!("    databases   List databases the API token can see.");
    println!("    config      Show the config file path, creating a default one.");
    println!();
    println!("OPTIONS:");
    println!("    -r, --root <path>     Use a different directory for config and data.");
    println!("    --vault <path>        Notes directory (overrides vault_path).");
    println!("    --json                Print the sync report as JSON.");
    println!("    -q, --quiet           No desktop notifications.");
    println!("    -v, --verbose         Debug logging on stderr.");
    println!("    -h, --help            Show this help message.");
    println!();
    println!("CHECKBOXES:");
    println!("    - [ ]   to do");
    println!("    - [/]   in progress");
    println!("    - [x]   done");
    println!("    - [-]   cancelled (needs a cancelled status in the config)");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_sync_flags() {
        let inv = parse_args(&args(&["--root", "/tmp/x", "sync", "--vault", "/notes", "--json", "-q", "-v"]))
            .unwrap();
        assert_eq!(inv.root, Some(PathBuf::from("/tmp/x")));
        assert!(inv.verbose);
        assert_eq!(
            inv.command,
            Command::Sync(SyncArgs {
                vault: Some(PathBuf::from("/notes")),
                json: true,
                quiet: true,
            })
        );
    }

    #[test]
    fn test_other_commands() {
        assert_eq!(parse_args(&args(&["todos"])).unwrap().command, Command::Todos);
        assert_eq!(parse_args(&args(&["databases"])).unwrap().command, Command::Databases);
        assert_eq!(parse_args(&args(&["config"])).unwrap().command, Command::Config);
        assert_eq!(parse_args(&args(&[])).unwrap().command, Command::Help);
        assert_eq!(parse_args(&args(&["sync", "-h"])).unwrap().command, Command::Help);
    }

    #[test]
    fn test_errors() {
        assert!(parse_args(&args(&["frobnicate"])).unwrap_err().contains("frobnicate"));
        assert!(parse_args(&args(&["sync", "--vault"])).is_err());
        assert!(parse_args(&args(&["sync", "todos"])).is_err());
    }
}
