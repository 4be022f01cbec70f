use std::{io::Write, path::PathBuf};

use clap::{Parser, Subcommand};
use ems_image::CartridgeIter;
use env_logger::Env;
use log::*;

use crate::check::{check, list_cartridges};

mod check;

#[derive(Subcommand, Debug)]
enum Command {
    /// Place ROM files in a page and print the resulting layout
    #[command(arg_required_else_help = true)]
    Check {
        /// Cartridge to lay out (ems64m, ems32m)
        #[clap(short, long, value_parser = cartridge_parser)]
        cartridge: String,

        /// Page of the cartridge the ROMs go to
        #[clap(short, long, default_value_t = 0)]
        page: u32,

        /// ROM files as FILE@OFFSET, offset in bytes from the start of the page (decimal or 0x hex)
        #[clap(required = true, value_parser = staged_parser)]
        roms: Vec<Staged>,
    },
    /// List the known cartridges
    Cartridges,
}

/// A ROM file and where it should go in the page
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Staged {
    pub path: PathBuf,
    pub offset: u32,
}

fn cartridge_parser(s: &str) -> Result<String, String> {
    if let Some(cartridge) = CartridgeIter::find_by_name(s) {
        Ok(cartridge.name())
    } else {
        Err(format!("Unknown cartridge '{}'", s))
    }
}

fn staged_parser(s: &str) -> Result<Staged, String> {
    let (path, offset) = s
        .rsplit_once('@')
        .ok_or_else(|| format!("Expected FILE@OFFSET, got '{}'", s))?;
    if path.is_empty() {
        return Err(format!("Missing file name in '{}'", s));
    }
    Ok(Staged {
        path: PathBuf::from(path),
        offset: parse_offset(offset)?,
    })
}

fn parse_offset(s: &str) -> Result<u32, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|err| format!("Invalid offset '{}': {}", s, err))
}

fn level_parser(s: &str) -> Result<LevelFilter, String> {
    s.parse()
        .map_err(|_| format!("Unknown log level '{}', expected off, error, warn, info, debug or trace", s))
}

#[derive(Parser, Debug)]
#[clap(version, about, long_about = None)]
#[command(arg_required_else_help = true)]
struct Cli {
    /// Log level: off, error, warn, info, debug or trace. EMS_LOG overrides it per module.
    #[clap(short, long, global = true, default_value = "info", value_parser = level_parser)]
    verbose: LevelFilter,

    #[clap(subcommand)]
    command: Option<Command>,
}

/// Info lines are plain output, anything else is tagged with its level.
fn init_logger(level: LevelFilter) {
    env_logger::Builder::new()
        .filter_level(level)
        .parse_env(Env::default().filter("EMS_LOG"))
        .format(|buf, record| match record.level() {
            Level::Info => writeln!(buf, "{}", record.args()),
            Level::Debug | Level::Trace => writeln!(
                buf,
                "[{} {}] {}",
                record.level().as_str().to_lowercase(),
                record.target(),
                record.args()
            ),
            level => writeln!(buf, "{}: {}", level.as_str().to_lowercase(), record.args()),
        })
        .init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    let command = match cli.command {
        Some(command) => command,
        None => return Ok(()),
    };

    let stdout = std::io::stdout();
    match command {
        Command::Check {
            cartridge,
            page,
            roms,
        } => {
            let cartridge = CartridgeIter::find_by_name(&cartridge)
                .expect("This already has been verified by cartridge_parser");

            check(cartridge.as_ref(), page, roms, stdout.lock())
        }
        Command::Cartridges => list_cartridges(stdout.lock()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    pub fn parses_offsets() {
        assert_eq!(parse_offset("32768"), Ok(32768));
        assert_eq!(parse_offset("0x8000"), Ok(0x8000));
        assert_eq!(parse_offset("0X10000"), Ok(0x10000));
        assert!(parse_offset("0x").is_err());
        assert!(parse_offset("-1").is_err());
        assert!(parse_offset("0x1_0000_0000").is_err());
    }

    #[test]
    pub fn parses_staged_roms() {
        assert_eq!(
            staged_parser("tetris.gb@0x8000"),
            Ok(Staged {
                path: PathBuf::from("tetris.gb"),
                offset: 0x8000
            })
        );
        // Only the last '@' separates the offset
        assert_eq!(
            staged_parser("roms/a@b.gb@0"),
            Ok(Staged {
                path: PathBuf::from("roms/a@b.gb"),
                offset: 0
            })
        );
        assert!(staged_parser("tetris.gb").is_err());
        assert!(staged_parser("@0x8000").is_err());
        assert!(staged_parser("tetris.gb@here").is_err());
    }

    #[test]
    pub fn parses_check_command() {
        let cli = Cli::try_parse_from([
            "ems-layout",
            "-v",
            "debug",
            "check",
            "-c",
            "EMS64M",
            "--page",
            "1",
            "a.gb@0",
            "b.gb@0x8000",
        ])
        .unwrap();

        assert_eq!(cli.verbose, LevelFilter::Debug);
        match cli.command {
            Some(Command::Check {
                cartridge,
                page,
                roms,
            }) => {
                assert_eq!(cartridge, "ems64m");
                assert_eq!(page, 1);
                assert_eq!(roms.len(), 2);
                assert_eq!(roms[1].offset, 0x8000);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    pub fn verbosity_defaults_to_info() {
        let cli = Cli::try_parse_from(["ems-layout", "cartridges"]).unwrap();
        assert_eq!(cli.verbose, LevelFilter::Info);
        assert!(matches!(cli.command, Some(Command::Cartridges)));

        let cli = Cli::try_parse_from(["ems-layout", "cartridges", "--verbose", "TRACE"]).unwrap();
        assert_eq!(cli.verbose, LevelFilter::Trace);

        assert!(Cli::try_parse_from(["ems-layout", "-v", "loud", "cartridges"]).is_err());
    }

    #[test]
    pub fn rejects_unknown_cartridge() {
        assert!(Cli::try_parse_from(["ems-layout", "check", "-c", "gbxcart", "a.gb@0"]).is_err());
        assert!(Cli::try_parse_from(["ems-layout", "check", "-c", "ems64m"]).is_err());
    }
}
