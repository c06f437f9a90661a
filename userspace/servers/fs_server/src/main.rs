mod logger;

use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::str::FromStr;
use std::{env, process};

use fat16_impl::block::FileDisk;
use fat16_impl::{server, FileSystem};
use log::LevelFilter;

const DEFAULT_IMAGE: &str = "fs.img";

/// Runtime settings: `fs_server [--format] [IMAGE]`, log level from `FS_LOG`.
struct Config {
    image:        PathBuf,
    force_format: bool,
    level:        LevelFilter,
}

impl Config {
    fn from_env() -> Result<Self, String> {
        let mut image = None;
        let mut force_format = false;
        for arg in env::args().skip(1) {
            match arg.as_str() {
                "--format" => force_format = true,
                flag if flag.starts_with('-') => return Err(format!("unknown option {flag}")),
                _ if image.is_some() => return Err(format!("unexpected argument {arg}")),
                _ => image = Some(PathBuf::from(arg)),
            }
        }
        let level = match env::var("FS_LOG") {
            Ok(value) => LevelFilter::from_str(&value).map_err(|_| format!("bad FS_LOG level {value}"))?,
            Err(_) => LevelFilter::Warn,
        };
        Ok(Config {
            image: image.unwrap_or_else(|| PathBuf::from(DEFAULT_IMAGE)),
            force_format,
            level,
        })
    }
}

fn main() {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(msg) => {
            eprintln!("fs_server: {msg}");
            eprintln!("usage: fs_server [--format] [IMAGE]");
            process::exit(1);
        }
    };
    if logger::init(config.level).is_err() {
        eprintln!("fs_server: logger already installed");
    }

    let disk = match FileDisk::open(&config.image) {
        Ok(disk) => disk,
        Err(err) => {
            log::error!("cannot open {}: {err}", config.image.display());
            process::exit(1);
        }
    };
    let mounted = if config.force_format {
        FileSystem::open_formatted(disk)
    } else {
        FileSystem::mount(disk)
    };
    let mut fs = match mounted {
        Ok(fs) => fs,
        Err(err) => {
            log::error!("cannot mount {}: {err}", config.image.display());
            process::exit(1);
        }
    };
    log::info!("serving {}", config.image.display());

    let stdin = io::stdin();
    let prompt = if stdin.is_terminal() { "$ " } else { "" };
    match server::run(&mut fs, stdin.lock(), io::stdout().lock(), prompt) {
        Ok(fatal) => process::exit(server::exit_code(fatal)),
        Err(err) => {
            log::error!("terminal I/O failed: {err}");
            process::exit(1);
        }
    }
}
