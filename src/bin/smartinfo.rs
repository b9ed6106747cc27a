//! Print identity attributes of one disk, or of every `/dev/sd*` disk.

use std::{
    path::{Path, PathBuf},
    process,
};

use log::{error, info, LevelFilter, Log, Metadata, Record};

use pakr_smartinfo::{detect_with_timeout, host_info, merge_close, scan, DEFAULT_TIMEOUT_MS};

struct StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record<'_>) {
        if self.enabled(record.metadata()) {
            eprintln!("[{:<5}] {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

#[derive(Debug, PartialEq, Eq)]
struct Options {
    dev_path: Option<PathBuf>,
    scan: bool,
    verbosity: u8,
    timeout_ms: u32,
}

impl Options {
    fn level(&self) -> LevelFilter {
        match self.verbosity {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            _ => LevelFilter::Debug,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Run(Options),
    Help,
}

fn parse_args<I>(args: I) -> Result<Command, String>
where
    I: IntoIterator<Item = String>,
{
    let mut opts = Options {
        dev_path: None,
        scan: false,
        verbosity: 0,
        timeout_ms: DEFAULT_TIMEOUT_MS,
    };

    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(Command::Help),
            "-d" | "--dev-path" => {
                let path = args.next().ok_or("--dev-path needs a device path")?;
                opts.dev_path = Some(PathBuf::from(path));
            }
            "-s" | "--scan" => opts.scan = true,
            "-v" => opts.verbosity += 1,
            "-vv" => opts.verbosity += 2,
            "-t" | "--timeout-ms" => {
                let value = args.next().ok_or("--timeout-ms needs a value")?;
                opts.timeout_ms = value
                    .parse()
                    .map_err(|e| format!("invalid timeout {:?}: {}", value, e))?;
            }
            other => return Err(format!("unknown argument {:?}", other)),
        }
    }

    if opts.dev_path.is_none() && !opts.scan {
        return Err("either --dev-path or --scan is required".to_string());
    }
    Ok(Command::Run(opts))
}

fn usage() {
    eprintln!(
        "usage: smartinfo [-v|-vv] [--timeout-ms MS] (--dev-path /dev/sdX | --scan)\n\
         \n  -d, --dev-path PATH  device to read attributes from, e.g. /dev/sda\
         \n  -s, --scan           query every /dev/sd* disk\
         \n  -t, --timeout-ms MS  per-command timeout (default {})\
         \n  -v, -vv              more logging",
        DEFAULT_TIMEOUT_MS
    );
}

fn show(path: &Path, timeout_ms: u32) -> pakr_smartinfo::Result<()> {
    let mut dev = detect_with_timeout(path, timeout_ms)?;
    info!("{}: detected {:?} device", dev.name(), dev.kind());

    let printed = dev.print_disk_info();
    merge_close(printed, dev.close())
}

fn main() {
    let opts = match parse_args(std::env::args().skip(1)) {
        Ok(Command::Run(opts)) => opts,
        Ok(Command::Help) => {
            usage();
            return;
        }
        Err(msg) => {
            eprintln!("{}", msg);
            usage();
            process::exit(1);
        }
    };

    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(opts.level());
    }

    println!("pakr-smartinfo {}", env!("CARGO_PKG_VERSION"));
    let host = host_info();
    info!("host is {}", host.endian);

    if let Some(path) = &opts.dev_path {
        if let Err(e) = show(path, opts.timeout_ms) {
            error!("{}: {}", path.display(), e);
            process::exit(1);
        }
    }

    if opts.scan {
        let devices = scan::scan_devices();
        if devices.is_empty() {
            println!("no SCSI disks found");
        }

        let mut failed = 0;
        for path in &devices {
            println!("\n=== {} ===", path.display());
            if let Err(e) = show(path, opts.timeout_ms) {
                error!("{}: {}", path.display(), e);
                failed += 1;
            }
        }

        if failed > 0 && failed == devices.len() {
            process::exit(1);
        }
    }
}
