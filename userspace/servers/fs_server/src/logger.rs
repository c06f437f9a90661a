use core::fmt::Display;
use std::io::{self, Write};

use log::{Level, LevelFilter, Log};
use owo_colors::OwoColorize;

struct Inner {
    level: LevelFilter,
}

impl Inner {
    fn write_with_color(&mut self, out: &mut impl Write, color: Color, string: impl Display) {
        let string: &dyn Display = match color {
            Color::Default => &string,
            Color::Gray => &string.dimmed(),
            Color::BrightRed => &string.bright_red(),
            Color::BrightYellow => &string.bright_yellow(),
            Color::BrightBlue => &string.bright_blue(),
            Color::BrightCyan => &string.bright_cyan(),
            Color::BrightMagenta => &string.bright_magenta(),
        };
        // Nowhere left to report a failed write to stderr.
        let _ = write!(out, "{string}");
    }
}

struct StderrLogger {
    inner: spin::Mutex<Inner>,
}

static LOGGER: StderrLogger = StderrLogger {
    inner: spin::Mutex::new(Inner { level: LevelFilter::Warn }),
};

impl Log for StderrLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= self.inner.lock().level
    }

    fn log(&self, record: &log::Record) {
        let mut inner = self.inner.lock();
        if record.level() > inner.level {
            return;
        }
        let stderr = io::stderr();
        let mut out = stderr.lock();
        let level = record.level();
        inner.write_with_color(
            &mut out,
            match level {
                Level::Error => Color::BrightRed,
                Level::Warn => Color::BrightYellow,
                Level::Info => Color::BrightBlue,
                Level::Debug => Color::BrightCyan,
                Level::Trace => Color::BrightMagenta,
            },
            format_args!("{level:5} "),
        );
        inner.write_with_color(&mut out, Color::Gray, format_args!("[{}] ", record.target()));
        inner.write_with_color(&mut out, Color::Default, record.args());
        inner.write_with_color(&mut out, Color::Default, "\n");
    }

    fn flush(&self) {
        let _ = io::stderr().flush();
    }
}

pub fn init(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    LOGGER.inner.lock().level = level;
    log::set_max_level(level);
    log::set_logger(&LOGGER)
}

enum Color {
    Default,
    Gray,
    BrightRed,
    BrightYellow,
    BrightBlue,
    BrightCyan,
    BrightMagenta,
}
