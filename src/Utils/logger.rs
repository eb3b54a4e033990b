use log::LevelFilter;
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};

/// Terminal logger for binaries and examples. Calling it a second time keeps the first
/// logger and returns false.
pub fn init_logger(level: LevelFilter) -> bool {
    TermLogger::init(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )
    .is_ok()
}
