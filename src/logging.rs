//! Console logging with severity emojis.

use std::io::Write;

/// Marker printed in front of every line of the given level.
pub fn level_marker(level: log::Level) -> &'static str {
    match level {
        log::Level::Error => "❌",
        log::Level::Warn => "⚠️ ",
        log::Level::Info => "ℹ️ ",
        log::Level::Debug | log::Level::Trace => "🔍",
    }
}

/// Install `env_logger` with `info` as the default filter; `RUST_LOG` still wins.
pub fn init() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| writeln!(buf, "{} {}", level_marker(record.level()), record.args()))
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_level_has_a_marker() {
        for level in [
            log::Level::Error,
            log::Level::Warn,
            log::Level::Info,
            log::Level::Debug,
            log::Level::Trace,
        ] {
            assert!(!level_marker(level).is_empty());
        }
        assert_ne!(level_marker(log::Level::Error), level_marker(log::Level::Warn));
    }
}
