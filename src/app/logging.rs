use env_logger::{Builder, Env};
use log::LevelFilter;

/// Installs `env_logger` as the global logger.
///
/// `RUST_LOG` takes precedence over `level` when set. Returns `false` if a
/// logger was already installed, in which case nothing changes.
pub fn init_logging(level: LevelFilter) -> bool {
    Builder::from_env(Env::default().default_filter_or(level.to_string()))
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_is_rejected() {
        let _ = init_logging(LevelFilter::Debug);
        assert!(!init_logging(LevelFilter::Info));
    }
}
