//! Logging facade.
//!
//! Thin wrapper over the `log` crate, in the spirit of the teacher's
//! own `utils::log` module: the rest of the engine calls `log::info`/
//! `log::error` instead of reaching for `println!`, so a host
//! application can install whatever `log` backend it likes (by
//! default, `env_logger`).

pub use log::Level;

/// Install a simple `env_logger` backend. Intended for binaries and
/// examples; library code should never call this on behalf of a host
/// application.
pub fn init_logger(level: Level) {
    let _ = env_logger::Builder::new()
        .filter_level(level.to_level_filter())
        .is_test(false)
        .try_init();
}

pub fn info(msg: impl AsRef<str>) {
    log::info!("{}", msg.as_ref());
}

pub fn warn(msg: impl AsRef<str>) {
    log::warn!("{}", msg.as_ref());
}

pub fn error(msg: impl AsRef<str>) {
    log::error!("{}", msg.as_ref());
}

pub fn debug(msg: impl AsRef<str>) {
    log::debug!("{}", msg.as_ref());
}
