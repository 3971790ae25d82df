//! Subscriber setup for binaries and tests.

use tracing_subscriber::EnvFilter;

/// Target used for messages the guest prints through `debugPrint`.
pub const GUEST_TARGET: &str = "haathi::guest";

/// Install a `fmt` subscriber. `RUST_LOG` wins over `default_filter`.
///
/// Calling this more than once (or after another subscriber was installed) is a no-op.
pub fn init(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}

#[cfg(test)]
mod tests {
    #[test]
    fn init_twice_is_harmless() {
        super::init("debug");
        super::init("not a [valid filter");
        tracing::info!(target: super::GUEST_TARGET, "still logging");
    }
}
