//! Log subscriber setup.

use tracing_subscriber::EnvFilter;

pub const DEFAULT_DIRECTIVE: &str = "info";

/// An explicit directive wins over `RUST_LOG`, which wins over
/// [`DEFAULT_DIRECTIVE`].
pub fn env_filter(directive: Option<&str>) -> EnvFilter {
    match directive {
        Some(directive) => EnvFilter::new(directive),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE)),
    }
}

/// Install the global `fmt` subscriber on stderr, leaving stdout to results.
/// A second call keeps the subscriber that is already installed.
pub fn init(directive: Option<&str>) {
    let installed = tracing_subscriber::fmt()
        .with_env_filter(env_filter(directive))
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
    if let Err(err) = installed {
        tracing::debug!(error = %err, "log subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_directive_is_used() {
        assert_eq!(env_filter(Some("spotcheck_fetch=trace")).to_string(), "spotcheck_fetch=trace");
    }

    #[test]
    fn init_twice_is_harmless() {
        init(Some("warn"));
        init(Some("debug"));
        tracing::warn!("still logging");
    }
}
