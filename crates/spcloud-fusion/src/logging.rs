use tracing_subscriber::EnvFilter;

/// Install a fmt subscriber. `RUST_LOG` wins over `verbose`; a second call is a no-op.
pub fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_is_harmless() {
        init_tracing(false);
        init_tracing(true);
        tracing::info!("still logging");
    }
}
