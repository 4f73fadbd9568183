use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Install the global tracing subscriber.
///
/// Logs go to stderr so `--json` output on stdout stays parseable. The
/// level comes from `RUST_LOG`, defaulting to `info`; `verbose` forces
/// `debug` for the autosync crates.
pub fn init(verbose: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .with_level(true)
        .compact();

    let filter_layer = if verbose {
        EnvFilter::try_new("autosync_core=debug,autosync_vcs=debug,autosync=debug,info")?
    } else {
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?
    };

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}
