use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use crate::Args;

/// Installs the global subscriber, logs go to stderr so `inspect --print`
/// keeps stdout to itself.
pub fn init_logging(args: &Args) -> Result<()> {
    let filter = EnvFilter::try_new(&args.log_level)
        .with_context(|| format!("Invalid log filter {:?}", args.log_level))?;

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(!args.log_no_ansi)
        .with_target(true);

    if args.log_json {
        subscriber.json().init();
    } else {
        subscriber.compact().init();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn test_log_flags_parse() {
        let args = Args::try_parse_from([
            "tarp",
            "--log-level",
            "warn,tarp_column=trace",
            "--log-json",
            "--log-no-ansi",
            "selftest",
        ])
        .expect("Parse args");

        assert_eq!(args.log_level, "warn,tarp_column=trace");
        assert!(args.log_json);
        assert!(args.log_no_ansi);
    }

    #[test]
    fn test_invalid_filter_is_rejected() {
        let args = Args::try_parse_from(["tarp", "--log-level", "tarp=nonsense", "selftest"])
            .expect("Parse args");

        let err = init_logging(&args).unwrap_err();
        assert!(err.to_string().contains("Invalid log filter"), "{err}");
    }
}
