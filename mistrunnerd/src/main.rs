use mistrunnerd::config::RuntimeConfig;
use mistrunnerd::daemon::DaemonRuntime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CliMode {
    Run,
    LocalOnly,
    Help,
}

fn parse_cli_mode<I>(args: I) -> anyhow::Result<CliMode>
where
    I: IntoIterator<Item = String>,
{
    let mut mode = CliMode::Run;
    for arg in args.into_iter().skip(1) {
        match arg.as_str() {
            "--local-only" => mode = CliMode::LocalOnly,
            "--help" | "-h" => mode = CliMode::Help,
            other => anyhow::bail!("unknown argument: {other}"),
        }
    }
    Ok(mode)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = match parse_cli_mode(std::env::args())? {
        CliMode::Help => {
            println!("Usage: mistrunnerd [--local-only]");
            println!("  --local-only   Serve from the filesystem mirror, never contact the store");
            return Ok(());
        }
        CliMode::LocalOnly => RuntimeConfig::local_only_from_env()?,
        CliMode::Run => RuntimeConfig::from_env()?,
    };
    let daemon = DaemonRuntime::bootstrap(config).await?;
    daemon.run().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_cli_mode_defaults_to_run() {
        let mode = parse_cli_mode(vec!["mistrunnerd".to_string()]).unwrap();
        assert_eq!(mode, CliMode::Run);
    }

    #[test]
    fn parse_cli_mode_supports_local_only() {
        let mode =
            parse_cli_mode(vec!["mistrunnerd".to_string(), "--local-only".to_string()]).unwrap();
        assert_eq!(mode, CliMode::LocalOnly);
    }

    #[test]
    fn parse_cli_mode_rejects_unknown_arguments() {
        assert!(parse_cli_mode(vec!["mistrunnerd".to_string(), "--nope".to_string()]).is_err());
    }
}
