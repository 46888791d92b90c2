use clap::Parser;
use std::path::PathBuf;

/// Hestia - bridge between a hosted assistant and your home-automation hub
#[derive(Parser, Debug, Clone)]
#[command(name = "hestia", version, about, long_about = None)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, env = "HESTIA_CONFIG", default_value = "hestia.toml")]
    pub config: PathBuf,

    /// Server host address
    #[arg(long, env = "HESTIA_HOST")]
    pub host: Option<String>,

    /// Server port
    #[arg(long, env = "HESTIA_PORT")]
    pub port: Option<u16>,

    /// Use an existing assistant instead of looking one up by name
    #[arg(long, env = "HESTIA_ASSISTANT_ID")]
    pub assistant_id: Option<String>,

    /// Skip creating or updating the assistant at startup
    #[arg(long, env = "HESTIA_NO_PROVISION")]
    pub no_provision: bool,

    /// Skip knowledge-store synchronization at startup
    #[arg(long, env = "HESTIA_NO_KNOWLEDGE_SYNC")]
    pub no_knowledge_sync: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["hestia"]);
        assert_eq!(cli.config, PathBuf::from("hestia.toml"));
        assert!(cli.host.is_none());
        assert!(cli.port.is_none());
        assert!(cli.assistant_id.is_none());
        assert!(!cli.no_provision);
        assert!(!cli.no_knowledge_sync);
    }

    #[test]
    fn test_cli_with_args() {
        let cli = Cli::parse_from([
            "hestia",
            "--config",
            "deploy/hestia.toml",
            "--host",
            "0.0.0.0",
            "--port",
            "8080",
            "--assistant-id",
            "asst_123",
            "--no-provision",
            "--no-knowledge-sync",
        ]);
        assert_eq!(cli.config, PathBuf::from("deploy/hestia.toml"));
        assert_eq!(cli.host, Some("0.0.0.0".to_string()));
        assert_eq!(cli.port, Some(8080));
        assert_eq!(cli.assistant_id, Some("asst_123".to_string()));
        assert!(cli.no_provision);
        assert!(cli.no_knowledge_sync);
    }
}
