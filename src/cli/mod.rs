pub mod scans;
pub mod serve;

use clap::{Parser, Subcommand};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8888;

/// dscan - Disk usage scans with duc, served over HTTP
#[derive(Parser, Debug)]
#[command(
    name = "dscan",
    version,
    about = "dscan - Disk usage scans with duc, served over HTTP"
)]
pub struct Cli {
    /// Server host (clients default to 127.0.0.1, `serve` to the config value)
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Server port (clients default to 8888, `serve` to the config value)
    #[arg(short = 'p', long, global = true)]
    pub port: Option<u16>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the scan server in the foreground
    Serve {
        /// Path to configuration file
        #[arg(short = 'c', long = "config")]
        config: Option<String>,

        /// Data directory path
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
    },

    /// Start a scan of PATH on the running server
    Scan {
        /// Directory to scan
        path: String,
    },

    /// List scans, newest first
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the paths offered by the server
    Paths,

    /// Show the command log
    Log {
        /// Show last N lines
        #[arg(long)]
        tail: Option<usize>,
    },
}

impl Cli {
    fn client_host(&self) -> &str {
        self.host.as_deref().unwrap_or(DEFAULT_HOST)
    }

    fn client_port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }
}

/// Build the base URL for the server HTTP API.
pub fn base_url(host: &str, port: u16) -> String {
    format!("http://{}:{}", host, port)
}

/// Format a connection error message for when the server is not reachable.
pub fn connection_error_message(host: &str, port: u16) -> String {
    format!(
        "Could not connect to server at {}:{}. Is it running? (try: dscan serve)",
        host, port
    )
}

/// Dispatch the CLI command to the appropriate handler.
pub async fn dispatch(cli: &Cli) -> anyhow::Result<()> {
    let host = cli.client_host();
    let port = cli.client_port();

    match &cli.command {
        Some(Commands::Serve { config, data_dir }) => {
            serve::cmd_serve(
                config.as_deref(),
                data_dir.as_deref(),
                cli.host.as_deref(),
                cli.port,
            )
            .await
        }
        Some(Commands::Scan { path }) => scans::cmd_scan(host, port, path).await,
        Some(Commands::Status { json }) => scans::cmd_status(host, port, *json).await,
        Some(Commands::Paths) => scans::cmd_paths(host, port).await,
        Some(Commands::Log { tail }) => scans::cmd_log(host, port, *tail).await,
        None => {
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
            Ok(())
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_version_flag() {
        let result = Cli::try_parse_from(["dscan", "--version"]);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
        assert!(err.to_string().contains("0.1.0"));
    }

    #[test]
    fn test_cli_scan_takes_positional_path() {
        let cli = Cli::try_parse_from(["dscan", "scan", "/var/log"]).expect("parse scan");
        match &cli.command {
            Some(Commands::Scan { path }) => assert_eq!(path, "/var/log"),
            other => panic!("Expected Scan command, got: {:?}", other),
        }
    }

    #[test]
    fn test_cli_scan_requires_path() {
        assert!(Cli::try_parse_from(["dscan", "scan"]).is_err());
    }

    #[test]
    fn test_cli_serve_with_port_and_data_dir() {
        let cli = Cli::try_parse_from([
            "dscan",
            "serve",
            "--port",
            "9000",
            "--data-dir",
            "/tmp/dscan",
            "-c",
            "/etc/dscan.json",
        ])
        .expect("parse serve");

        assert_eq!(cli.port, Some(9000));
        match &cli.command {
            Some(Commands::Serve { config, data_dir }) => {
                assert_eq!(config.as_deref(), Some("/etc/dscan.json"));
                assert_eq!(data_dir.as_deref(), Some("/tmp/dscan"));
            }
            other => panic!("Expected Serve command, got: {:?}", other),
        }
    }

    #[test]
    fn test_cli_status_json_flag() {
        let cli = Cli::try_parse_from(["dscan", "status", "--json"]).expect("parse status");
        match &cli.command {
            Some(Commands::Status { json }) => assert!(json),
            other => panic!("Expected Status command, got: {:?}", other),
        }
    }

    #[test]
    fn test_cli_log_tail() {
        let cli = Cli::try_parse_from(["dscan", "log", "--tail", "20"]).expect("parse log");
        match &cli.command {
            Some(Commands::Log { tail }) => assert_eq!(*tail, Some(20)),
            other => panic!("Expected Log command, got: {:?}", other),
        }
    }

    #[test]
    fn test_client_defaults() {
        let cli = Cli::try_parse_from(["dscan", "paths"]).expect("parse paths");
        assert_eq!(cli.client_host(), "127.0.0.1");
        assert_eq!(cli.client_port(), 8888);
        assert!(cli.host.is_none());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["dscan", "status", "--host", "10.0.0.5", "-v"])
            .expect("parse");
        assert_eq!(cli.client_host(), "10.0.0.5");
        assert!(cli.verbose);
    }

    #[test]
    fn test_base_url() {
        assert_eq!(base_url("127.0.0.1", 8888), "http://127.0.0.1:8888");
    }

    #[test]
    fn test_connection_error_message() {
        let msg = connection_error_message("localhost", 8888);
        assert!(msg.contains("localhost:8888"));
        assert!(msg.contains("dscan serve"));
    }
}
