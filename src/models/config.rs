use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::ScanPathOption;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    /// Where rendered graphs are written and served from.
    /// Defaults to `{data_dir}/static/graphs`.
    #[serde(default)]
    pub graph_dir: Option<PathBuf>,
    /// Append-only log of every external command. Defaults to `{data_dir}/scan_log.txt`.
    #[serde(default)]
    pub scan_log_file: Option<PathBuf>,
    /// argv template for the index stage. `{path}` is replaced by the scan target.
    #[serde(default = "default_index_command")]
    pub index_command: Vec<String>,
    /// argv template for the render stage. `{output}` is replaced by the graph
    /// file path and `{path}` by the scan target.
    #[serde(default = "default_render_command")]
    pub render_command: Vec<String>,
    #[serde(default = "default_scan_paths")]
    pub scan_paths: Vec<ScanPathOption>,
    /// Keep at most this many scans in memory; 0 keeps everything.
    #[serde(default)]
    pub max_retained_scans: usize,
    #[serde(default = "default_broadcast_capacity")]
    pub broadcast_capacity: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8888
}

fn default_index_command() -> Vec<String> {
    ["sudo", "duc", "index", "{path}"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_render_command() -> Vec<String> {
    ["sudo", "duc", "graph", "-o", "{output}", "{path}"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_scan_paths() -> Vec<ScanPathOption> {
    [
        "/",
        "/home",
        "/home/administrador",
        "/var",
        "/var/log",
        "/usr",
        "/usr/local",
    ]
    .iter()
    .map(|p| ScanPathOption::new(p))
    .collect()
}

fn default_broadcast_capacity() -> usize {
    1024
}

impl ServerConfig {
    /// Resolved graph directory, falling back to `{data_dir}/static/graphs`.
    pub fn graph_dir(&self) -> PathBuf {
        match self.graph_dir {
            Some(ref dir) => dir.clone(),
            None => self.data_dir_or_cwd().join("static").join("graphs"),
        }
    }

    /// Resolved command log path, falling back to `{data_dir}/scan_log.txt`.
    pub fn scan_log_file(&self) -> PathBuf {
        match self.scan_log_file {
            Some(ref path) => path.clone(),
            None => self.data_dir_or_cwd().join("scan_log.txt"),
        }
    }

    fn data_dir_or_cwd(&self) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            data_dir: None,
            graph_dir: None,
            scan_log_file: None,
            index_command: default_index_command(),
            render_command: default_render_command(),
            scan_paths: default_scan_paths(),
            max_retained_scans: 0,
            broadcast_capacity: default_broadcast_capacity(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8888);
        assert!(config.data_dir.is_none());
        assert_eq!(config.index_command, vec!["sudo", "duc", "index", "{path}"]);
        assert_eq!(
            config.render_command,
            vec!["sudo", "duc", "graph", "-o", "{output}", "{path}"]
        );
        assert_eq!(config.scan_paths.len(), 7);
        assert_eq!(config.scan_paths[0].path, "/");
        assert_eq!(config.max_retained_scans, 0);
        assert_eq!(config.broadcast_capacity, 1024);
    }

    #[test]
    fn test_server_config_partial_deserialization_empty() {
        let config: ServerConfig = serde_json::from_str("{}").expect("deserialize");
        assert_eq!(config.port, 8888);
        assert_eq!(config.index_command.len(), 4);
        assert_eq!(config.scan_paths.len(), 7);
    }

    #[test]
    fn test_server_config_partial_deserialization_some_fields() {
        let json = r#"{
            "port": 9000,
            "index_command": ["duc", "index", "{path}"],
            "scan_paths": [{"display": "Logs", "path": "/var/log"}]
        }"#;
        let config: ServerConfig = serde_json::from_str(json).expect("deserialize");
        assert_eq!(config.host, "0.0.0.0"); // default
        assert_eq!(config.port, 9000);
        assert_eq!(config.index_command, vec!["duc", "index", "{path}"]);
        assert_eq!(config.render_command.len(), 6); // default
        assert_eq!(config.scan_paths.len(), 1);
        assert_eq!(config.scan_paths[0].display, "Logs");
    }

    #[test]
    fn test_derived_paths_follow_data_dir() {
        let json = r#"{"data_dir": "/srv/dscan"}"#;
        let config: ServerConfig = serde_json::from_str(json).expect("deserialize");
        assert_eq!(config.graph_dir(), PathBuf::from("/srv/dscan/static/graphs"));
        assert_eq!(
            config.scan_log_file(),
            PathBuf::from("/srv/dscan/scan_log.txt")
        );
    }

    #[test]
    fn test_explicit_paths_override_data_dir() {
        let json = r#"{
            "data_dir": "/srv/dscan",
            "graph_dir": "/var/www/graphs",
            "scan_log_file": "/var/log/dscan.log"
        }"#;
        let config: ServerConfig = serde_json::from_str(json).expect("deserialize");
        assert_eq!(config.graph_dir(), PathBuf::from("/var/www/graphs"));
        assert_eq!(config.scan_log_file(), PathBuf::from("/var/log/dscan.log"));
    }
}
