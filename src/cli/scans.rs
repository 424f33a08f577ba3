use chrono::{DateTime, Utc};
use reqwest::Client;
use serde_json::Value;

use super::{base_url, connection_error_message};

/// Map a reqwest error to a user-friendly anyhow error.
fn handle_request_error(err: reqwest::Error, host: &str, port: u16) -> anyhow::Error {
    if err.is_connect() || err.is_timeout() {
        anyhow::anyhow!("{}", connection_error_message(host, port))
    } else {
        anyhow::anyhow!("Request failed: {}", err)
    }
}

/// Parse a JSON body, turning non-2xx responses into errors carrying the
/// server's `message`.
async fn json_body(response: reqwest::Response) -> anyhow::Result<Value> {
    let status = response.status();
    let body: Value = response
        .json()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to parse response: {}", e))?;

    if !status.is_success() {
        let message = body["message"].as_str().unwrap_or("Unknown error");
        anyhow::bail!("{}", message);
    }
    Ok(body)
}

/// Format a relative time string like "2 minutes ago".
fn format_relative_time(dt: &DateTime<Utc>) -> String {
    let secs = Utc::now().signed_duration_since(*dt).num_seconds().max(0);
    if secs < 60 {
        format!("{} seconds ago", secs)
    } else if secs < 3600 {
        format!("{} minutes ago", secs / 60)
    } else if secs < 86400 {
        format!("{} hours ago", secs / 3600)
    } else {
        format!("{} days ago", secs / 86400)
    }
}

/// First line of a diagnostic, cut to `max` characters.
fn summarize(diagnostic: &str, max: usize) -> String {
    let first = diagnostic.lines().next().unwrap_or("");
    if first.chars().count() > max {
        let cut: String = first.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    } else {
        first.to_string()
    }
}

/// dscan scan <path>
pub async fn cmd_scan(host: &str, port: u16, path: &str) -> anyhow::Result<()> {
    let client = Client::new();
    let url = format!("{}/scan", base_url(host, port));

    let response = client
        .post(&url)
        .form(&[("scan_path", path)])
        .send()
        .await
        .map_err(|e| handle_request_error(e, host, port))?;

    let body = json_body(response).await?;
    let scan_id = body["scan_id"].as_str().unwrap_or("?");
    println!("Scan started: {}", scan_id);
    println!("  Path: {}", path);
    println!("Use 'dscan status' to follow progress.");
    Ok(())
}

/// dscan status
pub async fn cmd_status(host: &str, port: u16, json: bool) -> anyhow::Result<()> {
    let client = Client::new();
    let url = format!("{}/scan_status", base_url(host, port));

    let response = client
        .get(&url)
        .send()
        .await
        .map_err(|e| handle_request_error(e, host, port))?;
    let body = json_body(response).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    let empty_vec = vec![];
    let scans = body.as_array().unwrap_or(&empty_vec);
    if scans.is_empty() {
        println!("No scans yet.");
        return Ok(());
    }

    println!(
        "{:<38}{:<24}{:<10}{:<18}",
        "ID", "PATH", "STATUS", "STARTED"
    );

    for scan in scans {
        let id = scan["id"].as_str().unwrap_or("?");
        let path = scan["path"].as_str().unwrap_or("?");
        let status = scan["status"].as_str().unwrap_or("?");
        let started = scan["created_at"]
            .as_str()
            .and_then(|ts| ts.parse::<DateTime<Utc>>().ok())
            .map(|dt| format_relative_time(&dt))
            .unwrap_or_else(|| "-".to_string());

        println!("{:<38}{:<24}{:<10}{:<18}", id, path, status, started);

        if let Some(diagnostic) = scan["error_msg"].as_str() {
            println!("  {}", summarize(diagnostic, 100));
        } else if let Some(output) = scan["output_file"].as_str() {
            println!("  graph: /static/graphs/{}", output);
        }
    }

    Ok(())
}

/// dscan paths
pub async fn cmd_paths(host: &str, port: u16) -> anyhow::Result<()> {
    let client = Client::new();
    let url = format!("{}/scan_paths", base_url(host, port));

    let response = client
        .get(&url)
        .send()
        .await
        .map_err(|e| handle_request_error(e, host, port))?;
    let body = json_body(response).await?;

    let empty_vec = vec![];
    for option in body.as_array().unwrap_or(&empty_vec) {
        let display = option["display"].as_str().unwrap_or("?");
        let path = option["path"].as_str().unwrap_or("?");
        if display == path {
            println!("{}", path);
        } else {
            println!("{:<24}{}", display, path);
        }
    }
    Ok(())
}

/// dscan log
pub async fn cmd_log(host: &str, port: u16, tail: Option<usize>) -> anyhow::Result<()> {
    let client = Client::new();
    let mut url = format!("{}/scan_log", base_url(host, port));
    if let Some(n) = tail {
        url.push_str(&format!("?tail={}", n));
    }

    let response = client
        .get(&url)
        .send()
        .await
        .map_err(|e| handle_request_error(e, host, port))?;

    if !response.status().is_success() {
        return json_body(response).await.map(|_| ());
    }

    let content = response
        .text()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to read response: {}", e))?;
    if content.is_empty() {
        println!("Command log is empty.");
    } else {
        print!("{}", content);
        if !content.ends_with('\n') {
            println!();
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_relative_time_seconds() {
        let dt = Utc::now() - Duration::seconds(5);
        assert!(format_relative_time(&dt).ends_with("seconds ago"));
    }

    #[test]
    fn test_relative_time_hours() {
        let dt = Utc::now() - Duration::hours(3);
        assert_eq!(format_relative_time(&dt), "3 hours ago");
    }

    #[test]
    fn test_relative_time_future_clamps_to_zero() {
        let dt = Utc::now() + Duration::minutes(5);
        assert_eq!(format_relative_time(&dt), "0 seconds ago");
    }

    #[test]
    fn test_summarize_takes_first_line() {
        let diag = "Error indexing with duc: Command 'duc index /' failed with code 1.\nStdout: \nStderr: boom";
        assert_eq!(
            summarize(diag, 200),
            "Error indexing with duc: Command 'duc index /' failed with code 1."
        );
    }

    #[test]
    fn test_summarize_truncates() {
        assert_eq!(summarize("abcdefghij", 6), "abc...");
        assert_eq!(summarize("", 6), "");
    }

    #[tokio::test]
    async fn test_unreachable_server_reports_connection_error() {
        // Nothing listens on port 1.
        let err = cmd_status("127.0.0.1", 1, false).await.unwrap_err();
        assert!(err.to_string().contains("Could not connect to server"));
    }
}
