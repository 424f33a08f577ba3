use std::path::Path;

/// dscan serve
pub async fn cmd_serve(
    config: Option<&str>,
    data_dir: Option<&str>,
    host_override: Option<&str>,
    port_override: Option<u16>,
) -> anyhow::Result<()> {
    crate::daemon::start_server(
        config.map(Path::new),
        data_dir.map(Path::new),
        host_override,
        port_override,
    )
    .await
}
