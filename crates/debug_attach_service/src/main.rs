use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::error::ErrorKind;
use clap::Parser;
use debug_attach_core::{AttachConfig, AttachService, RequestServer};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug, Default, PartialEq)]
#[command(
    name = "debug_attach_service",
    about = "Debug Attach Service - Godot C# Debugger Helper"
)]
struct Cli {
    /// Port to listen on (127.0.0.1 only) [default: 47632]
    #[arg(short, long, value_name = "PORT", allow_hyphen_values = true)]
    port: Option<String>,

    /// Directory searched for a workspace when a request does not name one
    #[arg(long, value_name = "DIR")]
    project_root: Option<PathBuf>,
}

/// Keeps only the flags the CLI knows, so unknown arguments never abort startup.
fn split_args(args: impl IntoIterator<Item = String>) -> (Vec<String>, Vec<String>) {
    let mut kept = Vec::new();
    let mut ignored = Vec::new();
    let mut args = args.into_iter();
    kept.extend(args.next());

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => kept.push(arg),
            "-p" | "--port" | "--project-root" => match args.next() {
                Some(value) => {
                    kept.push(arg);
                    kept.push(value);
                }
                None => ignored.push(arg),
            },
            _ if arg.starts_with("--port=") || arg.starts_with("--project-root=") => {
                kept.push(arg)
            }
            _ => ignored.push(arg),
        }
    }

    (kept, ignored)
}

/// Layers CLI values over `base`; values that do not parse are skipped.
fn apply_cli(mut base: AttachConfig, cli: &Cli) -> AttachConfig {
    if let Some(port) = &cli.port {
        match port.trim().parse::<u16>() {
            Ok(port) => base.port = port,
            Err(_) => tracing::warn!("Ignoring invalid port '{}', using {}", port, base.port),
        }
    }
    if let Some(root) = &cli.project_root {
        base.project_root = Some(root.clone());
    }
    base
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (args, ignored) = split_args(
        std::env::args_os().map(|arg| arg.to_string_lossy().into_owned()),
    );

    let parsed = Cli::try_parse_from(&args);
    if let Err(e) = &parsed {
        if e.kind() == ErrorKind::DisplayHelp {
            e.print()?;
            return Ok(());
        }
    }

    init_tracing();
    for arg in &ignored {
        tracing::warn!("Ignoring unrecognised argument '{}'", arg);
    }
    let cli = parsed.unwrap_or_else(|e| {
        tracing::warn!("Ignoring command line: {}", e.kind());
        Cli::default()
    });

    let config = apply_cli(AttachConfig::from_env(), &cli);
    tracing::info!(
        "Starting debug attach service (port {}, project root {})",
        config.port,
        config
            .effective_project_root()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<none>".to_string())
    );

    let service = Arc::new(AttachService::new(config));
    let server = RequestServer::bind(service)
        .await
        .context("failed to start debug attach service")?;

    server
        .serve(async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => tracing::info!("Ctrl+C received"),
                Err(e) => {
                    tracing::error!("Unable to listen for Ctrl+C: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        })
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use debug_attach_core::config::DEFAULT_PORT;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn split_args_drops_unknown_flags() {
        let (kept, ignored) = split_args(args(&[
            "svc",
            "--verbose",
            "-p",
            "5000",
            "stray",
            "--project-root=/games/demo",
        ]));
        assert_eq!(kept, args(&["svc", "-p", "5000", "--project-root=/games/demo"]));
        assert_eq!(ignored, args(&["--verbose", "stray"]));
    }

    #[test]
    fn split_args_ignores_flag_without_value() {
        let (kept, ignored) = split_args(args(&["svc", "--port"]));
        assert_eq!(kept, args(&["svc"]));
        assert_eq!(ignored, args(&["--port"]));
    }

    #[test]
    fn cli_port_overrides_config() {
        let cli = Cli::try_parse_from(args(&["svc", "--port", "5001"])).unwrap();
        let config = apply_cli(AttachConfig::default(), &cli);
        assert_eq!(config.port, 5001);
        assert_eq!(config.project_root, None);
    }

    #[test]
    fn cli_invalid_port_falls_back() {
        for bad in ["abc", "70000", "-5"] {
            let (kept, _) = split_args(args(&["svc", "-p", bad]));
            let cli = Cli::try_parse_from(kept).unwrap();
            let config = apply_cli(AttachConfig::default(), &cli);
            assert_eq!(config.port, DEFAULT_PORT, "{bad}");
        }
    }

    #[test]
    fn cli_project_root_is_applied() {
        let cli = Cli::try_parse_from(args(&["svc", "--project-root", "/games/demo"])).unwrap();
        let config = apply_cli(AttachConfig::new(4000), &cli);
        assert_eq!(config.port, 4000);
        assert_eq!(config.project_root, Some(PathBuf::from("/games/demo")));
    }

    #[test]
    fn help_flag_requests_usage() {
        for flag in ["-h", "--help"] {
            let err = Cli::try_parse_from(args(&["svc", flag])).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::DisplayHelp);
            assert!(err.to_string().contains("Godot C# Debugger Helper"));
        }
    }
}
