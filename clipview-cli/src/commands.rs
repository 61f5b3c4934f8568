//! CLI command implementations

use std::sync::Arc;

use clap::Subcommand;
use clipview_core::actions::{ActionTrigger, action_triggers};
use clipview_core::capability::classify;
use clipview_core::config::ClipviewConfig;
use clipview_core::resolver::{PathResolver, ProtectedRoutes, ResolvedResources};
use clipview_core::{ClipviewError, MediaFile, Result};
use serde::Serialize;
use tracing::info;

/// User agent assumed by `resolve` when none is given.
const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Start the preview server
    Server {
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,
        /// Port to bind to
        #[arg(short, long)]
        port: Option<u16>,
        /// Public origin used in shareable links
        #[arg(long)]
        base_url: Option<String>,
        /// Origin of the storage file API
        #[arg(long)]
        upstream: Option<String>,
        /// Protected route and its hashed token, as `ROUTE=TOKEN`
        #[arg(long = "protect", value_name = "ROUTE=TOKEN")]
        protected: Vec<String>,
    },
    /// Print the URLs, capability and actions for a file as JSON
    Resolve {
        /// Storage path of the file
        path: String,
        /// Access token for protected routes
        #[arg(short, long)]
        token: Option<String>,
        /// Client user agent to classify
        #[arg(long, default_value = DEFAULT_USER_AGENT)]
        user_agent: String,
    },
}

/// Handle the CLI command
///
/// # Errors
///
/// - `ClipviewError::Configuration` - Malformed `--protect` value
/// - `ClipviewError::Server` - Preview server failed to start or stopped
pub async fn handle_command(command: Commands) -> Result<()> {
    match command {
        Commands::Server {
            host,
            port,
            base_url,
            upstream,
            protected,
        } => start_server(host, port, base_url, upstream, protected).await,
        Commands::Resolve {
            path,
            token,
            user_agent,
        } => resolve_file(path, token, user_agent),
    }
}

async fn start_server(
    host: Option<String>,
    port: Option<u16>,
    base_url: Option<String>,
    upstream: Option<String>,
    protected: Vec<String>,
) -> Result<()> {
    let mut config = ClipviewConfig::from_env();
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    if let Some(base_url) = base_url {
        config.server.base_url = base_url.trim_end_matches('/').to_string();
    }
    if let Some(upstream) = upstream {
        config.server.upstream_origin = upstream.trim_end_matches('/').to_string();
    }

    let tokens = parse_protected_routes(&protected)?;
    info!(
        host = %config.server.host,
        port = config.server.port,
        protected_routes = protected.len(),
        "Starting preview server"
    );

    clipview_web::run_server(config, Arc::new(tokens))
        .await
        .map_err(ClipviewError::from_server_error)
}

/// Resolution printed by `resolve`.
#[derive(Debug, Serialize)]
struct ResolveOutput {
    file: MediaFile,
    capability: String,
    resources: ResolvedResources,
    actions: Vec<ActionTrigger>,
}

fn resolve_file(path: String, token: Option<String>, user_agent: String) -> Result<()> {
    let config = ClipviewConfig::from_env();
    let file = MediaFile::from_path(path);
    let resources = PathResolver::new(&config).resolve(&file.path, token.as_deref());
    let capability = classify(&user_agent, &file.name);
    let actions = action_triggers(&resources, &config.server.base_url, &config.base_hostname());

    let output = ResolveOutput {
        capability: capability.to_string(),
        file,
        resources,
        actions,
    };
    let json = serde_json::to_string_pretty(&output).map_err(|e| ClipviewError::Configuration {
        reason: format!("could not serialize resolution: {e}"),
    })?;
    println!("{json}");
    Ok(())
}

/// Parses `ROUTE=TOKEN` pairs into a token store.
fn parse_protected_routes(pairs: &[String]) -> Result<ProtectedRoutes> {
    let mut routes = ProtectedRoutes::new();
    for pair in pairs {
        let (route, token) = pair
            .split_once('=')
            .filter(|(route, token)| route.starts_with('/') && !token.is_empty())
            .ok_or_else(|| ClipviewError::Configuration {
                reason: format!("expected ROUTE=TOKEN with an absolute route, got {pair:?}"),
            })?;
        routes.insert(route, token);
    }
    Ok(routes)
}

#[cfg(test)]
mod tests {
    use clipview_core::resolver::TokenStore;

    use super::*;

    #[test]
    fn test_parse_protected_routes() {
        let routes =
            parse_protected_routes(&["/Private=abc".to_string(), "/Private/Deep=def".to_string()])
                .unwrap();
        assert_eq!(routes.stored_token("/Private/a.mp4").as_deref(), Some("abc"));
        assert_eq!(routes.stored_token("/Private/Deep/b.mp4").as_deref(), Some("def"));
        assert_eq!(routes.stored_token("/Public/c.mp4"), None);
    }

    #[test]
    fn test_parse_protected_routes_rejects_malformed() {
        let error = parse_protected_routes(&["Private".to_string()]).unwrap_err();
        assert!(error.is_user_error());
        assert!(parse_protected_routes(&["relative=abc".to_string()]).is_err());
        assert!(parse_protected_routes(&["/Private=".to_string()]).is_err());
    }
}
