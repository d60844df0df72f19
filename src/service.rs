//! Request dispatcher: one fallback handler that walks every inbound
//! request through the gate sequence (access guard, path validation,
//! negotiation, read-only policy) and hands survivors to the bridge.

use crate::ServerConfig;
use crate::backend::{self, GitService};
use crate::bridge;
use crate::http::ServeError;

use anyhow::Context;
use axum::Router;
use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, Request, Response, StatusCode, header};
use axum::response::IntoResponse;

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

/// Coarse perimeter check, not authentication: loopback is always
/// permitted, plus the single configured client address when it matches.
/// Everything else is denied, including when no allow-list is configured.
fn permitted(remote: IpAddr, config: &ServerConfig) -> bool {
    remote.is_loopback() || config.allowed_client == Some(remote)
}

/// True unless the server is read-only and the negotiated sub-command
/// would write. Consulted once per request, after negotiation.
fn allowed(service: GitService, config: &ServerConfig) -> bool {
    !config.read_only || service == GitService::UploadPack
}

/// Proxy-supplied address when one parses, otherwise the connection peer.
fn effective_remote_addr(headers: &HeaderMap, peer: SocketAddr) -> IpAddr {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or_else(|| peer.ip())
}

/// A path is accepted only if it is already in normalized form. Anything
/// a normalization pass would rewrite is rejected outright, so `..` and
/// friends never reach subprocess argument construction.
fn is_normalized(path: &str) -> bool {
    if !path.starts_with('/') || path.contains("//") || path.contains('\\') {
        return false;
    }
    !path
        .split('/')
        .any(|segment| segment == "." || segment == "..")
}

async fn call_service(
    State(config): State<Arc<ServerConfig>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    req: Request<Body>,
) -> Result<Response<Body>, ServeError> {
    let remote = effective_remote_addr(req.headers(), peer);

    tracing::info!(
        method = %req.method(),
        path = %req.uri().path(),
        remote = %remote,
        "request"
    );

    if !permitted(remote, &config) {
        return Err(ServeError::AccessDenied);
    }

    let path = percent_encoding::percent_decode_str(req.uri().path())
        .decode_utf8_lossy()
        .to_string();

    if !is_normalized(&path) {
        return Err(ServeError::MalformedPath);
    }

    let repository = path.split('/').nth(1).unwrap_or("").to_string();

    // Negotiation depends only on the URL, so it runs while the body is
    // still arriving.
    let op = backend::negotiate(req.method(), &path, req.uri().query())?;

    // Policy gate fires strictly before any subprocess is spawned.
    if !allowed(op.service, &config) {
        return Err(ServeError::ReadOnly);
    }

    let mut cmd = tokio::process::Command::new(op.service.command());
    cmd.args(&op.args);
    // Discrete argv element, never interpolated through a shell.
    cmd.arg(&repository);
    cmd.current_dir(&config.working_dir);

    let content_type = op.content_type;
    let body = bridge::bridge(req, cmd, op.advertisement).await?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, content_type)],
        body,
    )
        .into_response())
}

pub fn make_router(config: Arc<ServerConfig>) -> Router {
    Router::new()
        .fallback(call_service)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(config)
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install CTRL+C signal handler");
}

/// Server entry point: binds the listener and serves until the process
/// is interrupted. The configuration is immutable from here on.
pub async fn run(config: ServerConfig) -> anyhow::Result<()> {
    let listener =
        tokio::net::TcpListener::bind((config.bind_host.as_str(), config.bind_port))
            .await
            .with_context(|| {
                format!("failed to bind {}:{}", config.bind_host, config.bind_port)
            })?;
    let addr = listener.local_addr()?;

    eprintln!(
        "listening on http://{} in {}",
        addr,
        config.working_dir.display()
    );

    let app = make_router(Arc::new(config));
    let server_future = async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .context("server error")
    };

    tokio::select!(
        r = server_future => tracing::error!("http server exited: {:?}", r),
        _ = shutdown_signal() => tracing::info!("shutdown requested"),
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn config(allowed_client: Option<IpAddr>, read_only: bool) -> ServerConfig {
        ServerConfig {
            working_dir: PathBuf::from("/tmp"),
            bind_host: "127.0.0.1".to_string(),
            bind_port: 0,
            allowed_client,
            read_only,
        }
    }

    #[test]
    fn loopback_is_always_permitted() {
        let config = config(None, false);
        assert!(permitted("127.0.0.1".parse().unwrap(), &config));
        assert!(permitted("::1".parse().unwrap(), &config));
    }

    #[test]
    fn missing_allow_list_denies_non_loopback() {
        let config = config(None, false);
        assert!(!permitted("10.0.0.7".parse().unwrap(), &config));
    }

    #[test]
    fn allow_listed_client_is_permitted() {
        let config = config(Some("10.0.0.7".parse().unwrap()), false);
        assert!(permitted("10.0.0.7".parse().unwrap(), &config));
        assert!(!permitted("10.0.0.8".parse().unwrap(), &config));
    }

    #[test]
    fn readonly_policy() {
        let writable = config(None, false);
        assert!(allowed(GitService::UploadPack, &writable));
        assert!(allowed(GitService::ReceivePack, &writable));

        let readonly = config(None, true);
        assert!(allowed(GitService::UploadPack, &readonly));
        assert!(!allowed(GitService::ReceivePack, &readonly));
    }

    #[test]
    fn normalized_paths() {
        assert!(is_normalized("/repo.git/info/refs"));
        assert!(is_normalized("/"));
        assert!(is_normalized("/repo.git/git-upload-pack"));

        assert!(!is_normalized("/../etc/passwd"));
        assert!(!is_normalized("/repo.git/../other.git/info/refs"));
        assert!(!is_normalized("//repo.git/info/refs"));
        assert!(!is_normalized("/repo.git/./info/refs"));
        assert!(!is_normalized("repo.git/info/refs"));
    }

    #[test]
    fn forwarded_address_wins_when_valid() {
        let peer: SocketAddr = "192.0.2.9:55555".parse().unwrap();

        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "10.0.0.7, 192.0.2.1".parse().unwrap());
        assert_eq!(
            effective_remote_addr(&headers, peer),
            "10.0.0.7".parse::<IpAddr>().unwrap()
        );

        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "not-an-address".parse().unwrap());
        assert_eq!(effective_remote_addr(&headers, peer), peer.ip());

        assert_eq!(effective_remote_addr(&HeaderMap::new(), peer), peer.ip());
    }
}
