//! Smart HTTP negotiation: classify a request into the transport
//! sub-command it asks for, without touching the pack protocol itself.

use crate::http::ServeError;
use axum::http::Method;
use bytes::Bytes;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GitService {
    UploadPack,
    ReceivePack,
}

impl GitService {
    pub fn name(&self) -> &'static str {
        match self {
            GitService::UploadPack => "git-upload-pack",
            GitService::ReceivePack => "git-receive-pack",
        }
    }

    /// The executable to spawn. Same spelling as the service name: git
    /// installs both sub-commands as standalone binaries.
    pub fn command(&self) -> &'static str {
        self.name()
    }

    pub fn advertisement_content_type(&self) -> &'static str {
        match self {
            GitService::UploadPack => "application/x-git-upload-pack-advertisement",
            GitService::ReceivePack => "application/x-git-receive-pack-advertisement",
        }
    }

    pub fn result_content_type(&self) -> &'static str {
        match self {
            GitService::UploadPack => "application/x-git-upload-pack-result",
            GitService::ReceivePack => "application/x-git-receive-pack-result",
        }
    }
}

impl FromStr for GitService {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "git-upload-pack" => Ok(GitService::UploadPack),
            "git-receive-pack" => Ok(GitService::ReceivePack),
            _ => Err(()),
        }
    }
}

/// One negotiated exchange: which sub-command to run, how to label the
/// response, and the bytes (if any) that must precede subprocess stdout.
#[derive(Debug)]
pub struct NegotiatedOperation {
    pub service: GitService,
    pub content_type: &'static str,
    pub args: Vec<&'static str>,
    /// Ref advertisements start with a pkt-line service announcement that
    /// the subprocess does not emit in --stateless-rpc mode.
    pub advertisement: Option<Bytes>,
}

/// Classify `method` + decoded `path` + raw query. Negotiation looks only
/// at the URL and headers, so it can run before the request body arrives.
pub fn negotiate(
    method: &Method,
    path: &str,
    query: Option<&str>,
) -> Result<NegotiatedOperation, ServeError> {
    if let Some(prefix) = path.strip_suffix("/info/refs") {
        if prefix.is_empty() {
            return Err(ServeError::Negotiation("repository not specified".into()));
        }
        if method != Method::GET {
            return Err(ServeError::Negotiation(format!(
                "method not supported for ref advertisement: {}",
                method
            )));
        }
        let service = service_from_query(query)?;
        return Ok(NegotiatedOperation {
            service,
            content_type: service.advertisement_content_type(),
            args: vec!["--stateless-rpc", "--advertise-refs"],
            advertisement: Some(advertisement_preamble(service)),
        });
    }

    if let Some(service) = path
        .rsplit_once('/')
        .and_then(|(prefix, last)| (!prefix.is_empty()).then_some(last))
        .and_then(|last| GitService::from_str(last).ok())
    {
        if method != Method::POST {
            return Err(ServeError::Negotiation(format!(
                "method not supported for {}: {}",
                service.name(),
                method
            )));
        }
        return Ok(NegotiatedOperation {
            service,
            content_type: service.result_content_type(),
            args: vec!["--stateless-rpc"],
            advertisement: None,
        });
    }

    Err(ServeError::Negotiation(format!(
        "unsupported request: {} {}",
        method, path
    )))
}

fn service_from_query(query: Option<&str>) -> Result<GitService, ServeError> {
    let service = query
        .unwrap_or("")
        .split('&')
        .find_map(|pair| pair.strip_prefix("service="))
        .ok_or_else(|| ServeError::Negotiation("service parameter required".into()))?;

    GitService::from_str(service)
        .map_err(|()| ServeError::Negotiation(format!("unsupported service: {}", service)))
}

/// `# service=<name>` as a pkt-line, followed by a flush packet. Sent
/// ahead of the subprocess output on ref advertisements.
fn advertisement_preamble(service: GitService) -> Bytes {
    let line = format!("# service={}\n", service.name());
    let mut buf = format!("{:04x}", line.len() + 4).into_bytes();
    buf.extend_from_slice(line.as_bytes());
    buf.extend_from_slice(b"0000");
    Bytes::from(buf)
}
