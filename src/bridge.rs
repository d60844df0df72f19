//! Process bridge: runs the transport subprocess for one exchange and
//! relays bytes between it and the HTTP streams without buffering whole
//! payloads.

use axum::body::Body;
use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};
use http::Request;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio_util::io::ReaderStream;

use std::io;
use std::process::Stdio;

async fn copy_request_body_to_stdin(
    req: Request<Body>,
    mut stdin: tokio::process::ChildStdin,
) -> io::Result<()> {
    let data_stream = req.into_body().into_data_stream();
    let stream_of_bytes = TryStreamExt::map_err(data_stream, io::Error::other);
    let async_read = tokio_util::io::StreamReader::new(stream_of_bytes);

    let mut req_body = std::pin::pin!(async_read);

    tokio::io::copy(&mut req_body, &mut stdin).await?;
    stdin.flush().await?;

    Ok(())
}

async fn monitor_process_completion(
    mut child: tokio::process::Child,
    mut stderr: tokio::process::ChildStderr,
) -> io::Result<()> {
    let mut err_output = Vec::new();
    stderr.read_to_end(&mut err_output).await?;

    let status = child.wait().await?;

    if !status.success() {
        let stderr_str = String::from_utf8_lossy(&err_output);
        tracing::error!(
            "transport subprocess exited with non-zero status: {:?}, stderr: {}",
            status,
            stderr_str
        );
    } else if !err_output.is_empty() {
        tracing::debug!(
            stderr = %String::from_utf8_lossy(&err_output),
            "transport subprocess stderr"
        );
    }

    Ok(())
}

/// Spawn `cmd` and wire it up: the request body feeds its stdin, its
/// stdout becomes the response body, with `advertisement` (when present)
/// emitted first. Both directions progress concurrently; nothing inspects
/// or reorders the relayed bytes.
///
/// The caller provides the argument vector and working directory on
/// `cmd`; the pipes are set up here. A spawn failure surfaces as an
/// error instead of a hanging connection. If the client disconnects,
/// the response stream is dropped, the child sees its pipes close and
/// exits, and the monitor task reaps it.
pub async fn bridge(
    req: Request<Body>,
    mut cmd: tokio::process::Command,
    advertisement: Option<Bytes>,
) -> io::Result<Body> {
    cmd.stdin(Stdio::piped());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    let mut child = cmd.spawn()?;

    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| io::Error::other("unable to open stdin"))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| io::Error::other("unable to open stdout"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| io::Error::other("unable to open stderr"))?;

    tokio::spawn(async move {
        if let Err(e) = copy_request_body_to_stdin(req, stdin).await {
            // An aborted client upload cancels this exchange only.
            tracing::error!("failed to copy request body to subprocess stdin: {}", e);
        }
    });

    tokio::spawn(async move {
        if let Err(e) = monitor_process_completion(child, stderr).await {
            tracing::error!("failed to monitor transport subprocess: {}", e);
        }
    });

    let stdout_stream = ReaderStream::new(BufReader::new(stdout));

    let body = match advertisement {
        Some(preamble) => {
            let head = futures::stream::once(async move { Ok::<_, io::Error>(preamble) });
            Body::from_stream(head.chain(stdout_stream))
        }
        None => Body::from_stream(stdout_stream),
    };

    Ok(body)
}
