//! Connection and message handling

use super::protocol::{
    decode_client_message, encode_server_message, ClientMessage, ServerMessage, MAX_HEADER_BYTES,
};
use super::ServerResult;
use crate::error::{AudioError, Result};
use crate::service::{validate_extension, KeyService};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use uuid::Uuid;

pub(super) async fn handle_connection(
    stream: TcpStream,
    service: Arc<KeyService>,
) -> ServerResult<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
        line.clear();
        let read = (&mut reader)
            .take(MAX_HEADER_BYTES as u64)
            .read_line(&mut line)
            .await?;
        if read == 0 {
            // Connection closed
            break;
        }
        if read >= MAX_HEADER_BYTES && !line.ends_with('\n') {
            let reason = format!("request header exceeds {} bytes", MAX_HEADER_BYTES);
            reject_malformed(&mut writer, &reason).await?;
            break;
        }
        if line.trim().is_empty() {
            continue;
        }

        let request = match decode_client_message(&line) {
            Ok(request) => request,
            Err(e) => {
                // Body framing is unknown from here on, so the connection ends
                reject_malformed(&mut writer, &e.to_string()).await?;
                break;
            }
        };

        let id = request.id();
        match request {
            ClientMessage::Status { .. } => {
                write_message(&mut writer, &ServerMessage::new_status(id)).await?;
            }
            ClientMessage::Analyze {
                filename,
                content_length,
                ..
            } => {
                if let Err(e) = precheck(&service, &filename, content_length) {
                    reject(&mut writer, id, &e).await?;
                    break;
                }
                let body = read_body(&mut reader, content_length).await?;

                let svc = Arc::clone(&service);
                let response = match run_blocking(move || svc.analyze(&filename, &body)).await {
                    Ok(estimate) => ServerMessage::new_key(id, estimate),
                    Err(e) => {
                        log::warn!("Analyze request {} failed: {}", id, e);
                        ServerMessage::from_error(id, &e)
                    }
                };
                write_message(&mut writer, &response).await?;
            }
            ClientMessage::Transpose {
                filename,
                content_length,
                shift,
                format,
                ..
            } => {
                if let Err(e) = precheck(&service, &filename, content_length) {
                    reject(&mut writer, id, &e).await?;
                    break;
                }
                let body = read_body(&mut reader, content_length).await?;

                let svc = Arc::clone(&service);
                let outcome = run_blocking(move || {
                    let download = svc.transpose(&filename, &body, shift, format.as_deref())?;
                    match download.read() {
                        Ok(bytes) => Ok((download, bytes)),
                        Err(e) => {
                            download.complete();
                            Err(e)
                        }
                    }
                })
                .await;

                match outcome {
                    Ok((download, bytes)) => {
                        let header = ServerMessage::new_file(
                            id,
                            download.filename().to_string(),
                            download.mime_type(),
                            bytes.len() as u64,
                        );
                        let sent = send_file(&mut writer, &header, &bytes).await;
                        // Removed once sent, whether or not the client kept up
                        download.complete();
                        sent?;
                    }
                    Err(e) => {
                        log::warn!("Transpose request {} failed: {}", id, e);
                        write_message(&mut writer, &ServerMessage::from_error(id, &e)).await?;
                    }
                }
            }
        }
    }

    Ok(())
}

/// Checks that need only the header line
fn precheck(service: &KeyService, filename: &str, content_length: u64) -> Result<()> {
    validate_extension(filename, &service.config().allowed_extensions)?;
    service.check_declared_size(content_length)?;
    Ok(())
}

async fn reject_malformed(writer: &mut OwnedWriteHalf, reason: &str) -> ServerResult<()> {
    log::warn!("Malformed request: {}", reason);
    let response = ServerMessage::Error {
        id: Uuid::nil(),
        kind: "validation".to_string(),
        error: format!("Malformed request: {}", reason),
        client_error: true,
    };
    write_message(writer, &response).await
}

async fn reject(writer: &mut OwnedWriteHalf, id: Uuid, err: &AudioError) -> ServerResult<()> {
    log::info!("Rejected request {}: {}", id, err);
    write_message(writer, &ServerMessage::from_error(id, err)).await
}

async fn read_body(reader: &mut BufReader<OwnedReadHalf>, content_length: u64) -> ServerResult<Vec<u8>> {
    let mut body = vec![0u8; content_length as usize];
    reader.read_exact(&mut body).await?;
    Ok(body)
}

/// Run pipeline work on the blocking pool
///
/// A task that panics or is cancelled surfaces as `AudioError::Interrupted`.
async fn run_blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(work).await {
        Ok(result) => result,
        Err(e) => Err(AudioError::Interrupted(format!(
            "processing task did not complete: {}",
            e
        ))),
    }
}

async fn write_message(writer: &mut OwnedWriteHalf, message: &ServerMessage) -> ServerResult<()> {
    let encoded = encode_server_message(message)?;
    writer.write_all(encoded.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

async fn send_file(
    writer: &mut OwnedWriteHalf,
    header: &ServerMessage,
    bytes: &[u8],
) -> ServerResult<()> {
    let encoded = encode_server_message(header)?;
    writer.write_all(encoded.as_bytes()).await?;
    writer.write_all(bytes).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_panicking_work_is_interrupted() {
        let result: Result<()> = run_blocking(|| panic!("boom")).await;
        assert!(matches!(result, Err(AudioError::Interrupted(_))));
    }

    #[tokio::test]
    async fn test_blocking_result_is_passed_through() {
        let result = run_blocking(|| Ok(41 + 1)).await;
        assert_eq!(result.unwrap(), 42);
    }
}
