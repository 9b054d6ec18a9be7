//! Line-delimited JSON framing for one client socket

use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter, ReadHalf, WriteHalf};
use tokio::net::UnixStream;

use super::protocol::Request;

#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Connection closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, ConnectionError>;

pub type LineReader = BufReader<ReadHalf<UnixStream>>;
pub type LineWriter = BufWriter<WriteHalf<UnixStream>>;

/// Split a socket into buffered read and write halves
pub fn split(stream: UnixStream) -> (LineReader, LineWriter) {
    let (read_half, write_half) = tokio::io::split(stream);
    (BufReader::new(read_half), BufWriter::new(write_half))
}

/// Read the next request line. Blank lines and EOF close the connection.
pub async fn read_request(reader: &mut LineReader) -> Result<Request> {
    let mut line = String::new();
    let bytes_read = reader.read_line(&mut line).await?;

    if bytes_read == 0 || line.trim().is_empty() {
        return Err(ConnectionError::Closed);
    }

    let request: Request = serde_json::from_str(line.trim())?;
    Ok(request)
}

/// Write one message followed by a newline, then flush
pub async fn write_message<T: Serialize>(writer: &mut LineWriter, message: &T) -> Result<()> {
    let json = serde_json::to_string(message)?;

    writer.write_all(json.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ipc::protocol::{RequestId, Response};
    use serde_json::json;
    use tempfile::TempDir;
    use tokio::net::UnixListener;

    #[tokio::test]
    async fn test_request_response_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let socket_path = temp_dir.path().join("test.sock");
        let listener = UnixListener::bind(&socket_path).unwrap();

        let client = tokio::spawn(async move {
            let stream = UnixStream::connect(socket_path).await.unwrap();
            let (mut reader, mut writer) = split(stream);
            let request = Request::new("server.time", None, RequestId::Number(7));
            write_message(&mut writer, &request).await.unwrap();

            let mut line = String::new();
            reader.read_line(&mut line).await.unwrap();
            serde_json::from_str::<Response>(&line).unwrap()
        });

        let (stream, _) = listener.accept().await.unwrap();
        let (mut reader, mut writer) = split(stream);
        let request = read_request(&mut reader).await.unwrap();
        assert_eq!(request.method, "server.time");

        let response = Response::success(json!({"now": 1}), request.id);
        write_message(&mut writer, &response).await.unwrap();

        let response = client.await.unwrap();
        assert_eq!(response.id, RequestId::Number(7));
        assert_eq!(response.result.unwrap()["now"], 1);
    }

    #[tokio::test]
    async fn test_eof_is_closed() {
        let temp_dir = TempDir::new().unwrap();
        let socket_path = temp_dir.path().join("eof.sock");
        let listener = UnixListener::bind(&socket_path).unwrap();

        let client = tokio::spawn(async move {
            let stream = UnixStream::connect(socket_path).await.unwrap();
            drop(stream);
        });

        let (stream, _) = listener.accept().await.unwrap();
        client.await.unwrap();
        let (mut reader, _writer) = split(stream);
        assert!(matches!(
            read_request(&mut reader).await,
            Err(ConnectionError::Closed)
        ));
    }
}
