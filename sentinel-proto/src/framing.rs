//! Length-prefixed `bincode` framing over any `AsyncRead + AsyncWrite`, used for both the
//! mTLS agent<->server channel and the in-process test doubles in `sentinel-agent`'s tests.

use serde::{Serialize, de::DeserializeOwned};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

const MAX_FRAME_LEN: u32 = 16 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    Io(#[from] std::io::Error),
    Encode(#[from] bincode::error::EncodeError),
    Decode(#[from] bincode::error::DecodeError),
    FrameTooLarge(u32),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

fn bincode_config() -> bincode::config::Configuration {
    bincode::config::standard()
}

pub async fn write_frame<W, T>(writer: &mut W, value: &T) -> Result<(), Error>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let payload = bincode::serde::encode_to_vec(value, bincode_config())?;
    let len: u32 = payload.len().try_into().map_err(|_| Error::FrameTooLarge(u32::MAX))?;
    writer.write_all(&len.to_le_bytes()).await?;
    writer.write_all(&payload).await?;
    writer.flush().await?;
    Ok(())
}

pub async fn read_frame<R, T>(reader: &mut R) -> Result<T, Error>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).await?;
    let len = u32::from_le_bytes(len_buf);
    if len > MAX_FRAME_LEN {
        return Err(Error::FrameTooLarge(len));
    }
    let mut buf = vec![0u8; len as usize];
    reader.read_exact(&mut buf).await?;
    let (value, _) = bincode::serde::decode_from_slice(&buf, bincode_config())?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AgentMessage, ServerMessage};

    #[tokio::test]
    async fn round_trips_server_message() {
        let (mut client, mut server) = tokio::io::duplex(4096);
        let msg = ServerMessage::UpdateContainer {
            request_id: "r1".to_string(),
            container: "web".to_string(),
            target_image: "nginx:1.27".to_string(),
        };
        write_frame(&mut client, &msg).await.unwrap();
        let got: ServerMessage = read_frame(&mut server).await.unwrap();
        match got {
            ServerMessage::UpdateContainer { request_id, container, target_image } => {
                assert_eq!(request_id, "r1");
                assert_eq!(container, "web");
                assert_eq!(target_image, "nginx:1.27");
            }
            _ => panic!("wrong variant"),
        }
    }

    #[tokio::test]
    async fn round_trips_agent_heartbeat() {
        let (mut client, mut server) = tokio::io::duplex(4096);
        let msg = AgentMessage::Heartbeat {
            host_id: "h1".to_string(),
            agent_version: "1.2.3".to_string(),
            features: vec!["journal".to_string()],
        };
        write_frame(&mut client, &msg).await.unwrap();
        let got: AgentMessage = read_frame(&mut server).await.unwrap();
        assert!(matches!(got, AgentMessage::Heartbeat { .. }));
    }

    #[tokio::test]
    async fn oversized_frame_is_rejected() {
        let (mut client, mut server) = tokio::io::duplex(64);
        client.write_all(&(MAX_FRAME_LEN + 1).to_le_bytes()).await.unwrap();
        let result: Result<ServerMessage, Error> = read_frame(&mut server).await;
        assert!(matches!(result, Err(Error::FrameTooLarge(_))));
    }
}
