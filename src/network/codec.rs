use async_trait::async_trait;
use bincode::Options;
use futures::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use libp2p::{request_response, StreamProtocol};
use serde::{de::DeserializeOwned, Serialize};
use std::io::{Error, ErrorKind};

use super::messages::{Ack, Envelope, WirePayload};
use crate::util::errors::{HistorianError, Result};

// 10MB - state snapshots can be large, but not unbounded
pub const MAX_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

/// Protocol used for directed sends to a subset of peers
pub const DIRECT_PROTOCOL: &str = "/historian/direct/1.0.0";

/// bincode configuration shared by every encoder and decoder
fn bincode_options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_varint_encoding()
        .with_limit(MAX_MESSAGE_SIZE as u64)
}

/// Serialize with size limit
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let encoded = bincode_options().serialize(value)?;

    if encoded.len() > MAX_MESSAGE_SIZE {
        return Err(HistorianError::Codec(format!(
            "encoded message of {} bytes exceeds limit",
            encoded.len()
        )));
    }

    Ok(encoded)
}

/// Deserialize with size validation
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    if bytes.len() > MAX_MESSAGE_SIZE {
        return Err(HistorianError::Codec(format!(
            "message of {} bytes exceeds limit",
            bytes.len()
        )));
    }

    Ok(bincode_options().deserialize(bytes)?)
}

/// Wrap a payload into a wire envelope
pub fn seal<T: WirePayload>(payload: &T, sequence: u64) -> Result<Envelope> {
    Ok(Envelope {
        tag: T::TYPE_TAG.to_string(),
        sequence,
        body: encode(payload)?,
    })
}

/// Unwrap a payload, checking the envelope carries the expected type
pub fn open<T: WirePayload>(envelope: &Envelope) -> Result<T> {
    if envelope.tag != T::TYPE_TAG {
        return Err(HistorianError::Codec(format!(
            "expected '{}' payload, got '{}'",
            T::TYPE_TAG,
            envelope.tag
        )));
    }

    decode(&envelope.body)
}

/// Length-prefixed bincode frames for the request-response protocol
#[derive(Debug, Clone, Default)]
pub struct EnvelopeCodec;

async fn read_frame<T, V>(io: &mut T) -> std::io::Result<V>
where
    T: AsyncRead + Unpin + Send,
    V: DeserializeOwned,
{
    // Read 4-byte length prefix to know exact message size
    let mut len_bytes = [0u8; 4];
    io.read_exact(&mut len_bytes).await?;
    let len = u32::from_be_bytes(len_bytes) as usize;

    if len > MAX_MESSAGE_SIZE {
        return Err(Error::new(
            ErrorKind::InvalidData,
            format!("Frame size {} exceeds maximum {}", len, MAX_MESSAGE_SIZE),
        ));
    }

    if len == 0 {
        return Err(Error::new(ErrorKind::InvalidData, "Frame size cannot be zero"));
    }

    let mut buffer = vec![0u8; len];
    io.read_exact(&mut buffer).await?;

    decode(&buffer).map_err(|e| Error::new(ErrorKind::InvalidData, e.to_string()))
}

async fn write_frame<T, V>(io: &mut T, value: &V) -> std::io::Result<()>
where
    T: AsyncWrite + Unpin + Send,
    V: Serialize,
{
    let bytes = encode(value).map_err(|e| Error::new(ErrorKind::InvalidData, e.to_string()))?;

    // Write 4-byte length prefix + payload
    let len = bytes.len() as u32;
    io.write_all(&len.to_be_bytes()).await?;
    io.write_all(&bytes).await?;
    io.flush().await?;
    Ok(())
}

#[async_trait]
impl request_response::Codec for EnvelopeCodec {
    type Protocol = StreamProtocol;
    type Request = Envelope;
    type Response = Ack;

    async fn read_request<T>(&mut self, _protocol: &Self::Protocol, io: &mut T) -> std::io::Result<Envelope>
    where
        T: AsyncRead + Unpin + Send,
    {
        read_frame(io).await
    }

    async fn read_response<T>(&mut self, _protocol: &Self::Protocol, io: &mut T) -> std::io::Result<Ack>
    where
        T: AsyncRead + Unpin + Send,
    {
        read_frame(io).await
    }

    async fn write_request<T>(
        &mut self,
        _protocol: &Self::Protocol,
        io: &mut T,
        req: Envelope,
    ) -> std::io::Result<()>
    where
        T: AsyncWrite + Unpin + Send,
    {
        write_frame(io, &req).await
    }

    async fn write_response<T>(
        &mut self,
        _protocol: &Self::Protocol,
        io: &mut T,
        res: Ack,
    ) -> std::io::Result<()>
    where
        T: AsyncWrite + Unpin + Send,
    {
        write_frame(io, &res).await
    }
}
