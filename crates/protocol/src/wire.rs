//! Wire-Format fuer TCP-Verbindungen
//!
//! ```text
//! +--------+--------+--------+--------+----...----+
//! | Laenge (u32 BE)                   | JSON       |
//! +--------+--------+--------+--------+----...----+
//! ```
//!
//! Die Laenge zaehlt nur die Payload-Bytes. Frames ueber der konfigurierten
//! Grenze (Standard 1 MiB) und Payloads, die kein gueltiges [`Message`]-Objekt
//! sind, fuehren zu `InvalidData`; der Aufrufer schliesst dann die Verbindung.

use bytes::{Buf, BufMut, BytesMut};
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::codec::{Decoder, Encoder};

use crate::message::Message;

/// Standard-maximale Frame-Groesse (1 MiB)
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Groesse des Laengen-Felds in Bytes
pub const LENGTH_FIELD_SIZE: usize = 4;

fn ungueltig(msg: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg)
}

fn laenge_pruefen(laenge: usize, max_frame_size: usize) -> io::Result<()> {
    if laenge > max_frame_size {
        return Err(ungueltig(format!(
            "Frame zu gross: {} Bytes (Maximum: {} Bytes)",
            laenge, max_frame_size
        )));
    }
    Ok(())
}

/// Serialisiert eine Nachricht und prueft die Groessengrenze
fn payload_erzeugen(message: &Message, max_frame_size: usize) -> io::Result<Vec<u8>> {
    let json = serde_json::to_vec(message)
        .map_err(|e| ungueltig(format!("JSON-Serialisierung fehlgeschlagen: {}", e)))?;
    laenge_pruefen(json.len(), max_frame_size)?;
    Ok(json)
}

fn payload_lesen(payload: &[u8]) -> io::Result<Message> {
    serde_json::from_slice(payload)
        .map_err(|e| ungueltig(format!("JSON-Deserialisierung fehlgeschlagen: {}", e)))
}

// ---------------------------------------------------------------------------
// FrameCodec
// ---------------------------------------------------------------------------

/// tokio-util Codec fuer `Framed<TcpStream, FrameCodec>`
#[derive(Debug, Clone)]
pub struct FrameCodec {
    max_frame_size: usize,
}

impl FrameCodec {
    pub fn new() -> Self {
        Self::with_max_size(DEFAULT_MAX_FRAME_SIZE)
    }

    pub fn with_max_size(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }

    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for FrameCodec {
    type Item = Message;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < LENGTH_FIELD_SIZE {
            return Ok(None);
        }

        let mut laenge_bytes = [0u8; LENGTH_FIELD_SIZE];
        laenge_bytes.copy_from_slice(&src[..LENGTH_FIELD_SIZE]);
        let laenge = u32::from_be_bytes(laenge_bytes) as usize;
        laenge_pruefen(laenge, self.max_frame_size)?;

        let gesamt = LENGTH_FIELD_SIZE + laenge;
        if src.len() < gesamt {
            src.reserve(gesamt - src.len());
            return Ok(None);
        }

        src.advance(LENGTH_FIELD_SIZE);
        let payload = src.split_to(laenge);
        payload_lesen(&payload).map(Some)
    }
}

impl Encoder<Message> for FrameCodec {
    type Error = io::Error;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let json = payload_erzeugen(&item, self.max_frame_size)?;
        dst.reserve(LENGTH_FIELD_SIZE + json.len());
        dst.put_u32(json.len() as u32);
        dst.put_slice(&json);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Direktes async Lesen/Schreiben (Test-Clients, Werkzeuge)
// ---------------------------------------------------------------------------

/// Liest genau einen Frame
pub async fn read_frame<R>(reader: &mut R, max_frame_size: usize) -> io::Result<Message>
where
    R: AsyncRead + Unpin,
{
    let laenge = reader.read_u32().await? as usize;
    laenge_pruefen(laenge, max_frame_size)?;

    let mut payload = vec![0u8; laenge];
    reader.read_exact(&mut payload).await?;
    payload_lesen(&payload)
}

/// Schreibt genau einen Frame
pub async fn write_frame<W>(writer: &mut W, message: &Message, max_frame_size: usize) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let json = payload_erzeugen(message, max_frame_size)?;
    writer.write_u32(json.len() as u32).await?;
    writer.write_all(&json).await?;
    writer.flush().await
}
