//! Inter-surface bridge over a Unix socket
//!
//! Surfaces running outside the control process (and one-shot CLI commands)
//! talk to the control loop with length-prefixed JSON over a Unix domain
//! socket.

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use tracing::warn;

mod messages;
pub mod session;

pub use messages::{BridgeRequest, BridgeResponse};

use crate::constants::bridge::{MAX_MESSAGE_SIZE, SOCKET_DIR, SOCKET_NAME};
use crate::surface::{IntentSink, SurfaceEvent};

/// Get default socket path (XDG_RUNTIME_DIR with fallback to cache)
pub fn default_socket_path() -> Result<PathBuf> {
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR")
        && !runtime_dir.is_empty()
    {
        return Ok(PathBuf::from(runtime_dir).join(SOCKET_DIR).join(SOCKET_NAME));
    }

    // Fallback to cache dir
    let cache = dirs::cache_dir()
        .context("Failed to determine cache directory (no XDG_RUNTIME_DIR or HOME)")?;
    Ok(cache.join(SOCKET_DIR).join(SOCKET_NAME))
}

/// Client connection to the control process
pub struct BridgeClient {
    pub(crate) stream: UnixStream,
}

impl BridgeClient {
    /// Connect to specific socket path
    pub fn connect_to(path: &Path) -> Result<Self> {
        let stream = UnixStream::connect(path)
            .context(format!("Failed to connect to lum-o-ring at {} (is it running?)", path.display()))?;
        Ok(Self { stream })
    }

    /// Send request without waiting
    pub fn send_request(&mut self, req: &BridgeRequest) -> Result<()> {
        write_message(&mut self.stream, req)
    }

    /// Receive next frame (blocking)
    pub fn recv_response(&mut self) -> Result<BridgeResponse> {
        read_message(&mut self.stream)
    }

    /// Send a request and wait for its reply, handing any surface events
    /// that arrive first to `on_event`. Returns None for fire-and-forget requests.
    pub fn request_with(
        &mut self,
        req: BridgeRequest,
        mut on_event: impl FnMut(SurfaceEvent),
    ) -> Result<Option<BridgeResponse>> {
        let expects_reply = req.expects_reply();
        self.send_request(&req)?;
        if !expects_reply {
            return Ok(None);
        }
        loop {
            match self.recv_response()? {
                BridgeResponse::Event(event) => on_event(event),
                BridgeResponse::Error(message) => bail!("lum-o-ring rejected request: {message}"),
                reply => return Ok(Some(reply)),
            }
        }
    }

    /// Send request and wait for reply, ignoring interleaved events
    pub fn request(&mut self, req: BridgeRequest) -> Result<Option<BridgeResponse>> {
        self.request_with(req, |_| {})
    }
}

impl IntentSink for BridgeClient {
    fn emit(&mut self, request: BridgeRequest) -> Result<()> {
        self.send_request(&request)
    }
}

/// Server listener for the control process
pub struct BridgeServer {
    listener: UnixListener,
    socket_path: PathBuf,
}

impl BridgeServer {
    /// Create server and bind to specific socket path.
    /// Fails if another instance is already answering on it.
    pub fn bind_to(socket_path: PathBuf) -> Result<Self> {
        // Create directory if needed
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent)
                .context(format!("Failed to create socket directory: {}", parent.display()))?;
        }

        if socket_path.exists() {
            if UnixStream::connect(&socket_path).is_ok() {
                bail!("Another lum-o-ring instance is already running at {}", socket_path.display());
            }
            warn!(path = %socket_path.display(), "Removing stale socket");
            std::fs::remove_file(&socket_path)
                .context(format!("Failed to remove stale socket: {}", socket_path.display()))?;
        }

        let listener = UnixListener::bind(&socket_path)
            .context(format!("Failed to bind socket at {}", socket_path.display()))?;

        // Set permissions to 0700 (owner only)
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&socket_path, std::fs::Permissions::from_mode(0o700))
                .context("Failed to set socket permissions")?;
        }

        Ok(Self {
            listener,
            socket_path,
        })
    }

    /// Accept incoming connection (blocking)
    pub fn accept(&self) -> Result<UnixStream> {
        let (stream, _addr) = self.listener.accept()
            .context("Failed to accept bridge connection")?;
        Ok(stream)
    }

    /// Get socket path
    pub fn path(&self) -> &Path {
        &self.socket_path
    }
}

impl Drop for BridgeServer {
    fn drop(&mut self) {
        // Clean up socket file
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

/// Write length-prefixed message to stream
pub(crate) fn write_message<T: Serialize>(stream: &mut impl Write, msg: &T) -> Result<()> {
    let json = serde_json::to_vec(msg).context("Failed to serialize message to JSON")?;

    if json.len() > MAX_MESSAGE_SIZE {
        return Err(anyhow!("Message too large: {} bytes (max: {})", json.len(), MAX_MESSAGE_SIZE));
    }

    // Write length prefix (u32 little-endian)
    let len = json.len() as u32;
    stream
        .write_all(&len.to_le_bytes())
        .context("Failed to write message length")?;

    // Write JSON payload
    stream
        .write_all(&json)
        .context("Failed to write message payload")?;

    stream.flush().context("Failed to flush stream")?;

    Ok(())
}

/// Read length-prefixed message from stream
pub(crate) fn read_message<T: for<'de> Deserialize<'de>>(stream: &mut impl Read) -> Result<T> {
    // Read length prefix
    let mut len_buf = [0u8; 4];
    stream
        .read_exact(&mut len_buf)
        .context("Failed to read message length")?;
    let len = u32::from_le_bytes(len_buf) as usize;

    // Sanity check (prevent DoS via huge allocation)
    if len > MAX_MESSAGE_SIZE {
        return Err(anyhow!("Message too large: {} bytes (max: {})", len, MAX_MESSAGE_SIZE));
    }

    // Read JSON payload
    let mut json_buf = vec![0u8; len];
    stream
        .read_exact(&mut json_buf)
        .context("Failed to read message payload")?;

    // Deserialize
    serde_json::from_slice(&json_buf).context("Failed to deserialize message from JSON")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SettingsPatch;
    use std::io::Cursor;
    use tempfile::TempDir;

    #[test]
    fn test_message_roundtrip_over_socket_pair() {
        let (mut a, mut b) = UnixStream::pair().unwrap();
        let request = BridgeRequest::SaveSettings(SettingsPatch {
            brightness: Some(50),
            ..Default::default()
        });
        write_message(&mut a, &request).unwrap();
        let received: BridgeRequest = read_message(&mut b).unwrap();
        assert_eq!(received, request);
    }

    #[test]
    fn test_oversized_length_prefix_is_rejected() {
        let mut frame = ((MAX_MESSAGE_SIZE + 1) as u32).to_le_bytes().to_vec();
        frame.extend_from_slice(b"{}");
        let result: Result<BridgeRequest> = read_message(&mut Cursor::new(frame));
        assert!(result.is_err());
    }

    #[test]
    fn test_truncated_frame_is_an_error() {
        let mut frame = 10u32.to_le_bytes().to_vec();
        frame.extend_from_slice(b"{\"Lo");
        let result: Result<BridgeRequest> = read_message(&mut Cursor::new(frame));
        assert!(result.is_err());
    }

    #[test]
    fn test_bind_replaces_stale_socket_and_cleans_up() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run/bridge.sock");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "stale").unwrap();

        let server = BridgeServer::bind_to(path.clone()).unwrap();
        assert_eq!(server.path(), path.as_path());
        drop(server);
        assert!(!path.exists());
    }

    #[test]
    fn test_second_instance_is_refused() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bridge.sock");
        let _first = BridgeServer::bind_to(path.clone()).unwrap();
        assert!(BridgeServer::bind_to(path).is_err());
    }

    #[test]
    fn test_fire_and_forget_request_does_not_wait() {
        let (a, mut b) = UnixStream::pair().unwrap();
        let mut client = BridgeClient { stream: a };
        let reply = client.request(BridgeRequest::ToggleRing).unwrap();
        assert_eq!(reply, None);
        let received: BridgeRequest = read_message(&mut b).unwrap();
        assert_eq!(received, BridgeRequest::ToggleRing);
    }

    #[test]
    fn test_request_skips_events_before_reply() {
        let (a, mut b) = UnixStream::pair().unwrap();
        let mut client = BridgeClient { stream: a };
        let settings = crate::config::SettingsRecord::default();
        write_message(&mut b, &BridgeResponse::Event(SurfaceEvent::Show)).unwrap();
        write_message(&mut b, &BridgeResponse::Settings(settings.clone())).unwrap();

        let mut seen = Vec::new();
        let reply = client
            .request_with(BridgeRequest::LoadSettings, |event| seen.push(event))
            .unwrap();
        assert_eq!(reply, Some(BridgeResponse::Settings(settings)));
        assert_eq!(seen, vec![SurfaceEvent::Show]);
    }
}
