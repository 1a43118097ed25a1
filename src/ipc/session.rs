//! Bridge sessions: one thread per socket connection
//!
//! A connection whose first frame is `Attach` becomes a surface: it gets an
//! `Attached` reply, then every broker event as an `Event` frame until it
//! disconnects or is closed. Any other first frame makes it an anonymous
//! client whose requests carry no origin.
//!
//! Writes time out: a surface that stops reading is disconnected and
//! unsubscribed instead of queueing events forever.

use anyhow::{anyhow, Context, Result};
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, error, info, warn};

use crate::constants::bridge::WRITE_TIMEOUT_MS;
use crate::ipc::{read_message, write_message, BridgeRequest, BridgeResponse, BridgeServer};
use crate::surface::{SurfaceEvent, SurfaceId, SurfaceKind};
use crate::sync::BrokerHandle;

type SharedWriter = Arc<Mutex<UnixStream>>;

/// Spawn the accept loop for bridge connections
pub fn spawn_listener(server: BridgeServer, handle: BrokerHandle) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        if let Err(e) = run_listener(&server, &handle) {
            error!(error = ?e, "Bridge listener thread crashed");
        }
    })
}

fn run_listener(server: &BridgeServer, handle: &BrokerHandle) -> Result<()> {
    info!(socket = %server.path().display(), "Bridge listener started");

    loop {
        let stream = server.accept()?;
        let handle = handle.clone();
        std::thread::spawn(move || {
            if let Err(e) = serve_connection(stream, handle, Duration::from_millis(WRITE_TIMEOUT_MS)) {
                debug!(error = ?e, "Bridge session ended with error");
            }
        });
    }
}

/// Run one connection to completion
pub(crate) fn serve_connection(stream: UnixStream, handle: BrokerHandle, write_timeout: Duration) -> Result<()> {
    stream
        .set_write_timeout(Some(write_timeout))
        .context("Failed to set bridge write timeout")?;
    let mut reader = stream
        .try_clone()
        .context("Failed to clone bridge stream")?;
    let writer: SharedWriter = Arc::new(Mutex::new(stream));

    let first: BridgeRequest = read_message(&mut reader)?;
    let (handle, surface) = match first {
        BridgeRequest::Attach(kind) => {
            // Panels start hidden until OpenSettings, like the in-process one
            let visible = kind != SurfaceKind::SettingsPanel;
            let attached = handle.attach_blocking(kind, visible)?;
            info!(surface = %attached.id, kind = ?kind, "Surface connected over bridge");
            send(
                &writer,
                &BridgeResponse::Attached {
                    surface: attached.id,
                    settings: attached.settings,
                },
            )?;
            spawn_event_writer(attached.id, attached.events, writer.clone());
            (handle.for_surface(attached.id), Some(attached.id))
        }
        request => {
            dispatch(&handle, &writer, request)?;
            (handle, None)
        }
    };

    let result = loop {
        let request: BridgeRequest = match read_message(&mut reader) {
            Ok(request) => request,
            Err(e) => {
                debug!(error = ?e, "Bridge connection closed");
                break Ok(());
            }
        };
        if let Err(e) = dispatch(&handle, &writer, request) {
            break Err(e);
        }
    };

    if let Some(id) = surface {
        info!(surface = %id, "Bridge surface disconnected");
        handle.detach(id);
    }
    result
}

fn dispatch(handle: &BrokerHandle, writer: &SharedWriter, request: BridgeRequest) -> Result<()> {
    if let Some(reply) = handle.request_blocking(request)? {
        send(writer, &reply)?;
    }
    Ok(())
}

fn send(writer: &SharedWriter, response: &BridgeResponse) -> Result<()> {
    let mut stream = writer
        .lock()
        .map_err(|_| anyhow!("Bridge writer lock poisoned"))?;
    write_message(&mut *stream, response)
}

/// Forward broker events to the socket until the subscription ends.
/// Exiting drops `events`, so the broker unsubscribes the surface on its next send.
fn spawn_event_writer(id: SurfaceId, mut events: UnboundedReceiver<SurfaceEvent>, writer: SharedWriter) {
    std::thread::spawn(move || {
        while let Some(event) = events.blocking_recv() {
            let closing = event == SurfaceEvent::Close;
            if let Err(e) = send(&writer, &BridgeResponse::Event(event)) {
                warn!(surface = %id, error = ?e, "Failed to push event to bridge surface, disconnecting it");
                break;
            }
            if closing {
                break;
            }
        }

        // Unblocks the reader side so the session can finish
        if let Ok(stream) = writer.lock() {
            let _ = stream.shutdown(Shutdown::Both);
        }
        debug!(surface = %id, "Bridge event writer stopped");
    });
}
