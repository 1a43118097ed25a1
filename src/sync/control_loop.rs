//! The single control thread
//!
//! All merging, persistence and broadcast dispatch happen here, one command
//! at a time in arrival order. The only timer is the debounced persist owned
//! by the store; a new continuous edit reschedules it.

use anyhow::{anyhow, Context, Result};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Instant;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use crate::config::{SettingsRecord, SettingsStore};
use crate::ipc::{BridgeRequest, BridgeResponse};
use crate::lifecycle::{CloseDecision, LifecycleController, QuitTrigger};
use crate::surface::{menu, IntentSink, SurfaceEvent, SurfaceId, SurfaceKind};
use crate::sync::broker::{Broker, IntentOutcome};
use crate::sync::intent::{ChangeIntent, SaveResult};

/// Messages into the control loop
pub enum Command {
    /// Subscribe a surface and register it with the lifecycle
    Attach {
        kind: SurfaceKind,
        visible: bool,
        events: UnboundedSender<SurfaceEvent>,
        reply: oneshot::Sender<(SurfaceId, SettingsRecord)>,
    },
    /// A surface went away (connection closed, task ended)
    Detach(SurfaceId),
    /// A bridge request from a surface (`origin`) or an anonymous client
    Request {
        origin: Option<SurfaceId>,
        request: BridgeRequest,
        reply: Option<oneshot::Sender<BridgeResponse>>,
    },
    /// Startup finished: initial surfaces are constructed
    Started,
    Quit(QuitTrigger),
    /// Fails (or panics) inside the handler
    #[cfg(test)]
    Fault { panic: bool },
}

/// A surface freshly attached to the broker
pub struct AttachedSurface {
    pub id: SurfaceId,
    pub settings: SettingsRecord,
    pub events: UnboundedReceiver<SurfaceEvent>,
}

/// Cloneable sender side of the control loop
#[derive(Clone)]
pub struct BrokerHandle {
    commands: UnboundedSender<Command>,
    origin: Option<SurfaceId>,
}

impl BrokerHandle {
    /// Same channel, with requests attributed to `id`
    pub fn for_surface(&self, id: SurfaceId) -> Self {
        Self {
            commands: self.commands.clone(),
            origin: Some(id),
        }
    }

    pub fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| anyhow!("Control loop is no longer running"))
    }

    fn attach_command(
        &self,
        kind: SurfaceKind,
        visible: bool,
    ) -> Result<(oneshot::Receiver<(SurfaceId, SettingsRecord)>, UnboundedReceiver<SurfaceEvent>)> {
        let (events_tx, events_rx) = unbounded_channel();
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(Command::Attach {
            kind,
            visible,
            events: events_tx,
            reply: reply_tx,
        })?;
        Ok((reply_rx, events_rx))
    }

    pub async fn attach(&self, kind: SurfaceKind, visible: bool) -> Result<AttachedSurface> {
        let (reply, events) = self.attach_command(kind, visible)?;
        let (id, settings) = reply.await.context("Control loop dropped attach request")?;
        Ok(AttachedSurface { id, settings, events })
    }

    /// For plain threads (socket sessions); must not be called on the runtime
    pub fn attach_blocking(&self, kind: SurfaceKind, visible: bool) -> Result<AttachedSurface> {
        let (reply, events) = self.attach_command(kind, visible)?;
        let (id, settings) = reply
            .blocking_recv()
            .context("Control loop dropped attach request")?;
        Ok(AttachedSurface { id, settings, events })
    }

    fn request_command(&self, request: BridgeRequest) -> Result<Option<oneshot::Receiver<BridgeResponse>>> {
        let (reply_tx, reply_rx) = if request.expects_reply() {
            let (tx, rx) = oneshot::channel();
            (Some(tx), Some(rx))
        } else {
            (None, None)
        };
        self.send(Command::Request {
            origin: self.origin,
            request,
            reply: reply_tx,
        })?;
        Ok(reply_rx)
    }

    #[cfg(test)]
    pub async fn request(&self, request: BridgeRequest) -> Result<Option<BridgeResponse>> {
        match self.request_command(request)? {
            Some(rx) => Ok(Some(rx.await.context("Control loop dropped request")?)),
            None => Ok(None),
        }
    }

    pub fn request_blocking(&self, request: BridgeRequest) -> Result<Option<BridgeResponse>> {
        match self.request_command(request)? {
            Some(rx) => Ok(Some(rx.blocking_recv().context("Control loop dropped request")?)),
            None => Ok(None),
        }
    }

    pub fn detach(&self, id: SurfaceId) {
        if self.send(Command::Detach(id)).is_err() {
            debug!(surface = %id, "Detach after control loop exit");
        }
    }

    pub fn quit(&self, trigger: QuitTrigger) -> Result<()> {
        self.send(Command::Quit(trigger))
    }
}

impl IntentSink for BrokerHandle {
    fn emit(&mut self, request: BridgeRequest) -> Result<()> {
        self.request_command(request).map(|_| ())
    }
}

/// Summary returned when the loop exits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitReport {
    pub trigger: QuitTrigger,
    pub settings: SettingsRecord,
    pub saves: u64,
}

enum Flow {
    Continue,
    Exit(QuitTrigger),
}

pub struct ControlLoop {
    broker: Broker,
    lifecycle: LifecycleController,
    commands: UnboundedReceiver<Command>,
}

impl ControlLoop {
    pub fn new(store: SettingsStore) -> (Self, BrokerHandle) {
        let (commands_tx, commands_rx) = unbounded_channel();
        let control = Self {
            broker: Broker::new(store),
            lifecycle: LifecycleController::new(),
            commands: commands_rx,
        };
        let handle = BrokerHandle {
            commands: commands_tx,
            origin: None,
        };
        (control, handle)
    }

    /// Process commands until a quit completes
    pub async fn run(mut self) -> ExitReport {
        info!("Control loop running");

        let trigger = loop {
            let deadline = self.broker.store().pending_deadline();
            let command = tokio::select! {
                command = self.commands.recv() => command,
                _ = sleep_until(deadline) => {
                    self.broker.persist_if_due(now());
                    continue;
                }
            };

            let Some(command) = command else {
                info!("All bridge handles dropped");
                self.quit(QuitTrigger::AllSurfacesClosed);
                break QuitTrigger::AllSurfacesClosed;
            };

            match catch_unwind(AssertUnwindSafe(|| self.handle(command))) {
                Ok(Ok(Flow::Continue)) => {}
                Ok(Ok(Flow::Exit(trigger))) => break trigger,
                Ok(Err(e)) => error!(error = ?e, "Command handling error"),
                Err(_) => error!("Command handler panicked, continuing"),
            }
        };

        ExitReport {
            trigger,
            settings: self.broker.settings().clone(),
            saves: self.broker.store().save_count(),
        }
    }

    fn handle(&mut self, command: Command) -> Result<Flow> {
        match command {
            Command::Attach {
                kind,
                visible,
                events,
                reply,
            } => {
                let (id, settings) = self.broker.subscribe(kind, events);
                self.lifecycle.register(id, kind, visible);
                if reply.send((id, settings)).is_err() {
                    warn!(surface = %id, "Attaching surface vanished before reply");
                    self.broker.unsubscribe(id);
                    self.lifecycle.destroy(id);
                }
                Ok(Flow::Continue)
            }

            Command::Detach(id) => {
                self.broker.unsubscribe(id);
                match self.lifecycle.on_surface_gone(id) {
                    Some(trigger) => Ok(self.quit(trigger)),
                    None => Ok(Flow::Continue),
                }
            }

            Command::Request {
                origin,
                request,
                reply,
            } => {
                debug!(origin = ?origin, request = ?request, "Bridge request");
                let (response, flow) = self.handle_request(origin, request);
                if let (Some(reply), Some(response)) = (reply, response)
                    && reply.send(response).is_err()
                {
                    debug!(origin = ?origin, "Requester went away before reply");
                }
                Ok(flow)
            }

            Command::Started => {
                self.lifecycle.mark_running();
                Ok(Flow::Continue)
            }

            Command::Quit(trigger) => Ok(self.quit(trigger)),

            #[cfg(test)]
            Command::Fault { panic } => {
                if panic {
                    panic!("injected handler panic");
                }
                Err(anyhow!("injected handler error"))
            }
        }
    }

    fn handle_request(&mut self, origin: Option<SurfaceId>, request: BridgeRequest) -> (Option<BridgeResponse>, Flow) {
        match request {
            BridgeRequest::Attach(_) => (
                Some(BridgeResponse::Error(
                    "Attach is only valid as the first message on a connection".to_string(),
                )),
                Flow::Continue,
            ),

            BridgeRequest::LoadSettings => (
                Some(BridgeResponse::Settings(self.broker.settings().clone())),
                Flow::Continue,
            ),

            BridgeRequest::SaveSettings(patch) => {
                let outcome = self.apply(origin, ChangeIntent::Commit(patch));
                let save = outcome.save.unwrap_or_else(SaveResult::ok);
                (Some(BridgeResponse::SaveResult(save)), Flow::Continue)
            }

            BridgeRequest::UpdateRing(patch) => {
                self.apply(origin, ChangeIntent::Continuous(patch));
                (None, Flow::Continue)
            }

            BridgeRequest::ToggleRing => {
                self.apply(origin, ChangeIntent::ToggleRing);
                (None, Flow::Continue)
            }

            BridgeRequest::QuitApp => (None, self.quit(QuitTrigger::QuitAction)),

            BridgeRequest::OpenSettings => {
                let panels = self.lifecycle.live_of_kind(SurfaceKind::SettingsPanel);
                if panels.is_empty() {
                    warn!("Open settings requested but no settings panel exists");
                }
                for id in panels {
                    if self.lifecycle.set_visible(id, true) {
                        self.broker.notify(id, SurfaceEvent::Show);
                    }
                }
                (None, Flow::Continue)
            }

            BridgeRequest::CloseSettings => {
                let mut flow = Flow::Continue;
                for id in self.lifecycle.live_of_kind(SurfaceKind::SettingsPanel) {
                    if let Flow::Exit(trigger) = self.close_surface(id) {
                        flow = Flow::Exit(trigger);
                        break;
                    }
                }
                (None, flow)
            }

            BridgeRequest::CloseSurface => match origin {
                Some(id) => (None, self.close_surface(id)),
                None => {
                    debug!("CloseSurface from an unattached client ignored");
                    (None, Flow::Continue)
                }
            },

            BridgeRequest::ShowContextMenu => {
                let entries = menu::entries_for(self.broker.settings());
                // Attached surfaces (in-process ones included) get the menu as an event
                if let Some(id) = origin {
                    self.broker.notify(id, SurfaceEvent::ContextMenu(entries.clone()));
                }
                (Some(BridgeResponse::Menu(entries)), Flow::Continue)
            }
        }
    }

    fn apply(&mut self, origin: Option<SurfaceId>, intent: ChangeIntent) -> IntentOutcome {
        let outcome = self.broker.apply(origin, intent, now());
        debug!(
            origin = ?origin,
            changed = outcome.changed,
            delivered = outcome.delivered,
            "Intent applied"
        );
        outcome
    }

    fn close_surface(&mut self, id: SurfaceId) -> Flow {
        match self.lifecycle.on_close_requested(id) {
            CloseDecision::Hide => {
                if self.lifecycle.set_visible(id, false) {
                    self.broker.notify(id, SurfaceEvent::Hide);
                }
                Flow::Continue
            }
            CloseDecision::Quit(trigger) => self.quit(trigger),
            CloseDecision::Destroy => {
                if self.lifecycle.destroy(id) {
                    self.broker.notify(id, SurfaceEvent::Close);
                    self.broker.unsubscribe(id);
                }
                Flow::Continue
            }
            CloseDecision::Ignore => Flow::Continue,
        }
    }

    /// Flush pending writes, then tear down every surface exactly once
    fn quit(&mut self, trigger: QuitTrigger) -> Flow {
        let Some(plan) = self.lifecycle.begin_quit(trigger) else {
            return Flow::Continue;
        };

        self.broker.flush();

        for id in plan.order {
            if self.lifecycle.destroy(id) {
                self.broker.notify(id, SurfaceEvent::Close);
                self.broker.unsubscribe(id);
            }
        }
        self.lifecycle.finish();
        Flow::Exit(plan.trigger)
    }
}

fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await,
        None => std::future::pending().await,
    }
}
