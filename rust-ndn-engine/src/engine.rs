//! The Interest/Data engine.
//!
//! Owns a [`Face`], decodes incoming frames on a reader task, dispatches
//! Interests to the longest-matching prefix handler and Data packets to
//! the pending-Interest table. Handler invocations for incoming packets
//! are serialised on the reader task; table locks are released before
//! any callback runs.

use crate::face::{Face, FaceConnection};
use crate::metrics::EngineMetrics;
use crate::mgmt::{self, ControlResponse};
use crate::security::Validator;
use crate::timer::Timer;
use bytes::Bytes;
use log::{debug, info, warn};
use rust_ndn_common::error::Error;
use rust_ndn_common::name::Name;
use rust_ndn_common::packet::{Data, DecodedData, DecodedInterest, Frame, Interest};
use rust_ndn_common::security::Signer;
use rust_ndn_common::wire::Wire;
use rust_ndn_common::Result;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Lifetime used for management command Interests.
const COMMAND_LIFETIME: Duration = Duration::from_secs(1);

/// Sends one encoded Data packet back towards the face.
pub type ReplyFunc = Arc<dyn Fn(Wire) -> Result<()> + Send + Sync>;

/// Everything a prefix handler is given for one incoming Interest.
pub struct InterestContext {
    pub interest: Interest,
    /// The full Interest frame as received.
    pub raw: Wire,
    /// The signature-covered portion, for signed Interests.
    pub sig_covered: Wire,
    pub reply: ReplyFunc,
    /// The Interest expires at this instant; replies after it are moot.
    pub deadline: Instant,
}

/// Callback invoked for Interests under an attached prefix.
pub type InterestHandler = Arc<dyn Fn(InterestContext) + Send + Sync>;

/// Outcome of an expressed Interest.
#[derive(Debug)]
pub enum ExpressResult {
    Data {
        data: Data,
        sig_covered: Wire,
        raw: Wire,
    },
    Nack {
        reason: u64,
    },
    Timeout,
    Cancelled,
}

struct PendingEntry {
    id: u64,
    name: Name,
    can_be_prefix: bool,
    tx: oneshot::Sender<ExpressResult>,
}

struct EngineInner {
    timer: Timer,
    signer: Arc<dyn Signer>,
    validator: Validator,
    running: AtomicBool,
    next_id: AtomicU64,
    face: Mutex<Option<Face>>,
    face_tx: Mutex<Option<mpsc::UnboundedSender<Bytes>>>,
    pending: Mutex<Vec<PendingEntry>>,
    handlers: Mutex<Vec<(Name, InterestHandler)>>,
    routes: Mutex<Vec<Name>>,
    reader: Mutex<Option<JoinHandle<()>>>,
    metrics: EngineMetrics,
}

/// Handle on the engine; cheap to clone and share.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl Engine {
    /// Build an engine over the given face. The signer signs outgoing
    /// command and parameterised Interests; the validator vets incoming
    /// Data before it satisfies a pending Interest.
    pub fn new(face: Face, timer: Timer, signer: Arc<dyn Signer>, validator: Validator) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                timer,
                signer,
                validator,
                running: AtomicBool::new(false),
                next_id: AtomicU64::new(1),
                face: Mutex::new(Some(face)),
                face_tx: Mutex::new(None),
                pending: Mutex::new(Vec::new()),
                handlers: Mutex::new(Vec::new()),
                routes: Mutex::new(Vec::new()),
                reader: Mutex::new(None),
                metrics: EngineMetrics::new(),
            }),
        }
    }

    pub fn timer(&self) -> Timer {
        self.inner.timer
    }

    pub fn signer(&self) -> Arc<dyn Signer> {
        Arc::clone(&self.inner.signer)
    }

    pub fn metrics(&self) -> &EngineMetrics {
        &self.inner.metrics
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// Open the face and spawn the reader task.
    pub async fn start(&self) -> Result<()> {
        let face = self
            .inner
            .face
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| Error::Transport("engine already started once".into()))?;
        let FaceConnection { tx, rx } = face.open().await?;
        *self.inner.face_tx.lock().unwrap() = Some(tx);
        self.inner.running.store(true, Ordering::SeqCst);

        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(run_reader(inner, rx));
        *self.inner.reader.lock().unwrap() = Some(handle);
        info!("engine started");
        Ok(())
    }

    /// Stop the engine: withdraw announced routes (best effort), cancel
    /// every pending Interest with `Cancelled`, drop all handlers and
    /// close the face. Further calls fail with `NotRunning`.
    pub fn shutdown(&self) {
        if !self.inner.running.swap(false, Ordering::SeqCst) {
            return;
        }
        info!("engine shutting down");

        let routes: Vec<Name> = self.inner.routes.lock().unwrap().drain(..).collect();
        if let Some(tx) = self.inner.face_tx.lock().unwrap().as_ref() {
            for route in &routes {
                match self.encode_command("unregister", route) {
                    Ok(wire) => {
                        let _ = tx.send(wire.join());
                    }
                    Err(e) => debug!("could not withdraw route {route}: {e}"),
                }
            }
        }

        let entries: Vec<PendingEntry> =
            self.inner.pending.lock().unwrap().drain(..).collect();
        for entry in entries {
            self.inner.metrics.interests_cancelled.increment();
            let _ = entry.tx.send(ExpressResult::Cancelled);
        }
        self.inner.metrics.pending_interests.set(0);
        self.inner.handlers.lock().unwrap().clear();
        *self.inner.face_tx.lock().unwrap() = None;
        if let Some(handle) = self.inner.reader.lock().unwrap().take() {
            handle.abort();
        }
    }

    /// Register a handler for Interests under `prefix`. Rejects a
    /// prefix equal to, covering or covered by an existing one.
    pub fn attach_handler(&self, prefix: &Name, handler: InterestHandler) -> Result<()> {
        self.ensure_running()?;
        let mut handlers = self.inner.handlers.lock().unwrap();
        for (existing, _) in handlers.iter() {
            if existing.is_prefix_of(prefix) || prefix.is_prefix_of(existing) {
                return Err(Error::DuplicatePrefix(prefix.to_string()));
            }
        }
        handlers.push((prefix.clone(), handler));
        debug!("attached handler at {prefix}");
        Ok(())
    }

    /// Remove the handler at exactly `prefix`. In-flight dispatches to
    /// it complete.
    pub fn detach_handler(&self, prefix: &Name) -> Result<()> {
        let mut handlers = self.inner.handlers.lock().unwrap();
        let before = handlers.len();
        handlers.retain(|(existing, _)| existing != prefix);
        if handlers.len() == before {
            return Err(Error::NotFound(prefix.to_string()));
        }
        debug!("detached handler at {prefix}");
        Ok(())
    }

    /// Express an Interest: encode (signing when it carries application
    /// parameters), write to the face, and arm a lifetime timer. The
    /// returned handle resolves with the outcome and can be cancelled.
    pub fn express(&self, mut interest: Interest) -> Result<ExpressHandle> {
        self.ensure_running()?;
        if interest.nonce.is_none() {
            interest.nonce = Some(self.inner.timer.nonce());
        }
        let encoded = if interest.app_param.is_some() {
            interest.encode_signed(self.inner.signer.as_ref())?
        } else {
            interest.encode()?
        };

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.inner.pending.lock().unwrap().push(PendingEntry {
            id,
            name: encoded.name.clone(),
            can_be_prefix: interest.can_be_prefix,
            tx,
        });
        self.inner.metrics.pending_interests.increment();

        if let Err(e) = self.inner.send_wire(&encoded.wire) {
            self.inner.take_pending(id);
            self.inner.metrics.pending_interests.decrement();
            return Err(e);
        }
        self.inner.metrics.interests_sent.increment();
        debug!("expressed interest {}", encoded.name);

        let deadline = Instant::now() + interest.lifetime_or_default();
        let timer_inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            tokio::time::sleep_until(deadline.into()).await;
            if let Some(entry) = timer_inner.take_pending(id) {
                timer_inner.metrics.interests_timed_out.increment();
                timer_inner.metrics.pending_interests.decrement();
                debug!("interest {} timed out", entry.name);
                let _ = entry.tx.send(ExpressResult::Timeout);
            }
        });

        Ok(ExpressHandle {
            id,
            inner: Arc::clone(&self.inner),
            rx,
        })
    }

    /// Write a pre-encoded Data packet to the face.
    pub fn produce(&self, wire: &Wire) -> Result<()> {
        self.ensure_running()?;
        self.inner.send_wire(wire)?;
        self.inner.metrics.data_sent.increment();
        Ok(())
    }

    /// Announce `prefix` to the forwarder via a signed rib/register
    /// command; requires a status-200 ControlResponse.
    pub async fn register_route(&self, prefix: &Name) -> Result<ControlResponse> {
        let response = self.execute_command("register", prefix).await?;
        if !response.is_success() {
            return Err(Error::Transport(format!(
                "rib/register {prefix} failed: {} {}",
                response.status_code, response.status_text
            )));
        }
        self.inner.routes.lock().unwrap().push(prefix.clone());
        info!("registered route {prefix}");
        Ok(response)
    }

    /// Withdraw a previously announced prefix.
    pub async fn unregister_route(&self, prefix: &Name) -> Result<ControlResponse> {
        let response = self.execute_command("unregister", prefix).await?;
        self.inner.routes.lock().unwrap().retain(|r| r != prefix);
        info!("unregistered route {prefix}");
        Ok(response)
    }

    async fn execute_command(&self, verb: &str, prefix: &Name) -> Result<ControlResponse> {
        let mut interest = Interest::new(mgmt::rib_command_name(verb, prefix))
            .with_can_be_prefix(true)
            .with_lifetime(COMMAND_LIFETIME);
        interest.app_param = Some(Wire::new());
        let handle = self.express(interest)?;
        match handle.wait().await {
            ExpressResult::Data { data, .. } => mgmt::parse_control_response(&data),
            ExpressResult::Nack { reason } => Err(Error::Nack(reason)),
            ExpressResult::Timeout => Err(Error::Timeout),
            ExpressResult::Cancelled => Err(Error::Cancelled),
        }
    }

    fn encode_command(&self, verb: &str, prefix: &Name) -> Result<Wire> {
        let mut interest = Interest::new(mgmt::rib_command_name(verb, prefix))
            .with_can_be_prefix(true)
            .with_lifetime(COMMAND_LIFETIME)
            .with_nonce(self.inner.timer.nonce());
        interest.app_param = Some(Wire::new());
        Ok(interest.encode_signed(self.inner.signer.as_ref())?.wire)
    }

    fn ensure_running(&self) -> Result<()> {
        if self.is_running() {
            Ok(())
        } else {
            Err(Error::NotRunning)
        }
    }
}

impl EngineInner {
    fn send_wire(&self, wire: &Wire) -> Result<()> {
        let frame = wire.join();
        self.metrics.bytes_sent.add(frame.len() as u64);
        let tx = self.face_tx.lock().unwrap();
        tx.as_ref()
            .ok_or(Error::NotRunning)?
            .send(frame)
            .map_err(|_| Error::Transport("face closed".into()))
    }

    fn take_pending(&self, id: u64) -> Option<PendingEntry> {
        let mut pending = self.pending.lock().unwrap();
        let idx = pending.iter().position(|e| e.id == id)?;
        Some(pending.swap_remove(idx))
    }

    fn make_reply(self: &Arc<Self>) -> ReplyFunc {
        let inner = Arc::clone(self);
        Arc::new(move |wire: Wire| {
            inner.send_wire(&wire)?;
            inner.metrics.data_sent.increment();
            Ok(())
        })
    }
}

/* ---------------------------------------------------------------- *
 * Express handle
 * ---------------------------------------------------------------- */

/// Pending outcome of [`Engine::express`].
pub struct ExpressHandle {
    id: u64,
    inner: Arc<EngineInner>,
    rx: oneshot::Receiver<ExpressResult>,
}

impl std::fmt::Debug for ExpressHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpressHandle").field("id", &self.id).finish()
    }
}

impl ExpressHandle {
    /// Wait for the Interest's outcome.
    pub async fn wait(self) -> ExpressResult {
        self.rx.await.unwrap_or(ExpressResult::Cancelled)
    }

    /// A detached canceller for this Interest.
    pub fn canceller(&self) -> ExpressCanceller {
        ExpressCanceller {
            id: self.id,
            inner: Arc::downgrade(&self.inner),
        }
    }
}

/// Cancels one expressed Interest; the handle resolves `Cancelled`.
#[derive(Clone)]
pub struct ExpressCanceller {
    id: u64,
    inner: Weak<EngineInner>,
}

impl ExpressCanceller {
    pub fn cancel(&self) {
        let Some(inner) = self.inner.upgrade() else {
            return;
        };
        if let Some(entry) = inner.take_pending(self.id) {
            inner.metrics.interests_cancelled.increment();
            inner.metrics.pending_interests.decrement();
            let _ = entry.tx.send(ExpressResult::Cancelled);
        }
    }
}

/* ---------------------------------------------------------------- *
 * Reader task
 * ---------------------------------------------------------------- */

async fn run_reader(inner: Arc<EngineInner>, mut rx: mpsc::UnboundedReceiver<Bytes>) {
    while let Some(frame) = rx.recv().await {
        inner.metrics.bytes_received.add(frame.len() as u64);
        let wire = Wire::from(frame);
        match Frame::decode(&wire) {
            Ok(Frame::Interest(decoded)) => dispatch_interest(&inner, decoded, wire),
            Ok(Frame::Data(decoded)) => dispatch_data(&inner, decoded, wire),
            Ok(Frame::Nack { reason, interest }) => dispatch_nack(&inner, reason, interest),
            Err(e) => {
                inner.metrics.decode_errors.increment();
                warn!("dropping undecodable frame: {e}");
            }
        }
    }
    debug!("face reader finished");
}

fn dispatch_interest(inner: &Arc<EngineInner>, decoded: DecodedInterest, raw: Wire) {
    inner.metrics.interests_received.increment();
    let name = decoded.interest.name.clone();

    let handler = {
        let handlers = inner.handlers.lock().unwrap();
        handlers
            .iter()
            .filter(|(prefix, _)| prefix.is_prefix_of(&name))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, handler)| Arc::clone(handler))
    };
    let Some(handler) = handler else {
        inner.metrics.interests_dropped.increment();
        debug!("no handler for interest {name}; dropping");
        return;
    };

    let deadline = Instant::now() + decoded.interest.lifetime_or_default();
    handler(InterestContext {
        interest: decoded.interest,
        raw,
        sig_covered: decoded.sig_covered,
        reply: inner.make_reply(),
        deadline,
    });
}

fn dispatch_data(inner: &Arc<EngineInner>, decoded: DecodedData, raw: Wire) {
    inner.metrics.data_received.increment();
    let name = &decoded.data.name;

    let found = {
        let pending = inner.pending.lock().unwrap();
        pending
            .iter()
            .filter(|e| e.name == *name || (e.can_be_prefix && e.name.is_prefix_of(name)))
            .max_by_key(|e| e.name.len())
            .map(|e| e.id)
    };
    let Some(id) = found else {
        debug!("data {name} matches no pending interest; dropping");
        return;
    };

    let valid = (inner.validator)(
        name,
        &decoded.sig_covered,
        decoded.data.sig_info.as_ref(),
        decoded.data.sig_value.as_ref(),
    );
    if !valid {
        warn!("dropping data {name}: signature rejected");
        return;
    }

    let Some(entry) = inner.take_pending(id) else {
        return;
    };
    inner.metrics.interests_satisfied.increment();
    inner.metrics.pending_interests.decrement();
    let _ = entry.tx.send(ExpressResult::Data {
        data: decoded.data,
        sig_covered: decoded.sig_covered,
        raw,
    });
}

fn dispatch_nack(inner: &Arc<EngineInner>, reason: u64, nacked: DecodedInterest) {
    let name = &nacked.interest.name;
    let found = {
        let pending = inner.pending.lock().unwrap();
        pending.iter().find(|e| e.name == *name).map(|e| e.id)
    };
    let Some(id) = found else {
        debug!("nack for {name} matches no pending interest");
        return;
    };
    if let Some(entry) = inner.take_pending(id) {
        inner.metrics.interests_nacked.increment();
        inner.metrics.pending_interests.decrement();
        debug!("interest {name} nacked (reason {reason})");
        let _ = entry.tx.send(ExpressResult::Nack { reason });
    }
}

#[cfg(test)]
mod tests;
