//! CwKeyer: sends Morse code by toggling DTR or RTS.
//!
//! Messages are queued on a bounded channel and keyed by a dedicated worker
//! thread so timing is not disturbed by the caller. `stop_sending()` clears
//! the queue and interrupts the message on the air; the line is always left
//! low afterwards.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{
    bounded, select, Receiver, RecvTimeoutError, Sender, TryRecvError, TrySendError,
};

use crate::domain::{PortId, PttError, PttResult};
use crate::ports::SerialFactory;
use crate::ptt::pin::{self, LineSelector};
use crate::ptt::source::{PortSource, SharedHandleProvider};
use crate::share::{PortHandle, SharedPortRegistry};

use super::morse::{self, DOT};
use super::timing::CwTiming;

/// Max number of messages waiting to be keyed
pub const QUEUE_SIZE: usize = 30;

/// How often `flush()` rechecks the outstanding count
const IDLE_POLL: Duration = Duration::from_millis(50);

struct Worker {
    text_tx: Sender<String>,
    abort_tx: Sender<()>,
    /// Second receiver on the text queue, used to drop pending messages
    drain_rx: Receiver<String>,
    /// Signalled when the last outstanding message has been keyed
    idle_rx: Receiver<()>,
    thread: JoinHandle<()>,
}

/// Morse keyer on a serial control line.
pub struct CwKeyer {
    source: PortSource,
    selector: LineSelector,
    wpm: Arc<AtomicU32>,
    /// Messages accepted by `send()` and not yet finished or dropped
    outstanding: Arc<AtomicUsize>,
    bound: Option<PortHandle>,
    worker: Option<Worker>,
}

impl CwKeyer {
    pub fn new(source: PortSource, selector: LineSelector, wpm: u32) -> PttResult<Self> {
        CwTiming::from_wpm(wpm)?;
        Ok(Self {
            source,
            selector,
            wpm: Arc::new(AtomicU32::new(wpm)),
            outstanding: Arc::new(AtomicUsize::new(0)),
            bound: None,
            worker: None,
        })
    }

    pub fn exclusive(
        port: impl Into<PortId>,
        factory: Arc<dyn SerialFactory>,
        selector: LineSelector,
        wpm: u32,
    ) -> PttResult<Self> {
        Self::new(PortSource::exclusive(port, factory), selector, wpm)
    }

    pub fn shared(
        registry: Arc<SharedPortRegistry>,
        provider: impl SharedHandleProvider + 'static,
        selector: LineSelector,
        wpm: u32,
    ) -> PttResult<Self> {
        Self::new(PortSource::shared(registry, provider), selector, wpm)
    }

    pub fn connect(&mut self) -> PttResult<()> {
        if let Some(handle) = &self.bound {
            if handle.is_open() {
                return Err(PttError::AlreadyConnected(handle.id().to_string()));
            }
            log::warn!("Keyer port {} went away, reconnecting", handle.id());
            self.disconnect();
        }

        let handle = self.source.bind()?;
        if let Err(e) = pin::resolve(self.selector, &handle, false) {
            self.source.unbind(&handle);
            return Err(e);
        }

        let (text_tx, text_rx) = bounded::<String>(QUEUE_SIZE);
        let (abort_tx, abort_rx) = bounded::<()>(1);
        let (idle_tx, idle_rx) = bounded::<()>(1);
        self.outstanding.store(0, Ordering::SeqCst);
        let transmitter = Transmitter {
            handle: handle.clone(),
            selector: self.selector,
            abort_rx,
            idle_tx,
            outstanding: Arc::clone(&self.outstanding),
        };
        let wpm = Arc::clone(&self.wpm);
        let drain_rx = text_rx.clone();
        let spawned = std::thread::Builder::new()
            .name("cw-keyer".to_string())
            .spawn(move || transmitter.run(&text_rx, &wpm));

        let thread = match spawned {
            Ok(thread) => thread,
            Err(e) => {
                self.source.unbind(&handle);
                return Err(PttError::Keyer(format!("Failed to start keyer thread: {e}")));
            }
        };

        log::info!("CW keyer connected on {} ({})", handle.id(), self.selector.line());
        self.bound = Some(handle);
        self.worker = Some(Worker {
            text_tx,
            abort_tx,
            drain_rx,
            idle_rx,
            thread,
        });
        Ok(())
    }

    /// Stop the worker, key up and give the port back.
    pub fn disconnect(&mut self) {
        if let Some(worker) = self.worker.take() {
            let Worker {
                text_tx,
                abort_tx,
                drain_rx,
                idle_rx: _,
                thread,
            } = worker;
            drain_rx.try_iter().for_each(drop);
            // Dropping both senders wakes the worker and interrupts any pause
            drop(text_tx);
            drop(abort_tx);
            drop(drain_rx);
            if thread.join().is_err() {
                log::error!("CW keyer thread panicked");
            }
            self.outstanding.store(0, Ordering::SeqCst);
        }

        let Some(handle) = self.bound.take() else {
            log::warn!("Keyer already disconnected!");
            return;
        };
        if handle.is_open() {
            if let Err(e) = pin::resolve(self.selector, &handle, false) {
                log::error!("Key up failed while disconnecting: {e}");
            }
        }
        self.source.unbind(&handle);
        log::info!("CW keyer disconnected from {}", handle.id());
    }

    pub fn is_connected(&self) -> bool {
        self.bound.as_ref().is_some_and(PortHandle::is_open)
    }

    /// Queue `text` for sending.
    pub fn send(&self, text: &str) -> PttResult<()> {
        let worker = self.worker.as_ref().ok_or(PttError::NotConnected)?;
        // Counted before the worker can see it, so it never finishes first
        self.outstanding.fetch_add(1, Ordering::SeqCst);
        match worker.text_tx.try_send(text.to_string()) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.outstanding.fetch_sub(1, Ordering::SeqCst);
                log::warn!("Max queue size reached!");
                Err(PttError::Keyer(format!("queue full ({QUEUE_SIZE} messages)")))
            }
            Err(TrySendError::Disconnected(_)) => {
                self.outstanding.fetch_sub(1, Ordering::SeqCst);
                Err(PttError::NotConnected)
            }
        }
    }

    /// Block until every message passed to `send()` has been keyed in full
    /// and the line is back up, or `timeout` runs out.
    pub fn flush(&self, timeout: Duration) -> PttResult<()> {
        let worker = self.worker.as_ref().ok_or(PttError::NotConnected)?;
        let deadline = Instant::now() + timeout;
        while self.outstanding.load(Ordering::SeqCst) > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(PttError::Keyer(format!(
                    "still sending after {} ms",
                    timeout.as_millis()
                )));
            }
            match worker.idle_rx.recv_timeout(remaining.min(IDLE_POLL)) {
                Ok(()) | Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return Err(PttError::NotConnected),
            }
        }
        Ok(())
    }

    /// Nothing queued and nothing on the air
    pub fn is_idle(&self) -> bool {
        self.outstanding.load(Ordering::SeqCst) == 0
    }

    /// Drop queued messages and cut the current one short.
    pub fn stop_sending(&self) {
        let Some(worker) = &self.worker else {
            return;
        };
        let dropped = worker.drain_rx.try_iter().count();
        if dropped > 0 {
            self.outstanding.fetch_sub(dropped, Ordering::SeqCst);
            log::debug!("Dropped {dropped} queued CW messages");
        }
        // A signal already pending does the same job
        let _ = worker.abort_tx.try_send(());
    }

    /// Change speed; takes effect from the next message.
    pub fn set_speed(&self, wpm: u32) -> PttResult<()> {
        CwTiming::from_wpm(wpm)?;
        self.wpm.store(wpm, Ordering::Relaxed);
        Ok(())
    }

    pub fn wpm(&self) -> u32 {
        self.wpm.load(Ordering::Relaxed)
    }

    /// Messages waiting behind the one on the air
    pub fn queued(&self) -> usize {
        self.worker.as_ref().map_or(0, |w| w.text_tx.len())
    }
}

impl Drop for CwKeyer {
    fn drop(&mut self) {
        if self.bound.is_some() || self.worker.is_some() {
            self.disconnect();
        }
    }
}

enum Wake {
    Text(String),
    Idle,
    Shutdown,
}

enum Interrupt {
    Aborted,
    Line(PttError),
}

impl From<PttError> for Interrupt {
    fn from(e: PttError) -> Self {
        Interrupt::Line(e)
    }
}

/// State owned by the keyer thread.
struct Transmitter {
    handle: PortHandle,
    selector: LineSelector,
    abort_rx: Receiver<()>,
    idle_tx: Sender<()>,
    outstanding: Arc<AtomicUsize>,
}

impl Transmitter {
    fn run(self, text_rx: &Receiver<String>, wpm: &AtomicU32) {
        loop {
            let wake = select! {
                recv(text_rx) -> msg => msg.map_or(Wake::Shutdown, Wake::Text),
                recv(self.abort_rx) -> signal => {
                    if signal.is_ok() { Wake::Idle } else { Wake::Shutdown }
                }
            };
            match wake {
                Wake::Text(text) => {
                    self.transmit(&text, wpm.load(Ordering::Relaxed));
                    self.finished();
                }
                // Stop requests while idle need no action
                Wake::Idle => {}
                Wake::Shutdown => break,
            }
        }
        self.key_up();
    }

    fn transmit(&self, text: &str, wpm: u32) {
        let timing = match CwTiming::from_wpm(wpm) {
            Ok(timing) => timing,
            Err(e) => {
                log::error!("{e}");
                return;
            }
        };
        log::debug!("CW TX at {wpm} WPM: {text}");
        match self.send_text(text, &timing) {
            Ok(()) => {}
            Err(Interrupt::Aborted) => log::info!("CW transmit interrupted."),
            Err(Interrupt::Line(e)) => log::error!("Error while keying CW: {e}"),
        }
        self.key_up();
        while self.abort_rx.try_recv().is_ok() {}
    }

    fn finished(&self) {
        if self.outstanding.fetch_sub(1, Ordering::SeqCst) == 1 {
            // A token already waiting wakes flush() just the same
            let _ = self.idle_tx.try_send(());
        }
    }

    fn send_text(&self, text: &str, timing: &CwTiming) -> Result<(), Interrupt> {
        let chars: Vec<char> = text.chars().collect();
        for (i, &c) in chars.iter().enumerate() {
            if c == ' ' {
                self.pause(timing.word_space)?;
                continue;
            }
            let Some(code) = morse::code_for(c) else {
                log::warn!("'{c}' has no Morse code; rest of message dropped");
                return Ok(());
            };
            let elements = code.len();
            for (j, element) in code.chars().enumerate() {
                let length = if element == DOT { timing.dot } else { timing.dash };
                self.mark(length)?;
                if j + 1 < elements {
                    self.pause(timing.mark_space)?;
                }
            }
            // A following space supplies its own gap
            if chars.get(i + 1).is_some_and(|next| *next != ' ') {
                self.pause(timing.char_space)?;
            }
        }
        Ok(())
    }

    fn mark(&self, length: Duration) -> Result<(), Interrupt> {
        // Never key down once a stop or shutdown is pending
        if !matches!(self.abort_rx.try_recv(), Err(TryRecvError::Empty)) {
            return Err(Interrupt::Aborted);
        }
        pin::resolve(self.selector, &self.handle, true)?;
        self.pause(length)?;
        pin::resolve(self.selector, &self.handle, false)?;
        Ok(())
    }

    /// Sleep unless a stop request (or shutdown) arrives first.
    fn pause(&self, length: Duration) -> Result<(), Interrupt> {
        match self.abort_rx.recv_timeout(length) {
            Err(RecvTimeoutError::Timeout) => Ok(()),
            Ok(()) | Err(RecvTimeoutError::Disconnected) => Err(Interrupt::Aborted),
        }
    }

    fn key_up(&self) {
        if self.handle.is_open() {
            if let Err(e) = pin::resolve(self.selector, &self.handle, false) {
                log::error!("Key up failed: {e}");
            }
        }
    }
}
