//! In-process mock transport and audio sink for tests.

use crate::{Result, Transport, TransportEvent};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::broadcast;

const EVENT_CHANNEL_SIZE: usize = 64;

/// Mock transport recording sent frames and letting tests inject events.
pub struct MockTransport {
    connected: AtomicBool,
    auto_open: AtomicBool,
    fail_sends: AtomicBool,
    sent: Mutex<Vec<String>>,
    events: broadcast::Sender<TransportEvent>,
    connect_attempts: AtomicUsize,
}

impl MockTransport {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        Self {
            connected: AtomicBool::new(false),
            auto_open: AtomicBool::new(true),
            fail_sends: AtomicBool::new(false),
            sent: Mutex::new(Vec::new()),
            events,
            connect_attempts: AtomicUsize::new(0),
        }
    }

    /// Disable the automatic `Opened` event on connect; the test drives the
    /// handshake itself.
    pub fn set_auto_open(&self, auto_open: bool) {
        self.auto_open.store(auto_open, Ordering::Release);
    }

    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::Release);
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Release);
    }

    pub fn connect_attempts(&self) -> usize {
        self.connect_attempts.load(Ordering::Acquire)
    }

    pub fn sent_frames(&self) -> Vec<String> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// The `"type"` field of each sent frame, in order.
    pub fn sent_types(&self) -> Vec<String> {
        self.sent_frames()
            .iter()
            .filter_map(|frame| {
                serde_json::from_str::<serde_json::Value>(frame)
                    .ok()
                    .and_then(|v| v.get("type").and_then(|t| t.as_str()).map(String::from))
            })
            .collect()
    }

    /// Inject a transport event as if it came off the wire.
    pub fn emit(&self, event: TransportEvent) {
        let _ = self.events.send(event);
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&self, _url: &str, _headers: &[(String, String)]) -> Result<()> {
        self.connect_attempts.fetch_add(1, Ordering::AcqRel);
        self.connected.store(true, Ordering::Release);
        if self.auto_open.load(Ordering::Acquire) {
            self.emit(TransportEvent::Opened);
        }
        Ok(())
    }

    fn send(&self, text: &str) -> bool {
        if !self.connected.load(Ordering::Acquire) || self.fail_sends.load(Ordering::Acquire) {
            return false;
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(text.to_string());
        }
        true
    }

    fn close(&self, code: u16, reason: &str) {
        self.connected.store(false, Ordering::Release);
        self.emit(TransportEvent::Closed {
            code,
            reason: reason.to_string(),
        });
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    fn events(&self) -> broadcast::Receiver<TransportEvent> {
        self.events.subscribe()
    }
}

/// Mock playback sink with a settable playing flag.
pub struct MockAudioSink {
    playing: AtomicBool,
    stops: AtomicUsize,
}

impl MockAudioSink {
    pub fn new() -> Self {
        Self {
            playing: AtomicBool::new(false),
            stops: AtomicUsize::new(0),
        }
    }

    pub fn set_playing(&self, playing: bool) {
        self.playing.store(playing, Ordering::Release);
    }

    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::Acquire)
    }
}

impl Default for MockAudioSink {
    fn default() -> Self {
        Self::new()
    }
}

impl crate::AudioSink for MockAudioSink {
    fn stop_and_clear(&self) {
        self.stops.fetch_add(1, Ordering::AcqRel);
        self.playing.store(false, Ordering::Release);
    }

    fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Acquire)
    }
}
