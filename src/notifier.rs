// User notification sinks. Sending never blocks the caller.
use notify_rust::Notification;
use std::sync::{Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str);

    /// Waits at most `timeout` for notifications still being delivered.
    /// Returns how many were still pending when the wait ended.
    fn flush(&self, _timeout: Duration) -> usize {
        0
    }
}

/// OS notifications. Each one is shown from its own thread so a slow
/// notification daemon never stalls a sync pass; `flush` before exiting.
#[derive(Debug)]
pub struct DesktopNotifier {
    app_name: String,
    pending: Mutex<Vec<JoinHandle<()>>>,
}

impl DesktopNotifier {
    pub fn new(app_name: &str) -> Self {
        Self {
            app_name: app_name.to_string(),
            pending: Mutex::new(Vec::new()),
        }
    }
}

/// Joins finished threads until none are left or `timeout` runs out.
fn join_within(mut handles: Vec<JoinHandle<()>>, timeout: Duration) -> usize {
    let deadline = Instant::now() + timeout;
    loop {
        let (done, running): (Vec<_>, Vec<_>) = handles.into_iter().partition(|h| h.is_finished());
        for handle in done {
            if handle.join().is_err() {
                log::debug!("Desktop notification thread panicked");
            }
        }
        handles = running;
        if handles.is_empty() || Instant::now() >= deadline {
            return handles.len();
        }
        std::thread::sleep(Duration::from_millis(20));
    }
}

impl Default for DesktopNotifier {
    fn default() -> Self {
        Self::new("Tasklink")
    }
}

impl Notifier for DesktopNotifier {
    fn notify(&self, message: &str) {
        log::info!("{}", message);
        let app_name = self.app_name.clone();
        let body = message.to_string();
        let handle = std::thread::spawn(move || {
            if let Err(e) = Notification::new()
                .summary(&app_name)
                .body(&body)
                .appname(&app_name)
                .show()
            {
                log::debug!("Desktop notification failed: {}", e);
            }
        });
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        pending.retain(|h| !h.is_finished());
        pending.push(handle);
    }

    fn flush(&self, timeout: Duration) -> usize {
        let handles = std::mem::take(&mut *self.pending.lock().unwrap_or_else(PoisonError::into_inner));
        let left = join_within(handles, timeout);
        if left > 0 {
            log::warn!("{} desktop notification(s) not delivered after {:?}", left, timeout);
        }
        left
    }
}

/// Sends notifications to the log only (headless runs, `--quiet`).
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, message: &str) {
        log::info!("{}", message);
    }
}

/// Keeps every message, for hosts that render notifications themselves.
#[derive(Debug, Default)]
pub struct CollectingNotifier {
    messages: Mutex<Vec<String>>,
}

impl CollectingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Notifier for CollectingNotifier {
    fn notify(&self, message: &str) {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.to_string());
    }
}
