use crate::models::{Toast, ToastLevel};
use std::collections::VecDeque;
use std::sync::Mutex;

const MAX_QUEUED: usize = 50;

/// Transient user-facing notifications.
pub trait Notifier: Send + Sync {
    fn notify(&self, level: ToastLevel, title: &str, message: &str);

    fn info(&self, message: &str) {
        self.notify(ToastLevel::Info, "Info", message);
    }

    fn success(&self, message: &str) {
        self.notify(ToastLevel::Success, "Success", message);
    }

    fn error(&self, message: &str) {
        self.notify(ToastLevel::Error, "Error", message);
    }
}

/// Logs every toast and keeps the most recent ones until a client drains them.
#[derive(Default)]
pub struct ToastQueue {
    toasts: Mutex<VecDeque<Toast>>,
}

impl ToastQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&self) -> Vec<Toast> {
        match self.toasts.lock() {
            Ok(mut toasts) => toasts.drain(..).collect(),
            Err(_) => Vec::new(),
        }
    }
}

impl Notifier for ToastQueue {
    fn notify(&self, level: ToastLevel, title: &str, message: &str) {
        match level {
            ToastLevel::Error => log::warn!("[toast] {}: {}", title, message),
            _ => log::info!("[toast] {}: {}", title, message),
        }
        if let Ok(mut toasts) = self.toasts.lock() {
            if toasts.len() >= MAX_QUEUED {
                toasts.pop_front();
            }
            toasts.push_back(Toast {
                level,
                title: title.to_string(),
                message: message.to_string(),
            });
        }
    }
}
