use once_cell::sync::Lazy;
use std::collections::HashSet;
use std::sync::Mutex;

static EMITTED: Lazy<Mutex<HashSet<String>>> = Lazy::new(|| Mutex::new(HashSet::new()));

/// Logs `message` at warn level the first time it is seen in this process.
pub fn warn_once(message: &str) {
    let Ok(mut emitted) = EMITTED.lock() else {
        log::warn!("{message}");
        return;
    };
    if emitted.insert(message.to_string()) {
        log::warn!("{message}");
    }
}

#[cfg(test)]
pub(crate) fn was_emitted(message: &str) -> bool {
    EMITTED.lock().map(|e| e.contains(message)).unwrap_or(false)
}
