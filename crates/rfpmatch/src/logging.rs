use std::env;
use std::sync::atomic::{AtomicBool, Ordering};

static VERBOSE: AtomicBool = AtomicBool::new(false);

pub fn init(enabled: bool) {
    VERBOSE.store(enabled, Ordering::Relaxed);
    if enabled {
        info("verbose logging enabled");
    }
}

pub fn info(message: impl AsRef<str>) {
    emit(None, message.as_ref());
}

pub fn stage(stage: &str, message: impl AsRef<str>) {
    emit(Some(stage), message.as_ref());
}

pub fn verbose(message: impl AsRef<str>) {
    if VERBOSE.load(Ordering::Relaxed) {
        emit(Some("verbose"), message.as_ref());
    }
}

// all pipeline output goes to stderr; stdout stays free for piping artifacts
fn emit(scope: Option<&str>, message: &str) {
    match scope {
        Some(scope) => eprintln!("[rfpmatch::{scope}] {message}"),
        None => eprintln!("[rfpmatch] {message}"),
    }
}

pub fn env_flag() -> bool {
    env::var("RFPMATCH_VERBOSE")
        .map(|value| {
            matches!(
                value.trim().to_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            )
        })
        .unwrap_or(false)
}
