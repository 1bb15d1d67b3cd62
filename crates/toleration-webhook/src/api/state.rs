use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use crate::toleration::Toleration;

pub struct ApiServerState {
    pub toleration: Toleration,
}

impl ApiServerState {
    pub fn new(toleration: Toleration) -> Self {
        Self { toleration }
    }
}

/// Reports whether the process is still willing to receive admission
/// requests. Set when the shutdown begins, never reset.
#[derive(Clone, Debug, Default)]
pub struct Readiness {
    shutting_down: Arc<AtomicBool>,
}

impl Readiness {
    pub fn mark_shutting_down(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }
}
