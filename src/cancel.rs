// src/cancel.rs

//! 调用方可触发的取消句柄
//!
//! Cloned tokens share state: firing any clone cancels every call that is
//! waiting on one of them. Once fired, a token stays fired.

use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        CancelToken { tx: Arc::new(tx) }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once [`cancel`](Self::cancel) has been called on any clone.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // sender 由 self 持有，wait_for 不会因关闭而返回 Err
        let _ = rx.wait_for(|fired| *fired).await;
    }
}
