use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::future::select_all;
use tokio::sync::futures::Notified;
use tokio::sync::Notify;

struct Inner {
    cancelled: AtomicBool,
    notify: Notify,
    parent: Option<CancelFlag>,
}

/// 可克隆的取消标志。子标志在自身或任一祖先被取消时都视为已取消。
#[derive(Clone)]
pub struct CancelFlag {
    inner: Arc<Inner>,
}

impl Default for CancelFlag {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancelFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelFlag")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::with_parent(None)
    }

    fn with_parent(parent: Option<CancelFlag>) -> Self {
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                notify: Notify::new(),
                parent,
            }),
        }
    }

    /// 新建关联的子标志：取消子标志不会影响父标志
    pub fn child(&self) -> CancelFlag {
        Self::with_parent(Some(self.clone()))
    }

    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        let mut cursor = Some(self);
        while let Some(flag) = cursor {
            if flag.inner.cancelled.load(Ordering::SeqCst) {
                return true;
            }
            cursor = flag.inner.parent.as_ref();
        }
        false
    }

    fn chain(&self) -> Vec<Arc<Inner>> {
        let mut chain = vec![Arc::clone(&self.inner)];
        let mut cursor = self.inner.parent.as_ref();
        while let Some(flag) = cursor {
            chain.push(Arc::clone(&flag.inner));
            cursor = flag.inner.parent.as_ref();
        }
        chain
    }

    /// 等待直到被取消（自身或任一祖先）
    pub async fn cancelled(&self) {
        let chain = self.chain();
        loop {
            let mut waiters: Vec<Pin<Box<Notified<'_>>>> = chain
                .iter()
                .map(|inner| Box::pin(inner.notify.notified()))
                .collect();
            // 先注册再检查，避免错过 notify_waiters
            for waiter in waiters.iter_mut() {
                waiter.as_mut().enable();
            }
            if self.is_cancelled() {
                return;
            }
            select_all(waiters).await;
        }
    }
}
