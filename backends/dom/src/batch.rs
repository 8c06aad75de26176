//! Frame-batched patching.
//!
//! An [`UpdateQueue`] holds patches until the next frame callback. Requests for the
//! same `(parent, index)` collapse into one: the earliest old tree (what the document
//! currently shows) and the latest new tree are kept.

use core::{
    cell::{Cell, RefCell},
    fmt,
};
use std::rc::{Rc, Weak};

use zeal_core::{VChild, ZealError, report};

use crate::{host::Dom, patch::Patcher};

/// Work to run on the next frame.
pub type FrameCallback = Box<dyn FnOnce()>;

/// Source of frame callbacks (`requestAnimationFrame` in a browser).
pub trait FrameScheduler {
    /// Runs `callback` once, on the next frame.
    fn request_frame(&self, callback: FrameCallback);
}

/// A scheduler driven by hand: callbacks wait until [`ManualScheduler::run_frame`].
#[derive(Default)]
pub struct ManualScheduler {
    pending: RefCell<Vec<FrameCallback>>,
}

impl fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualScheduler")
            .field("pending", &self.pending())
            .finish()
    }
}

impl ManualScheduler {
    /// A scheduler with no pending frame.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of callbacks waiting for the next frame.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.borrow().len()
    }

    /// Runs every waiting callback. Callbacks requested meanwhile wait for the next
    /// frame. Returns how many ran.
    pub fn run_frame(&self) -> usize {
        let callbacks = core::mem::take(&mut *self.pending.borrow_mut());
        let count = callbacks.len();
        for callback in callbacks {
            callback();
        }
        count
    }
}

impl FrameScheduler for ManualScheduler {
    fn request_frame(&self, callback: FrameCallback) {
        self.pending.borrow_mut().push(callback);
    }
}

struct Pending<N> {
    parent: N,
    index: usize,
    new: Option<VChild>,
    old: Option<VChild>,
}

struct QueueInner<D: Dom> {
    dom: Rc<RefCell<D>>,
    patcher: Patcher<D>,
    scheduler: Rc<dyn FrameScheduler>,
    pending: RefCell<Vec<Pending<D::Node>>>,
    scheduled: Cell<bool>,
}

/// Patches deferred to the next frame.
pub struct UpdateQueue<D: Dom> {
    inner: Rc<QueueInner<D>>,
}

impl<D: Dom> Clone for UpdateQueue<D> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<D: Dom> fmt::Debug for UpdateQueue<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateQueue")
            .field("pending", &self.inner.pending.borrow().len())
            .field("scheduled", &self.inner.scheduled.get())
            .finish_non_exhaustive()
    }
}

impl<D> UpdateQueue<D>
where
    D: Dom + 'static,
    D::Node: 'static,
{
    /// A queue patching `dom` with `patcher` whenever `scheduler` delivers a frame.
    #[must_use]
    pub fn new(dom: Rc<RefCell<D>>, patcher: Patcher<D>, scheduler: Rc<dyn FrameScheduler>) -> Self {
        Self {
            inner: Rc::new(QueueInner {
                dom,
                patcher,
                scheduler,
                pending: RefCell::new(Vec::new()),
                scheduled: Cell::new(false),
            }),
        }
    }

    /// Queues `update(parent, new, old, index)` for the next frame.
    pub fn enqueue(&self, parent: &D::Node, new: Option<VChild>, old: Option<VChild>, index: usize) {
        {
            let mut pending = self.inner.pending.borrow_mut();
            if let Some(entry) = pending
                .iter_mut()
                .find(|entry| entry.index == index && entry.parent == *parent)
            {
                tracing::trace!(target: "zeal::dom", index, "collapsed queued update");
                entry.new = new;
            } else {
                pending.push(Pending {
                    parent: parent.clone(),
                    index,
                    new,
                    old,
                });
            }
        }

        self.inner.schedule();
    }

    /// Applies every queued update now. Returns how many were applied.
    pub fn flush(&self) -> usize {
        self.inner.flush()
    }

    /// Number of queued updates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.pending.borrow().len()
    }

    /// Returns `true` if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<D> QueueInner<D>
where
    D: Dom + 'static,
    D::Node: 'static,
{
    /// Requests a frame unless one is already on its way.
    fn schedule(self: &Rc<Self>) {
        if self.scheduled.replace(true) {
            return;
        }
        let queue: Weak<Self> = Rc::downgrade(self);
        self.scheduler.request_frame(Box::new(move || {
            if let Some(inner) = queue.upgrade() {
                inner.flush();
            }
        }));
    }

    fn flush(self: &Rc<Self>) -> usize {
        self.scheduled.set(false);
        let pending = core::mem::take(&mut *self.pending.borrow_mut());
        if pending.is_empty() {
            return 0;
        }
        let Ok(mut dom) = self.dom.try_borrow_mut() else {
            // Retried on the next frame.
            *self.pending.borrow_mut() = pending;
            report(ZealError::Reconcile(
                "document is busy, deferring queued updates".to_owned(),
            ));
            self.schedule();
            return 0;
        };
        tracing::debug!(target: "zeal::dom", updates = pending.len(), "flushing queued updates");
        for update in &pending {
            self.patcher.update(
                &mut dom,
                &update.parent,
                update.new.as_ref(),
                update.old.as_ref(),
                update.index,
            );
        }
        pending.len()
    }
}
