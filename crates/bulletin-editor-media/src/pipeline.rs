//! Ordered, single-slot media insertion.
//!
//! Each attempt captures the surface's selection synchronously when the user
//! gesture starts, then waits for its turn in a FIFO queue. Only the attempt at
//! the head of the queue uploads, so captures are restored in trigger order.
//! The held capture is re-derived through every edit that lands while the
//! attempt waits, including earlier insertions, so a queued image lands after
//! the ones triggered before it.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};

use bulletin_editor_core::{CaptureId, EditorError, EditorSurface, MediaKey, MediaNode, NodeId};
use smol_str::SmolStr;
use tokio::sync::Notify;

use crate::policy::MediaPolicy;
use crate::upload::{MediaBlob, UploadService};

/// Where an insertion attempt came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InsertionSource {
    Toolbar,
    Paste,
    Drop,
}

/// Lifecycle of one insertion attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum InsertionState {
    #[default]
    Idle,
    SelectionCaptured,
    Uploading,
    Inserted,
    Failed,
}

/// A completed insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertionOutcome {
    pub key: MediaKey,
    pub node: NodeId,
    /// Effective MIME type of the uploaded blob.
    pub mime: SmolStr,
    pub source: InsertionSource,
    /// The captured selection was lost and the image went to the end of the document.
    pub degraded: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct Ticket(u64);

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "insertion#{}", self.0)
    }
}

#[derive(Debug)]
struct Slot {
    ticket: Ticket,
    state: InsertionState,
}

/// Media insertion pipeline for one editing surface.
pub struct MediaPipeline<U> {
    surface: Weak<RefCell<EditorSurface>>,
    uploader: U,
    policy: MediaPolicy,
    queue: RefCell<VecDeque<Slot>>,
    next_ticket: Cell<u64>,
    turn: Notify,
    /// Captures a dropped attempt could not release because the surface was
    /// borrowed at the time. Released on the next borrow.
    unreleased: RefCell<Vec<CaptureId>>,
}

impl<U> fmt::Debug for MediaPipeline<U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaPipeline")
            .field("policy", &self.policy)
            .field("queue", &self.queue)
            .finish_non_exhaustive()
    }
}

impl<U: UploadService> MediaPipeline<U> {
    /// Attach a pipeline to a surface. The pipeline does not keep the surface alive.
    pub fn new(surface: &Rc<RefCell<EditorSurface>>, uploader: U, policy: MediaPolicy) -> Self {
        Self {
            surface: Rc::downgrade(surface),
            uploader,
            policy,
            queue: RefCell::new(VecDeque::new()),
            next_ticket: Cell::new(0),
            turn: Notify::new(),
            unreleased: RefCell::new(Vec::new()),
        }
    }

    pub fn policy(&self) -> &MediaPolicy {
        &self.policy
    }

    pub fn uploader(&self) -> &U {
        &self.uploader
    }

    /// State of the attempt currently at the head of the queue.
    pub fn state(&self) -> InsertionState {
        self.queue
            .borrow()
            .front()
            .map_or(InsertionState::Idle, |slot| slot.state)
    }

    /// Attempts started and not yet finished, including the active one.
    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Start an attempt: capture the selection and take a place in the queue.
    ///
    /// Call this at the start of the user gesture, before any file dialog
    /// opens. Dropping the returned attempt without completing it releases
    /// both the capture and the queue slot.
    pub fn begin(&self, source: InsertionSource) -> Result<PendingInsertion<'_, U>, EditorError> {
        let surface = self.live_surface()?;
        let capture = {
            let mut surface = surface.borrow_mut();
            self.release_deferred(&mut surface);
            surface.hold_capture()
        };

        let ticket = Ticket(self.next_ticket.get());
        self.next_ticket.set(ticket.0 + 1);
        self.queue.borrow_mut().push_back(Slot {
            ticket,
            state: InsertionState::SelectionCaptured,
        });
        tracing::debug!(%ticket, %capture, ?source, "selection captured for insertion");

        Ok(PendingInsertion {
            pipeline: self,
            ticket,
            capture,
            source,
            released: false,
        })
    }

    /// Capture now, then validate, upload and insert `blob`.
    pub fn insert(
        &self,
        blob: MediaBlob,
        source: InsertionSource,
    ) -> impl Future<Output = Result<InsertionOutcome, EditorError>> + '_ {
        let pending = self.begin(source);
        async move { pending?.complete(blob).await }
    }

    fn live_surface(&self) -> Result<Rc<RefCell<EditorSurface>>, EditorError> {
        self.surface
            .upgrade()
            .filter(|s| s.borrow().is_mounted())
            .ok_or(EditorError::SurfaceUnmounted)
    }

    fn release_deferred(&self, surface: &mut EditorSurface) {
        for capture in self.unreleased.borrow_mut().drain(..) {
            surface.release_capture(capture);
        }
    }

    fn set_state(&self, ticket: Ticket, state: InsertionState) {
        if let Some(slot) = self
            .queue
            .borrow_mut()
            .iter_mut()
            .find(|slot| slot.ticket == ticket)
        {
            slot.state = state;
        }
    }

    fn is_head(&self, ticket: Ticket) -> bool {
        self.queue
            .borrow()
            .front()
            .is_some_and(|slot| slot.ticket == ticket)
    }

    async fn wait_turn(&self, ticket: Ticket) {
        loop {
            let notified = self.turn.notified();
            if self.is_head(ticket) {
                return;
            }
            tracing::debug!(%ticket, "queued behind an earlier insertion");
            notified.await;
        }
    }

    fn leave(&self, ticket: Ticket) {
        self.queue.borrow_mut().retain(|slot| slot.ticket != ticket);
        self.turn.notify_waiters();
    }
}

/// An attempt that has captured its selection and holds a queue slot.
#[must_use = "dropping a pending insertion cancels it"]
pub struct PendingInsertion<'p, U: UploadService> {
    pipeline: &'p MediaPipeline<U>,
    ticket: Ticket,
    capture: CaptureId,
    source: InsertionSource,
    released: bool,
}

impl<U: UploadService> fmt::Debug for PendingInsertion<'_, U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingInsertion")
            .field("ticket", &self.ticket)
            .field("capture", &self.capture)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

impl<U: UploadService> PendingInsertion<'_, U> {
    pub fn source(&self) -> InsertionSource {
        self.source
    }

    /// The surface capture this attempt holds.
    pub fn capture(&self) -> CaptureId {
        self.capture
    }

    /// Validate, wait for this attempt's turn, upload, then insert at the
    /// captured selection.
    ///
    /// Validation and upload failures leave the document untouched. If the
    /// surface is torn down while the upload is in flight the result is
    /// discarded.
    pub async fn complete(mut self, blob: MediaBlob) -> Result<InsertionOutcome, EditorError> {
        let result = self.run(blob).await;
        let state = match &result {
            Ok(_) => InsertionState::Inserted,
            Err(_) => InsertionState::Failed,
        };
        self.pipeline.set_state(self.ticket, state);
        result
    }

    /// Give up without inserting.
    pub fn cancel(self) {
        tracing::debug!(ticket = %self.ticket, "insertion cancelled");
    }

    async fn run(&mut self, blob: MediaBlob) -> Result<InsertionOutcome, EditorError> {
        let pipeline = self.pipeline;
        let mime = pipeline.policy.validate(&blob).inspect_err(|e| {
            tracing::debug!(ticket = %self.ticket, error = %e, "media rejected");
        })?;

        pipeline.wait_turn(self.ticket).await;
        pipeline.live_surface().inspect_err(|_| {
            tracing::warn!(ticket = %self.ticket, "surface torn down while queued, not uploading");
        })?;
        pipeline.set_state(self.ticket, InsertionState::Uploading);
        let alt = blob.alt.clone();
        let uploaded = pipeline.uploader.upload(blob).await.map_err(|e| {
            tracing::error!(ticket = %self.ticket, source = ?self.source, error = %e, "upload failed");
            EditorError::from(e)
        })?;

        let surface = pipeline.live_surface().inspect_err(|_| {
            tracing::warn!(
                ticket = %self.ticket,
                key = %uploaded.key,
                "surface torn down during upload, discarding result"
            );
        })?;
        let mut surface = surface.borrow_mut();
        pipeline.release_deferred(&mut surface);
        let at = surface.release_capture(self.capture);
        self.released = true;

        let mut media = MediaNode::new(uploaded.key.clone(), uploaded.url);
        if let Some(alt) = alt {
            media = media.with_alt(alt);
        }
        let inserted = surface.insert_media(media, at)?;
        Ok(InsertionOutcome {
            key: uploaded.key,
            node: inserted.node,
            mime,
            source: self.source,
            degraded: inserted.degraded,
        })
    }
}

impl<U: UploadService> Drop for PendingInsertion<'_, U> {
    fn drop(&mut self) {
        if !self.released
            && let Some(surface) = self.pipeline.surface.upgrade()
        {
            match surface.try_borrow_mut() {
                Ok(mut surface) => {
                    surface.release_capture(self.capture);
                }
                Err(_) => {
                    tracing::warn!(
                        ticket = %self.ticket,
                        capture = %self.capture,
                        "surface busy, deferring capture release"
                    );
                    self.pipeline.unreleased.borrow_mut().push(self.capture);
                }
            }
        }
        self.pipeline.leave(self.ticket);
    }
}
