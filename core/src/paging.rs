//! Page-at-a-time loading for list endpoints.
//!
//! # Design
//! A `PagingEngine` owns the cursor for one list: the next page number,
//! whether the end has been seen, and a handle on the fetch in flight. It
//! calls a caller-supplied producer for each page and advances only when
//! that page is fulfilled; failures and cancellations leave the cursor where
//! it was, so calling `fetch_next` again retries the same page.
//!
//! The end of the list is inferred from a short page (fewer entries than
//! `page_size`). After that the engine answers with empty pages and never
//! calls the producer again until `reset`. The count is taken after
//! decoding, so a full server page with a malformed entry that was dropped
//! also ends the list.
//!
//! While a fetch is in flight, further `fetch_next` calls do not start a
//! second request: they resolve at once with an empty page. `reset` cancels
//! the in-flight fetch and lets the next call start fresh.
//!
//! Results reach the caller through the returned future. A UI layer that
//! may go away before a page lands can instead `subscribe` to `PageEvent`s
//! and drop the receiver when it is gone; the engine then stops emitting.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;

use crate::error::ApiError;
use crate::future::{CancelHandle, CancellableFuture};

/// Produces the future for one page, given its 1-based number.
pub type PageProducer<T> = Box<dyn Fn(u32) -> CancellableFuture<Vec<T>> + Send + Sync>;

/// Emitted to the subscriber as fetches settle.
#[derive(Debug, Clone, PartialEq)]
pub enum PageEvent<T> {
    Loaded {
        page: u32,
        items: Vec<T>,
        reached_end: bool,
    },
    Failed {
        page: u32,
        error: ApiError,
    },
    Reset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagingSnapshot {
    pub current_page: u32,
    pub reached_end: bool,
    pub is_fetching: bool,
}

struct PagingState<T> {
    current_page: u32,
    reached_end: bool,
    in_flight: Option<CancelHandle>,
    /// Bumped by `reset`; fetches from an older generation are ignored.
    generation: u64,
    listener: Option<mpsc::UnboundedSender<PageEvent<T>>>,
}

impl<T> PagingState<T> {
    fn is_fetching(&self) -> bool {
        self.in_flight.as_ref().is_some_and(CancelHandle::is_pending)
    }

    fn emit(&mut self, event: PageEvent<T>) {
        if let Some(listener) = &self.listener {
            if listener.send(event).is_err() {
                tracing::debug!("page subscriber dropped");
                self.listener = None;
            }
        }
    }
}

pub struct PagingEngine<T> {
    start_page: u32,
    page_size: u32,
    producer: PageProducer<T>,
    state: Arc<Mutex<PagingState<T>>>,
}

impl<T: Clone + Send + 'static> PagingEngine<T> {
    /// `start_page` and `page_size` are clamped to at least 1.
    pub fn new<P>(start_page: u32, page_size: u32, producer: P) -> Self
    where
        P: Fn(u32) -> CancellableFuture<Vec<T>> + Send + Sync + 'static,
    {
        let start_page = start_page.max(1);
        Self {
            start_page,
            page_size: page_size.max(1),
            producer: Box::new(producer),
            state: Arc::new(Mutex::new(PagingState {
                current_page: start_page,
                reached_end: false,
                in_flight: None,
                generation: 0,
                listener: None,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PagingState<T>> {
        lock_state(&self.state)
    }

    /// Fetch the page at the cursor.
    ///
    /// Resolves with an empty page, without calling the producer, once the
    /// end has been reached or while another fetch is in flight.
    ///
    /// # Panics
    /// Panics when a fetch has to be started outside a tokio runtime.
    pub fn fetch_next(&self) -> CancellableFuture<Vec<T>> {
        let (page, generation) = {
            let state = self.lock();
            if state.reached_end {
                return CancellableFuture::fulfilled(Vec::new());
            }
            if state.is_fetching() {
                tracing::debug!(page = state.current_page, "fetch already in flight, ignoring");
                return CancellableFuture::fulfilled(Vec::new());
            }
            (state.current_page, state.generation)
        };

        tracing::debug!(page, page_size = self.page_size, "fetching page");
        let upstream = (self.producer)(page);
        let upstream_handle = upstream.cancel_handle();
        let shared = Arc::clone(&self.state);
        let page_size = self.page_size;

        let chained = CancellableFuture::create(|settle| {
            let task = tokio::spawn(async move {
                let outcome = upstream.await;
                record(&shared, generation, page, page_size, &outcome);
                settle.settle(outcome);
            });
            move || {
                upstream_handle.cancel();
                task.abort();
            }
        });

        self.lock().in_flight = Some(chained.cancel_handle());
        chained
    }

    /// Cancel any fetch in flight and rewind to `start_page`.
    pub fn reset(&self) {
        let in_flight = {
            let mut state = self.lock();
            state.generation += 1;
            state.current_page = self.start_page;
            state.reached_end = false;
            state.emit(PageEvent::Reset);
            state.in_flight.take()
        };
        if let Some(handle) = in_flight {
            tracing::debug!("reset cancelled in-flight fetch");
            handle.cancel();
        }
    }

    /// Whether the element at `visible_index` of `total_visible` is close
    /// enough to the end of what is loaded that the next page is wanted.
    #[must_use]
    pub fn should_fetch_more(&self, visible_index: usize, total_visible: usize) -> bool {
        total_visible > 0 && visible_index >= total_visible - 1 && !self.lock().reached_end
    }

    /// Replace the subscriber. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<PageEvent<T>> {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.lock().listener = Some(sender);
        receiver
    }

    #[must_use]
    pub fn snapshot(&self) -> PagingSnapshot {
        let state = self.lock();
        PagingSnapshot {
            current_page: state.current_page,
            reached_end: state.reached_end,
            is_fetching: state.is_fetching(),
        }
    }

    #[must_use]
    pub fn current_page(&self) -> u32 {
        self.lock().current_page
    }

    #[must_use]
    pub fn reached_end(&self) -> bool {
        self.lock().reached_end
    }

    #[must_use]
    pub fn is_fetching(&self) -> bool {
        self.lock().is_fetching()
    }

    #[must_use]
    pub fn start_page(&self) -> u32 {
        self.start_page
    }

    #[must_use]
    pub fn page_size(&self) -> u32 {
        self.page_size
    }
}

impl<T> fmt::Debug for PagingEngine<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = lock_state(&self.state);
        f.debug_struct("PagingEngine")
            .field("start_page", &self.start_page)
            .field("page_size", &self.page_size)
            .field("current_page", &state.current_page)
            .field("reached_end", &state.reached_end)
            .field("is_fetching", &state.is_fetching())
            .finish()
    }
}

fn lock_state<T>(state: &Mutex<PagingState<T>>) -> MutexGuard<'_, PagingState<T>> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Fold a settled fetch into the cursor.
fn record<T: Clone>(
    shared: &Mutex<PagingState<T>>,
    generation: u64,
    page: u32,
    page_size: u32,
    outcome: &Result<Vec<T>, ApiError>,
) {
    let mut state = lock_state(shared);
    if state.generation != generation {
        tracing::debug!(page, "discarding fetch from before reset");
        return;
    }
    state.in_flight = None;
    match outcome {
        Ok(items) => {
            state.current_page = page + 1;
            if items.len() < page_size as usize {
                state.reached_end = true;
            }
            let reached_end = state.reached_end;
            tracing::debug!(page, count = items.len(), reached_end, "page loaded");
            if state.listener.is_some() {
                state.emit(PageEvent::Loaded {
                    page,
                    items: items.clone(),
                    reached_end,
                });
            }
        }
        Err(ApiError::UserCancelled) => {
            tracing::debug!(page, "page fetch cancelled");
        }
        Err(error) => {
            tracing::debug!(page, %error, "page fetch failed");
            state.emit(PageEvent::Failed {
                page,
                error: error.clone(),
            });
        }
    }
}
