//! One subscriber's numbered event stream.

use futures::Stream;
use routing_types::{RegistryError, StoreEvent, SubscriberEvent, WatchFilter};
use tracing::{debug, warn};

use super::translate::{translate, Translated};
use crate::registry::{RouteStore, WatchHandle};

enum Next {
    Event(Option<StoreEvent>),
    Error(RegistryError),
}

/// Translated, numbered view over a single store watch.
///
/// The stream ends on an `Invalid` event, on a watch error, or when the
/// store closes the feed; [`failure`](Self::failure) then holds the watch
/// error, if any. The underlying watch is cancelled exactly once:
/// when the stream ends or, for a subscriber that goes away mid-stream, when
/// it is dropped.
#[derive(Debug)]
pub struct SubscriberStream {
    handle: WatchHandle,
    next_id: u64,
    done: bool,
    failure: Option<RegistryError>,
}

impl SubscriberStream {
    pub fn new(handle: WatchHandle) -> Self {
        Self { handle, next_id: 0, done: false, failure: None }
    }

    /// Open a fresh watch on `store` for this subscriber.
    pub fn subscribe(store: &dyn RouteStore, filter: WatchFilter) -> Self {
        Self::new(store.watch_changes(filter))
    }

    /// Number of events delivered so far.
    pub fn delivered(&self) -> u64 {
        self.next_id
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// The watch error that ended the stream.
    pub fn failure(&self) -> Option<&RegistryError> {
        self.failure.as_ref()
    }

    pub async fn next_event(&mut self) -> Option<SubscriberEvent> {
        if self.done {
            return None;
        }

        let next = tokio::select! {
            biased;
            event = self.handle.events.recv() => Next::Event(event),
            Some(err) = self.handle.errors.recv() => Next::Error(err),
        };

        match next {
            Next::Event(Some(event)) => match translate(event) {
                Translated::Event(name, data) => {
                    let id = self.next_id;
                    self.next_id += 1;
                    Some(SubscriberEvent { id, name, data })
                },
                Translated::End => {
                    debug!(delivered = self.next_id, "invalid store event, closing stream");
                    self.finish()
                },
            },
            // A failing watch reports on `errors` before it closes the feed.
            Next::Event(None) => match self.handle.errors.try_recv() {
                Ok(err) => self.fail(err),
                Err(_) => {
                    debug!(delivered = self.next_id, "watch feed closed");
                    self.finish()
                },
            },
            Next::Error(err) => self.fail(err),
        }
    }

    fn fail(&mut self, err: RegistryError) -> Option<SubscriberEvent> {
        warn!(error = %err, delivered = self.next_id, "watch failed, closing stream");
        self.failure = Some(err);
        self.finish()
    }

    fn finish(&mut self) -> Option<SubscriberEvent> {
        self.done = true;
        self.handle.cancel();
        None
    }

    pub fn into_stream(self) -> impl Stream<Item = SubscriberEvent> + Send {
        futures::stream::unfold(self, |mut stream| async move {
            stream.next_event().await.map(|event| (event, stream))
        })
    }
}
