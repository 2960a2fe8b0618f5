//! Last-requested-wins coordination for page renders
//!
//! Each viewport (document + page) owns one slot. Beginning a render for a
//! slot cancels whatever was in flight there and issues a fresh generation,
//! so a stale, slower render can never overwrite a newer one regardless of
//! completion order.

use crate::cancel::CancellationToken;
use std::collections::HashMap;

/// Identity of one on-screen viewport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewportKey {
    pub document_id: u64,
    pub page_index: u32,
}

/// Parameters of a render request for a viewport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderRequest {
    pub zoom_percent: u16,
    pub rotation_degrees: u16,
}

/// Handle returned by [`RenderCoordinator::begin`].
///
/// The worker carries the token into the render call and reports back with
/// the generation when it completes.
#[derive(Debug, Clone)]
pub struct RenderTicket {
    pub generation: u64,
    pub token: CancellationToken,
}

#[derive(Debug)]
struct Slot {
    generation: u64,
    token: CancellationToken,
    request: RenderRequest,
}

/// Per-viewport render arbiter.
#[derive(Debug, Default)]
pub struct RenderCoordinator {
    slots: HashMap<ViewportKey, Slot>,
    next_generation: u64,
}

impl RenderCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a render for a viewport, superseding any render in flight there.
    ///
    /// The previous request's token is cancelled before the new ticket is
    /// issued.
    pub fn begin(&mut self, key: ViewportKey, request: RenderRequest) -> RenderTicket {
        if let Some(previous) = self.slots.get(&key) {
            previous.token.cancel();
        }

        self.next_generation += 1;
        let token = CancellationToken::new();
        self.slots.insert(
            key,
            Slot {
                generation: self.next_generation,
                token: token.clone(),
                request,
            },
        );

        RenderTicket {
            generation: self.next_generation,
            token,
        }
    }

    /// Whether a generation still owns its viewport slot.
    pub fn is_current(&self, key: ViewportKey, generation: u64) -> bool {
        self.slots
            .get(&key)
            .map(|slot| slot.generation == generation)
            .unwrap_or(false)
    }

    /// Report completion of a render.
    ///
    /// Returns `true` if the result belongs to the most recent request for
    /// the viewport and may be displayed; a superseded completion returns
    /// `false` and must be discarded.
    pub fn finish(&mut self, key: ViewportKey, generation: u64) -> bool {
        match self.slots.get(&key) {
            Some(slot) if slot.generation == generation => {
                self.slots.remove(&key);
                true
            }
            _ => false,
        }
    }

    /// The request currently occupying a viewport slot, if any.
    pub fn pending_request(&self, key: ViewportKey) -> Option<RenderRequest> {
        self.slots.get(&key).map(|slot| slot.request)
    }

    /// Cancel every in-flight render, e.g. when a document is closed.
    pub fn cancel_all(&mut self) {
        for slot in self.slots.values() {
            slot.token.cancel();
        }
        self.slots.clear();
    }

    /// Number of viewports with a render in flight.
    pub fn in_flight(&self) -> usize {
        self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(page: u32) -> ViewportKey {
        ViewportKey {
            document_id: 1,
            page_index: page,
        }
    }

    fn request(zoom: u16) -> RenderRequest {
        RenderRequest {
            zoom_percent: zoom,
            rotation_degrees: 0,
        }
    }

    #[test]
    fn newer_request_cancels_older_for_same_viewport() {
        let mut coordinator = RenderCoordinator::new();

        let first = coordinator.begin(key(0), request(100));
        let second = coordinator.begin(key(0), request(150));

        assert!(first.token.is_cancelled());
        assert!(!second.token.is_cancelled());
    }

    #[test]
    fn different_viewports_do_not_supersede_each_other() {
        let mut coordinator = RenderCoordinator::new();

        let a = coordinator.begin(key(0), request(100));
        let b = coordinator.begin(key(1), request(100));

        assert!(!a.token.is_cancelled());
        assert!(!b.token.is_cancelled());
        assert_eq!(coordinator.in_flight(), 2);
    }

    #[test]
    fn stale_completion_is_rejected() {
        let mut coordinator = RenderCoordinator::new();

        let first = coordinator.begin(key(0), request(100));
        let second = coordinator.begin(key(0), request(150));

        // Out-of-order completion: the superseded render lands last.
        assert!(coordinator.finish(key(0), second.generation));
        assert!(!coordinator.finish(key(0), first.generation));
    }

    #[test]
    fn current_completion_is_accepted_once() {
        let mut coordinator = RenderCoordinator::new();

        let ticket = coordinator.begin(key(0), request(100));
        assert!(coordinator.is_current(key(0), ticket.generation));
        assert!(coordinator.finish(key(0), ticket.generation));
        assert!(!coordinator.finish(key(0), ticket.generation));
        assert_eq!(coordinator.in_flight(), 0);
    }

    #[test]
    fn pending_request_reflects_latest() {
        let mut coordinator = RenderCoordinator::new();

        coordinator.begin(key(0), request(100));
        coordinator.begin(key(0), request(225));

        assert_eq!(coordinator.pending_request(key(0)), Some(request(225)));
    }

    #[test]
    fn cancel_all_cancels_every_slot() {
        let mut coordinator = RenderCoordinator::new();

        let a = coordinator.begin(key(0), request(100));
        let b = coordinator.begin(key(1), request(100));

        coordinator.cancel_all();

        assert!(a.token.is_cancelled());
        assert!(b.token.is_cancelled());
        assert_eq!(coordinator.in_flight(), 0);
    }
}
