//! Reactive fetch driver.
//!
//! # Responsibilities
//! - Follow the consumer's desired resource id
//! - Re-issue `request` whenever the id changes
//! - Exit cleanly on shutdown

use tokio::sync::{broadcast, watch};

use crate::fetch::controller::FetchController;
use crate::fetch::remote::ResourceFetcher;
use crate::fetch::types::ResourceId;

/// Drives a [`FetchController`] from a watched desired-id input.
///
/// The consumer of this layer is reactive: whenever the desired id changes, a
/// fresh request is issued, which naturally doubles as the retry path after
/// errors. An absent id (`None`) is a no-op.
pub struct FetchDriver<F: ResourceFetcher> {
    controller: FetchController<F>,
    desired: watch::Receiver<Option<ResourceId>>,
}

impl<F: ResourceFetcher> FetchDriver<F> {
    pub fn new(
        controller: FetchController<F>,
        desired: watch::Receiver<Option<ResourceId>>,
    ) -> Self {
        Self { controller, desired }
    }

    /// Run until the input channel closes or shutdown is signalled.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!("Fetch driver starting");

        // Apply a pre-set id so a value present before startup is not missed
        self.apply_current();

        loop {
            tokio::select! {
                changed = self.desired.changed() => {
                    if changed.is_err() {
                        tracing::info!("Desired-id channel closed, driver exiting");
                        break;
                    }
                    self.apply_current();
                }
                _ = shutdown.recv() => {
                    tracing::info!("Fetch driver received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    fn apply_current(&mut self) {
        let desired = *self.desired.borrow_and_update();
        if let Some(id) = desired {
            self.controller.request(id);
        }
    }
}
