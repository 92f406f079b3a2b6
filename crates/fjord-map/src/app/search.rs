//! Runs geocoder requests on the tokio runtime and hands results back to the UI thread

use fjord_map_lib::{SearchClient, SearchResult, SearchTicket};
use tokio::sync::mpsc;

pub type Completion = (SearchTicket, Vec<SearchResult>);

pub struct SearchWorker {
    /// `None` when the HTTP client could not be built; searches then come back empty
    client: Option<SearchClient>,
    runtime: tokio::runtime::Handle,
    tx: mpsc::UnboundedSender<Completion>,
    rx: mpsc::UnboundedReceiver<Completion>,
}

impl SearchWorker {
    pub fn new(client: Option<SearchClient>, runtime: tokio::runtime::Handle) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            client,
            runtime,
            tx,
            rx,
        }
    }

    /// Start a request; the result arrives through [`Self::poll`]
    pub fn dispatch(&self, ticket: SearchTicket, query: String, ctx: egui::Context) {
        let tx = self.tx.clone();
        let Some(client) = self.client.clone() else {
            tracing::warn!("Search unavailable, no HTTP client");
            let _ = tx.send((ticket, Vec::new()));
            return;
        };

        self.runtime.spawn(async move {
            let results = client.search(&query).await;
            // Receiver is gone only once the app has shut down
            let _ = tx.send((ticket, results));
            ctx.request_repaint();
        });
    }

    /// Completed requests, oldest first
    pub fn poll(&mut self) -> Vec<Completion> {
        let mut completed = Vec::new();
        while let Ok(done) = self.rx.try_recv() {
            completed.push(done);
        }
        completed
    }
}
