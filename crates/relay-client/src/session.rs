//! Interactive search session
//!
//! A session owns at most one active stream. Starting a search cancels the
//! previous one and waits for its connection to close before opening the
//! next, so a session never holds more than one relay connection.

use std::sync::{Arc, Mutex, PoisonError};

use relay_core::ChatRequest;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::client::RelayClient;
use crate::error::ClientError;
use crate::observer::{StreamObserver, StreamOutcome};
use crate::store::{HistoryEntry, LocalStore, SavedResponse, StoreError};

/// System prompt sent with every search unless overridden
const DEFAULT_SYSTEM_PROMPT: &str = "You are a response engine. Provide clear, direct, one-sentence responses.";

const DEFAULT_TEMPERATURE: f64 = 0.7;

const DEFAULT_MAX_TOKENS: u32 = 1000;

struct ActiveSearch {
    token: CancellationToken,
    task: JoinHandle<()>,
}

/// Search front end over a `RelayClient` and a `LocalStore`
pub struct Session {
    client: RelayClient,
    store: Arc<Mutex<LocalStore>>,
    active: tokio::sync::Mutex<Option<ActiveSearch>>,
    system_prompt: Option<String>,
    temperature: f64,
    max_tokens: u32,
}

/// Handle to one running search
#[derive(Debug)]
pub struct SearchHandle {
    token: CancellationToken,
    outcome: oneshot::Receiver<StreamOutcome>,
}

impl SearchHandle {
    /// Abandon this search
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Wait for the search to end
    pub async fn outcome(self) -> StreamOutcome {
        self.outcome.await.unwrap_or_else(|_| StreamOutcome::Cancelled {
            partial: String::new(),
        })
    }
}

impl Session {
    /// Create a session; `store` is opened by the caller and owned from here on
    pub fn new(client: RelayClient, store: LocalStore) -> Self {
        Self {
            client,
            store: Arc::new(Mutex::new(store)),
            active: tokio::sync::Mutex::new(None),
            system_prompt: Some(DEFAULT_SYSTEM_PROMPT.to_owned()),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    /// Override the system prompt; `None` lets the relay apply its default
    #[must_use]
    pub fn with_system_prompt(mut self, system_prompt: Option<String>) -> Self {
        self.system_prompt = system_prompt;
        self
    }

    /// Override sampling parameters
    #[must_use]
    pub fn with_sampling(mut self, temperature: f64, max_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    /// Start a search, cancelling the one in progress
    ///
    /// The search runs on its own task and reports progress to `observer`.
    /// A completed search is recorded in the history.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::EmptyQuery` if `query` is blank
    pub async fn search<O>(&self, query: &str, observer: O) -> Result<SearchHandle, ClientError>
    where
        O: StreamObserver + 'static,
    {
        if query.trim().is_empty() {
            return Err(ClientError::EmptyQuery);
        }

        let mut active = self.active.lock().await;

        if let Some(previous) = active.take() {
            previous.token.cancel();
            if let Err(e) = previous.task.await {
                tracing::warn!(error = %e, "previous search task failed");
            }
        }

        let mut request = ChatRequest::new(query)
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens);
        if let Some(system_prompt) = &self.system_prompt {
            request = request.with_system_prompt(system_prompt.clone());
        }

        let token = CancellationToken::new();
        let (sender, receiver) = oneshot::channel();

        let task = tokio::spawn(run_search(
            self.client.clone(),
            Arc::clone(&self.store),
            request,
            observer,
            token.clone(),
            sender,
        ));

        *active = Some(ActiveSearch {
            token: token.clone(),
            task,
        });

        Ok(SearchHandle {
            token,
            outcome: receiver,
        })
    }

    /// Abandon the active search, if any, without reporting an error
    pub async fn cancel(&self) {
        if let Some(active) = self.active.lock().await.take() {
            active.token.cancel();
            if let Err(e) = active.task.await {
                tracing::warn!(error = %e, "cancelled search task failed");
            }
        }
    }

    /// Keep a response in the saved list
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be flushed
    pub fn save(&self, query: &str, response: &str) -> Result<(), StoreError> {
        self.lock_store().save_response(query, response)
    }

    /// Search history, newest first
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.lock_store().history().to_vec()
    }

    /// Saved responses, newest first
    pub fn saved(&self) -> Vec<SavedResponse> {
        self.lock_store().saved().to_vec()
    }

    fn lock_store(&self) -> std::sync::MutexGuard<'_, LocalStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn run_search<O>(
    client: RelayClient,
    store: Arc<Mutex<LocalStore>>,
    request: ChatRequest,
    mut observer: O,
    token: CancellationToken,
    outcome_tx: oneshot::Sender<StreamOutcome>,
) where
    O: StreamObserver,
{
    let outcome = client.stream(&request, &mut observer, &token).await;

    if outcome.is_completed() {
        record_history(store, request.message).await;
    }

    // The caller may have dropped its handle
    let _ = outcome_tx.send(outcome);
}

/// Append `query` to the history off the async workers, since it rewrites the store file
async fn record_history(store: Arc<Mutex<LocalStore>>, query: String) {
    let recorded = tokio::task::spawn_blocking(move || {
        store
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record_search(&query)
    })
    .await;

    match recorded {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::warn!(error = %e, "failed to record search history"),
        Err(e) => tracing::warn!(error = %e, "search history task failed"),
    }
}
