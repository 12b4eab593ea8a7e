//! Search Session for Swirl Search
//! Query form validation, search state and generation-tagged background requests

use std::sync::mpsc::{self, Receiver, Sender};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::SearchConfig;
use crate::search::{PaperRecord, SearchClient, SearchResult};

/// Message shown for any transport or HTTP failure.
pub const FETCH_FAILED: &str = "Failed to fetch results. Please try again.";

/// Input problems caught before any request is sent.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Please enter a search term.")]
    EmptyQuery,

    #[error("Please enter the number of papers.")]
    EmptyCount,

    #[error("Number of papers must be a whole number.")]
    InvalidCount,
}

/// Validated search input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchParams {
    pub query: String,
    pub k: u32,
}

/// Raw contents of the query form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryForm {
    pub query: String,
    pub count: String,
}

impl QueryForm {
    pub fn new(config: &SearchConfig) -> Self {
        Self {
            query: String::new(),
            count: config.default_count.to_string(),
        }
    }

    /// Check the form and produce request parameters.
    ///
    /// Out-of-range counts are clamped into `min_count..=max_count`.
    pub fn validate(&self, config: &SearchConfig) -> Result<SearchParams, ValidationError> {
        let query = self.query.trim();
        if query.is_empty() {
            return Err(ValidationError::EmptyQuery);
        }

        let count = self.count.trim();
        if count.is_empty() {
            return Err(ValidationError::EmptyCount);
        }
        let k = clamp_count(count, config.min_count, config.max_count)?;

        Ok(SearchParams {
            query: query.to_string(),
            k,
        })
    }
}

/// Parse a signed whole number and clamp it into `min..=max`.
///
/// Magnitudes too large for `u64` saturate instead of failing.
fn clamp_count(text: &str, min: u32, max: u32) -> Result<u32, ValidationError> {
    let (negative, digits) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ValidationError::InvalidCount);
    }

    if negative {
        return Ok(min);
    }
    let value = digits.parse::<u64>().unwrap_or(u64::MAX);
    Ok(value.clamp(min as u64, max as u64) as u32)
}

/// Result of one background request, tagged with its generation.
#[derive(Debug)]
pub struct SearchOutcome {
    pub generation: u64,
    pub result: SearchResult<Vec<PaperRecord>>,
}

/// Loading / error / results of the latest search.
#[derive(Debug, Default)]
pub struct SearchState {
    generation: u64,
    loading: bool,
    error: Option<String>,
    results: Vec<PaperRecord>,
}

impl SearchState {
    /// Start a new search: bump the generation and clear the previous outcome.
    pub fn begin(&mut self) -> u64 {
        self.generation += 1;
        self.loading = true;
        self.error = None;
        self.results.clear();
        self.generation
    }

    /// Apply a finished request. Returns false when the outcome is stale.
    pub fn apply(&mut self, outcome: SearchOutcome) -> bool {
        if outcome.generation != self.generation {
            debug!(
                stale = outcome.generation,
                current = self.generation,
                "discarding superseded search outcome"
            );
            return false;
        }

        self.loading = false;
        match outcome.result {
            Ok(papers) => {
                info!(count = papers.len(), "search finished");
                self.results = papers;
            }
            Err(e) => {
                warn!("search failed: {e}");
                self.error = Some(FETCH_FAILED.to_string());
            }
        }
        true
    }

    #[cfg(test)]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn results(&self) -> &[PaperRecord] {
        &self.results
    }
}

/// Runs searches off the UI thread.
pub struct SearchDispatcher {
    client: SearchClient,
    tx: Sender<SearchOutcome>,
    rx: Receiver<SearchOutcome>,
}

impl SearchDispatcher {
    pub fn new(client: SearchClient) -> Self {
        let (tx, rx) = mpsc::channel();
        Self { client, tx, rx }
    }

    /// Spawn one request. `notify` runs after the outcome has been queued.
    pub fn dispatch<F>(&self, generation: u64, params: SearchParams, notify: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let client = self.client.clone();
        let tx = self.tx.clone();

        std::thread::spawn(move || {
            let result = client.search(&params.query, params.k);
            // Receiver is gone once the app has shut down.
            if tx.send(SearchOutcome { generation, result }).is_ok() {
                notify();
            }
        });
    }

    /// Drain finished requests without blocking.
    pub fn poll(&self) -> Vec<SearchOutcome> {
        self.rx.try_iter().collect()
    }
}

/// Everything the two views need: form input, its validation message and
/// the state of the latest search.
pub struct SearchSession {
    pub form: QueryForm,
    form_error: Option<String>,
    state: SearchState,
    dispatcher: SearchDispatcher,
    config: SearchConfig,
}

impl SearchSession {
    pub fn new(config: SearchConfig, client: SearchClient) -> Self {
        Self {
            form: QueryForm::new(&config),
            form_error: None,
            state: SearchState::default(),
            dispatcher: SearchDispatcher::new(client),
            config,
        }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn form_error(&self) -> Option<&str> {
        self.form_error.as_deref()
    }

    pub fn state(&self) -> &SearchState {
        &self.state
    }

    /// Validate the form. Sets the inline message and returns `None` on failure.
    pub fn submit_form(&mut self) -> Option<SearchParams> {
        match self.form.validate(&self.config) {
            Ok(params) => {
                self.form_error = None;
                Some(params)
            }
            Err(e) => {
                debug!("rejected search input: {e:?}");
                self.form_error = Some(e.to_string());
                None
            }
        }
    }

    /// Issue a request for `params` and return its generation.
    pub fn start<F>(&mut self, params: SearchParams, notify: F) -> u64
    where
        F: FnOnce() + Send + 'static,
    {
        let generation = self.state.begin();
        info!(generation, k = params.k, "starting search");
        self.dispatcher.dispatch(generation, params, notify);
        generation
    }

    /// Apply any finished requests. Returns true if the visible state changed.
    pub fn poll(&mut self) -> bool {
        let mut changed = false;
        for outcome in self.dispatcher.poll() {
            changed |= self.state.apply(outcome);
        }
        changed
    }
}
