//! In-memory search backend for export tests.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::error::EngineError;
use crate::search::{
    EngineQuery, EngineResult, RawHit, SearchBackend, SearchPage, SearchRequest,
};

/// Calls observed by [`MockBackend`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Calls {
    pub window: u64,
    pub count: u64,
    pub search: u64,
    pub open_scroll: u64,
    pub scroll: u64,
    pub clear_scroll: Vec<String>,
    pub last_request: Option<SearchRequest>,
}

#[derive(Default)]
struct State {
    calls: Calls,
    position: usize,
    window_error: Option<EngineError>,
    scroll_error_at: Option<u64>,
    clear_error: bool,
    cancel_on_scroll: Option<(u64, CancellationToken)>,
    cancel_on_open: Option<CancellationToken>,
    open_delay: Option<Duration>,
}

/// Serves `matching` documents `{"seq": i}` with a fixed window.
pub struct MockBackend {
    hits: Vec<RawHit>,
    window: u64,
    state: Mutex<State>,
}

impl MockBackend {
    pub fn new(matching: u64, window: u64) -> Self {
        let hits = (0..matching)
            .map(|i| RawHit::from_source(json!({ "seq": i })))
            .collect();
        Self::with_hits(hits, window)
    }

    pub fn with_hits(hits: Vec<RawHit>, window: u64) -> Self {
        Self {
            hits,
            window,
            state: Mutex::new(State::default()),
        }
    }

    pub fn fail_window(self, error: EngineError) -> Self {
        self.state.lock().unwrap().window_error = Some(error);
        self
    }

    /// Fail the `advance`-th scroll call (1-based).
    pub fn fail_scroll_at(self, advance: u64) -> Self {
        self.state.lock().unwrap().scroll_error_at = Some(advance);
        self
    }

    pub fn fail_clear(self) -> Self {
        self.state.lock().unwrap().clear_error = true;
        self
    }

    /// Cancel `token` while serving the `advance`-th scroll call.
    pub fn cancel_on_scroll(self, advance: u64, token: CancellationToken) -> Self {
        self.state.lock().unwrap().cancel_on_scroll = Some((advance, token));
        self
    }

    /// Cancel `token` while serving the call that opens the cursor.
    pub fn cancel_on_open(self, token: CancellationToken) -> Self {
        self.state.lock().unwrap().cancel_on_open = Some(token);
        self
    }

    /// Answer the call that opens the cursor only after `delay`.
    pub fn delay_open(self, delay: Duration) -> Self {
        self.state.lock().unwrap().open_delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Calls {
        self.state.lock().unwrap().calls.clone()
    }

    fn page(&self, state: &mut State, size: u64) -> Vec<RawHit> {
        let start = state.position.min(self.hits.len());
        let end = (start + size as usize).min(self.hits.len());
        state.position = end;
        self.hits[start..end].to_vec()
    }
}

fn engine_failure(reason: &str) -> EngineError {
    EngineError::from_response(
        500,
        &json!({ "error": { "type": "search_phase_execution_exception", "reason": reason } })
            .to_string(),
    )
}

#[async_trait]
impl SearchBackend for MockBackend {
    async fn max_result_window(&self, _index_pattern: &str) -> EngineResult<u64> {
        let mut state = self.state.lock().unwrap();
        state.calls.window += 1;
        match state.window_error.take() {
            Some(e) => Err(e),
            None => Ok(self.window),
        }
    }

    async fn count(&self, _index_pattern: &str, _query: &EngineQuery) -> EngineResult<u64> {
        self.state.lock().unwrap().calls.count += 1;
        Ok(self.hits.len() as u64)
    }

    async fn search(&self, _index_pattern: &str, request: &SearchRequest) -> EngineResult<SearchPage> {
        let mut state = self.state.lock().unwrap();
        state.calls.search += 1;
        state.calls.last_request = Some(request.clone());
        state.position = 0;
        let hits = self.page(&mut state, request.size);
        Ok(SearchPage {
            hits,
            scroll_id: None,
        })
    }

    async fn open_scroll(
        &self,
        _index_pattern: &str,
        request: &SearchRequest,
        _keep_alive: &str,
    ) -> EngineResult<SearchPage> {
        let (hits, delay) = {
            let mut state = self.state.lock().unwrap();
            state.calls.open_scroll += 1;
            state.calls.last_request = Some(request.clone());
            state.position = 0;
            if let Some(token) = &state.cancel_on_open {
                token.cancel();
            }
            (self.page(&mut state, request.size), state.open_delay)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(SearchPage {
            hits,
            scroll_id: Some("scroll-1".into()),
        })
    }

    async fn scroll(&self, scroll_id: &str, _keep_alive: &str) -> EngineResult<SearchPage> {
        let mut state = self.state.lock().unwrap();
        state.calls.scroll += 1;
        let advance = state.calls.scroll;

        if let Some((at, token)) = &state.cancel_on_scroll {
            if *at == advance {
                token.cancel();
            }
        }
        if state.scroll_error_at == Some(advance) {
            return Err(engine_failure("shard failure"));
        }

        let size = state
            .calls
            .last_request
            .as_ref()
            .map_or(0, |r| r.size);
        let hits = self.page(&mut state, size);
        Ok(SearchPage {
            hits,
            scroll_id: Some(scroll_id.to_string()),
        })
    }

    async fn clear_scroll(&self, scroll_id: &str) -> EngineResult<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.clear_scroll.push(scroll_id.to_string());
        if state.clear_error {
            return Err(engine_failure("no search context found"));
        }
        Ok(())
    }
}
