//! Scripted generator for stage and pipeline tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use lazypack_shared::{LazyPackError, Result};

use crate::generation::{GenerationRequest, Generator};

/// Replays canned responses in order and records every request.
#[derive(Default)]
pub(crate) struct ScriptedGenerator {
    responses: Mutex<VecDeque<Result<String>>>,
    calls: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedGenerator {
    pub(crate) fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().map(|s| Ok(s.into())).collect()),
            calls: Mutex::default(),
        }
    }

    /// Queue a failing response.
    pub(crate) fn then_fail(self, message: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(LazyPackError::Generation(message.to_string())));
        self
    }

    pub(crate) fn calls(&self) -> Vec<GenerationRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        self.calls.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LazyPackError::Generation("script exhausted".into())))
    }
}
