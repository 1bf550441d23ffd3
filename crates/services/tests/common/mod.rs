#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use linguify_core::model::{ProgressPayload, UpdateKind};
use linguify_core::time::fixed_clock;
use services::{AppServices, ProgressApi, RetryPolicy, SubmitError, SyncConfig};
use storage::Storage;

/// `ProgressApi` that answers from a script, then with a fallback.
pub struct ScriptedApi {
    script: Mutex<VecDeque<Result<(), SubmitError>>>,
    fallback: Mutex<Result<(), SubmitError>>,
    calls: Mutex<Vec<(UpdateKind, ProgressPayload)>>,
}

impl ScriptedApi {
    pub fn ok() -> Arc<Self> {
        Self::scripted(Vec::new())
    }

    pub fn scripted(script: Vec<Result<(), SubmitError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            fallback: Mutex::new(Ok(())),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn set_fallback(&self, result: Result<(), SubmitError>) {
        *self.fallback.lock().unwrap() = result;
    }

    pub fn push(&self, result: Result<(), SubmitError>) {
        self.script.lock().unwrap().push_back(result);
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<(UpdateKind, ProgressPayload)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProgressApi for ScriptedApi {
    async fn submit(&self, kind: UpdateKind, payload: &ProgressPayload) -> Result<(), SubmitError> {
        self.calls.lock().unwrap().push((kind, payload.clone()));
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| self.fallback.lock().unwrap().clone())
    }
}

pub fn timeout() -> Result<(), SubmitError> {
    Err(SubmitError::Network("operation timed out".into()))
}

pub fn rejected() -> Result<(), SubmitError> {
    Err(SubmitError::Rejected {
        status: 400,
        message: "invalid lesson".into(),
    })
}

pub fn test_config() -> SyncConfig {
    let mut config = SyncConfig::default();
    config.retry = RetryPolicy::immediate(3);
    config
}

pub fn services_with(storage: Storage, api: Arc<ScriptedApi>, config: SyncConfig) -> AppServices {
    AppServices::from_parts(storage, api, config, fixed_clock())
}

pub fn in_memory_services(api: Arc<ScriptedApi>) -> AppServices {
    services_with(Storage::in_memory(), api, test_config())
}
