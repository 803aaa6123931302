// Test doubles for the three collaborator seams.
//
// - MemoryStore (StateStore) — in-memory map, counts saves, can be told to fail
// - CollectNotifier (Notifier) — records every event for assertions
// - FailingDriver (BrowserDriver) — every call fails with the same error
// - FlakyDriver (BrowserDriver) — fails the first N calls, then delegates
//
// The page simulator itself lives in the `simdom` crate.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use threadwatch_common::{
    AlertEvent, BrowserDriver, DriverError, Handle, NewItemsEvent, PageFn, ScrollTarget,
    StateMap, WaitPredicate, WatchError,
};

use crate::notify::Notifier;
use crate::store::StateStore;

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

pub struct MemoryStore {
    state: Mutex<StateMap>,
    saves: AtomicU32,
    fail_saves: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_state(StateMap::new())
    }

    pub fn with_state(state: StateMap) -> Self {
        Self {
            state: Mutex::new(state),
            saves: AtomicU32::new(0),
            fail_saves: AtomicBool::new(false),
        }
    }

    /// Make subsequent saves fail.
    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    pub fn saves(&self) -> u32 {
        self.saves.load(Ordering::SeqCst)
    }

    /// What the last successful save wrote.
    pub fn snapshot(&self) -> StateMap {
        self.state.lock().unwrap().clone()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn load(&self) -> Result<StateMap, WatchError> {
        Ok(self.state.lock().unwrap().clone())
    }

    async fn save(&self, state: &StateMap) -> Result<(), WatchError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(WatchError::Persistence("disk full".into()));
        }
        *self.state.lock().unwrap() = state.clone();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// CollectNotifier
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct CollectNotifier {
    events: Mutex<Vec<NewItemsEvent>>,
    alerts: Mutex<Vec<AlertEvent>>,
}

impl CollectNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<NewItemsEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn alerts(&self) -> Vec<AlertEvent> {
        self.alerts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for CollectNotifier {
    async fn notify(&self, event: &NewItemsEvent) -> Result<(), WatchError> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }

    async fn alert(&self, event: &AlertEvent) -> Result<(), WatchError> {
        self.alerts.lock().unwrap().push(event.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FailingDriver / FlakyDriver
// ---------------------------------------------------------------------------

/// Every call fails with `error`. `calls()` counts attempts.
pub struct FailingDriver {
    error: DriverError,
    calls: AtomicU32,
}

impl FailingDriver {
    pub fn new(error: DriverError) -> Self {
        Self {
            error,
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn fail<T>(&self) -> Result<T, DriverError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(self.error.clone())
    }
}

#[async_trait]
impl BrowserDriver for FailingDriver {
    async fn evaluate(&self, _call: PageFn, _args: Value) -> Result<Value, DriverError> {
        self.fail()
    }

    async fn wait_for(
        &self,
        _predicate: &WaitPredicate,
        _timeout: Duration,
    ) -> Result<bool, DriverError> {
        self.fail()
    }

    async fn click(&self, _handle: &Handle) -> Result<(), DriverError> {
        self.fail()
    }

    async fn scroll_by(&self, _target: &ScrollTarget, _delta: f64) -> Result<(), DriverError> {
        self.fail()
    }

    async fn current_url(&self) -> Result<String, DriverError> {
        self.fail()
    }

    async fn navigate(&self, _url: &str) -> Result<(), DriverError> {
        self.fail()
    }
}

/// Fails the first `failures` calls with a transport error, then hands every
/// call to `inner`.
pub struct FlakyDriver {
    inner: Arc<dyn BrowserDriver>,
    remaining: AtomicU32,
}

impl FlakyDriver {
    pub fn new(inner: Arc<dyn BrowserDriver>, failures: u32) -> Self {
        Self {
            inner,
            remaining: AtomicU32::new(failures),
        }
    }

    fn trip(&self) -> Result<(), DriverError> {
        let left = self.remaining.load(Ordering::SeqCst);
        if left == 0 {
            return Ok(());
        }
        self.remaining.store(left - 1, Ordering::SeqCst);
        Err(DriverError::Transport("connection reset".into()))
    }
}

#[async_trait]
impl BrowserDriver for FlakyDriver {
    async fn evaluate(&self, call: PageFn, args: Value) -> Result<Value, DriverError> {
        self.trip()?;
        self.inner.evaluate(call, args).await
    }

    async fn wait_for(
        &self,
        predicate: &WaitPredicate,
        timeout: Duration,
    ) -> Result<bool, DriverError> {
        self.trip()?;
        self.inner.wait_for(predicate, timeout).await
    }

    async fn click(&self, handle: &Handle) -> Result<(), DriverError> {
        self.trip()?;
        self.inner.click(handle).await
    }

    async fn scroll_by(&self, target: &ScrollTarget, delta: f64) -> Result<(), DriverError> {
        self.trip()?;
        self.inner.scroll_by(target, delta).await
    }

    async fn current_url(&self) -> Result<String, DriverError> {
        self.trip()?;
        self.inner.current_url().await
    }

    async fn navigate(&self, url: &str) -> Result<(), DriverError> {
        self.trip()?;
        self.inner.navigate(url).await
    }
}
