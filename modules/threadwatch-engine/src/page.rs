// Typed wrappers over `BrowserDriver::evaluate`.

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::warn;

use threadwatch_common::{
    BrowserDriver, DomView, DriverError, Handle, PageFn, RawItemRef, ScrollMetrics,
    ScrollTarget, WatchError,
};

/// Evaluate `call` and decode its result. Driver failures become
/// `WatchError::Driver`; shape mismatches become `WatchError::MalformedPage`.
pub async fn call<T: DeserializeOwned>(
    driver: &dyn BrowserDriver,
    call: PageFn,
    args: Value,
) -> Result<T, WatchError> {
    let value = driver.evaluate(call, args).await?;
    serde_json::from_value(value).map_err(|e| WatchError::MalformedPage {
        call: call.to_string(),
        message: e.to_string(),
    })
}

/// Keep driver failures, swallow everything else with a warning and use
/// `fallback`. Used inside the reveal loop, which must not fail on page noise.
pub fn tolerate<T>(
    result: Result<T, WatchError>,
    fallback: T,
    what: &str,
) -> Result<T, DriverError> {
    match result {
        Ok(v) => Ok(v),
        Err(WatchError::Driver(e)) => Err(e),
        Err(e) => {
            warn!(what, error = %e, "Ignoring page fault");
            Ok(fallback)
        }
    }
}

pub async fn dom_view(
    driver: &dyn BrowserDriver,
    root: Option<&Handle>,
) -> Result<DomView, WatchError> {
    call(driver, PageFn::CountSignals, json!({ "root": root })).await
}

pub async fn item_refs(
    driver: &dyn BrowserDriver,
    root: &Handle,
) -> Result<Vec<RawItemRef>, WatchError> {
    call(driver, PageFn::ItemRefs, json!({ "root": root })).await
}

pub async fn scroll_metrics(
    driver: &dyn BrowserDriver,
    scrollable: Option<&Handle>,
) -> Result<ScrollMetrics, WatchError> {
    let handle = match ScrollTarget::for_scrollable(scrollable) {
        ScrollTarget::Window => None,
        ScrollTarget::Element(h) => Some(h),
    };
    call(driver, PageFn::ScrollMetrics, json!({ "handle": handle })).await
}

/// Liveness of each handle, in order. The document handle is always alive
/// and never sent to the page.
pub async fn handles_alive(
    driver: &dyn BrowserDriver,
    handles: &[&Handle],
) -> Result<Vec<bool>, WatchError> {
    let to_check: Vec<&Handle> = handles
        .iter()
        .copied()
        .filter(|h| !h.is_document())
        .collect();
    let reported: Vec<bool> = if to_check.is_empty() {
        Vec::new()
    } else {
        call(driver, PageFn::HandlesAlive, json!({ "handles": to_check })).await?
    };
    if reported.len() != to_check.len() {
        return Err(WatchError::MalformedPage {
            call: PageFn::HandlesAlive.to_string(),
            message: format!(
                "asked about {} handles, got {}",
                to_check.len(),
                reported.len()
            ),
        });
    }

    let mut reported = reported.into_iter();
    Ok(handles
        .iter()
        .map(|h| h.is_document() || reported.next().unwrap_or(false))
        .collect())
}
