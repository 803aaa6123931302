pub mod change_detector;
pub mod estimator;
pub mod identity;
pub mod locator;
pub mod notify;
pub mod numeric;
pub mod orchestrator;
pub mod page;
pub mod patterns;
pub mod revealer;
pub mod store;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use change_detector::{ChangeDetector, Diff};
pub use estimator::{CountEstimate, CountEstimator, StrategyId};
pub use identity::{parse_identity, IdentityExtractor};
pub use locator::{ContainerLocator, Located};
pub use notify::{LogNotifier, Notifier, WebhookNotifier};
pub use orchestrator::{CycleStats, PollSettings, PollingOrchestrator, TargetOutcome};
pub use patterns::{ControlKind, PatternKind, PatternTable};
pub use revealer::{RevealOutcome, RevealPhase, RevealState, RevealerEngine, Termination};
pub use store::{JsonFileStore, StateStore};
