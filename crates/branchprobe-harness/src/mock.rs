//! Substitutable collaborators for functions under test.
//!
//! A [`Mock`] stands in for one dependency call: it captures arguments, counts
//! invocations, hands back canned values and can be told to fail on a chosen
//! call. Every mock can be reset to its as-constructed state; the runner
//! resets all tracked mocks before and after each case.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

/// Anything the runner must restore between cases.
pub trait Resettable {
    fn name(&self) -> &str;

    fn reset(&self);
}

/// Which invocations (1-based) of a mock yield its failure value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePlan {
    #[default]
    Never,
    /// Only the Nth call fails.
    OnCall(usize),
    /// The Nth call and every later one fail.
    FromCall(usize),
    Always,
}

impl FailurePlan {
    /// Whether the `call`-th invocation (1-based) fails.
    #[must_use]
    pub fn fails(self, call: usize) -> bool {
        match self {
            Self::Never => false,
            Self::OnCall(n) => call == n,
            Self::FromCall(n) => call >= n,
            Self::Always => true,
        }
    }
}

struct MockState<A, R> {
    calls: Vec<A>,
    queued: VecDeque<R>,
    canned: R,
    plan: FailurePlan,
    failure: Option<R>,
}

/// Call-counting, argument-capturing, failure-injecting stub.
///
/// `A` is the captured argument tuple and `R` the value each call returns.
/// `fallback` is what an unconfigured mock returns and what [`reset`]
/// restores.
///
/// [`reset`]: Resettable::reset
pub struct Mock<A, R> {
    name: String,
    fallback: R,
    state: Mutex<MockState<A, R>>,
}

impl<A, R: Clone> Mock<A, R> {
    /// Create a mock that returns `fallback` until configured otherwise.
    pub fn new(name: impl Into<String>, fallback: R) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(MockState {
                calls: Vec::new(),
                queued: VecDeque::new(),
                canned: fallback.clone(),
                plan: FailurePlan::Never,
                failure: None,
            }),
            fallback,
        }
    }

    /// Shared handle, ready to be cloned into closures and [`crate::Suite::track`].
    pub fn shared(name: impl Into<String>, fallback: R) -> Arc<Self> {
        Arc::new(Self::new(name, fallback))
    }

    /// Return `value` from every call not otherwise scripted.
    pub fn returns(&self, value: R) -> &Self {
        self.state.lock().canned = value;
        self
    }

    /// Return `values` in order from the next calls, then fall back to the
    /// canned value.
    pub fn returns_sequence(&self, values: impl IntoIterator<Item = R>) -> &Self {
        self.state.lock().queued.extend(values);
        self
    }

    /// Yield `failure` on the calls selected by `plan`.
    pub fn fail_with(&self, plan: FailurePlan, failure: R) -> &Self {
        let mut state = self.state.lock();
        state.plan = plan;
        state.failure = Some(failure);
        self
    }

    /// Record one call with `args` and produce its scripted result.
    pub fn invoke(&self, args: A) -> R {
        let mut state = self.state.lock();
        state.calls.push(args);
        let call = state.calls.len();
        if state.plan.fails(call)
            && let Some(failure) = &state.failure
        {
            return failure.clone();
        }
        match state.queued.pop_front() {
            Some(value) => value,
            None => state.canned.clone(),
        }
    }

    /// Number of invocations since construction or the last reset.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.state.lock().calls.len()
    }

    /// Whether the mock was invoked at all.
    #[must_use]
    pub fn was_called(&self) -> bool {
        self.call_count() > 0
    }

    /// Captured arguments of every invocation, oldest first.
    #[must_use]
    pub fn calls(&self) -> Vec<A>
    where
        A: Clone,
    {
        self.state.lock().calls.clone()
    }

    /// Arguments of the most recent invocation.
    #[must_use]
    pub fn last_call(&self) -> Option<A>
    where
        A: Clone,
    {
        self.state.lock().calls.last().cloned()
    }
}

impl<A, R: Default + Clone> Default for Mock<A, R> {
    fn default() -> Self {
        Self::new("mock", R::default())
    }
}

impl<A, R: Clone> Resettable for Mock<A, R> {
    fn name(&self) -> &str {
        &self.name
    }

    fn reset(&self) {
        let mut state = self.state.lock();
        state.calls.clear();
        state.queued.clear();
        state.canned = self.fallback.clone();
        state.plan = FailurePlan::Never;
        state.failure = None;
    }
}

impl<A, R> fmt::Debug for Mock<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Mock")
            .field("name", &self.name)
            .field("calls", &state.calls.len())
            .field("queued", &state.queued.len())
            .field("plan", &state.plan)
            .finish()
    }
}

/// Mocks the runner resets around every case.
#[derive(Default)]
pub struct MockRegistry {
    tracked: Vec<Arc<dyn Resettable>>,
}

impl MockRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `mock` to the set reset by [`MockRegistry::reset_all`].
    pub fn track(&mut self, mock: Arc<dyn Resettable>) {
        self.tracked.push(mock);
    }

    /// Reset every tracked mock.
    pub fn reset_all(&self) {
        for mock in &self.tracked {
            mock.reset();
        }
    }

    /// Names of the tracked mocks in tracking order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.tracked.iter().map(|m| m.name()).collect()
    }

    /// Number of tracked mocks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tracked.len()
    }

    /// Whether no mock is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tracked.is_empty()
    }
}

impl fmt::Debug for MockRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
