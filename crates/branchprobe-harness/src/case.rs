//! Test case registration.

use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::check::Recorder;
use crate::error::HarnessError;
use crate::mock::{MockRegistry, Resettable};

/// Body of a test case: runs once with the case's recorder.
pub type CaseBody = Box<dyn FnOnce(&mut Recorder<'_>)>;

/// Per-case state built fresh before the body runs and torn down after it,
/// whether the body returns or panics.
pub trait Fixture {
    /// Prepare the fixture. An `Err` is recorded as a failed check and the
    /// body is skipped.
    fn setup(&mut self) -> Result<(), String> {
        Ok(())
    }

    fn teardown(&mut self) {}
}

/// One named unit of test logic.
pub struct TestCase {
    name: String,
    body: CaseBody,
}

impl TestCase {
    /// Create a case from its name and body.
    pub fn new(name: impl Into<String>, body: impl FnOnce(&mut Recorder<'_>) + 'static) -> Self {
        Self {
            name: name.into(),
            body: Box::new(body),
        }
    }

    /// Name the case was registered under.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn into_parts(self) -> (String, CaseBody) {
        (self.name, self.body)
    }
}

impl std::fmt::Debug for TestCase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestCase").field("name", &self.name).finish()
    }
}

/// Ordered set of test cases plus the mocks shared between them.
///
/// A suite is consumed by the runner, so nothing can be registered once a
/// run has begun.
#[derive(Debug)]
pub struct Suite {
    name: String,
    cases: Vec<TestCase>,
    seen: HashSet<String>,
    mocks: MockRegistry,
}

impl Suite {
    /// Create an empty suite.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cases: Vec::new(),
            seen: HashSet::new(),
            mocks: MockRegistry::new(),
        }
    }

    /// Name of the suite, used in banners and log trace ids.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append a case. Names must be non-empty and unique within the suite.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        body: impl FnOnce(&mut Recorder<'_>) + 'static,
    ) -> Result<&mut Self, HarnessError> {
        self.push(TestCase::new(name, body))
    }

    /// Append a case whose body receives a fresh `F`.
    pub fn register_with_fixture<F, B>(
        &mut self,
        name: impl Into<String>,
        body: B,
    ) -> Result<&mut Self, HarnessError>
    where
        F: Fixture + Default + 'static,
        B: FnOnce(&mut F, &mut Recorder<'_>) + 'static,
    {
        self.register(name, move |rec| run_with_fixture::<F, B>(body, rec))
    }

    /// Append an already built case.
    pub fn push(&mut self, case: TestCase) -> Result<&mut Self, HarnessError> {
        if case.name.trim().is_empty() {
            return Err(HarnessError::EmptyCaseName);
        }
        if !self.seen.insert(case.name.clone()) {
            return Err(HarnessError::DuplicateCase { name: case.name });
        }
        self.cases.push(case);
        Ok(self)
    }

    /// Reset `mock` before and after every case.
    pub fn track(&mut self, mock: Arc<dyn Resettable>) -> &mut Self {
        self.mocks.track(mock);
        self
    }

    /// Registered case names in registration order.
    #[must_use]
    pub fn case_names(&self) -> Vec<&str> {
        self.cases.iter().map(TestCase::name).collect()
    }

    /// Number of registered cases.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cases.len()
    }

    /// Whether no case is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    /// Keep only the case called `name`.
    pub fn retain_exact(&mut self, name: &str) -> Result<(), HarnessError> {
        if !self.seen.contains(name) {
            return Err(HarnessError::UnknownCase {
                name: name.to_string(),
            });
        }
        self.cases.retain(|c| c.name == name);
        Ok(())
    }

    pub(crate) fn into_parts(self) -> (String, Vec<TestCase>, MockRegistry) {
        (self.name, self.cases, self.mocks)
    }
}

fn run_with_fixture<F, B>(body: B, rec: &mut Recorder<'_>)
where
    F: Fixture + Default,
    B: FnOnce(&mut F, &mut Recorder<'_>),
{
    let mut fixture = F::default();
    let result = match fixture.setup() {
        Ok(()) => panic::catch_unwind(AssertUnwindSafe(|| body(&mut fixture, rec))),
        Err(err) => {
            rec.fail(format!("fixture setup failed: {err}"), None);
            Ok(())
        }
    };
    fixture.teardown();
    if let Err(payload) = result {
        panic::resume_unwind(payload);
    }
}
