//! Listener registry and fan-out
//!
//! `Listeners` holds the observers registered for one run, in registration
//! order. It is frozen once built: dispatch only reads the registry, so a
//! single `Arc<Listeners>` can be shared by every thread running specs.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use crate::assertion::CapturedFailure;
use crate::description::Description;
use crate::error::ListenerFailure;
use crate::listener::{BoxedListener, TestListener};
use crate::result::TestResult;
use crate::spec::Spec;

/// Callback receiving contained listener failures
pub type FailureHook = Box<dyn Fn(&ListenerFailure) + Send + Sync>;

/// Configuration for dispatch
pub struct DispatchConfig {
    /// Log contained listener failures with `tracing::warn!`
    pub log_failures: bool,
    /// Called with every contained listener failure
    pub on_failure: Option<FailureHook>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            log_failures: true,
            on_failure: None,
        }
    }
}

impl DispatchConfig {
    /// Defaults, with `TESTLISTEN_QUIET` turning off failure logging
    pub fn from_env() -> Self {
        Self {
            log_failures: std::env::var_os("TESTLISTEN_QUIET").is_none(),
            ..Default::default()
        }
    }
}

/// The registered listeners for one run
pub struct Listeners {
    listeners: Vec<BoxedListener>,
    config: DispatchConfig,
}

impl Listeners {
    /// Create a dispatcher over the given listeners, in call order
    pub fn new(listeners: Vec<BoxedListener>, config: DispatchConfig) -> Self {
        Self { listeners, config }
    }

    /// A dispatcher with nobody listening
    pub fn empty() -> Self {
        Self::new(Vec::new(), DispatchConfig::default())
    }

    pub fn builder() -> ListenersBuilder {
        ListenersBuilder::new()
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Listener names in dispatch order
    pub fn names(&self) -> Vec<String> {
        self.listeners.iter().map(|l| listener_name(&**l)).collect()
    }

    pub fn project_started(&self) {
        self.notify("project_started", |l| l.project_started());
    }

    pub fn after_discovery(&self, descriptions: &[Description]) {
        self.notify("after_discovery", |l| l.after_discovery(descriptions));
    }

    pub fn spec_started(&self, description: &Description, spec: &dyn Spec) {
        self.notify("spec_started", |l| l.spec_started(description, spec));
    }

    pub fn spec_finished(&self, description: &Description, spec: &dyn Spec) {
        self.notify("spec_finished", |l| l.spec_finished(description, spec));
    }

    pub fn test_started(&self, description: &Description) {
        self.notify("test_started", |l| l.test_started(description));
    }

    pub fn test_finished(&self, description: &Description, result: &TestResult) {
        self.notify("test_finished", |l| l.test_finished(description, result));
    }

    pub fn project_finished(&self) {
        self.notify("project_finished", |l| l.project_finished());
    }

    /// Bracket a whole run.
    ///
    /// Fires `project_started` and `after_discovery` before `body`, and
    /// `project_finished` after it, even if `body` panics.
    pub fn run_project<R>(&self, discovered: &[Description], body: impl FnOnce() -> R) -> R {
        self.project_started();
        self.after_discovery(discovered);
        let outcome = panic::catch_unwind(AssertUnwindSafe(body));
        self.project_finished();
        outcome.unwrap_or_else(|payload| panic::resume_unwind(payload))
    }

    /// Bracket one spec instance with `spec_started`/`spec_finished`.
    ///
    /// `spec_finished` fires even if `body` panics; the panic then resumes.
    pub fn run_spec<R>(
        &self,
        description: &Description,
        spec: &dyn Spec,
        body: impl FnOnce() -> R,
    ) -> R {
        self.spec_started(description, spec);
        let outcome = panic::catch_unwind(AssertUnwindSafe(body));
        self.spec_finished(description, spec);
        outcome.unwrap_or_else(|payload| panic::resume_unwind(payload))
    }

    /// Run one test case attempt between `test_started` and `test_finished`.
    ///
    /// A panic in `body` becomes the result (see `TestResult::from_panic`),
    /// so every started test is always finished.
    pub fn run_test<R>(&self, description: &Description, body: impl FnOnce() -> R) -> TestResult
    where
        R: Into<TestResult>,
    {
        self.test_started(description);
        let result = match panic::catch_unwind(AssertUnwindSafe(body)) {
            Ok(r) => r.into(),
            Err(payload) => TestResult::from_panic(payload),
        };
        self.test_finished(description, &result);
        result
    }

    /// Report an ignored test: started, then finished as `Ignored`
    pub fn ignore_test(&self, description: &Description, reason: Option<String>) -> TestResult {
        self.run_test(description, || TestResult::ignored(reason))
    }

    fn notify<F>(&self, event: &'static str, f: F)
    where
        F: Fn(&dyn TestListener) -> anyhow::Result<()>,
    {
        tracing::trace!(event, listeners = self.listeners.len(), "dispatching");
        for listener in &self.listeners {
            let listener: &dyn TestListener = &**listener;
            let failure = match panic::catch_unwind(AssertUnwindSafe(|| f(listener))) {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => {
                    ListenerFailure::new(listener_name(listener), event, format!("{:#}", e))
                }
                Err(payload) => {
                    ListenerFailure::new(listener_name(listener), event, panic_message(payload))
                        .panicked()
                }
            };
            self.report(&failure);
        }
    }

    fn report(&self, failure: &ListenerFailure) {
        if self.config.log_failures {
            tracing::warn!(
                listener = %failure.listener,
                event = failure.event,
                panicked = failure.panicked,
                error = %failure.message,
                "listener callback failed"
            );
        }
        if let Some(ref hook) = self.config.on_failure {
            if panic::catch_unwind(AssertUnwindSafe(|| hook(failure))).is_err() {
                tracing::warn!(event = failure.event, "listener failure hook panicked");
            }
        }
    }
}

const UNNAMED_LISTENER: &str = "<unnamed listener>";

/// The listener's name, or a placeholder if `name()` itself panics
fn listener_name(listener: &dyn TestListener) -> String {
    panic::catch_unwind(AssertUnwindSafe(|| listener.name()))
        .unwrap_or_else(|_| UNNAMED_LISTENER.to_string())
}

impl Default for Listeners {
    fn default() -> Self {
        Self::empty()
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    let captured = CapturedFailure::from_payload(payload);
    match captured.message() {
        Some(message) => message.to_string(),
        None => captured.to_string(),
    }
}

/// Builder for `Listeners`
pub struct ListenersBuilder {
    listeners: Vec<BoxedListener>,
    config: DispatchConfig,
}

impl ListenersBuilder {
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
            config: DispatchConfig::default(),
        }
    }

    /// Register a listener after those already added
    pub fn listener(mut self, listener: impl TestListener + 'static) -> Self {
        self.listeners.push(Box::new(listener));
        self
    }

    /// Register several listeners, keeping their order
    pub fn listeners<I>(mut self, listeners: I) -> Self
    where
        I: IntoIterator<Item = BoxedListener>,
    {
        self.listeners.extend(listeners);
        self
    }

    pub fn log_failures(mut self, log: bool) -> Self {
        self.config.log_failures = log;
        self
    }

    /// Receive every contained listener failure
    pub fn on_failure(mut self, hook: impl Fn(&ListenerFailure) + Send + Sync + 'static) -> Self {
        self.config.on_failure = Some(Box::new(hook));
        self
    }

    /// Replace the whole config
    pub fn config(mut self, config: DispatchConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Listeners {
        Listeners::new(self.listeners, self.config)
    }
}

impl Default for ListenersBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::fail;
    use crate::spec::NamedSpec;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Log(Mutex<Vec<String>>);

    impl Log {
        fn push(&self, s: String) {
            self.0.lock().unwrap().push(s);
        }

        fn lines(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }
    }

    struct Tagged {
        tag: &'static str,
        log: Arc<Log>,
    }

    impl TestListener for Tagged {
        fn name(&self) -> String {
            self.tag.to_string()
        }

        fn test_started(&self, description: &Description) -> anyhow::Result<()> {
            self.log.push(format!("{} started {}", self.tag, description.name()));
            Ok(())
        }

        fn test_finished(
            &self,
            description: &Description,
            result: &TestResult,
        ) -> anyhow::Result<()> {
            self.log.push(format!(
                "{} finished {} {}",
                self.tag,
                description.name(),
                result.status()
            ));
            Ok(())
        }
    }

    struct Broken;

    impl TestListener for Broken {
        fn name(&self) -> String {
            "broken".into()
        }

        fn test_started(&self, _description: &Description) -> anyhow::Result<()> {
            anyhow::bail!("cannot write report")
        }

        fn test_finished(
            &self,
            _description: &Description,
            _result: &TestResult,
        ) -> anyhow::Result<()> {
            panic!("report writer crashed")
        }
    }

    fn tagged(tag: &'static str, log: &Arc<Log>) -> Tagged {
        Tagged {
            tag,
            log: Arc::clone(log),
        }
    }

    #[test]
    fn test_registration_order_is_call_order() {
        let log = Arc::new(Log::default());
        let listeners = Listeners::builder()
            .listener(tagged("a", &log))
            .listener(tagged("b", &log))
            .build();
        assert_eq!(listeners.names(), vec!["a", "b"]);

        let t = Description::root("S").append("t");
        listeners.test_started(&t);
        assert_eq!(log.lines(), vec!["a started t", "b started t"]);
    }

    #[test]
    fn test_failures_are_contained() {
        let log = Arc::new(Log::default());
        let failures = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&failures);
        let listeners = Listeners::builder()
            .listener(Broken)
            .listener(tagged("b", &log))
            .log_failures(false)
            .on_failure(move |f| sink.lock().unwrap().push(f.clone()))
            .build();

        let t = Description::root("S").append("t");
        listeners.test_started(&t);
        listeners.test_finished(&t, &TestResult::success());
        assert_eq!(log.lines(), vec!["b started t", "b finished t ok"]);

        let failures = failures.lock().unwrap();
        assert_eq!(failures.len(), 2);
        assert_eq!(failures[0].event, "test_started");
        assert_eq!(failures[0].message, "cannot write report");
        assert!(!failures[0].panicked);
        assert_eq!(failures[1].event, "test_finished");
        assert_eq!(failures[1].message, "report writer crashed");
        assert!(failures[1].panicked);
    }

    #[test]
    fn test_run_test_always_finishes() {
        let log = Arc::new(Log::default());
        let listeners = Listeners::builder().listener(tagged("a", &log)).build();
        let spec = Description::root("S");

        let ok = listeners.run_test(&spec.append("passes"), || ());
        let failed = listeners.run_test::<()>(&spec.append("asserts"), || {
            fail("1 != 2");
        });
        let errored = listeners.run_test::<()>(&spec.append("panics"), || {
            panic!("oops");
        });
        let ignored = listeners.ignore_test(&spec.append("skipped"), None);

        assert!(ok.is_success());
        assert!(failed.is_failure());
        assert!(errored.is_error());
        assert!(ignored.is_ignored());
        assert_eq!(
            log.lines(),
            vec![
                "a started passes",
                "a finished passes ok",
                "a started asserts",
                "a finished asserts FAILED",
                "a started panics",
                "a finished panics ERROR",
                "a started skipped",
                "a finished skipped ignored",
            ]
        );
    }

    #[test]
    fn test_run_spec_finishes_on_panic() {
        struct Count(Arc<Mutex<(u32, u32)>>);

        impl TestListener for Count {
            fn spec_started(&self, _d: &Description, _s: &dyn Spec) -> anyhow::Result<()> {
                self.0.lock().unwrap().0 += 1;
                Ok(())
            }

            fn spec_finished(&self, _d: &Description, _s: &dyn Spec) -> anyhow::Result<()> {
                self.0.lock().unwrap().1 += 1;
                Ok(())
            }
        }

        let counts = Arc::new(Mutex::new((0, 0)));
        let listeners = Listeners::builder().listener(Count(Arc::clone(&counts))).build();
        let spec = NamedSpec::new("S");
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            listeners.run_spec(&spec.description(), &spec, || {
                panic!("engine bug");
            })
        }));
        assert!(outcome.is_err());
        assert_eq!(*counts.lock().unwrap(), (1, 1));
    }

    struct BadName;

    impl TestListener for BadName {
        fn name(&self) -> String {
            panic!("no name today")
        }

        fn test_started(&self, _description: &Description) -> anyhow::Result<()> {
            anyhow::bail!("cannot start")
        }

        fn test_finished(
            &self,
            _description: &Description,
            _result: &TestResult,
        ) -> anyhow::Result<()> {
            panic!("cannot finish")
        }
    }

    #[test]
    fn test_panicking_name_is_contained() {
        let log = Arc::new(Log::default());
        let failures = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&failures);
        let listeners = Listeners::builder()
            .listener(BadName)
            .listener(tagged("b", &log))
            .log_failures(false)
            .on_failure(move |f: &ListenerFailure| sink.lock().unwrap().push(f.listener.clone()))
            .build();

        let t = Description::root("S").append("t");
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            listeners.test_started(&t);
            listeners.test_finished(&t, &TestResult::success());
        }));
        assert!(outcome.is_ok());
        assert_eq!(log.lines(), vec!["b started t", "b finished t ok"]);
        assert_eq!(
            *failures.lock().unwrap(),
            vec![UNNAMED_LISTENER.to_string(), UNNAMED_LISTENER.to_string()]
        );
        assert_eq!(listeners.names(), vec![UNNAMED_LISTENER, "b"]);
    }

    #[test]
    fn test_panicking_failure_hook_is_contained() {
        let log = Arc::new(Log::default());
        let listeners = Listeners::builder()
            .listener(Broken)
            .listener(tagged("b", &log))
            .log_failures(false)
            .on_failure(|_| panic!("hook crashed"))
            .build();

        let t = Description::root("S").append("t");
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| listeners.test_started(&t)));
        assert!(outcome.is_ok());
        assert_eq!(log.lines(), vec!["b started t"]);
    }

    #[test]
    fn test_config_from_env() {
        // only this test touches TESTLISTEN_QUIET
        std::env::remove_var("TESTLISTEN_QUIET");
        let config = DispatchConfig::from_env();
        assert!(config.log_failures);
        assert!(config.on_failure.is_none());

        std::env::set_var("TESTLISTEN_QUIET", "1");
        assert!(!DispatchConfig::from_env().log_failures);
        std::env::remove_var("TESTLISTEN_QUIET");
    }

    #[test]
    fn test_empty_dispatch() {
        let listeners = Listeners::default();
        assert!(listeners.is_empty());
        let r = listeners.run_project(&[], || 5);
        assert_eq!(r, 5);
    }

    #[test]
    fn test_listeners_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Listeners>();
    }
}
