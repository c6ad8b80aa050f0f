//! Event recording and lifecycle checks
//!
//! `EventRecorder` is a listener that keeps every callback it sees.
//! `check_lifecycle` validates one listener's view of a complete run and
//! `compare_events` diffs a recorded log against an expected one.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, PoisonError};

use similar::TextDiff;

use crate::description::Description;
use crate::error::{AssertionError, ErrorKind};
use crate::listener::TestListener;
use crate::result::{TestResult, TestStatus};
use crate::spec::Spec;

/// One lifecycle callback as seen by a listener
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    ProjectStarted,
    AfterDiscovery(Vec<Description>),
    /// Spec description and spec name
    SpecStarted(Description, String),
    SpecFinished(Description, String),
    TestStarted(Description),
    TestFinished(Description, TestStatus),
    ProjectFinished,
}

impl Event {
    /// The description the event is about, if any
    pub fn description(&self) -> Option<&Description> {
        match self {
            Self::SpecStarted(d, _)
            | Self::SpecFinished(d, _)
            | Self::TestStarted(d)
            | Self::TestFinished(d, _) => Some(d),
            _ => None,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProjectStarted => write!(f, "project_started"),
            Self::AfterDiscovery(ds) => {
                let names: Vec<String> = ds.iter().map(|d| d.to_string()).collect();
                write!(f, "after_discovery [{}]", names.join(", "))
            }
            Self::SpecStarted(d, _) => write!(f, "spec_started {}", d),
            Self::SpecFinished(d, _) => write!(f, "spec_finished {}", d),
            Self::TestStarted(d) => write!(f, "test_started {}", d),
            Self::TestFinished(d, status) => write!(f, "test_finished {} {}", d, status),
            Self::ProjectFinished => write!(f, "project_finished"),
        }
    }
}

/// A listener that records every event it receives
#[derive(Debug, Default)]
pub struct EventRecorder {
    events: Mutex<Vec<Event>>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A snapshot of the events seen so far
    pub fn events(&self) -> Vec<Event> {
        self.lock().clone()
    }

    /// Events about `description` or anything below it
    pub fn events_for(&self, description: &Description) -> Vec<Event> {
        self.lock()
            .iter()
            .filter(|e| {
                e.description()
                    .map_or(false, |d| d == description || description.is_ancestor_of(d))
            })
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn record(&self, event: Event) -> anyhow::Result<()> {
        self.lock().push(event);
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Event>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TestListener for EventRecorder {
    fn project_started(&self) -> anyhow::Result<()> {
        self.record(Event::ProjectStarted)
    }

    fn after_discovery(&self, descriptions: &[Description]) -> anyhow::Result<()> {
        self.record(Event::AfterDiscovery(descriptions.to_vec()))
    }

    fn spec_started(&self, description: &Description, spec: &dyn Spec) -> anyhow::Result<()> {
        self.record(Event::SpecStarted(description.clone(), spec.name()))
    }

    fn spec_finished(&self, description: &Description, spec: &dyn Spec) -> anyhow::Result<()> {
        self.record(Event::SpecFinished(description.clone(), spec.name()))
    }

    fn test_started(&self, description: &Description) -> anyhow::Result<()> {
        self.record(Event::TestStarted(description.clone()))
    }

    fn test_finished(&self, description: &Description, result: &TestResult) -> anyhow::Result<()> {
        self.record(Event::TestFinished(description.clone(), result.status()))
    }

    fn project_finished(&self) -> anyhow::Result<()> {
        self.record(Event::ProjectFinished)
    }
}

fn violation(index: usize, event: &Event, message: impl fmt::Display) -> AssertionError {
    AssertionError::new(
        ErrorKind::LifecycleViolation,
        format!("event {} ({}): {}", index, event, message),
    )
}

/// Check one listener's view of a complete run against the ordering rules.
///
/// Spec instances of the same spec may overlap, and events of different
/// specs may interleave; everything else must nest properly.
pub fn check_lifecycle(events: &[Event]) -> Result<(), AssertionError> {
    let mut project_started = false;
    let mut discovered = false;
    let mut project_finished = false;
    // open spec instances per spec description
    let mut open_specs: HashMap<&Description, usize> = HashMap::new();
    let mut running: HashMap<&Description, usize> = HashMap::new();

    for (i, event) in events.iter().enumerate() {
        if project_finished {
            return Err(violation(i, event, "event after project_finished"));
        }
        match event {
            Event::ProjectStarted => {
                if project_started {
                    return Err(violation(i, event, "project started twice"));
                }
                project_started = true;
            }
            _ if !project_started => {
                return Err(violation(i, event, "event before project_started"));
            }
            Event::AfterDiscovery(_) => {
                if discovered {
                    return Err(violation(i, event, "discovery reported twice"));
                }
                discovered = true;
            }
            Event::SpecStarted(d, _) => {
                if !discovered {
                    return Err(violation(i, event, "spec started before after_discovery"));
                }
                *open_specs.entry(d).or_insert(0) += 1;
            }
            Event::SpecFinished(d, _) => {
                let open = open_specs.get_mut(d).filter(|n| **n > 0);
                let Some(open) = open else {
                    return Err(violation(i, event, "spec finished without being started"));
                };
                *open -= 1;
                if *open == 0 {
                    let still_running = running
                        .iter()
                        .find(|(t, n)| **n > 0 && (**t == d || d.is_ancestor_of(t)));
                    if let Some((t, _)) = still_running {
                        return Err(violation(i, event, format!("test {} still running", t)));
                    }
                }
            }
            Event::TestStarted(d) => {
                if d.is_root() {
                    return Err(violation(i, event, "test description must lie below its spec"));
                }
                if !open_specs.get(&d.spec_root()).map_or(false, |n| *n > 0) {
                    return Err(violation(i, event, "test started outside a running spec"));
                }
                *running.entry(d).or_insert(0) += 1;
            }
            Event::TestFinished(d, _) => {
                let Some(n) = running.get_mut(d).filter(|n| **n > 0) else {
                    return Err(violation(i, event, "test finished without being started"));
                };
                *n -= 1;
            }
            Event::ProjectFinished => {
                if !discovered {
                    return Err(violation(i, event, "project finished without after_discovery"));
                }
                if let Some((d, _)) = open_specs.iter().find(|(_, n)| **n > 0) {
                    return Err(violation(i, event, format!("spec {} still running", d)));
                }
                if let Some((d, _)) = running.iter().find(|(_, n)| **n > 0) {
                    return Err(violation(i, event, format!("test {} still running", d)));
                }
                project_finished = true;
            }
        }
    }

    if !events.is_empty() && !project_finished {
        return Err(AssertionError::new(
            ErrorKind::LifecycleViolation,
            "run ended without project_finished",
        ));
    }
    Ok(())
}

/// Compare a recorded event log to the expected one.
///
/// On mismatch the error message carries a unified diff of the two logs.
pub fn compare_events(actual: &[Event], expected: &[Event]) -> Result<(), AssertionError> {
    if actual == expected {
        return Ok(());
    }
    let render = |events: &[Event]| -> String {
        events.iter().map(|e| format!("{}\n", e)).collect()
    };
    let expected_text = render(expected);
    let actual_text = render(actual);
    let diff = TextDiff::from_lines(&expected_text, &actual_text);
    let udiff = diff.unified_diff().header("expected", "actual").to_string();
    Err(AssertionError::failed(format!("event logs differ\n{}", udiff)))
}
