//! Scripted navigation scenarios
//!
//! A scenario is a list of steps replayed against the in-memory navigation
//! container and app state. Scenario files are YAML (or JSON):
//!
//! ```yaml
//! name: profile-then-ready
//! config:
//!   platform: ios
//!   navigation:
//!     screenInteractiveTracking: true
//! steps:
//!   - step: register
//!     initial: { name: Home, key: r1 }
//!   - step: navigate
//!     name: Profile
//!     key: r2
//!   - step: content_ready
//!   - step: unmount
//! ```

use anyhow::{bail, Context, Result};
use pulse_nav_core::navigation::{
    AppStateStatus, ContainerRef, ContainerSlot, ContentReadyOutcome, MemoryAppState,
    MemoryNavigationContainer, NavigationContainer, NavigationIntegration, NavigationRoute,
    Registration,
};
use pulse_nav_core::telemetry::SpanRecorder;
use pulse_nav_core::{create_navigation_integration_with_config, PulseConfig};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;
use tracing::{debug, info, warn};

/// One scripted action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
    /// Mount a new container and register it
    Register {
        #[serde(default)]
        initial: Option<NavigationRoute>,

        /// Hand the container over through a ref slot instead of directly
        #[serde(default)]
        indirect: bool,
    },
    /// Navigation action dispatched, tree not yet settled
    Dispatch,
    /// Tree settled on a route, without a preceding dispatch
    Settle { name: String, key: String },
    /// Dispatch followed by settle on a pushed route
    Navigate { name: String, key: String },
    GoBack,
    AppState { state: AppStateStatus },
    ContentReady,
    Unmount,
}

impl Step {
    pub fn label(&self) -> String {
        match self {
            Step::Register { initial, indirect } => {
                let via = if *indirect { " (indirect)" } else { "" };
                match initial {
                    Some(route) => format!("register {route}{via}"),
                    None => format!("register{via}"),
                }
            }
            Step::Dispatch => "dispatch".to_string(),
            Step::Settle { name, key } => format!("settle {name} ({key})"),
            Step::Navigate { name, key } => format!("navigate {name} ({key})"),
            Step::GoBack => "go_back".to_string(),
            Step::AppState { state } => format!("app_state {state}"),
            Step::ContentReady => "content_ready".to_string(),
            Step::Unmount => "unmount".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub name: Option<String>,

    /// Configuration used when none is given on the command line
    #[serde(default)]
    pub config: Option<PulseConfig>,

    pub steps: Vec<Step>,
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario file: {}", path.display()))?;
        Self::from_yaml_str(&content)
            .with_context(|| format!("Failed to parse scenario file: {}", path.display()))
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let scenario: Scenario = serde_yaml_ng::from_str(content)?;
        if scenario.steps.is_empty() {
            bail!("Scenario has no steps");
        }
        Ok(scenario)
    }
}

/// What a single step produced
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepReport {
    pub index: usize,
    pub step: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_ready: Option<ContentReadyOutcome>,
}

/// Replays steps against one integration and records the resulting spans.
pub struct ScenarioRunner {
    recorder: Rc<SpanRecorder>,
    app_state: Rc<MemoryAppState>,
    integration: NavigationIntegration,
    container: Option<Rc<MemoryNavigationContainer>>,
    registration: Option<Registration>,
    reports: Vec<StepReport>,
}

impl ScenarioRunner {
    pub fn new(config: &PulseConfig) -> Self {
        let recorder = Rc::new(SpanRecorder::new());
        let app_state = Rc::new(MemoryAppState::new(AppStateStatus::Active));
        let integration =
            create_navigation_integration_with_config(config, recorder.clone(), app_state.clone());
        if !integration.is_enabled() {
            warn!("Navigation integration is disabled by configuration; no spans will be recorded");
        }
        Self {
            recorder,
            app_state,
            integration,
            container: None,
            registration: None,
            reports: Vec::new(),
        }
    }

    pub fn recorder(&self) -> &SpanRecorder {
        &self.recorder
    }

    pub fn reports(&self) -> &[StepReport] {
        &self.reports
    }

    pub fn run(&mut self, scenario: &Scenario) -> Result<()> {
        info!(
            scenario = scenario.name.as_deref().unwrap_or("unnamed"),
            steps = scenario.steps.len(),
            "Replaying scenario"
        );
        for (index, step) in scenario.steps.iter().enumerate() {
            self.apply(index + 1, step)
                .with_context(|| format!("Step {} ({}) failed", index + 1, step.label()))?;
        }
        Ok(())
    }

    fn apply(&mut self, index: usize, step: &Step) -> Result<()> {
        debug!(index, step = %step.label(), "Applying step");
        let mut content_ready = None;

        match step {
            Step::Register { initial, indirect } => {
                let container = Rc::new(match initial {
                    Some(route) => MemoryNavigationContainer::with_initial_route(route.clone()),
                    None => MemoryNavigationContainer::new(),
                });
                let container_ref = if *indirect {
                    let mounted: Rc<dyn NavigationContainer> = container.clone();
                    let slot: ContainerSlot = Rc::new(RefCell::new(Some(mounted)));
                    ContainerRef::indirect(slot)
                } else {
                    ContainerRef::direct(container.clone())
                };
                let registration = self.integration.register_navigation_container(container_ref);
                self.registration = Some(registration);
                self.container = Some(container);
            }
            Step::Dispatch => self.container()?.dispatch(),
            Step::Settle { name, key } => {
                self.container()?.settle(NavigationRoute::new(name, key))
            }
            Step::Navigate { name, key } => {
                self.container()?.navigate(NavigationRoute::new(name, key))
            }
            Step::GoBack => {
                if !self.container()?.go_back() {
                    warn!(index, "go_back with nothing to go back to");
                }
            }
            Step::AppState { state } => {
                self.app_state.set_state(*state);
            }
            Step::ContentReady => {
                content_ready = Some(pulse_nav_core::mark_content_ready());
            }
            Step::Unmount => match self.registration.take() {
                Some(registration) => registration.cleanup(),
                None => bail!("unmount without a registered container"),
            },
        }

        self.reports.push(StepReport {
            index,
            step: step.label(),
            content_ready,
        });
        Ok(())
    }

    fn container(&self) -> Result<&MemoryNavigationContainer> {
        match self.container.as_deref() {
            Some(container) => Ok(container),
            None => bail!("no container registered yet; add a register step first"),
        }
    }
}
