//! Lifecycle controller for the launch agent.
//!
//! Every operation is idempotent: repeating a command that already reached its
//! target state reports [`Transition::AlreadyInState`] instead of an error.
use std::{fs, io, path::Path};

use strum_macros::AsRefStr;
use tracing::{debug, info, warn};

use crate::{
    constants::{ALREADY_LOADED_MARKER, EXECUTABLE_NAME, NOT_LOADED_MARKER, SERVICE_LABEL},
    descriptor::ServiceDescriptor,
    error::AgentError,
    launchctl::{Disposition, ServiceManager, classify},
    runtime::AgentPaths,
};

/// Result of a start or stop that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// launchd changed state.
    Applied,
    /// launchd was already in the requested state; nothing changed.
    AlreadyInState,
}

/// Outcomes of the two halves of a restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartOutcome {
    pub stopped: Transition,
    pub started: Transition,
}

/// Independent steps of an uninstall, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum UninstallStep {
    /// Remove the label from launchd.
    Unregister,
    /// Delete the descriptor file.
    RemoveDescriptor,
    /// Delete the config record.
    RemoveConfigRecord,
}

impl UninstallStep {
    const ORDER: [UninstallStep; 3] = [
        UninstallStep::Unregister,
        UninstallStep::RemoveDescriptor,
        UninstallStep::RemoveConfigRecord,
    ];
}

/// What a single uninstall step did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// The step changed something.
    Performed,
    /// There was nothing to do.
    Skipped,
    /// The step failed; the reason is kept for logging only.
    Failed(String),
}

/// Aggregate of every uninstall step. Never short-circuits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UninstallReport {
    pub steps: Vec<(UninstallStep, StepOutcome)>,
}

impl UninstallReport {
    /// Outcome of `step`.
    pub fn outcome(&self, step: UninstallStep) -> Option<&StepOutcome> {
        self.steps
            .iter()
            .find(|(candidate, _)| *candidate == step)
            .map(|(_, outcome)| outcome)
    }

    /// Whether `step` actually changed something.
    pub fn performed(&self, step: UninstallStep) -> bool {
        matches!(self.outcome(step), Some(StepOutcome::Performed))
    }
}

/// Drives install, uninstall, start, stop and restart of the launch agent.
pub struct Controller<M: ServiceManager> {
    paths: AgentPaths,
    manager: M,
}

impl<M: ServiceManager> Controller<M> {
    /// Creates a controller over `paths` talking to `manager`.
    pub fn new(paths: AgentPaths, manager: M) -> Self {
        Self { paths, manager }
    }

    pub fn paths(&self) -> &AgentPaths {
        &self.paths
    }

    pub fn manager(&self) -> &M {
        &self.manager
    }

    /// Whether the descriptor file exists.
    pub fn is_installed(&self) -> bool {
        self.paths.descriptor_file.exists()
    }

    /// Writes the launch agent descriptor. Never starts the service.
    ///
    /// The executable is resolved before anything is written, and the descriptor is
    /// written last, so a failure leaves no descriptor that looks installed.
    pub fn install(&self) -> Result<ServiceDescriptor, AgentError> {
        self.write_descriptor().map_err(|err| {
            warn!("install failed: {err}");
            AgentError::Install(Box::new(err))
        })
    }

    fn write_descriptor(&self) -> Result<ServiceDescriptor, AgentError> {
        let program = self.paths.find_executable(EXECUTABLE_NAME)?;
        fs::create_dir_all(&self.paths.config_dir)?;

        let descriptor = ServiceDescriptor::for_agent(program, &self.paths);
        descriptor.write(&self.paths.descriptor_file)?;
        Ok(descriptor)
    }

    /// Unregisters the agent and removes its files. Each step is attempted regardless
    /// of how the others went; failures are logged, never returned.
    pub fn uninstall(&self) -> UninstallReport {
        let steps = UninstallStep::ORDER
            .into_iter()
            .map(|step| {
                let outcome = self.run_uninstall_step(step);
                match &outcome {
                    StepOutcome::Failed(reason) => {
                        warn!("uninstall step {} failed: {reason}", step.as_ref())
                    }
                    other => debug!("uninstall step {}: {other:?}", step.as_ref()),
                }
                (step, outcome)
            })
            .collect();

        UninstallReport { steps }
    }

    fn run_uninstall_step(&self, step: UninstallStep) -> StepOutcome {
        match step {
            UninstallStep::Unregister => self.unregister(),
            UninstallStep::RemoveDescriptor => remove_if_present(&self.paths.descriptor_file),
            UninstallStep::RemoveConfigRecord => remove_if_present(&self.paths.config_file),
        }
    }

    fn unregister(&self) -> StepOutcome {
        let registered = match self.manager.list() {
            Ok(labels) => labels.iter().any(|label| label == SERVICE_LABEL),
            Err(err) => return StepOutcome::Failed(err.to_string()),
        };
        if !registered {
            return StepOutcome::Skipped;
        }

        // Without a descriptor launchctl can still drop the job by label.
        let result = if self.is_installed() {
            self.manager.unload(&self.paths.descriptor_file)
        } else {
            self.manager.remove(SERVICE_LABEL)
        };

        match result {
            Ok(output) if output.succeeded() => StepOutcome::Performed,
            Ok(output) => StepOutcome::Failed(output.diagnostic()),
            Err(err) => StepOutcome::Failed(err.to_string()),
        }
    }

    /// Loads the agent into launchd.
    pub fn start(&self) -> Result<Transition, AgentError> {
        let descriptor = self.require_descriptor()?;
        let output = self
            .manager
            .load(descriptor)
            .map_err(|err| AgentError::Start {
                diagnostic: err.to_string(),
            })?;

        match classify(&output, ALREADY_LOADED_MARKER) {
            Disposition::Success => {
                info!("loaded {SERVICE_LABEL}");
                Ok(Transition::Applied)
            }
            Disposition::BenignNoop => {
                info!("{SERVICE_LABEL} already loaded");
                Ok(Transition::AlreadyInState)
            }
            Disposition::Failure(diagnostic) => Err(AgentError::Start { diagnostic }),
        }
    }

    /// Unloads the agent from launchd.
    pub fn stop(&self) -> Result<Transition, AgentError> {
        let descriptor = self.require_descriptor()?;
        let output = self
            .manager
            .unload(descriptor)
            .map_err(|err| AgentError::Stop {
                diagnostic: err.to_string(),
            })?;

        match classify(&output, NOT_LOADED_MARKER) {
            Disposition::Success => {
                info!("unloaded {SERVICE_LABEL}");
                Ok(Transition::Applied)
            }
            Disposition::BenignNoop => {
                info!("{SERVICE_LABEL} was not loaded");
                Ok(Transition::AlreadyInState)
            }
            Disposition::Failure(diagnostic) => Err(AgentError::Stop { diagnostic }),
        }
    }

    /// Stop followed by start. The service is briefly down in between.
    pub fn restart(&self) -> Result<RestartOutcome, AgentError> {
        let stopped = self.stop()?;
        let started = self.start()?;
        Ok(RestartOutcome { stopped, started })
    }

    fn require_descriptor(&self) -> Result<&Path, AgentError> {
        if self.is_installed() {
            Ok(&self.paths.descriptor_file)
        } else {
            Err(AgentError::NotInstalled(self.paths.descriptor_file.clone()))
        }
    }
}

fn remove_if_present(path: &Path) -> StepOutcome {
    match fs::remove_file(path) {
        Ok(()) => StepOutcome::Performed,
        Err(err) if err.kind() == io::ErrorKind::NotFound => StepOutcome::Skipped,
        Err(err) => StepOutcome::Failed(format!("{}: {err}", path.display())),
    }
}
