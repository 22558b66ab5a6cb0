//! Helpers shared by unit tests.
use std::{
    cell::{Cell, RefCell},
    collections::BTreeSet,
    fs,
    path::{Path, PathBuf},
};

use crate::{
    descriptor::ServiceDescriptor,
    error::LaunchctlError,
    launchctl::{CommandOutput, ServiceManager},
};

/// In-memory launchd: tracks registered labels and mirrors launchctl's
/// "already loaded" / "not currently loaded" diagnostics.
#[derive(Debug, Default)]
pub struct FakeServiceManager {
    registry: RefCell<BTreeSet<String>>,
    calls: RefCell<Vec<String>>,
    fail_list: Cell<bool>,
    next_failure: RefCell<Option<CommandOutput>>,
}

impl FakeServiceManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts with `label` already registered.
    pub fn with_registered(label: &str) -> Self {
        let manager = Self::default();
        manager.registry.borrow_mut().insert(label.to_string());
        manager
    }

    /// Makes every `list` call fail.
    pub fn fail_list(&self) {
        self.fail_list.set(true);
    }

    /// The next load/unload/remove returns `output` instead of acting.
    pub fn fail_next(&self, output: CommandOutput) {
        *self.next_failure.borrow_mut() = Some(output);
    }

    /// Labels currently registered.
    pub fn registered(&self) -> BTreeSet<String> {
        self.registry.borrow().clone()
    }

    /// Every invocation so far, e.g. `load /path` or `list`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    fn record(&self, call: String) -> Option<CommandOutput> {
        self.calls.borrow_mut().push(call);
        self.next_failure.borrow_mut().take()
    }

    fn label_of(descriptor: &Path) -> Result<String, CommandOutput> {
        ServiceDescriptor::load(descriptor)
            .map(|descriptor| descriptor.label)
            .map_err(|err| {
                CommandOutput::failure(1, format!("{}: {err}", descriptor.display()))
            })
    }
}

impl ServiceManager for FakeServiceManager {
    fn load(&self, descriptor: &Path) -> Result<CommandOutput, LaunchctlError> {
        if let Some(output) = self.record(format!("load {}", descriptor.display())) {
            return Ok(output);
        }
        let label = match Self::label_of(descriptor) {
            Ok(label) => label,
            Err(output) => return Ok(output),
        };

        if self.registry.borrow_mut().insert(label) {
            Ok(CommandOutput::success())
        } else {
            Ok(CommandOutput::failure(
                1,
                format!("{}: service already loaded", descriptor.display()),
            ))
        }
    }

    fn unload(&self, descriptor: &Path) -> Result<CommandOutput, LaunchctlError> {
        if let Some(output) = self.record(format!("unload {}", descriptor.display())) {
            return Ok(output);
        }
        let label = match Self::label_of(descriptor) {
            Ok(label) => label,
            Err(output) => return Ok(output),
        };

        if self.registry.borrow_mut().remove(&label) {
            Ok(CommandOutput::success())
        } else {
            Ok(CommandOutput::failure(
                1,
                format!("Could not unload {label}: Not currently loaded"),
            ))
        }
    }

    fn remove(&self, label: &str) -> Result<CommandOutput, LaunchctlError> {
        if let Some(output) = self.record(format!("remove {label}")) {
            return Ok(output);
        }

        if self.registry.borrow_mut().remove(label) {
            Ok(CommandOutput::success())
        } else {
            Ok(CommandOutput::failure(113, "Could not find specified service"))
        }
    }

    fn list(&self) -> Result<Vec<String>, LaunchctlError> {
        self.calls.borrow_mut().push("list".to_string());
        if self.fail_list.get() {
            return Err(LaunchctlError::Failed {
                program: "launchctl".to_string(),
                action: "list".to_string(),
                code: Some(1),
                diagnostic: "launchd unreachable".to_string(),
            });
        }
        Ok(self.registry.borrow().iter().cloned().collect())
    }
}

/// Creates an executable stub named `name` inside `dir`.
pub fn write_executable(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, "#!/bin/sh\nexit 0\n").expect("write executable stub");

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755))
            .expect("chmod executable stub");
    }

    path
}
