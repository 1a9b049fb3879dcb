use std::cell::RefCell;

use rquickjs::object::Property;
use rquickjs::{Ctx, Object, Value};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("host modules are already installed")]
    AlreadyInstalled,
    #[error("host modules are not installed")]
    NotInstalled,
    #[error("export '{name}' is provided by both '{first}' and '{second}'")]
    DuplicateExport {
        name: String,
        first: &'static str,
        second: &'static str,
    },
    #[error("module '{module}' failed: {source}")]
    Module {
        module: &'static str,
        #[source]
        source: rquickjs::Error,
    },
}

/// A feature that contributes global bindings to the script environment.
pub trait HostModule {
    fn name(&self) -> &'static str;

    fn initialize(&self, _ctx: &Ctx<'_>) -> rquickjs::Result<()> {
        Ok(())
    }

    fn uninitialize(&self, _ctx: &Ctx<'_>) -> rquickjs::Result<()> {
        Ok(())
    }

    /// Named values to expose. Called once per install.
    fn exports<'js>(&self, ctx: &Ctx<'js>) -> rquickjs::Result<Vec<(&'static str, Value<'js>)>>;
}

/// Installs every module's exports onto a namespace object and removes them
/// again. There is no reference counting: one install, one uninstall.
#[derive(Default)]
pub struct ModuleRegistry {
    modules: Vec<Box<dyn HostModule>>,
    installed: RefCell<Option<Vec<&'static str>>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, module: impl HostModule + 'static) {
        self.modules.push(Box::new(module));
    }

    pub fn register_boxed(&mut self, module: Box<dyn HostModule>) {
        self.modules.push(module);
    }

    pub fn module_names(&self) -> Vec<&'static str> {
        self.modules.iter().map(|module| module.name()).collect()
    }

    pub fn is_installed(&self) -> bool {
        self.installed.borrow().is_some()
    }

    /// Initialize every module, then define each export as a read-only
    /// property of `namespace`. On failure, whatever was already defined is
    /// removed and the initialized modules are uninitialized again.
    pub fn install<'js>(
        &self,
        ctx: &Ctx<'js>,
        namespace: &Object<'js>,
    ) -> Result<(), RegistryError> {
        if self.is_installed() {
            return Err(RegistryError::AlreadyInstalled);
        }

        let mut progress = InstallProgress::default();
        match self.try_install(ctx, namespace, &mut progress) {
            Ok(()) => {
                debug!(target: "quickjs", bindings = ?progress.defined, "installed host modules");
                *self.installed.borrow_mut() = Some(progress.defined);
                Ok(())
            }
            Err(err) => {
                self.roll_back(ctx, namespace, progress);
                Err(err)
            }
        }
    }

    fn try_install<'js>(
        &self,
        ctx: &Ctx<'js>,
        namespace: &Object<'js>,
        progress: &mut InstallProgress,
    ) -> Result<(), RegistryError> {
        for (index, module) in self.modules.iter().enumerate() {
            module
                .initialize(ctx)
                .map_err(|source| module_error(module.name(), source))?;
            progress.initialized = index + 1;
        }

        let mut owners: Vec<(&'static str, &'static str)> = Vec::new();
        let mut bindings = Vec::new();
        for module in &self.modules {
            let exports = module
                .exports(ctx)
                .map_err(|source| module_error(module.name(), source))?;
            for (name, value) in exports {
                if let Some(&(_, first)) = owners.iter().find(|(existing, _)| *existing == name) {
                    return Err(RegistryError::DuplicateExport {
                        name: name.to_string(),
                        first,
                        second: module.name(),
                    });
                }
                owners.push((name, module.name()));
                bindings.push((name, value));
            }
        }

        for (name, value) in bindings {
            namespace
                .prop(name, Property::from(value).configurable())
                .map_err(|source| module_error("registry", source))?;
            progress.defined.push(name);
        }
        Ok(())
    }

    /// Undo a partial install. Secondary failures are logged, not returned.
    fn roll_back<'js>(&self, ctx: &Ctx<'js>, namespace: &Object<'js>, progress: InstallProgress) {
        for name in progress.defined {
            if let Err(err) = namespace.remove(name) {
                warn!(target: "quickjs", binding = name, error = %err, "failed to remove binding");
            }
        }
        for module in &self.modules[..progress.initialized] {
            if let Err(err) = module.uninitialize(ctx) {
                warn!(
                    target: "quickjs",
                    module = module.name(),
                    error = %err,
                    "failed to uninitialize module"
                );
            }
        }
        debug!(target: "quickjs", "rolled back partial install");
    }

    /// Remove the installed bindings, then uninitialize every module.
    pub fn uninstall<'js>(
        &self,
        ctx: &Ctx<'js>,
        namespace: &Object<'js>,
    ) -> Result<(), RegistryError> {
        let Some(defined) = self.installed.borrow_mut().take() else {
            return Err(RegistryError::NotInstalled);
        };

        for name in defined {
            namespace
                .remove(name)
                .map_err(|source| module_error("registry", source))?;
        }

        for module in &self.modules {
            module
                .uninitialize(ctx)
                .map_err(|source| module_error(module.name(), source))?;
        }

        debug!(target: "quickjs", "uninstalled host modules");
        Ok(())
    }
}

/// How far an install got before it stopped.
#[derive(Default)]
struct InstallProgress {
    initialized: usize,
    defined: Vec<&'static str>,
}

fn module_error(module: &'static str, source: rquickjs::Error) -> RegistryError {
    RegistryError::Module { module, source }
}
