use std::time::Duration;

use anyhow::{Context as AnyhowContext, Result};
use rquickjs::Ctx;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info};

use super::events::EventsModule;
use super::misc::MiscModule;
use super::performance::PerformanceModule;
use super::registry::{HostModule, ModuleRegistry};
use super::runtime::QuickJsEngine;
use super::storage::StorageModule;
use super::timers::TimersModule;
use crate::config::ShimConfig;

/// A QuickJS context with the Web API host modules installed on its globals.
pub struct WebShim {
    registry: ModuleRegistry,
    timers: TimersModule,
    engine: QuickJsEngine,
}

impl WebShim {
    /// Build the engine, register the standard modules and install them.
    pub fn new(config: &ShimConfig) -> Result<Self> {
        Self::with_modules(config, Vec::new())
    }

    /// Like [`WebShim::new`], with extra modules registered after the
    /// standard ones.
    pub fn with_modules(config: &ShimConfig, extra: Vec<Box<dyn HostModule>>) -> Result<Self> {
        let engine = QuickJsEngine::new(config.runtime.max_pending_jobs)?;
        let timers = TimersModule::new(config.timers.min_interval_ms);
        let storage = StorageModule::new(&config.storage).context("failed to open storage")?;

        let mut registry = ModuleRegistry::new();
        registry.register(EventsModule);
        registry.register(timers.clone());
        registry.register(PerformanceModule::new());
        registry.register(storage);
        registry.register(MiscModule);
        for module in extra {
            registry.register_boxed(module);
        }

        let shim = Self {
            registry,
            timers,
            engine,
        };
        shim.install()?;
        info!(target: "webshim", modules = ?shim.registry.module_names(), "web shim ready");
        Ok(shim)
    }

    pub fn install(&self) -> Result<()> {
        self.engine
            .context()
            .with(|ctx| self.registry.install(&ctx, &ctx.globals()))?;
        Ok(())
    }

    /// Remove every installed binding and release module state.
    pub fn shutdown(&self) -> Result<()> {
        self.engine
            .context()
            .with(|ctx| self.registry.uninstall(&ctx, &ctx.globals()))?;
        Ok(())
    }

    pub fn is_installed(&self) -> bool {
        self.registry.is_installed()
    }

    pub fn engine(&self) -> &QuickJsEngine {
        &self.engine
    }

    pub fn eval(&self, source: &str, filename: &str) -> Result<()> {
        self.engine.eval(source, filename)
    }

    pub fn eval_with<V>(&self, source: &str, filename: &str) -> Result<V>
    where
        V: for<'js> rquickjs::FromJs<'js>,
    {
        self.engine.eval_with(source, filename)
    }

    pub fn with_context<T, F>(&self, f: F) -> Result<T>
    where
        F: for<'js> FnOnce(Ctx<'js>) -> rquickjs::Result<T>,
    {
        self.engine.with_context(f)
    }

    /// Fire every timer that is due now.
    pub fn poll_timers(&self) -> Result<usize> {
        self.timers.run_due(&self.engine)
    }

    pub fn has_pending_timers(&self) -> bool {
        !self.timers.queue().is_empty()
    }

    /// Drive timers until none are left. With a `limit`, stop once the next
    /// timer would fire after it. Returns whether the queue drained.
    pub async fn run_until_idle(&self, limit: Option<Duration>) -> Result<bool> {
        let deadline = limit.map(|limit| Instant::now() + limit);
        loop {
            self.poll_timers()?;
            let Some(next) = self.timers.queue().next_deadline() else {
                return Ok(true);
            };
            let next = Instant::from_std(next);
            if let Some(deadline) = deadline {
                if next > deadline {
                    debug!(
                        target: "webshim",
                        pending = self.timers.queue().len(),
                        "stopping with timers still queued"
                    );
                    return Ok(false);
                }
            }
            sleep_until(next).await;
        }
    }
}

impl Drop for WebShim {
    fn drop(&mut self) {
        self.timers.release();
    }
}
