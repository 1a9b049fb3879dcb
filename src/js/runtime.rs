use anyhow::{Context as AnyhowContext, Result};
use rquickjs::{Context, Ctx, Error as JsError, Function, Runtime, Value};

/// JavaScript runtime backed by QuickJS.
///
/// Owns the QuickJS runtime and context, evaluates scripts, and forwards
/// `console.*` output to `tracing`.
pub struct QuickJsEngine {
    runtime: Runtime,
    context: Context,
    max_pending_jobs: usize,
}

impl QuickJsEngine {
    pub fn new(max_pending_jobs: usize) -> Result<Self> {
        let runtime = Runtime::new().context("failed to create QuickJS runtime")?;
        let context = Context::full(&runtime).context("failed to create QuickJS context")?;
        let engine = Self {
            runtime,
            context,
            max_pending_jobs,
        };
        engine.init_console()?;
        Ok(engine)
    }

    /// Evaluate a script and discard the result.
    pub fn eval(&self, source: &str, filename: &str) -> Result<()> {
        self.eval_with::<()>(source, filename)
    }

    /// Evaluate a script and convert the result into `V`.
    pub fn eval_with<V>(&self, source: &str, filename: &str) -> Result<V>
    where
        V: for<'js> rquickjs::FromJs<'js>,
    {
        let script = Self::with_source_url(source, filename);
        let value = self
            .context
            .with(|ctx| ctx.eval::<V, _>(script).map_err(|err| js_error(&ctx, err)))?;

        self.execute_pending_jobs();
        Ok(value)
    }

    /// Run queued promise jobs, stopping after `max_pending_jobs` or at the
    /// first job that throws.
    pub fn execute_pending_jobs(&self) -> usize {
        let mut job_count = 0;

        while self.runtime.is_job_pending() {
            match self.runtime.execute_pending_job() {
                Ok(true) => {
                    job_count += 1;
                    if job_count >= self.max_pending_jobs {
                        tracing::warn!(
                            target: "quickjs",
                            "Stopped processing jobs after {} iterations (possible infinite loop)",
                            self.max_pending_jobs
                        );
                        break;
                    }
                }
                Ok(false) => break,
                Err(job_exception) => {
                    tracing::error!(
                        target: "quickjs",
                        "Job execution error: {:?}",
                        job_exception
                    );
                    break;
                }
            }
        }

        if job_count > 0 {
            tracing::debug!(target: "quickjs", "Executed {} pending jobs", job_count);
        }
        job_count
    }

    /// Run `f` inside the context. Pending JS exceptions are turned into
    /// readable errors.
    pub fn with_context<T, F>(&self, f: F) -> Result<T>
    where
        F: for<'js> FnOnce(Ctx<'js>) -> rquickjs::Result<T>,
    {
        self.context
            .with(|ctx| f(ctx.clone()).map_err(|err| js_error(&ctx, err)))
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    fn init_console(&self) -> Result<()> {
        self.context
            .with(|ctx| {
                let global = ctx.globals();
                let log_fn = Function::new(ctx.clone(), log_from_js)?.with_name("__webshim_log")?;
                let install: Function = ctx.eval(CONSOLE_BOOTSTRAP)?;
                install.call::<_, ()>((global, log_fn))
            })
            .map_err(anyhow::Error::from)
    }

    fn with_source_url(source: &str, filename: &str) -> Vec<u8> {
        let mut script = String::with_capacity(source.len() + filename.len() + 32);
        script.push_str(source);
        if !source.ends_with('\n') {
            script.push('\n');
        }
        script.push_str("//# sourceURL=");
        script.push_str(filename);
        script.push('\n');
        script.into_bytes()
    }
}

fn log_from_js(level: String, message: String) -> rquickjs::Result<()> {
    match level.as_str() {
        "error" => tracing::error!(target: "quickjs", message = %message),
        "warn" => tracing::warn!(target: "quickjs", message = %message),
        "debug" => tracing::debug!(target: "quickjs", message = %message),
        _ => tracing::info!(target: "quickjs", message = %message),
    }
    Ok(())
}

fn js_error(ctx: &Ctx<'_>, err: JsError) -> anyhow::Error {
    match err {
        JsError::Exception => {
            let message = capture_exception_message(ctx)
                .unwrap_or_else(|| "QuickJS exception".to_string());
            anyhow::anyhow!(message)
        }
        err => anyhow::Error::from(err),
    }
}

fn capture_exception_message(ctx: &Ctx<'_>) -> Option<String> {
    let exception: Value = ctx.catch();

    if let Some(obj) = exception.as_object() {
        if let Ok(message) = obj.get::<_, String>("message") {
            let name = obj
                .get::<_, String>("name")
                .unwrap_or_else(|_| "Error".to_string());
            if let Ok(stack) = obj.get::<_, String>("stack") {
                if !stack.is_empty() {
                    return Some(format!("{name}: {message}\nStack: {stack}"));
                }
            }
            return Some(format!("{name}: {message}"));
        }
    }

    if let Some(text) = exception.as_string() {
        return text.to_string().ok();
    }

    Some(format!("{:?}", exception))
}

const CONSOLE_BOOTSTRAP: &str = r#"
((global, log) => {
    const stringify = (value) => {
        try {
            if (typeof value === 'string') {
                return value;
            }
            if (value === undefined) {
                return 'undefined';
            }
            if (value === null) {
                return 'null';
            }
            return String(value);
        } catch (err) {
            return '[unprintable]';
        }
    };

    const logAt = (level) => (...args) => {
        try {
            log(level, args.map(stringify).join(' '));
        } catch (err) {
            // console must never throw
        }
    };

    if (typeof global.console !== 'object' || global.console === null) {
        global.console = {};
    }

    global.console.log = logAt('info');
    global.console.info = logAt('info');
    global.console.error = logAt('error');
    global.console.warn = logAt('warn');
    global.console.debug = logAt('debug');
})
"#;
