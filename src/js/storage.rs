use std::rc::Rc;

use rquickjs::class::{Trace, Tracer};
use rquickjs::convert::Coerced;
use rquickjs::function::Opt;
use rquickjs::{Class, Ctx, Exception, FromJs, JsLifetime, Result, Value};
use tracing::warn;

use super::registry::HostModule;
use crate::config::StorageConfig;
use crate::storage::{KeyValueStore, MemoryStore, SqliteStore, StorageError};

/// A `Storage` object. Instances only come from the host; scripts cannot
/// construct one.
#[derive(JsLifetime)]
#[rquickjs::class(rename = "Storage")]
pub struct JsStorage {
    store: Rc<dyn KeyValueStore>,
}

impl<'js> Trace<'js> for JsStorage {
    fn trace<'a>(&self, _tracer: Tracer<'a, 'js>) {}
}

#[rquickjs::methods(rename_all = "camelCase")]
impl<'js> JsStorage {
    #[qjs(get)]
    pub fn length(&self, ctx: Ctx<'js>) -> Result<u32> {
        let len = self.store.len().map_err(|err| storage_error(&ctx, "length", err))?;
        Ok(len as u32)
    }

    pub fn key(&self, ctx: Ctx<'js>, index: Opt<Value<'js>>) -> Result<Value<'js>> {
        let index = match index.0 {
            Some(value) => Coerced::<f64>::from_js(&ctx, value)?.0,
            None => return Err(missing_argument(&ctx, "key", 1, 0)),
        };
        if !index.is_finite() || index < 0.0 {
            return Ok(Value::new_null(ctx));
        }
        let key = self
            .store
            .key(index as usize)
            .map_err(|err| storage_error(&ctx, "key", err))?;
        string_or_null(ctx, key)
    }

    pub fn get_item(&self, ctx: Ctx<'js>, key: Opt<Value<'js>>) -> Result<Value<'js>> {
        let key = string_argument(&ctx, "getItem", key.0, 1, 0)?;
        let value = self
            .store
            .get(&key)
            .map_err(|err| storage_error(&ctx, "getItem", err))?;
        string_or_null(ctx, value)
    }

    pub fn set_item(
        &self,
        ctx: Ctx<'js>,
        key: Opt<Value<'js>>,
        value: Opt<Value<'js>>,
    ) -> Result<()> {
        let present = usize::from(key.0.is_some()) + usize::from(value.0.is_some());
        let key = string_argument(&ctx, "setItem", key.0, 2, present)?;
        let value = string_argument(&ctx, "setItem", value.0, 2, present)?;
        self.store
            .set(&key, &value)
            .map_err(|err| storage_error(&ctx, "setItem", err))
    }

    pub fn remove_item(&self, ctx: Ctx<'js>, key: Opt<Value<'js>>) -> Result<()> {
        let key = string_argument(&ctx, "removeItem", key.0, 1, 0)?;
        self.store
            .remove(&key)
            .map_err(|err| storage_error(&ctx, "removeItem", err))
    }

    pub fn clear(&self, ctx: Ctx<'js>) -> Result<()> {
        self.store
            .clear()
            .map_err(|err| storage_error(&ctx, "clear", err))
    }
}

/// Missing keys and out-of-range indices are `null`, not `undefined`.
fn string_or_null<'js>(ctx: Ctx<'js>, value: Option<String>) -> Result<Value<'js>> {
    match value {
        Some(value) => Ok(rquickjs::String::from_str(ctx, &value)?.into_value()),
        None => Ok(Value::new_null(ctx)),
    }
}

fn string_argument<'js>(
    ctx: &Ctx<'js>,
    operation: &str,
    value: Option<Value<'js>>,
    required: usize,
    present: usize,
) -> Result<String> {
    match value {
        Some(value) => Ok(Coerced::<String>::from_js(ctx, value)?.0),
        None => Err(missing_argument(ctx, operation, required, present)),
    }
}

fn missing_argument(
    ctx: &Ctx<'_>,
    operation: &str,
    required: usize,
    present: usize,
) -> rquickjs::Error {
    let noun = if required == 1 { "argument" } else { "arguments" };
    Exception::throw_type(
        ctx,
        &format!(
            "Failed to execute '{operation}' on 'Storage': \
             {required} {noun} required, but only {present} present."
        ),
    )
}

fn storage_error(ctx: &Ctx<'_>, operation: &str, err: StorageError) -> rquickjs::Error {
    warn!(target: "webshim", operation, error = %err, "storage operation failed");
    Exception::throw_message(ctx, &format!("Failed to execute '{operation}' on 'Storage': {err}"))
}

/// `localStorage` and `sessionStorage`.
///
/// Local storage is backed by sqlite when persistence is on and by memory
/// otherwise; session storage always lives in memory and dies with the
/// module.
pub struct StorageModule {
    local: Rc<dyn KeyValueStore>,
    session: Rc<dyn KeyValueStore>,
}

impl StorageModule {
    pub fn new(config: &StorageConfig) -> std::result::Result<Self, StorageError> {
        let local: Rc<dyn KeyValueStore> = if config.persistent {
            Rc::new(SqliteStore::new(config.data_dir.as_deref(), &config.origin)?)
        } else {
            Rc::new(MemoryStore::new())
        };
        Ok(Self::with_stores(local, Rc::new(MemoryStore::new())))
    }

    pub fn with_stores(local: Rc<dyn KeyValueStore>, session: Rc<dyn KeyValueStore>) -> Self {
        Self { local, session }
    }
}

impl HostModule for StorageModule {
    fn name(&self) -> &'static str {
        "storage"
    }

    fn uninitialize(&self, _ctx: &Ctx<'_>) -> Result<()> {
        if let Err(err) = self.session.clear() {
            warn!(target: "webshim", error = %err, "failed to clear session storage");
        }
        Ok(())
    }

    fn exports<'js>(&self, ctx: &Ctx<'js>) -> Result<Vec<(&'static str, Value<'js>)>> {
        let local = Class::instance(
            ctx.clone(),
            JsStorage {
                store: Rc::clone(&self.local),
            },
        )?;
        let session = Class::instance(
            ctx.clone(),
            JsStorage {
                store: Rc::clone(&self.session),
            },
        )?;

        Ok(vec![
            ("localStorage", local.into_value()),
            ("sessionStorage", session.into_value()),
        ])
    }
}
