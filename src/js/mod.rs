//! QuickJS host: the engine, the module registry and the host modules that
//! make up the Web API surface.

pub mod events;
pub mod misc;
pub mod performance;
pub mod registry;
pub mod runtime;
pub mod shim;
pub mod storage;
pub mod timers;

pub use registry::{HostModule, ModuleRegistry, RegistryError};
pub use runtime::QuickJsEngine;
pub use shim::WebShim;

use rquickjs::{Ctx, Exception};

/// Throw an `Error` whose `name` is `name`, the way DOMException-style
/// failures surface to scripts.
pub(crate) fn throw_named(ctx: &Ctx<'_>, name: &str, message: &str) -> rquickjs::Error {
    let exception = match Exception::from_message(ctx.clone(), message) {
        Ok(exception) => exception,
        Err(err) => return err,
    };
    if let Err(err) = exception.as_object().set("name", name) {
        return err;
    }
    ctx.throw(exception.into_value())
}
