//! Entry point extraction: the document program is the module's `default`
//! export, and it must be callable.

use crate::RenderError;
use deno_core::{v8, JsRuntime};

/// The template's document function, still owned by its isolate.
pub struct EntryPoint(pub(crate) v8::Global<v8::Function>);

/// Reads `default` out of an evaluated module namespace.
pub fn extract(
    runtime: &mut JsRuntime,
    namespace: &v8::Global<v8::Object>,
) -> Result<EntryPoint, RenderError> {
    let scope = &mut runtime.handle_scope();
    let namespace = v8::Local::new(scope, namespace);
    let key = v8::String::new(scope, "default")
        .ok_or_else(|| RenderError::internal("failed to allocate export name"))?;

    if !namespace.has(scope, key.into()).unwrap_or(false) {
        return Err(RenderError::NoEntryPoint("no default export".into()));
    }

    let value = namespace
        .get(scope, key.into())
        .ok_or_else(|| RenderError::NoEntryPoint("an unreadable default export".into()))?;

    match v8::Local::<v8::Function>::try_from(value) {
        Ok(function) => Ok(EntryPoint(v8::Global::new(scope, function))),
        Err(_) => Err(RenderError::NoEntryPoint(describe(scope, value))),
    }
}

fn describe(scope: &mut v8::HandleScope, value: v8::Local<v8::Value>) -> String {
    if value.is_undefined() {
        "undefined".into()
    } else if value.is_null() {
        "null".into()
    } else if value.is_number() || value.is_big_int() {
        format!("a number ({})", value.to_rust_string_lossy(scope))
    } else if value.is_string() {
        "a string".into()
    } else if value.is_boolean() {
        format!("a boolean ({})", value.to_rust_string_lossy(scope))
    } else if value.is_array() {
        "an array".into()
    } else if value.is_promise() {
        "a promise".into()
    } else {
        "an object".into()
    }
}
