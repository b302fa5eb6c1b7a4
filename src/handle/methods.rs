/*!
 * HandleWrap Methods
 *
 * Entry points for `close`, `hasRef`, `ref` and `unref` as seen by managed
 * code. A receiver without a wrapper makes every method return `undefined`.
 */

use crate::runtime::external_refs::{self, ExternalReferenceRegistry};
use crate::runtime::{ConstructorTemplate, MethodCall, Value};

/// `close([callback])`
pub fn close_method(call: &MethodCall<'_>) -> Value {
    let Some(wrap) = call.env.unwrap_handle(call.receiver) else {
        return Value::Undefined;
    };
    let callback = call.args.first().cloned().and_then(Value::into_function);
    wrap.close(callback);
    Value::Undefined
}

/// `hasRef()`
pub fn has_ref_method(call: &MethodCall<'_>) -> Value {
    match call.env.unwrap_handle(call.receiver) {
        Some(wrap) => Value::Bool(wrap.has_ref()),
        None => Value::Undefined,
    }
}

/// `ref()`
pub fn ref_method(call: &MethodCall<'_>) -> Value {
    if let Some(wrap) = call.env.unwrap_handle(call.receiver) {
        wrap.ref_handle();
    }
    Value::Undefined
}

/// `unref()`
pub fn unref_method(call: &MethodCall<'_>) -> Value {
    if let Some(wrap) = call.env.unwrap_handle(call.receiver) {
        wrap.unref_handle();
    }
    Value::Undefined
}

/// Template for the `HandleWrap` class
pub fn constructor_template() -> ConstructorTemplate {
    ConstructorTemplate::new("HandleWrap")
        .inherit("AsyncWrap")
        .set_proto_method("close", close_method)
        .set_proto_method_no_side_effect("hasRef", has_ref_method)
        .set_proto_method("ref", ref_method)
        .set_proto_method("unref", unref_method)
}

pub fn register_external_references(registry: &mut ExternalReferenceRegistry) {
    registry.register("HandleWrap::close", close_method);
    registry.register("HandleWrap::hasRef", has_ref_method);
    registry.register("HandleWrap::ref", ref_method);
    registry.register("HandleWrap::unref", unref_method);
}

/// Register this module's entry points with the process-wide registry
pub fn register_module_references() {
    register_external_references(&mut external_refs::global().lock());
}
