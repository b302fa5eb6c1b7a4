/*!
 * Constructor Templates
 * Prototype method tables exposed to managed code
 */

use crate::core::errors::HandleError;
use crate::core::types::{HandleResult, ObjectId};
use crate::env::Environment;
use crate::runtime::value::Value;
use std::fmt;

/// Arguments of a prototype method call
pub struct MethodCall<'a> {
    pub env: &'a Environment,
    pub receiver: ObjectId,
    pub args: &'a [Value],
}

/// Native entry point of a prototype method
pub type MethodFn = fn(&MethodCall<'_>) -> Value;

/// One prototype method
#[derive(Clone, Copy)]
pub struct MethodEntry {
    pub name: &'static str,
    pub func: MethodFn,
    /// Safe to call from side-effect-free evaluation (inspectors, previews)
    pub side_effect_free: bool,
}

impl fmt::Debug for MethodEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodEntry")
            .field("name", &self.name)
            .field("side_effect_free", &self.side_effect_free)
            .finish()
    }
}

/// Class template with its prototype methods
#[derive(Debug, Clone)]
pub struct ConstructorTemplate {
    class_name: &'static str,
    parent: Option<&'static str>,
    methods: Vec<MethodEntry>,
}

impl ConstructorTemplate {
    pub fn new(class_name: &'static str) -> Self {
        Self {
            class_name,
            parent: None,
            methods: Vec::new(),
        }
    }

    #[must_use]
    pub fn inherit(mut self, parent: &'static str) -> Self {
        self.parent = Some(parent);
        self
    }

    #[must_use]
    pub fn set_proto_method(mut self, name: &'static str, func: MethodFn) -> Self {
        self.methods.push(MethodEntry {
            name,
            func,
            side_effect_free: false,
        });
        self
    }

    #[must_use]
    pub fn set_proto_method_no_side_effect(mut self, name: &'static str, func: MethodFn) -> Self {
        self.methods.push(MethodEntry {
            name,
            func,
            side_effect_free: true,
        });
        self
    }

    pub fn class_name(&self) -> &'static str {
        self.class_name
    }

    pub fn parent(&self) -> Option<&'static str> {
        self.parent
    }

    pub fn methods(&self) -> &[MethodEntry] {
        &self.methods
    }

    pub fn method(&self, name: &str) -> Option<&MethodEntry> {
        self.methods.iter().find(|m| m.name == name)
    }

    /// Dispatch a method call by name
    pub fn invoke(
        &self,
        env: &Environment,
        receiver: ObjectId,
        name: &str,
        args: &[Value],
    ) -> HandleResult<Value> {
        let entry = self
            .method(name)
            .ok_or_else(|| HandleError::UnknownMethod(name.to_string()))?;

        let call = MethodCall {
            env,
            receiver,
            args,
        };
        Ok((entry.func)(&call))
    }
}
