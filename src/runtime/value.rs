/*!
 * Managed Values
 * Values stored in object slots and the callbacks dispatched through them
 */

use crate::core::errors::CallbackError;
use crate::core::types::{ObjectId, ProviderType, WrapId};
use std::fmt;
use std::rc::Rc;

/// Execution context a callback runs under
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallbackContext {
    pub receiver: ObjectId,
    pub wrap: WrapId,
    pub provider: ProviderType,
}

type CallbackFn = dyn Fn(&CallbackContext) -> Result<(), CallbackError>;

/// User-supplied function stored on a managed object
///
/// Callbacks are reference counted so a slot can hand one out without
/// copying the closure. A callback that captures a strong [`ObjectRef`]
/// to its own receiver keeps that receiver alive; capture a
/// [`WeakObjectRef`] instead.
///
/// [`ObjectRef`]: crate::runtime::ObjectRef
/// [`WeakObjectRef`]: crate::runtime::WeakObjectRef
#[derive(Clone)]
pub struct Callback(Rc<CallbackFn>);

impl Callback {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&CallbackContext) -> Result<(), CallbackError> + 'static,
    {
        Self(Rc::new(f))
    }

    pub fn call(&self, ctx: &CallbackContext) -> Result<(), CallbackError> {
        (self.0)(ctx)
    }

    pub fn ptr_eq(&self, other: &Callback) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Callback(..)")
    }
}

/// A managed runtime value
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Function(Callback),
}

impl Value {
    pub fn is_function(&self) -> bool {
        matches!(self, Value::Function(_))
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn into_function(self) -> Option<Callback> {
        match self {
            Value::Function(cb) => Some(cb),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Callback> for Value {
    fn from(cb: Callback) -> Self {
        Value::Function(cb)
    }
}
