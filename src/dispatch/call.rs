// src/dispatch/call.rs
//! Vocabulary of an intercepted call

use crate::model::{ClassIdentity, MethodDescription};
use crate::utils::errors::Failure;
use std::fmt;

/// Identity of a live object in the host runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u64);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "obj#{}", self.0)
    }
}

/// Argument or return value crossing an intercepted call
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Void,
    Null,
    Bool(bool),
    Int(i64),
    Str(String),
}

impl Value {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

/// Outcome of a call: a value, or a failure raised to the caller
pub type CallResult = std::result::Result<Value, Failure>;

/// One intercepted call as seen by advice
#[derive(Debug, Clone, Copy)]
pub struct Invocation<'a> {
    /// Class whose method is executing
    pub class: &'a ClassIdentity,

    /// The method being called
    pub method: &'a MethodDescription,

    /// Receiver for instance methods, `None` for static methods
    pub receiver: Option<ObjectId>,

    /// Actual arguments
    pub args: &'a [Value],
}

impl<'a> Invocation<'a> {
    pub fn is_static(&self) -> bool {
        self.receiver.is_none()
    }
}
