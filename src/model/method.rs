// src/model/method.rs
//! Method descriptions as seen by matchers

use serde::{Deserialize, Serialize};

/// Access level of a method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    Protected,
    PackagePrivate,
    Private,
}

/// Kind of method body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MethodKind {
    /// Ordinary method
    Method,

    /// Instance constructor
    Constructor,

    /// Static initializer
    TypeInitializer,
}

/// Everything a matcher needs to know about one method
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodDescription {
    /// Simple method name
    pub name: String,

    /// Parameter/return descriptor, e.g. `(I)Ljava/lang/String;`
    pub descriptor: String,

    /// Binary name of the declaring type
    pub declaring_type: String,

    pub visibility: Visibility,

    pub kind: MethodKind,

    #[serde(default)]
    pub is_static: bool,

    #[serde(default)]
    pub is_final: bool,

    #[serde(default)]
    pub is_abstract: bool,

    #[serde(default)]
    pub is_native: bool,
}

impl MethodDescription {
    /// Public, non-static, non-final method returning `void` with no arguments
    pub fn new(declaring_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            descriptor: "()V".to_string(),
            declaring_type: declaring_type.into(),
            visibility: Visibility::Public,
            kind: MethodKind::Method,
            is_static: false,
            is_final: false,
            is_abstract: false,
            is_native: false,
        }
    }

    pub fn constructor(declaring_type: impl Into<String>) -> Self {
        Self {
            kind: MethodKind::Constructor,
            ..Self::new(declaring_type, "<init>")
        }
    }

    pub fn type_initializer(declaring_type: impl Into<String>) -> Self {
        Self {
            kind: MethodKind::TypeInitializer,
            is_static: true,
            visibility: Visibility::PackagePrivate,
            ..Self::new(declaring_type, "<clinit>")
        }
    }

    pub fn with_descriptor(mut self, descriptor: impl Into<String>) -> Self {
        self.descriptor = descriptor.into();
        self
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn with_static(mut self) -> Self {
        self.is_static = true;
        self
    }

    pub fn with_final(mut self) -> Self {
        self.is_final = true;
        self
    }

    pub fn with_abstract(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    pub fn with_native(mut self) -> Self {
        self.is_native = true;
        self
    }

    pub fn is_constructor(&self) -> bool {
        self.kind == MethodKind::Constructor
    }

    pub fn is_type_initializer(&self) -> bool {
        self.kind == MethodKind::TypeInitializer
    }

    /// Dispatched through the receiver's type: an instance method that is
    /// neither private nor a constructor. Final methods still count.
    pub fn is_virtual(&self) -> bool {
        self.kind == MethodKind::Method
            && !self.is_static
            && self.visibility != Visibility::Private
    }

    pub fn is_package_private(&self) -> bool {
        self.visibility == Visibility::PackagePrivate
    }

    /// Abstract and native methods have no body to attach advice to
    pub fn has_body(&self) -> bool {
        !self.is_abstract && !self.is_native
    }

}
