#![allow(clippy::used_underscore_binding)]

use derive_more::Display;
use std::{
    any::{Any, TypeId},
    error::Error,
    sync::Arc,
};

#[cfg(feature = "arc")]
mod types {
    use std::{any::Any, sync::Arc};

    /// A reference-counted pointer holding a built service. The pointer type
    /// is determined by the feature flags passed to this crate.
    pub type Svc<T> = Arc<T>;

    /// A reference-counted service pointer holding an instance of `dyn Any`.
    pub type DynSvc = Arc<dyn Any + Send + Sync>;

    /// Implemented automatically on types that are capable of being a service.
    pub trait Service: Any + Send + Sync {}
    impl<T: Any + Send + Sync> Service for T {}
}

#[cfg(feature = "rc")]
mod types {
    use std::{any::Any, rc::Rc};

    /// A reference-counted pointer holding a built service. The pointer type
    /// is determined by the feature flags passed to this crate.
    pub type Svc<T> = Rc<T>;

    /// A reference-counted service pointer holding an instance of `dyn Any`.
    pub type DynSvc = Rc<dyn Any>;

    /// Implemented automatically on types that are capable of being a service.
    pub trait Service: Any {}
    impl<T: Any> Service for T {}
}

pub use types::*;

/// The error type returned by build, validate and close callbacks.
pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// A result from registering, building or looking up a definition.
pub type ContainerResult<T> = Result<T, ContainerError>;

/// Type information about a stored service.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub struct ServiceInfo {
    id: TypeId,
    name: &'static str,
}

impl ServiceInfo {
    /// Creates a [`ServiceInfo`] for the given type.
    #[inline]
    #[must_use]
    pub fn of<T: ?Sized + Any>() -> Self {
        ServiceInfo {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Gets the [`TypeId`] for this service.
    #[inline]
    #[must_use]
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Gets the type name of this service.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// An error raised while registering, building or looking up a definition.
///
/// Build failures are memoized by the container and handed out again on
/// every later lookup, which is why the error is cheaply cloneable.
#[derive(Clone, Debug, Display)]
#[non_exhaustive]
pub enum ContainerError {
    /// A definition with the same name is already registered.
    #[display(fmt = "definition `{}` already exists", name)]
    DuplicateName {
        /// The name that was registered twice.
        name: String,
    },

    /// The validation callback of a definition rejected it.
    #[display(fmt = "definition `{}` failed validation: {}", name, inner)]
    ValidationFailed {
        /// The definition being registered.
        name: String,
        /// The error returned by the validation callback.
        inner: Arc<dyn Error + Send + Sync + 'static>,
    },

    /// The definition was needed but has no build callback.
    #[display(fmt = "definition `{}`: build function is not defined", name)]
    MissingBuild {
        /// The definition that was requested.
        name: String,
    },

    /// The build callback of a definition returned an error.
    #[display(fmt = "failed to build `{}`: {}", name, inner)]
    BuildFailed {
        /// The definition that failed to build.
        name: String,
        /// The error returned by the build callback.
        inner: Arc<dyn Error + Send + Sync + 'static>,
    },

    /// No definition is registered under the requested name.
    #[display(fmt = "dependency is not registered: {}", name)]
    NotRegistered {
        /// The name that was requested.
        name: String,
    },

    /// An eager definition was requested before the eager build pass
    /// reached it.
    #[display(fmt = "dependency `{}` has not been built yet", name)]
    NotBuilt {
        /// The definition that was requested.
        name: String,
    },

    /// A definition was requested while its own build callback was running.
    #[display(
        fmt = "a cycle was detected while building `{}` [{}]",
        name,
        "fmt_cycle(cycle)"
    )]
    CycleDetected {
        /// The definition that was requested.
        name: String,
        /// The chain of definitions being built when the cycle closed.
        cycle: Vec<String>,
    },

    /// The definition holds a different type than the one requested.
    #[display(
        fmt = "dependency `{}` is not a {} (registered as {})",
        name,
        "expected.name()",
        "found.name()"
    )]
    InvalidType {
        /// The definition that was requested.
        name: String,
        /// The type that was requested.
        expected: ServiceInfo,
        /// The type the definition was registered with.
        found: ServiceInfo,
    },
}

impl ContainerError {
    /// Gets the name of the definition this error is about.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            ContainerError::DuplicateName { name }
            | ContainerError::ValidationFailed { name, .. }
            | ContainerError::MissingBuild { name }
            | ContainerError::BuildFailed { name, .. }
            | ContainerError::NotRegistered { name }
            | ContainerError::NotBuilt { name }
            | ContainerError::CycleDetected { name, .. }
            | ContainerError::InvalidType { name, .. } => name,
        }
    }
}

impl Error for ContainerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ContainerError::ValidationFailed { inner, .. }
            | ContainerError::BuildFailed { inner, .. } => Some(&**inner),
            _ => None,
        }
    }
}

fn fmt_cycle(cycle: &[String]) -> String {
    let mut joined = String::new();
    for item in cycle {
        if !joined.is_empty() {
            joined.push_str(" -> ");
        }
        joined.push_str(item);
    }
    joined
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_is_formatted_in_request_order() {
        let error = ContainerError::CycleDetected {
            name: "a".to_owned(),
            cycle: vec!["a".to_owned(), "b".to_owned(), "a".to_owned()],
        };

        assert_eq!(
            "a cycle was detected while building `a` [a -> b -> a]",
            error.to_string()
        );
    }

    #[test]
    fn build_failure_exposes_callback_error_as_source() {
        let inner: BoxError = "connection refused".into();
        let error = ContainerError::BuildFailed {
            name: "db".to_owned(),
            inner: Arc::from(inner),
        };

        assert_eq!("failed to build `db`: connection refused", error.to_string());
        assert_eq!(
            "connection refused",
            error.source().map(|source| source.to_string()).unwrap()
        );
        assert_eq!("db", error.name());
    }

    #[test]
    fn invalid_type_names_both_types() {
        let error = ContainerError::InvalidType {
            name: "port".to_owned(),
            expected: ServiceInfo::of::<String>(),
            found: ServiceInfo::of::<u16>(),
        };

        let message = error.to_string();
        assert!(message.contains("alloc::string::String"));
        assert!(message.contains("u16"));
    }
}
