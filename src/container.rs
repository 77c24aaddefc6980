use crate::{
    ContainerBuilder, ContainerError, ContainerResult, DynDefinition, DynSvc,
    Service, ServiceInfo, Svc,
};
use log::{debug, error};
use std::{
    cell::RefCell,
    collections::HashMap,
    fmt::{Debug, Formatter},
};

/// A store of named definitions and the objects built from them.
///
/// Containers are created by a [`ContainerBuilder`], which builds every
/// eager definition up front. Lazy definitions are built on their first
/// request. Built objects are handed out as [`Svc<T>`] pointers and stay
/// alive in the container until it is dropped.
///
/// The container is meant to be assembled on a single initialization path
/// and then passed explicitly to whatever needs it. It is not `Sync`, and
/// lazy builds are not guarded against concurrent use.
///
/// ## Example
///
/// ```
/// use service_container::{Container, Definition, Svc};
///
/// let mut builder = Container::builder();
/// builder.add(Definition::constant("a", "a".to_owned())).unwrap();
/// builder
///     .add(
///         Definition::new("b")
///             .with_build(|container: &Container| {
///                 if container.has("a") {
///                     "b-after-a".to_owned()
///                 } else {
///                     "b-alone".to_owned()
///                 }
///             })
///             .lazy(),
///     )
///     .unwrap();
///
/// let container = builder.build().unwrap();
/// let b: Svc<String> = container.safe_get("b").unwrap();
/// assert_eq!("b-after-a", b.as_str());
/// ```
#[derive(Default)]
pub struct Container {
    definitions: HashMap<String, DynDefinition>,
    resolving: RefCell<Vec<String>>,
    built: RefCell<Vec<String>>,
}

impl Container {
    /// Creates a builder for a container. This is the preferred way of
    /// creating a container.
    #[must_use]
    pub fn builder() -> ContainerBuilder {
        ContainerBuilder::default()
    }

    /// Whether a definition with the given name is registered, regardless
    /// of whether it has been built.
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    /// Whether the build callback of the named definition has been invoked,
    /// successfully or not.
    #[must_use]
    pub fn is_built(&self, name: &str) -> bool {
        self.definitions
            .get(name)
            .map_or(false, DynDefinition::is_built)
    }

    /// Number of registered definitions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Whether no definitions are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Names of all registered definitions, in no particular order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.definitions.keys().map(String::as_str)
    }

    /// Gets the object built for a definition as a `dyn Any` pointer.
    ///
    /// Lazy definitions are built by their first request. If the build
    /// failed, the same error is returned for every request without
    /// invoking the build callback again. Eager definitions requested
    /// before [`ContainerBuilder::build`] reached them fail with
    /// [`ContainerError::NotBuilt`].
    pub fn safe_get_dyn(&self, name: &str) -> ContainerResult<DynSvc> {
        let definition = self.definitions.get(name).ok_or_else(|| {
            ContainerError::NotRegistered {
                name: name.to_owned(),
            }
        })?;

        if definition.is_lazy() {
            definition.build(self)
        } else {
            definition.lookup(self).unwrap_or_else(|| {
                Err(ContainerError::NotBuilt {
                    name: name.to_owned(),
                })
            })
        }
    }

    /// Gets the object built for a definition. See
    /// [`safe_get_dyn`](Container::safe_get_dyn) for when definitions are
    /// built. Fails with [`ContainerError::InvalidType`] if the definition
    /// was registered with a type other than `T`.
    pub fn safe_get<T: Service>(&self, name: &str) -> ContainerResult<Svc<T>> {
        let found = match self.definitions.get(name) {
            Some(definition) => definition.service_info(),
            None => ServiceInfo::of::<T>(),
        };

        self.safe_get_dyn(name)?.downcast::<T>().map_err(|_| {
            ContainerError::InvalidType {
                name: name.to_owned(),
                expected: ServiceInfo::of::<T>(),
                found,
            }
        })
    }

    /// Gets the object built for a definition, treating any failure as a
    /// broken precondition. Use [`safe_get`](Container::safe_get) where a
    /// missing or failed dependency is a recoverable condition.
    ///
    /// ## Panics
    ///
    /// Panics if the definition is not registered, failed to build, or holds
    /// a different type than `T`.
    #[must_use]
    pub fn get<T: Service>(&self, name: &str) -> Svc<T> {
        match self.safe_get(name) {
            Ok(service) => service,
            Err(error) => panic!("{}", error),
        }
    }

    /// Untyped counterpart of [`get`](Container::get).
    ///
    /// ## Panics
    ///
    /// Panics if the definition is not registered or failed to build.
    #[must_use]
    pub fn get_dyn(&self, name: &str) -> DynSvc {
        match self.safe_get_dyn(name) {
            Ok(service) => service,
            Err(error) => panic!("{}", error),
        }
    }

    /// Releases every successfully built object that has a close callback.
    ///
    /// Objects are closed in the reverse of the order their builds
    /// completed, so an object is closed before the objects it was built
    /// from. A failing close callback is logged and does not stop the
    /// remaining ones. Each close callback runs at most once, so closing a
    /// container twice only closes objects built in between.
    pub fn close(&self) {
        let built = self.built.take();
        for name in built.iter().rev() {
            let definition = match self.definitions.get(name) {
                Some(definition) => definition,
                None => continue,
            };

            match definition.close() {
                Some(Ok(())) => debug!("closed dependency `{}`", name),
                Some(Err(error)) => {
                    error!("failed to close dependency `{}`: {}", name, error);
                }
                None => {}
            }
        }
    }

    pub(crate) fn definition(&self, name: &str) -> Option<&DynDefinition> {
        self.definitions.get(name)
    }

    pub(crate) fn insert(&mut self, definition: DynDefinition) {
        self.definitions
            .insert(definition.name().to_owned(), definition);
    }

    pub(crate) fn enter(&self, name: &str) {
        self.resolving.borrow_mut().push(name.to_owned());
    }

    pub(crate) fn leave(&self) {
        drop(self.resolving.borrow_mut().pop());
    }

    pub(crate) fn record_built(&self, name: &str) {
        debug!("built dependency `{}`", name);
        self.built.borrow_mut().push(name.to_owned());
    }

    /// Creates the error for a request of `name` while it is being built.
    /// The cycle starts at the outermost build of `name` and ends with the
    /// repeated request.
    pub(crate) fn cycle_error(&self, name: &str) -> ContainerError {
        let resolving = self.resolving.borrow();
        let start = resolving
            .iter()
            .position(|item| item == name)
            .unwrap_or(0);
        let mut cycle: Vec<String> = resolving[start..].to_vec();
        cycle.push(name.to_owned());

        ContainerError::CycleDetected {
            name: name.to_owned(),
            cycle,
        }
    }
}

impl Debug for Container {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.definitions.iter().map(|(name, definition)| {
                (name, definition.state_label())
            }))
            .finish()
    }
}
