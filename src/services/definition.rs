use crate::{
    BoxError, Container, ContainerError, ContainerResult, DynSvc, Service,
    ServiceInfo, Svc,
};
use std::{
    cell::{Cell, RefCell},
    fmt::{Debug, Formatter},
    sync::Arc,
};

type ValidateFn = Box<dyn FnOnce(&Container) -> Result<(), BoxError>>;
type BuildFn<T> = Box<dyn FnOnce(&Container) -> Result<T, BoxError>>;
type CloseFn<T> = Box<dyn FnOnce(&T) -> Result<(), BoxError>>;

/// A named, typed description of how to validate, build and close one
/// dependency.
///
/// Definitions are eager by default: they are built by
/// [`ContainerBuilder::build`](crate::ContainerBuilder::build) in the order
/// they were added. Lazy definitions are built the first time they are
/// requested from the [`Container`].
///
/// ## Example
///
/// ```
/// use service_container::{Container, Definition, Svc};
///
/// struct Pool {
///     size: usize,
/// }
///
/// let mut builder = Container::builder();
/// builder
///     .add(Definition::constant("pool_size", 4usize))
///     .unwrap();
/// builder
///     .add(
///         Definition::new("pool")
///             .requires("pool_size")
///             .with_build(|container: &Container| Pool {
///                 size: *container.get::<usize>("pool_size"),
///             })
///             .with_close(|_pool: &Pool| Ok::<_, std::io::Error>(()))
///             .lazy(),
///     )
///     .unwrap();
///
/// let container = builder.build().unwrap();
/// let pool: Svc<Pool> = container.get("pool");
/// assert_eq!(4, pool.size);
/// container.close();
/// ```
pub struct Definition<T: Service> {
    name: String,
    lazy: bool,
    validate: Option<ValidateFn>,
    build: Option<BuildFn<T>>,
    close: Option<CloseFn<T>>,
}

impl<T: Service> Definition<T> {
    /// Creates an eager definition with no callbacks. A build callback must
    /// be set before the definition is needed, otherwise building it fails
    /// with [`ContainerError::MissingBuild`].
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Definition {
            name: name.into(),
            lazy: false,
            validate: None,
            build: None,
            close: None,
        }
    }

    /// Creates a definition that builds to a predetermined value.
    #[must_use]
    pub fn constant(name: impl Into<String>, value: T) -> Self {
        Definition::new(name).with_build(move |_: &Container| value)
    }

    /// Sets a build callback that cannot fail.
    #[must_use]
    pub fn with_build<F>(mut self, build: F) -> Self
    where
        F: 'static + FnOnce(&Container) -> T,
    {
        self.build = Some(Box::new(
            move |container: &Container| -> Result<T, BoxError> {
                Ok(build(container))
            },
        ));
        self
    }

    /// Sets a build callback that may fail. The error is recorded against
    /// the definition and the callback is never invoked again.
    #[must_use]
    pub fn with_fallible_build<F, E>(mut self, build: F) -> Self
    where
        F: 'static + FnOnce(&Container) -> Result<T, E>,
        E: Into<BoxError>,
    {
        self.build = Some(Box::new(
            move |container: &Container| -> Result<T, BoxError> {
                build(container).map_err(Into::into)
            },
        ));
        self
    }

    /// Sets the callback run against the in-progress container when the
    /// definition is added to a builder. Replaces any earlier validation,
    /// including one added by [`requires`](Definition::requires).
    #[must_use]
    pub fn with_validate<F, E>(mut self, validate: F) -> Self
    where
        F: 'static + FnOnce(&Container) -> Result<(), E>,
        E: Into<BoxError>,
    {
        self.validate = Some(Box::new(
            move |container: &Container| -> Result<(), BoxError> {
                validate(container).map_err(Into::into)
            },
        ));
        self
    }

    /// Adds a validation step that fails unless `dependency` has already
    /// been registered when this definition is added.
    #[must_use]
    pub fn requires(mut self, dependency: impl Into<String>) -> Self {
        let dependency = dependency.into();
        let previous = self.validate.take();
        self.validate = Some(Box::new(
            move |container: &Container| -> Result<(), BoxError> {
                if let Some(previous) = previous {
                    previous(container)?;
                }

                if container.has(&dependency) {
                    Ok(())
                } else {
                    Err(ContainerError::NotRegistered { name: dependency }
                        .into())
                }
            },
        ));
        self
    }

    /// Sets the callback that releases the built object when the container
    /// is closed. It only runs if the build succeeded.
    #[must_use]
    pub fn with_close<F, E>(mut self, close: F) -> Self
    where
        F: 'static + FnOnce(&T) -> Result<(), E>,
        E: Into<BoxError>,
    {
        self.close = Some(Box::new(
            move |service: &T| -> Result<(), BoxError> {
                close(service).map_err(Into::into)
            },
        ));
        self
    }

    /// Marks the definition as lazy.
    #[must_use]
    pub fn lazy(self) -> Self {
        self.with_lazy(true)
    }

    /// Sets whether the definition is built on first access rather than
    /// during [`ContainerBuilder::build`](crate::ContainerBuilder::build).
    #[must_use]
    pub fn with_lazy(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }

    /// Gets the name of this definition.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this definition is built on first access.
    #[must_use]
    pub fn is_lazy(&self) -> bool {
        self.lazy
    }
}

impl<T: Service> Debug for Definition<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Definition")
            .field("name", &self.name)
            .field("type", &ServiceInfo::of::<T>().name())
            .field("lazy", &self.lazy)
            .finish_non_exhaustive()
    }
}

type DynBuildFn = Box<dyn FnOnce(&Container) -> Result<Built, BoxError>>;
type DynCloseFn = Box<dyn FnOnce() -> Result<(), BoxError>>;

/// A built object and the close callback bound to it.
struct Built {
    service: DynSvc,
    close: Option<DynCloseFn>,
}

pub(crate) enum BuildState {
    Unbuilt,
    Building,
    Built(DynSvc),
    Failed(ContainerError),
}

/// A type-erased [`Definition`] as stored by a container. Every
/// `Definition<T>` converts into one, which allows definitions of different
/// types to be registered together.
///
/// Besides the callbacks, this holds the build result once the definition
/// has been built.
pub struct DynDefinition {
    name: String,
    lazy: bool,
    service_info: ServiceInfo,
    validate: Option<ValidateFn>,
    build: Cell<Option<DynBuildFn>>,
    close: Cell<Option<DynCloseFn>>,
    state: RefCell<BuildState>,
}

impl DynDefinition {
    /// Gets the name of this definition.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this definition is built on first access.
    #[must_use]
    pub fn is_lazy(&self) -> bool {
        self.lazy
    }

    /// Sets whether this definition is built on first access.
    #[must_use]
    pub fn with_lazy(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }

    /// Type information about the object this definition builds.
    #[must_use]
    pub fn service_info(&self) -> ServiceInfo {
        self.service_info
    }

    pub(crate) fn take_validate(&mut self) -> Option<ValidateFn> {
        self.validate.take()
    }

    /// Whether the build callback has been invoked, successfully or not.
    pub(crate) fn is_built(&self) -> bool {
        matches!(
            &*self.state.borrow(),
            BuildState::Built(_) | BuildState::Failed(_)
        )
    }

    pub(crate) fn state_label(&self) -> &'static str {
        match &*self.state.borrow() {
            BuildState::Unbuilt => "unbuilt",
            BuildState::Building => "building",
            BuildState::Built(_) => "built",
            BuildState::Failed(_) => "failed",
        }
    }

    /// Returns the result of an earlier build, or `None` if the build
    /// callback has not been invoked yet.
    pub(crate) fn lookup(
        &self,
        container: &Container,
    ) -> Option<ContainerResult<DynSvc>> {
        match &*self.state.borrow() {
            BuildState::Unbuilt => None,
            BuildState::Building => Some(Err(container.cycle_error(&self.name))),
            BuildState::Built(service) => Some(Ok(service.clone())),
            BuildState::Failed(error) => Some(Err(error.clone())),
        }
    }

    /// Builds the definition if it has not been built yet. The build
    /// callback is invoked at most once; its outcome, success or failure, is
    /// returned by every later call.
    pub(crate) fn build(
        &self,
        container: &Container,
    ) -> ContainerResult<DynSvc> {
        if let Some(result) = self.lookup(container) {
            return result;
        }

        self.state.replace(BuildState::Building);
        let result = match self.build.take() {
            Some(build) => {
                let guard = BuildGuard::enter(self, container);
                let result = build(container);
                drop(guard);
                result.map_err(|inner| ContainerError::BuildFailed {
                    name: self.name.clone(),
                    inner: Arc::from(inner),
                })
            }
            None => Err(ContainerError::MissingBuild {
                name: self.name.clone(),
            }),
        };

        match result {
            Ok(Built { service, close }) => {
                self.close.set(close);
                self.state.replace(BuildState::Built(service.clone()));
                container.record_built(&self.name);
                Ok(service)
            }
            Err(error) => {
                self.state.replace(BuildState::Failed(error.clone()));
                Err(error)
            }
        }
    }

    /// Runs the close callback if the definition was built successfully and
    /// has not been closed yet.
    pub(crate) fn close(&self) -> Option<Result<(), BoxError>> {
        let close = self.close.take()?;
        Some(close())
    }
}

/// Keeps the container's request path in step with a running build callback.
/// If the callback unwinds, the definition is marked as failed so later
/// requests do not see it as still building.
struct BuildGuard<'a> {
    definition: &'a DynDefinition,
    container: &'a Container,
}

impl<'a> BuildGuard<'a> {
    fn enter(definition: &'a DynDefinition, container: &'a Container) -> Self {
        container.enter(&definition.name);
        BuildGuard {
            definition,
            container,
        }
    }
}

impl Drop for BuildGuard<'_> {
    fn drop(&mut self) {
        self.container.leave();
        if std::thread::panicking() {
            let inner: BoxError = "build callback panicked".into();
            let error = ContainerError::BuildFailed {
                name: self.definition.name.clone(),
                inner: Arc::from(inner),
            };

            if let Ok(mut state) = self.definition.state.try_borrow_mut() {
                *state = BuildState::Failed(error);
            }
        }
    }
}

impl<T: Service> From<Definition<T>> for DynDefinition {
    fn from(definition: Definition<T>) -> Self {
        let Definition {
            name,
            lazy,
            validate,
            build,
            close,
        } = definition;

        let build = build.map(|build| -> DynBuildFn {
            Box::new(move |container: &Container| -> Result<Built, BoxError> {
                let service = Svc::new(build(container)?);
                let close = close.map(|close| -> DynCloseFn {
                    let service = service.clone();
                    Box::new(move || close(&*service))
                });

                Ok(Built {
                    service: service as DynSvc,
                    close,
                })
            })
        });

        DynDefinition {
            name,
            lazy,
            service_info: ServiceInfo::of::<T>(),
            validate,
            build: Cell::new(build),
            close: Cell::new(None),
            state: RefCell::new(BuildState::Unbuilt),
        }
    }
}

impl Debug for DynDefinition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynDefinition")
            .field("name", &self.name)
            .field("type", &self.service_info.name())
            .field("lazy", &self.lazy)
            .field("state", &self.state_label())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn definitions_are_eager_by_default() {
        let definition = Definition::constant("answer", 42i32);
        assert!(!definition.is_lazy());
        assert!(definition.lazy().is_lazy());
    }

    #[test]
    fn erased_definition_keeps_name_and_type() {
        let definition: DynDefinition =
            Definition::constant("answer", 42i32).lazy().into();

        assert_eq!("answer", definition.name());
        assert!(definition.is_lazy());
        assert_eq!(ServiceInfo::of::<i32>(), definition.service_info());
        assert!(!definition.is_built());
        assert_eq!("unbuilt", definition.state_label());
    }

    #[test]
    fn close_receives_the_built_value() {
        let seen = std::rc::Rc::new(Cell::new(0));
        let sink = seen.clone();
        let definition: DynDefinition = Definition::constant("answer", 42i32)
            .with_close(move |value: &i32| {
                sink.set(*value);
                Ok::<_, BoxError>(())
            })
            .into();

        let container = Container::default();
        definition.build(&container).unwrap();
        assert!(matches!(definition.close(), Some(Ok(()))));
        assert_eq!(42, seen.get());
        assert!(definition.close().is_none());
    }

    #[test]
    fn close_is_skipped_for_unbuilt_definitions() {
        let definition: DynDefinition = Definition::constant("answer", 1u8)
            .with_close(|_: &u8| Err::<(), _>("should not run"))
            .into();

        assert!(definition.close().is_none());
    }
}
