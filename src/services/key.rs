use crate::{Container, ContainerResult, Definition, Service, Svc};
use std::{
    fmt::{Debug, Formatter},
    marker::PhantomData,
};

/// A typed handle to a named definition. Keys are usually declared as
/// constants next to the definitions they describe, so every lookup through
/// them is checked against the type the definition was registered with.
///
/// ## Example
///
/// ```
/// use service_container::{Container, Key};
///
/// const GREETING: Key<String> = Key::new("greeting");
///
/// let mut builder = Container::builder();
/// builder
///     .add(GREETING.define().with_build(|_: &Container| "hello".to_owned()))
///     .unwrap();
///
/// let container = builder.build().unwrap();
/// assert_eq!("hello", GREETING.get(&container).as_str());
/// ```
pub struct Key<T> {
    name: &'static str,
    marker: PhantomData<fn() -> T>,
}

impl<T> Key<T> {
    /// Creates a key for the definition with the given name.
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Key {
            name,
            marker: PhantomData,
        }
    }

    /// Gets the name of the definition this key refers to.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<T: Service> Key<T> {
    /// Starts a new [`Definition`] under this key's name.
    #[must_use]
    pub fn define(&self) -> Definition<T> {
        Definition::new(self.name)
    }

    /// See [`Container::safe_get`].
    pub fn safe_get(&self, container: &Container) -> ContainerResult<Svc<T>> {
        container.safe_get(self.name)
    }

    /// See [`Container::get`].
    ///
    /// ## Panics
    ///
    /// Panics if the definition is missing, failed to build, or holds a
    /// different type.
    #[must_use]
    pub fn get(&self, container: &Container) -> Svc<T> {
        container.get(self.name)
    }
}

impl<T> Clone for Key<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Key<T> {}

impl<T> Debug for Key<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Key").field(&self.name).finish()
    }
}
