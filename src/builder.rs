use crate::{Container, ContainerError, ContainerResult, DynDefinition, Module};
use log::debug;
use std::sync::Arc;

/// A builder for a [`Container`].
///
/// Definitions are validated as they are added and remembered in the order
/// they were added. [`build`](ContainerBuilder::build) then constructs the
/// eager definitions in that order, so a build callback can rely on every
/// eager definition added before it.
#[derive(Default)]
pub struct ContainerBuilder {
    container: Container,
    order: Vec<String>,
}

impl ContainerBuilder {
    /// Registers a definition.
    ///
    /// Fails with [`ContainerError::DuplicateName`] if a definition with the
    /// same name is already registered, or with
    /// [`ContainerError::ValidationFailed`] if the definition's validation
    /// callback rejects it. A rejected definition is not stored.
    pub fn add<D: Into<DynDefinition>>(
        &mut self,
        definition: D,
    ) -> ContainerResult<()> {
        let mut definition: DynDefinition = definition.into();
        let name = definition.name().to_owned();
        if self.container.has(&name) {
            return Err(ContainerError::DuplicateName { name });
        }

        if let Some(validate) = definition.take_validate() {
            validate(&self.container).map_err(|inner| {
                ContainerError::ValidationFailed {
                    name: name.clone(),
                    inner: Arc::from(inner),
                }
            })?;
        }

        self.container.insert(definition);
        self.order.push(name);
        Ok(())
    }

    /// Registers several definitions in order. The first rejected
    /// definition stops the call; definitions registered before it stay
    /// registered.
    pub fn add_all<I>(&mut self, definitions: I) -> ContainerResult<()>
    where
        I: IntoIterator,
        I::Item: Into<DynDefinition>,
    {
        for definition in definitions {
            self.add(definition)?;
        }

        Ok(())
    }

    /// Registers all the definitions of a module, in the order they were
    /// defined. Behaves like [`add_all`](ContainerBuilder::add_all).
    pub fn add_module(&mut self, module: Module) -> ContainerResult<()> {
        self.add_all(module.definitions)
    }

    /// Whether a definition with the given name has been registered.
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.container.has(name)
    }

    /// Names of the registered definitions, in registration order.
    #[must_use]
    pub fn order(&self) -> &[String] {
        &self.order
    }

    /// Builds every eager definition in registration order and returns the
    /// finished container.
    ///
    /// The first failing build aborts the whole build and its error is
    /// returned; definitions after it are not built. Objects built before
    /// the failure are dropped with the container without running their
    /// close callbacks.
    pub fn build(self) -> ContainerResult<Container> {
        let ContainerBuilder { container, order } = self;
        for name in &order {
            let definition = container.definition(name).ok_or_else(|| {
                ContainerError::NotRegistered { name: name.clone() }
            })?;

            if !definition.is_lazy() {
                definition.build(&container)?;
            }
        }

        debug!("built container with {} definitions", order.len());
        Ok(container)
    }
}
