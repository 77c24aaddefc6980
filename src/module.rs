use crate::DynDefinition;

/// A collection of definitions that can be added all at once to a
/// [`ContainerBuilder`](crate::ContainerBuilder). Modules can be used to
/// group together related definitions and configure the container in pieces
/// rather than all at once.
///
/// Definitions keep the order they were defined in, which is also the order
/// the builder validates and builds them in.
///
/// For creating a module easily via a domain specific language, see
/// [`define_module!`].
#[derive(Default, Debug)]
pub struct Module {
    pub(crate) definitions: Vec<DynDefinition>,
}

impl Module {
    /// Appends a definition to this module.
    pub fn define<D: Into<DynDefinition>>(&mut self, definition: D) {
        self.definitions.push(definition.into());
    }

    /// Number of definitions in this module.
    #[must_use]
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Whether this module has no definitions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

/// Defines a new module using a domain specific language. Each group may
/// carry attributes such as `#[cfg(...)]`.
///
/// # Example
///
/// ```
/// use service_container::{define_module, Container, Definition, Svc};
///
/// let module = define_module! {
///     definitions = [
///         Definition::constant("host", "localhost".to_owned()),
///         Definition::constant("port", 6379u16),
///     ],
///     lazy = [
///         Definition::new("address").with_build(|container: &Container| {
///             let host: Svc<String> = container.get("host");
///             let port: Svc<u16> = container.get("port");
///             format!("{}:{}", host, port)
///         }),
///     ],
/// };
///
/// let mut builder = Container::builder();
/// builder.add_module(module).unwrap();
///
/// let container = builder.build().unwrap();
/// assert!(!container.is_built("address"));
///
/// let address: Svc<String> = container.get("address");
/// assert_eq!("localhost:6379", address.as_str());
/// ```
#[macro_export]
macro_rules! define_module {
    {
        $($(#[$attr:meta])* $key:tt = $value:tt),*
        $(,)?
    } => {
        {
            #[allow(unused_mut)]
            let mut module = <$crate::Module as ::std::default::Default>::default();
            $(
                $(#[$attr])*
                $crate::define_module!(@define module, $key = $value);
            )*
            module
        }
    };
    (
        @define $module:expr,
        definitions = [
            $($definition:expr),*
            $(,)?
        ]
    ) => {
        $($module.define($definition);)*
    };
    (
        @define $module:expr,
        lazy = [
            $($definition:expr),*
            $(,)?
        ]
    ) => {
        $($module.define($crate::DynDefinition::from($definition).with_lazy(true));)*
    };
}

#[cfg(test)]
mod tests {
    use crate::{Container, Definition, Module};

    #[test]
    fn module_keeps_definition_order() {
        let module = define_module! {
            definitions = [
                Definition::constant("a", 1i32),
                Definition::constant("b", 2i32),
            ],
            lazy = [
                Definition::constant("c", 3i32),
            ],
        };
        assert_eq!(3, module.len());

        let mut builder = Container::builder();
        builder.add_module(module).unwrap();
        assert_eq!(&["a", "b", "c"], builder.order());

        let container = builder.build().unwrap();
        assert!(container.is_built("b"));
        assert!(!container.is_built("c"));
    }

    #[test]
    fn empty_module_adds_nothing() {
        let module = Module::default();
        assert!(module.is_empty());

        let mut builder = Container::builder();
        builder.add_module(module).unwrap();
        assert!(builder.order().is_empty());
    }
}
