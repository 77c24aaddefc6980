//! Composition of a service application around a [`Container`].

mod config;
mod logging;

pub use config::*;
pub use logging::*;

use crate::{
    BoxError, Container, ContainerBuilder, ContainerError, ContainerResult,
    Definition, Key,
};
use derive_more::Display;
use log::{debug, info};
use std::{error::Error, path::PathBuf};

/// The loaded [`AppConfig`].
pub const CONFIG: Key<AppConfig> = Key::new("pa_config");

/// The `.env` file read by the default container.
pub const DEFAULT_ENV_FILE: &str = "./.env";

/// Defines the [`AppConfig`] dependency.
///
/// The configuration is read from `env_file` if it is given and exists, and
/// from the process environment otherwise. Building it also applies its log
/// level to the `log` facade.
#[must_use]
pub fn config_definition(env_file: Option<PathBuf>) -> Definition<AppConfig> {
    CONFIG.define().with_fallible_build(move |_: &Container| {
        let config = match env_file.filter(|path| path.is_file()) {
            Some(path) => {
                debug!("reading config from {}", path.display());
                AppConfig::from_env_file(path)?
            }
            None => AppConfig::from_env(),
        };

        config.apply_to_globals();
        Ok::<_, ConfigError>(config)
    })
}

/// Creates a builder holding the default dependencies of an application.
pub fn default_builder(
    env_file: Option<PathBuf>,
) -> ContainerResult<ContainerBuilder> {
    let mut builder = Container::builder();
    builder.add(config_definition(env_file))?;
    Ok(builder)
}

/// Builds a container holding the default dependencies of an application.
pub fn build_default_container(
    env_file: Option<PathBuf>,
) -> ContainerResult<Container> {
    default_builder(env_file)?.build()
}

/// A hook that prepares the container before the application runs.
pub type PrepareContainerFn =
    Box<dyn FnOnce(&Container) -> Result<(), BoxError>>;

/// A service application. The application owns its container and closes it
/// once the application stops running.
///
/// ## Example
///
/// ```
/// use service_container::{app::App, Container, Definition, Svc};
///
/// let mut builder = Container::builder();
/// builder.add(Definition::constant("port", 8080u16)).unwrap();
///
/// let mut app = App::new(builder.build().unwrap());
/// app.run(|container: &Container| {
///     let port: Svc<u16> = container.safe_get("port")?;
///     assert_eq!(8080, *port);
///     Ok::<_, service_container::ContainerError>(())
/// })
/// .unwrap();
/// ```
pub struct App {
    container: Container,
    prepare_container: Option<PrepareContainerFn>,
    initialized: bool,
}

impl App {
    /// Creates an application around an already built container.
    #[must_use]
    pub fn new(container: Container) -> Self {
        App {
            container,
            prepare_container: None,
            initialized: false,
        }
    }

    /// Creates an application around the default container. See
    /// [`build_default_container`].
    pub fn with_default_container(
        env_file: Option<PathBuf>,
    ) -> Result<Self, AppError> {
        Ok(App::new(build_default_container(env_file)?))
    }

    /// Gets the application's container.
    #[must_use]
    pub fn container(&self) -> &Container {
        &self.container
    }

    /// Sets the hook run by [`init`](App::init). Replaces any earlier hook.
    pub fn set_prepare_container_fn<F, E>(&mut self, prepare: F)
    where
        F: 'static + FnOnce(&Container) -> Result<(), E>,
        E: Into<BoxError>,
    {
        self.prepare_container = Some(Box::new(move |container: &Container| {
            prepare(container).map_err(Into::into)
        }));
    }

    /// Initializes the application without running it. Only the first call
    /// has any effect.
    pub fn init(&mut self) -> Result<(), AppError> {
        if self.initialized {
            return Ok(());
        }
        self.initialized = true;

        if let Some(prepare) = self.prepare_container.take() {
            prepare(&self.container).map_err(AppError::Prepare)?;
        }

        Ok(())
    }

    /// Initializes the application and runs `serve` against its container.
    /// The container is closed afterwards, whether or not anything failed.
    pub fn run<F, E>(&mut self, serve: F) -> Result<(), AppError>
    where
        F: FnOnce(&Container) -> Result<(), E>,
        E: Into<BoxError>,
    {
        let result = self.init().and_then(|()| {
            info!("starting application");
            serve(&self.container).map_err(|error| AppError::Serve(error.into()))
        });

        self.close();
        result
    }

    /// Closes the application's container.
    pub fn close(&self) {
        self.container.close();
    }
}

/// An error raised while setting up or running an [`App`].
#[derive(Debug, Display)]
#[non_exhaustive]
pub enum AppError {
    /// The container could not be created.
    #[display(fmt = "failed to create container: {}", _0)]
    Container(ContainerError),

    /// The prepare hook failed.
    #[display(fmt = "failed to prepare container: {}", _0)]
    Prepare(BoxError),

    /// The serve callback failed.
    #[display(fmt = "application stopped with an error: {}", _0)]
    Serve(BoxError),
}

impl Error for AppError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            AppError::Container(inner) => Some(inner),
            AppError::Prepare(inner) | AppError::Serve(inner) => Some(&**inner),
        }
    }
}

impl From<ContainerError> for AppError {
    fn from(error: ContainerError) -> Self {
        AppError::Container(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Svc;
    use std::{cell::RefCell, io::Write, rc::Rc};

    #[test]
    fn default_container_reads_env_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "SERVICE_PORT=8080").unwrap();
        writeln!(file, "LOG_LEVEL=info").unwrap();
        file.flush().unwrap();

        let container =
            build_default_container(Some(file.path().to_path_buf())).unwrap();
        let config: Svc<AppConfig> = CONFIG.get(&container);
        assert_eq!("8080", config.port);
        assert_eq!(log::LevelFilter::Info, config.log_level);
    }

    #[test]
    fn run_prepares_serves_and_closes() {
        let events = Rc::new(RefCell::new(Vec::new()));

        let mut builder = Container::builder();
        let closed = events.clone();
        builder
            .add(Definition::constant("db", 1i32).with_close(
                move |_: &i32| {
                    closed.borrow_mut().push("close");
                    Ok::<_, BoxError>(())
                },
            ))
            .unwrap();

        let mut app = App::new(builder.build().unwrap());
        let prepared = events.clone();
        app.set_prepare_container_fn(move |container: &Container| {
            assert!(container.has("db"));
            prepared.borrow_mut().push("prepare");
            Ok::<_, BoxError>(())
        });

        let served = events.clone();
        app.run(|_: &Container| {
            served.borrow_mut().push("serve");
            Ok::<_, BoxError>(())
        })
        .unwrap();

        assert_eq!(vec!["prepare", "serve", "close"], *events.borrow());
    }

    #[test]
    fn failing_prepare_skips_serve_but_still_closes() {
        let closes = Rc::new(RefCell::new(0));

        let mut builder = Container::builder();
        let counter = closes.clone();
        builder
            .add(Definition::constant("db", 1i32).with_close(
                move |_: &i32| {
                    *counter.borrow_mut() += 1;
                    Ok::<_, BoxError>(())
                },
            ))
            .unwrap();

        let mut app = App::new(builder.build().unwrap());
        app.set_prepare_container_fn(|_: &Container| {
            Err::<(), _>("no router")
        });

        let result = app.run(|_: &Container| -> Result<(), BoxError> {
            unreachable!("serve must not run")
        });

        assert!(matches!(result, Err(AppError::Prepare(_))));
        assert_eq!(1, *closes.borrow());
    }

    #[test]
    fn init_runs_prepare_once() {
        let calls = Rc::new(RefCell::new(0));
        let counter = calls.clone();

        let mut app = App::new(Container::builder().build().unwrap());
        app.set_prepare_container_fn(move |_: &Container| {
            *counter.borrow_mut() += 1;
            Ok::<_, BoxError>(())
        });

        app.init().unwrap();
        app.init().unwrap();
        assert_eq!(1, *calls.borrow());
    }
}
