//! A dependency lifecycle container.
//!
//! Dependencies are declared as named [`Definition`]s, each carrying the
//! callbacks that validate, build and close one object. Definitions are
//! registered with a [`ContainerBuilder`], which turns them into a
//! [`Container`]:
//!
//! - Eager definitions (the default) are built by
//!   [`ContainerBuilder::build`], in the order they were registered. A build
//!   callback may request any eager definition registered before it.
//! - Lazy definitions are built the first time they are requested.
//!
//! Either way, a build callback runs at most once for the lifetime of the
//! container. Its result, or its error, is handed out to every later request.
//! When the application shuts down, [`Container::close`] runs the close
//! callbacks of everything that was built, newest first.
//!
//! By default, built objects are held in `Rc<T>` pointers and are not
//! thread-safe. This can be changed by disabling default features and
//! enabling the "arc" feature:
//!
//! ```text
//! service_container = {
//!     version = "*",
//!     default_features = false,
//!     features = ["arc"]
//! }
//! ```
//!
//! The container itself is always single-threaded: it is assembled on one
//! initialization path and passed explicitly to whatever needs it.
//!
//! # Example
//!
//! ```
//! use service_container::{BoxError, Container, Definition, Key, Svc};
//!
//! struct Database {
//!     url: String,
//! }
//!
//! struct UserRepository {
//!     db: Svc<Database>,
//! }
//!
//! const DATABASE_URL: Key<String> = Key::new("database_url");
//! const DATABASE: Key<Database> = Key::new("database");
//! const USERS: Key<UserRepository> = Key::new("users");
//!
//! let mut builder = Container::builder();
//! builder
//!     .add(Definition::constant(
//!         DATABASE_URL.name(),
//!         "mongodb://localhost".to_owned(),
//!     ))
//!     .unwrap();
//! builder
//!     .add(
//!         DATABASE
//!             .define()
//!             .requires(DATABASE_URL.name())
//!             .with_fallible_build(|container: &Container| {
//!                 let url = DATABASE_URL.safe_get(container)?;
//!                 Ok::<_, BoxError>(Database {
//!                     url: url.as_str().to_owned(),
//!                 })
//!             })
//!             .with_close(|_db: &Database| {
//!                 // Disconnect here
//!                 Ok::<_, BoxError>(())
//!             }),
//!     )
//!     .unwrap();
//! builder
//!     .add(
//!         USERS
//!             .define()
//!             .with_build(|container: &Container| UserRepository {
//!                 db: DATABASE.get(container),
//!             })
//!             .lazy(),
//!     )
//!     .unwrap();
//!
//! let container = builder.build().unwrap();
//! assert!(!container.is_built(USERS.name()));
//!
//! let users = USERS.get(&container);
//! assert_eq!("mongodb://localhost", users.db.url);
//!
//! container.close();
//! ```

#![forbid(unsafe_code)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::needless_pass_by_value
)]

#[cfg(not(any(feature = "arc", feature = "rc")))]
compile_error!(
    "Either the 'arc' or 'rc' feature must be enabled (but not both)."
);

#[cfg(all(feature = "arc", feature = "rc"))]
compile_error!(
    "The 'arc' and 'rc' features are mutually exclusive and cannot be enabled together."
);

pub mod app;
mod builder;
mod container;
mod module;
mod services;

pub use builder::*;
pub use container::*;
pub use module::*;
pub use services::*;
