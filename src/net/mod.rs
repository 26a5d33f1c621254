//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! ListenerEngine (first servant)
//!     → ContainerFactory::create(host, port)
//!     → ServerContainer::start(ListenerSpec)
//!         listener.rs: TcpSocket bind → axum-server (tls.rs for https)
//!         memory.rs:   in-process, no socket
//!     → ServerContainer::install_dispatcher(Dispatcher)
//!     → Hand every request to the HTTP layer
//! ```
//!
//! # Design Decisions
//! - The container is a capability so engines can run without sockets
//! - TLS is optional and handled by the container transparently

pub mod container;
pub mod listener;
pub mod memory;
pub mod tls;

pub use container::{ContainerError, ContainerFactory, ListenerOptions, ListenerSpec, ServerContainer};
pub use listener::{AxumContainer, AxumContainerFactory, ContainerSettings};
pub use memory::{MemoryContainerFactory, MemoryListener};
pub use tls::load_rustls_config;
