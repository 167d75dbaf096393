//! Declarative reconciliation of RabbitMQ management-plane objects.
//!
//! A [`reconcile::Reconciler`] per object kind creates, reads, updates and
//! deletes objects through the management API, converting between the
//! loosely typed configuration held in a [`state::StateStore`] and the typed
//! payloads of [`api`].
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use rabbitmq_reconciler::{
//!     client::{Client, HttpTransport},
//!     config::ConnectionOptions,
//!     kind::ObjectKind,
//!     reconcile::reconciler_for,
//!     state::ResourceData,
//! };
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let options = ConnectionOptions::new("http://localhost:15672", "guest", "guest");
//! let client = Client::new(Arc::new(HttpTransport::new(&options)?));
//!
//! let config = serde_yaml::from_str("{name: team-a, description: Team A}")?;
//! let mut data = ResourceData::new(config);
//! reconciler_for(ObjectKind::Vhost).create(&client, &mut data).await?;
//! # Ok(())
//! # }
//! ```

pub mod absence;
pub mod alias;
pub mod api;
pub mod cli;
pub mod client;
pub mod config;
pub mod data_source;
pub mod identity;
pub mod kind;
pub mod logging;
pub mod normalize;
pub mod reconcile;
pub mod state;
pub mod value;

#[cfg(test)]
mod testing;
