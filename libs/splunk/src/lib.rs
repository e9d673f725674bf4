//! Splunk views transport.
//!
//! [`ViewsClient`] implements [`RemoteResource`](dashsync_reconcile::RemoteResource)
//! against the `data/ui/views` collection of the Splunk management API:
//!
//! | Capability   | Request                                        |
//! |--------------|------------------------------------------------|
//! | `read`       | `GET {base}/{name}`                            |
//! | `create`     | `POST {base}` with `name`, `eai:data`          |
//! | `update`     | `POST {base}/{name}` with `eai:data`           |
//! | `set_policy` | `POST {base}/{name}/acl` with sharing, owner, perms |
//! | `refresh`    | `GET {base}/_reload`                           |
//!
//! [`DashboardDefinition`] renders the `eai:data` payload for Simple XML and
//! Dashboard Studio dashboards.

mod client;
mod definition;

pub use client::{Auth, ClientError, ViewsClient, ViewsClientConfig, DEFAULT_TIMEOUT};
pub use definition::{DashboardDefinition, DefinitionError, Theme};
