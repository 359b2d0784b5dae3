// /////////////////////////////////////////////////////////////////////////////
// Cloudstage
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Service Discriminator
//!
//! This module provides the [`Service`] value object, the tagged
//! discriminator present wherever staged resources are keyed. The staging
//! core supports exactly two resource classes: the parameter store and the
//! secret manager. Everything in the state model, the wire protocol, and
//! the on-disk schema is partitioned by this discriminator.
//!
//! The wire and on-disk names (`param`, `secret`) are part of the persisted
//! schema and must not change.

use serde::{Deserialize, Serialize};

/// The resource class a staged mutation targets.
///
/// `Service` is a value object: immutable, identity-free, and ordered so
/// that serialized state maps are deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Service {
    /// The parameter store (plain configuration values).
    Param,
    /// The secret manager (sensitive values with delete options).
    Secret,
}

impl Service {
    /// All supported services, in schema order.
    pub const ALL: [Service; 2] = [Service::Param, Service::Secret];

    /// Stable schema name, used as the map key in persisted state and on
    /// the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Service::Param => "param",
            Service::Secret => "secret",
        }
    }

    /// Parses a schema name back into a service.
    pub fn parse(raw: &str) -> Option<Service> {
        match raw {
            "param" => Some(Service::Param),
            "secret" => Some(Service::Secret),
            _ => None,
        }
    }

    /// Human-readable label of the backing service.
    pub fn label(&self) -> &'static str {
        match self {
            Service::Param => "parameter store",
            Service::Secret => "secret manager",
        }
    }

    /// What one item of this service is called in user-facing messages.
    pub fn item_label(&self) -> &'static str {
        match self {
            Service::Param => "parameter",
            Service::Secret => "secret",
        }
    }
}

impl std::fmt::Display for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
