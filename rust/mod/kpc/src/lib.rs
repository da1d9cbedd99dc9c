//! Kimberley Process certificate registry.
//!
//! Tracks export certificates for rough diamonds from bulk registration
//! through shipment and delivery, along with the licensees that buy them,
//! their contacts, and the receipts issued for each sale.

pub mod access;
pub mod api;
pub mod datatable;
pub mod generator;
pub mod lifecycle;
pub mod model;
pub mod password;
pub mod receipt;
pub mod registration;
pub mod search;
pub mod service;
pub mod validate;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use axum::Router;
use kpc_core::Module;

use crate::service::KpcService;

/// Registry module: owns the service and exposes its HTTP routes.
pub struct KpcModule {
    service: Arc<KpcService>,
}

impl KpcModule {
    pub fn new(service: KpcService) -> Self {
        Self {
            service: Arc::new(service),
        }
    }

    /// Shared service handle, used by the binary for contact login.
    pub fn service(&self) -> Arc<KpcService> {
        Arc::clone(&self.service)
    }
}

impl Module for KpcModule {
    fn name(&self) -> &str {
        "kpc"
    }

    fn routes(&self) -> Router {
        api::router(self.service())
    }
}
