use tracing::info;

use kpc_core::ServiceError;
use kpc_sql::Value;

use crate::access::{authorize, Action, Principal};
use crate::model::CertificateConfig;
use super::{decode_row, storage_err, to_json, KpcService};

impl KpcService {
    /// Current settings; defaults until an update is saved.
    pub fn load_config(&self) -> Result<CertificateConfig, ServiceError> {
        let rows = self.sql
            .query("SELECT data FROM certificate_config WHERE id = 1", &[])
            .map_err(storage_err)?;
        match rows.first() {
            Some(row) => decode_row(row, "data"),
            None => Ok(CertificateConfig::default()),
        }
    }

    pub fn get_config(&self, principal: &Principal) -> Result<CertificateConfig, ServiceError> {
        authorize(principal, Action::ViewConfig)?;
        self.load_config()
    }

    pub fn update_config(
        &self,
        principal: &Principal,
        config: CertificateConfig,
    ) -> Result<CertificateConfig, ServiceError> {
        authorize(principal, Action::UpdateConfig)?;
        config.validate()?;
        self.sql
            .exec(
                "INSERT INTO certificate_config (id, data) VALUES (1, ?1)
                 ON CONFLICT(id) DO UPDATE SET data = excluded.data",
                &[Value::Text(to_json(&config)?)],
            )
            .map_err(storage_err)?;
        info!(price = %config.price, days_to_expiry = config.days_to_expiry, "certificate config updated");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{contact_principal, memory_service, root_principal};
    use rust_decimal::Decimal;

    #[test]
    fn defaults_until_saved() {
        let svc = memory_service();
        let cfg = svc.get_config(&contact_principal(&[])).unwrap();
        assert_eq!(cfg, CertificateConfig::default());
    }

    #[test]
    fn update_replaces_singleton() {
        let svc = memory_service();
        let root = root_principal();
        let mut cfg = CertificateConfig::default();
        cfg.price = Decimal::new(2500, 2);
        svc.update_config(&root, cfg.clone()).unwrap();
        cfg.days_to_expiry = 30;
        svc.update_config(&root, cfg.clone()).unwrap();
        assert_eq!(svc.load_config().unwrap(), cfg);
    }

    #[test]
    fn only_superuser_updates() {
        let svc = memory_service();
        let err = svc
            .update_config(&contact_principal(&[]), CertificateConfig::default())
            .unwrap_err();
        assert_eq!(err.error_code(), "PERMISSION_DENIED");
    }
}
