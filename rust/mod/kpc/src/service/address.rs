use tracing::info;

use kpc_core::{FormErrors, ListParams, ListResult, ServiceError, new_id, now};
use kpc_sql::Value;

use crate::access::{authorize, Action, Principal, Scope};
use crate::model::KpcAddress;
use super::{decode_row, placeholders, storage_err, KpcService};

fn address_indexes(addr: &KpcAddress) -> Vec<(&'static str, Value)> {
    vec![
        ("licensee_id", Value::Text(addr.licensee.clone())),
        ("name", Value::Text(addr.name.clone())),
        ("update_at", Value::opt_text(addr.updated_at.map(|t| t.to_rfc3339()))),
    ]
}

fn out_of_scope(principal: &Principal, licensee: &str) -> ServiceError {
    ServiceError::PermissionDenied(format!(
        "licensee {} is not visible to {}",
        licensee, principal.user_id
    ))
}

impl KpcService {
    pub fn create_address(
        &self,
        principal: &Principal,
        mut address: KpcAddress,
    ) -> Result<KpcAddress, ServiceError> {
        let scope = authorize(principal, Action::ManageAddresses)?;
        self.check_address(principal, &scope, &address)?;

        let ts = now();
        address.id = new_id();
        address.created_at = Some(ts);
        address.updated_at = Some(ts);

        let mut indexes = address_indexes(&address);
        indexes.push(("create_at", Value::Text(ts.to_rfc3339())));
        self.insert_record("addresses", &address.id, &address, &indexes)
            .map_err(|e| duplicate_name(e, &address))?;
        info!(id = %address.id, licensee = %address.licensee, "address created");
        Ok(address)
    }

    pub fn get_address(&self, principal: &Principal, id: &str) -> Result<KpcAddress, ServiceError> {
        let scope = authorize(principal, Action::ViewLicensees)?;
        let address: KpcAddress = self.get_record("addresses", id)?;
        if !scope.allows(Some(&address.licensee)) {
            return Err(out_of_scope(principal, &address.licensee));
        }
        Ok(address)
    }

    /// Addresses ordered by licensee then name, optionally for one licensee.
    /// Contacts see their own licensees' address books only.
    pub fn list_addresses(
        &self,
        principal: &Principal,
        licensee: Option<&str>,
        params: &ListParams,
    ) -> Result<ListResult<KpcAddress>, ServiceError> {
        let scope = authorize(principal, Action::ViewLicensees)?;
        let limit = params.effective_limit();
        let order = "licensee_id ASC, name ASC";

        if let Some(id) = licensee {
            if !scope.allows(Some(id)) {
                return Err(out_of_scope(principal, id));
            }
            let filters = [("licensee_id", Value::Text(id.to_string()))];
            return self.list_records("addresses", &filters, order, limit, params.offset);
        }

        let ids = match scope {
            Scope::All => return self.list_records("addresses", &[], order, limit, params.offset),
            Scope::Licensees(ids) => ids,
        };
        if ids.is_empty() {
            return Ok(ListResult { items: Vec::new(), total: 0 });
        }

        let where_sql = format!(" WHERE licensee_id IN ({})", placeholders(1, ids.len()));
        let mut values: Vec<Value> = ids.into_iter().map(Value::Text).collect();
        let total = self.count(&format!("SELECT COUNT(*) AS cnt FROM addresses{}", where_sql), &values)?;

        let sql = format!(
            "SELECT data FROM addresses{} ORDER BY {} LIMIT ?{} OFFSET ?{}",
            where_sql,
            order,
            values.len() + 1,
            values.len() + 2,
        );
        values.push(Value::Integer(limit as i64));
        values.push(Value::Integer(params.offset as i64));
        let rows = self.sql.query(&sql, &values).map_err(storage_err)?;
        let items = rows
            .iter()
            .map(|row| decode_row(row, "data"))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ListResult { items, total })
    }

    pub fn update_address(
        &self,
        principal: &Principal,
        id: &str,
        patch: serde_json::Value,
    ) -> Result<KpcAddress, ServiceError> {
        let scope = authorize(principal, Action::ManageAddresses)?;
        let current: KpcAddress = self.get_record("addresses", id)?;
        if !scope.allows(Some(&current.licensee)) {
            return Err(out_of_scope(principal, &current.licensee));
        }
        let updated: KpcAddress = Self::apply_patch(&current, patch)?;
        self.check_address(principal, &scope, &updated)?;
        self.update_record("addresses", id, &updated, &address_indexes(&updated))
            .map_err(|e| duplicate_name(e, &updated))?;
        Ok(updated)
    }

    pub fn delete_address(&self, principal: &Principal, id: &str) -> Result<(), ServiceError> {
        let scope = authorize(principal, Action::ManageAddresses)?;
        let current: KpcAddress = self.get_record("addresses", id)?;
        if !scope.allows(Some(&current.licensee)) {
            return Err(out_of_scope(principal, &current.licensee));
        }
        self.delete_record("addresses", id)?;
        info!(id, licensee = %current.licensee, "address deleted");
        Ok(())
    }

    /// Field checks, caller scope over the owning licensee, and that the
    /// licensee exists.
    fn check_address(
        &self,
        principal: &Principal,
        scope: &Scope,
        address: &KpcAddress,
    ) -> Result<(), ServiceError> {
        address.validate()?;
        if !scope.allows(Some(&address.licensee)) {
            return Err(out_of_scope(principal, &address.licensee));
        }
        match self.get_licensee_record(&address.licensee) {
            Ok(_) => Ok(()),
            Err(ServiceError::NotFound(_)) => {
                let mut errors = FormErrors::new();
                errors.add(
                    "licensee",
                    "Select a valid choice. That choice is not one of the available choices.",
                );
                Err(errors.into())
            }
            Err(e) => Err(e),
        }
    }
}

fn duplicate_name(err: ServiceError, address: &KpcAddress) -> ServiceError {
    match err {
        ServiceError::Conflict(_) => ServiceError::Conflict(format!(
            "licensee {} already has an address named {}",
            address.licensee, address.name
        )),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{auditor_principal, contact_principal, memory_service, root_principal, sample_licensee};

    fn sample_address(licensee: &str, name: &str) -> KpcAddress {
        KpcAddress {
            id: String::new(),
            licensee: licensee.to_string(),
            name: name.to_string(),
            address: "Hoveniersstraat 2, Antwerp".into(),
            country: "BE".into(),
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn names_unique_per_licensee() {
        let svc = memory_service();
        let root = root_principal();
        let acme = svc.insert_licensee(sample_licensee("Acme")).unwrap();
        let other = svc.insert_licensee(sample_licensee("Other")).unwrap();

        svc.create_address(&root, sample_address(&acme.id, "Antwerp")).unwrap();
        svc.create_address(&root, sample_address(&other.id, "Antwerp")).unwrap();
        let err = svc.create_address(&root, sample_address(&acme.id, "Antwerp")).unwrap_err();
        assert_eq!(err.error_code(), "ALREADY_EXISTS");
    }

    #[test]
    fn contact_limited_to_own_licensees() {
        let svc = memory_service();
        let root = root_principal();
        let acme = svc.insert_licensee(sample_licensee("Acme")).unwrap();
        let other = svc.insert_licensee(sample_licensee("Other")).unwrap();
        let theirs = svc.create_address(&root, sample_address(&other.id, "Dubai")).unwrap();

        let contact = contact_principal(&[&acme.id]);
        let mine = svc.create_address(&contact, sample_address(&acme.id, "Antwerp")).unwrap();
        let err = svc.create_address(&contact, sample_address(&other.id, "Tel Aviv")).unwrap_err();
        assert_eq!(err.error_code(), "PERMISSION_DENIED");

        let list = svc.list_addresses(&contact, None, &ListParams::default()).unwrap();
        assert_eq!(list.total, 1);
        assert_eq!(list.items[0].id, mine.id);
        assert!(svc.list_addresses(&contact, Some(&other.id), &ListParams::default()).is_err());
        assert!(svc.get_address(&contact, &theirs.id).is_err());
        assert!(svc.delete_address(&contact, &theirs.id).is_err());

        // Moving an address to a licensee outside the caller's scope.
        let err = svc
            .update_address(&contact, &mine.id, serde_json::json!({"licensee": other.id}))
            .unwrap_err();
        assert_eq!(err.error_code(), "PERMISSION_DENIED");

        let all = svc.list_addresses(&root, None, &ListParams::default()).unwrap();
        assert_eq!(all.total, 2);
    }

    #[test]
    fn auditor_reads_but_cannot_write() {
        let svc = memory_service();
        let acme = svc.insert_licensee(sample_licensee("Acme")).unwrap();
        let created = svc.create_address(&root_principal(), sample_address(&acme.id, "Antwerp")).unwrap();

        let auditor = auditor_principal();
        assert_eq!(svc.get_address(&auditor, &created.id).unwrap().name, "Antwerp");
        let err = svc.create_address(&auditor, sample_address(&acme.id, "Dubai")).unwrap_err();
        assert_eq!(err.error_code(), "PERMISSION_DENIED");
    }

    #[test]
    fn unknown_licensee_is_form_error() {
        let svc = memory_service();
        let err = svc.create_address(&root_principal(), sample_address("missing", "Antwerp")).unwrap_err();
        match err {
            ServiceError::Form(errors) => assert!(errors.has_field("licensee")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn update_renames_and_delete_removes() {
        let svc = memory_service();
        let root = root_principal();
        let acme = svc.insert_licensee(sample_licensee("Acme")).unwrap();
        let a = svc.create_address(&root, sample_address(&acme.id, "Antwerp")).unwrap();
        svc.create_address(&root, sample_address(&acme.id, "Dubai")).unwrap();

        let renamed = svc
            .update_address(&root, &a.id, serde_json::json!({"name": "Antwerp HQ"}))
            .unwrap();
        assert_eq!(renamed.name, "Antwerp HQ");
        let err = svc
            .update_address(&root, &a.id, serde_json::json!({"name": "Dubai"}))
            .unwrap_err();
        assert_eq!(err.error_code(), "ALREADY_EXISTS");

        svc.delete_address(&root, &a.id).unwrap();
        let list = svc.list_addresses(&root, Some(&acme.id), &ListParams::default()).unwrap();
        let names: Vec<_> = list.items.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, ["Dubai"]);
    }
}
