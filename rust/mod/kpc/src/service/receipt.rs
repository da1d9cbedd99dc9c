use kpc_core::{ListParams, ListResult, ServiceError};

use crate::access::{authorize, Action, Principal};
use crate::model::Receipt;
use super::KpcService;

impl KpcService {
    pub fn get_receipt(&self, principal: &Principal, id: &str) -> Result<Receipt, ServiceError> {
        authorize(principal, Action::ViewReceipts)?;
        self.get_record("receipts", id)
    }

    /// Receipts, newest number first.
    pub fn list_receipts(
        &self,
        principal: &Principal,
        params: &ListParams,
    ) -> Result<ListResult<Receipt>, ServiceError> {
        authorize(principal, Action::ViewReceipts)?;
        self.list_records("receipts", &[], "number DESC", params.effective_limit(), params.offset)
    }
}
