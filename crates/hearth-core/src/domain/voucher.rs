//! Vouchers and reservations

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::list::ListDomain;
use super::newtypes::RecordId;
use super::record::SyncRecord;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoucherKind {
    #[default]
    Voucher,
    Reservation,
}

/// A gift card, coupon or booking kept on a voucher list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voucher {
    pub id: RecordId,
    pub name: String,
    #[serde(default)]
    pub kind: VoucherKind,
    /// Face value as entered, e.g. "50 EUR" or "2 persons"
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub expiry: Option<NaiveDate>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub redeemed: bool,
}

impl Voucher {
    pub fn new(name: impl Into<String>, kind: VoucherKind) -> Self {
        Self {
            id: RecordId::generate(),
            name: name.into(),
            kind,
            value: None,
            code: None,
            expiry: None,
            location: None,
            notes: None,
            redeemed: false,
        }
    }

    /// True once the expiry date lies strictly before `today`
    pub fn is_expired(&self, today: NaiveDate) -> bool {
        self.expiry.is_some_and(|expiry| expiry < today)
    }
}

impl SyncRecord for Voucher {
    const DOMAIN: ListDomain = ListDomain::Vouchers;

    fn id(&self) -> &RecordId {
        &self.id
    }
}
