use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

/// The one identifier an account reference is addressed by.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountIdentifier {
    Iban(String),
    Bban(String),
    Pan(String),
    MaskedPan(String),
    Msisdn(String),
}

impl AccountIdentifier {
    pub fn value(&self) -> &str {
        match self {
            AccountIdentifier::Iban(v)
            | AccountIdentifier::Bban(v)
            | AccountIdentifier::Pan(v)
            | AccountIdentifier::MaskedPan(v)
            | AccountIdentifier::Msisdn(v) => v,
        }
    }
}

/// Reference to a PSU account.
///
/// Two references are equal when they use the same identifier with the same
/// value and currency; ASPSP-side ids do not take part in equality.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountReference {
    #[serde(flatten)]
    pub identifier: AccountIdentifier,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aspsp_account_id: Option<String>,
}

impl AccountReference {
    pub fn iban(iban: impl Into<String>) -> Self {
        Self::new(AccountIdentifier::Iban(iban.into()))
    }

    pub fn new(identifier: AccountIdentifier) -> Self {
        Self {
            identifier,
            currency: None,
            resource_id: None,
            aspsp_account_id: None,
        }
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = Some(currency.into());
        self
    }
}

impl PartialEq for AccountReference {
    fn eq(&self, other: &Self) -> bool {
        self.identifier == other.identifier && self.currency == other.currency
    }
}

impl Eq for AccountReference {}

impl Hash for AccountReference {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identifier.hash(state);
        self.currency.hash(state);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountAccessType {
    AllAccounts,
    AllAccountsWithOwnerName,
}

/// Owner-name access requested on top of the account references.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdditionalInformationAccess {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_name: Option<Vec<AccountReference>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountAccess {
    #[serde(default)]
    pub accounts: Vec<AccountReference>,
    #[serde(default)]
    pub balances: Vec<AccountReference>,
    #[serde(default)]
    pub transactions: Vec<AccountReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available_accounts: Option<AccountAccessType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available_accounts_with_balance: Option<AccountAccessType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub all_psd2: Option<AccountAccessType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_information: Option<AdditionalInformationAccess>,
}

impl AccountAccess {
    /// Access to every account the PSU holds.
    pub fn all_accounts() -> Self {
        Self {
            available_accounts: Some(AccountAccessType::AllAccounts),
            ..Default::default()
        }
    }

    pub fn references(&self) -> impl Iterator<Item = &AccountReference> {
        self.accounts
            .iter()
            .chain(self.balances.iter())
            .chain(self.transactions.iter())
    }

    pub fn has_references(&self) -> bool {
        self.references().next().is_some()
    }

    pub fn has_global_flags(&self) -> bool {
        self.available_accounts.is_some()
            || self.available_accounts_with_balance.is_some()
            || self.all_psd2.is_some()
    }

    /// No references and no flags: the PSU picks the accounts at the ASPSP.
    pub fn is_bank_offered(&self) -> bool {
        !self.has_references() && !self.has_global_flags()
    }

    /// Only the account list is requested, without balances or transactions.
    pub fn is_available_accounts_only(&self) -> bool {
        !self.has_references()
            && self.all_psd2.is_none()
            && (self.available_accounts.is_some() || self.available_accounts_with_balance.is_some())
    }
}

/// ISO 4217 style code: three uppercase ASCII letters.
pub fn is_valid_currency(currency: &str) -> bool {
    currency.len() == 3 && currency.bytes().all(|b| b.is_ascii_uppercase())
}

/// ISO 13616 check: country code, check digits and a mod-97 remainder of 1.
pub fn is_valid_iban(iban: &str) -> bool {
    let normalized: String = iban
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_uppercase();

    if !(15..=34).contains(&normalized.len()) || !normalized.is_ascii() {
        return false;
    }

    let bytes = normalized.as_bytes();
    if !bytes[..2].iter().all(u8::is_ascii_uppercase)
        || !bytes[2..4].iter().all(u8::is_ascii_digit)
        || !bytes.iter().all(u8::is_ascii_alphanumeric)
    {
        return false;
    }

    let rearranged = bytes[4..].iter().chain(bytes[..4].iter());
    let mut remainder: u32 = 0;
    for &b in rearranged {
        let value = if b.is_ascii_digit() {
            u32::from(b - b'0')
        } else {
            u32::from(b - b'A') + 10
        };
        remainder = if value >= 10 {
            (remainder * 100 + value) % 97
        } else {
            (remainder * 10 + value) % 97
        };
    }
    remainder == 1
}
