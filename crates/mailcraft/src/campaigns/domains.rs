use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::campaigns::domain::FromAddressId;
use crate::email::variables::CompanyId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SendingDomainId(pub Uuid);

impl SendingDomainId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Verification lifecycle of a sending domain. Created Pending; only the
/// external verification collaborator moves it to Active or Failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainState {
    Pending,
    Active,
    Failed,
}

impl DomainState {
    pub const fn label(self) -> &'static str {
        match self {
            DomainState::Pending => "pending",
            DomainState::Active => "active",
            DomainState::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsRecord {
    pub record_type: String,
    pub name: String,
    pub value: String,
}

/// A company's sending domain plus the DNS records it must publish before the
/// verification collaborator will activate it. `domain` is globally unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendingDomain {
    pub id: SendingDomainId,
    pub company_id: CompanyId,
    pub domain: String,
    pub state: DomainState,
    pub dns_records: Vec<DnsRecord>,
}

impl SendingDomain {
    pub fn create(company_id: CompanyId, domain: String) -> Self {
        let dns_records = vec![
            DnsRecord {
                record_type: "TXT".to_string(),
                name: domain.clone(),
                value: "v=spf1 include:mail.mailcraft.dev ~all".to_string(),
            },
            DnsRecord {
                record_type: "CNAME".to_string(),
                name: format!("mc._domainkey.{domain}"),
                value: "dkim.mailcraft.dev".to_string(),
            },
        ];

        Self {
            id: SendingDomainId::generate(),
            company_id,
            domain,
            state: DomainState::Pending,
            dns_records,
        }
    }

    /// Apply the verification collaborator's verdict.
    pub fn apply_verdict(&mut self, verdict: DomainVerdict) {
        self.state = match verdict {
            DomainVerdict::Verified => DomainState::Active,
            DomainVerdict::Failed(_) => DomainState::Failed,
        };
    }
}

/// Outcome reported by the external domain-verification service.
#[derive(Debug, Clone, PartialEq)]
pub enum DomainVerdict {
    Verified,
    Failed(String),
}

/// External collaborator that checks the published DNS records.
pub trait DomainVerifier: Send + Sync {
    fn verify(&self, domain: &SendingDomain) -> Result<DomainVerdict, VerificationError>;
}

#[derive(Debug, thiserror::Error)]
pub enum VerificationError {
    #[error("verification service unavailable: {0}")]
    Unavailable(String),
}

/// One mailbox identity under a sending domain; `local_part` is unique per
/// domain and the `verified` flag gates campaign use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FromAddress {
    pub id: FromAddressId,
    pub sending_domain_id: SendingDomainId,
    pub local_part: String,
    pub verified: bool,
}

/// A from-address joined with its domain, as campaigns consume it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FromIdentity {
    pub address: FromAddress,
    pub domain: SendingDomain,
}

impl FromIdentity {
    pub fn email(&self) -> String {
        format!("{}@{}", self.address.local_part, self.domain.domain)
    }

    /// Campaigns may only send from a verified address on an active domain.
    pub fn sendable(&self) -> bool {
        self.address.verified && self.domain.state == DomainState::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(verified: bool, state: DomainState) -> FromIdentity {
        let mut domain = SendingDomain::create(
            CompanyId("co-1".to_string()),
            "garage.example".to_string(),
        );
        domain.state = state;
        FromIdentity {
            address: FromAddress {
                id: FromAddressId::generate(),
                sending_domain_id: domain.id,
                local_part: "service".to_string(),
                verified,
            },
            domain,
        }
    }

    #[test]
    fn composes_address_from_local_part_and_domain() {
        assert_eq!(
            identity(true, DomainState::Active).email(),
            "service@garage.example"
        );
    }

    #[test]
    fn sendable_requires_verified_address_and_active_domain() {
        assert!(identity(true, DomainState::Active).sendable());
        assert!(!identity(false, DomainState::Active).sendable());
        assert!(!identity(true, DomainState::Pending).sendable());
    }

    #[test]
    fn new_domains_start_pending_with_dns_records() {
        let domain = SendingDomain::create(
            CompanyId("co-1".to_string()),
            "garage.example".to_string(),
        );
        assert_eq!(domain.state, DomainState::Pending);
        assert!(!domain.dns_records.is_empty());
    }

    #[test]
    fn verdicts_drive_the_verification_lifecycle() {
        let mut domain = SendingDomain::create(
            CompanyId("co-1".to_string()),
            "garage.example".to_string(),
        );
        domain.apply_verdict(DomainVerdict::Failed("missing TXT record".to_string()));
        assert_eq!(domain.state, DomainState::Failed);
        domain.apply_verdict(DomainVerdict::Verified);
        assert_eq!(domain.state, DomainState::Active);
    }
}
