//! Signed wire snapshots of the two rulesets.
//!
//! The signature covers exactly `{version, updatedAt, <payload>}`; the
//! `signature` field itself is never part of the signed bytes.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::ruleset::{Pattern, PatternSet, RuleSet};
use crate::signature::SignatureService;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SignedDomains<'a> {
    version: u64,
    updated_at: i64,
    domains: &'a [String],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SignedPatterns<'a> {
    version: u64,
    updated_at: i64,
    patterns: &'a [Pattern],
}

/// `GET /v1/blocklist` body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlocklistSnapshot {
    pub version: u64,
    pub updated_at: i64,
    /// Sorted blocked domains.
    pub domains: Vec<String>,
    /// Hex HMAC-SHA256 over the other three fields.
    pub signature: String,
}

impl BlocklistSnapshot {
    /// Signs the current blocklist.
    pub fn sign(rules: &RuleSet, signer: &SignatureService) -> Result<Self> {
        let domains = rules.domains();
        let signature = signer.sign(&SignedDomains {
            version: rules.version,
            updated_at: rules.updated_at,
            domains: &domains,
        })?;
        Ok(Self {
            version: rules.version,
            updated_at: rules.updated_at,
            domains,
            signature,
        })
    }

    /// Recomputes the canonical payload and checks the signature.
    pub fn verify(&self, signer: &SignatureService) -> bool {
        signer.verify(
            &SignedDomains {
                version: self.version,
                updated_at: self.updated_at,
                domains: &self.domains,
            },
            &self.signature,
        )
    }
}

/// `GET /v1/patterns` body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternsSnapshot {
    pub version: u64,
    pub updated_at: i64,
    pub patterns: Vec<Pattern>,
    pub signature: String,
}

impl PatternsSnapshot {
    /// Signs the current pattern set.
    pub fn sign(set: &PatternSet, signer: &SignatureService) -> Result<Self> {
        let signature = signer.sign(&SignedPatterns {
            version: set.version,
            updated_at: set.updated_at,
            patterns: &set.patterns,
        })?;
        Ok(Self {
            version: set.version,
            updated_at: set.updated_at,
            patterns: set.patterns.clone(),
            signature,
        })
    }

    /// Recomputes the canonical payload and checks the signature.
    pub fn verify(&self, signer: &SignatureService) -> bool {
        signer.verify(
            &SignedPatterns {
                version: self.version,
                updated_at: self.updated_at,
                patterns: &self.patterns,
            },
            &self.signature,
        )
    }
}
