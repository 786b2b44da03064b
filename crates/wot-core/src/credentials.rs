use std::collections::HashMap;

use dashmap::DashMap;

use crate::td::SecuritySchemeKind;

/// A resolved credential value for one security scheme.
#[derive(Debug, Clone)]
pub enum Credentials {
    Basic { username: String, password: String },
    Bearer { token: String },
    ApiKey { name: String, location: String, value: String },
    Psk { identity: String, key: Vec<u8> },
    Digest { username: String, password: String },
}

/// The outcome of a [`CredentialsProvider`] lookup. Kept distinct from a
/// bare `Option<Credentials>` so a provider can tell "nothing registered
/// for this href" (`NotFound`) apart from "something is registered for
/// this href, but not of the kind the form requires" (`KindMismatch`) —
/// the two fail with differently worded `NoCredentialsFound` errors.
#[derive(Debug, Clone)]
pub enum CredentialsLookup {
    Found(Credentials),
    KindMismatch { expected: SecuritySchemeKind, actual: SecuritySchemeKind },
    NotFound,
}

/// Supplies credentials for affordances whose forms require one of the
/// non-`nosec` security schemes.
///
/// Implementations are consulted lazily, the first time dispatch reaches a
/// form that needs credentials for a scheme that hasn't been installed on
/// the protocol client yet — see
/// [`crate::dispatch`](crate::dispatch)'s credential-installation step.
pub trait CredentialsProvider: Send + Sync {
    /// Looks up credentials for `scheme` applicable to `href`.
    fn credentials_for(&self, href: &str, scheme: SecuritySchemeKind) -> CredentialsLookup;
}

/// A [`CredentialsProvider`] backed by a static table of href-prefix to
/// per-scheme credentials.
///
/// # Matching algorithm
/// Given `href`, every registered prefix that is a string-prefix of
/// `href` is a candidate, regardless of which scheme kinds it holds
/// credentials for — the longest prefix wins (the most specific
/// registration); ties are broken by lexicographically smallest prefix,
/// so registration order never affects the outcome. Only once the
/// winning prefix is settled does lookup check whether *that*
/// registration holds credentials of the requested `scheme`: if it
/// holds a different kind instead, that is reported as a
/// [`CredentialsLookup::KindMismatch`] rather than treated the same as
/// no registration at all.
#[derive(Default)]
pub struct StaticCredentialsStore {
    by_prefix: DashMap<String, HashMap<SecuritySchemeKind, Credentials>>,
}

impl StaticCredentialsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, href_prefix: impl Into<String>, scheme: SecuritySchemeKind, credentials: Credentials) {
        self.by_prefix
            .entry(href_prefix.into())
            .or_default()
            .insert(scheme, credentials);
    }
}

impl CredentialsProvider for StaticCredentialsStore {
    fn credentials_for(&self, href: &str, scheme: SecuritySchemeKind) -> CredentialsLookup {
        let mut best_prefix: Option<String> = None;
        for entry in self.by_prefix.iter() {
            let prefix = entry.key();
            if !href.starts_with(prefix.as_str()) {
                continue;
            }
            let replace = match &best_prefix {
                None => true,
                Some(best) => prefix.len() > best.len() || (prefix.len() == best.len() && prefix < best),
            };
            if replace {
                best_prefix = Some(prefix.clone());
            }
        }

        let Some(prefix) = best_prefix else {
            return CredentialsLookup::NotFound;
        };
        let by_kind = self.by_prefix.get(&prefix).expect("prefix was just matched above");
        if let Some(credentials) = by_kind.get(&scheme) {
            return CredentialsLookup::Found(credentials.clone());
        }
        match by_kind.keys().min_by_key(|kind| format!("{kind:?}")) {
            Some(actual) => CredentialsLookup::KindMismatch { expected: scheme, actual: *actual },
            None => CredentialsLookup::NotFound,
        }
    }
}
