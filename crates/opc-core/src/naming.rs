//! Hierarchical resource-name qualification.
//!
//! The provider addresses user resources by a canonical path,
//! `/{namespace}-{identityDomain}/{user}/{shortName}`, while callers work with
//! the short name. Everything sent is qualified and everything received is
//! unqualified, so callers only ever see short names.
//!
//! Names under the vendor namespace (`/oracle/...`) and names that are already
//! canonical pass through both directions untouched.

/// Vendor-owned namespace that is never qualified.
pub const VENDOR_PREFIX: &str = "/oracle";

/// Separator between the type and the name of a compound identifier.
pub const COMPOUND_DELIMITER: char = ':';

/// Converts between short names and canonical qualified names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameQualifier {
    namespace: String,
    prefix: String,
}

impl NameQualifier {
    /// Create a qualifier for `/{namespace}-{identity_domain}/{user}/`.
    #[must_use]
    pub fn new(namespace: &str, identity_domain: &str, user: &str) -> Self {
        Self {
            namespace: format!("/{namespace}-"),
            prefix: format!("/{namespace}-{identity_domain}/{user}"),
        }
    }

    /// Canonical container of this identity, e.g. `/Compute-acme/jane`.
    #[must_use]
    pub fn user_prefix(&self) -> &str {
        &self.prefix
    }

    /// Returns true for vendor names and names already in canonical form.
    #[must_use]
    pub fn is_reserved(&self, name: &str) -> bool {
        name.starts_with(VENDOR_PREFIX) || name.starts_with(&self.namespace)
    }

    /// Qualify a short name. Empty and reserved names are returned unchanged.
    #[must_use]
    pub fn qualify(&self, name: &str) -> String {
        if name.is_empty() || self.is_reserved(name) {
            return name.to_string();
        }
        format!("{}/{name}", self.prefix)
    }

    /// Strip the `/{namespace}-{domain}/{user}/` segments from a name.
    ///
    /// Four-part names keep their trailing segment (`name/id`). Vendor names
    /// and names outside the namespace are returned unchanged.
    #[must_use]
    pub fn unqualify(&self, name: &str) -> String {
        if name.starts_with(VENDOR_PREFIX) || !name.starts_with(&self.namespace) {
            return name.to_string();
        }

        match name.splitn(4, '/').nth(3) {
            Some(rest) => rest.to_string(),
            None => name.to_string(),
        }
    }

    /// Qualify the name part of a `type:name` identifier.
    ///
    /// Values without a delimiter are qualified as a whole.
    #[must_use]
    pub fn qualify_compound(&self, value: &str) -> String {
        match value.split_once(COMPOUND_DELIMITER) {
            Some((kind, name)) => format!("{kind}{COMPOUND_DELIMITER}{}", self.qualify(name)),
            None => self.qualify(value),
        }
    }

    /// Unqualify the name part of a `type:name` identifier.
    #[must_use]
    pub fn unqualify_compound(&self, value: &str) -> String {
        match value.split_once(COMPOUND_DELIMITER) {
            Some((kind, name)) => format!("{kind}{COMPOUND_DELIMITER}{}", self.unqualify(name)),
            None => self.unqualify(value),
        }
    }

    /// Build `kind:qualified-name` for a short name.
    ///
    /// Values that already carry a vendor-owned name (`ippool:/oracle/...`)
    /// are returned unchanged.
    #[must_use]
    pub fn qualify_with_prefix(&self, kind: &str, name: &str) -> String {
        if let Some((_, inner)) = name.split_once(COMPOUND_DELIMITER) {
            if inner.starts_with(VENDOR_PREFIX) {
                return name.to_string();
            }
        }
        format!("{kind}{COMPOUND_DELIMITER}{}", self.qualify(name))
    }

    /// Reverse of [`NameQualifier::qualify_with_prefix`]: drop the type and
    /// unqualify the name. Vendor-owned values are returned unchanged.
    #[must_use]
    pub fn unqualify_with_prefix(&self, value: &str) -> String {
        match value.split_once(COMPOUND_DELIMITER) {
            Some((_, name)) if name.starts_with(VENDOR_PREFIX) => value.to_string(),
            Some((_, name)) => self.unqualify(name),
            None => self.unqualify(value),
        }
    }

    /// Qualify every name of a list.
    #[must_use]
    pub fn qualify_all<S: AsRef<str>>(&self, names: &[S]) -> Vec<String> {
        names.iter().map(|name| self.qualify(name.as_ref())).collect()
    }

    /// Unqualify every name of a list.
    #[must_use]
    pub fn unqualify_all<S: AsRef<str>>(&self, names: &[S]) -> Vec<String> {
        names
            .iter()
            .map(|name| self.unqualify(name.as_ref()))
            .collect()
    }

    /// Qualify a name embedded in a larger structure.
    pub fn qualify_in_place(&self, name: &mut String) {
        *name = self.qualify(name);
    }

    /// Unqualify a name embedded in a larger structure.
    pub fn unqualify_in_place(&self, name: &mut String) {
        *name = self.unqualify(name);
    }

    /// Qualify an optional embedded name.
    pub fn qualify_opt(&self, name: &mut Option<String>) {
        if let Some(name) = name {
            self.qualify_in_place(name);
        }
    }

    /// Unqualify an optional embedded name.
    pub fn unqualify_opt(&self, name: &mut Option<String>) {
        if let Some(name) = name {
            self.unqualify_in_place(name);
        }
    }
}
