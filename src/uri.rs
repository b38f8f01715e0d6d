//! Connection string tokenizer
//!
//! Splits a MongoDB connection string into three regions:
//!
//! ```text
//! mongodb://bob:secret@h1:27017,h2:27017/database?replicaSet=rs
//! |----------- authority -----------||-path--||---- tail -----|
//! ```
//!
//! Only the path (database name) is ever rewritten; the authority (scheme,
//! credentials, host list) and the tail (query string and fragment) are kept
//! byte for byte.

use crate::error::{CacheError, Result};

/// Schemes understood by the MongoDB driver
pub const SCHEMES: [&str; 2] = ["mongodb://", "mongodb+srv://"];

/// Borrowed view over the regions of a connection string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionString<'a> {
    authority: &'a str,
    path: &'a str,
    tail: &'a str,
}

impl<'a> ConnectionString<'a> {
    /// Tokenize `uri` into authority, path and tail
    pub fn parse(uri: &'a str) -> Result<Self> {
        let scheme = SCHEMES
            .iter()
            .find(|scheme| uri.starts_with(*scheme))
            .ok_or_else(|| {
                let scheme = uri
                    .split_once("://")
                    .map(|(scheme, _)| scheme)
                    .filter(|scheme| {
                        scheme
                            .chars()
                            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
                    })
                    .unwrap_or("<none>");
                CacheError::InvalidConfiguration(format!(
                    "Unsupported connection string scheme: {}",
                    scheme
                ))
            })?;

        let rest = &uri[scheme.len()..];
        let hosts_end = rest.find(['/', '?', '#']).unwrap_or(rest.len());

        if hosts_end == 0 {
            return Err(CacheError::InvalidConfiguration(
                "Connection string has no hosts".to_string(),
            ));
        }

        let authority_end = scheme.len() + hosts_end;
        let after_hosts = &uri[authority_end..];
        let path_end = after_hosts.find(['?', '#']).unwrap_or(after_hosts.len());

        Ok(Self {
            authority: &uri[..authority_end],
            path: &after_hosts[..path_end],
            tail: &after_hosts[path_end..],
        })
    }

    /// Scheme, credentials and host list
    pub fn authority(&self) -> &'a str {
        self.authority
    }

    /// Host list only (credentials stripped)
    pub fn hosts(&self) -> &'a str {
        let without_scheme = self.hosts_with_credentials();

        match without_scheme.rfind('@') {
            Some(at) => &without_scheme[at + 1..],
            None => without_scheme,
        }
    }

    /// Existing path including its leading slash, possibly empty
    pub fn path(&self) -> &'a str {
        self.path
    }

    /// Database named by the path, if any
    pub fn database(&self) -> Option<&'a str> {
        let name = self.path.trim_start_matches('/');
        (!name.is_empty()).then_some(name)
    }

    /// Query string and fragment, including the leading `?` or `#`
    pub fn tail(&self) -> &'a str {
        self.tail
    }

    /// Connection string with the password masked, safe to log
    pub fn redacted(&self) -> String {
        let scheme_end = self.authority.len() - self.hosts_with_credentials().len();
        let scheme = &self.authority[..scheme_end];

        let credentials = match self.hosts_with_credentials().rfind('@') {
            Some(at) => {
                let userinfo = &self.hosts_with_credentials()[..at];
                match userinfo.split_once(':') {
                    Some((user, _)) => format!("{}:****@", user),
                    None => format!("{}@", userinfo),
                }
            }
            None => String::new(),
        };

        format!(
            "{}{}{}{}{}",
            scheme,
            credentials,
            self.hosts(),
            self.path,
            self.tail
        )
    }

    fn hosts_with_credentials(&self) -> &'a str {
        SCHEMES
            .iter()
            .find_map(|scheme| self.authority.strip_prefix(scheme))
            .unwrap_or(self.authority)
    }

    /// Render the connection string with its path set to `database`
    pub fn with_database(&self, database: &str) -> String {
        format!("{}/{}{}", self.authority, database, self.tail)
    }
}

/// `uri` with its password masked; unparseable strings are hidden entirely
pub fn redact(uri: &str) -> String {
    ConnectionString::parse(uri)
        .map(|parsed| parsed.redacted())
        .unwrap_or_else(|_| "<invalid connection string>".to_string())
}

/// Rewrite the database path of `uri` to `database`
pub fn rewrite_database(uri: &str, database: &str) -> Result<String> {
    Ok(ConnectionString::parse(uri)?.with_database(database))
}
