//! Deployment settings.
//!
//! # Resolution order
//!
//! 1. `GLUU_*` / `CASA_*` environment variables (highest priority)
//! 2. Optional YAML settings file: a flat mapping using the same keys
//! 3. Built-in defaults
//!
//! # API pattern
//!
//! [`Settings::resolve`] takes an explicit lookup function and never reads
//! the process environment; [`Settings::load`] wires in the file and
//! `std::env`. Tests must use `resolve`.
//!
//! Only the settings of the backend the persistence mode resolves to are
//! read and validated. Passwords stay on disk until [`Secret::reveal`].

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{io_err, ConfigError};
use crate::types::{BackendKind, LdapMapping, PersistenceMode, SqlDialect};

/// Environment variable that points at the optional YAML settings file.
pub const SETTINGS_FILE_ENV: &str = "CASA_SETTINGS_FILE";

// ---------------------------------------------------------------------------
// Secrets
// ---------------------------------------------------------------------------

/// A credential, either given inline or read from a file on demand.
#[derive(Clone, PartialEq, Eq)]
pub enum Secret {
    Inline(String),
    File(PathBuf),
}

impl Secret {
    /// Returns the credential, reading the backing file if needed.
    /// Trailing newlines in secret files are stripped.
    pub fn reveal(&self) -> Result<String, ConfigError> {
        match self {
            Secret::Inline(s) => Ok(s.clone()),
            Secret::File(path) => std::fs::read_to_string(path)
                .map(|s| s.trim_end_matches(['\r', '\n']).to_owned())
                .map_err(|e| io_err(path, e)),
        }
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Secret::Inline(_) => write!(f, "Secret(<redacted>)"),
            Secret::File(path) => write!(f, "Secret(file: {})", path.display()),
        }
    }
}

// ---------------------------------------------------------------------------
// oxd endpoint
// ---------------------------------------------------------------------------

/// The companion oxd service location, resolved from `GLUU_OXD_SERVER_URL`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OxdEndpoint {
    pub scheme: String,
    pub host: String,
    pub port: u16,
}

impl OxdEndpoint {
    pub const DEFAULT_PORT: u16 = 8443;

    /// Parses `[scheme://]host[:port][/path]`. Missing scheme means `https`,
    /// missing port means 8443.
    pub fn parse(url: &str) -> Result<Self, ConfigError> {
        let invalid = || ConfigError::invalid("GLUU_OXD_SERVER_URL", url, "[scheme://]host[:port]");

        let trimmed = url.trim();
        let (scheme, rest) = match trimmed.split_once("://") {
            Some((scheme, rest)) => (scheme.to_ascii_lowercase(), rest),
            None => ("https".to_owned(), trimmed),
        };
        let authority = rest.split('/').next().unwrap_or_default();
        if authority.is_empty() {
            return Err(invalid());
        }

        let (host, port) = if let Some(bracketed) = authority.strip_prefix('[') {
            let (host, tail) = bracketed.split_once(']').ok_or_else(invalid)?;
            (host, tail.strip_prefix(':'))
        } else {
            match authority.rsplit_once(':') {
                Some((host, port)) => (host, Some(port)),
                None => (authority, None),
            }
        };
        if host.is_empty() {
            return Err(invalid());
        }
        let port = match port {
            Some(p) => p.parse::<u16>().map_err(|_| invalid())?,
            None => Self::DEFAULT_PORT,
        };

        Ok(Self {
            scheme,
            host: host.to_owned(),
            port,
        })
    }
}

// ---------------------------------------------------------------------------
// Per-backend settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LdapSettings {
    /// `host:port` of the directory server.
    pub url: String,
    pub use_ssl: bool,
    /// Verify the server certificate (off by default).
    pub verify_tls: bool,
    pub bind_dn: String,
    pub password: Secret,
}

impl LdapSettings {
    /// URL in the form accepted by LDAP clients.
    pub fn connection_url(&self) -> String {
        let scheme = if self.use_ssl { "ldaps" } else { "ldap" };
        format!("{scheme}://{}", self.url)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CouchbaseSettings {
    /// Comma-separated cluster hosts; the first one serves queries.
    pub hosts: String,
    pub scheme: String,
    pub user: String,
    pub password: Secret,
    pub bucket_prefix: String,
}

impl CouchbaseSettings {
    /// N1QL query service endpoint on the first configured host.
    pub fn query_url(&self) -> String {
        let host = self
            .hosts
            .split(',')
            .map(str::trim)
            .find(|h| !h.is_empty())
            .unwrap_or("localhost");
        let port = if self.scheme == "http" { 8093 } else { 18093 };
        format!("{}://{host}:{port}/query/service", self.scheme)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlSettings {
    pub dialect: SqlDialect,
    pub host: String,
    pub port: u16,
    /// Database name, or the database file path for sqlite.
    pub database: String,
    pub user: String,
    /// `None` for sqlite.
    pub password: Option<Secret>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpannerSettings {
    pub project_id: String,
    pub instance_id: String,
    pub database_id: String,
    /// `host:port` of a local emulator; plain HTTP, no credentials.
    pub emulator_host: Option<String>,
    pub access_token: Option<Secret>,
}

impl SpannerSettings {
    /// REST API root, honouring the emulator.
    pub fn api_root(&self) -> String {
        match &self.emulator_host {
            Some(host) => format!("http://{host}"),
            None => "https://spanner.googleapis.com".to_owned(),
        }
    }

    /// `projects/<p>/instances/<i>/databases/<d>`
    pub fn database_path(&self) -> String {
        format!(
            "projects/{}/instances/{}/databases/{}",
            self.project_id, self.instance_id, self.database_id
        )
    }
}

/// Connection settings for the backend the deployment resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendSettings {
    Ldap(LdapSettings),
    Couchbase(CouchbaseSettings),
    Sql(SqlSettings),
    Spanner(SpannerSettings),
}

impl BackendSettings {
    pub fn kind(&self) -> BackendKind {
        match self {
            BackendSettings::Ldap(_) => BackendKind::Ldap,
            BackendSettings::Couchbase(_) => BackendKind::Couchbase,
            BackendSettings::Sql(_) => BackendKind::Sql,
            BackendSettings::Spanner(_) => BackendKind::Spanner,
        }
    }
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Fully resolved settings for one bootstrap run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub persistence: PersistenceMode,
    pub ldap_mapping: LdapMapping,
    /// Public FQDN of the deployment.
    pub hostname: String,
    pub oxd: OxdEndpoint,
    /// Replaces the embedded casa template when set.
    pub template_path: Option<PathBuf>,
    pub backend: BackendSettings,
}

impl Settings {
    /// Resolve settings from `lookup`, which maps a key such as
    /// `GLUU_PERSISTENCE_TYPE` to its raw value.
    pub fn resolve<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let get_or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_owned());

        let persistence: PersistenceMode = get_or("GLUU_PERSISTENCE_TYPE", "ldap").parse()?;
        let ldap_mapping: LdapMapping = get_or("GLUU_PERSISTENCE_LDAP_MAPPING", "default").parse()?;
        let hostname = get("GLUU_HOSTNAME").ok_or(ConfigError::Missing { key: "GLUU_HOSTNAME" })?;
        let oxd = OxdEndpoint::parse(&get_or("GLUU_OXD_SERVER_URL", "localhost:8443"))?;
        let template_path = get("CASA_TEMPLATE_PATH").map(PathBuf::from);

        let secret = |inline_key: &str, file_key: &str, default_file: &str| match get(inline_key) {
            Some(value) => Secret::Inline(value),
            None => Secret::File(PathBuf::from(get_or(file_key, default_file))),
        };

        let kind = persistence.resolve(ldap_mapping);
        let backend = match kind {
            BackendKind::Ldap => BackendSettings::Ldap(LdapSettings {
                url: get_or("GLUU_LDAP_URL", "localhost:1636"),
                use_ssl: parse_bool("GLUU_LDAP_USE_SSL", &get_or("GLUU_LDAP_USE_SSL", "true"))?,
                verify_tls: parse_bool(
                    "GLUU_LDAP_VERIFY_TLS",
                    &get_or("GLUU_LDAP_VERIFY_TLS", "false"),
                )?,
                bind_dn: get_or("GLUU_LDAP_BIND_DN", "cn=directory manager"),
                password: secret(
                    "GLUU_LDAP_PASSWORD",
                    "GLUU_LDAP_PASSWORD_FILE",
                    "/etc/gluu/conf/ldap_password",
                ),
            }),
            BackendKind::Couchbase => {
                let scheme = get_or("GLUU_COUCHBASE_QUERY_SCHEME", "https").to_ascii_lowercase();
                if scheme != "http" && scheme != "https" {
                    return Err(ConfigError::invalid(
                        "GLUU_COUCHBASE_QUERY_SCHEME",
                        &scheme,
                        "http, https",
                    ));
                }
                BackendSettings::Couchbase(CouchbaseSettings {
                    hosts: get_or("GLUU_COUCHBASE_URL", "localhost"),
                    scheme,
                    user: get_or("GLUU_COUCHBASE_USER", "admin"),
                    password: secret(
                        "GLUU_COUCHBASE_PASSWORD",
                        "GLUU_COUCHBASE_PASSWORD_FILE",
                        "/etc/gluu/conf/couchbase_password",
                    ),
                    bucket_prefix: get_or("GLUU_COUCHBASE_BUCKET_PREFIX", "gluu"),
                })
            }
            BackendKind::Sql => {
                let dialect: SqlDialect = get_or("GLUU_SQL_DB_DIALECT", "mysql").parse()?;
                let port = match get("GLUU_SQL_DB_PORT") {
                    Some(raw) => raw.parse::<u16>().map_err(|_| {
                        ConfigError::invalid("GLUU_SQL_DB_PORT", &raw, "a TCP port number")
                    })?,
                    None => dialect.default_port(),
                };
                let password = match dialect {
                    SqlDialect::Sqlite => None,
                    _ => Some(secret(
                        "GLUU_SQL_DB_PASSWORD",
                        "GLUU_SQL_PASSWORD_FILE",
                        "/etc/gluu/conf/sql_password",
                    )),
                };
                BackendSettings::Sql(SqlSettings {
                    dialect,
                    host: get_or("GLUU_SQL_DB_HOST", "localhost"),
                    port,
                    database: get_or("GLUU_SQL_DB_NAME", "gluu"),
                    user: get_or("GLUU_SQL_DB_USER", "gluu"),
                    password,
                })
            }
            BackendKind::Spanner => BackendSettings::Spanner(SpannerSettings {
                project_id: get("GOOGLE_PROJECT_ID")
                    .ok_or(ConfigError::Missing { key: "GOOGLE_PROJECT_ID" })?,
                instance_id: get("GLUU_GOOGLE_SPANNER_INSTANCE_ID").ok_or(ConfigError::Missing {
                    key: "GLUU_GOOGLE_SPANNER_INSTANCE_ID",
                })?,
                database_id: get("GLUU_GOOGLE_SPANNER_DATABASE_ID").ok_or(ConfigError::Missing {
                    key: "GLUU_GOOGLE_SPANNER_DATABASE_ID",
                })?,
                emulator_host: get("SPANNER_EMULATOR_HOST"),
                access_token: get("GLUU_GOOGLE_SPANNER_ACCESS_TOKEN").map(Secret::Inline),
            }),
        };

        tracing::debug!(
            persistence = %persistence,
            backend = %kind,
            hostname = %hostname,
            oxd_host = %oxd.host,
            oxd_port = oxd.port,
            "resolved settings"
        );

        Ok(Settings {
            persistence,
            ldap_mapping,
            hostname,
            oxd,
            template_path,
            backend,
        })
    }

    /// Resolve settings from the process environment layered over the
    /// optional YAML file at `file`.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let file_values = match file {
            Some(path) => load_settings_file(path)?,
            None => BTreeMap::new(),
        };
        Self::resolve_layered(|key| std::env::var(key).ok(), &file_values)
    }

    /// Resolve with `env` taking precedence over `file_values`. A blank
    /// value in either layer counts as unset, so a blank environment
    /// variable falls through to the file.
    pub fn resolve_layered<E>(env: E, file_values: &BTreeMap<String, String>) -> Result<Self, ConfigError>
    where
        E: Fn(&str) -> Option<String>,
    {
        let is_set = |value: &String| !value.trim().is_empty();
        Self::resolve(|key| {
            env(key)
                .filter(is_set)
                .or_else(|| file_values.get(key).filter(|v| is_set(v)).cloned())
        })
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }
}

/// Read a flat YAML mapping of setting keys to scalar values.
pub fn load_settings_file(path: &Path) -> Result<BTreeMap<String, String>, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    let raw: BTreeMap<String, serde_yaml::Value> =
        serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;

    let mut values = BTreeMap::new();
    for (key, value) in raw {
        let text = match value {
            serde_yaml::Value::String(s) => s,
            serde_yaml::Value::Bool(b) => b.to_string(),
            serde_yaml::Value::Number(n) => n.to_string(),
            serde_yaml::Value::Null => continue,
            _ => {
                return Err(ConfigError::Invalid {
                    key: "settings file",
                    value: key,
                    expected: "a scalar value",
                })
            }
        };
        values.insert(key, text);
    }
    Ok(values)
}

fn parse_bool(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "y" | "on" => Ok(true),
        "false" | "0" | "no" | "n" | "off" => Ok(false),
        _ => Err(ConfigError::invalid(key, raw, "true or false")),
    }
}

impl FromStr for OxdEndpoint {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
