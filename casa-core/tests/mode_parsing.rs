//! Persistence-mode, mapping and dialect parsing cases.
//!
//! Each `#[case]` is isolated: no shared state.

use casa_core::{BackendKind, LdapMapping, PersistenceMode, SqlDialect};
use rstest::rstest;

#[rstest]
#[case("ldap", "default", BackendKind::Ldap)]
#[case("couchbase", "default", BackendKind::Couchbase)]
#[case("sql", "default", BackendKind::Sql)]
#[case("spanner", "default", BackendKind::Spanner)]
#[case("hybrid", "default", BackendKind::Ldap)]
#[case("hybrid", "user", BackendKind::Couchbase)]
#[case("hybrid", "session", BackendKind::Couchbase)]
fn mode_and_mapping_select_backend(
    #[case] mode: &str,
    #[case] mapping: &str,
    #[case] expected: BackendKind,
) {
    let mode: PersistenceMode = mode.parse().expect("mode");
    let mapping: LdapMapping = mapping.parse().expect("mapping");
    assert_eq!(mode.resolve(mapping), expected);
}

#[rstest]
#[case("LDAP")]
#[case("mongodb")]
#[case("")]
fn unknown_modes_are_rejected(#[case] raw: &str) {
    assert!(raw.parse::<PersistenceMode>().is_err());
}

#[rstest]
#[case("mysql", SqlDialect::Mysql, 3306)]
#[case("pgsql", SqlDialect::Pgsql, 5432)]
#[case("postgresql", SqlDialect::Pgsql, 5432)]
fn dialect_default_ports(#[case] raw: &str, #[case] dialect: SqlDialect, #[case] port: u16) {
    let parsed: SqlDialect = raw.parse().expect("dialect");
    assert_eq!(parsed, dialect);
    assert_eq!(parsed.default_port(), port);
}

#[test]
fn invalid_mapping_names_the_setting() {
    let err = "statistic".parse::<LdapMapping>().unwrap_err();
    assert!(err.to_string().contains("GLUU_PERSISTENCE_LDAP_MAPPING"));
}
