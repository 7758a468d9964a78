use proptest::prelude::*;

use sproc_lineage::error::LineageError;
use sproc_lineage::parser::names::{is_cross_database, is_temp_table, normalize_table_name};

#[test]
fn one_and_two_part_names_keep_the_table_segment() {
    assert_eq!(normalize_table_name("Trades", "BRS").unwrap(), "TRADES");
    assert_eq!(normalize_table_name("dbo.Trades", "BRS").unwrap(), "TRADES");
    assert_eq!(normalize_table_name("[dbo].[Trades]", "BRS").unwrap(), "TRADES");
}

#[test]
fn home_database_collapses_to_the_bare_table() {
    assert_eq!(normalize_table_name("BRS.dbo.Foo", "BRS").unwrap(), "FOO");
    assert_eq!(normalize_table_name("[brs].[dbo].[Foo]", "BRS").unwrap(), "FOO");
    assert_eq!(
        normalize_table_name("BRS.dbo.Foo", "BRS").unwrap(),
        normalize_table_name("Foo", "BRS").unwrap()
    );
}

#[test]
fn foreign_database_keeps_all_three_segments() {
    let key = normalize_table_name("OTHER.dbo.Foo", "BRS").unwrap();
    assert_eq!(key, "OTHER.DBO.FOO");
    assert!(is_cross_database(&key));
    assert!(!is_cross_database(&normalize_table_name("Foo", "BRS").unwrap()));
}

#[test]
fn dotted_bracketed_segments_are_not_qualification() {
    let key = normalize_table_name("dbo.[Not.Listed]", "BRS").unwrap();
    assert_eq!(key, "[NOT.LISTED]");
    assert!(!is_cross_database(&key));

    let key = normalize_table_name("[my.db].dbo.[t.1]", "BRS").unwrap();
    assert_eq!(key, "[MY.DB].DBO.[T.1]");
    assert!(is_cross_database(&key));
    assert_eq!(normalize_table_name(&key, "BRS").unwrap(), key);
}

#[test]
fn home_database_is_configurable() {
    assert_eq!(normalize_table_name("Risk.dbo.Limits", "RISK").unwrap(), "LIMITS");
    assert_eq!(
        normalize_table_name("BRS.dbo.Limits", "RISK").unwrap(),
        "BRS.DBO.LIMITS"
    );
}

#[test]
fn omitted_schema_still_reads_as_three_parts() {
    assert_eq!(normalize_table_name("BRS..Trades", "BRS").unwrap(), "TRADES");
    assert_eq!(normalize_table_name("Risk..Trades", "BRS").unwrap(), "RISK..TRADES");
}

#[test]
fn temp_tables_keep_their_marker() {
    let key = normalize_table_name("#staging", "BRS").unwrap();
    assert_eq!(key, "#STAGING");
    assert!(is_temp_table(&key, "#"));
    assert!(is_temp_table(&normalize_table_name("##global", "BRS").unwrap(), "#"));
    assert!(!is_temp_table("TRADES", "#"));
}

#[test]
fn empty_and_four_part_names_are_fatal() {
    assert!(matches!(
        normalize_table_name("   ", "BRS"),
        Err(LineageError::EmptyQualifiedName)
    ));
    let err = normalize_table_name("srv.BRS.dbo.Trades", "BRS").expect_err("should fail");
    assert!(matches!(
        err,
        LineageError::UnhandledQualifiedName { segments: 4, .. }
    ));
    assert!(err.is_contract_violation());
}

fn plain_segment() -> impl Strategy<Value = String> {
    "[A-Za-z_][A-Za-z0-9_]{0,8}"
}

fn segment() -> impl Strategy<Value = String> {
    "[A-Za-z_][A-Za-z0-9_]{0,6}(\\.[A-Za-z0-9_]{1,4})?"
}

/// Bracket the segment when asked to, and always when it contains a dot.
fn quoted(segment: String, bracketed: bool) -> String {
    if bracketed || segment.contains('.') {
        format!("[{segment}]")
    } else {
        segment
    }
}

proptest! {
    #[test]
    fn normalization_is_idempotent(
        parts in prop::collection::vec((segment(), any::<bool>()), 1..=3),
        home in prop_oneof![Just("BRS".to_string()), plain_segment()],
    ) {
        let raw = parts
            .into_iter()
            .map(|(s, bracketed)| quoted(s, bracketed))
            .collect::<Vec<_>>()
            .join(".");
        let home = home.to_uppercase();
        let once = normalize_table_name(&raw, &home).unwrap();
        let twice = normalize_table_name(&once, &home).unwrap();
        prop_assert_eq!(&once, &twice);
        prop_assert_eq!(once.to_uppercase(), once);
    }

    #[test]
    fn home_qualification_never_changes_the_key(table in segment(), schema in plain_segment()) {
        let table = quoted(table, false);
        let bare = normalize_table_name(&table, "BRS").unwrap();
        let qualified = normalize_table_name(&format!("BRS.{schema}.{table}"), "BRS").unwrap();
        prop_assert_eq!(bare, qualified);
    }

    #[test]
    fn only_three_part_foreign_keys_are_cross_database(
        parts in prop::collection::vec((segment(), any::<bool>()), 1..=2),
    ) {
        let raw = parts
            .into_iter()
            .map(|(s, bracketed)| quoted(s, bracketed))
            .collect::<Vec<_>>()
            .join(".");
        let key = normalize_table_name(&raw, "BRS").unwrap();
        prop_assert!(!is_cross_database(&key), "{} -> {}", raw, key);
    }
}
