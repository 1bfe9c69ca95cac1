//! End-to-end scenarios exercising `kvidxkit::Store` as an external consumer
//! would, covering spec.md S:8's concrete scenarios and universal invariants.

use kvidxkit::{Config, Format, Migration, Store};
use pretty_assertions::assert_eq as pretty_assert_eq;

fn store() -> Store {
    Store::open_in_memory().unwrap()
}

#[test]
fn scenario_insert_exists_get_remove() {
    let mut s = store();
    let data = vec![0x03u8; 65536];
    s.insert(331, 701, 88, &data).unwrap();
    assert!(s.exists(331).unwrap());
    assert!(s.exists_dual(331, 701).unwrap());
    assert_eq!(s.max_key().unwrap(), Some(331));
    let rec = s.get(331).unwrap().unwrap();
    assert_eq!(rec.term, 701);
    assert_eq!(rec.cmd, 88);
    assert_eq!(rec.data, data);
    s.remove(331).unwrap();
    assert!(!s.exists(331).unwrap());
}

#[test]
fn scenario_remove_after_n() {
    let mut s = store();
    for k in [332u64, 333, 334] {
        s.insert(k, 701, 88, b"d").unwrap();
    }
    assert_eq!(s.max_key().unwrap(), Some(334));
    s.remove_after_n(333).unwrap();
    assert!(s.exists(332).unwrap());
    assert!(!s.exists(333).unwrap());
    assert!(!s.exists(334).unwrap());
    assert_eq!(s.max_key().unwrap(), Some(332));
}

#[test]
fn scenario_navigation_prev_next() {
    let mut s = store();
    s.insert(332, 702, 88, b"d").unwrap();
    let prev = s.get_prev(333).unwrap().unwrap();
    assert_eq!((prev.id, prev.term, prev.cmd), (332, 702, 88));
    let next = s.get_next(331).unwrap().unwrap();
    assert_eq!((next.id, next.term, next.cmd), (332, 702, 88));
}

#[test]
fn scenario_schema_migration_from_empty() {
    let mut s = store();
    // Reach into the backend via a fresh raw connection-style migration
    // is not exposed on Store directly; exercise the migration runner the
    // way the adapter itself does, against an independent in-memory
    // connection, mirroring spec.md S:8 scenario 4.
    let mut conn = rusqlite::Connection::open_in_memory().unwrap();
    let migrations = vec![
        Migration::new(1, "CREATE TABLE users(id INTEGER PRIMARY KEY, name TEXT)"),
        Migration::new(2, "ALTER TABLE users ADD COLUMN email TEXT"),
    ];
    kvidxkit::migration::apply(&mut conn, &migrations, 2).unwrap();
    assert_eq!(kvidxkit::migration::current_version(&conn).unwrap(), 2);
    kvidxkit::migration::apply(&mut conn, &migrations, 2).unwrap();
    assert_eq!(kvidxkit::migration::current_version(&conn).unwrap(), 2);
    assert_eq!(kvidxkit::migration::applied_versions(&conn).unwrap(), vec![1, 2]);

    // keep the store instance alive so `s` isn't flagged unused
    assert!(!s.get(0).unwrap().is_some());
}

#[test]
fn scenario_sdl_column_emission() {
    use kvidxkit::schema::{emit_column_type, flags, ColumnDef};

    let id = ColumnDef::new("id", flags::INTEGER | flags::PRIMARY_KEY | flags::AUTOINCREMENT);
    assert_eq!(
        emit_column_type(&id).unwrap(),
        "id INTEGER PRIMARY KEY AUTOINCREMENT"
    );

    let uid = ColumnDef::new(
        "uid",
        flags::INTEGER | flags::REFERENCES | flags::CASCADE_DELETE | flags::DEFERRED,
    )
    .references("users");
    let text = emit_column_type(&uid).unwrap();
    assert!(text.contains("REFERENCES users"));
    assert!(text.contains("ON DELETE CASCADE"));
    assert!(text.contains("DEFERRABLE INITIALLY DEFERRED"));
}

#[test]
fn scenario_binary_round_trip_100_keys() {
    let mut s = store();
    let mut expected = Vec::new();
    for k in 0..100u64 {
        let term = k * 7 + 1;
        let cmd = k % 5;
        let data = vec![(k % 251) as u8; ((k % 40) + 1) as usize];
        s.insert(k, term, cmd, &data).unwrap();
        expected.push((k, term, cmd, data));
    }

    let bytes = s
        .export(0, u64::MAX, Format::Binary, Default::default(), None)
        .unwrap();

    // clear
    s.remove_range(0, u64::MAX, true, true).unwrap();
    assert_eq!(s.get_key_count().unwrap(), 0);

    let imported = s.import(&bytes, false, false, None).unwrap();
    assert_eq!(imported, 100);
    assert_eq!(s.count_range(0, u64::MAX).unwrap(), 100);

    for (k, term, cmd, data) in expected {
        let rec = s.get(k).unwrap().unwrap();
        assert_eq!(rec.term, term);
        assert_eq!(rec.cmd, cmd);
        assert_eq!(rec.data, data);
    }
}

#[test]
fn scenario_conditional_insert_and_cas() {
    let mut s = store();
    s.insert_nx(1, 0, 0, b"a").unwrap();
    assert!(s.insert_nx(1, 0, 0, b"b").is_err());
    assert_eq!(s.get(1).unwrap().unwrap().data, b"a");

    assert!(s.compare_and_swap(1, b"a", b"c").unwrap());
    assert_eq!(s.get(1).unwrap().unwrap().data, b"c");
    assert!(!s.compare_and_swap(1, b"a", b"d").unwrap());
}

#[test]
fn scenario_ttl_lifecycle() {
    let mut s = store();
    s.insert(1, 0, 0, b"v").unwrap();
    s.set_expire_at(1, 0).unwrap();
    let removed = s.expire_scan(0, None).unwrap();
    assert_eq!(removed, 1);
    assert!(s.get(1).unwrap().is_none());
}

#[test]
fn scenario_transaction_commit_and_abort() {
    let mut s = store();
    s.begin().unwrap();
    s.insert(1, 0, 0, b"v").unwrap();
    s.commit().unwrap();
    assert!(s.exists(1).unwrap());

    s.begin().unwrap();
    s.insert(2, 0, 0, b"v").unwrap();
    s.abort().unwrap();
    assert!(!s.exists(2).unwrap());
}

#[test]
fn scenario_batch_insert_with_filter() {
    let mut s = store();
    let entries = vec![
        kvidxkit::Record {
            id: 1,
            term: 0,
            cmd: 0,
            data: b"a".to_vec(),
        },
        kvidxkit::Record {
            id: 2,
            term: 0,
            cmd: 0,
            data: b"b".to_vec(),
        },
    ];
    let mut filter = |r: &kvidxkit::Record| r.id != 2;
    let inserted = s.insert_batch(&entries, Some(&mut filter)).unwrap();
    assert_eq!(inserted, 1);
    assert!(s.exists(1).unwrap());
    assert!(!s.exists(2).unwrap());
}

#[test]
fn scenario_store_migrate_and_update_config() {
    let mut s = store();
    // version 1 is consumed by the adapter's own bootstrap migration
    // (LOG + TTL table creation); caller-supplied migrations build on top
    // of it starting at version 2.
    let migrations = vec![Migration::new(
        2,
        "CREATE TABLE extra(id INTEGER PRIMARY KEY, note TEXT)",
    )];
    s.migrate(&migrations, 2).unwrap();
    // idempotent re-apply through the facade
    s.migrate(&migrations, 2).unwrap();

    s.update_config(Config {
        cache_size_bytes: 4 * 1024 * 1024,
        ..Config::default()
    })
    .unwrap();
    s.insert(1, 0, 0, b"v").unwrap();
    assert!(s.exists(1).unwrap());
}

#[test]
fn scenario_open_with_config_applies_pragmas() {
    let cfg = Config {
        cache_size_bytes: 8 * 1024 * 1024,
        ..Config::default()
    };
    let mut s = Store::open_with_config(":memory:", cfg).unwrap();
    s.insert(1, 0, 0, b"v").unwrap();
    assert!(s.exists(1).unwrap());
}

#[test]
fn scenario_insert_xx_condition_fails_on_absent_key() {
    let mut s = store();
    let err = s.insert_xx(1, 0, 0, b"v").unwrap_err();
    pretty_assert_eq!(s.last_error_message().as_deref(), Some(err.to_string().as_str()));
}

#[test]
fn scenario_on_disk_store_survives_close_and_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kvidx.sqlite3");

    let mut s = Store::open(&path).unwrap();
    s.insert(42, 7, 9, b"on-disk").unwrap();
    s.close().unwrap();
    drop(s);

    let mut reopened = Store::open(&path).unwrap();
    let rec = reopened.get(42).unwrap().unwrap();
    pretty_assert_eq!(rec.term, 7);
    pretty_assert_eq!(rec.cmd, 9);
    pretty_assert_eq!(rec.data, b"on-disk");
}
