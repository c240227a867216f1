use postrank_core::{
    MemoryScoreStore, OrderedScoreStore, RangeQuery, SqliteScoreStore, StoreError, Transaction,
};

fn incr_starts_from_zero_and_accumulates(store: &dyn OrderedScoreStore) {
    assert_eq!(store.incr_score("scores", "1", 432.0).unwrap(), 432.0);
    assert_eq!(store.incr_score("scores", "1", -864.0).unwrap(), -432.0);
    assert_eq!(store.score("scores", "1").unwrap(), Some(-432.0));
}

fn commit_is_all_or_nothing(store: &dyn OrderedScoreStore) {
    store.set_score("voters", "alice", 1.0).unwrap();

    let stale = Transaction::new()
        .watch("voters", "alice", None)
        .incr_score("scores", "1", 432.0)
        .add_to_set("community:1", "1");
    assert!(matches!(store.commit(&stale).unwrap_err(), StoreError::Conflict));
    assert_eq!(store.score("scores", "1").unwrap(), None);
    assert!(store.set_members("community:1").unwrap().is_empty());

    let fresh = Transaction::new()
        .watch("voters", "alice", Some(1.0))
        .incr_score("scores", "1", -864.0)
        .set_score("voters", "alice", -1.0)
        .add_to_set("community:1", "1");
    store.commit(&fresh).unwrap();
    assert_eq!(store.score("scores", "1").unwrap(), Some(-864.0));
    assert_eq!(store.score("voters", "alice").unwrap(), Some(-1.0));
    assert_eq!(store.set_members("community:1").unwrap(), vec!["1".to_string()]);
}

fn ordered_reads_and_counts(store: &dyn OrderedScoreStore) {
    for (member, score) in [("a", 3.0), ("b", 1.0), ("c", 3.0), ("d", -1.0)] {
        store.set_score("k", member, score).unwrap();
    }

    let asc = store.range_by_score("k", RangeQuery::default()).unwrap();
    let asc: Vec<&str> = asc.iter().map(|entry| entry.member.as_str()).collect();
    assert_eq!(asc, vec!["d", "b", "a", "c"]);

    let page = store
        .range_by_score(
            "k",
            RangeQuery {
                descending: true,
                limit: Some(2),
                offset: 1,
            },
        )
        .unwrap();
    let page: Vec<&str> = page.iter().map(|entry| entry.member.as_str()).collect();
    assert_eq!(page, vec!["c", "b"]);

    assert_eq!(store.count_by_score("k", 3.0, 3.0).unwrap(), 2);
    assert_eq!(store.count_by_score("k", -1.0, 1.0).unwrap(), 2);
    assert!(store.remove_member("k", "a").unwrap());
    assert!(!store.remove_member("k", "a").unwrap());
}

fn set_membership_is_deduplicated(store: &dyn OrderedScoreStore) {
    store.add_to_set("s", "2").unwrap();
    store.add_to_set("s", "1").unwrap();
    store.add_to_set("s", "2").unwrap();
    assert_eq!(
        store.set_members("s").unwrap(),
        vec!["1".to_string(), "2".to_string()]
    );
}

#[test]
fn memory_store_contract() {
    incr_starts_from_zero_and_accumulates(&MemoryScoreStore::new());
    commit_is_all_or_nothing(&MemoryScoreStore::new());
    ordered_reads_and_counts(&MemoryScoreStore::new());
    set_membership_is_deduplicated(&MemoryScoreStore::new());
}

#[test]
fn sqlite_store_contract() {
    incr_starts_from_zero_and_accumulates(&SqliteScoreStore::open_in_memory().unwrap());
    commit_is_all_or_nothing(&SqliteScoreStore::open_in_memory().unwrap());
    ordered_reads_and_counts(&SqliteScoreStore::open_in_memory().unwrap());
    set_membership_is_deduplicated(&SqliteScoreStore::open_in_memory().unwrap());
}

#[test]
fn sqlite_store_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scores.db");

    {
        let store = SqliteScoreStore::open(&path).unwrap();
        store
            .commit(&Transaction::new().set_score("k", "m", 7.0).add_to_set("s", "m"))
            .unwrap();
    }

    let reopened = SqliteScoreStore::open(&path).unwrap();
    assert_eq!(reopened.score("k", "m").unwrap(), Some(7.0));
    assert_eq!(reopened.set_members("s").unwrap(), vec!["m".to_string()]);
}
