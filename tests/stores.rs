mod common;

use talos_map::prelude::*;

#[test]
fn test_file_store_round_trip() {
    let dir = common::temp_dir("files");
    let store = FileStore::open(&dir).unwrap();
    store.set("talos.map.viewState.valley-iv", "{\"lat\":1}").unwrap();
    store.set("map-collected-markers/VL_1_001", "{}").unwrap();
    store.set("map-collected-markers/VL_1_002", "{}").unwrap();

    assert_eq!(
        store.get("talos.map.viewState.valley-iv").unwrap().as_deref(),
        Some("{\"lat\":1}")
    );
    assert_eq!(
        store.keys_with_prefix("map-collected-markers/").unwrap(),
        vec!["map-collected-markers/VL_1_001", "map-collected-markers/VL_1_002"]
    );
    assert!(store.remove("map-collected-markers/VL_1_001").unwrap());
    assert!(!store.remove("map-collected-markers/VL_1_001").unwrap());
    store.clear_prefix("map-collected-markers/").unwrap();
    assert!(store.keys_with_prefix("map-collected-markers/").unwrap().is_empty());
    assert!(store.get("talos.map.viewState.valley-iv").unwrap().is_some());

    std::fs::remove_dir_all(&dir).unwrap();
}

#[tokio::test]
async fn test_collection_moves_between_installs() {
    let mut first = common::session(Arc::new(MemoryStore::new()));
    first.set_collected("VL_1_001", true).unwrap();
    first.set_collected("VL_1_009", true).unwrap();
    let exported = first.export_collection().unwrap();

    let mut second = common::session(Arc::new(MemoryStore::new()));
    second.set_collected("WL_1_001", true).unwrap();
    assert_eq!(second.import_collection(&exported).unwrap(), 2);
    assert_eq!(
        second.collection().collected_ids(),
        vec!["VL_1_001", "VL_1_009", "WL_1_001"]
    );

    assert!(matches!(
        second.import_collection("not json"),
        Err(MapError::Import(_))
    ));
    assert_eq!(second.collection().collected_count(), 3);
}

#[tokio::test]
async fn test_filters_persist_through_file_store() {
    let dir = common::temp_dir("filters");
    {
        let mut session = common::session(Arc::new(FileStore::open(&dir).unwrap()));
        session.clear_all_types().unwrap();
        session.select_category("mob").unwrap();
        session.set_hide_collected(true).unwrap();
    }

    let mut session = common::session(Arc::new(FileStore::open(&dir).unwrap()));
    assert!(session.filters().hide_collected());
    assert!(session.filters().is_type_active("blight_crab"));
    assert!(!session.filters().is_type_active("pink_bolete_spot"));

    session.select_region("valley-iv").await.unwrap();
    let crabs = session
        .index()
        .get_marker_ids_for_region_and_type("valley-iv", "blight_crab")
        .len();
    assert!(crabs > 0);
    assert_eq!(
        session
            .markers()
            .visible_marker_count(session.core().map()),
        session
            .filters()
            .active_types()
            .iter()
            .map(|t| session.index().get_marker_ids_for_region_and_type("valley-iv", t).len())
            .sum::<usize>()
    );

    std::fs::remove_dir_all(&dir).unwrap();
}
