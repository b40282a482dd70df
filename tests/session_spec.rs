mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use common::{
    child_of, explorer, item, memory_db, offline_explorer, rendered, FailingStore, FakeAi,
    SlowLeafStore, View,
};
use teardown::ai::AiCapability;
use teardown::db::ItemStore;
use teardown::error::ExploreError;
use teardown::models::*;
use teardown::session::Explorer;
use teardown::tree;

fn car_ai() -> Arc<FakeAi> {
    let ai = FakeAi::new();
    ai.with_parts("Car", &["Engine", "Wheel", "Chassis", "Seat", "Door"]);
    ai
}

fn names(items: &[Item]) -> Vec<String> {
    items.iter().map(|i| i.name.clone()).collect()
}

mod exploring {
    use super::*;

    #[tokio::test]
    async fn car_then_engine_builds_a_two_level_tree() {
        let ai = car_ai();
        let (explorer, db) = explorer(&ai, GenerationMode::Fast).await;

        let car = explorer.explore("Car", None, None).await.expect("explore Car failed");
        assert_eq!(car.root_id, car.id);
        assert_eq!(car.depth, 0);
        assert_eq!(names(&explorer.history()), vec!["Car"]);

        let engine = explorer
            .explore("Engine", Some(car.id), None)
            .await
            .expect("explore Engine failed");

        assert_eq!(ai.last_query().as_deref(), Some("Engine from Car"));
        assert_eq!(engine.name, "Engine");
        assert_eq!(engine.parent_id, Some(car.id));
        assert_eq!(engine.root_id, car.id);
        assert_eq!(engine.depth, 1);
        assert_eq!(names(&explorer.history()), vec!["Car", "Engine"]);
        assert_eq!(explorer.current_item().map(|i| i.id), Some(engine.id));
        assert_eq!(explorer.status().stage, GenerationStage::Complete);

        let collection = explorer.collection();
        assert_eq!(collection.len(), 1);
        assert_eq!(collection[0].children[0].id, engine.id);

        explorer.settle().await;
        let stored = db.get(car.id).expect("Query failed").expect("Car not stored");
        assert!(tree::contains(&stored, engine.id));
        assert!(tree::validate(&stored).is_ok());
    }

    #[tokio::test]
    async fn history_and_current_item_agree() {
        let ai = car_ai();
        let (explorer, _db) = explorer(&ai, GenerationMode::Fast).await;

        let car = explorer.explore("Car", None, None).await.unwrap();
        let engine = explorer.explore("Engine", Some(car.id), None).await.unwrap();
        let piston = explorer.explore("Piston", Some(engine.id), None).await.unwrap();

        let state = explorer.snapshot();
        assert_eq!(state.history.last(), state.current_item.as_ref());
        assert_eq!(state.history[0].id, car.id);
        assert_eq!(piston.depth, 2);
        assert_eq!(ai.last_query().as_deref(), Some("Piston from Car Engine"));
    }

    #[tokio::test]
    async fn full_mode_stores_three_views() {
        let ai = car_ai();
        let (explorer, _db) = explorer(&ai, GenerationMode::Full).await;

        let car = explorer.explore("Car", None, None).await.unwrap();

        let images = car.images.expect("images missing");
        assert_eq!(images.assembled, Some(rendered(View::Assembled)));
        assert_eq!(images.cutaway, Some(rendered(View::Cutaway)));
        assert_eq!(images.exploded, Some(rendered(View::Exploded)));
    }

    #[tokio::test]
    async fn fast_mode_stores_only_the_exploded_view() {
        let ai = car_ai();
        let (explorer, _db) = explorer(&ai, GenerationMode::Fast).await;

        let car = explorer.explore("Car", None, None).await.unwrap();

        let images = car.images.expect("images missing");
        assert!(images.assembled.is_none());
        assert!(images.cutaway.is_none());
        assert!(images.exploded.is_some());
    }

    #[tokio::test]
    async fn reference_image_names_the_root() {
        let ai = FakeAi::new();
        ai.identifies_as("Espresso Machine");
        let (explorer, _db) = explorer(&ai, GenerationMode::Fast).await;

        let photo = Image::from_bytes("image/jpeg", b"photo");
        let item = explorer.explore("", None, Some(photo)).await.unwrap();

        assert_eq!(item.name, "Espresso Machine");
        assert!(item.is_root());
    }

    #[tokio::test]
    async fn failure_keeps_the_previous_view() {
        let ai = car_ai();
        let (explorer, _db) = explorer(&ai, GenerationMode::Fast).await;
        let car = explorer.explore("Car", None, None).await.unwrap();

        ai.fail_analysis();
        let result = explorer.explore("Wheel", Some(car.id), None).await;

        assert!(matches!(result, Err(ExploreError::AnalysisFailed(_))));
        assert_eq!(explorer.current_item().map(|i| i.id), Some(car.id));
        assert_eq!(names(&explorer.history()), vec!["Car"]);
        let status = explorer.status();
        assert_eq!(status.stage, GenerationStage::Error);
        assert!(status.message.contains("missing field"));
        assert!(explorer.collection()[0].children.is_empty());
    }

    #[tokio::test]
    async fn unknown_parent_is_not_found() {
        let ai = car_ai();
        let (explorer, _db) = explorer(&ai, GenerationMode::Fast).await;

        let missing = uuid::Uuid::new_v4();
        let result = explorer.explore("Engine", Some(missing), None).await;

        assert!(matches!(result, Err(ExploreError::NotFound(id)) if id == missing));
        assert_eq!(ai.calls(), 0);
    }
}

mod memory {
    use super::*;

    #[tokio::test]
    async fn query_containing_a_child_name_reuses_the_child() {
        let ai = car_ai();
        let (explorer, _db) = explorer(&ai, GenerationMode::Fast).await;
        let car = explorer.explore("Car", None, None).await.unwrap();
        let engine = explorer.explore("Engine", Some(car.id), None).await.unwrap();
        explorer.navigate_to(car.id).unwrap();
        let calls = ai.calls();

        let hit = explorer.explore("V8 Engine", Some(car.id), None).await.unwrap();

        assert_eq!(hit.id, engine.id);
        assert_eq!(ai.calls(), calls);
        assert_eq!(names(&explorer.history()), vec!["Car", "Engine"]);
        assert_eq!(explorer.status().stage, GenerationStage::Complete);
    }

    #[tokio::test]
    async fn child_name_containing_the_query_reuses_the_child() {
        let ai = FakeAi::new();
        let (explorer, _db) = explorer(&ai, GenerationMode::Fast).await;
        let avocado = explorer.explore("Avocado", None, None).await.unwrap();
        let seed = explorer
            .explore("Avocado Seed", Some(avocado.id), None)
            .await
            .unwrap();
        assert_eq!(ai.last_query().as_deref(), Some("Avocado Seed"));
        let calls = ai.calls();

        let hit = explorer.explore("seed", Some(avocado.id), None).await.unwrap();

        assert_eq!(hit.id, seed.id);
        assert_eq!(ai.calls(), calls);
    }

    #[tokio::test]
    async fn only_direct_children_are_reused() {
        let ai = car_ai();
        let (explorer, _db) = explorer(&ai, GenerationMode::Fast).await;
        let car = explorer.explore("Car", None, None).await.unwrap();
        let engine = explorer.explore("Engine", Some(car.id), None).await.unwrap();
        explorer.explore("Piston", Some(engine.id), None).await.unwrap();
        let calls = ai.analyze_calls.load(Ordering::SeqCst);

        let piston_under_car = explorer.explore("Piston", Some(car.id), None).await.unwrap();

        assert_eq!(ai.analyze_calls.load(Ordering::SeqCst), calls + 1);
        assert_eq!(piston_under_car.parent_id, Some(car.id));
    }

    #[tokio::test]
    async fn stored_trees_answer_while_offline() {
        let db = memory_db();
        let car = item("Car");
        let engine = child_of(&car, "Engine");
        let engine_id = engine.id;
        db.put(&tree::attach_child(&car, car.id, engine)).unwrap();

        let explorer = offline_explorer(db).await;
        assert!(explorer.is_offline());

        let hit = explorer.explore("Engine", Some(car.id), None).await.unwrap();
        assert_eq!(hit.id, engine_id);
        assert_eq!(names(&explorer.history()), vec!["Car", "Engine"]);
    }

    #[tokio::test]
    async fn offline_misses_are_blocked() {
        let db = memory_db();
        let car = item("Car");
        db.put(&car).unwrap();
        let explorer = offline_explorer(db).await;

        let child = explorer.explore("Wheel", Some(car.id), None).await;
        assert!(matches!(child, Err(ExploreError::OfflineBlocked)));
        assert_eq!(explorer.status().stage, GenerationStage::Error);

        let root = explorer.explore("Lamp", None, None).await;
        assert!(matches!(root, Err(ExploreError::OfflineBlocked)));
        assert_eq!(explorer.collection().len(), 1);
    }

    #[tokio::test]
    async fn connecting_a_capability_leaves_offline_mode() {
        let explorer = offline_explorer(memory_db()).await;
        assert!(explorer.explore("Car", None, None).await.is_err());

        let ai: Arc<dyn AiCapability> = car_ai();
        explorer.set_capability(Some(ai));

        assert!(!explorer.is_offline());
        assert!(explorer.explore("Car", None, None).await.is_ok());
    }
}

mod concurrency {
    use super::*;

    #[tokio::test]
    async fn second_explore_is_rejected_while_one_is_running() {
        let ai = car_ai();
        let (explorer, _db) = explorer(&ai, GenerationMode::Fast).await;
        let gate = ai.hold_analysis();

        let running = {
            let explorer = explorer.clone();
            tokio::spawn(async move { explorer.explore("Car", None, None).await })
        };
        while !explorer.is_generating() || ai.analyze_calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        let second = explorer.explore("Lamp", None, None).await;
        assert!(matches!(second, Err(ExploreError::Busy)));
        assert_eq!(explorer.status().stage, GenerationStage::Analyzing);

        gate.notify_one();
        let car = running.await.unwrap().expect("first explore failed");
        assert_eq!(car.name, "Car");
        assert!(!explorer.is_generating());
        assert_eq!(ai.analyze_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn navigation_works_while_generating() {
        let ai = car_ai();
        let (explorer, _db) = explorer(&ai, GenerationMode::Fast).await;
        let car = explorer.explore("Car", None, None).await.unwrap();
        let gate = ai.hold_analysis();

        let running = {
            let explorer = explorer.clone();
            let car_id = car.id;
            tokio::spawn(async move { explorer.explore("Wheel", Some(car_id), None).await })
        };
        while !explorer.is_generating() {
            tokio::task::yield_now().await;
        }

        assert_eq!(explorer.navigate_to(car.id).unwrap().id, car.id);

        gate.notify_one();
        running.await.unwrap().expect("explore failed");
    }

    #[tokio::test]
    async fn subscribers_see_the_final_status() {
        let ai = car_ai();
        let (explorer, _db) = explorer(&ai, GenerationMode::Fast).await;
        let mut status = explorer.subscribe();

        explorer.explore("Car", None, None).await.unwrap();

        assert!(status.has_changed().unwrap());
        assert_eq!(status.borrow_and_update().stage, GenerationStage::Complete);
    }
}

mod collection {
    use super::*;

    #[tokio::test]
    async fn deleting_the_active_root_resets_the_session() {
        let ai = car_ai();
        let (explorer, db) = explorer(&ai, GenerationMode::Fast).await;
        let car = explorer.explore("Car", None, None).await.unwrap();

        assert!(explorer.remove_exploration(car.id).await);

        assert!(explorer.current_item().is_none());
        assert!(explorer.history().is_empty());
        assert!(explorer.collection().is_empty());
        assert_eq!(explorer.status().stage, GenerationStage::Idle);
        explorer.settle().await;
        assert!(db.get(car.id).unwrap().is_none());
    }

    #[tokio::test]
    async fn deleting_another_root_keeps_the_session() {
        let ai = car_ai();
        let (explorer, db) = explorer(&ai, GenerationMode::Fast).await;
        let lamp = explorer.explore("Lamp", None, None).await.unwrap();
        let car = explorer.explore("Car", None, None).await.unwrap();

        assert!(explorer.remove_exploration(lamp.id).await);

        assert_eq!(explorer.current_item().map(|i| i.id), Some(car.id));
        assert_eq!(names(&explorer.collection()), vec!["Car"]);
        explorer.settle().await;
        assert!(db.get(lamp.id).unwrap().is_none());
        assert!(db.get(car.id).unwrap().is_some());
    }

    #[tokio::test]
    async fn deleting_an_unknown_root_reports_false() {
        let ai = car_ai();
        let (explorer, _db) = explorer(&ai, GenerationMode::Fast).await;
        assert!(!explorer.remove_exploration(uuid::Uuid::new_v4()).await);
    }

    #[tokio::test]
    async fn reset_keeps_the_collection() {
        let ai = car_ai();
        let (explorer, _db) = explorer(&ai, GenerationMode::Fast).await;
        explorer.explore("Car", None, None).await.unwrap();

        explorer.reset();

        assert!(explorer.current_item().is_none());
        assert_eq!(explorer.collection().len(), 1);
        assert_eq!(explorer.status(), GenerationStatus::idle());
    }

    #[tokio::test]
    async fn parts_of_a_closed_exploration_can_still_be_explored() {
        let ai = car_ai();
        let (explorer, _db) = explorer(&ai, GenerationMode::Fast).await;
        let car = explorer.explore("Car", None, None).await.unwrap();
        explorer.explore("Lamp", None, None).await.unwrap();

        let engine = explorer.explore("Engine", Some(car.id), None).await.unwrap();

        assert_eq!(engine.root_id, car.id);
        assert_eq!(names(&explorer.history()), vec!["Car", "Engine"]);
        assert_eq!(explorer.collection()[0].id, car.id);
    }

    #[tokio::test]
    async fn open_exploration_starts_at_the_root() {
        let ai = car_ai();
        let (explorer, _db) = explorer(&ai, GenerationMode::Fast).await;
        let car = explorer.explore("Car", None, None).await.unwrap();
        explorer.explore("Engine", Some(car.id), None).await.unwrap();
        explorer.reset();

        let opened = explorer.open_exploration(car.id).unwrap();

        assert_eq!(opened.id, car.id);
        assert_eq!(names(&explorer.history()), vec!["Car"]);
        assert!(matches!(
            explorer.open_exploration(uuid::Uuid::new_v4()),
            Err(ExploreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn loading_keeps_children_explored_since_the_root_was_listed() {
        let ai = car_ai();
        let (explorer, db) = explorer(&ai, GenerationMode::Fast).await;
        let car = explorer.explore("Car", None, None).await.unwrap();
        explorer.explore("Engine", Some(car.id), None).await.unwrap();
        explorer.settle().await;
        explorer.reset();

        let opened = explorer.load_exploration(car.id).unwrap();
        assert_eq!(names(&opened.children), vec!["Engine"]);

        explorer.explore("Wheel", Some(car.id), None).await.unwrap();
        explorer.settle().await;

        let stored = db.get(car.id).unwrap().expect("Car should be stored");
        assert_eq!(names(&stored.children), vec!["Engine", "Wheel"]);
    }

    #[tokio::test]
    async fn loading_a_descendant_opens_its_tree_there() {
        let ai = car_ai();
        let (explorer, _db) = explorer(&ai, GenerationMode::Fast).await;
        let car = explorer.explore("Car", None, None).await.unwrap();
        let engine = explorer.explore("Engine", Some(car.id), None).await.unwrap();
        explorer.reset();
        let collection = explorer.collection();

        let opened = explorer.load_exploration(engine.id).unwrap();

        assert_eq!(opened.id, engine.id);
        assert_eq!(names(&explorer.history()), vec!["Car", "Engine"]);
        assert_eq!(explorer.collection(), collection);
        assert!(matches!(
            explorer.load_exploration(uuid::Uuid::new_v4()),
            Err(ExploreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn collection_is_loaded_from_storage() {
        let db = memory_db();
        db.bulk_put(&[item("Car"), item("Lamp")]).unwrap();

        let explorer = offline_explorer(db).await;

        assert_eq!(explorer.collection().len(), 2);
        assert!(explorer.current_item().is_none());
    }
}

mod import_export {
    use super::*;

    #[tokio::test]
    async fn import_adds_to_the_collection_and_imported_roots_win() {
        let db = memory_db();
        let a = item("A");
        let b = item("B");
        db.bulk_put(&[a.clone(), b.clone()]).unwrap();
        let explorer = offline_explorer(db.clone()).await;

        let mut b_imported = b.clone();
        b_imported.description = "imported".to_string();
        let c = item("C");
        let count = explorer.import_all(vec![b_imported, c.clone()]).await.unwrap();

        assert_eq!(count, 2);
        let collection = explorer.collection();
        assert_eq!(collection.len(), 3);
        for id in [a.id, b.id, c.id] {
            assert!(collection.iter().any(|root| root.id == id));
        }
        let b_now = collection.iter().find(|root| root.id == b.id).unwrap();
        assert_eq!(b_now.description, "imported");
        assert_eq!(db.get_all().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn export_then_import_into_a_fresh_store() {
        let ai = car_ai();
        let (source, _db) = explorer(&ai, GenerationMode::Fast).await;
        let car = source.explore("Car", None, None).await.unwrap();
        source.explore("Engine", Some(car.id), None).await.unwrap();
        let json = source.export_json().unwrap();

        let target = offline_explorer(memory_db()).await;
        assert_eq!(target.import_json(&json).await.unwrap(), 1);

        assert_eq!(target.collection(), source.export_all());
    }

    #[tokio::test]
    async fn malformed_payload_changes_nothing() {
        let db = memory_db();
        db.put(&item("A")).unwrap();
        let explorer = offline_explorer(db).await;

        for payload in ["not json", r#"{"id": "x"}"#, r#"[{"name": "missing fields"}]"#] {
            let result = explorer.import_json(payload).await;
            assert!(
                matches!(result, Err(ExploreError::ImportMalformed(_))),
                "{} should be rejected",
                payload
            );
        }
        assert_eq!(names(&explorer.collection()), vec!["A"]);
    }

    #[tokio::test]
    async fn ids_shared_between_imported_trees_are_rejected() {
        let explorer = offline_explorer(memory_db()).await;
        let car = item("Car");
        let engine = child_of(&car, "Engine");
        let engine_id = engine.id;
        let car = tree::attach_child(&car, car.id, engine);
        let lamp = item("Lamp");
        let mut bulb = child_of(&lamp, "Bulb");
        bulb.id = engine_id;
        let lamp = tree::attach_child(&lamp, lamp.id, bulb);

        let result = explorer.import_all(vec![car, lamp]).await;

        assert!(matches!(result, Err(ExploreError::ImportMalformed(_))));
        assert!(explorer.collection().is_empty());
    }

    #[tokio::test]
    async fn ids_used_by_a_stored_tree_are_rejected() {
        let car = item("Car");
        let engine = child_of(&car, "Engine");
        let engine_id = engine.id;
        let car = tree::attach_child(&car, car.id, engine);
        let db = memory_db();
        db.put(&car).unwrap();
        let explorer = offline_explorer(db.clone()).await;

        let lamp = item("Lamp");
        let mut bulb = child_of(&lamp, "Bulb");
        bulb.id = engine_id;
        let lamp = tree::attach_child(&lamp, lamp.id, bulb);
        let result = explorer.import_all(vec![lamp]).await;

        assert!(matches!(result, Err(ExploreError::ImportMalformed(_))));
        assert_eq!(names(&explorer.collection()), vec!["Car"]);
        assert_eq!(db.get_all().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn reimporting_an_export_replaces_the_same_roots() {
        let ai = car_ai();
        let (explorer, _db) = explorer(&ai, GenerationMode::Fast).await;
        let car = explorer.explore("Car", None, None).await.unwrap();
        explorer.explore("Engine", Some(car.id), None).await.unwrap();
        let json = explorer.export_json().unwrap();

        assert_eq!(explorer.import_json(&json).await.unwrap(), 1);
        assert_eq!(explorer.collection().len(), 1);
    }

    #[tokio::test]
    async fn an_inconsistent_tree_rejects_the_whole_import() {
        let explorer = offline_explorer(memory_db()).await;
        let car = item("Car");
        let mut engine = child_of(&car, "Engine");
        engine.depth = 5;
        let broken = tree::attach_child(&car, car.id, engine);

        let result = explorer.import_all(vec![item("Lamp"), broken]).await;

        assert!(matches!(result, Err(ExploreError::ImportMalformed(_))));
        assert!(explorer.collection().is_empty());
    }
}

mod persistence {
    use super::*;

    #[tokio::test]
    async fn saves_of_one_root_land_in_order() {
        let ai = car_ai();
        let capability: Arc<dyn AiCapability> = ai.clone();
        let db = memory_db();
        let explorer = Explorer::open(
            Arc::new(SlowLeafStore { db: db.clone() }),
            Some(capability),
            GenerationConfig::with_mode(GenerationMode::Fast),
        )
        .await;

        let car = explorer.explore("Car", None, None).await.unwrap();
        explorer.explore("Engine", Some(car.id), None).await.unwrap();
        explorer.settle().await;

        let stored = db.get(car.id).unwrap().expect("Car should be stored");
        assert_eq!(names(&stored.children), vec!["Engine"]);
    }

    #[tokio::test]
    async fn failed_saves_do_not_undo_the_exploration() {
        let ai = car_ai();
        let capability: Arc<dyn AiCapability> = ai.clone();
        let explorer = Explorer::open(
            Arc::new(FailingStore),
            Some(capability),
            GenerationConfig::with_mode(GenerationMode::Fast),
        )
        .await;

        let car = explorer.explore("Car", None, None).await.expect("explore failed");
        explorer.settle().await;

        assert_eq!(explorer.current_item().map(|i| i.id), Some(car.id));
        assert_eq!(explorer.collection().len(), 1);
        assert_eq!(explorer.status().stage, GenerationStage::Complete);
    }
}
