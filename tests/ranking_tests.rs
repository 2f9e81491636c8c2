mod common;

use common::*;

#[tokio::test]
async fn test_same_day_crossing_goes_to_first_logged() {
    let engine = engine_at("2024-01-01");
    let challenge = challenge(&engine, 21.0).await;
    let plan = cash("50", "2024-06-01");
    let ana = athlete(&engine, challenge, "Ana", &plan).await;
    let bia = athlete(&engine, challenge, "Bia", &plan).await;

    engine.record_activity(OWNER, ana, "2024-04-01", 10.0, None).await.unwrap();
    engine.record_activity(OWNER, bia, "2024-04-01", 10.0, None).await.unwrap();
    engine.record_activity(OWNER, bia, "2024-04-07", 11.0, None).await.unwrap();
    engine.record_activity(OWNER, ana, "2024-04-07", 11.0, None).await.unwrap();

    let standings = engine.ranking(OWNER, challenge).await.unwrap();
    let order: Vec<u64> = standings.iter().map(|s| s.athlete_id).collect();
    assert_eq!(order, [bia, ana]);
    assert!(standings.iter().all(|s| s.total_km == 21.0));
}

#[tokio::test]
async fn test_backdated_activity_can_claim_earlier_crossing() {
    let engine = engine_at("2024-01-01");
    let challenge = challenge(&engine, 10.0).await;
    let plan = cash("50", "2024-06-01");
    let ana = athlete(&engine, challenge, "Ana", &plan).await;
    let bia = athlete(&engine, challenge, "Bia", &plan).await;

    engine.record_activity(OWNER, ana, "2024-04-05", 10.0, None).await.unwrap();
    engine.record_activity(OWNER, bia, "2024-04-02", 10.0, None).await.unwrap();

    let standings = engine.ranking(OWNER, challenge).await.unwrap();
    assert_eq!(standings[0].athlete_id, bia);
    assert_eq!(
        standings[0].goal_reached.map(|m| m.date.to_string()),
        Some("2024-04-02".to_string())
    );
}

#[tokio::test]
async fn test_idle_athletes_rank_last_in_creation_order() {
    let engine = engine_at("2024-01-01");
    let challenge = challenge(&engine, 0.0).await;
    let plan = cash("50", "2024-06-01");
    let carla = athlete(&engine, challenge, "Carla", &plan).await;
    let ana = athlete(&engine, challenge, "Ana", &plan).await;
    let runner = athlete(&engine, challenge, "Runner", &plan).await;

    engine.record_activity(OWNER, runner, "2024-02-01", 1.0, None).await.unwrap();

    let standings = engine.ranking(OWNER, challenge).await.unwrap();
    let order: Vec<u64> = standings.iter().map(|s| s.athlete_id).collect();
    assert_eq!(order, [runner, carla, ana]);
    assert!(standings.iter().all(|s| s.goal_reached.is_none()));
}

#[tokio::test]
async fn test_deleted_athlete_leaves_standings_and_totals() {
    let engine = engine_at("2024-01-01");
    let challenge = challenge(&engine, 100.0).await;
    let plan = cash("50", "2024-06-01");
    let ana = athlete(&engine, challenge, "Ana", &plan).await;
    let bia = athlete(&engine, challenge, "Bia", &plan).await;
    engine.record_activity(OWNER, ana, "2024-02-01", 40.0, None).await.unwrap();
    engine.record_activity(OWNER, bia, "2024-02-01", 20.0, None).await.unwrap();
    assert_eq!(engine.progress(OWNER, challenge).await.unwrap().percent, 60.0);

    engine.delete_athlete(OWNER, challenge, ana).await.unwrap();

    let standings = engine.ranking(OWNER, challenge).await.unwrap();
    assert_eq!(standings.len(), 1);
    assert_eq!(standings[0].athlete_id, bia);
    assert_eq!(engine.progress(OWNER, challenge).await.unwrap().total_km, 20.0);
    let listed = engine.list_challenges(OWNER).await.unwrap();
    assert_eq!(listed[0].athletes_count, 1);
}
