use chrono::TimeDelta;

use engine::{EngineError, IntervalState, PlanAction, plans};

mod common;

use common::{engine_with_db, register, t0};

const ORIGIN: &str = "Remote: 127.0.0.1, Request-ID: test";

fn pro() -> plans::Model {
    plans::Model {
        id: "pro".to_string(),
        name: "Pro".to_string(),
        block_quota: 100 * 1024 * 1024 * 1024,
        monthly_traffic_quota: 1024 * 1024 * 1024 * 1024,
    }
}

fn plus() -> plans::Model {
    plans::Model {
        id: "plus".to_string(),
        name: "Plus".to_string(),
        block_quota: 20 * 1024 * 1024 * 1024,
        monthly_traffic_quota: 200 * 1024 * 1024 * 1024,
    }
}

#[tokio::test]
async fn new_accounts_fall_back_to_free_plan() {
    let (engine, _db, _mailer) = engine_with_db().await;
    let registered = register(&engine, "alice").await;

    let status = engine.account_status(&registered.user, t0()).await.unwrap();
    assert_eq!(status.user_id, registered.user.id);
    assert!(status.active);
    assert_eq!(status.plan.id, "free");
    assert_eq!(status.plan.block_quota, 2 * 1024 * 1024 * 1024);
}

#[tokio::test]
async fn create_plan_rejects_duplicates() {
    let (engine, _db, _mailer) = engine_with_db().await;
    engine.create_plan(pro()).await.unwrap();
    let err = engine.create_plan(pro()).await.unwrap_err();
    assert_eq!(err, EngineError::ExistingKey("pro".to_string()));

    let ids: Vec<_> = engine
        .plans()
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.id)
        .collect();
    assert_eq!(ids, vec!["free".to_string(), "pro".to_string()]);
}

#[tokio::test]
async fn subscription_changes_plan_and_is_audited() {
    let (engine, _db, _mailer) = engine_with_db().await;
    engine.create_plan(pro()).await.unwrap();
    let registered = register(&engine, "alice").await;

    engine
        .subscribe("Alice@Example.com", "pro", ORIGIN, t0())
        .await
        .unwrap();

    let profile = engine.profile(registered.user.id).await.unwrap();
    assert_eq!(profile.subscribed_plan.as_deref(), Some("pro"));

    let log = engine.plan_log(registered.user.id).await.unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].action, PlanAction::SetPlan.as_str());
    assert_eq!(log[0].plan_id.as_deref(), Some("pro"));
    assert_eq!(log[0].origin, ORIGIN);

    let status = engine.account_status(&registered.user, t0()).await.unwrap();
    assert_eq!(status.plan.id, "pro");
}

#[tokio::test]
async fn subscription_validates_email_and_plan() {
    let (engine, _db, _mailer) = engine_with_db().await;
    let err = engine
        .subscribe("nobody@example.com", "gold", ORIGIN, t0())
        .await
        .unwrap_err();
    let EngineError::Validation(fields) = err else {
        panic!("expected validation error");
    };
    assert!(fields.contains_key("user_email"));
    assert!(fields.contains_key("plan"));
}

#[tokio::test]
async fn add_interval_rejects_bad_duration() {
    let (engine, _db, _mailer) = engine_with_db().await;
    engine.create_plan(pro()).await.unwrap();
    register(&engine, "alice").await;

    let err = engine
        .add_interval("alice@example.com", "pro", "forever", ORIGIN, t0())
        .await
        .unwrap_err();
    let EngineError::Validation(fields) = err else {
        panic!("expected validation error");
    };
    assert_eq!(fields.keys().collect::<Vec<_>>(), vec!["duration"]);
}

#[tokio::test]
async fn intervals_run_one_after_another() {
    let (engine, _db, _mailer) = engine_with_db().await;
    engine.create_plan(pro()).await.unwrap();
    engine.create_plan(plus()).await.unwrap();
    let registered = register(&engine, "alice").await;
    let user_id = registered.user.id;

    let first = engine
        .add_interval("alice@example.com", "pro", "2 00:00:00", ORIGIN, t0())
        .await
        .unwrap();
    assert_eq!(first.duration, 2 * 86_400);
    assert_eq!(first.state, IntervalState::Waiting.as_str());
    engine
        .add_interval("alice@example.com", "plus", "1 00:00:00", ORIGIN, t0())
        .await
        .unwrap();

    // First check starts the oldest waiting interval.
    let status = engine.account_status(&registered.user, t0()).await.unwrap();
    assert_eq!(status.plan.id, "pro");

    // Still running a day later.
    let day1 = t0() + TimeDelta::days(1);
    let status = engine.account_status(&registered.user, day1).await.unwrap();
    assert_eq!(status.plan.id, "pro");

    // After two days the first expires and the second takes over.
    let day2 = t0() + TimeDelta::days(2);
    let status = engine.account_status(&registered.user, day2).await.unwrap();
    assert_eq!(status.plan.id, "plus");

    let intervals = engine.intervals(user_id).await.unwrap();
    assert_eq!(intervals[0].state, IntervalState::Expired.as_str());
    assert_eq!(intervals[1].state, IntervalState::Active.as_str());
    assert_eq!(intervals[1].started_at, Some(day2));

    // Both gone: back to the free plan.
    let day4 = t0() + TimeDelta::days(4);
    let status = engine.account_status(&registered.user, day4).await.unwrap();
    assert_eq!(status.plan.id, "free");

    let actions: Vec<_> = engine
        .plan_log(user_id)
        .await
        .unwrap()
        .into_iter()
        .map(|entry| entry.action)
        .collect();
    assert_eq!(
        actions,
        vec![
            "add-interval",
            "add-interval",
            "start-interval",
            "expire-interval",
            "start-interval",
            "expire-interval",
        ]
    );
}

#[tokio::test]
async fn unverified_account_is_disabled_after_grace_period() {
    let (engine, _db, mailer) = engine_with_db().await;
    let registered = register(&engine, "alice").await;
    assert_eq!(mailer.count(), 1);

    // Inside the mail interval: no reminder.
    let status = engine
        .account_status(&registered.user, t0() + TimeDelta::hours(1))
        .await
        .unwrap();
    assert!(status.active);
    assert_eq!(mailer.count(), 1);

    // Next slot reached: reminder goes out.
    engine
        .account_status(&registered.user, t0() + TimeDelta::days(1))
        .await
        .unwrap();
    assert_eq!(mailer.count(), 2);

    let status = engine
        .account_status(&registered.user, t0() + TimeDelta::days(8))
        .await
        .unwrap();
    assert!(!status.active);
}

#[tokio::test]
async fn verified_account_stays_active() {
    let (engine, _db, mailer) = engine_with_db().await;
    let registered = register(&engine, "alice").await;
    let profile = engine.profile(registered.user.id).await.unwrap();
    let user = engine.verify_email(&profile.confirmation_key).await.unwrap();

    let status = engine
        .account_status(&user, t0() + TimeDelta::days(30))
        .await
        .unwrap();
    assert!(status.active);
    assert_eq!(mailer.count(), 1);
}

#[tokio::test]
async fn profile_view_does_not_start_intervals() {
    let (engine, _db, _mailer) = engine_with_db().await;
    engine.create_plan(pro()).await.unwrap();
    let registered = register(&engine, "alice").await;
    engine
        .add_interval("alice@example.com", "pro", "3600", ORIGIN, t0())
        .await
        .unwrap();

    let view = engine.profile_view(&registered.user, t0()).await.unwrap();
    assert_eq!(view.plan.id, "free");
    assert!(view.active);

    let intervals = engine.intervals(registered.user.id).await.unwrap();
    assert_eq!(intervals[0].state, IntervalState::Waiting.as_str());
}

#[tokio::test]
async fn very_long_interval_never_expires() {
    let (engine, _db, _mailer) = engine_with_db().await;
    engine.create_plan(pro()).await.unwrap();
    let registered = register(&engine, "alice").await;

    engine
        .add_interval("alice@example.com", "pro", "9999999999999", ORIGIN, t0())
        .await
        .unwrap();

    let status = engine.account_status(&registered.user, t0()).await.unwrap();
    assert_eq!(status.plan.id, "pro");
    let later = t0() + TimeDelta::days(365 * 1000);
    let status = engine.account_status(&registered.user, later).await.unwrap();
    assert_eq!(status.plan.id, "pro");

    let intervals = engine.intervals(registered.user.id).await.unwrap();
    assert_eq!(intervals[0].state().unwrap(), IntervalState::Active);
    assert_eq!(intervals[0].ends_at(), None);
}

#[tokio::test]
async fn add_interval_rejects_durations_past_999999999_days() {
    let (engine, _db, _mailer) = engine_with_db().await;
    engine.create_plan(pro()).await.unwrap();
    register(&engine, "alice").await;

    let err = engine
        .add_interval("alice@example.com", "pro", "1000000000 00:00:00", ORIGIN, t0())
        .await
        .unwrap_err();
    let EngineError::Validation(fields) = err else {
        panic!("expected validation error");
    };
    assert!(fields.contains_key("duration"));
}

#[tokio::test]
async fn use_plan_advances_intervals_without_account_check() {
    let (engine, _db, mailer) = engine_with_db().await;
    engine.create_plan(pro()).await.unwrap();
    let registered = register(&engine, "alice").await;
    let user_id = registered.user.id;
    engine
        .add_interval("alice@example.com", "pro", "3600", ORIGIN, t0())
        .await
        .unwrap();

    engine.use_plan(user_id, t0()).await.unwrap();
    let intervals = engine.intervals(user_id).await.unwrap();
    assert_eq!(intervals[0].state().unwrap(), IntervalState::Active);
    assert_eq!(intervals[0].started_at, Some(t0()));

    engine
        .use_plan(user_id, t0() + TimeDelta::hours(1))
        .await
        .unwrap();
    let intervals = engine.intervals(user_id).await.unwrap();
    assert_eq!(intervals[0].state().unwrap(), IntervalState::Expired);

    let log = engine.plan_log(user_id).await.unwrap();
    let actions: Vec<_> = log.iter().map(|entry| entry.action().unwrap()).collect();
    assert_eq!(
        actions,
        vec![
            PlanAction::AddInterval,
            PlanAction::StartInterval,
            PlanAction::ExpireInterval,
        ]
    );
    assert!(log[1..].iter().all(|entry| entry.origin == "use-plan"));
    // No confirmation reminder is involved.
    assert_eq!(mailer.count(), 1);
}
