mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use blog_generator::error::PipelineError;
use blog_generator::handler::{StatusEnvelope, COMPLETED_MESSAGE};
use blog_generator::jobs::JobState;
use blog_generator::store::ArtifactStore;
use common::{
    is_timestamp_key, service, FailingStore, FixedClock, RecordingStore, ScriptedGenerator, BUCKET,
    PREFIX,
};

#[tokio::test]
async fn stores_generated_blog_under_a_timestamp_key() {
    let generator = Arc::new(ScriptedGenerator::text("a blog about cats"));
    let store = Arc::new(RecordingStore::default());
    let service = service(generator.clone(), store.clone()).await;

    let envelope = service.handle(r#"{"blog_topic":"cats"}"#).await.unwrap();

    assert_eq!(envelope.status_code, 200);
    assert_eq!(store.puts(), 1);
    let objects = store.list(BUCKET, PREFIX).await.unwrap();
    assert_eq!(objects.len(), 1);
    assert!(is_timestamp_key(&objects[0].key), "{}", objects[0].key);
    assert_eq!(store.get(BUCKET, &objects[0].key).await.unwrap(), "a blog about cats");

    let prompts = generator.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].prompt.contains("on the topic: cats [/INST]"));
}

#[tokio::test]
async fn envelope_matches_the_gateway_contract() {
    let service = service(
        Arc::new(ScriptedGenerator::text("text")),
        Arc::new(RecordingStore::default()),
    )
    .await;

    let envelope = service.handle(r#"{"blog_topic":"cats"}"#).await.unwrap();

    assert_eq!(envelope, StatusEnvelope::ok(COMPLETED_MESSAGE));
    assert_eq!(
        serde_json::to_value(&envelope).unwrap(),
        serde_json::json!({"statusCode": 200, "body": "\"Blog Generation is completed\""})
    );
}

#[tokio::test]
async fn empty_generation_skips_storage() {
    let store = Arc::new(RecordingStore::default());
    let service = service(Arc::new(ScriptedGenerator::text("")), store.clone()).await;

    let envelope = service.handle(r#"{"blog_topic":"cats"}"#).await.unwrap();

    assert_eq!(envelope.status_code, 200);
    assert_eq!(store.puts(), 0);
}

#[tokio::test]
async fn failures_still_answer_200() {
    let store = Arc::new(RecordingStore::default());
    let failing_generation = service(Arc::new(ScriptedGenerator::failing("reset")), store.clone()).await;
    assert_eq!(
        failing_generation
            .handle(r#"{"blog_topic":"cats"}"#)
            .await
            .unwrap()
            .status_code,
        200
    );
    assert_eq!(store.puts(), 0);

    let failing_store = service(Arc::new(ScriptedGenerator::text("blog")), Arc::new(FailingStore)).await;
    assert_eq!(
        failing_store
            .handle(r#"{"blog_topic":"cats"}"#)
            .await
            .unwrap()
            .status_code,
        200
    );
}

#[tokio::test]
async fn malformed_requests_are_rejected() {
    let generator = Arc::new(ScriptedGenerator::text("blog"));
    let service = service(generator.clone(), Arc::new(RecordingStore::default())).await;

    for body in ["", "not json", "{}", r#"{"topic":"cats"}"#, r#"{"blog_topic":42}"#] {
        let err = service.handle(body).await.unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST, "{body}");
    }
    assert_eq!(generator.calls(), 0);
}

#[tokio::test]
async fn empty_topic_is_still_generated() {
    let generator = Arc::new(ScriptedGenerator::text("blog"));
    let service = service(generator.clone(), Arc::new(RecordingStore::default())).await;

    service.handle(r#"{"blog_topic":""}"#).await.unwrap();

    assert_eq!(
        generator.prompts.lock().unwrap()[0].prompt,
        "<s>[INST] Write a 200-word blog on the topic:  [/INST]"
    );
}

#[tokio::test]
async fn same_second_requests_leave_one_artifact() {
    let store = Arc::new(RecordingStore::default());
    let first = service(Arc::new(ScriptedGenerator::text("first blog")), store.clone())
        .await
        .with_clock(Arc::new(FixedClock::at(9, 30, 15)));
    let second = service(Arc::new(ScriptedGenerator::text("second blog")), store.clone())
        .await
        .with_clock(Arc::new(FixedClock::at(9, 30, 15)));

    let (a, b) = tokio::join!(first.generate_blog("cats"), second.generate_blog("dogs"));

    assert_eq!(a.as_deref(), Some("blog-output/093015.txt"));
    assert_eq!(a, b);
    assert_eq!(store.puts(), 2);
    let objects = store.list(BUCKET, PREFIX).await.unwrap();
    assert_eq!(objects.len(), 1);
    let survivor = store.get(BUCKET, "blog-output/093015.txt").await.unwrap();
    assert!(survivor == "first blog" || survivor == "second blog");
}

#[tokio::test]
async fn tracked_job_completes_with_its_own_artifact() {
    let store = Arc::new(RecordingStore::default());
    let service = service(Arc::new(ScriptedGenerator::text("a blog about cats")), store.clone()).await;

    let job = service.submit("cats").await.unwrap();
    assert_eq!(job.state, JobState::Pending);
    assert_eq!(job.artifact_key, format!("blog-output/{}.txt", job.id));

    let done = wait_terminal(&service, &job.id).await;
    assert_eq!(done.state, JobState::Complete);
    assert!(done.failure.is_none());
    assert_eq!(service.job_content(&job.id).await.unwrap(), "a blog about cats");
    assert_eq!(store.get(BUCKET, &job.artifact_key).await.unwrap(), "a blog about cats");
}

#[tokio::test]
async fn tracked_jobs_never_collide() {
    let store = Arc::new(RecordingStore::default());
    let service = service(Arc::new(ScriptedGenerator::text("blog")), store.clone())
        .await
        .with_clock(Arc::new(FixedClock::at(9, 30, 15)));

    let a = service.submit("cats").await.unwrap();
    let b = service.submit("cats").await.unwrap();
    wait_terminal(&service, &a.id).await;
    wait_terminal(&service, &b.id).await;

    assert_ne!(a.artifact_key, b.artifact_key);
    assert_eq!(store.list(BUCKET, PREFIX).await.unwrap().len(), 2);
}

#[tokio::test]
async fn tracked_job_records_generation_failure() {
    let store = Arc::new(RecordingStore::default());
    let service = service(Arc::new(ScriptedGenerator::failing("connection reset")), store.clone()).await;

    let job = service.submit("cats").await.unwrap();
    let done = wait_terminal(&service, &job.id).await;

    assert_eq!(done.state, JobState::Failed);
    assert!(done.failure.unwrap().contains("connection reset"));
    assert_eq!(store.puts(), 0);
    let err = service.job_content(&job.id).await.unwrap_err();
    assert_eq!(err.status, StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn tracked_job_treats_empty_output_as_failure() {
    let service = service(
        Arc::new(ScriptedGenerator::text("")),
        Arc::new(RecordingStore::default()),
    )
    .await;

    let job = service.submit("cats").await.unwrap();
    let done = wait_terminal(&service, &job.id).await;

    assert_eq!(done.state, JobState::Failed);
    assert_eq!(done.failure.as_deref(), Some("inference returned no text"));
}

#[tokio::test]
async fn tracked_job_records_storage_failure() {
    let service = service(Arc::new(ScriptedGenerator::text("blog")), Arc::new(FailingStore)).await;

    let err = service
        .generate_and_store("cats", "blog-output/x.txt")
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Storage(_)));

    let job = service.submit("cats").await.unwrap();
    let done = wait_terminal(&service, &job.id).await;
    assert_eq!(done.state, JobState::Failed);
    assert!(done.failure.unwrap().contains(BUCKET));
}

#[tokio::test]
async fn pending_job_content_is_a_conflict() {
    let service = service(
        Arc::new(ScriptedGenerator::text("blog").delayed(Duration::from_secs(5))),
        Arc::new(RecordingStore::default()),
    )
    .await;

    let job = service.submit("cats").await.unwrap();

    let err = service.job_content(&job.id).await.unwrap_err();
    assert_eq!(err.status, StatusCode::CONFLICT);
}

async fn wait_terminal(
    service: &blog_generator::handler::BlogService,
    id: &blog_generator::key::RequestId,
) -> blog_generator::jobs::JobRecord {
    for _ in 0..200 {
        let record = service.job(id).await.unwrap().unwrap();
        if record.state.is_terminal() {
            return record;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {} never finished", id);
}
