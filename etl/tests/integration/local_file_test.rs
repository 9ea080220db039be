use config::shared::{DeltaStrategy, FileType};
use etl::destination::local_file::LocalFileDestination;
use etl::error::ErrorKind;
use etl::lock::FileRunLocks;
use etl::pipeline::Pipeline;
use etl::source::local_file::LocalFileSource;
use etl::test_utils::records::memory_pipeline_config;
use serde_json::{Value, json};
use telemetry::tracing::init_test_tracing;

fn read_json(path: &std::path::Path) -> Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn jsonl_source_reconciles_into_nested_json_destination() {
    init_test_tracing();

    let dir = tempfile::tempdir().unwrap();
    let source_path = dir.path().join("users.jsonl");
    let destination_path = dir.path().join("warehouse.json");

    std::fs::write(
        &source_path,
        "{\"id\": 1, \"name\": \"ada\"}\n{\"id\": 2, \"name\": \"grace\"}\n",
    )
    .unwrap();
    std::fs::write(
        &destination_path,
        r#"{"synced_by": "nightly", "data": {"users": [{"id": 2, "name": "Grace"}, {"id": 3, "name": "linus"}]}}"#,
    )
    .unwrap();

    let pipeline = Pipeline::new(
        memory_pipeline_config(DeltaStrategy::FullRow, true),
        LocalFileSource::new(&source_path, FileType::Jsonl, None),
        LocalFileDestination::new(&destination_path, FileType::Json, Some("data.users".to_owned())),
        FileRunLocks::new(dir.path().join("locks")),
    );

    let result = pipeline.run().await.unwrap();

    assert!(result.is_success());
    assert_eq!(
        (result.inserted, result.updated, result.deleted),
        (1, 1, 1)
    );

    let document = read_json(&destination_path);
    assert_eq!(document["synced_by"], "nightly");

    let mut users = document["data"]["users"].as_array().unwrap().clone();
    users.sort_by_key(|user| user["id"].as_i64());
    assert_eq!(
        users,
        vec![
            json!({"id": 1, "name": "ada"}),
            json!({"id": 2, "name": "grace"}),
        ]
    );

    // The lock file is gone once the run is over.
    assert_eq!(
        std::fs::read_dir(dir.path().join("locks")).unwrap().count(),
        0
    );

    // Running again against the updated file writes nothing.
    let rerun = pipeline.run().await.unwrap();
    assert_eq!(rerun.applied(), 0);
    assert_eq!(rerun.unchanged, 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_destination_file_is_created() {
    init_test_tracing();

    let dir = tempfile::tempdir().unwrap();
    let source_path = dir.path().join("in.json");
    let destination_path = dir.path().join("out.jsonl");
    std::fs::write(&source_path, r#"[{"id": 1, "tags": ["a", "b"]}]"#).unwrap();

    let pipeline = Pipeline::new(
        memory_pipeline_config(DeltaStrategy::PrimaryKey, false),
        LocalFileSource::new(&source_path, FileType::Json, None),
        LocalFileDestination::new(&destination_path, FileType::Jsonl, None),
        FileRunLocks::new(dir.path().join("locks")),
    );

    let result = pipeline.run().await.unwrap();

    assert_eq!(result.inserted, 1);
    assert_eq!(
        std::fs::read_to_string(&destination_path).unwrap(),
        "{\"id\":1,\"tags\":[\"a\",\"b\"]}\n"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_source_file_is_a_source_failure() {
    init_test_tracing();

    let dir = tempfile::tempdir().unwrap();
    let destination_path = dir.path().join("out.json");

    let pipeline = Pipeline::new(
        memory_pipeline_config(DeltaStrategy::FullRow, false),
        LocalFileSource::new(dir.path().join("missing.json"), FileType::Json, None),
        LocalFileDestination::new(&destination_path, FileType::Json, None),
        FileRunLocks::new(dir.path().join("locks")),
    );

    let err = pipeline.run().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SourceUnavailable);
    assert!(!destination_path.exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn csv_source_reconciles_into_csv_destination() {
    init_test_tracing();

    let dir = tempfile::tempdir().unwrap();
    let source_path = dir.path().join("users.csv");
    let destination_path = dir.path().join("warehouse.csv");

    std::fs::write(&source_path, "id,name,score\n1,ada,2\n2,grace,1.5\n").unwrap();
    std::fs::write(&destination_path, "id,name,score\n2,Grace,1.5\n3,linus,\n").unwrap();

    let pipeline = Pipeline::new(
        memory_pipeline_config(DeltaStrategy::FullRow, true),
        LocalFileSource::new(&source_path, FileType::Csv, None),
        LocalFileDestination::new(&destination_path, FileType::Csv, None),
        FileRunLocks::new(dir.path().join("locks")),
    );

    let result = pipeline.run().await.unwrap();

    assert!(result.is_success());
    assert_eq!(
        (result.inserted, result.updated, result.deleted),
        (1, 1, 1)
    );

    let contents = std::fs::read_to_string(&destination_path).unwrap();
    let mut lines: Vec<_> = contents.lines().collect();
    assert_eq!(lines.remove(0), "id,name,score");
    lines.sort();
    assert_eq!(lines, ["1,ada,2", "2,grace,1.5"]);

    let rerun = pipeline.run().await.unwrap();
    assert_eq!(rerun.applied(), 0);
    assert_eq!(rerun.unchanged, 2);
}
