//! HTTP API tests
//!
//! Requests are driven through the router in-process, so no port is bound.
//! The network-facing middleware (rate limiting, timeouts) is left out; the
//! body limit and error sanitization are covered here.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use beacon_query::cache::ResponseCache;
use beacon_query::query::dispatcher::{AnyDispatcher, LocalDispatcher};
use beacon_query::source::SourceKind;
use beacon_query::web::server::{api_router, AppState, MAX_REQUEST_BODY_SIZE};
use beacon_query::{Dataset, DatasetCatalog, Orchestrator, QueryConfig};
use tempfile::TempDir;
use tower::ServiceExt;

const VCF: &str = "##fileformat=VCFv4.2
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tS1\tS2\tS3\tS4
1\t100\t.\tA\tT\t.\tPASS\t.\tGT\t0/1\t0/0\t0/0\t0/0
1\t200\t.\tC\tG\t.\tPASS\t.\tGT\t1/1\t0/1\t0/0\t0/0
";

struct Fixture {
    dir: TempDir,
    vcf: String,
    state: Arc<AppState>,
}

fn fixture() -> Fixture {
    fixture_with_root(None)
}

/// Fixture whose shard endpoint may also read files under `subdir` of the temp dir
fn fixture_with_root(subdir: Option<&str>) -> Fixture {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let shard_root: Option<PathBuf> = subdir.map(|subdir| {
        let root = dir.path().join(subdir);
        std::fs::create_dir_all(&root).expect("Failed to create shard root");
        root.canonicalize().expect("Failed to resolve shard root")
    });
    let path = dir.path().join("calls.vcf");
    let mut file = std::fs::File::create(&path).expect("Failed to create VCF");
    file.write_all(VCF.as_bytes()).expect("Failed to write VCF");
    let vcf = path.to_string_lossy().to_string();

    let mut catalog = DatasetCatalog::new();
    catalog
        .add_dataset(Dataset {
            dataset_id: "cohort".to_string(),
            name: "Cohort".to_string(),
            description: String::new(),
            sample_count: 4,
            vcf_locations: [(vcf.clone(), "1".to_string())].into(),
            annotation_location: None,
        })
        .expect("Dataset should be valid");

    let orchestrator = Orchestrator::new(
        AnyDispatcher::Local(LocalDispatcher::new(SourceKind::Vcf)),
        ResponseCache::disabled(),
        QueryConfig {
            split_size: 100,
            max_concurrency: 2,
            shard_timeout: Duration::from_secs(30),
        },
    );

    Fixture {
        dir,
        vcf,
        state: Arc::new(AppState {
            catalog,
            orchestrator,
            source_kind: SourceKind::Vcf,
            shard_root,
        }),
    }
}

async fn send(state: Arc<AppState>, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = api_router(state)
        .oneshot(request)
        .await
        .expect("Router should answer");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json)
}

fn post(uri: &str, body: &serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("Failed to build request")
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("Failed to build request")
}

/// Health check answers without touching any data
#[tokio::test]
async fn test_health() {
    let fixture = fixture();
    let (status, json) = send(fixture.state, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

/// The dataset listing summarizes the catalog
#[tokio::test]
async fn test_dataset_listing() {
    let fixture = fixture();
    let (status, json) = send(fixture.state, get("/api/datasets")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["count"], 1);
    assert_eq!(json["datasets"][0]["dataset_id"], "cohort");
    assert_eq!(json["datasets"][0]["source_count"], 1);
    assert_eq!(json["datasets"][0]["annotated"], false);
}

/// A worker runs one work unit and returns the raw shard result
#[tokio::test]
async fn test_shard_endpoint() {
    let fixture = fixture();
    let unit = serde_json::json!({
        "location": fixture.vcf,
        "query": {
            "region": "1:1-1000",
            "reference_bases": "C",
            "alternate_bases": "G",
            "variant_type": null,
            "end_min": 1,
            "end_max": 1000,
            "include_details": true
        }
    });

    let (status, json) = send(fixture.state, post("/api/shard", &unit)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["exists"], true);
    assert_eq!(json["call_count"], 3);
    assert_eq!(json["total_allele_count"], 8);
}

/// Invalid shard queries are client errors
#[tokio::test]
async fn test_shard_endpoint_rejects_bad_bases() {
    let fixture = fixture();
    let unit = serde_json::json!({
        "location": fixture.vcf,
        "query": {
            "region": "1:1-1000",
            "reference_bases": "XYZ",
            "alternate_bases": "G",
            "variant_type": null,
            "end_min": 1,
            "end_max": 1000,
            "include_details": true
        }
    });

    let (status, json) = send(fixture.state, post("/api/shard", &unit)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error_type"], "invalid_request");
}

fn shard_unit(location: &str) -> serde_json::Value {
    serde_json::json!({
        "location": location,
        "query": {
            "region": "1:1-1000",
            "reference_bases": "C",
            "alternate_bases": "G",
            "variant_type": null,
            "end_min": 1,
            "end_max": 1000,
            "include_details": true
        }
    })
}

/// Shard failures do not leak file paths to the client
#[tokio::test]
async fn test_shard_failure_is_sanitized() {
    let fixture = fixture_with_root(Some("data"));
    let broken = fixture.dir.path().join("data").join("broken.vcf");
    std::fs::write(&broken, "1\t5\t.\tC\n").expect("Failed to write VCF");
    let location = broken.to_string_lossy().to_string();

    let (status, json) = send(fixture.state, post("/api/shard", &shard_unit(&location))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error_type"], "shard_failed");
    assert!(json["details"].is_null());
    assert!(!json.to_string().contains("broken.vcf"));
}

/// Only catalog sources can be read through the shard endpoint
#[tokio::test]
async fn test_shard_rejects_unlisted_location() {
    let fixture = fixture();
    for location in ["/etc/passwd", "/secret/path/calls.vcf"] {
        let (status, json) =
            send(fixture.state.clone(), post("/api/shard", &shard_unit(location))).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{location}");
        assert_eq!(json["error_type"], "forbidden_location");
        assert!(!json.to_string().contains(location));
    }
}

/// Locations that look like command-line options never reach a reader
#[tokio::test]
async fn test_shard_rejects_option_like_location() {
    let fixture = fixture();
    let (status, json) =
        send(fixture.state, post("/api/shard", &shard_unit("-o/tmp/overwritten"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error_type"], "invalid_request");
}

/// The shard root admits files beneath it but not paths that climb out of it
#[tokio::test]
async fn test_shard_root_containment() {
    let fixture = fixture_with_root(Some("data"));
    let inside = fixture.dir.path().join("data").join("calls.vcf");
    std::fs::write(&inside, VCF).expect("Failed to write VCF");

    let location = inside.to_string_lossy().to_string();
    let (status, json) =
        send(fixture.state.clone(), post("/api/shard", &shard_unit(&location))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["exists"], true);

    // The fixture VCF sits next to the root, not under it
    let escaped = fixture.dir.path().join("data").join("..").join("calls.vcf");
    let escaped = escaped.to_string_lossy().to_string();
    let (status, _) = send(fixture.state, post("/api/shard", &shard_unit(&escaped))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

/// A full query returns one response per catalog dataset
#[tokio::test]
async fn test_query_endpoint() {
    let fixture = fixture();
    let body = serde_json::json!({
        "reference_bases": "C",
        "alternate_bases": "G",
        "region_start": 1,
        "region_end": 1000,
        "end_min": 1,
        "end_max": 1000,
        "include_datasets": "HIT"
    });

    let (status, json) = send(fixture.state, post("/api/query", &body)).await;
    assert_eq!(status, StatusCode::OK);

    let dataset = &json["datasets"][0];
    assert_eq!(dataset["include"], true);
    assert_eq!(dataset["datasetId"], "cohort");
    assert_eq!(dataset["exists"], true);
    assert_eq!(dataset["callCount"], 3);
    assert_eq!(dataset["sampleCount"], 2);
    assert_eq!(dataset["frequency"], 50);
    assert_eq!(dataset["info"]["variants"][0]["pos"], 200);
    assert_eq!(dataset["info"]["variants"][0]["ref"], "C");
    assert_eq!(dataset["info"]["variants"][0]["alt"], "G");
}

/// Excluded datasets carry only the inclusion flag and existence
#[tokio::test]
async fn test_query_endpoint_excluded_shape() {
    let fixture = fixture();
    let body = serde_json::json!({
        "reference_bases": "C",
        "alternate_bases": "T",
        "region_start": 1,
        "region_end": 1000,
        "end_min": 1,
        "end_max": 1000
    });

    let (status, json) = send(fixture.state, post("/api/query", &body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        json["datasets"][0],
        serde_json::json!({ "include": false, "exists": false })
    );
}

/// Unknown dataset ids are reported as not found
#[tokio::test]
async fn test_query_endpoint_unknown_dataset() {
    let fixture = fixture();
    let body = serde_json::json!({
        "dataset_ids": ["nope"],
        "reference_bases": "C",
        "alternate_bases": "G",
        "region_start": 1,
        "region_end": 1000,
        "end_min": 1,
        "end_max": 1000
    });

    let (status, json) = send(fixture.state, post("/api/query", &body)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error_type"], "unknown_dataset");
}

/// Requests without an allele criterion are rejected
#[tokio::test]
async fn test_query_endpoint_validation() {
    let fixture = fixture();
    let body = serde_json::json!({
        "reference_bases": "C",
        "region_start": 1,
        "region_end": 1000,
        "end_min": 1,
        "end_max": 1000
    });

    let (status, json) = send(fixture.state, post("/api/query", &body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error_type"], "invalid_request");
}

/// Malformed JSON gets a structured error
#[tokio::test]
async fn test_malformed_json() {
    let fixture = fixture();
    let request = Request::builder()
        .method("POST")
        .uri("/api/query")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .expect("Failed to build request");

    let (status, json) = send(fixture.state, request).await;
    assert!(status.is_client_error());
    assert_eq!(json["error_type"], "invalid_json");
}

/// Oversized bodies are refused before parsing
#[tokio::test]
async fn test_body_size_limit() {
    let fixture = fixture();
    let padding = "A".repeat(MAX_REQUEST_BODY_SIZE + 1);
    let body = serde_json::json!({
        "reference_bases": padding,
        "alternate_bases": "G",
        "region_start": 1,
        "region_end": 1000,
        "end_min": 1,
        "end_max": 1000
    });

    let (status, _) = send(fixture.state, post("/api/query", &body)).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
}
