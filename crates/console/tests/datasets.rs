use std::rc::Rc;

use defo_console::api::{
    self, ColumnStatistics, DatasetId, DatasetUpload, MockServer, RequestBody,
};
use defo_console::session::MemoryCredentials;
use defo_console::{Console, ConsoleConfig, ErrorKind, ProjectDraft, ProjectId};

const SALES_CSV: &[u8] = b"date,region,units\n\
2024-01-03,north,12\n\
2024-01-01,south,7\n\
2024-01-02,north,9\n\
2024-01-05,south,4\n\
2024-01-04,north,11\n\
2024-01-06,south,6\n";

fn console() -> (Rc<MockServer>, Console) {
    let server = Rc::new(MockServer::new());
    let console = Console::with_transport(
        ConsoleConfig::default().with_api_url("http://api.test"),
        server.clone(),
        Rc::new(MemoryCredentials::with_token(server.token())),
    );
    (server, console)
}

fn sales_upload() -> DatasetUpload {
    DatasetUpload {
        name: "Weekly sales".into(),
        file_name: "sales.csv".into(),
        content_type: "text/csv".into(),
        bytes: SALES_CSV.to_vec(),
    }
}

async fn project(console: &Console) -> ProjectId {
    console
        .store
        .create(ProjectDraft::new("Q1 Demand"))
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn upload_is_multipart_and_listed() {
    let (server, console) = console();
    let project_id = project(&console).await;

    let dataset = console
        .upload_dataset(&project_id, sales_upload())
        .await
        .unwrap();

    assert_eq!(dataset.name, "Weekly sales");
    assert_eq!(dataset.row_count, Some(6));
    assert_eq!(dataset.column_count, Some(3));
    assert_eq!(dataset.file_type.as_deref(), Some("csv"));

    let upload_request = server.requests().pop().unwrap();
    assert!(upload_request.url.ends_with("/datasets/upload"));
    match upload_request.body {
        RequestBody::Multipart(form) => {
            assert_eq!(form.field("name"), Some("Weekly sales"));
            assert_eq!(form.file.unwrap().field, "file");
        }
        other => panic!("expected multipart body, got {other:?}"),
    }

    let listed = api::list_datasets(&console.client, &project_id).await.unwrap();
    assert_eq!(listed, vec![dataset]);
}

#[tokio::test]
async fn invalid_upload_never_reaches_network() {
    let (server, console) = console();
    let project_id = project(&console).await;
    let before = server.request_count();

    let mut upload = sales_upload();
    upload.file_name = "sales.json".into();
    let err = console.upload_dataset(&project_id, upload).await.unwrap_err();

    assert_eq!(err.kind, ErrorKind::Validation);
    assert_eq!(server.request_count(), before);
}

#[tokio::test]
async fn server_rejects_single_column_files() {
    let (_server, console) = console();
    let project_id = project(&console).await;

    let mut upload = sales_upload();
    upload.bytes = b"units\n1\n2\n".to_vec();
    let err = console.upload_dataset(&project_id, upload).await.unwrap_err();

    assert_eq!(err.kind, ErrorKind::ClientError);
    assert_eq!(err.message, "File must have at least 2 columns");
}

#[tokio::test]
async fn preview_and_analysis() {
    let (_server, console) = console();
    let project_id = project(&console).await;
    let dataset = console
        .upload_dataset(&project_id, sales_upload())
        .await
        .unwrap();

    let preview = api::preview_dataset(&console.client, &dataset.id).await.unwrap();
    assert_eq!(preview.columns, vec!["date", "region", "units"]);
    assert_eq!(preview.preview.len(), 5);
    assert_eq!(preview.total_rows, 6);

    let analysis = api::analyze_dataset(&console.client, &dataset.id).await.unwrap();
    assert_eq!(analysis.total_columns, 3);
    assert_eq!(analysis.numeric_columns().collect::<Vec<_>>(), vec!["units"]);
    match &analysis.statistics["units"] {
        ColumnStatistics::Numeric { min, max, count, .. } => {
            assert_eq!((*min, *max, *count), (Some(4.0), Some(12.0), 6));
        }
        other => panic!("expected numeric statistics, got {other:?}"),
    }
    let series = analysis.time_series_data.unwrap();
    assert_eq!(series[0]["date"], "2024-01-01");
}

#[tokio::test]
async fn delete_dataset_then_missing() {
    let (_server, console) = console();
    let project_id = project(&console).await;
    let dataset = console
        .upload_dataset(&project_id, sales_upload())
        .await
        .unwrap();

    api::delete_dataset(&console.client, &dataset.id).await.unwrap();

    let err = api::preview_dataset(&console.client, &dataset.id)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::ClientError);
    assert_eq!(err.message, "Dataset not found");
    assert!(api::list_datasets(&console.client, &project_id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn dataset_calls_without_credential_are_unauthorized() {
    let (_server, console) = console();
    console.session.sign_out();

    let err = api::preview_dataset(&console.client, &DatasetId::from("d1"))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Unauthorized);
}
