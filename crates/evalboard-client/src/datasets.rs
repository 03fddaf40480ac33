use evalboard_types::{Dataset, Page};
use http::Method;

use crate::client::ApiClient;
use crate::error::ClientError;
use crate::transport::ApiRequest;

#[derive(Clone)]
pub struct DatasetService {
    api: ApiClient,
}

impl DatasetService {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    pub async fn list(&self, page: u32, pageSize: u32) -> Result<Page<Dataset>, ClientError> {
        let query = vec![
            ("page".to_string(), page.max(1).to_string()),
            ("page_size".to_string(), pageSize.to_string()),
        ];
        self.api.get_with_query("/datasets", query).await
    }

    pub async fn get(&self, id: &str) -> Result<Dataset, ClientError> {
        self.api.get(&format!("/datasets/{id}")).await
    }

    pub async fn delete(&self, id: &str) -> Result<(), ClientError> {
        self.api
            .call(ApiRequest::new(Method::DELETE, format!("/datasets/{id}")))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::NotificationStore;
    use crate::testing::{json, status, ScriptedTransport};
    use evalboard_types::ProcessingStatus;
    use serde_json::json as j;
    use std::sync::Arc;

    fn dataset_json(id: &str) -> serde_json::Value {
        j!({
            "id": id,
            "user_id": "u-1",
            "name": "TweetEval sentiment",
            "file_name": "sentiment.csv",
            "file_size": 2048,
            "mime_type": "text/csv",
            "total_rows": 200,
            "processed_rows": 150,
            "failed_rows": 10,
            "processing_status": "processing",
            "is_public": false,
            "created_at": "2024-03-01T12:00:00Z"
        })
    }

    fn service(transport: &Arc<ScriptedTransport>) -> DatasetService {
        DatasetService::new(ApiClient::new(transport.clone(), NotificationStore::new()))
    }

    #[tokio::test]
    async fn list_sends_pagination() {
        let transport = ScriptedTransport::new();
        transport.push(json(
            200,
            j!({"items": [dataset_json("d-1")], "total": 1, "page": 1, "page_size": 10, "total_pages": 1}),
        ));

        let page = service(&transport).list(0, 10).await.unwrap();
        assert_eq!(page.items[0].processing_status, ProcessingStatus::Processing);
        assert_eq!(page.items[0].progress(), 0.8);
        assert_eq!(
            transport.requests()[0].query,
            vec![
                ("page".to_string(), "1".to_string()),
                ("page_size".to_string(), "10".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn get_and_delete_address_one_dataset() {
        let transport = ScriptedTransport::new();
        transport.push(json(200, dataset_json("d-7")));
        transport.push(status(204));
        let service = service(&transport);

        let dataset = service.get("d-7").await.unwrap();
        assert_eq!(dataset.name, "TweetEval sentiment");
        service.delete("d-7").await.unwrap();

        let requests = transport.requests();
        assert_eq!(requests[1].method, Method::DELETE);
        assert_eq!(transport.paths(), vec!["/datasets/d-7", "/datasets/d-7"]);
    }

    #[tokio::test]
    async fn missing_dataset_is_not_found() {
        let transport = ScriptedTransport::new();
        transport.push(json(404, j!({"detail": "Dataset not found"})));

        let err = service(&transport).get("nope").await.unwrap_err();
        assert_eq!(err.class(), crate::error::ErrorClass::NotFound);
        assert_eq!(err.to_string(), "Dataset not found");
    }
}
