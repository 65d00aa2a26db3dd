//! Inference server slot API over HTTP

use super::{SlotBackend, SlotStatus, SlotTransfer};
use crate::config::{BackendConfig, BackendTimeouts};
use crate::error::{SlotkeeperError, SlotkeeperResult};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, instrument};

/// `GET /slots` and `POST /slots/{id}?action=save|restore|erase`
pub struct HttpSlotBackend {
    client: Client,
    base_url: String,
    timeouts: BackendTimeouts,
}

impl HttpSlotBackend {
    pub fn new(config: &BackendConfig) -> SlotkeeperResult<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.timeouts.connect))
            .build()
            .map_err(|e| SlotkeeperError::backend(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self::with_client(client, &config.slots_url, config.timeouts))
    }

    pub fn with_client(client: Client, base_url: &str, timeouts: BackendTimeouts) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeouts,
        }
    }

    async fn slot_action(
        &self,
        slot: usize,
        action: &str,
        body: Value,
        budget_secs: u64,
    ) -> SlotkeeperResult<Value> {
        let url = format!("{}/slots/{}?action={}", self.base_url, slot, action);
        let operation = format!("Slot {} {}", slot, action);

        let response = self
            .client
            .post(&url)
            .timeout(Duration::from_secs(budget_secs))
            .json(&body)
            .send()
            .await
            .map_err(|e| classify_transport(e, &operation, budget_secs))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &text, &operation));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| classify_transport(e, &operation, budget_secs))
    }
}

#[async_trait]
impl SlotBackend for HttpSlotBackend {
    #[instrument(skip(self), level = "debug")]
    async fn slots(&self) -> SlotkeeperResult<Vec<SlotStatus>> {
        let url = format!("{}/slots", self.base_url);
        let budget = self.timeouts.slot_info;

        let response = self
            .client
            .get(&url)
            .timeout(Duration::from_secs(budget))
            .send()
            .await
            .map_err(|e| classify_transport(e, "Slot info", budget))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &text, "Slot info"));
        }

        let value: Value = response
            .json()
            .await
            .map_err(|e| classify_transport(e, "Slot info", budget))?;
        parse_slots(value)
    }

    #[instrument(skip(self), level = "debug")]
    async fn save(&self, slot: usize, filename: &str) -> SlotkeeperResult<SlotTransfer> {
        let value = self
            .slot_action(slot, "save", json!({ "filename": filename }), self.timeouts.save)
            .await?;
        let transfer = parse_transfer(&value, "n_saved", "n_written", "save_ms");
        debug!(slot, filename, tokens = ?transfer.tokens, bytes = ?transfer.bytes, "slot saved");
        Ok(transfer)
    }

    #[instrument(skip(self), level = "debug")]
    async fn restore(&self, slot: usize, filename: &str) -> SlotkeeperResult<SlotTransfer> {
        let value = self
            .slot_action(
                slot,
                "restore",
                json!({ "filename": filename }),
                self.timeouts.restore,
            )
            .await?;
        let transfer = parse_transfer(&value, "n_restored", "n_read", "restore_ms");
        debug!(slot, filename, tokens = ?transfer.tokens, "slot restored");
        Ok(transfer)
    }

    #[instrument(skip(self), level = "debug")]
    async fn erase(&self, slot: usize) -> SlotkeeperResult<()> {
        self.slot_action(slot, "erase", json!({}), self.timeouts.erase)
            .await?;
        Ok(())
    }
}

pub(super) fn classify_transport(
    error: reqwest::Error,
    operation: &str,
    budget_secs: u64,
) -> SlotkeeperError {
    if error.is_timeout() {
        SlotkeeperError::timeout(operation, budget_secs)
    } else if error.is_decode() {
        SlotkeeperError::json(format!("{}: {}", operation, error))
    } else {
        SlotkeeperError::backend(format!("{} failed: {}", operation, error))
    }
}

pub(super) fn classify_status(status: StatusCode, body: &str, operation: &str) -> SlotkeeperError {
    let detail = error_detail(body);
    let lower = detail.to_lowercase();

    if status == StatusCode::NOT_FOUND
        || lower.contains("not found")
        || lower.contains("failed to open")
        || lower.contains("no such file")
        || lower.contains("does not exist")
    {
        return SlotkeeperError::not_found_resource(
            format!("{}: {}", operation, detail),
            "Cache file",
        );
    }

    if status == StatusCode::NOT_IMPLEMENTED {
        return SlotkeeperError::backend_status(
            format!(
                "{}: slot persistence is disabled on the server (start it with --slot-save-path)",
                operation
            ),
            status.as_u16(),
        );
    }

    SlotkeeperError::backend_status(format!("{}: {}", operation, detail), status.as_u16())
}

/// Pull `error.message` out of a JSON error body, else return the raw body
fn error_detail(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .or_else(|| v.get("error"))
                .or_else(|| v.get("message"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}

/// Accept both the array and the id-keyed map shape of `GET /slots`
fn parse_slots(value: Value) -> SlotkeeperResult<Vec<SlotStatus>> {
    let items: Vec<Value> = match value {
        Value::Array(items) => items,
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by_key(|(key, _)| key.parse::<usize>().unwrap_or(usize::MAX));
            entries.into_iter().map(|(_, v)| v).collect()
        }
        other => {
            return Err(SlotkeeperError::json(format!(
                "Unexpected slots payload: {}",
                other
            )));
        }
    };

    Ok(items
        .iter()
        .enumerate()
        .map(|(index, item)| SlotStatus {
            id: item
                .get("id")
                .and_then(Value::as_u64)
                .map(|id| id as usize)
                .unwrap_or(index),
            is_processing: item
                .get("is_processing")
                .and_then(Value::as_bool)
                .or_else(|| item.get("state").and_then(Value::as_u64).map(|s| s != 0))
                .unwrap_or(false),
        })
        .collect())
}

fn parse_transfer(value: &Value, tokens_key: &str, bytes_key: &str, ms_key: &str) -> SlotTransfer {
    SlotTransfer {
        tokens: value.get(tokens_key).and_then(Value::as_u64),
        bytes: value.get(bytes_key).and_then(Value::as_u64),
        elapsed_ms: value
            .get("timings")
            .and_then(|t| t.get(ms_key))
            .and_then(Value::as_f64),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn backend(uri: &str, timeouts: BackendTimeouts) -> HttpSlotBackend {
        let client = Client::builder().no_proxy().build().expect("client");
        HttpSlotBackend::with_client(client, uri, timeouts)
    }

    #[tokio::test]
    async fn test_slots_array_shape() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/slots"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": 0, "is_processing": false},
                {"id": 1, "is_processing": true}
            ])))
            .mount(&server)
            .await;

        let slots = backend(&server.uri(), BackendTimeouts::default())
            .slots()
            .await
            .unwrap();
        assert_eq!(
            slots,
            vec![
                SlotStatus { id: 0, is_processing: false },
                SlotStatus { id: 1, is_processing: true },
            ]
        );
    }

    #[tokio::test]
    async fn test_slots_map_shape_sorted_by_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/slots"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "1": {"state": 1},
                "0": {"state": 0}
            })))
            .mount(&server)
            .await;

        let slots = backend(&server.uri(), BackendTimeouts::default())
            .slots()
            .await
            .unwrap();
        assert_eq!(slots.len(), 2);
        assert!(!slots[0].is_processing);
        assert!(slots[1].is_processing);
    }

    #[tokio::test]
    async fn test_save_sends_filename_and_parses_stats() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/slots/2"))
            .and(query_param("action", "save"))
            .and(body_json(json!({"filename": "c_20240101000000_character_A.bin"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id_slot": 2,
                "filename": "c_20240101000000_character_A.bin",
                "n_saved": 1745,
                "n_written": 14309796,
                "timings": {"save_ms": 49.865}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let transfer = backend(&server.uri(), BackendTimeouts::default())
            .save(2, "c_20240101000000_character_A.bin")
            .await
            .unwrap();
        assert_eq!(transfer.tokens, Some(1745));
        assert_eq!(transfer.bytes, Some(14309796));
        assert_eq!(transfer.elapsed_ms, Some(49.865));
    }

    #[tokio::test]
    async fn test_restore_missing_file_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/slots/0"))
            .and(query_param("action", "restore"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {"code": 400, "message": "failed to open file"}
            })))
            .mount(&server)
            .await;

        let err = backend(&server.uri(), BackendTimeouts::default())
            .restore(0, "gone.bin")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_save_timeout_is_distinct() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/slots/0"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({}))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let timeouts = BackendTimeouts {
            save: 1,
            ..Default::default()
        };
        let err = backend(&server.uri(), timeouts)
            .save(0, "slow.bin")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert!(matches!(err, SlotkeeperError::Timeout { seconds: 1, .. }));
    }

    #[tokio::test]
    async fn test_erase_server_error_is_backend_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/slots/3"))
            .and(query_param("action", "erase"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let err = backend(&server.uri(), BackendTimeouts::default())
            .erase(3)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BackendUnavailable);
        assert!(matches!(
            err,
            SlotkeeperError::BackendUnavailable {
                status_code: Some(500),
                ..
            }
        ));
    }

    #[test]
    fn test_classify_not_implemented() {
        let err = classify_status(StatusCode::NOT_IMPLEMENTED, "", "Slot 0 save");
        assert!(err.to_string().contains("--slot-save-path"));
    }
}
