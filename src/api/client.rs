//! HTTP client for the relationship-database backend.
//!
//! The backend is a plain JSON REST API. List endpoints return arrays,
//! detail endpoints return a single record (contact details embed their
//! association links), and mutations are POST/PUT/DELETE per resource.

use crate::api::models::{
    AssociationLink, AuditEntry, ContactKind, ContactRecord, OrgRecord, Person,
};
use crate::reconcile::ReconcilePlan;
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server returned {status}: {body}")]
    Status { status: StatusCode, body: String },
}

/// Request body for association mutations. Same shape for create and
/// update; delete sends no body.
#[derive(Debug, Clone, Serialize)]
struct AssociationBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    company_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    person_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    departments: Option<Vec<String>>,
}

impl AssociationBody {
    fn from_link(link: &AssociationLink) -> Self {
        Self {
            company_id: link.company_id,
            person_id: link.person_id,
            departments: link.departments.clone(),
        }
    }
}

/// Fields accepted by org create/update endpoints (the backend assigns ids).
#[derive(Debug, Clone, Default, Serialize)]
pub struct OrgPayload {
    pub name: String,
    pub kind: crate::api::models::OrgKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PersonPayload {
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// One failed operation from a plan application, with enough context to
/// retry manually.
#[derive(Debug, Clone)]
pub struct OperationFailure {
    pub operation: &'static str,
    pub key: String,
    pub error: String,
}

/// Outcome of applying a `ReconcilePlan`. Best-effort: failures don't
/// abort the remaining operations and nothing is rolled back.
#[derive(Debug, Clone, Default)]
pub struct ApplyReport {
    pub applied: usize,
    pub failures: Vec<OperationFailure>,
}

impl ApplyReport {
    /// Message shown to the end user: the first failure, if any.
    pub fn first_failure(&self) -> Option<String> {
        self.failures.first().map(|f| {
            format!(
                "{} of association {} failed: {}",
                f.operation, f.key, f.error
            )
        })
    }
}

pub struct ApiClient {
    client: Client,
    base_url: String,
    api_token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str, api_token: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token,
        }
    }

    // ---- organizations ----

    pub async fn list_orgs(&self) -> Result<Vec<OrgRecord>, ApiError> {
        self.get_json(&format!("{}/api/organizations", self.base_url))
            .await
    }

    pub async fn get_org(&self, id: &str) -> Result<OrgRecord, ApiError> {
        self.get_json(&format!("{}/api/organizations/{}", self.base_url, id))
            .await
    }

    pub async fn create_org(&self, payload: &OrgPayload) -> Result<OrgRecord, ApiError> {
        self.send_json(
            Method::POST,
            &format!("{}/api/organizations", self.base_url),
            Some(payload),
        )
        .await
    }

    pub async fn update_org(&self, id: &str, payload: &OrgPayload) -> Result<OrgRecord, ApiError> {
        self.send_json(
            Method::PUT,
            &format!("{}/api/organizations/{}", self.base_url, id),
            Some(payload),
        )
        .await
    }

    pub async fn delete_org(&self, id: &str) -> Result<(), ApiError> {
        self.send_discard::<()>(
            Method::DELETE,
            &format!("{}/api/organizations/{}", self.base_url, id),
            None,
        )
        .await
    }

    // ---- persons ----

    pub async fn list_persons(&self, search: Option<&str>) -> Result<Vec<Person>, ApiError> {
        let mut url = format!("{}/api/persons", self.base_url);
        if let Some(term) = search {
            if !term.is_empty() {
                url.push_str(&format!("?search={}", urlencoding::encode(term)));
            }
        }
        self.get_json(&url).await
    }

    pub async fn get_person(&self, id: &str) -> Result<Person, ApiError> {
        self.get_json(&format!("{}/api/persons/{}", self.base_url, id))
            .await
    }

    pub async fn create_person(&self, payload: &PersonPayload) -> Result<Person, ApiError> {
        self.send_json(
            Method::POST,
            &format!("{}/api/persons", self.base_url),
            Some(payload),
        )
        .await
    }

    pub async fn delete_person(&self, id: &str) -> Result<(), ApiError> {
        self.send_discard::<()>(
            Method::DELETE,
            &format!("{}/api/persons/{}", self.base_url, id),
            None,
        )
        .await
    }

    // ---- contact methods ----

    pub async fn list_contacts(&self, kind: ContactKind) -> Result<Vec<ContactRecord>, ApiError> {
        self.get_json(&format!("{}/api/{}", self.base_url, kind.resource()))
            .await
    }

    /// Detail fetch; the response embeds the association links.
    pub async fn get_contact(
        &self,
        kind: ContactKind,
        id: i64,
    ) -> Result<ContactRecord, ApiError> {
        self.get_json(&format!("{}/api/{}/{}", self.base_url, kind.resource(), id))
            .await
    }

    // ---- associations ----

    pub async fn create_association(
        &self,
        kind: ContactKind,
        contact_id: i64,
        link: &AssociationLink,
    ) -> Result<(), ApiError> {
        let url = format!(
            "{}/api/{}/{}/associations",
            self.base_url,
            kind.resource(),
            contact_id
        );
        self.send_discard(Method::POST, &url, Some(&AssociationBody::from_link(link)))
            .await
    }

    pub async fn update_association(
        &self,
        kind: ContactKind,
        contact_id: i64,
        association_id: i64,
        link: &AssociationLink,
    ) -> Result<(), ApiError> {
        let url = format!(
            "{}/api/{}/{}/associations/{}",
            self.base_url,
            kind.resource(),
            contact_id,
            association_id
        );
        self.send_discard(Method::PUT, &url, Some(&AssociationBody::from_link(link)))
            .await
    }

    pub async fn delete_association(
        &self,
        kind: ContactKind,
        contact_id: i64,
        association_id: i64,
    ) -> Result<(), ApiError> {
        let url = format!(
            "{}/api/{}/{}/associations/{}",
            self.base_url,
            kind.resource(),
            contact_id,
            association_id
        );
        self.send_discard::<()>(Method::DELETE, &url, None).await
    }

    /// Apply a reconcile plan, one request at a time, in plan order:
    /// creates, then updates, then deletes. A failure is logged and the
    /// remaining operations still run; already-applied operations are not
    /// rolled back. Callers surface `report.first_failure()` to the user.
    pub async fn apply_plan(
        &self,
        kind: ContactKind,
        contact_id: i64,
        plan: &ReconcilePlan,
    ) -> ApplyReport {
        let mut report = ApplyReport::default();

        for link in &plan.to_create {
            let result = self.create_association(kind, contact_id, link).await;
            record(&mut report, "create", link.key_display(), result);
        }

        for link in &plan.to_update {
            match link.association_id {
                Some(assoc_id) => {
                    let result = self
                        .update_association(kind, contact_id, assoc_id, link)
                        .await;
                    record(&mut report, "update", link.key_display(), result);
                }
                None => {
                    // Reconciler always sets the persisted id on updates;
                    // treat a missing one like the skipped-delete case.
                    eprintln!(
                        "[Sync] Skipping update for link {} with no persisted id",
                        link.key_display()
                    );
                }
            }
        }

        for link in &plan.to_delete {
            let Some(assoc_id) = link.association_id else {
                continue; // reconciler already skipped and warned
            };
            let result = self.delete_association(kind, contact_id, assoc_id).await;
            record(&mut report, "delete", link.key_display(), result);
        }

        report
    }

    // ---- audit trail ----

    pub async fn list_audit(&self, limit: u32) -> Result<Vec<AuditEntry>, ApiError> {
        self.get_json(&format!("{}/api/audit?limit={}", self.base_url, limit))
            .await
    }

    // ---- request plumbing ----

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ApiError> {
        self.send_json::<(), T>(Method::GET, url, None).await
    }

    async fn send_json<B: Serialize, T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        body: Option<&B>,
    ) -> Result<T, ApiError> {
        let mut request = self
            .client
            .request(method, url)
            .header("Accept", "application/json");
        if let Some(token) = &self.api_token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status { status, body });
        }
        Ok(response.json().await?)
    }

    /// For mutations whose success response carries no useful body.
    async fn send_discard<B: Serialize>(
        &self,
        method: Method,
        url: &str,
        body: Option<&B>,
    ) -> Result<(), ApiError> {
        let mut request = self.client.request(method, url);
        if let Some(token) = &self.api_token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status { status, body });
        }
        Ok(())
    }
}

fn record(
    report: &mut ApplyReport,
    operation: &'static str,
    key: String,
    result: Result<(), ApiError>,
) {
    match result {
        Ok(()) => report.applied += 1,
        Err(e) => {
            eprintln!("[Sync] {} of association {} failed: {}", operation, key, e);
            report.failures.push(OperationFailure {
                operation,
                key,
                error: e.to_string(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_association_body_drops_persisted_id() {
        let link = AssociationLink {
            association_id: Some(9),
            company_id: Some(5),
            person_id: None,
            departments: Some(vec!["HR".to_string()]),
        };
        let body = serde_json::to_value(AssociationBody::from_link(&link)).unwrap();
        assert_eq!(
            body,
            serde_json::json!({"company_id": 5, "departments": ["HR"]})
        );
    }

    #[test]
    fn test_first_failure_formats_operation_and_key() {
        let report = ApplyReport {
            applied: 2,
            failures: vec![
                OperationFailure {
                    operation: "delete",
                    key: "5-".to_string(),
                    error: "server returned 500 Internal Server Error: boom".to_string(),
                },
                OperationFailure {
                    operation: "create",
                    key: "9-".to_string(),
                    error: "timeout".to_string(),
                },
            ],
        };
        let msg = report.first_failure().unwrap();
        assert!(msg.starts_with("delete of association 5-"));
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let client = ApiClient::new("http://localhost:8080/", None);
        assert_eq!(client.base_url, "http://localhost:8080");
    }
}
