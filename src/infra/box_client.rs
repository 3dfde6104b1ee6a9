use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::http_client::check_status;
use crate::app::ports::{FileStorePort, UploadOutcome};
use crate::config::BoxConfig;
use crate::error::{PipelineError, Result};

const AS_USER_HEADER: &str = "As-User";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct BoxUser {
    name: String,
}

/// Box REST API as the file store, authenticated with a client-credentials
/// grant for the enterprise service account and acting as the configured user
pub struct BoxFileStore {
    client: Client,
    access_token: String,
    user_id: String,
    api_base: String,
    upload_base: String,
}

impl BoxFileStore {
    pub fn connect(client: Client, config: &BoxConfig) -> Result<Self> {
        let secret = config.client_secret()?;
        let response = client
            .post(&config.token_url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", config.client_id.as_str()),
                ("client_secret", secret.as_str()),
                ("box_subject_type", "enterprise"),
                ("box_subject_id", config.enterprise_id.as_str()),
            ])
            .send()?;
        let token: TokenResponse = check_status(response, storage_error)?.json()?;

        let store = Self {
            client,
            access_token: token.access_token,
            user_id: config.user_id.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            upload_base: config.upload_base.trim_end_matches('/').to_string(),
        };

        let response = store
            .authorized(store.client.get(store.api_url("users/me")))
            .send()?;
        let user: BoxUser = check_status(response, storage_error)?.json()?;
        info!("🔑 Authenticated with Box as \"{}\"", user.name);
        Ok(store)
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/{}", self.api_base, path)
    }

    fn upload_url(&self, path: &str) -> String {
        format!("{}/{}", self.upload_base, path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .bearer_auth(&self.access_token)
            .header(AS_USER_HEADER, &self.user_id)
    }

    fn upload(&self, url: String, attributes: Value, name: &str, bytes: Vec<u8>) -> Result<reqwest::blocking::Response> {
        let form = Form::new()
            .text("attributes", attributes.to_string())
            .part("file", Part::bytes(bytes).file_name(name.to_string()));
        Ok(self.authorized(self.client.post(url)).multipart(form).send()?)
    }
}

impl FileStorePort for BoxFileStore {
    fn find_file_id(&self, folder_id: &str, name: &str) -> Result<String> {
        // A preflight check for uploading `name` conflicts with the existing file
        let response = self
            .authorized(self.client.request(reqwest::Method::OPTIONS, self.api_url("files/content")))
            .json(&json!({ "name": name, "parent": { "id": folder_id } }))
            .send()?;

        if response.status() == StatusCode::CONFLICT {
            let body: Value = response.json()?;
            return conflict_file_id(&body).ok_or_else(|| PipelineError::Storage {
                status: StatusCode::CONFLICT.as_u16(),
                message: format!("conflict response without a file id: {body}"),
            });
        }

        check_status(response, storage_error)?;
        Err(PipelineError::FileNotFound {
            name: name.to_string(),
            folder_id: folder_id.to_string(),
        })
    }

    fn download(&self, file_id: &str) -> Result<Vec<u8>> {
        let response = self
            .authorized(self.client.get(self.api_url(&format!("files/{file_id}/content"))))
            .send()?;
        let bytes = check_status(response, storage_error)?.bytes()?;
        info!("📡 Downloaded file {} ({} bytes)", file_id, bytes.len());
        Ok(bytes.to_vec())
    }

    fn upload_or_replace(
        &self,
        folder_id: &str,
        file_id: Option<&str>,
        name: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadOutcome> {
        if let Some(file_id) = file_id {
            let response = self.upload(
                self.upload_url(&format!("files/{file_id}/content")),
                json!({ "name": name }),
                name,
                bytes.clone(),
            )?;
            if response.status() != StatusCode::NOT_FOUND {
                let body: Value = check_status(response, storage_error)?.json()?;
                let file_id = uploaded_file_id(&body).unwrap_or_else(|| file_id.to_string());
                debug!("Uploaded new version of {} ({})", name, file_id);
                return Ok(UploadOutcome::Replaced { file_id });
            }
            info!("File {} no longer exists, uploading {} as a new file", file_id, name);
        }

        let response = self.upload(
            self.upload_url("files/content"),
            json!({ "name": name, "parent": { "id": folder_id } }),
            name,
            bytes,
        )?;
        let body: Value = check_status(response, storage_error)?.json()?;
        let file_id = uploaded_file_id(&body).ok_or_else(|| PipelineError::Storage {
            status: 201,
            message: format!("upload response without a file id: {body}"),
        })?;
        Ok(UploadOutcome::Created { file_id })
    }

    fn rename(&self, file_id: &str, new_name: &str) -> Result<()> {
        let response = self
            .authorized(self.client.put(self.api_url(&format!("files/{file_id}"))))
            .json(&json!({ "name": new_name }))
            .send()?;
        check_status(response, storage_error)?;
        info!("Renamed file {} to \"{}\"", file_id, new_name);
        Ok(())
    }
}

fn storage_error(status: u16, message: String) -> PipelineError {
    PipelineError::Storage { status, message }
}

/// Id of the existing file in a 409 preflight response
fn conflict_file_id(body: &Value) -> Option<String> {
    let conflicts = body.pointer("/context_info/conflicts")?;
    // Box reports either a single conflict or a list of them
    let conflict = match conflicts {
        Value::Array(items) => items.first()?,
        other => other,
    };
    id_string(conflict.get("id")?)
}

/// Id of the file in an upload response (`{"entries": [{"id": ...}]}`)
fn uploaded_file_id(body: &Value) -> Option<String> {
    id_string(body.pointer("/entries/0/id")?)
}

fn id_string(id: &Value) -> Option<String> {
    match id {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
