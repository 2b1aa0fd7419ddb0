use std::time::Duration;

use reqwest::{Request, Response, StatusCode};

use crate::error::{FlyError, Result};
use crate::types::Machine;

const BASE_URL: &str = "https://api.machines.dev";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_ATTEMPTS: u32 = 5;

/// Client for the Fly Machines REST API.
pub struct MachinesClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl MachinesClient {
    pub fn new(token: String) -> Self {
        Self::with_base_url(token, BASE_URL.to_string())
    }

    /// Point the client at a different API host. Used by tests.
    pub fn with_base_url(token: String, base_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            token,
        }
    }

    /// Create a machine in `app`. Returns the machine as reported by Fly.
    pub async fn create_machine(&self, app: &str, machine: &Machine) -> Result<Machine> {
        let request = self
            .http
            .post(self.machines_url(app))
            .timeout(REQUEST_TIMEOUT)
            .bearer_auth(&self.token)
            .json(machine)
            .build()?;

        let response = self.execute_with_retries(request).await?;
        let status = response.status();

        if !status.is_success() {
            // A 422 body says what Fly disliked about the request; keep it.
            let body = response.text().await.unwrap_or_default();
            return Err(FlyError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }

    /// Fetch one machine. Fly may answer 400 instead of 404 for an unknown
    /// machine id; both map to [`FlyError::MachineNotFound`].
    pub async fn get_machine(&self, app: &str, machine_id: &str) -> Result<Machine> {
        let request = self
            .http
            .get(self.machine_url(app, machine_id))
            .timeout(REQUEST_TIMEOUT)
            .bearer_auth(&self.token)
            .build()?;

        let response = self.execute_with_retries(request).await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND || status == StatusCode::BAD_REQUEST {
            return Err(FlyError::MachineNotFound {
                app: app.to_string(),
                machine: machine_id.to_string(),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FlyError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }

    /// List all machines in `app`.
    pub async fn list_machines(&self, app: &str) -> Result<Vec<Machine>> {
        let request = self
            .http
            .get(self.machines_url(app))
            .timeout(REQUEST_TIMEOUT)
            .bearer_auth(&self.token)
            .build()?;

        let response = self.execute_with_retries(request).await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FlyError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }

    /// Delete a machine. `force` kills a running machine first.
    pub async fn delete_machine(&self, app: &str, machine_id: &str, force: bool) -> Result<()> {
        let mut url = self.machine_url(app, machine_id);
        if force {
            url.push_str("?kill=true");
        }

        let request = self
            .http
            .delete(url)
            .timeout(REQUEST_TIMEOUT)
            .bearer_auth(&self.token)
            .build()?;

        let response = self.execute_with_retries(request).await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FlyError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }

    fn machines_url(&self, app: &str) -> String {
        format!("{}/v1/apps/{}/machines", self.base_url, app)
    }

    fn machine_url(&self, app: &str, machine_id: &str) -> String {
        format!("{}/{}", self.machines_url(app), machine_id)
    }

    /// Run a request, retrying timeouts and the transient responses the API
    /// can give while a machine is settling.
    async fn execute_with_retries(&self, request: Request) -> Result<Response> {
        let mut attempt = 1;
        loop {
            let this_try = match request.try_clone() {
                Some(cloned) => cloned,
                // Streaming bodies cannot be cloned; such a request is sent once.
                None => return Ok(self.http.execute(request).await?),
            };

            tracing::debug!(
                attempt,
                method = %this_try.method(),
                url = %this_try.url(),
                "machines api request"
            );

            match self.http.execute(this_try).await {
                Err(e) if e.is_timeout() && attempt < MAX_ATTEMPTS => {
                    tracing::debug!(attempt, "client timeout, retrying soon");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
                Err(e) => return Err(e.into()),
                Ok(response) if is_transient(response.status()) && attempt < MAX_ATTEMPTS => {
                    tracing::debug!(
                        attempt,
                        status = %response.status(),
                        "transient response, retrying soon"
                    );
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
                Ok(response) => {
                    tracing::debug!(attempt, status = %response.status(), "machines api response");
                    return Ok(response);
                }
            }

            attempt += 1;
        }
    }
}

/// Deleting or mutating a machine can answer 409/412 even with the kill
/// flag; those clear up on their own.
fn is_transient(status: StatusCode) -> bool {
    matches!(status.as_u16(), 409 | 412)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_machine_urls() {
        let client = MachinesClient::with_base_url("t".into(), "http://localhost:4280".into());
        assert_eq!(
            client.machines_url("my-app"),
            "http://localhost:4280/v1/apps/my-app/machines"
        );
        assert_eq!(
            client.machine_url("my-app", "e28650eb"),
            "http://localhost:4280/v1/apps/my-app/machines/e28650eb"
        );
    }

    #[test]
    fn transient_statuses() {
        assert!(is_transient(StatusCode::CONFLICT));
        assert!(is_transient(StatusCode::PRECONDITION_FAILED));
        assert!(!is_transient(StatusCode::OK));
        assert!(!is_transient(StatusCode::UNPROCESSABLE_ENTITY));
        assert!(!is_transient(StatusCode::INTERNAL_SERVER_ERROR));
    }
}
