//! wfd-remote-http
//!
//! Live HTTP adapter for the remote document store.
//!
//! Endpoints (wire schema owned by the remote, mirrored here only as far as
//! the adapter needs):
//! - `POST {base}/v1/state/delta` — push a partial state delta.
//! - `GET  {base}/v1/state`       — pull the full snapshot.
//!
//! The API token is resolved from the env var *named* in the config; the
//! token itself never appears in configuration files.

use anyhow::{Context, Result};
use tracing::debug;

use wfd_config::RemoteConfig;
use wfd_schemas::{RemoteSnapshot, StateDelta};
use wfd_sync::{RemoteStore, SyncError};

pub struct HttpRemoteStore {
    http: reqwest::blocking::Client,
    base_url: String,
    api_token: Option<String>,
}

impl HttpRemoteStore {
    /// Build the adapter from config, resolving the API token from the
    /// configured env var. A missing env var is allowed (anonymous remote in
    /// dev setups); requests simply omit the auth header.
    ///
    /// # Errors
    ///
    /// Fails when the underlying client cannot be constructed.
    pub fn from_config(cfg: &RemoteConfig) -> Result<Self> {
        let api_token = std::env::var(&cfg.api_key_env).ok();
        if api_token.is_none() {
            debug!(env = %cfg.api_key_env, "remote api token env var not set");
        }
        let http = reqwest::blocking::Client::builder()
            .build()
            .context("build http client")?;
        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_token,
        })
    }

    fn delta_url(&self) -> String {
        format!("{}/v1/state/delta", self.base_url)
    }

    fn state_url(&self) -> String {
        format!("{}/v1/state", self.base_url)
    }

    fn authorize(
        &self,
        req: reqwest::blocking::RequestBuilder,
    ) -> reqwest::blocking::RequestBuilder {
        match &self.api_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }
}

impl RemoteStore for HttpRemoteStore {
    fn push_partial(&mut self, delta: &StateDelta) -> Result<(), SyncError> {
        let resp = self
            .authorize(self.http.post(self.delta_url()).json(delta))
            .send()
            .map_err(|e| SyncError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(SyncError::RemoteRejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }

    fn pull_full(&mut self) -> Result<RemoteSnapshot, SyncError> {
        let resp = self
            .authorize(self.http.get(self.state_url()))
            .send()
            .map_err(|e| SyncError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(SyncError::RemoteRejected {
                status: status.as_u16(),
                body,
            });
        }
        resp.json::<RemoteSnapshot>()
            .map_err(|e| SyncError::Transport(format!("decode snapshot: {e}")))
    }
}
