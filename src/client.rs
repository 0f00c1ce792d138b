//! # Query Client
//!
//! [`DaasClient`] ties the pipeline together: a [`SelectRequest`] is expanded into
//! atomic requests, each one is resolved to an interface call, signed, sent through the
//! [`Transport`] and decoded. Results come back as a [`Selection`].
//!
//! The raw typed calls (`call_array2d`, `call_grid_array2d`, ...) are exposed for
//! callers that already know the interface they want.

use crate::config::ClientConfig;
use crate::decode::{
    Decoded, FileRecord, Grid2D, GridField, GridVector, Table, decode_file_list,
    decode_grid_array, decode_grid_scalar, decode_grid_vector, decode_table,
};
use crate::dispatch::{BatchResult, run_batch};
use crate::error::{DaasError, DaasResult};
use crate::merge::{Merged, merge};
use crate::params::ParameterSet;
use crate::request::SelectRequest;
use crate::resolver::{ResolvedCall, ResponseShape, resolve};
use crate::sign::{Credentials, SignedCall, new_nonce, sign_call, timestamp_millis};
use crate::transport::{HttpTransport, Transport};
use log::{debug, info};
use reqwest::Url;
use std::path::Path;
use std::sync::Arc;

/// Outcome of [`DaasClient::select`]
#[derive(Debug, Clone)]
pub enum Selection {
    /// The lone result of a single-request selection without merge
    One(Decoded),
    /// Per-request results in expansion order
    Batch(BatchResult<Decoded>),
    /// Merged successes plus the indices of the requests that failed
    Merged { merged: Merged, missing: Vec<usize> },
}

impl Selection {
    /// Indices of the atomic requests that produced no result.
    pub fn missing(&self) -> Vec<usize> {
        match self {
            Selection::One(_) => Vec::new(),
            Selection::Batch(batch) => batch.missing(),
            Selection::Merged { missing, .. } => missing.clone(),
        }
    }
}

/// Client for the data service
#[derive(Clone)]
pub struct DaasClient {
    config: ClientConfig,
    endpoint: Url,
    credentials: Credentials,
    transport: Arc<dyn Transport>,
    parallelism: usize,
}

impl DaasClient {
    /// Builds a client talking HTTP with the configured timeouts.
    pub fn new(config: ClientConfig) -> DaasResult<Self> {
        let transport = HttpTransport::new(config.conn_timeout(), config.request_timeout())?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Builds a client on top of any transport.
    ///
    /// # Errors
    /// `Config` when the configuration is invalid or yields an unusable endpoint URL.
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> DaasResult<Self> {
        config.validate()?;
        let endpoint = Url::parse(&config.endpoint())
            .map_err(|e| DaasError::Config(format!("invalid endpoint '{}': {}", config.endpoint(), e)))?;
        let credentials = config.credentials();
        Ok(DaasClient {
            config,
            endpoint,
            credentials,
            transport,
            parallelism: 1,
        })
    }

    /// Replaces the user and password taken from the configuration.
    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials.user = user.into();
        self.credentials.password = password.into();
        self
    }

    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.set_parallelism(parallelism);
        self
    }

    /// Number of calls kept in flight by [`select`](Self::select); 0 means 1.
    pub fn set_parallelism(&mut self, parallelism: usize) {
        self.parallelism = parallelism.max(1);
    }

    pub fn parallelism(&self) -> usize {
        self.parallelism
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Signs one call with a fresh timestamp and nonce.
    pub fn sign(&self, shape: ResponseShape, interface: &str, params: &ParameterSet) -> SignedCall {
        sign_call(
            &self.endpoint,
            &self.credentials,
            shape.method(),
            interface,
            params,
            timestamp_millis(),
            &new_nonce(),
        )
    }

    async fn fetch(&self, shape: ResponseShape, interface: &str, params: &ParameterSet) -> DaasResult<Vec<u8>> {
        let call = self.sign(shape, interface, params);
        debug!("{} {}", call.method, call.url);
        self.transport.fetch(&call.url).await
    }

    pub async fn call_array2d(&self, interface: &str, params: &ParameterSet, index: &[String]) -> DaasResult<Table> {
        let body = self.fetch(ResponseShape::Table, interface, params).await?;
        decode_table(&body, index)
    }

    pub async fn call_grid_array2d(&self, interface: &str, params: &ParameterSet) -> DaasResult<Grid2D> {
        let body = self.fetch(ResponseShape::GridArray, interface, params).await?;
        decode_grid_array(&body)
    }

    pub async fn call_grid_scalar2d(&self, interface: &str, params: &ParameterSet) -> DaasResult<Grid2D> {
        let body = self.fetch(ResponseShape::GridScalar, interface, params).await?;
        decode_grid_scalar(&body)
    }

    pub async fn call_grid_vector2d(&self, interface: &str, params: &ParameterSet) -> DaasResult<GridVector> {
        let body = self.fetch(ResponseShape::GridVector, interface, params).await?;
        decode_grid_vector(&body)
    }

    pub async fn call_file_list(&self, interface: &str, params: &ParameterSet) -> DaasResult<Vec<FileRecord>> {
        let body = self.fetch(ResponseShape::FileList, interface, params).await?;
        decode_file_list(&body)
    }

    /// Downloads every file to `dir/<file name>` and records the local path.
    ///
    /// Only the last path component of the remote file name is used, so a file can never
    /// land outside `dir`.
    pub async fn download_files(&self, files: &mut [FileRecord], dir: &Path) -> DaasResult<()> {
        for file in files.iter_mut() {
            let url = Url::parse(&file.file_url).map_err(|e| {
                DaasError::MalformedPayload(format!("bad file url '{}': {}", file.file_url, e))
            })?;
            let name = Path::new(&file.file_name)
                .file_name()
                .ok_or_else(|| DaasError::MalformedPayload(format!("bad file name '{}'", file.file_name)))?;
            let dest = dir.join(name);
            let bytes = self.transport.download(&url, &dest).await?;
            info!("Downloaded {} ({} bytes)", dest.display(), bytes);
            file.local_path = Some(dest);
        }
        Ok(())
    }

    /// Runs one resolved call, including the ensemble member loop, and labels the result.
    pub async fn execute(&self, call: &ResolvedCall) -> DaasResult<Decoded> {
        let context = &call.context;
        match call.shape {
            ResponseShape::Table => {
                let table = self.call_array2d(&call.interface, &call.params, &context.index_col).await?;
                Ok(Decoded::Table(table))
            }
            ResponseShape::GridArray => match call.members {
                Some(count) => {
                    let mut grids = Vec::with_capacity(count.max(0) as usize);
                    for member in 0..count {
                        let params = if member == 0 {
                            call.params.clone()
                        } else {
                            call.params.clone().with("fcstLevel", member)
                        };
                        debug!("ensemble member {}/{}", member + 1, count);
                        grids.push(self.call_grid_array2d(&call.interface, &params).await?);
                    }
                    let labels = (0..count).collect();
                    Ok(Decoded::Grid(GridField::from_members(grids, Some(labels), context)?))
                }
                None => {
                    let grid = self.call_grid_array2d(&call.interface, &call.params).await?;
                    Ok(Decoded::Grid(GridField::from_grid(grid, context)?))
                }
            },
            ResponseShape::GridScalar => {
                let grid = self.call_grid_scalar2d(&call.interface, &call.params).await?;
                Ok(Decoded::Grid(GridField::from_grid(grid, context)?))
            }
            ResponseShape::GridVector => {
                let vector = self.call_grid_vector2d(&call.interface, &call.params).await?;
                Ok(Decoded::Vector(vector))
            }
            ResponseShape::FileList => {
                let mut files = self.call_file_list(&call.interface, &call.params).await?;
                if let Some(dir) = &context.download_dir {
                    self.download_files(&mut files, dir).await?;
                }
                Ok(Decoded::Files(files))
            }
        }
    }

    /// Expands, resolves, dispatches and optionally merges a request.
    ///
    /// Every atomic request is resolved before the first call is sent, so shape and
    /// family errors abort the whole selection up front.
    ///
    /// # Errors
    /// Pre-send errors from expansion or resolution, `AllRequestsFailed` when no call
    /// succeeded, and merge errors when `merge` is set.
    pub async fn select(&self, request: &SelectRequest) -> DaasResult<Selection> {
        let atoms = request.expand(&self.config)?;
        let calls = atoms.iter().map(resolve).collect::<DaasResult<Vec<_>>>()?;
        for (atom, call) in atoms.iter().zip(&calls) {
            debug!("{} -> {} {}", atom, call.shape, call.interface);
        }
        info!(
            "Dispatching {} requests with parallelism {}",
            atoms.len(),
            self.parallelism
        );

        let calls = &calls;
        let batch = run_batch(&atoms, self.parallelism, move |i| self.execute(&calls[i])).await?;

        if request.merge {
            let missing = batch.missing();
            let merged = merge(batch.into_successes(), request.inittime_count())?;
            return Ok(Selection::Merged { merged, missing });
        }
        if atoms.len() == 1 {
            let only = batch
                .into_successes()
                .into_iter()
                .next()
                .ok_or(DaasError::AllRequestsFailed(1))?;
            return Ok(Selection::One(only));
        }
        Ok(Selection::Batch(batch))
    }
}
