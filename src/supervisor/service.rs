//! The supervisor itself.

use std::time::{Duration, Instant};

use futures::{Stream, StreamExt};

use super::errors::SupervisorError;
use super::state::SupervisorState;
use crate::config::ServeConfig;
use crate::inference::{GenerateParameters, TgiClient};
use crate::launcher::{await_ready, LaunchCommand, LauncherHandle, ReadinessPolicy};
use crate::prompt::render_prompt;

// ─── Supervisor ──────────────────────────────────────────────────────────────

/// Owns the inference-server process and the client that talks to it.
///
/// Generation takes `&self` and may run concurrently; the server batches
/// requests itself, so there is no local lock or queue.
#[derive(Debug)]
pub struct Supervisor {
    config: ServeConfig,
    client: TgiClient,
    launcher: Option<LauncherHandle>,
    state: SupervisorState,
}

impl Supervisor {
    /// Build a supervisor. Nothing is launched until [`Supervisor::launch`].
    pub fn new(config: ServeConfig) -> Result<Self, SupervisorError> {
        let client = TgiClient::new(
            config.base_url(),
            Duration::from_secs(config.client.request_timeout_secs),
            Duration::from_secs(config.client.stream_timeout_secs),
        )?;

        Ok(Self {
            config,
            client,
            launcher: None,
            state: SupervisorState::Uninitialized,
        })
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    pub fn config(&self) -> &ServeConfig {
        &self.config
    }

    pub fn client(&self) -> &TgiClient {
        &self.client
    }

    /// OS process id of the launcher, while it is owned.
    pub fn launcher_pid(&self) -> Option<u32> {
        self.launcher.as_ref().and_then(LauncherHandle::pid)
    }

    // ─── Lifecycle ───────────────────────────────────────────────────────

    /// Start the configured launcher and block until it accepts connections.
    pub async fn launch(&mut self) -> Result<(), SupervisorError> {
        let command = self.config.launch_command();
        self.launch_with(&command).await
    }

    /// Like [`Supervisor::launch`], with an explicit command line.
    ///
    /// Readiness is still checked against the configured host and port.
    pub async fn launch_with(&mut self, command: &LaunchCommand) -> Result<(), SupervisorError> {
        if self.state != SupervisorState::Uninitialized {
            return Err(SupervisorError::AlreadyStarted { state: self.state });
        }
        self.state = SupervisorState::Launching;

        let mut handle = match LauncherHandle::start(command) {
            Ok(handle) => handle,
            Err(e) => {
                self.state = SupervisorState::Failed { exit_code: None };
                return Err(e.into());
            }
        };

        let host = self.config.readiness.host.clone();
        let port = self.config.launcher.port;
        let policy = ReadinessPolicy {
            poll_interval: self.config.poll_interval(),
            connect_timeout: self.config.connect_timeout(),
            timeout: self.config.ready_timeout(),
        };

        tracing::info!(
            model_id = %self.config.launcher.model_id,
            host = %host,
            port,
            "waiting for webserver to start"
        );

        match await_ready(&mut handle, &host, port, &policy).await {
            Ok(()) => {
                self.launcher = Some(handle);
                self.state = SupervisorState::Ready;
                Ok(())
            }
            Err(e) => {
                self.state = SupervisorState::Failed {
                    exit_code: e.launch_exit_code().flatten(),
                };
                handle.shutdown(self.config.shutdown_grace()).await;
                Err(e.into())
            }
        }
    }

    /// Send the termination signal. Later calls do nothing.
    pub fn stop(&mut self) {
        if let Some(handle) = self.launcher.as_mut() {
            handle.stop();
        }
        if self.state == SupervisorState::Ready {
            self.state = SupervisorState::Terminated;
        }
    }

    /// Stop and wait for the launcher to exit, force-killing after the
    /// configured grace period.
    pub async fn shutdown(&mut self) {
        if let Some(mut handle) = self.launcher.take() {
            handle.shutdown(self.config.shutdown_grace()).await;
        }
        if self.state == SupervisorState::Ready {
            self.state = SupervisorState::Terminated;
        }
    }

    fn ensure_ready(&self) -> Result<(), SupervisorError> {
        if self.state.is_ready() {
            Ok(())
        } else {
            Err(SupervisorError::NotReady { state: self.state })
        }
    }

    fn parameters(&self) -> GenerateParameters {
        GenerateParameters::with_max_new_tokens(self.config.client.max_new_tokens)
    }

    // ─── Generation ──────────────────────────────────────────────────────

    /// Render the prompt and return the full generated text.
    pub async fn generate(
        &self,
        question: &str,
        schema_metadata: &str,
    ) -> Result<String, SupervisorError> {
        self.ensure_ready()?;

        let prompt = render_prompt(question, schema_metadata);
        tracing::info!(question_chars = question.len(), "generating");
        let start = Instant::now();

        let response = self.client.generate(&prompt, self.parameters()).await?;

        tracing::info!(
            output_chars = response.generated_text.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "generated"
        );
        Ok(response.generated_text)
    }

    /// Render the prompt and stream the text of each non-special token in
    /// arrival order.
    ///
    /// Dropping the stream abandons the request; the launcher is unaffected.
    pub async fn generate_stream(
        &self,
        question: &str,
        schema_metadata: &str,
    ) -> Result<impl Stream<Item = Result<String, SupervisorError>> + Send + 'static, SupervisorError>
    {
        self.ensure_ready()?;

        let prompt = render_prompt(question, schema_metadata);
        tracing::info!(question_chars = question.len(), "generating (streaming)");

        let events = self.client.generate_stream(&prompt, self.parameters()).await?;

        Ok(events.filter_map(|event| async move {
            match event {
                Ok(event) if event.token.special => None,
                Ok(event) => Some(Ok(event.token.text)),
                Err(e) => Some(Err(SupervisorError::from(e))),
            }
        }))
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
