//! Orchestration of one user-initiated generation turn.
//!
//! A turn is `begin` → [`PendingTurn::run`] → `complete`. Every turn gets a
//! fresh [`TurnId`] and its outcome carries that id back, so a result that
//! arrives after the turn was abandoned or superseded is dropped instead of
//! overwriting newer state. [`GenerationSession::submit`] drives all three
//! steps on one task while the progress narrator ticks alongside the call.

use crate::artifact::{self, DecodedImage, DeliveryArtifact};
use crate::delivery::{self, ClientDirective, DeliveryMode};
use crate::error::{ErrorKind, ImgDropError, Result};
use crate::progress::ProgressNarrator;
use crate::synthesis::{Prompt, SynthesisRequest, SynthesisService};
use tokio::sync::watch;

/// Identifies one submission within a session.
pub type TurnId = u64;

/// Why a turn failed, in user-facing terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Failure {
    /// Error classification.
    pub kind: ErrorKind,
    /// Safe message for the end user.
    pub message: &'static str,
}

impl Failure {
    fn from_error(err: &ImgDropError) -> Self {
        let kind = err.kind();
        Self {
            kind,
            message: kind.user_message(),
        }
    }
}

/// Transient UI state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Nothing submitted yet, or the last turn was abandoned.
    #[default]
    Idle,
    /// A synthesis call is in flight.
    InProgress,
    /// The last turn produced an image and its download directives.
    Succeeded,
    /// The last turn failed.
    Failed(Failure),
}

impl SessionState {
    /// True while a turn is in flight.
    pub fn is_in_progress(&self) -> bool {
        matches!(self, Self::InProgress)
    }

    /// Failure kind, if the last turn failed.
    pub fn failure_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Failed(failure) => Some(failure.kind),
            _ => None,
        }
    }
}

/// Everything a successful turn hands to the presentation layer.
#[derive(Debug, Clone)]
pub struct TurnOutput {
    /// Image for display.
    pub image: DecodedImage,
    /// Packaged bytes and filename.
    pub artifact: DeliveryArtifact,
    /// Directive that saves the file without user action.
    pub auto: ClientDirective,
    /// Always-available explicit download control.
    pub manual: ClientDirective,
}

/// A started turn whose synthesis call has not run yet.
#[derive(Debug)]
#[must_use = "a pending turn does nothing until run"]
pub struct PendingTurn {
    turn: TurnId,
    request: SynthesisRequest,
}

impl PendingTurn {
    /// The turn this call belongs to.
    pub fn turn(&self) -> TurnId {
        self.turn
    }

    /// Performs the synthesis call and tags the result with this turn.
    pub async fn run<S>(self, service: &S) -> SynthesisOutcome
    where
        S: SynthesisService + ?Sized,
    {
        let result = service.synthesize(&self.request).await;
        if let Err(ref e) = result {
            tracing::error!(
                turn = self.turn,
                service = service.name(),
                "synthesis call failed: {e}"
            );
        }
        SynthesisOutcome {
            turn: self.turn,
            result,
        }
    }
}

/// Result of one synthesis call, tagged with its turn.
#[derive(Debug)]
pub struct SynthesisOutcome {
    /// Turn that issued the call.
    pub turn: TurnId,
    /// Raw image bytes or the call's error.
    pub result: Result<Vec<u8>>,
}

/// What `complete` did with an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The outcome belonged to the current turn and updated the state.
    Applied,
    /// The outcome was stale and ignored.
    Discarded,
}

/// Drives generation turns for one user and holds their transient state.
pub struct GenerationSession<S> {
    service: S,
    narrator: ProgressNarrator,
    state: SessionState,
    turn: TurnId,
    output: Option<TurnOutput>,
    max_payload: usize,
    progress_tx: watch::Sender<String>,
    progress_rx: watch::Receiver<String>,
}

impl<S: SynthesisService> GenerationSession<S> {
    /// Creates an idle session using the default progress messages.
    pub fn new(service: S) -> Self {
        let (progress_tx, progress_rx) = watch::channel(String::new());
        Self {
            service,
            narrator: ProgressNarrator::default(),
            state: SessionState::Idle,
            turn: 0,
            output: None,
            max_payload: delivery::DEFAULT_MAX_PAYLOAD,
            progress_tx,
            progress_rx,
        }
    }

    /// Replaces the progress message schedule.
    pub fn with_narrator(mut self, narrator: ProgressNarrator) -> Self {
        self.narrator = narrator;
        self
    }

    /// Caps the base64 payload a turn may inline into its directives.
    pub fn with_max_payload(mut self, max_payload: usize) -> Self {
        self.max_payload = max_payload;
        self
    }

    /// The synthesis service used for calls.
    pub fn service(&self) -> &S {
        &self.service
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Id of the most recently started turn (0 before the first).
    pub fn turn(&self) -> TurnId {
        self.turn
    }

    /// Output of the last successful turn.
    pub fn output(&self) -> Option<&TurnOutput> {
        self.output.as_ref()
    }

    /// Decoded image for display.
    pub fn image(&self) -> Option<&DecodedImage> {
        self.output.as_ref().map(|o| &o.image)
    }

    /// Packaged artifact of the last successful turn.
    pub fn artifact(&self) -> Option<&DeliveryArtifact> {
        self.output.as_ref().map(|o| &o.artifact)
    }

    /// Directive to embed so the browser saves the file on its own.
    pub fn auto_directive(&self) -> Option<&ClientDirective> {
        self.output.as_ref().map(|o| &o.auto)
    }

    /// Explicit download control bound to the same bytes.
    pub fn manual_directive(&self) -> Option<&ClientDirective> {
        self.output.as_ref().map(|o| &o.manual)
    }

    /// Subscribes to progress messages.
    pub fn progress(&self) -> watch::Receiver<String> {
        self.progress_rx.clone()
    }

    /// Latest progress message.
    pub fn progress_message(&self) -> String {
        self.progress_rx.borrow().clone()
    }

    /// Validates the prompt and starts a new turn.
    ///
    /// An empty prompt fails the session without contacting the service. While
    /// a turn is in flight this returns [`ImgDropError::Busy`] and changes
    /// nothing.
    pub fn begin(&mut self, prompt_text: &str) -> Result<PendingTurn> {
        if self.state.is_in_progress() {
            tracing::warn!(turn = self.turn, "submission ignored: generation already in progress");
            return Err(ImgDropError::Busy);
        }

        self.output = None;

        let prompt = match Prompt::parse(prompt_text) {
            Ok(prompt) => prompt,
            Err(e) => {
                tracing::warn!("user attempted to generate an image without entering a prompt");
                self.state = SessionState::Failed(Failure::from_error(&e));
                return Err(e);
            }
        };

        self.turn += 1;
        self.state = SessionState::InProgress;
        self.progress_tx.send_replace(String::new());
        tracing::info!(turn = self.turn, prompt = %prompt, "user prompt");

        Ok(PendingTurn {
            turn: self.turn,
            request: SynthesisRequest::new(prompt),
        })
    }

    /// Gives up on the in-flight turn, returning its id.
    ///
    /// The session goes back to idle; the abandoned call may still finish but
    /// its outcome will be discarded.
    pub fn abandon(&mut self) -> Option<TurnId> {
        if !self.state.is_in_progress() {
            return None;
        }
        tracing::info!(turn = self.turn, "turn abandoned");
        self.state = SessionState::Idle;
        Some(self.turn)
    }

    /// Applies a synthesis outcome if it belongs to the current turn.
    pub fn complete(&mut self, outcome: SynthesisOutcome) -> Completion {
        if outcome.turn != self.turn || !self.state.is_in_progress() {
            tracing::debug!(
                outcome_turn = outcome.turn,
                current_turn = self.turn,
                "discarding stale synthesis result"
            );
            return Completion::Discarded;
        }

        let delivered = outcome.result.and_then(|bytes| self.deliver(&bytes));
        match delivered {
            Ok(output) => {
                tracing::info!(
                    turn = self.turn,
                    filename = %output.artifact.filename,
                    width = output.image.width(),
                    height = output.image.height(),
                    "image generated and auto-download prepared"
                );
                self.output = Some(output);
                self.state = SessionState::Succeeded;
            }
            Err(e) => {
                tracing::error!(turn = self.turn, kind = %e.kind(), "generation failed: {e}");
                self.state = SessionState::Failed(Failure::from_error(&e));
            }
        }
        Completion::Applied
    }

    /// Runs one full turn: validate, call the service while narrating
    /// progress, then decode, package and build both directives.
    ///
    /// A submission made while another turn is in flight is ignored.
    pub async fn submit(&mut self, prompt_text: &str) -> SessionState {
        let pending = match self.begin(prompt_text) {
            Ok(pending) => pending,
            Err(_) => return self.state,
        };

        let mut narrator = self.narrator.clone();
        narrator.restart(tokio::time::Instant::now());

        let outcome = {
            let call = pending.run(&self.service);
            let narration = narrator.run(&self.progress_tx);
            tokio::pin!(call, narration);
            let mut narrating = true;
            loop {
                tokio::select! {
                    outcome = &mut call => break outcome,
                    _ = &mut narration, if narrating => narrating = false,
                }
            }
        };

        self.complete(outcome);
        self.state
    }

    fn deliver(&self, bytes: &[u8]) -> Result<TurnOutput> {
        let image = artifact::decode(bytes)?;
        let artifact = artifact::package(&image, chrono::Local::now())?;
        let auto = delivery::build_directive_within(&artifact, DeliveryMode::Auto, self.max_payload)?;
        let manual =
            delivery::build_directive_within(&artifact, DeliveryMode::Manual, self.max_payload)?;
        Ok(TurnOutput {
            image,
            artifact,
            auto,
            manual,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::{decode, is_artifact_filename, tests::red_png};
    use crate::progress::DEFAULT_MESSAGES;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    type Responder = dyn Fn(&str) -> Result<Vec<u8>> + Send + Sync;

    struct StubService {
        calls: AtomicUsize,
        delay: Duration,
        respond: Box<Responder>,
    }

    impl StubService {
        fn new(respond: impl Fn(&str) -> Result<Vec<u8>> + Send + Sync + 'static) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                delay: Duration::ZERO,
                respond: Box::new(respond),
            }
        }

        fn image() -> Self {
            Self::new(|_| Ok(red_png()))
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SynthesisService for StubService {
        async fn synthesize(&self, request: &SynthesisRequest) -> Result<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            (self.respond)(request.prompt().as_str())
        }

        fn name(&self) -> &str {
            "stub"
        }

        async fn health_check(&self) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_blank_prompts_never_reach_service() {
        let mut session = GenerationSession::new(StubService::image());
        for raw in ["", " ", "\n\t", "\u{3000}", "   \r\n "] {
            let state = session.submit(raw).await;
            assert_eq!(state.failure_kind(), Some(ErrorKind::EmptyPrompt));
        }
        assert_eq!(session.service().calls(), 0);
        assert_eq!(session.turn(), 0);
        assert!(session.output().is_none());
    }

    #[tokio::test]
    async fn test_red_bicycle_scenario() {
        let mut session = GenerationSession::new(StubService::image());
        let state = session.submit("a red bicycle").await;

        assert_eq!(state, SessionState::Succeeded);
        let image = session.image().unwrap();
        assert_eq!((image.width(), image.height()), (10, 10));

        let artifact = session.artifact().unwrap();
        assert!(is_artifact_filename(&artifact.filename));

        let fresh = decode(&red_png()).unwrap().to_png().unwrap();
        assert_eq!(artifact.png_bytes().unwrap(), fresh);
    }

    #[tokio::test]
    async fn test_success_offers_both_directives() {
        let mut session = GenerationSession::new(StubService::image());
        session.submit("a lighthouse").await;

        let auto = session.auto_directive().unwrap();
        let manual = session.manual_directive().unwrap();
        assert_eq!(auto.mode, DeliveryMode::Auto);
        assert_eq!(manual.mode, DeliveryMode::Manual);
        assert_eq!(auto.href(), manual.href());
        assert_eq!(auto.filename, manual.filename);
    }

    #[tokio::test]
    async fn test_transport_error_skips_packaging() {
        let service = StubService::new(|_| {
            Err(ImgDropError::Api {
                status: 503,
                message: "Model is currently loading".into(),
            })
        });
        let mut session = GenerationSession::new(service);
        let state = session.submit("a cat").await;

        match state {
            SessionState::Failed(failure) => {
                assert_eq!(failure.kind, ErrorKind::Transport);
                assert!(!failure.message.contains("loading"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert!(session.output().is_none());
        assert!(session.auto_directive().is_none());
        assert_eq!(session.service().calls(), 1);
    }

    #[tokio::test]
    async fn test_undecodable_bytes_fail_as_decode() {
        let service = StubService::new(|_| Ok(b"<html>not an image</html>".to_vec()));
        let mut session = GenerationSession::new(service);
        let state = session.submit("a cat").await;

        assert_eq!(state.failure_kind(), Some(ErrorKind::Decode));
        assert_ne!(state.failure_kind(), Some(ErrorKind::Transport));
        assert!(session.output().is_none());
    }

    #[tokio::test]
    async fn test_oversized_artifact_fails_as_delivery() {
        let mut session = GenerationSession::new(StubService::image()).with_max_payload(16);
        let state = session.submit("a red bicycle").await;

        assert_eq!(
            state,
            SessionState::Failed(Failure {
                kind: ErrorKind::Delivery,
                message: ErrorKind::Delivery.user_message(),
            })
        );
        assert!(session.output().is_none());
        assert!(session.manual_directive().is_none());
        assert_eq!(session.service().calls(), 1);

        // the limit only affects delivery; a roomier session succeeds
        let mut session = GenerationSession::new(StubService::image());
        assert_eq!(session.submit("a red bicycle").await, SessionState::Succeeded);
    }

    #[tokio::test]
    async fn test_failure_allows_resubmission() {
        let fail_first = AtomicUsize::new(0);
        let service = StubService::new(move |_| {
            if fail_first.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(ImgDropError::Unexpected("boom".into()))
            } else {
                Ok(red_png())
            }
        });
        let mut session = GenerationSession::new(service);

        let first = session.submit("a tree").await;
        assert_eq!(first.failure_kind(), Some(ErrorKind::Unexpected));

        let second = session.submit("a tree").await;
        assert_eq!(second, SessionState::Succeeded);
        assert_eq!(session.turn(), 2);
    }

    #[tokio::test]
    async fn test_new_prompt_discards_previous_image() {
        let mut session = GenerationSession::new(StubService::image());
        session.submit("first").await;
        assert!(session.image().is_some());

        let _pending = session.begin("second").unwrap();
        assert!(session.image().is_none());
        assert!(session.state().is_in_progress());
    }

    #[tokio::test]
    async fn test_begin_while_in_progress_is_rejected() {
        let mut session = GenerationSession::new(StubService::image());
        let pending = session.begin("first").unwrap();

        let err = session.begin("second").unwrap_err();
        assert!(matches!(err, ImgDropError::Busy));
        assert_eq!(session.turn(), pending.turn());
        assert_eq!(session.state(), SessionState::InProgress);

        let state_before = session.state();
        assert_eq!(session.submit("third").await, state_before);
        assert_eq!(session.service().calls(), 0);
    }

    #[tokio::test]
    async fn test_late_result_never_overwrites_newer_turn() {
        let service = Arc::new(StubService::new(|prompt| {
            if prompt == "first" {
                Err(ImgDropError::Unexpected("stale".into()))
            } else {
                Ok(red_png())
            }
        }));
        let mut session = GenerationSession::new(Arc::clone(&service));

        let first = session.begin("first").unwrap();
        assert_eq!(session.abandon(), Some(first.turn()));
        let second = session.begin("second").unwrap();
        assert_ne!(first.turn(), second.turn());

        let (late, fresh) = tokio::join!(first.run(&*service), second.run(&*service));

        assert_eq!(session.complete(fresh), Completion::Applied);
        assert_eq!(session.state(), SessionState::Succeeded);
        let filename = session.artifact().unwrap().filename.clone();

        assert_eq!(session.complete(late), Completion::Discarded);
        assert_eq!(session.state(), SessionState::Succeeded);
        assert_eq!(session.artifact().unwrap().filename, filename);
        assert_eq!(service.calls(), 2);
    }

    #[tokio::test]
    async fn test_abandoned_result_discarded_while_idle() {
        let mut session = GenerationSession::new(StubService::image());
        let pending = session.begin("first").unwrap();
        session.abandon();

        let outcome = pending.run(session.service()).await;
        assert_eq!(session.complete(outcome), Completion::Discarded);
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.output().is_none());
    }

    #[tokio::test]
    async fn test_abandon_when_idle_is_noop() {
        let mut session = GenerationSession::new(StubService::image());
        assert_eq!(session.abandon(), None);
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_advances_during_slow_call() {
        let service = StubService::image().with_delay(Duration::from_secs(12));
        let mut session = GenerationSession::new(service);
        let progress = session.progress();

        let state = session.submit("a slow sunset").await;

        assert_eq!(state, SessionState::Succeeded);
        assert_eq!(progress.borrow().as_str(), DEFAULT_MESSAGES[2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_narrator() {
        let narrator = ProgressNarrator::with_interval(["warming up", "almost"], Duration::from_secs(1));
        let service = StubService::image().with_delay(Duration::from_millis(1500));
        let mut session = GenerationSession::new(service).with_narrator(narrator);

        session.submit("a boat").await;
        assert_eq!(session.progress_message(), "almost");
    }
}
