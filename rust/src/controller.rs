use serde::Serialize;
use std::time::{Duration, Instant};

use crate::error::GenerationError;
use crate::form_state::{FormEdit, FormState};
use crate::generation_client::{GenerationRequest, GenerationResult};

pub const STATUS_READY: &str = "Ready.";
pub const STATUS_INITIALIZING: &str = "Initializing client...";
pub const STATUS_SENDING: &str = "Sending request to API...";
pub const STATUS_SUCCEEDED: &str = "Image generated successfully!";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Idle,
    Submitting,
    Success,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// Append-only during a request; reset only when a new submission starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLog {
    lines: Vec<String>,
}

impl StatusLog {
    pub fn new(initial: &str) -> Self {
        Self {
            lines: vec![initial.to_string()],
        }
    }

    pub fn reset(&mut self, initial: &str) {
        self.lines.clear();
        self.lines.push(initial.to_string());
    }

    pub fn push(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerState {
    pub form: FormState,
    pub api_key: String,
    pub phase: Phase,
    pub active_request: Option<u64>,
    pub result: Option<GenerationResult>,
    pub status_log: StatusLog,
    pub started_at: Option<Instant>,
    pub last_elapsed: Option<Duration>,
    next_request_id: u64,
}

impl ControllerState {
    pub fn new(form: FormState, api_key: String) -> Self {
        Self {
            form,
            api_key,
            phase: Phase::Idle,
            active_request: None,
            result: None,
            status_log: StatusLog::new(STATUS_READY),
            started_at: None,
            last_elapsed: None,
            next_request_id: 1,
        }
    }

    pub fn elapsed(&self, now: Instant) -> Option<Duration> {
        self.started_at
            .map(|started| now.saturating_duration_since(started))
    }
}

#[derive(Debug)]
pub enum Event {
    Submit,
    Completed {
        request_id: u64,
        outcome: Result<String, GenerationError>,
    },
    ApiKeyEntered(String),
    ApiKeyCleared,
    FormEdited(FormEdit),
    AspectRatioSelected(String),
    HighResolutionToggled(bool),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    SendRequest {
        request_id: u64,
        request: GenerationRequest,
        api_key: String,
    },
    StoreCredential(String),
    ClearCredential,
    PersistForm(FormState),
    Notify(Notice),
}

/// Computes the next state and the effects to run. Does no IO.
pub fn transition(
    state: &ControllerState,
    event: Event,
    now: Instant,
) -> (ControllerState, Vec<Effect>) {
    let mut next = state.clone();
    let mut effects = Vec::new();

    match event {
        Event::Submit => {
            if let Err(err) = validate_submission(state) {
                effects.push(Effect::Notify(Notice::error(err.to_string())));
                return (next, effects);
            }

            // A submission while another is in flight supersedes it; the old
            // completion is dropped by request id below.
            let request_id = next.next_request_id;
            next.next_request_id += 1;
            next.phase = Phase::Submitting;
            next.active_request = Some(request_id);
            next.result = None;
            next.started_at = Some(now);
            next.last_elapsed = None;
            next.status_log.reset(STATUS_INITIALIZING);
            next.status_log.push(STATUS_SENDING);

            effects.push(Effect::SendRequest {
                request_id,
                request: state.form.to_request(),
                api_key: state.api_key.clone(),
            });
        }
        Event::Completed {
            request_id,
            outcome,
        } => {
            if state.phase != Phase::Submitting || state.active_request != Some(request_id) {
                return (next, effects);
            }

            next.last_elapsed = state.elapsed(now);
            next.started_at = None;
            next.active_request = None;

            let result = GenerationResult::from(outcome);
            match result.image_error() {
                None => {
                    next.phase = Phase::Success;
                    next.status_log.push(STATUS_SUCCEEDED);
                    effects.push(Effect::Notify(Notice::success("Image generated!")));
                }
                Some(message) => {
                    next.phase = Phase::Failed;
                    next.status_log.push(format!("Error: {message}"));
                    effects.push(Effect::Notify(Notice::error(message)));
                }
            }
            next.result = Some(result);
        }
        Event::ApiKeyEntered(api_key) => {
            next.api_key = api_key.clone();
            effects.push(Effect::StoreCredential(api_key));
        }
        Event::ApiKeyCleared => {
            next.api_key.clear();
            effects.push(Effect::ClearCredential);
        }
        Event::FormEdited(edit) => {
            next.form.apply_edit(edit);
            effects.push(Effect::PersistForm(next.form.clone()));
        }
        Event::AspectRatioSelected(label) => {
            if next.form.select_aspect_ratio(&label) {
                effects.push(Effect::PersistForm(next.form.clone()));
            } else {
                effects.push(Effect::Notify(Notice::error(format!(
                    "Unknown aspect ratio: {label}"
                ))));
            }
        }
        Event::HighResolutionToggled(enabled) => {
            next.form.set_high_resolution(enabled);
            effects.push(Effect::PersistForm(next.form.clone()));
        }
    }

    (next, effects)
}

fn validate_submission(state: &ControllerState) -> Result<(), GenerationError> {
    if state.api_key.trim().is_empty() {
        return Err(GenerationError::Validation(
            "Please enter your API Key".to_string(),
        ));
    }
    if state.form.prompt.trim().is_empty() {
        return Err(GenerationError::Validation(
            "Please enter a prompt".to_string(),
        ));
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct GenerationController {
    state: ControllerState,
}

impl GenerationController {
    pub fn new(form: FormState, api_key: String) -> Self {
        Self {
            state: ControllerState::new(form, api_key),
        }
    }

    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    pub fn dispatch(&mut self, event: Event, now: Instant) -> Vec<Effect> {
        let (next, effects) = transition(&self.state, event, now);
        self.state = next;
        effects
    }
}

#[cfg(test)]
mod tests {
    use super::{
        transition, ControllerState, Effect, Event, GenerationController, NoticeLevel, Phase,
        STATUS_READY,
    };
    use crate::error::GenerationError;
    use crate::form_state::{FormEdit, FormState};
    use crate::generation_client::{interpret_response, GenerationResult};
    use reqwest::StatusCode;
    use std::time::{Duration, Instant};

    fn controller_with_key(api_key: &str) -> GenerationController {
        GenerationController::new(FormState::default(), api_key.to_string())
    }

    fn submit(controller: &mut GenerationController, now: Instant) -> u64 {
        let effects = controller.dispatch(Event::Submit, now);
        match effects.as_slice() {
            [Effect::SendRequest { request_id, .. }] => *request_id,
            other => panic!("expected a single send effect, got {other:?}"),
        }
    }

    fn complete_with(
        controller: &mut GenerationController,
        request_id: u64,
        status: StatusCode,
        body: &str,
    ) -> Vec<Effect> {
        controller.dispatch(
            Event::Completed {
                request_id,
                outcome: interpret_response(status, body),
            },
            Instant::now(),
        )
    }

    #[test]
    fn submit_without_key_stays_idle() {
        let mut controller = controller_with_key("");
        let effects = controller.dispatch(Event::Submit, Instant::now());

        assert_eq!(controller.state().phase, Phase::Idle);
        assert_eq!(controller.state().status_log.text(), STATUS_READY);
        assert!(controller.state().result.is_none());
        assert!(!effects
            .iter()
            .any(|effect| matches!(effect, Effect::SendRequest { .. })));
        assert!(matches!(
            effects.as_slice(),
            [Effect::Notify(notice)] if notice.level == NoticeLevel::Error
                && notice.message == "Please enter your API Key"
        ));
    }

    #[test]
    fn blank_prompt_is_rejected() {
        let mut controller = controller_with_key("abc123");
        controller.dispatch(
            Event::FormEdited(FormEdit {
                prompt: Some("   ".to_string()),
                ..FormEdit::default()
            }),
            Instant::now(),
        );
        let effects = controller.dispatch(Event::Submit, Instant::now());
        assert_eq!(controller.state().phase, Phase::Idle);
        assert!(matches!(effects.as_slice(), [Effect::Notify(_)]));
    }

    #[test]
    fn submit_sends_current_form_and_key() {
        let mut controller = controller_with_key("abc123");
        controller.dispatch(Event::AspectRatioSelected("16:9".to_string()), Instant::now());

        let effects = controller.dispatch(Event::Submit, Instant::now());
        let [Effect::SendRequest {
            request, api_key, ..
        }] = effects.as_slice()
        else {
            panic!("expected send effect, got {effects:?}");
        };
        assert_eq!(api_key, "abc123");
        assert_eq!((request.width, request.height), (1024, 576));

        let state = controller.state();
        assert_eq!(state.phase, Phase::Submitting);
        assert_eq!(
            state.status_log.lines(),
            ["Initializing client...", "Sending request to API..."]
        );
    }

    #[test]
    fn url_response_succeeds() {
        let mut controller = controller_with_key("abc123");
        let id = submit(&mut controller, Instant::now());
        let effects = complete_with(
            &mut controller,
            id,
            StatusCode::OK,
            r#"{"url":"https://x/y.png"}"#,
        );

        let state = controller.state();
        assert_eq!(state.phase, Phase::Success);
        assert_eq!(
            state.result.as_ref().and_then(GenerationResult::image_url),
            Some("https://x/y.png")
        );
        assert_eq!(
            state.status_log.lines().last().map(String::as_str),
            Some("Image generated successfully!")
        );
        assert!(state.started_at.is_none());
        assert!(state.last_elapsed.is_some());
        assert!(matches!(
            effects.as_slice(),
            [Effect::Notify(notice)] if notice.level == NoticeLevel::Success
        ));
    }

    #[test]
    fn base64_response_succeeds_with_data_uri() {
        let mut controller = controller_with_key("abc123");
        let id = submit(&mut controller, Instant::now());
        complete_with(
            &mut controller,
            id,
            StatusCode::OK,
            r#"{"b64_json":"iVBORw0KG..."}"#,
        );

        assert_eq!(controller.state().phase, Phase::Success);
        assert_eq!(
            controller
                .state()
                .result
                .as_ref()
                .and_then(GenerationResult::image_url),
            Some("data:image/png;base64,iVBORw0KG...")
        );
    }

    #[test]
    fn api_error_fails_with_message() {
        let mut controller = controller_with_key("abc123");
        let id = submit(&mut controller, Instant::now());
        complete_with(
            &mut controller,
            id,
            StatusCode::INTERNAL_SERVER_ERROR,
            r#"{"error":"rate limited"}"#,
        );

        let state = controller.state();
        assert_eq!(state.phase, Phase::Failed);
        assert_eq!(
            state.result.as_ref().and_then(GenerationResult::image_error),
            Some("rate limited")
        );
        assert_eq!(
            state.status_log.lines().last().map(String::as_str),
            Some("Error: rate limited")
        );
    }

    #[test]
    fn plain_text_body_fails_with_raw_text() {
        let mut controller = controller_with_key("abc123");
        let id = submit(&mut controller, Instant::now());
        complete_with(&mut controller, id, StatusCode::OK, "not json");

        assert_eq!(controller.state().phase, Phase::Failed);
        assert_eq!(
            controller
                .state()
                .result
                .as_ref()
                .and_then(GenerationResult::image_error),
            Some("not json")
        );
    }

    #[test]
    fn every_completion_leaves_exactly_one_result_field() {
        let cases = [
            (StatusCode::OK, r#"{"url":"https://x/y.png"}"#),
            (StatusCode::OK, r#"{"b64_json":"iVBORw0KGgo"}"#),
            (StatusCode::OK, "{}"),
            (StatusCode::OK, "<html>oops</html>"),
            (StatusCode::TOO_MANY_REQUESTS, r#"{"error":"slow down"}"#),
            (StatusCode::INTERNAL_SERVER_ERROR, ""),
        ];

        for (status, body) in cases {
            let mut controller = controller_with_key("abc123");
            let id = submit(&mut controller, Instant::now());
            complete_with(&mut controller, id, status, body);

            let result = controller.state().result.clone().expect("result present");
            let populated = [result.image_url().is_some(), result.image_error().is_some()];
            assert_eq!(populated.iter().filter(|set| **set).count(), 1, "{body}");
        }
    }

    #[test]
    fn resubmit_resets_image_and_log() {
        let mut controller = controller_with_key("abc123");
        let first = submit(&mut controller, Instant::now());
        complete_with(&mut controller, first, StatusCode::OK, "not json");
        assert_eq!(controller.state().phase, Phase::Failed);

        let second = submit(&mut controller, Instant::now());
        assert!(second > first);
        let state = controller.state();
        assert_eq!(state.phase, Phase::Submitting);
        assert!(state.result.is_none());
        assert_eq!(state.status_log.lines().len(), 2);
    }

    #[test]
    fn superseded_completion_is_ignored() {
        let mut controller = controller_with_key("abc123");
        let stale = submit(&mut controller, Instant::now());
        let current = submit(&mut controller, Instant::now());

        let effects = complete_with(
            &mut controller,
            stale,
            StatusCode::OK,
            r#"{"url":"https://x/old.png"}"#,
        );
        assert!(effects.is_empty());
        assert_eq!(controller.state().phase, Phase::Submitting);
        assert_eq!(controller.state().active_request, Some(current));

        complete_with(
            &mut controller,
            current,
            StatusCode::OK,
            r#"{"url":"https://x/new.png"}"#,
        );
        assert_eq!(
            controller
                .state()
                .result
                .as_ref()
                .and_then(GenerationResult::image_url),
            Some("https://x/new.png")
        );

        // A late duplicate after completion changes nothing either.
        let before = controller.state().clone();
        complete_with(&mut controller, current, StatusCode::OK, "not json");
        assert_eq!(controller.state(), &before);
    }

    #[test]
    fn elapsed_tracks_submitting_window() {
        let start = Instant::now();
        let state = ControllerState::new(FormState::default(), "abc123".to_string());
        let (state, effects) = transition(&state, Event::Submit, start);
        let Some(Effect::SendRequest { request_id, .. }) = effects.first() else {
            panic!("expected send effect");
        };

        let later = start + Duration::from_millis(1500);
        assert_eq!(state.elapsed(later), Some(Duration::from_millis(1500)));

        let (state, _) = transition(
            &state,
            Event::Completed {
                request_id: *request_id,
                outcome: Err(GenerationError::MalformedResponse),
            },
            later,
        );
        assert_eq!(state.elapsed(later), None);
        assert_eq!(state.last_elapsed, Some(Duration::from_millis(1500)));
    }

    #[test]
    fn api_key_events_emit_storage_effects() {
        let mut controller = controller_with_key("");
        let effects = controller.dispatch(
            Event::ApiKeyEntered("abc123".to_string()),
            Instant::now(),
        );
        assert_eq!(effects, vec![Effect::StoreCredential("abc123".to_string())]);
        assert_eq!(controller.state().api_key, "abc123");

        let effects = controller.dispatch(Event::ApiKeyCleared, Instant::now());
        assert_eq!(effects, vec![Effect::ClearCredential]);
        assert!(controller.state().api_key.is_empty());
    }

    #[test]
    fn form_events_persist_form() {
        let mut controller = controller_with_key("");
        let effects = controller.dispatch(Event::HighResolutionToggled(true), Instant::now());
        assert!(matches!(
            effects.as_slice(),
            [Effect::PersistForm(form)] if form.width == 2048 && form.height == 2048
        ));

        let effects = controller.dispatch(
            Event::AspectRatioSelected("7:5".to_string()),
            Instant::now(),
        );
        assert!(matches!(effects.as_slice(), [Effect::Notify(_)]));
        assert_eq!(controller.state().form.aspect_ratio, "1:1");
    }
}
