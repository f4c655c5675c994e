use miette::Diagnostic;
use serde_json::Value;
use thiserror::Error;

use crate::dispatcher::DispatchError;
use crate::dispatcher::DispatchReport;
use crate::dispatcher::DispatchRequest;
use crate::dispatcher::Dispatcher;
use crate::dispatcher::HttpMethod;
use crate::document::Editor;
use crate::document::EditorError;
use crate::document::Notice;

pub const READY: &str = "Ready. You can edit the JSON and send it.";
pub const NO_RESPONSE: &str = "(no response yet)";
pub const LOADING: &str = "Loading...";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub message: String,
    pub is_error: bool,
}

impl Status {
    pub fn info(message: impl AsRef<str>) -> Self {
        Self {
            message: format!("Status: {}", message.as_ref()),
            is_error: false,
        }
    }

    pub fn error(message: impl AsRef<str>) -> Self {
        Self {
            message: format!("Status: {}", message.as_ref()),
            is_error: true,
        }
    }
}

#[derive(Debug, Error, Diagnostic)]
pub enum SessionError {
    #[error("Busy: a request is already in progress.")]
    Busy,

    #[error(transparent)]
    #[diagnostic(transparent)]
    Editor(#[from] EditorError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

/// Everything the tool shows: the editor, the destination, the status line
/// and the last response. Each handler records its own status; none of
/// them run while a request is in flight.
#[derive(Debug)]
pub struct Session {
    editor: Editor,
    destination: String,
    status: Status,
    response: String,
    busy: bool,
}

impl Session {
    pub fn new(destination: impl Into<String>) -> Self {
        Self {
            editor: Editor::new(),
            destination: destination.into(),
            status: Status::info(READY),
            response: NO_RESPONSE.into(),
            busy: false,
        }
    }

    pub fn document(&self) -> &Value {
        self.editor.document()
    }

    pub fn text(&self) -> &str {
        self.editor.text()
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    pub fn response(&self) -> &str {
        &self.response
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn set_text(&mut self, text: impl Into<String>) -> Result<(), SessionError> {
        self.ensure_idle()?;
        self.editor.set_text(text);
        Ok(())
    }

    pub fn load_text(
        &mut self,
        source_name: impl Into<String>,
        text: impl Into<String>,
    ) -> Result<(), SessionError> {
        self.ensure_idle()?;
        self.editor.load_text(source_name, text);
        Ok(())
    }

    pub fn set_destination(&mut self, destination: impl Into<String>) -> Result<(), SessionError> {
        self.ensure_idle()?;
        self.destination = destination.into();
        Ok(())
    }

    pub fn apply(&mut self) -> Result<(), SessionError> {
        self.ensure_idle()?;
        let result = self.editor.apply();
        self.record(result)
    }

    pub fn validate(&mut self) -> Result<(), SessionError> {
        self.ensure_idle()?;
        let result = self.editor.validate();
        self.record(result)
    }

    pub fn clear(&mut self) -> Result<(), SessionError> {
        self.ensure_idle()?;
        let notice = self.editor.clear();
        self.record(Ok(notice))
    }

    pub fn reset(&mut self) -> Result<(), SessionError> {
        self.ensure_idle()?;
        let notice = self.editor.reset();
        self.record(Ok(notice))
    }

    /// Checks the destination and marks the session busy. The returned
    /// request owns a copy of the document, so the session stays readable
    /// while the request is in flight.
    pub fn begin_dispatch(&mut self, method: HttpMethod) -> Result<DispatchRequest, SessionError> {
        self.ensure_idle()?;

        let request =
            match DispatchRequest::new(&self.destination, method, self.editor.document().clone()) {
                Ok(request) => request,
                Err(err) => {
                    self.status = Status::error(err.to_string());
                    return Err(err.into());
                }
            };

        self.busy = true;
        self.response = LOADING.into();
        self.status = Status::info(format!("Sending {method} request..."));

        Ok(request)
    }

    pub fn finish_dispatch(&mut self, report: &DispatchReport) {
        let outcome = &report.outcome;

        self.status = if outcome.is_error {
            Status::error(&outcome.message)
        } else {
            Status::info(&outcome.message)
        };

        self.response = outcome.response.clone();

        self.busy = false;
    }

    /// Runs a whole dispatch against this session.
    pub async fn send(
        &mut self,
        dispatcher: &Dispatcher,
        method: HttpMethod,
    ) -> Result<DispatchReport, SessionError> {
        let request = self.begin_dispatch(method)?;
        let report = dispatcher.dispatch(&request).await;
        self.finish_dispatch(&report);

        Ok(report)
    }

    fn ensure_idle(&self) -> Result<(), SessionError> {
        if self.busy {
            return Err(SessionError::Busy);
        }

        Ok(())
    }

    fn record(&mut self, result: Result<Notice, EditorError>) -> Result<(), SessionError> {
        match result {
            Ok(notice) => {
                self.status = Status::info(notice.to_string());
                Ok(())
            }
            Err(err) => {
                self.status = Status::error(err.to_string());
                Err(err.into())
            }
        }
    }
}
