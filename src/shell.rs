use std::io::BufRead;
use std::path::PathBuf;

use flume::Receiver;

use crate::dispatcher::DispatchRequest;
use crate::dispatcher::Dispatcher;
use crate::dispatcher::HttpMethod;
use crate::document::EditorError;
use crate::outputter::OutPutter;
use crate::session::Session;
use crate::session::SessionError;

const END_OF_EDIT: &str = ".";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Show,
    Buffer,
    Edit,
    Load(PathBuf),
    Apply,
    Validate,
    Clear,
    Reset,
    Url(Option<String>),
    Send(Option<HttpMethod>),
    Response,
    Status,
    Help,
    Quit,
    Nothing,
}

pub fn parse_command(line: &str) -> Result<Command, String> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let command = match word.to_lowercase().as_str() {
        "" => Command::Nothing,
        "show" => Command::Show,
        "buffer" => Command::Buffer,
        "edit" => Command::Edit,
        "load" if rest.is_empty() => return Err("Usage: load <path>".into()),
        "load" => Command::Load(PathBuf::from(rest)),
        "apply" => Command::Apply,
        "validate" => Command::Validate,
        "clear" => Command::Clear,
        "reset" => Command::Reset,
        "url" if rest.is_empty() => Command::Url(None),
        "url" => Command::Url(Some(rest.to_string())),
        "post" => Command::Send(Some(HttpMethod::Post)),
        "get" => Command::Send(Some(HttpMethod::Get)),
        "send" => Command::Send(None),
        "response" => Command::Response,
        "status" => Command::Status,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => return Err(format!("Unknown command `{other}`, type `help`")),
    };

    Ok(command)
}

pub enum Step {
    Continue,
    Dispatch(DispatchRequest),
    Quit,
}

/// Interactive front end over a [`Session`]. Lines arrive on a channel so a
/// request in flight can keep rejecting input instead of queueing it.
pub struct Shell {
    session: Session,
    dispatcher: Dispatcher,
    default_method: HttpMethod,
    pending_edit: Option<String>,
    out: OutPutter,
}

impl Shell {
    pub fn new(session: Session, dispatcher: Dispatcher, default_method: HttpMethod) -> Self {
        Self {
            session,
            dispatcher,
            default_method,
            pending_edit: None,
            out: OutPutter::new(),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn handle_line(&mut self, line: &str) -> Step {
        if let Some(buffer) = self.pending_edit.as_mut() {
            if line.trim_end() != END_OF_EDIT {
                buffer.push_str(line);
                buffer.push('\n');
                return Step::Continue;
            }

            let text = self.pending_edit.take().unwrap_or_default();
            if let Err(err) = self.session.set_text(text) {
                self.report(err);
            }
            return Step::Continue;
        }

        let command = match parse_command(line) {
            Ok(command) => command,
            Err(message) => {
                self.out.rejected(&message);
                return Step::Continue;
            }
        };

        self.execute(command)
    }

    fn execute(&mut self, command: Command) -> Step {
        let echo_status = matches!(
            command,
            Command::Apply | Command::Validate | Command::Clear | Command::Reset
        );

        let result = match command {
            Command::Nothing => Ok(()),
            Command::Show => {
                self.out.document("Current JSON Data", self.session.document());
                Ok(())
            }
            Command::Buffer => {
                self.out.buffer(self.session.text());
                Ok(())
            }
            Command::Edit => {
                if self.session.is_busy() {
                    Err(SessionError::Busy)
                } else {
                    self.out.line("Enter JSON, finish with a line containing only `.`");
                    self.pending_edit = Some(String::new());
                    Ok(())
                }
            }
            Command::Load(path) => match std::fs::read_to_string(&path) {
                Ok(text) => self
                    .session
                    .load_text(path.display().to_string(), text)
                    .map(|_| self.out.line(&format!("Loaded {} into the edit buffer", path.display()))),
                Err(err) => {
                    self.out
                        .rejected(&format!("Failed to read {}: {err}", path.display()));
                    Ok(())
                }
            },
            Command::Apply => self.session.apply(),
            Command::Validate => self.session.validate(),
            Command::Clear => self.session.clear(),
            Command::Reset => self.session.reset(),
            Command::Url(None) => {
                self.out.line(self.session.destination());
                Ok(())
            }
            Command::Url(Some(url)) => self
                .session
                .set_destination(url)
                .map(|_| self.out.line(&format!("Destination: {}", self.session.destination()))),
            Command::Send(method) => {
                let method = method.unwrap_or(self.default_method);
                match self.session.begin_dispatch(method) {
                    Ok(request) => {
                        self.out.status(self.session.status());
                        return Step::Dispatch(request);
                    }
                    Err(err) => Err(err),
                }
            }
            Command::Response => {
                self.out.response(self.session.response());
                Ok(())
            }
            Command::Status => {
                self.out.status(self.session.status());
                Ok(())
            }
            Command::Help => {
                self.out.help();
                Ok(())
            }
            Command::Quit => return Step::Quit,
        };

        match result {
            Ok(()) if echo_status => self.out.status(self.session.status()),
            Ok(()) => {}
            Err(err) => self.report(err),
        }

        Step::Continue
    }

    fn report(&self, err: SessionError) {
        match err {
            SessionError::Busy => self.out.rejected(&SessionError::Busy.to_string()),
            SessionError::Editor(err @ EditorError::InvalidJson(_)) => {
                self.out.status(self.session.status());
                self.out.diagnostic(miette::Report::new(err));
            }
            SessionError::Editor(_) | SessionError::Dispatch(_) => {
                self.out.status(self.session.status())
            }
        }
    }

    /// Drives the shell until `quit` or end of input and hands back the
    /// session. A request in flight always finishes before this returns.
    pub async fn run(mut self, rx: Receiver<String>) -> Session {
        self.out
            .banner(self.session.destination(), self.dispatcher.relay());
        self.out.status(self.session.status());

        while let Ok(line) = rx.recv_async().await {
            let request = match self.handle_line(&line) {
                Step::Continue => continue,
                Step::Quit => break,
                Step::Dispatch(request) => request,
            };

            let dispatcher = self.dispatcher.clone();
            let dispatch = dispatcher.dispatch(&request);
            tokio::pin!(dispatch);

            let mut closed = false;
            let mut quit = false;
            let report = loop {
                tokio::select! {
                    report = &mut dispatch => break report,
                    line = rx.recv_async(), if !closed && !quit => match line {
                        Ok(line) => match self.handle_line(&line) {
                            Step::Quit => quit = true,
                            Step::Continue | Step::Dispatch(_) => {}
                        },
                        Err(_) => closed = true,
                    },
                }
            };

            self.session.finish_dispatch(&report);
            self.out.attempts(&report.attempts);
            self.out.status(self.session.status());
            self.out.response(self.session.response());

            if closed || quit {
                break;
            }
        }

        self.session
    }
}

/// Reads stdin on a plain thread; a blocking read must not hold up runtime
/// shutdown.
pub fn spawn_stdin_reader() -> Receiver<String> {
    let (tx, rx) = flume::unbounded();

    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });

    rx
}
