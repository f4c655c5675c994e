pub mod cli;
pub mod config;
pub mod dispatcher;
pub mod document;
pub mod outputter;
pub mod relay;
pub mod session;
pub mod shell;
pub mod validator;
pub mod viewer;
