pub mod app;
pub mod commands;
pub mod dispatch;
pub mod env;
pub mod info;
pub mod output;
pub mod run;
pub mod runtime;
pub mod state;
pub mod validate;
