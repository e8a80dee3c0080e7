//! ResumeFlow - resume and job description analysis on top of Gemini
//!
//! Sends a resume (PDF pages rendered to JPEG, an image, or plain text) plus
//! a task prompt to a generative model with bounded retry, keeps a small JSON
//! log of interactions, and renders the returned markdown as a styled PDF.

pub mod ai;
pub mod analysis;
pub mod app;
pub mod error;
pub mod history;
pub mod image;
pub mod models;
pub mod prompts;
pub mod render;

pub use error::{Error, ErrorKind, Result};
