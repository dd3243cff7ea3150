//! Interactive question answering over the index.
//!
//! Each turn runs retrieve → rerank → complete → render. A failed turn
//! prints one diagnostic line and the loop goes back to the prompt; only
//! `exit`, end of input, or Ctrl-C end the session.
//!
//! The spinner runs while the turn's network calls are in flight and is
//! always stopped and joined before anything else is written.

use anyhow::{bail, Context, Result};
use std::fmt;
use std::future::Future;
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::chat::{self, ChatModel, OpenAiChat};
use crate::config::{Config, Credentials};
use crate::embedding::HttpEmbedder;
use crate::models::RerankedDocument;
use crate::progress::Spinner;
use crate::render::Renderer;
use crate::rerank::{Reranker, VoyageReranker};
use crate::store::{SqliteStore, Store};

const PROMPT: &str = "> ";

/// What a line of input asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Exit,
    /// Blank line; nothing to do.
    Skip,
    Ask(String),
}

pub fn parse_command(line: &str) -> Command {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        Command::Skip
    } else if trimmed.eq_ignore_ascii_case("exit") {
        Command::Exit
    } else {
        Command::Ask(trimmed.to_string())
    }
}

/// Why the loop ended. Every reason is a clean exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    Requested,
    EndOfInput,
    Interrupted,
}

impl ExitReason {
    pub fn farewell(self) -> &'static str {
        match self {
            ExitReason::Requested | ExitReason::EndOfInput => "Goodbye!",
            ExitReason::Interrupted => "Exiting...",
        }
    }
}

/// A query turn that could not produce a response.
#[derive(Debug)]
pub enum TurnError {
    Search(anyhow::Error),
    NoDocuments,
    Rerank(anyhow::Error),
    Completion(anyhow::Error),
}

impl fmt::Display for TurnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnError::Search(e) => write!(f, "search failed: {:#}", e),
            TurnError::NoDocuments => {
                write!(f, "no indexed documents matched; run 'repochat index' first")
            }
            TurnError::Rerank(e) => write!(f, "rerank failed: {:#}", e),
            TurnError::Completion(e) => write!(f, "completion failed: {:#}", e),
        }
    }
}

impl std::error::Error for TurnError {}

pub struct QueryLoop {
    store: Arc<dyn Store>,
    reranker: Arc<dyn Reranker>,
    chat: Arc<dyn ChatModel>,
    renderer: Renderer,
    candidate_k: usize,
    top_k: usize,
    spinner: fn() -> Spinner,
}

impl QueryLoop {
    pub fn new(
        store: Arc<dyn Store>,
        reranker: Arc<dyn Reranker>,
        chat: Arc<dyn ChatModel>,
        renderer: Renderer,
    ) -> Self {
        Self {
            store,
            reranker,
            chat,
            renderer,
            candidate_k: 50,
            top_k: 5,
            spinner: Spinner::stderr,
        }
    }

    pub fn with_limits(mut self, candidate_k: usize, top_k: usize) -> Self {
        self.candidate_k = candidate_k;
        self.top_k = top_k;
        self
    }

    /// Replace the stderr spinner, e.g. with [`Spinner::disabled`].
    pub fn with_spinner(mut self, spinner: fn() -> Spinner) -> Self {
        self.spinner = spinner;
        self
    }

    /// Retrieve, rerank and complete one question.
    pub async fn answer(&self, query: &str) -> Result<String, TurnError> {
        let retrieved = self
            .store
            .search(query, self.candidate_k)
            .await
            .map_err(TurnError::Search)?;
        if retrieved.is_empty() {
            return Err(TurnError::NoDocuments);
        }
        tracing::debug!(candidates = retrieved.len(), "retrieved");

        let texts: Vec<String> = retrieved.iter().map(|d| d.rerank_text()).collect();
        let hits = self
            .reranker
            .rerank(query, &texts, self.top_k)
            .await
            .map_err(TurnError::Rerank)?;

        let reranked: Vec<RerankedDocument> = hits
            .into_iter()
            .filter_map(|hit| {
                let doc = retrieved.get(hit.index)?;
                Some(RerankedDocument {
                    identifier: doc.identifier.clone(),
                    text: texts[hit.index].clone(),
                    relevance: hit.relevance,
                })
            })
            .collect();
        for doc in &reranked {
            tracing::debug!(path = %doc.identifier, relevance = doc.relevance, "context");
        }

        let system = chat::system_instruction(&reranked);
        self.chat
            .complete(&system, query)
            .await
            .map_err(TurnError::Completion)
    }

    /// One-shot mode: answer `query` and render it, or return the failure.
    /// Ctrl-C abandons the turn and prints the farewell.
    pub async fn ask_once<W: Write>(&self, query: &str, out: &mut W) -> Result<()> {
        self.ask_once_until(query, out, ctrl_c()).await
    }

    /// Like [`ask_once`](Self::ask_once) with an explicit interrupt future.
    pub async fn ask_once_until<W, F>(&self, query: &str, out: &mut W, interrupt: F) -> Result<()>
    where
        W: Write,
        F: Future<Output = ()>,
    {
        let query = query.trim();
        if query.is_empty() {
            bail!("Question is empty");
        }
        let spinner = (self.spinner)();
        let result = tokio::select! {
            biased;
            _ = interrupt => None,
            result = self.answer(query) => Some(result),
        };
        spinner.stop().await;

        let Some(result) = result else {
            writeln!(out, "{}", ExitReason::Interrupted.farewell())?;
            out.flush()?;
            return Ok(());
        };
        self.renderer.render(&result?, out)?;
        Ok(())
    }

    /// Interactive loop on `input`, ending on `exit`, end of input or Ctrl-C.
    pub async fn run<R, W, E>(&self, input: R, out: &mut W, err: &mut E) -> Result<ExitReason>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
        E: Write,
    {
        self.run_until(input, out, err, ctrl_c()).await
    }

    /// Like [`run`](Self::run) with an explicit interrupt future.
    pub async fn run_until<R, W, E, F>(
        &self,
        input: R,
        out: &mut W,
        err: &mut E,
        interrupt: F,
    ) -> Result<ExitReason>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
        E: Write,
        F: Future<Output = ()>,
    {
        tokio::pin!(interrupt);
        let mut lines = input.lines();

        let reason = loop {
            write!(out, "{}", PROMPT)?;
            out.flush()?;

            let line = tokio::select! {
                biased;
                _ = &mut interrupt => break ExitReason::Interrupted,
                line = lines.next_line() => line.context("Failed to read input")?,
            };
            let Some(line) = line else {
                break ExitReason::EndOfInput;
            };

            let query = match parse_command(&line) {
                Command::Exit => break ExitReason::Requested,
                Command::Skip => continue,
                Command::Ask(query) => query,
            };

            let spinner = (self.spinner)();
            let result = tokio::select! {
                biased;
                _ = &mut interrupt => None,
                result = self.answer(&query) => Some(result),
            };
            spinner.stop().await;

            match result {
                None => break ExitReason::Interrupted,
                Some(Ok(response)) => self.renderer.render(&response, out)?,
                Some(Err(e)) => {
                    writeln!(err, "error: {}", e)?;
                    err.flush()?;
                }
            }
        };

        if reason != ExitReason::Requested {
            writeln!(out)?;
        }
        writeln!(out, "{}", reason.farewell())?;
        out.flush()?;
        Ok(reason)
    }
}

/// Resolves on Ctrl-C; never resolves if no handler can be installed.
async fn ctrl_c() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// `repochat ask`: build the live collaborators and answer one question or
/// start the interactive loop.
pub async fn run_ask(config: &Config, question: Option<String>, color: bool) -> Result<()> {
    let credentials = Credentials::from_env()?;

    let embedder = Arc::new(HttpEmbedder::new(
        &config.embedding,
        credentials.voyage_api_key.clone(),
    )?);
    let store = SqliteStore::open(&config.db.path, embedder).await?;
    let reranker = VoyageReranker::new(&config.rerank, credentials.voyage_api_key.clone())?;
    let chat = OpenAiChat::new(&config.chat, credentials.openai_api_key.clone())?;

    let query_loop = QueryLoop::new(
        Arc::new(store),
        Arc::new(reranker),
        Arc::new(chat),
        Renderer::new(color),
    )
    .with_limits(config.retrieval.candidate_k, config.rerank.top_k);

    let mut stdout = std::io::stdout();
    match question {
        Some(question) => query_loop.ask_once(&question, &mut stdout).await,
        None => {
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            let reason = query_loop
                .run(stdin, &mut stdout, &mut std::io::stderr())
                .await?;
            tracing::debug!(?reason, "session ended");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_is_case_insensitive() {
        assert_eq!(parse_command("exit"), Command::Exit);
        assert_eq!(parse_command("EXIT"), Command::Exit);
        assert_eq!(parse_command("  Exit \n"), Command::Exit);
    }

    #[test]
    fn blank_lines_are_skipped() {
        assert_eq!(parse_command(""), Command::Skip);
        assert_eq!(parse_command("   \t"), Command::Skip);
    }

    #[test]
    fn questions_are_trimmed() {
        assert_eq!(
            parse_command("  where is auth?  "),
            Command::Ask("where is auth?".to_string())
        );
        assert_eq!(
            parse_command("exit now"),
            Command::Ask("exit now".to_string())
        );
    }

    #[test]
    fn diagnostics_name_the_stage() {
        let e = TurnError::Search(anyhow::anyhow!("connection refused"));
        assert_eq!(e.to_string(), "search failed: connection refused");
        assert_eq!(
            TurnError::NoDocuments.to_string(),
            "no indexed documents matched; run 'repochat index' first"
        );
        let e = TurnError::Completion(anyhow::anyhow!("timeout"));
        assert_eq!(e.to_string(), "completion failed: timeout");
    }

    #[test]
    fn farewells() {
        assert_eq!(ExitReason::Requested.farewell(), "Goodbye!");
        assert_eq!(ExitReason::EndOfInput.farewell(), "Goodbye!");
        assert_eq!(ExitReason::Interrupted.farewell(), "Exiting...");
    }
}
