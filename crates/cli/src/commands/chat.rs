//! Chat command handler.
//!
//! Line-based conversation. Each exchange is appended to the history the
//! generator sees on the next turn.

use crate::commands::ask::print_answer;
use clap::Args;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use veritas_core::{config::AppConfig, AppResult};
use veritas_llm::ChatMessage;
use veritas_rag::{RagPipeline, SourceLabel};

/// Interactive conversation with history
#[derive(Args, Debug)]
pub struct ChatCommand {
    /// Maximum number of stored history messages (oldest dropped first)
    #[arg(long, default_value = "20")]
    pub max_history: usize,
}

impl ChatCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing chat command");

        let pipeline = RagPipeline::from_config(config).await?;
        let mut history: Vec<ChatMessage> = Vec::new();

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stdout = tokio::io::stdout();

        println!("Ask a question. /stats shows pipeline statistics, /quit exits.");

        loop {
            stdout.write_all(b"> ").await?;
            stdout.flush().await?;

            let Some(line) = lines.next_line().await? else {
                break;
            };
            let line = line.trim();

            match line {
                "" => continue,
                "/quit" | "/exit" => break,
                "/stats" => {
                    println!("{}", serde_json::to_string_pretty(&pipeline.stats())?);
                    continue;
                }
                _ => {}
            }

            let answer = pipeline.answer(line, &history).await;
            print_answer(&answer);

            // Failed turns are not worth conditioning the next answer on
            if answer.source_label != SourceLabel::Error {
                history.push(ChatMessage::user(line));
                history.push(ChatMessage::assistant(answer.text));
                trim_history(&mut history, self.max_history);
            }
        }

        Ok(())
    }
}

fn trim_history(history: &mut Vec<ChatMessage>, max: usize) {
    if history.len() > max {
        let excess = history.len() - max;
        history.drain(..excess);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trim_history_drops_oldest() {
        let mut history: Vec<ChatMessage> = (0..6)
            .map(|i| ChatMessage::user(format!("turn {}", i)))
            .collect();
        trim_history(&mut history, 4);
        assert_eq!(history.len(), 4);
        assert_eq!(history[0].content, "turn 2");

        trim_history(&mut history, 10);
        assert_eq!(history.len(), 4);
    }
}
