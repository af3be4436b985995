//! Ask command handler.
//!
//! Answers one or more questions through the pipeline. Several questions are
//! submitted together, so they share the admission queue and rate limiter.

use clap::Args;
use futures::future::join_all;
use veritas_core::{config::AppConfig, AppResult};
use veritas_rag::{Answer, RagPipeline};

/// Answer one or more questions
#[derive(Args, Debug)]
pub struct AskCommand {
    /// Questions to answer
    #[arg(required = true)]
    pub questions: Vec<String>,

    /// Output answers as JSON
    #[arg(long)]
    pub json: bool,

    /// Print pipeline statistics after answering
    #[arg(long)]
    pub stats: bool,
}

impl AskCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command with {} question(s)", self.questions.len());

        let pipeline = RagPipeline::from_config(config).await?;

        let answers: Vec<Answer> = join_all(
            self.questions
                .iter()
                .map(|question| pipeline.answer(question, &[])),
        )
        .await;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&answers)?);
        } else {
            for (question, answer) in self.questions.iter().zip(&answers) {
                if self.questions.len() > 1 {
                    println!("Q: {}", question);
                }
                print_answer(answer);
            }
        }

        if self.stats {
            println!("{}", serde_json::to_string_pretty(&pipeline.stats())?);
        }

        Ok(())
    }
}

/// Plain-text rendering: the answer, then a one-line provenance footer.
pub fn print_answer(answer: &Answer) {
    println!("{}", answer.text);
    println!(
        "-- {} | confidence {:.2} | {} ms",
        answer.source_label, answer.confidence, answer.response_time_ms
    );

    if !answer.suggested_questions.is_empty() {
        println!("Related questions:");
        for suggestion in &answer.suggested_questions {
            println!("  - {}", suggestion);
        }
    }
    println!();
}
