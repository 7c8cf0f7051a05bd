//! The bounded two-agent dialogue every phase runs.

use made_core::{Message, Sender, TokenUsage};

use super::PhaseRunResult;
use crate::agent::{Agent, AgentBackend};
use crate::error::Result;
use crate::spec::PhaseSpec;
use crate::template::{TemplateValues, render};
use crate::termination::Termination;

/// Runs one dialogue to completion.
///
/// The user agent opens with the rendered phase prompt; that seeded message is
/// the user half of the first exchange. Each exchange then ends with an
/// assistant turn, which is checked against the termination predicate before
/// the turn limit, so a marker on the last allowed turn still concludes.
///
/// # Errors
/// Fails on unresolved template placeholders or when either agent's
/// generation call gives up. Nothing is retried at the turn level.
pub async fn run_dialogue(
    phase: &str,
    spec: &PhaseSpec,
    values: &TemplateValues,
    backend: &AgentBackend,
) -> Result<PhaseRunResult> {
    let assistant_prompt = render(&spec.assistant().prompt, values)?;
    let user_prompt = render(&spec.user().prompt, values)?;
    let opening = render(spec.phase_prompt(), values)?;

    let mut assistant = Agent::new(
        spec.assistant().name.clone(),
        Sender::Assistant,
        assistant_prompt,
        backend.clone(),
        spec.sampling(),
    );
    let mut user = Agent::new(
        spec.user().name.clone(),
        Sender::User,
        user_prompt,
        backend.clone(),
        spec.sampling(),
    );

    let limit = spec.chat_turn_limit();
    let termination = spec.termination();
    let mut next: Message = user.seed(opening);
    let mut transcript = vec![next.clone()];

    let mut exchange: u32 = 1;
    let (conclusion, how) = loop {
        let reply = assistant.send(Some(next)).await?;
        transcript.push(reply.clone());
        tracing::debug!(
            phase,
            exchange,
            role = %reply.role_name(),
            chars = reply.content().len(),
            "assistant turn"
        );

        if termination.is_terminal(&reply) {
            break (termination.extract(&reply), Termination::Concluded);
        }
        if exchange >= limit {
            tracing::warn!(
                phase,
                limit,
                "turn limit exhausted without conclusion, using last assistant reply"
            );
            break (reply.content().to_owned(), Termination::Exhausted);
        }

        next = user.send(Some(reply)).await?;
        transcript.push(next.clone());
        tracing::debug!(
            phase,
            exchange,
            role = %next.role_name(),
            chars = next.content().len(),
            "user turn"
        );
        exchange += 1;
    };

    let mut usage = TokenUsage::default();
    usage.add(assistant.usage());
    usage.add(user.usage());

    Ok(PhaseRunResult {
        conclusion,
        termination: how,
        exchanges: exchange,
        transcript,
        usage,
    })
}
