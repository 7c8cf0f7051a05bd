//! Built-in phases of the default software-production chain.
//!
//! Every built-in phase composes a [`PhaseCore`](crate::phase::PhaseCore) and
//! differs only in its roles, prompts, contract and what it writes back.

mod code_review;
mod coding;
mod demand_analysis;
mod language_choose;

pub use code_review::CodeReviewPhase;
pub use coding::CodingPhase;
pub use demand_analysis::DemandAnalysisPhase;
pub use language_choose::LanguageChoosePhase;

/// Role prompt for the answering side of a built-in phase.
fn assistant_prompt(duty: &str) -> String {
    format!(
        "You are {{assistant_role}} at a software company that turns customer tasks into \
         working software, collaborating with {{user_role}}. {duty} \
         The customer's task is: {{task}}. \
         Once you and {{user_role}} agree, start your reply with {{marker}}."
    )
}

/// Role prompt for the instructing side of a built-in phase.
fn user_prompt(duty: &str) -> String {
    format!(
        "You are {{user_role}} at a software company that turns customer tasks into \
         working software, directing {{assistant_role}}. {duty} \
         Give one instruction at a time and check every answer against the customer's task."
    )
}
