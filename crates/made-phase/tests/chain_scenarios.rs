//! Integration tests for `ChainRunner`.
//!
//! Drives full phase chains against a scripted `MockProvider`, covering
//! conclusion by marker, exhaustion, unknown phases, and state hand-off
//! between phases.

#![cfg_attr(
    test,
    allow(
        dead_code,
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::missing_panics_doc,
        clippy::missing_errors_doc,
        clippy::print_stdout,
        clippy::print_stderr,
        clippy::tests_outside_test_module,
        reason = "Test allows"
    )
)]

use async_trait::async_trait;
use made_core::{EnvConfig, PhaseOverrides, RetryConfig};
use made_phase::{
    AgentBackend, ChainRunner, ChatEnv, Extraction, Phase, PhaseArgs, PhaseContract, PhaseCore,
    PhaseError, PhaseRegistry, PhaseRunResult, PhaseSpec, RetryPolicy, RunError, StateValue,
    Termination, TerminationSpec, fields,
};
use made_providers::MockProvider;
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

/// A phase driven entirely by its spec that writes its conclusion to one field.
struct ScriptedPhase {
    core: PhaseCore,
    output: &'static str,
}

#[async_trait]
impl Phase for ScriptedPhase {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn contract(&self) -> &PhaseContract {
        self.core.contract()
    }

    fn update_phase_states(&mut self, env: &ChatEnv) -> made_phase::Result<()> {
        self.core.pull(env)
    }

    async fn run(&mut self) -> made_phase::Result<PhaseRunResult> {
        self.core.run().await
    }

    fn update_env_states<'env>(
        &self,
        env: &'env mut ChatEnv,
        result: &PhaseRunResult,
    ) -> made_phase::Result<&'env mut ChatEnv> {
        let delta = self.core.delta().set(self.output, result.conclusion.as_str())?;
        Ok(env.apply(delta))
    }
}

fn register_scripted(
    registry: &mut PhaseRegistry,
    name: &str,
    spec: PhaseSpec,
    contract: PhaseContract,
    output: &'static str,
) {
    let phase_name = name.to_owned();
    let result = registry.register(name, move |args| {
        let core = PhaseCore::new(phase_name.clone(), spec.clone(), contract.clone(), args)?;
        Ok(Box::new(ScriptedPhase { core, output }) as Box<dyn Phase>)
    });
    assert!(result.is_ok(), "registration of {name} failed");
}

fn discussion_spec(limit: u32) -> PhaseSpec {
    PhaseSpec::builder()
        .assistant("Designer", "DESIGNER: you are {assistant_role}, talking to {user_role}.")
        .user("Client", "CLIENT: you are {user_role}, talking to {assistant_role}.")
        .phase_prompt("Let us design {task}. Say {marker} when we agree.")
        .chat_turn_limit(limit)
        .termination(TerminationSpec::default().with_extraction(Extraction::WholeMessage))
        .build()
        .unwrap()
}

fn runner(registry: PhaseRegistry, provider: &MockProvider) -> ChainRunner {
    let backend = AgentBackend {
        provider: Arc::new(provider.clone()),
        model: "mock".to_owned(),
        retry: RetryPolicy::from_config(&RetryConfig {
            max_attempts: 3,
            base_delay_ms: 1,
            max_delay_ms: 2,
            timeout_seconds: 5,
        }),
    };
    ChainRunner::new(Arc::new(registry), move |_| PhaseArgs::new(backend.clone()))
}

fn snake_env() -> ChatEnv {
    ChatEnv::new(EnvConfig::new("build a snake game"))
}

fn discussion_registry(limit: u32) -> PhaseRegistry {
    let mut registry = PhaseRegistry::new();
    register_scripted(
        &mut registry,
        "discussion",
        discussion_spec(limit),
        PhaseContract::new()
            .requires(&[fields::TASK])
            .writes(&[fields::DESCRIPTION]),
        fields::DESCRIPTION,
    );
    registry
}

/// Tests that a marker in the second assistant reply concludes after two exchanges.
#[tokio::test]
async fn test_marker_concludes_early() {
    let provider = MockProvider::new("mock")
        .with_script(
            "DESIGNER",
            [
                "A grid with a snake.",
                "Arrow keys steer, apples grow the snake. <CONCLUSION>",
                "never used",
            ],
        )
        .with_default_response("Tell me more.");

    let result = runner(discussion_registry(3), &provider)
        .run(snake_env(), &["discussion"])
        .await;
    assert!(result.is_ok());
    let env = result.unwrap();

    assert_eq!(
        env.state().text(fields::DESCRIPTION),
        Some("Arrow keys steer, apples grow the snake. <CONCLUSION>")
    );
    let record = &env.records()[0];
    assert_eq!(record.phase, "discussion");
    assert_eq!(record.exchanges, 2);
    assert_eq!(record.termination, Termination::Concluded);
    assert_eq!(provider.call_count(), 3);
}

/// Tests that a never-matching predicate exhausts after exactly the limit.
#[tokio::test]
async fn test_exhaustion_is_best_effort() {
    let provider = MockProvider::new("mock")
        .with_script("DESIGNER", ["draft one", "draft two", "draft three", "draft four"])
        .with_default_response("Not yet.");

    let env = runner(discussion_registry(3), &provider)
        .run(snake_env(), &["discussion"])
        .await
        .unwrap();

    assert_eq!(env.state().text(fields::DESCRIPTION), Some("draft three"));
    let record = &env.records()[0];
    assert_eq!(record.exchanges, 3);
    assert_eq!(record.termination, Termination::Exhausted);
    assert!(record.termination.is_best_effort());
    assert_eq!(provider.call_count(), 5);
}

/// Tests that an unknown phase fails before any generation call.
#[tokio::test]
async fn test_unknown_phase_fails_before_any_agent() {
    let provider = MockProvider::new("mock");
    let result = runner(discussion_registry(3), &provider)
        .run(snake_env(), &["discussion", "missing_phase"])
        .await;

    let err = result.unwrap_err();
    assert_eq!(err.phase(), "missing_phase");
    assert!(matches!(err, RunError::Resolve { .. }));
    assert!(matches!(err.cause(), PhaseError::UnknownPhase(name) if name == "missing_phase"));
    assert_eq!(provider.call_count(), 0);
}

/// Tests that the second phase observes exactly what the first one wrote.
#[tokio::test]
async fn test_state_flows_between_phases() {
    let mut registry = discussion_registry(1);
    register_scripted(
        &mut registry,
        "refinement",
        PhaseSpec::builder()
            .assistant("Editor", "EDITOR: {assistant_role}")
            .user("Author", "AUTHOR: {user_role}")
            .phase_prompt("Refine: {description}")
            .chat_turn_limit(1)
            .build()
            .unwrap(),
        PhaseContract::new()
            .requires(&[fields::DESCRIPTION])
            .writes(&[fields::REVIEW_COMMENTS]),
        fields::REVIEW_COMMENTS,
    );

    let provider = MockProvider::new("mock")
        .with_script("DESIGNER", ["Snake on a 20x20 grid <CONCLUSION>"])
        .with_script("EDITOR", ["<CONCLUSION> add a score counter"]);

    let env = runner(registry, &provider)
        .run(snake_env(), &["discussion", "refinement"])
        .await
        .unwrap();

    let history = provider.get_call_history();
    let refinement_call = history
        .iter()
        .find(|request| request.system_prompt.starts_with("EDITOR"))
        .unwrap();
    assert_eq!(
        refinement_call.turns[0].content,
        "Refine: Snake on a 20x20 grid <CONCLUSION>"
    );
    assert_eq!(
        env.state().text(fields::REVIEW_COMMENTS),
        Some("add a score counter")
    );

    let writers: Vec<&str> = env.history().iter().map(|delta| delta.phase.as_str()).collect();
    assert_eq!(writers, ["discussion", "refinement"]);
}

/// Tests that fields a phase does not write stay identical.
#[tokio::test]
async fn test_untouched_fields_are_preserved() {
    let provider = MockProvider::new("mock").with_default_response("<CONCLUSION> fine");
    let env = ChatEnv::new(
        EnvConfig::new("build a snake game").with_task_description("classic arcade rules"),
    );
    let before = env.state().clone();

    let mut registry = PhaseRegistry::new();
    register_scripted(
        &mut registry,
        "modality_only",
        discussion_spec(2),
        PhaseContract::new()
            .requires(&[fields::TASK])
            .writes(&[fields::MODALITY]),
        fields::MODALITY,
    );
    let after = runner(registry, &provider)
        .run(env, &["modality_only"])
        .await
        .unwrap();

    for field in before.field_names() {
        assert_eq!(before.get(field), after.state().get(field), "{field} changed");
    }
    assert_eq!(after.state().len(), before.len() + 1);
}

/// Tests that a missing dependency aborts before the dialogue starts.
#[tokio::test]
async fn test_missing_dependency_names_phase() {
    let provider = MockProvider::new("mock");
    let result = runner(PhaseRegistry::with_builtin_phases().unwrap(), &provider)
        .run(snake_env(), &["coding"])
        .await;

    let err = result.unwrap_err();
    assert_eq!(err.phase(), "coding");
    assert!(matches!(
        err.cause(),
        PhaseError::MissingDependency { field, .. } if field == "modality"
    ));
    assert_eq!(provider.call_count(), 0);
}

/// Tests that a permanent generation failure in the first phase leaves the environment as it started.
#[tokio::test]
async fn test_generation_failure_aborts_run() {
    let provider = MockProvider::new("mock").with_fatal_failure("revoked key");

    let err = runner(discussion_registry(1), &provider)
        .run(snake_env(), &["discussion"])
        .await
        .unwrap_err();
    assert_eq!(err.phase(), "discussion");
    assert!(matches!(err, RunError::PhaseFailed { .. }));
    assert!(matches!(err.cause(), PhaseError::Generation { attempts: 1, .. }));
    assert_eq!(provider.call_count(), 1);

    let env = err.into_env();
    assert!(env.records().is_empty());
    assert!(env.history().is_empty());
    assert!(!env.state().contains(fields::DESCRIPTION));
    assert_eq!(env.state().text(fields::TASK), Some("build a snake game"));
}

/// Tests that a failure in a later phase hands back the earlier phases' writes.
#[tokio::test]
async fn test_later_failure_keeps_completed_phases() {
    let mut registry = discussion_registry(1);
    register_scripted(
        &mut registry,
        "followup",
        PhaseSpec::builder()
            .assistant("Reviewer", "REVIEWER: {assistant_role}")
            .user("Author", "AUTHOR: {user_role}")
            .phase_prompt("Pick a modality for: {description}")
            .chat_turn_limit(1)
            .build()
            .unwrap(),
        PhaseContract::new()
            .requires(&[fields::DESCRIPTION])
            .writes(&[fields::MODALITY]),
        fields::MODALITY,
    );

    let working = MockProvider::new("mock")
        .with_script("DESIGNER", ["Snake on a 20x20 grid <CONCLUSION>"]);
    let broken = MockProvider::new("mock").with_fatal_failure("revoked key");
    let retry = RetryPolicy::from_config(&RetryConfig {
        max_attempts: 3,
        base_delay_ms: 1,
        max_delay_ms: 2,
        timeout_seconds: 5,
    });
    let (working_backend, broken_backend) = (
        AgentBackend {
            provider: Arc::new(working.clone()),
            model: "mock".to_owned(),
            retry,
        },
        AgentBackend {
            provider: Arc::new(broken.clone()),
            model: "mock".to_owned(),
            retry,
        },
    );
    let chain = ChainRunner::new(Arc::new(registry), move |name| {
        if name == "followup" {
            PhaseArgs::new(broken_backend.clone())
        } else {
            PhaseArgs::new(working_backend.clone())
        }
    });

    let err = chain
        .run(snake_env(), &["discussion", "followup"])
        .await
        .unwrap_err();
    assert_eq!(err.phase(), "followup");
    assert!(matches!(err.cause(), PhaseError::Generation { attempts: 1, .. }));
    assert_eq!(working.call_count(), 1);
    assert_eq!(broken.call_count(), 1);

    assert_eq!(err.env().records().len(), 1);
    let env = err.into_env();
    assert_eq!(
        env.state().text(fields::DESCRIPTION),
        Some("Snake on a 20x20 grid <CONCLUSION>")
    );
    assert!(!env.state().contains(fields::MODALITY));
    let record = &env.records()[0];
    assert_eq!(record.phase, "discussion");
    assert_eq!(record.termination, Termination::Concluded);
    assert_eq!(record.exchanges, 1);
    let writers: Vec<&str> = env.history().iter().map(|delta| delta.phase.as_str()).collect();
    assert_eq!(writers, ["discussion"]);
}

/// Tests that a transcript that cannot be written fails the phase before it touches the environment.
#[tokio::test]
async fn test_transcript_failure_leaves_env_untouched() {
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("transcripts");
    fs::write(&blocker, "not a directory").unwrap();
    let provider = MockProvider::new("mock").with_default_response("<CONCLUSION> ok");

    let err = runner(discussion_registry(2), &provider)
        .with_transcript_dir(&blocker)
        .run(snake_env(), &["discussion"])
        .await
        .unwrap_err();
    assert_eq!(err.phase(), "discussion");
    assert!(matches!(err.cause(), PhaseError::Io(_)));

    let env = err.into_env();
    assert!(env.records().is_empty());
    assert!(env.history().is_empty());
    assert!(!env.state().contains(fields::DESCRIPTION));
}

/// Tests that transient failures are absorbed by the retry policy.
#[tokio::test]
async fn test_transient_failures_are_retried() {
    let provider = MockProvider::new("mock")
        .with_default_response("<CONCLUSION> agreed")
        .with_transient_failures(2);

    let env = runner(discussion_registry(2), &provider)
        .run(snake_env(), &["discussion"])
        .await
        .unwrap();
    assert_eq!(env.records()[0].termination, Termination::Concluded);
    assert_eq!(provider.call_count(), 3);
}

/// Tests the four built-in phases end to end, including file extraction.
#[tokio::test]
async fn test_builtin_chain_produces_files() {
    let provider = MockProvider::new("mock")
        .with_response("product modality", "<CONCLUSION> Application")
        .with_response("Choose the programming language", "<CONCLUSION> Python")
        .with_response(
            "Write the complete implementation",
            "<CONCLUSION>\nmain.py\n```python\nfrom game import run\n\nrun()\n```\n\ngame.py\n```python\ndef run():\n    print(\"snake\")\n```\n",
        )
        .with_response("Review the code", "<CONCLUSION> Finished");

    let chain = ["demand_analysis", "language_choose", "coding", "code_review"];
    let env = runner(PhaseRegistry::with_builtin_phases().unwrap(), &provider)
        .run(snake_env(), &chain)
        .await
        .unwrap();

    assert_eq!(env.state().text(fields::MODALITY), Some("Application"));
    assert_eq!(env.state().text(fields::LANGUAGE), Some("Python"));
    assert_eq!(env.state().text(fields::REVIEW_COMMENTS), Some("Finished"));

    let paths: Vec<&str> = env.produced_files().iter().map(|file| file.path.as_str()).collect();
    assert_eq!(paths, ["main.py", "game.py"]);
    assert!(matches!(env.state().get(fields::FILES), Some(StateValue::Files(_))));

    let phases: Vec<&str> = env.records().iter().map(|record| record.phase.as_str()).collect();
    assert_eq!(phases, chain);
    assert!(
        env.records()
            .iter()
            .all(|record| record.termination == Termination::Concluded && record.exchanges == 1)
    );
}

/// Tests that the registry resolves the exact registered implementation.
#[test]
fn test_resolve_returns_registered_type() {
    let registry = PhaseRegistry::with_builtin_phases().unwrap();
    let backend = AgentBackend {
        provider: Arc::new(MockProvider::new("mock")),
        model: "mock".to_owned(),
        retry: RetryPolicy::default(),
    };
    for name in registry.names() {
        let phase = registry.resolve(name, PhaseArgs::new(backend.clone())).unwrap();
        assert_eq!(phase.name(), name);
    }
    let coding = registry.resolve("coding", PhaseArgs::new(backend.clone())).unwrap();
    assert!(coding.kind().ends_with("CodingPhase"));

    let unknown = registry.resolve("nope", PhaseArgs::new(backend.clone()));
    assert!(matches!(unknown, Err(PhaseError::UnknownPhase(_))));

    let invalid = registry.resolve(
        "coding",
        PhaseArgs::new(backend).with_overrides(PhaseOverrides {
            temperature: Some(3.0),
            ..PhaseOverrides::default()
        }),
    );
    assert!(matches!(invalid, Err(PhaseError::InvalidSpec(_))));
}

/// Tests that transcripts are written per phase when configured.
#[tokio::test]
async fn test_transcripts_written() {
    let dir = TempDir::new().unwrap();
    let provider = MockProvider::new("mock").with_default_response("<CONCLUSION> ok");

    let env = runner(discussion_registry(2), &provider)
        .with_transcript_dir(dir.path())
        .run(snake_env(), &["discussion"])
        .await
        .unwrap();

    let path = dir.path().join("00_discussion.json");
    let contents = fs::read_to_string(&path).unwrap();
    let json: serde_json::Value = serde_json::from_str(&contents).unwrap();
    assert_eq!(json["phase"], "discussion");
    assert_eq!(json["run_id"], env.run_id().to_string());
    assert_eq!(json["termination"], "concluded");
    assert_eq!(json["transcript"].as_array().map(Vec::len), Some(2));
}
