//! State machine tests for `run_supervisor`.
//!
//! All tests run on a paused tokio clock, so multi-minute pauses complete
//! instantly unless something is actually waiting on them.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::arithmetic_side_effects,
    clippy::missing_panics_doc
)]

use std::collections::VecDeque;
use std::time::Duration;

use metawatch_core::{
    CycleOutcome, LoopExit, PollCycle, SupervisorConfig, SupervisorError, run_supervisor,
};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Cycle double replaying a fixed script, then breaking.
struct ScriptedCycle {
    script: VecDeque<Result<CycleOutcome, String>>,
    runs: u32,
    cancel_on_run: Option<(u32, CancellationToken)>,
}

impl ScriptedCycle {
    fn new(script: impl IntoIterator<Item = Result<CycleOutcome, String>>) -> Self {
        Self {
            script: script.into_iter().collect(),
            runs: 0,
            cancel_on_run: None,
        }
    }
}

impl PollCycle for ScriptedCycle {
    type Error = String;

    async fn run_cycle(&mut self) -> Result<CycleOutcome, String> {
        self.runs += 1;
        if let Some((run, token)) = &self.cancel_on_run
            && *run == self.runs
        {
            token.cancel();
        }
        self.script.pop_front().unwrap_or(Ok(CycleOutcome::Break))
    }
}

fn config(error_count_to_break: u32) -> SupervisorConfig {
    SupervisorConfig {
        pause_after_success: Duration::from_mins(10),
        pause_after_error: Duration::from_mins(1),
        error_count_to_break,
    }
}

fn ok() -> Result<CycleOutcome, String> {
    Ok(CycleOutcome::Continue)
}

fn err(message: &str) -> Result<CycleOutcome, String> {
    Err(message.to_owned())
}

#[tokio::test(start_paused = true)]
async fn successes_then_break_end_cleanly() {
    let mut cycle = ScriptedCycle::new([ok(), ok()]);
    let token = CancellationToken::new();

    let exit = run_supervisor(&config(3), &mut cycle, &token).await.unwrap();

    assert_eq!(exit, LoopExit::Broken);
    assert_eq!(cycle.runs, 3);
}

#[tokio::test(start_paused = true)]
async fn error_threshold_stops_after_exactly_n_runs() {
    let mut cycle = ScriptedCycle::new([err("a"), err("b"), err("c"), err("d"), err("e")]);
    let token = CancellationToken::new();

    let result = run_supervisor(&config(3), &mut cycle, &token).await;

    match result {
        Err(SupervisorError::TooManyErrors { count, last_error }) => {
            assert_eq!(count, 3);
            assert_eq!(last_error, "c");
        }
        other => panic!("expected TooManyErrors, got {other:?}"),
    }
    assert_eq!(cycle.runs, 3);
}

#[tokio::test(start_paused = true)]
async fn threshold_of_one_stops_on_first_error() {
    let mut cycle = ScriptedCycle::new([err("boom")]);
    let token = CancellationToken::new();

    let result = run_supervisor(&config(1), &mut cycle, &token).await;

    assert!(matches!(
        result,
        Err(SupervisorError::TooManyErrors { count: 1, .. })
    ));
    assert_eq!(cycle.runs, 1);
}

#[tokio::test(start_paused = true)]
async fn success_resets_the_error_counter() {
    let mut cycle = ScriptedCycle::new([err("a"), err("b"), ok(), err("c"), err("d"), ok()]);
    let token = CancellationToken::new();

    let exit = run_supervisor(&config(3), &mut cycle, &token).await.unwrap();

    assert_eq!(exit, LoopExit::Broken);
    assert_eq!(cycle.runs, 7);
}

#[tokio::test(start_paused = true)]
async fn pauses_follow_the_outcome() {
    let mut cycle = ScriptedCycle::new([ok(), err("a")]);
    let token = CancellationToken::new();
    let started = Instant::now();

    run_supervisor(&config(3), &mut cycle, &token).await.unwrap();

    // One success pause and one error pause before the final break.
    assert_eq!(started.elapsed(), Duration::from_mins(11));
}

#[tokio::test(start_paused = true)]
async fn cancellation_interrupts_the_pause() {
    let mut cycle = ScriptedCycle::new(std::iter::repeat_with(ok).take(100));
    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(5)).await;
        canceller.cancel();
    });
    let started = Instant::now();

    let exit = run_supervisor(&config(3), &mut cycle, &token).await.unwrap();

    assert_eq!(exit, LoopExit::Cancelled);
    assert_eq!(cycle.runs, 1);
    assert!(started.elapsed() < Duration::from_mins(10));
}

#[tokio::test(start_paused = true)]
async fn cancellation_during_error_pause_is_not_an_error() {
    let mut cycle = ScriptedCycle::new([err("a"), err("b"), err("c")]);
    let token = CancellationToken::new();
    cycle.cancel_on_run = Some((1, token.clone()));

    let exit = run_supervisor(&config(3), &mut cycle, &token).await.unwrap();

    assert_eq!(exit, LoopExit::Cancelled);
    assert_eq!(cycle.runs, 1);
}

#[tokio::test(start_paused = true)]
async fn cancellation_never_truncates_a_running_cycle() {
    let mut cycle = ScriptedCycle::new([ok(), ok(), ok()]);
    let token = CancellationToken::new();
    cycle.cancel_on_run = Some((2, token.clone()));
    let started = Instant::now();

    let exit = run_supervisor(&config(3), &mut cycle, &token).await.unwrap();

    // The second cycle ran to completion; the loop stopped at the pause after it.
    assert_eq!(exit, LoopExit::Cancelled);
    assert_eq!(cycle.runs, 2);
    assert_eq!(started.elapsed(), Duration::from_mins(10));
}

#[tokio::test(start_paused = true)]
async fn break_wins_over_pending_cancellation() {
    let mut cycle = ScriptedCycle::new([Ok(CycleOutcome::Break)]);
    let token = CancellationToken::new();
    token.cancel();

    let exit = run_supervisor(&config(3), &mut cycle, &token).await.unwrap();

    assert_eq!(exit, LoopExit::Broken);
    assert_eq!(cycle.runs, 1);
}
