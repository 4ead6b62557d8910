use std::{
    future::Future,
    time::{Duration, Instant},
};

use coingro_common::response::{print_error, print_warning};
use coingro_types::State;
use owo_colors::OwoColorize;
use sd_notify::NotifyState;
use tokio_util::sync::CancellationToken;

use crate::{
    args::StartArgs,
    config::Config,
    constants::{CONTROLLER_VERSION, RETRY_TIMEOUT},
    controller::{Controller, SharedController},
    error::Error,
};

/// The supervisor loop: drives throttled reconcile ticks, logs state
/// transitions and heartbeats, speaks the systemd notify protocol and
/// rebuilds the reconciler on RELOAD_CONFIG.
pub struct Worker {
    args: StartArgs,
    controller: SharedController,
    cancel: CancellationToken,
    throttle: Duration,
    heartbeat_interval: Duration,
    sd_notify: bool,
    verbosity: u8,
    heartbeat_at: Option<Instant>,
}

impl Worker {
    pub fn new(
        args: StartArgs,
        controller: SharedController,
        cancel: CancellationToken,
        config: &Config,
    ) -> Self {
        println!(
            "{}{}",
            "🛠️ Starting worker • ".green(),
            CONTROLLER_VERSION.green().dimmed()
        );
        let mut worker = Worker {
            args,
            controller,
            cancel,
            throttle: Duration::from_secs(1),
            heartbeat_interval: Duration::from_secs(1),
            sd_notify: false,
            verbosity: 0,
            heartbeat_at: None,
        };
        worker.apply_internals(config);
        worker
    }

    fn apply_internals(&mut self, config: &Config) {
        self.throttle = Duration::from_secs(config.internals.process_throttle_secs);
        self.heartbeat_interval = Duration::from_secs(config.internals.heartbeat_interval);
        self.sd_notify = config.internals.sd_notify;
        self.verbosity = config.verbosity;
    }

    pub async fn run(&mut self) -> Result<(), Error> {
        // Tell systemd that we completed the initialization phase.
        self.notify(&[NotifyState::Ready]);

        let mut old_state: Option<State> = None;
        while !self.cancel.is_cancelled() {
            let state = self.worker_tick(old_state).await;
            if state == State::ReloadConfig && !self.cancel.is_cancelled() {
                self.reconfigure().await?;
            }
            old_state = Some(state);
        }
        self.exit().await;
        Ok(())
    }

    /// One throttling iteration: handles the current state and returns it.
    async fn worker_tick(&mut self, old_state: Option<State>) -> State {
        let controller = self.controller.read().await.clone();
        let state = controller.state();

        if Some(state) != old_state {
            match old_state {
                Some(old) => println!(
                    "{}{}{}{}",
                    "Changing state from ".cyan(),
                    old.cyan().dimmed(),
                    " to: ".cyan(),
                    state.cyan().dimmed()
                ),
                None => println!(
                    "{}{}",
                    "Changing state to: ".cyan(),
                    state.cyan().dimmed()
                ),
            }
            if state == State::Running {
                controller.startup().await;
            }
            // Log the heartbeat on the first iteration after a transition.
            self.heartbeat_at = None;
        }

        match state {
            State::Stopped => {
                // Ping the systemd watchdog before sleeping in the stopped state.
                self.notify(&[NotifyState::Watchdog, NotifyState::Status("State: STOPPED.")]);
                self.throttled(controller.process_stopped()).await;
            }
            State::Running => {
                self.notify(&[NotifyState::Watchdog, NotifyState::Status("State: RUNNING.")]);
                let cancel = self.cancel.clone();
                self.throttled(Self::process_running(&controller, &cancel))
                    .await;
            }
            State::ReloadConfig => {}
        }

        if !self.heartbeat_interval.is_zero() {
            let due = self
                .heartbeat_at
                .is_none_or(|at| at.elapsed() > self.heartbeat_interval);
            if due {
                println!(
                    "{}{}{}{}{}{}",
                    "💓 Controller heartbeat • PID=".green(),
                    std::process::id().green().dimmed(),
                    " • version=".green(),
                    CONTROLLER_VERSION.green().dimmed(),
                    " • state=".green(),
                    state.green().dimmed(),
                );
                self.heartbeat_at = Some(Instant::now());
            }
        }

        state
    }

    /// Floors the wrapped call to the configured throttle interval.
    async fn throttled<F: Future<Output = ()>>(&self, fut: F) {
        let start = Instant::now();
        fut.await;
        let elapsed = start.elapsed();
        let sleep_for = throttle_floor(self.throttle, elapsed);
        if self.verbosity >= 2 {
            println!(
                "{}{}{}{}",
                "Throttling • sleep=".cyan(),
                format!("{:.2}s", sleep_for.as_secs_f64()).cyan().dimmed(),
                " • last_iteration=".cyan(),
                format!("{:.2}s", elapsed.as_secs_f64()).cyan().dimmed(),
            );
        }
        tokio::select! {
            _ = tokio::time::sleep(sleep_for) => {}
            _ = self.cancel.cancelled() => {}
        }
    }

    async fn process_running(controller: &Controller, cancel: &CancellationToken) {
        match controller.process().await {
            Ok(()) => {}
            Err(e) if e.is_transient() => {
                print_warning(anyhow::anyhow!(
                    "Error: {}, retrying in {} seconds...",
                    e,
                    RETRY_TIMEOUT.as_secs()
                ));
                tokio::select! {
                    _ = tokio::time::sleep(RETRY_TIMEOUT) => {}
                    _ = cancel.cancelled() => {}
                }
            }
            Err(e) if e.is_operational() => {
                print_error(anyhow::anyhow!("{}. Stopping controller ...", e));
                controller.set_state(State::Stopped);
            }
            Err(e) => {
                // Database and other recoverable failures: the session state
                // is discarded with this pass and the throttle paces the
                // next attempt.
                print_error(e);
            }
        }
    }

    /// Re-reads the configuration and swaps a fresh reconciler into the
    /// shared handle.
    async fn reconfigure(&mut self) -> Result<(), Error> {
        self.notify(&[NotifyState::Reloading]);

        let config = Config::load(&self.args)?;
        let controller = Controller::new(config.clone()).await?;
        self.apply_internals(&config);

        let old = {
            let mut guard = self.controller.write().await;
            std::mem::replace(&mut *guard, controller)
        };
        old.cleanup().await;

        self.notify(&[NotifyState::Ready]);
        Ok(())
    }

    async fn exit(&self) {
        // Tell systemd that we are exiting now.
        self.notify(&[NotifyState::Stopping]);
        let controller = self.controller.read().await.clone();
        controller.cleanup().await;
    }

    fn notify(&self, states: &[NotifyState]) {
        if !self.sd_notify {
            return;
        }
        if let Err(e) = sd_notify::notify(false, states) {
            print_warning(anyhow::anyhow!("sd_notify failed: {}", e));
        }
    }
}

/// Remaining sleep such that one throttled call spans at least `throttle`.
pub(crate) fn throttle_floor(throttle: Duration, elapsed: Duration) -> Duration {
    throttle.saturating_sub(elapsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throttle_floor_pads_fast_iterations() {
        let throttle = Duration::from_secs(5);
        assert_eq!(
            throttle_floor(throttle, Duration::from_secs(2)),
            Duration::from_secs(3)
        );
        assert_eq!(throttle_floor(throttle, Duration::ZERO), throttle);
    }

    #[test]
    fn throttle_floor_never_goes_negative() {
        let throttle = Duration::from_secs(5);
        assert_eq!(
            throttle_floor(throttle, Duration::from_secs(9)),
            Duration::ZERO
        );
    }

    #[tokio::test]
    async fn throttled_call_observes_the_floor() {
        let start = Instant::now();
        let floor = Duration::from_millis(50);
        tokio::time::sleep(throttle_floor(floor, start.elapsed())).await;
        assert!(start.elapsed() >= floor);
    }
}
