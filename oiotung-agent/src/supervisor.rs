//! Process-lifetime reconnect loop
//!
//! Paces attempts with the connection delay, sends the offline notice after
//! every failed session and hands control back once the restart deadline has
//! passed.

use std::time::Duration;
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::notify::{Notifier, NotifyError};
use crate::session::{Session, SessionError};
use crate::template::{self, Flash};

/// Why the supervisor loop stopped
#[derive(Debug, PartialEq, Eq)]
pub enum Shutdown {
    ScheduledRestart,
}

pub struct Supervisor {
    config: Config,
    notifier: Notifier,
    flash: Flash,
    restart_at: Option<Instant>,
}

impl Supervisor {
    pub fn new(config: Config, notifier: Notifier) -> Self {
        let restart_after = config.restart_after();
        let restart_at = Instant::now().checked_add(restart_after);
        match (restart_at, wall_clock_after(restart_after)) {
            (Some(_), Some(at)) => info!("Scheduled restart at {}", at.to_rfc3339()),
            (Some(_), None) => info!("Scheduled restart in {}h", config.agent.restart_after_hours),
            (None, _) => warn!("Restart window too large, scheduled restart disabled"),
        }

        Self {
            config,
            notifier,
            flash: Flash::default(),
            restart_at,
        }
    }

    /// Loop forever; only the scheduled restart ends it
    pub async fn run(mut self) -> Shutdown {
        info!("Entering infinite loop");
        loop {
            time::sleep(self.config.connection_delay()).await;

            if self.restart_due() {
                info!("Time for a scheduled restart. Bye!");
                return Shutdown::ScheduledRestart;
            }

            // Failures are already reported inside `attempt`
            let _ = self.attempt().await;
        }
    }

    /// One session, followed by the offline notice if it failed
    pub async fn attempt(&mut self) -> Result<(), SessionError> {
        let outcome = Session::new(&self.config, &self.notifier)
            .run(&mut self.flash)
            .await;

        if let Err(session_error) = &outcome {
            match self.send_offline().await {
                Ok(()) => warn!("Pinging error: {}", session_error),
                Err(offline_error) => warn!(
                    "Pinging error: {} (offline notification also failed: {})",
                    session_error, offline_error
                ),
            }
        }
        outcome
    }

    async fn send_offline(&mut self) -> Result<(), NotifyError> {
        let body = template::render_offline(&self.config.webhook.offline, self.flash);
        debug!("Sending offline notification");
        let result = self.notifier.notify(body).await;
        self.flash.flip();
        result.map(|_| ())
    }

    fn restart_due(&self) -> bool {
        self.restart_at.is_some_and(|at| Instant::now() >= at)
    }
}

fn wall_clock_after(delay: Duration) -> Option<chrono::DateTime<chrono::Utc>> {
    let delay = chrono::Duration::from_std(delay).ok()?;
    chrono::Utc::now().checked_add_signed(delay)
}
