//! The only path that transitions the capture controller.
//!
//! Manual, scheduled, timer and watchdog intents all land on one queue
//! and are drained strictly in order by this task.

use crate::{
    BusyReason,
    actions::{DiscardReason, Envelope, Intent, IntentOutcome, StartParams, StopParams},
    capture::CaptureController,
    encode::EncodeQueue,
    lease::CameraLease,
};

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, instrument, warn};

pub(crate) struct ActionSerializer {
    controller: CaptureController,
    encoder: EncodeQueue,
    lease: CameraLease,
    rx: mpsc::Receiver<Envelope>,
}

impl ActionSerializer {
    pub(crate) fn new(
        controller: CaptureController,
        encoder: EncodeQueue,
        lease: CameraLease,
        rx: mpsc::Receiver<Envelope>,
    ) -> Self {
        Self {
            controller,
            encoder,
            lease,
            rx,
        }
    }

    /// Drain intents until shutdown, then stop any running session.
    pub(crate) async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        self.controller.recover_interrupted();
        info!("Action serializer started");

        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                envelope = self.rx.recv() => match envelope {
                    Some(envelope) => self.handle(envelope).await,
                    None => break,
                },
            }
        }

        if let Some(report) = self.controller.stop().await {
            info!(session = %report.session, "Capture stopped for shutdown");
        }
        info!("Action serializer stopped");
    }

    async fn handle(&mut self, envelope: Envelope) {
        let Envelope { intent, reply } = envelope;
        let origin = intent.origin();

        let outcome = match intent {
            Intent::Start(params) => self.start(params).await,
            Intent::Stop(params) => self.stop(params).await,
        };
        debug!(origin = %origin, outcome = ?outcome, "Intent drained");

        if let Some(reply) = reply {
            // Submitter may have given up waiting.
            let _ = reply.send(outcome);
        }
    }

    #[instrument(skip(self), fields(origin = %params.origin))]
    async fn start(&mut self, params: StartParams) -> IntentOutcome {
        let snapshot = self.lease.snapshot();
        let busy = if self.controller.active_session().is_some() || snapshot.capturing {
            Some(BusyReason::Capturing)
        } else if snapshot.encode_in_flight {
            Some(BusyReason::Encoding)
        } else {
            None
        };
        if let Some(reason) = busy {
            info!(reason = %reason, "Start discarded, system not idle");
            return IntentOutcome::Discarded(DiscardReason::NotIdle(reason));
        }

        match self.controller.start(&params).await {
            Ok(active) => IntentOutcome::Started(active),
            Err(e) => {
                warn!(error = %e, "Capture start failed");
                IntentOutcome::Failed(e)
            }
        }
    }

    #[instrument(skip(self), fields(origin = %params.origin))]
    async fn stop(&mut self, params: StopParams) -> IntentOutcome {
        match (
            self.controller.active_session(),
            params.expected_session.as_deref(),
        ) {
            (None, _) => return IntentOutcome::AlreadyIdle,
            (Some(active), Some(expected)) if active != expected => {
                info!(active, expected, "Stop discarded, addressed to another session");
                return IntentOutcome::Discarded(DiscardReason::SessionMismatch);
            }
            _ => {}
        }

        let Some(report) = self.controller.stop().await else {
            return IntentOutcome::AlreadyIdle;
        };

        // The session this stop ended, whatever the caller thought was running.
        let encode = params
            .encode_frame_rate
            .map(|frame_rate| self.encoder.enqueue(&report.session, frame_rate));

        IntentOutcome::Stopped { report, encode }
    }
}
