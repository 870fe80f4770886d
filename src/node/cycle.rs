//! One wake-to-sleep cycle of the sensor node
//!
//! Order of work: account the wake, bring up the radio, sample the sensor
//! and housekeeping, build and send the payload, park the radio, close the
//! accounting. A radio that will not come up ends the cycle on the restart
//! path instead.

use crate::config::fatal::{REPORT_COUNT, REPORT_SPACING_MS};
use crate::config::{NodeConfig, PayloadMode};
use crate::crypto::CipherEngine;
use crate::housekeeping::Housekeeping;
use crate::lora::{LoraError, LoraRadio};
use crate::power::{Clock, CycleAccountant, CycleStore};
use crate::protocol::ProtocolClient;
use crate::serial::SerialPort;
use crate::telemetry::{sealed_payload, text_payload, RadioPayload, SensorReading, TelemetryFrame};
use rand_core::{CryptoRng, RngCore};

/// What the platform should do once the cycle returns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Suspend for the given time, then wake into a fresh cycle
    Sleep { sleep_us: u64 },
    /// Full device restart
    Restart,
}

/// The node's peripherals and settings for one wake
pub struct TelemetryNode<S, R, H, C> {
    serial: S,
    radio: R,
    housekeeping: H,
    clock: C,
    client: ProtocolClient,
    cipher: Option<CipherEngine>,
    config: NodeConfig,
}

impl<S, R, H, C> TelemetryNode<S, R, H, C>
where
    S: SerialPort,
    R: LoraRadio,
    H: Housekeeping,
    C: Clock,
{
    pub fn new(serial: S, radio: R, housekeeping: H, clock: C, config: NodeConfig) -> Self {
        let cipher = config.cipher_key.as_ref().map(CipherEngine::new);
        if config.effective_payload_mode() != config.payload_mode {
            log::warn!("node: no cipher key provisioned, sending text payloads");
        }

        Self {
            serial,
            radio,
            housekeeping,
            clock,
            client: ProtocolClient::new(),
            cipher,
            config,
        }
    }

    pub fn serial(&self) -> &S {
        &self.serial
    }

    pub fn radio(&self) -> &R {
        &self.radio
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Run one full cycle against the retained state in `store`
    pub async fn run_cycle<K, G>(&mut self, store: &mut K, rng: &mut G) -> CycleOutcome
    where
        K: CycleStore,
        G: RngCore + CryptoRng,
    {
        let accountant = CycleAccountant::begin(store.load(), self.clock.now_us());
        log::info!("node: boot {}", accountant.state().boot_count);

        if let Err(e) = self.bring_up_radio().await {
            self.report_radio_failure(e).await;
            let state = accountant.abort(self.clock.now_us());
            store.save(&state);
            return CycleOutcome::Restart;
        }

        let reading = self.sample().await;
        let frame = TelemetryFrame {
            reading,
            battery_mv: self.housekeeping.battery_mv(),
            temp_dc: self.housekeeping.internal_temp_dc(),
            uptime_s: accountant.uptime_s(self.clock.now_us()),
        };

        let payload = self.build_payload(&frame, rng);
        log::debug!("node: transmitting {} bytes", payload.len());

        // One attempt per cycle; the next cycle is the retry
        if let Err(e) = self.radio.transmit(&payload).await {
            log::warn!("node: transmit failed: {:?}", e);
        }

        if let Err(e) = self.radio.sleep().await {
            log::warn!("node: radio sleep failed: {:?}", e);
        }

        let summary = accountant.finish(self.clock.now_us(), self.config.target_period_us);
        store.save(&summary.state);
        log::debug!(
            "node: active {} us, sleeping {} us",
            summary.active_us,
            summary.sleep_us
        );

        CycleOutcome::Sleep {
            sleep_us: summary.sleep_us,
        }
    }

    async fn bring_up_radio(&mut self) -> Result<(), LoraError> {
        self.radio.init().await?;
        self.radio.configure(&self.config.lora).await
    }

    /// Log the failure repeatedly so someone watching the console sees it
    async fn report_radio_failure(&mut self, error: LoraError) {
        for attempt in 1..=REPORT_COUNT {
            log::error!(
                "node: radio init failed ({:?}), restarting [{}/{}]",
                error,
                attempt,
                REPORT_COUNT
            );
            self.clock.delay_ms(REPORT_SPACING_MS).await;
        }
    }

    async fn sample(&mut self) -> SensorReading {
        let reading = if self.config.samples_per_cycle > 1 {
            self.client
                .read_averaged(
                    &mut self.serial,
                    &mut self.clock,
                    self.config.samples_per_cycle,
                    self.config.sample_spacing_ms,
                )
                .await
        } else {
            self.client.read(&mut self.serial, &mut self.clock).await
        };

        if reading.is_sentinel() {
            log::warn!("node: no valid sensor reading this cycle");
        } else if !reading.is_in_range() {
            log::debug!("node: reading {} outside rated range", reading);
        }
        reading
    }

    fn build_payload<G: RngCore + CryptoRng>(&self, frame: &TelemetryFrame, rng: &mut G) -> RadioPayload {
        match (self.config.effective_payload_mode(), &self.cipher) {
            (PayloadMode::Sealed, Some(engine)) => match sealed_payload(frame, engine, rng) {
                Ok(payload) => payload,
                Err(e) => {
                    log::warn!("node: sealing failed ({:?}), sending text", e);
                    text_payload(frame)
                }
            },
            _ => text_payload(frame),
        }
    }
}
