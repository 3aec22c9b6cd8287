//! bearer-dspd – Bibliotheks-Root
//!
//! Verdrahtet die Engine mit Sample-Clock, Timer-Zustellung, Transport-Queues
//! und dem Observability-Server.

pub mod config;

use anyhow::Result;
use bearer_engine::{
    DspEngine, PassiveStages, QueueTransport, SampleClock, SoftwareConference, TransportReceivers,
};
use bearer_observability::{observability_server_starten, DspMetrics};
use config::DaemonConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Intervall, in dem die Engine-Zaehler in die Prometheus-Registry wandern
const METRIKEN_INTERVALL: Duration = Duration::from_secs(1);

/// Haelt den laufenden Daemon-Zustand zusammen
pub struct Server {
    pub config: DaemonConfig,
}

impl Server {
    /// Erstellt einen neuen Daemon aus der gegebenen Konfiguration
    pub fn neu(config: DaemonConfig) -> Self {
        Self { config }
    }

    /// Startet alle Subsysteme und laeuft bis zum Shutdown-Signal
    ///
    /// Reihenfolge:
    /// 1. Engine mit Queue-Transport erzeugen
    /// 2. Sample-Clock und Timer-Zustellung starten
    /// 3. Observability-Server starten (falls aktiviert)
    /// 4. Auf Ctrl-C warten, danach Engine herunterfahren
    pub async fn starten(self) -> Result<()> {
        let optionen = self.config.engine_optionen();
        let (transport, empfaenger) = QueueTransport::neu(self.config.engine.queue_depth);
        let (engine, mut timer) = DspEngine::new(
            optionen.clone(),
            Arc::new(transport),
            Arc::new(PassiveStages::new(optionen.law)),
            Box::new(SoftwareConference::new(optionen.law)),
        );
        let engine = Arc::new(engine);

        tracing::info!(
            law = ?optionen.law,
            poll = optionen.poll,
            no_hardware = optionen.no_hardware,
            max_channels = optionen.max_channels,
            "Engine bereit"
        );

        let mut aufgaben: Vec<JoinHandle<()>> = Vec::new();

        // Sample-Clock
        let clock_engine = Arc::clone(&engine);
        let mut clock = SampleClock::neu(&optionen);
        aufgaben.push(tokio::spawn(async move {
            loop {
                let tick = clock.tick().await;
                clock_engine.clock_tick(tick);
            }
        }));

        // Timer-Zustellung
        let timer_engine = Arc::clone(&engine);
        aufgaben.push(tokio::spawn(async move {
            while let Some(ereignis) = timer.recv().await {
                timer_engine.handle_timer(ereignis);
            }
            tracing::debug!("Timer-Kanal geschlossen");
        }));

        aufgaben.extend(queues_leeren(empfaenger));

        if self.config.observability.aktiviert {
            let adresse = self.config.observability_bind_adresse()?;
            let metriken = DspMetrics::neu()?;

            let bruecke_engine = Arc::clone(&engine);
            let bruecke_metriken = metriken.clone();
            aufgaben.push(tokio::spawn(async move {
                let mut intervall = tokio::time::interval(METRIKEN_INTERVALL);
                loop {
                    intervall.tick().await;
                    bruecke_metriken.uebernehmen(&bruecke_engine);
                }
            }));

            let http_engine = Arc::clone(&engine);
            aufgaben.push(tokio::spawn(async move {
                if let Err(e) = observability_server_starten(adresse, http_engine, metriken).await
                {
                    tracing::error!(fehler = %e, "Observability-Server beendet");
                }
            }));
        } else {
            tracing::info!("Observability deaktiviert");
        }

        tracing::info!("Daemon laeuft. Warte auf Shutdown-Signal (Ctrl-C)...");
        tokio::signal::ctrl_c().await?;
        tracing::info!("Shutdown-Signal empfangen, Daemon wird beendet");

        for aufgabe in &aufgaben {
            aufgabe.abort();
        }
        engine.shutdown();

        Ok(())
    }
}

/// Leert die Transport-Queues, solange keine Nachbarschicht angebunden ist
fn queues_leeren(empfaenger: TransportReceivers) -> [JoinHandle<()>; 2] {
    let TransportReceivers { mut hoch, mut runter } = empfaenger;
    [
        tokio::spawn(async move {
            while let Some((kanal, nachricht)) = hoch.recv().await {
                tracing::trace!(kanal = %kanal, ?nachricht, "hoch");
            }
        }),
        tokio::spawn(async move {
            while let Some((kanal, nachricht)) = runter.recv().await {
                tracing::trace!(kanal = %kanal, ?nachricht, "runter");
            }
        }),
    ]
}
