// NDJSON host session
//
// One request per stdin line, one response per request on stdout. Beacon
// events from the active subscription are interleaved as `{"event": ...}`.
//
// Requests:
//   {"kind":"invoke","method":"startMonitoring","arguments":{}}
//   {"kind":"listen"} / {"kind":"cancel"}
//   {"kind":"attach_activity","surface":"main"} / {"kind":"detach_activity"}
//   {"kind":"config_change","surface":"main"}
//   {"kind":"attach_engine"} / {"kind":"detach_engine"}
//   {"kind":"status"}

use crate::simulated::SimulatedEngine;
use anyhow::{Context, Result};
use beacons_bridge_core::command::{
    ADD_BEACON_LAYOUT, ARG_FOREGROUND_BETWEEN_SCAN_PERIOD, ARG_FOREGROUND_SCAN_PERIOD, ARG_LAYOUT,
    SET_FOREGROUND_SCAN_PERIOD,
};
use beacons_bridge_core::{
    ActivitySurface, Arguments, BridgeConfig, Command, CommandResult, EngineFactory, HostContext,
    JsonPreferenceStore, LifecycleCoordinator, LifecycleState, Messenger, ScanPeriodConfig,
    ScanningEngine, Subscription,
};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Debug, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HostRequest {
    Invoke {
        method: String,
        #[serde(default)]
        arguments: Arguments,
    },
    Listen,
    Cancel,
    AttachEngine,
    DetachEngine,
    AttachActivity {
        surface: String,
    },
    DetachActivity,
    ConfigChange {
        surface: String,
    },
    Status,
}

pub struct Session {
    bridge: LifecycleCoordinator,
    preferences: Arc<JsonPreferenceStore>,
    host: HostContext,
    storage: PathBuf,
    /// Layouts already handed to the current engine instance
    applied_layouts: Mutex<Vec<String>>,
}

impl Session {
    pub fn new(
        config: BridgeConfig,
        factory: Box<dyn EngineFactory>,
        storage: PathBuf,
        app_id: String,
    ) -> Result<Self> {
        let preferences = Arc::new(JsonPreferenceStore::new(config.preferences_file.clone()));
        let bridge = LifecycleCoordinator::new(
            config,
            Arc::new(Messenger::new()),
            factory,
            preferences.clone(),
        )?;

        Ok(Self {
            bridge,
            preferences,
            host: HostContext {
                app_id,
                storage_dir: storage.clone(),
            },
            storage,
            applied_layouts: Mutex::new(Vec::new()),
        })
    }

    pub fn bridge(&self) -> &LifecycleCoordinator {
        &self.bridge
    }

    /// Attach the engine and replay the app-scoped preferences.
    pub fn attach(&self) -> Result<()> {
        if self.bridge.state() == LifecycleState::Detached {
            // A fresh engine is about to be built
            self.applied_layouts.lock().clear();
        }
        self.bridge
            .attach_engine(self.host.clone())
            .context("Engine attach failed")?;
        self.replay()
    }

    /// Attach a surface and replay the preferences scoped to it.
    pub fn attach_activity(&self, id: String) -> Result<()> {
        self.bridge
            .attach_activity(self.surface(id))
            .context("Activity attach failed")?;
        self.replay()
    }

    pub fn config_change(&self, id: String) -> Result<()> {
        self.bridge.detach_activity_for_config_changes()?;
        self.bridge
            .reattach_activity_for_config_changes(self.surface(id))?;
        self.replay()
    }

    /// Push the preferences of whatever scope the store is bound to into the
    /// engine. Layouts the engine already has are skipped.
    fn replay(&self) -> Result<()> {
        let prefs = self.preferences.current();
        let periods = Command::new(SET_FOREGROUND_SCAN_PERIOD)
            .with_arg(ARG_FOREGROUND_SCAN_PERIOD, prefs.foreground_scan_period_ms)
            .with_arg(
                ARG_FOREGROUND_BETWEEN_SCAN_PERIOD,
                prefs.foreground_between_scan_period_ms,
            );
        self.bridge.dispatch(&periods)?;

        let mut restored = 0;
        for layout in &prefs.layouts {
            if self.applied_layouts.lock().contains(layout) {
                continue;
            }
            let result = self
                .bridge
                .dispatch(&Command::new(ADD_BEACON_LAYOUT).with_arg(ARG_LAYOUT, layout.clone()))?;
            if result.is_success() {
                self.applied_layouts.lock().push(layout.clone());
                restored += 1;
            }
        }

        tracing::info!(
            "Restored {} layout(s) from {}",
            restored,
            self.preferences
                .path()
                .map(|p| p.display().to_string())
                .unwrap_or_default()
        );
        Ok(())
    }

    fn surface(&self, id: String) -> ActivitySurface {
        ActivitySurface {
            storage_dir: self.storage.join("surfaces").join(&id),
            id,
        }
    }

    /// Handle one request. A new subscription, if any, is returned for the
    /// caller to pump.
    pub fn handle(&self, request: HostRequest) -> (Value, Option<Subscription>) {
        match request {
            HostRequest::Invoke { method, arguments } => {
                let command = Command {
                    name: method,
                    arguments,
                };
                match self.bridge.dispatch(&command) {
                    Ok(result) => {
                        self.remember(&command, &result);
                        (json!({ "result": result }), None)
                    }
                    Err(e) => (error(e), None),
                }
            }
            HostRequest::Listen => match self.bridge.listen() {
                Ok(sub) => (json!({ "listening": sub.id }), Some(sub)),
                Err(e) => (error(e), None),
            },
            HostRequest::Cancel => ack(self.bridge.cancel()),
            HostRequest::AttachEngine => ack(self.attach()),
            HostRequest::DetachEngine => ack(self.bridge.detach_engine()),
            HostRequest::AttachActivity { surface } => ack(self.attach_activity(surface)),
            HostRequest::DetachActivity => ack(self.bridge.detach_activity()),
            HostRequest::ConfigChange { surface } => ack(self.config_change(surface)),
            HostRequest::Status => (
                json!({
                    "state": self.bridge.state().to_string(),
                    "surface": self.bridge.surface().map(|s| s.id),
                    "events": self.bridge.event_stats(),
                }),
                None,
            ),
        }
    }

    /// Persist layouts and scan periods the engine accepted.
    fn remember(&self, command: &Command, result: &CommandResult) {
        if !result.is_success() {
            return;
        }

        let outcome = match command.name.as_str() {
            ADD_BEACON_LAYOUT => {
                let Some(layout) = command.arguments.get(ARG_LAYOUT).and_then(Value::as_str)
                else {
                    return;
                };
                {
                    let mut applied = self.applied_layouts.lock();
                    if !applied.iter().any(|l| l == layout) {
                        applied.push(layout.to_string());
                    }
                }
                self.preferences.update(|p| {
                    if !p.layouts.iter().any(|l| l == layout) {
                        p.layouts.push(layout.to_string());
                    }
                })
            }
            SET_FOREGROUND_SCAN_PERIOD => {
                let effective = ScanPeriodConfig::from_requested(
                    command
                        .arguments
                        .get(ARG_FOREGROUND_SCAN_PERIOD)
                        .and_then(Value::as_i64),
                    command
                        .arguments
                        .get(ARG_FOREGROUND_BETWEEN_SCAN_PERIOD)
                        .and_then(Value::as_i64),
                );
                self.preferences.update(|p| {
                    p.foreground_scan_period_ms = effective.foreground_scan_period_ms;
                    p.foreground_between_scan_period_ms =
                        effective.foreground_between_scan_period_ms;
                })
            }
            _ => return,
        };

        if let Err(e) = outcome {
            tracing::warn!("Failed to persist preferences: {}", e);
        }
    }
}

fn ack<E: std::fmt::Display>(result: std::result::Result<(), E>) -> (Value, Option<Subscription>) {
    match result {
        Ok(()) => (json!({ "ok": true }), None),
        Err(e) => (error(e), None),
    }
}

fn error<E: std::fmt::Display>(e: E) -> Value {
    json!({ "error": format!("{:#}", e) })
}

/// Forward a subscription to stdout until the bridge drops it.
fn pump(mut sub: Subscription) {
    tokio::spawn(async move {
        while let Some(event) = sub.events.recv().await {
            match event.to_json() {
                Ok(payload) => println!("{{\"event\":{}}}", payload),
                Err(e) => tracing::warn!("Dropping unserializable event: {}", e),
            }
        }
        tracing::debug!("Subscription {} closed", sub.id);
    });
}

pub async fn run(
    config: BridgeConfig,
    storage: PathBuf,
    app_id: String,
    activity: Option<String>,
) -> Result<()> {
    let runtime = tokio::runtime::Handle::current();
    let factory = move |host: &HostContext| -> Arc<dyn ScanningEngine> {
        tracing::debug!("Building simulated engine for {}", host.app_id);
        Arc::new(SimulatedEngine::new(runtime.clone()))
    };
    let session = Session::new(config, Box::new(factory), storage, app_id)?;
    session.attach()?;

    if let Some(surface) = activity {
        session.attach_activity(surface)?;
    }

    tracing::info!("Bridge ready, reading requests from stdin");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<HostRequest>(line) {
            Ok(request) => {
                let (response, subscription) = session.handle(request);
                if let Some(sub) = subscription {
                    pump(sub);
                }
                response
            }
            Err(e) => json!({ "error": format!("Malformed request: {}", e) }),
        };
        println!("{}", response);
    }

    if session.bridge().state() != LifecycleState::Detached {
        session.bridge().detach_engine()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tokio::runtime::Handle;

    /// Factory that remembers every engine it builds.
    fn tracked_factory() -> (Box<dyn EngineFactory>, Arc<Mutex<Vec<Arc<SimulatedEngine>>>>) {
        let built = Arc::new(Mutex::new(Vec::new()));
        let sink = built.clone();
        let runtime = Handle::current();
        let factory = move |_: &HostContext| -> Arc<dyn ScanningEngine> {
            let engine = Arc::new(SimulatedEngine::new(runtime.clone()));
            sink.lock().push(engine.clone());
            engine
        };
        (Box::new(factory), built)
    }

    fn session(dir: &std::path::Path) -> (Session, Arc<Mutex<Vec<Arc<SimulatedEngine>>>>) {
        let (factory, built) = tracked_factory();
        let session = Session::new(
            BridgeConfig::default(),
            factory,
            dir.to_path_buf(),
            "com.example.test".to_string(),
        )
        .unwrap();
        session.attach().unwrap();
        (session, built)
    }

    fn current_layouts(built: &Mutex<Vec<Arc<SimulatedEngine>>>) -> Vec<String> {
        built.lock().last().map(|e| e.layouts()).unwrap_or_default()
    }

    fn add_layout(session: &Session, layout: &str) -> Value {
        let mut arguments = Arguments::new();
        arguments.insert(ARG_LAYOUT.to_string(), json!(layout));
        session
            .handle(HostRequest::Invoke {
                method: ADD_BEACON_LAYOUT.to_string(),
                arguments,
            })
            .0
    }

    #[test]
    fn test_parse_requests() {
        let request: HostRequest = serde_json::from_str(
            r#"{"kind":"invoke","method":"addBeaconLayoutForAndroid","arguments":{"layout":"m:2-3=beac"}}"#,
        )
        .unwrap();
        assert!(matches!(request, HostRequest::Invoke { ref method, .. } if method == "addBeaconLayoutForAndroid"));

        let request: HostRequest = serde_json::from_str(r#"{"kind":"listen"}"#).unwrap();
        assert_eq!(request, HostRequest::Listen);

        assert!(serde_json::from_str::<HostRequest>(r#"{"kind":"reboot"}"#).is_err());
    }

    #[tokio::test]
    async fn test_invoke_and_status() {
        let dir = tempdir().unwrap();
        let (session, _) = session(dir.path());

        let (response, _) = session.handle(HostRequest::Invoke {
            method: "startMonitoring".to_string(),
            arguments: Arguments::new(),
        });
        assert_eq!(response["result"]["status"], "success");
        assert_eq!(response["result"]["message"], "Started scanning Beacons.");

        let (response, _) = session.handle(HostRequest::Status);
        assert_eq!(response["state"], "EngineAttached");
    }

    #[tokio::test]
    async fn test_layouts_persist_and_restore() {
        let dir = tempdir().unwrap();
        {
            let (session, _) = session(dir.path());
            add_layout(&session, "m:2-3=beac,i:4-19");
            session.bridge().detach_engine().unwrap();
        }

        let (_restored, built) = session(dir.path());
        assert_eq!(current_layouts(&built), vec!["m:2-3=beac,i:4-19".to_string()]);
    }

    #[tokio::test]
    async fn test_surface_scoped_layouts_restore_on_activity_attach() {
        let dir = tempdir().unwrap();
        {
            let (session, _) = session(dir.path());
            session.attach_activity("main".to_string()).unwrap();
            let response = add_layout(&session, "m:2-3=beac");
            assert_eq!(response["result"]["status"], "success");
            session.bridge().detach_engine().unwrap();
        }

        let (restored, built) = session(dir.path());
        assert!(current_layouts(&built).is_empty());

        let (response, _) = restored.handle(HostRequest::AttachActivity {
            surface: "main".to_string(),
        });
        assert_eq!(response["ok"], true);
        assert_eq!(current_layouts(&built), vec!["m:2-3=beac".to_string()]);

        // Rotation keeps the store bound to the same surface; nothing doubles up
        restored.config_change("main".to_string()).unwrap();
        assert_eq!(current_layouts(&built), vec!["m:2-3=beac".to_string()]);
    }

    #[tokio::test]
    async fn test_repeated_engine_attach_does_not_duplicate_layouts() {
        let dir = tempdir().unwrap();
        let (session, built) = session(dir.path());
        add_layout(&session, "x:1");

        session.handle(HostRequest::AttachEngine);
        session.handle(HostRequest::AttachEngine);
        assert_eq!(built.lock().len(), 1);
        assert_eq!(current_layouts(&built), vec!["x:1".to_string()]);

        // After a full detach the new engine gets the stored layout once
        session.handle(HostRequest::DetachEngine);
        session.handle(HostRequest::AttachEngine);
        assert_eq!(built.lock().len(), 2);
        assert_eq!(current_layouts(&built), vec!["x:1".to_string()]);
    }

    #[tokio::test]
    async fn test_detached_requests_report_errors() {
        let dir = tempdir().unwrap();
        let (session, _) = session(dir.path());
        session.handle(HostRequest::DetachEngine);

        let (response, sub) = session.handle(HostRequest::Listen);
        assert!(sub.is_none());
        assert!(response["error"].is_string());

        let (response, _) = session.handle(HostRequest::AttachActivity {
            surface: "main".to_string(),
        });
        assert!(response["error"].is_string());
    }
}
