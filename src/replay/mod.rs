//! Scripted hover sessions.
//!
//! A script describes a surface, the providers answering for it and a
//! timeline of host events. [`run_script`] replays it through a real
//! [`SurfaceWatcher`] and returns the transcript of everything the watcher
//! asked its host to do.
//!
//! ```yaml
//! text: |
//!   fn main() {}
//! providers:
//!   - name: docs
//!     priority: 10
//!     items: ["<b>main</b>"]
//!     delay_ms: 40
//! events:
//!   - at_ms: 0
//!     action: { kind: move, x: 30, y: 4 }
//!   - at_ms: 2000
//!     action: { kind: key }
//! ```

pub mod recorder;

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::time::Instant;

use crate::config::HoverConfig;
use crate::error::{HoverError, HoverResult};
use crate::geometry::GridGeometry;
use crate::lsp::{GlossaryService, LanguageServiceProvider};
use crate::provider::{FixedProvider, ProviderRegistry};
use crate::surface::{PointerEvent, StaticSurface, SurfaceEvent, SurfaceId};
use crate::watcher::SurfaceWatcher;

pub use recorder::{HostCall, Recorder, RecordingDecorations, RecordingRenderer};

#[derive(Debug, Clone, Deserialize)]
pub struct Script {
    pub text: String,
    #[serde(default)]
    pub providers: Vec<ScriptProvider>,
    #[serde(default)]
    pub events: Vec<ScriptStep>,
    /// Grid cell width in pixels.
    #[serde(default = "default_char_width")]
    pub char_width: f64,
    /// Grid line height in pixels.
    #[serde(default = "default_line_height")]
    pub line_height: f64,
    /// How long to keep running after the last event.
    #[serde(default)]
    pub tail_ms: Option<u64>,
}

fn default_char_width() -> f64 {
    8.0
}

fn default_line_height() -> f64 {
    16.0
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScriptProvider {
    pub name: String,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub items: Vec<String>,
    #[serde(default)]
    pub delay_ms: u64,
    /// Fail every query with this message.
    #[serde(default)]
    pub fail: Option<String>,
    /// Answer from a word glossary instead of `items`.
    #[serde(default)]
    pub glossary: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScriptStep {
    /// Offset from the start of the session.
    pub at_ms: u64,
    pub action: ScriptAction,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScriptAction {
    Move { x: f64, y: f64 },
    Enter,
    Leave,
    PopupEnter,
    PopupLeave,
    Key,
    Edit,
}

impl From<&ScriptAction> for SurfaceEvent {
    fn from(action: &ScriptAction) -> Self {
        match action {
            ScriptAction::Move { x, y } => SurfaceEvent::PointerMove(PointerEvent::new(*x, *y)),
            ScriptAction::Enter => SurfaceEvent::PointerEnter,
            ScriptAction::Leave => SurfaceEvent::PointerLeave,
            ScriptAction::PopupEnter => SurfaceEvent::PopupEnter,
            ScriptAction::PopupLeave => SurfaceEvent::PopupLeave,
            ScriptAction::Key => SurfaceEvent::KeyPress,
            ScriptAction::Edit => SurfaceEvent::ContentChanged,
        }
    }
}

impl Script {
    pub fn parse(yaml: &str) -> HoverResult<Self> {
        let mut script: Script = serde_yaml::from_str(yaml)
            .map_err(|e| HoverError::Config(format!("invalid script: {e}")))?;
        script.events.sort_by_key(|step| step.at_ms);
        Ok(script)
    }

    pub fn load(path: &Path) -> HoverResult<Self> {
        Self::parse(&std::fs::read_to_string(path)?)
    }

    fn tail(&self, config: &HoverConfig) -> Duration {
        match self.tail_ms {
            Some(ms) => Duration::from_millis(ms),
            None => config.quiet_period() + config.min_progress() + config.hide_delay(),
        }
    }
}

/// One transcript line: what happened and when, relative to the start.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptEntry {
    pub at: Duration,
    pub call: HostCall,
}

/// Replay `script` through a watcher configured with `config`.
pub async fn run_script(script: &Script, config: &HoverConfig) -> HoverResult<Vec<TranscriptEntry>> {
    let registry = ProviderRegistry::new();
    for p in &script.providers {
        if !p.glossary.is_empty() {
            let service = GlossaryService::new(p.glossary.clone());
            registry
                .register(Arc::new(LanguageServiceProvider::new(
                    p.name.clone(),
                    p.priority,
                    service,
                )))
                .await;
            continue;
        }
        let mut provider = FixedProvider::new(p.name.clone(), p.priority, p.items.clone())
            .with_delay(Duration::from_millis(p.delay_ms));
        if let Some(message) = &p.fail {
            provider = provider.failing(message.clone());
        }
        registry.register(Arc::new(provider)).await;
    }

    let surface = StaticSurface::new(SurfaceId(1), script.text.clone()).handle();
    let (recorder, mut calls) = Recorder::channel();
    let watcher = SurfaceWatcher::builder(surface, registry)
        .config(config.clone())
        .geometry(GridGeometry::new(
            script.char_width,
            script.line_height,
            config.near_text_px,
        ))
        .decorations(recorder.decorations())
        .renderer(recorder.renderer())
        .on_hover(recorder.observer())
        .spawn()?;

    let start = Instant::now();
    let mut transcript = Vec::new();
    let mut collect = |transcript: &mut Vec<TranscriptEntry>| {
        while let Ok(call) = calls.try_recv() {
            transcript.push(TranscriptEntry {
                at: start.elapsed(),
                call,
            });
        }
    };

    for step in &script.events {
        tokio::time::sleep_until(start + Duration::from_millis(step.at_ms)).await;
        collect(&mut transcript);
        watcher.send(SurfaceEvent::from(&step.action))?;
        // Let the watcher react before the next step.
        tokio::task::yield_now().await;
        collect(&mut transcript);
    }

    let end = script
        .events
        .last()
        .map(|s| Duration::from_millis(s.at_ms))
        .unwrap_or_default()
        + script.tail(config);
    while start.elapsed() < end {
        tokio::time::sleep(Duration::from_millis(1).min(end.saturating_sub(start.elapsed()))).await;
        collect(&mut transcript);
    }

    drop(recorder);
    watcher.shutdown().await;
    collect(&mut transcript);
    Ok(transcript)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::ContentItem;

    #[test]
    fn parses_script_and_sorts_events() {
        let script = Script::parse(
            r#"
text: "let x = 1;"
providers:
  - name: docs
    priority: 3
    items: ["<i>x</i>"]
    delay_ms: 20
  - name: lint
    fail: offline
events:
  - at_ms: 700
    action: { kind: key }
  - at_ms: 0
    action: { kind: move, x: 40, y: 2 }
"#,
        )
        .unwrap();

        assert_eq!(script.providers.len(), 2);
        assert_eq!(script.providers[1].fail.as_deref(), Some("offline"));
        assert_eq!(script.providers[1].priority, 0);
        assert_eq!(script.events[0].at_ms, 0);
        assert_eq!(
            script.events[0].action,
            ScriptAction::Move { x: 40.0, y: 2.0 }
        );
        assert_eq!(script.events[1].action, ScriptAction::Key);
        assert_eq!(script.char_width, 8.0);
        assert!(script.providers[0].glossary.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn glossary_provider_answers_from_surface_text() {
        let script = Script::parse(
            r#"
text: "fn main() {}"
providers:
  - name: words
    glossary:
      main: Program entry point.
events:
  - at_ms: 0
    action: { kind: move, x: 36, y: 4 }
"#,
        )
        .unwrap();
        let transcript = run_script(&script, &HoverConfig::default()).await.unwrap();
        let shown = transcript.iter().any(|entry| match &entry.call {
            HostCall::Rendered(view) => {
                view.items == vec![ContentItem::from("**main**\n\nProgram entry point.")]
            }
            _ => false,
        });
        assert!(shown);
    }

    #[test]
    fn unknown_action_is_rejected() {
        let err = Script::parse(
            "text: x\nevents:\n  - at_ms: 0\n    action: { kind: teleport }\n",
        )
        .unwrap_err();
        assert!(matches!(err, HoverError::Config(_)));
    }

    #[test]
    fn actions_map_to_surface_events() {
        assert_eq!(
            SurfaceEvent::from(&ScriptAction::Move { x: 1.0, y: 2.0 }),
            SurfaceEvent::PointerMove(PointerEvent::new(1.0, 2.0))
        );
        assert_eq!(SurfaceEvent::from(&ScriptAction::Edit), SurfaceEvent::ContentChanged);
        assert_eq!(SurfaceEvent::from(&ScriptAction::PopupLeave), SurfaceEvent::PopupLeave);
    }

    #[test]
    fn default_tail_covers_all_timers() {
        let script = Script::parse("text: x\n").unwrap();
        assert_eq!(script.tail(&HoverConfig::default()), Duration::from_millis(1750));
    }
}
