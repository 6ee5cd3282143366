//! Spoken playback of analysis results
//!
//! Results are read aloud through an external command, espeak by default.
//! Playback is fire-and-forget; a spawn failure is logged and the result
//! stays on screen regardless.

use std::process::{Child, Command, Stdio};

use bevy::prelude::Resource;
use tracing::{debug, warn};

use crate::config::SpeechConfig;

#[derive(Resource)]
pub struct SpeechSink {
    enabled: bool,
    command: String,
    args: Vec<String>,
    current: Option<Child>,
}

impl SpeechSink {
    pub fn new(config: &SpeechConfig) -> Self {
        Self {
            enabled: config.enabled,
            command: config.command.clone(),
            args: config.args.clone(),
            current: None,
        }
    }

    /// Speak a line of text. A new utterance replaces one still playing.
    pub fn speak(&mut self, text: &str) {
        if !self.enabled || text.is_empty() {
            return;
        }

        if let Some(mut child) = self.current.take() {
            if let Ok(None) = child.try_wait() {
                let _ = child.kill();
                let _ = child.wait();
            }
        }

        match Command::new(&self.command)
            .args(&self.args)
            .arg(text)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(child) => {
                debug!(command = %self.command, "Speaking analysis");
                self.current = Some(child);
            }
            Err(err) => {
                warn!(command = %self.command, error = %err, "Speech command failed");
            }
        }
    }
}
