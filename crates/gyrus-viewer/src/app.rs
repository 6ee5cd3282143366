//! Bevy application setup

use anyhow::{Context, Result};
use bevy::asset::AssetMetaCheck;
use bevy::prelude::*;
use bevy::winit::WinitSettings;
use bevy_egui::EguiPlugin;
use bevy_picking::{prelude::MeshPickingPlugin, DefaultPickingPlugins};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::Runtime;
use tracing::warn;

use gyrus_client::Describer;
use gyrus_core::AppState as InteractionState;

use crate::config::Config;
use crate::interact::InteractPlugin;
use crate::marker::MarkerPlugin;
use crate::model::ModelPlugin;
use crate::scene::ScenePlugin;
use crate::speech::SpeechSink;
use crate::tasks::{ConversionFlow, DescribeFlow, TokioRuntime};
use crate::ui::UiPlugin;

/// Session-wide interaction state (marking, placement, AR)
#[derive(Resource, Default)]
pub struct Session(pub InteractionState);

/// Shared handle to the description client
#[derive(Resource, Clone)]
pub struct DescribeService(pub Arc<Describer>);

/// Model file passed on the command line, loaded at startup
#[derive(Resource, Default)]
pub struct StartupModel(pub Option<PathBuf>);

/// Run the Bevy application
pub fn run(config: Config, startup_model: Option<PathBuf>) -> Result<()> {
    let runtime = Runtime::new().context("failed to start async runtime")?;

    let describer = Describer::new(
        config.describe.endpoint.clone(),
        config.describe.api_key.clone(),
    )
    .context("failed to build description client")?;
    if !describer.is_configured() {
        warn!("No description API key configured, point analysis is disabled");
    }

    let speech = SpeechSink::new(&config.speech);

    App::new()
        .insert_resource(ClearColor(Color::srgb(0.08, 0.08, 0.12))) // Dark navy background
        .insert_resource(WinitSettings::default())
        .add_plugins(
            DefaultPlugins
                .set(WindowPlugin {
                    primary_window: Some(Window {
                        title: "Gyrus Anatomy Viewer".to_string(),
                        resolution: (1280.0, 800.0).into(),
                        ..default()
                    }),
                    ..default()
                })
                .set(AssetPlugin {
                    // Load straight from the filesystem - models come out of the
                    // download cache, not a bundled assets directory
                    file_path: "".to_string(),
                    // Don't look for .meta files - the cache doesn't have them
                    meta_check: AssetMetaCheck::Never,
                    ..default()
                }),
        )
        // bevy_egui's picking feature looks for bevy_picking's PickingPlugin,
        // so these must be registered before EguiPlugin
        .add_plugins(DefaultPickingPlugins)
        .add_plugins(MeshPickingPlugin)
        .add_plugins(EguiPlugin::default())
        .insert_resource(config)
        .insert_resource(TokioRuntime(runtime))
        .insert_resource(DescribeService(Arc::new(describer)))
        .insert_resource(StartupModel(startup_model))
        .insert_resource(speech)
        .init_resource::<Session>()
        .init_resource::<ConversionFlow>()
        .init_resource::<DescribeFlow>()
        .add_plugins(ScenePlugin)
        .add_plugins(ModelPlugin)
        .add_plugins(MarkerPlugin)
        .add_plugins(InteractPlugin)
        .add_plugins(UiPlugin)
        .run();

    Ok(())
}
