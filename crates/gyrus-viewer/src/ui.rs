//! Control panel using bevy_egui

use bevy::ecs::system::SystemParam;
use bevy::prelude::*;
use bevy_egui::{egui, EguiContexts, EguiPrimaryContextPass};

use crate::app::Session;
use crate::config::Config;
use crate::marker::Marker;
use crate::model::ModelScale;
use crate::scene::PendingReset;
use crate::tasks::{self, ConversionFlow, TokioRuntime};

/// Values other systems write for the panel to display
#[derive(Resource)]
pub struct UiReadouts {
    /// Latest line from the conversion pipeline, empty before the first run
    pub convert_status: String,
    /// World-space position of the last mark
    pub marked_position: Option<Vec3>,
    /// Analysis text for the marked point
    pub analysis: String,
}

impl Default for UiReadouts {
    fn default() -> Self {
        Self {
            convert_status: String::new(),
            marked_position: None,
            analysis: "No tumor marked.".to_string(),
        }
    }
}

/// Patient id typed into the panel
#[derive(Resource, Default)]
pub struct PatientInput {
    pub patient_id: String,
}

/// Grouped system parameters for the panel system
#[derive(SystemParam)]
pub struct UiParams<'w, 's> {
    pub contexts: EguiContexts<'w, 's>,
    pub config: Res<'w, Config>,
    pub session: ResMut<'w, Session>,
    pub marker: ResMut<'w, Marker>,
    pub readouts: ResMut<'w, UiReadouts>,
    pub patient: ResMut<'w, PatientInput>,
    pub scale: ResMut<'w, ModelScale>,
    pub reset: ResMut<'w, PendingReset>,
    pub runtime: Res<'w, TokioRuntime>,
    pub conversion: ResMut<'w, ConversionFlow>,
}

pub struct UiPlugin;

impl Plugin for UiPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<UiReadouts>()
            .init_resource::<PatientInput>()
            // bevy_egui 0.38 routes input through its own pass
            .add_systems(EguiPrimaryContextPass, ui_system);
    }
}

fn ui_system(mut params: UiParams) {
    let Ok(ctx) = params.contexts.ctx_mut() else { return };

    egui::SidePanel::left("control_panel")
        .default_width(260.0)
        .show(ctx, |ui| {
            ui.heading("Scan Conversion");
            ui.separator();

            let mut submit = false;
            ui.horizontal(|ui| {
                ui.label("Patient ID:");
                let response = ui.add(
                    egui::TextEdit::singleline(&mut params.patient.patient_id)
                        .hint_text("patient id"),
                );
                // Also submit on Enter
                if response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
                    submit = true;
                }
            });
            if ui.button("Convert & Load").clicked() {
                submit = true;
            }
            if submit {
                let patient_id = params.patient.patient_id.trim().to_string();
                if patient_id.is_empty() {
                    params.readouts.convert_status = "Enter patient id".to_string();
                } else {
                    params.readouts.convert_status = "Starting...".to_string();
                    tasks::start_conversion(
                        &params.runtime.0,
                        &mut params.conversion,
                        &params.config,
                        patient_id,
                    );
                }
            }
            if !params.readouts.convert_status.is_empty() {
                ui.label(&params.readouts.convert_status);
            }

            ui.separator();
            ui.heading("Tumor Annotation");

            let mark_label = if params.session.0.is_marking() {
                "Marking... (Click on Brain)"
            } else {
                "Mark Tumor"
            };
            if ui.button(mark_label).clicked() {
                params.session.0.toggle_marking();
            }

            let toggle_label = if params.marker.0.visible {
                "Hide Tumor"
            } else {
                "Show Tumor"
            };
            if ui.button(toggle_label).clicked() {
                let visible = params.marker.0.visible;
                params.marker.0.set_visible(!visible);
            }

            if ui.button("Reset View").clicked() {
                params.reset.0 = true;
            }

            ui.separator();
            ui.label("Model Scale");
            // Bind a local copy so change detection only fires on real edits
            let mut factor = params.scale.factor;
            ui.add(
                egui::Slider::new(&mut factor, 0.5..=2.0)
                    .fixed_decimals(1)
                    .suffix("x"),
            );
            if factor != params.scale.factor {
                params.scale.factor = factor;
            }

            ui.separator();
            let (x, y, z) = match params.readouts.marked_position {
                Some(p) => (
                    format!("{:.3}", p.x),
                    format!("{:.3}", p.y),
                    format!("{:.3}", p.z),
                ),
                None => ("---".to_string(), "---".to_string(), "---".to_string()),
            };
            ui.monospace(format!("X: {x}  Y: {y}  Z: {z}"));

            ui.separator();
            ui.label("Analysis");
            ui.label(&params.readouts.analysis);
        });
}
